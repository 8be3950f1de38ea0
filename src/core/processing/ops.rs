use ndarray::{Array2, Zip};

/// Multiply every element by a scalar coefficient
pub fn scale_array(a: &Array2<f64>, coefficient: f64) -> Array2<f64> {
    a.mapv(|v| v * coefficient)
}

/// Normalized difference: (a - b) / (a + b).
///
/// Pixels whose sum is exactly zero come out as NaN instead of dividing.
pub fn normalized_difference(a: &Array2<f64>, b: &Array2<f64>) -> Array2<f32> {
    let mut result = Array2::<f32>::zeros(a.dim());
    Zip::from(a).and(b).and(&mut result).for_each(|a_val, b_val, res| {
        let sum = a_val + b_val;
        *res = if sum == 0.0 {
            f32::NAN
        } else {
            ((a_val - b_val) / sum) as f32
        };
    });
    result
}

/// Smallest and largest finite values, if any
pub fn finite_range(data: &Array2<f32>) -> Option<(f32, f32)> {
    data.iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn equal_bands_give_zero() {
        let nir = array![[0.3, 12.0]];
        let red = array![[0.3, 12.0]];
        let out = normalized_difference(&nir, &red);
        assert_eq!(out, array![[0.0f32, 0.0]]);
    }

    #[test]
    fn zero_bands_give_nan_not_a_failure() {
        let out = normalized_difference(&array![[0.0]], &array![[0.0]]);
        assert!(out[[0, 0]].is_nan());
    }

    #[test]
    fn dominant_band_approaches_one() {
        let out = normalized_difference(&array![[1000.0, 1.0]], &array![[1.0, 1000.0]]);
        assert_abs_diff_eq!(out[[0, 0]], 1.0, epsilon = 0.01);
        assert_abs_diff_eq!(out[[0, 1]], -1.0, epsilon = 0.01);
        assert!(out.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn range_ignores_nan() {
        let data = array![[f32::NAN, -0.5], [0.25, f32::NAN]];
        assert_eq!(finite_range(&data), Some((-0.5, 0.25)));
        assert_eq!(finite_range(&array![[f32::NAN]]), None);
    }
}
