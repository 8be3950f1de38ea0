use ndarray::Array2;
use tracing::debug;

/// Percentile bounds used for quicklook stretching
pub const STRETCH_LOW: f64 = 0.02;
pub const STRETCH_HIGH: f64 = 0.98;

/// Estimate percentiles of the finite values without sorting them.
///
/// Two passes: min/max first, then a fixed-bin histogram over [min, max]
/// whose CDF is inverted with linear interpolation inside the bin. Returns
/// `None` when no finite value exists.
pub fn percentiles(data: &Array2<f64>, ps: &[f64]) -> Option<Vec<f64>> {
    let mut count: u64 = 0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in data.iter().filter(|v| v.is_finite()) {
        count += 1;
        min = min.min(v);
        max = max.max(v);
    }
    if count == 0 {
        return None;
    }
    if (max - min).abs() < f64::EPSILON {
        return Some(vec![min; ps.len()]);
    }

    const NUM_BINS: usize = 4096;
    let mut hist = vec![0u64; NUM_BINS];
    let span = max - min;
    for &v in data.iter().filter(|v| v.is_finite()) {
        let t = ((v - min) / span).clamp(0.0, 1.0);
        let idx = ((t * NUM_BINS as f64) as usize).min(NUM_BINS - 1);
        hist[idx] += 1;
    }

    let bin_width = span / NUM_BINS as f64;
    let estimate = |p: f64| -> f64 {
        let target = ((p * count as f64).floor() as u64).min(count - 1);
        let mut cumsum = 0u64;
        for (b, &h) in hist.iter().enumerate() {
            let next = cumsum + h;
            if target < next {
                let frac = (target - cumsum) as f64 / h as f64;
                return min + (b as f64 + frac) * bin_width;
            }
            cumsum = next;
        }
        max
    };
    Some(ps.iter().map(|&p| estimate(p)).collect())
}

/// Linearly map `[lo, hi]` onto 0..=255, clamping outside values; NaN maps to 0
pub fn stretch_to_u8(data: &Array2<f64>, lo: f64, hi: f64) -> Vec<u8> {
    let span = hi - lo;
    data.iter()
        .map(|&v| {
            if !v.is_finite() {
                return 0;
            }
            if span <= 0.0 {
                return if v > lo { 255 } else { 0 };
            }
            (((v - lo) / span).clamp(0.0, 1.0) * 255.0).round() as u8
        })
        .collect()
}

/// Stretch a channel between its 2nd and 98th percentile
pub fn autoscale_channel(data: &Array2<f64>) -> Vec<u8> {
    match percentiles(data, &[STRETCH_LOW, STRETCH_HIGH]).as_deref() {
        Some(&[lo, hi]) => {
            debug!("stretch range [{:.3}, {:.3}]", lo, hi);
            stretch_to_u8(data, lo, hi)
        }
        _ => vec![0; data.len()],
    }
}
