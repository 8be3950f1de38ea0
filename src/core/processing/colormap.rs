//! Preview rendering of single-band index rasters.
use ndarray::Array2;

use super::ops::finite_range;

/// matplotlib "summer" ramp: green at the low end to yellow at the high end
pub fn summer(t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let to_u8 = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_u8(t), to_u8(0.5 + 0.5 * t), to_u8(0.4)]
}

/// Colorize `data` into interleaved RGBA.
///
/// Values are scaled between the finite min and max; NaN pixels are fully
/// transparent. A constant image maps to the low end of the ramp.
pub fn colorize_rgba(data: &Array2<f32>) -> Vec<u8> {
    let (lo, hi) = finite_range(data).unwrap_or((0.0, 0.0));
    let span = hi - lo;
    let mut rgba = Vec::with_capacity(data.len() * 4);
    for &v in data.iter() {
        if !v.is_finite() {
            rgba.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        let t = if span > 0.0 { (v - lo) / span } else { 0.0 };
        let [r, g, b] = summer(t);
        rgba.extend_from_slice(&[r, g, b, 255]);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn ramp_endpoints() {
        assert_eq!(summer(0.0), [0, 128, 102]);
        assert_eq!(summer(1.0), [255, 255, 102]);
    }

    #[test]
    fn nan_is_transparent_and_extremes_hit_ramp_ends() {
        let data = array![[f32::NAN, -1.0], [0.0, 1.0]];
        let rgba = colorize_rgba(&data);
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[0..4], &[0, 0, 0, 0]);
        assert_eq!(&rgba[4..8], &[0, 128, 102, 255]);
        assert_eq!(&rgba[12..16], &[255, 255, 102, 255]);
    }
}
