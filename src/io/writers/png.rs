use image::{RgbImage, RgbaImage};
use std::path::Path;

pub fn write_rgba_png(
    output: &Path,
    cols: usize,
    rows: usize,
    rgba_data: Vec<u8>,
) -> Result<(), image::ImageError> {
    let img = RgbaImage::from_raw(cols as u32, rows as u32, rgba_data).ok_or_else(|| {
        image::ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::DimensionMismatch,
        ))
    })?;
    img.save_with_format(output, image::ImageFormat::Png)
}

pub fn write_rgb_png(
    output: &Path,
    cols: usize,
    rows: usize,
    rgb_data: Vec<u8>,
) -> Result<(), image::ImageError> {
    let img = RgbImage::from_raw(cols as u32, rows as u32, rgb_data).ok_or_else(|| {
        image::ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::DimensionMismatch,
        ))
    })?;
    img.save_with_format(output, image::ImageFormat::Png)
}
