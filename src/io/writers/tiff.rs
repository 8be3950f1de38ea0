use gdal::Dataset;
use gdal::DriverManager;
use gdal::raster::{Buffer, ColorInterpretation};
use ndarray::Array2;
use std::path::Path;

use crate::io::gdal::GdalError;

/// Georeferencing copied onto a written raster
#[derive(Debug, Clone, Default)]
pub struct GeoReference {
    pub geotransform: Option<[f64; 6]>,
    pub projection: Option<String>,
}

/// Write a single-band Float32 GeoTIFF with NaN as nodata
pub fn write_tiff_f32(
    output: &Path,
    data: &Array2<f32>,
    georef: &GeoReference,
) -> Result<Dataset, GdalError> {
    write_tiff_f32_bands(output, std::slice::from_ref(data), georef)
}

/// Write equally shaped Float32 bands into one GeoTIFF with NaN as nodata
pub fn write_tiff_f32_bands(
    output: &Path,
    bands: &[Array2<f32>],
    georef: &GeoReference,
) -> Result<Dataset, GdalError> {
    let (rows, cols) = bands
        .first()
        .map(|b| b.dim())
        .ok_or_else(|| GdalError::UnsupportedFormat("no bands to write".into()))?;
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut ds = driver.create_with_band_type::<f32, _>(output, cols, rows, bands.len())?;
    apply_georeference(&mut ds, georef)?;

    for (i, data) in bands.iter().enumerate() {
        let (r, c) = data.dim();
        if (r, c) != (rows, cols) {
            return Err(GdalError::DimensionMismatch(cols, rows, c, r));
        }
        let mut band = ds.rasterband(i + 1)?;
        if bands.len() == 1 {
            band.set_color_interpretation(ColorInterpretation::GrayIndex)?;
        }
        band.set_no_data_value(Some(f64::NAN))?;
        let mut buf = Buffer::new((cols, rows), data.iter().copied().collect::<Vec<f32>>());
        band.write((0, 0), (cols, rows), &mut buf)?;
    }
    Ok(ds)
}

fn apply_georeference(ds: &mut Dataset, georef: &GeoReference) -> Result<(), GdalError> {
    if let Some(gt) = georef.geotransform {
        ds.set_geo_transform(&gt)?;
    }
    if let Some(projection) = georef.projection.as_deref() {
        if !projection.is_empty() {
            ds.set_projection(projection)?;
        }
    }
    Ok(())
}
