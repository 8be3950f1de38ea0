//! RGB quicklooks of Sentinel-2 SAFE products.
use gdal::raster::ResampleAlg;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::context::JobContext;
use crate::core::pool::WorkerPool;
use crate::core::processing::autoscale::autoscale_channel;
use crate::core::report::BatchReport;
use crate::error::{Error, Result};
use crate::io::gdal::GdalRasterReader;
use crate::io::writers::png::write_rgb_png;
use crate::types::ColorScheme;

pub const DEFAULT_MAX_SIZE: usize = 1024;

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Image files below `GRANULE/*/IMG_DATA` of a SAFE directory
fn image_files(safe: &Path) -> Result<Vec<PathBuf>> {
    let granule = safe.join("GRANULE");
    let mut files = Vec::new();
    for entry in fs::read_dir(&granule)? {
        let img_data = entry?.path().join("IMG_DATA");
        if img_data.is_dir() {
            collect_files(&img_data, &mut files)?;
        }
    }
    files.sort();
    Ok(files)
}

/// Resolution rank of a band file: L1C names sort before 10m, 20m, 60m
fn band_rank(file_name: &str, band: &str) -> Option<u32> {
    let stem = file_name
        .strip_suffix(".jp2")
        .or_else(|| file_name.strip_suffix(".tif"))?;
    if stem.ends_with(&format!("_{}", band)) {
        return Some(0);
    }
    let (rest, res) = stem.rsplit_once('_')?;
    if !rest.ends_with(&format!("_{}", band)) {
        return None;
    }
    res.strip_suffix('m')?.parse().ok()
}

/// Best-resolution file of `band` among `files`
pub fn find_band(files: &[PathBuf], band: &str) -> Option<PathBuf> {
    files
        .iter()
        .filter_map(|f| {
            let name = f.file_name()?.to_string_lossy().to_string();
            band_rank(&name, band).map(|rank| (rank, f))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, f)| f.clone())
}

/// Output size with the long side capped at `max_size`
pub fn target_shape(size: (usize, usize), max_size: usize) -> (usize, usize) {
    let (w, h) = size;
    let long = w.max(h);
    if long <= max_size || long == 0 {
        return (w, h);
    }
    let scale = max_size as f64 / long as f64;
    (
        ((w as f64 * scale).round() as usize).max(1),
        ((h as f64 * scale).round() as usize).max(1),
    )
}

fn product_name(safe: &Path) -> String {
    let name = safe
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    name.strip_suffix(".SAFE").unwrap_or(&name).to_string()
}

/// Render `RGB_<product>.png` for one SAFE directory
pub fn render_rgb(
    safe: &Path,
    scheme: ColorScheme,
    max_size: usize,
    out_dir: &Path,
    ctx: &JobContext,
) -> Result<PathBuf> {
    let files = image_files(safe)?;
    let mut readers = Vec::with_capacity(3);
    for band in scheme.bands() {
        let path = find_band(&files, band).ok_or_else(|| {
            Error::Processing(format!("band {} not found in {}", band, safe.display()))
        })?;
        ctx.debug(format!("{} -> {}", band, path.display()));
        readers.push(GdalRasterReader::open(&path)?);
    }

    let finest = readers
        .iter()
        .map(|r| (r.metadata.size_x, r.metadata.size_y))
        .max_by_key(|(w, h)| w * h)
        .unwrap_or((0, 0));
    let (cols, rows) = target_shape(finest, max_size);

    let channels = readers
        .iter()
        .map(|r| {
            r.read_band_resampled(1, (cols, rows), Some(ResampleAlg::Average))
                .map(|a| autoscale_channel(&a))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rgb = Vec::with_capacity(cols * rows * 3);
    for i in 0..cols * rows {
        rgb.extend(channels.iter().map(|c| c[i]));
    }

    fs::create_dir_all(out_dir)?;
    let output = out_dir.join(format!("RGB_{}.png", product_name(safe)));
    write_rgb_png(&output, cols, rows, rgb).map_err(Error::processing)?;
    ctx.info(format!("IMG plotted: {}", output.display()));
    Ok(output)
}

/// Render every product on the pool; failures are reported as skipped
pub fn render_all(
    products: &[PathBuf],
    scheme: ColorScheme,
    max_size: usize,
    out_dir: &Path,
    pool: &WorkerPool,
    ctx: &JobContext,
) -> BatchReport<PathBuf> {
    let items = products
        .iter()
        .map(|p| (product_name(p), p.clone()))
        .collect();
    pool.run_keyed(items, |key, safe| {
        render_rgb(&safe, scheme, max_size, out_dir, ctx)
            .inspect_err(|e| ctx.warn(format!("failed to plot RGB of {}: {}", key, e)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::writers::tiff::{GeoReference, write_tiff_f32};
    use ndarray::Array2;

    fn band_file(dir: &Path, band: &str, f: impl Fn(usize, usize) -> f32) {
        let georef = GeoReference {
            geotransform: Some([300_000.0, 10.0, 0.0, 1_000_000.0, 0.0, -10.0]),
            projection: None,
        };
        let data = Array2::from_shape_fn((6, 8), |(r, c)| f(r, c));
        let path = dir.join(format!("T33PVL_20200105T093351_{}.tif", band));
        write_tiff_f32(&path, &data, &georef).unwrap();
    }

    #[test]
    fn l1c_band_beats_resolution_variants() {
        let files: Vec<PathBuf> = [
            "R20m/T33PVL_20200105T093351_B04_20m.jp2",
            "R10m/T33PVL_20200105T093351_B04_10m.jp2",
            "T33PVL_20200105T093351_B8A.jp2",
            "T33PVL_20200105T093351_TCI.jp2",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(
            find_band(&files, "B04"),
            Some(PathBuf::from("R10m/T33PVL_20200105T093351_B04_10m.jp2"))
        );
        assert_eq!(
            find_band(&files, "B8A"),
            Some(PathBuf::from("T33PVL_20200105T093351_B8A.jp2"))
        );
        assert_eq!(find_band(&files, "B08"), None);
    }

    #[test]
    fn long_side_is_capped() {
        assert_eq!(target_shape((10980, 10980), 1024), (1024, 1024));
        assert_eq!(target_shape((2000, 1000), 1000), (1000, 500));
        assert_eq!(target_shape((300, 200), 1024), (300, 200));
    }

    #[test]
    fn natural_colors_render_from_granule_bands() {
        let tmp = tempfile::tempdir().unwrap();
        let safe = tmp.path().join("S2A_MSIL1C_20200105T093351.SAFE");
        let img_data = safe.join("GRANULE/L1C_T33PVL/IMG_DATA");
        fs::create_dir_all(&img_data).unwrap();
        band_file(&img_data, "B04", |_, c| c as f32);
        band_file(&img_data, "B03", |_, _| 7.0);
        band_file(&img_data, "B02", |r, _| r as f32);
        let ctx = JobContext::new("EO_COPERNICUS_rgb", tmp.path());

        let out_dir = tmp.path().join("rgb");
        let png = render_rgb(&safe, ColorScheme::NaturalColors, 4, &out_dir, &ctx).unwrap();
        assert_eq!(png, out_dir.join("RGB_S2A_MSIL1C_20200105T093351.png"));

        let img = image::open(&png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (4, 3));
        let reds: Vec<u8> = (0..4).map(|x| img.get_pixel(x, 1).0[0]).collect();
        assert!(reds.windows(2).all(|w| w[0] < w[1]), "{reds:?}");
        assert_eq!(reds[0], 0);
        let blues: Vec<u8> = (0..3).map(|y| img.get_pixel(2, y).0[2]).collect();
        assert!(blues.windows(2).all(|w| w[0] < w[1]), "{blues:?}");
        assert!(img.pixels().all(|p| p.0[1] == 0));
    }

    #[test]
    fn missing_band_fails_the_product() {
        let tmp = tempfile::tempdir().unwrap();
        let safe = tmp.path().join("P.SAFE");
        let img_data = safe.join("GRANULE/X/IMG_DATA");
        fs::create_dir_all(&img_data).unwrap();
        band_file(&img_data, "B04", |_, c| c as f32);
        let ctx = JobContext::new("EO_COPERNICUS_rgb", tmp.path());
        let err = render_rgb(&safe, ColorScheme::NaturalColors, 4, tmp.path(), &ctx).unwrap_err();
        assert!(err.to_string().contains("band B03 not found"));
    }
}
