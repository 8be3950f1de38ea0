//! Per-date mosaicking of tiles.
//!
//! Tiles are grouped by the date token leading their file name and each
//! group is mosaicked into `<date>_merged.tif`.
use ndarray::Array2;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::context::JobContext;
use crate::core::pool::WorkerPool;
use crate::core::report::BatchReport;
use crate::error::{Error, Result};
use crate::io::gdal::GdalRasterReader;
use crate::io::writers::metadata::{RasterProvenance, embed_tiff_metadata};
use crate::io::writers::tiff::{GeoReference, write_tiff_f32_bands};

/// Relative tolerance when comparing pixel sizes of tiles
const PIXEL_SIZE_TOLERANCE: f64 = 1e-9;

/// File name up to the first `_`
pub fn date_token(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().to_string();
    let (token, _) = name.split_once('_')?;
    (!token.is_empty()).then(|| token.to_string())
}

/// Group tiles by exact date token; tiles without a token are left out
pub fn group_by_date(tiles: &[PathBuf]) -> BTreeMap<String, Vec<PathBuf>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for tile in tiles {
        if let Some(date) = date_token(tile) {
            groups.entry(date).or_default().push(tile.clone());
        }
    }
    groups
}

fn same_size(a: f64, b: f64) -> bool {
    (a - b).abs() <= PIXEL_SIZE_TOLERANCE * a.abs().max(b.abs())
}

/// Mosaic north-up rasters sharing pixel size and band count.
///
/// The output covers the union of the inputs, is Float32 and starts as NaN.
/// Inputs are burned in order; a later tile overwrites earlier values except
/// where its own pixel is NaN or nodata.
pub fn mosaic(inputs: &[PathBuf], output: &Path) -> Result<PathBuf> {
    let readers = inputs
        .iter()
        .map(GdalRasterReader::open)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let first = readers
        .first()
        .ok_or_else(|| Error::Processing("mosaic needs at least one input".into()))?;
    let gt0 = first.metadata.geotransform;
    let (px, py) = (gt0[1], gt0[5]);
    let bands = first.metadata.bands;

    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (reader, path) in readers.iter().zip(inputs) {
        let md = &reader.metadata;
        let gt = md.geotransform;
        if !md.is_north_up() {
            return Err(Error::Processing(format!(
                "{} is rotated, only north-up tiles can be merged",
                path.display()
            )));
        }
        if !same_size(gt[1], px) || !same_size(gt[5], py) {
            return Err(Error::Processing(format!(
                "{} has pixel size {}x{}, expected {}x{}",
                path.display(),
                gt[1],
                gt[5],
                px,
                py
            )));
        }
        if md.bands != bands {
            return Err(Error::Processing(format!(
                "{} has {} bands, expected {}",
                path.display(),
                md.bands,
                bands
            )));
        }
        let x_end = gt[0] + gt[1] * md.size_x as f64;
        let y_end = gt[3] + gt[5] * md.size_y as f64;
        min_x = min_x.min(gt[0].min(x_end));
        max_x = max_x.max(gt[0].max(x_end));
        min_y = min_y.min(gt[3].min(y_end));
        max_y = max_y.max(gt[3].max(y_end));
    }

    let cols = ((max_x - min_x) / px.abs()).round() as usize;
    let rows = ((max_y - min_y) / py.abs()).round() as usize;
    // Keep the sign convention of the inputs
    let origin_x = if px > 0.0 { min_x } else { max_x };
    let origin_y = if py < 0.0 { max_y } else { min_y };

    let mut mosaics: Vec<Array2<f32>> = (0..bands)
        .map(|_| Array2::from_elem((rows, cols), f32::NAN))
        .collect();
    for reader in &readers {
        let md = &reader.metadata;
        let gt = md.geotransform;
        let col_off = ((gt[0] - origin_x) / px).round() as isize;
        let row_off = ((gt[3] - origin_y) / py).round() as isize;
        for (b, mosaic) in mosaics.iter_mut().enumerate() {
            let data = reader.read_band(b + 1)?;
            let nodata = reader.no_data_value(b + 1)?;
            for ((r, c), &v) in data.indexed_iter() {
                if v.is_nan() || nodata == Some(v) {
                    continue;
                }
                let (tr, tc) = (row_off + r as isize, col_off + c as isize);
                if tr < 0 || tc < 0 || tr as usize >= rows || tc as usize >= cols {
                    continue;
                }
                mosaic[[tr as usize, tc as usize]] = v as f32;
            }
        }
    }

    let georef = GeoReference {
        geotransform: Some([origin_x, px, 0.0, origin_y, 0.0, py]),
        projection: Some(first.metadata.projection.clone()),
    };
    let mut ds = write_tiff_f32_bands(output, &mosaics, &georef)?;
    let mut provenance = RasterProvenance::new("MOSAIC", &date_token(output).unwrap_or_default());
    for input in inputs {
        provenance = provenance.with_source(input.display().to_string());
    }
    embed_tiff_metadata(&mut ds, &provenance)?;
    Ok(output.to_path_buf())
}

/// Mosaic each date group into `<date>_merged.tif` under `out_dir`.
///
/// Dates are independent; a failing date is reported as skipped.
pub fn merge_groups(
    groups: BTreeMap<String, Vec<PathBuf>>,
    out_dir: &Path,
    pool: &WorkerPool,
    ctx: &JobContext,
) -> Result<BatchReport<PathBuf>> {
    std::fs::create_dir_all(out_dir)?;
    let items: Vec<(String, Vec<PathBuf>)> = groups.into_iter().collect();
    let report = pool.run_keyed(items, |date, tiles| {
        ctx.debug(format!("merge date {} ({} tiles)", date, tiles.len()));
        let output = out_dir.join(format!("{}_merged.tif", date));
        mosaic(&tiles, &output)
            .inspect(|_| ctx.info(format!("files merged for date {}", date)))
            .inspect_err(|e| ctx.warn(format!("failed to merge tiles of date {}: {}", date, e)))
    });
    Ok(report)
}

/// Group `tiles` by date token and mosaic each date
pub fn merge(
    tiles: &[PathBuf],
    out_dir: &Path,
    pool: &WorkerPool,
    ctx: &JobContext,
) -> Result<BatchReport<PathBuf>> {
    let groups = group_by_date(tiles);
    for tile in tiles.iter().filter(|t| date_token(t).is_none()) {
        ctx.warn(format!("{} has no date token, not merged", tile.display()));
    }
    merge_groups(groups, out_dir, pool, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::writers::tiff::write_tiff_f32;

    fn tile(dir: &Path, name: &str, origin_x: f64, pixel: f64, value: f32) -> PathBuf {
        let path = dir.join(name);
        let georef = GeoReference {
            geotransform: Some([origin_x, pixel, 0.0, 100.0, 0.0, -pixel]),
            projection: None,
        };
        write_tiff_f32(&path, &Array2::from_elem((2, 2), value), &georef).unwrap();
        path
    }

    #[test]
    fn date_tokens_group_by_exact_match() {
        let tiles: Vec<PathBuf> = ["20200101_a.tif", "20200101_b.tif", "20200102_a.tif", "2020010_c.tif", "plain.tif"]
            .iter()
            .map(|n| PathBuf::from("/tmp/x").join(n))
            .collect();
        let groups = group_by_date(&tiles);
        let keys: Vec<_> = groups.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["2020010", "20200101", "20200102"]);
        assert_eq!(groups["20200101"].len(), 2);
        assert_eq!(groups["2020010"].len(), 1);
        assert_eq!(date_token(Path::new("plain.tif")), None);
    }

    #[test]
    fn mismatched_date_is_skipped_while_others_merge() {
        let tmp = tempfile::tempdir().unwrap();
        let tiles = vec![
            tile(tmp.path(), "20200101_a.tif", 0.0, 3.0, 1.0),
            tile(tmp.path(), "20200101_b.tif", 6.0, 6.0, 2.0),
            tile(tmp.path(), "20200102_a.tif", 0.0, 1.0, 3.0),
            tile(tmp.path(), "20200102_b.tif", 2.0, 1.0, 4.0),
        ];
        let out_dir = tmp.path().join("merged");
        let pool = WorkerPool::new(2).unwrap();
        let ctx = JobContext::new("merge", tmp.path());

        let report = merge(&tiles, &out_dir, &pool, &ctx).unwrap();
        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].0, "20200101");
        assert!(skipped[0].1.contains("pixel size"));
        assert!(!out_dir.join("20200101_merged.tif").exists());

        let merged: Vec<_> = report.succeeded().collect();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].0, "20200102");
        let reader = GdalRasterReader::open(merged[0].1).unwrap();
        assert_eq!((reader.metadata.size_x, reader.metadata.size_y), (4, 2));
        let band = reader.read_band(1).unwrap();
        assert_eq!(band[[0, 0]], 3.0);
        assert_eq!(band[[1, 3]], 4.0);
    }
}
