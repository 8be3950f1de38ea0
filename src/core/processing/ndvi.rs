//! Vegetation index computation for grouped scenes.
use std::path::{Path, PathBuf};

use crate::core::context::JobContext;
use crate::core::grouping::{TileBundle, TileGroups};
use crate::core::pool::WorkerPool;
use crate::core::processing::colormap::colorize_rgba;
use crate::core::processing::ops::{normalized_difference, scale_array};
use crate::core::report::BatchReport;
use crate::error::{Error, Result};
use crate::io::gdal::GdalRasterReader;
use crate::io::metadata::read_reflectance_coefficients;
use crate::io::writers::metadata::{RasterProvenance, embed_tiff_metadata};
use crate::io::writers::png::write_rgba_png;
use crate::io::writers::tiff::{GeoReference, write_tiff_f32};
use crate::types::ProductKind;

/// Files produced for one scene
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutput {
    pub scene: String,
    /// Acquisition date `YYYYMMDD` of the scene, when known
    pub date: Option<String>,
    pub raster: PathBuf,
    pub preview: PathBuf,
}

/// Compute the NDVI of one bundle into `out_dir`.
///
/// Writes `ndvi_<scene>.tif` (Float32, NaN where undefined, source grid) and
/// `ndvi_<scene>.png`.
pub fn compute_index(
    bundle: &TileBundle,
    kind: ProductKind,
    out_dir: &Path,
    ctx: &JobContext,
) -> Result<IndexOutput> {
    let layout = kind.index_bands().ok_or_else(|| Error::UnsupportedProduct {
        operation: "NDVI".to_string(),
        product: kind.to_string(),
    })?;
    let (raster, sidecar) = bundle.validate()?;
    let scene = bundle.key.raw.clone();
    ctx.debug(format!(
        "scene {}: raster {}, metadata {}",
        scene,
        raster.display(),
        sidecar.display()
    ));

    let coefficients = read_reflectance_coefficients(sidecar)?;
    let red_coef = coefficients.get(layout.red)?;
    let nir_coef = coefficients.get(layout.nir)?;

    let reader = GdalRasterReader::open(raster)?;
    let red = scale_array(&reader.read_band(layout.red)?, red_coef);
    let nir = scale_array(&reader.read_band(layout.nir)?, nir_coef);
    let index = normalized_difference(&nir, &red);

    let georef = GeoReference {
        geotransform: reader.dataset.geo_transform().ok(),
        projection: Some(reader.metadata.projection.clone()),
    };
    let raster_out = out_dir.join(format!("ndvi_{}.tif", scene));
    let mut ds = write_tiff_f32(&raster_out, &index, &georef)?;
    let provenance = RasterProvenance::new("NDVI", &scene)
        .with_source(raster.display().to_string())
        .with_source(sidecar.display().to_string())
        .with_extra("red_band", layout.red)
        .with_extra("nir_band", layout.nir)
        .with_extra("red_coefficient", red_coef)
        .with_extra("nir_coefficient", nir_coef);
    embed_tiff_metadata(&mut ds, &provenance)?;
    drop(ds);

    let preview = out_dir.join(format!("ndvi_{}.png", scene));
    let (rows, cols) = index.dim();
    write_rgba_png(&preview, cols, rows, colorize_rgba(&index)).map_err(Error::processing)?;

    ctx.info(format!("NDVI computed for {}", scene));
    Ok(IndexOutput {
        scene,
        date: bundle.key.date.clone(),
        raster: raster_out,
        preview,
    })
}

/// Compute indices for every bundle on the pool.
///
/// A failing bundle is logged and reported as skipped; the others proceed.
pub fn compute_indices(
    groups: TileGroups,
    kind: ProductKind,
    out_dir: &Path,
    pool: &WorkerPool,
    ctx: &JobContext,
) -> Result<BatchReport<IndexOutput>> {
    std::fs::create_dir_all(out_dir)?;
    let items: Vec<(String, TileBundle)> = groups
        .into_bundles()
        .into_iter()
        .map(|b| (b.key.raw.clone(), b))
        .collect();
    ctx.info(format!("computing NDVI for {} scenes", items.len()));
    let report = pool.run_keyed(items, |key, bundle| {
        compute_index(&bundle, kind, out_dir, ctx)
            .inspect_err(|e| ctx.warn(format!("NDVI failed for {}: {}", key, e)))
    });
    let (ok, skipped) = report.counts();
    ctx.info(format!("NDVI done: {} succeeded, {} skipped", ok, skipped));
    Ok(report)
}
