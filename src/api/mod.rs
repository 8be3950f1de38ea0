//! High-level job entry points: catalog query, fetch into the cache, compute
//! and package, reporting progress and logs through a [`JobContext`]. Prefer
//! these over the `core` building blocks when embedding the pipeline.
use chrono::{NaiveDate, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::context::JobContext;
use crate::core::grouping::TileGroups;
use crate::core::pool::WorkerPool;
use crate::core::processing::merge::merge_groups;
use crate::core::processing::ndvi::{IndexOutput, compute_indices};
use crate::core::processing::rgb::{DEFAULT_MAX_SIZE, render_all};
use crate::core::report::BatchReport;
use crate::error::{Error, Result};
use crate::io::archive::archive;
use crate::io::cache::ProductCache;
use crate::io::catalog::{Catalog, CatalogQuery};
use crate::types::{ArchiveFormat, BoundingBox, ColorScheme, Period, ProductKind};

pub mod processes;
pub use processes::{IoDescription, ProcessDescription, processes};

pub const NDVI_PROCESS: &str = "EO_ndvi";
pub const RGB_PROCESS: &str = "EO_COPERNICUS_rgb";

/// Parameters of an NDVI job
#[derive(Debug, Clone)]
pub struct NdviRequest {
    pub product: ProductKind,
    pub bbox: BoundingBox,
    /// First day searched; defaults to 30 days before `end`
    pub start: Option<NaiveDate>,
    /// Last day searched; defaults to now
    pub end: Option<NaiveDate>,
    /// Maximum cloud cover as a fraction
    pub cloud_cover: f64,
    pub archive_format: ArchiveFormat,
    /// Also mosaic the index rasters per acquisition date
    pub merge: bool,
}

impl Default for NdviRequest {
    fn default() -> Self {
        Self {
            product: ProductKind::PlanetScope,
            bbox: BoundingBox::default(),
            start: None,
            end: None,
            cloud_cover: 0.5,
            archive_format: ArchiveFormat::Tar,
            merge: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NdviOutputs {
    /// Archive of `ndvi_<scene>.tif` rasters
    pub index_archive: PathBuf,
    /// Archive of `ndvi_<scene>.png` previews
    pub plot_archive: PathBuf,
    /// First preview, if any scene succeeded
    pub example_plot: Option<PathBuf>,
    /// Archive of `<date>_merged.tif` mosaics when merging was requested
    pub merged_archive: Option<PathBuf>,
    pub log: PathBuf,
    pub report: BatchReport<IndexOutput>,
    pub merged: Option<BatchReport<PathBuf>>,
}

/// Parameters of a Sentinel-2 RGB job
#[derive(Debug, Clone)]
pub struct RgbRequest {
    pub scheme: ColorScheme,
    pub bbox: BoundingBox,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Maximum cloud cover in percent
    pub cloud_cover: f64,
    /// Long side of the rendered images in pixels
    pub max_size: usize,
    pub archive_format: ArchiveFormat,
}

impl Default for RgbRequest {
    fn default() -> Self {
        Self {
            scheme: ColorScheme::NaturalColors,
            bbox: BoundingBox::default(),
            start: None,
            end: None,
            cloud_cover: 30.0,
            max_size: DEFAULT_MAX_SIZE,
            archive_format: ArchiveFormat::Tar,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RgbOutputs {
    pub archive: PathBuf,
    pub example_plot: Option<PathBuf>,
    pub log: PathBuf,
    pub report: BatchReport<PathBuf>,
}

fn resolve_period(start: Option<NaiveDate>, end: Option<NaiveDate>, ctx: &JobContext) -> Period {
    let (period, inverted) = Period::resolve(start, end, Utc::now());
    if inverted {
        ctx.warn("period ends before period starts; period now set to the last 30 days from now");
    }
    ctx.debug(format!("period {} to {}", period.start, period.end));
    period
}

/// All files below `dir`, sorted
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Run the NDVI job: query, fetch, compute, optionally merge, archive.
pub fn run_ndvi(
    ctx: &JobContext,
    catalog: &dyn Catalog,
    cache: &ProductCache,
    pool: &WorkerPool,
    request: &NdviRequest,
) -> Result<NdviOutputs> {
    let _enter = ctx.span().enter();
    fetch_and_index(ctx, catalog, cache, pool, request).map_err(|e| {
        ctx.error(format!("{} failed: {}", NDVI_PROCESS, e));
        Error::job(NDVI_PROCESS, e)
    })
}

fn ensure_serves(catalog: &dyn Catalog, platform: &str) -> Result<()> {
    if catalog.serves(platform) {
        return Ok(());
    }
    Err(Error::UnsupportedCatalog {
        catalog: catalog.name().to_string(),
        platform: platform.to_string(),
    })
}

fn fetch_and_index(
    ctx: &JobContext,
    catalog: &dyn Catalog,
    cache: &ProductCache,
    pool: &WorkerPool,
    request: &NdviRequest,
) -> Result<NdviOutputs> {
    ctx.status("start fetch data", 10);
    if request.product.index_bands().is_none() {
        return Err(Error::UnsupportedProduct {
            operation: "NDVI".to_string(),
            product: request.product.to_string(),
        });
    }
    ensure_serves(catalog, request.product.platform())?;
    let period = resolve_period(request.start, request.end, ctx);
    let query = CatalogQuery::new(request.bbox, period)
        .platform(request.product.platform())
        .cloud_cover(0.0, request.cloud_cover * 100.0);
    let products = catalog.query(&query, ctx)?;
    ctx.info(format!("{} products found in {}", products.len(), catalog.name()));

    let cached = cache.fetch_all(catalog, &products, ctx)?;
    let mut tiles = Vec::new();
    for product in &cached {
        tiles.extend(list_files(&product.path)?);
    }
    index_tiles(ctx, pool, request, &tiles)
}

/// Run the NDVI pipeline on files already on disk.
///
/// `request.bbox` and the dates are ignored; every given file is grouped.
pub fn run_ndvi_on_files(
    ctx: &JobContext,
    pool: &WorkerPool,
    request: &NdviRequest,
    tiles: &[PathBuf],
) -> Result<NdviOutputs> {
    let _enter = ctx.span().enter();
    ctx.status("start fetch data", 10);
    index_tiles(ctx, pool, request, tiles).map_err(|e| {
        ctx.error(format!("{} failed: {}", NDVI_PROCESS, e));
        Error::job(NDVI_PROCESS, e)
    })
}

fn index_tiles(
    ctx: &JobContext,
    pool: &WorkerPool,
    request: &NdviRequest,
    tiles: &[PathBuf],
) -> Result<NdviOutputs> {
    ctx.status("calculating the NDVI", 30);
    let groups = TileGroups::from_files(tiles, request.product)?;
    ctx.info(format!(
        "{} files grouped into {} scenes",
        groups.file_count(),
        groups.len()
    ));
    let workdir = ctx.workdir().to_path_buf();
    let report = compute_indices(groups, request.product, &workdir.join("ndvi"), pool, ctx)?;

    let (rasters, plots): (Vec<PathBuf>, Vec<PathBuf>) = report
        .succeeded()
        .map(|(_, out)| (out.raster.clone(), out.preview.clone()))
        .unzip();

    let mut merged = None;
    let mut merged_archive = None;
    if request.merge {
        ctx.status("merging tiles", 70);
        let mut by_date = std::collections::BTreeMap::<String, Vec<PathBuf>>::new();
        for (key, out) in report.succeeded() {
            match &out.date {
                Some(date) => by_date.entry(date.clone()).or_default().push(out.raster.clone()),
                None => ctx.warn(format!("scene {} has no acquisition date, not merged", key)),
            }
        }
        let merge_report = merge_groups(by_date, &workdir.join("merged"), pool, ctx)?;
        let merged_files: Vec<PathBuf> = merge_report.succeeded().map(|(_, p)| p.clone()).collect();
        merged_archive = Some(archive(
            &merged_files,
            request.archive_format,
            &workdir,
            "ndvi_merged",
        )?);
        merged = Some(merge_report);
    }

    ctx.status("archiving", 90);
    let index_archive = archive(&rasters, request.archive_format, &workdir, "ndvi_rasters")?;
    ctx.info("geotiff files added to archive");
    let plot_archive = archive(&plots, request.archive_format, &workdir, "ndvi_plots")?;
    ctx.info("png files added to archive");

    ctx.status("done", 100);
    let log = ctx.write_log()?;
    Ok(NdviOutputs {
        index_archive,
        plot_archive,
        example_plot: plots.first().cloned(),
        merged_archive,
        log,
        report,
        merged,
    })
}

/// Run the Sentinel-2 RGB job: query, fetch, render, archive.
pub fn run_rgb(
    ctx: &JobContext,
    catalog: &dyn Catalog,
    cache: &ProductCache,
    pool: &WorkerPool,
    request: &RgbRequest,
) -> Result<RgbOutputs> {
    let _enter = ctx.span().enter();
    fetch_and_render(ctx, catalog, cache, pool, request).map_err(|e| {
        ctx.error(format!("{} failed: {}", RGB_PROCESS, e));
        Error::job(RGB_PROCESS, e)
    })
}

fn fetch_and_render(
    ctx: &JobContext,
    catalog: &dyn Catalog,
    cache: &ProductCache,
    pool: &WorkerPool,
    request: &RgbRequest,
) -> Result<RgbOutputs> {
    ctx.status("start fetching resource", 10);
    ensure_serves(catalog, ProductKind::Sentinel2.platform())?;
    let period = resolve_period(request.start, request.end, ctx);
    let query = CatalogQuery::new(request.bbox, period)
        .platform(ProductKind::Sentinel2.platform())
        .cloud_cover(0.0, request.cloud_cover);

    ctx.status("start searching tiles according to query", 15);
    let products = catalog.query(&query, ctx)?;
    ctx.debug(format!("{} products found", products.len()));

    let mut resources = Vec::with_capacity(products.len());
    for product in &products {
        ctx.status(&format!("fetch file {}", product.identifier), 20);
        let cached = cache
            .fetch(catalog, product, ctx)
            .inspect_err(|e| ctx.error(format!("failed to fetch {}: {}", product.identifier, e)))?;
        resources.push(cached.path);
    }

    ctx.status("Plotting RGB graphics", 40);
    let out_dir = ctx.workdir().join("rgb");
    let report = render_all(
        &resources,
        request.scheme,
        request.max_size,
        &out_dir,
        pool,
        ctx,
    );
    let images: Vec<PathBuf> = report.succeeded().map(|(_, p)| p.clone()).collect();
    let archive_path = archive(&images, request.archive_format, ctx.workdir(), "rgb_plots")?;

    ctx.status("done", 100);
    let log = ctx.write_log()?;
    Ok(RgbOutputs {
        archive: archive_path,
        example_plot: images.first().cloned(),
        log,
        report,
    })
}
