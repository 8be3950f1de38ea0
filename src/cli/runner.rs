use std::fs;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use eoprocess::api::{
    self, NDVI_PROCESS, NdviOutputs, NdviRequest, RGB_PROCESS, RgbRequest, processes,
};
use eoprocess::core::context::JobContext;
use eoprocess::core::params::Settings;
use eoprocess::core::pool::WorkerPool;
use eoprocess::core::processing::merge::merge;
use eoprocess::io::{Catalog, DhusCatalog, DirectoryCatalog, PlanetCatalog, ProductCache};
use eoprocess::types::BoundingBox;

use super::args::{CatalogArgs, CliArgs, Command, NdviArgs, RgbArgs};
use super::errors::AppError;

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_settings(args: &CliArgs) -> Result<Settings, AppError> {
    let mut settings = match &args.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    if let Some(dir) = &args.cache_dir {
        settings.cache_root = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        settings.output_dir = dir.clone();
    }
    if let Some(workers) = args.workers {
        settings.workers = workers;
    }
    settings.validate()?;
    Ok(settings)
}

fn open_catalog(args: &CatalogArgs, settings: &Settings) -> Result<Box<dyn Catalog>, AppError> {
    if let Some(dir) = &args.catalog_dir {
        return Ok(Box::new(DirectoryCatalog::new(dir)));
    }
    if let Some(token) = &args.planet_token {
        let planet = PlanetCatalog::new(&settings.planet_url, token, settings.request_timeout())
            .map_err(eoprocess::Error::from)?;
        return Ok(Box::new(planet));
    }
    match (&args.dhus_user, &args.dhus_password) {
        (Some(user), Some(password)) => Ok(Box::new(
            DhusCatalog::new(
                &settings.dhus_url,
                user,
                password,
                settings.request_timeout(),
            )
            .map_err(eoprocess::Error::from)?,
        )),
        _ => Err(AppError::MissingArgument {
            arg: "--catalog-dir, --planet-token or --dhus-user/--dhus-password".to_string(),
        }),
    }
}

fn job_context(process: &'static str, settings: &Settings) -> Result<JobContext, AppError> {
    fs::create_dir_all(&settings.output_dir)?;
    Ok(JobContext::new(process, &settings.output_dir))
}

fn report_ndvi(outputs: &NdviOutputs) {
    let (ok, skipped) = outputs.report.counts();
    info!("NDVI scenes: {} succeeded, {} skipped", ok, skipped);
    for (key, reason) in outputs.report.skipped() {
        warn!("skipped {}: {}", key, reason);
    }
    info!("rasters: {}", outputs.index_archive.display());
    info!("previews: {}", outputs.plot_archive.display());
    if let Some(merged) = &outputs.merged_archive {
        info!("mosaics: {}", merged.display());
    }
    info!("log: {}", outputs.log.display());
}

fn run_ndvi(args: NdviArgs, settings: &Settings) -> Result<(), AppError> {
    if !(0.0..=1.0).contains(&args.cloud_cover) {
        return Err(AppError::InvalidCloudCover {
            value: args.cloud_cover,
            max: 1.0,
        });
    }
    let request = NdviRequest {
        product: args.product,
        bbox: BoundingBox::parse(&args.search.bbox)?,
        start: args.search.start,
        end: args.search.end,
        cloud_cover: args.cloud_cover,
        archive_format: args.archive_format,
        merge: args.merge,
    };
    let pool = WorkerPool::new(settings.workers)?;
    let ctx = job_context(NDVI_PROCESS, settings)?;

    let outputs = if args.tiles.is_empty() {
        let catalog = open_catalog(&args.catalog, settings)?;
        let cache = ProductCache::new(&settings.cache_root);
        api::run_ndvi(&ctx, catalog.as_ref(), &cache, &pool, &request)?
    } else {
        api::run_ndvi_on_files(&ctx, &pool, &request, &args.tiles)?
    };
    report_ndvi(&outputs);
    Ok(())
}

fn run_rgb(args: RgbArgs, settings: &Settings) -> Result<(), AppError> {
    if !(0.0..=100.0).contains(&args.cloud_cover) {
        return Err(AppError::InvalidCloudCover {
            value: args.cloud_cover,
            max: 100.0,
        });
    }
    if args.max_size == 0 {
        return Err(AppError::ZeroSize);
    }
    let request = RgbRequest {
        scheme: args.scheme,
        bbox: BoundingBox::parse(&args.search.bbox)?,
        start: args.search.start,
        end: args.search.end,
        cloud_cover: args.cloud_cover,
        max_size: args.max_size,
        archive_format: args.archive_format,
    };
    let catalog = open_catalog(&args.catalog, settings)?;
    let cache = ProductCache::new(&settings.cache_root);
    let pool = WorkerPool::new(settings.workers)?;
    let ctx = job_context(RGB_PROCESS, settings)?;

    let outputs = api::run_rgb(&ctx, catalog.as_ref(), &cache, &pool, &request)?;
    let (ok, skipped) = outputs.report.counts();
    info!("RGB images: {} rendered, {} skipped", ok, skipped);
    for (key, reason) in outputs.report.skipped() {
        warn!("skipped {}: {}", key, reason);
    }
    info!("archive: {}", outputs.archive.display());
    info!("log: {}", outputs.log.display());
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);
    let settings = load_settings(&args)?;

    match args.command {
        Command::Ndvi(ndvi) => run_ndvi(ndvi, &settings)?,
        Command::Rgb(rgb) => run_rgb(rgb, &settings)?,
        Command::Merge(m) => {
            let pool = WorkerPool::new(settings.workers)?;
            let ctx = job_context("merge", &settings)?;
            let report = merge(&m.tiles, ctx.workdir(), &pool, &ctx)?;
            for (date, path) in report.succeeded() {
                info!("{} -> {}", date, path.display());
            }
            for (date, reason) in report.skipped() {
                warn!("failed to merge {}: {}", date, reason);
            }
            info!("log: {}", ctx.write_log()?.display());
        }
        Command::Processes => {
            println!("{}", serde_json::to_string_pretty(&processes())?);
        }
    }
    Ok(())
}
