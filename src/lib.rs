#![doc = r#"
eoprocess — an Earth-observation processing pipeline.

This crate searches a product catalog, fetches products into an on-disk cache,
groups the extracted files into per-scene bundles, computes NDVI rasters and
previews, mosaics tiles per acquisition date and packages the results into
archives. It also renders RGB quicklooks of Sentinel-2 products. It powers the
`eoprocess` CLI and can be embedded in your own Rust applications.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Quick start: NDVI from a staged catalog
---------------------------------------
```rust,no_run
use std::path::Path;
use eoprocess::{
    run_ndvi, DirectoryCatalog, JobContext, NdviRequest, ProductCache, WorkerPool,
};

fn main() -> eoprocess::Result<()> {
    let catalog = DirectoryCatalog::new("/data/catalog");
    let cache = ProductCache::new("/data/cache");
    let pool = WorkerPool::new(4)?;
    let ctx = JobContext::new("EO_ndvi", Path::new("/out"));

    let request = NdviRequest {
        merge: true,
        ..NdviRequest::default()
    };
    let outputs = run_ndvi(&ctx, &catalog, &cache, &pool, &request)?;

    let (ok, skipped) = outputs.report.counts();
    println!("scenes ok={ok} skipped={skipped}");
    println!("rasters in {}", outputs.index_archive.display());
    Ok(())
}
```

NDVI on files already on disk
-----------------------------
```rust,no_run
use std::path::{Path, PathBuf};
use eoprocess::{run_ndvi_on_files, JobContext, NdviRequest, WorkerPool};

fn main() -> eoprocess::Result<()> {
    let tiles: Vec<PathBuf> = vec![
        "/data/20200101_101010_0f2a_3B_AnalyticMS.tif".into(),
        "/data/20200101_101010_0f2a_3B_AnalyticMS_metadata.xml".into(),
    ];
    let ctx = JobContext::new("EO_ndvi", Path::new("/out"));
    let outputs = run_ndvi_on_files(&ctx, &WorkerPool::new(2)?, &NdviRequest::default(), &tiles)?;
    for (scene, out) in outputs.report.succeeded() {
        println!("{scene}: {}", out.raster.display());
    }
    Ok(())
}
```

Error handling
--------------
All public functions return `eoprocess::Result<T>`; match on `eoprocess::Error` to handle
specific cases. Job entry points wrap failures in `Error::Job`, naming the process.

```rust,no_run
use std::path::Path;
use eoprocess::{run_rgb, DirectoryCatalog, Error, JobContext, ProductCache, RgbRequest, WorkerPool};

fn main() {
    let ctx = JobContext::new("EO_COPERNICUS_rgb", Path::new("/out"));
    let catalog = DirectoryCatalog::new("/missing");
    let cache = ProductCache::new("/tmp/cache");
    let Ok(pool) = WorkerPool::new(1) else { return };
    match run_rgb(&ctx, &catalog, &cache, &pool, &RgbRequest::default()) {
        Ok(out) => println!("{}", out.archive.display()),
        Err(Error::Job { process, source }) => eprintln!("{process}: {source}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`] — job entry points and process descriptions.
- [`core`] — job context, grouping, worker pool, reports and raster processing.
- [`io`] — catalogs, product cache, GDAL access, sidecar parsing, archives and writers.
- [`types`] — product kinds, color schemes, bounding boxes and periods.
- [`error`] — crate-level `Error` and `Result`.
"#]

pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
pub use crate::core::context::{JobContext, JobLog, LogEntry, StatusSink};
pub use crate::core::params::Settings;
pub use crate::core::pool::WorkerPool;
pub use crate::core::report::{BatchReport, ItemOutcome, ItemStatus};
pub use error::{Error, Result};
pub use types::{ArchiveFormat, BoundingBox, ColorScheme, Period, ProductKind};

pub use io::{
    Catalog, CatalogQuery, DhusCatalog, DirectoryCatalog, PlanetCatalog, ProductCache,
    ProductDescriptor,
};

pub use api::{
    NdviOutputs, NdviRequest, RgbOutputs, RgbRequest, processes, run_ndvi, run_ndvi_on_files,
    run_rgb,
};
