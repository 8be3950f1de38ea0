//! Core building blocks: settings, per-job context, scene grouping, the
//! worker pool with its batch reports, and raster processing. These are
//! consumed by the high-level `api` module.
pub mod context;
pub mod grouping;
pub mod params;
pub mod pool;
pub mod processing;
pub mod report;
