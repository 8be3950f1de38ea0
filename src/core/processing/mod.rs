//! Raster processing: band arithmetic, preview colormaps and stretching,
//! per-scene NDVI, per-date mosaics and Sentinel-2 RGB quicklooks.
pub mod autoscale;
pub mod colormap;
pub mod merge;
pub mod ndvi;
pub mod ops;
pub mod rgb;
