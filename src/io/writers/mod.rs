//! Output writers: Float32 GeoTIFF rasters with embedded provenance and PNG previews.
pub mod metadata;
pub mod png;
pub mod tiff;
