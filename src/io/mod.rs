//! I/O layer: catalog clients, the on-disk product cache, GDAL raster
//! access, XML sidecar parsing, archive packaging and the raster/preview
//! `writers`.
pub mod archive;
pub use archive::ArchiveError;

pub mod cache;
pub use cache::{CacheError, CacheOrigin, CachedProduct, ProductCache};

pub mod catalog;
pub use catalog::{
    Catalog, CatalogError, CatalogQuery, DhusCatalog, DirectoryCatalog, PlanetCatalog,
    ProductDescriptor,
};

pub mod gdal;
pub use gdal::{GdalError, GdalMetadata, GdalRasterReader};

pub mod metadata;
pub use metadata::{BandCoefficients, MetadataError};

pub mod writers;
