//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts the layer-specific errors (catalog, cache, GDAL, metadata, archive)
//! and provides semantic variants for argument validation and job failures.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] crate::io::CatalogError),

    #[error("Cache error: {0}")]
    Cache(#[from] crate::io::CacheError),

    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] crate::io::MetadataError),

    #[error("Archive error: {0}")]
    Archive(#[from] crate::io::ArchiveError),

    #[error("Grouping error: {0}")]
    Grouping(#[from] crate::core::grouping::GroupingError),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Unsupported product for {operation}: {product}")]
    UnsupportedProduct { operation: String, product: String },

    #[error("Catalog {catalog} does not serve {platform} products")]
    UnsupportedCatalog { catalog: String, platform: String },

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("{process} failed: {source}")]
    Job {
        process: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn processing<E: std::fmt::Display>(e: E) -> Self {
        Error::Processing(e.to_string())
    }

    /// Wrap an error as the overall failure of a named process.
    pub fn job(process: &'static str, source: Error) -> Self {
        Error::Job {
            process,
            source: Box::new(source),
        }
    }
}
