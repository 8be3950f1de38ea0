//! EO catalog clients.
//!
//! A catalog answers footprint/period/filter queries with product
//! descriptors and downloads a product archive to a given path. Three
//! implementations are provided: [`DhusCatalog`] for Copernicus DHuS
//! OpenSearch endpoints, [`PlanetCatalog`] for the Planet Data API and
//! [`DirectoryCatalog`] for products staged in a local directory.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::context::JobContext;
use crate::types::{BoundingBox, Period};

pub mod dhus;
pub mod directory;
pub mod planet;

pub use dhus::DhusCatalog;
pub use directory::DirectoryCatalog;
pub use planet::PlanetCatalog;

/// Errors encountered when querying or downloading from a catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid catalog response: {0}")]
    InvalidResponse(String),
    #[error("Catalog index error: {0}")]
    Index(#[from] serde_json::Error),
    #[error("Product {0} not available in catalog")]
    NotFound(String),
    #[error("Product {0} did not become available for download")]
    NotReady(String),
}

/// Catalog metadata record identifying one remotely stored product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDescriptor {
    /// Catalog key used for downloads (a UUID on DHuS)
    pub id: String,
    /// Product identifier, e.g. `S2A_MSIL1C_20200101T...`
    pub identifier: String,
    /// Name of the extracted product, e.g. `<identifier>.SAFE`
    pub filename: String,
    /// Archive size as reported by the catalog, e.g. `790.6 MB`
    #[serde(default)]
    pub size: String,
    /// Acquisition start
    pub acquired: DateTime<Utc>,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub platform: Option<String>,
    /// Cloud cover percentage
    #[serde(default)]
    pub cloud_cover: Option<f64>,
    /// Hex MD5 of the archive when the catalog publishes one
    #[serde(default)]
    pub checksum: Option<String>,
}

impl ProductDescriptor {
    /// Numeric part of the reported archive size
    pub fn size_value(&self) -> Option<f64> {
        self.size.split_whitespace().next()?.parse().ok()
    }
}

/// Search parameters for a catalog query
#[derive(Debug, Clone)]
pub struct CatalogQuery {
    pub footprint: BoundingBox,
    pub period: Period,
    pub platform: Option<String>,
    pub product_type: Option<String>,
    /// Inclusive cloud cover range in percent
    pub cloud_cover: Option<(f64, f64)>,
}

impl CatalogQuery {
    pub fn new(footprint: BoundingBox, period: Period) -> Self {
        Self {
            footprint,
            period,
            platform: None,
            product_type: None,
            cloud_cover: None,
        }
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.platform = Some(platform.to_string());
        self
    }

    pub fn product_type(mut self, product_type: &str) -> Self {
        self.product_type = Some(product_type.to_string());
        self
    }

    pub fn cloud_cover(mut self, min: f64, max: f64) -> Self {
        self.cloud_cover = Some((min, max));
        self
    }

    /// Whether a descriptor satisfies the non-spatial filters
    pub fn accepts(&self, d: &ProductDescriptor) -> bool {
        if !self.period.contains(&d.acquired) {
            return false;
        }
        if let Some(platform) = &self.platform {
            match &d.platform {
                Some(p) if p.eq_ignore_ascii_case(platform) => {}
                _ => return false,
            }
        }
        if let Some(product_type) = &self.product_type {
            if !d.product_type.eq_ignore_ascii_case(product_type) {
                return false;
            }
        }
        if let Some((min, max)) = self.cloud_cover {
            match d.cloud_cover {
                Some(cc) if cc >= min && cc <= max => {}
                Some(_) => return false,
                None => {}
            }
        }
        true
    }
}

/// Remote (or staged) source of EO products
pub trait Catalog: Send + Sync {
    /// Short name used as the cache sub-directory
    fn name(&self) -> &str;

    /// Whether products of `platform` can be found in this catalog at all
    fn serves(&self, platform: &str) -> bool {
        let _ = platform;
        true
    }

    /// Products matching `query`, sorted by identifier
    fn query(
        &self,
        query: &CatalogQuery,
        ctx: &JobContext,
    ) -> Result<Vec<ProductDescriptor>, CatalogError>;

    /// Write the product archive (a zip) to `dest`
    fn download(
        &self,
        product: &ProductDescriptor,
        dest: &Path,
        ctx: &JobContext,
    ) -> Result<(), CatalogError>;

    /// Hex MD5 of the product archive, if the catalog publishes one
    fn checksum(&self, product: &ProductDescriptor, ctx: &JobContext) -> Option<String> {
        let _ = ctx;
        product.checksum.clone()
    }
}
