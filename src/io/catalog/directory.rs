use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Catalog, CatalogError, CatalogQuery, ProductDescriptor};
use crate::core::context::JobContext;
use crate::types::BoundingBox;

/// Entry of a staged catalog's `index.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    #[serde(flatten)]
    pub product: ProductDescriptor,
    /// Product extent; entries without one match every footprint
    #[serde(default)]
    pub footprint: Option<BoundingBox>,
}

/// Catalog backed by a local directory holding `index.json` and one
/// `<identifier>.zip` per product.
pub struct DirectoryCatalog {
    root: PathBuf,
    name: String,
}

impl DirectoryCatalog {
    pub const INDEX_FILE: &'static str = "index.json";

    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            name: "local".to_string(),
        }
    }

    /// Use a different cache namespace than `local`
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn archive_path(&self, product: &ProductDescriptor) -> PathBuf {
        self.root.join(format!("{}.zip", product.identifier))
    }

    /// Read the staged index
    pub fn entries(&self) -> Result<Vec<IndexEntry>, CatalogError> {
        let raw = fs::read_to_string(self.root.join(Self::INDEX_FILE))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write an index listing `entries`
    pub fn write_index(&self, entries: &[IndexEntry]) -> Result<(), CatalogError> {
        fs::create_dir_all(&self.root)?;
        let body = serde_json::to_string_pretty(entries)?;
        fs::write(self.root.join(Self::INDEX_FILE), body)?;
        Ok(())
    }
}

fn intersects(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.min_lon <= b.max_lon && b.min_lon <= a.max_lon && a.min_lat <= b.max_lat && b.min_lat <= a.max_lat
}

impl Catalog for DirectoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(
        &self,
        query: &CatalogQuery,
        ctx: &JobContext,
    ) -> Result<Vec<ProductDescriptor>, CatalogError> {
        let mut products: Vec<ProductDescriptor> = self
            .entries()?
            .into_iter()
            .filter(|e| {
                e.footprint
                    .as_ref()
                    .map_or(true, |fp| intersects(fp, &query.footprint))
            })
            .map(|e| e.product)
            .filter(|p| query.accepts(p))
            .collect();
        products.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        ctx.debug(format!(
            "{} products matched in {}",
            products.len(),
            self.root.display()
        ));
        Ok(products)
    }

    fn download(
        &self,
        product: &ProductDescriptor,
        dest: &Path,
        ctx: &JobContext,
    ) -> Result<(), CatalogError> {
        let src = self.archive_path(product);
        if !src.is_file() {
            return Err(CatalogError::NotFound(product.identifier.clone()));
        }
        ctx.debug(format!("copying {}", src.display()));
        fs::copy(&src, dest)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Period;
    use chrono::{TimeZone, Utc};

    fn entry(identifier: &str, day: u32, footprint: Option<BoundingBox>) -> IndexEntry {
        IndexEntry {
            product: ProductDescriptor {
                id: identifier.to_string(),
                identifier: identifier.to_string(),
                filename: identifier.to_string(),
                size: "1 MB".to_string(),
                acquired: Utc.with_ymd_and_hms(2020, 1, day, 9, 0, 0).unwrap(),
                product_type: "analytic".to_string(),
                platform: Some("PlanetScope".to_string()),
                cloud_cover: Some(1.0),
                checksum: None,
            },
            footprint,
        }
    }

    #[test]
    fn query_filters_by_period_and_footprint_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = DirectoryCatalog::new(tmp.path());
        let far = BoundingBox {
            min_lon: 100.0,
            min_lat: 0.0,
            max_lon: 101.0,
            max_lat: 1.0,
        };
        catalog
            .write_index(&[
                entry("b", 10, None),
                entry("a", 12, Some(BoundingBox::default())),
                entry("c", 14, Some(far)),
                entry("d", 28, None),
            ])
            .unwrap();
        let period = Period {
            start: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2020, 1, 20, 0, 0, 0).unwrap(),
        };
        let ctx = JobContext::new("test", tmp.path());
        let found = catalog
            .query(&CatalogQuery::new(BoundingBox::default(), period), &ctx)
            .unwrap();
        let ids: Vec<_> = found.iter().map(|p| p.identifier.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn download_of_unstaged_product_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = DirectoryCatalog::new(tmp.path());
        let product = entry("missing", 1, None).product;
        let ctx = JobContext::new("test", tmp.path());
        let err = catalog
            .download(&product, &tmp.path().join("out.zip"), &ctx)
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[test]
    fn download_is_logged_in_the_job_log() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = DirectoryCatalog::new(tmp.path());
        let product = entry("staged", 1, None).product;
        fs::write(tmp.path().join("staged.zip"), b"zip bytes").unwrap();
        let ctx = JobContext::new("test", tmp.path());
        let dest = tmp.path().join("copy.zip");
        catalog.download(&product, &dest, &ctx).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"zip bytes");

        let log = fs::read_to_string(ctx.write_log().unwrap()).unwrap();
        assert!(log.contains("copying"), "{log}");
        assert!(log.contains("staged.zip"), "{log}");
    }
}
