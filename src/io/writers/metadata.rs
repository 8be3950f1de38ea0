use gdal::Dataset;
use gdal::Metadata;
use std::collections::BTreeMap;

use crate::io::gdal::GdalError;

/// Provenance recorded on every raster the crate writes
#[derive(Debug, Clone)]
pub struct RasterProvenance {
    /// Short name of the computed product, e.g. `NDVI` or `MOSAIC`
    pub product: String,
    /// Scene key or date the raster was computed for
    pub scene: String,
    /// Input files the raster was derived from
    pub sources: Vec<String>,
    /// Free-form extra fields (band numbers, coefficients, ...)
    pub extras: BTreeMap<String, String>,
    pub processing_tool: String,
    pub processing_version: String,
    pub processing_timestamp: String,
}

impl RasterProvenance {
    pub fn new(product: &str, scene: &str) -> Self {
        Self {
            product: product.to_string(),
            scene: scene.to_string(),
            sources: Vec::new(),
            extras: BTreeMap::new(),
            processing_tool: "eoprocess".to_string(),
            processing_version: env!("CARGO_PKG_VERSION").to_string(),
            processing_timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl ToString) -> Self {
        self.extras.insert(key.to_ascii_uppercase(), value.to_string());
        self
    }
}

/// Extract all provenance fields into a flat key/value map
pub fn extract_metadata_fields(meta: &RasterProvenance) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("PRODUCT".to_string(), meta.product.clone());
    metadata.insert("SCENE".to_string(), meta.scene.clone());
    if !meta.sources.is_empty() {
        metadata.insert("SOURCES".to_string(), meta.sources.join(","));
    }
    for (k, v) in &meta.extras {
        metadata.insert(k.clone(), v.clone());
    }
    metadata.insert("PROCESSING_TOOL".to_string(), meta.processing_tool.clone());
    metadata.insert(
        "PROCESSING_VERSION".to_string(),
        meta.processing_version.clone(),
    );
    metadata.insert(
        "PROCESSING_TIMESTAMP".to_string(),
        meta.processing_timestamp.clone(),
    );
    metadata
}

/// Embed provenance into a GDAL dataset's default metadata domain
pub fn embed_tiff_metadata(ds: &mut Dataset, meta: &RasterProvenance) -> Result<(), GdalError> {
    for (key, value) in extract_metadata_fields(meta) {
        ds.set_metadata_item(&key, &value, "")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_flattened_and_uppercased() {
        let meta = RasterProvenance::new("NDVI", "20200101_101010_0f2b")
            .with_source("a.tif")
            .with_source("a.xml")
            .with_extra("red_band", 3);
        let fields = extract_metadata_fields(&meta);
        assert_eq!(fields["PRODUCT"], "NDVI");
        assert_eq!(fields["SOURCES"], "a.tif,a.xml");
        assert_eq!(fields["RED_BAND"], "3");
        assert_eq!(fields["PROCESSING_TOOL"], "eoprocess");
    }
}
