//! Planet Data API client for PlanetScope scenes.
//!
//! Scenes are found with `quick-search`; each product is delivered by
//! activating its `analytic` raster and `analytic_xml` sidecar assets and
//! packing both into one zip so the cache treats it like any other archive.
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use zip::write::FileOptions;

use super::{Catalog, CatalogError, CatalogQuery, ProductDescriptor};
use crate::core::context::JobContext;

/// Item type of 4-band PlanetScope analytic scenes
pub const PS_SCENE_4BAND: &str = "PSScene4Band";

/// Assets fetched per scene and the file names they are stored under
const ASSETS: &[(&str, &str)] = &[
    ("analytic", "3B_AnalyticMS.tif"),
    ("analytic_xml", "3B_AnalyticMS_metadata.xml"),
];

pub struct PlanetCatalog {
    base_url: String,
    api_key: String,
    item_type: String,
    poll_interval: Duration,
    max_polls: u32,
    client: Client,
}

impl PlanetCatalog {
    pub const DEFAULT_URL: &'static str = "https://api.planet.com/data/v1";

    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            item_type: PS_SCENE_4BAND.to_string(),
            poll_interval: Duration::from_secs(10),
            max_polls: 60,
            client,
        })
    }

    /// How often and how long to wait for asset activation
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.api_key, None::<&str>)
    }

    fn assets_url(&self, id: &str) -> String {
        format!(
            "{}/item-types/{}/items/{}/assets",
            self.base_url, self.item_type, id
        )
    }

    /// Poll the asset list until `asset` is active, activating it once
    fn asset_location(&self, id: &str, asset: &str, ctx: &JobContext) -> Result<String, CatalogError> {
        let mut activated = false;
        for _ in 0..=self.max_polls {
            let assets: HashMap<String, Asset> = self
                .authed(self.client.get(self.assets_url(id)))
                .send()?
                .error_for_status()?
                .json()?;
            let entry = assets
                .get(asset)
                .ok_or_else(|| CatalogError::NotFound(format!("{} asset {}", id, asset)))?;
            match entry.state() {
                AssetState::Active(location) => return Ok(location),
                AssetState::Inactive(activate) if !activated => {
                    ctx.info(format!("activating {} of {}", asset, id));
                    self.authed(self.client.post(&activate))
                        .send()?
                        .error_for_status()?;
                    activated = true;
                }
                _ => ctx.debug(format!("waiting for {} of {}", asset, id)),
            }
            std::thread::sleep(self.poll_interval);
        }
        Err(CatalogError::NotReady(format!("{} asset {}", id, asset)))
    }
}

/// Request body of a `quick-search` for `item_type`
pub fn build_search_request(query: &CatalogQuery, item_type: &str) -> Value {
    let bb = &query.footprint;
    let ring = [
        [bb.min_lon, bb.min_lat],
        [bb.max_lon, bb.min_lat],
        [bb.max_lon, bb.max_lat],
        [bb.min_lon, bb.max_lat],
        [bb.min_lon, bb.min_lat],
    ];
    let mut filters = vec![
        json!({
            "type": "GeometryFilter",
            "field_name": "geometry",
            "config": { "type": "Polygon", "coordinates": [ring] }
        }),
        json!({
            "type": "DateRangeFilter",
            "field_name": "acquired",
            "config": {
                "gte": query.period.start.to_rfc3339(),
                "lte": query.period.end.to_rfc3339()
            }
        }),
    ];
    // Planet reports cloud cover as a fraction
    if let Some((min, max)) = query.cloud_cover {
        filters.push(json!({
            "type": "RangeFilter",
            "field_name": "cloud_cover",
            "config": { "gte": min / 100.0, "lte": max / 100.0 }
        }));
    }
    json!({
        "item_types": [item_type],
        "filter": { "type": "AndFilter", "config": filters }
    })
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default, rename = "_links")]
    links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct PageLinks {
    #[serde(rename = "_next")]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    id: String,
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    acquired: DateTime<Utc>,
    #[serde(default)]
    cloud_cover: Option<f64>,
    #[serde(default)]
    item_type: String,
}

impl Feature {
    fn into_descriptor(self) -> ProductDescriptor {
        ProductDescriptor {
            filename: self.id.clone(),
            identifier: self.id.clone(),
            id: self.id,
            size: String::new(),
            acquired: self.properties.acquired,
            product_type: self.properties.item_type,
            platform: Some("PlanetScope".to_string()),
            cloud_cover: self.properties.cloud_cover.map(|c| c * 100.0),
            checksum: None,
        }
    }
}

/// Parse one `quick-search` page into descriptors and the next page link
pub fn parse_search_page(
    body: &str,
) -> Result<(Vec<ProductDescriptor>, Option<String>), CatalogError> {
    let page: SearchPage = serde_json::from_str(body)?;
    let products = page
        .features
        .into_iter()
        .map(Feature::into_descriptor)
        .collect();
    Ok((products, page.links.next))
}

#[derive(Debug, Deserialize)]
struct Asset {
    status: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default, rename = "_links")]
    links: AssetLinks,
}

#[derive(Debug, Default, Deserialize)]
struct AssetLinks {
    activate: Option<String>,
}

#[derive(Debug, PartialEq)]
enum AssetState {
    Active(String),
    Inactive(String),
    Pending,
}

impl Asset {
    fn state(&self) -> AssetState {
        match (self.status.as_str(), &self.location, &self.links.activate) {
            ("active", Some(location), _) => AssetState::Active(location.clone()),
            ("inactive", _, Some(activate)) => AssetState::Inactive(activate.clone()),
            _ => AssetState::Pending,
        }
    }
}

impl Catalog for PlanetCatalog {
    fn name(&self) -> &str {
        "api.planet.com"
    }

    fn serves(&self, platform: &str) -> bool {
        platform.eq_ignore_ascii_case("PlanetScope")
    }

    fn query(
        &self,
        query: &CatalogQuery,
        ctx: &JobContext,
    ) -> Result<Vec<ProductDescriptor>, CatalogError> {
        let body = build_search_request(query, &self.item_type);
        ctx.debug(format!("quick-search: {}", body));
        let mut page = self
            .authed(self.client.post(format!("{}/quick-search", self.base_url)))
            .json(&body)
            .send()?
            .error_for_status()?
            .text()?;
        let mut products = Vec::new();
        loop {
            let (found, next) = parse_search_page(&page)?;
            let done = found.is_empty();
            products.extend(found);
            match next {
                Some(url) if !done => {
                    page = self
                        .authed(self.client.get(&url))
                        .send()?
                        .error_for_status()?
                        .text()?;
                }
                _ => break,
            }
        }
        products.retain(|p| query.accepts(p));
        products.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        ctx.info(format!("{} scenes found", products.len()));
        Ok(products)
    }

    fn download(
        &self,
        product: &ProductDescriptor,
        dest: &Path,
        ctx: &JobContext,
    ) -> Result<(), CatalogError> {
        let mut zip = zip::ZipWriter::new(BufWriter::new(File::create(dest)?));
        for (asset, suffix) in ASSETS {
            let location = self.asset_location(&product.id, asset, ctx)?;
            ctx.info(format!("downloading {} of {}", asset, product.identifier));
            let mut response = self
                .authed(self.client.get(&location))
                .send()?
                .error_for_status()?;
            zip.start_file(format!("{}_{}", product.identifier, suffix), FileOptions::default())
                .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;
            response.copy_to(&mut zip)?;
        }
        zip.finish()
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?
            .flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Period};
    use chrono::TimeZone;

    #[test]
    fn search_request_carries_geometry_period_and_cloud_fraction() {
        let period = Period {
            start: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2020, 1, 31, 23, 59, 59).unwrap(),
        };
        let q = CatalogQuery::new(BoundingBox::default(), period).cloud_cover(0.0, 50.0);
        let body = build_search_request(&q, PS_SCENE_4BAND);
        assert_eq!(body["item_types"][0], "PSScene4Band");
        let filters = body["filter"]["config"].as_array().unwrap();
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[0]["config"]["coordinates"][0][0][0], 14.6);
        assert_eq!(filters[0]["config"]["coordinates"][0][4][1], 8.7);
        assert_eq!(filters[1]["config"]["gte"], "2020-01-01T00:00:00+00:00");
        assert_eq!(filters[2]["config"]["lte"], 0.5);
    }

    #[test]
    fn search_page_yields_percent_cloud_cover_and_next_link() {
        let body = r#"{
            "features": [{
                "id": "20200101_101010_0f2a",
                "properties": {"acquired": "2020-01-01T10:10:10.123Z", "cloud_cover": 0.12,
                               "item_type": "PSScene4Band", "satellite_id": "0f2a"}
            }],
            "_links": {"_next": "https://api.planet.com/data/v1/searches/abc/results?_page=2"}
        }"#;
        let (products, next) = parse_search_page(body).unwrap();
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.identifier, "20200101_101010_0f2a");
        assert_eq!(p.filename, p.identifier);
        assert_eq!(p.platform.as_deref(), Some("PlanetScope"));
        approx::assert_abs_diff_eq!(p.cloud_cover.unwrap(), 12.0, epsilon = 1e-9);
        assert!(next.unwrap().ends_with("_page=2"));

        let (empty, next) = parse_search_page(r#"{"features": []}"#).unwrap();
        assert!(empty.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn asset_states() {
        let assets: HashMap<String, Asset> = serde_json::from_str(
            r#"{
                "analytic": {"status": "active", "location": "https://dl/a.tif",
                             "_links": {"activate": "https://act/a"}},
                "analytic_xml": {"status": "inactive", "_links": {"activate": "https://act/x"}},
                "udm": {"status": "activating", "_links": {}}
            }"#,
        )
        .unwrap();
        assert_eq!(
            assets["analytic"].state(),
            AssetState::Active("https://dl/a.tif".into())
        );
        assert_eq!(
            assets["analytic_xml"].state(),
            AssetState::Inactive("https://act/x".into())
        );
        assert_eq!(assets["udm"].state(), AssetState::Pending);
    }

    #[test]
    fn serves_planetscope_only() {
        let planet =
            PlanetCatalog::new(PlanetCatalog::DEFAULT_URL, "key", Duration::from_secs(5)).unwrap();
        assert!(planet.serves("PlanetScope"));
        assert!(!planet.serves("Sentinel-2"));
    }
}
