//! Copernicus Data Hub (DHuS) OpenSearch client.
//!
//! Queries page through `search?q=...&format=json` and downloads go through
//! the OData `Products('<uuid>')/$value` endpoint, both with HTTP basic auth.
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use super::{Catalog, CatalogError, CatalogQuery, ProductDescriptor};
use crate::core::context::JobContext;

/// Rows requested per OpenSearch page (the hub maximum)
const PAGE_SIZE: usize = 100;

pub struct DhusCatalog {
    base_url: String,
    username: String,
    password: String,
    client: Client,
}

impl DhusCatalog {
    pub const DEFAULT_URL: &'static str = "https://scihub.copernicus.eu/dhus";

    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            client,
        })
    }

    fn product_url(&self, id: &str, suffix: &str) -> String {
        format!("{}/odata/v1/Products('{}')/{}", self.base_url, id, suffix)
    }

    fn fetch_checksum(&self, id: &str, ctx: &JobContext) -> Option<String> {
        let url = self.product_url(id, "Checksum/Value/$value");
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.text());
        match response {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_ascii_lowercase()),
            Ok(_) => None,
            Err(e) => {
                ctx.warn(format!("no checksum for product {}: {}", id, e));
                None
            }
        }
    }
}

/// Build the OpenSearch `q` expression for a query
pub fn build_search_query(query: &CatalogQuery) -> String {
    let fmt = |t: &DateTime<Utc>| t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    let mut terms = vec![
        format!(
            "beginPosition:[{} TO {}]",
            fmt(&query.period.start),
            fmt(&query.period.end)
        ),
        format!(
            "footprint:\"Intersects({})\"",
            query.footprint.to_wkt()
        ),
    ];
    if let Some(platform) = &query.platform {
        terms.push(format!("platformname:{}", platform));
    }
    if let Some(product_type) = &query.product_type {
        terms.push(format!("producttype:{}", product_type));
    }
    if let Some((min, max)) = query.cloud_cover {
        terms.push(format!("cloudcoverpercentage:[{} TO {}]", min, max));
    }
    terms.join(" AND ")
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    feed: Feed,
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(default)]
    entry: Option<OneOrMany<Entry>>,
}

#[derive(Debug, Deserialize)]
struct Property {
    name: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    title: String,
    #[serde(default)]
    date: OneOrMany<Property>,
    #[serde(default)]
    double: OneOrMany<Property>,
    #[serde(default)]
    str: OneOrMany<Property>,
}

fn property<'a>(props: &'a [Property], name: &str) -> Option<&'a str> {
    props
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.content.as_str())
}

impl Entry {
    fn into_descriptor(self) -> Result<ProductDescriptor, CatalogError> {
        let strs = self.str.into_vec();
        let dates = self.date.into_vec();
        let doubles = self.double.into_vec();
        let begin = property(&dates, "beginposition").ok_or_else(|| {
            CatalogError::InvalidResponse(format!("{} has no beginposition", self.title))
        })?;
        let acquired = DateTime::parse_from_rfc3339(begin)
            .map_err(|e| CatalogError::InvalidResponse(format!("{}: {}", begin, e)))?
            .with_timezone(&Utc);
        let identifier = property(&strs, "identifier").unwrap_or(&self.title).to_string();
        Ok(ProductDescriptor {
            filename: property(&strs, "filename")
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}.SAFE", identifier)),
            size: property(&strs, "size").unwrap_or_default().to_string(),
            product_type: property(&strs, "producttype").unwrap_or_default().to_string(),
            platform: property(&strs, "platformname").map(str::to_string),
            cloud_cover: property(&doubles, "cloudcoverpercentage").and_then(|v| v.parse().ok()),
            checksum: None,
            id: self.id,
            identifier,
            acquired,
        })
    }
}

/// Parse one OpenSearch JSON page into descriptors
pub fn parse_search_page(body: &str) -> Result<Vec<ProductDescriptor>, CatalogError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    response
        .feed
        .entry
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(Entry::into_descriptor)
        .collect()
}

impl Catalog for DhusCatalog {
    fn name(&self) -> &str {
        "scihub.copernicus"
    }

    /// The hub distributes the Copernicus Sentinel missions only
    fn serves(&self, platform: &str) -> bool {
        platform.to_ascii_lowercase().starts_with("sentinel")
    }

    fn query(
        &self,
        query: &CatalogQuery,
        ctx: &JobContext,
    ) -> Result<Vec<ProductDescriptor>, CatalogError> {
        let q = build_search_query(query);
        ctx.debug(format!("OpenSearch query: {}", q));
        let url = format!("{}/search", self.base_url);
        let mut products = Vec::new();
        let mut start = 0usize;
        loop {
            let rows = PAGE_SIZE.to_string();
            let offset = start.to_string();
            let body = self
                .client
                .get(&url)
                .basic_auth(&self.username, Some(&self.password))
                .query(&[
                    ("q", q.as_str()),
                    ("rows", rows.as_str()),
                    ("start", offset.as_str()),
                    ("format", "json"),
                ])
                .send()?
                .error_for_status()?
                .text()?;
            let page = parse_search_page(&body)?;
            let page_len = page.len();
            products.extend(page);
            if page_len < PAGE_SIZE {
                break;
            }
            start += page_len;
        }
        products.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        ctx.info(format!("{} products found", products.len()));
        Ok(products)
    }

    fn download(
        &self,
        product: &ProductDescriptor,
        dest: &Path,
        ctx: &JobContext,
    ) -> Result<(), CatalogError> {
        let url = self.product_url(&product.id, "$value");
        ctx.info(format!("downloading {} from {}", product.identifier, url));
        let mut response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()?
            .error_for_status()?;
        let mut out = BufWriter::new(File::create(dest)?);
        response.copy_to(&mut out)?;
        out.flush()?;
        Ok(())
    }

    fn checksum(&self, product: &ProductDescriptor, ctx: &JobContext) -> Option<String> {
        product
            .checksum
            .clone()
            .or_else(|| self.fetch_checksum(&product.id, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Period};
    use chrono::TimeZone;

    #[test]
    fn search_expression_includes_all_filters() {
        let period = Period {
            start: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2020, 1, 31, 23, 59, 59).unwrap(),
        };
        let q = CatalogQuery::new(BoundingBox::default(), period)
            .platform("Sentinel-2")
            .cloud_cover(0.0, 30.0);
        let expr = build_search_query(&q);
        assert!(expr.starts_with(
            "beginPosition:[2020-01-01T00:00:00.000Z TO 2020-01-31T23:59:59.000Z]"
        ));
        assert!(expr.contains("footprint:\"Intersects(POLYGON((14.6 8.7,"));
        assert!(expr.contains("platformname:Sentinel-2"));
        assert!(expr.ends_with("cloudcoverpercentage:[0 TO 30]"));
    }

    #[test]
    fn parses_single_and_multiple_entries() {
        let single = r#"{"feed":{"opensearch:totalResults":"1","entry":{
            "id":"8a1c","title":"S2A_MSIL1C_20200105T093351_N0208_R136_T33PVL_20200105T101234",
            "date":[{"name":"beginposition","content":"2020-01-05T09:33:51.024Z"}],
            "double":{"name":"cloudcoverpercentage","content":"12.5"},
            "str":[{"name":"filename","content":"S2A_MSIL1C_20200105T093351_N0208_R136_T33PVL_20200105T101234.SAFE"},
                   {"name":"size","content":"790.6 MB"},
                   {"name":"producttype","content":"S2MSI1C"},
                   {"name":"platformname","content":"Sentinel-2"}]}}}"#;
        let products = parse_search_page(single).unwrap();
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.id, "8a1c");
        assert_eq!(p.identifier, "S2A_MSIL1C_20200105T093351_N0208_R136_T33PVL_20200105T101234");
        assert!(p.filename.ends_with(".SAFE"));
        assert_eq!(p.cloud_cover, Some(12.5));
        assert_eq!(p.size_value(), Some(790.6));

        let empty = r#"{"feed":{"opensearch:totalResults":"0"}}"#;
        assert!(parse_search_page(empty).unwrap().is_empty());
    }

    #[test]
    fn entry_without_begin_position_is_invalid() {
        let body = r#"{"feed":{"entry":[{"id":"x","title":"t","str":[]}]}}"#;
        assert!(matches!(
            parse_search_page(body),
            Err(CatalogError::InvalidResponse(_))
        ));
    }

    #[test]
    fn hub_serves_sentinel_missions_only() {
        let hub = DhusCatalog::new(DhusCatalog::DEFAULT_URL, "u", "p", Duration::from_secs(5)).unwrap();
        assert!(hub.serves("Sentinel-2"));
        assert!(!hub.serves("PlanetScope"));
    }
}
