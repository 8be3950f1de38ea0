//! Shared types and enums used across the crate.
//! Includes `ProductKind` with its band layout table, `ArchiveFormat`,
//! `ColorScheme`, and the request geometry/time types `BoundingBox` and `Period`.
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
pub enum ProductKind {
    /// PlanetScope 4-band analytic scenes (band order blue, green, red, NIR)
    #[value(name = "PlanetScope", alias = "planetscope")]
    PlanetScope,
    /// Sentinel-2 MSI products delivered as SAFE archives
    #[value(name = "Sentinel-2", alias = "sentinel2")]
    Sentinel2,
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductKind::PlanetScope => write!(f, "PlanetScope"),
            ProductKind::Sentinel2 => write!(f, "Sentinel-2"),
        }
    }
}

/// 1-based band numbers of the red and near-infrared channels in a stacked raster
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BandLayout {
    pub red: usize,
    pub nir: usize,
}

impl ProductKind {
    /// Band layout used for the vegetation index.
    ///
    /// Products delivered as one file per band have no stacked layout and
    /// return `None`.
    pub fn index_bands(&self) -> Option<BandLayout> {
        match self {
            ProductKind::PlanetScope => Some(BandLayout { red: 3, nir: 4 }),
            ProductKind::Sentinel2 => None,
        }
    }

    /// Platform name as used in catalog queries
    pub fn platform(&self) -> &'static str {
        match self {
            ProductKind::PlanetScope => "PlanetScope",
            ProductKind::Sentinel2 => "Sentinel-2",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    #[default]
    Tar,
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Zip => "zip",
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Sentinel-2 band combinations rendered as RGB quicklooks
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorScheme {
    #[default]
    #[value(name = "naturalcolors")]
    #[serde(rename = "naturalcolors")]
    NaturalColors,
    FalsecolorsVegetation,
    FalsecolorsUrban,
    AthmosphericPenetration,
    Agriculture,
    HealthyVegetation,
    LandWater,
    #[value(name = "naturalcolors-athmosphericremoval")]
    #[serde(rename = "naturalcolors-athmosphericremoval")]
    NaturalColorsAthmosphericRemoval,
    ShortwaveInfrared,
    VegetationAnalyses,
}

impl ColorScheme {
    /// Band names mapped to the red, green and blue channels
    pub fn bands(&self) -> [&'static str; 3] {
        match self {
            ColorScheme::NaturalColors => ["B04", "B03", "B02"],
            ColorScheme::FalsecolorsVegetation => ["B08", "B04", "B03"],
            ColorScheme::FalsecolorsUrban => ["B12", "B11", "B04"],
            ColorScheme::AthmosphericPenetration => ["B12", "B11", "B8A"],
            ColorScheme::Agriculture => ["B11", "B08", "B02"],
            ColorScheme::HealthyVegetation => ["B08", "B11", "B02"],
            ColorScheme::LandWater => ["B08", "B11", "B04"],
            ColorScheme::NaturalColorsAthmosphericRemoval => ["B12", "B08", "B03"],
            ColorScheme::ShortwaveInfrared => ["B12", "B08", "B04"],
            ColorScheme::VegetationAnalyses => ["B11", "B08", "B04"],
        }
    }
}

impl std::fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_possible_value() {
            Some(v) => write!(f, "{}", v.get_name()),
            None => write!(f, "{:?}", self),
        }
    }
}

/// Geographic bounding box in decimal degrees (WGS84)
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub const DEFAULT_INPUT: &'static str = "14.6,14.8,8.7,8.9";

    /// Parse the process input form `min_lon,max_lon,min_lat,max_lat`.
    ///
    /// Latitudes may be given in either order; longitudes must be ascending.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidArgument {
            arg: "bbox",
            value: input.to_string(),
        };
        let values = input
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|_| invalid())?;
        let [min_lon, max_lon, lat_a, lat_b] = values[..] else {
            return Err(invalid());
        };
        let bbox = BoundingBox {
            min_lon,
            min_lat: lat_a.min(lat_b),
            max_lon,
            max_lat: lat_a.max(lat_b),
        };
        let lon_ok = |v: f64| (-180.0..=180.0).contains(&v);
        let lat_ok = |v: f64| (-90.0..=90.0).contains(&v);
        if !(lon_ok(bbox.min_lon) && lon_ok(bbox.max_lon) && lat_ok(bbox.min_lat) && lat_ok(bbox.max_lat))
            || bbox.min_lon >= bbox.max_lon
            || bbox.min_lat == bbox.max_lat
        {
            return Err(invalid());
        }
        Ok(bbox)
    }

    /// Closed polygon footprint in WKT
    pub fn to_wkt(&self) -> String {
        format!(
            "POLYGON(({x0} {y0},{x1} {y0},{x1} {y1},{x0} {y1},{x0} {y0}))",
            x0 = self.min_lon,
            y0 = self.min_lat,
            x1 = self.max_lon,
            y1 = self.max_lat
        )
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox {
            min_lon: 14.6,
            min_lat: 8.7,
            max_lon: 14.8,
            max_lat: 8.9,
        }
    }
}

/// Search period, inclusive on both ends
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub const DEFAULT_DAYS: i64 = 30;

    /// Resolve optional request dates against `now`.
    ///
    /// Returns the period and whether the inputs were inverted and replaced by
    /// the last 30 days.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> (Self, bool) {
        let end_dt = match end {
            Some(d) => Utc.from_utc_datetime(&d.and_time(end_of_day())),
            None => now,
        };
        let start_dt = match start {
            Some(d) => Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)),
            None => end_dt - Duration::days(Self::DEFAULT_DAYS),
        };
        if start_dt > end_dt {
            let fallback = Period {
                start: now - Duration::days(Self::DEFAULT_DAYS),
                end: now,
            };
            return (fallback, true);
        }
        (
            Period {
                start: start_dt,
                end: end_dt,
            },
            false,
        )
    }

    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        *t >= self.start && *t <= self.end
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_parses_process_order() {
        let bbox = BoundingBox::parse("14.6,14.8,8.9,8.7").unwrap();
        assert_eq!(bbox, BoundingBox::default());
        assert_eq!(
            bbox.to_wkt(),
            "POLYGON((14.6 8.7,14.8 8.7,14.8 8.9,14.6 8.9,14.6 8.7))"
        );
    }

    #[test]
    fn bbox_rejects_garbage() {
        assert!(BoundingBox::parse("1,2,3").is_err());
        assert!(BoundingBox::parse("a,b,c,d").is_err());
        assert!(BoundingBox::parse("15,14,8,9").is_err());
        assert!(BoundingBox::parse("14,15,95,9").is_err());
    }

    #[test]
    fn period_defaults_to_thirty_days_before_end() {
        let now = Utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap();
        let (p, inverted) = Period::resolve(None, None, now);
        assert!(!inverted);
        assert_eq!(p.end, now);
        assert_eq!(p.start, now - Duration::days(30));

        let end = NaiveDate::from_ymd_opt(2020, 2, 10).unwrap();
        let (p, _) = Period::resolve(None, Some(end), now);
        assert_eq!(p.end, Utc.with_ymd_and_hms(2020, 2, 10, 23, 59, 59).unwrap());
        assert_eq!(p.start, Utc.with_ymd_and_hms(2020, 1, 11, 23, 59, 59).unwrap());
    }

    #[test]
    fn inverted_period_falls_back_to_last_thirty_days() {
        let now = Utc.with_ymd_and_hms(2020, 3, 1, 0, 0, 0).unwrap();
        let start = NaiveDate::from_ymd_opt(2020, 2, 20);
        let end = NaiveDate::from_ymd_opt(2020, 2, 1);
        let (p, inverted) = Period::resolve(start, end, now);
        assert!(inverted);
        assert_eq!(p.end, now);
        assert_eq!(p.start, now - Duration::days(30));
    }

    #[test]
    fn band_layout_table() {
        assert_eq!(
            ProductKind::PlanetScope.index_bands(),
            Some(BandLayout { red: 3, nir: 4 })
        );
        assert_eq!(ProductKind::Sentinel2.index_bands(), None);
        assert_eq!(ColorScheme::NaturalColors.bands(), ["B04", "B03", "B02"]);
        assert_eq!(ColorScheme::NaturalColors.to_string(), "naturalcolors");
        assert_eq!(ColorScheme::LandWater.to_string(), "land-water");
    }
}
