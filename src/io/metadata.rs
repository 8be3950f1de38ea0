//! Scene metadata sidecars.
//!
//! PlanetScope analytic scenes ship an XML sidecar listing, per band, a
//! `bandSpecificMetadata` element with a `bandNumber` and a
//! `reflectanceCoefficient` converting digital numbers to top-of-atmosphere
//! reflectance. Elements are matched by local name so the `ps:` prefix (or
//! any other namespace binding) does not matter.
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;

/// Errors encountered when reading metadata sidecars
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Invalid reflectance coefficient for band {band}: {value:?}")]
    InvalidCoefficient { band: usize, value: String },
    #[error("Band {0} listed more than once")]
    DuplicateBand(usize),
    #[error("No reflectance coefficient for band {0}")]
    MissingBand(usize),
}

/// Per-band reflectance coefficients, keyed by 1-based band number
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandCoefficients {
    coefficients: BTreeMap<usize, f64>,
}

impl BandCoefficients {
    pub const MAX_BAND: usize = 4;

    pub fn get(&self, band: usize) -> Result<f64, MetadataError> {
        self.coefficients
            .get(&band)
            .copied()
            .ok_or(MetadataError::MissingBand(band))
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    fn insert(&mut self, band: usize, value: f64) -> Result<(), MetadataError> {
        if self.coefficients.insert(band, value).is_some() {
            return Err(MetadataError::DuplicateBand(band));
        }
        Ok(())
    }
}

/// Parse reflectance coefficients from an XML sidecar file
pub fn read_reflectance_coefficients(path: &Path) -> Result<BandCoefficients, MetadataError> {
    let reader = Reader::from_file(path)?;
    parse_reflectance_coefficients(reader)
}

/// Parse reflectance coefficients from an in-memory XML document
pub fn parse_reflectance_coefficients_str(xml: &str) -> Result<BandCoefficients, MetadataError> {
    parse_reflectance_coefficients(Reader::from_str(xml))
}

fn parse_reflectance_coefficients<R: BufRead>(
    mut reader: Reader<R>,
) -> Result<BandCoefficients, MetadataError> {
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut curr = String::new();
    let mut in_band_metadata = false;
    let mut band_number: Option<String> = None;
    let mut coefficient: Option<String> = None;
    let mut coeffs = BandCoefficients::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if tag == "bandSpecificMetadata" {
                    in_band_metadata = true;
                    band_number = None;
                    coefficient = None;
                }
                curr = tag;
            }
            Event::End(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if tag == "bandSpecificMetadata" {
                    in_band_metadata = false;
                    if let (Some(bn), Some(value)) = (band_number.take(), coefficient.take()) {
                        // Bands outside 1..4 (e.g. masks) carry no coefficient we use
                        if let Ok(band) = bn.trim().parse::<usize>() {
                            if (1..=BandCoefficients::MAX_BAND).contains(&band) {
                                let parsed = value.trim().parse::<f64>().map_err(|_| {
                                    MetadataError::InvalidCoefficient {
                                        band,
                                        value: value.clone(),
                                    }
                                })?;
                                coeffs.insert(band, parsed)?;
                            }
                        }
                    }
                }
                curr.clear();
            }
            Event::Text(e) if in_band_metadata => {
                let txt = e.unescape()?;
                match curr.as_str() {
                    "bandNumber" => band_number = Some(txt.to_string()),
                    "reflectanceCoefficient" => coefficient = Some(txt.to_string()),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(coeffs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIDECAR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ps:EarthObservation xmlns:ps="http://schemas.planet.com/ps/v1/planet_product_metadata_geocorrected_level">
  <gml:resultOf xmlns:gml="http://www.opengis.net/gml">
    <ps:EarthObservationResult>
      <ps:bandSpecificMetadata>
        <ps:bandNumber>1</ps:bandNumber>
        <ps:radiometricScaleFactor>0.01</ps:radiometricScaleFactor>
        <ps:reflectanceCoefficient>1.93e-05</ps:reflectanceCoefficient>
      </ps:bandSpecificMetadata>
      <ps:bandSpecificMetadata>
        <ps:bandNumber>2</ps:bandNumber>
        <ps:reflectanceCoefficient>2.06e-05</ps:reflectanceCoefficient>
      </ps:bandSpecificMetadata>
      <ps:bandSpecificMetadata>
        <ps:bandNumber>3</ps:bandNumber>
        <ps:reflectanceCoefficient>2.33e-05</ps:reflectanceCoefficient>
      </ps:bandSpecificMetadata>
      <ps:bandSpecificMetadata>
        <ps:bandNumber>4</ps:bandNumber>
        <ps:reflectanceCoefficient>3.52e-05</ps:reflectanceCoefficient>
      </ps:bandSpecificMetadata>
      <ps:bandSpecificMetadata>
        <ps:bandNumber>5</ps:bandNumber>
        <ps:reflectanceCoefficient>9.9</ps:reflectanceCoefficient>
      </ps:bandSpecificMetadata>
    </ps:EarthObservationResult>
  </gml:resultOf>
</ps:EarthObservation>"#;

    #[test]
    fn parses_all_four_bands() {
        let c = parse_reflectance_coefficients_str(SIDECAR).unwrap();
        assert_eq!(c.len(), 4);
        assert_eq!(c.get(3).unwrap(), 2.33e-05);
        assert_eq!(c.get(4).unwrap(), 3.52e-05);
        assert!(matches!(c.get(5), Err(MetadataError::MissingBand(5))));
    }

    #[test]
    fn rejects_bad_decimal() {
        let xml = SIDECAR.replace("2.33e-05", "two");
        let err = parse_reflectance_coefficients_str(&xml).unwrap_err();
        assert!(matches!(err, MetadataError::InvalidCoefficient { band: 3, .. }));
    }

    #[test]
    fn rejects_duplicate_band() {
        let xml = SIDECAR.replace("<ps:bandNumber>2</ps:bandNumber>", "<ps:bandNumber>1</ps:bandNumber>");
        let err = parse_reflectance_coefficients_str(&xml).unwrap_err();
        assert!(matches!(err, MetadataError::DuplicateBand(1)));
    }

    #[test]
    fn truncated_document_never_yields_nir() {
        let truncated = &SIDECAR[..SIDECAR.len() / 2];
        let nir = parse_reflectance_coefficients_str(truncated).and_then(|c| c.get(4));
        assert!(nir.is_err());
    }

    #[test]
    fn mismatched_tags_are_an_error() {
        let xml = SIDECAR.replace("</ps:bandNumber>", "</ps:bandNumbr>");
        assert!(matches!(
            parse_reflectance_coefficients_str(&xml),
            Err(MetadataError::Xml(_))
        ));
    }
}
