//! Self-descriptions of the jobs, as advertised to process clients.
use clap::ValueEnum;
use serde::Serialize;

use super::{NDVI_PROCESS, RGB_PROCESS};
use crate::types::{BoundingBox, ColorScheme};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IoDescription {
    pub identifier: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    pub min_occurs: u32,
    pub max_occurs: u32,
}

impl IoDescription {
    fn new(identifier: &str, title: &str, data_type: &str, abstract_text: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            title: title.to_string(),
            abstract_text: abstract_text.to_string(),
            data_type: data_type.to_string(),
            default: None,
            allowed_values: Vec::new(),
            min_occurs: 1,
            max_occurs: 1,
        }
    }

    fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    fn allowed(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    fn optional(mut self) -> Self {
        self.min_occurs = 0;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessDescription {
    pub identifier: String,
    pub title: String,
    pub version: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub inputs: Vec<IoDescription>,
    pub outputs: Vec<IoDescription>,
}

fn bbox_input() -> IoDescription {
    IoDescription::new(
        "BBox",
        "Bounding Box",
        "string",
        "Enter a bbox: min_lon, max_lon, min_lat, max_lat. \
         min_lat and max_lat may be given in either order.",
    )
    .default_value(BoundingBox::DEFAULT_INPUT)
}

fn period_inputs() -> [IoDescription; 2] {
    [
        IoDescription::new(
            "start",
            "Start Date",
            "date",
            "First day of the period to be searched for EO data \
             (if not set, 30 days before end of period).",
        )
        .optional(),
        IoDescription::new(
            "end",
            "End Date",
            "date",
            "Last day of the period to be searched for EO data (if not set, today).",
        )
        .optional(),
    ]
}

fn archive_format_input() -> IoDescription {
    IoDescription::new(
        "archive_format",
        "Archive format",
        "string",
        "Result files will be compressed into archives. Choose an appropriate format.",
    )
    .default_value("tar")
    .allowed(&["tar", "zip"])
}

fn log_output() -> IoDescription {
    IoDescription::new(
        "output_log",
        "Logging information",
        "text/plain",
        "Collected logs during process run.",
    )
}

fn ndvi_process() -> ProcessDescription {
    let [start, end] = period_inputs();
    ProcessDescription {
        identifier: NDVI_PROCESS.to_string(),
        title: "NDVI based on Earth Observation Data".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        abstract_text: "Normalized Difference Vegetation Index (NDVI) of the scenes \
                        found for a bounding box and period."
            .to_string(),
        inputs: vec![
            IoDescription::new(
                "products",
                "Earth Observation Product",
                "string",
                "Choose Earth Observation Products",
            )
            .default_value("PlanetScope")
            .allowed(&["PlanetScope"]),
            bbox_input(),
            start,
            end,
            archive_format_input(),
            IoDescription::new(
                "token",
                "Planet API key",
                "string",
                "Authentication token generated by Planet Earth Observation Explorer. \
                 Without it only a local catalog can be searched.",
            )
            .optional(),
        ],
        outputs: vec![
            IoDescription::new(
                "ndvi_archive",
                "geotif files",
                "application/x-tar",
                "Archive containing one NDVI GeoTIFF per scene",
            ),
            IoDescription::new(
                "plot_archive",
                "png files",
                "application/x-tar",
                "Archive containing one NDVI preview per scene",
            ),
            IoDescription::new(
                "ndviexample",
                "Example graphic",
                "image/png",
                "NDVI preview of the first scene",
            ),
            log_output(),
        ],
    }
}

fn rgb_process() -> ProcessDescription {
    let [start, end] = period_inputs();
    let schemes: Vec<String> = ColorScheme::value_variants()
        .iter()
        .map(ColorScheme::to_string)
        .collect();
    let scheme_refs: Vec<&str> = schemes.iter().map(String::as_str).collect();
    ProcessDescription {
        identifier: RGB_PROCESS.to_string(),
        title: "RGB compositions of Sentinel-2 products".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        abstract_text: "Based on a search query the matching products are plotted as RGB graphics"
            .to_string(),
        inputs: vec![
            IoDescription::new(
                "colorscheems",
                "Color Scheme",
                "string",
                "Combination of bands being used to produce a RGB image",
            )
            .default_value("naturalcolors")
            .allowed(&scheme_refs),
            bbox_input(),
            start,
            end,
            IoDescription::new(
                "cloud_cover",
                "Cloud Cover",
                "integer",
                "Max tolerated percentage of cloud cover",
            )
            .default_value("30"),
            IoDescription::new(
                "username",
                "User Name",
                "string",
                "Authentication user name for the Copernicus hub",
            ),
            IoDescription::new(
                "password",
                "Password",
                "string",
                "Authentication password for the Copernicus hub",
            ),
        ],
        outputs: vec![
            IoDescription::new(
                "output_plot",
                "RGB files",
                "image/png",
                "Plots in RGB colors",
            ),
            IoDescription::new(
                "output_archive",
                "Tar archive",
                "application/x-tar",
                "Tar archive of the image files",
            ),
            log_output(),
        ],
    }
}

/// Descriptions of every process this crate implements
pub fn processes() -> Vec<ProcessDescription> {
    vec![ndvi_process(), rgb_process()]
}
