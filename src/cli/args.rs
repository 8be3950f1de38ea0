use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use eoprocess::types::{ArchiveFormat, BoundingBox, ColorScheme, ProductKind};

#[derive(Parser)]
#[command(name = "eoprocess", version, about = "EO product processing CLI")]
pub struct CliArgs {
    /// JSON settings file; flags below override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Root directory of the product cache
    #[arg(long, global = true, env = "EOPROCESS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Directory receiving archives, previews and the job log
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Worker threads for per-scene processing
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute NDVI rasters and previews for the scenes of a region
    Ndvi(NdviArgs),
    /// Render RGB quicklooks of Sentinel-2 products
    Rgb(RgbArgs),
    /// Mosaic tiles per acquisition date
    Merge(MergeArgs),
    /// Print the process descriptions as JSON
    Processes,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Bounding box as min_lon,max_lon,min_lat,max_lat
    #[arg(long, default_value = BoundingBox::DEFAULT_INPUT)]
    pub bbox: String,

    /// First day of the search period (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day of the search period (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

#[derive(Args)]
pub struct CatalogArgs {
    /// Local staged catalog (index.json plus <identifier>.zip files)
    #[arg(long, conflicts_with_all = ["dhus_user", "planet_token"])]
    pub catalog_dir: Option<PathBuf>,

    /// Planet API key, used to search and download PlanetScope scenes
    #[arg(long, env = "PL_API_KEY", hide_env_values = true, conflicts_with = "dhus_user")]
    pub planet_token: Option<String>,

    /// Copernicus hub user name
    #[arg(long, env = "DHUS_USER", requires = "dhus_password")]
    pub dhus_user: Option<String>,

    /// Copernicus hub password
    #[arg(long, env = "DHUS_PASSWORD", hide_env_values = true)]
    pub dhus_password: Option<String>,
}

#[derive(Args)]
pub struct NdviArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Earth observation product
    #[arg(long, value_enum, default_value_t = ProductKind::PlanetScope)]
    pub product: ProductKind,

    /// Maximum cloud cover as a fraction
    #[arg(long, default_value_t = 0.5)]
    pub cloud_cover: f64,

    /// Archive format of the results
    #[arg(long, value_enum, default_value_t = ArchiveFormat::Tar)]
    pub archive_format: ArchiveFormat,

    /// Also mosaic the NDVI rasters per acquisition date
    #[arg(long, default_value_t = false)]
    pub merge: bool,

    /// Process these local files instead of querying a catalog
    #[arg(long, num_args = 1.., conflicts_with_all = ["catalog_dir", "dhus_user", "planet_token"])]
    pub tiles: Vec<PathBuf>,
}

#[derive(Args)]
pub struct RgbArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Band combination
    #[arg(long, value_enum, default_value_t = ColorScheme::NaturalColors)]
    pub scheme: ColorScheme,

    /// Maximum cloud cover in percent
    #[arg(long, default_value_t = 30.0)]
    pub cloud_cover: f64,

    /// Long side of the rendered images in pixels
    #[arg(long, default_value_t = 1024)]
    pub max_size: usize,

    /// Archive format of the results
    #[arg(long, value_enum, default_value_t = ArchiveFormat::Tar)]
    pub archive_format: ArchiveFormat,
}

#[derive(Args)]
pub struct MergeArgs {
    /// Tiles named <date>_*.tif
    #[arg(required = true)]
    pub tiles: Vec<PathBuf>,
}
