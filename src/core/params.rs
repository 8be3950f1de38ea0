use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::io::catalog::{DhusCatalog, PlanetCatalog};

/// Runtime settings, loadable from a JSON file and overridden by CLI flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the product cache
    pub cache_root: PathBuf,
    /// Directory receiving job outputs
    pub output_dir: PathBuf,
    /// Worker threads for per-scene processing
    pub workers: usize,
    /// Base URL of the DHuS endpoint
    pub dhus_url: String,
    /// Base URL of the Planet Data API
    pub planet_url: String,
    /// HTTP timeout for catalog requests
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_root: dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("eoprocess"),
            output_dir: PathBuf::from("."),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            dhus_url: DhusCatalog::DEFAULT_URL.to_string(),
            planet_url: PlanetCatalog::DEFAULT_URL.to_string(),
            request_timeout_secs: 600,
        }
    }
}

impl Settings {
    /// Read settings from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&raw).map_err(|e| Error::InvalidArgument {
            arg: "config",
            value: format!("{}: {}", path.display(), e),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidArgument {
                arg: "workers",
                value: "0".to_string(),
            });
        }
        if self.dhus_url.trim().is_empty() {
            return Err(Error::InvalidArgument {
                arg: "dhus_url",
                value: self.dhus_url.clone(),
            });
        }
        if self.planet_url.trim().is_empty() {
            return Err(Error::InvalidArgument {
                arg: "planet_url",
                value: self.planet_url.clone(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidArgument {
                arg: "request_timeout_secs",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}
