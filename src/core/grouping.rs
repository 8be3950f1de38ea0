//! Grouping of scene files into per-acquisition bundles.
//!
//! File names are parsed with a fixed grammar per product kind into a
//! [`SceneKey`]; all files sharing a key form one [`TileBundle`]. Names the
//! grammar does not recognise fall back to their stem with known sidecar
//! suffixes removed, so a raster and its `_metadata.xml` still meet.
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::ProductKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GroupingError {
    #[error("File listed twice: {0}")]
    DuplicateFile(PathBuf),
    #[error("File has no usable name: {0}")]
    Unnamed(PathBuf),
    #[error("Scene {key} has no raster")]
    MissingRaster { key: String },
    #[error("Scene {key} has no metadata sidecar")]
    MissingMetadata { key: String },
    #[error("Scene {key} has {count} rasters, expected one")]
    MultipleRasters { key: String, count: usize },
    #[error("Scene {key} has {count} metadata sidecars, expected one")]
    MultipleMetadata { key: String, count: usize },
}

/// Structured identifier of one acquisition
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SceneKey {
    /// Acquisition date `YYYYMMDD`, when the name carries one
    pub date: Option<String>,
    /// Acquisition time `HHMMSS`
    pub time: Option<String>,
    /// Satellite id (PlanetScope) or MGRS tile (Sentinel-2)
    pub source: Option<String>,
    /// Key as written in file names, used for output naming
    pub raw: String,
}

impl fmt::Display for SceneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

static PLANETSCOPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{8})_(\d{6})(?:_\d+)?_([0-9a-f]{4})(?:_|\.|$)")
        .expect("valid PlanetScope name pattern")
});

static SENTINEL2_PRODUCT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^S2[AB]_MSI\w{3}_(\d{8})T(\d{6})_N\d{4}_R\d{3}_T(\w{5})")
        .expect("valid Sentinel-2 product name pattern")
});

static SENTINEL2_GRANULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^T(\w{5})_(\d{8})T(\d{6})").expect("valid Sentinel-2 granule name pattern")
});

/// Suffixes of sidecar files that share their scene's stem
const SIDECAR_SUFFIXES: &[&str] = &["_metadata", "_DN_udm", "_udm2", "_udm"];

impl SceneKey {
    /// Parse the key of a file name for `kind`
    pub fn parse(file_name: &str, kind: ProductKind) -> Self {
        let parsed = match kind {
            ProductKind::PlanetScope => PLANETSCOPE_RE.captures(file_name).map(|c| {
                let whole = c.get(0).map_or("", |m| m.as_str());
                SceneKey {
                    date: Some(c[1].to_string()),
                    time: Some(c[2].to_string()),
                    source: Some(c[3].to_string()),
                    raw: whole.trim_end_matches(['_', '.']).to_string(),
                }
            }),
            ProductKind::Sentinel2 => SENTINEL2_PRODUCT_RE
                .captures(file_name)
                .map(|c| SceneKey {
                    date: Some(c[1].to_string()),
                    time: Some(c[2].to_string()),
                    source: Some(c[3].to_string()),
                    raw: format!("{}T{}_T{}", &c[1], &c[2], &c[3]),
                })
                .or_else(|| {
                    SENTINEL2_GRANULE_RE
                        .captures(file_name)
                        .map(|c| SceneKey {
                            date: Some(c[2].to_string()),
                            time: Some(c[3].to_string()),
                            source: Some(c[1].to_string()),
                            raw: format!("{}T{}_T{}", &c[2], &c[3], &c[1]),
                        })
                }),
        };
        parsed.unwrap_or_else(|| Self::from_stem(file_name))
    }

    fn from_stem(file_name: &str) -> Self {
        let mut stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| file_name.to_string());
        for suffix in SIDECAR_SUFFIXES {
            if let Some(s) = stem.strip_suffix(suffix) {
                stem = s.to_string();
                break;
            }
        }
        let date = stem
            .split('_')
            .next()
            .filter(|t| t.len() == 8 && t.bytes().all(|b| b.is_ascii_digit()))
            .map(str::to_string);
        SceneKey {
            date,
            time: None,
            source: None,
            raw: stem,
        }
    }
}

/// Role a member file plays in its bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Raster,
    Metadata,
    Other,
}

pub fn member_role(path: &Path) -> MemberRole {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if name.contains("_udm") {
        return MemberRole::Other;
    }
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("tif" | "tiff" | "jp2") => MemberRole::Raster,
        Some("xml") => MemberRole::Metadata,
        _ => MemberRole::Other,
    }
}

/// All files of one acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct TileBundle {
    pub key: SceneKey,
    pub rasters: Vec<PathBuf>,
    pub metadata: Vec<PathBuf>,
    pub other: Vec<PathBuf>,
}

impl TileBundle {
    fn new(key: SceneKey) -> Self {
        Self {
            key,
            rasters: Vec::new(),
            metadata: Vec::new(),
            other: Vec::new(),
        }
    }

    fn push(&mut self, path: PathBuf) {
        match member_role(&path) {
            MemberRole::Raster => self.rasters.push(path),
            MemberRole::Metadata => self.metadata.push(path),
            MemberRole::Other => self.other.push(path),
        }
    }

    pub fn len(&self) -> usize {
        self.rasters.len() + self.metadata.len() + self.other.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The single raster and metadata sidecar used for index computation
    pub fn validate(&self) -> Result<(&Path, &Path), GroupingError> {
        let key = self.key.raw.clone();
        let raster = match self.rasters.as_slice() {
            [r] => r,
            [] => return Err(GroupingError::MissingRaster { key }),
            many => {
                return Err(GroupingError::MultipleRasters {
                    key,
                    count: many.len(),
                });
            }
        };
        let metadata = match self.metadata.as_slice() {
            [m] => m,
            [] => return Err(GroupingError::MissingMetadata { key }),
            many => {
                return Err(GroupingError::MultipleMetadata {
                    key,
                    count: many.len(),
                });
            }
        };
        Ok((raster, metadata))
    }
}

/// Bundles keyed by scene, iterated in key order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileGroups {
    bundles: BTreeMap<SceneKey, TileBundle>,
}

impl TileGroups {
    /// Group `files` by scene key.
    ///
    /// Every file lands in exactly one bundle; a path given twice is an error.
    pub fn from_files(files: &[PathBuf], kind: ProductKind) -> Result<Self, GroupingError> {
        let mut seen = HashSet::new();
        let mut bundles: BTreeMap<SceneKey, TileBundle> = BTreeMap::new();
        for file in files {
            if !seen.insert(file.as_path()) {
                return Err(GroupingError::DuplicateFile(file.clone()));
            }
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| GroupingError::Unnamed(file.clone()))?;
            let key = SceneKey::parse(&name, kind);
            bundles
                .entry(key.clone())
                .or_insert_with(|| TileBundle::new(key))
                .push(file.clone());
        }
        Ok(Self { bundles })
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    pub fn get(&self, key: &SceneKey) -> Option<&TileBundle> {
        self.bundles.get(key)
    }

    pub fn bundles(&self) -> impl Iterator<Item = &TileBundle> {
        self.bundles.values()
    }

    pub fn into_bundles(self) -> Vec<TileBundle> {
        self.bundles.into_values().collect()
    }

    /// Total number of member files over all bundles
    pub fn file_count(&self) -> usize {
        self.bundles.values().map(TileBundle::len).sum()
    }
}

/// Group files under each file's stem by substring containment.
///
/// A file joins every key that occurs anywhere in its path, so a stem that is
/// a substring of another stem collects that other scene's files too. Use
/// [`TileGroups::from_files`] unless this exact behavior is required.
pub fn group_by_stem(files: &[PathBuf]) -> BTreeMap<String, Vec<PathBuf>> {
    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        if let Some(stem) = file.file_stem() {
            groups.entry(stem.to_string_lossy().to_string()).or_default();
        }
    }
    for (key, members) in groups.iter_mut() {
        members.extend(
            files
                .iter()
                .filter(|f| f.to_string_lossy().contains(key.as_str()))
                .cloned(),
        );
    }
    groups
}
