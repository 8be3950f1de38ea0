//! On-disk product cache.
//!
//! Layout under the cache root:
//! `<root>/<catalog>/<identifier>.zip` for the downloaded archive and
//! `<root>/<catalog>/<filename>/` for its extracted product. Downloads land
//! in a temporary file and extractions in a temporary directory; both are
//! renamed into place, so a final path either holds complete data or does
//! not exist.
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::core::context::JobContext;
use crate::io::archive::{ArchiveError, extract_zip};
use crate::io::catalog::{Catalog, CatalogError, ProductDescriptor};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Download failed: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Extraction failed: {0}")]
    Archive(#[from] ArchiveError),
    #[error("Unsafe path component from catalog: {0:?}")]
    UnsafeName(String),
    #[error("Checksum mismatch for {identifier}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        identifier: String,
        expected: String,
        actual: String,
    },
}

/// Where a cached product came from on this call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOrigin {
    /// Extracted directory already present
    CacheHit,
    /// Archive was present and has been extracted
    Extracted,
    /// Archive was downloaded and extracted
    Downloaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedProduct {
    pub path: PathBuf,
    pub origin: CacheOrigin,
}

/// Reject catalog strings that are not a single plain path component
pub fn safe_component(name: &str) -> Result<&str, CacheError> {
    let unsafe_name = || CacheError::UnsafeName(name.to_string());
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.contains("..")
    {
        return Err(unsafe_name());
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name),
        _ => Err(unsafe_name()),
    }
}

/// Lower-case hex MD5 of a file
pub fn md5_file(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut context = md5::Context::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

pub struct ProductCache {
    root: PathBuf,
}

impl ProductCache {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive and extracted-directory paths for a product
    pub fn paths(
        &self,
        catalog: &dyn Catalog,
        product: &ProductDescriptor,
    ) -> Result<(PathBuf, PathBuf), CacheError> {
        let dir = self.root.join(safe_component(catalog.name())?);
        let archive = dir.join(format!("{}.zip", safe_component(&product.identifier)?));
        let extracted = dir.join(safe_component(&product.filename)?);
        Ok((archive, extracted))
    }

    /// Ensure a local extracted copy of `product` exists and return its path.
    ///
    /// Any failure is returned to the caller; nothing is retried except a
    /// single re-download of a pre-existing archive that fails its checksum.
    pub fn fetch(
        &self,
        catalog: &dyn Catalog,
        product: &ProductDescriptor,
        ctx: &JobContext,
    ) -> Result<CachedProduct, CacheError> {
        let (archive, extracted) = self.paths(catalog, product)?;
        if extracted.is_dir() {
            ctx.debug(format!("cache hit for {}", product.identifier));
            return Ok(CachedProduct {
                path: extracted,
                origin: CacheOrigin::CacheHit,
            });
        }
        let dir = archive.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let expected = catalog.checksum(product, ctx);
        let mut origin = CacheOrigin::Extracted;
        if archive.is_file() && !self.checksum_ok(expected.as_deref(), &archive, ctx)? {
            ctx.warn(format!(
                "cached archive of {} is corrupt, downloading again",
                product.identifier
            ));
            fs::remove_file(&archive)?;
        }
        if !archive.is_file() {
            self.download(catalog, product, expected.as_deref(), &archive, ctx)?;
            origin = CacheOrigin::Downloaded;
        }

        self.extract(&archive, &extracted, &product.filename, ctx)?;
        Ok(CachedProduct {
            path: extracted,
            origin,
        })
    }

    /// Fetch every product in order, stopping at the first failure
    pub fn fetch_all(
        &self,
        catalog: &dyn Catalog,
        products: &[ProductDescriptor],
        ctx: &JobContext,
    ) -> Result<Vec<CachedProduct>, CacheError> {
        products
            .iter()
            .map(|p| {
                self.fetch(catalog, p, ctx).inspect_err(|e| {
                    ctx.error(format!("failed to fetch {}: {}", p.identifier, e))
                })
            })
            .collect()
    }

    fn checksum_ok(
        &self,
        expected: Option<&str>,
        archive: &Path,
        ctx: &JobContext,
    ) -> Result<bool, CacheError> {
        let Some(expected) = expected else {
            return Ok(true);
        };
        let actual = md5_file(archive)?;
        let ok = actual.eq_ignore_ascii_case(expected);
        if !ok {
            ctx.debug(format!(
                "md5 of {} is {}, catalog says {}",
                archive.display(),
                actual,
                expected
            ));
        }
        Ok(ok)
    }

    fn download(
        &self,
        catalog: &dyn Catalog,
        product: &ProductDescriptor,
        expected: Option<&str>,
        archive: &Path,
        ctx: &JobContext,
    ) -> Result<(), CacheError> {
        let dir = archive.parent().unwrap_or(&self.root);
        let partial = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(dir)?;
        ctx.info(format!(
            "downloading {} ({}) from {}",
            product.identifier,
            product.size,
            catalog.name()
        ));
        catalog.download(product, partial.path(), ctx)?;

        if let Some(expected) = expected {
            let actual = md5_file(partial.path())?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(CacheError::ChecksumMismatch {
                    identifier: product.identifier.clone(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }
        partial.persist(archive).map_err(|e| e.error)?;
        Ok(())
    }

    fn extract(
        &self,
        archive: &Path,
        extracted: &Path,
        filename: &str,
        ctx: &JobContext,
    ) -> Result<(), CacheError> {
        let dir = extracted.parent().unwrap_or(&self.root);
        let staging = tempfile::Builder::new()
            .prefix(".extract-")
            .tempdir_in(dir)?;
        ctx.info(format!("extracting {}", archive.display()));
        extract_zip(archive, staging.path())?;

        // Archives normally wrap the product in a top-level `<filename>/`
        let inner = staging.path().join(filename);
        let source = if inner.is_dir() {
            inner
        } else {
            staging.path().to_path_buf()
        };
        if let Err(e) = fs::rename(&source, extracted) {
            if extracted.is_dir() {
                ctx.debug(format!(
                    "{} was extracted concurrently, keeping existing copy",
                    extracted.display()
                ));
            } else {
                return Err(e.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use zip::write::FileOptions;

    use crate::io::catalog::CatalogQuery;

    struct CountingCatalog {
        payload: Vec<u8>,
        downloads: AtomicUsize,
        fetched: Mutex<Vec<String>>,
        fail: bool,
        fail_on: Option<String>,
    }

    impl CountingCatalog {
        fn new(filename: &str) -> Self {
            let mut cursor = std::io::Cursor::new(Vec::new());
            {
                let mut zip = zip::ZipWriter::new(&mut cursor);
                zip.start_file(format!("{}/MTD.xml", filename), FileOptions::default())
                    .unwrap();
                zip.write_all(b"<xml/>").unwrap();
                zip.finish().unwrap();
            }
            Self {
                payload: cursor.into_inner(),
                downloads: AtomicUsize::new(0),
                fetched: Mutex::new(Vec::new()),
                fail: false,
                fail_on: None,
            }
        }
    }

    impl Catalog for CountingCatalog {
        fn name(&self) -> &str {
            "fake"
        }

        fn query(
            &self,
            _: &CatalogQuery,
            _: &JobContext,
        ) -> Result<Vec<ProductDescriptor>, CatalogError> {
            Ok(Vec::new())
        }

        fn download(
            &self,
            p: &ProductDescriptor,
            dest: &Path,
            _: &JobContext,
        ) -> Result<(), CatalogError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            self.fetched.lock().unwrap().push(p.identifier.clone());
            if self.fail || self.fail_on.as_deref() == Some(p.identifier.as_str()) {
                fs::write(dest, b"partial")?;
                return Err(CatalogError::NotFound(p.identifier.clone()));
            }
            fs::write(dest, &self.payload)?;
            Ok(())
        }
    }

    fn product(identifier: &str, filename: &str) -> ProductDescriptor {
        ProductDescriptor {
            id: "uuid".into(),
            identifier: identifier.into(),
            filename: filename.into(),
            size: "1 MB".into(),
            acquired: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            product_type: "S2MSI1C".into(),
            platform: None,
            cloud_cover: None,
            checksum: None,
        }
    }

    #[test]
    fn second_fetch_is_a_cache_hit() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = JobContext::new("test", tmp.path());
        let cache = ProductCache::new(tmp.path().join("cache"));
        let catalog = CountingCatalog::new("P1.SAFE");
        let p = product("P1", "P1.SAFE");

        let first = cache.fetch(&catalog, &p, &ctx).unwrap();
        assert_eq!(first.origin, CacheOrigin::Downloaded);
        assert!(first.path.join("MTD.xml").is_file());

        let second = cache.fetch(&catalog, &p, &ctx).unwrap();
        assert_eq!(second.origin, CacheOrigin::CacheHit);
        assert_eq!(second.path, first.path);
        assert_eq!(catalog.downloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn existing_archive_is_extracted_without_download() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = JobContext::new("test", tmp.path());
        let cache = ProductCache::new(tmp.path());
        let catalog = CountingCatalog::new("P2.SAFE");
        let p = product("P2", "P2.SAFE");
        let (archive, extracted) = cache.paths(&catalog, &p).unwrap();
        fs::create_dir_all(archive.parent().unwrap()).unwrap();
        fs::write(&archive, &catalog.payload).unwrap();

        let got = cache.fetch(&catalog, &p, &ctx).unwrap();
        assert_eq!(got.origin, CacheOrigin::Extracted);
        assert_eq!(got.path, extracted);
        assert_eq!(catalog.downloads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_download_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = JobContext::new("test", tmp.path());
        let cache = ProductCache::new(tmp.path());
        let mut catalog = CountingCatalog::new("P3.SAFE");
        catalog.fail = true;
        let p = product("P3", "P3.SAFE");
        assert!(matches!(
            cache.fetch(&catalog, &p, &ctx),
            Err(CacheError::Catalog(_))
        ));
        let leftovers: Vec<_> = fs::read_dir(tmp.path().join("fake")).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn checksum_mismatch_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = JobContext::new("test", tmp.path());
        let cache = ProductCache::new(tmp.path());
        let catalog = CountingCatalog::new("P4.SAFE");
        let mut p = product("P4", "P4.SAFE");
        p.checksum = Some("00000000000000000000000000000000".into());
        assert!(matches!(
            cache.fetch(&catalog, &p, &ctx),
            Err(CacheError::ChecksumMismatch { .. })
        ));

        p.checksum = Some(format!("{:X}", md5::compute(&catalog.payload)));
        let got = cache.fetch(&catalog, &p, &ctx).unwrap();
        assert_eq!(got.origin, CacheOrigin::Downloaded);
    }

    #[test]
    fn unsafe_names_are_rejected() {
        for bad in ["", "..", "../etc", "a/b", "a\\b", ".hidden", "x..y"] {
            assert!(safe_component(bad).is_err(), "{bad:?} accepted");
        }
        assert!(safe_component("S2A_MSIL1C_20200101T000000.SAFE").is_ok());

        let tmp = tempfile::tempdir().unwrap();
        let ctx = JobContext::new("test", tmp.path());
        let cache = ProductCache::new(tmp.path());
        let catalog = CountingCatalog::new("x");
        let p = product("../../escape", "x");
        assert!(matches!(
            cache.fetch(&catalog, &p, &ctx),
            Err(CacheError::UnsafeName(_))
        ));
        assert_eq!(catalog.downloads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fetch_all_stops_at_first_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = JobContext::new("test", tmp.path());
        let cache = ProductCache::new(tmp.path().join("cache"));
        let mut catalog = CountingCatalog::new("A.SAFE");
        catalog.fail_on = Some("B".into());
        let products = [
            product("A", "A.SAFE"),
            product("B", "B.SAFE"),
            product("C", "C.SAFE"),
        ];

        let err = cache.fetch_all(&catalog, &products, &ctx).unwrap_err();
        assert!(matches!(err, CacheError::Catalog(CatalogError::NotFound(ref id)) if id == "B"));
        assert_eq!(*catalog.fetched.lock().unwrap(), vec!["A", "B"]);

        let (_, a) = cache.paths(&catalog, &products[0]).unwrap();
        let (c_archive, c) = cache.paths(&catalog, &products[2]).unwrap();
        assert!(a.is_dir());
        assert!(!c.exists());
        assert!(!c_archive.exists());
        assert!(ctx.log().entries().iter().any(|e| e.message.contains("failed to fetch B")));
    }
}
