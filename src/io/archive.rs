//! Archive packaging and unpacking.
//!
//! Results are delivered as one tar or zip archive per output kind. Product
//! zips are unpacked into the cache; an entry whose path would escape the
//! destination directory fails the extraction.
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::FileOptions;

use crate::types::ArchiveFormat;

/// Errors encountered when creating or extracting archives
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("File to archive does not exist: {0}")]
    MissingFile(PathBuf),
    #[error("Two inputs share the archive entry name {0:?}")]
    DuplicateEntry(String),
    #[error("Archive entry {0:?} would escape the destination directory")]
    UnsafeEntry(String),
}

fn entry_name(path: &Path) -> Result<String, ArchiveError> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ArchiveError::MissingFile(path.to_path_buf()))
}

/// Bundle `files` into `<dest_dir>/<name>.<tar|zip>`.
///
/// Entries are stored flat under their file names, in input order.
pub fn archive(
    files: &[PathBuf],
    format: ArchiveFormat,
    dest_dir: &Path,
    name: &str,
) -> Result<PathBuf, ArchiveError> {
    fs::create_dir_all(dest_dir)?;
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(files.len());
    for file in files {
        if !file.is_file() {
            return Err(ArchiveError::MissingFile(file.clone()));
        }
        let entry = entry_name(file)?;
        if !seen.insert(entry.clone()) {
            return Err(ArchiveError::DuplicateEntry(entry));
        }
        entries.push((file.as_path(), entry));
    }

    let output = dest_dir.join(format!("{}.{}", name, format.extension()));
    let writer = BufWriter::new(File::create(&output)?);
    match format {
        ArchiveFormat::Tar => {
            let mut builder = tar::Builder::new(writer);
            for (path, entry) in &entries {
                builder.append_path_with_name(path, entry)?;
            }
            builder.into_inner()?.flush()?;
        }
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipWriter::new(writer);
            let options =
                FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            for (path, entry) in &entries {
                zip.start_file(entry.as_str(), options)?;
                let mut src = File::open(path)?;
                io::copy(&mut src, &mut zip)?;
            }
            zip.finish()?.flush()?;
        }
    }
    Ok(output)
}

/// Extract a zip archive into `dest_dir`, returning the extracted file paths.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let file = File::open(archive_path)?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))?;
    let mut extracted = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(ArchiveError::UnsafeEntry(entry.name().to_string()));
        };
        let target = dest_dir.join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&target)?);
        io::copy(&mut entry, &mut out)?;
        out.flush()?;
        extracted.push(target);
    }
    Ok(extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn touch(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body).unwrap();
        path
    }

    fn tar_names(path: &Path) -> Vec<String> {
        let mut tar = tar::Archive::new(File::open(path).unwrap());
        tar.entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn tar_keeps_input_order_and_flat_names() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("nested");
        fs::create_dir_all(&sub).unwrap();
        let b = touch(&sub, "b.tif", b"bb");
        let a = touch(tmp.path(), "a.tif", b"a");
        let out = archive(&[b, a], ArchiveFormat::Tar, tmp.path(), "rasters").unwrap();
        assert_eq!(out.file_name().unwrap(), "rasters.tar");
        assert_eq!(tar_names(&out), vec!["b.tif", "a.tif"]);
    }

    #[test]
    fn zip_roundtrips_through_extract_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let a = touch(tmp.path(), "a.png", b"png-bytes");
        let out = archive(&[a], ArchiveFormat::Zip, tmp.path(), "plots").unwrap();
        let dest = tmp.path().join("out");
        let files = extract_zip(&out, &dest).unwrap();
        assert_eq!(files, vec![dest.join("a.png")]);
        assert_eq!(fs::read(dest.join("a.png")).unwrap(), b"png-bytes");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("nested");
        fs::create_dir_all(&sub).unwrap();
        let a1 = touch(tmp.path(), "a.tif", b"1");
        let a2 = touch(&sub, "a.tif", b"2");
        let err = archive(&[a1, a2], ArchiveFormat::Tar, tmp.path(), "x").unwrap_err();
        assert!(matches!(err, ArchiveError::DuplicateEntry(_)));
    }

    #[test]
    fn empty_archive_is_allowed() {
        let tmp = tempfile::tempdir().unwrap();
        let out = archive(&[], ArchiveFormat::Tar, tmp.path(), "empty").unwrap();
        assert!(tar_names(&out).is_empty());
    }

    #[test]
    fn zip_entries_escaping_the_destination_are_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("evil.zip");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("../escape.txt", FileOptions::default()).unwrap();
        zip.write_all(b"x").unwrap();
        zip.finish().unwrap();

        let dest = tmp.path().join("out");
        assert!(matches!(
            extract_zip(&path, &dest),
            Err(ArchiveError::UnsafeEntry(_))
        ));
        assert!(!tmp.path().join("escape.txt").exists());
    }
}
