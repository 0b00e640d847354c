//! Auditor pack: deterministic ZIP packing of a bundle directory.
//!
//! Entries are stored uncompressed in sorted path order with a fixed
//! timestamp, so two packs of byte-identical trees are byte-identical
//! archives.

use crate::error::{Error, Result};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Pack a directory into a ZIP at `zip_path`.
pub fn pack_dir(dir: &Path, zip_path: &Path) -> Result<()> {
    let mut rel_paths: Vec<String> = vec![];
    collect_files(dir, Path::new(""), &mut rel_paths)?;
    rel_paths.sort();

    let file = fs::File::create(zip_path)
        .map_err(|e| Error::Io(format!("Failed to create {}: {}", zip_path.display(), e)))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(zip::DateTime::default());

    for rel in &rel_paths {
        let bytes = fs::read(dir.join(rel))
            .map_err(|e| Error::Io(format!("Failed to read {}: {}", rel, e)))?;
        writer
            .start_file(rel.as_str(), options)
            .map_err(|e| Error::Io(format!("Failed to add {}: {}", rel, e)))?;
        writer
            .write_all(&bytes)
            .map_err(|e| Error::Io(format!("Failed to write {}: {}", rel, e)))?;
    }
    writer
        .finish()
        .map_err(|e| Error::Io(format!("Failed to finish zip: {}", e)))?;
    Ok(())
}

/// Extract a ZIP into `out_dir`. Entry names are confined to the output
/// directory; anything escaping it fails the extraction.
pub fn unpack_zip(zip_path: &Path, out_dir: &Path) -> Result<()> {
    let file = fs::File::open(zip_path)
        .map_err(|e| Error::Io(format!("Failed to open {}: {}", zip_path.display(), e)))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| Error::InvalidBundle(format!("not a zip archive: {}", e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::InvalidBundle(format!("bad zip entry: {}", e)))?;
        let rel: PathBuf = match entry.enclosed_name() {
            Some(p) => p.to_path_buf(),
            None => {
                return Err(Error::InvalidBundle(format!(
                    "zip entry escapes the archive root: {:?}",
                    entry.name()
                )))
            }
        };
        let dest = out_dir.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&dest)
                .map_err(|e| Error::Io(format!("Failed to create {}: {}", dest.display(), e)))?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| Error::Io(format!("Failed to read zip entry: {}", e)))?;
        fs::write(&dest, bytes)
            .map_err(|e| Error::Io(format!("Failed to write {}: {}", dest.display(), e)))?;
    }
    Ok(())
}

fn collect_files(root: &Path, rel: &Path, out: &mut Vec<String>) -> Result<()> {
    let dir = root.join(rel);
    let entries = fs::read_dir(&dir)
        .map_err(|e| Error::Io(format!("Failed to read {}: {}", dir.display(), e)))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::Io(e.to_string()))?;
        let name = entry.file_name();
        let child = rel.join(&name);
        if entry
            .file_type()
            .map_err(|e| Error::Io(e.to_string()))?
            .is_dir()
        {
            collect_files(root, &child, out)?;
        } else {
            // zip entry names always use forward slashes
            out.push(
                child
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(dir: &Path) {
        fs::create_dir_all(dir.join("derived")).unwrap();
        fs::write(dir.join("MANIFEST.json"), b"{}").unwrap();
        fs::write(dir.join("derived/judgment.json"), b"{\"a\":1}").unwrap();
    }

    #[test]
    fn test_pack_unpack_round_trip() {
        let src = tempfile::tempdir().unwrap();
        populate(src.path());
        let zip = src.path().join("pack.zip");
        pack_dir(src.path(), &zip).unwrap();

        let dst = tempfile::tempdir().unwrap();
        unpack_zip(&zip, dst.path()).unwrap();
        assert_eq!(fs::read(dst.path().join("MANIFEST.json")).unwrap(), b"{}");
        assert_eq!(
            fs::read(dst.path().join("derived/judgment.json")).unwrap(),
            b"{\"a\":1}"
        );
    }

    #[test]
    fn test_pack_is_deterministic() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        populate(a.path());
        populate(b.path());
        let zip_a = a.path().join("a.zip");
        let zip_b = b.path().join("b.zip");
        pack_dir(a.path(), &zip_a).unwrap();
        pack_dir(b.path(), &zip_b).unwrap();
        assert_eq!(fs::read(&zip_a).unwrap(), fs::read(&zip_b).unwrap());
    }
}
