//! Index archive pack/unpack helpers.
//!
//! An index archive is a gzip-compressed tar of the index directory. Entry
//! names are relative and `/`-separated; entries are written in sorted order
//! so the same directory always packs to the same entry sequence.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use walkdir::WalkDir;

use crate::error::{io_err, SyncError};

/// Pack the contents of `src` into a gzip'd tar at `target`.
///
/// The archive is written to a `.tmp` sibling and renamed into place.
pub fn pack_dir(src: &Path, target: &Path) -> Result<(), SyncError> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = target.with_extension("tmp");
    let file = File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(BufWriter::new(file), Compression::default()));
    builder.follow_symlinks(false);

    let mut count = 0usize;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            io_err(path, e.into())
        })?;
        let name = entry_name(src, entry.path());
        if entry.file_type().is_dir() {
            builder
                .append_dir(&name, entry.path())
                .map_err(|e| io_err(entry.path(), e))?;
        } else if entry.file_type().is_file() {
            builder
                .append_path_with_name(entry.path(), &name)
                .map_err(|e| io_err(entry.path(), e))?;
            count += 1;
        }
    }

    let encoder = builder.into_inner().map_err(|e| io_err(&tmp, e))?;
    let mut writer = encoder.finish().map_err(|e| io_err(&tmp, e))?;
    std::io::Write::flush(&mut writer).map_err(|e| io_err(&tmp, e))?;
    drop(writer);

    if let Err(e) = std::fs::rename(&tmp, target) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(target, e));
    }
    tracing::debug!(archive = %target.display(), entries = count, "packed index archive");
    Ok(())
}

/// Extract `archive` into `dest`, creating `dest` if needed.
pub fn unpack(archive: &Path, dest: &Path) -> Result<(), SyncError> {
    std::fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
    let file = File::open(archive).map_err(|e| io_err(archive, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    tar.unpack(dest).map_err(|e| io_err(archive, e))?;
    Ok(())
}

/// Read every regular-file entry of `archive` into memory, keyed by its
/// relative `/`-separated entry name.
pub fn read_entries(archive: &Path) -> Result<HashMap<String, Vec<u8>>, SyncError> {
    let file = File::open(archive).map_err(|e| io_err(archive, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut entries = HashMap::new();
    for entry in tar.entries().map_err(|e| io_err(archive, e))? {
        let mut entry = entry.map_err(|e| io_err(archive, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = {
            let path = entry.path().map_err(|e| io_err(archive, e))?;
            normalize_entry_name(&path.to_string_lossy())
        };
        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e| io_err(archive, e))?;
        entries.insert(name, contents);
    }
    Ok(entries)
}

fn entry_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize_entry_name(name: &str) -> String {
    name.replace('\\', "/")
        .trim_start_matches("./")
        .trim_start_matches('/')
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn populate(dir: &Path) {
        std::fs::create_dir_all(dir.join("com/widget")).unwrap();
        std::fs::write(dir.join("com/widget/1.txt"), "widget-1.pom\nwidget-1.jar\n").unwrap();
        std::fs::write(dir.join("top.txt"), "x").unwrap();
    }

    #[test]
    fn pack_then_unpack_reproduces_tree() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        populate(src.path());

        let archive = out.path().join("nested/index.tar.gz");
        pack_dir(src.path(), &archive).unwrap();
        assert!(archive.is_file());
        assert!(!archive.with_extension("tmp").exists());

        let dest = out.path().join("extracted");
        unpack(&archive, &dest).unwrap();
        assert_eq!(
            std::fs::read_to_string(dest.join("com/widget/1.txt")).unwrap(),
            "widget-1.pom\nwidget-1.jar\n"
        );
        assert_eq!(std::fs::read_to_string(dest.join("top.txt")).unwrap(), "x");
    }

    #[test]
    fn read_entries_keys_by_relative_name() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        populate(src.path());
        let archive = out.path().join("index.tar.gz");
        pack_dir(src.path(), &archive).unwrap();

        let entries = read_entries(&archive).unwrap();
        let mut names: Vec<&str> = entries.keys().map(String::as_str).collect();
        names.sort();
        assert_eq!(names, ["com/widget/1.txt", "top.txt"]);
        assert_eq!(entries["top.txt"], b"x");
    }

    #[test]
    fn empty_directory_packs_to_readable_archive() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let archive = out.path().join("empty.tar.gz");
        pack_dir(src.path(), &archive).unwrap();
        assert!(read_entries(&archive).unwrap().is_empty());
    }

    #[test]
    fn unreadable_archive_is_an_io_error() {
        let out = TempDir::new().unwrap();
        let bogus = out.path().join("bogus.tar.gz");
        std::fs::write(&bogus, b"not gzip at all").unwrap();
        assert!(matches!(read_entries(&bogus), Err(SyncError::Io { .. })));
    }

    #[test]
    fn normalizes_leading_dot_slash() {
        assert_eq!(normalize_entry_name("./com/a.txt"), "com/a.txt");
        assert_eq!(normalize_entry_name("/com/a.txt"), "com/a.txt");
    }
}
