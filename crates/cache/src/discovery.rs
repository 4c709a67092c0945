//! Locating the data file and record files of a cache directory.

use index::RESERVED_INDEX;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::CacheError;

/// Name of the shared data file.
pub const DATA_FILE_NAME: &str = "main_file_cache.dat2";

/// Prefix of every record file; the index id follows it.
pub const INDEX_FILE_PREFIX: &str = "main_file_cache.idx";

/// Returns the record file name for index `id`, e.g. `main_file_cache.idx3`.
pub fn index_file_name(id: u8) -> String {
    format!("{}{}", INDEX_FILE_PREFIX, id)
}

/// Lists the record files in `root` as `(id, path)` pairs, sorted by file
/// name. The reserved index 255 is skipped.
///
/// # Errors
///
/// Directory listing failures are returned as [`CacheError::Io`]. A file
/// whose name starts with [`INDEX_FILE_PREFIX`] but does not end in a
/// canonical decimal id below 256 yields [`CacheError::InvalidIndexFile`].
pub fn discover_indices(root: &Path) -> Result<Vec<(u8, PathBuf)>, CacheError> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        let is_index = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(INDEX_FILE_PREFIX))
            .unwrap_or(false);
        if is_index {
            paths.push(path);
        }
    }
    paths.sort();

    let mut found = Vec::with_capacity(paths.len());
    for path in paths {
        let id = parse_index_id(&path)?;
        if id == RESERVED_INDEX {
            debug!("skipping reserved index file {}", path.display());
            continue;
        }
        found.push((id, path));
    }
    Ok(found)
}

fn parse_index_id(path: &Path) -> Result<u8, CacheError> {
    let invalid = || CacheError::InvalidIndexFile(path.to_path_buf());
    let suffix = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix(INDEX_FILE_PREFIX))
        .ok_or_else(invalid)?;

    let id: u8 = suffix.parse().map_err(|_| invalid())?;
    // reject "idx007" and "idx+7", which would alias "idx7"
    if id.to_string() != suffix {
        return Err(invalid());
    }
    Ok(id)
}
