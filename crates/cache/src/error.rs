use index::IndexError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("index {0} not found")]
    IndexNotFound(u8),
    #[error("data file {} not found", .0.display())]
    DataFileMissing(PathBuf),
    #[error("invalid index file name {}", .0.display())]
    InvalidIndexFile(PathBuf),
    #[error("cache already closed")]
    AlreadyClosed,
}

impl CacheError {
    /// Returns `true` for a missing category, file id or data file.
    pub fn is_not_found(&self) -> bool {
        match self {
            CacheError::IndexNotFound(_) | CacheError::DataFileMissing(_) => true,
            CacheError::Index(e) => e.is_not_found(),
            _ => false,
        }
    }
}
