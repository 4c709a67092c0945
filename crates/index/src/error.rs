use sector::SectorError;
use std::io;

use thiserror::Error;

/// Mismatch found while following a sector chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainFault {
    #[error("expected file {expected}, found {found}")]
    FileId { expected: u32, found: u32 },
    #[error("expected chunk {expected}, found {found}")]
    Chunk { expected: u32, found: u16 },
    #[error("expected index {expected}, found {found}")]
    IndexId { expected: u8, found: u8 },
    #[error("chain ended with {remaining} bytes still unread")]
    PrematureEnd { remaining: usize },
    #[error("sector lies beyond the end of the data file")]
    OutOfBounds,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("sector error: {0}")]
    Sector(#[from] SectorError),
    #[error("file {file_id} not found in index {index} ({file_count} files)")]
    FileNotFound {
        index: u8,
        file_id: u32,
        file_count: u32,
    },
    #[error("corrupt chain for file {file_id} in index {index} at sector {sector}: {fault}")]
    CorruptChain {
        index: u8,
        file_id: u32,
        sector: u32,
        fault: ChainFault,
    },
    #[error("overwrite of file {file_id} rejected: {reason}")]
    WriteRejected { file_id: u32, reason: String },
    #[error("file of {0} bytes exceeds the chunk limit")]
    TooLarge(usize),
    #[error("sector {0} is past the addressable end of the data file")]
    DataFileFull(u64),
    #[error("handle already closed")]
    Closed,
}

impl IndexError {
    /// Returns `true` for errors that mean the stored chain is inconsistent.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, IndexError::CorruptChain { .. })
    }

    /// Returns `true` when the requested file id does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexError::FileNotFound { .. })
    }
}
