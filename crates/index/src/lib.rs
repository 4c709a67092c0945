//! # Index
//!
//! One category of logical files stored as sector chains in a shared data
//! file.
//!
//! An [`Index`] owns a record file (`main_file_cache.idx<N>`) holding one
//! 8-byte [`IndexRecord`] per file id, and shares a [`DataFile`]
//! (`main_file_cache.dat2`) with every other index of the same cache.
//!
//! ## Read path
//!
//! 1. Look up the record `(data_size, first_sector)` for the file id.
//! 2. Walk the chain from `first_sector`, reading `10 + min(remaining, 510)`
//!    bytes per sector.
//! 3. Every sector must name the same file id, the expected chunk number and
//!    this index, otherwise the read fails with
//!    [`IndexError::CorruptChain`].
//!
//! ## Write path
//!
//! 1. **Overwrite** — reuse the first sector of the existing chain; every
//!    following link is allocated from the tail. Each sector about to be
//!    written must already carry a matching header.
//! 2. **Append** — if the overwrite is rejected, the whole chain is written at
//!    the tail of the data file.
//! 3. The record is rewritten only after the chain is complete.
//!
//! ## Concurrency
//!
//! Reads of one index share a lock; writes hold it exclusively and also hold
//! the data file's allocator for the duration of the write.

mod allocator;
mod data_file;
mod error;
mod handle;
mod reader;
mod record;
mod writer;

pub use allocator::SectorAllocator;
pub use data_file::DataFile;
pub use error::{ChainFault, IndexError};
pub use record::{IndexRecord, RECORD_SIZE};
pub use writer::MAX_FILE_SIZE;

use parking_lot::RwLock;
use sector::Sector;
use std::fmt;
use std::fs::File;
use std::sync::Arc;

use crate::record::RecordFile;

/// Index id reserved by the archive format; never loaded as a category.
pub const RESERVED_INDEX: u8 = 255;

/// A category of files addressed by `u32` file ids.
pub struct Index {
    id: u8,
    records: RecordFile,
    data: Arc<DataFile>,
    lock: RwLock<()>,
}

impl Index {
    /// Binds an open record file to the shared data file.
    pub fn new(id: u8, record_file: File, data: Arc<DataFile>) -> Self {
        Self {
            id,
            records: RecordFile::new(record_file),
            data,
            lock: RwLock::new(()),
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Number of addressable file ids: record file size / 8.
    ///
    /// # Errors
    ///
    /// Propagates the failure to query the record file, including
    /// [`IndexError::Closed`].
    pub fn file_count(&self) -> Result<u32, IndexError> {
        self.records.file_count()
    }

    /// Returns `true` if `file_id` has a record.
    pub fn contains(&self, file_id: u32) -> Result<bool, IndexError> {
        Ok(file_id < self.file_count()?)
    }

    /// Returns the stored `(data_size, first_sector)` record of `file_id`.
    pub fn record(&self, file_id: u32) -> Result<IndexRecord, IndexError> {
        let _guard = self.lock.read();
        self.lookup(file_id)
    }

    /// Syncs and closes the record file. The shared data file stays open.
    pub fn close(&self) -> Result<(), IndexError> {
        let _guard = self.lock.write();
        self.records.close()
    }

    pub fn is_closed(&self) -> bool {
        self.records.is_closed()
    }

    fn lookup(&self, file_id: u32) -> Result<IndexRecord, IndexError> {
        let file_count = self.records.file_count()?;
        if file_id >= file_count {
            return Err(IndexError::FileNotFound {
                index: self.id,
                file_id,
                file_count,
            });
        }
        self.records.read(file_id)
    }

    /// Checks that `sector` is chunk `chunk` of `file_id` in this index.
    fn verify(&self, sector: &Sector, file_id: u32, chunk: u32) -> Result<(), ChainFault> {
        if sector.file_id != file_id {
            return Err(ChainFault::FileId {
                expected: file_id,
                found: sector.file_id,
            });
        }
        if sector.chunk as u32 != chunk {
            return Err(ChainFault::Chunk {
                expected: chunk,
                found: sector.chunk,
            });
        }
        if sector.index_id != self.id {
            return Err(ChainFault::IndexId {
                expected: self.id,
                found: sector.index_id,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
