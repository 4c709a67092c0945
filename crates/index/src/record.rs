//! Fixed-size records of an index file.
//!
//! Record `n` describes file `n` and lives at byte offset `n * 8`:
//!
//! ```text
//! [data_size: u32 BE][first_sector: u32 BE]
//! ```

use byteorder::{BigEndian, ByteOrder};
use std::fs::File;

use crate::handle::Handle;
use crate::IndexError;

/// Size of one record in bytes.
pub const RECORD_SIZE: usize = 8;

/// Location and length of one logical file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Total byte length of the file.
    pub data_size: u32,
    /// Physical sector holding chunk 0.
    pub first_sector: u32,
}

impl IndexRecord {
    /// Byte offset of the record for `file_id`.
    pub fn offset(file_id: u32) -> u64 {
        file_id as u64 * RECORD_SIZE as u64
    }

    pub fn decode(raw: &[u8; RECORD_SIZE]) -> Self {
        Self {
            data_size: BigEndian::read_u32(&raw[0..4]),
            first_sector: BigEndian::read_u32(&raw[4..8]),
        }
    }

    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut raw = [0u8; RECORD_SIZE];
        BigEndian::write_u32(&mut raw[0..4], self.data_size);
        BigEndian::write_u32(&mut raw[4..8], self.first_sector);
        raw
    }
}

/// The record file owned by one index.
#[derive(Debug)]
pub(crate) struct RecordFile {
    handle: Handle,
}

impl RecordFile {
    pub(crate) fn new(file: File) -> Self {
        Self {
            handle: Handle::new(file),
        }
    }

    /// Number of addressable records: `file_size / 8`, truncated.
    pub(crate) fn file_count(&self) -> Result<u32, IndexError> {
        let count = self.handle.len()? / RECORD_SIZE as u64;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    pub(crate) fn read(&self, file_id: u32) -> Result<IndexRecord, IndexError> {
        let mut raw = [0u8; RECORD_SIZE];
        self.handle.read_at(IndexRecord::offset(file_id), &mut raw)?;
        Ok(IndexRecord::decode(&raw))
    }

    /// Writes the record for `file_id`, growing the file when needed.
    pub(crate) fn write(&self, file_id: u32, record: IndexRecord) -> Result<(), IndexError> {
        self.handle
            .write_at(IndexRecord::offset(file_id), &record.encode())
    }

    pub(crate) fn sync(&self) -> Result<(), IndexError> {
        self.handle.sync()
    }

    pub(crate) fn close(&self) -> Result<(), IndexError> {
        self.handle.close()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}
