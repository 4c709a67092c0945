use log::trace;
use parking_lot::{Mutex, MutexGuard};
use sector::{Sector, HEADER_SIZE, SECTOR_SIZE};
use std::fs::File;

use crate::allocator::SectorAllocator;
use crate::handle::Handle;
use crate::IndexError;

/// The data file shared by every index of a cache.
///
/// Holds the file handle and the tail allocator. The allocator lock is the
/// single point where new sectors are handed out, so two indices appending
/// at the same time never receive the same sector.
#[derive(Debug)]
pub struct DataFile {
    handle: Handle,
    allocator: Mutex<SectorAllocator>,
    sync: bool,
}

impl DataFile {
    /// Wraps an open read-write handle. With `sync` set, every completed
    /// write is followed by `sync_data`.
    pub fn new(file: File, sync: bool) -> Result<Self, IndexError> {
        let len = file.metadata()?.len();
        Ok(Self {
            handle: Handle::new(file),
            allocator: Mutex::new(SectorAllocator::from_len(len)?),
            sync,
        })
    }

    pub fn len(&self) -> Result<u64, IndexError> {
        self.handle.len()
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }

    /// Number of whole sector strides in the file, `len / 520`.
    pub fn sector_count(&self) -> Result<u32, IndexError> {
        let count = self.len()? / SECTOR_SIZE as u64;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// The sector the next append will start at.
    pub fn next_free_sector(&self) -> u32 {
        self.allocator.lock().next_free()
    }

    pub fn sync_enabled(&self) -> bool {
        self.sync
    }

    pub(crate) fn allocator(&self) -> MutexGuard<'_, SectorAllocator> {
        self.allocator.lock()
    }

    /// Reads sector `n` assuming it carries `payload_len` bytes.
    pub(crate) fn read_sector(&self, n: u32, payload_len: usize) -> Result<Sector, IndexError> {
        let mut raw = vec![0u8; Sector::disk_len(payload_len)];
        self.handle.read_at(Sector::offset(n), &mut raw)?;
        Ok(Sector::decode(&raw)?)
    }

    /// Reads only the header of sector `n`.
    pub(crate) fn read_header(&self, n: u32) -> Result<Sector, IndexError> {
        let mut raw = [0u8; HEADER_SIZE];
        self.handle.read_at(Sector::offset(n), &mut raw)?;
        Ok(Sector::decode(&raw)?)
    }

    pub(crate) fn write_sector(&self, n: u32, sector: &Sector) -> Result<(), IndexError> {
        let raw = sector.encode()?;
        trace!(
            "write sector {} (file {}, chunk {}, next {}, {} bytes)",
            n,
            sector.file_id,
            sector.chunk,
            sector.next_sector,
            raw.len()
        );
        self.handle.write_at(Sector::offset(n), &raw)
    }

    pub fn sync(&self) -> Result<(), IndexError> {
        self.handle.sync()
    }

    /// Syncs and closes the shared handle. Every index sharing this file
    /// fails with [`IndexError::Closed`] afterwards.
    pub fn close(&self) -> Result<(), IndexError> {
        self.handle.close()
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}
