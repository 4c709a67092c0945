//! Sector allocation for the shared data file.
//!
//! New sectors are always taken from the tail of the data file. The
//! allocator keeps the first never-used sector as an explicit counter,
//! seeded from the file length when the data file is opened, so concurrent
//! writers never race on "current file length".

use sector::{MAX_SECTOR, SECTOR_SIZE};

use crate::IndexError;

/// Tail allocator for physical sectors. Sector 0 is never handed out.
#[derive(Debug)]
pub struct SectorAllocator {
    next_free: u32,
}

impl SectorAllocator {
    /// Seeds the allocator from the data file length:
    /// `ceil(len / 520)`, at least 1.
    pub fn from_len(data_len: u64) -> Result<Self, IndexError> {
        let sectors = data_len.div_ceil(SECTOR_SIZE as u64).max(1);
        let next_free = u32::try_from(sectors).map_err(|_| IndexError::DataFileFull(sectors))?;
        Ok(Self { next_free })
    }

    /// First sector past everything allocated so far.
    pub fn next_free(&self) -> u32 {
        self.next_free
    }

    /// Lays out a chain of `chunks` sectors without reserving it.
    ///
    /// With `head == None` the chain starts at the tail. With `Some(head)` the
    /// first chunk reuses `head` and every following link is taken from the
    /// tail, exactly as in the append case. A link that would equal the
    /// sector before it (or 0) is bumped by one.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DataFileFull`] if a link does not fit in the
    /// 24-bit `next_sector` field.
    pub fn plan(&self, head: Option<u32>, chunks: usize) -> Result<Vec<u32>, IndexError> {
        let mut cursor = self.next_free as u64;
        let first = match head {
            Some(sector) => sector as u64,
            None => {
                cursor += 1;
                self.next_free as u64
            }
        };

        let mut chain = Vec::with_capacity(chunks.max(1));
        chain.push(first);

        let mut current = first;
        for _ in 1..chunks {
            let mut next = cursor;
            if next == current || next == 0 {
                next += 1;
            }
            cursor = next + 1;
            chain.push(next);
            current = next;
        }

        chain
            .into_iter()
            .map(|sector| {
                if sector > MAX_SECTOR as u64 {
                    Err(IndexError::DataFileFull(sector))
                } else {
                    Ok(sector as u32)
                }
            })
            .collect()
    }

    /// Marks every sector of a written chain as used.
    pub fn commit(&mut self, chain: &[u32]) {
        if let Some(&last) = chain.iter().max() {
            self.next_free = self.next_free.max(last.saturating_add(1));
        }
    }
}
