use log::warn;
use sector::PAYLOAD_SIZE;
use std::io::ErrorKind;

use crate::{ChainFault, Index, IndexError};

impl Index {
    /// Reads the full contents of `file_id`.
    ///
    /// # Errors
    ///
    /// - [`IndexError::FileNotFound`] if `file_id >= file_count()`.
    /// - [`IndexError::CorruptChain`] if a sector names another file, chunk or
    ///   index, if the chain ends before `data_size` bytes were read, or if a
    ///   link points past the end of the data file.
    /// - [`IndexError::Io`] / [`IndexError::Closed`] on storage failures.
    pub fn read(&self, file_id: u32) -> Result<Vec<u8>, IndexError> {
        let _guard = self.lock.read();
        let record = self.lookup(file_id)?;

        let mut remaining = record.data_size as usize;
        let mut out = Vec::with_capacity(remaining);
        let mut sector_at = record.first_sector;
        let mut chunk = 0u32;

        while remaining > 0 {
            if sector_at == 0 {
                return Err(self.corrupt(file_id, sector_at, ChainFault::PrematureEnd { remaining }));
            }

            let chunk_len = remaining.min(PAYLOAD_SIZE);
            let sector = match self.data.read_sector(sector_at, chunk_len) {
                Ok(sector) => sector,
                Err(IndexError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Err(self.corrupt(file_id, sector_at, ChainFault::OutOfBounds));
                }
                Err(e) => return Err(e),
            };

            if let Err(fault) = self.verify(&sector, file_id, chunk) {
                return Err(self.corrupt(file_id, sector_at, fault));
            }

            out.extend_from_slice(&sector.payload);
            remaining -= chunk_len;
            sector_at = sector.next_sector;
            chunk += 1;
        }

        Ok(out)
    }

    fn corrupt(&self, file_id: u32, sector: u32, fault: ChainFault) -> IndexError {
        warn!(
            "index {}: chain of file {} broken at sector {}: {}",
            self.id, file_id, sector, fault
        );
        IndexError::CorruptChain {
            index: self.id,
            file_id,
            sector,
            fault,
        }
    }
}
