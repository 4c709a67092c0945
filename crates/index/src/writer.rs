use log::debug;
use sector::{Sector, PAYLOAD_SIZE};
use std::io::ErrorKind;

use crate::allocator::SectorAllocator;
use crate::{Index, IndexError, IndexRecord};

/// Largest file a chain can hold: the chunk counter is a `u16`.
pub const MAX_FILE_SIZE: usize = (u16::MAX as usize + 1) * PAYLOAD_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Overwrite,
    Append,
}

impl Index {
    /// Stores `data` as the contents of `file_id`.
    ///
    /// The existing chain head is reused when it still belongs to this file;
    /// otherwise the whole chain is appended at the tail of the data file.
    /// A rejected overwrite is never reported as long as the append succeeds.
    ///
    /// # Errors
    ///
    /// - [`IndexError::TooLarge`] if `data` needs more than 65 536 chunks.
    /// - [`IndexError::DataFileFull`] if the chain would need sectors beyond
    ///   the 24-bit link range.
    /// - [`IndexError::Io`] / [`IndexError::Closed`] if the append fails.
    pub fn write(&self, file_id: u32, data: &[u8]) -> Result<(), IndexError> {
        if data.len() > MAX_FILE_SIZE {
            return Err(IndexError::TooLarge(data.len()));
        }

        let _guard = self.lock.write();
        if self.records.is_closed() || self.data.is_closed() {
            return Err(IndexError::Closed);
        }

        let mut allocator = self.data.allocator();
        match self.write_chain(file_id, data, &mut allocator, WriteMode::Overwrite) {
            Ok(()) => Ok(()),
            Err(err @ IndexError::Closed) => Err(err),
            Err(err) => {
                debug!(
                    "index {}: overwrite of file {} failed ({}), appending",
                    self.id, file_id, err
                );
                self.write_chain(file_id, data, &mut allocator, WriteMode::Append)
            }
        }
    }

    /// Writes one chain and then its record.
    ///
    /// In overwrite mode every planned sector is checked before anything is
    /// written, so a rejection leaves the data and record files untouched.
    fn write_chain(
        &self,
        file_id: u32,
        data: &[u8],
        allocator: &mut SectorAllocator,
        mode: WriteMode,
    ) -> Result<(), IndexError> {
        // an empty file still owns one header-only sector
        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![data]
        } else {
            data.chunks(PAYLOAD_SIZE).collect()
        };

        let head = match mode {
            WriteMode::Overwrite => Some(self.overwrite_head(file_id)?),
            WriteMode::Append => None,
        };
        let chain = allocator.plan(head, chunks.len())?;

        if mode == WriteMode::Overwrite {
            for (chunk, &sector_at) in chain.iter().enumerate() {
                self.check_existing(file_id, chunk as u32, sector_at)?;
            }
        }

        for (chunk, payload) in chunks.iter().enumerate() {
            let next_sector = chain.get(chunk + 1).copied().unwrap_or(0);
            let sector = Sector::new(file_id, chunk as u16, next_sector, self.id, payload.to_vec());
            self.data.write_sector(chain[chunk], &sector)?;
        }
        allocator.commit(&chain);

        let record = IndexRecord {
            data_size: data.len() as u32,
            first_sector: chain[0],
        };
        self.records.write(file_id, record)?;

        if self.data.sync_enabled() {
            self.data.sync()?;
            self.records.sync()?;
        }
        Ok(())
    }

    /// Returns the head of the existing chain if it can be overwritten.
    fn overwrite_head(&self, file_id: u32) -> Result<u32, IndexError> {
        if file_id >= self.records.file_count()? {
            return Err(rejected(file_id, "no existing record"));
        }

        let head = self.records.read(file_id)?.first_sector;
        let sector_count = self.data.sector_count()?;
        if head == 0 || head > sector_count {
            return Err(rejected(
                file_id,
                format!("head sector {} outside 1..={}", head, sector_count),
            ));
        }
        Ok(head)
    }

    /// Rejects the overwrite unless sector `sector_at` currently holds chunk
    /// `chunk` of `file_id` in this index.
    fn check_existing(&self, file_id: u32, chunk: u32, sector_at: u32) -> Result<(), IndexError> {
        let header = match self.data.read_header(sector_at) {
            Ok(header) => header,
            Err(IndexError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(rejected(
                    file_id,
                    format!("sector {} for chunk {} is unallocated", sector_at, chunk),
                ));
            }
            Err(e) => return Err(e),
        };

        self.verify(&header, file_id, chunk)
            .map_err(|fault| rejected(file_id, format!("sector {}: {}", sector_at, fault)))
    }
}

fn rejected(file_id: u32, reason: impl Into<String>) -> IndexError {
    IndexError::WriteRejected {
        file_id,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::open_indices;
    use crate::{IndexError, IndexRecord, MAX_FILE_SIZE};
    use anyhow::Result;
    use sector::{Sector, HEADER_SIZE, PAYLOAD_SIZE, SECTOR_SIZE};
    use tempfile::tempdir;

    fn sample(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
    }

    /// Follows the stored chain of `file_id` and returns its sectors.
    fn chain_of(index: &crate::Index, file_id: u32) -> Result<Vec<u32>> {
        let record = index.record(file_id)?;
        let mut sectors = vec![record.first_sector];
        let mut remaining = record.data_size as usize;
        let mut at = record.first_sector;
        let mut chunk = 0u16;
        loop {
            let sector = index.data.read_header(at)?;
            assert_eq!(sector.file_id, file_id);
            assert_eq!(sector.chunk, chunk);
            assert_eq!(sector.index_id, index.id());
            if remaining <= PAYLOAD_SIZE {
                return Ok(sectors);
            }
            remaining -= PAYLOAD_SIZE;
            at = sector.next_sector;
            sectors.push(at);
            chunk += 1;
        }
    }

    // -------------------- Round trips --------------------

    #[test]
    fn roundtrip_boundary_sizes() -> Result<()> {
        let dir = tempdir()?;
        let (_data, indices) = open_indices(dir.path(), &[0])?;
        let index = &indices[0];

        let sizes = [0, 1, 509, 510, 511, 1020, 1021, 5 * PAYLOAD_SIZE + 17];
        for (file_id, &len) in sizes.iter().enumerate() {
            let data = sample(len, file_id as u8);
            index.write(file_id as u32, &data)?;
            assert_eq!(index.read(file_id as u32)?, data, "size {}", len);
        }

        // written files are still intact after all the others
        for (file_id, &len) in sizes.iter().enumerate() {
            assert_eq!(index.read(file_id as u32)?, sample(len, file_id as u8));
        }
        Ok(())
    }

    #[test]
    fn append_layout_matches_sector_math() -> Result<()> {
        let dir = tempdir()?;
        let (data, indices) = open_indices(dir.path(), &[0])?;
        let index = &indices[0];

        index.write(0, &sample(1021, 0))?;
        assert_eq!(chain_of(index, 0)?, vec![1, 2, 3]);
        // chunk 2 holds one byte
        assert_eq!(data.len()?, (3 * SECTOR_SIZE + HEADER_SIZE + 1) as u64);

        // the next file starts at ceil(len / 520)
        index.write(1, b"next")?;
        assert_eq!(index.record(1)?.first_sector, 4);
        Ok(())
    }

    #[test]
    fn terminal_link_is_zero() -> Result<()> {
        let dir = tempdir()?;
        let (data, indices) = open_indices(dir.path(), &[0])?;
        indices[0].write(0, &sample(700, 1))?;

        assert_eq!(data.read_header(1)?.next_sector, 2);
        assert_eq!(data.read_header(2)?.next_sector, 0);
        Ok(())
    }

    #[test]
    fn empty_file_owns_a_header_only_sector() -> Result<()> {
        let dir = tempdir()?;
        let (data, indices) = open_indices(dir.path(), &[0])?;
        indices[0].write(0, &[])?;

        assert_eq!(
            indices[0].record(0)?,
            IndexRecord {
                data_size: 0,
                first_sector: 1
            }
        );
        assert_eq!(data.len()?, (SECTOR_SIZE + HEADER_SIZE) as u64);
        assert!(indices[0].read(0)?.is_empty());
        Ok(())
    }

    // -------------------- Overwrite --------------------

    #[test]
    fn single_sector_overwrite_reuses_head_in_place() -> Result<()> {
        let dir = tempdir()?;
        let (data, indices) = open_indices(dir.path(), &[0])?;
        let index = &indices[0];

        index.write(0, b"first version")?;
        index.write(1, b"neighbour")?;
        let len_before = data.len()?;

        index.write(0, b"second")?;
        assert_eq!(index.record(0)?.first_sector, 1);
        assert_eq!(index.read(0)?, b"second".to_vec());
        assert_eq!(index.read(1)?, b"neighbour".to_vec());
        assert_eq!(data.len()?, len_before);
        Ok(())
    }

    #[test]
    fn multi_sector_overwrite_falls_back_to_append() -> Result<()> {
        let dir = tempdir()?;
        let (data, indices) = open_indices(dir.path(), &[0])?;
        let index = &indices[0];

        let original = sample(1500, 3);
        index.write(0, &original)?;
        assert_eq!(chain_of(index, 0)?, vec![1, 2, 3]);

        // Overwrite reuses only the head and takes chunk 1 from the tail,
        // where no matching sector exists yet, so the whole chain is
        // appended instead.
        index.write(0, &original)?;
        assert_eq!(chain_of(index, 0)?, vec![4, 5, 6]);
        assert_eq!(index.read(0)?, original);

        // the first chain was left untouched
        assert_eq!(data.read_header(1)?.next_sector, 2);
        Ok(())
    }

    #[test]
    fn repeated_writes_keep_chain_consistent() -> Result<()> {
        let dir = tempdir()?;
        let (_data, indices) = open_indices(dir.path(), &[0])?;
        let index = &indices[0];

        let data = sample(2000, 9);
        for _ in 0..3 {
            index.write(7, &data)?;
            assert_eq!(index.read(7)?, data);
            chain_of(index, 7)?;
        }
        Ok(())
    }

    #[test]
    fn shrink_then_grow() -> Result<()> {
        let dir = tempdir()?;
        let (_data, indices) = open_indices(dir.path(), &[0])?;
        let index = &indices[0];

        index.write(0, &sample(2000, 1))?;
        index.write(0, &sample(10, 2))?;
        assert_eq!(index.read(0)?, sample(10, 2));

        index.write(0, &sample(3000, 3))?;
        assert_eq!(index.read(0)?, sample(3000, 3));
        chain_of(index, 0)?;
        Ok(())
    }

    #[test]
    fn foreign_head_forces_append() -> Result<()> {
        let dir = tempdir()?;
        let (_data, indices) = open_indices(dir.path(), &[0, 1])?;

        indices[0].write(0, b"zero")?;
        indices[1].write(0, b"one")?;

        // point index 1's record at the sector owned by index 0
        let stolen = IndexRecord {
            data_size: 4,
            first_sector: indices[0].record(0)?.first_sector,
        };
        indices[1].records.write(0, stolen)?;

        indices[1].write(0, b"one, again")?;
        assert_ne!(indices[1].record(0)?.first_sector, stolen.first_sector);
        assert_eq!(indices[0].read(0)?, b"zero".to_vec());
        assert_eq!(indices[1].read(0)?, b"one, again".to_vec());
        Ok(())
    }

    #[test]
    fn zeroed_record_is_appended() -> Result<()> {
        let dir = tempdir()?;
        let (_data, indices) = open_indices(dir.path(), &[0])?;
        let index = &indices[0];

        // writing id 5 leaves zeroed records for ids 0..5
        index.write(5, b"five")?;
        assert_eq!(index.record(2)?.first_sector, 0);

        index.write(2, b"abc")?;
        assert_eq!(index.read(2)?, b"abc".to_vec());
        assert_eq!(index.record(2)?.first_sector, 2);
        assert_eq!(index.read(5)?, b"five".to_vec());
        Ok(())
    }

    #[test]
    fn sector_zero_is_never_written() -> Result<()> {
        let dir = tempdir()?;
        let (data, indices) = open_indices(dir.path(), &[0])?;
        indices[0].write(0, &sample(600, 0))?;

        let header = data.read_header(0)?;
        assert_eq!(header, Sector::new(0, 0, 0, 0, Vec::new()));
        Ok(())
    }

    // -------------------- Limits --------------------

    #[test]
    fn oversized_file_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let (data, indices) = open_indices(dir.path(), &[0])?;

        let err = indices[0].write(0, &vec![0u8; MAX_FILE_SIZE + 1]).unwrap_err();
        assert!(matches!(err, IndexError::TooLarge(n) if n == MAX_FILE_SIZE + 1));
        assert!(data.is_empty()?);
        assert_eq!(indices[0].file_count()?, 0);
        Ok(())
    }

    #[test]
    fn write_after_close_fails() -> Result<()> {
        let dir = tempdir()?;
        let (data, indices) = open_indices(dir.path(), &[0])?;
        data.close()?;
        assert!(matches!(indices[0].write(0, b"x"), Err(IndexError::Closed)));
        assert_eq!(indices[0].file_count()?, 0);
        Ok(())
    }
}
