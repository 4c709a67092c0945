//! # Sector
//!
//! Codec for the fixed-size physical blocks of the shared data file.
//!
//! Every logical file is split into chunks of at most [`PAYLOAD_SIZE`] bytes.
//! Each chunk is stored in its own sector, and sectors are linked into a chain
//! through the `next_sector` field.
//!
//! ## Sector layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ HEADER (10 bytes, big-endian)                                │
//! │                                                              │
//! │ file_id (u32) | chunk (u16) | next_sector (u24) | index (u8) │
//! ├──────────────────────────────────────────────────────────────┤
//! │ PAYLOAD (up to 510 bytes)                                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sector `n` starts at byte offset `n * 520` in the data file. Only the
//! terminal chunk of a file may carry a short payload, and it is written
//! unpadded: a terminal sector occupies `10 + payload.len()` bytes on disk.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Write};

use thiserror::Error;

/// Size of the sector header in bytes.
pub const HEADER_SIZE: usize = 10;

/// Maximum payload carried by a single sector.
pub const PAYLOAD_SIZE: usize = 510;

/// Stride between two consecutive sectors in the data file.
pub const SECTOR_SIZE: usize = HEADER_SIZE + PAYLOAD_SIZE;

/// Largest sector number representable in the 3-byte `next_sector` field.
pub const MAX_SECTOR: u32 = 0xFF_FFFF;

#[derive(Debug, Error)]
pub enum SectorError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("sector buffer of {0} bytes is shorter than the 10-byte header")]
    Truncated(usize),
    #[error("sector buffer of {0} bytes exceeds 520 bytes")]
    Oversized(usize),
    #[error("next sector {0} does not fit in 24 bits")]
    NextSectorOverflow(u32),
}

/// One decoded physical block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    /// Logical file this sector belongs to.
    pub file_id: u32,
    /// 0-based position of this sector in the file's chain.
    pub chunk: u16,
    /// Physical sector holding the next chunk, `0` on the terminal chunk.
    pub next_sector: u32,
    /// Category that owns the file.
    pub index_id: u8,
    pub payload: Vec<u8>,
}

impl Sector {
    pub fn new(file_id: u32, chunk: u16, next_sector: u32, index_id: u8, payload: Vec<u8>) -> Self {
        Self {
            file_id,
            chunk,
            next_sector,
            index_id,
            payload,
        }
    }

    /// Returns the byte offset of sector `n` in the data file.
    pub fn offset(n: u32) -> u64 {
        n as u64 * SECTOR_SIZE as u64
    }

    /// Returns the on-disk length of a sector carrying `payload_len` bytes.
    pub fn disk_len(payload_len: usize) -> usize {
        HEADER_SIZE + payload_len.min(PAYLOAD_SIZE)
    }

    /// Decodes a sector from `raw`.
    ///
    /// The payload is whatever follows the header, so callers size `raw` to
    /// `HEADER_SIZE + expected_chunk_len`. No chain validation happens here.
    ///
    /// # Errors
    ///
    /// Returns [`SectorError::Truncated`] if `raw` cannot hold a header and
    /// [`SectorError::Oversized`] if it is longer than [`SECTOR_SIZE`].
    pub fn decode(raw: &[u8]) -> Result<Self, SectorError> {
        if raw.len() < HEADER_SIZE {
            return Err(SectorError::Truncated(raw.len()));
        }
        if raw.len() > SECTOR_SIZE {
            return Err(SectorError::Oversized(raw.len()));
        }

        let mut rdr = &raw[..HEADER_SIZE];
        let file_id = rdr.read_u32::<BigEndian>()?;
        let chunk = rdr.read_u16::<BigEndian>()?;
        let next_sector = rdr.read_u24::<BigEndian>()?;
        let index_id = rdr.read_u8()?;

        Ok(Self {
            file_id,
            chunk,
            next_sector,
            index_id,
            payload: raw[HEADER_SIZE..].to_vec(),
        })
    }

    /// Encodes the sector into `HEADER_SIZE + payload.len()` bytes.
    ///
    /// The payload is never padded, so a short terminal chunk produces a
    /// short buffer.
    pub fn encode(&self) -> Result<Vec<u8>, SectorError> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Writes the encoded sector to `w`.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), SectorError> {
        if self.next_sector > MAX_SECTOR {
            return Err(SectorError::NextSectorOverflow(self.next_sector));
        }
        if self.payload.len() > PAYLOAD_SIZE {
            return Err(SectorError::Oversized(HEADER_SIZE + self.payload.len()));
        }

        w.write_u32::<BigEndian>(self.file_id)?;
        w.write_u16::<BigEndian>(self.chunk)?;
        w.write_u24::<BigEndian>(self.next_sector)?;
        w.write_u8(self.index_id)?;
        w.write_all(&self.payload)?;
        Ok(())
    }
}
