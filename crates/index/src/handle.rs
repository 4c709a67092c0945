//! Positioned I/O over a shared, closable [`File`].

use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::IndexError;

/// A file handle that can be used from several threads and closed exactly
/// once. Every access seeks first, so the cursor position is never shared
/// between two operations.
#[derive(Debug)]
pub(crate) struct Handle {
    file: Mutex<Option<File>>,
}

impl Handle {
    pub(crate) fn new(file: File) -> Self {
        Self {
            file: Mutex::new(Some(file)),
        }
    }

    pub(crate) fn len(&self) -> Result<u64, IndexError> {
        let guard = self.file.lock();
        let file = guard.as_ref().ok_or(IndexError::Closed)?;
        Ok(file.metadata()?.len())
    }

    /// Fills `buf` from `offset`. A short file surfaces as
    /// [`std::io::ErrorKind::UnexpectedEof`].
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<(), IndexError> {
        let mut guard = self.file.lock();
        let file = guard.as_mut().ok_or(IndexError::Closed)?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    pub(crate) fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), IndexError> {
        let mut guard = self.file.lock();
        let file = guard.as_mut().ok_or(IndexError::Closed)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        file.flush()?;
        Ok(())
    }

    pub(crate) fn sync(&self) -> Result<(), IndexError> {
        let guard = self.file.lock();
        let file = guard.as_ref().ok_or(IndexError::Closed)?;
        file.sync_data()?;
        Ok(())
    }

    /// Syncs and releases the file. A second call returns
    /// [`IndexError::Closed`].
    pub(crate) fn close(&self) -> Result<(), IndexError> {
        let file = self.file.lock().take().ok_or(IndexError::Closed)?;
        file.sync_all()?;
        Ok(())
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.file.lock().is_none()
    }
}
