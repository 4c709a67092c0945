//! # Cache
//!
//! A directory holding one shared data file and one record file per index:
//!
//! ```text
//! <root>/
//!   main_file_cache.dat2   520-byte sectors shared by every index
//!   main_file_cache.idx0   8-byte records for index 0
//!   main_file_cache.idx1   8-byte records for index 1
//!   ...
//! ```
//!
//! [`Cache`] owns the data file, discovers the record files, and hands out
//! [`Index`] references by id. All handles are released by an explicit
//! [`Cache::close`], which may run exactly once.
//!
//! ## Example
//! ```no_run
//! use cache::Cache;
//!
//! let cache = Cache::create("/tmp/cache", 1)?;
//! cache.get_index(0)?.write(1, b"hello")?;
//! assert_eq!(cache.get_index(0)?.read(1)?, b"hello".to_vec());
//! cache.close()?;
//! # Ok::<(), cache::CacheError>(())
//! ```

mod discovery;
mod error;

pub use discovery::{discover_indices, index_file_name, DATA_FILE_NAME, INDEX_FILE_PREFIX};
pub use error::CacheError;
pub use index::{ChainFault, DataFile, Index, IndexError, IndexRecord};

use index::RESERVED_INDEX;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tunables applied when a cache is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheOptions {
    /// If `true`, the data and record files are synced after every write.
    pub sync: bool,
}

/// All indices of one cache directory over a shared data file.
#[derive(Debug)]
pub struct Cache {
    root: Option<PathBuf>,
    data: Arc<DataFile>,
    indices: BTreeMap<u8, Index>,
}

impl Cache {
    /// Opens an existing cache directory with default options.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, CacheError> {
        Self::open_with(root, CacheOptions::default())
    }

    /// Opens an existing cache directory.
    ///
    /// # Errors
    ///
    /// - [`CacheError::DataFileMissing`] if `root` has no data file.
    /// - [`CacheError::InvalidIndexFile`] for a malformed record file name.
    /// - [`CacheError::Io`] if the directory or a file cannot be opened.
    pub fn open_with<P: AsRef<Path>>(root: P, options: CacheOptions) -> Result<Self, CacheError> {
        let root = root.as_ref();
        let data_path = root.join(DATA_FILE_NAME);
        let data = open_rw(&data_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CacheError::DataFileMissing(data_path.clone()),
            _ => CacheError::Io(e),
        })?;

        let mut records = Vec::new();
        for (id, path) in discover_indices(root)? {
            records.push((id, open_rw(&path)?));
        }

        let mut cache = Self::from_handles(data, records, options)?;
        cache.root = Some(root.to_path_buf());
        info!(
            "opened cache {} with {} indices ({} bytes of data)",
            root.display(),
            cache.indices.len(),
            cache.data.len()?
        );
        Ok(cache)
    }

    /// Creates a cache directory with default options.
    pub fn create<P: AsRef<Path>>(root: P, index_count: u8) -> Result<Self, CacheError> {
        Self::create_with(root, index_count, CacheOptions::default())
    }

    /// Creates `root`, an empty data file and record files for indices
    /// `0..index_count`, then opens the cache. Files that already exist are
    /// kept as they are.
    pub fn create_with<P: AsRef<Path>>(
        root: P,
        index_count: u8,
        options: CacheOptions,
    ) -> Result<Self, CacheError> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        touch(&root.join(DATA_FILE_NAME))?;
        for id in 0..index_count {
            touch(&root.join(index_file_name(id)))?;
        }
        info!("created cache {} with {} indices", root.display(), index_count);

        Self::open_with(root, options)
    }

    /// Builds a cache from already-open handles.
    ///
    /// `data` is the shared data file; `records` pairs each index id with its
    /// record file. The reserved id 255 is ignored.
    pub fn from_handles<I>(data: File, records: I, options: CacheOptions) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = (u8, File)>,
    {
        let data = Arc::new(DataFile::new(data, options.sync)?);

        let mut indices = BTreeMap::new();
        for (id, file) in records {
            if id == RESERVED_INDEX {
                debug!("ignoring reserved index {}", id);
                continue;
            }
            indices.insert(id, Index::new(id, file, Arc::clone(&data)));
        }

        Ok(Self {
            root: None,
            data,
            indices,
        })
    }

    /// Returns the index registered under `id`.
    pub fn get_index(&self, id: u8) -> Result<&Index, CacheError> {
        self.indices.get(&id).ok_or(CacheError::IndexNotFound(id))
    }

    /// Iterates the registered indices in ascending id order.
    pub fn indices(&self) -> impl Iterator<Item = &Index> {
        self.indices.values()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// The directory this cache was opened from, if it was opened by path.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn data_file(&self) -> &DataFile {
        &self.data
    }

    /// Closes every record file and then the shared data file.
    ///
    /// Indices closed individually beforehand are skipped. All handles are
    /// released even if one of them fails to sync; the first failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::AlreadyClosed`] when called a second time.
    pub fn close(&self) -> Result<(), CacheError> {
        if self.data.is_closed() {
            return Err(CacheError::AlreadyClosed);
        }

        let mut first_err: Option<CacheError> = None;
        for index in self.indices.values() {
            match index.close() {
                Ok(()) | Err(IndexError::Closed) => {}
                Err(e) => {
                    first_err.get_or_insert(e.into());
                }
            }
        }

        match self.data.close() {
            Ok(()) => {}
            Err(IndexError::Closed) => return Err(CacheError::AlreadyClosed),
            Err(e) => {
                first_err.get_or_insert(e.into());
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => {
                info!("closed cache with {} indices", self.indices.len());
                Ok(())
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.data.is_closed()
    }
}

fn open_rw(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

fn touch(path: &Path) -> std::io::Result<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(drop)
}
