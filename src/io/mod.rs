//! Byte stores: bounded random access over an image's raw bytes.
//!
//! A [`ByteStore`] never returns a short read and never writes outside its
//! bounds. [`VectorStore`] keeps its bytes in memory and may grow on write;
//! [`FileStore`] is a fixed-size snapshot of a file on disk whose `load()` and
//! `save()` either complete or leave the previous state untouched.

pub mod error;

use bytes::Bytes;
use memmap2::Mmap;
use serde_json::json;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, trace, warn};

use crate::config::IoConfig;
use crate::core::object::Record;
use crate::io::error::{Result, StoreError};

/// Bounded read/write access to a contiguous byte sequence.
pub trait ByteStore: Send + Sync + fmt::Debug {
    /// Short name of the backing ("vector", "file").
    fn kind(&self) -> &'static str;

    /// Current size in bytes.
    fn size(&self) -> u64;

    /// Exactly `len` bytes starting at `offset`.
    fn read(&self, offset: u64, len: u64) -> Result<Bytes>;

    /// Overwrite bytes starting at `offset`.
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Whole content, for analysers.
    fn as_bytes(&self) -> &[u8];

    /// Persist pending writes, if the store has a persistent backing.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Descriptor record; never contains the bytes themselves.
    fn serialize(&self) -> Record;
}

/// Validate `[offset, offset + len)` against `size` and return it as a slice range.
pub fn checked_range(offset: u64, len: u64, size: u64) -> Result<Range<usize>> {
    let out_of_bounds = || StoreError::OutOfBounds { offset, len, size };
    let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
    if end > size {
        return Err(out_of_bounds());
    }
    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let end = usize::try_from(end).map_err(|_| out_of_bounds())?;
    Ok(start..end)
}

/// In-memory byte store.
#[derive(Debug, Clone)]
pub struct VectorStore {
    data: Vec<u8>,
    growable: bool,
    max_size: u64,
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new(false)
    }
}

impl VectorStore {
    /// Empty store.
    pub fn new(growable: bool) -> Self {
        Self::from_bytes(Vec::new(), growable)
    }

    /// Store holding a copy of `bytes`.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, growable: bool) -> Self {
        Self {
            data: bytes.into(),
            growable,
            max_size: IoConfig::default().max_memory_size,
        }
    }

    /// Empty store with the growth policy and size cap from `config`.
    pub fn with_config(config: &IoConfig) -> Self {
        Self::new(config.growable_memory).with_max_size(config.max_memory_size)
    }

    /// Cap on the size a growable store may reach through writes.
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn is_growable(&self) -> bool {
        self.growable
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Zero-extend to cover `[offset, offset + len)`, within `max_size`.
    fn grow_to(&mut self, offset: u64, len: u64) -> Result<usize> {
        let size = self.size();
        let out_of_bounds = || StoreError::OutOfBounds { offset, len, size };
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.max_size)
            .and_then(|end| usize::try_from(end).ok())
            .ok_or_else(out_of_bounds)?;
        if self.data.try_reserve_exact(end - self.data.len()).is_err() {
            warn!(from = self.data.len(), to = end, "Vector store allocation failed");
            return Err(out_of_bounds());
        }
        trace!(from = self.data.len(), to = end, "Growing vector store");
        self.data.resize(end, 0);
        Ok(end)
    }
}

impl ByteStore for VectorStore {
    fn kind(&self) -> &'static str {
        "vector"
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(&self, offset: u64, len: u64) -> Result<Bytes> {
        let range = checked_range(offset, len, self.size())?;
        Ok(Bytes::copy_from_slice(&self.data[range]))
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let len = data.len() as u64;
        let range = match checked_range(offset, len, self.size()) {
            Ok(range) => range,
            Err(StoreError::OutOfBounds { .. }) if self.growable => {
                let end = self.grow_to(offset, len)?;
                (end - data.len())..end
            }
            Err(e) => return Err(e),
        };
        self.data[range].copy_from_slice(data);
        Ok(())
    }

    fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn serialize(&self) -> Record {
        json!({
            "kind": self.kind(),
            "size": self.size(),
            "growable": self.growable,
            "max_size": self.max_size,
        })
    }
}

enum Content {
    /// Read-only mapping of the file as loaded.
    Mapped(Mmap),
    /// Private copy, created empty or on first write.
    Owned(Vec<u8>),
}

impl Content {
    fn as_slice(&self) -> &[u8] {
        match self {
            Content::Mapped(map) => map,
            Content::Owned(data) => data,
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Mapped(map) => write!(f, "Mapped({} bytes)", map.len()),
            Content::Owned(data) => write!(f, "Owned({} bytes)", data.len()),
        }
    }
}

/// File-backed byte store.
///
/// Holds a fixed-size snapshot of the file. Writes modify the snapshot only;
/// `save()` replaces the file atomically and `load()` discards unsaved writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    max_file_size: u64,
    content: Content,
    dirty: bool,
}

impl FileStore {
    /// Open and load a file, refusing files larger than `config.max_file_size`.
    pub fn open<P: AsRef<Path>>(path: P, config: &IoConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = Self::read_file(&path, config.max_file_size)?;
        Ok(Self {
            path,
            max_file_size: config.max_file_size,
            content,
            dirty: false,
        })
    }

    fn read_file(path: &Path, limit: u64) -> Result<Content> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size = file_size,
            limit = limit,
            "Loading file store"
        );

        if file_size > limit {
            warn!(
                path = %path.display(),
                size = file_size,
                limit = limit,
                "File is too large"
            );
            return Err(StoreError::FileTooLarge {
                limit,
                found: file_size,
            });
        }

        // memmap cannot map empty files
        if file_size == 0 {
            return Ok(Content::Owned(Vec::new()));
        }
        // Safety: read-only map of a regular file; the snapshot is copied
        // before any write.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Content::Mapped(map))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if the snapshot has writes not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Re-read the file. On failure the current snapshot is kept.
    pub fn load(&mut self) -> Result<()> {
        let content = Self::read_file(&self.path, self.max_file_size)?;
        if self.dirty {
            debug!(path = %self.path.display(), "Discarding unsaved writes");
        }
        self.content = content;
        self.dirty = false;
        Ok(())
    }

    /// Write the snapshot back to disk through a temporary file in the same
    /// directory, then rename it over the original.
    pub fn save(&mut self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(self.content.as_slice())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| StoreError::StdIo(e.error))?;
        self.dirty = false;
        info!(
            path = %self.path.display(),
            size = self.size(),
            "Saved file store"
        );
        Ok(())
    }
}

impl ByteStore for FileStore {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn size(&self) -> u64 {
        self.content.as_slice().len() as u64
    }

    fn read(&self, offset: u64, len: u64) -> Result<Bytes> {
        let range = checked_range(offset, len, self.size())?;
        Ok(Bytes::copy_from_slice(&self.content.as_slice()[range]))
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let range = checked_range(offset, data.len() as u64, self.size())?;
        if let Content::Mapped(map) = &self.content {
            self.content = Content::Owned(map.to_vec());
        }
        if let Content::Owned(buf) = &mut self.content {
            buf[range].copy_from_slice(data);
            self.dirty = true;
        }
        Ok(())
    }

    fn as_bytes(&self) -> &[u8] {
        self.content.as_slice()
    }

    fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.save()?;
        }
        Ok(())
    }

    fn serialize(&self) -> Record {
        json!({
            "kind": self.kind(),
            "path": self.path.display().to_string(),
            "size": self.size(),
        })
    }
}
