#![forbid(unsafe_code)]
//! Buffered file I/O through a single write-back cache window.
//!
//! Provides the [`Descriptor`] trait, a regular-file implementation
//! ([`FileDescriptor`]), an in-memory implementation ([`MemDescriptor`]),
//! and the [`CacheWindow`] engine that stages character and block access
//! through one fixed-capacity window.

mod cache_window;
mod mem;
mod window_buf;

pub use cache_window::CacheWindow;
pub use mem::MemDescriptor;
pub use window_buf::WindowBuf;

use cwin_error::{CwinError, Result};
use cwin_types::{ByteOffset, DescriptorStats, WindowConfig};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

/// Positioned byte stream backing a cache window.
///
/// Calls map one-to-one onto the platform's reposition/read/write calls so
/// the engine controls exactly how many of them it issues.
pub trait Descriptor {
    /// Move the descriptor's offset to `offset`.
    fn seek_to(&mut self, offset: ByteOffset) -> Result<()>;

    /// One read at the current offset. Returns 0 at end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// One write at the current offset. May accept fewer bytes than offered.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Current size in bytes. Fails with `NotRegularFile` for anything else.
    fn file_size(&self) -> Result<u64>;

    /// Flush written data to stable storage.
    fn sync(&mut self) -> Result<()>;

    /// Calls issued so far.
    fn stats(&self) -> DescriptorStats;
}

/// Regular file opened read-write.
#[derive(Debug)]
pub struct FileDescriptor {
    file: File,
    stats: DescriptorStats,
}

impl FileDescriptor {
    /// Open `path` read-write, honoring `create`, `mode`, and `sync_writes`.
    ///
    /// The file handle is owned by the returned value and released when it
    /// drops, so a failure later in handle construction cannot leak it.
    pub fn open(path: impl AsRef<Path>, config: &WindowConfig) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(CwinError::InvalidPath("empty path".to_owned()));
        }
        if path.as_os_str().as_bytes().contains(&0) {
            return Err(CwinError::InvalidPath(format!(
                "path contains a NUL byte: {}",
                path.display()
            )));
        }

        let mut options = OpenOptions::new();
        options
            .read(true)
            .write(true)
            .create(config.create)
            .mode(config.mode);
        if config.sync_writes {
            options.custom_flags(libc::O_SYNC);
        }
        let file = options.open(path).map_err(|source| CwinError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_file(file))
    }

    /// Wrap an already-open file. It must be readable and writable.
    #[must_use]
    pub fn from_file(file: File) -> Self {
        Self {
            file,
            stats: DescriptorStats::default(),
        }
    }
}

impl Descriptor for FileDescriptor {
    fn seek_to(&mut self, offset: ByteOffset) -> Result<()> {
        self.stats.seeks += 1;
        self.file.seek(SeekFrom::Start(offset.0))?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stats.reads += 1;
        let n = self.file.read(buf)?;
        self.stats.bytes_read += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stats.writes += 1;
        let n = self.file.write(buf)?;
        self.stats.bytes_written += n as u64;
        Ok(n)
    }

    fn file_size(&self) -> Result<u64> {
        let meta = self.file.metadata()?;
        if !meta.is_file() {
            return Err(CwinError::NotRegularFile);
        }
        Ok(meta.len())
    }

    fn sync(&mut self) -> Result<()> {
        self.stats.syncs += 1;
        self.file.sync_all()?;
        Ok(())
    }

    fn stats(&self) -> DescriptorStats {
        self.stats
    }
}
