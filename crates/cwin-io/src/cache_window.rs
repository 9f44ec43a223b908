//! The cache window engine.
//!
//! # Model
//!
//! A [`CacheWindow`] tracks one absolute logical `position` and one
//! [`WindowBuf`] anchored at `window_start`. The cursor is derived as
//! `position - window_start`; when it falls outside `0..window_size` the
//! window is stale and the next access refetches it. Seeking only moves
//! `position`, so it never touches the descriptor.
//!
//! # Protocols
//!
//! - **Fetch**: flush, reposition the descriptor to `position`, then either
//!   read up to `window_size` bytes or, at or past end of file, leave the
//!   window empty without issuing a read. The window is re-anchored at
//!   `position` in both cases.
//! - **Flush**: when dirty, write the valid bytes back at `window_start`.
//!   A clean window flushes as a no-op.
//! - **Bypass**: transfers larger than the window flush, go straight to the
//!   descriptor in one call, then refetch at the new position.

use crate::{Descriptor, FileDescriptor, WindowBuf};
use cwin_error::{CwinError, Result};
use cwin_types::{ByteOffset, DescriptorStats, WindowConfig, WindowSize, WindowStats};
use std::io;
use std::path::Path;
use tracing::{debug, info, trace, warn};

/// Single-window write-back cache over one exclusively owned descriptor.
///
/// Every operation takes `&mut self`; sharing a handle across threads needs
/// external locking. [`close`](Self::close) consumes the handle. Dropping without closing
/// flushes on a best-effort basis and logs a warning if that fails.
#[derive(Debug)]
pub struct CacheWindow<D: Descriptor = FileDescriptor> {
    descriptor: D,
    window: WindowBuf,
    position: ByteOffset,
    stats: WindowStats,
    label: String,
}

impl CacheWindow<FileDescriptor> {
    /// Open `path` read-write (creating it if absent) with the default
    /// configuration and prime the window at offset 0.
    pub fn open(path: impl AsRef<Path>, label: impl Into<String>) -> Result<Self> {
        Self::open_with(path, label, &WindowConfig::default())
    }

    /// Open `path` with an explicit configuration.
    pub fn open_with(
        path: impl AsRef<Path>,
        label: impl Into<String>,
        config: &WindowConfig,
    ) -> Result<Self> {
        let size = config.validate()?;
        let descriptor = FileDescriptor::open(path.as_ref(), config)?;
        debug!(
            path = %path.as_ref().display(),
            sync_writes = config.sync_writes,
            "descriptor acquired"
        );
        Self::with_descriptor(descriptor, label, size)
    }
}

impl<D: Descriptor> CacheWindow<D> {
    /// Attach a window of `size` bytes to `descriptor` and prime it at
    /// offset 0. On failure the descriptor is dropped before returning.
    pub fn with_descriptor(
        descriptor: D,
        label: impl Into<String>,
        size: WindowSize,
    ) -> Result<Self> {
        let window = WindowBuf::new(size)?;
        let mut this = Self {
            descriptor,
            window,
            position: ByteOffset::ZERO,
            stats: WindowStats::default(),
            label: label.into(),
        };
        debug!(label = %this.label, window_size = size.get(), "cache window opened");
        this.fetch()?;
        this.check_invariants();
        Ok(this)
    }

    /// Flush, then release the descriptor and the window.
    ///
    /// Returns the operation counters accumulated over the handle's life.
    pub fn close(mut self) -> Result<WindowStats> {
        self.check_invariants();
        info!(
            label = %self.label,
            read_calls = self.stats.read_calls,
            write_calls = self.stats.write_calls,
            seeks = self.stats.seeks,
            "cache window stats"
        );
        let flushed = self.flush_window();
        // The handle is gone either way; keep Drop from writing again.
        self.window.mark_clean();
        flushed?;
        debug!(label = %self.label, "cache window closed");
        Ok(self.stats)
    }

    /// Move the logical position to `pos` without touching the window.
    ///
    /// Returns the new position. A negative target fails with
    /// `NegativeSeek` and leaves the position unchanged.
    pub fn seek(&mut self, pos: i64) -> Result<ByteOffset> {
        self.check_invariants();
        self.stats.seeks += 1;
        let target = u64::try_from(pos).map_err(|_| CwinError::NegativeSeek(pos))?;
        self.position = ByteOffset(target);
        Ok(self.position)
    }

    /// Read one byte. `Ok(None)` signals end of stream and leaves the
    /// position where it was.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        self.check_invariants();
        self.stats.read_calls += 1;
        let slot = self.ensure_in_window()?;
        let Some(byte) = self.window.get(slot) else {
            return Ok(None);
        };
        self.advance(1);
        Ok(Some(byte))
    }

    /// Write one byte and return it.
    pub fn write_byte(&mut self, byte: u8) -> Result<u8> {
        self.check_invariants();
        self.stats.write_calls += 1;
        let slot = self.ensure_in_window()?;
        self.window.store(slot, &[byte]);
        self.advance(1);
        Ok(byte)
    }

    /// Read up to `buf.len()` bytes. Returns fewer at end of file.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read_bulk(buf)
    }

    /// Read up to `n` bytes into a fresh vector.
    pub fn read_to_vec(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0_u8; n];
        let got = self.read_bulk(&mut buf)?;
        buf.truncate(got);
        Ok(buf)
    }

    /// Write `data`, returning the number of bytes accepted.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.write_bulk(data)
    }

    /// Write back the window if it holds unpersisted bytes.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_window()
    }

    /// Flush, then ask the descriptor to reach stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.flush_window()?;
        self.descriptor.sync()
    }

    /// Logical file size: the stat size, extended by dirty window bytes
    /// that have not been written back yet.
    pub fn file_size(&self) -> Result<u64> {
        self.check_invariants();
        let on_disk = self.descriptor.file_size()?;
        if self.window.is_dirty() {
            Ok(on_disk.max(self.window.end().0))
        } else {
            Ok(on_disk)
        }
    }

    /// Absolute logical position.
    #[must_use]
    pub fn position(&self) -> ByteOffset {
        self.position
    }

    /// Position relative to the window start. Negative or at least
    /// `window_size` when the window is stale.
    #[must_use]
    pub fn cursor(&self) -> i64 {
        let delta = self.position.signed_distance_from(self.window.start());
        i64::try_from(delta).unwrap_or(if delta < 0 { i64::MIN } else { i64::MAX })
    }

    #[must_use]
    pub fn window_start(&self) -> ByteOffset {
        self.window.start()
    }

    #[must_use]
    pub fn valid_bytes(&self) -> usize {
        self.window.valid()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.window.is_dirty()
    }

    #[must_use]
    pub fn window_size(&self) -> usize {
        self.window.capacity()
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn stats(&self) -> WindowStats {
        self.stats
    }

    #[must_use]
    pub fn descriptor_stats(&self) -> DescriptorStats {
        self.descriptor.stats()
    }

    /// Whether the window bookkeeping is internally consistent.
    ///
    /// Non-negative window start and position are guaranteed by their
    /// unsigned representation; what remains is the window's own state.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        self.window.invariants_hold()
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.invariants_hold(),
            "cache window invariants violated: label={} start={} valid={} capacity={} position={}",
            self.label,
            self.window.start(),
            self.window.valid(),
            self.window.capacity(),
            self.position,
        );
    }

    fn advance(&mut self, n: usize) {
        self.position = ByteOffset(self.position.0.saturating_add(n as u64));
    }

    /// Slot of the current position, refetching first if it is stale.
    fn ensure_in_window(&mut self) -> Result<usize> {
        if let Some(slot) = self.window.slot(self.position) {
            return Ok(slot);
        }
        self.fetch()?;
        // Fetch anchors the window at the position.
        Ok(0)
    }

    fn fetch(&mut self) -> Result<()> {
        self.flush_window()?;
        let at = self.position;
        self.descriptor.seek_to(at)?;
        let size = self.descriptor.file_size()?;
        let fill = self.window.reload(at);
        if at.0 >= size {
            trace!(label = %self.label, offset = %at, size, "fetch at end of file");
            return Ok(());
        }
        let n = self.descriptor.read(fill)?;
        self.window.set_loaded(n);
        trace!(label = %self.label, offset = %at, valid = n, "fetched window");
        Ok(())
    }

    fn flush_window(&mut self) -> Result<()> {
        if !self.window.is_dirty() {
            return Ok(());
        }
        let start = self.window.start();
        self.descriptor.seek_to(start)?;
        let mut pending = self.window.valid_bytes();
        let mut offset = start;
        while !pending.is_empty() {
            let n = self.descriptor.write(pending)?;
            if n == 0 {
                return Err(CwinError::WriteZero { offset: offset.0 });
            }
            pending = &pending[n..];
            offset = ByteOffset(offset.0 + n as u64);
        }
        trace!(label = %self.label, offset = %start, len = self.window.valid(), "flushed window");
        self.window.mark_clean();
        Ok(())
    }

    fn read_bulk(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_invariants();
        self.stats.read_calls += 1;
        let n = buf.len();
        if n == 0 {
            return Ok(0);
        }

        if n > self.window.capacity() {
            self.flush_window()?;
            let at = self.position;
            self.descriptor.seek_to(at)?;
            let got = self.descriptor.read(buf)?;
            self.advance(got);
            debug!(label = %self.label, offset = %at, requested = n, transferred = got, "bypass read");
            self.fetch()?;
            return Ok(got);
        }

        let slot = match self.window.slot(self.position) {
            Some(slot) if slot + n <= self.window.valid() => slot,
            _ => {
                self.fetch()?;
                0
            }
        };
        let copied = self.window.copy_out(slot, buf);
        self.advance(copied);
        Ok(copied)
    }

    fn write_bulk(&mut self, data: &[u8]) -> Result<usize> {
        self.check_invariants();
        self.stats.write_calls += 1;
        let n = data.len();
        if n == 0 {
            return Ok(0);
        }

        if n > self.window.capacity() {
            self.flush_window()?;
            let at = self.position;
            self.descriptor.seek_to(at)?;
            let written = self.descriptor.write(data)?;
            self.advance(written);
            debug!(label = %self.label, offset = %at, requested = n, transferred = written, "bypass write");
            self.fetch()?;
            return Ok(written);
        }

        let slot = match self.window.slot(self.position) {
            Some(slot) if slot + n <= self.window.capacity() => slot,
            _ => {
                self.fetch()?;
                0
            }
        };
        self.window.store(slot, data);
        self.advance(n);
        Ok(n)
    }
}

impl<D: Descriptor> Drop for CacheWindow<D> {
    fn drop(&mut self) {
        if let Err(error) = self.flush_window() {
            warn!(label = %self.label, %error, "dropped cache window with unflushed data");
        }
    }
}

impl<D: Descriptor> io::Read for CacheWindow<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bulk(buf)?)
    }
}

impl<D: Descriptor> io::Write for CacheWindow<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bulk(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.flush_window()?)
    }
}

impl<D: Descriptor> io::Seek for CacheWindow<D> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            io::SeekFrom::Start(offset) => (0, i128::from(offset)),
            io::SeekFrom::Current(delta) => (self.position.0, i128::from(delta)),
            io::SeekFrom::End(delta) => (self.file_size()?, i128::from(delta)),
        };
        let target = i128::from(base) + delta;
        let target = i64::try_from(target).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek target overflows i64")
        })?;
        Ok(CacheWindow::seek(self, target)?.0)
    }
}
