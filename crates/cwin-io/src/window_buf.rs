use cwin_error::{CwinError, Result};
use cwin_types::{ByteOffset, WindowSize};

/// Owned fixed-capacity slice of file content.
///
/// Invariants:
/// - `valid <= bytes.len()`
/// - bytes in `valid..` are zero
/// - `dirty` implies `valid > 0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowBuf {
    bytes: Box<[u8]>,
    start: ByteOffset,
    valid: usize,
    dirty: bool,
}

impl WindowBuf {
    /// Allocate a zeroed, empty window anchored at offset 0.
    pub fn new(size: WindowSize) -> Result<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size.get())
            .map_err(|_| CwinError::WindowAlloc { bytes: size.get() })?;
        bytes.resize(size.get(), 0);
        Ok(Self {
            bytes: bytes.into_boxed_slice(),
            start: ByteOffset::ZERO,
            valid: 0,
            dirty: false,
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// Absolute offset of the first window byte.
    #[must_use]
    pub fn start(&self) -> ByteOffset {
        self.start
    }

    /// Bytes that mirror (or will replace) real file content.
    #[must_use]
    pub fn valid(&self) -> usize {
        self.valid
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Absolute offset one past the last valid byte.
    #[must_use]
    pub fn end(&self) -> ByteOffset {
        ByteOffset(self.start.0 + self.valid as u64)
    }

    #[must_use]
    pub fn valid_bytes(&self) -> &[u8] {
        &self.bytes[..self.valid]
    }

    /// Index of `pos` inside the window, or `None` when `pos` lies outside
    /// `start..start + capacity`.
    #[must_use]
    pub fn slot(&self, pos: ByteOffset) -> Option<usize> {
        let delta = pos.0.checked_sub(self.start.0)?;
        usize::try_from(delta)
            .ok()
            .filter(|slot| *slot < self.capacity())
    }

    /// Byte at `slot` if it is valid.
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<u8> {
        self.valid_bytes().get(slot).copied()
    }

    /// Copy valid bytes starting at `slot` into `out`. Returns the count.
    pub fn copy_out(&self, slot: usize, out: &mut [u8]) -> usize {
        let avail = self.valid.saturating_sub(slot);
        let n = out.len().min(avail);
        out[..n].copy_from_slice(&self.bytes[slot..slot + n]);
        n
    }

    /// Store `data` at `slot`, extending the valid range and marking the
    /// window dirty. The caller guarantees `slot + data.len() <= capacity`.
    pub(crate) fn store(&mut self, slot: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let end = slot + data.len();
        self.bytes[slot..end].copy_from_slice(data);
        self.valid = self.valid.max(end);
        self.dirty = true;
    }

    /// Re-anchor an empty, zeroed window at `start` and hand back the whole
    /// buffer for filling. Must only be called on a clean window.
    pub(crate) fn reload(&mut self, start: ByteOffset) -> &mut [u8] {
        debug_assert!(!self.dirty, "reloading a dirty window discards writes");
        self.bytes.fill(0);
        self.start = start;
        self.valid = 0;
        &mut self.bytes
    }

    /// Record how many bytes the fill after `reload` produced.
    pub(crate) fn set_loaded(&mut self, n: usize) {
        debug_assert!(n <= self.capacity());
        self.valid = n.min(self.capacity());
        self.bytes[self.valid..].fill(0);
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        self.valid <= self.capacity()
            && self.bytes[self.valid..].iter().all(|b| *b == 0)
            && (!self.dirty || self.valid > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(size: usize) -> WindowBuf {
        WindowBuf::new(WindowSize::new(size).unwrap()).unwrap()
    }

    #[test]
    fn slot_membership() {
        let mut w = window(8);
        let _ = w.reload(ByteOffset(16));
        assert_eq!(w.slot(ByteOffset(15)), None);
        assert_eq!(w.slot(ByteOffset(16)), Some(0));
        assert_eq!(w.slot(ByteOffset(23)), Some(7));
        assert_eq!(w.slot(ByteOffset(24)), None);
    }

    #[test]
    fn store_extends_valid_and_dirties() {
        let mut w = window(8);
        w.store(2, b"ab");
        assert_eq!(w.valid(), 4);
        assert!(w.is_dirty());
        assert_eq!(w.valid_bytes(), b"\0\0ab");
        assert_eq!(w.end(), ByteOffset(4));

        w.store(0, b"x");
        assert_eq!(w.valid(), 4, "write below high-water mark keeps valid");
        assert!(w.invariants_hold());
    }

    #[test]
    fn empty_store_stays_clean() {
        let mut w = window(4);
        w.store(1, &[]);
        assert!(!w.is_dirty());
        assert_eq!(w.valid(), 0);
    }

    #[test]
    fn copy_out_clamps_to_valid() {
        let mut w = window(8);
        let fill = w.reload(ByteOffset(0));
        fill[..3].copy_from_slice(b"xyz");
        w.set_loaded(3);

        let mut out = [0_u8; 8];
        assert_eq!(w.copy_out(1, &mut out), 2);
        assert_eq!(&out[..2], b"yz");
        assert_eq!(w.copy_out(5, &mut out), 0);
        assert_eq!(w.get(2), Some(b'z'));
        assert_eq!(w.get(3), None);
    }

    #[test]
    fn reload_zeroes_previous_content() {
        let mut w = window(4);
        w.store(0, b"abcd");
        w.mark_clean();
        let fill = w.reload(ByteOffset(100));
        assert!(fill.iter().all(|b| *b == 0));
        assert_eq!(w.valid(), 0);
        assert_eq!(w.start(), ByteOffset(100));
        assert!(w.invariants_hold());
    }
}
