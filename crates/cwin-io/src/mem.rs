//! In-memory regular file for tests and benchmarks.

use crate::Descriptor;
use cwin_error::Result;
use cwin_types::{ByteOffset, DescriptorStats};
use parking_lot::Mutex;
use std::sync::Arc;

/// Growable in-memory file with its own offset.
///
/// Clones share the backing bytes but not the offset or counters, so a test
/// can hand one clone to a cache window and inspect the contents through
/// another. Writes past the end zero-fill the gap like a sparse regular file.
#[derive(Debug, Clone, Default)]
pub struct MemDescriptor {
    bytes: Arc<Mutex<Vec<u8>>>,
    offset: u64,
    stats: DescriptorStats,
}

impl MemDescriptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(bytes)),
            ..Self::default()
        }
    }

    /// Snapshot of the file contents.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[expect(clippy::cast_possible_truncation)] // 64-bit offsets in memory descriptor
impl Descriptor for MemDescriptor {
    fn seek_to(&mut self, offset: ByteOffset) -> Result<()> {
        self.stats.seeks += 1;
        self.offset = offset.0;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stats.reads += 1;
        let bytes = self.bytes.lock();
        let start = (self.offset as usize).min(bytes.len());
        let n = buf.len().min(bytes.len() - start);
        buf[..n].copy_from_slice(&bytes[start..start + n]);
        drop(bytes);
        self.offset += n as u64;
        self.stats.bytes_read += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stats.writes += 1;
        let start = self.offset as usize;
        let end = start + buf.len();
        let mut bytes = self.bytes.lock();
        if end > bytes.len() {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(buf);
        drop(bytes);
        self.offset = end as u64;
        self.stats.bytes_written += buf.len() as u64;
        Ok(buf.len())
    }

    fn file_size(&self) -> Result<u64> {
        Ok(self.bytes.lock().len() as u64)
    }

    fn sync(&mut self) -> Result<()> {
        self.stats.syncs += 1;
        Ok(())
    }

    fn stats(&self) -> DescriptorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_write_zero_fills_gap() {
        let mut mem = MemDescriptor::from_bytes(b"ab".to_vec());
        mem.seek_to(ByteOffset(5)).unwrap();
        assert_eq!(mem.write(b"z").unwrap(), 1);
        assert_eq!(mem.contents(), b"ab\0\0\0z");
    }

    #[test]
    fn read_past_end_returns_zero() {
        let mut mem = MemDescriptor::from_bytes(vec![1, 2, 3]);
        mem.seek_to(ByteOffset(10)).unwrap();
        let mut buf = [0_u8; 4];
        assert_eq!(mem.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn short_read_at_tail() {
        let mut mem = MemDescriptor::from_bytes(vec![1, 2, 3]);
        mem.seek_to(ByteOffset(1)).unwrap();
        let mut buf = [0_u8; 8];
        assert_eq!(mem.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[2, 3]);
    }

    #[test]
    fn clones_share_bytes_not_offsets() {
        let mut a = MemDescriptor::new();
        let b = a.clone();
        a.write(b"xyz").unwrap();
        assert_eq!(b.contents(), b"xyz");
        assert_eq!(a.stats().writes, 1);
        assert_eq!(b.stats().writes, 0);
    }
}
