#![forbid(unsafe_code)]

use cwin_error::{CwinError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Window capacity used when nothing else is configured.
pub const DEFAULT_WINDOW_SIZE: usize = 8;

/// Largest window a configuration may request (1 MiB).
pub const MAX_WINDOW_SIZE: usize = 1 << 20;

/// Permission bits for files created on open (owner read/write).
pub const DEFAULT_CREATE_MODE: u32 = 0o600;

/// Absolute byte offset into the underlying file.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ByteOffset(pub u64);

impl ByteOffset {
    pub const ZERO: Self = Self(0);

    /// Distance from `base` to `self`, negative when `self` precedes `base`.
    #[must_use]
    pub fn signed_distance_from(self, base: Self) -> i128 {
        i128::from(self.0) - i128::from(base.0)
    }
}

impl fmt::Display for ByteOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validated window capacity (1..=`MAX_WINDOW_SIZE` bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowSize(usize);

impl WindowSize {
    /// Create a `WindowSize` if `bytes` is in `1..=MAX_WINDOW_SIZE`.
    pub fn new(bytes: usize) -> Result<Self> {
        if !(1..=MAX_WINDOW_SIZE).contains(&bytes) {
            return Err(CwinError::InvalidConfig(format!(
                "window_size={bytes} (must be in 1..={MAX_WINDOW_SIZE})"
            )));
        }
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self(DEFAULT_WINDOW_SIZE)
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Construction-time settings for a cache window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Bytes staged before a fetch/flush cycle.
    pub window_size: usize,
    /// Open the descriptor with `O_SYNC` so every write-back reaches stable storage.
    pub sync_writes: bool,
    /// Create the file when it does not exist.
    pub create: bool,
    /// Permission bits applied when the file is created.
    pub mode: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            sync_writes: true,
            create: true,
            mode: DEFAULT_CREATE_MODE,
        }
    }
}

impl WindowConfig {
    /// Check the configuration and return the validated window size.
    pub fn validate(&self) -> Result<WindowSize> {
        if self.mode & !0o7777 != 0 {
            return Err(CwinError::InvalidConfig(format!(
                "mode={:#o} has bits outside 0o7777",
                self.mode
            )));
        }
        WindowSize::new(self.window_size)
    }
}

/// Caller-level operation counters kept by each cache window.
///
/// Observability only; nothing in the engine branches on these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStats {
    /// `read_byte` and bulk read calls.
    pub read_calls: u64,
    /// `write_byte` and bulk write calls.
    pub write_calls: u64,
    /// `seek` calls (including rejected ones).
    pub seeks: u64,
}

/// Underlying descriptor call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorStats {
    /// Read calls issued.
    pub reads: u64,
    /// Write calls issued.
    pub writes: u64,
    /// Reposition calls issued.
    pub seeks: u64,
    /// Sync calls issued.
    pub syncs: u64,
    /// Total bytes read.
    pub bytes_read: u64,
    /// Total bytes written.
    pub bytes_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_size_bounds() {
        assert!(WindowSize::new(0).is_err());
        assert_eq!(WindowSize::new(1).unwrap().get(), 1);
        assert_eq!(WindowSize::new(MAX_WINDOW_SIZE).unwrap().get(), MAX_WINDOW_SIZE);
        assert!(matches!(
            WindowSize::new(MAX_WINDOW_SIZE + 1),
            Err(CwinError::InvalidConfig(_))
        ));
        assert_eq!(WindowSize::default().get(), DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn default_config_matches_constants() {
        let cfg = WindowConfig::default();
        assert_eq!(cfg.window_size, 8);
        assert!(cfg.sync_writes);
        assert!(cfg.create);
        assert_eq!(cfg.mode, 0o600);
        assert_eq!(cfg.validate().unwrap().get(), 8);
    }

    #[test]
    fn config_rejects_bad_mode() {
        let cfg = WindowConfig {
            mode: 0o10_0000,
            ..WindowConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_missing_fields_take_defaults() {
        let cfg: WindowConfig =
            serde_json::from_str(r#"{"window_size": 64}"#).expect("deserialize");
        assert_eq!(cfg.window_size, 64);
        assert!(cfg.sync_writes);
        assert_eq!(cfg.mode, DEFAULT_CREATE_MODE);
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = WindowConfig {
            window_size: 4096,
            sync_writes: false,
            create: false,
            mode: 0o644,
        };
        let json = serde_json::to_string(&cfg).expect("serialize");
        let parsed: WindowConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn signed_distance() {
        let a = ByteOffset(10);
        assert_eq!(ByteOffset(13).signed_distance_from(a), 3);
        assert_eq!(ByteOffset(2).signed_distance_from(a), -8);
    }
}
