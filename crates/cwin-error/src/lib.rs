#![forbid(unsafe_code)]
//! Error types for cwin.
//!
//! # Error Taxonomy
//!
//! Every fallible operation on a cache window returns [`CwinError`]. The
//! variants fall into four classes:
//!
//! | Class | Variant(s) | Handle usable afterwards? |
//! |-------|------------|---------------------------|
//! | Open | `Open`, `InvalidPath`, `InvalidConfig`, `WindowAlloc` | no handle was produced |
//! | Range | `NegativeSeek` | yes, position unchanged |
//! | I/O | `Io`, `WriteZero` | no, window state may be inconsistent |
//! | Metadata | `NotRegularFile` | yes |
//!
//! End-of-stream is not an error. Single-byte reads report it as `Ok(None)`
//! and bulk reads return a short count.
//!
//! ## errno Mapping
//!
//! Every variant maps to exactly one POSIX errno via [`CwinError::to_errno`].
//! The mapping is exhaustive (no wildcard arms) so adding a new variant is a
//! compile error until its errno is assigned.
//!
//! | Variant | errno |
//! |---------|-------|
//! | `Open` | wrapped OS error, else `EIO` |
//! | `InvalidPath` | `EINVAL` |
//! | `InvalidConfig` | `EINVAL` |
//! | `WindowAlloc` | `ENOMEM` |
//! | `NegativeSeek` | `EINVAL` |
//! | `Io` | wrapped OS error, else `EIO` |
//! | `WriteZero` | `EIO` |
//! | `NotRegularFile` | `ESPIPE` |

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all cwin operations.
#[derive(Debug, Error)]
pub enum CwinError {
    /// The descriptor could not be acquired.
    #[error("could not open `{}`: {source}", path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The path is empty or cannot be passed to the platform.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Construction-time configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The window buffer could not be allocated.
    #[error("could not allocate a {bytes}-byte window")]
    WindowAlloc { bytes: usize },

    /// Seek target below zero. Recoverable.
    #[error("seek to negative position {0}")]
    NegativeSeek(i64),

    /// Underlying read, write, or reposition failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The descriptor accepted zero bytes while writing back the window.
    #[error("descriptor accepted no bytes while writing at offset {offset}")]
    WriteZero { offset: u64 },

    /// Size was requested for something that is not a regular file.
    #[error("not a regular file")]
    NotRegularFile,
}

impl CwinError {
    /// Convert this error into a POSIX errno.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            Self::Open { source, .. } => source.raw_os_error().unwrap_or(libc::EIO),
            Self::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            Self::InvalidPath(_) | Self::InvalidConfig(_) | Self::NegativeSeek(_) => libc::EINVAL,
            Self::WindowAlloc { .. } => libc::ENOMEM,
            Self::WriteZero { .. } => libc::EIO,
            Self::NotRegularFile => libc::ESPIPE,
        }
    }

    /// Whether the handle that produced this error must be abandoned.
    ///
    /// After an I/O failure during fetch, flush, or a bypass transfer the
    /// window may no longer mirror the file, so further use is unsound.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Io(_) | Self::WriteZero { .. } => true,
            Self::Open { .. }
            | Self::InvalidPath(_)
            | Self::InvalidConfig(_)
            | Self::WindowAlloc { .. }
            | Self::NegativeSeek(_)
            | Self::NotRegularFile => false,
        }
    }

    /// The `std::io::ErrorKind` this error surfaces as through `std::io` adaptors.
    #[must_use]
    pub fn io_kind(&self) -> std::io::ErrorKind {
        use std::io::ErrorKind;

        match self {
            Self::Open { source, .. } => source.kind(),
            Self::Io(err) => err.kind(),
            Self::InvalidPath(_) | Self::InvalidConfig(_) | Self::NegativeSeek(_) => {
                ErrorKind::InvalidInput
            }
            Self::WindowAlloc { .. } => ErrorKind::OutOfMemory,
            Self::WriteZero { .. } => ErrorKind::WriteZero,
            Self::NotRegularFile => ErrorKind::Unsupported,
        }
    }
}

impl From<CwinError> for std::io::Error {
    fn from(err: CwinError) -> Self {
        match err {
            CwinError::Io(inner) | CwinError::Open { source: inner, .. } => inner,
            other => Self::new(other.io_kind(), other),
        }
    }
}

/// Result alias using `CwinError`.
pub type Result<T> = std::result::Result<T, CwinError>;
