#![forbid(unsafe_code)]
//! cwin public API facade.
//!
//! Re-exports the cache window engine from `cwin-io` together with its
//! error and configuration types. This is the crate downstream consumers
//! (the CLI included) depend on.

pub use cwin_error::{CwinError, Result};
pub use cwin_io::*;
pub use cwin_types::{
    ByteOffset, DEFAULT_WINDOW_SIZE, DescriptorStats, MAX_WINDOW_SIZE, WindowConfig, WindowSize,
    WindowStats,
};
