//! Utility modules for errors, configuration, naming and platform lookups

pub mod binaries;
pub mod config;
pub mod error;
pub mod naming;
pub mod platform;
pub mod timecode;

// Re-export for convenience
pub use binaries::find_tool;
pub use config::{AppSettings, CookieSource};
pub use error::{CutterError, DownloadError};
pub use naming::{sanitize_title, NameAllocator};
pub use timecode::{format_timecode, parse_timecode};
