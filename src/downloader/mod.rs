//! Download progress and temporary file handling

pub mod files;
pub mod progress;

// Re-export for convenience
pub use files::{cleanup_artifacts, clear_temp_dir, move_file, remove_quietly};
pub use progress::{DownloadProgress, ProgressStatus};
