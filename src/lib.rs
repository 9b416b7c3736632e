//! Rustcutter library

pub mod backend;
pub mod downloader;
pub mod extractor;
pub mod format;
pub mod queue;
pub mod transcoder;
pub mod utils;

// Re-export main types for easier use
pub use backend::{BackendActor, BackendCommand, BackendEvent};
pub use downloader::{DownloadProgress, ProgressStatus};
pub use extractor::{Extractor, VideoInfo, YtDlpExtractor};
pub use format::{AudioBitrate, FormatCascade, FormatSelector, QualityTier};
pub use queue::{
    DownloadTask, QueueEvent, QueueManager, RunState, RunSummary, TaskRequest, TaskState,
    TimeRange,
};
pub use transcoder::{FfmpegTranscoder, Transcoder};
pub use utils::{AppSettings, CutterError, DownloadError};
