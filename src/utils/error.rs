//! Error handling for rustcutter

use crate::queue::RunState;
use std::time::Duration;
use thiserror::Error;

/// Session and configuration level errors
#[derive(Debug, Error)]
pub enum CutterError {
    #[error("Invalid time range: end ({end}s) must be after start ({start}s)")]
    InvalidRange { start: u64, end: u64 },

    #[error("Invalid timecode: {0}")]
    InvalidTimecode(String),

    #[error("Queue is already {0:?}; wait for it to become idle")]
    AlreadyRunning(RunState),

    #[error("Task not found: {0}")]
    TaskNotFound(u64),

    #[error("{0} not found. Please install it or set its location")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Failure of a single download task
///
/// Only [`DownloadError::Aborted`] stops the whole queue; every other
/// variant is recorded on the task and the worker moves on.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Requested format is not available: {0}")]
    FormatUnavailable(String),

    #[error("Aborted by user")]
    Aborted,

    #[error("Download stalled: no progress for {0:?}")]
    Stalled(Duration),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("{tool} is missing or could not be started")]
    ToolMissing { tool: String },

    #[error("{tool} failed (code={code:?}): {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl DownloadError {
    /// Classify a failure message reported by the extraction tool
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("requested format is not available")
            || lower.contains("format not available")
            || lower.contains("no video formats found")
        {
            return Self::FormatUnavailable(message.trim().to_string());
        }
        Self::Other(message.trim().to_string())
    }

    pub fn is_format_unavailable(&self) -> bool {
        matches!(self, Self::FormatUnavailable(_))
    }

    /// Human-readable message with hints for well-known failure causes
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        let lower = message.to_lowercase();

        if lower.contains("cookie") || lower.contains("locked") {
            format!("{message}\n\nHint: close the browser before downloading, its cookie database is locked.")
        } else if lower.contains("http error 403") || lower.contains("sign in to confirm") {
            format!("{message}\n\nHint: choose a browser as cookie source in the settings.")
        } else {
            message
        }
    }
}
