use super::task::{TaskId, TaskState};
use crate::downloader::DownloadProgress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Events that describe changes in the download queue state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueueEvent {
    /// A task moved to a new state
    StateChanged {
        task_id: TaskId,
        state: TaskState,
        timestamp: DateTime<Utc>,
    },
    /// Title became known from the extractor
    TitleKnown { task_id: TaskId, title: String },
    /// Rate-limited progress update
    Progress {
        task_id: TaskId,
        progress: DownloadProgress,
    },
    /// A task completed successfully
    TaskCompleted {
        task_id: TaskId,
        output_path: PathBuf,
        timestamp: DateTime<Utc>,
    },
    /// A task failed; the queue continues
    TaskFailed {
        task_id: TaskId,
        error: String,
        preserved_temp: Option<PathBuf>,
        timestamp: DateTime<Utc>,
    },
    /// The worker exited
    QueueFinished(RunSummary),
    /// Hard reset replaced the queue
    QueueCleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Completed,
    Aborted,
}

/// Result of one worker run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub done: usize,
    pub failed: usize,
    pub aborted: usize,
    /// Tasks left Pending for a future run
    pub pending: usize,
}

impl RunSummary {
    pub fn new(outcome: RunOutcome) -> Self {
        Self {
            outcome,
            done: 0,
            failed: 0,
            aborted: 0,
            pending: 0,
        }
    }
}
