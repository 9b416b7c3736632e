//! Download task data model

use crate::downloader::DownloadProgress;
use crate::format::{AudioBitrate, QualityTier};
use crate::utils::error::CutterError;
use crate::utils::timecode::format_timecode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub type TaskId = u64;

/// Requested `[start, end)` fragment in whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(u64, u64)", into = "(u64, u64)")]
pub struct TimeRange {
    start: u64,
    end: u64,
}

impl TimeRange {
    pub fn new(start: u64, end: u64) -> Result<Self, CutterError> {
        if end <= start {
            return Err(CutterError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn duration(&self) -> u64 {
        self.end - self.start
    }

    /// File name suffix, e.g. `_cut_10-20`
    pub fn file_suffix(&self) -> String {
        format!("_cut_{}-{}", self.start, self.end)
    }
}

impl TryFrom<(u64, u64)> for TimeRange {
    type Error = CutterError;

    fn try_from((start, end): (u64, u64)) -> Result<Self, Self::Error> {
        Self::new(start, end)
    }
}

impl From<TimeRange> for (u64, u64) {
    fn from(range: TimeRange) -> Self {
        (range.start, range.end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_timecode(self.start), format_timecode(self.end))
    }
}

/// Task lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Pending,
    Fetching,
    Downloading,
    Postprocessing,
    Done,
    Error,
    Aborted,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Error | TaskState::Aborted)
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskState::Fetching | TaskState::Downloading | TaskState::Postprocessing
        )
    }

    /// Whether `next` is a legal transition from `self`
    pub fn can_advance_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        match (self, next) {
            (Pending, Fetching) => true,
            (Fetching, Downloading) => true,
            (Downloading, Postprocessing | Done) => true,
            (Postprocessing, Done) => true,
            (from, Error | Aborted) => from.is_active(),
            _ => false,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "pending",
            TaskState::Fetching => "fetching",
            TaskState::Downloading => "downloading",
            TaskState::Postprocessing => "postprocessing",
            TaskState::Done => "done",
            TaskState::Error => "error",
            TaskState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Immutable parameters of a download request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub url: String,
    pub range: Option<TimeRange>,
    pub quality: QualityTier,
    pub convert_to_container: bool,
    pub audio_bitrate: AudioBitrate,
}

impl TaskRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            range: None,
            quality: QualityTier::default(),
            convert_to_container: true,
            audio_bitrate: AudioBitrate::default(),
        }
    }

    pub fn with_range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_quality(mut self, quality: QualityTier) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_convert(mut self, convert: bool) -> Self {
        self.convert_to_container = convert;
        self
    }

    pub fn with_bitrate(mut self, bitrate: AudioBitrate) -> Self {
        self.audio_bitrate = bitrate;
        self
    }

    pub fn is_fragment(&self) -> bool {
        self.range.is_some()
    }
}

/// Download task: request parameters plus execution state
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub id: TaskId,
    pub request: TaskRequest,
    pub state: TaskState,
    pub title: Option<String>,
    pub progress: Option<DownloadProgress>,
    pub error: Option<String>,
    pub output_path: Option<PathBuf>,
    /// Pre-trim download kept after a failed trim
    pub preserved_temp: Option<PathBuf>,
    pub added_at: DateTime<Utc>,
}

impl DownloadTask {
    fn new(id: TaskId, request: TaskRequest) -> Self {
        Self {
            id,
            request,
            state: TaskState::Pending,
            title: None,
            progress: None,
            error: None,
            output_path: None,
            preserved_temp: None,
            added_at: Utc::now(),
        }
    }

    /// Move to `next`, returning false when the transition is illegal
    pub(crate) fn advance(&mut self, next: TaskState) -> bool {
        if self.state == next {
            return true;
        }
        if !self.state.can_advance_to(next) {
            return false;
        }
        self.state = next;
        true
    }
}

/// Ordered task collection for one queue generation
#[derive(Debug)]
pub struct TaskQueue {
    generation: Uuid,
    tasks: Vec<DownloadTask>,
    next_id: TaskId,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            generation: Uuid::new_v4(),
            tasks: Vec::new(),
            next_id: 1,
        }
    }

    pub fn generation(&self) -> Uuid {
        self.generation
    }

    /// Temp directory of this generation under `temp_root`
    pub fn temp_dir(&self, temp_root: &Path) -> PathBuf {
        temp_root.join(self.generation.to_string())
    }

    pub fn push(&mut self, request: TaskRequest) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.push(DownloadTask::new(id, request));
        id
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: TaskId) -> Option<&DownloadTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> Option<&mut DownloadTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub(crate) fn at(&self, index: usize) -> Option<&DownloadTask> {
        self.tasks.get(index)
    }

    pub fn tasks(&self) -> &[DownloadTask] {
        &self.tasks
    }

    pub fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state == state).count()
    }

    /// Files that must survive a temp directory cleanup
    pub fn preserved_files(&self) -> impl Iterator<Item = &Path> {
        self.tasks.iter().filter_map(|t| t.preserved_temp.as_deref())
    }
}
