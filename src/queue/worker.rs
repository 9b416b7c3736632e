//! Sequential queue worker
//!
//! One task at a time, in queue order: cascade negotiation with the
//! extractor into a temp path keyed by the task id, optional trim or audio
//! conversion, then a move to a collision-free final name.

use super::events::{QueueEvent, RunOutcome, RunSummary};
use super::task::{DownloadTask, TaskId, TaskQueue, TaskRequest, TaskState};
use crate::downloader::{cleanup_artifacts, move_file, remove_quietly, DownloadProgress, ProgressStatus};
use crate::extractor::{DownloadRequest, DownloadedMedia, Extractor, ExtractorOptions, Postprocess};
use crate::format::FormatCascade;
use crate::transcoder::{AudioJob, Transcoder, TrimJob, TrimProfile};
use crate::utils::config::AppSettings;
use crate::utils::error::DownloadError;
use crate::utils::naming::{sanitize_title, NameAllocator};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Worker settings taken from the application settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub download_dir: PathBuf,
    /// Per-generation temp directories are created below this
    pub temp_root: PathBuf,
    pub stall_timeout: Duration,
    /// Minimum spacing of forwarded progress events per task
    pub progress_interval: Duration,
    pub options: ExtractorOptions,
}

impl WorkerConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            download_dir: settings.download_dir.clone(),
            temp_root: std::env::temp_dir().join("rustcutter"),
            stall_timeout: settings.stall_timeout(),
            progress_interval: Duration::from_millis(100),
            options: ExtractorOptions::from(settings),
        }
    }
}

/// Failure of one task, with the pre-trim file when it was kept
#[derive(Debug)]
struct TaskFailure {
    error: DownloadError,
    preserved_temp: Option<PathBuf>,
}

impl From<DownloadError> for TaskFailure {
    fn from(error: DownloadError) -> Self {
        Self {
            error,
            preserved_temp: None,
        }
    }
}

impl From<std::io::Error> for TaskFailure {
    fn from(e: std::io::Error) -> Self {
        DownloadError::Io(e).into()
    }
}

/// Post-processing the extractor is asked for
///
/// Fragments are fetched untouched and re-encoded by the trim step.
pub fn extractor_postprocess(request: &TaskRequest) -> Postprocess {
    if request.is_fragment() {
        Postprocess::None
    } else if request.quality.is_audio_only() {
        Postprocess::ExtractAudio {
            bitrate: request.audio_bitrate,
        }
    } else if request.convert_to_container {
        Postprocess::MergeMp4
    } else {
        Postprocess::None
    }
}

pub fn trim_profile(request: &TaskRequest) -> TrimProfile {
    if request.quality.is_audio_only() {
        TrimProfile::Mp3
    } else if request.convert_to_container {
        TrimProfile::Mp4
    } else {
        TrimProfile::Native
    }
}

/// Human-readable output base name, without extension
pub fn output_base_name(title: &str, request: &TaskRequest) -> String {
    let mut name = sanitize_title(title);
    name.push_str(request.quality.file_suffix());
    if let Some(range) = &request.range {
        name.push_str(&range.file_suffix());
    }
    name
}

/// Next progress event; `None` when `window` elapses first
async fn next_progress(
    rx: &mut mpsc::Receiver<DownloadProgress>,
    window: Option<Duration>,
) -> Option<Option<DownloadProgress>> {
    match window {
        Some(window) => tokio::time::timeout(window, rx.recv()).await.ok(),
        None => Some(rx.recv().await),
    }
}

pub struct Worker {
    queue: Arc<Mutex<TaskQueue>>,
    extractor: Arc<dyn Extractor>,
    transcoder: Arc<dyn Transcoder>,
    config: WorkerConfig,
    events: mpsc::Sender<QueueEvent>,
    names: NameAllocator,
}

impl Worker {
    pub fn new(
        queue: Arc<Mutex<TaskQueue>>,
        extractor: Arc<dyn Extractor>,
        transcoder: Arc<dyn Transcoder>,
        config: WorkerConfig,
        events: mpsc::Sender<QueueEvent>,
    ) -> Self {
        Self {
            queue,
            extractor,
            transcoder,
            config,
            events,
            names: NameAllocator::default(),
        }
    }

    /// Process every Pending task until the queue is exhausted or `cancel` fires
    pub async fn run(self, cancel: CancellationToken) -> RunSummary {
        let temp_dir = self.queue.lock().await.temp_dir(&self.config.temp_root);
        let mut summary = RunSummary::new(RunOutcome::Completed);
        let mut index = 0;

        info!("Worker started (temp dir {})", temp_dir.display());

        loop {
            if cancel.is_cancelled() {
                summary.outcome = RunOutcome::Aborted;
                break;
            }

            let next = {
                let queue = self.queue.lock().await;
                queue
                    .at(index)
                    .map(|task| (task.id, task.state, task.request.clone()))
            };
            let Some((id, state, request)) = next else { break };
            index += 1;

            if state != TaskState::Pending {
                debug!("Skipping task {} ({})", id, state);
                continue;
            }

            match self.process(id, &request, &temp_dir, &cancel).await {
                Ok(path) => {
                    self.finish_done(id, path).await;
                    summary.done += 1;
                }
                Err(failure) if matches!(failure.error, DownloadError::Aborted) => {
                    info!("Task {} aborted, stopping the queue", id);
                    cleanup_task(&temp_dir, id).await;
                    self.set_state(id, TaskState::Aborted).await;
                    summary.aborted += 1;
                    summary.outcome = RunOutcome::Aborted;
                    break;
                }
                Err(failure) => {
                    if failure.preserved_temp.is_none() {
                        cleanup_task(&temp_dir, id).await;
                    }
                    self.finish_error(id, failure).await;
                    summary.failed += 1;
                }
            }
        }

        summary.pending = self.queue.lock().await.count(TaskState::Pending);
        info!(
            "Worker finished: {:?}, {} done, {} failed, {} aborted, {} pending",
            summary.outcome, summary.done, summary.failed, summary.aborted, summary.pending
        );
        summary
    }

    async fn process(
        &self,
        id: TaskId,
        request: &TaskRequest,
        temp_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, TaskFailure> {
        self.set_state(id, TaskState::Fetching).await;
        tokio::fs::create_dir_all(temp_dir).await?;

        let media = self.fetch(id, request, temp_dir, cancel).await?;
        // A download without progress events still passes through Downloading
        self.set_state(id, TaskState::Downloading).await;

        let title = self.record_title(id, &media).await;
        let finished = self.postprocess(id, request, media, temp_dir, cancel).await?;

        let ext = finished
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let base = output_base_name(&title, request);
        tokio::fs::create_dir_all(&self.config.download_dir).await?;
        let destination = self.names.allocate(&self.config.download_dir, &base, &ext);
        move_file(&finished, &destination).await?;

        Ok(destination)
    }

    /// Walk the format cascade until one selector downloads
    async fn fetch(
        &self,
        id: TaskId,
        request: &TaskRequest,
        temp_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<DownloadedMedia, DownloadError> {
        let cascade = FormatCascade::resolve(request.quality);
        let postprocess = extractor_postprocess(request);
        let mut last_error = None;

        for (attempt, selector) in cascade.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(DownloadError::Aborted);
            }
            debug!("Task {} attempt {}: {}", id, attempt + 1, selector);

            let download = DownloadRequest {
                url: request.url.clone(),
                selector: *selector,
                output_stem: temp_dir.join(format!("task-{id}")),
                postprocess,
                options: self.config.options.clone(),
            };

            match self.download_watched(id, &download, cancel).await {
                Ok(media) => return Ok(media),
                Err(e) if e.is_format_unavailable() => {
                    info!("Task {}: selector {} unavailable, trying next", id, selector);
                    cleanup_task(temp_dir, id).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| DownloadError::FormatUnavailable("no format matched".to_string())))
    }

    /// Run one extractor call, failing it when progress stops arriving
    ///
    /// The watchdog is disarmed by a `Finished` event, so post-processing
    /// done by the extractor itself runs unwatched until a new stream
    /// starts downloading.
    async fn download_watched(
        &self,
        id: TaskId,
        request: &DownloadRequest,
        cancel: &CancellationToken,
    ) -> Result<DownloadedMedia, DownloadError> {
        let stall = self.config.stall_timeout;
        let (progress_tx, mut progress_rx) = mpsc::channel::<DownloadProgress>(64);
        let download = self.extractor.download(request, progress_tx, cancel.clone());
        tokio::pin!(download);

        let mut last_forward: Option<Instant> = None;
        let mut armed = true;
        loop {
            let window = armed.then_some(stall);
            tokio::select! {
                biased;
                result = &mut download => return result,
                received = next_progress(&mut progress_rx, window) => match received {
                    Some(Some(progress)) => {
                        armed = progress.status != ProgressStatus::Finished;
                        self.on_progress(id, progress, &mut last_forward).await;
                    }
                    Some(None) if armed => {
                        return tokio::time::timeout(stall, &mut download)
                            .await
                            .unwrap_or(Err(DownloadError::Stalled(stall)));
                    }
                    Some(None) => return download.await,
                    None => {
                        warn!("Task {} stalled: no progress for {:?}", id, stall);
                        return Err(DownloadError::Stalled(stall));
                    }
                },
            }
        }
    }

    async fn on_progress(
        &self,
        id: TaskId,
        progress: DownloadProgress,
        last_forward: &mut Option<Instant>,
    ) {
        if progress.status == ProgressStatus::Downloading {
            self.set_state(id, TaskState::Downloading).await;
        }

        if let Some(task) = self.queue.lock().await.get_mut(id) {
            task.progress = Some(progress.clone());
        }

        let due = last_forward.map_or(true, |at| at.elapsed() >= self.config.progress_interval);
        if progress.status == ProgressStatus::Finished || due {
            *last_forward = Some(Instant::now());
            let _ = self.events.try_send(QueueEvent::Progress {
                task_id: id,
                progress,
            });
        }
    }

    async fn record_title(&self, id: TaskId, media: &DownloadedMedia) -> String {
        let title = {
            let mut queue = self.queue.lock().await;
            match queue.get_mut(id) {
                Some(task) if !media.title.is_empty() => {
                    task.title = Some(media.title.clone());
                    media.title.clone()
                }
                Some(task) => task.title.clone().unwrap_or_default(),
                None => media.title.clone(),
            }
        };

        if !title.is_empty() {
            self.emit(QueueEvent::TitleKnown {
                task_id: id,
                title: title.clone(),
            })
            .await;
        }
        title
    }

    /// Trim fragments, convert stray audio containers, otherwise pass through
    async fn postprocess(
        &self,
        id: TaskId,
        request: &TaskRequest,
        media: DownloadedMedia,
        temp_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, TaskFailure> {
        if let Some(range) = request.range {
            self.set_state(id, TaskState::Postprocessing).await;
            let profile = trim_profile(request);
            let ext = profile.output_extension(&media.ext);
            let job = TrimJob {
                input: media.path.clone(),
                output: temp_dir.join(format!("task-{id}.cut.{ext}")),
                start: range.start(),
                end: range.end(),
                profile,
                bitrate: request.audio_bitrate,
            };

            return match self.transcoder.trim(&job, cancel.clone()).await {
                Ok(trimmed) => {
                    remove_quietly(&media.path).await;
                    Ok(trimmed)
                }
                Err(DownloadError::Aborted) => Err(DownloadError::Aborted.into()),
                Err(error) => {
                    warn!(
                        "Trim failed for task {}, keeping {}",
                        id,
                        media.path.display()
                    );
                    Err(TaskFailure {
                        error,
                        preserved_temp: Some(media.path),
                    })
                }
            };
        }

        if request.quality.is_audio_only() && media.ext != "mp3" {
            self.set_state(id, TaskState::Postprocessing).await;
            let job = AudioJob {
                input: media.path.clone(),
                output: temp_dir.join(format!("task-{id}.audio.mp3")),
                bitrate: request.audio_bitrate,
            };
            let converted = self.transcoder.extract_audio(&job, cancel.clone()).await?;
            remove_quietly(&media.path).await;
            return Ok(converted);
        }

        Ok(media.path)
    }

    async fn set_state(&self, id: TaskId, state: TaskState) {
        let changed = {
            let mut queue = self.queue.lock().await;
            match queue.get_mut(id) {
                Some(task) if task.state == state => false,
                Some(task) => {
                    let from = task.state;
                    if task.advance(state) {
                        info!("Task {}: {} -> {}", id, from, state);
                        true
                    } else {
                        warn!("Task {}: illegal transition {} -> {}", id, from, state);
                        false
                    }
                }
                None => false,
            }
        };

        if changed {
            self.emit(QueueEvent::StateChanged {
                task_id: id,
                state,
                timestamp: Utc::now(),
            })
            .await;
        }
    }

    async fn finish_done(&self, id: TaskId, path: PathBuf) {
        self.set_state(id, TaskState::Done).await;
        if let Some(task) = self.queue.lock().await.get_mut(id) {
            task.output_path = Some(path.clone());
        }
        info!("Task {} saved to {}", id, path.display());
        self.emit(QueueEvent::TaskCompleted {
            task_id: id,
            output_path: path,
            timestamp: Utc::now(),
        })
        .await;
    }

    async fn finish_error(&self, id: TaskId, failure: TaskFailure) {
        let message = failure.error.user_message();
        error!("Task {} failed: {}", id, message);

        self.set_state(id, TaskState::Error).await;
        if let Some(task) = self.queue.lock().await.get_mut(id) {
            record_failure(task, &message, failure.preserved_temp.clone());
        }
        self.emit(QueueEvent::TaskFailed {
            task_id: id,
            error: message,
            preserved_temp: failure.preserved_temp,
            timestamp: Utc::now(),
        })
        .await;
    }

    async fn emit(&self, event: QueueEvent) {
        let _ = self.events.send(event).await;
    }
}

fn record_failure(task: &mut DownloadTask, message: &str, preserved_temp: Option<PathBuf>) {
    task.error = Some(message.to_string());
    task.preserved_temp = preserved_temp;
}

async fn cleanup_task(temp_dir: &Path, id: TaskId) {
    match cleanup_artifacts(temp_dir, &format!("task-{id}.")).await {
        Ok(0) => {}
        Ok(n) => debug!("Removed {} temp files of task {}", n, id),
        Err(e) => warn!("Temp cleanup for task {} failed: {}", id, e),
    }
}
