//! Download session: owns the queue and serializes start/stop/reset

use super::events::{QueueEvent, RunSummary};
use super::task::{DownloadTask, TaskId, TaskQueue, TaskRequest};
use super::worker::{Worker, WorkerConfig};
use crate::downloader::clear_temp_dir;
use crate::extractor::{Extractor, VideoInfo};
use crate::transcoder::Transcoder;
use crate::utils::error::{CutterError, DownloadError};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Run state of the session's worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopping,
}

/// Handle and abort signal of the current run
struct RunControl {
    cancel: CancellationToken,
    handle: Option<JoinHandle<RunSummary>>,
}

/// Download session owning the task queue and its worker
pub struct QueueManager {
    queue: Arc<Mutex<TaskQueue>>,
    state: Arc<watch::Sender<RunState>>,
    control: Mutex<RunControl>,
    /// Held by `start` and `hard_reset` for their whole duration
    transition: Mutex<()>,
    extractor: Arc<dyn Extractor>,
    transcoder: Arc<dyn Transcoder>,
    config: WorkerConfig,
    events: mpsc::Sender<QueueEvent>,
}

impl QueueManager {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        transcoder: Arc<dyn Transcoder>,
        config: WorkerConfig,
        events: mpsc::Sender<QueueEvent>,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            queue: Arc::new(Mutex::new(TaskQueue::new())),
            state: Arc::new(state),
            control: Mutex::new(RunControl {
                cancel: CancellationToken::new(),
                handle: None,
            }),
            transition: Mutex::new(()),
            extractor,
            transcoder,
            config,
            events,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Watch run state changes
    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Append a task; allowed in any run state
    pub async fn enqueue(&self, request: TaskRequest) -> TaskId {
        let mut queue = self.queue.lock().await;
        let id = queue.push(request);
        info!("Added task {} to queue", id);
        id
    }

    /// Start the worker; only from Idle
    pub async fn start(&self) -> Result<(), CutterError> {
        let _transition = self.transition.lock().await;
        // Held until the new token is in place so `stop` cannot cancel a stale one
        let mut control = self.control.lock().await;

        let mut started = false;
        self.state.send_if_modified(|state| {
            if *state == RunState::Idle {
                *state = RunState::Running;
                started = true;
            }
            started
        });
        if !started {
            return Err(CutterError::AlreadyRunning(self.state()));
        }

        let cancel = CancellationToken::new();
        let worker = Worker::new(
            self.queue.clone(),
            self.extractor.clone(),
            self.transcoder.clone(),
            self.config.clone(),
            self.events.clone(),
        );
        let state = self.state.clone();
        let events = self.events.clone();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let summary = worker.run(token).await;
            state.send_replace(RunState::Idle);
            let _ = events.send(QueueEvent::QueueFinished(summary.clone())).await;
            summary
        });

        control.cancel = cancel;
        control.handle = Some(handle);
        info!("Queue started");
        Ok(())
    }

    /// Ask the running worker to stop at its next poll point
    ///
    /// Returns false when nothing was running.
    pub async fn stop(&self) -> bool {
        let control = self.control.lock().await;
        let stopping = self.state.send_if_modified(|state| {
            if *state == RunState::Running {
                *state = RunState::Stopping;
                true
            } else {
                false
            }
        });

        if stopping {
            info!("Stopping queue");
            control.cancel.cancel();
        }
        stopping
    }

    /// Wait for the current run to finish
    pub async fn wait(&self) -> Option<RunSummary> {
        let handle = self.control.lock().await.handle.take();
        let summary = match handle {
            Some(handle) => self.join(handle).await,
            None => None,
        };

        let mut rx = self.state.subscribe();
        if rx.wait_for(|state| *state == RunState::Idle).await.is_err() {
            warn!("Run state channel closed");
        }
        summary
    }

    async fn join(&self, handle: JoinHandle<RunSummary>) -> Option<RunSummary> {
        match handle.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!("Worker task failed: {}", e);
                self.state.send_replace(RunState::Idle);
                None
            }
        }
    }

    /// Stop, wait for the worker to exit, then drop every task
    ///
    /// Temp files of the old generation are removed, except pre-trim files
    /// kept after failed trims.
    pub async fn hard_reset(&self) -> Result<(), CutterError> {
        let _transition = self.transition.lock().await;
        self.stop().await;
        self.wait().await;

        let (temp_dir, keep) = {
            let mut queue = self.queue.lock().await;
            let temp_dir = queue.temp_dir(&self.config.temp_root);
            let keep: HashSet<PathBuf> = queue.preserved_files().map(PathBuf::from).collect();
            *queue = TaskQueue::new();
            (temp_dir, keep)
        };

        debug!("Clearing temp dir {}", temp_dir.display());
        clear_temp_dir(&temp_dir, &keep).await?;

        info!("Queue cleared");
        let _ = self.events.send(QueueEvent::QueueCleared).await;
        Ok(())
    }

    /// Copy of every task for display
    pub async fn snapshot(&self) -> Vec<DownloadTask> {
        self.queue.lock().await.tasks().to_vec()
    }

    pub async fn task(&self, id: TaskId) -> Result<DownloadTask, CutterError> {
        self.queue
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or(CutterError::TaskNotFound(id))
    }

    /// Metadata preview, independent of the download path
    pub async fn resolve_title(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        self.extractor.resolve_metadata(url, &self.config.options).await
    }
}
