//! Scripted in-process collaborators for driving the queue without network or binaries

#![allow(dead_code)]

use async_trait::async_trait;
use rustcutter::downloader::DownloadProgress;
use rustcutter::extractor::{
    DownloadRequest, DownloadedMedia, Extractor, ExtractorOptions, VideoInfo,
};
use rustcutter::queue::{QueueEvent, QueueManager, TaskId, TaskState, WorkerConfig};
use rustcutter::transcoder::{AudioJob, Transcoder, TrimJob};
use rustcutter::utils::DownloadError;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What one `download` call does
#[derive(Debug, Clone)]
pub enum Step {
    /// Leave a partial file behind and report the selector as unavailable
    FormatUnavailable,
    Fail(&'static str),
    Succeed {
        ext: &'static str,
        title: &'static str,
        progress: usize,
        delay: Duration,
    },
    /// Finish the transfer, then spend `delay` post-processing without progress
    SlowFinish {
        ext: &'static str,
        title: &'static str,
        delay: Duration,
    },
    /// Keep reporting progress until cancelled
    Busy,
    /// Never report anything
    Silent,
}

impl Step {
    pub fn ok(ext: &'static str, title: &'static str) -> Self {
        Step::Succeed {
            ext,
            title,
            progress: 3,
            delay: Duration::from_millis(1),
        }
    }
}

#[derive(Default)]
pub struct ScriptedExtractor {
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<DownloadRequest>>,
}

impl ScriptedExtractor {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    pub fn calls(&self) -> Vec<DownloadRequest> {
        self.calls.lock().unwrap().clone()
    }
}

fn with_ext(stem: &Path, ext: &str) -> PathBuf {
    let mut name = stem.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    fn id(&self) -> &'static str {
        "scripted"
    }

    async fn resolve_metadata(
        &self,
        url: &str,
        _options: &ExtractorOptions,
    ) -> Result<VideoInfo, DownloadError> {
        Ok(VideoInfo {
            title: "Preview".to_string(),
            url: url.to_string(),
            ..Default::default()
        })
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress_tx: mpsc::Sender<DownloadProgress>,
        cancel: CancellationToken,
    ) -> Result<DownloadedMedia, DownloadError> {
        self.calls.lock().unwrap().push(request.clone());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Step::ok("mp4", "Default"));

        match step {
            Step::FormatUnavailable => {
                tokio::fs::write(with_ext(&request.output_stem, "f1.part"), b"partial").await?;
                Err(DownloadError::classify(
                    "ERROR: [generic] x: Requested format is not available",
                ))
            }
            Step::Fail(message) => Err(DownloadError::classify(message)),
            Step::Succeed {
                ext,
                title,
                progress,
                delay,
            } => {
                let total = 100 * progress as u64;
                for i in 0..progress {
                    if cancel.is_cancelled() {
                        return Err(DownloadError::Aborted);
                    }
                    let _ = progress_tx
                        .send(DownloadProgress::downloading(100 * i as u64, Some(total)))
                        .await;
                    tokio::time::sleep(delay).await;
                }
                let _ = progress_tx.send(DownloadProgress::finished(total)).await;

                let path = with_ext(&request.output_stem, ext);
                tokio::fs::write(&path, b"media").await?;
                Ok(DownloadedMedia::new(path, title))
            }
            Step::SlowFinish { ext, title, delay } => {
                let _ = progress_tx.send(DownloadProgress::downloading(50, Some(100))).await;
                let _ = progress_tx.send(DownloadProgress::finished(100)).await;
                tokio::time::sleep(delay).await;

                let path = with_ext(&request.output_stem, ext);
                tokio::fs::write(&path, b"media").await?;
                Ok(DownloadedMedia::new(path, title))
            }
            Step::Busy => {
                tokio::fs::write(with_ext(&request.output_stem, "mp4.part"), b"partial").await?;
                let mut downloaded = 0;
                loop {
                    if cancel.is_cancelled() {
                        return Err(DownloadError::Aborted);
                    }
                    downloaded += 10;
                    let _ = progress_tx
                        .send(DownloadProgress::downloading(downloaded, None))
                        .await;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
            Step::Silent => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(DownloadError::Other("woke up".to_string()))
            }
        }
    }
}

#[derive(Default)]
pub struct ScriptedTranscoder {
    fail_trim: bool,
    /// Trims run until cancelled
    hang_trim: bool,
    trims: Mutex<Vec<TrimJob>>,
    audio_jobs: Mutex<Vec<AudioJob>>,
}

impl ScriptedTranscoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_trim: true,
            ..Default::default()
        })
    }

    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            hang_trim: true,
            ..Default::default()
        })
    }

    pub fn trims(&self) -> Vec<TrimJob> {
        self.trims.lock().unwrap().clone()
    }

    pub fn audio_jobs(&self) -> Vec<AudioJob> {
        self.audio_jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for ScriptedTranscoder {
    async fn trim(&self, job: &TrimJob, cancel: CancellationToken) -> Result<PathBuf, DownloadError> {
        self.trims.lock().unwrap().push(job.clone());
        if self.hang_trim {
            tokio::fs::write(&job.output, b"half").await?;
            cancel.cancelled().await;
            return Err(DownloadError::Aborted);
        }
        if self.fail_trim {
            return Err(DownloadError::ToolFailed {
                tool: "ffmpeg".to_string(),
                code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        tokio::fs::write(&job.output, b"trimmed").await?;
        Ok(job.output.clone())
    }

    async fn extract_audio(
        &self,
        job: &AudioJob,
        _cancel: CancellationToken,
    ) -> Result<PathBuf, DownloadError> {
        self.audio_jobs.lock().unwrap().push(job.clone());
        tokio::fs::write(&job.output, b"audio").await?;
        Ok(job.output.clone())
    }
}

pub fn worker_config(root: &Path) -> WorkerConfig {
    WorkerConfig {
        download_dir: root.join("out"),
        temp_root: root.join("tmp"),
        stall_timeout: Duration::from_secs(5),
        progress_interval: Duration::ZERO,
        options: ExtractorOptions::default(),
    }
}

/// State changes of one task, in emission order
pub fn drain_states(events: &mut mpsc::Receiver<QueueEvent>, task_id: TaskId) -> Vec<TaskState> {
    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::StateChanged {
            task_id: id, state, ..
        } = event
        {
            if id == task_id {
                states.push(state);
            }
        }
    }
    states
}

/// Every event currently buffered
pub fn drain(events: &mut mpsc::Receiver<QueueEvent>) -> Vec<QueueEvent> {
    let mut all = Vec::new();
    while let Ok(event) = events.try_recv() {
        all.push(event);
    }
    all
}

/// Poll the session until a task reaches `state`
pub async fn wait_for_state(manager: &QueueManager, id: TaskId, state: TaskState) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(task) = manager.task(id).await {
                if task.state == state {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "task {id} never reached {state}");
}

/// Files in `dir` (empty when it does not exist)
pub fn list_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}
