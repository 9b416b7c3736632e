use super::messages::{BackendCommand, BackendEvent};
use crate::extractor::{Extractor, YtDlpExtractor};
use crate::queue::{QueueEvent, QueueManager, WorkerConfig};
use crate::transcoder::{FfmpegTranscoder, Transcoder};
use crate::utils::config::AppSettings;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

pub struct BackendActor {
    receiver: mpsc::Receiver<BackendCommand>,
    sender: mpsc::Sender<BackendEvent>,

    // Components
    queue_manager: Arc<QueueManager>,
    updater: Option<Arc<YtDlpExtractor>>,
}

impl BackendActor {
    pub async fn new(
        settings: AppSettings,
        receiver: mpsc::Receiver<BackendCommand>,
        sender: mpsc::Sender<BackendEvent>,
    ) -> Result<Self> {
        let tool_dir = settings
            .ffmpeg_location
            .as_deref()
            .map(|p| if p.is_dir() { p } else { p.parent().unwrap_or(p) });

        let ytdlp = Arc::new(YtDlpExtractor::new(tool_dir)?);
        info!("Using yt-dlp at {}", ytdlp.ytdlp_path().display());
        let ffmpeg = FfmpegTranscoder::new(tool_dir)?;
        info!("Using ffmpeg at {}", ffmpeg.ffmpeg_path().display());

        let config = WorkerConfig::from_settings(&settings);
        let mut actor = Self::with_components(
            ytdlp.clone(),
            Arc::new(ffmpeg),
            config,
            receiver,
            sender,
        );
        actor.updater = Some(ytdlp);
        Ok(actor)
    }

    /// Build around explicit collaborators
    pub fn with_components(
        extractor: Arc<dyn Extractor>,
        transcoder: Arc<dyn Transcoder>,
        config: WorkerConfig,
        receiver: mpsc::Receiver<BackendCommand>,
        sender: mpsc::Sender<BackendEvent>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(256);
        tokio::spawn(Self::forward_queue_events(queue_rx, sender.clone()));

        let queue_manager = Arc::new(QueueManager::new(extractor, transcoder, config, queue_tx));
        Self {
            receiver,
            sender,
            queue_manager,
            updater: None,
        }
    }

    pub fn queue_manager(&self) -> Arc<QueueManager> {
        self.queue_manager.clone()
    }

    pub async fn run(mut self) {
        info!("BackendActor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                BackendCommand::Enqueue(request) => {
                    let task_id = self.queue_manager.enqueue(request.clone()).await;
                    self.emit(BackendEvent::TaskAdded { task_id, request }).await;
                }
                BackendCommand::ResolveTitle { url } => {
                    self.handle_resolve_title(url);
                }
                BackendCommand::Start => {
                    if let Err(e) = self.queue_manager.start().await {
                        self.emit(BackendEvent::Error(e.to_string())).await;
                    }
                }
                BackendCommand::Stop => {
                    self.queue_manager.stop().await;
                }
                BackendCommand::HardReset => {
                    if let Err(e) = self.queue_manager.hard_reset().await {
                        error!("Hard reset failed: {}", e);
                        self.emit(BackendEvent::Error(e.to_string())).await;
                    }
                }
                BackendCommand::UpdateCore => {
                    self.handle_update_core().await;
                }
                BackendCommand::Shutdown => {
                    info!("BackendActor shutting down");
                    self.queue_manager.stop().await;
                    self.queue_manager.wait().await;
                    break;
                }
            }
        }
    }

    /// Title lookups run in the background so the command loop stays responsive
    fn handle_resolve_title(&self, url: String) {
        let manager = self.queue_manager.clone();
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let title = manager
                .resolve_title(&url)
                .await
                .map(|info| info.title)
                .map_err(|e| e.user_message());
            let _ = sender.send(BackendEvent::TitleResolved { url, title }).await;
        });
    }

    async fn handle_update_core(&self) {
        let Some(updater) = self.updater.clone() else {
            self.emit(BackendEvent::UpdateFinished(Err(
                "No updatable extractor configured".to_string(),
            )))
            .await;
            return;
        };

        let sender = self.sender.clone();
        tokio::spawn(async move {
            let result = updater.self_update().await.map_err(|e| e.to_string());
            let _ = sender.send(BackendEvent::UpdateFinished(result)).await;
        });
    }

    async fn forward_queue_events(
        mut queue_rx: mpsc::Receiver<QueueEvent>,
        sender: mpsc::Sender<BackendEvent>,
    ) {
        while let Some(event) = queue_rx.recv().await {
            if sender.send(BackendEvent::Queue(event)).await.is_err() {
                break;
            }
        }
    }

    async fn emit(&self, event: BackendEvent) {
        let _ = self.sender.send(event).await;
    }
}
