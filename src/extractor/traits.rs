use crate::downloader::DownloadProgress;
use crate::extractor::models::{DownloadRequest, DownloadedMedia, ExtractorOptions, VideoInfo};
use crate::utils::error::DownloadError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Core trait for media extractors
///
/// This trait isolates the queue from the specific extraction tool.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns a unique identifier for this extractor (e.g., "yt-dlp")
    fn id(&self) -> &'static str;

    /// Resolve title and available formats without downloading
    async fn resolve_metadata(
        &self,
        url: &str,
        options: &ExtractorOptions,
    ) -> Result<VideoInfo, DownloadError>;

    /// Download with one format selector.
    ///
    /// Implementations send progress on `progress_tx`, check `cancel` at
    /// every progress point and return [`DownloadError::Aborted`] once it is
    /// set. A selector that matches no stream must fail with
    /// [`DownloadError::FormatUnavailable`].
    async fn download(
        &self,
        request: &DownloadRequest,
        progress_tx: mpsc::Sender<DownloadProgress>,
        cancel: CancellationToken,
    ) -> Result<DownloadedMedia, DownloadError>;
}
