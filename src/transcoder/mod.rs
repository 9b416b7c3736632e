//! Post-download media processing (fragment trimming, audio extraction)

pub mod ffmpeg;

pub use ffmpeg::{audio_args, trim_args, FfmpegTranscoder};

use crate::format::AudioBitrate;
use crate::utils::error::DownloadError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Codec choice for a trimmed fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimProfile {
    /// H.264 video + AAC audio in an mp4 container
    Mp4,
    /// Container default encoders, source extension kept
    Native,
    /// mp3 audio only
    Mp3,
}

impl TrimProfile {
    /// Extension of the trimmed output, `source_ext` is used by `Native`
    pub fn output_extension<'a>(&self, source_ext: &'a str) -> &'a str {
        match self {
            TrimProfile::Mp4 => "mp4",
            TrimProfile::Native => source_ext,
            TrimProfile::Mp3 => "mp3",
        }
    }
}

/// Cut `[start, end)` seconds out of `input` and re-encode it into `output`
#[derive(Debug, Clone)]
pub struct TrimJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub start: u64,
    pub end: u64,
    pub profile: TrimProfile,
    pub bitrate: AudioBitrate,
}

impl TrimJob {
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}

/// Convert `input` into an mp3 file at `output`
#[derive(Debug, Clone)]
pub struct AudioJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub bitrate: AudioBitrate,
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn trim(&self, job: &TrimJob, cancel: CancellationToken) -> Result<PathBuf, DownloadError>;

    async fn extract_audio(
        &self,
        job: &AudioJob,
        cancel: CancellationToken,
    ) -> Result<PathBuf, DownloadError>;
}
