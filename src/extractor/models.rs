//! Data structures exchanged with the extractor

use crate::format::{AudioBitrate, FormatSelector};
use crate::utils::config::{AppSettings, CookieSource};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Video information structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    #[serde(alias = "webpage_url")]
    pub url: String,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
    pub formats: Vec<Format>,
    pub extractor: Option<String>,
}

/// Video format information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Format {
    pub format_id: String,
    pub ext: String,
    pub resolution: Option<String>,
    pub filesize: Option<u64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub format_note: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub tbr: Option<f32>, // Total bitrate
}

/// Options forwarded to every extractor invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractorOptions {
    pub proxy_disabled: bool,
    pub js_runtime: Option<String>,
    pub cookie_source: CookieSource,
    pub ffmpeg_location: Option<PathBuf>,
}

impl From<&AppSettings> for ExtractorOptions {
    fn from(settings: &AppSettings) -> Self {
        Self {
            proxy_disabled: settings.proxy_disabled,
            js_runtime: settings.js_runtime.clone(),
            cookie_source: settings.cookie_source,
            ffmpeg_location: settings.ffmpeg_location.clone(),
        }
    }
}

/// Post-processing the extractor performs itself after fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Postprocess {
    /// Keep whatever container the streams came in
    None,
    /// Merge/remux into mp4 and re-encode audio to AAC
    MergeMp4,
    /// Extract an mp3 track
    ExtractAudio { bitrate: AudioBitrate },
}

/// A single download attempt with one selector
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub selector: FormatSelector,
    /// Output path without extension; the extractor appends the negotiated one
    pub output_stem: PathBuf,
    pub postprocess: Postprocess,
    pub options: ExtractorOptions,
}

/// Result of a successful download
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedMedia {
    /// Final file as written by the extractor
    pub path: PathBuf,
    pub title: String,
    pub ext: String,
}

impl DownloadedMedia {
    pub fn new(path: PathBuf, title: impl Into<String>) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        Self {
            path,
            title: title.into(),
            ext,
        }
    }
}
