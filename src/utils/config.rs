//! Application configuration

use crate::format::AudioBitrate;
use crate::utils::error::CutterError;
use crate::utils::platform;
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Interface language code ("ru", "en")
    pub language: String,

    /// Write a log file next to the settings
    pub logging_enabled: bool,

    /// Ignore any system proxy when talking to the extractor's sources
    pub proxy_disabled: bool,

    /// JavaScript runtime handed to the extractor (e.g. "deno", "node")
    pub js_runtime: Option<String>,

    /// Browser to borrow cookies from
    pub cookie_source: CookieSource,

    /// Where finished files land
    pub download_dir: PathBuf,

    /// Directory containing ffmpeg/ffprobe, if not on PATH
    pub ffmpeg_location: Option<PathBuf>,

    /// Idle window before a download without progress is failed
    pub stall_timeout_secs: u64,

    /// Bitrate hint used when a request does not pick one
    pub default_audio_bitrate: AudioBitrate,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            language: "ru".to_string(),
            logging_enabled: true,
            proxy_disabled: false,
            js_runtime: None,
            cookie_source: CookieSource::Disabled,
            download_dir: platform::default_download_dir(),
            ffmpeg_location: None,
            stall_timeout_secs: 300,
            default_audio_bitrate: AudioBitrate::Auto,
        }
    }
}

impl AppSettings {
    /// Load settings, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, CutterError> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path)?;
        let mut settings: AppSettings = serde_json::from_slice(&bytes)?;
        settings.normalize();
        Ok(settings)
    }

    /// Persist settings as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), CutterError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, format!("{json}\n"))?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs.max(1))
    }

    /// Enforce sane values after loading or CLI overrides
    pub fn normalize(&mut self) {
        if self.stall_timeout_secs == 0 {
            self.stall_timeout_secs = 300;
        }
        if let Ok(absolute) = self.download_dir.absolutize() {
            self.download_dir = absolute.into_owned();
        }
    }
}

/// Browser cookie source for the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CookieSource {
    #[default]
    Disabled,
    Chrome,
    Edge,
    Firefox,
    Opera,
    Yandex,
}

impl CookieSource {
    /// Browser name as the extractor expects it, `None` when disabled
    pub fn browser(&self) -> Option<&'static str> {
        match self {
            CookieSource::Disabled => None,
            CookieSource::Chrome => Some("chrome"),
            CookieSource::Edge => Some("edge"),
            CookieSource::Firefox => Some("firefox"),
            CookieSource::Opera => Some("opera"),
            CookieSource::Yandex => Some("yandex"),
        }
    }
}

impl std::str::FromStr for CookieSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disabled" | "none" | "off" => Ok(CookieSource::Disabled),
            "chrome" => Ok(CookieSource::Chrome),
            "edge" => Ok(CookieSource::Edge),
            "firefox" => Ok(CookieSource::Firefox),
            "opera" => Ok(CookieSource::Opera),
            "yandex" => Ok(CookieSource::Yandex),
            other => Err(format!("unknown cookie source: {other}")),
        }
    }
}
