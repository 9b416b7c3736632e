//! User-facing quality choices

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested quality of a download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum QualityTier {
    #[default]
    Best,
    /// 1080p
    High,
    /// 720p
    Standard,
    AudioOnly,
}

impl QualityTier {
    /// Target video height, `None` for unconstrained or audio-only tiers
    pub fn target_height(&self) -> Option<u32> {
        match self {
            QualityTier::High => Some(1080),
            QualityTier::Standard => Some(720),
            QualityTier::Best | QualityTier::AudioOnly => None,
        }
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self, QualityTier::AudioOnly)
    }

    /// Suffix appended to output names so different settings never overwrite each other
    pub fn file_suffix(&self) -> &'static str {
        match self {
            QualityTier::Best => "_best",
            QualityTier::High => "_1080p",
            QualityTier::Standard => "_720p",
            QualityTier::AudioOnly => "_audio",
        }
    }

    /// Get string representation for display
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Best => "Best (Auto)",
            QualityTier::High => "1080p (Full HD)",
            QualityTier::Standard => "720p (HD)",
            QualityTier::AudioOnly => "Audio Only (MP3)",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "best" | "auto" => Ok(QualityTier::Best),
            "1080" | "1080p" | "high" => Ok(QualityTier::High),
            "720" | "720p" | "standard" => Ok(QualityTier::Standard),
            "audio" | "mp3" | "audio-only" => Ok(QualityTier::AudioOnly),
            other => Err(format!("unknown quality: {other}")),
        }
    }
}

/// Advisory audio bitrate, resolved when post-processing runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AudioBitrate {
    #[default]
    Auto,
    Kbps128,
    Kbps192,
    Kbps320,
}

impl AudioBitrate {
    const AUTO_KBPS: u32 = 192;

    /// Concrete encoder bitrate in kbit/s
    pub fn kbps(&self) -> u32 {
        match self {
            AudioBitrate::Auto => Self::AUTO_KBPS,
            AudioBitrate::Kbps128 => 128,
            AudioBitrate::Kbps192 => 192,
            AudioBitrate::Kbps320 => 320,
        }
    }

    /// Bitrate as an encoder argument, e.g. `192k`
    pub fn encoder_arg(&self) -> String {
        format!("{}k", self.kbps())
    }
}

impl FromStr for AudioBitrate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim_end_matches('k') {
            "auto" => Ok(AudioBitrate::Auto),
            "128" => Ok(AudioBitrate::Kbps128),
            "192" => Ok(AudioBitrate::Kbps192),
            "320" => Ok(AudioBitrate::Kbps320),
            other => Err(format!("unsupported bitrate: {other}")),
        }
    }
}
