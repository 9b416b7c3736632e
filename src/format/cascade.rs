//! Format fallback cascade
//!
//! Exact-resolution streams are often missing for a given asset, so every
//! tier expands into an ordered list of selectors: most specific first,
//! an alias that matches any playable stream last. The extractor walks the
//! list until one selector resolves.

use super::quality::QualityTier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relative width of the resolution band tried after the exact height
const BAND_TOLERANCE: f64 = 0.10;

/// Resolution constraint of a video selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Exact(u32),
    Band { min: u32, max: u32 },
    Any,
}

impl Resolution {
    fn band_around(height: u32) -> Self {
        let delta = (height as f64 * BAND_TOLERANCE).round() as u32;
        Resolution::Band {
            min: height.saturating_sub(delta),
            max: height + delta,
        }
    }

    fn filter(&self) -> String {
        match self {
            Resolution::Exact(h) => format!("[height={h}]"),
            Resolution::Band { min, max } => format!("[height>={min}][height<={max}]"),
            Resolution::Any => String::new(),
        }
    }
}

/// Preferred container for the video and audio streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    /// mp4 video with m4a audio, playable everywhere without remuxing
    Mp4,
}

impl Container {
    fn video_filter(&self) -> &'static str {
        match self {
            Container::Mp4 => "[ext=mp4]",
        }
    }

    fn audio_filter(&self) -> &'static str {
        match self {
            Container::Mp4 => "[ext=m4a]",
        }
    }
}

/// One structured entry of a cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatSelector {
    /// Separate video + audio streams (with a combined-stream fallback)
    Video {
        resolution: Resolution,
        container: Option<Container>,
    },
    /// Best audio-only stream
    BestAudio,
    /// Best audio stream, or whatever is playable
    AnyAudio,
    /// The extractor's own "best" alias
    AnyBest,
}

impl FormatSelector {
    /// Render the selector expression understood by yt-dlp
    pub fn to_selector_string(&self) -> String {
        match self {
            FormatSelector::Video {
                resolution,
                container,
            } => {
                let res = resolution.filter();
                match (resolution, container) {
                    (Resolution::Any, Some(c)) => format!(
                        "bestvideo{}+bestaudio{}",
                        c.video_filter(),
                        c.audio_filter()
                    ),
                    (_, Some(c)) => format!(
                        "bestvideo{res}{v}+bestaudio{a}/best{res}{v}",
                        v = c.video_filter(),
                        a = c.audio_filter()
                    ),
                    (Resolution::Any, None) => "bestvideo+bestaudio".to_string(),
                    (_, None) => format!("bestvideo{res}+bestaudio/best{res}"),
                }
            }
            FormatSelector::BestAudio => "bestaudio".to_string(),
            FormatSelector::AnyAudio => "bestaudio/best".to_string(),
            FormatSelector::AnyBest => "best".to_string(),
        }
    }

    /// True for the terminal aliases that match any available stream
    pub fn matches_anything(&self) -> bool {
        matches!(self, FormatSelector::AnyAudio | FormatSelector::AnyBest)
    }
}

impl fmt::Display for FormatSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_selector_string())
    }
}

/// Generates the ordered fallback list for a quality tier
pub struct FormatCascade;

impl FormatCascade {
    /// Ordered selectors to attempt; never empty, always ends in a catch-all
    pub fn resolve(tier: QualityTier) -> Vec<FormatSelector> {
        if tier.is_audio_only() {
            return vec![FormatSelector::BestAudio, FormatSelector::AnyAudio];
        }

        let mut selectors = Vec::with_capacity(5);
        match tier.target_height() {
            Some(height) => {
                selectors.push(FormatSelector::Video {
                    resolution: Resolution::Exact(height),
                    container: Some(Container::Mp4),
                });
                selectors.push(FormatSelector::Video {
                    resolution: Resolution::Exact(height),
                    container: None,
                });
                selectors.push(FormatSelector::Video {
                    resolution: Resolution::band_around(height),
                    container: None,
                });
            }
            None => selectors.push(FormatSelector::Video {
                resolution: Resolution::Any,
                container: Some(Container::Mp4),
            }),
        }
        selectors.push(FormatSelector::Video {
            resolution: Resolution::Any,
            container: None,
        });
        selectors.push(FormatSelector::AnyBest);
        selectors
    }
}
