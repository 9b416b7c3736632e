//! Quality tiers and format selector negotiation

pub mod cascade;
pub mod quality;

pub use cascade::{Container, FormatCascade, FormatSelector, Resolution};
pub use quality::{AudioBitrate, QualityTier};
