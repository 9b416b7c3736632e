//! Progress tracking for downloads

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Marker put in front of templated progress lines
pub const PROGRESS_MARKER: &str = "__RC_PROGRESS__";

/// Progress event reported by the extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub status: ProgressStatus,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub speed: Option<f64>, // bytes per second
    pub eta: Option<Duration>,
}

impl DownloadProgress {
    pub fn downloading(downloaded_bytes: u64, total_bytes: Option<u64>) -> Self {
        Self {
            status: ProgressStatus::Downloading,
            downloaded_bytes,
            total_bytes,
            speed: None,
            eta: None,
        }
    }

    pub fn finished(total_bytes: u64) -> Self {
        Self {
            status: ProgressStatus::Finished,
            downloaded_bytes: total_bytes,
            total_bytes: Some(total_bytes),
            speed: None,
            eta: Some(Duration::from_secs(0)),
        }
    }

    /// Set speed and derive the ETA from it
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self.eta = match self.total_bytes {
            Some(total) if speed > 0.0 && self.downloaded_bytes < total => Some(
                Duration::from_secs_f64((total - self.downloaded_bytes) as f64 / speed),
            ),
            Some(total) if self.downloaded_bytes >= total => Some(Duration::from_secs(0)),
            _ => None,
        };
        self
    }

    /// Get progress percentage (0.0 to 1.0)
    pub fn percentage(&self) -> f64 {
        match self.total_bytes {
            Some(total) if total > 0 => (self.downloaded_bytes as f64 / total as f64).min(1.0),
            _ => 0.0,
        }
    }
}

/// Status of a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProgressStatus {
    #[default]
    Downloading,
    Finished,
    Error,
}

/// `--progress-template` producing lines understood by [`parse_template_line`]
pub fn progress_template() -> String {
    format!(
        "download:{PROGRESS_MARKER}%(progress.status)s|%(progress.downloaded_bytes)s|\
         %(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s"
    )
}

/// Parse a line produced by [`progress_template`]
///
/// Missing fields are printed as `NA` by the tool.
pub fn parse_template_line(line: &str) -> Option<DownloadProgress> {
    let payload = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let mut fields = payload.split('|');

    let status = match fields.next()?.trim() {
        "downloading" => ProgressStatus::Downloading,
        "finished" => ProgressStatus::Finished,
        "error" => ProgressStatus::Error,
        _ => return None,
    };
    let downloaded = parse_number(fields.next()).map(|n| n as u64).unwrap_or(0);
    let total = parse_number(fields.next());
    let estimate = parse_number(fields.next());
    let speed = parse_number(fields.next());

    let progress = DownloadProgress {
        status,
        downloaded_bytes: downloaded,
        total_bytes: total.or(estimate).map(|n| n as u64),
        speed: None,
        eta: None,
    };
    Some(match speed {
        Some(speed) => progress.with_speed(speed),
        None => progress,
    })
}

fn parse_number(field: Option<&str>) -> Option<f64> {
    field?.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse the classic progress line
/// `[download]  42.5% of ~ 150.00MiB at  5.20MiB/s ETA 00:15`
pub fn parse_legacy_line(line: &str) -> Option<DownloadProgress> {
    if !line.contains("[download]") || !line.contains('%') {
        return None;
    }

    let pct_pos = line.find('%')?;
    let pct: f64 = line[..pct_pos].split_whitespace().last()?.parse().ok()?;

    let total = line.find(" of ").and_then(|of_idx| {
        let after = line[of_idx + 4..].trim_start().trim_start_matches('~').trim_start();
        let end = after.find(" at ").unwrap_or(after.len());
        parse_size(after[..end].split_whitespace().next()?)
    });

    let speed = line.find(" at ").and_then(|at_idx| {
        let after = &line[at_idx + 4..];
        let slash = after.find("/s")?;
        parse_size(after[..slash].trim())
    });

    let downloaded = total.map(|t| (t as f64 * pct / 100.0) as u64).unwrap_or(0);
    let status = if pct >= 100.0 {
        ProgressStatus::Finished
    } else {
        ProgressStatus::Downloading
    };
    let progress = DownloadProgress {
        status,
        downloaded_bytes: downloaded,
        total_bytes: total,
        speed: None,
        eta: None,
    };
    Some(match speed {
        Some(speed) => progress.with_speed(speed as f64),
        None => progress,
    })
}

/// Parse sizes such as `150.00MiB`, `512KiB` or `42B`
fn parse_size(token: &str) -> Option<u64> {
    let idx = token
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    if idx == 0 {
        return None;
    }
    let num: f64 = token[..idx].parse().ok()?;
    let multiplier = match token[idx..].trim() {
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "KB" => 1000.0,
        "MB" => 1000.0 * 1000.0,
        "GB" => 1000.0 * 1000.0 * 1000.0,
        _ => 1.0,
    };
    Some((num * multiplier) as u64)
}
