//! Parsing and formatting of `HH:MM:SS` timecodes

use crate::utils::error::CutterError;

/// Parse `SS`, `MM:SS` or `HH:MM:SS` into whole seconds
pub fn parse_timecode(input: &str) -> Result<u64, CutterError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CutterError::InvalidTimecode(input.to_string()));
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return Err(CutterError::InvalidTimecode(input.to_string()));
    }

    let mut seconds = 0u64;
    for (i, part) in parts.iter().enumerate() {
        let value: u64 = part
            .trim()
            .parse()
            .map_err(|_| CutterError::InvalidTimecode(input.to_string()))?;
        // minutes and seconds fields after the first must stay below 60
        if i > 0 && value >= 60 {
            return Err(CutterError::InvalidTimecode(input.to_string()));
        }
        seconds = seconds
            .checked_mul(60)
            .and_then(|s| s.checked_add(value))
            .ok_or_else(|| CutterError::InvalidTimecode(input.to_string()))?;
    }

    Ok(seconds)
}

/// Format seconds as `H:MM:SS`
pub fn format_timecode(seconds: u64) -> String {
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
