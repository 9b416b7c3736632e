//! Output file naming: title sanitizing and collision-free path allocation

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MAX_BASE_LEN: usize = 150;

/// Restrict a title to a portable character set.
///
/// ASCII letters, digits, `-`, `_` and `.` are kept, whitespace becomes `_`,
/// everything else is dropped. Runs of `_` collapse, leading dots are removed
/// and the result is never empty.
///
/// # Examples
/// ```
/// use rustcutter::utils::naming::sanitize_title;
/// assert_eq!(sanitize_title("My Video: Part 1"), "My_Video_Part_1");
/// assert_eq!(sanitize_title("../../etc/passwd"), "etcpasswd");
/// assert_eq!(sanitize_title("???"), "download");
/// ```
pub fn sanitize_title(title: &str) -> String {
    let mut sanitized = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            sanitized.push(c);
        } else if c == '.' {
            if !sanitized.ends_with('.') {
                sanitized.push(c);
            }
        } else if c.is_whitespace() {
            sanitized.push('_');
        }
    }

    while sanitized.contains("__") {
        sanitized = sanitized.replace("__", "_");
    }

    let trimmed = sanitized
        .trim_start_matches(['.', '_'])
        .trim_end_matches(['.', '_']);

    if trimmed.is_empty() {
        return "download".to_string();
    }

    // ASCII only, so byte slicing is safe
    trimmed[..trimmed.len().min(MAX_BASE_LEN)].to_string()
}

/// Picks a path in a directory that does not exist yet.
///
/// Tries `base.ext`, then `base_1.ext` up to `base_<max_suffix>.ext`, then
/// falls back to a timestamp suffix. The check is not atomic: callers must
/// use the path right away.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    max_suffix: u32,
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self { max_suffix: 1000 }
    }
}

impl NameAllocator {
    pub fn with_max_suffix(max_suffix: u32) -> Self {
        Self { max_suffix }
    }

    pub fn allocate(&self, directory: &Path, base_name: &str, extension: &str) -> PathBuf {
        let first = directory.join(file_name(base_name, None, extension));
        if !first.exists() {
            return first;
        }

        for n in 1..=self.max_suffix {
            let candidate = directory.join(file_name(base_name, Some(&n.to_string()), extension));
            if !candidate.exists() {
                debug!("Allocated {:?} after {} collisions", candidate, n);
                return candidate;
            }
        }

        warn!(
            "More than {} files named {}, falling back to a timestamp",
            self.max_suffix, base_name
        );
        let stamp = Utc::now().format("%Y%m%d_%H%M%S%.f").to_string();
        let mut candidate = directory.join(file_name(base_name, Some(&stamp), extension));
        let mut extra = 1u32;
        while candidate.exists() {
            candidate = directory.join(file_name(
                base_name,
                Some(&format!("{stamp}_{extra}")),
                extension,
            ));
            extra += 1;
        }
        candidate
    }
}

fn file_name(base: &str, suffix: Option<&str>, extension: &str) -> String {
    let mut name = base.to_string();
    if let Some(suffix) = suffix {
        name.push('_');
        name.push_str(suffix);
    }
    if !extension.is_empty() {
        name.push('.');
        name.push_str(extension.trim_start_matches('.'));
    }
    name
}
