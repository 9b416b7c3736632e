//! Temporary file housekeeping

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Move a finished file into place, copying when a rename crosses filesystems
pub async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("Rename {:?} -> {:?} failed ({}), copying instead", from, to, e);
            copy_then_remove(from, to).await
        }
    }
}

/// Copy `from` to `to`, then drop the source
///
/// Once the copy is complete the move has succeeded; a source that cannot be
/// removed is only logged.
async fn copy_then_remove(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::copy(from, to).await?;
    remove_quietly(from).await;
    Ok(())
}

/// Remove a file if it exists, logging instead of failing
pub async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed temporary file: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Remove every file in `dir` whose name starts with `prefix`
///
/// Used for partial downloads (`.part`, `.ytdl`, intermediate streams) left
/// behind when a download fails.
pub async fn cleanup_artifacts(dir: &Path, prefix: &str) -> std::io::Result<usize> {
    let mut removed = 0;
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with(prefix) {
            remove_quietly(&entry.path()).await;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Empty and remove a temp directory, keeping the listed files
pub async fn clear_temp_dir(dir: &Path, keep: &HashSet<PathBuf>) -> std::io::Result<()> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if keep.contains(&path) {
            continue;
        }
        if entry.file_type().await?.is_dir() {
            fs::remove_dir_all(&path).await?;
        } else {
            remove_quietly(&path).await;
        }
    }

    if keep.is_empty() {
        fs::remove_dir(dir).await?;
    }
    Ok(())
}
