//! Locating the external tools (yt-dlp, ffmpeg)
//!
//! Search order:
//! 1. An explicit directory from the settings
//! 2. Next to the executable (portable installs) or inside a macOS bundle
//! 3. System PATH
//! 4. Common installation paths (Homebrew, pip user installs)

use crate::utils::platform::exe_extension;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Find `name` using the standard search order
pub fn find_tool(name: &str, preferred_dir: Option<&Path>) -> Option<PathBuf> {
    let file_name = format!("{name}{}", exe_extension());

    if let Some(dir) = preferred_dir {
        let candidate = dir.join(&file_name);
        if is_executable(&candidate) {
            info!("Using {} from configured location: {:?}", name, candidate);
            return Some(candidate);
        }
        warn!("{} not found in configured location {:?}", name, dir);
    }

    if let Some(bundled) = find_bundled(&file_name) {
        info!("Using bundled {}: {:?}", name, bundled);
        return Some(bundled);
    }

    if let Ok(system) = which::which(&file_name) {
        info!("Using system {}: {:?}", name, system);
        return Some(system);
    }

    if let Some(common) = find_in_common_paths(&file_name) {
        info!("Using {} from common path: {:?}", name, common);
        return Some(common);
    }

    warn!("{} not found anywhere", name);
    None
}

fn find_bundled(file_name: &str) -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let exe_dir = exe_path.parent()?;

    let adjacent = exe_dir.join(file_name);
    if is_executable(&adjacent) {
        return Some(adjacent);
    }

    // App.app/Contents/MacOS/rustcutter -> App.app/Contents/Resources/bin/<tool>
    if exe_dir.ends_with("MacOS") {
        let bundled = exe_dir.parent()?.join("Resources").join("bin").join(file_name);
        debug!("Checking bundled path: {:?}", bundled);
        if is_executable(&bundled) {
            return Some(bundled);
        }
    }

    None
}

fn find_in_common_paths(file_name: &str) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"]
        .iter()
        .map(|dir| Path::new(dir).join(file_name))
        .collect();

    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".local").join("bin").join(file_name));
    }

    candidates.into_iter().find(|path| is_executable(path))
}

/// Check if a file is executable
pub fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        std::fs::metadata(path)
            .map(|metadata| metadata.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_tool() {
        assert!(find_tool("definitely-not-a-real-tool-4242", None).is_none());
    }

    #[test]
    fn test_is_executable_on_plain_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plain.txt");
        std::fs::write(&path, b"data").unwrap();

        #[cfg(unix)]
        assert!(!is_executable(&path));
        assert!(!is_executable(&temp.path().join("missing")));
    }

    #[cfg(unix)]
    #[test]
    fn test_preferred_dir_wins() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let tool = temp.path().join("fake-tool-rustcutter");
        std::fs::write(&tool, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = find_tool("fake-tool-rustcutter", Some(temp.path()));
        assert_eq!(found, Some(tool));
    }
}
