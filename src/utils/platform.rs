//! Platform-specific directories
//!
//! - Settings: `<config dir>/rustcutter/settings.json`
//! - Logs: `<state or data dir>/rustcutter/rustcutter.log`
//! - Downloads: `~/Downloads/rustcutter`

use std::path::PathBuf;

const APP_DIR: &str = "rustcutter";

/// Returns the default download directory
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(APP_DIR)
}

/// Returns the configuration directory
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Returns the default settings file path
pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Returns the log directory
pub fn log_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Platform-specific executable extension
pub fn exe_extension() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        ".exe"
    }
    #[cfg(not(target_os = "windows"))]
    {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_are_app_scoped() {
        assert!(default_download_dir().ends_with(APP_DIR));
        assert!(config_dir().ends_with(APP_DIR));
        assert!(log_dir().ends_with(APP_DIR));
        assert_eq!(
            settings_path().file_name().and_then(|n| n.to_str()),
            Some("settings.json")
        );
    }
}
