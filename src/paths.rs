//! Application directory structure for hoverterm.
//!
//! Provides a single `AppPaths` struct that resolves the standard directories
//! and ensures they exist on first launch. Follows macOS conventions:
//!
//! - Config:    `~/.config/hoverterm/`  (human-editable, XDG-style)
//! - Data:      `~/Library/Application Support/com.hoverterm.hoverterm/`
//! - Logs:      `~/Library/Logs/hoverterm/`
//!
//! On non-macOS, falls back to XDG paths.

use std::path::{Path, PathBuf};
use tracing::info;

#[cfg(target_os = "macos")]
const BUNDLE_ID: &str = "com.hoverterm.hoverterm";
const APP_NAME: &str = "hoverterm";

/// All resolved application directory paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Human-editable config: `~/.config/hoverterm/`
    pub config: PathBuf,
    /// Machine-managed application data root
    pub data: PathBuf,
    /// Application logs
    pub logs: PathBuf,
}

impl AppPaths {
    /// Resolve all paths from the user's home directory.
    /// Does not create any directories — call `ensure()` for that.
    pub fn resolve() -> Option<Self> {
        let home = std::env::var("HOME").ok().map(PathBuf::from)?;

        Some(Self {
            config: resolve_config_dir(&home),
            data: resolve_data_dir(&home),
            logs: resolve_log_dir(&home),
        })
    }

    /// Create all directories that don't already exist.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.config, &self.data, &self.logs] {
            std::fs::create_dir_all(dir)?;
            info!("ensured directory: {}", dir.display());
        }
        Ok(())
    }

    /// Path of the config file inside the config directory.
    pub fn config_file(&self) -> PathBuf {
        self.config.join("hoverterm.toml")
    }
}

/// Log directory without requiring a full `AppPaths` (used before init).
pub fn log_dir() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok().map(PathBuf::from)?;
    Some(resolve_log_dir(&home))
}

// ---------------------------------------------------------------------------
// Platform-specific path resolution
// ---------------------------------------------------------------------------

fn resolve_config_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join(APP_NAME)
    } else {
        home.join(".config").join(APP_NAME)
    }
}

#[cfg(target_os = "macos")]
fn resolve_data_dir(home: &Path) -> PathBuf {
    home.join("Library")
        .join("Application Support")
        .join(BUNDLE_ID)
}

#[cfg(not(target_os = "macos"))]
fn resolve_data_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg).join(APP_NAME)
    } else {
        home.join(".local").join("share").join(APP_NAME)
    }
}

#[cfg(target_os = "macos")]
fn resolve_log_dir(home: &Path) -> PathBuf {
    home.join("Library").join("Logs").join(APP_NAME)
}

#[cfg(not(target_os = "macos"))]
fn resolve_log_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg).join(APP_NAME).join("logs")
    } else {
        home.join(".local").join("share").join(APP_NAME).join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_produces_valid_paths() {
        let paths = AppPaths::resolve().expect("HOME should be set in tests");
        assert!(paths.config.to_string_lossy().contains("hoverterm"));
        assert!(paths.data.to_string_lossy().contains("hoverterm"));
        assert!(paths.config_file().ends_with("hoverterm.toml"));
    }

    #[test]
    fn ensure_creates_directories() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");

        let paths = AppPaths {
            config: tmp.path().join("config"),
            data: tmp.path().join("data"),
            logs: tmp.path().join("logs"),
        };

        paths.ensure().expect("ensure should succeed");

        assert!(paths.config.is_dir());
        assert!(paths.data.is_dir());
        assert!(paths.logs.is_dir());
    }
}
