//! File watcher for config hot-reload.
//!
//! Watches `~/.config/hoverterm/hoverterm.toml` and reloads on change.
//! The callback receives the freshly parsed `Config`; the caller forwards
//! it to the event loop (via the winit proxy) to apply on the UI thread.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};

use crate::config::Config;

// ---------------------------------------------------------------------------
// File I/O helpers
// ---------------------------------------------------------------------------

/// Write the default TOML content to `path` if the file does not already exist.
/// Creates parent directories as needed.
pub fn ensure_default_toml(path: &Path, default_content: &str) {
    if path.exists() {
        return;
    }
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!("config_watcher: failed to create config dir {}: {e}", parent.display());
            return;
        }
    }
    if let Err(e) = std::fs::write(path, default_content) {
        eprintln!("config_watcher: failed to write default config at {}: {e}", path.display());
    }
}

// ---------------------------------------------------------------------------
// Low-level watcher
// ---------------------------------------------------------------------------

/// Spawn a file watcher on the *parent directory* of `path`.
///
/// Editors like vim/nano write to a temp file then rename, which means watching
/// the file directly misses changes. Watching the parent directory and filtering
/// by filename handles this correctly.
///
/// `on_change` is called whenever the target file is created or modified.
pub fn spawn_watcher<F>(path: PathBuf, on_change: F) -> notify::Result<RecommendedWatcher>
where
    F: Fn() + Send + 'static,
{
    let target_filename = path
        .file_name()
        .ok_or_else(|| notify::Error::generic("config path must have a filename"))?
        .to_os_string();

    let parent = path
        .parent()
        .ok_or_else(|| notify::Error::generic("config path must have a parent directory"))?
        .to_path_buf();

    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        match res {
            Ok(event) => {
                // Only react to Create or Modify events.
                let relevant = matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_)
                );
                if !relevant {
                    return;
                }

                // Check if any of the affected paths match our target filename.
                let affects_target = event.paths.iter().any(|p| {
                    p.file_name()
                        .map(|f| f == target_filename)
                        .unwrap_or(false)
                });

                if affects_target {
                    on_change();
                }
            }
            Err(e) => {
                eprintln!("config_watcher: watch error: {e}");
            }
        }
    })?;

    watcher.watch(&parent, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ---------------------------------------------------------------------------
// High-level ConfigFileWatcher
// ---------------------------------------------------------------------------

/// Owns a file-system watcher for the config file and provides a clean API
/// for the rest of the application.
pub struct ConfigFileWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl ConfigFileWatcher {
    /// Start watching the config file at `path`. Calls `on_reload` with the
    /// parsed `Config` whenever the file changes (parse errors fall back to
    /// defaults inside `Config::load`, so the callback always gets a value).
    ///
    /// If the file does not exist, a well-commented default is written first.
    pub fn start<F>(path: PathBuf, on_reload: F) -> notify::Result<Self>
    where
        F: Fn(Config) + Send + 'static,
    {
        // Ensure the default TOML exists so the user has something to edit.
        ensure_default_toml(&path, &default_toml_content());

        let watched_path = path.clone();
        let watcher = spawn_watcher(path.clone(), move || {
            on_reload(Config::load(&watched_path));
        })?;

        Ok(Self {
            _watcher: watcher,
            path,
        })
    }

    /// Get the path being watched.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Default TOML template
// ---------------------------------------------------------------------------

/// Generate a well-commented default TOML file with all settings.
///
/// Values match the compiled defaults so that the file is a no-op on first
/// load but gives the user a complete reference.
pub fn default_toml_content() -> String {
    r##"# hoverterm configuration — edit this file and save; changes apply live.
# Any missing values use compiled defaults. Delete a line to reset it.

[font]
file = ""           # Path to a monospace font file. Empty = auto-discover.
size = 15.0         # Font size in pixels (zoom at runtime with Cmd+= / Cmd+-)

[colors]
background = "#1e1e1e"
foreground = "#d4d4d4"
cursor = "#d4d4d4"
# The 16 ANSI palette entries, normal then bright.
ansi = [
  "#000000", "#cd3131", "#0dbc79", "#e5e510",
  "#2472c8", "#bc3fbc", "#11a8cd", "#e5e5e5",
  "#666666", "#f14c4c", "#23d18b", "#f5f543",
  "#3b8eea", "#d670d6", "#29b8db", "#ffffff",
]

[shell]
program = ""        # Program to launch. Empty = $SHELL.
args = []
working_dir = ""    # Working directory for the shell. Empty = $HOME.

# Extra environment variables for the child shell:
# [shell.env]
# MY_VAR = "value"

[terminal]
scrollback = 10000  # Scrollback history in lines
"##
    .to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_toml_is_valid() {
        let content = default_toml_content();
        let parsed: Result<toml::Value, _> = toml::from_str(&content);
        assert!(
            parsed.is_ok(),
            "Default TOML failed to parse: {:?}",
            parsed.err()
        );

        // Verify key sections exist.
        let value = parsed.unwrap();
        let table = value.as_table().expect("TOML root should be a table");
        for section in &["font", "colors", "shell", "terminal"] {
            assert!(
                table.contains_key(*section),
                "Missing section: [{section}]"
            );
        }
    }

    #[test]
    fn test_default_toml_matches_compiled_defaults() {
        let parsed = Config::from_toml(&default_toml_content()).expect("template parses");
        let compiled = Config::default();
        assert_eq!(parsed.colors.background, compiled.colors.background);
        assert_eq!(parsed.colors.ansi, compiled.colors.ansi);
        assert!((parsed.font.size - compiled.font.size).abs() < f32::EPSILON);
        assert_eq!(parsed.terminal.scrollback, compiled.terminal.scrollback);
    }

    #[test]
    fn test_ensure_default_creates_file() {
        let dir = std::env::temp_dir().join(format!(
            "hoverterm_test_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let path = dir.join("hoverterm.toml");

        assert!(!path.exists());
        ensure_default_toml(&path, "# test content\nfoo = 42\n");
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("foo = 42"));

        // Cleanup.
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_ensure_default_does_not_overwrite() {
        let dir = std::env::temp_dir().join(format!(
            "hoverterm_test_no_overwrite_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hoverterm.toml");

        // Write existing content.
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "# user customized").unwrap();
        drop(f);

        // Call ensure_default — should NOT overwrite.
        ensure_default_toml(&path, "# default content\n");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(
            content.contains("user customized"),
            "ensure_default_toml should not overwrite existing file"
        );

        // Cleanup.
        let _ = std::fs::remove_dir_all(&dir);
    }
}
