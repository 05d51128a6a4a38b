//! User configuration for hoverterm.
//!
//! All user-tunable settings (font, colors, shell launch, scrollback) are
//! gathered into a single `Config` struct that can be serialized to/from
//! TOML and threaded through the app. Every field has a default so a
//! missing file, or a file with missing keys, always yields a usable
//! configuration.

use std::collections::BTreeMap;
use std::path::Path;

use vello::peniko::Color;

/// Root configuration container.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct Config {
    pub font: FontConfig,
    pub colors: ColorConfig,
    pub shell: ShellConfig,
    pub terminal: TerminalConfig,
}

// --- Sub-structs ---

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct FontConfig {
    /// Path to a font file. Empty means auto-discover a system monospace font.
    pub file: String,
    pub size: f32,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Hex colors, `#rrggbb`.
    pub background: String,
    pub foreground: String,
    pub cursor: String,
    /// The 16 ANSI palette entries, normal then bright.
    pub ansi: Vec<String>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Program to launch. Empty means `$SHELL` (or the platform fallback).
    pub program: String,
    pub args: Vec<String>,
    /// Working directory for the child. Empty means `$HOME`.
    pub working_dir: String,
    /// Extra environment variables for the child.
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct TerminalConfig {
    /// Scrollback history in lines.
    pub scrollback: usize,
}

// ---------------------------------------------------------------------------
// Default implementations
// ---------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            font: FontConfig::default(),
            colors: ColorConfig::default(),
            shell: ShellConfig::default(),
            terminal: TerminalConfig::default(),
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            file: String::new(),
            size: 15.0,
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            background: "#1e1e1e".to_string(),
            foreground: "#d4d4d4".to_string(),
            cursor: "#d4d4d4".to_string(),
            ansi: vec![
                "#000000".to_string(),
                "#cd3131".to_string(),
                "#0dbc79".to_string(),
                "#e5e510".to_string(),
                "#2472c8".to_string(),
                "#bc3fbc".to_string(),
                "#11a8cd".to_string(),
                "#e5e5e5".to_string(),
                "#666666".to_string(),
                "#f14c4c".to_string(),
                "#23d18b".to_string(),
                "#f5f543".to_string(),
                "#3b8eea".to_string(),
                "#d670d6".to_string(),
                "#29b8db".to_string(),
                "#ffffff".to_string(),
            ],
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            working_dir: String::new(),
            env: BTreeMap::new(),
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self { scrollback: 10_000 }
    }
}

// ---------------------------------------------------------------------------
// Helper methods
// ---------------------------------------------------------------------------

impl Config {
    /// Background color as a vello `Color`.
    pub fn bg_color(&self) -> Color {
        parse_hex(&self.colors.background)
            .unwrap_or_else(|| parse_default(&ColorConfig::default().background))
    }

    /// Default foreground color.
    pub fn fg_color(&self) -> Color {
        parse_hex(&self.colors.foreground)
            .unwrap_or_else(|| parse_default(&ColorConfig::default().foreground))
    }

    /// Cursor block color.
    pub fn cursor_color(&self) -> Color {
        parse_hex(&self.colors.cursor)
            .unwrap_or_else(|| parse_default(&ColorConfig::default().cursor))
    }

    /// One of the 16 ANSI palette entries. Out-of-range or unparsable
    /// entries fall back to the built-in palette.
    pub fn ansi_color(&self, index: usize) -> Color {
        if let Some(hex) = self.colors.ansi.get(index)
            && let Some(color) = parse_hex(hex)
        {
            return color;
        }
        let defaults = ColorConfig::default();
        parse_default(defaults.ansi.get(index).map(String::as_str).unwrap_or("#d4d4d4"))
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialize from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load from a file. A missing file yields the defaults; an unreadable
    /// or unparsable file logs a warning and yields the defaults, so a bad
    /// edit never takes the terminal down.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match Self::from_toml(&text) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("config parse error in {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!("failed to read config {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

/// Parse `#rrggbb` (leading `#` optional) into an opaque color.
pub fn parse_hex(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some(Color::new([
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        1.0,
    ]))
}

/// Parse a color literal that is known to come from the built-in defaults.
fn parse_default(hex: &str) -> Color {
    parse_hex(hex).unwrap_or(Color::new([0.83, 0.83, 0.83, 1.0]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let c = Config::default();
        assert!(c.font.file.is_empty());
        assert!((c.font.size - 15.0).abs() < f32::EPSILON);
        assert_eq!(c.colors.ansi.len(), 16);
        assert_eq!(c.terminal.scrollback, 10_000);
        assert!(c.shell.program.is_empty());
    }

    #[test]
    fn toml_roundtrip() {
        let original = Config::default();
        let toml_str = original.to_toml();
        let parsed = Config::from_toml(&toml_str).expect("roundtrip parse failed");

        assert_eq!(parsed.colors.background, original.colors.background);
        assert_eq!(parsed.colors.ansi, original.colors.ansi);
        assert!((parsed.font.size - original.font.size).abs() < f32::EPSILON);
        assert_eq!(parsed.terminal.scrollback, original.terminal.scrollback);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let partial = r#"
[font]
size = 18.0

[shell]
program = "/bin/fish"
"#;
        let c = Config::from_toml(partial).expect("partial parse failed");
        // Overridden values
        assert!((c.font.size - 18.0).abs() < f32::EPSILON);
        assert_eq!(c.shell.program, "/bin/fish");
        // Default values for everything else
        assert_eq!(c.colors.background, "#1e1e1e");
        assert_eq!(c.terminal.scrollback, 10_000);
    }

    #[test]
    fn invalid_toml_errs() {
        let bad = "this is not [[ valid toml";
        assert!(Config::from_toml(bad).is_err());
    }

    #[test]
    fn hex_parsing() {
        let c = parse_hex("#ff8000").expect("valid hex");
        assert!((c.components[0] - 1.0).abs() < 0.005);
        assert!((c.components[1] - 0x80 as f32 / 255.0).abs() < 0.005);
        assert!(c.components[2].abs() < 0.005);

        assert!(parse_hex("0dbc79").is_some());
        assert!(parse_hex("#fff").is_none());
        assert!(parse_hex("#gggggg").is_none());
        assert!(parse_hex("").is_none());
    }

    #[test]
    fn bad_color_falls_back() {
        let mut c = Config::default();
        c.colors.background = "not-a-color".to_string();
        // Falls back to the default background rather than panicking.
        let expected = parse_hex("#1e1e1e").expect("default parses");
        assert_eq!(c.bg_color().components, expected.components);
    }

    #[test]
    fn ansi_out_of_range_falls_back() {
        let c = Config::default();
        let fallback = c.ansi_color(99);
        assert_eq!(fallback.components, parse_hex("#d4d4d4").expect("hex").components);
    }

    #[test]
    fn load_missing_file_is_default() {
        let path = std::env::temp_dir().join(format!(
            "hoverterm_cfg_missing_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let c = Config::load(&path);
        assert_eq!(c.terminal.scrollback, 10_000);
    }
}
