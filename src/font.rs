//! Monospace font loading and cell-geometry derivation.
//!
//! The terminal grid is laid out from a `(cell_width, cell_height)` pair
//! derived from the active font: height from ascent, descent and leading,
//! width from the advance of a reference glyph (capital `W`, which
//! approximates the widest monospace glyph and gives a stable cell width).
//! The pair is recomputed whenever the font or its size changes.

use anyhow::Context;
use vello::peniko::FontData;

/// Minimum font size.
pub const MIN_FONT_SIZE: f32 = 8.0;
/// Maximum font size.
pub const MAX_FONT_SIZE: f32 = 72.0;
/// Font size step per Cmd+=/Cmd+-.
pub const FONT_SIZE_STEP: f32 = 2.0;

/// Well-known monospace font locations, searched in order.
#[cfg(target_os = "macos")]
const MONO_FONT_PATHS: &[&str] = &[
    "/System/Library/Fonts/Monaco.ttf",
    "/System/Library/Fonts/Menlo.ttc",
    "/System/Library/Fonts/Supplemental/Menlo.ttc",
    "/System/Library/Fonts/SFNSMono.ttf",
    "/Library/Fonts/Monaco.ttf",
];

#[cfg(not(target_os = "macos"))]
const MONO_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationMono-Regular.ttf",
    "/usr/share/fonts/truetype/ubuntu/UbuntuMono-R.ttf",
    "/usr/share/fonts/noto/NotoSansMono-Regular.ttf",
];

/// Load the terminal font.
///
/// `config_file` is the user-configured font path; when empty, the
/// well-known system locations are searched in order. There is no bundled
/// fallback, so startup fails with a descriptive error if nothing loads.
pub fn load_terminal_font(config_file: &str) -> anyhow::Result<FontData> {
    if !config_file.is_empty() {
        let data = std::fs::read(config_file)
            .with_context(|| format!("failed to read configured font {config_file}"))?;
        return Ok(FontData::new(data.into(), 0));
    }
    for path in MONO_FONT_PATHS {
        if let Ok(data) = std::fs::read(path) {
            tracing::info!("loaded terminal font from {path}");
            return Ok(FontData::new(data.into(), 0));
        }
    }
    anyhow::bail!(
        "no monospace font found; set [font] file in the config to a font path"
    )
}

/// Compute cell dimensions for a monospace font at the given size.
///
/// Returns `None` when the font cannot yield valid metrics (unparsable
/// data, missing reference glyph, non-finite or non-positive results).
/// Valid dimensions are clamped to at least one pixel each.
pub fn cell_geometry(font_data: &FontData, font_size: f32) -> Option<(f32, f32)> {
    let font_ref =
        skrifa::FontRef::from_index(font_data.data.as_ref(), font_data.index).ok()?;

    use skrifa::MetadataProvider;
    let size = skrifa::instance::Size::new(font_size);
    let location = skrifa::instance::LocationRef::default();

    let charmap = font_ref.charmap();
    let w_gid = charmap.map('W')?;
    let glyph_metrics = font_ref.glyph_metrics(size, location);
    let advance = glyph_metrics.advance_width(w_gid)?;

    let metrics = font_ref.metrics(size, location);
    // skrifa reports descent as a negative distance below the baseline.
    let height = metrics.ascent - metrics.descent + metrics.leading;

    validate_geometry(advance, height)
}

/// Reject degenerate metrics so downstream grid math never divides by
/// zero or a negative; clamp valid values to a one-pixel floor.
fn validate_geometry(width: f32, height: f32) -> Option<(f32, f32)> {
    if !width.is_finite() || !height.is_finite() {
        return None;
    }
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some((width.max(1.0), height.max(1.0)))
}

/// Cell dimensions used for layout when metrics are unavailable.
///
/// Rough monospace estimates so the renderer can still produce a grid.
pub fn fallback_geometry(font_size: f32) -> (f32, f32) {
    (font_size * 0.6, font_size * 1.4)
}

/// Clamp a requested font size to the supported range.
pub fn clamp_font_size(size: f32) -> f32 {
    size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_degenerate_metrics() {
        assert!(validate_geometry(0.0, 20.0).is_none());
        assert!(validate_geometry(9.0, 0.0).is_none());
        assert!(validate_geometry(-4.0, 20.0).is_none());
        assert!(validate_geometry(9.0, -1.0).is_none());
        assert!(validate_geometry(f32::NAN, 20.0).is_none());
        assert!(validate_geometry(9.0, f32::INFINITY).is_none());
    }

    #[test]
    fn validate_clamps_to_one_pixel() {
        let (w, h) = validate_geometry(0.25, 0.5).expect("positive metrics are valid");
        assert!((w - 1.0).abs() < f32::EPSILON);
        assert!((h - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn validate_passes_normal_metrics() {
        let (w, h) = validate_geometry(9.0, 20.0).expect("normal metrics");
        assert!((w - 9.0).abs() < f32::EPSILON);
        assert!((h - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn clamp_bounds() {
        assert!((clamp_font_size(1.0) - MIN_FONT_SIZE).abs() < f32::EPSILON);
        assert!((clamp_font_size(500.0) - MAX_FONT_SIZE).abs() < f32::EPSILON);
        assert!((clamp_font_size(15.0) - 15.0).abs() < f32::EPSILON);
    }

    #[test]
    fn fallback_scales_with_size() {
        let (w, h) = fallback_geometry(10.0);
        assert!((w - 6.0).abs() < 0.001);
        assert!((h - 14.0).abs() < 0.001);
    }
}
