//! Tab management for terminal panes.
//!
//! A flat list of tabs with one active at a time. The strip across the
//! top of the window appears once a second tab is open; with a single
//! tab the terminal gets the full window.

use tracing::{info, warn};
use vello::Glyph;
use vello::Scene;
use vello::kurbo::{Affine, Rect};
use vello::peniko::{Color, Fill, FontData};

use crate::config::Config;
use crate::links::UrlMatch;
use crate::terminal::TerminalPane;

pub const TAB_BAR_HEIGHT: f64 = 28.0;
const TAB_MAX_WIDTH: f64 = 220.0;
const TAB_LABEL_SIZE: f32 = 12.0;
const TAB_BAR_BG: Color = Color::new([0.10, 0.10, 0.12, 1.0]);
const TAB_ACTIVE_BG: Color = Color::new([0.18, 0.18, 0.21, 1.0]);
const TAB_TEXT: Color = Color::new([0.83, 0.83, 0.83, 1.0]);
const TAB_TEXT_DIM: Color = Color::new([0.55, 0.55, 0.58, 1.0]);

pub struct TabManager {
    tabs: Vec<TerminalPane>,
    active: usize,
    /// Tab index that keyboard focus moves to on the next event-loop turn.
    /// A freshly spawned tab is not focused synchronously; the switch is
    /// committed from `about_to_wait`, after the open event unwinds.
    pending_select: Option<usize>,
    /// Font used for tab labels (same face as the terminal).
    font: FontData,
}

impl TabManager {
    /// Create the manager with one initial tab.
    ///
    /// `command` and `working_dir` apply to the first tab only; tabs opened
    /// later run the configured shell.
    pub fn new(
        config: &Config,
        font: FontData,
        width: f64,
        height: f64,
        command: Option<&[String]>,
        working_dir: Option<&str>,
    ) -> anyhow::Result<Self> {
        let pane = TerminalPane::spawn(config, font.clone(), width, height, command, working_dir)?;
        Ok(Self {
            tabs: vec![pane],
            active: 0,
            pending_select: None,
            font,
        })
    }

    /// Open a new tab running the configured shell and schedule the focus
    /// switch for the next event-loop turn.
    pub fn open_tab(&mut self, config: &Config, width: f64, height: f64) {
        let (w, h) = self.content_size_for(self.tabs.len() + 1, width, height);
        match TerminalPane::spawn(config, self.font.clone(), w, h, None, None) {
            Ok(pane) => {
                self.tabs.push(pane);
                self.pending_select = Some(self.tabs.len() - 1);
                self.layout(width, height);
                info!(tabs = self.tabs.len(), "opened tab");
            }
            Err(e) => {
                warn!("failed to spawn terminal for new tab: {e:#}");
            }
        }
    }

    /// Close the active tab. Returns `false` if that was the last tab,
    /// in which case the caller should exit.
    pub fn close_active(&mut self, width: f64, height: f64) -> bool {
        if self.tabs.is_empty() {
            return false;
        }
        // Dropping the pane tears down its PTY and shell.
        self.tabs.remove(self.active);
        // Any scheduled focus switch points at pre-close indices now.
        self.pending_select = None;
        if self.tabs.is_empty() {
            return false;
        }
        if self.active >= self.tabs.len() {
            self.active = self.tabs.len() - 1;
        }
        self.layout(width, height);
        true
    }

    /// Select a tab by index (0-based). Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) {
        if index < self.tabs.len() {
            self.active = index;
            self.pending_select = None;
        }
    }

    pub fn next_tab(&mut self) {
        if self.tabs.len() > 1 {
            self.active = (self.active + 1) % self.tabs.len();
            self.pending_select = None;
        }
    }

    pub fn prev_tab(&mut self) {
        if self.tabs.len() > 1 {
            self.active = (self.active + self.tabs.len() - 1) % self.tabs.len();
            self.pending_select = None;
        }
    }

    /// Apply a deferred focus switch. Returns `true` if the active tab
    /// changed and a redraw is needed.
    pub fn commit_pending_select(&mut self) -> bool {
        match self.pending_select.take() {
            Some(index) if index < self.tabs.len() && index != self.active => {
                self.active = index;
                true
            }
            Some(_) => false,
            None => false,
        }
    }

    pub fn active_pane(&self) -> Option<&TerminalPane> {
        self.tabs.get(self.active)
    }

    pub fn active_pane_mut(&mut self) -> Option<&mut TerminalPane> {
        self.tabs.get_mut(self.active)
    }

    /// The tab under a window-space point, when the strip is visible.
    pub fn tab_at(&self, x: f64, y: f64, width: f64) -> Option<usize> {
        if !self.bar_visible() || y < 0.0 || y >= TAB_BAR_HEIGHT || x < 0.0 {
            return None;
        }
        let tab_w = (width / self.tabs.len() as f64).min(TAB_MAX_WIDTH);
        let index = (x / tab_w).floor() as usize;
        (index < self.tabs.len()).then_some(index)
    }

    /// Vertical offset of the terminal content area.
    pub fn content_origin_y(&self) -> f64 {
        if self.bar_visible() { TAB_BAR_HEIGHT } else { 0.0 }
    }

    fn bar_visible(&self) -> bool {
        self.tabs.len() > 1
    }

    fn content_size_for(&self, tab_count: usize, width: f64, height: f64) -> (f64, f64) {
        let bar = if tab_count > 1 { TAB_BAR_HEIGHT } else { 0.0 };
        (width, (height - bar).max(0.0))
    }

    /// Drain PTY output for every tab so background shells stay live.
    pub fn drain_all_output(&mut self) {
        for pane in &mut self.tabs {
            pane.drain_output();
        }
    }

    /// Resize every tab to the current content area.
    pub fn layout(&mut self, width: f64, height: f64) {
        let (w, h) = self.content_size_for(self.tabs.len(), width, height);
        for pane in &mut self.tabs {
            pane.resize(w, h);
        }
    }

    /// Push reloaded settings to every tab.
    pub fn apply_config_all(&mut self, config: &Config) {
        for pane in &mut self.tabs {
            pane.apply_config(config);
        }
    }

    pub fn set_font_all(&mut self, font: FontData) {
        self.font = font.clone();
        for pane in &mut self.tabs {
            pane.set_font(font.clone());
        }
    }

    /// Render the tab strip and the active tab's terminal.
    pub fn render_into_scene(
        &mut self,
        scene: &mut Scene,
        width: f64,
        height: f64,
        underline: Option<&UrlMatch>,
    ) {
        if self.bar_visible() {
            self.draw_tab_bar(scene, width);
        }
        let origin_y = self.content_origin_y();
        let active = self.active;
        if let Some(pane) = self.tabs.get_mut(active) {
            pane.render_into_scene(scene, 0.0, origin_y, width, height - origin_y, underline);
        }
    }

    fn draw_tab_bar(&self, scene: &mut Scene, width: f64) {
        let bar = Rect::new(0.0, 0.0, width, TAB_BAR_HEIGHT);
        scene.fill(Fill::NonZero, Affine::IDENTITY, TAB_BAR_BG, None, &bar);

        let tab_w = (width / self.tabs.len() as f64).min(TAB_MAX_WIDTH);
        for (i, pane) in self.tabs.iter().enumerate() {
            let x = i as f64 * tab_w;
            if i == self.active {
                let rect = Rect::new(x, 0.0, x + tab_w, TAB_BAR_HEIGHT);
                scene.fill(Fill::NonZero, Affine::IDENTITY, TAB_ACTIVE_BG, None, &rect);
            }

            let title = pane.title().unwrap_or("shell");
            let label = format!("{}: {}", i + 1, title);
            let color = if i == self.active { TAB_TEXT } else { TAB_TEXT_DIM };
            draw_label(
                scene,
                &self.font,
                &label,
                x + 8.0,
                TAB_BAR_HEIGHT * 0.68,
                tab_w - 16.0,
                color,
            );
        }
    }
}

/// Lay out and draw a single line of text, truncating at `max_width`.
fn draw_label(
    scene: &mut Scene,
    font_data: &FontData,
    text: &str,
    start_x: f64,
    baseline_y: f64,
    max_width: f64,
    color: Color,
) {
    let font_ref = match skrifa::FontRef::from_index(font_data.data.as_ref(), font_data.index) {
        Ok(f) => f,
        Err(_) => return,
    };

    use skrifa::MetadataProvider;
    let charmap = font_ref.charmap();
    let glyph_metrics = font_ref.glyph_metrics(
        skrifa::instance::Size::new(TAB_LABEL_SIZE),
        skrifa::instance::LocationRef::default(),
    );

    let mut glyphs = Vec::new();
    let mut x = start_x;
    for ch in text.chars() {
        let gid = charmap.map(ch).unwrap_or_default();
        let advance = glyph_metrics
            .advance_width(gid)
            .unwrap_or(TAB_LABEL_SIZE * 0.5) as f64;
        if x + advance > start_x + max_width {
            break;
        }
        glyphs.push(Glyph {
            id: gid.to_u32(),
            x: x as f32,
            y: baseline_y as f32,
        });
        x += advance;
    }

    if !glyphs.is_empty() {
        scene
            .draw_glyphs(font_data)
            .font_size(TAB_LABEL_SIZE)
            .brush(&color)
            .draw(Fill::NonZero, glyphs.into_iter());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font;

    const WIN_W: f64 = 800.0;
    const WIN_H: f64 = 480.0;

    fn manager() -> TabManager {
        let font_data = font::load_terminal_font("").expect("discoverable monospace font");
        TabManager::new(&Config::default(), font_data, WIN_W, WIN_H, None, None)
            .expect("spawn initial tab")
    }

    #[test]
    fn open_tab_defers_focus_to_the_next_turn() {
        let mut tabs = manager();
        tabs.open_tab(&Config::default(), WIN_W, WIN_H);

        // The open itself must not move focus; the switch is only scheduled.
        assert_eq!(tabs.active, 0);
        assert_eq!(tabs.pending_select, Some(1));

        // Committing (the next event-loop turn) flips focus exactly once.
        assert!(tabs.commit_pending_select());
        assert_eq!(tabs.active, 1);
        assert!(!tabs.commit_pending_select());
        assert_eq!(tabs.active, 1);
    }

    #[test]
    fn explicit_selection_cancels_a_scheduled_switch() {
        let mut tabs = manager();
        tabs.open_tab(&Config::default(), WIN_W, WIN_H);
        tabs.select(0);
        assert!(!tabs.commit_pending_select());
        assert_eq!(tabs.active, 0);
    }

    #[test]
    fn cycling_wraps_in_both_directions() {
        let mut tabs = manager();
        tabs.open_tab(&Config::default(), WIN_W, WIN_H);
        tabs.open_tab(&Config::default(), WIN_W, WIN_H);
        tabs.commit_pending_select();
        assert_eq!(tabs.active, 2);

        tabs.next_tab();
        assert_eq!(tabs.active, 0, "next from the last tab wraps to the first");
        tabs.prev_tab();
        assert_eq!(tabs.active, 2, "prev from the first tab wraps to the last");
    }

    #[test]
    fn close_keeps_selection_valid_and_drops_stale_switches() {
        let mut tabs = manager();
        tabs.open_tab(&Config::default(), WIN_W, WIN_H);
        // Close while the switch to the new tab is still pending; its index
        // is stale the moment the list shifts.
        assert!(tabs.close_active(WIN_W, WIN_H));
        assert_eq!(tabs.pending_select, None);
        assert_eq!(tabs.active, 0);
        assert!(!tabs.commit_pending_select());

        // Closing the last remaining tab signals exit.
        assert!(!tabs.close_active(WIN_W, WIN_H));
    }

    #[test]
    fn strip_hit_testing_tracks_visibility() {
        let mut tabs = manager();
        assert_eq!(tabs.tab_at(10.0, 10.0, WIN_W), None, "no strip with one tab");

        tabs.open_tab(&Config::default(), WIN_W, WIN_H);
        let tab_w = (WIN_W / 2.0).min(TAB_MAX_WIDTH);
        assert_eq!(tabs.tab_at(tab_w - 1.0, 10.0, WIN_W), Some(0));
        assert_eq!(tabs.tab_at(tab_w + 1.0, 10.0, WIN_W), Some(1));
        assert_eq!(tabs.tab_at(10.0, TAB_BAR_HEIGHT, WIN_W), None, "below the strip");
        assert_eq!(
            tabs.tab_at(2.0 * tab_w + 1.0, 10.0, WIN_W),
            None,
            "past the last tab"
        );
    }
}
