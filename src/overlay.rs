//! URL hover overlay: modifier-assisted link detection over the terminal.
//!
//! Sits logically on top of the terminal surface and watches modifier and
//! pointer events. While the activating modifier is held, each pointer
//! position is mapped to a grid cell and that row's text is scanned for a
//! URL under the pointer; a hit underlines the URL and switches the
//! cursor to a pointing hand. The overlay claims a mouse press only when
//! a URL is detected at that instant; everything else falls through to
//! the terminal untouched.
//!
//! Detection is re-run from fresh row text on every event that needs it.
//! Nothing is cached across events: the terminal can redraw between two
//! events without any pointer motion, so a remembered hit may describe
//! text that is no longer on screen.
//!
//! Any failure here (unusable font metrics, out-of-range row) degrades to
//! "no detection" — the overlay is a convenience affordance and must
//! never block or break the input path.

use statig::prelude::*;
use winit::window::CursorIcon;

use crate::links::{self, UrlMatch, UrlOpener};
use crate::state_machine::link_sm::{LinkEvent, LinkMachine, State};

/// What the overlay needs from the terminal surface under it.
///
/// Implemented by the terminal pane; tests substitute a scripted host.
pub trait TerminalHost {
    /// Number of visible rows.
    fn row_count(&self) -> usize;
    /// Text of one visible row; empty for rows outside `[0, row_count())`.
    fn row_text(&self, row: usize) -> String;
    /// Cell dimensions derived from the active font, or `None` when the
    /// font cannot yield valid metrics.
    fn cell_geometry(&self) -> Option<(f32, f32)>;
    /// Size of the visible terminal surface in pixels.
    fn view_size(&self) -> (f32, f32);
    /// Convert a window-space point into the terminal's local space.
    fn to_local(&self, window_pos: (f64, f64)) -> (f64, f64);
}

/// Owns the link state machine plus the last-known pointer position.
pub struct LinkOverlay {
    machine: StateMachine<LinkMachine>,
    last_pointer: Option<(f64, f64)>,
}

impl LinkOverlay {
    pub fn new(opener: Box<dyn UrlOpener>) -> Self {
        Self {
            machine: LinkMachine::new(opener).state_machine(),
            last_pointer: None,
        }
    }

    /// Activating modifier went down or up.
    pub fn modifier_changed(&mut self, held: bool, host: &dyn TerminalHost) {
        if held {
            let hit = self.probe(host);
            self.machine.handle(&LinkEvent::ModifierPressed { hit });
        } else {
            self.machine.handle(&LinkEvent::ModifierReleased);
        }
    }

    /// Pointer moved to `window_pos` (window coordinates).
    ///
    /// Always records the position; detection only runs while the
    /// modifier is held.
    pub fn pointer_moved(&mut self, window_pos: (f64, f64), host: &dyn TerminalHost) {
        self.last_pointer = Some(window_pos);
        if self.armed() {
            let hit = self.probe(host);
            self.machine.handle(&LinkEvent::PointerMoved { hit });
        }
    }

    /// Pointer left the terminal surface.
    pub fn pointer_left(&mut self) {
        self.last_pointer = None;
        self.machine.handle(&LinkEvent::PointerLeft);
    }

    /// Claim decision for a mouse press. Returns `true` when the overlay
    /// consumed the press (a URL was opened); `false` means the press
    /// belongs to the terminal.
    ///
    /// The decision is made from a fresh probe, never from remembered
    /// state: the text under the pointer may have changed since the last
    /// motion event.
    pub fn mouse_pressed(&mut self, host: &dyn TerminalHost) -> bool {
        if !self.armed() {
            return false;
        }
        let hit = self.probe(host);
        self.machine.handle(&LinkEvent::PointerMoved { hit: hit.clone() });
        if hit.is_none() {
            return false;
        }
        self.machine.handle(&LinkEvent::Pressed);
        true
    }

    /// The currently underlined URL, if any.
    pub fn highlight(&self) -> Option<&UrlMatch> {
        LinkMachine::highlight(self.machine.state())
    }

    /// Whether the activating modifier is currently engaged.
    pub fn armed(&self) -> bool {
        LinkMachine::is_armed(self.machine.state())
    }

    /// Cursor to show over the terminal surface for the current state.
    pub fn cursor_icon(&self) -> CursorIcon {
        if self.highlight().is_some() {
            CursorIcon::Pointer
        } else {
            CursorIcon::Default
        }
    }

    /// Direct state access for transition assertions in tests.
    pub fn state(&self) -> &State {
        self.machine.state()
    }

    /// Map the last pointer position to a grid cell and look for a URL
    /// under it.
    ///
    /// Returns `None` (never panics, never divides by zero) when there is
    /// no recorded pointer position, the font yields no usable metrics,
    /// the cell falls outside the grid, or the row has no URL spanning
    /// the pointer's column.
    fn probe(&self, host: &dyn TerminalHost) -> Option<UrlMatch> {
        let window_pos = self.last_pointer?;
        let (local_x, local_y) = host.to_local(window_pos);

        // Points outside the visible surface (above or left of the origin
        // included) are not over any cell.
        let (view_w, view_h) = host.view_size();
        if local_x < 0.0 || local_y < 0.0 || local_x >= view_w as f64 || local_y >= view_h as f64 {
            return None;
        }

        let (cw, ch) = host.cell_geometry()?;
        let (cw, ch) = (cw as f64, ch as f64);
        if !cw.is_finite() || !ch.is_finite() || cw < 1.0 || ch < 1.0 {
            return None;
        }

        // Row 0 is the visual top.
        let col = (local_x / cw).floor() as usize;
        let row = (local_y / ch).floor() as usize;
        if row >= host.row_count() {
            return None;
        }

        let text = host.row_text(row);
        links::url_at(row, text.trim_end(), col)
    }
}

// ---------------------------------------------------------------------------
// Tests: hover detection against a scripted host
// ---------------------------------------------------------------------------
