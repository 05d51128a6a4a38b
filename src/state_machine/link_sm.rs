//! Link-hover state machine.
//!
//! Hierarchy:
//! ```text
//! Idle ←→ Active (superstate, modifier held)
//!             ├── Armed                    (no URL under the pointer)
//!             └── Highlighted { current }  (URL under the pointer, underlined)
//! ```
//!
//! The machine receives probe *results*, not raw input: the overlay runs
//! URL detection against the terminal host and dispatches events carrying
//! the outcome. Clicking while `Highlighted` opens the carried URL and
//! drops back to `Armed` with the modifier still engaged, so the next
//! hover re-detects without releasing the key.

use statig::prelude::*;
use tracing::info;

use crate::links::{UrlMatch, UrlOpener};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events dispatched to the link state machine.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// Activating modifier went down; `hit` is the detection result at the
    /// last-known pointer position.
    ModifierPressed { hit: Option<UrlMatch> },
    /// Activating modifier went up.
    ModifierReleased,
    /// Pointer moved while the modifier is held; `hit` is the fresh
    /// detection result.
    PointerMoved { hit: Option<UrlMatch> },
    /// Pointer left the terminal surface.
    PointerLeft,
    /// Mouse-down that the overlay claimed (only issued in `Highlighted`).
    Pressed,
}

// ---------------------------------------------------------------------------
// Shared storage
// ---------------------------------------------------------------------------

/// Shared storage for the link state machine.
///
/// Holds the opener used when a highlighted URL is clicked. The opener is
/// boxed so tests can substitute a recorder for the system handler.
pub struct LinkMachine {
    pub opener: Box<dyn UrlOpener>,
}

impl LinkMachine {
    pub fn new(opener: Box<dyn UrlOpener>) -> Self {
        Self { opener }
    }

    /// The highlighted URL, if any (the underline decoration mirrors this).
    pub fn highlight(state: &State) -> Option<&UrlMatch> {
        match state {
            State::Highlighted { current } => Some(current),
            _ => None,
        }
    }

    /// Whether the activating modifier is currently engaged.
    pub fn is_armed(state: &State) -> bool {
        !matches!(state, State::Idle {})
    }
}

// ---------------------------------------------------------------------------
// State machine implementation
// ---------------------------------------------------------------------------

#[state_machine(
    initial = "State::idle()",
    state(derive(Debug, Clone, PartialEq))
)]
impl LinkMachine {
    // ------------------------------------------------------------------
    // Superstate: Active (parent of Armed, Highlighted)
    // ------------------------------------------------------------------

    #[superstate]
    fn active(&mut self, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::ModifierReleased => Transition(State::idle()),
            LinkEvent::PointerLeft => Transition(State::idle()),
            _ => Super,
        }
    }

    // ------------------------------------------------------------------
    // Leaf states
    // ------------------------------------------------------------------

    /// No modifier held; every input passes through to the terminal.
    #[state]
    fn idle(&mut self, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::ModifierPressed { hit: Some(m) } => {
                Transition(State::highlighted(m.clone()))
            }
            LinkEvent::ModifierPressed { hit: None } => Transition(State::armed()),
            _ => Handled,
        }
    }

    /// Modifier held, nothing under the pointer. Child of `active`.
    #[state(superstate = "active")]
    fn armed(&mut self, event: &LinkEvent) -> Outcome<State> {
        match event {
            LinkEvent::PointerMoved { hit: Some(m) } => {
                Transition(State::highlighted(m.clone()))
            }
            LinkEvent::PointerMoved { hit: None } => Handled,
            _ => Super,
        }
    }

    /// Modifier held with a URL under the pointer; `current` carries the
    /// match whose span is underlined. Child of `active`.
    #[state(superstate = "active", entry_action = "enter_highlighted")]
    fn highlighted(&mut self, event: &LinkEvent, current: &UrlMatch) -> Outcome<State> {
        match event {
            LinkEvent::PointerMoved { hit: Some(m) } => {
                if m == current {
                    Handled
                } else {
                    Transition(State::highlighted(m.clone()))
                }
            }
            LinkEvent::PointerMoved { hit: None } => Transition(State::armed()),
            LinkEvent::Pressed => {
                info!(target: "links", url = %current.text, "opening URL");
                self.opener.open(&current.text);
                Transition(State::armed())
            }
            _ => Super,
        }
    }

    // ------------------------------------------------------------------
    // Entry / exit actions
    // ------------------------------------------------------------------

    /// Log entry to Highlighted state.
    #[action]
    fn enter_highlighted(&mut self, current: &UrlMatch) {
        info!(target: "links", url = %current.text, row = current.row, "URL highlighted");
    }
}

// ---------------------------------------------------------------------------
// Tests: transition table
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingOpener {
        opened: Rc<RefCell<Vec<String>>>,
    }

    impl UrlOpener for RecordingOpener {
        fn open(&self, url: &str) {
            self.opened.borrow_mut().push(url.to_string());
        }
    }

    fn machine() -> (StateMachine<LinkMachine>, Rc<RefCell<Vec<String>>>) {
        let opener = RecordingOpener::default();
        let opened = opener.opened.clone();
        (LinkMachine::new(Box::new(opener)).state_machine(), opened)
    }

    fn url(text: &str, row: usize, start_col: usize, end_col: usize) -> UrlMatch {
        UrlMatch {
            text: text.to_string(),
            row,
            start_col,
            end_col,
        }
    }

    #[test]
    fn starts_idle() {
        let (sm, _) = machine();
        assert_eq!(sm.state(), &State::idle());
    }

    #[test]
    fn modifier_press_without_hit_arms() {
        let (mut sm, _) = machine();
        sm.handle(&LinkEvent::ModifierPressed { hit: None });
        assert_eq!(sm.state(), &State::armed());
    }

    #[test]
    fn modifier_press_over_url_highlights_immediately() {
        let (mut sm, _) = machine();
        let m = url("https://example.com", 2, 0, 19);
        sm.handle(&LinkEvent::ModifierPressed { hit: Some(m.clone()) });
        assert_eq!(LinkMachine::highlight(sm.state()), Some(&m));
    }

    #[test]
    fn idle_ignores_motion_and_presses() {
        let (mut sm, opened) = machine();
        let m = url("https://example.com", 0, 0, 19);
        sm.handle(&LinkEvent::PointerMoved { hit: Some(m) });
        sm.handle(&LinkEvent::Pressed);
        sm.handle(&LinkEvent::ModifierReleased);
        assert_eq!(sm.state(), &State::idle());
        assert!(opened.borrow().is_empty());
    }

    #[test]
    fn armed_motion_onto_url_highlights() {
        let (mut sm, _) = machine();
        sm.handle(&LinkEvent::ModifierPressed { hit: None });
        let m = url("http://a.com", 1, 4, 16);
        sm.handle(&LinkEvent::PointerMoved { hit: Some(m.clone()) });
        assert_eq!(LinkMachine::highlight(sm.state()), Some(&m));
    }

    #[test]
    fn armed_motion_over_plain_text_stays_armed() {
        let (mut sm, _) = machine();
        sm.handle(&LinkEvent::ModifierPressed { hit: None });
        sm.handle(&LinkEvent::PointerMoved { hit: None });
        assert_eq!(sm.state(), &State::armed());
    }

    #[test]
    fn highlight_motion_off_url_drops_to_armed() {
        let (mut sm, _) = machine();
        let m = url("http://a.com", 0, 0, 12);
        sm.handle(&LinkEvent::ModifierPressed { hit: Some(m) });
        sm.handle(&LinkEvent::PointerMoved { hit: None });
        assert_eq!(sm.state(), &State::armed());
        assert!(LinkMachine::highlight(sm.state()).is_none());
    }

    #[test]
    fn highlight_motion_onto_other_url_switches() {
        let (mut sm, _) = machine();
        let first = url("http://a.com", 0, 4, 16);
        let second = url("https://b.com/x", 0, 21, 36);
        sm.handle(&LinkEvent::ModifierPressed { hit: Some(first) });
        sm.handle(&LinkEvent::PointerMoved { hit: Some(second.clone()) });
        assert_eq!(LinkMachine::highlight(sm.state()), Some(&second));
    }

    #[test]
    fn release_clears_highlight_from_any_state() {
        let (mut sm, _) = machine();
        let m = url("http://a.com", 0, 0, 12);
        sm.handle(&LinkEvent::ModifierPressed { hit: Some(m) });
        assert!(LinkMachine::highlight(sm.state()).is_some());
        sm.handle(&LinkEvent::ModifierReleased);
        assert_eq!(sm.state(), &State::idle());
        assert!(LinkMachine::highlight(sm.state()).is_none());
    }

    #[test]
    fn pointer_leaving_surface_deactivates() {
        let (mut sm, _) = machine();
        sm.handle(&LinkEvent::ModifierPressed { hit: None });
        sm.handle(&LinkEvent::PointerLeft);
        assert_eq!(sm.state(), &State::idle());
    }

    #[test]
    fn press_opens_url_and_keeps_modifier_armed() {
        let (mut sm, opened) = machine();
        let m = url("https://example.com/path", 3, 0, 24);
        sm.handle(&LinkEvent::ModifierPressed { hit: Some(m) });
        sm.handle(&LinkEvent::Pressed);
        assert_eq!(opened.borrow().as_slice(), ["https://example.com/path"]);
        // Still armed: the next hover must re-detect without a fresh
        // modifier press.
        assert_eq!(sm.state(), &State::armed());
    }

    #[test]
    fn rehover_after_open_can_open_again() {
        let (mut sm, opened) = machine();
        let m = url("http://a.com", 0, 0, 12);
        sm.handle(&LinkEvent::ModifierPressed { hit: Some(m.clone()) });
        sm.handle(&LinkEvent::Pressed);
        sm.handle(&LinkEvent::PointerMoved { hit: Some(m) });
        sm.handle(&LinkEvent::Pressed);
        assert_eq!(opened.borrow().len(), 2);
    }

    #[test]
    fn is_armed_tracks_modifier_engagement() {
        let (mut sm, _) = machine();
        assert!(!LinkMachine::is_armed(sm.state()));
        sm.handle(&LinkEvent::ModifierPressed { hit: None });
        assert!(LinkMachine::is_armed(sm.state()));
        let m = url("http://a.com", 0, 0, 12);
        sm.handle(&LinkEvent::PointerMoved { hit: Some(m) });
        assert!(LinkMachine::is_armed(sm.state()));
        sm.handle(&LinkEvent::ModifierReleased);
        assert!(!LinkMachine::is_armed(sm.state()));
    }
}
