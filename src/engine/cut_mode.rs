//! The one-bit cut-mode state machine.
//!
//! Only qualifying chords aimed at the foreground file manager reach
//! `CutMode::on_shortcut`; filtering happens in the pipeline.

use super::shortcut::{KeyCombo, ShortcutRole};
use crate::platform::TapVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutModeState {
    #[default]
    Unarmed,
    /// A cut was turned into a copy; the next paste becomes a move.
    Armed,
}

/// What to do with the physical event, and what to inject in its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub verdict: TapVerdict,
    pub inject: Option<KeyCombo>,
}

impl Transition {
    const PASS: Self = Self {
        verdict: TapVerdict::PassThrough,
        inject: None,
    };

    const SWALLOW: Self = Self {
        verdict: TapVerdict::Suppress,
        inject: None,
    };

    const fn replace_with(combo: KeyCombo) -> Self {
        Self {
            verdict: TapVerdict::Suppress,
            inject: Some(combo),
        }
    }
}

#[derive(Debug, Default)]
pub struct CutMode {
    state: CutModeState,
}

impl CutMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CutModeState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state == CutModeState::Armed
    }

    pub fn reset(&mut self) {
        self.set(CutModeState::Unarmed);
    }

    pub fn on_shortcut(&mut self, role: ShortcutRole, autorepeat: bool) -> Transition {
        match (role, autorepeat) {
            // Copy never gets suppressed, held or not.
            (ShortcutRole::Copy, _) => {
                self.set(CutModeState::Unarmed);
                Transition::PASS
            }
            (ShortcutRole::Cut, true) => Transition::SWALLOW,
            (ShortcutRole::Cut, false) => {
                self.set(CutModeState::Armed);
                Transition::replace_with(KeyCombo::COPY)
            }
            (ShortcutRole::Paste, true) if self.is_armed() => Transition::SWALLOW,
            (ShortcutRole::Paste, true) => Transition::PASS,
            (ShortcutRole::Paste, false) if self.is_armed() => {
                self.set(CutModeState::Unarmed);
                Transition::replace_with(KeyCombo::MOVE_PASTE)
            }
            (ShortcutRole::Paste, false) => Transition::PASS,
        }
    }

    fn set(&mut self, next: CutModeState) {
        if self.state != next {
            log::debug!("cut mode: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
