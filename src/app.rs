//! Application controller: the lifecycle surface the UI layer calls into.
//!
//! Owns the event tap session and the permission gate. `refresh_permission_state`
//! is meant to run whenever the user may have changed a grant (app activation,
//! returning from System Settings).

use crate::engine::CutModeState;
use crate::permission::{PermissionGate, PermissionState};
use crate::session::{EventTapSession, SessionPhase};

pub struct App {
    session: EventTapSession,
    gate: PermissionGate,
}

impl App {
    pub fn new(session: EventTapSession, gate: PermissionGate) -> Self {
        Self { session, gate }
    }

    /// Prompts for any missing grant, then starts the session (or its retry
    /// loop).
    pub fn launch(&self) {
        let state = self.gate.check();
        if !state.all_required_granted() {
            self.gate.request_missing();
        }
        self.refresh_permission_state();
    }

    pub fn refresh_permission_state(&self) {
        if self.gate.check().all_required_granted() {
            self.session.start();
        } else {
            // Restart so cut mode is cleared and the retry loop is re-armed.
            self.session.stop();
            self.session.start();
        }
        log::debug!("app: session {:?}", self.session.phase());
    }

    pub fn stop(&self) {
        self.session.stop();
    }
}

/// Queries and toggles for the settings window. The agent binary itself only
/// launches and stops.
#[allow(dead_code)]
impl App {
    pub fn permission_state(&self) -> PermissionState {
        self.gate.check()
    }

    pub fn start(&self) {
        self.session.start();
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn cut_mode(&self) -> CutModeState {
        self.session.cut_mode()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
