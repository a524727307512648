//! Permission gate.
//!
//! The tap needs two separate grants: Input Monitoring to observe key events
//! and Accessibility ("post events") to synthesize the replacement combos.
//! Missing grants are an expected, recoverable state; nothing here fails.

use std::rc::Rc;

use crate::platform::PermissionProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    InputMonitoring,
    PostEvents,
}

impl Permission {
    pub const ALL: [Permission; 2] = [Permission::InputMonitoring, Permission::PostEvents];

    /// Name used by System Settings.
    pub fn title(self) -> &'static str {
        match self {
            Self::InputMonitoring => "Input Monitoring",
            Self::PostEvents => "Accessibility",
        }
    }

    pub fn subtitle(self) -> &'static str {
        match self {
            Self::InputMonitoring => "Required to detect your selected shortcut globally.",
            Self::PostEvents => "Required to send Option+Command+V for cut-paste.",
        }
    }

    /// Deep link to the matching System Settings pane.
    pub fn settings_url(self) -> &'static str {
        match self {
            Self::InputMonitoring => {
                "x-apple.systempreferences:com.apple.preference.security?Privacy_ListenEvent"
            }
            Self::PostEvents => {
                "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility"
            }
        }
    }

    pub fn is_granted(self, state: &PermissionState) -> bool {
        match self {
            Self::InputMonitoring => state.input_monitoring_granted,
            Self::PostEvents => state.post_event_access_granted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionState {
    pub input_monitoring_granted: bool,
    pub post_event_access_granted: bool,
}

impl PermissionState {
    pub fn all_required_granted(&self) -> bool {
        self.input_monitoring_granted && self.post_event_access_granted
    }

    pub fn missing(&self) -> Vec<Permission> {
        Permission::ALL
            .into_iter()
            .filter(|p| !p.is_granted(self))
            .collect()
    }
}

/// Cheap, side-effect free permission query. Cloning shares the probe.
#[derive(Clone)]
pub struct PermissionGate {
    probe: Rc<dyn PermissionProbe>,
}

impl PermissionGate {
    pub fn new(probe: Rc<dyn PermissionProbe>) -> Self {
        Self { probe }
    }

    /// Recomputed on every call; grants change behind our back.
    pub fn check(&self) -> PermissionState {
        PermissionState {
            input_monitoring_granted: self.probe.input_monitoring_granted(),
            post_event_access_granted: self.probe.post_events_granted(),
        }
    }

    /// Prompts for every missing grant and returns the state afterwards.
    pub fn request_missing(&self) -> PermissionState {
        for permission in self.check().missing() {
            let granted = self.probe.request(permission);
            log::info!(
                "permission: requested {} ({})",
                permission.title(),
                if granted { "granted" } else { "pending" }
            );
        }
        self.check()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
