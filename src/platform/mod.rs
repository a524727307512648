//! Platform abstraction layer.
//!
//! Defines the OS seams the session is built on: permission probing, the
//! foreground-app query, tap installation, key injection and the retry timer.
//! The macOS implementations live in `macos`; tests use the doubles in
//! `fakes`.

#[cfg(test)]
pub mod fakes;
#[cfg(target_os = "macos")]
pub mod macos;

use std::time::Duration;

use crate::engine::ModifierFlags;
use crate::permission::Permission;

/// Value stamped into kCGEventSourceUserData on every synthetic event.
pub const INJECTED_EVENT_TAG: i64 = 0x434D_4458;

/// Bundle identifier of the file manager whose shortcuts are rewritten.
pub const FINDER_BUNDLE_ID: &str = "com.apple.finder";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("event tap could not be created: {0}")]
    TapCreation(String),
    #[error("synthetic event could not be created: {0}")]
    EventCreation(String),
}

// ---------------------------------------------------------------------------
// Tap events
// ---------------------------------------------------------------------------

/// A key-down as seen by the tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key_code: u16,
    pub flags: ModifierFlags,
    pub autorepeat: bool,
    /// Raw kCGEventSourceUserData.
    pub user_data: i64,
}

impl KeyEvent {
    /// True for events this process posted itself.
    pub fn is_injected(&self) -> bool {
        self.user_data == INJECTED_EVENT_TAG
    }
}

/// Why the OS switched the tap off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisableReason {
    Timeout,
    UserInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapEvent {
    KeyDown(KeyEvent),
    Disabled(DisableReason),
    Other,
}

/// Callback answer: let the original event through or drop it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapVerdict {
    PassThrough,
    Suppress,
}

/// Per-event handler handed to the tap backend.
pub type TapCallback = Box<dyn Fn(TapEvent) -> TapVerdict>;

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Reads the two capabilities the tap needs.
pub trait PermissionProbe {
    fn input_monitoring_granted(&self) -> bool;
    fn post_events_granted(&self) -> bool;
    /// Asks the OS to prompt for `permission`. Returns the grant state as
    /// reported right after the request.
    fn request(&self, permission: Permission) -> bool;
}

/// Answers "which app is frontmost".
pub trait ForegroundApp {
    fn frontmost_bundle_id(&self) -> Option<String>;

    fn is_frontmost(&self, bundle_id: &str) -> bool {
        self.frontmost_bundle_id().as_deref() == Some(bundle_id)
    }
}

/// Posts a synthetic key-down/key-up pair stamped with `INJECTED_EVENT_TAG`.
pub trait KeyInjector {
    fn post(&self, key_code: u16, flags: ModifierFlags) -> Result<(), PlatformError>;
}

/// An installed, run-loop attached event tap. Dropping it detaches the tap
/// from the run loop and invalidates it.
pub trait EventTap {
    fn enable(&self);
}

/// Installs key-down taps.
pub trait TapBackend {
    fn install(&self, callback: TapCallback) -> Result<Box<dyn EventTap>, PlatformError>;
}

/// A scheduled single-shot action. Cancelling before it fires guarantees the
/// action never runs; cancelling afterwards is a no-op. Dropping the handle
/// cancels too.
pub trait PendingRetry {
    fn cancel(&self);
}

/// Single-shot timer on the thread that drives the tap.
pub trait RetryTimer {
    /// `None` when the timer could not be armed; `action` is dropped unrun.
    fn schedule(
        &self,
        delay: Duration,
        action: Box<dyn FnOnce()>,
    ) -> Option<Box<dyn PendingRetry>>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
