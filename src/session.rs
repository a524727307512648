//! Event tap session: owns the tap, the retry timer and the pipeline.
//!
//! Everything runs on the main run-loop thread. The tap callback and the
//! retry action hold a `Weak` back-reference to the session, so dropping the
//! session tears the tap down and cancels any pending retry.
//!
//! Re-entrancy: posting a synthetic event can redeliver it through the tap
//! before `post` returns. The callback checks the sentinel before touching
//! any session state, and borrows the pipeline with `try_borrow_mut` so a
//! nested delivery can never panic.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::engine::{CutModeState, ShortcutPipeline};
use crate::permission::{PermissionGate, PermissionState};
use crate::platform::{
    DisableReason, EventTap, KeyEvent, PendingRetry, RetryTimer, TapBackend, TapCallback,
    TapEvent, TapVerdict,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Stopped,
    /// No tap; a retry is scheduled.
    Retrying,
    Active,
}

pub struct EventTapSession {
    inner: Rc<SessionInner>,
}

struct SessionInner {
    backend: Box<dyn TapBackend>,
    timer: Box<dyn RetryTimer>,
    gate: PermissionGate,
    retry_delay: Duration,
    pipeline: RefCell<ShortcutPipeline>,
    tap: RefCell<Option<Box<dyn EventTap>>>,
    retry: RefCell<Option<Box<dyn PendingRetry>>>,
    logged_missing_permissions: Cell<bool>,
}

impl EventTapSession {
    pub fn new(
        backend: Box<dyn TapBackend>,
        timer: Box<dyn RetryTimer>,
        gate: PermissionGate,
        pipeline: ShortcutPipeline,
        retry_delay: Duration,
    ) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                backend,
                timer,
                gate,
                retry_delay,
                pipeline: RefCell::new(pipeline),
                tap: RefCell::new(None),
                retry: RefCell::new(None),
                logged_missing_permissions: Cell::new(false),
            }),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.inner.tap.borrow().is_some() {
            SessionPhase::Active
        } else if self.inner.retry.borrow().is_some() {
            SessionPhase::Retrying
        } else {
            SessionPhase::Stopped
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase() == SessionPhase::Active
    }

    pub fn cut_mode(&self) -> CutModeState {
        self.inner.pipeline.borrow().cut_mode()
    }

    /// Installs the tap, or schedules a retry when permissions are missing or
    /// installation fails. No-op while a tap is live.
    pub fn start(&self) {
        start(&self.inner);
    }

    /// Cancels any retry, removes the tap and disarms cut mode. Idempotent.
    pub fn stop(&self) {
        let inner = &self.inner;
        let retry = inner.retry.borrow_mut().take();
        if let Some(retry) = retry {
            retry.cancel();
        }
        // Drop outside the borrow; the backend may call back into us.
        let tap = inner.tap.borrow_mut().take();
        if tap.is_some() {
            drop(tap);
            log::info!("session: event tap removed");
        }
        if let Ok(mut pipeline) = inner.pipeline.try_borrow_mut() {
            pipeline.reset();
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

fn start(inner: &Rc<SessionInner>) {
    if inner.tap.borrow().is_some() {
        return;
    }

    let permissions = inner.gate.check();
    if !permissions.all_required_granted() {
        warn_missing_permissions(inner, &permissions);
        schedule_retry(inner);
        return;
    }
    inner.logged_missing_permissions.set(false);

    match inner.backend.install(event_callback(Rc::downgrade(inner))) {
        Ok(tap) => {
            let retry = inner.retry.borrow_mut().take();
            if let Some(retry) = retry {
                retry.cancel();
            }
            tap.enable();
            *inner.tap.borrow_mut() = Some(tap);
            log::info!("session: event tap active");
        }
        Err(e) => {
            log::warn!("session: {e} (will retry)");
            schedule_retry(inner);
        }
    }
}

/// Logs the missing grants once per granted-to-missing transition. Returns
/// whether anything was logged.
fn warn_missing_permissions(inner: &SessionInner, permissions: &PermissionState) -> bool {
    if inner.logged_missing_permissions.replace(true) {
        return false;
    }
    log::warn!(
        "session: waiting for permissions (Input Monitoring: {}, Accessibility: {})",
        if permissions.input_monitoring_granted { "granted" } else { "missing" },
        if permissions.post_event_access_granted { "granted" } else { "missing" },
    );
    for missing in permissions.missing() {
        log::warn!(
            "session: grant {} at {} ({})",
            missing.title(),
            missing.settings_url(),
            missing.subtitle()
        );
    }
    true
}

/// Arms the single retry timer unless a tap or a retry already exists.
fn schedule_retry(inner: &Rc<SessionInner>) {
    if inner.tap.borrow().is_some() || inner.retry.borrow().is_some() {
        return;
    }
    let weak = Rc::downgrade(inner);
    let Some(pending) = inner.timer.schedule(
        inner.retry_delay,
        Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // The timer has fired; release its handle before retrying.
            let fired = inner.retry.borrow_mut().take();
            drop(fired);
            start(&inner);
        }),
    ) else {
        log::error!("session: retry timer unavailable; waiting for the next start");
        return;
    };
    log::debug!("session: retry in {:?}", inner.retry_delay);
    *inner.retry.borrow_mut() = Some(pending);
}

fn reenable(inner: &Rc<SessionInner>, reason: DisableReason) {
    let reenabled = match inner.tap.try_borrow() {
        Ok(tap) => match &*tap {
            Some(tap) => {
                tap.enable();
                true
            }
            None => false,
        },
        // Mid-install or mid-teardown; the lifecycle call will settle it.
        Err(_) => return,
    };
    if reenabled {
        log::info!("session: event tap disabled ({reason:?}) and re-enabled");
    } else {
        schedule_retry(inner);
    }
}

// ---------------------------------------------------------------------------
// Callback
// ---------------------------------------------------------------------------

fn event_callback(session: Weak<SessionInner>) -> TapCallback {
    Box::new(move |event: TapEvent| match event {
        TapEvent::KeyDown(key) => {
            if key.is_injected() {
                return TapVerdict::PassThrough;
            }
            match session.upgrade() {
                Some(inner) => dispatch_key_down(&inner, &key),
                None => TapVerdict::PassThrough,
            }
        }
        TapEvent::Disabled(reason) => {
            if let Some(inner) = session.upgrade() {
                reenable(&inner, reason);
            }
            TapVerdict::PassThrough
        }
        TapEvent::Other => TapVerdict::PassThrough,
    })
}

/// A busy pipeline means a nested delivery; let it through untouched.
fn dispatch_key_down(inner: &SessionInner, key: &KeyEvent) -> TapVerdict {
    match inner.pipeline.try_borrow_mut() {
        Ok(mut pipeline) => pipeline.handle_key_down(key),
        Err(_) => TapVerdict::PassThrough,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
