//! Deterministic doubles for the platform seams, shared by unit tests.
//!
//! Each fake is a cheap handle over `Rc` state: clone it, hand one copy to
//! the code under test, and inspect or drive the other.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use super::{
    EventTap, ForegroundApp, KeyEvent, KeyInjector, PendingRetry, PermissionProbe, PlatformError,
    RetryTimer, TapBackend, TapCallback, TapEvent, TapVerdict, INJECTED_EVENT_TAG,
};
use crate::config::{SettingsProvider, ShortcutModifier};
use crate::engine::{KeyCombo, ModifierFlags};
use crate::permission::Permission;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FakeSettings(Rc<Cell<ShortcutModifier>>);

impl FakeSettings {
    pub fn new(modifier: ShortcutModifier) -> Self {
        Self(Rc::new(Cell::new(modifier)))
    }

    pub fn set(&self, modifier: ShortcutModifier) {
        self.0.set(modifier);
    }
}

impl SettingsProvider for FakeSettings {
    fn shortcut_modifier(&self) -> ShortcutModifier {
        self.0.get()
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FakePermissions {
    input_monitoring: Rc<Cell<bool>>,
    post_events: Rc<Cell<bool>>,
    requests: Rc<RefCell<Vec<Permission>>>,
}

impl FakePermissions {
    pub fn new(input_monitoring: bool, post_events: bool) -> Self {
        Self {
            input_monitoring: Rc::new(Cell::new(input_monitoring)),
            post_events: Rc::new(Cell::new(post_events)),
            requests: Rc::default(),
        }
    }

    pub fn grant_all(&self) {
        self.input_monitoring.set(true);
        self.post_events.set(true);
    }

    pub fn revoke_all(&self) {
        self.input_monitoring.set(false);
        self.post_events.set(false);
    }

    pub fn requests(&self) -> Vec<Permission> {
        self.requests.borrow().clone()
    }
}

impl PermissionProbe for FakePermissions {
    fn input_monitoring_granted(&self) -> bool {
        self.input_monitoring.get()
    }

    fn post_events_granted(&self) -> bool {
        self.post_events.get()
    }

    fn request(&self, permission: Permission) -> bool {
        self.requests.borrow_mut().push(permission);
        match permission {
            Permission::InputMonitoring => self.input_monitoring.get(),
            Permission::PostEvents => self.post_events.get(),
        }
    }
}

// ---------------------------------------------------------------------------
// Foreground app
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FakeForeground(Rc<RefCell<Option<String>>>);

impl FakeForeground {
    pub fn new(bundle_id: Option<&str>) -> Self {
        Self(Rc::new(RefCell::new(bundle_id.map(str::to_owned))))
    }

    pub fn set(&self, bundle_id: Option<&str>) {
        *self.0.borrow_mut() = bundle_id.map(str::to_owned);
    }
}

impl ForegroundApp for FakeForeground {
    fn frontmost_bundle_id(&self) -> Option<String> {
        self.0.borrow().clone()
    }
}

// ---------------------------------------------------------------------------
// Tap backend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TapShared {
    callback: RefCell<Option<Rc<dyn Fn(TapEvent) -> TapVerdict>>>,
    fail_installs: Cell<bool>,
    installs: Cell<usize>,
    enables: Cell<usize>,
    removals: Cell<usize>,
}

#[derive(Clone, Default)]
pub struct FakeTapBackend(Rc<TapShared>);

impl FakeTapBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_installs(&self, fail: bool) {
        self.0.fail_installs.set(fail);
    }

    pub fn installs(&self) -> usize {
        self.0.installs.get()
    }

    pub fn enables(&self) -> usize {
        self.0.enables.get()
    }

    pub fn removals(&self) -> usize {
        self.0.removals.get()
    }

    /// The live tap's callback, if a tap is installed.
    pub fn callback(&self) -> Option<Rc<dyn Fn(TapEvent) -> TapVerdict>> {
        self.0.callback.borrow().clone()
    }

    /// Feeds `event` through the installed tap like the OS would. `None` when
    /// no tap is installed.
    pub fn deliver(&self, event: TapEvent) -> Option<TapVerdict> {
        let callback = self.callback()?;
        Some(callback(event))
    }
}

impl TapBackend for FakeTapBackend {
    fn install(&self, callback: TapCallback) -> Result<Box<dyn EventTap>, PlatformError> {
        if self.0.fail_installs.get() {
            return Err(PlatformError::TapCreation("fake install failure".into()));
        }
        self.0.installs.set(self.0.installs.get() + 1);
        *self.0.callback.borrow_mut() = Some(Rc::from(callback));
        Ok(Box::new(FakeTap(self.0.clone())))
    }
}

struct FakeTap(Rc<TapShared>);

impl EventTap for FakeTap {
    fn enable(&self) {
        self.0.enables.set(self.0.enables.get() + 1);
    }
}

impl Drop for FakeTap {
    fn drop(&mut self) {
        self.0.removals.set(self.0.removals.get() + 1);
        self.0.callback.borrow_mut().take();
    }
}

// ---------------------------------------------------------------------------
// Injector
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingInjector {
    posted: Rc<RefCell<Vec<KeyCombo>>>,
    fail: Rc<Cell<bool>>,
    loopback: Rc<RefCell<Option<FakeTapBackend>>>,
    loopback_verdicts: Rc<RefCell<Vec<TapVerdict>>>,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posted(&self) -> Vec<KeyCombo> {
        self.posted.borrow().clone()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.set(fail);
    }

    /// Redeliver every posted key-down through `backend`, synchronously,
    /// the way the OS may re-enter the tap from inside `post`.
    pub fn loop_back_into(&self, backend: &FakeTapBackend) {
        *self.loopback.borrow_mut() = Some(backend.clone());
    }

    pub fn loopback_verdicts(&self) -> Vec<TapVerdict> {
        self.loopback_verdicts.borrow().clone()
    }
}

impl KeyInjector for RecordingInjector {
    fn post(&self, key_code: u16, flags: ModifierFlags) -> Result<(), PlatformError> {
        if self.fail.get() {
            return Err(PlatformError::EventCreation("fake event failure".into()));
        }
        self.posted.borrow_mut().push(KeyCombo { key_code, flags });

        let loopback = self.loopback.borrow().clone();
        if let Some(backend) = loopback {
            let event = TapEvent::KeyDown(KeyEvent {
                key_code,
                flags,
                autorepeat: false,
                user_data: INJECTED_EVENT_TAG,
            });
            if let Some(verdict) = backend.deliver(event) {
                self.loopback_verdicts.borrow_mut().push(verdict);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Retry timer
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Pending,
    Fired,
    Cancelled,
}

struct Slot {
    delay: Duration,
    state: Cell<SlotState>,
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

#[derive(Default)]
struct TimerShared {
    slots: RefCell<Vec<Rc<Slot>>>,
    cancelled: Cell<usize>,
    fail_schedules: Cell<bool>,
    failed: Cell<usize>,
}

/// Timer that only fires when the test says so.
#[derive(Clone, Default)]
pub struct ManualTimer(Rc<TimerShared>);

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.0
            .slots
            .borrow()
            .iter()
            .filter(|s| s.state.get() == SlotState::Pending)
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.0.cancelled.get()
    }

    /// Makes `schedule` refuse to arm, like a timer the OS failed to create.
    pub fn fail_schedules(&self, fail: bool) {
        self.0.fail_schedules.set(fail);
    }

    /// Number of refused `schedule` calls.
    pub fn failed(&self) -> usize {
        self.0.failed.get()
    }

    /// Delays of every timer ever scheduled, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.0.slots.borrow().iter().map(|s| s.delay).collect()
    }

    /// Fires every timer pending right now. Timers scheduled by the fired
    /// actions stay pending.
    pub fn fire_all(&self) {
        let due: Vec<Rc<Slot>> = self
            .0
            .slots
            .borrow()
            .iter()
            .filter(|s| s.state.get() == SlotState::Pending)
            .cloned()
            .collect();
        for slot in due {
            // An earlier action in this batch may have cancelled it.
            if slot.state.get() != SlotState::Pending {
                continue;
            }
            slot.state.set(SlotState::Fired);
            let action = slot.action.borrow_mut().take();
            if let Some(action) = action {
                action();
            }
        }
    }
}

impl RetryTimer for ManualTimer {
    fn schedule(
        &self,
        delay: Duration,
        action: Box<dyn FnOnce()>,
    ) -> Option<Box<dyn PendingRetry>> {
        if self.0.fail_schedules.get() {
            self.0.failed.set(self.0.failed.get() + 1);
            return None;
        }
        let slot = Rc::new(Slot {
            delay,
            state: Cell::new(SlotState::Pending),
            action: RefCell::new(Some(action)),
        });
        self.0.slots.borrow_mut().push(slot.clone());
        Some(Box::new(ManualPending {
            slot,
            timer: self.0.clone(),
        }))
    }
}

struct ManualPending {
    slot: Rc<Slot>,
    timer: Rc<TimerShared>,
}

impl PendingRetry for ManualPending {
    fn cancel(&self) {
        if self.slot.state.get() == SlotState::Pending {
            self.slot.state.set(SlotState::Cancelled);
            self.slot.action.borrow_mut().take();
            self.timer.cancelled.set(self.timer.cancelled.get() + 1);
        }
    }
}

impl Drop for ManualPending {
    fn drop(&mut self) {
        self.cancel();
    }
}
