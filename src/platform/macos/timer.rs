//! Single-shot retry timers on the main CFRunLoop.
//!
//! Each scheduled action lives in a `TimerSlot` shared between the handle and
//! the timer's context. The context holds one strong `Rc` reference that CF
//! releases when the timer is deallocated. Firing takes the action out of the
//! slot before running it, so cancelling from inside the action is a no-op.

use std::cell::RefCell;
use std::ffi::c_void;
use std::rc::Rc;
use std::time::Duration;

use crate::platform::{PendingRetry, RetryTimer};

// ---------------------------------------------------------------------------
// Raw FFI
// ---------------------------------------------------------------------------

type CFRunLoopRef = *mut c_void;
type CFRunLoopTimerRef = *mut c_void;
type CFStringRef = *const c_void;
type CFAbsoluteTime = f64;

type CFRunLoopTimerCallBack = unsafe extern "C" fn(timer: CFRunLoopTimerRef, info: *mut c_void);

#[repr(C)]
struct CFRunLoopTimerContext {
    version: isize,
    info: *mut c_void,
    retain: Option<unsafe extern "C" fn(info: *const c_void) -> *const c_void>,
    release: Option<unsafe extern "C" fn(info: *const c_void)>,
    copy_description: Option<unsafe extern "C" fn(info: *const c_void) -> CFStringRef>,
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFAbsoluteTimeGetCurrent() -> CFAbsoluteTime;
    fn CFRunLoopTimerCreate(
        allocator: *const c_void,
        fire_date: CFAbsoluteTime,
        interval: f64,
        flags: usize,
        order: isize,
        callout: CFRunLoopTimerCallBack,
        context: *mut CFRunLoopTimerContext,
    ) -> CFRunLoopTimerRef;
    fn CFRunLoopTimerInvalidate(timer: CFRunLoopTimerRef);
    fn CFRunLoopGetMain() -> CFRunLoopRef;
    fn CFRunLoopAddTimer(rl: CFRunLoopRef, timer: CFRunLoopTimerRef, mode: CFStringRef);
    fn CFRelease(cf: *const c_void);

    static kCFRunLoopCommonModes: CFStringRef;
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

struct TimerSlot {
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

/// Schedules retry actions on the main run loop.
pub struct MacOSRetryTimer;

impl RetryTimer for MacOSRetryTimer {
    fn schedule(
        &self,
        delay: Duration,
        action: Box<dyn FnOnce()>,
    ) -> Option<Box<dyn PendingRetry>> {
        let slot = Rc::new(TimerSlot {
            action: RefCell::new(Some(action)),
        });

        let mut context = CFRunLoopTimerContext {
            version: 0,
            info: Rc::into_raw(slot.clone()).cast_mut().cast::<c_void>(),
            retain: None,
            release: Some(release_slot),
            copy_description: None,
        };

        let timer = unsafe {
            let fire_date = CFAbsoluteTimeGetCurrent() + delay.as_secs_f64();
            CFRunLoopTimerCreate(
                std::ptr::null(),
                fire_date,
                0.0,
                0,
                0,
                timer_callout,
                &mut context,
            )
        };

        if timer.is_null() {
            // CF never took ownership of the context reference.
            unsafe { release_slot(context.info) };
            log::warn!("timer: CFRunLoopTimerCreate returned null");
            return None;
        }
        unsafe { CFRunLoopAddTimer(CFRunLoopGetMain(), timer, kCFRunLoopCommonModes) };

        Some(Box::new(MacOSPendingRetry { timer, slot }))
    }
}

struct MacOSPendingRetry {
    timer: CFRunLoopTimerRef,
    slot: Rc<TimerSlot>,
}

impl PendingRetry for MacOSPendingRetry {
    fn cancel(&self) {
        self.slot.action.borrow_mut().take();
        unsafe { CFRunLoopTimerInvalidate(self.timer) };
    }
}

impl Drop for MacOSPendingRetry {
    fn drop(&mut self) {
        self.cancel();
        unsafe { CFRelease(self.timer.cast::<c_void>()) };
    }
}

// ---------------------------------------------------------------------------
// C callbacks
// ---------------------------------------------------------------------------

unsafe extern "C" fn timer_callout(_timer: CFRunLoopTimerRef, info: *mut c_void) {
    if info.is_null() {
        return;
    }
    let slot = &*(info as *const TimerSlot);
    // Take before running: the action usually drops the handle that owns us.
    let action = slot.action.borrow_mut().take();
    if let Some(action) = action {
        action();
    }
}

unsafe extern "C" fn release_slot(info: *const c_void) {
    if !info.is_null() {
        drop(Rc::from_raw(info as *const TimerSlot));
    }
}
