//! macOS key injector via CGEventPost.
//!
//! `MacOSInjector` implements `KeyInjector`. Injection is synchronous:
//! `CGEventPost` hands the event to the session stream before returning,
//! which is also where our own tap sits. Every posted event therefore carries
//! `INJECTED_EVENT_TAG` in kCGEventSourceUserData so the tap lets it through.

use std::ffi::c_void;

use super::capture::CG_EVENT_SOURCE_USER_DATA;
use crate::engine::ModifierFlags;
use crate::platform::{KeyInjector, PlatformError, INJECTED_EVENT_TAG};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// CGEventTapLocation: kCGSessionEventTap.
const CG_SESSION_EVENT_TAP: u32 = 1;

/// kCGEventSourceStateCombinedSessionState = 0 -- merge hardware and posted state.
const CG_EVENT_SOURCE_STATE_COMBINED_SESSION_STATE: i32 = 0;

// ---------------------------------------------------------------------------
// Raw FFI
// ---------------------------------------------------------------------------

type CGEventRef = *mut c_void;
type CGEventSourceRef = *mut c_void;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn CGEventSourceCreate(state_id: i32) -> CGEventSourceRef;
    fn CGEventCreateKeyboardEvent(
        source: CGEventSourceRef,
        virtual_key: u16,
        key_down: bool,
    ) -> CGEventRef;
    fn CGEventSetFlags(event: CGEventRef, flags: u64);
    fn CGEventSetIntegerValueField(event: CGEventRef, field: u32, value: i64);
    fn CGEventPost(tap_location: u32, event: CGEventRef);
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFRelease(cf: *const c_void);
}

// ---------------------------------------------------------------------------
// Public struct
// ---------------------------------------------------------------------------

/// Posts tagged key combos via CGEventPost.
///
/// Stateless: each `post()` call creates a source and two events, posts them,
/// and releases everything immediately.
pub struct MacOSInjector;

impl MacOSInjector {
    pub fn new() -> Self {
        MacOSInjector
    }
}

impl KeyInjector for MacOSInjector {
    /// Builds both events before posting either, so a key-down is never sent
    /// without its key-up.
    fn post(&self, key_code: u16, flags: ModifierFlags) -> Result<(), PlatformError> {
        let inject_start = std::time::Instant::now();

        unsafe {
            let source = CGEventSourceCreate(CG_EVENT_SOURCE_STATE_COMBINED_SESSION_STATE);
            if source.is_null() {
                return Err(PlatformError::EventCreation(
                    "CGEventSourceCreate returned null".into(),
                ));
            }

            let key_down = CGEventCreateKeyboardEvent(source, key_code, true);
            let key_up = CGEventCreateKeyboardEvent(source, key_code, false);
            if key_down.is_null() || key_up.is_null() {
                for event in [key_down, key_up] {
                    if !event.is_null() {
                        CFRelease(event.cast::<c_void>());
                    }
                }
                CFRelease(source.cast::<c_void>());
                return Err(PlatformError::EventCreation(
                    "CGEventCreateKeyboardEvent returned null".into(),
                ));
            }

            for event in [key_down, key_up] {
                CGEventSetFlags(event, flags.bits());
                CGEventSetIntegerValueField(event, CG_EVENT_SOURCE_USER_DATA, INJECTED_EVENT_TAG);
            }
            CGEventPost(CG_SESSION_EVENT_TAP, key_down);
            CGEventPost(CG_SESSION_EVENT_TAP, key_up);

            CFRelease(key_down.cast::<c_void>());
            CFRelease(key_up.cast::<c_void>());
            CFRelease(source.cast::<c_void>());
        }

        log::debug!(
            "executor: injected {:#04x} {:?} in {:.2}ms",
            key_code,
            flags,
            inject_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(())
    }
}
