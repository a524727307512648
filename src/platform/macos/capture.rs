//! macOS key-down tap via CGEventTap on the main CFRunLoop.
//!
//! `MacOSTapBackend` implements `TapBackend`. `install()` creates an active
//! session-level tap at the head of the tap list and attaches its run loop
//! source to the main run loop in the common modes. The callback therefore
//! runs on the main thread, interleaved with the retry timer.
//!
//! Required permissions: Input Monitoring to create the tap, Accessibility
//! for the executor to post replacements.
//!
//! Memory ownership:
//!   `MacOSEventTap` owns the tap port (CFMachPortRef), the run loop source
//!   and the callback state (TapState). Dropping it removes the source from
//!   the main run loop before the port is invalidated and the state freed, so
//!   no callback can observe freed state.

use std::ffi::c_void;

use crate::engine::ModifierFlags;
use crate::platform::{
    DisableReason, EventTap, KeyEvent, PlatformError, TapBackend, TapCallback, TapEvent,
    TapVerdict,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// CGEventType value for key-down events.
const CG_EVENT_KEY_DOWN: u32 = 10;

/// kCGEventTapDisabledByTimeout
const CG_EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;

/// kCGEventTapDisabledByUserInput
const CG_EVENT_TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

/// Event mask: KeyDown only. Disabled notifications are always delivered.
const EVENT_MASK: u64 = 1u64 << CG_EVENT_KEY_DOWN;

/// kCGKeyboardEventAutorepeat
const CG_KEYBOARD_EVENT_AUTOREPEAT: u32 = 8;

/// kCGKeyboardEventKeycode: CGEventField index for the virtual key code.
const CG_KEYBOARD_EVENT_KEYCODE: u32 = 9;

/// kCGEventSourceUserData
pub(super) const CG_EVENT_SOURCE_USER_DATA: u32 = 42;

/// kCGSessionEventTap: tap where login-session events enter.
const CG_SESSION_EVENT_TAP: u32 = 1;

/// kCGHeadInsertEventTap: insert tap at the head of the event tap list.
const CG_HEAD_INSERT_EVENT_TAP: u32 = 0;

/// kCGEventTapOptionDefault: active tap; the callback may modify or suppress events.
const CG_EVENT_TAP_OPTION_DEFAULT: u32 = 0;

// ---------------------------------------------------------------------------
// Raw FFI types and declarations
// ---------------------------------------------------------------------------

type CFMachPortRef = *mut c_void;
type CFRunLoopRef = *mut c_void;
type CFRunLoopSourceRef = *mut c_void;
type CFStringRef = *const c_void;
type CGEventRef = *mut c_void;
type CGEventTapProxy = *mut c_void;

/// Signature required by CGEventTapCreate for the C callback.
type CGEventTapCallBack = unsafe extern "C" fn(
    proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    /// Returns true if this process may observe global input (Input Monitoring).
    fn CGPreflightListenEventAccess() -> bool;

    /// Creates an event tap; returns null on permission failure or system error.
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: CGEventTapCallBack,
        user_info: *mut c_void,
    ) -> CFMachPortRef;

    /// Enables or disables an event tap.
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);

    /// Reads an integer-valued field from a CGEvent.
    fn CGEventGetIntegerValueField(event: CGEventRef, field: u32) -> i64;

    /// Reads the modifier flags of a CGEvent.
    fn CGEventGetFlags(event: CGEventRef) -> u64;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    /// Creates a CFRunLoopSource backed by a CFMachPort.
    fn CFMachPortCreateRunLoopSource(
        allocator: *mut c_void,
        port: CFMachPortRef,
        order: isize,
    ) -> CFRunLoopSourceRef;

    /// Stops the port from delivering further messages.
    fn CFMachPortInvalidate(port: CFMachPortRef);

    /// Returns the main thread's CFRunLoop.
    fn CFRunLoopGetMain() -> CFRunLoopRef;

    /// Adds a source to a run loop for the given mode.
    fn CFRunLoopAddSource(rl: CFRunLoopRef, source: CFRunLoopSourceRef, mode: CFStringRef);

    /// Removes a source from a run loop for the given mode.
    fn CFRunLoopRemoveSource(rl: CFRunLoopRef, source: CFRunLoopSourceRef, mode: CFStringRef);

    /// Releases a Core Foundation object.
    fn CFRelease(cf: *const c_void);

    /// Pseudo-mode covering every mode in the run loop's common set.
    static kCFRunLoopCommonModes: CFStringRef;
}

// ---------------------------------------------------------------------------
// Callback state
// ---------------------------------------------------------------------------

/// Heap-allocated state passed to the C callback via the `user_info` pointer.
///
/// Kept alive (via `Box::into_raw`) for the lifetime of the tap and reclaimed
/// with `Box::from_raw` in `MacOSEventTap::drop`.
struct TapState {
    callback: TapCallback,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Installs CGEventTaps on the main run loop.
pub struct MacOSTapBackend;

impl MacOSTapBackend {
    pub fn new() -> Self {
        MacOSTapBackend
    }
}

impl TapBackend for MacOSTapBackend {
    fn install(&self, callback: TapCallback) -> Result<Box<dyn EventTap>, PlatformError> {
        // Fail with a clear message rather than letting CGEventTapCreate
        // return null without explanation.
        if !unsafe { CGPreflightListenEventAccess() } {
            return Err(PlatformError::PermissionDenied(
                "Input Monitoring permission required. \
                 Grant it in System Settings > Privacy & Security > Input Monitoring."
                    .into(),
            ));
        }

        // Heap-allocate TapState so its address is stable for the tap lifetime.
        let state = Box::into_raw(Box::new(TapState { callback }));

        let port = unsafe {
            CGEventTapCreate(
                CG_SESSION_EVENT_TAP,
                CG_HEAD_INSERT_EVENT_TAP,
                CG_EVENT_TAP_OPTION_DEFAULT,
                EVENT_MASK,
                event_tap_callback,
                state.cast::<c_void>(),
            )
        };

        if port.is_null() {
            // Reclaim TapState before returning the error.
            drop(unsafe { Box::from_raw(state) });
            return Err(PlatformError::TapCreation(
                "CGEventTapCreate returned null".into(),
            ));
        }

        let source = unsafe { CFMachPortCreateRunLoopSource(std::ptr::null_mut(), port, 0) };
        if source.is_null() {
            unsafe {
                CFMachPortInvalidate(port);
                CFRelease(port.cast::<c_void>());
                drop(Box::from_raw(state));
            }
            return Err(PlatformError::TapCreation(
                "CFMachPortCreateRunLoopSource returned null".into(),
            ));
        }

        unsafe { CFRunLoopAddSource(CFRunLoopGetMain(), source, kCFRunLoopCommonModes) };
        log::debug!("capture: CGEventTap attached to main run loop");

        Ok(Box::new(MacOSEventTap {
            port,
            source,
            state,
        }))
    }
}

// ---------------------------------------------------------------------------
// Installed tap
// ---------------------------------------------------------------------------

pub struct MacOSEventTap {
    port: CFMachPortRef,
    source: CFRunLoopSourceRef,
    state: *mut TapState,
}

impl EventTap for MacOSEventTap {
    fn enable(&self) {
        unsafe { CGEventTapEnable(self.port, true) };
    }
}

impl Drop for MacOSEventTap {
    fn drop(&mut self) {
        unsafe {
            CGEventTapEnable(self.port, false);
            CFRunLoopRemoveSource(CFRunLoopGetMain(), self.source, kCFRunLoopCommonModes);
            CFRelease(self.source.cast::<c_void>());
            CFMachPortInvalidate(self.port);
            CFRelease(self.port.cast::<c_void>());
            drop(Box::from_raw(self.state));
        }
        log::debug!("capture: CGEventTap released");
    }
}

// ---------------------------------------------------------------------------
// C callback
// ---------------------------------------------------------------------------

/// Called by the OS on the main run loop thread for each tapped event.
///
/// Returning null suppresses the event; returning `event` passes it through
/// unmodified. Disabled notifications carry no usable event and are always
/// passed through.
unsafe extern "C" fn event_tap_callback(
    _proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    if user_info.is_null() {
        return event;
    }
    let state = &*(user_info as *const TapState);

    let tap_event = match event_type {
        CG_EVENT_TAP_DISABLED_BY_TIMEOUT => TapEvent::Disabled(DisableReason::Timeout),
        CG_EVENT_TAP_DISABLED_BY_USER_INPUT => TapEvent::Disabled(DisableReason::UserInput),
        CG_EVENT_KEY_DOWN if !event.is_null() => TapEvent::KeyDown(read_key_event(event)),
        _ => TapEvent::Other,
    };

    match (state.callback)(tap_event) {
        TapVerdict::PassThrough => event,
        TapVerdict::Suppress => std::ptr::null_mut(),
    }
}

unsafe fn read_key_event(event: CGEventRef) -> KeyEvent {
    KeyEvent {
        // User data first: it decides whether anything else matters.
        user_data: CGEventGetIntegerValueField(event, CG_EVENT_SOURCE_USER_DATA),
        key_code: CGEventGetIntegerValueField(event, CG_KEYBOARD_EVENT_KEYCODE) as u16,
        flags: ModifierFlags::from_bits(CGEventGetFlags(event)),
        autorepeat: CGEventGetIntegerValueField(event, CG_KEYBOARD_EVENT_AUTOREPEAT) != 0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
