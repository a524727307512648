//! macOS platform backend.
//!
//! Capture: CGEventTap (session level, head insert) via `MacOSTapBackend`.
//! Injection: CGEventPost (synchronous) via `MacOSInjector`.
//! Retry: CFRunLoopTimer on the main run loop via `MacOSRetryTimer`.
//!
//! Capture needs Input Monitoring; injection needs Accessibility. Both are
//! probed by `MacOSPermissions`. Guide the user to:
//!   System Settings > Privacy & Security > Input Monitoring / Accessibility
//!
//! Everything here must be used from the main thread.

mod capture;
mod executor;
mod foreground;
mod permissions;
mod timer;

pub use capture::MacOSTapBackend;
pub use executor::MacOSInjector;
pub use foreground::MacOSForeground;
pub use permissions::MacOSPermissions;
pub use timer::MacOSRetryTimer;

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFRunLoopRun();
}

/// Runs the main run loop. Returns only if the run loop is stopped.
pub fn run_main_loop() {
    log::info!("run loop: started");
    unsafe { CFRunLoopRun() };
    log::info!("run loop: exited");
}
