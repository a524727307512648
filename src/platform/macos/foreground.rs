//! Frontmost application lookup through NSWorkspace.

use objc2_app_kit::NSWorkspace;

use crate::platform::ForegroundApp;

pub struct MacOSForeground;

impl ForegroundApp for MacOSForeground {
    #[allow(unused_unsafe)]
    fn frontmost_bundle_id(&self) -> Option<String> {
        // SAFETY: sharedWorkspace and frontmostApplication are plain getters on
        // AppKit singletons; we are on the main thread that runs the run loop.
        unsafe {
            let workspace = NSWorkspace::sharedWorkspace();
            let app = workspace.frontmostApplication()?;
            app.bundleIdentifier().map(|id| id.to_string())
        }
    }
}
