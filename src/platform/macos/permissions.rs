//! TCC permission probes: Input Monitoring (listen) and Accessibility (post).

use crate::permission::Permission;
use crate::platform::PermissionProbe;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn CGPreflightListenEventAccess() -> bool;
    fn CGPreflightPostEventAccess() -> bool;
    /// Shows the system prompt the first time; returns the current grant.
    fn CGRequestListenEventAccess() -> bool;
    fn CGRequestPostEventAccess() -> bool;
}

pub struct MacOSPermissions;

impl PermissionProbe for MacOSPermissions {
    fn input_monitoring_granted(&self) -> bool {
        unsafe { CGPreflightListenEventAccess() }
    }

    fn post_events_granted(&self) -> bool {
        unsafe { CGPreflightPostEventAccess() }
    }

    fn request(&self, permission: Permission) -> bool {
        match permission {
            Permission::InputMonitoring => unsafe { CGRequestListenEventAccess() },
            Permission::PostEvents => unsafe { CGRequestPostEventAccess() },
        }
    }
}
