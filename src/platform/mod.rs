pub mod types;

pub use types::{
    AppLauncher, LaunchableApp, Notice, Notifier, TaskElevation, UsageGranularity, UsageRecord,
    UsageStats,
};

use crate::error::PlatformError;

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "linux")]
pub use linux::{X11Launcher as NativeLauncher, X11UsageStats as NativeUsageStats};

/// Elevation backend for desktop sessions, which never hold device-owner authority.
#[derive(Debug, Default)]
pub struct DesktopElevation;

impl TaskElevation for DesktopElevation {
    fn is_elevated(&self, _package: &str) -> bool {
        false
    }

    fn set_allowed_tasks(&self, _admin: &str, _packages: &[String]) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported {
            operation: "set_allowed_tasks",
        })
    }

    fn register_home_handler(&self, _admin: &str, _component: &str) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported {
            operation: "register_home_handler",
        })
    }

    fn clear_home_handler(&self, _admin: &str, _package: &str) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported {
            operation: "clear_home_handler",
        })
    }

    fn set_keyguard_disabled(&self, _admin: &str, _disabled: bool) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported {
            operation: "set_keyguard_disabled",
        })
    }

    fn enter_protected_task(&self) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported {
            operation: "enter_protected_task",
        })
    }

    fn exit_protected_task(&self) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported {
            operation: "exit_protected_task",
        })
    }
}

// Stubs for development on other platforms
#[cfg(not(target_os = "linux"))]
#[derive(Debug, Default)]
pub struct NativeUsageStats;

#[cfg(not(target_os = "linux"))]
impl NativeUsageStats {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(target_os = "linux"))]
impl UsageStats for NativeUsageStats {
    fn query_usage_stats(
        &self,
        _granularity: UsageGranularity,
        _start_ms: i64,
        _end_ms: i64,
    ) -> Result<Vec<UsageRecord>, PlatformError> {
        Ok(Vec::new())
    }
}

#[cfg(not(target_os = "linux"))]
#[derive(Debug, Default)]
pub struct NativeLauncher;

#[cfg(not(target_os = "linux"))]
impl NativeLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(target_os = "linux"))]
impl AppLauncher for NativeLauncher {
    fn launch_with_focus(&self, package: &str) -> Result<(), crate::error::LaunchError> {
        Err(crate::error::LaunchError::NotLaunchable {
            package: package.to_string(),
        })
    }

    fn launchable_apps(&self) -> Result<Vec<LaunchableApp>, PlatformError> {
        Ok(Vec::new())
    }
}
