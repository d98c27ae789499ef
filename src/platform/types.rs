use crate::error::{LaunchError, PlatformError};
use serde::Serialize;

/// Bucket size the usage-stats service aggregates records by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageGranularity {
    Daily,
}

/// One app's usage summary within the queried range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub package: String,
    /// Milliseconds since the Unix epoch.
    pub last_time_used: i64,
}

impl UsageRecord {
    pub fn new(package: &str, last_time_used: i64) -> Self {
        Self {
            package: package.to_string(),
            last_time_used,
        }
    }
}

/// An app the picker may offer as lock target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchableApp {
    pub package: String,
    pub label: String,
}

/// OS usage-statistics service.
pub trait UsageStats: Send + Sync {
    fn query_usage_stats(
        &self,
        granularity: UsageGranularity,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<UsageRecord>, PlatformError>;
}

/// OS app launcher.
pub trait AppLauncher: Send + Sync {
    /// Bring `package` to the foreground, stealing focus from whatever owns it.
    fn launch_with_focus(&self, package: &str) -> Result<(), LaunchError>;

    fn launchable_apps(&self) -> Result<Vec<LaunchableApp>, PlatformError>;
}

/// OS task-elevation (device-owner) primitives.
pub trait TaskElevation: Send + Sync {
    fn is_elevated(&self, package: &str) -> bool;
    fn set_allowed_tasks(&self, admin: &str, packages: &[String]) -> Result<(), PlatformError>;
    fn register_home_handler(&self, admin: &str, component: &str) -> Result<(), PlatformError>;
    fn clear_home_handler(&self, admin: &str, package: &str) -> Result<(), PlatformError>;
    fn set_keyguard_disabled(&self, admin: &str, disabled: bool) -> Result<(), PlatformError>;
    /// Strong lock-task mode when elevated, user-escapable screen pinning otherwise.
    fn enter_protected_task(&self) -> Result<(), PlatformError>;
    fn exit_protected_task(&self) -> Result<(), PlatformError>;
}

/// Short user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    /// Not a device owner: only user-escapable pinning is available.
    LimitedProtection,
    PartialElevation { failed_steps: Vec<String> },
    IncorrectCredential,
    CouldNotLaunch { package: String },
    ExitingKiosk,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}
