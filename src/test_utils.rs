//! Shared test utilities for the kiosk core.
//!
//! Provides a throwaway database and scripted stand-ins for the OS
//! collaborators so ticks and policy transitions can be driven step by step.

#![cfg(test)]

use crate::db::{migrations, safe_lock, Database};
use crate::error::{LaunchError, PlatformError};
use crate::platform::{
    AppLauncher, LaunchableApp, Notice, Notifier, TaskElevation, UsageGranularity, UsageRecord,
    UsageStats,
};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

/// Create a temporary test database with migrations applied.
///
/// Returns a tuple of (Database, TempDir). The TempDir must be kept alive
/// for the duration of the test to prevent the database file from being deleted.
pub fn setup_test_db() -> (Database, TempDir) {
    let dir = tempdir().expect("Failed to create temp directory for test DB");
    let db_path = dir.path().join("test.db");
    let db = Database::open(&db_path).expect("Failed to open test database");
    migrations::run(db.connection()).expect("Failed to run migrations on test DB");
    (db, dir)
}

/// One scripted answer of [`ScriptedUsageStats`].
pub enum Scripted {
    Foreground(&'static str),
    Records(Vec<UsageRecord>),
    Fail,
}

/// Usage stats that answer queries from a queue; an empty queue reports no records.
#[derive(Default)]
pub struct ScriptedUsageStats {
    script: Mutex<VecDeque<Scripted>>,
    queries: Mutex<usize>,
}

impl ScriptedUsageStats {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            queries: Mutex::new(0),
        }
    }

    pub fn push(&self, answer: Scripted) {
        safe_lock(&self.script, "script").push_back(answer);
    }

    pub fn queries(&self) -> usize {
        *safe_lock(&self.queries, "queries")
    }
}

impl UsageStats for ScriptedUsageStats {
    fn query_usage_stats(
        &self,
        _granularity: UsageGranularity,
        _start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<UsageRecord>, PlatformError> {
        *safe_lock(&self.queries, "queries") += 1;
        match safe_lock(&self.script, "script").pop_front() {
            Some(Scripted::Foreground(package)) => Ok(vec![UsageRecord::new(package, end_ms)]),
            Some(Scripted::Records(records)) => Ok(records),
            Some(Scripted::Fail) => Err(PlatformError::QueryFailed("usage service died".into())),
            None => Ok(Vec::new()),
        }
    }
}

/// Launcher that records every request and fails for selected packages.
#[derive(Default)]
pub struct RecordingLauncher {
    launches: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    apps: Vec<LaunchableApp>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    overlapped: AtomicBool,
}

impl RecordingLauncher {
    pub fn with_apps(apps: &[(&str, &str)]) -> Self {
        Self {
            apps: apps
                .iter()
                .map(|(package, label)| LaunchableApp {
                    package: (*package).to_string(),
                    label: (*label).to_string(),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_for(&self, package: &str) {
        safe_lock(&self.failing, "failing").insert(package.to_string());
    }

    pub fn recover(&self, package: &str) {
        safe_lock(&self.failing, "failing").remove(package);
    }

    pub fn launches(&self) -> Vec<String> {
        safe_lock(&self.launches, "launches").clone()
    }

    /// Whether two launch requests were ever in progress at the same time.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

impl AppLauncher for RecordingLauncher {
    fn launch_with_focus(&self, package: &str) -> Result<(), LaunchError> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        safe_lock(&self.launches, "launches").push(package.to_string());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if safe_lock(&self.failing, "failing").contains(package) {
            return Err(LaunchError::NotLaunchable {
                package: package.to_string(),
            });
        }
        Ok(())
    }

    fn launchable_apps(&self) -> Result<Vec<LaunchableApp>, PlatformError> {
        Ok(self.apps.clone())
    }
}

/// Elevation backend that records each call as `operation[:argument]`.
#[derive(Default)]
pub struct RecordingElevation {
    elevated: bool,
    failing: HashSet<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl RecordingElevation {
    pub fn elevated() -> Self {
        Self {
            elevated: true,
            ..Self::default()
        }
    }

    pub fn unelevated() -> Self {
        Self::default()
    }

    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        safe_lock(&self.calls, "calls").clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(':').next() == Some(operation))
            .count()
    }

    fn record(&self, operation: &'static str, argument: Option<String>) -> Result<(), PlatformError> {
        let entry = match argument {
            Some(arg) => format!("{operation}:{arg}"),
            None => operation.to_string(),
        };
        safe_lock(&self.calls, "calls").push(entry);
        if self.failing.contains(operation) {
            return Err(PlatformError::Unsupported { operation });
        }
        Ok(())
    }
}

impl TaskElevation for RecordingElevation {
    fn is_elevated(&self, _package: &str) -> bool {
        self.elevated
    }

    fn set_allowed_tasks(&self, _admin: &str, packages: &[String]) -> Result<(), PlatformError> {
        self.record("set_allowed_tasks", Some(packages.join(",")))
    }

    fn register_home_handler(&self, _admin: &str, component: &str) -> Result<(), PlatformError> {
        self.record("register_home_handler", Some(component.to_string()))
    }

    fn clear_home_handler(&self, _admin: &str, package: &str) -> Result<(), PlatformError> {
        self.record("clear_home_handler", Some(package.to_string()))
    }

    fn set_keyguard_disabled(&self, _admin: &str, disabled: bool) -> Result<(), PlatformError> {
        self.record("set_keyguard_disabled", Some(disabled.to_string()))
    }

    fn enter_protected_task(&self) -> Result<(), PlatformError> {
        self.record("enter_protected_task", None)
    }

    fn exit_protected_task(&self) -> Result<(), PlatformError> {
        self.record("exit_protected_task", None)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        safe_lock(&self.notices, "notices").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        safe_lock(&self.notices, "notices").push(notice);
    }
}
