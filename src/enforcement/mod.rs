use crate::clock::now_millis;
use crate::constants::DEFAULT_TICK_INTERVAL;
use crate::db::safe_lock;
use crate::error::KioskError;
use crate::observer::ForegroundObserver;
use crate::platform::AppLauncher;
use crate::scheduler::PeriodicTask;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How ticks are triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// A dedicated timer thread ticks at this fixed interval.
    Every(Duration),
    /// The owner calls [`EnforcementLoop::run_tick`] itself.
    Manual,
}

impl Default for Cadence {
    fn default() -> Self {
        Cadence::Every(DEFAULT_TICK_INTERVAL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementSession {
    pub target: String,
    pub started_at: i64,
}

impl EnforcementSession {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            started_at: now_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Stopped,
    Running,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The loop was stopped before the tick got to act.
    Inactive,
    NoForeground,
    OnTarget,
    Corrected,
    LaunchFailed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnforcementStatus {
    pub running: bool,
    pub target: Option<String>,
    pub ticks: u64,
    pub corrections: u64,
    pub launch_failures: u64,
    /// Number of `stop` calls over the loop's lifetime.
    pub stops: u64,
    pub last_foreground: Option<String>,
}

#[derive(Default)]
struct Counters {
    ticks: u64,
    corrections: u64,
    launch_failures: u64,
    stops: u64,
    last_foreground: Option<String>,
}

struct Shared {
    running: AtomicBool,
    session: Mutex<Option<EnforcementSession>>,
    counters: Mutex<Counters>,
    tick_guard: Mutex<()>,
    observer: ForegroundObserver,
    launcher: Arc<dyn AppLauncher>,
}

impl Shared {
    fn target(&self) -> Option<String> {
        safe_lock(&self.session, "Enforcement session")
            .as_ref()
            .map(|s| s.target.clone())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn run_tick(&self) -> TickOutcome {
        let _serial = safe_lock(&self.tick_guard, "Enforcement tick");

        if !self.is_running() {
            return TickOutcome::Inactive;
        }
        let Some(target) = self.target() else {
            return TickOutcome::Inactive;
        };

        let foreground = self
            .observer
            .current_foreground_app(self.observer.window_secs());

        let outcome = match foreground.as_deref() {
            None => TickOutcome::NoForeground,
            Some(app) if app == target => TickOutcome::OnTarget,
            Some(app) => {
                // stop() may have landed while the query was in flight
                if !self.is_running() {
                    return TickOutcome::Inactive;
                }
                debug!("'{app}' owns the foreground, restoring '{target}'");
                match self.launcher.launch_with_focus(&target) {
                    Ok(()) => TickOutcome::Corrected,
                    Err(e) => {
                        warn!("Could not bring '{target}' to the foreground: {e}");
                        TickOutcome::LaunchFailed
                    }
                }
            }
        };

        let mut counters = safe_lock(&self.counters, "Enforcement counters");
        counters.ticks += 1;
        match outcome {
            TickOutcome::Corrected => counters.corrections += 1,
            TickOutcome::LaunchFailed => counters.launch_failures += 1,
            TickOutcome::Inactive | TickOutcome::NoForeground | TickOutcome::OnTarget => {}
        }
        if foreground.is_some() {
            counters.last_foreground = foreground;
        }

        outcome
    }
}

/// Keeps the target app in the foreground by re-launching it whenever
/// another app is observed on top.
///
/// `start`/`stop` are meant to be called from one control thread; ticks run
/// on the loop's own timer thread and never overlap.
pub struct EnforcementLoop {
    shared: Arc<Shared>,
    cadence: Cadence,
    task: Mutex<Option<PeriodicTask>>,
}

impl EnforcementLoop {
    pub fn new(observer: ForegroundObserver, launcher: Arc<dyn AppLauncher>, cadence: Cadence) -> Self {
        Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                session: Mutex::new(None),
                counters: Mutex::new(Counters::default()),
                tick_guard: Mutex::new(()),
                observer,
                launcher,
            }),
            cadence,
            task: Mutex::new(None),
        }
    }

    /// Start enforcing `target`. When already running only the target is
    /// replaced; the tick cadence is left alone.
    pub fn start(&self, target: &str) -> Result<(), KioskError> {
        {
            let mut session = safe_lock(&self.shared.session, "Enforcement session");
            if let Some(current) = session.as_mut().filter(|_| self.shared.is_running()) {
                if current.target != target {
                    info!("Enforcement target changed: '{}' -> '{target}'", current.target);
                    current.target = target.to_string();
                }
                return Ok(());
            }
            *session = Some(EnforcementSession::new(target));
            self.shared.running.store(true, Ordering::SeqCst);
        }

        if let Cadence::Every(interval) = self.cadence {
            let mut task = safe_lock(&self.task, "Enforcement timer");
            // Let a tick left over from a previous session finish first
            if let Some(previous) = task.take() {
                previous.join();
            }

            let shared = Arc::clone(&self.shared);
            match PeriodicTask::spawn("kiosk-enforcement", interval, move || {
                shared.run_tick();
            }) {
                Ok(spawned) => *task = Some(spawned),
                Err(e) => {
                    self.shared.running.store(false, Ordering::SeqCst);
                    *safe_lock(&self.shared.session, "Enforcement session") = None;
                    return Err(KioskError::Io(e));
                }
            }
        }

        info!("Enforcement started for '{target}'");
        Ok(())
    }

    /// Stop enforcing. No tick acts after this returns; one already running
    /// finishes without rescheduling.
    pub fn stop(&self) {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        safe_lock(&self.shared.counters, "Enforcement counters").stops += 1;
        if let Some(task) = safe_lock(&self.task, "Enforcement timer").as_mut() {
            task.cancel();
        }
        *safe_lock(&self.shared.session, "Enforcement session") = None;

        if was_running {
            info!("Enforcement stopped");
        }
    }

    /// Run one tick on the calling thread.
    pub fn run_tick(&self) -> TickOutcome {
        self.shared.run_tick()
    }

    pub fn state(&self) -> LoopState {
        if self.shared.is_running() {
            LoopState::Running
        } else {
            LoopState::Stopped
        }
    }

    pub fn session(&self) -> Option<EnforcementSession> {
        safe_lock(&self.shared.session, "Enforcement session").clone()
    }

    pub fn target(&self) -> Option<String> {
        self.shared.target()
    }

    pub fn status(&self) -> EnforcementStatus {
        let counters = safe_lock(&self.shared.counters, "Enforcement counters");
        EnforcementStatus {
            running: self.shared.is_running(),
            target: self.shared.target(),
            ticks: counters.ticks,
            corrections: counters.corrections,
            launch_failures: counters.launch_failures,
            stops: counters.stops,
            last_foreground: counters.last_foreground.clone(),
        }
    }
}

impl Drop for EnforcementLoop {
    fn drop(&mut self) {
        self.stop();
        if let Some(task) = safe_lock(&self.task, "Enforcement timer").take() {
            task.join();
        }
    }
}
