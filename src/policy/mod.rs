use crate::config::KioskConfig;
use crate::db::{with_connection, Database};
use crate::enforcement::{EnforcementLoop, EnforcementStatus, LoopState};
use crate::error::{KioskError, PlatformError};
use crate::events::{InputDisposition, InputSignal};
use crate::models::{ExitAttempt, TargetAppSelection};
use crate::platform::{AppLauncher, LaunchableApp, Notice, Notifier, TaskElevation};
use crate::validation::validate_package_id;
use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyState {
    /// No target chosen yet.
    Unconfigured,
    /// App picker is open.
    Selecting,
    Locked,
    /// Credential prompt is open.
    ExitPending,
    Unlocked,
}

impl fmt::Display for PolicyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyState::Unconfigured => "unconfigured",
            PolicyState::Selecting => "selecting",
            PolicyState::Locked => "locked",
            PolicyState::ExitPending => "exit pending",
            PolicyState::Unlocked => "unlocked",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    Unelevated,
    Elevated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElevationStep {
    AllowedTasks,
    HomeHandler,
    KeyguardDisabled,
    ProtectedTask,
}

impl ElevationStep {
    pub fn name(self) -> &'static str {
        match self {
            ElevationStep::AllowedTasks => "allowed_tasks",
            ElevationStep::HomeHandler => "home_handler",
            ElevationStep::KeyguardDisabled => "keyguard_disabled",
            ElevationStep::ProtectedTask => "protected_task",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub step: ElevationStep,
    pub error: Option<String>,
}

/// Outcome of one activation: the mode and how each protection step fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElevationReport {
    pub mode: PolicyMode,
    pub steps: Vec<StepResult>,
}

impl ElevationReport {
    pub fn failed_steps(&self) -> Vec<ElevationStep> {
        self.steps
            .iter()
            .filter(|s| s.error.is_some())
            .map(|s| s.step)
            .collect()
    }

    /// True when protection is weaker than full elevated mode.
    pub fn is_degraded(&self) -> bool {
        self.mode == PolicyMode::Unelevated || self.steps.iter().any(|s| s.error.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitOutcome {
    Unlocked,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicySnapshot {
    pub state: PolicyState,
    pub mode: Option<PolicyMode>,
    pub target: Option<String>,
    pub elevation: Option<ElevationReport>,
    pub enforcement: EnforcementStatus,
}

/// OS collaborators the controller drives.
#[derive(Clone)]
pub struct PolicyBackends {
    pub elevation: Arc<dyn TaskElevation>,
    pub launcher: Arc<dyn AppLauncher>,
    pub notifier: Arc<dyn Notifier>,
}

/// Owns the lock/unlock state machine, the persisted target and the
/// elevated-mode registrations. Drives the enforcement loop.
pub struct PolicyController {
    config: KioskConfig,
    db: Arc<Mutex<Database>>,
    backends: PolicyBackends,
    enforcement: Arc<EnforcementLoop>,
    state: PolicyState,
    /// State to fall back to when the picker or PIN prompt is dismissed.
    resume_state: PolicyState,
    report: Option<ElevationReport>,
    /// Whether the protections from the last activation are still applied.
    protected: bool,
}

impl PolicyController {
    pub fn new(
        config: KioskConfig,
        db: Arc<Mutex<Database>>,
        backends: PolicyBackends,
        enforcement: Arc<EnforcementLoop>,
    ) -> Self {
        Self {
            config,
            db,
            backends,
            enforcement,
            state: PolicyState::Unconfigured,
            resume_state: PolicyState::Unconfigured,
            report: None,
            protected: false,
        }
    }

    pub fn state(&self) -> PolicyState {
        self.state
    }

    pub fn mode(&self) -> Option<PolicyMode> {
        self.report.as_ref().map(|r| r.mode)
    }

    pub fn elevation_report(&self) -> Option<&ElevationReport> {
        self.report.as_ref()
    }

    pub fn target(&self) -> Result<Option<String>, KioskError> {
        let selection = with_connection(&self.db, "load target selection", TargetAppSelection::load)?;
        Ok(selection.package)
    }

    /// Apply the kiosk protections for the current authority level and resume
    /// enforcement of the persisted target, if any.
    pub fn activate(&mut self) -> Result<ElevationReport, KioskError> {
        let report = self.apply_protections();

        match self.target()? {
            Some(target) => {
                self.enforcement.start(&target)?;
                self.state = PolicyState::Locked;
            }
            None => {
                self.enforcement.stop();
                self.state = PolicyState::Unconfigured;
            }
        }
        self.resume_state = self.state;

        Ok(report)
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    /// Elevated registrations or the unelevated pin, depending on authority.
    fn apply_protections(&mut self) -> ElevationReport {
        let mode = if self.backends.elevation.is_elevated(&self.config.own_package) {
            PolicyMode::Elevated
        } else {
            PolicyMode::Unelevated
        };
        info!("Activating kiosk policies ({mode:?})");

        let report = match mode {
            PolicyMode::Elevated => self.apply_elevated_policies(),
            PolicyMode::Unelevated => {
                let pinned = self.backends.elevation.enter_protected_task();
                log_step(ElevationStep::ProtectedTask, &pinned);
                self.backends.notifier.notify(Notice::LimitedProtection);
                ElevationReport {
                    mode,
                    steps: vec![step_result(ElevationStep::ProtectedTask, pinned)],
                }
            }
        };

        if mode == PolicyMode::Elevated && report.is_degraded() {
            let failed_steps = report
                .failed_steps()
                .into_iter()
                .map(|s| s.name().to_string())
                .collect();
            self.backends
                .notifier
                .notify(Notice::PartialElevation { failed_steps });
        }
        self.report = Some(report.clone());
        self.protected = true;
        report
    }

    fn apply_elevated_policies(&self) -> ElevationReport {
        let admin = self.config.admin_component.as_str();
        let elevation = &self.backends.elevation;

        let attempts = [
            (
                ElevationStep::AllowedTasks,
                elevation.set_allowed_tasks(admin, &[self.config.own_package.clone()]),
            ),
            (
                ElevationStep::HomeHandler,
                elevation.register_home_handler(admin, &self.config.home_component),
            ),
            (
                ElevationStep::KeyguardDisabled,
                elevation.set_keyguard_disabled(admin, true),
            ),
            (ElevationStep::ProtectedTask, elevation.enter_protected_task()),
        ];

        let steps = attempts
            .into_iter()
            .map(|(step, result)| {
                log_step(step, &result);
                step_result(step, result)
            })
            .collect();

        ElevationReport {
            mode: PolicyMode::Elevated,
            steps,
        }
    }

    fn clear_elevated_policies(&self) {
        let admin = self.config.admin_component.as_str();
        let elevation = &self.backends.elevation;

        log_step(ElevationStep::AllowedTasks, &elevation.set_allowed_tasks(admin, &[]));
        log_step(
            ElevationStep::HomeHandler,
            &elevation.clear_home_handler(admin, &self.config.own_package),
        );
        log_step(
            ElevationStep::KeyguardDisabled,
            &elevation.set_keyguard_disabled(admin, false),
        );
        log_step(ElevationStep::ProtectedTask, &elevation.exit_protected_task());
    }

    /// Launchable apps the picker may offer, without this app, sorted by label.
    pub fn selectable_apps(&self) -> Result<Vec<LaunchableApp>, KioskError> {
        let mut apps: Vec<LaunchableApp> = self
            .backends
            .launcher
            .launchable_apps()?
            .into_iter()
            .filter(|a| a.package != self.config.own_package)
            .collect();
        apps.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.package.cmp(&b.package)));
        Ok(apps)
    }

    pub fn begin_selection(&mut self) -> Result<(), KioskError> {
        match self.state {
            PolicyState::Unconfigured | PolicyState::Locked | PolicyState::Unlocked => {
                self.resume_state = self.state;
                self.state = PolicyState::Selecting;
                Ok(())
            }
            PolicyState::Selecting => Ok(()),
            PolicyState::ExitPending => Err(self.invalid("open the app picker")),
        }
    }

    pub fn cancel_selection(&mut self) {
        if self.state == PolicyState::Selecting {
            self.state = self.resume_state;
        }
    }

    /// Persist `package` as target, enforce it, and bring it up.
    pub fn select_target(&mut self, package: &str) -> Result<(), KioskError> {
        if self.state == PolicyState::ExitPending {
            return Err(self.invalid("select a target"));
        }
        let package = validate_package_id(package)?.to_string();
        if package == self.config.own_package {
            return Err(KioskError::InvalidInput {
                field: "package",
                reason: "cannot lock the kiosk app itself".into(),
            });
        }

        with_connection(&self.db, "save target selection", |conn| {
            TargetAppSelection::save(conn, &package)
        })?;
        if !self.protected {
            self.apply_protections();
        }
        self.enforcement.start(&package)?;
        self.state = PolicyState::Locked;
        self.resume_state = PolicyState::Locked;
        info!("Locked to '{package}'");

        if let Err(e) = self.backends.launcher.launch_with_focus(&package) {
            warn!("Could not launch '{package}': {e}");
            self.backends.notifier.notify(Notice::CouldNotLaunch { package });
        }
        Ok(())
    }

    /// Show the credential prompt.
    pub fn begin_exit(&mut self) -> Result<(), KioskError> {
        match self.state {
            PolicyState::Locked | PolicyState::Unconfigured => {
                self.resume_state = self.state;
                self.state = PolicyState::ExitPending;
                Ok(())
            }
            PolicyState::ExitPending => Ok(()),
            PolicyState::Selecting | PolicyState::Unlocked => Err(self.invalid("request exit")),
        }
    }

    pub fn cancel_exit(&mut self) {
        if self.state == PolicyState::ExitPending {
            self.state = self.resume_state;
        }
    }

    /// Tear down enforcement if `credential` matches the configured PIN.
    /// The persisted target is kept for the next activation.
    pub fn request_exit(&mut self, credential: &str) -> ExitOutcome {
        let attempt = ExitAttempt::new(credential);
        if !attempt.matches(&self.config.exit_pin) {
            info!("Exit rejected: incorrect credential");
            self.cancel_exit();
            self.backends.notifier.notify(Notice::IncorrectCredential);
            return ExitOutcome::Rejected;
        }

        // Authority may have been revoked since activation
        if self.backends.elevation.is_elevated(&self.config.own_package) {
            self.clear_elevated_policies();
        } else {
            log_step(
                ElevationStep::ProtectedTask,
                &self.backends.elevation.exit_protected_task(),
            );
        }
        self.enforcement.stop();
        self.protected = false;

        self.state = PolicyState::Unlocked;
        self.resume_state = PolicyState::Unlocked;
        self.backends.notifier.notify(Notice::ExitingKiosk);
        info!("Kiosk mode exited");
        ExitOutcome::Unlocked
    }

    /// Decide whether a key reaches the default OS handler. Keys stay guarded
    /// while the picker is open over a running lock.
    pub fn handle_input(&self, signal: InputSignal) -> InputDisposition {
        let guarded = matches!(self.state, PolicyState::Locked | PolicyState::ExitPending)
            || self.enforcement.state() == LoopState::Running;
        if guarded && signal.is_navigation() {
            debug!("Suppressed {signal:?} while {}", self.state);
            InputDisposition::Consumed
        } else {
            InputDisposition::Forward
        }
    }

    /// Losing focus while locked re-asserts enforcement of the target.
    pub fn handle_focus_change(&mut self, has_focus: bool) -> Result<(), KioskError> {
        if has_focus || self.state != PolicyState::Locked {
            return Ok(());
        }
        match self.target()? {
            Some(target) => self.enforcement.start(&target),
            None => Err(KioskError::NoTarget),
        }
    }

    pub fn snapshot(&self) -> Result<PolicySnapshot, KioskError> {
        Ok(PolicySnapshot {
            state: self.state,
            mode: self.mode(),
            target: self.target()?,
            elevation: self.report.clone(),
            enforcement: self.enforcement.status(),
        })
    }

    fn invalid(&self, action: &'static str) -> KioskError {
        KioskError::InvalidTransition {
            state: self.state.to_string(),
            action,
        }
    }
}

fn step_result(step: ElevationStep, result: Result<(), PlatformError>) -> StepResult {
    StepResult {
        step,
        error: result.err().map(|e| e.to_string()),
    }
}

fn log_step(step: ElevationStep, result: &Result<(), PlatformError>) {
    match result {
        Ok(()) => debug!("Policy step {} applied", step.name()),
        Err(e) => warn!("Policy step {} failed: {e}", step.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcement::{Cadence, TickOutcome};
    use crate::observer::ForegroundObserver;
    use crate::test_utils::{
        RecordingElevation, RecordingLauncher, RecordingNotifier, Scripted, ScriptedUsageStats,
    };

    struct Fixture {
        controller: PolicyController,
        enforcement: Arc<EnforcementLoop>,
        stats: Arc<ScriptedUsageStats>,
        launcher: Arc<RecordingLauncher>,
        elevation: Arc<RecordingElevation>,
        notifier: Arc<RecordingNotifier>,
        db: Arc<Mutex<Database>>,
    }

    fn fixture_with(elevation: RecordingElevation, launcher: RecordingLauncher) -> Fixture {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let stats = Arc::new(ScriptedUsageStats::default());
        let launcher = Arc::new(launcher);
        let elevation = Arc::new(elevation);
        let notifier = Arc::new(RecordingNotifier::default());
        let enforcement = Arc::new(EnforcementLoop::new(
            ForegroundObserver::new(Arc::<ScriptedUsageStats>::clone(&stats)),
            Arc::<RecordingLauncher>::clone(&launcher),
            Cadence::Manual,
        ));
        let controller = PolicyController::new(
            KioskConfig::default(),
            Arc::clone(&db),
            PolicyBackends {
                elevation: Arc::<RecordingElevation>::clone(&elevation),
                launcher: Arc::<RecordingLauncher>::clone(&launcher),
                notifier: Arc::<RecordingNotifier>::clone(&notifier),
            },
            Arc::clone(&enforcement),
        );
        Fixture {
            controller,
            enforcement,
            stats,
            launcher,
            elevation,
            notifier,
            db,
        }
    }

    fn fixture(elevation: RecordingElevation) -> Fixture {
        fixture_with(elevation, RecordingLauncher::default())
    }

    fn persist(db: &Arc<Mutex<Database>>, package: &str) {
        with_connection(db, "seed", |conn| TargetAppSelection::save(conn, package)).unwrap();
    }

    #[test]
    fn test_activate_unconfigured() {
        let mut f = fixture(RecordingElevation::unelevated());
        f.controller.activate().unwrap();

        assert_eq!(f.controller.state(), PolicyState::Unconfigured);
        assert_eq!(f.enforcement.state(), LoopState::Stopped);
    }

    #[test]
    fn test_activate_elevated_applies_all_four() {
        let mut f = fixture(RecordingElevation::elevated());
        let report = f.controller.activate().unwrap();

        assert_eq!(report.mode, PolicyMode::Elevated);
        assert!(!report.is_degraded());
        assert_eq!(
            f.elevation.calls(),
            vec![
                "set_allowed_tasks:com.example.kioskmodeapplication",
                "register_home_handler:com.example.kioskmodeapplication/.MainActivity",
                "set_keyguard_disabled:true",
                "enter_protected_task",
            ]
        );
        assert!(f.notifier.notices().is_empty());
    }

    #[test]
    fn test_partial_elevation_is_best_effort_and_reported() {
        let mut f = fixture(RecordingElevation::elevated().failing("register_home_handler"));
        let report = f.controller.activate().unwrap();

        assert_eq!(f.elevation.calls().len(), 4, "later steps still attempted");
        assert!(report.is_degraded());
        assert_eq!(report.failed_steps(), vec![ElevationStep::HomeHandler]);
        assert_eq!(
            f.notifier.notices(),
            vec![Notice::PartialElevation {
                failed_steps: vec!["home_handler".into()]
            }]
        );
    }

    #[test]
    fn test_activate_unelevated_pins_and_warns() {
        let mut f = fixture(RecordingElevation::unelevated());
        let report = f.controller.activate().unwrap();

        assert_eq!(report.mode, PolicyMode::Unelevated);
        assert!(report.is_degraded());
        assert_eq!(f.elevation.calls(), vec!["enter_protected_task"]);
        assert_eq!(f.notifier.notices(), vec![Notice::LimitedProtection]);
    }

    #[test]
    fn test_activate_with_persisted_target_resumes_enforcement() {
        let mut f = fixture(RecordingElevation::elevated());
        persist(&f.db, "com.example.app");

        f.controller.activate().unwrap();

        assert_eq!(f.controller.state(), PolicyState::Locked);
        assert_eq!(f.enforcement.state(), LoopState::Running);
        assert_eq!(f.enforcement.target().as_deref(), Some("com.example.app"));
    }

    #[test]
    fn test_select_target_persists_starts_and_launches() {
        let mut f = fixture(RecordingElevation::unelevated());
        f.controller.activate().unwrap();
        f.controller.begin_selection().unwrap();
        assert_eq!(f.controller.state(), PolicyState::Selecting);

        f.controller.select_target("com.maps").unwrap();

        assert_eq!(f.controller.state(), PolicyState::Locked);
        assert_eq!(f.controller.target().unwrap().as_deref(), Some("com.maps"));
        assert_eq!(f.enforcement.target().as_deref(), Some("com.maps"));
        assert_eq!(f.launcher.launches(), vec!["com.maps"]);
    }

    #[test]
    fn test_select_target_rejects_own_package() {
        let mut f = fixture(RecordingElevation::unelevated());
        let result = f.controller.select_target("com.example.kioskmodeapplication");

        assert!(matches!(result, Err(KioskError::InvalidInput { .. })));
        assert!(f.controller.target().unwrap().is_none());
        assert_eq!(f.enforcement.state(), LoopState::Stopped);
    }

    #[test]
    fn test_select_unlaunchable_target_still_enforces() {
        let launcher = RecordingLauncher::default();
        launcher.fail_for("com.gone");
        let mut f = fixture_with(RecordingElevation::unelevated(), launcher);

        f.controller.select_target("com.gone").unwrap();

        assert_eq!(f.enforcement.state(), LoopState::Running);
        assert!(f.notifier.notices().contains(&Notice::CouldNotLaunch {
            package: "com.gone".into()
        }));

        // Reinstalled later: the next corrective tick succeeds
        f.launcher.recover("com.gone");
        f.stats.push(Scripted::Foreground("com.browser"));
        assert_eq!(f.enforcement.run_tick(), TickOutcome::Corrected);
    }

    #[test]
    fn test_cancel_selection_restores_state() {
        let mut f = fixture(RecordingElevation::unelevated());
        persist(&f.db, "com.maps");
        f.controller.activate().unwrap();

        f.controller.begin_selection().unwrap();
        f.controller.cancel_selection();
        assert_eq!(f.controller.state(), PolicyState::Locked);
    }

    #[test]
    fn test_exit_with_correct_pin_unlocks_and_keeps_selection() {
        let mut f = fixture(RecordingElevation::elevated());
        persist(&f.db, "com.maps");
        f.controller.activate().unwrap();
        f.controller.begin_exit().unwrap();
        assert_eq!(f.controller.state(), PolicyState::ExitPending);

        let outcome = f.controller.request_exit("1234");

        assert_eq!(outcome, ExitOutcome::Unlocked);
        assert_eq!(f.controller.state(), PolicyState::Unlocked);
        assert_eq!(f.enforcement.state(), LoopState::Stopped);
        assert_eq!(f.controller.target().unwrap().as_deref(), Some("com.maps"));
        assert_eq!(f.notifier.notices().last(), Some(&Notice::ExitingKiosk));
        assert_eq!(f.enforcement.status().stops, 1);
        assert!(!f.controller.is_protected());
    }

    #[test]
    fn test_exit_elevated_reverses_all_four() {
        let mut f = fixture(RecordingElevation::elevated());
        f.controller.activate().unwrap();
        f.controller.request_exit("1234");

        let calls = f.elevation.calls();
        let teardown: Vec<&str> = calls.iter().skip(4).map(String::as_str).collect();
        assert_eq!(
            teardown,
            vec![
                "set_allowed_tasks:",
                "clear_home_handler:com.example.kioskmodeapplication",
                "set_keyguard_disabled:false",
                "exit_protected_task",
            ]
        );
    }

    #[test]
    fn test_exit_unelevated_only_unpins() {
        let mut f = fixture(RecordingElevation::unelevated());
        f.controller.activate().unwrap();
        f.controller.request_exit("1234");

        assert_eq!(f.elevation.calls(), vec!["enter_protected_task", "exit_protected_task"]);
    }

    #[test]
    fn test_exit_with_wrong_pin_stays_locked() {
        let mut f = fixture(RecordingElevation::elevated());
        persist(&f.db, "com.maps");
        f.controller.activate().unwrap();
        f.controller.begin_exit().unwrap();

        let outcome = f.controller.request_exit("0000");

        assert_eq!(outcome, ExitOutcome::Rejected);
        assert_eq!(f.controller.state(), PolicyState::Locked);
        assert_eq!(f.enforcement.state(), LoopState::Running);
        assert_eq!(f.controller.target().unwrap().as_deref(), Some("com.maps"));
        assert_eq!(f.elevation.count("exit_protected_task"), 0);
        assert_eq!(f.notifier.notices(), vec![Notice::IncorrectCredential]);
        assert_eq!(f.enforcement.status().stops, 0);
    }

    #[test]
    fn test_navigation_suppressed_only_while_guarded() {
        let mut f = fixture(RecordingElevation::unelevated());
        assert_eq!(f.controller.handle_input(InputSignal::Back), InputDisposition::Forward);

        f.controller.select_target("com.maps").unwrap();
        for key in [
            InputSignal::Back,
            InputSignal::Home,
            InputSignal::RecentApps,
            InputSignal::VolumeUp,
            InputSignal::VolumeDown,
        ] {
            assert_eq!(f.controller.handle_input(key), InputDisposition::Consumed);
        }
        assert_eq!(f.controller.handle_input(InputSignal::Other), InputDisposition::Forward);

        f.controller.begin_exit().unwrap();
        assert_eq!(f.controller.handle_input(InputSignal::Home), InputDisposition::Consumed);

        f.controller.request_exit("1234");
        assert_eq!(f.controller.handle_input(InputSignal::Home), InputDisposition::Forward);
    }

    #[test]
    fn test_repick_after_exit_reapplies_protections() {
        let mut f = fixture(RecordingElevation::elevated());
        f.controller.select_target("com.maps").unwrap();
        f.controller.activate().unwrap();
        f.controller.request_exit("1234");

        f.controller.begin_selection().unwrap();
        f.controller.select_target("com.browser").unwrap();

        assert_eq!(f.controller.state(), PolicyState::Locked);
        assert!(f.controller.is_protected());
        assert_eq!(f.elevation.count("enter_protected_task"), 3);
        assert_eq!(f.elevation.count("register_home_handler"), 3);
        assert_eq!(f.enforcement.target().as_deref(), Some("com.browser"));
    }

    #[test]
    fn test_select_before_activate_pins_first() {
        let mut f = fixture(RecordingElevation::unelevated());
        f.controller.select_target("com.maps").unwrap();

        assert!(f.controller.is_protected());
        assert_eq!(f.elevation.calls(), vec!["enter_protected_task"]);
        assert_eq!(f.notifier.notices(), vec![Notice::LimitedProtection]);
    }

    #[test]
    fn test_select_while_locked_does_not_repin() {
        let mut f = fixture(RecordingElevation::unelevated());
        f.controller.activate().unwrap();
        f.controller.select_target("com.maps").unwrap();
        f.controller.begin_selection().unwrap();
        f.controller.select_target("com.browser").unwrap();

        assert_eq!(f.elevation.count("enter_protected_task"), 1);
    }

    #[test]
    fn test_navigation_suppressed_while_picker_open_over_lock() {
        let mut f = fixture(RecordingElevation::unelevated());
        f.controller.select_target("com.maps").unwrap();
        f.controller.activate().unwrap();
        f.controller.begin_selection().unwrap();

        assert_eq!(f.controller.state(), PolicyState::Selecting);
        assert_eq!(f.controller.handle_input(InputSignal::Home), InputDisposition::Consumed);
        assert_eq!(f.controller.handle_input(InputSignal::Back), InputDisposition::Consumed);
    }

    #[test]
    fn test_navigation_forwarded_in_first_picker() {
        let mut f = fixture(RecordingElevation::unelevated());
        f.controller.activate().unwrap();
        f.controller.begin_selection().unwrap();

        assert_eq!(f.controller.handle_input(InputSignal::Back), InputDisposition::Forward);
    }

    #[test]
    fn test_focus_loss_reasserts_enforcement() {
        let mut f = fixture(RecordingElevation::unelevated());
        persist(&f.db, "com.maps");
        f.controller.activate().unwrap();
        f.enforcement.stop();

        f.controller.handle_focus_change(false).unwrap();
        assert_eq!(f.enforcement.state(), LoopState::Running);
        assert_eq!(f.enforcement.target().as_deref(), Some("com.maps"));
    }

    #[test]
    fn test_focus_loss_ignored_when_unlocked() {
        let mut f = fixture(RecordingElevation::unelevated());
        persist(&f.db, "com.maps");
        f.controller.activate().unwrap();
        f.controller.request_exit("1234");

        f.controller.handle_focus_change(false).unwrap();
        assert_eq!(f.enforcement.state(), LoopState::Stopped);
    }

    #[test]
    fn test_selectable_apps_exclude_self_and_sort() {
        let launcher = RecordingLauncher::with_apps(&[
            ("org.zoo", "Zoo"),
            ("com.example.kioskmodeapplication", "Kiosk"),
            ("com.maps", "Maps"),
            ("com.browser", "Browser"),
        ]);
        let f = fixture_with(RecordingElevation::unelevated(), launcher);

        let labels: Vec<String> = f
            .controller
            .selectable_apps()
            .unwrap()
            .into_iter()
            .map(|a| a.label)
            .collect();
        assert_eq!(labels, vec!["Browser", "Maps", "Zoo"]);
    }

    #[test]
    fn test_begin_exit_rejected_while_selecting() {
        let mut f = fixture(RecordingElevation::unelevated());
        f.controller.begin_selection().unwrap();
        assert!(matches!(
            f.controller.begin_exit(),
            Err(KioskError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut f = fixture(RecordingElevation::unelevated());
        f.controller.activate().unwrap();
        f.controller.select_target("com.maps").unwrap();

        let snapshot = f.controller.snapshot().unwrap();
        assert_eq!(snapshot.state, PolicyState::Locked);
        assert_eq!(snapshot.mode, Some(PolicyMode::Unelevated));
        assert_eq!(snapshot.target.as_deref(), Some("com.maps"));
        assert!(snapshot.enforcement.running);
    }
}
