//! Process-lifetime supervisor and the length-prefixed JSON control channel.
//!
//! Frames are a little-endian `u32` byte length followed by a UTF-8 JSON
//! document, the same framing browser native messaging uses.

use crate::config::KioskConfig;
use crate::constants::MAX_MESSAGE_SIZE;
use crate::db::{safe_lock, Database};
use crate::enforcement::{Cadence, EnforcementLoop};
use crate::error::KioskError;
use crate::events::{BootSignal, InputDisposition, InputSignal, KioskEvent};
use crate::observer::ForegroundObserver;
use crate::platform::{
    AppLauncher, LaunchableApp, Notice, Notifier, TaskElevation, UsageStats,
};
use crate::policy::{ExitOutcome, PolicyBackends, PolicyController, PolicySnapshot};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

/// OS collaborators handed to the supervisor at construction.
#[derive(Clone)]
pub struct Collaborators {
    pub usage_stats: Arc<dyn UsageStats>,
    pub launcher: Arc<dyn AppLauncher>,
    pub elevation: Arc<dyn TaskElevation>,
    pub notifier: Arc<dyn Notifier>,
}

/// Owns the single enforcement loop for the whole process and routes
/// lifecycle events to the policy controller.
pub struct Supervisor {
    policy: PolicyController,
    enforcement: Arc<EnforcementLoop>,
}

impl Supervisor {
    pub fn new(
        config: KioskConfig,
        db: Arc<Mutex<Database>>,
        collaborators: Collaborators,
        cadence: Cadence,
    ) -> Self {
        let observer =
            ForegroundObserver::with_window(collaborators.usage_stats, config.usage_window_secs);
        let enforcement = Arc::new(EnforcementLoop::new(
            observer,
            Arc::clone(&collaborators.launcher),
            cadence,
        ));
        let policy = PolicyController::new(
            config,
            db,
            PolicyBackends {
                elevation: collaborators.elevation,
                launcher: collaborators.launcher,
                notifier: collaborators.notifier,
            },
            Arc::clone(&enforcement),
        );
        Self {
            policy,
            enforcement,
        }
    }

    pub fn policy(&self) -> &PolicyController {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut PolicyController {
        &mut self.policy
    }

    pub fn enforcement(&self) -> &EnforcementLoop {
        &self.enforcement
    }

    /// Route one event. Input events report whether the key was swallowed;
    /// everything else forwards.
    pub fn dispatch(&mut self, event: KioskEvent) -> Result<InputDisposition, KioskError> {
        match event {
            KioskEvent::Boot(signal) => {
                info!("Boot signal {signal:?}, resuming kiosk");
                self.policy.activate()?;
                Ok(InputDisposition::Forward)
            }
            KioskEvent::FocusChanged { has_focus } => {
                self.policy.handle_focus_change(has_focus)?;
                Ok(InputDisposition::Forward)
            }
            KioskEvent::Input(signal) => Ok(self.policy.handle_input(signal)),
        }
    }

    pub fn shutdown(&self) {
        self.enforcement.stop();
    }
}

/// Notifier that buffers notices for the control channel.
#[derive(Default)]
pub struct QueuedNotifier {
    queue: Mutex<Vec<Notice>>,
}

impl QueuedNotifier {
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *safe_lock(&self.queue, "Notice queue"))
    }
}

impl Notifier for QueuedNotifier {
    fn notify(&self, notice: Notice) {
        info!("Notice: {notice:?}");
        safe_lock(&self.queue, "Notice queue").push(notice);
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    Boot { action: String },
    Activate,
    ListApps,
    BeginSelection,
    CancelSelection,
    SelectTarget { package: String },
    BeginExit,
    CancelExit,
    RequestExit { credential: String },
    Input { key: InputSignal },
    FocusChanged { has_focus: bool },
    RequestState,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingMessage {
    State { snapshot: PolicySnapshot },
    Apps { apps: Vec<LaunchableApp> },
    ExitResult { accepted: bool },
    InputResult { consumed: bool },
    Notice { notice: Notice },
    Error { message: String },
}

pub struct ControlHost<R, W> {
    reader: R,
    writer: W,
    supervisor: Supervisor,
    notices: Arc<QueuedNotifier>,
}

impl<R: Read, W: Write> ControlHost<R, W> {
    /// `notices` must be the notifier the supervisor was built with.
    pub fn new(reader: R, writer: W, supervisor: Supervisor, notices: Arc<QueuedNotifier>) -> Self {
        Self {
            reader,
            writer,
            supervisor,
            notices,
        }
    }

    /// Serve until the peer closes the channel.
    pub fn run(&mut self) -> Result<(), KioskError> {
        while let Some(frame) = self.read_frame()? {
            let reply = match serde_json::from_slice::<IncomingMessage>(&frame) {
                Ok(message) => self.handle_message(message),
                Err(e) => {
                    warn!("Malformed control message: {e}");
                    OutgoingMessage::Error {
                        message: format!("malformed message: {e}"),
                    }
                }
            };
            self.write_message(&reply)?;
            for notice in self.notices.drain() {
                self.write_message(&OutgoingMessage::Notice { notice })?;
            }
        }
        debug!("Control channel closed");
        self.supervisor.shutdown();
        Ok(())
    }

    pub fn into_supervisor(self) -> Supervisor {
        self.supervisor
    }

    /// Next frame, or `None` when the channel closed between frames.
    fn read_frame(&mut self) -> Result<Option<Vec<u8>>, KioskError> {
        let mut len_bytes = [0u8; 4];
        let (first, rest) = len_bytes.split_at_mut(1);
        match self.reader.read_exact(first) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        match self.reader.read_exact(rest) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(KioskError::Protocol("truncated frame header".into()));
            }
            Err(e) => return Err(e.into()),
        }

        let len = usize::try_from(u32::from_le_bytes(len_bytes)).unwrap_or(usize::MAX);
        if len > MAX_MESSAGE_SIZE {
            return Err(KioskError::Protocol(format!(
                "Message too large: {len} bytes (max: {MAX_MESSAGE_SIZE} bytes)"
            )));
        }

        let mut buffer = vec![0u8; len];
        self.reader.read_exact(&mut buffer)?;
        Ok(Some(buffer))
    }

    fn write_message(&mut self, message: &OutgoingMessage) -> Result<(), KioskError> {
        let json = serde_json::to_vec(message)?;
        let len = u32::try_from(json.len())
            .map_err(|_| KioskError::Protocol("reply too large".into()))?;

        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&json)?;
        self.writer.flush()?;
        Ok(())
    }

    fn handle_message(&mut self, message: IncomingMessage) -> OutgoingMessage {
        match self.apply(message) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Control request failed: {e}");
                OutgoingMessage::Error {
                    message: e.into(),
                }
            }
        }
    }

    fn apply(&mut self, message: IncomingMessage) -> Result<OutgoingMessage, KioskError> {
        match message {
            IncomingMessage::Boot { action } => match BootSignal::from_action(&action) {
                Some(signal) => {
                    self.supervisor.dispatch(KioskEvent::Boot(signal))?;
                }
                None => debug!("Ignoring non-boot action '{action}'"),
            },
            IncomingMessage::Activate => {
                self.supervisor.policy_mut().activate()?;
            }
            IncomingMessage::ListApps => {
                let apps = self.supervisor.policy().selectable_apps()?;
                return Ok(OutgoingMessage::Apps { apps });
            }
            IncomingMessage::BeginSelection => self.supervisor.policy_mut().begin_selection()?,
            IncomingMessage::CancelSelection => self.supervisor.policy_mut().cancel_selection(),
            IncomingMessage::SelectTarget { package } => {
                self.supervisor.policy_mut().select_target(&package)?;
            }
            IncomingMessage::BeginExit => self.supervisor.policy_mut().begin_exit()?,
            IncomingMessage::CancelExit => self.supervisor.policy_mut().cancel_exit(),
            IncomingMessage::RequestExit { credential } => {
                let outcome = self.supervisor.policy_mut().request_exit(&credential);
                return Ok(OutgoingMessage::ExitResult {
                    accepted: outcome == ExitOutcome::Unlocked,
                });
            }
            IncomingMessage::Input { key } => {
                let disposition = self.supervisor.dispatch(KioskEvent::Input(key))?;
                return Ok(OutgoingMessage::InputResult {
                    consumed: disposition == InputDisposition::Consumed,
                });
            }
            IncomingMessage::FocusChanged { has_focus } => {
                self.supervisor
                    .dispatch(KioskEvent::FocusChanged { has_focus })?;
            }
            IncomingMessage::RequestState => {}
        }

        Ok(OutgoingMessage::State {
            snapshot: self.supervisor.policy().snapshot()?,
        })
    }
}
