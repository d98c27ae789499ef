//! Typed lifecycle and input events delivered to the supervisor.

use crate::constants::{ACTION_BOOT_COMPLETED, ACTION_QUICKBOOT_POWERON};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootSignal {
    Completed,
    QuickBootPowerOn,
}

impl BootSignal {
    /// Map a broadcast action to a boot signal; other actions are not boot signals.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            ACTION_BOOT_COMPLETED => Some(BootSignal::Completed),
            ACTION_QUICKBOOT_POWERON => Some(BootSignal::QuickBootPowerOn),
            _ => None,
        }
    }
}

/// Hardware and navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSignal {
    Back,
    Home,
    RecentApps,
    VolumeUp,
    VolumeDown,
    Other,
}

impl InputSignal {
    /// Keys that would navigate away from, or around, the locked app.
    pub fn is_navigation(self) -> bool {
        match self {
            InputSignal::Back
            | InputSignal::Home
            | InputSignal::RecentApps
            | InputSignal::VolumeUp
            | InputSignal::VolumeDown => true,
            InputSignal::Other => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputDisposition {
    /// Swallowed; no default handler sees it.
    Consumed,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskEvent {
    Boot(BootSignal),
    FocusChanged { has_focus: bool },
    Input(InputSignal),
}
