use thiserror::Error;

/// Failure reported by an OS collaborator.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("{operation} is not supported on this platform")]
    Unsupported { operation: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to bring an app to the foreground.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("'{package}' is not launchable")]
    NotLaunchable { package: String },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Application error type
#[derive(Debug, Error)]
pub enum KioskError {
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("No target app selected")]
    NoTarget,

    #[error("Cannot {action} while {state}")]
    InvalidTransition { state: String, action: &'static str },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Launch failed: {0}")]
    Launch(#[from] LaunchError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<serde_json::Error> for KioskError {
    fn from(e: serde_json::Error) -> Self {
        KioskError::Protocol(e.to_string())
    }
}

// Control-channel replies carry errors as plain messages
impl From<KioskError> for String {
    fn from(e: KioskError) -> Self {
        e.to_string()
    }
}
