use crate::constants::{
    DEFAULT_ADMIN_COMPONENT, DEFAULT_EXIT_PIN, DEFAULT_HOME_COMPONENT, DEFAULT_OWN_PACKAGE,
    DEFAULT_TICK_INTERVAL, DEFAULT_USAGE_WINDOW_SECS,
};
use crate::error::KioskError;
use crate::validation::{validate_exit_pin, validate_package_id};
use std::time::Duration;

/// Runtime configuration of the kiosk core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KioskConfig {
    /// Identifier this application runs under; never offered as target.
    pub own_package: String,
    pub admin_component: String,
    pub home_component: String,
    pub exit_pin: String,
    pub tick_interval: Duration,
    pub usage_window_secs: u64,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            own_package: DEFAULT_OWN_PACKAGE.to_string(),
            admin_component: DEFAULT_ADMIN_COMPONENT.to_string(),
            home_component: DEFAULT_HOME_COMPONENT.to_string(),
            exit_pin: DEFAULT_EXIT_PIN.to_string(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            usage_window_secs: DEFAULT_USAGE_WINDOW_SECS,
        }
    }
}

impl KioskConfig {
    pub fn validate(&self) -> Result<(), KioskError> {
        validate_package_id(&self.own_package)?;
        validate_exit_pin(&self.exit_pin)?;
        if self.tick_interval.is_zero() {
            return Err(KioskError::InvalidInput {
                field: "tick_interval",
                reason: "must be positive".into(),
            });
        }
        if self.usage_window_secs == 0 {
            return Err(KioskError::InvalidInput {
                field: "usage_window_secs",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}
