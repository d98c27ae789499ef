use crate::constants::{MAX_CREDENTIAL_LEN, MAX_PACKAGE_ID_LEN};
use crate::error::KioskError;

/// Validate a package identifier chosen as lock target.
/// Returns the trimmed identifier if valid.
pub fn validate_package_id(package: &str) -> Result<&str, KioskError> {
    let err = |reason: String| KioskError::InvalidInput {
        field: "package",
        reason,
    };

    let package = package.trim();
    if package.is_empty() {
        return Err(err("cannot be empty".into()));
    }
    if package.len() > MAX_PACKAGE_ID_LEN {
        return Err(err(format!("cannot exceed {MAX_PACKAGE_ID_LEN} characters")));
    }
    if let Some(bad) = package
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(err(format!("invalid character '{bad}'")));
    }
    if package.starts_with('.') || package.ends_with('.') || package.contains("..") {
        return Err(err("segments cannot be empty".into()));
    }

    Ok(package)
}

/// Validate the configured exit PIN.
pub fn validate_exit_pin(pin: &str) -> Result<(), KioskError> {
    if pin.is_empty() {
        return Err(KioskError::InvalidInput {
            field: "exit_pin",
            reason: "cannot be empty".into(),
        });
    }
    if pin.len() > MAX_CREDENTIAL_LEN {
        return Err(KioskError::InvalidInput {
            field: "exit_pin",
            reason: format!("cannot exceed {MAX_CREDENTIAL_LEN} characters"),
        });
    }
    Ok(())
}
