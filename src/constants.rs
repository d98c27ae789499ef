// src/constants.rs

use std::time::Duration;

/// Interval between enforcement ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);

/// Trailing window (seconds) for usage-stats queries. Usage records can lag
/// real focus changes by several seconds, so the window is generous.
pub const DEFAULT_USAGE_WINDOW_SECS: u64 = 1000;

/// Preference scope holding the kiosk configuration.
pub const PREF_SCOPE: &str = "KioskPrefs";

/// Preference key of the locked target app.
pub const KEY_SELECTED_APP: &str = "selected_app";

/// Exit PIN used when none is configured.
pub const DEFAULT_EXIT_PIN: &str = "1234";

/// Identifier this application runs under.
pub const DEFAULT_OWN_PACKAGE: &str = "com.example.kioskmodeapplication";

/// Admin receiver component used for device-owner calls.
pub const DEFAULT_ADMIN_COMPONENT: &str =
    "com.example.kioskmodeapplication/.MyDeviceAdminReceiver";

/// Activity registered as the home-screen handler in elevated mode.
pub const DEFAULT_HOME_COMPONENT: &str = "com.example.kioskmodeapplication/.MainActivity";

/// Maximum package identifier length
pub const MAX_PACKAGE_ID_LEN: usize = 255;

/// Maximum credential length
pub const MAX_CREDENTIAL_LEN: usize = 64;

/// Boot-completed broadcast action.
pub const ACTION_BOOT_COMPLETED: &str = "android.intent.action.BOOT_COMPLETED";

/// Vendor quick-boot action, treated as a boot signal too.
pub const ACTION_QUICKBOOT_POWERON: &str = "android.intent.action.QUICKBOOT_POWERON";

/// Largest control-channel message accepted (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
