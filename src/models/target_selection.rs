use crate::constants::{KEY_SELECTED_APP, PREF_SCOPE};
use crate::models::Preference;
use rusqlite::{Connection, Result};

/// The app the device is locked into. Persisted under `KioskPrefs/selected_app`.
///
/// Never deleted: leaving kiosk mode keeps the selection so re-entry reuses it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetAppSelection {
    pub package: Option<String>,
}

impl TargetAppSelection {
    pub fn load(conn: &Connection) -> Result<Self> {
        let package = Preference::get(conn, PREF_SCOPE, KEY_SELECTED_APP)?.map(|p| p.value);
        Ok(Self { package })
    }

    pub fn save(conn: &Connection, package: &str) -> Result<Self> {
        Preference::put(conn, PREF_SCOPE, KEY_SELECTED_APP, package)?;
        Ok(Self {
            package: Some(package.to_string()),
        })
    }
}
