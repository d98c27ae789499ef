pub mod clock;
pub mod config;
pub mod constants;
pub mod db;
pub mod enforcement;
pub mod error;
pub mod events;
pub mod host;
pub mod models;
pub mod observer;
pub mod platform;
pub mod policy;
pub mod scheduler;
#[cfg(test)]
mod test_utils;
pub mod validation;

use crate::db::{migrations, Database};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Error type for kiosk initialization failures
#[derive(Debug)]
pub enum InitError {
    NoProjectDirs,
    DataDirCreation(std::io::Error),
    DatabaseOpen(rusqlite::Error),
    Migration(rusqlite::Error),
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitError::NoProjectDirs => write!(f, "Could not determine project directories"),
            InitError::DataDirCreation(e) => write!(f, "Could not create data directory: {e}"),
            InitError::DatabaseOpen(e) => write!(f, "Failed to open database: {e}"),
            InitError::Migration(e) => write!(f, "Failed to run database migrations: {e}"),
        }
    }
}

impl std::error::Error for InitError {}

/// Per-user database location, creating the data directory if needed.
pub fn default_db_path() -> Result<PathBuf, InitError> {
    let proj_dirs = ProjectDirs::from("com", "kiosk", "Kiosk").ok_or(InitError::NoProjectDirs)?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir).map_err(InitError::DataDirCreation)?;
    Ok(data_dir.join("kiosk.db"))
}

/// Open the database at `path` and bring its schema up to date.
pub fn open_database(path: &Path) -> Result<Database, InitError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(InitError::DataDirCreation)?;
    }
    let db = Database::open(path).map_err(InitError::DatabaseOpen)?;
    migrations::run(db.connection()).map_err(InitError::Migration)?;
    Ok(db)
}
