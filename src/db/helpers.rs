// src/db/helpers.rs

use crate::db::Database;
use crate::error::KioskError;
use log::{error, warn};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, recovering from poisoning if necessary.
pub fn safe_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("{context} mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Execute a database operation with lock handling and error logging.
///
/// # Example
/// ```ignore
/// with_connection(&db, "load target selection", |conn| {
///     TargetAppSelection::load(conn)
/// })
/// ```
pub fn with_connection<F, T>(db: &Mutex<Database>, operation: &str, f: F) -> Result<T, KioskError>
where
    F: FnOnce(&Connection) -> rusqlite::Result<T>,
{
    let db = safe_lock(db, "Database");

    f(db.connection()).map_err(|e| {
        error!("Failed to {operation}: {e}");
        KioskError::Database(e)
    })
}
