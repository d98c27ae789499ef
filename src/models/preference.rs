use crate::clock::now_millis;
use rusqlite::{params, Connection, OptionalExtension, Result};

/// A single `scope/key -> value` record of persisted configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preference {
    pub scope: String,
    pub key: String,
    pub value: String,
    pub updated_at: i64,
}

impl Preference {
    pub fn get(conn: &Connection, scope: &str, key: &str) -> Result<Option<Self>> {
        conn.query_row(
            "SELECT scope, key, value, updated_at FROM preferences WHERE scope = ?1 AND key = ?2",
            params![scope, key],
            |row| {
                Ok(Self {
                    scope: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )
        .optional()
    }

    /// Insert or overwrite the value stored under `scope/key`.
    pub fn put(conn: &Connection, scope: &str, key: &str, value: &str) -> Result<Self> {
        let updated_at = now_millis();
        conn.execute(
            "INSERT INTO preferences (scope, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(scope, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![scope, key, value, updated_at],
        )?;
        Ok(Self {
            scope: scope.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            updated_at,
        })
    }
}
