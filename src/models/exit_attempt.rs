use crate::clock::now_millis;

/// One PIN-dialog round trip. Never persisted.
#[derive(Debug, Clone)]
pub struct ExitAttempt {
    pub entered_credential: String,
    pub timestamp: i64,
}

impl ExitAttempt {
    pub fn new(entered_credential: &str) -> Self {
        Self {
            entered_credential: entered_credential.to_string(),
            timestamp: now_millis(),
        }
    }

    /// Exact, case-sensitive comparison; no trimming.
    pub fn matches(&self, expected: &str) -> bool {
        self.entered_credential == expected
    }
}
