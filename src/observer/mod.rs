use crate::clock::now_millis;
use crate::constants::DEFAULT_USAGE_WINDOW_SECS;
use crate::error::PlatformError;
use crate::platform::{UsageGranularity, UsageRecord, UsageStats};
use log::warn;
use std::sync::Arc;

/// Reports which app most recently owned the foreground.
pub struct ForegroundObserver {
    stats: Arc<dyn UsageStats>,
    window_secs: u64,
}

impl ForegroundObserver {
    pub fn new(stats: Arc<dyn UsageStats>) -> Self {
        Self::with_window(stats, DEFAULT_USAGE_WINDOW_SECS)
    }

    pub fn with_window(stats: Arc<dyn UsageStats>, window_secs: u64) -> Self {
        Self { stats, window_secs }
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Query usage records covering `[now - window_secs, now]` and return the
    /// most recently used app.
    pub fn query_foreground_app(&self, window_secs: u64) -> Result<Option<String>, PlatformError> {
        let end = now_millis();
        let window_ms = i64::try_from(window_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        let start = end.saturating_sub(window_ms);

        let records = self
            .stats
            .query_usage_stats(UsageGranularity::Daily, start, end)?;
        Ok(most_recent(&records).map(|r| r.package.clone()))
    }

    /// Like [`Self::query_foreground_app`], with query failures logged and
    /// reported as "no foreground app".
    pub fn current_foreground_app(&self, window_secs: u64) -> Option<String> {
        match self.query_foreground_app(window_secs) {
            Ok(app) => app,
            Err(e) => {
                warn!("Foreground query failed: {e}");
                None
            }
        }
    }
}

/// Record with the greatest `last_time_used`; the first one wins a tie.
/// Records that were never used (timestamp <= 0) are not candidates.
pub fn most_recent(records: &[UsageRecord]) -> Option<&UsageRecord> {
    records
        .iter()
        .filter(|r| r.last_time_used > 0)
        .fold(None, |best: Option<&UsageRecord>, r| match best {
            Some(b) if b.last_time_used >= r.last_time_used => Some(b),
            Some(_) | None => Some(r),
        })
}
