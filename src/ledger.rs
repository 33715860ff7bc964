use chrono::{DateTime, Local};

/// Calendar day key for `now_ms` in local time, e.g. "2024-01-02".
pub fn day_key(now_ms: i64) -> String {
    local(now_ms).format("%Y-%m-%d").to_string()
}

/// ISO week key for `now_ms` in local time, e.g. "2024-W01".
pub fn week_key(now_ms: i64) -> String {
    local(now_ms).format("%G-W%V").to_string()
}

fn local(now_ms: i64) -> DateTime<Local> {
    DateTime::from_timestamp_millis(now_ms)
        .unwrap_or_default()
        .with_timezone(&Local)
}

/// Rolling daily/weekly counters for completed sessions.
///
/// Rollover is driven by key comparison on read, not by a timer: any mutation
/// first reconciles the stored keys against `now`, so a stale total is never
/// observed or added to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsLedger {
    pub daily_seconds: u64,
    pub weekly_seconds: u64,
    pub sessions_completed: u64,
    pub last_day_key: String,
    pub last_week_key: String,
}

impl TotalsLedger {
    pub fn new(now_ms: i64) -> Self {
        Self {
            daily_seconds: 0,
            weekly_seconds: 0,
            sessions_completed: 0,
            last_day_key: day_key(now_ms),
            last_week_key: week_key(now_ms),
        }
    }

    /// Reset counters whose stored period key no longer matches `now`.
    /// Idempotent; returns true if anything changed.
    pub fn rollover(&mut self, now_ms: i64) -> bool {
        let mut changed = false;

        let day = day_key(now_ms);
        if self.last_day_key != day {
            self.daily_seconds = 0;
            self.last_day_key = day;
            changed = true;
        }

        let week = week_key(now_ms);
        if self.last_week_key != week {
            self.weekly_seconds = 0;
            self.last_week_key = week;
            changed = true;
        }

        changed
    }

    /// Credit a completed session to both counters and bump the session
    /// count. Rollover always runs first.
    pub fn add_completed_session(&mut self, seconds: u64, now_ms: i64) {
        self.rollover(now_ms);
        self.daily_seconds += seconds;
        self.weekly_seconds += seconds;
        self.sessions_completed += 1;
    }
}
