/// Discrete state of the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, Default)]
pub enum Phase {
    /// No target selected.
    #[default]
    Idle,
    /// A target duration is selected but the clock is not running.
    Armed,
    Running,
    Paused,
    Completed,
}

/// The single session owned by the state machine.
///
/// `running_since_ms` is `Some` iff `phase == Running`; elapsed and remaining
/// time are derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub phase: Phase,
    pub target_seconds: u64,
    /// Time banked from earlier run segments of this session, excluding the
    /// currently-open one.
    pub accumulated_seconds: u64,
    pub running_since_ms: Option<i64>,
}

impl SessionState {
    /// Elapsed wall-clock seconds of the session at `now_ms`.
    ///
    /// Pure and safe to call at arbitrary intervals; it is not driven by any
    /// tick cadence. If the wall clock moved behind `running_since_ms` the
    /// result clamps to the banked time instead of going negative.
    pub fn elapsed_seconds(&self, now_ms: i64) -> u64 {
        match (self.phase, self.running_since_ms) {
            (Phase::Running, Some(since)) if now_ms >= since => {
                self.accumulated_seconds + ((now_ms - since) / 1000) as u64
            }
            _ => self.accumulated_seconds,
        }
    }

    /// Seconds left until the target, floored at zero.
    pub fn remaining_seconds(&self, now_ms: i64) -> u64 {
        self.target_seconds
            .saturating_sub(self.elapsed_seconds(now_ms))
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }
}
