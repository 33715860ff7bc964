use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" in epoch milliseconds.
///
/// The engine never reads the system clock directly; every operation takes a
/// `now_ms` argument so elapsed time stays a pure function of its inputs.
/// This trait only exists at the host boundary (main loop, continuity
/// controller) and in tests.
pub trait Clock {
    fn now_ms(&self) -> i64;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Scripted clock for tests; set or advance it explicitly.
#[derive(Debug, Default)]
pub struct ManualClock {
    ms: Cell<i64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            ms: Cell::new(start_ms),
        }
    }

    pub fn set(&self, ms: i64) {
        self.ms.set(ms);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.ms.set(self.ms.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.ms.get()
    }
}
