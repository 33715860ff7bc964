use log::{debug, warn};

use crate::timer::StudyTimer;

/// Best-effort "prevent idle/sleep" resource, an external collaborator.
/// Acquisition may fail and the platform may revoke the hold at any time;
/// the controller reacts to both, the resource itself stays dumb.
pub trait IdleInhibitor {
    fn acquire(&mut self) -> bool;
    fn release(&mut self);
}

/// Terminal sessions have no portable sleep inhibitor; the default
/// implementation simply always holds.
#[derive(Debug, Default)]
pub struct NoopInhibitor;

impl IdleInhibitor for NoopInhibitor {
    fn acquire(&mut self) -> bool {
        true
    }

    fn release(&mut self) {}
}

const RETRY_BASE_MS: i64 = 1_000;
const RETRY_CAP_MS: i64 = 60_000;

/// Capped exponential backoff: 1s, 2s, 4s, ... capped at 60s.
#[derive(Debug, Default)]
pub struct RetryBackoff {
    attempt: u32,
}

impl RetryBackoff {
    pub fn next_delay_ms(&mut self) -> i64 {
        let delay = RETRY_BASE_MS
            .saturating_mul(1_i64 << self.attempt.min(16))
            .min(RETRY_CAP_MS);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Keeps elapsed time correct across suspension without a loop running while
/// suspended, and keeps the idle inhibitor held while running.
///
/// Deferred retries carry the epoch of the session they were scheduled for;
/// a retry that comes due after the session ended (reset, completion, pause)
/// is dropped instead of touching the newer session.
pub struct ContinuityController {
    inhibitor: Box<dyn IdleInhibitor>,
    held: bool,
    backoff: RetryBackoff,
    retry: Option<(u64, i64)>, // (epoch, due_ms)
    epoch: u64,
    was_running: bool,
}

impl ContinuityController {
    pub fn new(inhibitor: Box<dyn IdleInhibitor>) -> Self {
        Self {
            inhibitor,
            held: false,
            backoff: RetryBackoff::default(),
            retry: None,
            epoch: 0,
            was_running: false,
        }
    }

    pub fn holds_inhibitor(&self) -> bool {
        self.held
    }

    /// Track the running flag across a state-machine operation: acquire on
    /// the way into `Running`, release and invalidate pending retries on the
    /// way out.
    pub fn sync(&mut self, running: bool, now_ms: i64) {
        if running && !self.was_running {
            self.begin_hold(now_ms);
        } else if !running && self.was_running {
            self.end_hold();
        }
        self.was_running = running;
    }

    fn begin_hold(&mut self, now_ms: i64) {
        self.epoch += 1;
        self.backoff.reset();
        self.retry = None;
        if self.inhibitor.acquire() {
            self.held = true;
            debug!("idle inhibitor acquired");
        } else {
            self.held = false;
            self.schedule_retry(now_ms);
        }
    }

    fn end_hold(&mut self) {
        self.epoch += 1;
        self.retry = None;
        self.backoff.reset();
        if self.held {
            self.inhibitor.release();
            self.held = false;
            debug!("idle inhibitor released");
        }
    }

    /// The platform revoked the hold while we still wanted it.
    pub fn on_released_unexpectedly(&mut self, now_ms: i64) {
        if !self.was_running {
            return;
        }
        self.held = false;
        // Immediate retry, then back off if that fails too.
        if self.inhibitor.acquire() {
            self.held = true;
            self.backoff.reset();
        } else {
            warn!("idle inhibitor revoked and immediate reacquire failed");
            self.schedule_retry(now_ms);
        }
    }

    fn schedule_retry(&mut self, now_ms: i64) {
        let delay = self.backoff.next_delay_ms();
        self.retry = Some((self.epoch, now_ms + delay));
        debug!("idle inhibitor retry in {delay}ms");
    }

    /// Drive pending reacquisition attempts; called from the display tick.
    pub fn poll(&mut self, now_ms: i64) {
        let Some((epoch, due_ms)) = self.retry else {
            return;
        };
        if epoch != self.epoch {
            // Scheduled for a session that no longer exists.
            self.retry = None;
            return;
        }
        if now_ms < due_ms {
            return;
        }
        self.retry = None;
        if self.inhibitor.acquire() {
            self.held = true;
            self.backoff.reset();
            debug!("idle inhibitor reacquired");
        } else {
            self.schedule_retry(now_ms);
        }
    }

    /// Suspension signal went hidden: persist immediately so an abrupt
    /// termination while suspended loses nothing.
    pub fn on_hidden(&mut self, timer: &mut StudyTimer, now_ms: i64) {
        if timer.state.is_running() {
            debug!("hidden while running: saving snapshot");
            timer.save_snapshot(now_ms);
        }
    }

    /// Back in the foreground: recompute right now rather than waiting for
    /// the next tick, and make sure the inhibitor is held again. Returns
    /// true when the caller should redraw.
    pub fn on_visible(&mut self, timer: &mut StudyTimer, now_ms: i64) -> bool {
        if !timer.state.is_running() {
            return false;
        }
        timer.refresh(now_ms);
        if !self.held {
            self.retry = None;
            self.backoff.reset();
            if self.inhibitor.acquire() {
                self.held = true;
            } else {
                self.schedule_retry(now_ms);
            }
        }
        true
    }
}
