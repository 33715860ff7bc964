use chrono::Local;
use log::{debug, warn};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::ledger::TotalsLedger;
use crate::session::{Phase, SessionState};
use crate::store::{Snapshot, TimerStore};

pub const DEFAULT_SAVE_INTERVAL_SECS: u64 = 30;

/// The session state machine: owns the session, the totals ledger, and the
/// write-through persistence.
///
/// All mutation goes through the public operations; the display loop only
/// reads. Every operation takes `now_ms` so the machine itself never touches
/// a clock. Saves are best-effort: a failed write is logged and the
/// transition stands.
#[derive(Debug)]
pub struct StudyTimer {
    pub state: SessionState,
    pub totals: TotalsLedger,
    store: Option<TimerStore>,
    save_interval_ms: i64,
    last_save_ms: i64,
    completion_log: Option<PathBuf>,
}

impl StudyTimer {
    pub fn new(
        store: Option<TimerStore>,
        state: SessionState,
        totals: TotalsLedger,
        save_interval_secs: u64,
        now_ms: i64,
    ) -> Self {
        Self {
            state,
            totals,
            store,
            save_interval_ms: (save_interval_secs.max(1) * 1000) as i64,
            last_save_ms: now_ms,
            completion_log: None,
        }
    }

    /// Route the completion log to `path`. Without this no log is written,
    /// which keeps store-less timers (tests included) off the filesystem.
    pub fn set_completion_log(&mut self, path: PathBuf) {
        self.completion_log = Some(path);
    }

    /// Fresh in-memory timer, mainly for tests.
    pub fn fresh(now_ms: i64) -> Self {
        Self::new(
            None,
            SessionState::default(),
            TotalsLedger::new(now_ms),
            DEFAULT_SAVE_INTERVAL_SECS,
            now_ms,
        )
    }

    pub fn elapsed_seconds(&self, now_ms: i64) -> u64 {
        self.state.elapsed_seconds(now_ms)
    }

    pub fn remaining_seconds(&self, now_ms: i64) -> u64 {
        self.state.remaining_seconds(now_ms)
    }

    /// Arm a session with a target duration. An in-flight session is
    /// implicitly reset first, so switching presets mid-run starts over.
    pub fn select_duration(&mut self, minutes: u64, now_ms: i64) {
        self.reset(now_ms);
        if minutes == 0 {
            return;
        }
        self.state.target_seconds = minutes.saturating_mul(60);
        self.state.phase = Phase::Armed;
        debug!("armed {minutes}m session");
        self.save_snapshot(now_ms);
    }

    /// Open a running segment. Idempotent while already running; a no-op
    /// with no target armed. Starting from `Completed` begins a fresh
    /// accumulation against the same target.
    pub fn start(&mut self, now_ms: i64) {
        match self.state.phase {
            Phase::Running | Phase::Idle => {}
            Phase::Completed => {
                self.state.accumulated_seconds = 0;
                self.state.phase = Phase::Running;
                self.state.running_since_ms = Some(now_ms);
                debug!("restarted after completion");
                self.save_snapshot(now_ms);
            }
            Phase::Armed | Phase::Paused => {
                self.state.phase = Phase::Running;
                self.state.running_since_ms = Some(now_ms);
                debug!("running, {}s banked", self.state.accumulated_seconds);
                self.save_snapshot(now_ms);
            }
        }
    }

    /// Bank the open segment and stop the clock. A no-op when not running.
    /// If the target was already reached, this completes the session
    /// instead of pausing it.
    pub fn pause(&mut self, now_ms: i64) {
        if self.state.phase != Phase::Running {
            return;
        }
        if self.try_complete(now_ms) {
            return;
        }
        self.state.accumulated_seconds = self.state.elapsed_seconds(now_ms);
        self.state.running_since_ms = None;
        self.state.phase = Phase::Paused;
        debug!("paused at {}s", self.state.accumulated_seconds);
        self.save_snapshot(now_ms);
    }

    /// Pause if running, otherwise start. A no-op when nothing has ever
    /// been armed, so a timerless session can't be started by accident.
    pub fn toggle(&mut self, now_ms: i64) {
        if self.state.is_running() {
            self.pause(now_ms);
        } else if self.state.phase != Phase::Idle {
            self.start(now_ms);
        }
    }

    /// Drop the session entirely and clear the persisted slot.
    pub fn reset(&mut self, now_ms: i64) {
        self.state = SessionState::default();
        self.last_save_ms = now_ms;
        debug!("reset to idle");
        if let Some(store) = &self.store {
            if let Err(err) = store.clear_snapshot() {
                warn!("failed to clear snapshot: {err}");
            }
        }
    }

    /// Recompute elapsed time and fire the completion transition if the
    /// target has been reached. Returns true exactly once per arming: the
    /// transition out of `Running` is the edge, so later calls with `now`
    /// even further past the target cannot re-credit the ledger.
    ///
    /// Also reconciles the totals ledger against the calendar, so a process
    /// left running across midnight shows fresh daily/weekly counters on the
    /// next tick rather than at the next completion or restart.
    pub fn refresh(&mut self, now_ms: i64) -> bool {
        if self.totals.rollover(now_ms) {
            debug!(
                "calendar rollover: day={} week={}",
                self.totals.last_day_key, self.totals.last_week_key
            );
            if let Some(store) = &self.store {
                if let Err(err) = store.save_totals(&self.totals) {
                    warn!("failed to persist rolled-over totals: {err}");
                }
            }
        }
        self.try_complete(now_ms)
    }

    fn try_complete(&mut self, now_ms: i64) -> bool {
        if self.state.phase != Phase::Running || self.state.target_seconds == 0 {
            return false;
        }
        let elapsed = self.state.elapsed_seconds(now_ms);
        if elapsed < self.state.target_seconds {
            return false;
        }

        self.state.accumulated_seconds = elapsed;
        self.state.running_since_ms = None;
        self.state.phase = Phase::Completed;
        self.totals.add_completed_session(elapsed, now_ms);
        debug!(
            "session complete: {elapsed}s, daily={}s weekly={}s",
            self.totals.daily_seconds, self.totals.weekly_seconds
        );

        if let Some(store) = &self.store {
            if let Err(err) = store.save_totals(&self.totals) {
                warn!("failed to persist totals: {err}");
            }
        }
        self.save_snapshot(now_ms);
        if let Err(err) = self.log_completion(elapsed) {
            warn!("failed to append completion log: {err}");
        }
        true
    }

    /// Periodic write-through while running; called from the display tick
    /// but deliberately on its own cadence.
    pub fn maybe_periodic_save(&mut self, now_ms: i64) {
        if self.state.is_running() && now_ms - self.last_save_ms >= self.save_interval_ms {
            self.save_snapshot(now_ms);
        }
    }

    /// Persist the current session into the single snapshot slot.
    pub fn save_snapshot(&mut self, now_ms: i64) {
        self.last_save_ms = now_ms;
        if let Some(store) = &self.store {
            let snapshot = Snapshot::capture(&self.state, now_ms);
            if let Err(err) = store.save_snapshot(&snapshot) {
                warn!("failed to save snapshot: {err}");
            }
        }
    }

    fn log_completion(&self, elapsed_secs: u64) -> io::Result<()> {
        let Some(log_path) = &self.completion_log else {
            return Ok(());
        };

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let needs_header = !log_path.exists();

        let mut log_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(log_path)?;

        if needs_header {
            writeln!(log_file, "date,target_secs,elapsed_secs,daily_total_secs")?;
        }

        writeln!(
            log_file,
            "{},{},{},{}",
            Local::now().format("%c"),
            self.state.target_seconds,
            elapsed_secs,
            self.totals.daily_seconds,
        )?;

        Ok(())
    }
}
