use log::{debug, warn};

use crate::ledger::{day_key, TotalsLedger};
use crate::session::{Phase, SessionState};
use crate::store::TimerStore;

/// Rebuild session state and totals from the store at process start.
///
/// This is the only place a persisted snapshot is allowed to flow back into
/// session state. Rules, in order:
///
/// 1. Totals roll over first: any counter whose stored period key differs
///    from today's is zeroed before anything reads or adds to it.
/// 2. A missing or unreadable snapshot means a fresh `Idle` session.
/// 3. A snapshot saved on a previous day is discarded entirely; a run from
///    yesterday is never resumed.
/// 4. A same-day snapshot with the running flag set gets the suspended wall
///    time credited (`floor((now - saved_at) / 1000)` seconds) and either
///    resumes `Running` with a fresh anchor (`resume_running = true`) or
///    lands in `Paused` awaiting an explicit restart. The policy switch is
///    honored here and nowhere else.
/// 5. Any other same-day snapshot restores to `Completed`, `Paused`, or
///    `Armed` according to its flags.
pub fn load_and_reconcile(
    store: Option<&TimerStore>,
    now_ms: i64,
    resume_running: bool,
) -> (SessionState, TotalsLedger) {
    let mut totals = match store.map(|s| s.load_totals()) {
        Some(Ok(Some(totals))) => totals,
        Some(Ok(None)) | None => TotalsLedger::new(now_ms),
        Some(Err(err)) => {
            warn!("failed to load totals, starting from zero: {err}");
            TotalsLedger::new(now_ms)
        }
    };

    if totals.rollover(now_ms) {
        debug!(
            "calendar rollover: day={} week={}",
            totals.last_day_key, totals.last_week_key
        );
        if let Some(store) = store {
            if let Err(err) = store.save_totals(&totals) {
                warn!("failed to persist rolled-over totals: {err}");
            }
        }
    }

    let snapshot = match store.map(|s| s.load_snapshot()) {
        Some(Ok(snapshot)) => snapshot,
        None => None,
        Some(Err(err)) => {
            warn!("unreadable session snapshot, treating as absent: {err}");
            None
        }
    };

    let Some(snapshot) = snapshot else {
        return (SessionState::default(), totals);
    };

    if day_key(snapshot.saved_at_ms) != day_key(now_ms) {
        debug!("discarding snapshot from a previous day");
        if let Some(store) = store {
            if let Err(err) = store.clear_snapshot() {
                warn!("failed to clear stale snapshot: {err}");
            }
        }
        return (SessionState::default(), totals);
    }

    let state = if snapshot.is_running {
        let suspended_secs = ((now_ms - snapshot.saved_at_ms).max(0) / 1000) as u64;
        let accumulated = snapshot.accumulated_seconds + suspended_secs;
        debug!(
            "same-day running snapshot: crediting {suspended_secs}s of suspended time, \
             policy={}",
            if resume_running { "resume" } else { "pause" }
        );
        if resume_running {
            SessionState {
                phase: Phase::Running,
                target_seconds: snapshot.target_seconds,
                accumulated_seconds: accumulated,
                running_since_ms: Some(now_ms),
            }
        } else {
            SessionState {
                phase: Phase::Paused,
                target_seconds: snapshot.target_seconds,
                accumulated_seconds: accumulated,
                running_since_ms: None,
            }
        }
    } else if snapshot.session_complete {
        SessionState {
            phase: Phase::Completed,
            target_seconds: snapshot.target_seconds,
            accumulated_seconds: snapshot.accumulated_seconds,
            running_since_ms: None,
        }
    } else if snapshot.target_seconds > 0 && snapshot.accumulated_seconds > 0 {
        SessionState {
            phase: Phase::Paused,
            target_seconds: snapshot.target_seconds,
            accumulated_seconds: snapshot.accumulated_seconds,
            running_since_ms: None,
        }
    } else if snapshot.target_seconds > 0 {
        SessionState {
            phase: Phase::Armed,
            target_seconds: snapshot.target_seconds,
            accumulated_seconds: 0,
            running_since_ms: None,
        }
    } else {
        SessionState::default()
    };

    (state, totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Snapshot;

    const NOW: i64 = 1_700_000_000_000;
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn store_with(snapshot: Option<Snapshot>, totals: Option<TotalsLedger>) -> TimerStore {
        let store = TimerStore::open_in_memory().unwrap();
        if let Some(s) = snapshot {
            store.save_snapshot(&s).unwrap();
        }
        if let Some(t) = totals {
            store.save_totals(&t).unwrap();
        }
        store
    }

    #[test]
    fn no_store_yields_fresh_state() {
        let (state, totals) = load_and_reconcile(None, NOW, true);
        assert_eq!(state, SessionState::default());
        assert_eq!(totals, TotalsLedger::new(NOW));
    }

    #[test]
    fn empty_store_yields_fresh_state() {
        let store = TimerStore::open_in_memory().unwrap();
        let (state, totals) = load_and_reconcile(Some(&store), NOW, true);
        assert_eq!(state, SessionState::default());
        assert_eq!(totals, TotalsLedger::new(NOW));
    }

    #[test]
    fn running_snapshot_credits_suspended_time_and_resumes() {
        let store = store_with(
            Some(Snapshot {
                target_seconds: 900,
                accumulated_seconds: 100,
                is_running: true,
                session_complete: false,
                saved_at_ms: NOW - 50_000,
            }),
            None,
        );

        let (state, _) = load_and_reconcile(Some(&store), NOW, true);
        assert_eq!(state.phase, Phase::Running);
        assert_eq!(state.accumulated_seconds, 150);
        assert_eq!(state.running_since_ms, Some(NOW));
        assert_eq!(state.target_seconds, 900);
    }

    #[test]
    fn running_snapshot_lands_paused_under_manual_restart_policy() {
        let store = store_with(
            Some(Snapshot {
                target_seconds: 900,
                accumulated_seconds: 100,
                is_running: true,
                session_complete: false,
                saved_at_ms: NOW - 50_000,
            }),
            None,
        );

        let (state, _) = load_and_reconcile(Some(&store), NOW, false);
        assert_eq!(state.phase, Phase::Paused);
        assert_eq!(state.accumulated_seconds, 150);
        assert_eq!(state.running_since_ms, None);
    }

    #[test]
    fn running_snapshot_with_future_saved_at_credits_nothing() {
        // Clock skew: the snapshot claims to be from the future.
        let store = store_with(
            Some(Snapshot {
                target_seconds: 900,
                accumulated_seconds: 100,
                is_running: true,
                session_complete: false,
                saved_at_ms: NOW + 5_000,
            }),
            None,
        );

        let (state, _) = load_and_reconcile(Some(&store), NOW, true);
        assert_eq!(state.accumulated_seconds, 100);
    }

    #[test]
    fn stale_day_snapshot_is_discarded_and_cleared() {
        let store = store_with(
            Some(Snapshot {
                target_seconds: 900,
                accumulated_seconds: 500,
                is_running: true,
                session_complete: false,
                saved_at_ms: NOW - 2 * DAY_MS,
            }),
            None,
        );

        let (state, _) = load_and_reconcile(Some(&store), NOW, true);
        assert_eq!(state, SessionState::default());
        assert_eq!(store.load_snapshot().unwrap(), None);
    }

    #[test]
    fn same_day_paused_snapshot_restores_progress() {
        let store = store_with(
            Some(Snapshot {
                target_seconds: 900,
                accumulated_seconds: 300,
                is_running: false,
                session_complete: false,
                saved_at_ms: NOW - 60_000,
            }),
            None,
        );

        let (state, _) = load_and_reconcile(Some(&store), NOW, true);
        assert_eq!(state.phase, Phase::Paused);
        assert_eq!(state.accumulated_seconds, 300);
    }

    #[test]
    fn same_day_armed_snapshot_restores_target_only() {
        let store = store_with(
            Some(Snapshot {
                target_seconds: 1800,
                accumulated_seconds: 0,
                is_running: false,
                session_complete: false,
                saved_at_ms: NOW - 1_000,
            }),
            None,
        );

        let (state, _) = load_and_reconcile(Some(&store), NOW, true);
        assert_eq!(state.phase, Phase::Armed);
        assert_eq!(state.target_seconds, 1800);
        assert_eq!(state.accumulated_seconds, 0);
    }

    #[test]
    fn same_day_completed_snapshot_restores_completed() {
        let store = store_with(
            Some(Snapshot {
                target_seconds: 900,
                accumulated_seconds: 900,
                is_running: false,
                session_complete: true,
                saved_at_ms: NOW - 1_000,
            }),
            None,
        );

        let (state, _) = load_and_reconcile(Some(&store), NOW, true);
        assert_eq!(state.phase, Phase::Completed);
        assert_eq!(state.accumulated_seconds, 900);
    }

    #[test]
    fn stale_day_totals_roll_over_before_use() {
        let totals = TotalsLedger {
            daily_seconds: 1800,
            weekly_seconds: 3600,
            sessions_completed: 3,
            last_day_key: "2024-01-01".to_string(),
            // week key stays current so only the day rolls over
            ..TotalsLedger::new(NOW)
        };
        let store = store_with(None, Some(totals));

        let (_, reconciled) = load_and_reconcile(Some(&store), NOW, true);
        assert_eq!(reconciled.daily_seconds, 0);
        assert_eq!(reconciled.last_day_key, day_key(NOW));
        assert_eq!(reconciled.weekly_seconds, 3600);
        assert_eq!(reconciled.sessions_completed, 3);

        // The rolled-over totals are persisted, so the reset is durable.
        assert_eq!(store.load_totals().unwrap(), Some(reconciled));
    }

    #[test]
    fn current_day_totals_pass_through_unchanged() {
        let mut totals = TotalsLedger::new(NOW);
        totals.daily_seconds = 600;
        totals.weekly_seconds = 1200;
        totals.sessions_completed = 1;
        let store = store_with(None, Some(totals.clone()));

        let (_, reconciled) = load_and_reconcile(Some(&store), NOW, true);
        assert_eq!(reconciled, totals);
    }
}
