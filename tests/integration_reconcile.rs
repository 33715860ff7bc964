use tempfile::TempDir;

use stint::ledger::{day_key, week_key, TotalsLedger};
use stint::reconcile::load_and_reconcile;
use stint::session::Phase;
use stint::store::{Snapshot, TimerStore};
use stint::timer::StudyTimer;

const T0: i64 = 1_700_000_000_000;

fn disk_store(dir: &TempDir) -> TimerStore {
    TimerStore::open(dir.path().join("timer.db")).unwrap()
}

// Process dies while running, restarts 50 seconds later: the downtime is
// credited and the session is running again with the full gap accounted.
#[test]
fn restart_credits_background_time() {
    let dir = TempDir::new().unwrap();

    {
        let store = disk_store(&dir);
        store
            .save_snapshot(&Snapshot {
                target_seconds: 1500,
                accumulated_seconds: 100,
                is_running: true,
                session_complete: false,
                saved_at_ms: T0,
            })
            .unwrap();
    }

    let store = disk_store(&dir);
    let (state, _) = load_and_reconcile(Some(&store), T0 + 50_000, true);

    assert_eq!(state.phase, Phase::Running);
    assert_eq!(state.accumulated_seconds, 150);
    assert_eq!(state.elapsed_seconds(T0 + 50_000), 150);
}

// Same restart with auto-resume disabled: the downtime is still credited
// but the session waits paused for an explicit start.
#[test]
fn restart_without_auto_resume_lands_paused() {
    let dir = TempDir::new().unwrap();
    {
        let store = disk_store(&dir);
        store
            .save_snapshot(&Snapshot {
                target_seconds: 1500,
                accumulated_seconds: 100,
                is_running: true,
                session_complete: false,
                saved_at_ms: T0,
            })
            .unwrap();
    }

    let store = disk_store(&dir);
    let (state, _) = load_and_reconcile(Some(&store), T0 + 50_000, false);

    assert_eq!(state.phase, Phase::Paused);
    assert_eq!(state.accumulated_seconds, 150);
}

// A snapshot from a previous day never resumes; it is discarded and the
// stored slot cleared so it cannot come back on the next start either.
#[test]
fn stale_day_snapshot_is_discarded_and_cleared() {
    let dir = TempDir::new().unwrap();
    let two_days_ago = T0 - 2 * 86_400_000;

    {
        let store = disk_store(&dir);
        store
            .save_snapshot(&Snapshot {
                target_seconds: 1500,
                accumulated_seconds: 700,
                is_running: true,
                session_complete: false,
                saved_at_ms: two_days_ago,
            })
            .unwrap();
    }

    let store = disk_store(&dir);
    let (state, _) = load_and_reconcile(Some(&store), T0, true);
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.accumulated_seconds, 0);

    assert_eq!(store.load_snapshot().unwrap(), None);
}

// Daily totals reset across a day boundary while weekly totals survive
// within the same ISO week, and the rolled-over ledger is written back.
#[test]
fn day_rollover_zeroes_daily_totals() {
    let dir = TempDir::new().unwrap();

    {
        let store = disk_store(&dir);
        let yesterday = T0 - 86_400_000;
        store
            .save_totals(&TotalsLedger {
                daily_seconds: 1800,
                weekly_seconds: 5400,
                sessions_completed: 3,
                last_day_key: day_key(yesterday),
                last_week_key: week_key(T0),
            })
            .unwrap();
    }

    let store = disk_store(&dir);
    let (_, totals) = load_and_reconcile(Some(&store), T0, true);

    assert_eq!(totals.daily_seconds, 0);
    assert_eq!(totals.weekly_seconds, 5400);
    assert_eq!(totals.sessions_completed, 3);
    assert_eq!(totals.last_day_key, day_key(T0));

    let persisted = store.load_totals().unwrap().unwrap();
    assert_eq!(persisted, totals);
}

// A paused same-day session restores exactly where it left off.
#[test]
fn paused_snapshot_restores_progress() {
    let dir = TempDir::new().unwrap();
    {
        let store = disk_store(&dir);
        store
            .save_snapshot(&Snapshot {
                target_seconds: 2700,
                accumulated_seconds: 420,
                is_running: false,
                session_complete: false,
                saved_at_ms: T0,
            })
            .unwrap();
    }

    let store = disk_store(&dir);
    let (state, _) = load_and_reconcile(Some(&store), T0 + 600_000, true);

    assert_eq!(state.phase, Phase::Paused);
    assert_eq!(state.target_seconds, 2700);
    // Paused time never counts, even across a restart.
    assert_eq!(state.accumulated_seconds, 420);
}

// End to end through the timer: run, checkpoint, drop the process, reopen
// and carry on to completion with nothing lost.
#[test]
fn full_cycle_across_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = disk_store(&dir);
        let mut timer = StudyTimer::new(
            Some(store),
            Default::default(),
            TotalsLedger::new(T0),
            30,
            T0,
        );
        timer.select_duration(15, T0);
        timer.start(T0);
        timer.save_snapshot(T0 + 200_000);
        // Timer dropped here without any further save.
    }

    let t1 = T0 + 260_000;
    let store = disk_store(&dir);
    let (state, totals) = load_and_reconcile(Some(&store), t1, true);
    assert_eq!(state.phase, Phase::Running);
    assert_eq!(state.accumulated_seconds, 260);

    let mut timer = StudyTimer::new(Some(store), state, totals, 30, t1);
    assert!(timer.refresh(t1 + 640_000));
    assert_eq!(timer.state.phase, Phase::Completed);
    assert_eq!(timer.totals.daily_seconds, 900);
    assert_eq!(timer.totals.sessions_completed, 1);

    // Completion was persisted; a fresh start sees it.
    let store = disk_store(&dir);
    let (state, totals) = load_and_reconcile(Some(&store), t1 + 700_000, true);
    assert_eq!(state.phase, Phase::Completed);
    assert_eq!(totals.daily_seconds, 900);
}

// Garbage bytes where the database should be: opening fails, and the
// host's fallback (run without a store) behaves exactly like no prior
// session ever existed.
#[test]
fn corrupt_database_file_fails_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("timer.db");
    std::fs::write(&path, b"definitely not a sqlite file").unwrap();

    assert!(TimerStore::open(&path).is_err());

    let (state, totals) = load_and_reconcile(None, T0, true);
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(totals.daily_seconds, 0);
    assert_eq!(totals.last_day_key, day_key(T0));
}

// A snapshot row with out-of-range values cannot be decoded; reconciliation
// treats it the same as no record at all.
#[test]
fn undecodable_snapshot_row_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("timer.db");
    drop(TimerStore::open(&path).unwrap());

    // Write a row the store's own API could never produce.
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "INSERT OR REPLACE INTO snapshot \
         (slot, target_seconds, accumulated_seconds, is_running, session_complete, saved_at_ms) \
         VALUES (0, 1500, -42, 1, 0, ?1)",
        [T0],
    )
    .unwrap();
    drop(conn);

    let store = TimerStore::open(&path).unwrap();
    assert!(store.load_snapshot().is_err());

    let (state, totals) = load_and_reconcile(Some(&store), T0 + 50_000, true);
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.accumulated_seconds, 0);
    assert_eq!(totals.daily_seconds, 0);
}

// No store at all still yields a usable fresh state.
#[test]
fn missing_store_starts_fresh() {
    let (state, totals) = load_and_reconcile(None, T0, true);
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(totals.daily_seconds, 0);
    assert_eq!(totals.last_day_key, day_key(T0));
}
