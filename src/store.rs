use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::ledger::TotalsLedger;
use crate::session::{Phase, SessionState};

/// Durable single-slot copy of the session, the record read back at startup.
/// Field set matches the external persisted-record interface: target,
/// accumulated, running flag, completion flag, save timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub target_seconds: u64,
    pub accumulated_seconds: u64,
    pub is_running: bool,
    pub session_complete: bool,
    pub saved_at_ms: i64,
}

impl Snapshot {
    /// Serialize the session as of `now_ms`. The open running segment is
    /// banked into `accumulated_seconds` so restore only needs `saved_at_ms`.
    pub fn capture(state: &SessionState, now_ms: i64) -> Self {
        Self {
            target_seconds: state.target_seconds,
            accumulated_seconds: state.elapsed_seconds(now_ms),
            is_running: state.phase == Phase::Running,
            session_complete: state.phase == Phase::Completed,
            saved_at_ms: now_ms,
        }
    }
}

/// Database manager for the snapshot slot and the totals counters.
#[derive(Debug)]
pub struct TimerStore {
    conn: Connection,
}

impl TimerStore {
    /// Open (and create if needed) the database at the default state path.
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("stint_timer.db"));
        Self::open(db_path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(TimerStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(TimerStore { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        // Both tables are single-row slots (slot = 0); every save replaces
        // the whole row, so readers never see a partial record.
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                target_seconds INTEGER NOT NULL,
                accumulated_seconds INTEGER NOT NULL,
                is_running INTEGER NOT NULL,
                session_complete INTEGER NOT NULL,
                saved_at_ms INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS totals (
                slot INTEGER PRIMARY KEY CHECK (slot = 0),
                daily_seconds INTEGER NOT NULL,
                weekly_seconds INTEGER NOT NULL,
                sessions_completed INTEGER NOT NULL,
                last_day_key TEXT NOT NULL,
                last_week_key TEXT NOT NULL
            )
            "#,
            [],
        )?;

        Ok(())
    }

    pub fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO snapshot
            (slot, target_seconds, accumulated_seconds, is_running, session_complete, saved_at_ms)
            VALUES (0, ?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                snapshot.target_seconds,
                snapshot.accumulated_seconds,
                snapshot.is_running,
                snapshot.session_complete,
                snapshot.saved_at_ms,
            ],
        )?;
        Ok(())
    }

    pub fn load_snapshot(&self) -> Result<Option<Snapshot>> {
        self.conn
            .query_row(
                r#"
                SELECT target_seconds, accumulated_seconds, is_running, session_complete, saved_at_ms
                FROM snapshot WHERE slot = 0
                "#,
                [],
                |row| {
                    Ok(Snapshot {
                        target_seconds: row.get(0)?,
                        accumulated_seconds: row.get(1)?,
                        is_running: row.get(2)?,
                        session_complete: row.get(3)?,
                        saved_at_ms: row.get(4)?,
                    })
                },
            )
            .optional()
    }

    pub fn clear_snapshot(&self) -> Result<()> {
        self.conn.execute("DELETE FROM snapshot WHERE slot = 0", [])?;
        Ok(())
    }

    /// Persist all counters as one atomic group.
    pub fn save_totals(&self, totals: &TotalsLedger) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO totals
            (slot, daily_seconds, weekly_seconds, sessions_completed, last_day_key, last_week_key)
            VALUES (0, ?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                totals.daily_seconds,
                totals.weekly_seconds,
                totals.sessions_completed,
                totals.last_day_key,
                totals.last_week_key,
            ],
        )?;
        Ok(())
    }

    pub fn load_totals(&self) -> Result<Option<TotalsLedger>> {
        self.conn
            .query_row(
                r#"
                SELECT daily_seconds, weekly_seconds, sessions_completed, last_day_key, last_week_key
                FROM totals WHERE slot = 0
                "#,
                [],
                |row| {
                    Ok(TotalsLedger {
                        daily_seconds: row.get(0)?,
                        weekly_seconds: row.get(1)?,
                        sessions_completed: row.get(2)?,
                        last_day_key: row.get(3)?,
                        last_week_key: row.get(4)?,
                    })
                },
            )
            .optional()
    }
}
