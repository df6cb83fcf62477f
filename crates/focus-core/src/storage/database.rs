//! SQLite-based storage.
//!
//! Provides persistent storage for:
//! - Completed segments and statistics (daily and all-time)
//! - Key-value store for the session snapshot
//! - Pending alerts installed by the notification planner

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{data_dir, KeyValueStore};
use crate::error::{DatabaseError, Result};
use crate::notify::PlannedAlert;
use crate::timer::Segment;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub segment: String,
    pub duration_min: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_segments: u64,
    pub completed_pomodoros: u64,
    pub total_focus_min: u64,
    pub total_break_min: u64,
}

/// An alert row as stored by [`Database::replace_alerts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAlert {
    pub id: i64,
    pub series_id: String,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

/// SQLite database for the session snapshot, history and pending alerts.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/focus/focus.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("focus.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                segment      TEXT NOT NULL,
                duration_min INTEGER NOT NULL,
                started_at   TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pending_alerts (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                series_id TEXT NOT NULL,
                fire_at   TEXT NOT NULL,
                title     TEXT NOT NULL,
                body      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);
            CREATE INDEX IF NOT EXISTS idx_pending_alerts_fire_at ON pending_alerts(fire_at);",
        )?;
        Ok(())
    }

    // ── History ──────────────────────────────────────────────────────

    /// Record a completed segment.
    pub fn record_segment(
        &self,
        segment: Segment,
        duration_min: u64,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sessions (segment, duration_min, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                segment.as_str(),
                duration_min,
                fmt_ts(started_at),
                fmt_ts(completed_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn recent_segments(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, segment, duration_min, started_at, completed_at
             FROM sessions ORDER BY completed_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, segment, duration_min, started, completed) = row?;
            records.push(SessionRecord {
                id,
                segment,
                duration_min,
                started_at: parse_ts(&started)?,
                completed_at: parse_ts(&completed)?,
            });
        }
        Ok(records)
    }

    /// Statistics for segments completed at or after `since` (all time when
    /// `None`).
    pub fn stats_since(&self, since: Option<DateTime<Utc>>) -> Result<Stats> {
        let since = since
            .map(fmt_ts)
            .unwrap_or_else(|| String::from("0000"));
        let mut stmt = self.conn.prepare(
            "SELECT segment, COUNT(*), COALESCE(SUM(duration_min), 0)
             FROM sessions
             WHERE completed_at >= ?1
             GROUP BY segment",
        )?;

        let mut stats = Stats::default();
        let rows = stmt.query_map(params![since], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        for row in rows {
            let (segment, count, minutes) = row?;
            stats.total_segments += count;
            match segment.as_str() {
                "work" => {
                    stats.completed_pomodoros += count;
                    stats.total_focus_min += minutes;
                }
                _ => stats.total_break_min += minutes,
            }
        }
        Ok(stats)
    }

    pub fn stats_today(&self) -> Result<Stats> {
        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc());
        self.stats_since(midnight)
    }

    pub fn stats_all(&self) -> Result<Stats> {
        self.stats_since(None)
    }

    // ── Key-value store ──────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Set and remove several keys in one transaction.
    pub fn kv_write_batch(&self, entries: &[(&str, Option<&str>)]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for (key, value) in entries {
            match value {
                Some(v) => tx.execute(
                    "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                    params![key, v],
                )?,
                None => tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?,
            };
        }
        tx.commit()?;
        Ok(())
    }

    // ── Pending alerts ───────────────────────────────────────────────

    /// Clear-then-add the pending alert set in one transaction.
    pub fn replace_alerts(&self, series_id: Uuid, alerts: &[PlannedAlert]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM pending_alerts", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO pending_alerts (series_id, fire_at, title, body)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let series = series_id.to_string();
            for alert in alerts {
                stmt.execute(params![
                    series,
                    fmt_ts(alert.fire_at),
                    alert.title,
                    alert.body
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn clear_alerts(&self) -> Result<()> {
        self.conn.execute("DELETE FROM pending_alerts", [])?;
        Ok(())
    }

    pub fn pending_alerts(&self) -> Result<Vec<StoredAlert>> {
        self.query_alerts(
            "SELECT id, series_id, fire_at, title, body FROM pending_alerts ORDER BY fire_at, id",
            None,
        )
    }

    /// Alerts whose fire time is at or before `now`.
    pub fn due_alerts(&self, now: DateTime<Utc>) -> Result<Vec<StoredAlert>> {
        self.query_alerts(
            "SELECT id, series_id, fire_at, title, body FROM pending_alerts
             WHERE fire_at <= ?1 ORDER BY fire_at, id",
            Some(now),
        )
    }

    pub fn remove_alert(&self, id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM pending_alerts WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn query_alerts(&self, sql: &str, until: Option<DateTime<Utc>>) -> Result<Vec<StoredAlert>> {
        let mut stmt = self.conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        };
        let rows = match until {
            Some(t) => stmt
                .query_map(params![fmt_ts(t)], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        rows.into_iter()
            .map(|(id, series_id, fire_at, title, body)| {
                Ok(StoredAlert {
                    id,
                    series_id,
                    fire_at: parse_ts(&fire_at)?,
                    title,
                    body,
                })
            })
            .collect()
    }
}

impl KeyValueStore for Database {
    fn kv_get(&self, key: &str) -> Result<Option<String>> {
        Database::kv_get(self, key)
    }

    fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        Database::kv_set(self, key, value)
    }

    fn kv_remove(&self, key: &str) -> Result<()> {
        Database::kv_remove(self, key)
    }

    fn kv_write_batch(&self, entries: &[(&str, Option<&str>)]) -> Result<()> {
        Database::kv_write_batch(self, entries)
    }
}

/// Fixed-width UTC timestamps so SQL string comparison orders correctly.
fn fmt_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(format!("bad timestamp '{raw}': {e}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{plan_series, SeriesRequest};
    use crate::timer::SessionConfig;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 8, 12, 0, 0).unwrap()
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        db.record_segment(Segment::Work, 25, t0(), t0() + Duration::minutes(25))
            .unwrap();
        db.record_segment(Segment::ShortBreak, 5, t0(), t0() + Duration::minutes(30))
            .unwrap();
        let stats = db.stats_all().unwrap();
        assert_eq!(stats.completed_pomodoros, 1);
        assert_eq!(stats.total_focus_min, 25);
        assert_eq!(stats.total_break_min, 5);
        assert_eq!(stats.total_segments, 2);

        let recent = db.recent_segments(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].segment, "shortBreak");
    }

    #[test]
    fn stats_since_filters_old_segments() {
        let db = Database::open_memory().unwrap();
        db.record_segment(Segment::Work, 25, t0(), t0()).unwrap();
        let stats = db.stats_since(Some(t0() + Duration::hours(1))).unwrap();
        assert_eq!(stats, Stats::default());
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_remove("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn kv_write_batch_rolls_back_on_failure() {
        let db = Database::open_memory().unwrap();
        db.kv_set("a", "1").unwrap();
        db.kv_set("b", "1").unwrap();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER reject_c BEFORE INSERT ON kv WHEN NEW.key = 'c'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let err = db.kv_write_batch(&[("a", Some("2")), ("b", None), ("c", Some("2"))]);
        assert!(err.is_err());
        assert_eq!(db.kv_get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(db.kv_get("b").unwrap().as_deref(), Some("1"));

        db.kv_write_batch(&[("a", Some("3")), ("b", None)]).unwrap();
        assert_eq!(db.kv_get("a").unwrap().as_deref(), Some("3"));
        assert!(db.kv_get("b").unwrap().is_none());
    }

    #[test]
    fn replace_alerts_swaps_whole_set() {
        let db = Database::open_memory().unwrap();
        let mut request = SeriesRequest {
            anchor: t0(),
            remaining_ms: 1_500_000,
            cycles_completed: 0,
            segment: Segment::Work,
            config: SessionConfig::default(),
        };
        db.replace_alerts(Uuid::new_v4(), &plan_series(&request)).unwrap();
        assert_eq!(db.pending_alerts().unwrap().len(), 8);

        request.segment = Segment::LongBreak;
        request.cycles_completed = 4;
        let series = Uuid::new_v4();
        db.replace_alerts(series, &plan_series(&request)).unwrap();
        let pending = db.pending_alerts().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].series_id, series.to_string());
    }

    #[test]
    fn due_alerts_respects_fire_time() {
        let db = Database::open_memory().unwrap();
        let request = SeriesRequest {
            anchor: t0(),
            remaining_ms: 60_000,
            cycles_completed: 0,
            segment: Segment::Work,
            config: SessionConfig::default(),
        };
        db.replace_alerts(Uuid::new_v4(), &plan_series(&request)).unwrap();
        assert!(db.due_alerts(t0()).unwrap().is_empty());
        let due = db.due_alerts(t0() + Duration::seconds(60)).unwrap();
        assert_eq!(due.len(), 1);
        db.remove_alert(due[0].id).unwrap();
        assert_eq!(db.pending_alerts().unwrap().len(), 7);
        db.clear_alerts().unwrap();
        assert!(db.pending_alerts().unwrap().is_empty());
    }
}
