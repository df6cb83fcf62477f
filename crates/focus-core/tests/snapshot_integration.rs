//! Integration tests for persisting the session across process restarts.
//!
//! Each "process" opens the same SQLite file, restores the snapshot, acts,
//! saves and drops everything.

use chrono::{DateTime, Duration, TimeZone, Utc};
use focus_core::storage::snapshot::{restore_state, KEY_PHASE, KEY_PHASE_END};
use focus_core::{
    Clock, Database, ManualClock, NullPlanner, PersistedSession, Phase, SessionClock, SessionConfig,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 15, 14, 0, 0).unwrap()
}

fn restore(db: &Database, time: &ManualClock) -> SessionClock<ManualClock, NullPlanner> {
    let state = restore_state(db, SessionConfig::default());
    SessionClock::from_state(state, time.clone(), NullPlanner)
}

fn persist(db: &Database, clock: &SessionClock<ManualClock, NullPlanner>) {
    PersistedSession::capture(clock.state()).save(db).unwrap();
}

#[test]
fn test_running_session_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("focus.db");
    let time = ManualClock::new(t0());

    {
        let db = Database::open_at(&path).unwrap();
        let mut clock = restore(&db, &time);
        clock.start();
        persist(&db, &clock);
    }

    time.advance(Duration::minutes(10));

    let db = Database::open_at(&path).unwrap();
    let mut clock = restore(&db, &time);
    assert!(clock.is_running());
    assert_eq!(clock.phase_end(), Some(t0() + Duration::minutes(25)));
    assert_eq!(clock.remaining_secs(), 15 * 60);

    clock.reconcile_after_foreground(time.now());
    assert_eq!(clock.phase(), Phase::Work);
}

#[test]
fn test_restart_after_deadline_transitions_once() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("focus.db");
    let time = ManualClock::new(t0());

    {
        let db = Database::open_at(&path).unwrap();
        let mut clock = restore(&db, &time);
        clock.start();
        persist(&db, &clock);
    }

    // the process was dead for over an hour
    time.advance(Duration::minutes(70));

    let db = Database::open_at(&path).unwrap();
    let mut clock = restore(&db, &time);
    let events = clock.reconcile_after_foreground(time.now());
    persist(&db, &clock);

    assert_eq!(events.iter().filter(|e| e.is_phase_change()).count(), 1);
    assert_eq!(clock.phase(), Phase::ShortBreak);
    assert_eq!(clock.cycles_completed(), 1);
    assert_eq!(db.kv_get(KEY_PHASE).unwrap().as_deref(), Some("shortBreak"));
}

#[test]
fn test_paused_session_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("focus.db");
    let time = ManualClock::new(t0());

    {
        let db = Database::open_at(&path).unwrap();
        let mut clock = restore(&db, &time);
        clock.start();
        time.advance_secs(90);
        clock.pause();
        persist(&db, &clock);
    }

    time.advance(Duration::days(1));

    let db = Database::open_at(&path).unwrap();
    let clock = restore(&db, &time);
    assert_eq!(clock.phase(), Phase::Paused);
    assert_eq!(clock.remaining_secs(), 1410);
    assert!(db.kv_get(KEY_PHASE_END).unwrap().is_none());
}

#[test]
fn test_corrupt_snapshot_restores_fresh_work() {
    let db = Database::open_memory().unwrap();
    let time = ManualClock::new(t0());

    let mut clock = restore(&db, &time);
    clock.start();
    persist(&db, &clock);
    db.kv_set(KEY_PHASE, "siesta").unwrap();

    let clock = restore(&db, &time);
    assert_eq!(clock.phase(), Phase::Work);
    assert!(!clock.is_running());
    assert_eq!(clock.remaining_secs(), 1500);
}

#[test]
fn test_failed_save_never_loses_a_cycle() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("focus.db");
    let time = ManualClock::new(t0());

    {
        let db = Database::open_at(&path).unwrap();
        let mut clock = restore(&db, &time);
        clock.start();
        time.advance_secs(1500);
        clock.tick();
        time.advance_secs(300);
        clock.tick();
        assert_eq!(clock.phase(), Phase::Work);
        persist(&db, &clock);

        // phase fields land, the cycle count does not
        db.conn()
            .execute_batch(
                "CREATE TRIGGER fail_cycles BEFORE INSERT ON kv
                 WHEN NEW.key = 'session.cycles_completed' AND NEW.value = '2'
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();
        time.advance_secs(1500);
        clock.tick();
        assert_eq!(clock.cycles_completed(), 2);
        assert!(PersistedSession::capture(clock.state()).save(&db).is_err());
    }

    let db = Database::open_at(&path).unwrap();
    db.conn().execute_batch("DROP TRIGGER fail_cycles;").unwrap();
    let mut clock = restore(&db, &time);
    assert_eq!(clock.phase(), Phase::Work);
    assert_eq!(clock.cycles_completed(), 1);
    assert_eq!(clock.phase_end(), Some(time.now()));

    clock.reconcile_after_foreground(time.now());
    assert_eq!(clock.phase(), Phase::ShortBreak);
    assert_eq!(clock.cycles_completed(), 2);
}
