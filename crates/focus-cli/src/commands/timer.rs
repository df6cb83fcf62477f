use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use focus_core::storage::snapshot::restore_state;
use focus_core::time_sync::{self, TimeSync};
use focus_core::{
    Clock, Config, Database, Event, NotificationPlanner, NullPlanner, OffsetClock,
    PersistedSession, SessionClock,
};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::planner::DbPlanner;

type HostClock<'a> = SessionClock<OffsetClock, Box<dyn NotificationPlanner + 'a>>;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the current segment (resumes when paused)
    Start,
    /// Pause the running segment
    Pause,
    /// Resume a paused segment
    Resume,
    /// Reset to an idle work segment
    Reset,
    /// Observe the clock once, completing the segment if it is due
    Tick,
    /// Print current session state as JSON
    Status,
    /// Drive the clock once a second until it stops or Ctrl-C
    Run,
    /// Measure the local clock offset against the time server
    Sync,
}

fn load_clock<'a>(db: &'a Database, config: &Config) -> HostClock<'a> {
    let offset = if config.time_sync.enabled {
        time_sync::stored_offset(db)
    } else {
        Duration::zero()
    };
    let planner: Box<dyn NotificationPlanner + 'a> = if config.notifications.enabled {
        Box::new(DbPlanner::new(db))
    } else {
        Box::new(NullPlanner)
    };
    let state = restore_state(db, config.session);
    SessionClock::from_state(state, OffsetClock::new(offset), planner)
}

/// Record finished segments and persist the snapshot when anything other
/// than a plain tick happened.
fn commit(
    db: &Database,
    clock: &HostClock<'_>,
    events: &[Event],
) -> Result<(), Box<dyn std::error::Error>> {
    for event in events {
        if let Event::PhaseChanged { from, from_started_at, at, .. } = event {
            let minutes = clock.config().minutes(*from);
            let started_at = from_started_at.unwrap_or(*at - Duration::minutes(i64::from(minutes)));
            db.record_segment(*from, u64::from(minutes), started_at, *at)?;
        }
    }
    if events.iter().any(|e| !matches!(e, Event::Tick { .. })) {
        PersistedSession::capture(clock.state()).save(db)?;
    }
    Ok(())
}

fn print_events(events: &[Event]) -> Result<(), Box<dyn std::error::Error>> {
    for event in events {
        println!("{}", serde_json::to_string_pretty(event)?);
    }
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let mut clock = load_clock(&db, &config);

    // catch up with whatever happened while no process was running
    let now = clock.clock().now();
    let caught_up = clock.reconcile_after_foreground(now);
    commit(&db, &clock, &caught_up)?;
    let caught_up: Vec<Event> = caught_up.into_iter().filter(Event::is_phase_change).collect();

    match action {
        TimerAction::Start => {
            let events = clock.start();
            commit(&db, &clock, &events)?;
            print_events(&caught_up)?;
            print_events(&events)?;
            println!("{}", serde_json::to_string_pretty(&clock.snapshot())?);
        }
        TimerAction::Pause => {
            let events = clock.pause();
            commit(&db, &clock, &events)?;
            print_events(&caught_up)?;
            print_events(&events)?;
            println!("{}", serde_json::to_string_pretty(&clock.snapshot())?);
        }
        TimerAction::Resume => {
            let events = clock.resume();
            commit(&db, &clock, &events)?;
            print_events(&caught_up)?;
            print_events(&events)?;
            println!("{}", serde_json::to_string_pretty(&clock.snapshot())?);
        }
        TimerAction::Reset => {
            let events = clock.reset();
            commit(&db, &clock, &events)?;
            print_events(&events)?;
        }
        TimerAction::Tick => {
            let events = clock.tick();
            commit(&db, &clock, &events)?;
            print_events(&caught_up)?;
            print_events(&events)?;
        }
        TimerAction::Status => {
            print_events(&caught_up)?;
            println!("{}", serde_json::to_string_pretty(&clock.snapshot())?);
        }
        TimerAction::Run => {
            print_events(&caught_up)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(drive(&db, &mut clock))?;
        }
        TimerAction::Sync => {
            print_events(&caught_up)?;
            sync(&db, &config)?;
        }
    }

    Ok(())
}

/// Foreground driver: one observation per second, firing due alerts, until
/// the clock stops on its own or the user interrupts.
async fn drive(db: &Database, clock: &mut HostClock<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let events = clock.start();
    commit(db, clock, &events)?;
    for event in &events {
        println!("{}", serde_json::to_string(event)?);
    }

    let mut interval = tokio::time::interval(StdDuration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let events = clock.tick();
                commit(db, clock, &events)?;
                for event in &events {
                    println!("{}", serde_json::to_string(event)?);
                }
                fire_due_alerts(db, clock.clock().now())?;
                if !clock.is_running() {
                    info!("session clock stopped; leaving driver");
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("interrupted; session keeps running from its deadline");
                break;
            }
        }
    }
    Ok(())
}

fn fire_due_alerts(db: &Database, now: DateTime<Utc>) -> Result<(), Box<dyn std::error::Error>> {
    for alert in db.due_alerts(now)? {
        let line = serde_json::json!({
            "type": "Alert",
            "title": alert.title,
            "body": alert.body,
            "fire_at": alert.fire_at,
            "at": now,
        });
        println!("{line}");
        db.remove_alert(alert.id)?;
    }
    Ok(())
}

fn sync(db: &Database, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let sync = TimeSync::from_config(&config.time_sync);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match runtime.block_on(sync.fetch_offset()) {
        Ok(offset) => {
            time_sync::store_offset(db, offset)?;
            let out = serde_json::json!({
                "offset_ms": offset.num_milliseconds(),
                "url": sync.url(),
                "applied": config.time_sync.enabled,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "time sync failed; keeping previous offset");
            Err(e.into())
        }
    }
}
