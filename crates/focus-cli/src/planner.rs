//! Notification planner backed by the `pending_alerts` table.
//!
//! The terminal has no OS scheduler to hand alerts to, so the series is
//! written to SQLite and `timer run` fires whatever has come due.

use focus_core::{plan_series, Database, NotificationPlanner, PlannerError, SeriesRequest};
use uuid::Uuid;

pub struct DbPlanner<'a> {
    db: &'a Database,
}

impl<'a> DbPlanner<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }
}

impl NotificationPlanner for DbPlanner<'_> {
    fn schedule_series(&mut self, request: &SeriesRequest) -> Result<(), PlannerError> {
        let alerts = plan_series(request);
        self.db
            .replace_alerts(Uuid::new_v4(), &alerts)
            .map_err(|e| PlannerError::Backend(e.to_string()))
    }

    fn cancel_all(&mut self) -> Result<(), PlannerError> {
        self.db
            .clear_alerts()
            .map_err(|e| PlannerError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use focus_core::{Segment, SessionConfig};

    fn request() -> SeriesRequest {
        SeriesRequest {
            anchor: Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap(),
            remaining_ms: 1_500_000,
            cycles_completed: 0,
            segment: Segment::Work,
            config: SessionConfig::default(),
        }
    }

    #[test]
    fn schedule_replaces_rows() {
        let db = Database::open_memory().unwrap();
        let mut planner = DbPlanner::new(&db);
        planner.schedule_series(&request()).unwrap();
        planner.schedule_series(&request()).unwrap();

        let pending = db.pending_alerts().unwrap();
        assert_eq!(pending.len(), 8);
        assert!(pending.iter().all(|a| a.series_id == pending[0].series_id));
        assert_eq!(pending[0].title, "Pomodoro complete");
    }

    #[test]
    fn cancel_empties_table() {
        let db = Database::open_memory().unwrap();
        let mut planner = DbPlanner::new(&db);
        planner.schedule_series(&request()).unwrap();
        planner.cancel_all().unwrap();
        assert!(db.pending_alerts().unwrap().is_empty());
    }
}
