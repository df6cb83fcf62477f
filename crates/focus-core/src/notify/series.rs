//! Forward-looking alert plan for a running session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{SessionConfig, Segment};

/// Everything a planner needs to lay out the upcoming alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRequest {
    /// Instant the remaining time is measured from.
    pub anchor: DateTime<Utc>,
    /// Exact time left in `segment`, so the first alert lands on the deadline.
    pub remaining_ms: u64,
    pub cycles_completed: u32,
    pub segment: Segment,
    pub config: SessionConfig,
}

/// One pending "segment finished" alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAlert {
    pub fire_at: DateTime<Utc>,
    /// Milliseconds from the request anchor.
    pub offset_ms: u64,
    pub completed: Segment,
    pub next: Segment,
    /// Cycle count once `completed` has finished.
    pub cycles_completed: u32,
    pub title: String,
    pub body: String,
}

/// Lays out one alert per segment end, from the current segment through the
/// end of the next long break. The clock stops after a long break, so
/// nothing past it is planned.
pub fn plan_series(request: &SeriesRequest) -> Vec<PlannedAlert> {
    let config = &request.config;
    let mut alerts = Vec::new();
    let mut segment = request.segment;
    let mut cycles = request.cycles_completed;
    let mut offset = request.remaining_ms;
    // a full round is N work segments and N breaks
    let max_alerts = 2 * config.pomodoros_before_long_break.max(1) as usize;

    loop {
        let (next, next_cycles) = segment.next(cycles, config);
        let (title, body) = alert_text(segment, next, next_cycles, config);
        alerts.push(PlannedAlert {
            fire_at: request.anchor + Duration::milliseconds(clamp_ms(offset)),
            offset_ms: offset,
            completed: segment,
            next,
            cycles_completed: next_cycles,
            title,
            body,
        });

        if segment == Segment::LongBreak || alerts.len() >= max_alerts {
            break;
        }
        segment = next;
        cycles = next_cycles;
        offset = offset.saturating_add(config.duration_ms(segment));
    }

    alerts
}

fn clamp_ms(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX / 2)
}

fn alert_text(
    completed: Segment,
    next: Segment,
    cycles_after: u32,
    config: &SessionConfig,
) -> (String, String) {
    match (completed, next) {
        (Segment::Work, Segment::LongBreak) => (
            "Pomodoro complete".into(),
            format!(
                "{cycles_after} pomodoros done. Long break: {} min.",
                config.long_break_minutes
            ),
        ),
        (Segment::Work, _) => (
            "Pomodoro complete".into(),
            format!(
                "Pomodoro {}/{} done. Short break: {} min.",
                cycles_after % config.pomodoros_before_long_break.max(1),
                config.pomodoros_before_long_break,
                config.short_break_minutes
            ),
        ),
        (Segment::ShortBreak, _) => (
            "Break is over".into(),
            format!("Back to work: {} min.", config.work_minutes),
        ),
        (Segment::LongBreak, _) => (
            "Long break is over".into(),
            "Start a new round when you're ready.".into(),
        ),
    }
}
