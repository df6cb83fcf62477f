use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Phase, Segment};

/// Every session clock operation returns the events it produced.
/// The host redraws from them; nothing is pushed through callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        segment: Segment,
        duration_secs: u64,
        cycles_completed: u32,
        ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    SessionPaused {
        segment: Segment,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SessionResumed {
        segment: Segment,
        remaining_secs: u64,
        ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// A segment reached its deadline and the clock moved on.
    PhaseChanged {
        from: Segment,
        to: Segment,
        cycles_completed: u32,
        /// When the finished segment started, if known.
        from_started_at: Option<DateTime<Utc>>,
        /// `false` once a long break ends: the clock waits for `start()`.
        running: bool,
        at: DateTime<Utc>,
    },
    Tick {
        phase: Phase,
        remaining_secs: u64,
        progress: f64,
        at: DateTime<Utc>,
    },
    SessionReset {
        at: DateTime<Utc>,
    },
    /// The notification planner failed. State was not rolled back.
    NotificationFailed {
        operation: PlannerOperation,
        message: String,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: Phase,
        segment: Segment,
        running: bool,
        remaining_secs: u64,
        remaining_label: String,
        duration_secs: u64,
        progress: f64,
        cycles_completed: u32,
        pomodoros_before_long_break: u32,
        phase_start: Option<DateTime<Utc>>,
        phase_end: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerOperation {
    ScheduleSeries,
    CancelAll,
}

impl Event {
    pub fn is_phase_change(&self) -> bool {
        matches!(self, Event::PhaseChanged { .. })
    }
}
