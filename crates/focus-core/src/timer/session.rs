//! Session clock implementation.
//!
//! The session clock is a wall-clock anchored state machine. A running
//! segment stores only its absolute deadline; remaining time is always
//! derived as `deadline - now`. Missed ticks, a suspended process or a
//! restart from a persisted snapshot all recover the same way: the next
//! observation recomputes from the deadline.
//!
//! ## State Transitions
//!
//! ```text
//! Work -> ShortBreak -> Work -> ... -> Work -> LongBreak -> Work (idle)
//!   \______________ pause() / resume() on any running segment ______/
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut clock = SessionClock::new(SessionConfig::default(), SystemClock, NullPlanner);
//! clock.start();
//! // Host driver, about once a second:
//! for event in clock.tick() { /* redraw, persist */ }
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::phase::{format_remaining, Phase, SessionConfig, Segment};
use crate::clock::Clock;
use crate::error::{PlannerError, ValidationError};
use crate::events::{Event, PlannerOperation};
use crate::notify::{NotificationPlanner, SeriesRequest};

/// Where the current segment's countdown stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Countdown {
    /// Not started. Remaining time is the full segment duration.
    Idle,
    /// Counting down towards `ends_at`.
    Running {
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    },
    /// Frozen. No deadline exists while paused.
    Paused { remaining_ms: u64 },
}

/// Plain session data: everything that survives a restart.
///
/// All queries take `now` explicitly; [`SessionClock`] supplies it from its
/// [`Clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    config: SessionConfig,
    segment: Segment,
    cycles_completed: u32,
    countdown: Countdown,
}

impl SessionState {
    /// Fresh session: idle work segment, no cycles.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            segment: Segment::Work,
            cycles_completed: 0,
            countdown: Countdown::Idle,
        }
    }

    /// Rebuild a state from stored parts, rejecting combinations the clock
    /// could never have produced.
    pub fn from_parts(
        config: SessionConfig,
        segment: Segment,
        cycles_completed: u32,
        countdown: Countdown,
    ) -> Result<Self, ValidationError> {
        config.validate()?;

        let n = config.pomodoros_before_long_break;
        let cycles_ok = match segment {
            Segment::Work => cycles_completed < n,
            Segment::ShortBreak => cycles_completed > 0 && cycles_completed < n,
            Segment::LongBreak => cycles_completed == n,
        };
        if !cycles_ok {
            return Err(ValidationError::InvalidValue {
                field: "cycles_completed".into(),
                message: format!("{cycles_completed} is not reachable in {segment} with N={n}"),
            });
        }

        match countdown {
            Countdown::Running { started_at, ends_at } if ends_at < started_at => {
                return Err(ValidationError::InvalidValue {
                    field: "phase_end".into(),
                    message: "phase ends before it starts".into(),
                });
            }
            Countdown::Paused { remaining_ms } if remaining_ms > config.duration_ms(segment) => {
                return Err(ValidationError::InvalidValue {
                    field: "remaining_ms".into(),
                    message: format!("{remaining_ms}ms exceeds the {segment} duration"),
                });
            }
            _ => {}
        }

        Ok(Self {
            config,
            segment,
            cycles_completed,
            countdown,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    pub fn countdown(&self) -> Countdown {
        self.countdown
    }

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    pub fn phase(&self) -> Phase {
        match self.countdown {
            Countdown::Paused { .. } => Phase::Paused,
            _ => self.segment.into(),
        }
    }

    /// The segment a paused session will resume into.
    pub fn paused_segment(&self) -> Option<Segment> {
        matches!(self.countdown, Countdown::Paused { .. }).then_some(self.segment)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.countdown, Countdown::Running { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.countdown, Countdown::Paused { .. })
    }

    pub fn phase_start(&self) -> Option<DateTime<Utc>> {
        match self.countdown {
            Countdown::Running { started_at, .. } => Some(started_at),
            _ => None,
        }
    }

    pub fn phase_end(&self) -> Option<DateTime<Utc>> {
        match self.countdown {
            Countdown::Running { ends_at, .. } => Some(ends_at),
            _ => None,
        }
    }

    pub fn duration_secs(&self) -> u64 {
        self.config.duration_secs(self.segment)
    }

    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        match self.countdown {
            Countdown::Idle => self.config.duration_ms(self.segment),
            Countdown::Running { ends_at, .. } => {
                u64::try_from((ends_at - now).num_milliseconds()).unwrap_or(0)
            }
            Countdown::Paused { remaining_ms } => remaining_ms,
        }
    }

    /// Remaining whole seconds, rounded up so the display reads the full
    /// duration until a full second has passed.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        self.remaining_ms(now).div_ceil(1000)
    }

    /// Fraction of the segment still remaining, clamped to `[0, 1]`.
    ///
    /// Reports `1.0` while idle so a progress ring stays full before start.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if self.countdown == Countdown::Idle {
            return 1.0;
        }
        let total = self.config.duration_ms(self.segment);
        if total == 0 {
            return 0.0;
        }
        (self.remaining_ms(now) as f64 / total as f64).clamp(0.0, 1.0)
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.countdown, Countdown::Running { ends_at, .. } if ends_at <= now)
    }

    /// Running bounds for `remaining` left in the current segment.
    fn running_for(&self, now: DateTime<Utc>, remaining_ms: u64) -> Countdown {
        let ends_at = now + millis(remaining_ms);
        let started_at = ends_at - millis(self.config.duration_ms(self.segment));
        Countdown::Running { started_at, ends_at }
    }
}

fn millis(ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX / 2))
}

/// Pomodoro session clock.
///
/// Owns the session state, reads time from `C` and mirrors the session into
/// pending alerts through `P`. Every operation is total: calling one in a
/// state where it makes no sense returns no events and changes nothing.
#[derive(Debug, Clone)]
pub struct SessionClock<C, P> {
    state: SessionState,
    clock: C,
    planner: P,
}

impl<C: Clock, P: NotificationPlanner> SessionClock<C, P> {
    /// Create a clock with a fresh, idle work segment.
    pub fn new(config: SessionConfig, clock: C, planner: P) -> Self {
        Self::from_state(SessionState::new(config), clock, planner)
    }

    /// Wrap a restored state. The planner is not touched: alerts installed
    /// before the restart are still pending.
    pub fn from_state(state: SessionState, clock: C, planner: P) -> Self {
        Self {
            state,
            clock,
            planner,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    pub fn planner_mut(&mut self) -> &mut P {
        &mut self.planner
    }

    pub fn into_parts(self) -> (SessionState, C, P) {
        (self.state, self.clock, self.planner)
    }

    pub fn config(&self) -> &SessionConfig {
        self.state.config()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn segment(&self) -> Segment {
        self.state.segment()
    }

    pub fn paused_segment(&self) -> Option<Segment> {
        self.state.paused_segment()
    }

    pub fn cycles_completed(&self) -> u32 {
        self.state.cycles_completed()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn phase_start(&self) -> Option<DateTime<Utc>> {
        self.state.phase_start()
    }

    pub fn phase_end(&self) -> Option<DateTime<Utc>> {
        self.state.phase_end()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.state.remaining_secs(self.clock.now())
    }

    pub fn progress(&self) -> f64 {
        self.state.progress(self.clock.now())
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let now = self.clock.now();
        let remaining_secs = self.state.remaining_secs(now);
        Event::StateSnapshot {
            phase: self.state.phase(),
            segment: self.state.segment(),
            running: self.state.is_running(),
            remaining_secs,
            remaining_label: format_remaining(remaining_secs),
            duration_secs: self.state.duration_secs(),
            progress: self.state.progress(now),
            cycles_completed: self.state.cycles_completed(),
            pomodoros_before_long_break: self.state.config().pomodoros_before_long_break,
            phase_start: self.state.phase_start(),
            phase_end: self.state.phase_end(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin the current segment, or resume it when paused.
    pub fn start(&mut self) -> Vec<Event> {
        match self.state.countdown {
            Countdown::Running { .. } => Vec::new(),
            Countdown::Paused { .. } => self.resume(),
            Countdown::Idle => {
                let now = self.clock.now();
                let mut events = Vec::new();
                let duration_ms = self.state.config.duration_ms(self.state.segment);
                self.state.countdown = self.state.running_for(now, duration_ms);
                debug!(
                    segment = %self.state.segment,
                    cycles = self.state.cycles_completed,
                    "segment started"
                );
                events.push(Event::SessionStarted {
                    segment: self.state.segment,
                    duration_secs: self.state.duration_secs(),
                    cycles_completed: self.state.cycles_completed,
                    ends_at: now + millis(duration_ms),
                    at: now,
                });
                self.schedule_alerts(now, &mut events);
                events
            }
        }
    }

    /// Freeze the remaining time and drop the deadline.
    pub fn pause(&mut self) -> Vec<Event> {
        if !self.state.is_running() {
            return Vec::new();
        }
        let now = self.clock.now();
        let mut events = Vec::new();
        let remaining_ms = self.state.remaining_ms(now);
        self.cancel_alerts(now, &mut events);
        self.state.countdown = Countdown::Paused { remaining_ms };
        debug!(segment = %self.state.segment, remaining_ms, "segment paused");
        events.push(Event::SessionPaused {
            segment: self.state.segment,
            remaining_secs: self.state.remaining_secs(now),
            at: now,
        });
        events
    }

    /// Continue a paused segment with a fresh deadline.
    pub fn resume(&mut self) -> Vec<Event> {
        let Countdown::Paused { remaining_ms } = self.state.countdown else {
            return Vec::new();
        };
        let now = self.clock.now();
        let mut events = Vec::new();
        self.state.countdown = self.state.running_for(now, remaining_ms);
        debug!(segment = %self.state.segment, remaining_ms, "segment resumed");
        events.push(Event::SessionResumed {
            segment: self.state.segment,
            remaining_secs: self.state.remaining_secs(now),
            ends_at: now + millis(remaining_ms),
            at: now,
        });
        self.schedule_alerts(now, &mut events);
        events
    }

    /// Back to an idle work segment with no completed cycles.
    pub fn reset(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        let mut events = Vec::new();
        self.cancel_alerts(now, &mut events);
        self.state = SessionState::new(self.state.config);
        debug!("session reset");
        events.push(Event::SessionReset { at: now });
        events
    }

    /// Replace the session config. Always resets the clock.
    pub fn set_config(&mut self, config: SessionConfig) -> Result<Vec<Event>, ValidationError> {
        config.validate()?;
        self.state.config = config;
        Ok(self.reset())
    }

    /// Observe the clock. Performs at most one transition per call.
    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        if !self.state.is_running() {
            return Vec::new();
        }
        self.observe(now)
    }

    /// Recompute after the host comes back from suspension or a restart.
    ///
    /// An expired deadline produces the same single transition `tick()`
    /// would. The trailing `Tick` event lets the host redraw; if
    /// [`is_running`](Self::is_running) it should restart its driver.
    pub fn reconcile_after_foreground(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        debug!(
            phase = %self.state.phase(),
            overdue = self.state.is_expired(now),
            "reconciling after foreground"
        );
        self.observe(now)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn observe(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let mut events = Vec::new();
        if self.state.is_expired(now) {
            self.complete_segment(now, &mut events);
        }
        events.push(Event::Tick {
            phase: self.state.phase(),
            remaining_secs: self.state.remaining_secs(now),
            progress: self.state.progress(now),
            at: now,
        });
        events
    }

    /// Move past the current segment. The next deadline is measured from
    /// `now`, never from the missed deadline, so an overdue session lands in
    /// exactly one new segment at full length.
    fn complete_segment(&mut self, now: DateTime<Utc>, events: &mut Vec<Event>) {
        let from = self.state.segment;
        let from_started_at = self.state.phase_start();
        let (to, cycles) = from.next(self.state.cycles_completed, &self.state.config);
        let keeps_running = from != Segment::LongBreak;

        self.cancel_alerts(now, events);
        self.state.segment = to;
        self.state.cycles_completed = cycles;
        self.state.countdown = if keeps_running {
            self.state.running_for(now, self.state.config.duration_ms(to))
        } else {
            Countdown::Idle
        };

        debug!(%from, %to, cycles, running = keeps_running, "segment completed");
        events.push(Event::PhaseChanged {
            from,
            to,
            cycles_completed: cycles,
            from_started_at,
            running: keeps_running,
            at: now,
        });

        if keeps_running {
            self.schedule_alerts(now, events);
        }
    }

    fn schedule_alerts(&mut self, now: DateTime<Utc>, events: &mut Vec<Event>) {
        let request = SeriesRequest {
            anchor: now,
            remaining_ms: self.state.remaining_ms(now),
            cycles_completed: self.state.cycles_completed,
            segment: self.state.segment,
            config: self.state.config,
        };
        let result = self.planner.schedule_series(&request);
        report_planner(result, PlannerOperation::ScheduleSeries, now, events);
    }

    fn cancel_alerts(&mut self, now: DateTime<Utc>, events: &mut Vec<Event>) {
        let result = self.planner.cancel_all();
        report_planner(result, PlannerOperation::CancelAll, now, events);
    }
}

fn report_planner(
    result: Result<(), PlannerError>,
    operation: PlannerOperation,
    now: DateTime<Utc>,
    events: &mut Vec<Event>,
) {
    if let Err(err) = result {
        warn!(?operation, error = %err, "notification planner failed; continuing");
        events.push(Event::NotificationFailed {
            operation,
            message: err.to_string(),
            at: now,
        });
    }
}
