use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A countable part of the Pomodoro cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Segment {
    Work,
    ShortBreak,
    LongBreak,
}

/// Phase as observed by the host. `Paused` masks the interrupted segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Work,
    ShortBreak,
    LongBreak,
    Paused,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Work => "work",
            Segment::ShortBreak => "shortBreak",
            Segment::LongBreak => "longBreak",
        }
    }

    pub fn is_break(self) -> bool {
        !matches!(self, Segment::Work)
    }

    /// The segment that follows this one once its deadline is reached,
    /// together with the cycle count after the transition.
    ///
    /// `cycles_completed` is the count *before* the transition.
    pub fn next(self, cycles_completed: u32, config: &SessionConfig) -> (Segment, u32) {
        match self {
            Segment::Work => {
                let cycles = cycles_completed.saturating_add(1);
                if cycles % config.pomodoros_before_long_break.max(1) == 0 {
                    (Segment::LongBreak, cycles)
                } else {
                    (Segment::ShortBreak, cycles)
                }
            }
            Segment::ShortBreak => (Segment::Work, cycles_completed),
            Segment::LongBreak => (Segment::Work, 0),
        }
    }
}

impl From<Segment> for Phase {
    fn from(segment: Segment) -> Self {
        match segment {
            Segment::Work => Phase::Work,
            Segment::ShortBreak => Phase::ShortBreak,
            Segment::LongBreak => Phase::LongBreak,
        }
    }
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Work => "work",
            Phase::ShortBreak => "shortBreak",
            Phase::LongBreak => "longBreak",
            Phase::Paused => "paused",
        }
    }

    /// The running segment, or `None` for `Paused`.
    pub fn segment(self) -> Option<Segment> {
        match self {
            Phase::Work => Some(Segment::Work),
            Phase::ShortBreak => Some(Segment::ShortBreak),
            Phase::LongBreak => Some(Segment::LongBreak),
            Phase::Paused => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(Phase::Work),
            "shortBreak" => Ok(Phase::ShortBreak),
            "longBreak" => Ok(Phase::LongBreak),
            "paused" => Ok(Phase::Paused),
            other => Err(ValidationError::InvalidValue {
                field: "phase".into(),
                message: format!("unknown phase '{other}'"),
            }),
        }
    }
}

impl FromStr for Segment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Phase>()?
            .segment()
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "segment".into(),
                message: "'paused' is not a segment".into(),
            })
    }
}

/// Durations and cadence of one session. Immutable while the session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub work_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    pub pomodoros_before_long_break: u32,
}

impl SessionConfig {
    pub fn new(
        work_minutes: u32,
        short_break_minutes: u32,
        long_break_minutes: u32,
        pomodoros_before_long_break: u32,
    ) -> Result<Self, ValidationError> {
        let config = Self {
            work_minutes,
            short_break_minutes,
            long_break_minutes,
            pomodoros_before_long_break,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("work_minutes", self.work_minutes),
            ("short_break_minutes", self.short_break_minutes),
            ("long_break_minutes", self.long_break_minutes),
            ("pomodoros_before_long_break", self.pomodoros_before_long_break),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ValidationError::NotPositive { field });
            }
        }
        Ok(())
    }

    pub fn minutes(&self, segment: Segment) -> u32 {
        match segment {
            Segment::Work => self.work_minutes,
            Segment::ShortBreak => self.short_break_minutes,
            Segment::LongBreak => self.long_break_minutes,
        }
    }

    /// Full duration of `segment` in seconds.
    pub fn duration_secs(&self, segment: Segment) -> u64 {
        u64::from(self.minutes(segment)).saturating_mul(60)
    }

    pub fn duration_ms(&self, segment: Segment) -> u64 {
        self.duration_secs(segment).saturating_mul(1000)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            pomodoros_before_long_break: 4,
        }
    }
}

/// `MM:SS` label for a remaining-time value. Minutes are not wrapped at 60.
pub fn format_remaining(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
