//! Session snapshot persisted in a key-value store.
//!
//! The host writes the snapshot after every phase-affecting mutation and
//! reads it once at startup. Anything missing, unparsable or inconsistent
//! restores a fresh work segment instead of failing startup.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::KeyValueStore;
use crate::error::{Result, ValidationError};
use crate::timer::{Countdown, Phase, SessionConfig, SessionState, Segment};

pub const KEY_PHASE: &str = "session.phase";
pub const KEY_PAUSED_PHASE: &str = "session.paused_phase";
pub const KEY_PHASE_START: &str = "session.phase_start";
pub const KEY_PHASE_END: &str = "session.phase_end";
pub const KEY_REMAINING_MS: &str = "session.remaining_ms";
pub const KEY_CYCLES: &str = "session.cycles_completed";
pub const KEY_IS_RUNNING: &str = "session.is_running";
pub const KEY_CONFIG: &str = "session.config";

const ALL_KEYS: [&str; 8] = [
    KEY_PHASE,
    KEY_PAUSED_PHASE,
    KEY_PHASE_START,
    KEY_PHASE_END,
    KEY_REMAINING_MS,
    KEY_CYCLES,
    KEY_IS_RUNNING,
    KEY_CONFIG,
];

/// Flat, store-friendly form of a [`SessionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub phase: Phase,
    /// Present only while paused.
    pub paused_phase: Option<Segment>,
    /// Present only while running.
    pub phase_start: Option<DateTime<Utc>>,
    /// Present only while running.
    pub phase_end: Option<DateTime<Utc>>,
    /// Present only while paused.
    pub remaining_ms: Option<u64>,
    pub cycles_completed: u32,
    pub is_running: bool,
    pub config: SessionConfig,
}

impl PersistedSession {
    pub fn capture(state: &SessionState) -> Self {
        let (phase_start, phase_end, remaining_ms) = match state.countdown() {
            Countdown::Idle => (None, None, None),
            Countdown::Running { started_at, ends_at } => (Some(started_at), Some(ends_at), None),
            Countdown::Paused { remaining_ms } => (None, None, Some(remaining_ms)),
        };
        Self {
            phase: state.phase(),
            paused_phase: state.paused_segment(),
            phase_start,
            phase_end,
            remaining_ms,
            cycles_completed: state.cycles_completed(),
            is_running: state.is_running(),
            config: *state.config(),
        }
    }

    /// Write every key in one batch; keys without a value are removed so a
    /// stale field from an earlier snapshot can never be read back. A failed
    /// save leaves the previous snapshot intact.
    pub fn save(&self, store: &impl KeyValueStore) -> Result<()> {
        let config = serde_json::to_string(&self.config)?;
        let entries: [(&str, Option<String>); 8] = [
            (KEY_PHASE, Some(self.phase.as_str().to_string())),
            (KEY_PAUSED_PHASE, self.paused_phase.map(|s| s.as_str().to_string())),
            (KEY_PHASE_START, self.phase_start.map(fmt_ts)),
            (KEY_PHASE_END, self.phase_end.map(fmt_ts)),
            (KEY_REMAINING_MS, self.remaining_ms.map(|ms| ms.to_string())),
            (KEY_CYCLES, Some(self.cycles_completed.to_string())),
            (KEY_IS_RUNNING, Some(self.is_running.to_string())),
            (KEY_CONFIG, Some(config)),
        ];
        let batch: Vec<(&str, Option<&str>)> =
            entries.iter().map(|(key, value)| (*key, value.as_deref())).collect();
        store.kv_write_batch(&batch)
    }

    /// Read a snapshot. `Ok(None)` when nothing was ever saved.
    ///
    /// # Errors
    /// Returns an error if the store fails or a stored field is malformed.
    pub fn load(store: &impl KeyValueStore) -> Result<Option<Self>> {
        let Some(phase) = store.kv_get(KEY_PHASE)? else {
            return Ok(None);
        };
        let phase: Phase = phase.parse()?;

        let paused_phase = store
            .kv_get(KEY_PAUSED_PHASE)?
            .map(|raw| raw.parse::<Segment>())
            .transpose()?;
        let phase_start = store
            .kv_get(KEY_PHASE_START)?
            .map(|raw| parse_ts(KEY_PHASE_START, &raw))
            .transpose()?;
        let phase_end = store
            .kv_get(KEY_PHASE_END)?
            .map(|raw| parse_ts(KEY_PHASE_END, &raw))
            .transpose()?;
        let remaining_ms = store
            .kv_get(KEY_REMAINING_MS)?
            .map(|raw| parse_field::<u64>(KEY_REMAINING_MS, &raw))
            .transpose()?;
        let cycles_completed = match store.kv_get(KEY_CYCLES)? {
            Some(raw) => parse_field::<u32>(KEY_CYCLES, &raw)?,
            None => return Err(missing(KEY_CYCLES).into()),
        };
        let is_running = match store.kv_get(KEY_IS_RUNNING)? {
            Some(raw) => parse_field::<bool>(KEY_IS_RUNNING, &raw)?,
            None => return Err(missing(KEY_IS_RUNNING).into()),
        };
        let config = match store.kv_get(KEY_CONFIG)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => return Err(missing(KEY_CONFIG).into()),
        };

        Ok(Some(Self {
            phase,
            paused_phase,
            phase_start,
            phase_end,
            remaining_ms,
            cycles_completed,
            is_running,
            config,
        }))
    }

    /// Remove every snapshot key.
    pub fn clear(store: &impl KeyValueStore) -> Result<()> {
        let batch: Vec<(&str, Option<&str>)> = ALL_KEYS.iter().map(|key| (*key, None)).collect();
        store.kv_write_batch(&batch)
    }

    /// Rebuild the session state. `current` is the configuration the host
    /// runs with now; a snapshot taken under a different one is rejected,
    /// since a config change resets the session.
    pub fn into_state(self, current: &SessionConfig) -> Result<SessionState, ValidationError> {
        if self.config != *current {
            return Err(ValidationError::InvalidValue {
                field: KEY_CONFIG.into(),
                message: "session config changed since the snapshot was taken".into(),
            });
        }

        let (segment, countdown) = match (self.phase.segment(), self.is_running) {
            (None, false) => {
                let segment = self.paused_phase.ok_or_else(|| missing(KEY_PAUSED_PHASE))?;
                let remaining_ms = self.remaining_ms.ok_or_else(|| missing(KEY_REMAINING_MS))?;
                (segment, Countdown::Paused { remaining_ms })
            }
            (None, true) => {
                return Err(ValidationError::InvalidValue {
                    field: KEY_IS_RUNNING.into(),
                    message: "a paused session cannot be running".into(),
                });
            }
            (Some(segment), true) => {
                let started_at = self.phase_start.ok_or_else(|| missing(KEY_PHASE_START))?;
                let ends_at = self.phase_end.ok_or_else(|| missing(KEY_PHASE_END))?;
                (segment, Countdown::Running { started_at, ends_at })
            }
            (Some(segment), false) => {
                if self.phase_end.is_some() || self.phase_start.is_some() {
                    return Err(ValidationError::InvalidValue {
                        field: KEY_PHASE_END.into(),
                        message: "a stopped session has no deadline".into(),
                    });
                }
                (segment, Countdown::Idle)
            }
        };

        SessionState::from_parts(self.config, segment, self.cycles_completed, countdown)
    }
}

/// Load the persisted session, falling back to a fresh work segment when the
/// snapshot is missing or unusable.
pub fn restore_state(store: &impl KeyValueStore, config: SessionConfig) -> SessionState {
    let restored = PersistedSession::load(store).and_then(|snapshot| match snapshot {
        Some(snapshot) => Ok(Some(snapshot.into_state(&config)?)),
        None => Ok(None),
    });

    match restored {
        Ok(Some(state)) => {
            info!(phase = %state.phase(), cycles = state.cycles_completed(), "restored session");
            state
        }
        Ok(None) => SessionState::new(config),
        Err(e) => {
            warn!(error = %e, "discarding persisted session snapshot");
            SessionState::new(config)
        }
    }
}

fn missing(key: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: key.into(),
        message: "missing".into(),
    }
}

fn parse_field<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ValidationError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ValidationError::InvalidValue {
        field: key.into(),
        message: format!("'{raw}': {e}"),
    })
}

fn parse_ts(key: &str, raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ValidationError::InvalidValue {
            field: key.into(),
            message: format!("'{raw}': {e}"),
        })
}

fn fmt_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}
