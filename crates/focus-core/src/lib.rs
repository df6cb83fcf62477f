//! # Focus Core Library
//!
//! Core logic for the Focus Pomodoro timer. The CLI (and any other host) is
//! a thin layer over this crate: it issues commands, owns the once-a-second
//! driver and persists what the clock hands back.
//!
//! ## Architecture
//!
//! - **Session clock**: a wall-clock anchored state machine. Remaining time
//!   is always `deadline - now`, so missed ticks and suspended processes
//!   recover on the next observation
//! - **Notification planning**: a collaborator trait that mirrors the live
//!   session as a series of pending alerts
//! - **Storage**: SQLite history and key-value snapshot, TOML configuration
//! - **Time sync**: optional server offset for drifting local clocks
//!
//! ## Key Components
//!
//! - [`SessionClock`]: the session state machine
//! - [`NotificationPlanner`]: alert scheduling contract
//! - [`Database`]: history, snapshot and pending-alert persistence
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod storage;
pub mod time_sync;
pub mod timer;

pub use clock::{Clock, ManualClock, OffsetClock, SystemClock};
pub use error::{
    ConfigError, CoreError, DatabaseError, PlannerError, TimeSyncError, ValidationError,
};
pub use events::{Event, PlannerOperation};
pub use notify::{
    plan_series, MemoryPlanner, NotificationPlanner, NullPlanner, PlannedAlert, SeriesRequest,
};
pub use storage::{Config, Database, KeyValueStore, MemoryStore, PersistedSession};
pub use time_sync::TimeSync;
pub use timer::{
    format_remaining, Countdown, Phase, Segment, SessionClock, SessionConfig, SessionState,
};
