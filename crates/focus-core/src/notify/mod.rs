//! Local notification planning.
//!
//! The session clock does not deliver notifications. It talks to a
//! [`NotificationPlanner`] that mirrors the live session as a set of pending
//! alerts. Alerts are best effort: the clock's own `tick()` and
//! `reconcile_after_foreground()` stay authoritative.

mod series;

pub use series::{plan_series, PlannedAlert, SeriesRequest};

use uuid::Uuid;

use crate::error::PlannerError;

/// Collaborator that installs and removes pending alerts.
pub trait NotificationPlanner {
    /// Replace the pending set with the series described by `request`.
    fn schedule_series(&mut self, request: &SeriesRequest) -> Result<(), PlannerError>;

    /// Remove every pending alert.
    fn cancel_all(&mut self) -> Result<(), PlannerError>;
}

impl<P: NotificationPlanner + ?Sized> NotificationPlanner for Box<P> {
    fn schedule_series(&mut self, request: &SeriesRequest) -> Result<(), PlannerError> {
        (**self).schedule_series(request)
    }

    fn cancel_all(&mut self) -> Result<(), PlannerError> {
        (**self).cancel_all()
    }
}

/// Planner for hosts with notifications turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlanner;

impl NotificationPlanner for NullPlanner {
    fn schedule_series(&mut self, _request: &SeriesRequest) -> Result<(), PlannerError> {
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<(), PlannerError> {
        Ok(())
    }
}

/// In-memory planner. Keeps the installed series and counts calls so hosts
/// and tests can check the pending set against the clock.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlanner {
    series_id: Option<Uuid>,
    pending: Vec<PlannedAlert>,
    denied: bool,
    schedule_calls: usize,
    cancel_calls: usize,
}

impl MemoryPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A planner whose every call fails with [`PlannerError::PermissionDenied`].
    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::default()
        }
    }

    pub fn pending(&self) -> &[PlannedAlert] {
        &self.pending
    }

    pub fn series_id(&self) -> Option<Uuid> {
        self.series_id
    }

    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls
    }
}

impl NotificationPlanner for MemoryPlanner {
    fn schedule_series(&mut self, request: &SeriesRequest) -> Result<(), PlannerError> {
        self.schedule_calls += 1;
        if self.denied {
            return Err(PlannerError::PermissionDenied);
        }
        self.pending = plan_series(request);
        self.series_id = Some(Uuid::new_v4());
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<(), PlannerError> {
        self.cancel_calls += 1;
        if self.denied {
            return Err(PlannerError::PermissionDenied);
        }
        self.pending.clear();
        self.series_id = None;
        Ok(())
    }
}
