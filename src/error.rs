use crate::domain::{DayId, EntityKind, TaskStatus};
use chrono::NaiveDate;
use thiserror::Error;

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors surfaced by the tracker core
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Referenced entity id does not resolve
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: u64 },

    /// Reserved: the status graph is fully connected, so this is never raised today
    #[allow(dead_code)]
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    /// Planned date range is inverted
    #[error("{kind} start_date ({start}) cannot be after end_date ({end})")]
    InvalidDateRange {
        kind: EntityKind,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// Manual day status is only allowed while the day has no tasks
    #[error("Day {0} has hour-level tasks. Update their statuses instead.")]
    DayHasTasks(DayId),

    /// Status text that maps to no known variant
    #[error("unknown status '{0}'")]
    UnknownStatus(String),

    /// Loading or committing the roadmap failed; nothing was applied
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),
}

impl TrackerError {
    pub fn not_found(kind: EntityKind, id: impl Into<u64>) -> Self {
        TrackerError::NotFound {
            kind,
            id: id.into(),
        }
    }
}
