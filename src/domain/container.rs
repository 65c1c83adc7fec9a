use super::enums::{EntityKind, TaskStatus};
use super::ids::{DayId, PhaseId, TaskId, WeekId};
use crate::error::{Result, TrackerError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Derived status and actual time window of a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollupState {
    pub status: TaskStatus,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
}

impl RollupState {
    /// Set status by hand (only used for days that have no tasks to derive from)
    pub fn apply_manual(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if status == TaskStatus::Pending {
            *self = RollupState::default();
            return;
        }
        self.status = status;
        self.actual_start.get_or_insert(now);
        self.actual_end = if status == TaskStatus::Completed {
            Some(now)
        } else {
            None
        };
    }
}

/// Reject planned ranges whose start falls after their end
pub fn validate_date_range(
    kind: EntityKind,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(TrackerError::InvalidDateRange { kind, start, end });
        }
    }
    Ok(())
}

/// High-level period such as "Phase 1: Foundations"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub state: RollupState,
    #[serde(default)]
    pub weeks: Vec<WeekId>,
}

/// Week within a phase; owns days and, directly, every task scheduled in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Week {
    pub id: WeekId,
    pub number: u32,
    pub phase_id: PhaseId,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub state: RollupState,
    #[serde(default)]
    pub days: Vec<DayId>,
    #[serde(default)]
    pub tasks: Vec<TaskId>,
}

/// Day-level plan nested under a week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Day {
    pub id: DayId,
    pub number: u32,
    pub week_id: WeekId,
    #[serde(default)]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub state: RollupState,
    #[serde(default)]
    pub tasks: Vec<TaskId>,
}
