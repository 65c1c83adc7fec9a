//! Derivation of a container's status and actual window from its children.
//!
//! These functions are pure: the arena in `roadmap.rs` decides which children
//! feed a container and writes the result back.

use super::container::RollupState;
use super::enums::TaskStatus;
use super::task::Task;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// What a child contributes to its parent's roll-up
pub trait RollupChild {
    fn rollup_status(&self) -> TaskStatus;
    /// Task: first start. Container: actual start.
    fn start_signal(&self) -> Option<DateTime<Utc>>;
    /// Task: completion. Container: actual end.
    fn end_signal(&self) -> Option<DateTime<Utc>>;
}

impl RollupChild for Task {
    fn rollup_status(&self) -> TaskStatus {
        self.status
    }

    fn start_signal(&self) -> Option<DateTime<Utc>> {
        self.first_started_at
    }

    fn end_signal(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

impl RollupChild for RollupState {
    fn rollup_status(&self) -> TaskStatus {
        self.status
    }

    fn start_signal(&self) -> Option<DateTime<Utc>> {
        self.actual_start
    }

    fn end_signal(&self) -> Option<DateTime<Utc>> {
        self.actual_end
    }
}

/// Container status from the set of child statuses; first matching rule wins.
///
/// Break and pause both surface as Paused: containers have no on-break state.
pub fn derive_status<I>(child_statuses: I) -> TaskStatus
where
    I: IntoIterator<Item = TaskStatus>,
{
    let statuses: BTreeSet<TaskStatus> = child_statuses.into_iter().collect();

    if statuses.iter().all(|s| *s == TaskStatus::Pending) {
        return TaskStatus::Pending;
    }
    if statuses.contains(&TaskStatus::Working) {
        return TaskStatus::Working;
    }
    if statuses.contains(&TaskStatus::OnBreak) || statuses.contains(&TaskStatus::Paused) {
        return TaskStatus::Paused;
    }
    if statuses.len() == 1 && statuses.contains(&TaskStatus::Completed) {
        return TaskStatus::Completed;
    }
    // e.g. {Pending, Completed}: started but not finished
    TaskStatus::Paused
}

/// Roll `current` up from `children`
pub fn roll_up<C: RollupChild>(current: &RollupState, children: &[&C]) -> RollupState {
    roll_up_with_fallback::<C, C>(current, children, &[])
}

/// Roll `current` up from `children`, taking start signals from `fallback`
/// only when no child carries one
pub fn roll_up_with_fallback<C, F>(
    current: &RollupState,
    children: &[&C],
    fallback: &[&F],
) -> RollupState
where
    C: RollupChild,
    F: RollupChild,
{
    let status = derive_status(children.iter().map(|c| c.rollup_status()));
    if status == TaskStatus::Pending {
        return RollupState::default();
    }

    let mut starts: Vec<DateTime<Utc>> = children.iter().filter_map(|c| c.start_signal()).collect();
    if starts.is_empty() {
        starts = fallback.iter().filter_map(|f| f.start_signal()).collect();
    }
    // a start, once recorded, only ever moves earlier
    let actual_start = match (starts.into_iter().min(), current.actual_start) {
        (Some(earliest), Some(existing)) => Some(earliest.min(existing)),
        (earliest, existing) => earliest.or(existing),
    };

    let actual_end = if status == TaskStatus::Completed {
        children
            .iter()
            .filter_map(|c| c.end_signal())
            .max()
            .or(current.actual_end)
    } else {
        None
    };

    RollupState {
        status,
        actual_start,
        actual_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{TaskId, WeekId};
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(mins: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 8, 0, 0).unwrap() + Duration::minutes(mins)
    }

    fn task(id: u64) -> Task {
        Task::new(TaskId(id), format!("task {}", id), WeekId(1), None, at(0))
    }

    #[test]
    fn test_derive_status_precedence() {
        use TaskStatus::*;
        assert_eq!(derive_status([]), Pending);
        assert_eq!(derive_status([Pending, Pending]), Pending);
        assert_eq!(derive_status([Working, Completed]), Working);
        assert_eq!(derive_status([Working, OnBreak, Paused]), Working);
        assert_eq!(derive_status([OnBreak, Completed]), Paused);
        assert_eq!(derive_status([Paused, Pending]), Paused);
        assert_eq!(derive_status([Completed, Completed]), Completed);
        assert_eq!(derive_status([Pending, Completed]), Paused);
    }

    #[test]
    fn test_pending_clears_window() {
        let current = RollupState {
            status: TaskStatus::Working,
            actual_start: Some(at(0)),
            actual_end: None,
        };
        let a = task(1);
        assert_eq!(roll_up(&current, &[&a]), RollupState::default());
    }

    #[test]
    fn test_start_is_earliest_child_start() {
        let mut a = task(1);
        let mut b = task(2);
        a.transition(TaskStatus::Working, at(30));
        b.transition(TaskStatus::Working, at(10));

        let state = roll_up(&RollupState::default(), &[&a, &b]);
        assert_eq!(state.status, TaskStatus::Working);
        assert_eq!(state.actual_start, Some(at(10)));
        assert!(state.actual_end.is_none());
    }

    #[test]
    fn test_start_never_moves_later() {
        let mut a = task(1);
        a.transition(TaskStatus::Working, at(60));
        let current = RollupState {
            status: TaskStatus::Paused,
            actual_start: Some(at(5)),
            actual_end: None,
        };
        assert_eq!(roll_up(&current, &[&a]).actual_start, Some(at(5)));
    }

    #[test]
    fn test_end_only_when_completed() {
        let mut a = task(1);
        let mut b = task(2);
        a.transition(TaskStatus::Working, at(0));
        a.transition(TaskStatus::Completed, at(50));
        b.transition(TaskStatus::Working, at(10));

        let state = roll_up(&RollupState::default(), &[&a, &b]);
        assert_eq!(state.status, TaskStatus::Working);
        assert!(state.actual_end.is_none());

        b.transition(TaskStatus::Completed, at(40));
        let state = roll_up(&state, &[&a, &b]);
        assert_eq!(state.status, TaskStatus::Completed);
        assert_eq!(state.actual_start, Some(at(0)));
        assert_eq!(state.actual_end, Some(at(50)));
    }

    #[test]
    fn test_container_children_use_their_windows() {
        let day1 = RollupState {
            status: TaskStatus::Completed,
            actual_start: Some(at(0)),
            actual_end: Some(at(100)),
        };
        let day2 = RollupState {
            status: TaskStatus::Completed,
            actual_start: Some(at(200)),
            actual_end: Some(at(300)),
        };
        let state = roll_up(&RollupState::default(), &[&day1, &day2]);
        assert_eq!(
            state,
            RollupState {
                status: TaskStatus::Completed,
                actual_start: Some(at(0)),
                actual_end: Some(at(300)),
            }
        );
    }

    #[test]
    fn test_fallback_starts_used_when_children_have_none() {
        let day = RollupState {
            status: TaskStatus::Paused,
            actual_start: None,
            actual_end: None,
        };
        let mut a = task(1);
        a.transition(TaskStatus::Working, at(15));

        let state = roll_up_with_fallback(&RollupState::default(), &[&day], &[&a]);
        assert_eq!(state.status, TaskStatus::Paused);
        assert_eq!(state.actual_start, Some(at(15)));
    }
}
