use super::container::RollupState;
use super::enums::TaskStatus;
use super::ids::{ContainerRef, DayId, TaskId, WeekId};
use super::roadmap::Roadmap;
use super::task::{Task, TimingSnapshot};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::ops::AddAssign;

/// Read-side view of a task with live timing
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub title: String,
    pub week_id: WeekId,
    pub day_id: Option<DayId>,
    pub hour_number: Option<u32>,
    pub estimated_hours: Option<f64>,
    pub status: TaskStatus,
    pub work_seconds: u64,
    pub break_seconds: u64,
    pub pause_seconds: u64,
    pub is_working: bool,
    pub is_on_break: bool,
    pub is_paused: bool,
    pub status_updated_at: DateTime<Utc>,
    pub first_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskSnapshot {
    pub fn from_task(task: &Task, now: DateTime<Utc>) -> Self {
        let timing = task.timing_snapshot(now);
        Self {
            id: task.id,
            title: task.title.clone(),
            week_id: task.week_id,
            day_id: task.day_id,
            hour_number: task.hour_number,
            estimated_hours: task.estimated_hours,
            status: task.status,
            work_seconds: timing.work_seconds,
            break_seconds: timing.break_seconds,
            pause_seconds: timing.pause_seconds,
            is_working: timing.is_working,
            is_on_break: timing.is_on_break,
            is_paused: timing.is_paused,
            status_updated_at: task.status_updated_at,
            first_started_at: task.first_started_at,
            completed_at: task.completed_at,
        }
    }
}

/// Summed live seconds over a set of tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeTotals {
    pub work_seconds: u64,
    pub break_seconds: u64,
    pub pause_seconds: u64,
}

impl AddAssign<TimingSnapshot> for TimeTotals {
    fn add_assign(&mut self, timing: TimingSnapshot) {
        self.work_seconds += timing.work_seconds;
        self.break_seconds += timing.break_seconds;
        self.pause_seconds += timing.pause_seconds;
    }
}

impl AddAssign for TimeTotals {
    fn add_assign(&mut self, other: TimeTotals) {
        self.work_seconds += other.work_seconds;
        self.break_seconds += other.break_seconds;
        self.pause_seconds += other.pause_seconds;
    }
}

/// Sum live timing over `tasks` at `now`
pub fn aggregate<'a, I>(tasks: I, now: DateTime<Utc>) -> TimeTotals
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut totals = TimeTotals::default();
    for task in tasks {
        totals += task.timing_snapshot(now);
    }
    totals
}

/// Read-side view of a phase, week or day
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSnapshot {
    pub container: ContainerRef,
    pub label: String,
    pub status: TaskStatus,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub totals: TimeTotals,
    /// Immediate children: weeks of a phase, days of a week (tasks if it has
    /// none), tasks of a day
    pub child_count: usize,
    pub task_count: usize,
}

impl ContainerSnapshot {
    fn build(
        container: ContainerRef,
        label: String,
        state: &RollupState,
        tasks: &[&Task],
        child_count: usize,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            container,
            label,
            status: state.status,
            actual_start: state.actual_start,
            actual_end: state.actual_end,
            totals: aggregate(tasks.iter().copied(), now),
            child_count,
            task_count: tasks.len(),
        }
    }
}

/// Materialise a container view; pure read, never rolls anything up
pub fn container_snapshot(
    roadmap: &Roadmap,
    container: ContainerRef,
    now: DateTime<Utc>,
) -> Result<ContainerSnapshot> {
    let snapshot = match container {
        ContainerRef::Phase(id) => {
            let phase = roadmap.phase(id)?;
            let tasks = roadmap.phase_tasks(phase);
            ContainerSnapshot::build(
                container,
                phase.name.clone(),
                &phase.state,
                &tasks,
                phase.weeks.len(),
                now,
            )
        }
        ContainerRef::Week(id) => {
            let week = roadmap.week(id)?;
            let tasks = roadmap.week_tasks(week);
            let child_count = if week.days.is_empty() {
                tasks.len()
            } else {
                week.days.len()
            };
            ContainerSnapshot::build(
                container,
                format!("Week {}", week.number),
                &week.state,
                &tasks,
                child_count,
                now,
            )
        }
        ContainerRef::Day(id) => {
            let day = roadmap.day(id)?;
            let tasks = roadmap.day_tasks(day);
            ContainerSnapshot::build(
                container,
                format!("Day {}", day.number),
                &day.state,
                &tasks,
                tasks.len(),
                now,
            )
        }
    };
    Ok(snapshot)
}

/// Format seconds as "HH:MM:SS"
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Get status badge text
pub fn status_badge(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "· PENDING",
        TaskStatus::Working => "⏱ WORKING",
        TaskStatus::OnBreak => "☕ BREAK",
        TaskStatus::Paused => "⏸ PAUSED",
        TaskStatus::Completed => "✓ DONE",
    }
}
