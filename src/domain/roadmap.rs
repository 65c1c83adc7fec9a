use super::container::{Day, Phase, RollupState, Week};
use super::enums::{EntityKind, TaskStatus};
use super::ids::{DayId, PhaseId, TaskId, WeekId};
use super::rollup::{roll_up, roll_up_with_fallback};
use super::task::Task;
use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The whole entity graph, arena style.
///
/// Containers keep ordered child id lists and children keep their parent ids;
/// nothing holds a reference into another entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roadmap {
    next_id: u64,
    phases: BTreeMap<PhaseId, Phase>,
    weeks: BTreeMap<WeekId, Week>,
    days: BTreeMap<DayId, Day>,
    tasks: BTreeMap<TaskId, Task>,
}

impl Roadmap {
    /// Allocate a fresh id; ids are unique across all entity kinds
    pub fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn phase(&self, id: PhaseId) -> Result<&Phase> {
        self.phases
            .get(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Phase, id))
    }

    pub fn phase_mut(&mut self, id: PhaseId) -> Result<&mut Phase> {
        self.phases
            .get_mut(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Phase, id))
    }

    pub fn week(&self, id: WeekId) -> Result<&Week> {
        self.weeks
            .get(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Week, id))
    }

    pub fn week_mut(&mut self, id: WeekId) -> Result<&mut Week> {
        self.weeks
            .get_mut(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Week, id))
    }

    pub fn day(&self, id: DayId) -> Result<&Day> {
        self.days
            .get(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Day, id))
    }

    pub fn day_mut(&mut self, id: DayId) -> Result<&mut Day> {
        self.days
            .get_mut(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Day, id))
    }

    pub fn task(&self, id: TaskId) -> Result<&Task> {
        self.tasks
            .get(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Task, id))
    }

    pub fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks
            .get_mut(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Task, id))
    }

    pub fn phases(&self) -> impl Iterator<Item = &Phase> {
        self.phases.values()
    }

    pub fn weeks(&self) -> impl Iterator<Item = &Week> {
        self.weeks.values()
    }

    pub fn days(&self) -> impl Iterator<Item = &Day> {
        self.days.values()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn insert_phase(&mut self, phase: Phase) {
        self.phases.insert(phase.id, phase);
    }

    /// Insert a week and link it under its phase
    pub fn insert_week(&mut self, week: Week) -> Result<()> {
        self.phase_mut(week.phase_id)?.weeks.push(week.id);
        self.weeks.insert(week.id, week);
        Ok(())
    }

    /// Insert a day and link it under its week
    pub fn insert_day(&mut self, day: Day) -> Result<()> {
        self.week_mut(day.week_id)?.days.push(day.id);
        self.days.insert(day.id, day);
        Ok(())
    }

    /// Insert a task and link it under its week and, if set, its day
    pub fn insert_task(&mut self, task: Task) -> Result<()> {
        self.week(task.week_id)?;
        if let Some(day_id) = task.day_id {
            self.day_mut(day_id)?.tasks.push(task.id);
        }
        self.week_mut(task.week_id)?.tasks.push(task.id);
        self.tasks.insert(task.id, task);
        Ok(())
    }

    /// Unlink and remove a task; its former parents are left for the caller to roll up
    pub fn remove_task(&mut self, id: TaskId) -> Result<Task> {
        let task = self
            .tasks
            .remove(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Task, id))?;
        if let Some(day) = task.day_id.and_then(|d| self.days.get_mut(&d)) {
            day.tasks.retain(|t| *t != id);
        }
        if let Some(week) = self.weeks.get_mut(&task.week_id) {
            week.tasks.retain(|t| *t != id);
        }
        Ok(task)
    }

    /// Remove a day together with its tasks
    pub fn remove_day(&mut self, id: DayId) -> Result<Day> {
        let task_ids = self.day(id)?.tasks.clone();
        for task_id in task_ids {
            self.remove_task(task_id)?;
        }
        let day = self
            .days
            .remove(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Day, id))?;
        if let Some(week) = self.weeks.get_mut(&day.week_id) {
            week.days.retain(|d| *d != id);
        }
        Ok(day)
    }

    /// Remove a week together with its days and tasks
    pub fn remove_week(&mut self, id: WeekId) -> Result<Week> {
        let day_ids = self.week(id)?.days.clone();
        for day_id in day_ids {
            self.remove_day(day_id)?;
        }
        let task_ids = self.week(id)?.tasks.clone();
        for task_id in task_ids {
            self.remove_task(task_id)?;
        }
        let week = self
            .weeks
            .remove(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Week, id))?;
        if let Some(phase) = self.phases.get_mut(&week.phase_id) {
            phase.weeks.retain(|w| *w != id);
        }
        Ok(week)
    }

    /// Remove a phase together with everything under it
    pub fn remove_phase(&mut self, id: PhaseId) -> Result<Phase> {
        let week_ids = self.phase(id)?.weeks.clone();
        for week_id in week_ids {
            self.remove_week(week_id)?;
        }
        self.phases
            .remove(&id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Phase, id))
    }

    /// Re-link a task under a new week and day
    pub fn relink_task(&mut self, id: TaskId, week_id: WeekId, day_id: Option<DayId>) -> Result<()> {
        self.week(week_id)?;
        if let Some(day_id) = day_id {
            self.day(day_id)?;
        }
        let mut task = self.remove_task(id)?;
        task.week_id = week_id;
        task.day_id = day_id;
        self.insert_task(task)
    }

    /// Re-link a day (and the tasks on it) under another week
    pub fn relink_day(&mut self, id: DayId, week_id: WeekId) -> Result<()> {
        self.week(week_id)?;
        let old_week_id = self.day(id)?.week_id;
        if old_week_id == week_id {
            return Ok(());
        }
        let task_ids = self.day(id)?.tasks.clone();
        for task_id in task_ids {
            self.relink_task(task_id, week_id, Some(id))?;
        }
        if let Some(old_week) = self.weeks.get_mut(&old_week_id) {
            old_week.days.retain(|d| *d != id);
        }
        self.week_mut(week_id)?.days.push(id);
        self.day_mut(id)?.week_id = week_id;
        Ok(())
    }

    /// Re-link a week under another phase
    pub fn relink_week(&mut self, id: WeekId, phase_id: PhaseId) -> Result<()> {
        self.phase(phase_id)?;
        let old_phase_id = self.week(id)?.phase_id;
        if old_phase_id == phase_id {
            return Ok(());
        }
        if let Some(old_phase) = self.phases.get_mut(&old_phase_id) {
            old_phase.weeks.retain(|w| *w != id);
        }
        self.phase_mut(phase_id)?.weeks.push(id);
        self.week_mut(id)?.phase_id = phase_id;
        Ok(())
    }

    /// Tasks scheduled on a day
    pub fn day_tasks(&self, day: &Day) -> Vec<&Task> {
        day.tasks
            .iter()
            .filter_map(|id| resolve(&self.tasks, *id, EntityKind::Task))
            .collect()
    }

    /// Every task in a week, with or without a day
    pub fn week_tasks(&self, week: &Week) -> Vec<&Task> {
        week.tasks
            .iter()
            .filter_map(|id| resolve(&self.tasks, *id, EntityKind::Task))
            .collect()
    }

    /// Every task in every week of a phase
    pub fn phase_tasks(&self, phase: &Phase) -> Vec<&Task> {
        phase
            .weeks
            .iter()
            .filter_map(|id| resolve(&self.weeks, *id, EntityKind::Week))
            .flat_map(|week| self.week_tasks(week))
            .collect()
    }

    /// Repair tasks loaded from older data and roll up their ancestors.
    /// Returns how many tasks were changed.
    pub fn normalize_loaded_tasks(&mut self) -> Result<usize> {
        let repaired: Vec<TaskId> = self
            .tasks
            .values_mut()
            .filter_map(|task| task.normalize_loaded().then_some(task.id))
            .collect();
        for id in &repaired {
            warn!(task = %id, "task status had no open timer; reset to pending");
            self.refresh_task_ancestors(*id)?;
        }
        Ok(repaired.len())
    }

    /// Recompute a day from its tasks. A day without tasks keeps whatever
    /// state was set on it manually.
    pub fn refresh_day(&mut self, id: DayId) -> Result<()> {
        let day = self.day(id)?;
        let tasks = self.day_tasks(day);
        if tasks.is_empty() {
            return Ok(());
        }
        let next = roll_up(&day.state, &tasks);
        debug!(day = %id, status = %next.status, "rolled up day");
        self.day_mut(id)?.state = next;
        Ok(())
    }

    /// Recompute a week from its days, or from its tasks when it has no days
    pub fn refresh_week(&mut self, id: WeekId) -> Result<()> {
        let week = self.week(id)?;
        let tasks = self.week_tasks(week);
        let next = if week.days.is_empty() {
            roll_up(&week.state, &tasks)
        } else {
            let days: Vec<&RollupState> = week
                .days
                .iter()
                .filter_map(|d| resolve(&self.days, *d, EntityKind::Day))
                .map(|d| &d.state)
                .collect();
            roll_up_with_fallback(&week.state, &days, &tasks)
        };
        debug!(week = %id, status = %next.status, "rolled up week");
        self.week_mut(id)?.state = next;
        Ok(())
    }

    /// Recompute a phase from its weeks, or from its tasks when it has no weeks
    pub fn refresh_phase(&mut self, id: PhaseId) -> Result<()> {
        let phase = self.phase(id)?;
        let tasks = self.phase_tasks(phase);
        let next = if phase.weeks.is_empty() {
            roll_up(&phase.state, &tasks)
        } else {
            let weeks: Vec<&RollupState> = phase
                .weeks
                .iter()
                .filter_map(|w| resolve(&self.weeks, *w, EntityKind::Week))
                .map(|w| &w.state)
                .collect();
            roll_up_with_fallback(&phase.state, &weeks, &tasks)
        };
        debug!(phase = %id, status = %next.status, "rolled up phase");
        self.phase_mut(id)?.state = next;
        Ok(())
    }

    /// Roll up a week and the phase that owns it
    pub fn refresh_week_chain(&mut self, week_id: WeekId) -> Result<()> {
        self.refresh_week(week_id)?;
        let phase_id = self.week(week_id)?.phase_id;
        self.refresh_phase(phase_id)
    }

    /// Roll up everything above a task: day, then week, then phase
    pub fn refresh_task_ancestors(&mut self, task_id: TaskId) -> Result<()> {
        let task = self.task(task_id)?;
        let (week_id, day_id) = (task.week_id, task.day_id);
        if let Some(day_id) = day_id {
            self.refresh_day(day_id)?;
        }
        self.refresh_week_chain(week_id)
    }

    /// Put a day that lost its last task back to Pending
    pub fn reset_empty_day(&mut self, id: DayId) -> Result<()> {
        let day = self.day_mut(id)?;
        if day.tasks.is_empty() {
            day.state = RollupState::default();
        }
        Ok(())
    }

    /// Working tasks, for crash recovery
    pub fn working_task_ids(&self) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Working)
            .map(|t| t.id)
            .collect()
    }
}

/// Look up a child id held by a container; a dangling id is logged and skipped
fn resolve<K, V>(map: &BTreeMap<K, V>, id: K, kind: EntityKind) -> Option<&V>
where
    K: Ord + Copy + Into<u64>,
{
    let found = map.get(&id);
    if found.is_none() {
        let raw: u64 = id.into();
        warn!(%kind, id = raw, "dangling child id skipped");
    }
    found
}
