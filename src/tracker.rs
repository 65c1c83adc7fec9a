//! Roadmap service: every write runs as one transaction over a copy of the
//! arena, and only a successful commit replaces the live roadmap.

use crate::domain::{
    container_snapshot, validate_date_range, ContainerRef, ContainerSnapshot, Day, DayId,
    EntityKind, Phase, PhaseId, Roadmap, RollupState, Task, TaskId, TaskSnapshot, TaskStatus,
    Week, WeekId,
};
use crate::error::{Result, TrackerError};
use crate::persistence::Store;
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;
use tracing::{info, warn};

/// Fields for a new phase
#[derive(Debug, Clone, Default)]
pub struct NewPhase {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Partial phase update; `None` leaves a field alone, `Some(None)` clears it
#[derive(Debug, Clone, Default)]
pub struct PhasePatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone)]
pub struct NewWeek {
    pub phase_id: PhaseId,
    pub number: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub focus: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WeekPatch {
    pub number: Option<u32>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
    pub focus: Option<Option<String>>,
    pub phase_id: Option<PhaseId>,
}

#[derive(Debug, Clone)]
pub struct NewDay {
    pub week_id: WeekId,
    pub number: u32,
    pub scheduled_date: Option<NaiveDate>,
    pub focus: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DayPatch {
    pub number: Option<u32>,
    pub scheduled_date: Option<Option<NaiveDate>>,
    pub focus: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub week_id: Option<WeekId>,
}

/// Fields for a new task. When `day_id` is set the task lands in that day's week.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub week_id: WeekId,
    pub day_id: Option<DayId>,
    pub title: String,
    pub description: Option<String>,
    pub estimated_hours: Option<f64>,
    pub hour_number: Option<u32>,
}

/// Partial task update. A status here goes through the transition engine.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub estimated_hours: Option<Option<f64>>,
    pub hour_number: Option<Option<u32>>,
    pub status: Option<TaskStatus>,
    pub week_id: Option<WeekId>,
    pub day_id: Option<Option<DayId>>,
}

/// Task listing filters; all set filters must match
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub phase_id: Option<PhaseId>,
    pub week_id: Option<WeekId>,
    pub day_id: Option<DayId>,
    pub status: Option<TaskStatus>,
    pub only_open: bool,
}

/// The roadmap plus the store it is committed to
pub struct Tracker<S: Store> {
    store: S,
    roadmap: Roadmap,
}

impl<S: Store> Tracker<S> {
    pub fn open(store: S) -> Result<Self> {
        let roadmap = store.load()?;
        Ok(Self { store, roadmap })
    }

    pub fn roadmap(&self) -> &Roadmap {
        &self.roadmap
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Run `op` against a copy of the roadmap and commit it as one unit.
    /// On any error the live roadmap and the store are left untouched.
    fn transact<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Roadmap) -> Result<T>,
    {
        let mut working = self.roadmap.clone();
        let value = op(&mut working)?;
        self.store.commit(&working)?;
        self.roadmap = working;
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Task status
    // ------------------------------------------------------------------

    /// Transition a task and roll up its day, week and phase
    pub fn set_task_status(
        &mut self,
        id: TaskId,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<TaskSnapshot> {
        let (from, snapshot) = self.transact(|roadmap| {
            let task = roadmap.task_mut(id)?;
            let from = task.status;
            task.transition(status, now);
            roadmap.refresh_task_ancestors(id)?;
            Ok((from, TaskSnapshot::from_task(roadmap.task(id)?, now)))
        })?;
        info!(task = %id, %from, to = %status, "task status updated");
        Ok(snapshot)
    }

    pub fn get_task_snapshot(&self, id: TaskId, now: DateTime<Utc>) -> Result<TaskSnapshot> {
        Ok(TaskSnapshot::from_task(self.roadmap.task(id)?, now))
    }

    pub fn get_container_snapshot(
        &self,
        container: ContainerRef,
        now: DateTime<Utc>,
    ) -> Result<ContainerSnapshot> {
        container_snapshot(&self.roadmap, container, now)
    }

    /// Park every task left Working by an earlier run; returns how many moved
    pub fn reset_stale_tasks(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let count = self.transact(|roadmap| {
            let ids = roadmap.working_task_ids();
            for id in &ids {
                roadmap.task_mut(*id)?.suspend_stale_work(now);
                roadmap.refresh_task_ancestors(*id)?;
            }
            Ok(ids.len())
        })?;
        if count > 0 {
            warn!(count, "reset stale working tasks to paused");
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    pub fn create_phase(&mut self, new: NewPhase) -> Result<PhaseId> {
        validate_date_range(EntityKind::Phase, new.start_date, new.end_date)?;
        let id = self.transact(|roadmap| {
            let id = PhaseId(roadmap.allocate_id());
            roadmap.insert_phase(Phase {
                id,
                name: new.name,
                description: new.description,
                start_date: new.start_date,
                end_date: new.end_date,
                state: RollupState::default(),
                weeks: Vec::new(),
            });
            Ok(id)
        })?;
        info!(phase = %id, "created phase");
        Ok(id)
    }

    pub fn update_phase(&mut self, id: PhaseId, patch: PhasePatch) -> Result<()> {
        self.transact(|roadmap| {
            let phase = roadmap.phase_mut(id)?;
            if let Some(name) = patch.name {
                phase.name = name;
            }
            if let Some(description) = patch.description {
                phase.description = description;
            }
            if let Some(start_date) = patch.start_date {
                phase.start_date = start_date;
            }
            if let Some(end_date) = patch.end_date {
                phase.end_date = end_date;
            }
            validate_date_range(EntityKind::Phase, phase.start_date, phase.end_date)
        })
    }

    /// Delete a phase with all its weeks, days and tasks
    pub fn delete_phase(&mut self, id: PhaseId) -> Result<()> {
        self.transact(|roadmap| roadmap.remove_phase(id).map(|_| ()))?;
        info!(phase = %id, "deleted phase");
        Ok(())
    }

    pub fn list_phases(&self, now: DateTime<Utc>) -> Result<Vec<ContainerSnapshot>> {
        let mut phases: Vec<&Phase> = self.roadmap.phases().collect();
        phases.sort_by(|a, b| {
            cmp_nulls_last(a.start_date, b.start_date).then(a.id.cmp(&b.id))
        });
        phases
            .into_iter()
            .map(|p| self.get_container_snapshot(ContainerRef::Phase(p.id), now))
            .collect()
    }

    // ------------------------------------------------------------------
    // Weeks
    // ------------------------------------------------------------------

    pub fn create_week(&mut self, new: NewWeek) -> Result<WeekId> {
        validate_date_range(EntityKind::Week, new.start_date, new.end_date)?;
        let id = self.transact(|roadmap| {
            let id = WeekId(roadmap.allocate_id());
            roadmap.insert_week(Week {
                id,
                number: new.number,
                phase_id: new.phase_id,
                start_date: new.start_date,
                end_date: new.end_date,
                focus: new.focus,
                state: RollupState::default(),
                days: Vec::new(),
                tasks: Vec::new(),
            })?;
            roadmap.refresh_phase(new.phase_id)?;
            Ok(id)
        })?;
        info!(week = %id, phase = %new.phase_id, "created week");
        Ok(id)
    }

    pub fn update_week(&mut self, id: WeekId, patch: WeekPatch) -> Result<()> {
        self.transact(|roadmap| {
            let old_phase = roadmap.week(id)?.phase_id;
            if let Some(phase_id) = patch.phase_id {
                roadmap.relink_week(id, phase_id)?;
            }
            let week = roadmap.week_mut(id)?;
            if let Some(number) = patch.number {
                week.number = number;
            }
            if let Some(start_date) = patch.start_date {
                week.start_date = start_date;
            }
            if let Some(end_date) = patch.end_date {
                week.end_date = end_date;
            }
            if let Some(focus) = patch.focus {
                week.focus = focus;
            }
            validate_date_range(EntityKind::Week, week.start_date, week.end_date)?;
            let new_phase = week.phase_id;
            if new_phase != old_phase {
                roadmap.refresh_phase(old_phase)?;
                roadmap.refresh_phase(new_phase)?;
            }
            Ok(())
        })
    }

    /// Delete a week with its days and tasks, then roll up its phase
    pub fn delete_week(&mut self, id: WeekId) -> Result<()> {
        self.transact(|roadmap| {
            let week = roadmap.remove_week(id)?;
            roadmap.refresh_phase(week.phase_id)
        })?;
        info!(week = %id, "deleted week");
        Ok(())
    }

    pub fn list_weeks(
        &self,
        phase_id: Option<PhaseId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ContainerSnapshot>> {
        let mut weeks: Vec<&Week> = self
            .roadmap
            .weeks()
            .filter(|w| phase_id.map_or(true, |p| w.phase_id == p))
            .collect();
        weeks.sort_by_key(|w| (w.number, w.id));
        weeks
            .into_iter()
            .map(|w| self.get_container_snapshot(ContainerRef::Week(w.id), now))
            .collect()
    }

    // ------------------------------------------------------------------
    // Days
    // ------------------------------------------------------------------

    pub fn create_day(&mut self, new: NewDay) -> Result<DayId> {
        let id = self.transact(|roadmap| {
            let id = DayId(roadmap.allocate_id());
            roadmap.insert_day(Day {
                id,
                number: new.number,
                week_id: new.week_id,
                scheduled_date: new.scheduled_date,
                focus: new.focus,
                notes: new.notes,
                state: RollupState::default(),
                tasks: Vec::new(),
            })?;
            // Once a week has days it rolls up from them, not from tasks
            // placed directly on it, so a first empty day can reset it to Pending.
            roadmap.refresh_week_chain(new.week_id)?;
            Ok(id)
        })?;
        info!(day = %id, week = %new.week_id, "created day");
        Ok(id)
    }

    pub fn update_day(&mut self, id: DayId, patch: DayPatch) -> Result<()> {
        self.transact(|roadmap| {
            let old_week = roadmap.day(id)?.week_id;
            if let Some(week_id) = patch.week_id {
                roadmap.relink_day(id, week_id)?;
            }
            let day = roadmap.day_mut(id)?;
            if let Some(number) = patch.number {
                day.number = number;
            }
            if let Some(scheduled_date) = patch.scheduled_date {
                day.scheduled_date = scheduled_date;
            }
            if let Some(focus) = patch.focus {
                day.focus = focus;
            }
            if let Some(notes) = patch.notes {
                day.notes = notes;
            }
            let new_week = day.week_id;
            if new_week != old_week {
                roadmap.refresh_week_chain(old_week)?;
                roadmap.refresh_week_chain(new_week)?;
            }
            Ok(())
        })
    }

    /// Set a day's status by hand; only allowed while the day has no tasks
    pub fn override_day_status(
        &mut self,
        id: DayId,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<ContainerSnapshot> {
        self.transact(|roadmap| {
            let day = roadmap.day_mut(id)?;
            if !day.tasks.is_empty() {
                return Err(TrackerError::DayHasTasks(id));
            }
            day.state.apply_manual(status, now);
            let week_id = day.week_id;
            roadmap.refresh_week_chain(week_id)?;
            container_snapshot(roadmap, ContainerRef::Day(id), now)
        })
    }

    /// Delete a day with its tasks, then roll up its week and phase
    pub fn delete_day(&mut self, id: DayId) -> Result<()> {
        self.transact(|roadmap| {
            let day = roadmap.remove_day(id)?;
            roadmap.refresh_week_chain(day.week_id)
        })?;
        info!(day = %id, "deleted day");
        Ok(())
    }

    pub fn list_days(
        &self,
        week_id: Option<WeekId>,
        phase_id: Option<PhaseId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ContainerSnapshot>> {
        let mut days: Vec<(u32, &Day)> = Vec::new();
        for day in self.roadmap.days() {
            let week = self.roadmap.week(day.week_id)?;
            if week_id.map_or(false, |w| w != week.id) || phase_id.map_or(false, |p| p != week.phase_id) {
                continue;
            }
            days.push((week.number, day));
        }
        days.sort_by_key(|(week_number, day)| (*week_number, day.number, day.id));
        days.into_iter()
            .map(|(_, d)| self.get_container_snapshot(ContainerRef::Day(d.id), now))
            .collect()
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    pub fn create_task(&mut self, new: NewTask, now: DateTime<Utc>) -> Result<TaskId> {
        let id = self.transact(|roadmap| {
            let week_id = match new.day_id {
                Some(day_id) => roadmap.day(day_id)?.week_id,
                None => new.week_id,
            };
            let id = TaskId(roadmap.allocate_id());
            let mut task = Task::new(id, new.title, week_id, new.day_id, now);
            task.description = new.description;
            task.estimated_hours = new.estimated_hours;
            task.hour_number = new.hour_number;
            roadmap.insert_task(task)?;
            roadmap.refresh_task_ancestors(id)?;
            Ok(id)
        })?;
        info!(task = %id, "created task");
        Ok(id)
    }

    /// Edit a task. Moving it or changing its status rolls up both the old
    /// and the new ancestors.
    pub fn update_task(
        &mut self,
        id: TaskId,
        patch: TaskPatch,
        now: DateTime<Utc>,
    ) -> Result<TaskSnapshot> {
        self.transact(|roadmap| {
            let task = roadmap.task(id)?;
            let (old_week, old_day) = (task.week_id, task.day_id);

            let mut week_id = patch.week_id.unwrap_or(old_week);
            let mut day_id = patch.day_id.unwrap_or(old_day);
            if let Some(day) = day_id {
                let day_week = roadmap.day(day)?.week_id;
                if patch.day_id.is_some() {
                    week_id = day_week;
                } else if day_week != week_id {
                    day_id = None;
                }
            }
            let moved = (week_id, day_id) != (old_week, old_day);
            if moved {
                roadmap.relink_task(id, week_id, day_id)?;
            }

            let task = roadmap.task_mut(id)?;
            if let Some(title) = patch.title {
                task.title = title;
            }
            if let Some(description) = patch.description {
                task.description = description;
            }
            if let Some(estimated_hours) = patch.estimated_hours {
                task.estimated_hours = estimated_hours;
            }
            if let Some(hour_number) = patch.hour_number {
                task.hour_number = hour_number;
            }
            if let Some(status) = patch.status {
                task.transition(status, now);
            }

            if moved {
                refresh_after_detach(roadmap, old_week, old_day)?;
            }
            if moved || patch.status.is_some() {
                roadmap.refresh_task_ancestors(id)?;
            }
            Ok(TaskSnapshot::from_task(roadmap.task(id)?, now))
        })
    }

    /// Delete a task and roll up the containers it leaves behind
    pub fn delete_task(&mut self, id: TaskId) -> Result<()> {
        self.transact(|roadmap| {
            let task = roadmap.remove_task(id)?;
            refresh_after_detach(roadmap, task.week_id, task.day_id)
        })?;
        info!(task = %id, "deleted task");
        Ok(())
    }

    /// Tasks ordered by week number, day number, hour number, then title
    pub fn list_tasks(&self, filter: &TaskFilter, now: DateTime<Utc>) -> Result<Vec<TaskSnapshot>> {
        let mut rows: Vec<(u32, Option<u32>, &Task)> = Vec::new();
        for task in self.roadmap.tasks() {
            let week = self.roadmap.week(task.week_id)?;
            let matches = filter.phase_id.map_or(true, |p| p == week.phase_id)
                && filter.week_id.map_or(true, |w| w == task.week_id)
                && filter.day_id.map_or(true, |d| Some(d) == task.day_id)
                && filter.status.map_or(true, |s| s == task.status)
                && (!filter.only_open || task.status.is_open());
            if !matches {
                continue;
            }
            let day_number = match task.day_id {
                Some(day_id) => Some(self.roadmap.day(day_id)?.number),
                None => None,
            };
            rows.push((week.number, day_number, task));
        }
        rows.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(cmp_nulls_last(a.1, b.1))
                .then(cmp_nulls_last(a.2.hour_number, b.2.hour_number))
                .then_with(|| a.2.title.cmp(&b.2.title))
                .then(a.2.id.cmp(&b.2.id))
        });
        Ok(rows
            .into_iter()
            .map(|(_, _, task)| TaskSnapshot::from_task(task, now))
            .collect())
    }
}

/// Roll up the containers a task just left
fn refresh_after_detach(roadmap: &mut Roadmap, week_id: WeekId, day_id: Option<DayId>) -> Result<()> {
    if let Some(day_id) = day_id {
        roadmap.reset_empty_day(day_id)?;
        roadmap.refresh_day(day_id)?;
    }
    roadmap.refresh_week_chain(week_id)
}

fn cmp_nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn at(mins: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap() + Duration::minutes(mins)
    }

    fn tracker() -> Tracker<MemoryStore> {
        Tracker::open(MemoryStore::new()).unwrap()
    }

    fn phase(tracker: &mut Tracker<MemoryStore>) -> PhaseId {
        tracker
            .create_phase(NewPhase {
                name: "Phase 1: Foundations".to_string(),
                ..Default::default()
            })
            .unwrap()
    }

    fn week(tracker: &mut Tracker<MemoryStore>, phase_id: PhaseId, number: u32) -> WeekId {
        tracker
            .create_week(NewWeek {
                phase_id,
                number,
                start_date: None,
                end_date: None,
                focus: None,
            })
            .unwrap()
    }

    fn day(tracker: &mut Tracker<MemoryStore>, week_id: WeekId, number: u32) -> DayId {
        tracker
            .create_day(NewDay {
                week_id,
                number,
                scheduled_date: None,
                focus: None,
                notes: None,
            })
            .unwrap()
    }

    fn task(
        tracker: &mut Tracker<MemoryStore>,
        week_id: WeekId,
        day_id: Option<DayId>,
        title: &str,
    ) -> TaskId {
        tracker
            .create_task(
                NewTask {
                    week_id,
                    day_id,
                    title: title.to_string(),
                    description: None,
                    estimated_hours: Some(1.0),
                    hour_number: None,
                },
                at(0),
            )
            .unwrap()
    }

    fn status_of(tracker: &Tracker<MemoryStore>, container: ContainerRef) -> TaskStatus {
        tracker.get_container_snapshot(container, at(0)).unwrap().status
    }

    #[test]
    fn test_end_to_end_roll_up() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w = week(&mut tracker, p, 1);
        let d = day(&mut tracker, w, 1);
        let t1 = task(&mut tracker, w, Some(d), "Blink LED");
        let t2 = task(&mut tracker, w, Some(d), "Read button");
        let all = [ContainerRef::Day(d), ContainerRef::Week(w), ContainerRef::Phase(p)];

        for c in all {
            assert_eq!(status_of(&tracker, c), TaskStatus::Pending);
        }

        tracker.set_task_status(t1, TaskStatus::Working, at(0)).unwrap();
        for c in all {
            let snapshot = tracker.get_container_snapshot(c, at(0)).unwrap();
            assert_eq!(snapshot.status, TaskStatus::Working);
            assert_eq!(snapshot.actual_start, Some(at(0)));
        }

        tracker.set_task_status(t1, TaskStatus::Completed, at(60)).unwrap();
        for c in all {
            let snapshot = tracker.get_container_snapshot(c, at(60)).unwrap();
            assert_eq!(snapshot.status, TaskStatus::Paused);
            assert!(snapshot.actual_end.is_none());
        }

        tracker.set_task_status(t2, TaskStatus::Working, at(70)).unwrap();
        tracker.set_task_status(t2, TaskStatus::Completed, at(95)).unwrap();
        for c in all {
            let snapshot = tracker.get_container_snapshot(c, at(100)).unwrap();
            assert_eq!(snapshot.status, TaskStatus::Completed);
            assert_eq!(snapshot.actual_start, Some(at(0)));
            assert_eq!(snapshot.actual_end, Some(at(95)));
            assert_eq!(snapshot.totals.work_seconds, 85 * 60);
            assert_eq!(snapshot.task_count, 2);
        }
    }

    #[test]
    fn test_mixed_statuses_before_working() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w = week(&mut tracker, p, 1);
        let d = day(&mut tracker, w, 1);
        let t1 = task(&mut tracker, w, Some(d), "a");
        task(&mut tracker, w, Some(d), "b");

        tracker.set_task_status(t1, TaskStatus::Working, at(0)).unwrap();
        tracker.set_task_status(t1, TaskStatus::OnBreak, at(10)).unwrap();
        assert_eq!(status_of(&tracker, ContainerRef::Day(d)), TaskStatus::Paused);

        tracker.set_task_status(t1, TaskStatus::Completed, at(20)).unwrap();
        // {Completed, Pending} is started but unfinished
        assert_eq!(status_of(&tracker, ContainerRef::Day(d)), TaskStatus::Paused);
        assert_eq!(status_of(&tracker, ContainerRef::Phase(p)), TaskStatus::Paused);
    }

    #[test]
    fn test_week_roll_up_paths_are_equivalent() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);

        let with_day = week(&mut tracker, p, 1);
        let d = day(&mut tracker, with_day, 1);
        let a1 = task(&mut tracker, with_day, Some(d), "A");
        let b1 = task(&mut tracker, with_day, Some(d), "B");

        let direct = week(&mut tracker, p, 2);
        let a2 = task(&mut tracker, direct, None, "A");
        let b2 = task(&mut tracker, direct, None, "B");

        for (a, b) in [(a1, b1), (a2, b2)] {
            tracker.set_task_status(a, TaskStatus::Working, at(5)).unwrap();
            tracker.set_task_status(b, TaskStatus::Working, at(0)).unwrap();
            tracker.set_task_status(b, TaskStatus::Completed, at(30)).unwrap();
        }

        let via_day = tracker.get_container_snapshot(ContainerRef::Week(with_day), at(40)).unwrap();
        let via_tasks = tracker.get_container_snapshot(ContainerRef::Week(direct), at(40)).unwrap();
        assert_eq!(via_day.status, TaskStatus::Working);
        assert_eq!(via_day.status, via_tasks.status);
        assert_eq!(via_day.actual_start, via_tasks.actual_start);
        assert_eq!(via_day.actual_end, via_tasks.actual_end);
        assert_eq!(via_day.totals, via_tasks.totals);
        assert_eq!(via_day.child_count, 1);
        assert_eq!(via_tasks.child_count, 2);
    }

    #[test]
    fn test_set_status_unknown_task() {
        let mut tracker = tracker();
        let err = tracker
            .set_task_status(TaskId(404), TaskStatus::Working, at(0))
            .unwrap_err();
        assert!(matches!(err, TrackerError::NotFound { kind: EntityKind::Task, id: 404 }));
        assert_eq!(err.to_string(), "Task 404 not found");
    }

    #[test]
    fn test_failed_commit_leaves_state_unchanged() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w = week(&mut tracker, p, 1);
        let t = task(&mut tracker, w, None, "SPI driver");
        let before = tracker.roadmap().clone();

        tracker.store_mut().fail_commits = true;
        let err = tracker.set_task_status(t, TaskStatus::Working, at(1)).unwrap_err();
        assert!(matches!(err, TrackerError::Storage(_)));

        assert_eq!(tracker.roadmap(), &before);
        assert_eq!(tracker.store().committed(), &before);
        assert_eq!(
            tracker.get_task_snapshot(t, at(5)).unwrap().status,
            TaskStatus::Pending
        );
        assert_eq!(status_of(&tracker, ContainerRef::Week(w)), TaskStatus::Pending);
    }

    #[test]
    fn test_snapshot_reads_do_not_mutate() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w = week(&mut tracker, p, 1);
        let t = task(&mut tracker, w, None, "I2C");
        tracker.set_task_status(t, TaskStatus::Working, at(0)).unwrap();
        let commits = tracker.store().commit_count;
        let before = tracker.roadmap().clone();

        let early = tracker.get_task_snapshot(t, at(10)).unwrap();
        let later = tracker.get_task_snapshot(t, at(20)).unwrap();
        tracker.get_container_snapshot(ContainerRef::Phase(p), at(20)).unwrap();

        assert!(later.work_seconds >= early.work_seconds);
        assert_eq!(later.work_seconds, 20 * 60);
        assert_eq!(tracker.roadmap(), &before);
        assert_eq!(tracker.store().commit_count, commits);
    }

    #[test]
    fn test_date_ranges_are_validated() {
        let mut tracker = tracker();
        let jan = NaiveDate::from_ymd_opt(2025, 1, 1);
        let jun = NaiveDate::from_ymd_opt(2025, 6, 1);

        let err = tracker
            .create_phase(NewPhase {
                name: "Invalid".to_string(),
                start_date: jun,
                end_date: jan,
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidDateRange { kind: EntityKind::Phase, .. }));
        assert_eq!(tracker.roadmap().phases().count(), 0);

        let p = phase(&mut tracker);
        let err = tracker
            .create_week(NewWeek {
                phase_id: p,
                number: 1,
                start_date: jun,
                end_date: jan,
                focus: None,
            })
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidDateRange { kind: EntityKind::Week, .. }));

        tracker
            .update_phase(p, PhasePatch { end_date: Some(jan), ..Default::default() })
            .unwrap();
        let err = tracker
            .update_phase(p, PhasePatch { start_date: Some(jun), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidDateRange { .. }));
        assert!(tracker.roadmap().phase(p).unwrap().start_date.is_none());
    }

    #[test]
    fn test_update_week_rejects_inverted_range() {
        let mut tracker = tracker();
        let p1 = phase(&mut tracker);
        let p2 = phase(&mut tracker);
        let jan = NaiveDate::from_ymd_opt(2025, 1, 1);
        let jun = NaiveDate::from_ymd_opt(2025, 6, 1);
        let w = tracker
            .create_week(NewWeek {
                phase_id: p1,
                number: 1,
                start_date: jan,
                end_date: jun,
                focus: None,
            })
            .unwrap();

        let err = tracker
            .update_week(
                w,
                WeekPatch {
                    start_date: Some(jun),
                    end_date: Some(jan),
                    phase_id: Some(p2),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidDateRange { kind: EntityKind::Week, .. }));

        let week = tracker.roadmap().week(w).unwrap();
        assert_eq!(week.start_date, jan);
        assert_eq!(week.end_date, jun);
        assert_eq!(week.phase_id, p1);
        assert_eq!(tracker.roadmap().phase(p1).unwrap().weeks, vec![w]);
        assert!(tracker.roadmap().phase(p2).unwrap().weeks.is_empty());
    }

    #[test]
    fn test_first_empty_day_switches_week_to_day_roll_up() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w = week(&mut tracker, p, 1);
        let t = task(&mut tracker, w, None, "direct");
        tracker.set_task_status(t, TaskStatus::Working, at(0)).unwrap();
        assert_eq!(status_of(&tracker, ContainerRef::Week(w)), TaskStatus::Working);

        day(&mut tracker, w, 1);
        for c in [ContainerRef::Week(w), ContainerRef::Phase(p)] {
            let snapshot = tracker.get_container_snapshot(c, at(10)).unwrap();
            assert_eq!(snapshot.status, TaskStatus::Pending);
            assert!(snapshot.actual_start.is_none());
            // time is still aggregated from every task in the week
            assert_eq!(snapshot.totals.work_seconds, 10 * 60);
        }
        assert_eq!(tracker.get_task_snapshot(t, at(10)).unwrap().status, TaskStatus::Working);
    }

    #[test]
    fn test_update_phase_patch_semantics() {
        let mut tracker = tracker();
        let p = tracker
            .create_phase(NewPhase {
                name: "Old".to_string(),
                description: Some("keep me".to_string()),
                ..Default::default()
            })
            .unwrap();

        tracker
            .update_phase(p, PhasePatch { name: Some("New".to_string()), ..Default::default() })
            .unwrap();
        let phase = tracker.roadmap().phase(p).unwrap();
        assert_eq!(phase.name, "New");
        assert_eq!(phase.description.as_deref(), Some("keep me"));

        tracker
            .update_phase(p, PhasePatch { description: Some(None), ..Default::default() })
            .unwrap();
        assert!(tracker.roadmap().phase(p).unwrap().description.is_none());
    }

    #[test]
    fn test_delete_task_rolls_up_parents() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w = week(&mut tracker, p, 1);
        let d = day(&mut tracker, w, 1);
        let done = task(&mut tracker, w, Some(d), "done");
        let busy = task(&mut tracker, w, Some(d), "busy");
        tracker.set_task_status(done, TaskStatus::Working, at(0)).unwrap();
        tracker.set_task_status(done, TaskStatus::Completed, at(30)).unwrap();
        tracker.set_task_status(busy, TaskStatus::Working, at(31)).unwrap();
        assert_eq!(status_of(&tracker, ContainerRef::Phase(p)), TaskStatus::Working);

        tracker.delete_task(busy).unwrap();
        let day = tracker.get_container_snapshot(ContainerRef::Day(d), at(40)).unwrap();
        assert_eq!(day.status, TaskStatus::Completed);
        assert_eq!(day.actual_end, Some(at(30)));
        assert_eq!(status_of(&tracker, ContainerRef::Phase(p)), TaskStatus::Completed);

        tracker.delete_task(done).unwrap();
        assert_eq!(status_of(&tracker, ContainerRef::Day(d)), TaskStatus::Pending);
        assert_eq!(status_of(&tracker, ContainerRef::Phase(p)), TaskStatus::Pending);
    }

    #[test]
    fn test_adding_pending_task_reopens_completed_week() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w = week(&mut tracker, p, 1);
        let t = task(&mut tracker, w, None, "first");
        tracker.set_task_status(t, TaskStatus::Working, at(0)).unwrap();
        tracker.set_task_status(t, TaskStatus::Completed, at(10)).unwrap();
        assert_eq!(status_of(&tracker, ContainerRef::Week(w)), TaskStatus::Completed);

        task(&mut tracker, w, None, "second");
        let week = tracker.get_container_snapshot(ContainerRef::Week(w), at(20)).unwrap();
        assert_eq!(week.status, TaskStatus::Paused);
        assert!(week.actual_end.is_none());
        assert_eq!(week.actual_start, Some(at(0)));
    }

    #[test]
    fn test_override_day_status() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w = week(&mut tracker, p, 1);
        let rest_day = day(&mut tracker, w, 1);

        let snapshot = tracker
            .override_day_status(rest_day, TaskStatus::Completed, at(15))
            .unwrap();
        assert_eq!(snapshot.status, TaskStatus::Completed);
        assert_eq!(snapshot.actual_start, Some(at(15)));
        assert_eq!(snapshot.actual_end, Some(at(15)));
        assert_eq!(status_of(&tracker, ContainerRef::Week(w)), TaskStatus::Completed);
        assert_eq!(status_of(&tracker, ContainerRef::Phase(p)), TaskStatus::Completed);

        let busy_day = day(&mut tracker, w, 2);
        task(&mut tracker, w, Some(busy_day), "hour 1");
        let err = tracker
            .override_day_status(busy_day, TaskStatus::Completed, at(20))
            .unwrap_err();
        assert!(matches!(err, TrackerError::DayHasTasks(id) if id == busy_day));
        // the manual state survives roll-ups of its siblings
        assert_eq!(status_of(&tracker, ContainerRef::Day(rest_day)), TaskStatus::Completed);
        assert_eq!(status_of(&tracker, ContainerRef::Week(w)), TaskStatus::Paused);
    }

    #[test]
    fn test_reset_stale_tasks() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w = week(&mut tracker, p, 1);
        let running = task(&mut tracker, w, None, "running");
        let idle = task(&mut tracker, w, None, "idle");
        tracker.set_task_status(running, TaskStatus::Working, at(0)).unwrap();
        tracker.set_task_status(running, TaskStatus::Paused, at(10)).unwrap();
        tracker.set_task_status(running, TaskStatus::Working, at(20)).unwrap();

        assert_eq!(tracker.reset_stale_tasks(at(600)).unwrap(), 1);
        let snapshot = tracker.get_task_snapshot(running, at(660)).unwrap();
        assert_eq!(snapshot.status, TaskStatus::Paused);
        assert_eq!(snapshot.work_seconds, 10 * 60);
        assert_eq!(snapshot.pause_seconds, 10 * 60 + 60 * 60);
        assert!(snapshot.is_paused);
        assert_eq!(tracker.get_task_snapshot(idle, at(660)).unwrap().status, TaskStatus::Pending);
        assert_eq!(status_of(&tracker, ContainerRef::Week(w)), TaskStatus::Paused);

        assert_eq!(tracker.reset_stale_tasks(at(700)).unwrap(), 0);
    }

    #[test]
    fn test_update_task_moves_between_days() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w1 = week(&mut tracker, p, 1);
        let w2 = week(&mut tracker, p, 2);
        let d1 = day(&mut tracker, w1, 1);
        let d2 = day(&mut tracker, w2, 1);
        let t = task(&mut tracker, w1, Some(d1), "ADC");
        tracker.set_task_status(t, TaskStatus::Working, at(0)).unwrap();

        let snapshot = tracker
            .update_task(t, TaskPatch { day_id: Some(Some(d2)), ..Default::default() }, at(5))
            .unwrap();
        assert_eq!(snapshot.week_id, w2);
        assert_eq!(snapshot.day_id, Some(d2));
        assert_eq!(status_of(&tracker, ContainerRef::Day(d1)), TaskStatus::Pending);
        assert_eq!(status_of(&tracker, ContainerRef::Week(w1)), TaskStatus::Pending);
        assert_eq!(status_of(&tracker, ContainerRef::Day(d2)), TaskStatus::Working);
        assert_eq!(status_of(&tracker, ContainerRef::Week(w2)), TaskStatus::Working);

        // changing only the week drops the day that belongs elsewhere
        let snapshot = tracker
            .update_task(t, TaskPatch { week_id: Some(w1), ..Default::default() }, at(6))
            .unwrap();
        assert_eq!(snapshot.week_id, w1);
        assert_eq!(snapshot.day_id, None);
        assert!(tracker.roadmap().day(d2).unwrap().tasks.is_empty());
    }

    #[test]
    fn test_update_task_status_and_fields() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w = week(&mut tracker, p, 1);
        let t = task(&mut tracker, w, None, "draft");

        let snapshot = tracker
            .update_task(
                t,
                TaskPatch {
                    title: Some("final".to_string()),
                    hour_number: Some(Some(3)),
                    status: Some(TaskStatus::Working),
                    ..Default::default()
                },
                at(2),
            )
            .unwrap();
        assert_eq!(snapshot.title, "final");
        assert_eq!(snapshot.hour_number, Some(3));
        assert_eq!(snapshot.first_started_at, Some(at(2)));
        assert_eq!(status_of(&tracker, ContainerRef::Phase(p)), TaskStatus::Working);
    }

    #[test]
    fn test_list_tasks_filters_and_order() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w2 = week(&mut tracker, p, 2);
        let w1 = week(&mut tracker, p, 1);
        let d = day(&mut tracker, w1, 1);
        task(&mut tracker, w2, None, "later week");
        task(&mut tracker, w1, None, "no day");
        let first = task(&mut tracker, w1, Some(d), "b on day");
        task(&mut tracker, w1, Some(d), "a on day");
        tracker.set_task_status(first, TaskStatus::Working, at(0)).unwrap();
        tracker.set_task_status(first, TaskStatus::Completed, at(1)).unwrap();

        let titles = |rows: Vec<TaskSnapshot>| rows.into_iter().map(|r| r.title).collect::<Vec<_>>();

        let all = tracker.list_tasks(&TaskFilter::default(), at(2)).unwrap();
        assert_eq!(titles(all), vec!["a on day", "b on day", "no day", "later week"]);

        let open = tracker
            .list_tasks(&TaskFilter { only_open: true, week_id: Some(w1), ..Default::default() }, at(2))
            .unwrap();
        assert_eq!(titles(open), vec!["a on day", "no day"]);

        let done = tracker
            .list_tasks(&TaskFilter { status: Some(TaskStatus::Completed), ..Default::default() }, at(2))
            .unwrap();
        assert_eq!(titles(done), vec!["b on day"]);
    }

    #[test]
    fn test_list_containers() {
        let mut tracker = tracker();
        let late = tracker
            .create_phase(NewPhase {
                name: "Later".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 6, 1),
                ..Default::default()
            })
            .unwrap();
        let early = tracker
            .create_phase(NewPhase {
                name: "Earlier".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 1, 1),
                ..Default::default()
            })
            .unwrap();
        let w = week(&mut tracker, early, 1);
        week(&mut tracker, late, 1);
        day(&mut tracker, w, 2);
        day(&mut tracker, w, 1);

        let phases = tracker.list_phases(at(0)).unwrap();
        let names: Vec<&str> = phases.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(names, vec!["Earlier", "Later"]);

        assert_eq!(tracker.list_weeks(Some(early), at(0)).unwrap().len(), 1);
        assert_eq!(tracker.list_weeks(None, at(0)).unwrap().len(), 2);

        let days = tracker.list_days(Some(w), None, at(0)).unwrap();
        let labels: Vec<&str> = days.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["Day 1", "Day 2"]);
        assert!(tracker.list_days(None, Some(late), at(0)).unwrap().is_empty());
    }

    #[test]
    fn test_delete_phase_cascades() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w = week(&mut tracker, p, 1);
        let d = day(&mut tracker, w, 1);
        let t = task(&mut tracker, w, Some(d), "gone");

        tracker.delete_phase(p).unwrap();
        assert!(tracker.get_task_snapshot(t, at(0)).is_err());
        assert!(tracker.get_container_snapshot(ContainerRef::Day(d), at(0)).is_err());
        assert!(tracker.get_container_snapshot(ContainerRef::Week(w), at(0)).is_err());
        assert!(matches!(
            tracker.delete_phase(p).unwrap_err(),
            TrackerError::NotFound { kind: EntityKind::Phase, .. }
        ));
    }

    #[test]
    fn test_move_week_between_phases() {
        let mut tracker = tracker();
        let p1 = phase(&mut tracker);
        let p2 = phase(&mut tracker);
        let w = week(&mut tracker, p1, 1);
        let t = task(&mut tracker, w, None, "PWM");
        tracker.set_task_status(t, TaskStatus::Working, at(0)).unwrap();

        tracker
            .update_week(w, WeekPatch { phase_id: Some(p2), ..Default::default() })
            .unwrap();
        assert_eq!(status_of(&tracker, ContainerRef::Phase(p1)), TaskStatus::Pending);
        assert_eq!(status_of(&tracker, ContainerRef::Phase(p2)), TaskStatus::Working);
        assert_eq!(tracker.roadmap().phase(p2).unwrap().weeks, vec![w]);
    }

    #[test]
    fn test_move_day_carries_its_tasks() {
        let mut tracker = tracker();
        let p = phase(&mut tracker);
        let w1 = week(&mut tracker, p, 1);
        let w2 = week(&mut tracker, p, 2);
        let d = day(&mut tracker, w1, 1);
        let t = task(&mut tracker, w1, Some(d), "CAN bus");
        tracker.set_task_status(t, TaskStatus::Working, at(0)).unwrap();

        tracker
            .update_day(d, DayPatch { week_id: Some(w2), ..Default::default() })
            .unwrap();
        assert_eq!(tracker.roadmap().task(t).unwrap().week_id, w2);
        assert!(tracker.roadmap().week(w1).unwrap().tasks.is_empty());
        assert_eq!(status_of(&tracker, ContainerRef::Week(w1)), TaskStatus::Pending);
        assert_eq!(status_of(&tracker, ContainerRef::Week(w2)), TaskStatus::Working);
    }
}
