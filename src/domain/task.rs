use super::enums::TaskStatus;
use super::ids::{DayId, TaskId, WeekId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whole seconds from `start` to `end`, clamped at zero so clock skew never shrinks a total
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    end.signed_duration_since(start).num_seconds().max(0) as u64
}

/// The three kinds of timed segment a task can have open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Work,
    Break,
    Pause,
}

impl Segment {
    /// Segment kept open while a task holds `status`, if any
    pub fn for_status(status: TaskStatus) -> Option<Self> {
        match status {
            TaskStatus::Working => Some(Segment::Work),
            TaskStatus::OnBreak => Some(Segment::Break),
            TaskStatus::Paused => Some(Segment::Pause),
            TaskStatus::Pending | TaskStatus::Completed => None,
        }
    }
}

/// Persisted timing counters: closed segment totals plus the open-segment markers.
///
/// At most one marker is set at a time, and only while the owning task holds
/// the matching status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeTracking {
    pub total_work_seconds: u64,
    pub total_break_seconds: u64,
    pub total_pause_seconds: u64,
    pub last_work_started_at: Option<DateTime<Utc>>,
    pub last_break_started_at: Option<DateTime<Utc>>,
    pub last_pause_started_at: Option<DateTime<Utc>>,
}

impl TimeTracking {
    pub fn marker(&self, segment: Segment) -> Option<DateTime<Utc>> {
        match segment {
            Segment::Work => self.last_work_started_at,
            Segment::Break => self.last_break_started_at,
            Segment::Pause => self.last_pause_started_at,
        }
    }

    pub fn total(&self, segment: Segment) -> u64 {
        match segment {
            Segment::Work => self.total_work_seconds,
            Segment::Break => self.total_break_seconds,
            Segment::Pause => self.total_pause_seconds,
        }
    }

    fn total_mut(&mut self, segment: Segment) -> &mut u64 {
        match segment {
            Segment::Work => &mut self.total_work_seconds,
            Segment::Break => &mut self.total_break_seconds,
            Segment::Pause => &mut self.total_pause_seconds,
        }
    }

    /// Open `segment` at `now`, clearing the other two markers
    pub fn open(&mut self, segment: Segment, now: DateTime<Utc>) {
        self.clear_markers();
        match segment {
            Segment::Work => self.last_work_started_at = Some(now),
            Segment::Break => self.last_break_started_at = Some(now),
            Segment::Pause => self.last_pause_started_at = Some(now),
        }
    }

    pub fn clear_markers(&mut self) {
        self.last_work_started_at = None;
        self.last_break_started_at = None;
        self.last_pause_started_at = None;
    }

    /// Fold the segment held open by `status` into its total and clear its marker
    pub fn finalize(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        let Some(segment) = Segment::for_status(status) else {
            return;
        };
        if let Some(started) = self.marker(segment) {
            *self.total_mut(segment) += seconds_between(started, now);
            match segment {
                Segment::Work => self.last_work_started_at = None,
                Segment::Break => self.last_break_started_at = None,
                Segment::Pause => self.last_pause_started_at = None,
            }
        }
    }

    /// Live seconds for `segment`, including the open span when `status` holds it
    fn live(&self, segment: Segment, status: TaskStatus, now: DateTime<Utc>) -> (u64, bool) {
        let total = self.total(segment);
        if Segment::for_status(status) != Some(segment) {
            return (total, false);
        }
        match self.marker(segment) {
            Some(started) => (total + seconds_between(started, now), true),
            None => (total, false),
        }
    }

    fn set_markers(&self) -> usize {
        [
            self.last_work_started_at,
            self.last_break_started_at,
            self.last_pause_started_at,
        ]
        .iter()
        .filter(|m| m.is_some())
        .count()
    }
}

/// Live timing of a task at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingSnapshot {
    pub work_seconds: u64,
    pub break_seconds: u64,
    pub pause_seconds: u64,
    pub is_working: bool,
    pub is_on_break: bool,
    pub is_paused: bool,
}

/// An hour-level unit of work; the only entity carrying its own timing state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub hour_number: Option<u32>,
    pub week_id: WeekId,
    #[serde(default)]
    pub day_id: Option<DayId>,
    #[serde(default)]
    pub status: TaskStatus,
    pub status_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub first_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub track: TimeTracking,
}

impl Task {
    pub fn new(
        id: TaskId,
        title: String,
        week_id: WeekId,
        day_id: Option<DayId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            description: None,
            estimated_hours: None,
            hour_number: None,
            week_id,
            day_id,
            status: TaskStatus::Pending,
            status_updated_at: now,
            first_started_at: None,
            completed_at: None,
            track: TimeTracking::default(),
        }
    }

    /// Live work/break/pause seconds at `now`; never mutates the task
    pub fn timing_snapshot(&self, now: DateTime<Utc>) -> TimingSnapshot {
        let (work_seconds, is_working) = self.track.live(Segment::Work, self.status, now);
        let (break_seconds, is_on_break) = self.track.live(Segment::Break, self.status, now);
        let (pause_seconds, is_paused) = self.track.live(Segment::Pause, self.status, now);
        TimingSnapshot {
            work_seconds,
            break_seconds,
            pause_seconds,
            is_working,
            is_on_break,
            is_paused,
        }
    }

    /// Move the task to `new_status` at `now`.
    ///
    /// Every status is reachable from every other. The open segment is closed
    /// exactly once, before anything else changes, and the status itself is
    /// written last.
    pub fn transition(&mut self, new_status: TaskStatus, now: DateTime<Utc>) {
        if self.status == new_status {
            // Repairs a Working task whose marker was lost
            if new_status == TaskStatus::Working && self.track.last_work_started_at.is_none() {
                self.track.open(Segment::Work, now);
                self.first_started_at.get_or_insert(now);
            }
            self.status_updated_at = now;
            return;
        }

        self.track.finalize(self.status, now);
        if self.status == TaskStatus::Completed {
            self.completed_at = None;
        }

        match new_status {
            TaskStatus::Pending => {
                self.first_started_at = None;
                self.completed_at = None;
                self.track = TimeTracking::default();
            }
            TaskStatus::Working => {
                self.track.open(Segment::Work, now);
                self.first_started_at.get_or_insert(now);
                self.completed_at = None;
            }
            TaskStatus::OnBreak => self.track.open(Segment::Break, now),
            TaskStatus::Paused => self.track.open(Segment::Pause, now),
            TaskStatus::Completed => {
                self.completed_at = Some(now);
                self.track.clear_markers();
            }
        }

        self.status = new_status;
        self.status_updated_at = now;
        debug_assert!(self.markers_consistent());
    }

    /// Park a task left Working by a previous run.
    ///
    /// The open work span is dropped rather than credited since the moment the
    /// timer really stopped is unknown. A pause segment opens at `now`.
    pub fn suspend_stale_work(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Working {
            return false;
        }
        self.track.open(Segment::Pause, now);
        self.status = TaskStatus::Paused;
        self.status_updated_at = now;
        true
    }

    /// Bring a task read from an older data file back under the marker rule.
    ///
    /// An active status with no open segment (legacy `in_progress`, `blocked`)
    /// carries no timing to recover, so the task goes back to Pending. Stray
    /// markers on any other task are dropped. Returns whether anything changed.
    pub fn normalize_loaded(&mut self) -> bool {
        if self.markers_consistent() {
            return false;
        }
        match Segment::for_status(self.status) {
            Some(segment) => match self.track.marker(segment) {
                Some(started) => self.track.open(segment, started),
                None => {
                    self.status = TaskStatus::Pending;
                    self.first_started_at = None;
                    self.completed_at = None;
                    self.track = TimeTracking::default();
                }
            },
            None => self.track.clear_markers(),
        }
        true
    }

    /// At most one marker, and only the one matching the current status
    pub fn markers_consistent(&self) -> bool {
        match Segment::for_status(self.status) {
            Some(segment) => {
                self.track.set_markers() == 1 && self.track.marker(segment).is_some()
            }
            None => self.track.set_markers() == 0,
        }
    }
}
