use crate::domain::{TaskSnapshot, TaskStatus, TimeTotals};
use std::collections::BTreeMap;

/// Statistics across every task in the roadmap
#[derive(Debug)]
pub struct GlobalStats {
    pub total_tasks: usize,
    pub open_count: usize,
    pub completed_count: usize,
    pub status_counts: BTreeMap<TaskStatus, usize>,
    pub totals: TimeTotals,
    pub total_estimate_seconds: u64,
    pub started_count: usize,
}

/// Estimation accuracy over completed tasks that carry an estimate
#[derive(Debug)]
pub struct EstimationStats {
    pub estimated_count: usize,
    pub over_estimate_count: usize,
    pub over_estimate_seconds: u64,
    pub under_estimate_count: usize,
    pub under_estimate_seconds: u64,
    pub perfect_count: usize,
    pub avg_accuracy_percent: f64,
}

/// Task completion statistics
#[derive(Debug)]
pub struct CompletionStats {
    pub completed_count: usize,
    pub avg_work_seconds: u64,
    pub fastest_task: Option<(String, u64)>,
    pub longest_task: Option<(String, u64)>,
}

/// Planned hours as whole seconds
pub fn estimate_seconds(task: &TaskSnapshot) -> Option<u64> {
    task.estimated_hours
        .filter(|hours| *hours > 0.0)
        .map(|hours| (hours * 3600.0).round() as u64)
}

/// Accuracy in percent, 100 meaning the estimate was exact
fn accuracy_percent(actual: u64, estimate: u64) -> f64 {
    let ratio = actual as f64 / estimate as f64;
    if ratio > 1.0 {
        100.0 / ratio
    } else {
        ratio * 100.0
    }
}

pub fn calculate_global_stats(tasks: &[TaskSnapshot]) -> GlobalStats {
    let mut status_counts: BTreeMap<TaskStatus, usize> =
        TaskStatus::all().iter().map(|s| (*s, 0)).collect();
    let mut totals = TimeTotals::default();
    let mut total_estimate_seconds = 0;
    let mut started_count = 0;

    for task in tasks {
        *status_counts.entry(task.status).or_insert(0) += 1;
        totals.work_seconds += task.work_seconds;
        totals.break_seconds += task.break_seconds;
        totals.pause_seconds += task.pause_seconds;
        total_estimate_seconds += estimate_seconds(task).unwrap_or(0);
        if task.first_started_at.is_some() {
            started_count += 1;
        }
    }

    let completed_count = status_counts
        .get(&TaskStatus::Completed)
        .copied()
        .unwrap_or(0);

    GlobalStats {
        total_tasks: tasks.len(),
        open_count: tasks.len() - completed_count,
        completed_count,
        status_counts,
        totals,
        total_estimate_seconds,
        started_count,
    }
}

pub fn calculate_estimation_stats(done: &[TaskSnapshot]) -> EstimationStats {
    let mut stats = EstimationStats {
        estimated_count: 0,
        over_estimate_count: 0,
        over_estimate_seconds: 0,
        under_estimate_count: 0,
        under_estimate_seconds: 0,
        perfect_count: 0,
        avg_accuracy_percent: 0.0,
    };
    let mut accuracy_sum = 0.0;

    for task in done {
        let Some(estimate) = estimate_seconds(task) else {
            continue;
        };
        let actual = task.work_seconds;
        stats.estimated_count += 1;

        if actual > estimate {
            stats.over_estimate_count += 1;
            stats.over_estimate_seconds += actual - estimate;
        } else if actual < estimate {
            stats.under_estimate_count += 1;
            stats.under_estimate_seconds += estimate - actual;
        } else {
            stats.perfect_count += 1;
        }
        accuracy_sum += accuracy_percent(actual, estimate);
    }

    if stats.estimated_count > 0 {
        stats.avg_accuracy_percent = accuracy_sum / stats.estimated_count as f64;
    }
    stats
}

pub fn calculate_completion_stats(done: &[TaskSnapshot]) -> CompletionStats {
    let completed_count = done.len();
    let total_work: u64 = done.iter().map(|t| t.work_seconds).sum();

    // First task wins ties
    let mut fastest: Option<&TaskSnapshot> = None;
    let mut longest: Option<&TaskSnapshot> = None;
    for task in done {
        if fastest.map_or(true, |f| task.work_seconds < f.work_seconds) {
            fastest = Some(task);
        }
        if longest.map_or(true, |l| task.work_seconds > l.work_seconds) {
            longest = Some(task);
        }
    }

    CompletionStats {
        completed_count,
        avg_work_seconds: if completed_count > 0 {
            total_work / completed_count as u64
        } else {
            0
        },
        fastest_task: fastest.map(|t| (t.title.clone(), t.work_seconds)),
        longest_task: longest.map(|t| (t.title.clone(), t.work_seconds)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskId, WeekId};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn at(mins: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap() + Duration::minutes(mins)
    }

    fn worked(id: u64, title: &str, estimate: Option<f64>, minutes: i64, done: bool) -> TaskSnapshot {
        let mut task = Task::new(TaskId(id), title.to_string(), WeekId(1), None, at(0));
        task.estimated_hours = estimate;
        if minutes > 0 {
            task.transition(TaskStatus::Working, at(0));
            let next = if done { TaskStatus::Completed } else { TaskStatus::Paused };
            task.transition(next, at(minutes));
        }
        TaskSnapshot::from_task(&task, at(minutes))
    }

    #[test]
    fn test_global_stats() {
        let tasks = vec![
            worked(1, "a", Some(1.0), 60, true),
            worked(2, "b", Some(0.5), 20, false),
            worked(3, "c", None, 0, false),
        ];
        let stats = calculate_global_stats(&tasks);
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.completed_count, 1);
        assert_eq!(stats.open_count, 2);
        assert_eq!(stats.started_count, 2);
        assert_eq!(stats.status_counts[&TaskStatus::Paused], 1);
        assert_eq!(stats.status_counts[&TaskStatus::Pending], 1);
        assert_eq!(stats.status_counts[&TaskStatus::Working], 0);
        assert_eq!(stats.totals.work_seconds, 80 * 60);
        assert_eq!(stats.total_estimate_seconds, 90 * 60);
    }

    #[test]
    fn test_estimation_stats() {
        let done = vec![
            worked(1, "exact", Some(1.0), 60, true),
            worked(2, "over", Some(1.0), 120, true),
            worked(3, "under", Some(2.0), 60, true),
            worked(4, "unplanned", None, 30, true),
        ];
        let stats = calculate_estimation_stats(&done);
        assert_eq!(stats.estimated_count, 3);
        assert_eq!(stats.perfect_count, 1);
        assert_eq!(stats.over_estimate_count, 1);
        assert_eq!(stats.over_estimate_seconds, 3600);
        assert_eq!(stats.under_estimate_count, 1);
        assert_eq!(stats.under_estimate_seconds, 3600);
        assert!((stats.avg_accuracy_percent - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_completion_stats() {
        let done = vec![
            worked(1, "quick", None, 10, true),
            worked(2, "slow", None, 50, true),
        ];
        let stats = calculate_completion_stats(&done);
        assert_eq!(stats.completed_count, 2);
        assert_eq!(stats.avg_work_seconds, 30 * 60);
        assert_eq!(stats.fastest_task, Some(("quick".to_string(), 600)));
        assert_eq!(stats.longest_task, Some(("slow".to_string(), 3000)));

        let empty = calculate_completion_stats(&[]);
        assert_eq!(empty.avg_work_seconds, 0);
        assert!(empty.fastest_task.is_none());
    }
}
