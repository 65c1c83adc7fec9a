use crate::domain::{
    aggregate, status_badge, Phase, Roadmap, RollupState, TaskSnapshot, TaskStatus, Week,
};
use crate::persistence::{atomic_write, report_file};
use crate::report::stats::{
    calculate_completion_stats, calculate_estimation_stats, calculate_global_stats,
    estimate_seconds,
};
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Format seconds as "Xh Ym" or "Xm" for display
fn format_duration(seconds: u64) -> String {
    let total_mins = seconds / 60;
    if total_mins < 60 {
        format!("{}m", total_mins)
    } else {
        let hours = total_mins / 60;
        let mins = total_mins % 60;
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}

/// Format percentage with 1 decimal place
fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

fn percent_of(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        (part as f64 / whole as f64) * 100.0
    } else {
        0.0
    }
}

/// Render an instant in local time or UTC
pub fn format_timestamp(instant: DateTime<Utc>, local_time: bool) -> String {
    if local_time {
        instant.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
    } else {
        instant.format("%Y-%m-%d %H:%M UTC").to_string()
    }
}

fn format_window(state: &RollupState, local_time: bool) -> String {
    match (state.actual_start, state.actual_end) {
        (None, _) => "not started".to_string(),
        (Some(start), None) => format!("since {}", format_timestamp(start, local_time)),
        (Some(start), Some(end)) => format!(
            "{} → {}",
            format_timestamp(start, local_time),
            format_timestamp(end, local_time)
        ),
    }
}

fn checkbox(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "x",
        TaskStatus::Working => "▶",
        TaskStatus::OnBreak | TaskStatus::Paused => "⏸",
        TaskStatus::Pending => " ",
    }
}

/// Phases by planned start (undated last), then id
fn ordered_phases(roadmap: &Roadmap) -> Vec<&Phase> {
    let mut phases: Vec<&Phase> = roadmap.phases().collect();
    phases.sort_by_key(|p| (p.start_date.is_none(), p.start_date, p.id));
    phases
}

fn ordered_weeks<'a>(roadmap: &'a Roadmap, phase: &Phase) -> Vec<&'a Week> {
    let mut weeks: Vec<&Week> = phase
        .weeks
        .iter()
        .filter_map(|id| match roadmap.week(*id) {
            Ok(week) => Some(week),
            Err(err) => {
                warn!(phase = %phase.id, %err, "skipping dangling week in report");
                None
            }
        })
        .collect();
    weeks.sort_by_key(|w| (w.number, w.id));
    weeks
}

fn push_task_line(report: &mut String, task: &TaskSnapshot, indent: &str) {
    let planned = match estimate_seconds(task) {
        Some(estimate) => format!(
            " / {} estimated ({})",
            format_duration(estimate),
            format_percent(percent_of(task.work_seconds, estimate))
        ),
        None => String::new(),
    };
    report.push_str(&format!(
        "{}- [{}] {}: {}{}\n",
        indent,
        checkbox(task.status),
        task.title,
        format_duration(task.work_seconds),
        planned
    ));
}

/// Render the markdown progress report for `roadmap` as seen at `now`
pub fn render_report(roadmap: &Roadmap, now: DateTime<Utc>, local_time: bool) -> String {
    let tasks: Vec<TaskSnapshot> = roadmap
        .tasks()
        .map(|t| TaskSnapshot::from_task(t, now))
        .collect();
    let done: Vec<TaskSnapshot> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .cloned()
        .collect();

    let global = calculate_global_stats(&tasks);
    let estimation = calculate_estimation_stats(&done);
    let completion = calculate_completion_stats(&done);

    let mut report = String::new();

    // Header
    report.push_str(&format!(
        "# Roadmap Progress - {}\n\n",
        format_timestamp(now, local_time)
    ));

    // Summary
    report.push_str("## Summary\n\n");
    report.push_str(&format!(
        "- **Total Tasks:** {} (Open: {}, Completed: {})\n",
        global.total_tasks, global.open_count, global.completed_count
    ));
    report.push_str(&format!(
        "- **Completion Rate:** {}\n",
        format_percent(percent_of(global.completed_count as u64, global.total_tasks as u64))
    ));
    report.push_str(&format!(
        "- **Work Time:** {} / {} estimated ({})\n",
        format_duration(global.totals.work_seconds),
        format_duration(global.total_estimate_seconds),
        format_percent(percent_of(global.totals.work_seconds, global.total_estimate_seconds))
    ));
    report.push_str(&format!(
        "- **Break Time:** {}\n",
        format_duration(global.totals.break_seconds)
    ));
    report.push_str(&format!(
        "- **Pause Time:** {}\n",
        format_duration(global.totals.pause_seconds)
    ));
    report.push_str(&format!("- **Tasks Started:** {}\n\n", global.started_count));

    // Status breakdown
    report.push_str("## Status\n\n");
    for (status, count) in &global.status_counts {
        report.push_str(&format!("- {}: {}\n", status_badge(*status), count));
    }
    report.push('\n');

    // Estimation accuracy
    report.push_str("## Estimation Accuracy\n\n");
    if estimation.estimated_count == 0 {
        report.push_str("- No completed tasks with an estimate yet\n\n");
    } else {
        report.push_str(&format!(
            "- **Tasks Over Estimate:** {} ({} over)\n",
            estimation.over_estimate_count,
            format_duration(estimation.over_estimate_seconds)
        ));
        report.push_str(&format!(
            "- **Tasks Under Estimate:** {} ({} saved)\n",
            estimation.under_estimate_count,
            format_duration(estimation.under_estimate_seconds)
        ));
        report.push_str(&format!("- **Perfect Estimates:** {}\n", estimation.perfect_count));
        report.push_str(&format!(
            "- **Average Accuracy:** {}\n\n",
            format_percent(estimation.avg_accuracy_percent)
        ));
    }

    // Completion
    report.push_str("## Task Completion\n\n");
    report.push_str(&format!(
        "- **Completed:** {} tasks\n",
        completion.completed_count
    ));
    report.push_str(&format!(
        "- **Average Work per Task:** {}\n",
        format_duration(completion.avg_work_seconds)
    ));
    if let Some((title, secs)) = &completion.fastest_task {
        report.push_str(&format!("- **Fastest Task:** \"{}\" ({})\n", title, format_duration(*secs)));
    }
    if let Some((title, secs)) = &completion.longest_task {
        report.push_str(&format!("- **Longest Task:** \"{}\" ({})\n", title, format_duration(*secs)));
    }
    report.push('\n');

    // Phase by phase
    for phase in ordered_phases(roadmap) {
        let phase_totals = aggregate(roadmap.phase_tasks(phase), now);
        report.push_str(&format!("## {}\n\n", phase.name));
        report.push_str(&format!(
            "- **Status:** {} ({})\n",
            status_badge(phase.state.status),
            format_window(&phase.state, local_time)
        ));
        report.push_str(&format!(
            "- **Time:** {} work, {} break, {} paused\n\n",
            format_duration(phase_totals.work_seconds),
            format_duration(phase_totals.break_seconds),
            format_duration(phase_totals.pause_seconds)
        ));

        for week in ordered_weeks(roadmap, phase) {
            let week_tasks = roadmap.week_tasks(week);
            let week_totals = aggregate(week_tasks.iter().copied(), now);
            let focus = week
                .focus
                .as_deref()
                .map(|f| format!(": {}", f))
                .unwrap_or_default();
            report.push_str(&format!("### Week {}{}\n\n", week.number, focus));
            report.push_str(&format!(
                "- **Status:** {} ({})\n",
                status_badge(week.state.status),
                format_window(&week.state, local_time)
            ));
            report.push_str(&format!(
                "- **Work Time:** {}\n",
                format_duration(week_totals.work_seconds)
            ));

            for day_id in &week.days {
                let day = match roadmap.day(*day_id) {
                    Ok(day) => day,
                    Err(err) => {
                        warn!(week = %week.id, %err, "skipping dangling day in report");
                        continue;
                    }
                };
                report.push_str(&format!(
                    "- Day {} {}\n",
                    day.number,
                    status_badge(day.state.status)
                ));
                for task in roadmap.day_tasks(day) {
                    push_task_line(&mut report, &TaskSnapshot::from_task(task, now), "  ");
                }
            }
            for task in week_tasks.iter().filter(|t| t.day_id.is_none()) {
                push_task_line(&mut report, &TaskSnapshot::from_task(task, now), "");
            }
            report.push('\n');
        }
    }

    report
}

/// Write the progress report; defaults to report-YYYY-MM-DD.md under `report_dir`
pub fn generate_report(
    roadmap: &Roadmap,
    now: DateTime<Utc>,
    local_time: bool,
    output_path: Option<PathBuf>,
    report_dir: &Path,
) -> Result<PathBuf> {
    let report = render_report(roadmap, now, local_time);

    let output = match output_path {
        Some(path) => path,
        None => {
            let date = if local_time {
                now.with_timezone(&Local).date_naive()
            } else {
                now.date_naive()
            };
            std::fs::create_dir_all(report_dir)?;
            report_file(report_dir, date)
        }
    };

    atomic_write(&output, &report)?;
    Ok(output)
}
