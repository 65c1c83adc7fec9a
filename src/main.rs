mod clock;
mod domain;
mod error;
mod logging;
mod persistence;
mod report;
mod tracker;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use clock::{Clock, FixedClock, SystemClock};
use domain::{
    format_duration, status_badge, ContainerRef, ContainerSnapshot, DayId, PhaseId,
    TaskId, TaskSnapshot, TaskStatus, WeekId,
};
use persistence::{
    config_file, ensure_data_dir, init_local_dir, load_config, roadmap_file, save_config, Config,
    JsonStore,
};
use report::format_timestamp;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracker::{
    DayPatch, NewDay, NewPhase, NewTask, NewWeek, PhasePatch, TaskFilter, TaskPatch, Tracker,
    WeekPatch,
};

#[derive(Parser)]
#[command(name = "roadmap")]
#[command(about = "Track a learning roadmap: phases, weeks, days and hour-level tasks with time accounting", long_about = None)]
struct Cli {
    /// Pretend the current time is this RFC 3339 instant
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a local .roadmap directory in the current directory
    Init,
    /// Manage phases
    #[command(subcommand)]
    Phase(PhaseCommand),
    /// Manage weeks
    #[command(subcommand)]
    Week(WeekCommand),
    /// Manage days
    #[command(subcommand)]
    Day(DayCommand),
    /// Manage tasks and their timers
    #[command(subcommand)]
    Task(TaskCommand),
    /// Park tasks left running by an earlier session
    ResetStale,
    /// Generate a markdown progress report
    Report {
        /// Output file path. Defaults to <report dir>/report-YYYY-MM-DD.md
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PhaseCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    List,
    Edit {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        description: DescriptionArgs,
        #[command(flatten)]
        dates: DateRangeArgs,
    },
    Delete { id: u64 },
}

#[derive(Subcommand)]
enum WeekCommand {
    Add {
        #[arg(long)]
        phase: u64,
        #[arg(long)]
        number: u32,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        focus: Option<String>,
    },
    List {
        #[arg(long)]
        phase: Option<u64>,
    },
    Edit {
        id: u64,
        #[arg(long)]
        number: Option<u32>,
        /// Move the week under another phase
        #[arg(long)]
        phase: Option<u64>,
        #[arg(long)]
        focus: Option<String>,
        #[arg(long, conflicts_with = "focus")]
        clear_focus: bool,
        #[command(flatten)]
        dates: DateRangeArgs,
    },
    Delete { id: u64 },
}

#[derive(Subcommand)]
enum DayCommand {
    Add {
        #[arg(long)]
        week: u64,
        #[arg(long)]
        number: u32,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        focus: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    List {
        #[arg(long)]
        week: Option<u64>,
        #[arg(long)]
        phase: Option<u64>,
    },
    Edit {
        id: u64,
        #[arg(long)]
        number: Option<u32>,
        /// Move the day (and its tasks) under another week
        #[arg(long)]
        week: Option<u64>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, conflicts_with = "date")]
        clear_date: bool,
        #[arg(long)]
        focus: Option<String>,
        #[arg(long, conflicts_with = "focus")]
        clear_focus: bool,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, conflicts_with = "notes")]
        clear_notes: bool,
    },
    /// Set the status of a day that has no tasks
    Status { id: u64, status: TaskStatus },
    Delete { id: u64 },
}

#[derive(Subcommand)]
enum TaskCommand {
    Add {
        #[arg(long)]
        week: u64,
        /// Schedule on a day; the task joins that day's week
        #[arg(long)]
        day: Option<u64>,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Estimated hours
        #[arg(long)]
        estimate: Option<f64>,
        #[arg(long)]
        hour: Option<u32>,
    },
    List {
        #[arg(long)]
        phase: Option<u64>,
        #[arg(long)]
        week: Option<u64>,
        #[arg(long)]
        day: Option<u64>,
        #[arg(long)]
        status: Option<TaskStatus>,
        /// Hide completed tasks
        #[arg(long)]
        open: bool,
    },
    Show { id: u64 },
    /// Change a task's status (pending, working, break, paused, completed)
    Status { id: u64, status: TaskStatus },
    Edit {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        description: DescriptionArgs,
        #[arg(long)]
        estimate: Option<f64>,
        #[arg(long, conflicts_with = "estimate")]
        clear_estimate: bool,
        #[arg(long)]
        hour: Option<u32>,
        #[arg(long, conflicts_with = "hour")]
        clear_hour: bool,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        week: Option<u64>,
        #[arg(long)]
        day: Option<u64>,
        /// Unschedule from its day, keeping the week
        #[arg(long, conflicts_with = "day")]
        no_day: bool,
    },
    Delete { id: u64 },
}

#[derive(Args)]
struct DateRangeArgs {
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long, conflicts_with = "start")]
    clear_start: bool,
    #[arg(long)]
    end: Option<NaiveDate>,
    #[arg(long, conflicts_with = "end")]
    clear_end: bool,
}

/// `--description` / `--clear-description` pair
#[derive(Args)]
struct DescriptionArgs {
    #[arg(long)]
    description: Option<String>,
    #[arg(long, conflicts_with = "description")]
    clear_description: bool,
}

/// Turn a value/clear flag pair into a patch field
fn patch_field<T>(value: Option<T>, clear: bool) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        logging::init_logging(&Config::default().log_filter);
        let roadmap_dir = init_local_dir()?;
        save_config(config_file(&roadmap_dir), &Config::default())?;
        println!("Initialized roadmap directory: {}", roadmap_dir.display());
        println!();
        println!("Roadmap will now use this local directory for storage.");
        println!("Run 'roadmap phase add --name <NAME>' to get started.");
        return Ok(());
    }

    let data_dir = ensure_data_dir()?;
    let config = load_config(config_file(&data_dir))?;
    logging::init_logging(&config.log_filter);
    debug!(dir = %data_dir.display(), "using data directory");

    let clock: Box<dyn Clock> = match cli.now {
        Some(instant) => Box::new(FixedClock(instant)),
        None => Box::new(SystemClock),
    };
    let now = clock.now();

    let mut tracker = Tracker::open(JsonStore::new(roadmap_file(&data_dir)))?;
    info!(path = %tracker.store().path().display(), "roadmap loaded");

    match cli.command {
        Commands::Init => Ok(()),
        Commands::Phase(cmd) => run_phase(&mut tracker, cmd, now, &config),
        Commands::Week(cmd) => run_week(&mut tracker, cmd, now, &config),
        Commands::Day(cmd) => run_day(&mut tracker, cmd, now, &config),
        Commands::Task(cmd) => run_task(&mut tracker, cmd, now, &config),
        Commands::ResetStale => {
            let count = tracker.reset_stale_tasks(now)?;
            println!("Reset {} stale task(s) to paused", count);
            Ok(())
        }
        Commands::Report { output } => {
            let report_dir = config.report_dir.clone().unwrap_or_else(|| data_dir.clone());
            run_report(&tracker, now, &config, output, &report_dir)
        }
    }
}

type Service = Tracker<JsonStore>;

fn run_phase(tracker: &mut Service, cmd: PhaseCommand, now: DateTime<Utc>, config: &Config) -> Result<()> {
    match cmd {
        PhaseCommand::Add { name, description, start, end } => {
            let id = tracker.create_phase(NewPhase {
                name,
                description,
                start_date: start,
                end_date: end,
            })?;
            println!("Created phase {}", id);
        }
        PhaseCommand::List => {
            for snapshot in tracker.list_phases(now)? {
                print_container(&snapshot, config);
            }
        }
        PhaseCommand::Edit { id, name, description, dates } => {
            tracker.update_phase(
                PhaseId(id),
                PhasePatch {
                    name,
                    description: patch_field(description.description, description.clear_description),
                    start_date: patch_field(dates.start, dates.clear_start),
                    end_date: patch_field(dates.end, dates.clear_end),
                },
            )?;
            print_container(&tracker.get_container_snapshot(ContainerRef::Phase(PhaseId(id)), now)?, config);
        }
        PhaseCommand::Delete { id } => {
            tracker.delete_phase(PhaseId(id))?;
            println!("Deleted phase {}", id);
        }
    }
    Ok(())
}

fn run_week(tracker: &mut Service, cmd: WeekCommand, now: DateTime<Utc>, config: &Config) -> Result<()> {
    match cmd {
        WeekCommand::Add { phase, number, start, end, focus } => {
            let id = tracker.create_week(NewWeek {
                phase_id: PhaseId(phase),
                number,
                start_date: start,
                end_date: end,
                focus,
            })?;
            println!("Created week {}", id);
        }
        WeekCommand::List { phase } => {
            for snapshot in tracker.list_weeks(phase.map(PhaseId), now)? {
                print_container(&snapshot, config);
            }
        }
        WeekCommand::Edit { id, number, phase, focus, clear_focus, dates } => {
            tracker.update_week(
                WeekId(id),
                WeekPatch {
                    number,
                    start_date: patch_field(dates.start, dates.clear_start),
                    end_date: patch_field(dates.end, dates.clear_end),
                    focus: patch_field(focus, clear_focus),
                    phase_id: phase.map(PhaseId),
                },
            )?;
            print_container(&tracker.get_container_snapshot(ContainerRef::Week(WeekId(id)), now)?, config);
        }
        WeekCommand::Delete { id } => {
            tracker.delete_week(WeekId(id))?;
            println!("Deleted week {}", id);
        }
    }
    Ok(())
}

fn run_day(tracker: &mut Service, cmd: DayCommand, now: DateTime<Utc>, config: &Config) -> Result<()> {
    match cmd {
        DayCommand::Add { week, number, date, focus, notes } => {
            let id = tracker.create_day(NewDay {
                week_id: WeekId(week),
                number,
                scheduled_date: date,
                focus,
                notes,
            })?;
            println!("Created day {}", id);
        }
        DayCommand::List { week, phase } => {
            for snapshot in tracker.list_days(week.map(WeekId), phase.map(PhaseId), now)? {
                print_container(&snapshot, config);
            }
        }
        DayCommand::Edit {
            id,
            number,
            week,
            date,
            clear_date,
            focus,
            clear_focus,
            notes,
            clear_notes,
        } => {
            tracker.update_day(
                DayId(id),
                DayPatch {
                    number,
                    scheduled_date: patch_field(date, clear_date),
                    focus: patch_field(focus, clear_focus),
                    notes: patch_field(notes, clear_notes),
                    week_id: week.map(WeekId),
                },
            )?;
            print_container(&tracker.get_container_snapshot(ContainerRef::Day(DayId(id)), now)?, config);
        }
        DayCommand::Status { id, status } => {
            let snapshot = tracker.override_day_status(DayId(id), status, now)?;
            print_container(&snapshot, config);
        }
        DayCommand::Delete { id } => {
            tracker.delete_day(DayId(id))?;
            println!("Deleted day {}", id);
        }
    }
    Ok(())
}

fn run_task(tracker: &mut Service, cmd: TaskCommand, now: DateTime<Utc>, config: &Config) -> Result<()> {
    match cmd {
        TaskCommand::Add { week, day, title, description, estimate, hour } => {
            let id = tracker.create_task(
                NewTask {
                    week_id: WeekId(week),
                    day_id: day.map(DayId),
                    title,
                    description,
                    estimated_hours: estimate,
                    hour_number: hour,
                },
                now,
            )?;
            println!("Created task {}", id);
        }
        TaskCommand::List { phase, week, day, status, open } => {
            let filter = TaskFilter {
                phase_id: phase.map(PhaseId),
                week_id: week.map(WeekId),
                day_id: day.map(DayId),
                status,
                only_open: open,
            };
            for snapshot in tracker.list_tasks(&filter, now)? {
                print_task_row(&snapshot);
            }
        }
        TaskCommand::Show { id } => {
            print_task_detail(&tracker.get_task_snapshot(TaskId(id), now)?, config);
        }
        TaskCommand::Status { id, status } => {
            let snapshot = tracker.set_task_status(TaskId(id), status, now)?;
            print_task_detail(&snapshot, config);
        }
        TaskCommand::Edit {
            id,
            title,
            description,
            estimate,
            clear_estimate,
            hour,
            clear_hour,
            status,
            week,
            day,
            no_day,
        } => {
            let snapshot = tracker.update_task(
                TaskId(id),
                TaskPatch {
                    title,
                    description: patch_field(description.description, description.clear_description),
                    estimated_hours: patch_field(estimate, clear_estimate),
                    hour_number: patch_field(hour, clear_hour),
                    status,
                    week_id: week.map(WeekId),
                    day_id: patch_field(day.map(DayId), no_day),
                },
                now,
            )?;
            print_task_detail(&snapshot, config);
        }
        TaskCommand::Delete { id } => {
            tracker.delete_task(TaskId(id))?;
            println!("Deleted task {}", id);
        }
    }
    Ok(())
}

fn run_report(
    tracker: &Service,
    now: DateTime<Utc>,
    config: &Config,
    output: Option<PathBuf>,
    report_dir: &Path,
) -> Result<()> {
    println!("Generating progress report...");
    let path = report::generate_report(tracker.roadmap(), now, config.local_time, output, report_dir)?;
    println!("Report generated: {}", path.display());
    Ok(())
}

fn print_container(snapshot: &ContainerSnapshot, config: &Config) {
    let window = match (snapshot.actual_start, snapshot.actual_end) {
        (Some(start), Some(end)) => format!(
            "{} → {}",
            format_timestamp(start, config.local_time),
            format_timestamp(end, config.local_time)
        ),
        (Some(start), None) => format!("since {}", format_timestamp(start, config.local_time)),
        (None, _) => String::new(),
    };
    println!(
        "{:<10} {:<28} {:<11} work {}  tasks {:>3}  {}",
        snapshot.container.to_string(),
        snapshot.label,
        status_badge(snapshot.status),
        format_duration(snapshot.totals.work_seconds),
        snapshot.task_count,
        window
    );
}

fn print_task_row(snapshot: &TaskSnapshot) {
    let hour = snapshot
        .hour_number
        .map(|h| format!("h{}", h))
        .unwrap_or_default();
    println!(
        "{:>5}  {:<11} {}  {:<4} {}",
        snapshot.id,
        status_badge(snapshot.status),
        format_duration(snapshot.work_seconds),
        hour,
        snapshot.title
    );
}

fn print_task_detail(snapshot: &TaskSnapshot, config: &Config) {
    let stamp = |instant: Option<DateTime<Utc>>| {
        instant
            .map(|i| format_timestamp(i, config.local_time))
            .unwrap_or_else(|| "-".to_string())
    };
    println!("Task {}: {}", snapshot.id, snapshot.title);
    println!("  Status:    {}", status_badge(snapshot.status));
    println!("  Week:      {}", snapshot.week_id);
    if let Some(day_id) = snapshot.day_id {
        println!("  Day:       {}", day_id);
    }
    if let Some(hours) = snapshot.estimated_hours {
        println!("  Estimate:  {:.1}h", hours);
    }
    println!("  Work:      {}", format_duration(snapshot.work_seconds));
    println!("  Break:     {}", format_duration(snapshot.break_seconds));
    println!("  Pause:     {}", format_duration(snapshot.pause_seconds));
    println!("  Started:   {}", stamp(snapshot.first_started_at));
    println!("  Completed: {}", stamp(snapshot.completed_at));
    println!("  Updated:   {}", stamp(Some(snapshot.status_updated_at)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_task_status_with_now() {
        let cli = Cli::try_parse_from([
            "roadmap",
            "--now",
            "2025-01-06T09:00:00Z",
            "task",
            "status",
            "7",
            "IN_PROGRESS",
        ])
        .unwrap();
        assert!(cli.now.is_some());
        match cli.command {
            Commands::Task(TaskCommand::Status { id, status }) => {
                assert_eq!(id, 7);
                assert_eq!(status, TaskStatus::Working);
            }
            _ => panic!("expected task status"),
        }
    }

    #[test]
    fn test_patch_field() {
        assert_eq!(patch_field(Some(3), false), Some(Some(3)));
        assert_eq!(patch_field::<u32>(None, true), Some(None));
        assert_eq!(patch_field::<u32>(None, false), None);
    }
}
