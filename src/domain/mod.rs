pub mod container;
pub mod enums;
pub mod ids;
pub mod roadmap;
pub mod rollup;
pub mod task;
pub mod views;

pub use container::{validate_date_range, Day, Phase, RollupState, Week};
pub use enums::{EntityKind, TaskStatus};
pub use ids::{ContainerRef, DayId, PhaseId, TaskId, WeekId};
pub use roadmap::Roadmap;
pub use task::Task;
pub use views::{
    aggregate, container_snapshot, format_duration, status_badge, ContainerSnapshot,
    TaskSnapshot, TimeTotals,
};
