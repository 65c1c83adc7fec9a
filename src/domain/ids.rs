use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a phase in the roadmap arena
    PhaseId
);
entity_id!(
    /// Identifier of a week in the roadmap arena
    WeekId
);
entity_id!(
    /// Identifier of a day plan in the roadmap arena
    DayId
);
entity_id!(
    /// Identifier of an hour-level task in the roadmap arena
    TaskId
);

/// Any container whose state is derived from its children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerRef {
    Phase(PhaseId),
    Week(WeekId),
    Day(DayId),
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRef::Phase(id) => write!(f, "phase {}", id),
            ContainerRef::Week(id) => write!(f, "week {}", id),
            ContainerRef::Day(id) => write!(f, "day {}", id),
        }
    }
}
