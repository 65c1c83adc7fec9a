use crate::error::TrackerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state shared by tasks and the containers rolled up from them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    Working,
    OnBreak,
    Paused,
    Completed,
}

impl TaskStatus {
    /// Parse a status tag, accepting the legacy spellings older data files carry
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "pending" | "planned" => Some(Self::Pending),
            "working" | "in_progress" | "running" => Some(Self::Working),
            "break" | "on_break" => Some(Self::OnBreak),
            "paused" | "blocked" => Some(Self::Paused),
            "completed" | "complete" | "done" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Canonical persisted tag
    pub fn to_tag(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Working => "working",
            Self::OnBreak => "break",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    /// Any state other than Completed still has work left in it
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Completed)
    }

    pub fn all() -> &'static [TaskStatus] {
        &[
            TaskStatus::Pending,
            TaskStatus::Working,
            TaskStatus::OnBreak,
            TaskStatus::Paused,
            TaskStatus::Completed,
        ]
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_tag())
    }
}

impl FromStr for TaskStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| TrackerError::UnknownStatus(s.to_string()))
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.to_tag().to_string()
    }
}

/// Kind of entity an id refers to, used in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Phase,
    Week,
    Day,
    Task,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Phase => "Phase",
            EntityKind::Week => "Week",
            EntityKind::Day => "Day",
            EntityKind::Task => "Task",
        };
        f.write_str(name)
    }
}
