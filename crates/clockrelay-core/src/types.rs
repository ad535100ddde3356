//! Shared domain types: tasks, time entries and change-history records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A task mirrored from the upstream tracker.
///
/// The display name is the single source of truth for the embedded hour
/// estimate — see `estimate::parse_task_estimation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub level: i64,
    pub root_group_id: Option<String>,
    pub owner_id: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

/// A single tracked time entry belonging to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub duration_secs: i64,
    #[serde(default)]
    pub billable: bool,
    /// Free-text note attached to the entry, surfaced as a report comment.
    #[serde(default)]
    pub note: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of change recorded in the append-only task history ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    NameChanged,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::NameChanged => "name_changed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(ChangeKind::Created),
            "name_changed" => Some(ChangeKind::NameChanged),
            _ => None,
        }
    }
}

/// One record in the task history ledger. The ledger is append-only and is
/// never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskChange {
    pub task_id: String,
    pub kind: ChangeKind,
    pub before: Option<String>,
    pub after: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
