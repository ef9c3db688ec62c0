use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::{user::UserSummary, workflow::StatusCategory};

mod filters;
mod queries;

pub use filters::{TaskFilter, TaskSort, TaskSortField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize, TS, EnumString, Display, Default)]
#[sqlx(type_name = "task_type", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TaskType {
    #[default]
    Task,
    Bug,
    Epic,
    Story,
    Subtask,
}

/// Declared lowest to highest; the Postgres enum sorts the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize, TS, EnumString, Display, Default)]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TaskPriority {
    Lowest,
    Low,
    #[default]
    Medium,
    High,
    Highest,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub task_number: i32,
    pub slug: String,
    pub status_id: Uuid,
    pub sprint_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub reporter_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub story_points: Option<i32>,
    pub original_estimate: Option<i32>,
    pub remaining_estimate: Option<i32>,
    #[ts(type = "Record<string, unknown>")]
    pub custom_fields: Value,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task row joined with its status column.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TaskRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    #[ts(flatten)]
    pub task: Task,
    pub status_name: String,
    pub status_category: StatusCategory,
    pub status_color: String,
}

/// A task as returned by the API, with its assignees loaded.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TaskWithDetails {
    #[serde(flatten)]
    #[ts(flatten)]
    pub task: Task,
    pub status_name: String,
    pub status_category: StatusCategory,
    pub status_color: String,
    pub assignees: Vec<UserSummary>,
}

impl TaskWithDetails {
    pub fn from_row(row: TaskRow, assignees: Vec<UserSummary>) -> Self {
        Self {
            task: row.task,
            status_name: row.status_name,
            status_category: row.status_category,
            status_color: row.status_color,
            assignees,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub task_number: i32,
    pub slug: String,
    pub status_id: Uuid,
    pub sprint_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub reporter_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub story_points: Option<i32>,
    pub original_estimate: Option<i32>,
    pub remaining_estimate: Option<i32>,
    pub custom_fields: Value,
    pub created_by: Option<Uuid>,
}

/// Column updates for a task. `completed_at` is written as given, so callers
/// pass the current value when it should not change.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<TaskType>,
    pub priority: Option<TaskPriority>,
    pub status_id: Option<Uuid>,
    pub sprint_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub story_points: Option<i32>,
    pub original_estimate: Option<i32>,
    pub remaining_estimate: Option<i32>,
    pub custom_fields: Option<Value>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Builds a task slug from its project slug and number.
pub fn task_slug(project_slug: &str, task_number: i32) -> String {
    format!("{project_slug}-{task_number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn slug_joins_project_slug_and_number() {
        assert_eq!(task_slug("web-app", 42), "web-app-42");
    }

    #[test]
    fn priorities_order_lowest_to_highest() {
        assert!(TaskPriority::Highest > TaskPriority::High);
        assert!(TaskPriority::Lowest < TaskPriority::Low);
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!(TaskPriority::from_str("high").unwrap(), TaskPriority::High);
        assert_eq!(TaskType::from_str("BUG").unwrap(), TaskType::Bug);
        assert!(TaskType::from_str("chore").is_err());
    }
}
