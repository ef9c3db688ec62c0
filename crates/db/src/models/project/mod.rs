use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::task::TaskPriority;

mod queries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize, TS, Display, EnumString, Default)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    #[default]
    Planning,
    Active,
    OnHold,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, TS, Display, EnumString, Default)]
#[sqlx(type_name = "project_visibility", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectVisibility {
    #[default]
    Private,
    Internal,
    Public,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub status: ProjectStatus,
    pub priority: TaskPriority,
    pub visibility: ProjectVisibility,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[ts(type = "Record<string, unknown>")]
    pub settings: Value,
    pub archived: bool,
    pub task_counter: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The tenancy chain above a project, used by access checks.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct ProjectLineage {
    pub project_id: Uuid,
    pub workspace_id: Uuid,
    pub organization_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub workspace_id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub status: ProjectStatus,
    pub priority: TaskPriority,
    pub visibility: ProjectVisibility,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub settings: Value,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub status: Option<ProjectStatus>,
    pub priority: Option<TaskPriority>,
    pub visibility: Option<ProjectVisibility>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub settings: Option<Value>,
}

/// Filters for listing the projects of a workspace.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub priority: Option<TaskPriority>,
    pub search: Option<String>,
    pub include_archived: bool,
    /// Restricts results to projects this user is a direct member of.
    pub member_of: Option<Uuid>,
}
