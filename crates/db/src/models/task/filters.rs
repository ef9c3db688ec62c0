//! Dynamic filtering and ordering for task listings.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::api::SortOrder;
use uuid::Uuid;

use super::{TaskPriority, TaskType};
use crate::models::member::like_pattern;

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub organization_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status_ids: Vec<Uuid>,
    pub priorities: Vec<TaskPriority>,
    pub types: Vec<TaskType>,
    pub assignee_id: Option<Uuid>,
    pub reporter_id: Option<Uuid>,
    pub sprint_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub top_level: bool,
    pub search: Option<String>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
    pub overdue: bool,
    /// Restricts results to projects this user can access. `None` means
    /// no restriction (super admins).
    pub visible_to: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, TS, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
    TaskNumber,
}

impl TaskSortField {
    fn column(self) -> &'static str {
        match self {
            TaskSortField::CreatedAt => "t.created_at",
            TaskSortField::UpdatedAt => "t.updated_at",
            TaskSortField::DueDate => "t.due_date",
            TaskSortField::Priority => "t.priority",
            TaskSortField::TaskNumber => "t.task_number",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TaskSort {
    pub field: TaskSortField,
    pub order: SortOrder,
}

impl TaskSort {
    /// `ORDER BY` clause; ties break on id so pages are stable.
    pub(super) fn order_by(self) -> String {
        format!(
            " ORDER BY {} {} NULLS LAST, t.id ASC",
            self.field.column(),
            self.order.as_sql()
        )
    }
}

impl TaskFilter {
    /// Appends the `WHERE` clause. Expects `tasks t`, `projects p`,
    /// `workspaces w` and `task_statuses s` in the `FROM` list.
    pub(super) fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(id) = self.organization_id {
            builder.push(" AND w.organization_id = ").push_bind(id);
        }
        if let Some(id) = self.workspace_id {
            builder.push(" AND p.workspace_id = ").push_bind(id);
        }
        if let Some(id) = self.project_id {
            builder.push(" AND t.project_id = ").push_bind(id);
        }
        if !self.status_ids.is_empty() {
            builder
                .push(" AND t.status_id = ANY(")
                .push_bind(self.status_ids.clone())
                .push(")");
        }
        if !self.priorities.is_empty() {
            builder
                .push(" AND t.priority = ANY(")
                .push_bind(self.priorities.clone())
                .push(")");
        }
        if !self.types.is_empty() {
            builder
                .push(" AND t.type = ANY(")
                .push_bind(self.types.clone())
                .push(")");
        }
        if let Some(id) = self.assignee_id {
            builder
                .push(" AND EXISTS (SELECT 1 FROM task_assignees ta WHERE ta.task_id = t.id AND ta.user_id = ")
                .push_bind(id)
                .push(")");
        }
        if let Some(id) = self.reporter_id {
            builder.push(" AND t.reporter_id = ").push_bind(id);
        }
        if let Some(id) = self.sprint_id {
            builder.push(" AND t.sprint_id = ").push_bind(id);
        }
        if let Some(id) = self.parent_task_id {
            builder.push(" AND t.parent_task_id = ").push_bind(id);
        } else if self.top_level {
            builder.push(" AND t.parent_task_id IS NULL");
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            builder
                .push(" AND (t.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR t.description ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR t.slug ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(from) = self.due_from {
            builder.push(" AND t.due_date >= ").push_bind(from);
        }
        if let Some(to) = self.due_to {
            builder.push(" AND t.due_date <= ").push_bind(to);
        }
        if self.overdue {
            builder.push(" AND t.due_date < NOW() AND s.category <> 'done'");
        }
        if let Some(user_id) = self.visible_to {
            push_accessible_project(builder, user_id);
        }
    }
}

/// Appends ` AND <project p is accessible to user>`: direct project
/// membership, or an owner/manager role on its workspace or organization.
pub(crate) fn push_accessible_project(builder: &mut QueryBuilder<'_, Postgres>, user_id: Uuid) {
    builder
        .push(
            " AND (EXISTS (SELECT 1 FROM project_members pm WHERE pm.project_id = p.id AND pm.user_id = ",
        )
        .push_bind(user_id)
        .push(
            ") OR EXISTS (SELECT 1 FROM workspace_members wm WHERE wm.workspace_id = p.workspace_id \
             AND wm.role IN ('owner', 'manager') AND wm.user_id = ",
        )
        .push_bind(user_id)
        .push(
            ") OR EXISTS (SELECT 1 FROM organization_members om WHERE om.organization_id = w.organization_id \
             AND om.role IN ('owner', 'manager') AND om.user_id = ",
        )
        .push_bind(user_id)
        .push("))");
}
