use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize, TS, Display, EnumString)]
#[sqlx(type_name = "status_category", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCategory {
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Workflow {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A column of a workflow board.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct TaskStatus {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub name: String,
    pub color: String,
    pub category: StatusCategory,
    pub position: i32,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct WorkflowWithStatuses {
    #[serde(flatten)]
    #[ts(flatten)]
    pub workflow: Workflow,
    pub statuses: Vec<TaskStatus>,
}

#[derive(Debug, Clone)]
pub struct NewTaskStatus {
    pub name: String,
    pub color: String,
    pub category: StatusCategory,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskStatusChanges {
    pub name: Option<String>,
    pub color: Option<String>,
    pub category: Option<StatusCategory>,
    pub position: Option<i32>,
}

/// Statuses every new organization starts with, in board order.
pub const DEFAULT_STATUSES: [(&str, &str, StatusCategory); 4] = [
    ("To Do", "#6b7280", StatusCategory::Todo),
    ("In Progress", "#3b82f6", StatusCategory::InProgress),
    ("In Review", "#f59e0b", StatusCategory::InProgress),
    ("Done", "#10b981", StatusCategory::Done),
];

const STATUS_COLUMNS: &str =
    "id, workflow_id, name, color, category, position, is_default, created_at, updated_at";

impl Workflow {
    /// Creates the organization's default workflow and its statuses. The
    /// first status is the default for new tasks.
    pub async fn create_default(
        conn: &mut PgConnection,
        organization_id: Uuid,
    ) -> Result<WorkflowWithStatuses, sqlx::Error> {
        let workflow = sqlx::query_as::<_, Workflow>(
            "INSERT INTO workflows (organization_id, name, description, is_default)
             VALUES ($1, 'Default Workflow', 'Standard task workflow', TRUE)
             RETURNING id, organization_id, name, description, is_default, created_at, updated_at",
        )
        .bind(organization_id)
        .fetch_one(&mut *conn)
        .await?;

        let mut statuses = Vec::with_capacity(DEFAULT_STATUSES.len());
        for (position, (name, color, category)) in DEFAULT_STATUSES.iter().enumerate() {
            let status = sqlx::query_as::<_, TaskStatus>(&format!(
                "INSERT INTO task_statuses (workflow_id, name, color, category, position, is_default)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 RETURNING {STATUS_COLUMNS}"
            ))
            .bind(workflow.id)
            .bind(*name)
            .bind(*color)
            .bind(*category)
            .bind(position as i32)
            .bind(position == 0)
            .fetch_one(&mut *conn)
            .await?;
            statuses.push(status);
        }

        Ok(WorkflowWithStatuses { workflow, statuses })
    }

    pub async fn find_default_for_organization<'e, E: PgExecutor<'e>>(
        executor: E,
        organization_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Workflow>(
            "SELECT id, organization_id, name, description, is_default, created_at, updated_at
             FROM workflows WHERE organization_id = $1 AND is_default",
        )
        .bind(organization_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Workflow>(
            "SELECT id, organization_id, name, description, is_default, created_at, updated_at
             FROM workflows WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }
}

impl TaskStatus {
    pub async fn list_for_workflow<'e, E: PgExecutor<'e>>(
        executor: E,
        workflow_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskStatus>(&format!(
            "SELECT {STATUS_COLUMNS} FROM task_statuses
             WHERE workflow_id = $1
             ORDER BY position ASC, created_at ASC"
        ))
        .bind(workflow_id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskStatus>(&format!(
            "SELECT {STATUS_COLUMNS} FROM task_statuses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_default<'e, E: PgExecutor<'e>>(
        executor: E,
        workflow_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskStatus>(&format!(
            "SELECT {STATUS_COLUMNS} FROM task_statuses
             WHERE workflow_id = $1
             ORDER BY is_default DESC, position ASC
             LIMIT 1"
        ))
        .bind(workflow_id)
        .fetch_optional(executor)
        .await
    }

    /// Appends at the end of the board unless a position is given.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        workflow_id: Uuid,
        data: &NewTaskStatus,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, TaskStatus>(&format!(
            "INSERT INTO task_statuses (workflow_id, name, color, category, position)
             VALUES ($1, $2, $3, $4,
                     COALESCE($5, (SELECT COALESCE(MAX(position) + 1, 0) FROM task_statuses WHERE workflow_id = $1)))
             RETURNING {STATUS_COLUMNS}"
        ))
        .bind(workflow_id)
        .bind(&data.name)
        .bind(&data.color)
        .bind(data.category)
        .bind(data.position)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        changes: &TaskStatusChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, TaskStatus>(&format!(
            "UPDATE task_statuses SET
                name       = COALESCE($2, name),
                color      = COALESCE($3, color),
                category   = COALESCE($4, category),
                position   = COALESCE($5, position),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {STATUS_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.color)
        .bind(changes.category)
        .bind(changes.position)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM task_statuses WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn task_count<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks WHERE status_id = $1")
            .bind(id)
            .fetch_one(executor)
            .await
    }

    /// Organization owning the status, through its workflow.
    pub async fn organization_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT w.organization_id FROM task_statuses s
             JOIN workflows w ON w.id = s.workflow_id
             WHERE s.id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_workflow_starts_todo_and_ends_done() {
        assert_eq!(DEFAULT_STATUSES.first().map(|s| s.2), Some(StatusCategory::Todo));
        assert_eq!(DEFAULT_STATUSES.last().map(|s| s.2), Some(StatusCategory::Done));
        let in_progress = DEFAULT_STATUSES
            .iter()
            .filter(|s| s.2 == StatusCategory::InProgress)
            .count();
        assert_eq!(in_progress, 2);
    }
}
