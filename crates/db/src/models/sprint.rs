use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize, TS, Display, EnumString, Default)]
#[sqlx(type_name = "sprint_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SprintStatus {
    #[default]
    Planning,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Sprint {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub goal: Option<String>,
    pub status: SprintStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_default: bool,
    pub archived: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSprint {
    pub project_id: Uuid,
    pub name: String,
    pub goal: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_default: bool,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct SprintChanges {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub archived: Option<bool>,
}

/// Name of the sprint every project is created with.
pub const DEFAULT_SPRINT_NAME: &str = "Backlog";

const SPRINT_COLUMNS: &str = "id, project_id, name, goal, status, start_date, end_date, is_default, \
     archived, created_by, created_at, updated_at";

impl Sprint {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &NewSprint,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Sprint>(&format!(
            "INSERT INTO sprints (project_id, name, goal, start_date, end_date, is_default, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {SPRINT_COLUMNS}"
        ))
        .bind(data.project_id)
        .bind(&data.name)
        .bind(&data.goal)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.is_default)
        .bind(data.created_by)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Sprint>(&format!("SELECT {SPRINT_COLUMNS} FROM sprints WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_default<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Sprint>(&format!(
            "SELECT {SPRINT_COLUMNS} FROM sprints WHERE project_id = $1 AND is_default"
        ))
        .bind(project_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_active<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Sprint>(&format!(
            "SELECT {SPRINT_COLUMNS} FROM sprints WHERE project_id = $1 AND status = 'active'"
        ))
        .bind(project_id)
        .fetch_optional(executor)
        .await
    }

    /// Default sprint first, then by start date.
    pub async fn list_for_project<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: Uuid,
        status: Option<SprintStatus>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Sprint>(&format!(
            "SELECT {SPRINT_COLUMNS} FROM sprints
             WHERE project_id = $1 AND ($2::sprint_status IS NULL OR status = $2)
             ORDER BY is_default DESC, start_date ASC NULLS LAST, created_at ASC"
        ))
        .bind(project_id)
        .bind(status)
        .fetch_all(executor)
        .await
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        changes: &SprintChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Sprint>(&format!(
            "UPDATE sprints SET
                name       = COALESCE($2, name),
                goal       = COALESCE($3, goal),
                start_date = COALESCE($4, start_date),
                end_date   = COALESCE($5, end_date),
                archived   = COALESCE($6, archived),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {SPRINT_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.goal)
        .bind(changes.start_date)
        .bind(changes.end_date)
        .bind(changes.archived)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_status<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        status: SprintStatus,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Sprint>(&format!(
            "UPDATE sprints SET
                status     = $2,
                start_date = COALESCE($3, start_date),
                end_date   = COALESCE($4, end_date),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {SPRINT_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(executor)
        .await
    }

    /// Moves the sprint's tasks to `target`. With `unfinished_only`, tasks in
    /// a DONE status stay behind. Returns the number of moved tasks.
    pub async fn move_tasks<'e, E: PgExecutor<'e>>(
        executor: E,
        from: Uuid,
        target: Uuid,
        unfinished_only: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks t SET sprint_id = $2, updated_at = NOW()
             FROM task_statuses s
             WHERE s.id = t.status_id AND t.sprint_id = $1
               AND (NOT $3 OR s.category <> 'done')",
        )
        .bind(from)
        .bind(target)
        .bind(unfinished_only)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sprints WHERE id = $1 AND NOT is_default")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
