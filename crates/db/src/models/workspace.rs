use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgExecutor};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Workspace {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub avatar: Option<String>,
    #[ts(type = "Record<string, unknown>")]
    pub settings: Value,
    pub archived: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWorkspace {
    pub organization_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub avatar: Option<String>,
    pub settings: Value,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub avatar: Option<String>,
    pub settings: Option<Value>,
}

const WORKSPACE_COLUMNS: &str = "w.id, w.organization_id, w.name, w.slug, w.description, w.color, \
     w.avatar, w.settings, w.archived, w.created_by, w.created_at, w.updated_at";

impl Workspace {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &NewWorkspace,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(&format!(
            "INSERT INTO workspaces AS w
                (organization_id, name, slug, description, color, avatar, settings, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {WORKSPACE_COLUMNS}"
        ))
        .bind(data.organization_id)
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(&data.color)
        .bind(&data.avatar)
        .bind(&data.settings)
        .bind(data.created_by)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces w WHERE w.id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_slug<'e, E: PgExecutor<'e>>(
        executor: E,
        organization_id: Uuid,
        slug: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces w
             WHERE w.organization_id = $1 AND w.slug = $2"
        ))
        .bind(organization_id)
        .bind(slug)
        .fetch_optional(executor)
        .await
    }

    /// Slugs in the organization equal to `base` or of the form `base-N`.
    pub async fn slugs_like<'e, E: PgExecutor<'e>>(
        executor: E,
        organization_id: Uuid,
        base: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT slug FROM workspaces
             WHERE organization_id = $1 AND (slug = $2 OR slug LIKE $2 || '-%')",
        )
        .bind(organization_id)
        .bind(base)
        .fetch_all(executor)
        .await
    }

    /// Workspaces of an organization. With `member_of` set, only those the
    /// user is a direct member of.
    pub async fn list_for_organization<'e, E: PgExecutor<'e>>(
        executor: E,
        organization_id: Uuid,
        member_of: Option<Uuid>,
        include_archived: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces w
             WHERE w.organization_id = $1
               AND ($3 OR NOT w.archived)
               AND ($2::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM workspace_members wm
                    WHERE wm.workspace_id = w.id AND wm.user_id = $2))
             ORDER BY w.name ASC"
        ))
        .bind(organization_id)
        .bind(member_of)
        .bind(include_archived)
        .fetch_all(executor)
        .await
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        changes: &WorkspaceChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(&format!(
            "UPDATE workspaces AS w SET
                name        = COALESCE($2, w.name),
                slug        = COALESCE($3, w.slug),
                description = COALESCE($4, w.description),
                color       = COALESCE($5, w.color),
                avatar      = COALESCE($6, w.avatar),
                settings    = COALESCE($7, w.settings),
                updated_at  = NOW()
             WHERE w.id = $1
             RETURNING {WORKSPACE_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.slug)
        .bind(&changes.description)
        .bind(&changes.color)
        .bind(&changes.avatar)
        .bind(&changes.settings)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_archived<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        archived: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(&format!(
            "UPDATE workspaces AS w SET archived = $2, updated_at = NOW()
             WHERE w.id = $1
             RETURNING {WORKSPACE_COLUMNS}"
        ))
        .bind(id)
        .bind(archived)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
