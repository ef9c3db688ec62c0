use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgExecutor};
use ts_rs::TS;
use uuid::Uuid;

use super::role::MemberRole;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub website: Option<String>,
    #[ts(type = "Record<string, unknown>")]
    pub settings: Value,
    pub owner_id: Uuid,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An organization as seen by one of its members.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct OrganizationWithRole {
    #[sqlx(flatten)]
    #[serde(flatten)]
    #[ts(flatten)]
    pub organization: Organization,
    pub user_role: MemberRole,
    pub is_default: bool,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub website: Option<String>,
    pub settings: Value,
    pub owner_id: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct OrganizationChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub website: Option<String>,
    pub settings: Option<Value>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct OrganizationStats {
    pub total_workspaces: i64,
    pub total_projects: i64,
    pub total_members: i64,
    pub total_tasks: i64,
    pub open_tasks: i64,
}

const ORGANIZATION_COLUMNS: &str = "o.id, o.name, o.slug, o.description, o.avatar, o.website, \
     o.settings, o.owner_id, o.archived, o.created_at, o.updated_at";

impl Organization {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &NewOrganization,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "INSERT INTO organizations AS o (name, slug, description, avatar, website, settings, owner_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {ORGANIZATION_COLUMNS}"
        ))
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(&data.avatar)
        .bind(&data.website)
        .bind(&data.settings)
        .bind(data.owner_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations o WHERE o.id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_slug<'e, E: PgExecutor<'e>>(
        executor: E,
        slug: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations o WHERE o.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(executor)
        .await
    }

    /// Slugs equal to `base` or of the form `base-N`.
    pub async fn slugs_like<'e, E: PgExecutor<'e>>(
        executor: E,
        base: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT slug FROM organizations WHERE slug = $1 OR slug LIKE $1 || '-%'",
        )
        .bind(base)
        .fetch_all(executor)
        .await
    }

    pub async fn list_for_user<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<OrganizationWithRole>, sqlx::Error> {
        sqlx::query_as::<_, OrganizationWithRole>(&format!(
            "SELECT {ORGANIZATION_COLUMNS}, m.role AS user_role, m.is_default
             FROM organizations o
             JOIN organization_members m ON m.organization_id = o.id
             WHERE m.user_id = $1 AND ($2 OR NOT o.archived)
             ORDER BY m.is_default DESC, o.name ASC"
        ))
        .bind(user_id)
        .bind(include_archived)
        .fetch_all(executor)
        .await
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        changes: &OrganizationChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "UPDATE organizations AS o SET
                name        = COALESCE($2, o.name),
                description = COALESCE($3, o.description),
                avatar      = COALESCE($4, o.avatar),
                website     = COALESCE($5, o.website),
                settings    = COALESCE($6, o.settings),
                updated_at  = NOW()
             WHERE o.id = $1
             RETURNING {ORGANIZATION_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(&changes.avatar)
        .bind(&changes.website)
        .bind(&changes.settings)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_archived<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        archived: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Organization>(&format!(
            "UPDATE organizations AS o SET archived = $2, updated_at = NOW()
             WHERE o.id = $1
             RETURNING {ORGANIZATION_COLUMNS}"
        ))
        .bind(id)
        .bind(archived)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn stats<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<OrganizationStats, sqlx::Error> {
        sqlx::query_as::<_, OrganizationStats>(
            r#"SELECT
                (SELECT COUNT(*) FROM workspaces w WHERE w.organization_id = $1 AND NOT w.archived) AS total_workspaces,
                (SELECT COUNT(*) FROM projects p JOIN workspaces w ON w.id = p.workspace_id
                  WHERE w.organization_id = $1 AND NOT p.archived) AS total_projects,
                (SELECT COUNT(*) FROM organization_members m WHERE m.organization_id = $1) AS total_members,
                (SELECT COUNT(*) FROM tasks t
                  JOIN projects p ON p.id = t.project_id
                  JOIN workspaces w ON w.id = p.workspace_id
                  WHERE w.organization_id = $1) AS total_tasks,
                (SELECT COUNT(*) FROM tasks t
                  JOIN projects p ON p.id = t.project_id
                  JOIN workspaces w ON w.id = p.workspace_id
                  JOIN task_statuses s ON s.id = t.status_id
                  WHERE w.organization_id = $1 AND s.category <> 'done') AS open_tasks"#,
        )
        .bind(id)
        .fetch_one(executor)
        .await
    }
}
