//! CRUD and listing queries for projects.

use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{NewProject, Project, ProjectChanges, ProjectFilter, ProjectLineage};
use crate::models::member::like_pattern;

const PROJECT_COLUMNS: &str = "p.id, p.workspace_id, p.workflow_id, p.name, p.slug, p.description, \
     p.color, p.status, p.priority, p.visibility, p.start_date, p.end_date, p.settings, \
     p.archived, p.task_counter, p.created_by, p.created_at, p.updated_at";

impl Project {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &NewProject,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "INSERT INTO projects AS p
                (workspace_id, workflow_id, name, slug, description, color, status, priority,
                 visibility, start_date, end_date, settings, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(data.workspace_id)
        .bind(data.workflow_id)
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(&data.color)
        .bind(data.status)
        .bind(data.priority)
        .bind(data.visibility)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(&data.settings)
        .bind(data.created_by)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_slug<'e, E: PgExecutor<'e>>(
        executor: E,
        workspace_id: Uuid,
        slug: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects p
             WHERE p.workspace_id = $1 AND p.slug = $2"
        ))
        .bind(workspace_id)
        .bind(slug)
        .fetch_optional(executor)
        .await
    }

    pub async fn lineage<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<ProjectLineage>, sqlx::Error> {
        sqlx::query_as::<_, ProjectLineage>(
            "SELECT p.id AS project_id, p.workspace_id, w.organization_id
             FROM projects p JOIN workspaces w ON w.id = p.workspace_id
             WHERE p.id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Slugs in the workspace equal to `base` or of the form `base-N`.
    pub async fn slugs_like<'e, E: PgExecutor<'e>>(
        executor: E,
        workspace_id: Uuid,
        base: &str,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT slug FROM projects
             WHERE workspace_id = $1 AND (slug = $2 OR slug LIKE $2 || '-%')",
        )
        .bind(workspace_id)
        .bind(base)
        .fetch_all(executor)
        .await
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, workspace_id: Uuid, filter: &ProjectFilter) {
        builder.push(" WHERE p.workspace_id = ").push_bind(workspace_id);
        if !filter.include_archived {
            builder.push(" AND NOT p.archived");
        }
        if let Some(status) = filter.status {
            builder.push(" AND p.status = ").push_bind(status);
        }
        if let Some(priority) = filter.priority {
            builder.push(" AND p.priority = ").push_bind(priority);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search.trim());
            builder
                .push(" AND (p.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(user_id) = filter.member_of {
            builder
                .push(" AND EXISTS (SELECT 1 FROM project_members pm WHERE pm.project_id = p.id AND pm.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
    }

    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        workspace_id: Uuid,
        filter: &ProjectFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {PROJECT_COLUMNS} FROM projects p"));
        Self::push_filters(&mut builder, workspace_id, filter);
        builder
            .push(" ORDER BY p.updated_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        builder.build_query_as::<Project>().fetch_all(executor).await
    }

    pub async fn count<'e, E: PgExecutor<'e>>(
        executor: E,
        workspace_id: Uuid,
        filter: &ProjectFilter,
    ) -> Result<i64, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects p");
        Self::push_filters(&mut builder, workspace_id, filter);
        builder.build_query_scalar::<i64>().fetch_one(executor).await
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        changes: &ProjectChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "UPDATE projects AS p SET
                name        = COALESCE($2, p.name),
                slug        = COALESCE($3, p.slug),
                description = COALESCE($4, p.description),
                color       = COALESCE($5, p.color),
                status      = COALESCE($6, p.status),
                priority    = COALESCE($7, p.priority),
                visibility  = COALESCE($8, p.visibility),
                start_date  = COALESCE($9, p.start_date),
                end_date    = COALESCE($10, p.end_date),
                settings    = COALESCE($11, p.settings),
                updated_at  = NOW()
             WHERE p.id = $1
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.slug)
        .bind(&changes.description)
        .bind(&changes.color)
        .bind(changes.status)
        .bind(changes.priority)
        .bind(changes.visibility)
        .bind(changes.start_date)
        .bind(changes.end_date)
        .bind(&changes.settings)
        .fetch_optional(executor)
        .await
    }

    pub async fn set_archived<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        archived: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(&format!(
            "UPDATE projects AS p SET archived = $2, updated_at = NOW()
             WHERE p.id = $1
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(id)
        .bind(archived)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Locks the project row and reserves the next task number.
    ///
    /// Must run inside the transaction that inserts the task so concurrent
    /// creators serialize on the row lock.
    pub async fn next_task_number(
        conn: &mut PgConnection,
        id: Uuid,
    ) -> Result<Option<(i32, String)>, sqlx::Error> {
        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        if locked.is_none() {
            return Ok(None);
        }
        sqlx::query_as::<_, (i32, String)>(
            "UPDATE projects SET task_counter = task_counter + 1
             WHERE id = $1
             RETURNING task_counter, slug",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
    }
}
