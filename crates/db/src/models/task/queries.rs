//! CRUD query operations for tasks.

use std::collections::HashMap;

use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{NewTask, Task, TaskChanges, TaskFilter, TaskRow, TaskSort};
use crate::models::user::UserSummary;

const TASK_COLUMNS: &str = "t.id, t.project_id, t.title, t.description, t.type, t.priority, \
     t.task_number, t.slug, t.status_id, t.sprint_id, t.parent_task_id, t.reporter_id, \
     t.start_date, t.due_date, t.completed_at, t.story_points, t.original_estimate, \
     t.remaining_estimate, t.custom_fields, t.created_by, t.created_at, t.updated_at";

const ROW_FROM: &str = "FROM tasks t
     JOIN projects p ON p.id = t.project_id
     JOIN workspaces w ON w.id = p.workspace_id
     JOIN task_statuses s ON s.id = t.status_id";

fn select_rows() -> String {
    format!(
        "SELECT {TASK_COLUMNS}, s.name AS status_name, s.category AS status_category, \
         s.color AS status_color {ROW_FROM}"
    )
}

impl Task {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &NewTask,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "INSERT INTO tasks AS t
                (project_id, title, description, type, priority, task_number, slug, status_id,
                 sprint_id, parent_task_id, reporter_id, start_date, due_date, completed_at,
                 story_points, original_estimate, remaining_estimate, custom_fields, created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(data.project_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.task_type)
        .bind(data.priority)
        .bind(data.task_number)
        .bind(&data.slug)
        .bind(data.status_id)
        .bind(data.sprint_id)
        .bind(data.parent_task_id)
        .bind(data.reporter_id)
        .bind(data.start_date)
        .bind(data.due_date)
        .bind(data.completed_at)
        .bind(data.story_points)
        .bind(data.original_estimate)
        .bind(data.remaining_estimate)
        .bind(&data.custom_fields)
        .bind(data.created_by)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Ids of `id` and every task above it through `parent_task_id`.
    pub async fn lineage<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            "WITH RECURSIVE lineage(id, parent_task_id) AS (
                 SELECT id, parent_task_id FROM tasks WHERE id = $1
                 UNION
                 SELECT t.id, t.parent_task_id
                 FROM tasks t JOIN lineage l ON t.id = l.parent_task_id
             )
             SELECT id FROM lineage",
        )
        .bind(id)
        .fetch_all(executor)
        .await
    }

    pub async fn find_row<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<TaskRow>, sqlx::Error> {
        sqlx::query_as::<_, TaskRow>(&format!("{} WHERE t.id = $1", select_rows()))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_row_by_slug<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: Uuid,
        slug: &str,
    ) -> Result<Option<TaskRow>, sqlx::Error> {
        sqlx::query_as::<_, TaskRow>(&format!(
            "{} WHERE t.project_id = $1 AND t.slug = $2",
            select_rows()
        ))
        .bind(project_id)
        .bind(slug)
        .fetch_optional(executor)
        .await
    }

    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        filter: &TaskFilter,
        sort: TaskSort,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TaskRow>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(select_rows());
        filter.push_where(&mut builder);
        builder.push(sort.order_by());
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(offset);
        builder.build_query_as::<TaskRow>().fetch_all(executor).await
    }

    pub async fn count<'e, E: PgExecutor<'e>>(
        executor: E,
        filter: &TaskFilter,
    ) -> Result<i64, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) {ROW_FROM}"));
        filter.push_where(&mut builder);
        builder.build_query_scalar::<i64>().fetch_one(executor).await
    }

    /// Tasks of a project in board order, optionally limited to one sprint.
    pub async fn list_for_board<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: Uuid,
        sprint_id: Option<Uuid>,
    ) -> Result<Vec<TaskRow>, sqlx::Error> {
        sqlx::query_as::<_, TaskRow>(&format!(
            "{} WHERE t.project_id = $1 AND ($2::uuid IS NULL OR t.sprint_id = $2)
             ORDER BY s.position ASC, t.priority DESC, t.task_number ASC",
            select_rows()
        ))
        .bind(project_id)
        .bind(sprint_id)
        .fetch_all(executor)
        .await
    }

    pub async fn subtasks<'e, E: PgExecutor<'e>>(
        executor: E,
        parent_task_id: Uuid,
    ) -> Result<Vec<TaskRow>, sqlx::Error> {
        sqlx::query_as::<_, TaskRow>(&format!(
            "{} WHERE t.parent_task_id = $1 ORDER BY t.task_number ASC",
            select_rows()
        ))
        .bind(parent_task_id)
        .fetch_all(executor)
        .await
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        changes: &TaskChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(&format!(
            "UPDATE tasks AS t SET
                title              = COALESCE($2, t.title),
                description        = COALESCE($3, t.description),
                type               = COALESCE($4, t.type),
                priority           = COALESCE($5, t.priority),
                status_id          = COALESCE($6, t.status_id),
                sprint_id          = COALESCE($7, t.sprint_id),
                parent_task_id     = COALESCE($8, t.parent_task_id),
                start_date         = COALESCE($9, t.start_date),
                due_date           = COALESCE($10, t.due_date),
                story_points       = COALESCE($11, t.story_points),
                original_estimate  = COALESCE($12, t.original_estimate),
                remaining_estimate = COALESCE($13, t.remaining_estimate),
                custom_fields      = COALESCE($14, t.custom_fields),
                completed_at       = $15,
                updated_at         = NOW()
             WHERE t.id = $1
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.task_type)
        .bind(changes.priority)
        .bind(changes.status_id)
        .bind(changes.sprint_id)
        .bind(changes.parent_task_id)
        .bind(changes.start_date)
        .bind(changes.due_date)
        .bind(changes.story_points)
        .bind(changes.original_estimate)
        .bind(changes.remaining_estimate)
        .bind(&changes.custom_fields)
        .bind(changes.completed_at)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Replaces the task's assignee set.
    pub async fn set_assignees(
        conn: &mut PgConnection,
        task_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM task_assignees WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *conn)
            .await?;
        if user_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO task_assignees (task_id, user_id)
             SELECT $1, u FROM UNNEST($2::uuid[]) AS u
             ON CONFLICT DO NOTHING",
        )
        .bind(task_id)
        .bind(user_ids)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Assignees of each given task, keyed by task id.
    pub async fn assignees_for<'e, E: PgExecutor<'e>>(
        executor: E,
        task_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<UserSummary>>, sqlx::Error> {
        if task_ids.is_empty() {
            return Ok(HashMap::new());
        }

        #[derive(sqlx::FromRow)]
        struct AssigneeRow {
            task_id: Uuid,
            #[sqlx(flatten)]
            user: UserSummary,
        }

        let rows = sqlx::query_as::<_, AssigneeRow>(
            "SELECT ta.task_id, u.id, u.email, u.username, u.first_name, u.last_name, u.avatar
             FROM task_assignees ta
             JOIN users u ON u.id = ta.user_id
             WHERE ta.task_id = ANY($1)
             ORDER BY ta.assigned_at ASC",
        )
        .bind(task_ids)
        .fetch_all(executor)
        .await?;

        let mut by_task: HashMap<Uuid, Vec<UserSummary>> = HashMap::new();
        for row in rows {
            by_task.entry(row.task_id).or_default().push(row.user);
        }
        Ok(by_task)
    }

    /// Users among `user_ids` that can access the project: super admins,
    /// direct project members, and owners or managers of its workspace or
    /// organization.
    pub async fn users_with_project_access<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: Uuid,
        user_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT u.id FROM users u, projects p JOIN workspaces w ON w.id = p.workspace_id
             WHERE p.id = $1 AND u.id = ANY($2)
               AND (u.role = 'super_admin'
                 OR EXISTS (SELECT 1 FROM project_members pm WHERE pm.project_id = p.id AND pm.user_id = u.id)
                 OR EXISTS (SELECT 1 FROM workspace_members wm WHERE wm.workspace_id = w.id
                            AND wm.user_id = u.id AND wm.role IN ('owner', 'manager'))
                 OR EXISTS (SELECT 1 FROM organization_members om WHERE om.organization_id = w.organization_id
                            AND om.user_id = u.id AND om.role IN ('owner', 'manager')))",
        )
        .bind(project_id)
        .bind(user_ids)
        .fetch_all(executor)
        .await
    }
}
