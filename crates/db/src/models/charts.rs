//! Grouped-count queries behind the dashboard charts.
//!
//! Every query runs against one [`ChartScope`] and one [`AccessLevel`]:
//! elevated callers count every non-archived project in the scope, members
//! only the projects they belong to and, within those, the tasks they report
//! or are assigned to.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    project::ProjectStatus,
    sprint::SprintStatus,
    task::{TaskPriority, TaskType},
    workflow::StatusCategory,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartScope {
    Organization(Uuid),
    Workspace(Uuid),
    Project(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Elevated,
    Member(Uuid),
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Projects,
    Tasks,
    /// Tasks joined with their assignees' user rows.
    Assignments,
    Sprints,
}

impl Source {
    fn from_clause(self) -> &'static str {
        match self {
            Source::Projects => " FROM projects p JOIN workspaces w ON w.id = p.workspace_id",
            Source::Tasks => {
                " FROM tasks t
                  JOIN projects p ON p.id = t.project_id
                  JOIN workspaces w ON w.id = p.workspace_id
                  JOIN task_statuses s ON s.id = t.status_id"
            }
            Source::Assignments => {
                " FROM tasks t
                  JOIN projects p ON p.id = t.project_id
                  JOIN workspaces w ON w.id = p.workspace_id
                  JOIN task_statuses s ON s.id = t.status_id
                  JOIN task_assignees a ON a.task_id = t.id
                  JOIN users u ON u.id = a.user_id"
            }
            Source::Sprints => {
                " FROM sprints sp
                  JOIN projects p ON p.id = sp.project_id
                  JOIN workspaces w ON w.id = p.workspace_id"
            }
        }
    }
}

fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, source: Source, scope: ChartScope, access: AccessLevel) {
    builder.push(source.from_clause());
    builder.push(" WHERE NOT p.archived AND ");
    match scope {
        ChartScope::Organization(id) => builder.push("w.organization_id = ").push_bind(id),
        ChartScope::Workspace(id) => builder.push("p.workspace_id = ").push_bind(id),
        ChartScope::Project(id) => builder.push("p.id = ").push_bind(id),
    };

    if let AccessLevel::Member(user_id) = access {
        builder
            .push(" AND EXISTS (SELECT 1 FROM project_members pm WHERE pm.project_id = p.id AND pm.user_id = ")
            .push_bind(user_id)
            .push(")");
        if matches!(source, Source::Tasks | Source::Assignments) {
            builder
                .push(" AND (t.reporter_id = ")
                .push_bind(user_id)
                .push(" OR EXISTS (SELECT 1 FROM task_assignees ta WHERE ta.task_id = t.id AND ta.user_id = ")
                .push_bind(user_id)
                .push("))");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct KpiMetrics {
    pub total_projects: i64,
    pub active_projects: i64,
    pub completed_projects: i64,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub overdue_tasks: i64,
    /// Percent of tasks completed, rounded to two decimals.
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, TS)]
pub struct ProjectStatusCount {
    pub status: ProjectStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, TS)]
pub struct PriorityCount {
    pub priority: TaskPriority,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, TS)]
pub struct TypeCount {
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, TS)]
pub struct CategoryCount {
    pub category: StatusCategory,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, TS)]
pub struct SprintStatusCount {
    pub status: SprintStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct MonthlyCount {
    /// 1 = January.
    pub month: u32,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, TS)]
pub struct WorkloadEntry {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub open_tasks: i64,
}

pub fn completion_rate(completed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let rate = completed as f64 * 100.0 / total as f64;
    (rate * 100.0).round() / 100.0
}

/// Spreads sparse `(month, count)` rows over all twelve months.
pub fn fill_months(rows: &[(i32, i64)]) -> Vec<MonthlyCount> {
    (1..=12u32)
        .map(|month| MonthlyCount {
            month,
            count: rows
                .iter()
                .find(|(m, _)| *m == month as i32)
                .map_or(0, |(_, c)| *c),
        })
        .collect()
}

/// `[Jan 1 of year, Jan 1 of year + 1)` in UTC.
fn year_bounds(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
    let end = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single()?;
    Some((start, end))
}

pub struct Charts;

impl Charts {
    pub async fn kpi_metrics(
        pool: &PgPool,
        scope: ChartScope,
        access: AccessLevel,
    ) -> Result<KpiMetrics, sqlx::Error> {
        let mut projects = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE p.status = 'active'),
                    COUNT(*) FILTER (WHERE p.status = 'completed')",
        );
        push_scope(&mut projects, Source::Projects, scope, access);
        let (total_projects, active_projects, completed_projects) = projects
            .build_query_as::<(i64, i64, i64)>()
            .fetch_one(pool)
            .await?;

        let mut tasks = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE s.category = 'done'),
                    COUNT(*) FILTER (WHERE t.due_date < NOW() AND s.category <> 'done')",
        );
        push_scope(&mut tasks, Source::Tasks, scope, access);
        let (total_tasks, completed_tasks, overdue_tasks) = tasks
            .build_query_as::<(i64, i64, i64)>()
            .fetch_one(pool)
            .await?;

        Ok(KpiMetrics {
            total_projects,
            active_projects,
            completed_projects,
            total_tasks,
            completed_tasks,
            overdue_tasks,
            completion_rate: completion_rate(completed_tasks, total_tasks),
        })
    }

    pub async fn project_status_distribution(
        pool: &PgPool,
        scope: ChartScope,
        access: AccessLevel,
    ) -> Result<Vec<ProjectStatusCount>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT p.status, COUNT(*) AS count");
        push_scope(&mut builder, Source::Projects, scope, access);
        builder.push(" GROUP BY p.status ORDER BY p.status");
        builder.build_query_as().fetch_all(pool).await
    }

    pub async fn task_priority_breakdown(
        pool: &PgPool,
        scope: ChartScope,
        access: AccessLevel,
    ) -> Result<Vec<PriorityCount>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT t.priority, COUNT(*) AS count");
        push_scope(&mut builder, Source::Tasks, scope, access);
        builder.push(" GROUP BY t.priority ORDER BY t.priority");
        builder.build_query_as().fetch_all(pool).await
    }

    pub async fn task_type_distribution(
        pool: &PgPool,
        scope: ChartScope,
        access: AccessLevel,
    ) -> Result<Vec<TypeCount>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT t.type, COUNT(*) AS count");
        push_scope(&mut builder, Source::Tasks, scope, access);
        builder.push(" GROUP BY t.type ORDER BY t.type");
        builder.build_query_as().fetch_all(pool).await
    }

    pub async fn task_status_distribution(
        pool: &PgPool,
        scope: ChartScope,
        access: AccessLevel,
    ) -> Result<Vec<CategoryCount>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT s.category, COUNT(*) AS count");
        push_scope(&mut builder, Source::Tasks, scope, access);
        builder.push(" GROUP BY s.category ORDER BY s.category");
        builder.build_query_as().fetch_all(pool).await
    }

    pub async fn sprint_status_overview(
        pool: &PgPool,
        scope: ChartScope,
        access: AccessLevel,
    ) -> Result<Vec<SprintStatusCount>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT sp.status, COUNT(*) AS count");
        push_scope(&mut builder, Source::Sprints, scope, access);
        builder.push(" AND NOT sp.archived GROUP BY sp.status ORDER BY sp.status");
        builder.build_query_as().fetch_all(pool).await
    }

    pub async fn monthly_task_completion(
        pool: &PgPool,
        scope: ChartScope,
        access: AccessLevel,
        year: i32,
    ) -> Result<Vec<MonthlyCount>, sqlx::Error> {
        let Some((start, end)) = year_bounds(year) else {
            return Ok(fill_months(&[]));
        };
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT EXTRACT(MONTH FROM t.completed_at AT TIME ZONE 'UTC')::int AS month, COUNT(*) AS count",
        );
        push_scope(&mut builder, Source::Tasks, scope, access);
        builder
            .push(" AND t.completed_at >= ")
            .push_bind(start)
            .push(" AND t.completed_at < ")
            .push_bind(end)
            .push(" GROUP BY 1");
        let rows = builder.build_query_as::<(i32, i64)>().fetch_all(pool).await?;
        Ok(fill_months(&rows))
    }

    pub async fn workload_distribution(
        pool: &PgPool,
        scope: ChartScope,
        access: AccessLevel,
    ) -> Result<Vec<WorkloadEntry>, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT u.id AS user_id, u.first_name, u.last_name, u.email, COUNT(*) AS open_tasks",
        );
        push_scope(&mut builder, Source::Assignments, scope, access);
        builder.push(
            " AND s.category <> 'done'
              GROUP BY u.id, u.first_name, u.last_name, u.email
              ORDER BY open_tasks DESC, u.first_name ASC",
        );
        builder.build_query_as().fetch_all(pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_rate_rounds_to_two_decimals() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(1, 3), 33.33);
        assert_eq!(completion_rate(2, 3), 66.67);
        assert_eq!(completion_rate(5, 5), 100.0);
    }

    #[test]
    fn fill_months_zeroes_missing_months() {
        let months = fill_months(&[(2, 4), (12, 1)]);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0], MonthlyCount { month: 1, count: 0 });
        assert_eq!(months[1], MonthlyCount { month: 2, count: 4 });
        assert_eq!(months[11], MonthlyCount { month: 12, count: 1 });
    }

    #[test]
    fn member_scope_filters_tasks_by_involvement() {
        let user = Uuid::new_v4();
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_scope(
            &mut builder,
            Source::Tasks,
            ChartScope::Project(Uuid::new_v4()),
            AccessLevel::Member(user),
        );
        let sql = builder.sql();
        assert!(sql.contains("p.id = $1"));
        assert!(sql.contains("pm.user_id = $2"));
        assert!(sql.contains("t.reporter_id = $3"));
        assert!(sql.contains("ta.user_id = $4"));
    }

    #[test]
    fn elevated_scope_has_no_membership_filter() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_scope(
            &mut builder,
            Source::Projects,
            ChartScope::Organization(Uuid::new_v4()),
            AccessLevel::Elevated,
        );
        let sql = builder.sql();
        assert!(sql.contains("w.organization_id = $1"));
        assert!(!sql.contains("project_members"));
    }
}
