//! Dashboard charts for an organization, workspace or project.
//!
//! Elevated callers (MANAGER and above on the scope, or super admins) see
//! scope-wide numbers; everyone else only their own projects and tasks.

use std::str::FromStr;

use chrono::{Datelike, Utc};
use db::models::{
    access::AccessScope,
    charts::{AccessLevel, ChartScope, Charts},
    role::MemberRole,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

use super::{
    access::{Actor, require},
    error::ServiceError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ChartType {
    KpiMetrics,
    ProjectStatusDistribution,
    TaskPriorityBreakdown,
    TaskTypeDistribution,
    TaskStatusDistribution,
    SprintStatusOverview,
    MonthlyTaskCompletion,
    WorkloadDistribution,
}

impl ChartType {
    /// Workload is only meaningful across several projects.
    fn available_for(self, scope: ChartScope) -> bool {
        match self {
            ChartType::WorkloadDistribution => !matches!(scope, ChartScope::Project(_)),
            _ => true,
        }
    }
}

/// `?types=kpi_metrics,task_type_distribution&year=2025`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartQuery {
    pub types: Option<String>,
    pub year: Option<i32>,
}

/// Charts keyed by their type name.
pub type ChartSet = Map<String, Value>;

fn access_scope(scope: ChartScope) -> AccessScope {
    match scope {
        ChartScope::Organization(id) => AccessScope::Organization(id),
        ChartScope::Workspace(id) => AccessScope::Workspace(id),
        ChartScope::Project(id) => AccessScope::Project(id),
    }
}

/// Requested chart types in declaration order, deduplicated. Omitted or
/// blank means every chart available for the scope.
pub fn parse_types(raw: Option<&str>, scope: ChartScope) -> Result<Vec<ChartType>, ServiceError> {
    let explicit = raw.map(str::trim).filter(|r| !r.is_empty());
    let requested: Vec<ChartType> = match explicit {
        None => ChartType::iter().collect(),
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                ChartType::from_str(part)
                    .map_err(|_| ServiceError::bad_request(format!("unknown chart type `{part}`")))
            })
            .collect::<Result<_, _>>()?,
    };

    let mut types = Vec::new();
    for chart in ChartType::iter() {
        if !requested.contains(&chart) {
            continue;
        }
        if !chart.available_for(scope) {
            if explicit.is_some() {
                return Err(ServiceError::bad_request(format!(
                    "chart `{chart}` is not available for this scope"
                )));
            }
            continue;
        }
        types.push(chart);
    }
    Ok(types)
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::Internal(e.to_string()))
}

async fn chart(
    pool: &PgPool,
    chart: ChartType,
    scope: ChartScope,
    access: AccessLevel,
    year: i32,
) -> Result<Value, ServiceError> {
    match chart {
        ChartType::KpiMetrics => to_value(Charts::kpi_metrics(pool, scope, access).await?),
        ChartType::ProjectStatusDistribution => {
            to_value(Charts::project_status_distribution(pool, scope, access).await?)
        }
        ChartType::TaskPriorityBreakdown => {
            to_value(Charts::task_priority_breakdown(pool, scope, access).await?)
        }
        ChartType::TaskTypeDistribution => {
            to_value(Charts::task_type_distribution(pool, scope, access).await?)
        }
        ChartType::TaskStatusDistribution => {
            to_value(Charts::task_status_distribution(pool, scope, access).await?)
        }
        ChartType::SprintStatusOverview => {
            to_value(Charts::sprint_status_overview(pool, scope, access).await?)
        }
        ChartType::MonthlyTaskCompletion => {
            to_value(Charts::monthly_task_completion(pool, scope, access, year).await?)
        }
        ChartType::WorkloadDistribution => {
            to_value(Charts::workload_distribution(pool, scope, access).await?)
        }
    }
}

#[tracing::instrument(name = "charts.get", skip(pool, actor, query), fields(user_id = %actor.id))]
pub async fn get(
    pool: &PgPool,
    actor: &Actor,
    scope: ChartScope,
    query: &ChartQuery,
) -> Result<ChartSet, ServiceError> {
    let access = require(pool, actor, access_scope(scope), MemberRole::Viewer).await?;
    let elevated = access.chain.is_elevated(actor.is_super_admin);
    let level = if elevated {
        AccessLevel::Elevated
    } else {
        AccessLevel::Member(actor.id)
    };
    let types = parse_types(query.types.as_deref(), scope)?;
    let year = query.year.unwrap_or_else(|| Utc::now().year());

    let mut charts = ChartSet::new();
    for chart_type in types {
        let value = chart(pool, chart_type, scope, level, year).await?;
        charts.insert(chart_type.to_string(), value);
    }
    tracing::debug!(charts = charts.len(), elevated, "charts computed");
    Ok(charts)
}

pub async fn for_organization(
    pool: &PgPool,
    actor: &Actor,
    organization_id: Uuid,
    query: &ChartQuery,
) -> Result<ChartSet, ServiceError> {
    get(pool, actor, ChartScope::Organization(organization_id), query).await
}

pub async fn for_workspace(
    pool: &PgPool,
    actor: &Actor,
    workspace_id: Uuid,
    query: &ChartQuery,
) -> Result<ChartSet, ServiceError> {
    get(pool, actor, ChartScope::Workspace(workspace_id), query).await
}

pub async fn for_project(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
    query: &ChartQuery,
) -> Result<ChartSet, ServiceError> {
    get(pool, actor, ChartScope::Project(project_id), query).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> ChartScope {
        ChartScope::Organization(Uuid::new_v4())
    }

    fn project() -> ChartScope {
        ChartScope::Project(Uuid::new_v4())
    }

    #[test]
    fn omitted_types_select_every_chart_for_the_scope() {
        assert_eq!(parse_types(None, org()).unwrap().len(), 8);
        let project_charts = parse_types(Some("  "), project()).unwrap();
        assert_eq!(project_charts.len(), 7);
        assert!(!project_charts.contains(&ChartType::WorkloadDistribution));
    }

    #[test]
    fn requested_types_are_deduplicated_in_declaration_order() {
        let types = parse_types(
            Some("task_type_distribution, KPI_METRICS,task_type_distribution"),
            org(),
        )
        .unwrap();
        assert_eq!(types, vec![ChartType::KpiMetrics, ChartType::TaskTypeDistribution]);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(matches!(
            parse_types(Some("kpi_metrics,burndown"), org()),
            Err(ServiceError::BadRequest(m)) if m.contains("burndown")
        ));
    }

    #[test]
    fn workload_is_rejected_for_projects() {
        assert!(matches!(
            parse_types(Some("workload_distribution"), project()),
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[test]
    fn chart_names_are_snake_case() {
        assert_eq!(ChartType::MonthlyTaskCompletion.to_string(), "monthly_task_completion");
    }
}
