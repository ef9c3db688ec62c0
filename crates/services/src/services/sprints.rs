//! Sprint lifecycle: PLANNING -> ACTIVE -> COMPLETED.
//!
//! Every project owns one default sprint (the backlog). It is never started,
//! completed or deleted; unfinished work of a completed or deleted sprint
//! falls back into it.

use chrono::{DateTime, Duration, Utc};
use db::{
    models::{
        access::AccessScope,
        role::MemberRole,
        sprint::{NewSprint, Sprint, SprintChanges, SprintStatus},
    },
    validation,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    access::{Actor, require, require_sprint},
    error::ServiceError,
};

/// Length of a sprint started without an explicit end date.
pub const DEFAULT_SPRINT_DAYS: i64 = 14;

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateSprint {
    pub name: String,
    pub goal: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateSprint {
    pub name: Option<String>,
    pub goal: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub archived: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct StartSprint {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct SprintCompletion {
    pub sprint: Sprint,
    /// Unfinished tasks moved back to the default sprint.
    pub moved_tasks: u64,
}

/// Resolves the dates a sprint starts with: explicit values win, then the
/// dates planned on the sprint, then now and now + [`DEFAULT_SPRINT_DAYS`].
fn start_dates(
    sprint: &Sprint,
    request: &StartSprint,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
    let start = request.start_date.or(sprint.start_date).unwrap_or(now);
    let end = request
        .end_date
        .or(sprint.end_date)
        .unwrap_or(start + Duration::days(DEFAULT_SPRINT_DAYS));
    validation::date_range("start_date", Some(&start), "end_date", Some(&end))?;
    Ok((start, end))
}

async fn default_sprint(pool: &PgPool, project_id: Uuid) -> Result<Sprint, ServiceError> {
    Sprint::find_default(pool, project_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("default sprint"))
}

#[tracing::instrument(name = "sprints.create", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn create(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
    data: CreateSprint,
) -> Result<Sprint, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Manager).await?;
    validation::date_range(
        "start_date",
        data.start_date.as_ref(),
        "end_date",
        data.end_date.as_ref(),
    )?;
    let sprint = Sprint::create(
        pool,
        &NewSprint {
            project_id,
            name: validation::name("name", &data.name)?,
            goal: validation::description(data.goal)?,
            start_date: data.start_date,
            end_date: data.end_date,
            is_default: false,
            created_by: Some(actor.id),
        },
    )
    .await?;
    tracing::info!(sprint_id = %sprint.id, "sprint created");
    Ok(sprint)
}

pub async fn list(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
    status: Option<SprintStatus>,
) -> Result<Vec<Sprint>, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Viewer).await?;
    Ok(Sprint::list_for_project(pool, project_id, status).await?)
}

pub async fn get(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<Sprint, ServiceError> {
    let (sprint, _) = require_sprint(pool, actor, id, MemberRole::Viewer).await?;
    Ok(sprint)
}

#[tracing::instrument(name = "sprints.update", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn update(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    data: UpdateSprint,
) -> Result<Sprint, ServiceError> {
    let (sprint, _) = require_sprint(pool, actor, id, MemberRole::Manager).await?;
    if sprint.is_default && data.archived == Some(true) {
        return Err(ServiceError::bad_request("the default sprint cannot be archived"));
    }
    validation::date_range(
        "start_date",
        data.start_date.as_ref().or(sprint.start_date.as_ref()),
        "end_date",
        data.end_date.as_ref().or(sprint.end_date.as_ref()),
    )?;
    let changes = SprintChanges {
        name: data
            .name
            .as_deref()
            .map(|n| validation::name("name", n))
            .transpose()?,
        goal: validation::description(data.goal)?,
        start_date: data.start_date,
        end_date: data.end_date,
        archived: data.archived,
    };
    Sprint::update(pool, id, &changes)
        .await?
        .ok_or_else(|| ServiceError::not_found("sprint"))
}

/// Starts a PLANNING sprint. A project has at most one ACTIVE sprint.
#[tracing::instrument(name = "sprints.start", skip(pool, actor, request), fields(user_id = %actor.id))]
pub async fn start(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
    request: StartSprint,
) -> Result<Sprint, ServiceError> {
    let (sprint, _) = require_sprint(pool, actor, id, MemberRole::Manager).await?;
    if sprint.is_default {
        return Err(ServiceError::bad_request("the default sprint cannot be started"));
    }
    if sprint.status != SprintStatus::Planning {
        return Err(ServiceError::bad_request(format!(
            "only PLANNING sprints can be started, this one is {}",
            sprint.status
        )));
    }
    if Sprint::find_active(pool, sprint.project_id).await?.is_some() {
        return Err(ServiceError::conflict("the project already has an active sprint"));
    }

    let (start, end) = start_dates(&sprint, &request, Utc::now())?;
    let started = Sprint::set_status(pool, id, SprintStatus::Active, Some(start), Some(end))
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                ServiceError::conflict("the project already has an active sprint")
            } else {
                e.into()
            }
        })?;
    tracing::info!(sprint_id = %id, "sprint started");
    Ok(started)
}

/// Completes an ACTIVE sprint and moves its unfinished tasks to the default sprint.
#[tracing::instrument(name = "sprints.complete", skip(pool, actor), fields(user_id = %actor.id))]
pub async fn complete(
    pool: &PgPool,
    actor: &Actor,
    id: Uuid,
) -> Result<SprintCompletion, ServiceError> {
    let (sprint, _) = require_sprint(pool, actor, id, MemberRole::Manager).await?;
    if sprint.status != SprintStatus::Active {
        return Err(ServiceError::bad_request("only ACTIVE sprints can be completed"));
    }
    let backlog = default_sprint(pool, sprint.project_id).await?;

    let mut tx = pool.begin().await?;
    let moved_tasks = Sprint::move_tasks(&mut *tx, id, backlog.id, true).await?;
    let sprint = Sprint::set_status(&mut *tx, id, SprintStatus::Completed, None, None).await?;
    tx.commit().await?;

    tracing::info!(sprint_id = %id, moved_tasks, "sprint completed");
    Ok(SprintCompletion { sprint, moved_tasks })
}

/// Deletes a sprint after moving all of its tasks to the default sprint.
#[tracing::instrument(name = "sprints.delete", skip(pool, actor), fields(user_id = %actor.id))]
pub async fn delete(pool: &PgPool, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
    let (sprint, _) = require_sprint(pool, actor, id, MemberRole::Manager).await?;
    if sprint.is_default {
        return Err(ServiceError::bad_request("the default sprint cannot be deleted"));
    }
    let backlog = default_sprint(pool, sprint.project_id).await?;

    let mut tx = pool.begin().await?;
    let moved = Sprint::move_tasks(&mut *tx, id, backlog.id, false).await?;
    Sprint::delete(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!(sprint_id = %id, moved, "sprint deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sprint(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Sprint {
        let now = Utc::now();
        Sprint {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "Sprint 1".into(),
            goal: None,
            status: SprintStatus::Planning,
            start_date: start,
            end_date: end,
            is_default: false,
            archived: false,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn start_defaults_to_two_weeks_from_now() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let (start, end) = start_dates(&sprint(None, None), &StartSprint::default(), now).unwrap();
        assert_eq!(start, now);
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap());
    }

    #[test]
    fn planned_dates_are_kept_unless_overridden() {
        let planned_start = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let planned_end = Utc.with_ymd_and_hms(2025, 4, 10, 0, 0, 0).unwrap();
        let planned = sprint(Some(planned_start), Some(planned_end));
        let now = Utc::now();

        let (start, end) = start_dates(&planned, &StartSprint::default(), now).unwrap();
        assert_eq!((start, end), (planned_start, planned_end));

        let override_end = Utc.with_ymd_and_hms(2025, 4, 20, 0, 0, 0).unwrap();
        let request = StartSprint {
            start_date: None,
            end_date: Some(override_end),
        };
        let (_, end) = start_dates(&planned, &request, now).unwrap();
        assert_eq!(end, override_end);
    }

    #[test]
    fn end_before_start_is_rejected() {
        let request = StartSprint {
            start_date: Some(Utc.with_ymd_and_hms(2025, 5, 10, 0, 0, 0).unwrap()),
            end_date: Some(Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap()),
        };
        assert!(matches!(
            start_dates(&sprint(None, None), &request, Utc::now()),
            Err(ServiceError::BadRequest(_))
        ));
    }
}
