use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use db::models::sprint::{Sprint, SprintStatus};
use serde::Deserialize;
use services::services::sprints::{self, CreateSprint, SprintCompletion, StartSprint, UpdateSprint};
use tracing::instrument;
use uuid::Uuid;

use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

#[derive(Debug, Default, Deserialize)]
struct SprintQuery {
    status: Option<SprintStatus>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{id}/sprints",
            get(list_sprints).post(create_sprint),
        )
        .route(
            "/sprints/{id}",
            get(get_sprint).patch(update_sprint).delete(delete_sprint),
        )
        .route("/sprints/{id}/start", post(start_sprint))
        .route("/sprints/{id}/complete", post(complete_sprint))
}

async fn create_sprint(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<CreateSprint>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let sprint = sprints::create(state.pool(), &ctx.actor, project_id, payload).await?;
    Ok((StatusCode::CREATED, Json(sprint)))
}

async fn list_sprints(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<SprintQuery>,
) -> Result<Json<Vec<Sprint>>, ErrorResponse> {
    Ok(Json(
        sprints::list(state.pool(), &ctx.actor, project_id, query.status).await?,
    ))
}

async fn get_sprint(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Sprint>, ErrorResponse> {
    Ok(Json(sprints::get(state.pool(), &ctx.actor, id).await?))
}

async fn update_sprint(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSprint>,
) -> Result<Json<Sprint>, ErrorResponse> {
    Ok(Json(sprints::update(state.pool(), &ctx.actor, id, payload).await?))
}

#[instrument(name = "sprints.start", skip(state, ctx, payload), fields(user_id = %ctx.user.id, sprint_id = %id))]
async fn start_sprint(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StartSprint>,
) -> Result<Json<Sprint>, ErrorResponse> {
    Ok(Json(sprints::start(state.pool(), &ctx.actor, id, payload).await?))
}

#[instrument(name = "sprints.complete", skip(state, ctx), fields(user_id = %ctx.user.id, sprint_id = %id))]
async fn complete_sprint(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<SprintCompletion>, ErrorResponse> {
    Ok(Json(sprints::complete(state.pool(), &ctx.actor, id).await?))
}

async fn delete_sprint(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    sprints::delete(state.pool(), &ctx.actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
