use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use db::models::task::TaskWithDetails;
use serde::Deserialize;
use services::services::tasks::{
    self, BoardColumn, CreateTask, SetAssignees, TaskQuery, UpdateTask,
};
use tracing::instrument;
use utils::api::pagination::{Paginated, PaginationParams};
use uuid::Uuid;

use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

#[derive(Debug, Default, Deserialize)]
struct BoardQuery {
    sprint_id: Option<Uuid>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/projects/{id}/tasks", post(create_task))
        .route("/projects/{id}/tasks/slug/{slug}", get(get_task_by_slug))
        .route("/projects/{id}/board", get(board))
        .route(
            "/tasks/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tasks/{id}/assignees", put(set_assignees))
        .route("/tasks/{id}/subtasks", get(list_subtasks))
}

#[instrument(
    name = "tasks.create",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id, project_id = %project_id)
)]
async fn create_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<CreateTask>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let task = tasks::create(state.pool(), &ctx.actor, project_id, payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<TaskQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<TaskWithDetails>>, ErrorResponse> {
    Ok(Json(
        tasks::list(state.pool(), &ctx.actor, &query, &params).await?,
    ))
}

async fn get_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskWithDetails>, ErrorResponse> {
    Ok(Json(tasks::get(state.pool(), &ctx.actor, id).await?))
}

async fn get_task_by_slug(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((project_id, slug)): Path<(Uuid, String)>,
) -> Result<Json<TaskWithDetails>, ErrorResponse> {
    Ok(Json(
        tasks::get_by_slug(state.pool(), &ctx.actor, project_id, &slug).await?,
    ))
}

async fn update_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTask>,
) -> Result<Json<TaskWithDetails>, ErrorResponse> {
    Ok(Json(tasks::update(state.pool(), &ctx.actor, id, payload).await?))
}

#[instrument(name = "tasks.delete", skip(state, ctx), fields(user_id = %ctx.user.id, task_id = %id))]
async fn delete_task(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    tasks::delete(state.pool(), &ctx.actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_assignees(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetAssignees>,
) -> Result<Json<TaskWithDetails>, ErrorResponse> {
    Ok(Json(
        tasks::set_assignees(state.pool(), &ctx.actor, id, payload).await?,
    ))
}

async fn list_subtasks(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TaskWithDetails>>, ErrorResponse> {
    Ok(Json(tasks::subtasks(state.pool(), &ctx.actor, id).await?))
}

async fn board(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<Vec<BoardColumn>>, ErrorResponse> {
    Ok(Json(
        tasks::board(state.pool(), &ctx.actor, project_id, query.sprint_id).await?,
    ))
}
