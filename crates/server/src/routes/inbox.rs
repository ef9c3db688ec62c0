use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use db::models::inbox::{
    EmailAccount, InboxMessage, InboxRule, NewInboxMessage, ProjectInbox,
};
use services::services::inbox::{
    self, CreateInboxRule, InboxView, IngestOutcome, MessageQuery, SetEmailAccount, SyncReport,
    UpdateInboxRule, UpsertInbox,
};
use tracing::instrument;
use utils::api::pagination::{Paginated, PaginationParams};
use uuid::Uuid;

use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{id}/inbox",
            get(get_settings).put(upsert_settings),
        )
        .route("/projects/{id}/inbox/account", put(set_email_account))
        .route(
            "/projects/{id}/inbox/rules",
            get(list_rules).post(create_rule),
        )
        .route(
            "/projects/{id}/inbox/messages",
            get(list_messages).post(ingest_message),
        )
        .route("/projects/{id}/inbox/sync-status", post(record_sync))
        .route("/inbox-rules/{id}", patch(update_rule).delete(delete_rule))
        .route("/inbox-messages/{id}/convert", post(convert_message))
        .route("/inbox-messages/{id}/ignore", post(ignore_message))
}

async fn get_settings(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<InboxView>, ErrorResponse> {
    Ok(Json(
        inbox::get_settings(state.pool(), &ctx.actor, project_id).await?,
    ))
}

async fn upsert_settings(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<UpsertInbox>,
) -> Result<Json<ProjectInbox>, ErrorResponse> {
    Ok(Json(
        inbox::upsert_settings(state.pool(), &ctx.actor, project_id, payload).await?,
    ))
}

#[instrument(
    name = "inbox.set_email_account",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id, project_id = %project_id)
)]
async fn set_email_account(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<SetEmailAccount>,
) -> Result<Json<EmailAccount>, ErrorResponse> {
    let account = inbox::set_email_account(
        state.pool(),
        &ctx.actor,
        &state.cipher,
        project_id,
        payload,
    )
    .await?;
    Ok(Json(account))
}

async fn list_rules(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Vec<InboxRule>>, ErrorResponse> {
    Ok(Json(
        inbox::list_rules(state.pool(), &ctx.actor, project_id).await?,
    ))
}

async fn create_rule(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<CreateInboxRule>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let rule = inbox::create_rule(state.pool(), &ctx.actor, project_id, payload).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_rule(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateInboxRule>,
) -> Result<Json<InboxRule>, ErrorResponse> {
    Ok(Json(
        inbox::update_rule(state.pool(), &ctx.actor, id, payload).await?,
    ))
}

async fn delete_rule(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    inbox::delete_rule(state.pool(), &ctx.actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(
    name = "inbox.ingest_message",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id, project_id = %project_id, message_id = %payload.message_id)
)]
async fn ingest_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<NewInboxMessage>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let outcome = inbox::ingest_message(state.pool(), &ctx.actor, project_id, payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn list_messages(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<InboxMessage>>, ErrorResponse> {
    Ok(Json(
        inbox::list_messages(state.pool(), &ctx.actor, project_id, &query, &params).await?,
    ))
}

async fn convert_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<IngestOutcome>, ErrorResponse> {
    Ok(Json(
        inbox::convert_message(state.pool(), &ctx.actor, id).await?,
    ))
}

async fn ignore_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<InboxMessage>, ErrorResponse> {
    Ok(Json(
        inbox::ignore_message(state.pool(), &ctx.actor, id).await?,
    ))
}

async fn record_sync(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<SyncReport>,
) -> Result<Json<ProjectInbox>, ErrorResponse> {
    Ok(Json(
        inbox::record_sync(state.pool(), &ctx.actor, project_id, payload).await?,
    ))
}
