use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use services::services::auth::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest,
};
use tracing::instrument;

use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(change_password))
}

#[instrument(name = "auth.register", skip(state, payload), fields(email = %payload.email))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let response = state.auth.register(state.pool(), payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[instrument(name = "auth.login", skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ErrorResponse> {
    Ok(Json(state.auth.login(state.pool(), payload).await?))
}

#[instrument(name = "auth.refresh", skip(state, payload))]
async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ErrorResponse> {
    Ok(Json(
        state
            .auth
            .refresh(state.pool(), &payload.refresh_token)
            .await?,
    ))
}

#[instrument(name = "auth.logout", skip(state, ctx), fields(user_id = %ctx.user.id))]
async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<StatusCode, ErrorResponse> {
    state.auth.logout(state.pool(), ctx.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(name = "auth.change_password", skip(state, ctx, payload), fields(user_id = %ctx.user.id))]
async fn change_password(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ErrorResponse> {
    state
        .auth
        .change_password(state.pool(), ctx.user.id, payload)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
