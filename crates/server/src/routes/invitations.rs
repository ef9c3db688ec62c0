use axum::{
    Json, Router,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use db::models::invitation::{
    Invitation, InvitationStatus, InvitationTarget, InvitationWithContext,
};
use serde::Deserialize;
use services::services::invitations::CreateInvitation;
use tracing::instrument;
use uuid::Uuid;

use crate::{AppState, error::ErrorResponse, middleware::RequestContext};

/// Exactly one of the target ids selects whose invitations are listed.
#[derive(Debug, Default, Deserialize)]
struct InvitationQuery {
    organization_id: Option<Uuid>,
    workspace_id: Option<Uuid>,
    project_id: Option<Uuid>,
    status: Option<InvitationStatus>,
}

impl InvitationQuery {
    fn target(&self) -> Result<InvitationTarget, ErrorResponse> {
        match (self.organization_id, self.workspace_id, self.project_id) {
            (Some(id), None, None) => Ok(InvitationTarget::Organization(id)),
            (None, Some(id), None) => Ok(InvitationTarget::Workspace(id)),
            (None, None, Some(id)) => Ok(InvitationTarget::Project(id)),
            _ => Err(ErrorResponse::bad_request(
                "exactly one of organization_id, workspace_id or project_id is required",
            )),
        }
    }
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/invitations/token/{token}", get(get_invitation_by_token))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route(
            "/invitations",
            get(list_invitations).post(create_invitation),
        )
        .route("/invitations/mine", get(list_my_invitations))
        .route("/invitations/{id}", delete(cancel_invitation))
        .route("/invitations/{id}/accept", post(accept_invitation))
        .route("/invitations/{id}/decline", post(decline_invitation))
        .route("/invitations/{id}/resend", post(resend_invitation))
}

#[instrument(
    name = "invitations.create",
    skip(state, ctx, payload),
    fields(user_id = %ctx.user.id, invitee = %payload.email)
)]
async fn create_invitation(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateInvitation>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let invitation = state
        .invitations
        .create(state.pool(), &ctx.actor, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

async fn list_invitations(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<InvitationQuery>,
) -> Result<Json<Vec<InvitationWithContext>>, ErrorResponse> {
    let target = query.target()?;
    let invitations = state
        .invitations
        .list(state.pool(), &ctx.actor, target, query.status)
        .await?;
    Ok(Json(invitations))
}

async fn list_my_invitations(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Json<Vec<InvitationWithContext>>, ErrorResponse> {
    Ok(Json(
        state.invitations.list_mine(state.pool(), &ctx.actor).await?,
    ))
}

async fn get_invitation_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<InvitationWithContext>, ErrorResponse> {
    Ok(Json(
        state.invitations.get_by_token(state.pool(), &token).await?,
    ))
}

/// The `{id}` segment of accept and decline carries the invitation token.
#[instrument(name = "invitations.accept", skip(state, ctx, token), fields(user_id = %ctx.user.id))]
async fn accept_invitation(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(token): Path<String>,
) -> Result<Json<Invitation>, ErrorResponse> {
    Ok(Json(
        state
            .invitations
            .accept(state.pool(), &ctx.actor, &token)
            .await?,
    ))
}

#[instrument(name = "invitations.decline", skip(state, ctx, token), fields(user_id = %ctx.user.id))]
async fn decline_invitation(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(token): Path<String>,
) -> Result<Json<Invitation>, ErrorResponse> {
    Ok(Json(
        state
            .invitations
            .decline(state.pool(), &ctx.actor, &token)
            .await?,
    ))
}

async fn resend_invitation(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Invitation>, ErrorResponse> {
    Ok(Json(
        state.invitations.resend(state.pool(), &ctx.actor, id).await?,
    ))
}

async fn cancel_invitation(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ErrorResponse> {
    state.invitations.cancel(state.pool(), &ctx.actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_requires_exactly_one_target() {
        let id = Uuid::new_v4();
        let query = InvitationQuery {
            workspace_id: Some(id),
            ..Default::default()
        };
        assert_eq!(query.target().unwrap(), InvitationTarget::Workspace(id));

        let none = InvitationQuery::default();
        assert_eq!(none.target().unwrap_err().status(), StatusCode::BAD_REQUEST);

        let both = InvitationQuery {
            organization_id: Some(id),
            project_id: Some(id),
            ..Default::default()
        };
        assert!(both.target().is_err());
    }
}
