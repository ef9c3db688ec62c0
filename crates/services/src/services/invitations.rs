//! Email invitations to organizations, workspaces and projects.
//!
//! An invitation carries a random token that is mailed to the invitee.
//! Accepting it grants the invited role on the target and plain MEMBER
//! access on the levels above it, all in one transaction.

use std::sync::Arc;

use chrono::{Duration, Utc};
use db::{
    models::{
        access::AccessScope,
        invitation::{
            Invitation, InvitationStatus, InvitationTarget, InvitationWithContext, NewInvitation,
        },
        member::{Member, MemberScope},
        project::Project,
        role::MemberRole,
        workspace::Workspace,
    },
    validation,
};
use rand::Rng;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    access::{Access, Actor, require},
    error::ServiceError,
    mailer::{InvitationEmail, Mailer, invitation_link},
};

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateInvitation {
    pub email: String,
    pub target: InvitationTarget,
    #[serde(default = "default_role")]
    pub role: MemberRole,
}

fn default_role() -> MemberRole {
    MemberRole::Member
}

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes)
}

fn access_scope(target: InvitationTarget) -> AccessScope {
    match target {
        InvitationTarget::Organization(id) => AccessScope::Organization(id),
        InvitationTarget::Workspace(id) => AccessScope::Workspace(id),
        InvitationTarget::Project(id) => AccessScope::Project(id),
    }
}

fn member_scope(target: InvitationTarget) -> MemberScope {
    match target {
        InvitationTarget::Organization(id) => MemberScope::Organization(id),
        InvitationTarget::Workspace(id) => MemberScope::Workspace(id),
        InvitationTarget::Project(id) => MemberScope::Project(id),
    }
}

fn target_of(invitation: &Invitation) -> Result<InvitationTarget, ServiceError> {
    invitation
        .target()
        .ok_or_else(|| ServiceError::Internal(format!("invitation {} has no target", invitation.id)))
}

fn addressed_to(invitation: &Invitation, actor: &Actor) -> Result<(), ServiceError> {
    if invitation.invitee_email.eq_ignore_ascii_case(&actor.email) {
        Ok(())
    } else {
        Err(ServiceError::forbidden("this invitation was sent to another email address"))
    }
}

#[derive(Clone)]
pub struct InvitationService {
    mailer: Arc<dyn Mailer>,
    public_base_url: String,
    ttl: Duration,
}

impl InvitationService {
    pub fn new(mailer: Arc<dyn Mailer>, public_base_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            mailer,
            public_base_url: public_base_url.into(),
            ttl,
        }
    }

    /// Inviting needs MANAGER on the target, and only owners invite owners.
    async fn require_manager(
        &self,
        pool: &PgPool,
        actor: &Actor,
        target: InvitationTarget,
        role: MemberRole,
    ) -> Result<Access, ServiceError> {
        let access = require(pool, actor, access_scope(target), MemberRole::Manager).await?;
        if role == MemberRole::Owner && access.role != MemberRole::Owner {
            return Err(ServiceError::forbidden("only an OWNER can invite an OWNER"));
        }
        Ok(access)
    }

    async fn send(&self, pool: &PgPool, invitation: &Invitation) -> Result<(), ServiceError> {
        let Some(context) = Invitation::find_with_context_by_token(pool, &invitation.token).await? else {
            return Err(ServiceError::not_found("invitation"));
        };
        let email = InvitationEmail {
            to: invitation.invitee_email.clone(),
            inviter_name: context.inviter_name,
            target_name: context.target_name,
            role: invitation.role,
            link: invitation_link(&self.public_base_url, &invitation.token),
            expires_at: invitation.expires_at,
        };
        // The invitation stays valid when delivery fails; it can be resent.
        if let Err(e) = self.mailer.send_invitation(&email).await {
            tracing::error!(invitation_id = %invitation.id, error = %e, "failed to send invitation email");
        }
        Ok(())
    }

    #[tracing::instrument(name = "invitations.create", skip(self, pool, actor, data), fields(user_id = %actor.id))]
    pub async fn create(
        &self,
        pool: &PgPool,
        actor: &Actor,
        data: CreateInvitation,
    ) -> Result<Invitation, ServiceError> {
        let email = validation::email(&data.email)?;
        self.require_manager(pool, actor, data.target, data.role).await?;

        if Member::email_is_member(pool, member_scope(data.target), &email).await? {
            return Err(ServiceError::conflict(format!("{email} is already a member")));
        }
        if Invitation::pending_exists(pool, &email, data.target).await? {
            return Err(ServiceError::conflict(format!(
                "{email} already has a pending invitation"
            )));
        }

        let invitation = Invitation::create(
            pool,
            &NewInvitation {
                invitee_email: email,
                inviter_id: actor.id,
                target: data.target,
                role: data.role,
                token: generate_token(),
                expires_at: Utc::now() + self.ttl,
            },
        )
        .await?;
        tracing::info!(invitation_id = %invitation.id, target = ?data.target, "invitation created");
        self.send(pool, &invitation).await?;
        Ok(invitation)
    }

    pub async fn list(
        &self,
        pool: &PgPool,
        actor: &Actor,
        target: InvitationTarget,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<InvitationWithContext>, ServiceError> {
        require(pool, actor, access_scope(target), MemberRole::Manager).await?;
        Ok(Invitation::list_for_target(pool, target, status).await?)
    }

    /// Pending, unexpired invitations addressed to the caller.
    pub async fn list_mine(
        &self,
        pool: &PgPool,
        actor: &Actor,
    ) -> Result<Vec<InvitationWithContext>, ServiceError> {
        Ok(Invitation::list_pending_for_email(pool, &actor.email).await?)
    }

    /// Public lookup used by the accept page before the invitee signs in.
    pub async fn get_by_token(
        &self,
        pool: &PgPool,
        token: &str,
    ) -> Result<InvitationWithContext, ServiceError> {
        Invitation::find_with_context_by_token(pool, token)
            .await?
            .ok_or_else(|| ServiceError::not_found("invitation"))
    }

    #[tracing::instrument(name = "invitations.accept", skip(self, pool, actor, token), fields(user_id = %actor.id))]
    pub async fn accept(
        &self,
        pool: &PgPool,
        actor: &Actor,
        token: &str,
    ) -> Result<Invitation, ServiceError> {
        let mut tx = pool.begin().await?;
        let invitation = Invitation::find_by_token_for_update(&mut *tx, token)
            .await?
            .ok_or_else(|| ServiceError::not_found("invitation"))?;
        addressed_to(&invitation, actor)?;
        if invitation.status != InvitationStatus::Pending {
            return Err(ServiceError::bad_request(format!(
                "invitation is {}",
                invitation.status
            )));
        }
        if invitation.is_expired_at(Utc::now()) {
            Invitation::set_status(&mut *tx, invitation.id, InvitationStatus::Expired).await?;
            tx.commit().await?;
            return Err(ServiceError::bad_request("invitation has expired"));
        }

        let target = target_of(&invitation)?;
        grant_memberships(&mut tx, target, actor.id, invitation.role).await?;
        let accepted = Invitation::set_status(&mut *tx, invitation.id, InvitationStatus::Accepted).await?;
        tx.commit().await?;

        tracing::info!(invitation_id = %accepted.id, ?target, "invitation accepted");
        Ok(accepted)
    }

    pub async fn decline(
        &self,
        pool: &PgPool,
        actor: &Actor,
        token: &str,
    ) -> Result<Invitation, ServiceError> {
        let mut tx = pool.begin().await?;
        let invitation = Invitation::find_by_token_for_update(&mut *tx, token)
            .await?
            .ok_or_else(|| ServiceError::not_found("invitation"))?;
        addressed_to(&invitation, actor)?;
        if invitation.status != InvitationStatus::Pending {
            return Err(ServiceError::bad_request(format!(
                "invitation is {}",
                invitation.status
            )));
        }
        let declined = Invitation::set_status(&mut *tx, invitation.id, InvitationStatus::Declined).await?;
        tx.commit().await?;
        Ok(declined)
    }

    /// Issues a new token and expiry for a pending or expired invitation and
    /// mails it again.
    #[tracing::instrument(name = "invitations.resend", skip(self, pool, actor), fields(user_id = %actor.id))]
    pub async fn resend(
        &self,
        pool: &PgPool,
        actor: &Actor,
        id: Uuid,
    ) -> Result<Invitation, ServiceError> {
        let invitation = Invitation::find_by_id(pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("invitation"))?;
        self.require_manager(pool, actor, target_of(&invitation)?, invitation.role)
            .await?;
        if !matches!(
            invitation.status,
            InvitationStatus::Pending | InvitationStatus::Expired
        ) {
            return Err(ServiceError::bad_request(format!(
                "a {} invitation cannot be resent",
                invitation.status
            )));
        }

        let renewed = Invitation::renew(pool, id, &generate_token(), Utc::now() + self.ttl).await?;
        self.send(pool, &renewed).await?;
        Ok(renewed)
    }

    pub async fn cancel(&self, pool: &PgPool, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
        let invitation = Invitation::find_by_id(pool, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("invitation"))?;
        require(
            pool,
            actor,
            access_scope(target_of(&invitation)?),
            MemberRole::Manager,
        )
        .await?;
        if invitation.status != InvitationStatus::Pending {
            return Err(ServiceError::bad_request(format!(
                "invitation is {}",
                invitation.status
            )));
        }
        Invitation::set_status(pool, id, InvitationStatus::Cancelled).await?;
        tracing::info!(invitation_id = %id, "invitation cancelled");
        Ok(())
    }
}

/// Adds the invited role on the target and MEMBER on each level above it.
/// Existing memberships keep their role.
async fn grant_memberships(
    conn: &mut PgConnection,
    target: InvitationTarget,
    user_id: Uuid,
    role: MemberRole,
) -> Result<(), ServiceError> {
    let organization_id = match target {
        InvitationTarget::Organization(id) => id,
        InvitationTarget::Workspace(id) => {
            Workspace::find_by_id(&mut *conn, id)
                .await?
                .ok_or_else(|| ServiceError::not_found("workspace"))?
                .organization_id
        }
        InvitationTarget::Project(id) => {
            let lineage = Project::lineage(&mut *conn, id)
                .await?
                .ok_or_else(|| ServiceError::not_found("project"))?;
            Member::add_if_absent(
                &mut *conn,
                MemberScope::Workspace(lineage.workspace_id),
                user_id,
                MemberRole::Member,
            )
            .await?;
            lineage.organization_id
        }
    };

    if !matches!(target, InvitationTarget::Organization(_)) {
        Member::add_if_absent(
            &mut *conn,
            MemberScope::Organization(organization_id),
            user_id,
            MemberRole::Member,
        )
        .await?;
    }
    Member::add_if_absent(&mut *conn, member_scope(target), user_id, role).await?;

    if !Member::has_default_organization(&mut *conn, user_id).await? {
        Member::set_default_organization(conn, organization_id, user_id).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_64_hex_chars_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn targets_map_to_matching_scopes() {
        let id = Uuid::new_v4();
        assert_eq!(
            access_scope(InvitationTarget::Project(id)),
            AccessScope::Project(id)
        );
        assert_eq!(
            member_scope(InvitationTarget::Workspace(id)),
            MemberScope::Workspace(id)
        );
    }

    #[test]
    fn email_match_ignores_case() {
        let now = Utc::now();
        let invitation = Invitation {
            id: Uuid::new_v4(),
            invitee_email: "new.hire@example.com".into(),
            inviter_id: Uuid::new_v4(),
            organization_id: Some(Uuid::new_v4()),
            workspace_id: None,
            project_id: None,
            role: MemberRole::Member,
            status: InvitationStatus::Pending,
            token: generate_token(),
            expires_at: now,
            created_at: now,
            updated_at: now,
        };
        let actor = |email: &str| Actor {
            id: Uuid::new_v4(),
            email: email.into(),
            is_super_admin: false,
        };
        assert!(addressed_to(&invitation, &actor("New.Hire@Example.com")).is_ok());
        assert!(matches!(
            addressed_to(&invitation, &actor("someone@example.com")),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
