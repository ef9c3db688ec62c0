use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::role::MemberRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, TS, Display, EnumString, Default)]
#[sqlx(type_name = "invitation_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
    Expired,
    Cancelled,
}

/// The single organization, workspace or project an invitation grants access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationTarget {
    Organization(Uuid),
    Workspace(Uuid),
    Project(Uuid),
}

impl InvitationTarget {
    fn columns(self) -> (Option<Uuid>, Option<Uuid>, Option<Uuid>) {
        match self {
            InvitationTarget::Organization(id) => (Some(id), None, None),
            InvitationTarget::Workspace(id) => (None, Some(id), None),
            InvitationTarget::Project(id) => (None, None, Some(id)),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Invitation {
    pub id: Uuid,
    pub invitee_email: String,
    pub inviter_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub role: MemberRole,
    pub status: InvitationStatus,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    pub fn target(&self) -> Option<InvitationTarget> {
        match (self.organization_id, self.workspace_id, self.project_id) {
            (Some(id), None, None) => Some(InvitationTarget::Organization(id)),
            (None, Some(id), None) => Some(InvitationTarget::Workspace(id)),
            (None, None, Some(id)) => Some(InvitationTarget::Project(id)),
            _ => None,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// An invitation with display names for its target and inviter.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct InvitationWithContext {
    #[sqlx(flatten)]
    #[serde(flatten)]
    #[ts(flatten)]
    pub invitation: Invitation,
    pub target_name: String,
    pub inviter_name: String,
}

#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub invitee_email: String,
    pub inviter_id: Uuid,
    pub target: InvitationTarget,
    pub role: MemberRole,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

const INVITATION_COLUMNS: &str = "i.id, i.invitee_email, i.inviter_id, i.organization_id, \
     i.workspace_id, i.project_id, i.role, i.status, i.token, i.expires_at, i.created_at, i.updated_at";

const CONTEXT_SELECT: &str = "COALESCE(o.name, w.name, p.name, '') AS target_name,
     TRIM(u.first_name || ' ' || u.last_name) AS inviter_name
     FROM invitations i
     JOIN users u ON u.id = i.inviter_id
     LEFT JOIN organizations o ON o.id = i.organization_id
     LEFT JOIN workspaces w ON w.id = i.workspace_id
     LEFT JOIN projects p ON p.id = i.project_id";

impl Invitation {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &NewInvitation,
    ) -> Result<Self, sqlx::Error> {
        let (organization_id, workspace_id, project_id) = data.target.columns();
        sqlx::query_as::<_, Invitation>(&format!(
            "INSERT INTO invitations AS i
                (invitee_email, inviter_id, organization_id, workspace_id, project_id, role, token, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(&data.invitee_email)
        .bind(data.inviter_id)
        .bind(organization_id)
        .bind(workspace_id)
        .bind(project_id)
        .bind(data.role)
        .bind(&data.token)
        .bind(data.expires_at)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations i WHERE i.id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Locks the row so concurrent accepts of one token serialize.
    pub async fn find_by_token_for_update<'e, E: PgExecutor<'e>>(
        executor: E,
        token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations i WHERE i.token = $1 FOR UPDATE"
        ))
        .bind(token)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_with_context_by_token<'e, E: PgExecutor<'e>>(
        executor: E,
        token: &str,
    ) -> Result<Option<InvitationWithContext>, sqlx::Error> {
        sqlx::query_as::<_, InvitationWithContext>(&format!(
            "SELECT {INVITATION_COLUMNS}, {CONTEXT_SELECT} WHERE i.token = $1"
        ))
        .bind(token)
        .fetch_optional(executor)
        .await
    }

    pub async fn list_for_target<'e, E: PgExecutor<'e>>(
        executor: E,
        target: InvitationTarget,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<InvitationWithContext>, sqlx::Error> {
        let (organization_id, workspace_id, project_id) = target.columns();
        sqlx::query_as::<_, InvitationWithContext>(&format!(
            "SELECT {INVITATION_COLUMNS}, {CONTEXT_SELECT}
             WHERE i.organization_id IS NOT DISTINCT FROM $1
               AND i.workspace_id IS NOT DISTINCT FROM $2
               AND i.project_id IS NOT DISTINCT FROM $3
               AND ($4::invitation_status IS NULL OR i.status = $4)
             ORDER BY i.created_at DESC"
        ))
        .bind(organization_id)
        .bind(workspace_id)
        .bind(project_id)
        .bind(status)
        .fetch_all(executor)
        .await
    }

    pub async fn list_pending_for_email<'e, E: PgExecutor<'e>>(
        executor: E,
        email: &str,
    ) -> Result<Vec<InvitationWithContext>, sqlx::Error> {
        sqlx::query_as::<_, InvitationWithContext>(&format!(
            "SELECT {INVITATION_COLUMNS}, {CONTEXT_SELECT}
             WHERE lower(i.invitee_email) = lower($1)
               AND i.status = 'pending' AND i.expires_at > NOW()
             ORDER BY i.created_at DESC"
        ))
        .bind(email)
        .fetch_all(executor)
        .await
    }

    /// Whether an unexpired pending invitation exists for this email and target.
    pub async fn pending_exists<'e, E: PgExecutor<'e>>(
        executor: E,
        email: &str,
        target: InvitationTarget,
    ) -> Result<bool, sqlx::Error> {
        let (organization_id, workspace_id, project_id) = target.columns();
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                SELECT 1 FROM invitations
                WHERE lower(invitee_email) = lower($1)
                  AND organization_id IS NOT DISTINCT FROM $2
                  AND workspace_id IS NOT DISTINCT FROM $3
                  AND project_id IS NOT DISTINCT FROM $4
                  AND status = 'pending' AND expires_at > NOW()
             )",
        )
        .bind(email)
        .bind(organization_id)
        .bind(workspace_id)
        .bind(project_id)
        .fetch_one(executor)
        .await
    }

    pub async fn set_status<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        status: InvitationStatus,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Invitation>(&format!(
            "UPDATE invitations AS i SET status = $2, updated_at = NOW()
             WHERE i.id = $1
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_one(executor)
        .await
    }

    /// Issues a fresh token and expiry, returning the invitation to PENDING.
    pub async fn renew<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Invitation>(&format!(
            "UPDATE invitations AS i
             SET token = $2, expires_at = $3, status = 'pending', updated_at = NOW()
             WHERE i.id = $1
             RETURNING {INVITATION_COLUMNS}"
        ))
        .bind(id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(organization_id: Option<Uuid>, project_id: Option<Uuid>) -> Invitation {
        let now = Utc::now();
        Invitation {
            id: Uuid::new_v4(),
            invitee_email: "dev@example.com".into(),
            inviter_id: Uuid::new_v4(),
            organization_id,
            workspace_id: None,
            project_id,
            role: MemberRole::Member,
            status: InvitationStatus::Pending,
            token: "t".into(),
            expires_at: now + Duration::days(7),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn target_requires_exactly_one_scope() {
        let org = Uuid::new_v4();
        assert_eq!(
            invitation(Some(org), None).target(),
            Some(InvitationTarget::Organization(org))
        );
        assert_eq!(invitation(Some(org), Some(Uuid::new_v4())).target(), None);
        assert_eq!(invitation(None, None).target(), None);
    }

    #[test]
    fn expiry_is_inclusive() {
        let inv = invitation(Some(Uuid::new_v4()), None);
        assert!(!inv.is_expired_at(inv.created_at));
        assert!(inv.is_expired_at(inv.expires_at));
    }

    #[test]
    fn token_is_not_serialized() {
        let json = serde_json::to_value(invitation(Some(Uuid::new_v4()), None)).unwrap();
        assert!(json.get("token").is_none());
        assert_eq!(json["status"], "PENDING");
    }
}
