//! Membership management shared by organizations, workspaces and projects.

use db::models::{
    access::AccessScope,
    member::{Member, MemberScope},
    role::MemberRole,
    user::User,
};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use ts_rs::TS;
use utils::api::pagination::{Paginated, PaginationParams};
use uuid::Uuid;

use super::{
    access::{Access, Actor, require},
    error::ServiceError,
};

#[derive(Debug, Clone, Deserialize, TS)]
pub struct AddMember {
    pub user_id: Uuid,
    #[serde(default = "default_role")]
    pub role: MemberRole,
}

fn default_role() -> MemberRole {
    MemberRole::Member
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpdateMemberRole {
    pub role: MemberRole,
}

fn access_scope(scope: MemberScope) -> AccessScope {
    match scope {
        MemberScope::Organization(id) => AccessScope::Organization(id),
        MemberScope::Workspace(id) => AccessScope::Workspace(id),
        MemberScope::Project(id) => AccessScope::Project(id),
    }
}

/// Granting OWNER, or changing an OWNER's membership, is reserved to owners.
fn check_owner_change(access: &Access, touches_owner: bool) -> Result<(), ServiceError> {
    if touches_owner && access.role != MemberRole::Owner {
        return Err(ServiceError::forbidden(
            "only an OWNER can grant or change the OWNER role",
        ));
    }
    Ok(())
}

/// Locks the scope's OWNER rows for the rest of the caller's transaction.
async fn ensure_not_last_owner(
    conn: &mut PgConnection,
    scope: MemberScope,
    member: &Member,
) -> Result<(), ServiceError> {
    if member.role != MemberRole::Owner {
        return Ok(());
    }
    let owners = Member::lock_owners(conn, scope).await?;
    check_remaining_owners(&owners, member.user_id)
}

fn check_remaining_owners(owners: &[Uuid], leaving: Uuid) -> Result<(), ServiceError> {
    if !owners.iter().any(|id| *id != leaving) {
        return Err(ServiceError::bad_request("cannot remove the last OWNER"));
    }
    Ok(())
}

/// The cascade in [`Member::remove`] must not strip the only OWNER of a
/// workspace or project below the scope.
async fn ensure_children_keep_owner(
    conn: &mut PgConnection,
    scope: MemberScope,
    member_id: Uuid,
) -> Result<(), ServiceError> {
    let orphaned = Member::sole_owned_children(conn, scope, member_id).await?;
    if orphaned > 0 {
        return Err(ServiceError::bad_request(format!(
            "member is the only OWNER of {orphaned} workspace(s) or project(s); transfer ownership first"
        )));
    }
    Ok(())
}

async fn find_member(pool: &PgPool, scope: MemberScope, user_id: Uuid) -> Result<Member, ServiceError> {
    Member::find(pool, scope, user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("member"))
}

pub async fn list(
    pool: &PgPool,
    actor: &Actor,
    scope: MemberScope,
    search: Option<&str>,
    params: &PaginationParams,
) -> Result<Paginated<Member>, ServiceError> {
    require(pool, actor, access_scope(scope), MemberRole::Viewer).await?;
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    let members = Member::list(
        pool,
        scope,
        search,
        i64::from(params.limit()),
        params.offset(),
    )
    .await?;
    let total = Member::count(pool, scope, search).await?;
    Ok(Paginated::new(members, total, params))
}

/// Adds an existing user to a workspace or project. Workspace members must
/// already belong to the organization; project members to the workspace or
/// the organization. Organization members join through invitations.
#[tracing::instrument(name = "members.add", skip(pool, actor, data), fields(user_id = %actor.id, member_id = %data.user_id))]
pub async fn add(
    pool: &PgPool,
    actor: &Actor,
    scope: MemberScope,
    data: AddMember,
) -> Result<Member, ServiceError> {
    let access = require(pool, actor, access_scope(scope), MemberRole::Manager).await?;
    check_owner_change(&access, data.role == MemberRole::Owner)?;

    User::find_by_id(pool, data.user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("user"))?;

    let organization = MemberScope::Organization(access.organization_id());
    let eligible = match scope {
        MemberScope::Organization(_) => {
            return Err(ServiceError::bad_request(
                "organization members are added by invitation",
            ));
        }
        MemberScope::Workspace(_) => Member::find(pool, organization, data.user_id).await?.is_some(),
        MemberScope::Project(_) => {
            let in_workspace = match access.chain.workspace_id {
                Some(workspace_id) => Member::find(pool, MemberScope::Workspace(workspace_id), data.user_id)
                    .await?
                    .is_some(),
                None => false,
            };
            in_workspace || Member::find(pool, organization, data.user_id).await?.is_some()
        }
    };
    if !eligible {
        return Err(ServiceError::bad_request(match scope {
            MemberScope::Project(_) => "user must be a member of the workspace or organization",
            _ => "user must be a member of the organization",
        }));
    }

    Member::add(pool, scope, data.user_id, data.role)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                ServiceError::conflict("user is already a member")
            } else {
                e.into()
            }
        })?;
    tracing::info!(?scope, role = %data.role, "member added");
    find_member(pool, scope, data.user_id).await
}

#[tracing::instrument(name = "members.update_role", skip(pool, actor), fields(user_id = %actor.id))]
pub async fn update_role(
    pool: &PgPool,
    actor: &Actor,
    scope: MemberScope,
    member_id: Uuid,
    role: MemberRole,
) -> Result<Member, ServiceError> {
    let access = require(pool, actor, access_scope(scope), MemberRole::Manager).await?;
    let member = find_member(pool, scope, member_id).await?;
    check_owner_change(
        &access,
        role == MemberRole::Owner || member.role == MemberRole::Owner,
    )?;
    let mut tx = pool.begin().await?;
    if role != MemberRole::Owner {
        ensure_not_last_owner(&mut tx, scope, &member).await?;
    }
    Member::update_role(&mut *tx, scope, member_id, role).await?;
    tx.commit().await?;
    tracing::info!(?scope, %member_id, from = %member.role, to = %role, "member role changed");
    find_member(pool, scope, member_id).await
}

/// Removes a member and the memberships beneath the scope. Removing
/// yourself is leaving and needs no elevated role.
#[tracing::instrument(name = "members.remove", skip(pool, actor), fields(user_id = %actor.id))]
pub async fn remove(
    pool: &PgPool,
    actor: &Actor,
    scope: MemberScope,
    member_id: Uuid,
) -> Result<(), ServiceError> {
    let leaving = member_id == actor.id;
    let required = if leaving {
        MemberRole::Viewer
    } else {
        MemberRole::Manager
    };
    let access = require(pool, actor, access_scope(scope), required).await?;
    let member = find_member(pool, scope, member_id).await?;
    if !leaving {
        check_owner_change(&access, member.role == MemberRole::Owner)?;
    }
    let mut tx = pool.begin().await?;
    ensure_not_last_owner(&mut tx, scope, &member).await?;
    ensure_children_keep_owner(&mut tx, scope, member_id).await?;
    Member::remove(&mut tx, scope, member_id).await?;
    tx.commit().await?;

    tracing::info!(?scope, %member_id, leaving, "member removed");
    Ok(())
}

/// Marks one of the caller's organizations as their default.
pub async fn set_default_organization(
    pool: &PgPool,
    actor: &Actor,
    organization_id: Uuid,
    member_id: Uuid,
) -> Result<(), ServiceError> {
    if member_id != actor.id {
        return Err(ServiceError::forbidden(
            "the default organization can only be set for yourself",
        ));
    }
    let scope = MemberScope::Organization(organization_id);
    require(pool, actor, access_scope(scope), MemberRole::Viewer).await?;
    find_member(pool, scope, member_id).await?;

    let mut tx = pool.begin().await?;
    Member::set_default_organization(&mut tx, organization_id, member_id).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use db::models::access::MembershipChain;

    use super::*;

    fn access(role: MemberRole) -> Access {
        Access {
            chain: MembershipChain {
                organization_id: Uuid::new_v4(),
                workspace_id: None,
                project_id: None,
                organization_role: Some(role),
                workspace_role: None,
                project_role: None,
            },
            role,
        }
    }

    #[test]
    fn managers_cannot_touch_owners() {
        assert!(check_owner_change(&access(MemberRole::Manager), true).is_err());
        assert!(check_owner_change(&access(MemberRole::Manager), false).is_ok());
        assert!(check_owner_change(&access(MemberRole::Owner), true).is_ok());
    }

    #[test]
    fn an_owner_cannot_leave_without_another_owner() {
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(check_remaining_owners(&[alice], alice).is_err());
        assert!(check_remaining_owners(&[], alice).is_err());
        assert!(check_remaining_owners(&[alice, bob], alice).is_ok());
    }

    #[test]
    fn scopes_map_to_access_scopes() {
        let id = Uuid::new_v4();
        assert_eq!(
            access_scope(MemberScope::Workspace(id)),
            AccessScope::Workspace(id)
        );
        assert_eq!(access_scope(MemberScope::Project(id)), AccessScope::Project(id));
    }
}
