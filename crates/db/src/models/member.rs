//! Membership rows for the three tenancy levels.
//!
//! `organization_members`, `workspace_members` and `project_members` share one
//! shape, so a single repository addresses them through [`MemberScope`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgExecutor};
use ts_rs::TS;
use uuid::Uuid;

use super::role::MemberRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberScope {
    Organization(Uuid),
    Workspace(Uuid),
    Project(Uuid),
}

impl MemberScope {
    fn table(self) -> &'static str {
        match self {
            MemberScope::Organization(_) => "organization_members",
            MemberScope::Workspace(_) => "workspace_members",
            MemberScope::Project(_) => "project_members",
        }
    }

    fn column(self) -> &'static str {
        match self {
            MemberScope::Organization(_) => "organization_id",
            MemberScope::Workspace(_) => "workspace_id",
            MemberScope::Project(_) => "project_id",
        }
    }

    fn is_default_expr(self) -> &'static str {
        match self {
            MemberScope::Organization(_) => "m.is_default",
            _ => "FALSE",
        }
    }

    pub fn id(self) -> Uuid {
        match self {
            MemberScope::Organization(id) | MemberScope::Workspace(id) | MemberScope::Project(id) => id,
        }
    }
}

/// A membership row joined with the member's public profile.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Member {
    pub user_id: Uuid,
    pub role: MemberRole,
    pub is_default: bool,
    pub joined_at: DateTime<Utc>,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
}

impl Member {
    fn select(scope: MemberScope) -> String {
        format!(
            "SELECT m.user_id, m.role, {is_default} AS is_default, m.joined_at,
                    u.email, u.username, u.first_name, u.last_name, u.avatar
             FROM {table} m
             JOIN users u ON u.id = m.user_id",
            is_default = scope.is_default_expr(),
            table = scope.table(),
        )
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        scope: MemberScope,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            "{} WHERE m.{} = $1 AND m.user_id = $2",
            Self::select(scope),
            scope.column()
        ))
        .bind(scope.id())
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Members ordered by name, optionally filtered by a case-insensitive
    /// match on email, username or name.
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        scope: MemberScope,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>(&format!(
            "{} WHERE m.{} = $1 AND {}
             ORDER BY u.first_name, u.last_name, u.email
             LIMIT $3 OFFSET $4",
            Self::select(scope),
            scope.column(),
            SEARCH_CLAUSE,
        ))
        .bind(scope.id())
        .bind(search.map(like_pattern))
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    pub async fn count<'e, E: PgExecutor<'e>>(
        executor: E,
        scope: MemberScope,
        search: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {} m JOIN users u ON u.id = m.user_id
             WHERE m.{} = $1 AND {}",
            scope.table(),
            scope.column(),
            SEARCH_CLAUSE,
        ))
        .bind(scope.id())
        .bind(search.map(like_pattern))
        .fetch_one(executor)
        .await
    }

    /// Inserts a membership; a duplicate surfaces as a unique violation.
    pub async fn add<'e, E: PgExecutor<'e>>(
        executor: E,
        scope: MemberScope,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            "INSERT INTO {} ({}, user_id, role) VALUES ($1, $2, $3)",
            scope.table(),
            scope.column()
        ))
        .bind(scope.id())
        .bind(user_id)
        .bind(role)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Inserts a membership unless one already exists. Returns whether a row was added.
    pub async fn add_if_absent<'e, E: PgExecutor<'e>>(
        executor: E,
        scope: MemberScope,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(&format!(
            "INSERT INTO {table} ({column}, user_id, role) VALUES ($1, $2, $3)
             ON CONFLICT ({column}, user_id) DO NOTHING",
            table = scope.table(),
            column = scope.column()
        ))
        .bind(scope.id())
        .bind(user_id)
        .bind(role)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_role<'e, E: PgExecutor<'e>>(
        executor: E,
        scope: MemberScope,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET role = $3 WHERE {} = $1 AND user_id = $2",
            scope.table(),
            scope.column()
        ))
        .bind(scope.id())
        .bind(user_id)
        .bind(role)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Locks the scope's OWNER rows until the transaction ends and returns
    /// their user ids.
    pub async fn lock_owners(
        conn: &mut PgConnection,
        scope: MemberScope,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(&format!(
            "SELECT user_id FROM {} WHERE {} = $1 AND role = 'owner' FOR UPDATE",
            scope.table(),
            scope.column()
        ))
        .bind(scope.id())
        .fetch_all(&mut *conn)
        .await
    }

    /// Number of workspaces and projects below `scope` whose only OWNER is
    /// `user_id`. Those would be left without an owner by [`Member::remove`].
    pub async fn sole_owned_children(
        conn: &mut PgConnection,
        scope: MemberScope,
        user_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let query = match scope {
            MemberScope::Organization(_) => {
                "SELECT COUNT(*) FROM (
                     SELECT wm.workspace_id AS id
                     FROM workspace_members wm
                     JOIN workspaces w ON w.id = wm.workspace_id
                     WHERE w.organization_id = $1 AND wm.role = 'owner'
                     GROUP BY wm.workspace_id
                     HAVING COUNT(*) = 1 AND bool_or(wm.user_id = $2)
                     UNION ALL
                     SELECT pm.project_id AS id
                     FROM project_members pm
                     JOIN projects p ON p.id = pm.project_id
                     JOIN workspaces w ON w.id = p.workspace_id
                     WHERE w.organization_id = $1 AND pm.role = 'owner'
                     GROUP BY pm.project_id
                     HAVING COUNT(*) = 1 AND bool_or(pm.user_id = $2)
                 ) sole"
            }
            MemberScope::Workspace(_) => {
                "SELECT COUNT(*) FROM (
                     SELECT pm.project_id AS id
                     FROM project_members pm
                     JOIN projects p ON p.id = pm.project_id
                     WHERE p.workspace_id = $1 AND pm.role = 'owner'
                     GROUP BY pm.project_id
                     HAVING COUNT(*) = 1 AND bool_or(pm.user_id = $2)
                 ) sole"
            }
            MemberScope::Project(_) => return Ok(0),
        };
        sqlx::query_scalar::<_, i64>(query)
            .bind(scope.id())
            .bind(user_id)
            .fetch_one(&mut *conn)
            .await
    }

    /// Owners and managers of a scope, used to seed memberships of new children.
    pub async fn elevated<'e, E: PgExecutor<'e>>(
        executor: E,
        scope: MemberScope,
    ) -> Result<Vec<(Uuid, MemberRole)>, sqlx::Error> {
        sqlx::query_as::<_, (Uuid, MemberRole)>(&format!(
            "SELECT user_id, role FROM {} WHERE {} = $1 AND role IN ('owner', 'manager')",
            scope.table(),
            scope.column()
        ))
        .bind(scope.id())
        .fetch_all(executor)
        .await
    }

    /// Removes a membership together with the memberships it implies below
    /// it: an organization member leaves every workspace and project of the
    /// organization, a workspace member every project of the workspace.
    pub async fn remove(
        conn: &mut PgConnection,
        scope: MemberScope,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        match scope {
            MemberScope::Organization(organization_id) => {
                sqlx::query(
                    "DELETE FROM project_members pm
                     USING projects p, workspaces w
                     WHERE pm.project_id = p.id AND p.workspace_id = w.id
                       AND w.organization_id = $1 AND pm.user_id = $2",
                )
                .bind(organization_id)
                .bind(user_id)
                .execute(&mut *conn)
                .await?;
                sqlx::query(
                    "DELETE FROM workspace_members wm
                     USING workspaces w
                     WHERE wm.workspace_id = w.id AND w.organization_id = $1 AND wm.user_id = $2",
                )
                .bind(organization_id)
                .bind(user_id)
                .execute(&mut *conn)
                .await?;
            }
            MemberScope::Workspace(workspace_id) => {
                sqlx::query(
                    "DELETE FROM project_members pm
                     USING projects p
                     WHERE pm.project_id = p.id AND p.workspace_id = $1 AND pm.user_id = $2",
                )
                .bind(workspace_id)
                .bind(user_id)
                .execute(&mut *conn)
                .await?;
            }
            MemberScope::Project(_) => {}
        }

        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = $1 AND user_id = $2",
            scope.table(),
            scope.column()
        ))
        .bind(scope.id())
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Marks one organization as the user's default, clearing any other.
    pub async fn set_default_organization(
        conn: &mut PgConnection,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        sqlx::query("UPDATE organization_members SET is_default = FALSE WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        let result = sqlx::query(
            "UPDATE organization_members SET is_default = TRUE
             WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn has_default_organization<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM organization_members WHERE user_id = $1 AND is_default)",
        )
        .bind(user_id)
        .fetch_one(executor)
        .await
    }

    /// Whether an email address already belongs to a member of the scope.
    pub async fn email_is_member<'e, E: PgExecutor<'e>>(
        executor: E,
        scope: MemberScope,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (
                SELECT 1 FROM {} m JOIN users u ON u.id = m.user_id
                WHERE m.{} = $1 AND u.email = $2
             )",
            scope.table(),
            scope.column()
        ))
        .bind(scope.id())
        .bind(email)
        .fetch_one(executor)
        .await
    }
}

const SEARCH_CLAUSE: &str = "($2::text IS NULL OR u.email ILIKE $2 OR u.username ILIKE $2 \
     OR u.first_name ILIKE $2 OR u.last_name ILIKE $2)";

/// Wraps a user-supplied term for `ILIKE`, escaping its wildcards.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn scope_addresses_the_right_table() {
        let id = Uuid::new_v4();
        let scope = MemberScope::Workspace(id);
        assert_eq!(scope.table(), "workspace_members");
        assert_eq!(scope.column(), "workspace_id");
        assert_eq!(scope.id(), id);
        assert_eq!(MemberScope::Organization(id).is_default_expr(), "m.is_default");
    }
}
