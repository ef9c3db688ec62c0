//! Effective role resolution across the organization → workspace → project chain.

use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use super::role::MemberRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    Organization(Uuid),
    Workspace(Uuid),
    Project(Uuid),
}

/// The tenancy chain of a resource with the user's direct role at each level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct MembershipChain {
    pub organization_id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub organization_role: Option<MemberRole>,
    pub workspace_role: Option<MemberRole>,
    pub project_role: Option<MemberRole>,
}

impl MembershipChain {
    /// Highest role the user holds on the innermost resource of the chain.
    ///
    /// Super admins are owners everywhere. Owner and manager roles flow down
    /// to every workspace and project beneath them; member and viewer roles
    /// only apply where they were granted.
    pub fn effective_role(&self, is_super_admin: bool) -> Option<MemberRole> {
        if is_super_admin {
            return Some(MemberRole::Owner);
        }

        let inherited = |role: Option<MemberRole>| role.filter(|r| r.is_elevated());

        if self.project_id.is_some() {
            [
                inherited(self.organization_role),
                inherited(self.workspace_role),
                self.project_role,
            ]
            .into_iter()
            .flatten()
            .max()
        } else if self.workspace_id.is_some() {
            [inherited(self.organization_role), self.workspace_role]
                .into_iter()
                .flatten()
                .max()
        } else {
            self.organization_role
        }
    }

    /// Elevated users see every row under the resource instead of only their
    /// own: super admins and OWNER/MANAGER of the organization or workspace.
    /// Project roles never elevate.
    pub fn is_elevated(&self, is_super_admin: bool) -> bool {
        is_super_admin
            || self.organization_role.is_some_and(MemberRole::is_elevated)
            || (self.workspace_id.is_some() && self.workspace_role.is_some_and(MemberRole::is_elevated))
    }

    /// Loads the chain for a resource. `None` means the resource does not exist.
    pub async fn load<'e, E: PgExecutor<'e>>(
        executor: E,
        scope: AccessScope,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let (sql, id) = match scope {
            AccessScope::Organization(id) => (
                "SELECT o.id AS organization_id,
                        NULL::uuid AS workspace_id,
                        NULL::uuid AS project_id,
                        (SELECT role FROM organization_members
                          WHERE organization_id = o.id AND user_id = $2) AS organization_role,
                        NULL::member_role AS workspace_role,
                        NULL::member_role AS project_role
                 FROM organizations o WHERE o.id = $1",
                id,
            ),
            AccessScope::Workspace(id) => (
                "SELECT w.organization_id,
                        w.id AS workspace_id,
                        NULL::uuid AS project_id,
                        (SELECT role FROM organization_members
                          WHERE organization_id = w.organization_id AND user_id = $2) AS organization_role,
                        (SELECT role FROM workspace_members
                          WHERE workspace_id = w.id AND user_id = $2) AS workspace_role,
                        NULL::member_role AS project_role
                 FROM workspaces w WHERE w.id = $1",
                id,
            ),
            AccessScope::Project(id) => (
                "SELECT w.organization_id,
                        p.workspace_id,
                        p.id AS project_id,
                        (SELECT role FROM organization_members
                          WHERE organization_id = w.organization_id AND user_id = $2) AS organization_role,
                        (SELECT role FROM workspace_members
                          WHERE workspace_id = p.workspace_id AND user_id = $2) AS workspace_role,
                        (SELECT role FROM project_members
                          WHERE project_id = p.id AND user_id = $2) AS project_role
                 FROM projects p JOIN workspaces w ON w.id = p.workspace_id
                 WHERE p.id = $1",
                id,
            ),
        };

        sqlx::query_as::<_, MembershipChain>(sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(
        org: Option<MemberRole>,
        ws: Option<MemberRole>,
        project: Option<MemberRole>,
        depth: u8,
    ) -> MembershipChain {
        MembershipChain {
            organization_id: Uuid::new_v4(),
            workspace_id: (depth >= 1).then(Uuid::new_v4),
            project_id: (depth >= 2).then(Uuid::new_v4),
            organization_role: org,
            workspace_role: ws,
            project_role: project,
        }
    }

    #[test]
    fn super_admin_owns_everything() {
        let c = chain(None, None, None, 2);
        assert_eq!(c.effective_role(true), Some(MemberRole::Owner));
        assert!(c.is_elevated(true));
    }

    #[test]
    fn organization_manager_inherits_downward() {
        let c = chain(Some(MemberRole::Manager), None, None, 2);
        assert_eq!(c.effective_role(false), Some(MemberRole::Manager));
    }

    #[test]
    fn organization_member_does_not_inherit() {
        let c = chain(Some(MemberRole::Member), None, None, 1);
        assert_eq!(c.effective_role(false), None);
        let c = chain(Some(MemberRole::Member), None, None, 0);
        assert_eq!(c.effective_role(false), Some(MemberRole::Member));
    }

    #[test]
    fn workspace_owner_inherits_onto_projects() {
        let c = chain(Some(MemberRole::Member), Some(MemberRole::Owner), Some(MemberRole::Viewer), 2);
        assert_eq!(c.effective_role(false), Some(MemberRole::Owner));
        assert!(c.is_elevated(false));
    }

    #[test]
    fn workspace_member_needs_project_membership() {
        let c = chain(Some(MemberRole::Member), Some(MemberRole::Member), None, 2);
        assert_eq!(c.effective_role(false), None);
        let c = chain(Some(MemberRole::Member), Some(MemberRole::Member), Some(MemberRole::Viewer), 2);
        assert_eq!(c.effective_role(false), Some(MemberRole::Viewer));
        assert!(!c.is_elevated(false));
    }

    #[test]
    fn project_managers_are_not_elevated() {
        let c = chain(Some(MemberRole::Member), Some(MemberRole::Member), Some(MemberRole::Manager), 2);
        assert_eq!(c.effective_role(false), Some(MemberRole::Manager));
        assert!(!c.is_elevated(false));

        let c = chain(Some(MemberRole::Manager), None, Some(MemberRole::Viewer), 2);
        assert!(c.is_elevated(false));
    }

    #[test]
    fn highest_role_wins() {
        let c = chain(Some(MemberRole::Manager), Some(MemberRole::Owner), None, 1);
        assert_eq!(c.effective_role(false), Some(MemberRole::Owner));
    }
}
