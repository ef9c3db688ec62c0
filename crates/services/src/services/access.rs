//! Role guards shared by every service.

use db::models::{
    access::{AccessScope, MembershipChain},
    inbox::{InboxMessage, InboxRule, ProjectInbox},
    role::MemberRole,
    sprint::Sprint,
    task::Task,
    user::User,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::error::ServiceError;

/// The authenticated caller of a service operation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub email: String,
    pub is_super_admin: bool,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            is_super_admin: user.is_super_admin(),
        }
    }
}

/// A passed access check: the resource's tenancy chain and the caller's role on it.
#[derive(Debug, Clone, Copy)]
pub struct Access {
    pub chain: MembershipChain,
    pub role: MemberRole,
}

impl Access {
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }

    pub fn organization_id(&self) -> Uuid {
        self.chain.organization_id
    }
}

fn scope_name(scope: AccessScope) -> &'static str {
    match scope {
        AccessScope::Organization(_) => "organization",
        AccessScope::Workspace(_) => "workspace",
        AccessScope::Project(_) => "project",
    }
}

/// Resolves the caller's effective role on `scope` and checks it is at least
/// `required`. Unknown resources are 404; known but inaccessible ones are 403.
pub async fn require(
    pool: &PgPool,
    actor: &Actor,
    scope: AccessScope,
    required: MemberRole,
) -> Result<Access, ServiceError> {
    let name = scope_name(scope);
    let chain = MembershipChain::load(pool, scope, actor.id)
        .await?
        .ok_or_else(|| ServiceError::not_found(name))?;

    let Some(role) = chain.effective_role(actor.is_super_admin) else {
        tracing::warn!(user_id = %actor.id, ?scope, "access denied: not a member");
        return Err(ServiceError::forbidden(format!("you are not a member of this {name}")));
    };
    if !role.at_least(required) {
        tracing::warn!(user_id = %actor.id, ?scope, %role, %required, "access denied: insufficient role");
        return Err(ServiceError::forbidden(format!(
            "{required} role on this {name} required"
        )));
    }

    Ok(Access { chain, role })
}

pub async fn require_task(
    pool: &PgPool,
    actor: &Actor,
    task_id: Uuid,
    required: MemberRole,
) -> Result<(Task, Access), ServiceError> {
    let task = Task::find_by_id(pool, task_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("task"))?;
    let access = require(pool, actor, AccessScope::Project(task.project_id), required).await?;
    Ok((task, access))
}

pub async fn require_sprint(
    pool: &PgPool,
    actor: &Actor,
    sprint_id: Uuid,
    required: MemberRole,
) -> Result<(Sprint, Access), ServiceError> {
    let sprint = Sprint::find_by_id(pool, sprint_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("sprint"))?;
    let access = require(pool, actor, AccessScope::Project(sprint.project_id), required).await?;
    Ok((sprint, access))
}

pub async fn require_inbox_rule(
    pool: &PgPool,
    actor: &Actor,
    rule_id: Uuid,
    required: MemberRole,
) -> Result<(InboxRule, ProjectInbox), ServiceError> {
    let rule = InboxRule::find_by_id(pool, rule_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("inbox rule"))?;
    let inbox = ProjectInbox::find_by_id(pool, rule.inbox_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("inbox"))?;
    require(pool, actor, AccessScope::Project(inbox.project_id), required).await?;
    Ok((rule, inbox))
}

pub async fn require_inbox_message(
    pool: &PgPool,
    actor: &Actor,
    message_id: Uuid,
    required: MemberRole,
) -> Result<(InboxMessage, ProjectInbox), ServiceError> {
    let message = InboxMessage::find_by_id(pool, message_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("inbox message"))?;
    let inbox = ProjectInbox::find_by_id(pool, message.inbox_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("inbox"))?;
    require(pool, actor, AccessScope::Project(inbox.project_id), required).await?;
    Ok((message, inbox))
}
