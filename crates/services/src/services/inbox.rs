//! Email inbox integration of a project.
//!
//! Messages enter through [`ingest_message`]. Routing rules are evaluated in
//! ascending priority; a matching rule can ignore the message or override the
//! inbox defaults of the task created from it.

use db::{
    models::{
        access::AccessScope,
        inbox::{
            EmailAccount, EmailAccountSettings, InboxMessage, InboxMessageStatus, InboxRule,
            InboxRuleChanges, InboxSettings, NewInboxMessage, NewInboxRule, ProjectInbox,
            RuleActions, RuleConditions,
        },
        project::Project,
        role::MemberRole,
        sprint::Sprint,
        task::{TaskPriority, TaskType, TaskWithDetails},
    },
    validation,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use ts_rs::TS;
use utils::api::pagination::{Paginated, PaginationParams};
use uuid::Uuid;

use super::{
    access::{Actor, require, require_inbox_message, require_inbox_rule},
    crypto::CredentialCipher,
    error::ServiceError,
    tasks::{self, TaskDraft},
};

pub const DEFAULT_SYNC_INTERVAL_MINUTES: i32 = 5;
const NO_SUBJECT: &str = "(no subject)";

fn default_true() -> bool {
    true
}

fn default_imap_port() -> i32 {
    993
}

fn default_imap_folder() -> String {
    "INBOX".to_string()
}

fn default_sync_interval() -> i32 {
    DEFAULT_SYNC_INTERVAL_MINUTES
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpsertInbox {
    pub name: String,
    pub description: Option<String>,
    pub email_address: Option<String>,
    pub email_signature: Option<String>,
    #[serde(default)]
    pub auto_reply_enabled: bool,
    pub auto_reply_template: Option<String>,
    #[serde(default = "default_true")]
    pub auto_create_task: bool,
    #[serde(default)]
    pub default_task_type: TaskType,
    #[serde(default)]
    pub default_priority: TaskPriority,
    pub default_status_id: Option<Uuid>,
    pub default_assignee_id: Option<Uuid>,
    /// Minutes between mailbox syncs.
    #[serde(default = "default_sync_interval")]
    pub sync_interval: i32,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct SetEmailAccount {
    pub email_address: String,
    pub display_name: Option<String>,
    pub imap_host: String,
    #[serde(default = "default_imap_port")]
    pub imap_port: i32,
    pub imap_username: String,
    pub imap_password: String,
    #[serde(default = "default_true")]
    pub imap_use_ssl: bool,
    #[serde(default = "default_imap_folder")]
    pub imap_folder: String,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    #[serde(default = "default_true")]
    pub smtp_use_tls: bool,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct InboxView {
    #[serde(flatten)]
    #[ts(flatten)]
    pub inbox: ProjectInbox,
    pub email_account: Option<EmailAccount>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateInboxRule {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: RuleConditions,
    #[serde(default)]
    pub actions: RuleActions,
    #[serde(default)]
    pub stop_on_match: bool,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateInboxRule {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub enabled: Option<bool>,
    pub conditions: Option<RuleConditions>,
    pub actions: Option<RuleActions>,
    pub stop_on_match: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageQuery {
    pub status: Option<InboxMessageStatus>,
}

/// Result of a mailbox sync run; `error` is absent on success.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct SyncReport {
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct IngestOutcome {
    pub message: InboxMessage,
    pub task: Option<TaskWithDetails>,
    pub matched_rules: Vec<Uuid>,
}

/// Combined effect of the rules matching one message. Fields set by a rule
/// with a lower priority number are not overwritten by later rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    pub matched: Vec<Uuid>,
    pub ignore: bool,
    pub priority: Option<TaskPriority>,
    pub task_type: Option<TaskType>,
    pub assignee_id: Option<Uuid>,
    pub status_id: Option<Uuid>,
}

impl RuleOutcome {
    fn apply(&mut self, actions: &RuleActions) {
        self.ignore |= actions.ignore;
        self.priority = self.priority.or(actions.set_priority);
        self.task_type = self.task_type.or(actions.set_type);
        self.assignee_id = self.assignee_id.or(actions.set_assignee);
        self.status_id = self.status_id.or(actions.set_status);
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Every present condition must match. A rule without conditions matches all.
fn conditions_match(conditions: &RuleConditions, message: &InboxMessage) -> bool {
    let from_ok = conditions.from_contains.as_deref().is_none_or(|needle| {
        contains_ci(&message.from_email, needle)
            || message
                .from_name
                .as_deref()
                .is_some_and(|name| contains_ci(name, needle))
    });
    let subject_ok = conditions.subject_contains.as_deref().is_none_or(|needle| {
        message
            .subject
            .as_deref()
            .is_some_and(|subject| contains_ci(subject, needle))
    });
    let body_ok = conditions.body_contains.as_deref().is_none_or(|needle| {
        [&message.text_content, &message.html_content]
            .into_iter()
            .flatten()
            .any(|body| contains_ci(body, needle))
    });
    let to_ok = conditions
        .to_contains
        .as_deref()
        .is_none_or(|needle| message.to_emails.iter().any(|to| contains_ci(to, needle)));

    from_ok && subject_ok && body_ok && to_ok
}

/// Evaluates enabled rules in ascending priority until one with
/// `stop_on_match` matches.
pub fn evaluate_rules(rules: &[InboxRule], message: &InboxMessage) -> RuleOutcome {
    let mut ordered: Vec<&InboxRule> = rules.iter().filter(|r| r.enabled).collect();
    ordered.sort_by_key(|r| (r.priority, r.created_at));

    let mut outcome = RuleOutcome::default();
    for rule in ordered {
        if !conditions_match(&rule.conditions, message) {
            continue;
        }
        outcome.matched.push(rule.id);
        outcome.apply(&rule.actions);
        if rule.stop_on_match {
            break;
        }
    }
    outcome
}

/// Task title derived from a message subject.
fn task_title(subject: Option<&str>) -> String {
    let subject = subject.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(NO_SUBJECT);
    subject.chars().take(validation::MAX_TITLE_LEN).collect()
}

/// Message body cut to the description limit on a char boundary.
fn task_description(body: Option<&str>) -> Option<String> {
    let body = body?;
    let mut end = body.len().min(validation::MAX_DESCRIPTION_BYTES);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    Some(body[..end].to_string())
}

async fn inbox_for_project(pool: &PgPool, project_id: Uuid) -> Result<ProjectInbox, ServiceError> {
    ProjectInbox::find_for_project(pool, project_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("inbox"))
}

async fn project(pool: &PgPool, project_id: Uuid) -> Result<Project, ServiceError> {
    Project::find_by_id(pool, project_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("project"))
}

pub async fn get_settings(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
) -> Result<InboxView, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Viewer).await?;
    let inbox = inbox_for_project(pool, project_id).await?;
    let email_account = EmailAccount::find_for_inbox(pool, inbox.id).await?;
    Ok(InboxView { inbox, email_account })
}

#[tracing::instrument(name = "inbox.upsert", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn upsert_settings(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
    data: UpsertInbox,
) -> Result<ProjectInbox, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Manager).await?;
    let project = project(pool, project_id).await?;

    if data.sync_interval < 1 {
        return Err(ServiceError::bad_request("sync_interval must be at least 1 minute"));
    }
    if let Some(status_id) = data.default_status_id {
        tasks::resolve_status(pool, &project, Some(status_id)).await?;
    }
    if let Some(assignee_id) = data.default_assignee_id {
        tasks::check_assignees(pool, project_id, &[assignee_id]).await?;
    }
    let settings = InboxSettings {
        name: validation::name("name", &data.name)?,
        description: validation::description(data.description)?,
        email_address: data
            .email_address
            .as_deref()
            .map(validation::email)
            .transpose()?,
        email_signature: data.email_signature,
        auto_reply_enabled: data.auto_reply_enabled,
        auto_reply_template: data.auto_reply_template,
        auto_create_task: data.auto_create_task,
        default_task_type: data.default_task_type,
        default_priority: data.default_priority,
        default_status_id: data.default_status_id,
        default_assignee_id: data.default_assignee_id,
        sync_interval: data.sync_interval,
    };
    let inbox = ProjectInbox::upsert(pool, project_id, &settings).await?;
    tracing::info!(inbox_id = %inbox.id, project_id = %project_id, "inbox saved");
    Ok(inbox)
}

fn check_port(field: &str, port: i32) -> Result<(), ServiceError> {
    if !(1..=65535).contains(&port) {
        return Err(ServiceError::bad_request(format!("{field} must be between 1 and 65535")));
    }
    Ok(())
}

/// Stores the mail account of the inbox. Passwords are encrypted before they
/// reach the database and never serialized back.
#[tracing::instrument(name = "inbox.set_account", skip(pool, actor, cipher, data), fields(user_id = %actor.id))]
pub async fn set_email_account(
    pool: &PgPool,
    actor: &Actor,
    cipher: &CredentialCipher,
    project_id: Uuid,
    data: SetEmailAccount,
) -> Result<EmailAccount, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Manager).await?;
    let inbox = inbox_for_project(pool, project_id).await?;

    check_port("imap_port", data.imap_port)?;
    if let Some(port) = data.smtp_port {
        check_port("smtp_port", port)?;
    }
    if data.imap_password.is_empty() {
        return Err(ServiceError::bad_request("imap_password is required"));
    }
    let encrypt = |plain: &str| {
        cipher
            .encrypt(plain)
            .map_err(|e| ServiceError::Internal(format!("credential encryption failed: {e}")))
    };
    let settings = EmailAccountSettings {
        email_address: validation::email(&data.email_address)?,
        display_name: data.display_name,
        imap_host: validation::name("imap_host", &data.imap_host)?,
        imap_port: data.imap_port,
        imap_username: validation::name("imap_username", &data.imap_username)?,
        imap_password_encrypted: encrypt(&data.imap_password)?,
        imap_use_ssl: data.imap_use_ssl,
        imap_folder: validation::name("imap_folder", &data.imap_folder)?,
        smtp_host: data
            .smtp_host
            .as_deref()
            .map(|h| validation::name("smtp_host", h))
            .transpose()?,
        smtp_port: data.smtp_port,
        smtp_username: data.smtp_username,
        smtp_password_encrypted: data.smtp_password.as_deref().map(encrypt).transpose()?,
        smtp_use_tls: data.smtp_use_tls,
    };
    let account = EmailAccount::upsert(pool, inbox.id, &settings).await?;
    tracing::info!(inbox_id = %inbox.id, "inbox email account saved");
    Ok(account)
}

pub async fn list_rules(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
) -> Result<Vec<InboxRule>, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Viewer).await?;
    let inbox = inbox_for_project(pool, project_id).await?;
    Ok(InboxRule::list_for_inbox(pool, inbox.id, false).await?)
}

#[tracing::instrument(name = "inbox.create_rule", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn create_rule(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
    data: CreateInboxRule,
) -> Result<InboxRule, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Manager).await?;
    let inbox = inbox_for_project(pool, project_id).await?;
    check_rule_actions(pool, project_id, &data.actions).await?;
    let rule = InboxRule::create(
        pool,
        inbox.id,
        &NewInboxRule {
            name: validation::name("name", &data.name)?,
            description: validation::description(data.description)?,
            priority: data.priority,
            enabled: data.enabled,
            conditions: data.conditions,
            actions: data.actions,
            stop_on_match: data.stop_on_match,
        },
    )
    .await?;
    tracing::info!(rule_id = %rule.id, inbox_id = %inbox.id, "inbox rule created");
    Ok(rule)
}

#[tracing::instrument(name = "inbox.update_rule", skip(pool, actor, data), fields(user_id = %actor.id))]
pub async fn update_rule(
    pool: &PgPool,
    actor: &Actor,
    rule_id: Uuid,
    data: UpdateInboxRule,
) -> Result<InboxRule, ServiceError> {
    let (_, inbox) = require_inbox_rule(pool, actor, rule_id, MemberRole::Manager).await?;
    if let Some(actions) = &data.actions {
        check_rule_actions(pool, inbox.project_id, actions).await?;
    }
    let changes = InboxRuleChanges {
        name: data
            .name
            .as_deref()
            .map(|n| validation::name("name", n))
            .transpose()?,
        description: validation::description(data.description)?,
        priority: data.priority,
        enabled: data.enabled,
        conditions: data.conditions,
        actions: data.actions,
        stop_on_match: data.stop_on_match,
    };
    InboxRule::update(pool, rule_id, &changes)
        .await?
        .ok_or_else(|| ServiceError::not_found("inbox rule"))
}

pub async fn delete_rule(pool: &PgPool, actor: &Actor, rule_id: Uuid) -> Result<(), ServiceError> {
    require_inbox_rule(pool, actor, rule_id, MemberRole::Manager).await?;
    if InboxRule::delete(pool, rule_id).await? == 0 {
        return Err(ServiceError::not_found("inbox rule"));
    }
    Ok(())
}

async fn check_rule_actions(
    pool: &PgPool,
    project_id: Uuid,
    actions: &RuleActions,
) -> Result<(), ServiceError> {
    if let Some(status_id) = actions.set_status {
        let project = project(pool, project_id).await?;
        tasks::resolve_status(pool, &project, Some(status_id)).await?;
    }
    if let Some(assignee_id) = actions.set_assignee {
        tasks::check_assignees(pool, project_id, &[assignee_id]).await?;
    }
    Ok(())
}

/// Builds the task for a message from the inbox defaults and the rule
/// outcome. A status or assignee that is no longer valid for the project is
/// dropped instead of failing the conversion.
async fn draft_for_message(
    pool: &PgPool,
    project: &Project,
    inbox: &ProjectInbox,
    message: &InboxMessage,
    outcome: &RuleOutcome,
    actor_id: Option<Uuid>,
) -> Result<TaskDraft, ServiceError> {
    let status = match outcome.status_id.or(inbox.default_status_id) {
        Some(id) => match tasks::resolve_status(pool, project, Some(id)).await {
            Ok(status) => status,
            Err(ServiceError::BadRequest(_)) => {
                tracing::warn!(status_id = %id, "inbox status is not in the project workflow");
                tasks::resolve_status(pool, project, None).await?
            }
            Err(e) => return Err(e),
        },
        None => tasks::resolve_status(pool, project, None).await?,
    };

    let mut assignee_ids = Vec::new();
    if let Some(id) = outcome.assignee_id.or(inbox.default_assignee_id) {
        match tasks::check_assignees(pool, project.id, &[id]).await {
            Ok(ids) => assignee_ids = ids,
            Err(ServiceError::BadRequest(_)) => {
                tracing::warn!(assignee_id = %id, "inbox assignee has no access to the project");
            }
            Err(e) => return Err(e),
        }
    }

    let sprint_id = Sprint::find_default(pool, project.id).await?.map(|s| s.id);
    Ok(TaskDraft {
        title: task_title(message.subject.as_deref()),
        description: validation::description(task_description(message.text_content.as_deref()))?,
        task_type: outcome.task_type.unwrap_or(inbox.default_task_type),
        priority: outcome.priority.unwrap_or(inbox.default_priority),
        status,
        sprint_id,
        parent_task_id: None,
        reporter_id: actor_id,
        start_date: None,
        due_date: None,
        story_points: None,
        original_estimate: None,
        remaining_estimate: None,
        custom_fields: Value::Object(Default::default()),
        assignee_ids,
        created_by: actor_id,
    })
}

/// Stores a message and routes it. A repeated `message_id` is rejected with
/// 409. A failed task creation leaves the message FAILED for a manual retry.
#[tracing::instrument(
    name = "inbox.ingest",
    skip(pool, actor, message),
    fields(user_id = %actor.id, message_id = %message.message_id)
)]
pub async fn ingest_message(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
    message: NewInboxMessage,
) -> Result<IngestOutcome, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Manager).await?;
    let project = project(pool, project_id).await?;
    let inbox = inbox_for_project(pool, project_id).await?;

    if message.message_id.trim().is_empty() {
        return Err(ServiceError::bad_request("message_id is required"));
    }
    validation::email(&message.from_email)?;

    let stored = InboxMessage::create(pool, inbox.id, &message)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                ServiceError::conflict("message has already been ingested")
            } else {
                e.into()
            }
        })?;

    let rules = InboxRule::list_for_inbox(pool, inbox.id, true).await?;
    let outcome = evaluate_rules(&rules, &stored);

    if outcome.ignore {
        let message = InboxMessage::mark(pool, stored.id, InboxMessageStatus::Ignored, None).await?;
        tracing::info!(inbox_message_id = %message.id, "inbox message ignored by rule");
        return Ok(IngestOutcome {
            message,
            task: None,
            matched_rules: outcome.matched,
        });
    }
    if !inbox.auto_create_task {
        let message =
            InboxMessage::mark(pool, stored.id, InboxMessageStatus::Processed, None).await?;
        return Ok(IngestOutcome {
            message,
            task: None,
            matched_rules: outcome.matched,
        });
    }

    let created = match draft_for_message(pool, &project, &inbox, &stored, &outcome, None).await {
        Ok(draft) => tasks::insert_task(pool, project_id, &draft).await,
        Err(e) => Err(e),
    };
    match created {
        Ok(task) => {
            let message =
                InboxMessage::mark(pool, stored.id, InboxMessageStatus::Converted, Some(task.id))
                    .await?;
            tracing::info!(inbox_message_id = %message.id, task_id = %task.id, "inbox message converted");
            Ok(IngestOutcome {
                message,
                task: Some(tasks::details(pool, task.id).await?),
                matched_rules: outcome.matched,
            })
        }
        Err(e) => {
            tracing::error!(inbox_message_id = %stored.id, error = %e, "task creation from inbox message failed");
            let message =
                InboxMessage::mark(pool, stored.id, InboxMessageStatus::Failed, None).await?;
            Ok(IngestOutcome {
                message,
                task: None,
                matched_rules: outcome.matched,
            })
        }
    }
}

pub async fn list_messages(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
    query: &MessageQuery,
    params: &PaginationParams,
) -> Result<Paginated<InboxMessage>, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Viewer).await?;
    let inbox = inbox_for_project(pool, project_id).await?;
    let messages = InboxMessage::list(
        pool,
        inbox.id,
        query.status,
        i64::from(params.limit()),
        params.offset(),
    )
    .await?;
    let total = InboxMessage::count(pool, inbox.id, query.status).await?;
    Ok(Paginated::new(messages, total, params))
}

/// Creates a task from a message by hand. Rule actions other than `ignore`
/// still apply; the caller becomes the reporter.
#[tracing::instrument(name = "inbox.convert", skip(pool, actor), fields(user_id = %actor.id))]
pub async fn convert_message(
    pool: &PgPool,
    actor: &Actor,
    message_id: Uuid,
) -> Result<IngestOutcome, ServiceError> {
    let (message, inbox) = require_inbox_message(pool, actor, message_id, MemberRole::Member).await?;
    if message.status == InboxMessageStatus::Converted {
        return Err(ServiceError::conflict("message has already been converted to a task"));
    }
    let project = project(pool, inbox.project_id).await?;
    let rules = InboxRule::list_for_inbox(pool, inbox.id, true).await?;
    let outcome = evaluate_rules(&rules, &message);

    let draft = draft_for_message(pool, &project, &inbox, &message, &outcome, Some(actor.id)).await?;
    let task = tasks::insert_task(pool, project.id, &draft).await?;
    let message =
        InboxMessage::mark(pool, message.id, InboxMessageStatus::Converted, Some(task.id)).await?;
    tracing::info!(inbox_message_id = %message.id, task_id = %task.id, "inbox message converted");
    Ok(IngestOutcome {
        message,
        task: Some(tasks::details(pool, task.id).await?),
        matched_rules: outcome.matched,
    })
}

pub async fn ignore_message(
    pool: &PgPool,
    actor: &Actor,
    message_id: Uuid,
) -> Result<InboxMessage, ServiceError> {
    let (message, _) = require_inbox_message(pool, actor, message_id, MemberRole::Member).await?;
    if message.status == InboxMessageStatus::Converted {
        return Err(ServiceError::bad_request("converted messages cannot be ignored"));
    }
    Ok(InboxMessage::mark(pool, message.id, InboxMessageStatus::Ignored, None).await?)
}

#[tracing::instrument(name = "inbox.record_sync", skip(pool, actor, report), fields(user_id = %actor.id))]
pub async fn record_sync(
    pool: &PgPool,
    actor: &Actor,
    project_id: Uuid,
    report: SyncReport,
) -> Result<ProjectInbox, ServiceError> {
    require(pool, actor, AccessScope::Project(project_id), MemberRole::Manager).await?;
    let inbox = inbox_for_project(pool, project_id).await?;
    let error = report.error.as_deref().map(str::trim).filter(|e| !e.is_empty());
    if let Some(error) = error {
        tracing::warn!(inbox_id = %inbox.id, %error, "inbox sync failed");
    }
    Ok(ProjectInbox::record_sync(pool, inbox.id, error).await?)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;
    use sqlx::types::Json;

    use super::*;

    fn message(subject: &str, from: &str, body: &str) -> InboxMessage {
        let now = Utc::now();
        InboxMessage {
            id: Uuid::new_v4(),
            inbox_id: Uuid::new_v4(),
            message_id: "<1@example.com>".into(),
            thread_id: None,
            subject: Some(subject.into()),
            from_email: from.into(),
            from_name: None,
            to_emails: vec!["support@acme.test".into()],
            cc_emails: vec![],
            text_content: Some(body.into()),
            html_content: None,
            status: InboxMessageStatus::Pending,
            task_id: None,
            received_at: now,
            processed_at: None,
            created_at: now,
        }
    }

    fn rule(priority: i32, conditions: RuleConditions, actions: RuleActions) -> InboxRule {
        let now = Utc::now();
        InboxRule {
            id: Uuid::new_v4(),
            inbox_id: Uuid::new_v4(),
            name: format!("rule {priority}"),
            description: None,
            priority,
            enabled: true,
            conditions: Json(conditions),
            actions: Json(actions),
            stop_on_match: false,
            created_at: now + Duration::milliseconds(i64::from(priority)),
            updated_at: now,
        }
    }

    fn subject(needle: &str) -> RuleConditions {
        RuleConditions {
            subject_contains: Some(needle.into()),
            ..Default::default()
        }
    }

    #[test]
    fn conditions_are_case_insensitive_and_all_must_match() {
        let msg = message("URGENT: server down", "ops@acme.test", "the db is on fire");
        let both = RuleConditions {
            subject_contains: Some("urgent".into()),
            body_contains: Some("DB".into()),
            ..Default::default()
        };
        assert!(conditions_match(&both, &msg));

        let wrong_sender = RuleConditions {
            subject_contains: Some("urgent".into()),
            from_contains: Some("billing".into()),
            ..Default::default()
        };
        assert!(!conditions_match(&wrong_sender, &msg));
        assert!(conditions_match(&RuleConditions::default(), &msg));
    }

    #[test]
    fn to_condition_checks_every_recipient() {
        let msg = message("hi", "a@b.test", "");
        let to = RuleConditions {
            to_contains: Some("SUPPORT@".into()),
            ..Default::default()
        };
        assert!(conditions_match(&to, &msg));
    }

    #[test]
    fn lower_priority_number_wins_conflicting_actions() {
        let msg = message("urgent bug", "x@y.test", "");
        let rules = vec![
            rule(
                20,
                subject("bug"),
                RuleActions {
                    set_priority: Some(TaskPriority::Low),
                    set_type: Some(TaskType::Bug),
                    ..Default::default()
                },
            ),
            rule(
                10,
                subject("urgent"),
                RuleActions {
                    set_priority: Some(TaskPriority::Highest),
                    ..Default::default()
                },
            ),
        ];
        let outcome = evaluate_rules(&rules, &msg);
        assert_eq!(outcome.matched, vec![rules[1].id, rules[0].id]);
        assert_eq!(outcome.priority, Some(TaskPriority::Highest));
        assert_eq!(outcome.task_type, Some(TaskType::Bug));
        assert!(!outcome.ignore);
    }

    #[test]
    fn stop_on_match_halts_evaluation() {
        let msg = message("newsletter", "news@list.test", "");
        let mut first = rule(1, subject("newsletter"), RuleActions {
            ignore: true,
            ..Default::default()
        });
        first.stop_on_match = true;
        let second = rule(2, RuleConditions::default(), RuleActions {
            set_priority: Some(TaskPriority::High),
            ..Default::default()
        });
        let outcome = evaluate_rules(&[second, first.clone()], &msg);
        assert_eq!(outcome.matched, vec![first.id]);
        assert!(outcome.ignore);
        assert_eq!(outcome.priority, None);
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let msg = message("anything", "a@b.test", "");
        let mut disabled = rule(1, RuleConditions::default(), RuleActions {
            ignore: true,
            ..Default::default()
        });
        disabled.enabled = false;
        assert_eq!(evaluate_rules(&[disabled], &msg), RuleOutcome::default());
    }

    #[test]
    fn title_falls_back_when_subject_is_blank() {
        assert_eq!(task_title(None), NO_SUBJECT);
        assert_eq!(task_title(Some("   ")), NO_SUBJECT);
        assert_eq!(task_title(Some(" Printer jam ")), "Printer jam");
        let long = "x".repeat(validation::MAX_TITLE_LEN + 20);
        assert_eq!(task_title(Some(&long)).len(), validation::MAX_TITLE_LEN);
    }

    #[test]
    fn oversized_bodies_are_cut_to_the_description_limit() {
        assert_eq!(task_description(None), None);
        assert_eq!(task_description(Some("short")).as_deref(), Some("short"));

        let big = "a".repeat(60 * 1024);
        let cut = task_description(Some(&big)).unwrap();
        assert_eq!(cut.len(), validation::MAX_DESCRIPTION_BYTES);
        assert!(validation::description(Some(cut)).is_ok());

        // A two-byte char straddling the limit is dropped whole.
        let mut straddling = "a".repeat(validation::MAX_DESCRIPTION_BYTES - 1);
        straddling.push('é');
        straddling.push_str("tail");
        let cut = task_description(Some(&straddling)).unwrap();
        assert_eq!(cut.len(), validation::MAX_DESCRIPTION_BYTES - 1);
        assert!(cut.chars().all(|c| c == 'a'));
    }
}
