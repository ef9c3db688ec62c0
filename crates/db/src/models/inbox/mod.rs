//! Email inbox integration: per-project inbox settings, the mail account
//! behind it, routing rules and ingested messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use ts_rs::TS;
use uuid::Uuid;

use super::task::{TaskPriority, TaskType};

mod message;
mod rule;

pub use message::{InboxMessage, InboxMessageStatus, NewInboxMessage};
pub use rule::{InboxRule, NewInboxRule, RuleActions, RuleConditions, InboxRuleChanges};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ProjectInbox {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub email_address: Option<String>,
    pub email_signature: Option<String>,
    pub auto_reply_enabled: bool,
    pub auto_reply_template: Option<String>,
    pub auto_create_task: bool,
    pub default_task_type: TaskType,
    pub default_priority: TaskPriority,
    pub default_status_id: Option<Uuid>,
    pub default_assignee_id: Option<Uuid>,
    pub sync_interval: i32,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sync_status: Option<String>,
    pub sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct InboxSettings {
    pub name: String,
    pub description: Option<String>,
    pub email_address: Option<String>,
    pub email_signature: Option<String>,
    pub auto_reply_enabled: bool,
    pub auto_reply_template: Option<String>,
    pub auto_create_task: bool,
    pub default_task_type: TaskType,
    pub default_priority: TaskPriority,
    pub default_status_id: Option<Uuid>,
    pub default_assignee_id: Option<Uuid>,
    pub sync_interval: i32,
}

/// Mail account credentials. Passwords are stored encrypted and never serialized.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct EmailAccount {
    pub id: Uuid,
    pub inbox_id: Uuid,
    pub email_address: String,
    pub display_name: Option<String>,
    pub imap_host: String,
    pub imap_port: i32,
    pub imap_username: String,
    #[serde(skip)]
    #[ts(skip)]
    pub imap_password_encrypted: String,
    pub imap_use_ssl: bool,
    pub imap_folder: String,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub smtp_username: Option<String>,
    #[serde(skip)]
    #[ts(skip)]
    pub smtp_password_encrypted: Option<String>,
    pub smtp_use_tls: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct EmailAccountSettings {
    pub email_address: String,
    pub display_name: Option<String>,
    pub imap_host: String,
    pub imap_port: i32,
    pub imap_username: String,
    pub imap_password_encrypted: String,
    pub imap_use_ssl: bool,
    pub imap_folder: String,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub smtp_username: Option<String>,
    pub smtp_password_encrypted: Option<String>,
    pub smtp_use_tls: bool,
}

const INBOX_COLUMNS: &str = "id, project_id, name, description, email_address, email_signature, \
     auto_reply_enabled, auto_reply_template, auto_create_task, default_task_type, default_priority, \
     default_status_id, default_assignee_id, sync_interval, last_sync_at, sync_status, sync_error, \
     created_at, updated_at";

const ACCOUNT_COLUMNS: &str = "id, inbox_id, email_address, display_name, imap_host, imap_port, \
     imap_username, imap_password_encrypted, imap_use_ssl, imap_folder, smtp_host, smtp_port, \
     smtp_username, smtp_password_encrypted, smtp_use_tls, created_at, updated_at";

impl ProjectInbox {
    pub async fn find_for_project<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectInbox>(&format!(
            "SELECT {INBOX_COLUMNS} FROM project_inboxes WHERE project_id = $1"
        ))
        .bind(project_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectInbox>(&format!(
            "SELECT {INBOX_COLUMNS} FROM project_inboxes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn upsert<'e, E: PgExecutor<'e>>(
        executor: E,
        project_id: Uuid,
        settings: &InboxSettings,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ProjectInbox>(&format!(
            "INSERT INTO project_inboxes
                (project_id, name, description, email_address, email_signature, auto_reply_enabled,
                 auto_reply_template, auto_create_task, default_task_type, default_priority,
                 default_status_id, default_assignee_id, sync_interval)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (project_id) DO UPDATE SET
                name                = EXCLUDED.name,
                description         = EXCLUDED.description,
                email_address       = EXCLUDED.email_address,
                email_signature     = EXCLUDED.email_signature,
                auto_reply_enabled  = EXCLUDED.auto_reply_enabled,
                auto_reply_template = EXCLUDED.auto_reply_template,
                auto_create_task    = EXCLUDED.auto_create_task,
                default_task_type   = EXCLUDED.default_task_type,
                default_priority    = EXCLUDED.default_priority,
                default_status_id   = EXCLUDED.default_status_id,
                default_assignee_id = EXCLUDED.default_assignee_id,
                sync_interval       = EXCLUDED.sync_interval,
                updated_at          = NOW()
             RETURNING {INBOX_COLUMNS}"
        ))
        .bind(project_id)
        .bind(&settings.name)
        .bind(&settings.description)
        .bind(&settings.email_address)
        .bind(&settings.email_signature)
        .bind(settings.auto_reply_enabled)
        .bind(&settings.auto_reply_template)
        .bind(settings.auto_create_task)
        .bind(settings.default_task_type)
        .bind(settings.default_priority)
        .bind(settings.default_status_id)
        .bind(settings.default_assignee_id)
        .bind(settings.sync_interval)
        .fetch_one(executor)
        .await
    }

    /// Records the outcome of a mailbox sync. A success clears the previous error.
    pub async fn record_sync<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        error: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ProjectInbox>(&format!(
            "UPDATE project_inboxes SET
                last_sync_at = NOW(),
                sync_status  = CASE WHEN $2::text IS NULL THEN 'success' ELSE 'error' END,
                sync_error   = $2,
                updated_at   = NOW()
             WHERE id = $1
             RETURNING {INBOX_COLUMNS}"
        ))
        .bind(id)
        .bind(error)
        .fetch_one(executor)
        .await
    }
}

impl EmailAccount {
    pub async fn find_for_inbox<'e, E: PgExecutor<'e>>(
        executor: E,
        inbox_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, EmailAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM email_accounts WHERE inbox_id = $1"
        ))
        .bind(inbox_id)
        .fetch_optional(executor)
        .await
    }

    pub async fn upsert<'e, E: PgExecutor<'e>>(
        executor: E,
        inbox_id: Uuid,
        settings: &EmailAccountSettings,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, EmailAccount>(&format!(
            "INSERT INTO email_accounts
                (inbox_id, email_address, display_name, imap_host, imap_port, imap_username,
                 imap_password_encrypted, imap_use_ssl, imap_folder, smtp_host, smtp_port,
                 smtp_username, smtp_password_encrypted, smtp_use_tls)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (inbox_id) DO UPDATE SET
                email_address           = EXCLUDED.email_address,
                display_name            = EXCLUDED.display_name,
                imap_host               = EXCLUDED.imap_host,
                imap_port               = EXCLUDED.imap_port,
                imap_username           = EXCLUDED.imap_username,
                imap_password_encrypted = EXCLUDED.imap_password_encrypted,
                imap_use_ssl            = EXCLUDED.imap_use_ssl,
                imap_folder             = EXCLUDED.imap_folder,
                smtp_host               = EXCLUDED.smtp_host,
                smtp_port               = EXCLUDED.smtp_port,
                smtp_username           = EXCLUDED.smtp_username,
                smtp_password_encrypted = EXCLUDED.smtp_password_encrypted,
                smtp_use_tls            = EXCLUDED.smtp_use_tls,
                updated_at              = NOW()
             RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(inbox_id)
        .bind(&settings.email_address)
        .bind(&settings.display_name)
        .bind(&settings.imap_host)
        .bind(settings.imap_port)
        .bind(&settings.imap_username)
        .bind(&settings.imap_password_encrypted)
        .bind(settings.imap_use_ssl)
        .bind(&settings.imap_folder)
        .bind(&settings.smtp_host)
        .bind(settings.smtp_port)
        .bind(&settings.smtp_username)
        .bind(&settings.smtp_password_encrypted)
        .bind(settings.smtp_use_tls)
        .fetch_one(executor)
        .await
    }
}
