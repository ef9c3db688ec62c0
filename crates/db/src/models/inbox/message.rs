use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, TS, Display, EnumString, Default)]
#[sqlx(type_name = "inbox_message_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum InboxMessageStatus {
    #[default]
    Pending,
    Processed,
    Converted,
    Ignored,
    Failed,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct InboxMessage {
    pub id: Uuid,
    pub inbox_id: Uuid,
    pub message_id: String,
    pub thread_id: Option<String>,
    pub subject: Option<String>,
    pub from_email: String,
    pub from_name: Option<String>,
    pub to_emails: Vec<String>,
    pub cc_emails: Vec<String>,
    pub text_content: Option<String>,
    pub html_content: Option<String>,
    pub status: InboxMessageStatus,
    pub task_id: Option<Uuid>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct NewInboxMessage {
    pub message_id: String,
    pub thread_id: Option<String>,
    pub subject: Option<String>,
    pub from_email: String,
    pub from_name: Option<String>,
    #[serde(default)]
    pub to_emails: Vec<String>,
    #[serde(default)]
    pub cc_emails: Vec<String>,
    pub text_content: Option<String>,
    pub html_content: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
}

const MESSAGE_COLUMNS: &str = "id, inbox_id, message_id, thread_id, subject, from_email, from_name, \
     to_emails, cc_emails, text_content, html_content, status, task_id, received_at, processed_at, \
     created_at";

impl InboxMessage {
    /// Inserts a message; a repeated `(inbox, message_id)` is a unique violation.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        inbox_id: Uuid,
        data: &NewInboxMessage,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, InboxMessage>(&format!(
            "INSERT INTO inbox_messages
                (inbox_id, message_id, thread_id, subject, from_email, from_name, to_emails,
                 cc_emails, text_content, html_content, received_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, COALESCE($11, NOW()))
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(inbox_id)
        .bind(&data.message_id)
        .bind(&data.thread_id)
        .bind(&data.subject)
        .bind(&data.from_email)
        .bind(&data.from_name)
        .bind(&data.to_emails)
        .bind(&data.cc_emails)
        .bind(&data.text_content)
        .bind(&data.html_content)
        .bind(data.received_at)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, InboxMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM inbox_messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        inbox_id: Uuid,
        status: Option<InboxMessageStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, InboxMessage>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM inbox_messages
             WHERE inbox_id = $1 AND ($2::inbox_message_status IS NULL OR status = $2)
             ORDER BY received_at DESC, id ASC
             LIMIT $3 OFFSET $4"
        ))
        .bind(inbox_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    pub async fn count<'e, E: PgExecutor<'e>>(
        executor: E,
        inbox_id: Uuid,
        status: Option<InboxMessageStatus>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM inbox_messages
             WHERE inbox_id = $1 AND ($2::inbox_message_status IS NULL OR status = $2)",
        )
        .bind(inbox_id)
        .bind(status)
        .fetch_one(executor)
        .await
    }

    pub async fn mark<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        status: InboxMessageStatus,
        task_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, InboxMessage>(&format!(
            "UPDATE inbox_messages SET
                status       = $2,
                task_id      = COALESCE($3, task_id),
                processed_at = NOW()
             WHERE id = $1
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .bind(task_id)
        .fetch_one(executor)
        .await
    }
}
