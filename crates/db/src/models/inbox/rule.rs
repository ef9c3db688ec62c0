use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, types::Json};
use ts_rs::TS;
use uuid::Uuid;

use crate::models::task::{TaskPriority, TaskType};

/// All present conditions must match (case-insensitive substring).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct RuleConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_contains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_contains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_contains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_contains: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct RuleActions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_type: Option<TaskType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_assignee: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_status: Option<Uuid>,
    pub ignore: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct InboxRule {
    pub id: Uuid,
    pub inbox_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub priority: i32,
    pub enabled: bool,
    #[ts(as = "RuleConditions")]
    pub conditions: Json<RuleConditions>,
    #[ts(as = "RuleActions")]
    pub actions: Json<RuleActions>,
    pub stop_on_match: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInboxRule {
    pub name: String,
    pub description: Option<String>,
    pub priority: i32,
    pub enabled: bool,
    pub conditions: RuleConditions,
    pub actions: RuleActions,
    pub stop_on_match: bool,
}

#[derive(Debug, Clone, Default)]
pub struct InboxRuleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub enabled: Option<bool>,
    pub conditions: Option<RuleConditions>,
    pub actions: Option<RuleActions>,
    pub stop_on_match: Option<bool>,
}

const RULE_COLUMNS: &str = "id, inbox_id, name, description, priority, enabled, conditions, actions, \
     stop_on_match, created_at, updated_at";

impl InboxRule {
    /// Rules in evaluation order.
    pub async fn list_for_inbox<'e, E: PgExecutor<'e>>(
        executor: E,
        inbox_id: Uuid,
        enabled_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, InboxRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM inbox_rules
             WHERE inbox_id = $1 AND (NOT $2 OR enabled)
             ORDER BY priority ASC, created_at ASC"
        ))
        .bind(inbox_id)
        .bind(enabled_only)
        .fetch_all(executor)
        .await
    }

    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, InboxRule>(&format!("SELECT {RULE_COLUMNS} FROM inbox_rules WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        inbox_id: Uuid,
        data: &NewInboxRule,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, InboxRule>(&format!(
            "INSERT INTO inbox_rules
                (inbox_id, name, description, priority, enabled, conditions, actions, stop_on_match)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {RULE_COLUMNS}"
        ))
        .bind(inbox_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.priority)
        .bind(data.enabled)
        .bind(Json(&data.conditions))
        .bind(Json(&data.actions))
        .bind(data.stop_on_match)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        changes: &InboxRuleChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, InboxRule>(&format!(
            "UPDATE inbox_rules SET
                name          = COALESCE($2, name),
                description   = COALESCE($3, description),
                priority      = COALESCE($4, priority),
                enabled       = COALESCE($5, enabled),
                conditions    = COALESCE($6, conditions),
                actions       = COALESCE($7, actions),
                stop_on_match = COALESCE($8, stop_on_match),
                updated_at    = NOW()
             WHERE id = $1
             RETURNING {RULE_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.priority)
        .bind(changes.enabled)
        .bind(changes.conditions.as_ref().map(Json))
        .bind(changes.actions.as_ref().map(Json))
        .bind(changes.stop_on_match)
        .fetch_optional(executor)
        .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM inbox_rules WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}
