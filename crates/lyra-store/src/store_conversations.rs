//! Conversation lifecycle storage.
//!
//! `find_or_create_active` is the only place the single-active-conversation
//! invariant is enforced: a partial unique index on (user_id, performer_id)
//! for active rows makes the create atomic, and a constraint violation is
//! resolved by re-reading the winner's row instead of surfacing an error.

use anyhow::{bail, Context, Result};
use rusqlite::{params, OptionalExtension, Row, ToSql};
use serde::Serialize;

use lyra_contract::{ConversationMode, ConversationPriority, Origin};
use lyra_core::current_unix_timestamp_ms;

use crate::store_identity::parse_column;
use crate::ConversationStore;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
const PREVIEW_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// One ongoing dialogue between an internal user and a performer persona.
pub struct Conversation {
    pub id: i64,
    pub user_id: i64,
    pub external_user_id: String,
    pub performer_id: i64,
    pub agent_id: String,
    pub operator_id: Option<i64>,
    pub mode: ConversationMode,
    pub priority: ConversationPriority,
    pub origin: Origin,
    pub message_count: i64,
    pub spend_total: i64,
    pub is_active: bool,
    pub last_message_unix_ms: Option<u64>,
    pub created_unix_ms: u64,
    pub updated_unix_ms: u64,
}

#[derive(Debug, Clone, Default)]
/// Filters accepted by the operator console conversation list.
pub struct ConversationFilters {
    pub operator_id: Option<i64>,
    pub mode: Option<ConversationMode>,
    pub priority: Option<ConversationPriority>,
    pub origin: Option<Origin>,
    pub active_only: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Console list row: conversation state plus a preview of the last message.
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub performer_label: String,
    pub last_message_preview: Option<String>,
}

pub(crate) fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let mode_raw: String = row.get("mode")?;
    let priority_raw: String = row.get("priority")?;
    let origin_raw: String = row.get("origin")?;
    Ok(Conversation {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        external_user_id: row.get("external_user_id")?,
        performer_id: row.get("performer_id")?,
        agent_id: row.get("agent_id")?,
        operator_id: row.get("operator_id")?,
        mode: parse_column(ConversationMode::parse(&mode_raw))?,
        priority: parse_column(ConversationPriority::parse(&priority_raw))?,
        origin: parse_column(Origin::parse(&origin_raw))?,
        message_count: row.get("message_count")?,
        spend_total: row.get("spend_total")?,
        is_active: row.get::<_, i64>("is_active")? != 0,
        last_message_unix_ms: row
            .get::<_, Option<i64>>("last_message_unix_ms")?
            .map(|value| value as u64),
        created_unix_ms: row.get::<_, i64>("created_unix_ms")? as u64,
        updated_unix_ms: row.get::<_, i64>("updated_unix_ms")? as u64,
    })
}

const CONVERSATION_COLUMNS: &str = "id, user_id, external_user_id, performer_id, agent_id, \
     operator_id, mode, priority, origin, message_count, spend_total, is_active, \
     last_message_unix_ms, created_unix_ms, updated_unix_ms";

impl ConversationStore {
    /// Find the active conversation for (user, performer), creating one with
    /// mode=autonomous / priority=normal when none exists.
    pub fn find_or_create_active(
        &self,
        user_id: i64,
        performer_id: i64,
        origin: Origin,
        external_user_id: &str,
        agent_id: &str,
    ) -> Result<Conversation> {
        let mut connection = self.lock()?;
        let tx = connection
            .transaction()
            .context("failed to begin conversation transaction")?;

        let select_sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE user_id = ?1 AND performer_id = ?2 AND is_active = 1"
        );
        if let Some(existing) = tx
            .query_row(
                &select_sql,
                params![user_id, performer_id],
                conversation_from_row,
            )
            .optional()
            .context("failed to look up active conversation")?
        {
            tx.commit().context("failed to commit conversation lookup")?;
            return Ok(existing);
        }

        let now = current_unix_timestamp_ms() as i64;
        let inserted = tx.execute(
            "INSERT INTO conversations
                (user_id, external_user_id, performer_id, agent_id, mode, priority, origin,
                 created_unix_ms, updated_unix_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                user_id,
                external_user_id,
                performer_id,
                agent_id,
                ConversationMode::Autonomous.as_str(),
                ConversationPriority::Normal.as_str(),
                origin.as_str(),
                now
            ],
        );

        match inserted {
            Ok(_) => {
                let conversation = tx
                    .query_row(
                        &select_sql,
                        params![user_id, performer_id],
                        conversation_from_row,
                    )
                    .context("failed to re-read created conversation")?;
                tx.commit().context("failed to commit conversation create")?;
                tracing::debug!(
                    conversation_id = conversation.id,
                    user_id,
                    performer_id,
                    "created active conversation"
                );
                Ok(conversation)
            }
            // A concurrent writer won the create; its row is the conversation.
            Err(rusqlite::Error::SqliteFailure(error, _))
                if error.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                let conversation = tx
                    .query_row(
                        &select_sql,
                        params![user_id, performer_id],
                        conversation_from_row,
                    )
                    .context("failed to read winning conversation after conflict")?;
                tx.commit()
                    .context("failed to commit conversation conflict resolution")?;
                Ok(conversation)
            }
            Err(error) => Err(error).context("failed to insert conversation"),
        }
    }

    pub fn get_conversation(&self, conversation_id: i64) -> Result<Option<Conversation>> {
        let connection = self.lock()?;
        let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
        connection
            .query_row(&sql, params![conversation_id], conversation_from_row)
            .optional()
            .context("failed to read conversation")
    }

    /// Persist a routing change. Returns false (and writes nothing) when the
    /// requested mode/priority/operator already match the stored row.
    pub fn set_mode(
        &self,
        conversation_id: i64,
        mode: ConversationMode,
        priority: ConversationPriority,
        operator_id: Option<i64>,
    ) -> Result<bool> {
        let connection = self.lock()?;
        let now = current_unix_timestamp_ms() as i64;
        let changed = connection
            .execute(
                "UPDATE conversations SET
                    mode = ?2, priority = ?3, operator_id = ?4, updated_unix_ms = ?5
                 WHERE id = ?1
                   AND (mode != ?2 OR priority != ?3 OR operator_id IS NOT ?4)",
                params![
                    conversation_id,
                    mode.as_str(),
                    priority.as_str(),
                    operator_id,
                    now
                ],
            )
            .context("failed to update conversation mode")?;
        Ok(changed > 0)
    }

    /// Replace the conversation's cumulative spend snapshot.
    pub fn update_conversation_spend(&self, conversation_id: i64, spend_total: i64) -> Result<()> {
        let connection = self.lock()?;
        connection
            .execute(
                "UPDATE conversations SET spend_total = ?2 WHERE id = ?1",
                params![conversation_id, spend_total],
            )
            .context("failed to update conversation spend")?;
        Ok(())
    }

    /// Terminal state: flips is_active off so the (user, performer) key can
    /// host a fresh conversation later. Not exercised by the inbound flow.
    pub fn deactivate_conversation(&self, conversation_id: i64) -> Result<bool> {
        let connection = self.lock()?;
        let now = current_unix_timestamp_ms() as i64;
        let changed = connection
            .execute(
                "UPDATE conversations SET is_active = 0, updated_unix_ms = ?2
                 WHERE id = ?1 AND is_active = 1",
                params![conversation_id, now],
            )
            .context("failed to deactivate conversation")?;
        Ok(changed > 0)
    }

    /// Operator console list: filtered, most-recent-first, paginated, with a
    /// preview of each conversation's latest message.
    pub fn list_conversations(
        &self,
        filters: &ConversationFilters,
    ) -> Result<Vec<ConversationSummary>> {
        let limit = filters.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if limit <= 0 {
            bail!("conversation list limit must be positive");
        }
        let offset = filters.offset.unwrap_or(0).max(0);

        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(operator_id) = filters.operator_id {
            values.push(Box::new(operator_id));
            clauses.push(format!("c.operator_id = ?{}", values.len()));
        }
        if let Some(mode) = filters.mode {
            values.push(Box::new(mode.as_str()));
            clauses.push(format!("c.mode = ?{}", values.len()));
        }
        if let Some(priority) = filters.priority {
            values.push(Box::new(priority.as_str()));
            clauses.push(format!("c.priority = ?{}", values.len()));
        }
        if let Some(origin) = filters.origin {
            values.push(Box::new(origin.as_str()));
            clauses.push(format!("c.origin = ?{}", values.len()));
        }
        if filters.active_only {
            clauses.push("c.is_active = 1".to_string());
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        values.push(Box::new(limit));
        let limit_index = values.len();
        values.push(Box::new(offset));
        let offset_index = values.len();

        let sql = format!(
            "SELECT c.id, c.user_id, c.external_user_id, c.performer_id, c.agent_id,
                    c.operator_id, c.mode, c.priority, c.origin, c.message_count,
                    c.spend_total, c.is_active, c.last_message_unix_ms,
                    c.created_unix_ms, c.updated_unix_ms,
                    COALESCE(p.label, 'unknown') AS performer_label,
                    (SELECT m.text FROM messages m
                      WHERE m.conversation_id = c.id
                      ORDER BY m.id DESC LIMIT 1) AS last_message_text
             FROM conversations c
             LEFT JOIN performers p ON p.id = c.performer_id
             {where_clause}
             ORDER BY c.last_message_unix_ms DESC NULLS LAST, c.id DESC
             LIMIT ?{limit_index} OFFSET ?{offset_index}"
        );

        let connection = self.lock()?;
        let mut statement = connection
            .prepare(&sql)
            .context("failed to prepare conversation list query")?;
        let params = rusqlite::params_from_iter(values.iter().map(|value| value.as_ref()));
        let rows = statement
            .query_map(params, |row| {
                let conversation = conversation_from_row(row)?;
                let performer_label: String = row.get("performer_label")?;
                let last_message_text: Option<String> = row.get("last_message_text")?;
                Ok(ConversationSummary {
                    conversation,
                    performer_label,
                    last_message_preview: last_message_text
                        .map(|text| text.chars().take(PREVIEW_MAX_CHARS).collect()),
                })
            })
            .context("failed to run conversation list query")?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row.context("failed to decode conversation summary row")?);
        }
        Ok(summaries)
    }
}
