//! Message storage: append-only history plus the one sanctioned mutation,
//! the draft-to-sent transition.

use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use lyra_contract::SenderRole;
use lyra_core::current_unix_timestamp_ms;

use crate::store_identity::parse_column;
use crate::ConversationStore;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// One utterance inside a conversation.
pub struct MessageRecord {
    pub id: i64,
    pub conversation_id: i64,
    pub sender: SenderRole,
    pub text: String,
    pub channel: String,
    pub is_draft: bool,
    pub original_text: Option<String>,
    pub edited_by_operator: bool,
    pub tokens_used: Option<i64>,
    pub model_used: Option<String>,
    pub created_unix_ms: u64,
}

#[derive(Debug, Clone)]
/// Parameters for `ConversationStore::append_message`.
pub struct NewMessage {
    pub conversation_id: i64,
    pub sender: SenderRole,
    pub text: String,
    pub channel: String,
    pub is_draft: bool,
    pub tokens_used: Option<i64>,
    pub model_used: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of a draft finalize attempt; the transition happens exactly once.
pub enum DraftFinalizeOutcome {
    Finalized(MessageRecord),
    NotFound,
    NotADraft,
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    let sender_raw: String = row.get("sender")?;
    Ok(MessageRecord {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        sender: parse_column(SenderRole::parse(&sender_raw))?,
        text: row.get("text")?,
        channel: row.get("channel")?,
        is_draft: row.get::<_, i64>("is_draft")? != 0,
        original_text: row.get("original_text")?,
        edited_by_operator: row.get::<_, i64>("edited_by_operator")? != 0,
        tokens_used: row.get("tokens_used")?,
        model_used: row.get("model_used")?,
        created_unix_ms: row.get::<_, i64>("created_unix_ms")? as u64,
    })
}

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender, text, channel, is_draft, \
     original_text, edited_by_operator, tokens_used, model_used, created_unix_ms";

impl ConversationStore {
    /// Append a message and bump the conversation's counter/timestamp in the
    /// same transaction, so stored history never drifts from the counters.
    pub fn append_message(&self, new: NewMessage) -> Result<MessageRecord> {
        let mut connection = self.lock()?;
        let tx = connection
            .transaction()
            .context("failed to begin message transaction")?;
        let now = current_unix_timestamp_ms() as i64;

        tx.execute(
            "INSERT INTO messages
                (conversation_id, sender, text, channel, is_draft, tokens_used, model_used,
                 created_unix_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                new.conversation_id,
                new.sender.as_str(),
                new.text,
                new.channel,
                new.is_draft as i64,
                new.tokens_used,
                new.model_used,
                now
            ],
        )
        .context("failed to insert message")?;
        let message_id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE conversations SET
                message_count = message_count + 1,
                last_message_unix_ms = ?2,
                updated_unix_ms = ?2
             WHERE id = ?1",
            params![new.conversation_id, now],
        )
        .context("failed to bump conversation counters")?;

        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
        let record = tx
            .query_row(&sql, params![message_id], message_from_row)
            .context("failed to re-read inserted message")?;
        tx.commit().context("failed to commit message append")?;
        Ok(record)
    }

    /// Most recent `limit` messages, returned oldest first.
    pub fn recent_history(&self, conversation_id: i64, limit: usize) -> Result<Vec<MessageRecord>> {
        let connection = self.lock()?;
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM (
                 SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY id DESC LIMIT ?2
             ) ORDER BY id ASC"
        );
        let mut statement = connection
            .prepare(&sql)
            .context("failed to prepare history query")?;
        let rows = statement
            .query_map(params![conversation_id, limit as i64], message_from_row)
            .context("failed to run history query")?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.context("failed to decode history row")?);
        }
        Ok(messages)
    }

    /// Full ordered message history for the operator console detail view.
    pub fn conversation_messages(&self, conversation_id: i64) -> Result<Vec<MessageRecord>> {
        let connection = self.lock()?;
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = ?1 ORDER BY id ASC"
        );
        let mut statement = connection
            .prepare(&sql)
            .context("failed to prepare message query")?;
        let rows = statement
            .query_map(params![conversation_id], message_from_row)
            .context("failed to run message query")?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row.context("failed to decode message row")?);
        }
        Ok(messages)
    }

    pub fn get_message(&self, message_id: i64) -> Result<Option<MessageRecord>> {
        let connection = self.lock()?;
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
        connection
            .query_row(&sql, params![message_id], message_from_row)
            .optional()
            .context("failed to read message")
    }

    /// One-shot draft finalize: preserves the pre-edit text, replaces the
    /// body, clears the draft flag, and reassigns the sender. A message that
    /// is not currently a draft is reported, never silently re-edited.
    pub fn finalize_draft(
        &self,
        draft_id: i64,
        new_text: &str,
        sender: SenderRole,
    ) -> Result<DraftFinalizeOutcome> {
        let mut connection = self.lock()?;
        let tx = connection
            .transaction()
            .context("failed to begin draft transaction")?;

        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1");
        let Some(existing) = tx
            .query_row(&sql, params![draft_id], message_from_row)
            .optional()
            .context("failed to read draft message")?
        else {
            tx.commit().context("failed to commit draft lookup")?;
            return Ok(DraftFinalizeOutcome::NotFound);
        };
        if !existing.is_draft {
            tx.commit().context("failed to commit draft lookup")?;
            return Ok(DraftFinalizeOutcome::NotADraft);
        }

        tx.execute(
            "UPDATE messages SET
                original_text = text,
                text = ?2,
                is_draft = 0,
                edited_by_operator = 1,
                sender = ?3
             WHERE id = ?1",
            params![draft_id, new_text, sender.as_str()],
        )
        .context("failed to finalize draft")?;

        let record = tx
            .query_row(&sql, params![draft_id], message_from_row)
            .context("failed to re-read finalized draft")?;
        tx.commit().context("failed to commit draft finalize")?;
        Ok(DraftFinalizeOutcome::Finalized(record))
    }
}
