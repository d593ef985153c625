//! Performer persona and operator roster storage.
//!
//! Kept deliberately thin: the pipeline needs persona lookup for reply
//! generation and the operator roster for availability/allocation signals.

use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::ConversationStore;

#[derive(Debug, Clone, PartialEq)]
/// A configured AI persona conversations are routed through.
pub struct PerformerRecord {
    pub id: i64,
    pub label: String,
    pub agent_id: String,
    pub provider: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
/// Parameters for `ConversationStore::insert_performer`.
pub struct NewPerformer {
    pub label: String,
    pub agent_id: String,
    pub provider: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub max_tokens: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `OperatorRecord` used across Lyra components.
pub struct OperatorRecord {
    pub id: i64,
    pub name: String,
    pub is_online: bool,
    pub max_concurrent: i64,
}

fn performer_from_row(row: &Row<'_>) -> rusqlite::Result<PerformerRecord> {
    Ok(PerformerRecord {
        id: row.get("id")?,
        label: row.get("label")?,
        agent_id: row.get("agent_id")?,
        provider: row.get("provider")?,
        model: row.get("model")?,
        system_prompt: row.get("system_prompt")?,
        temperature: row.get("temperature")?,
        max_tokens: row.get("max_tokens")?,
        is_active: row.get::<_, i64>("is_active")? != 0,
    })
}

fn operator_from_row(row: &Row<'_>) -> rusqlite::Result<OperatorRecord> {
    Ok(OperatorRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        is_online: row.get::<_, i64>("is_online")? != 0,
        max_concurrent: row.get("max_concurrent")?,
    })
}

impl ConversationStore {
    pub fn insert_performer(&self, new: NewPerformer) -> Result<PerformerRecord> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO performers
                    (label, agent_id, provider, model, system_prompt, temperature, max_tokens)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    new.label,
                    new.agent_id,
                    new.provider,
                    new.model,
                    new.system_prompt,
                    new.temperature,
                    new.max_tokens
                ],
            )
            .context("failed to insert performer")?;
        let id = connection.last_insert_rowid();
        connection
            .query_row(
                "SELECT id, label, agent_id, provider, model, system_prompt, temperature,
                        max_tokens, is_active
                 FROM performers WHERE id = ?1",
                params![id],
                performer_from_row,
            )
            .context("failed to re-read inserted performer")
    }

    pub fn get_performer(&self, performer_id: i64) -> Result<Option<PerformerRecord>> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT id, label, agent_id, provider, model, system_prompt, temperature,
                        max_tokens, is_active
                 FROM performers WHERE id = ?1",
                params![performer_id],
                performer_from_row,
            )
            .optional()
            .context("failed to read performer")
    }

    pub fn performer_count(&self) -> Result<i64> {
        let connection = self.lock()?;
        connection
            .query_row("SELECT COUNT(1) FROM performers", [], |row| row.get(0))
            .context("failed to count performers")
    }

    /// Retire or reinstate a performer. Inactive performers stay in the
    /// table so historical conversations keep their label.
    pub fn set_performer_active(&self, performer_id: i64, is_active: bool) -> Result<bool> {
        let connection = self.lock()?;
        let changed = connection
            .execute(
                "UPDATE performers SET is_active = ?2 WHERE id = ?1",
                params![performer_id, is_active as i64],
            )
            .context("failed to update performer status")?;
        Ok(changed > 0)
    }

    pub fn insert_operator(&self, name: &str, max_concurrent: i64) -> Result<OperatorRecord> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO operators (name, max_concurrent) VALUES (?1, ?2)",
                params![name, max_concurrent],
            )
            .context("failed to insert operator")?;
        let id = connection.last_insert_rowid();
        connection
            .query_row(
                "SELECT id, name, is_online, max_concurrent FROM operators WHERE id = ?1",
                params![id],
                operator_from_row,
            )
            .context("failed to re-read inserted operator")
    }

    pub fn set_operator_online(&self, operator_id: i64, is_online: bool) -> Result<bool> {
        let connection = self.lock()?;
        let changed = connection
            .execute(
                "UPDATE operators SET is_online = ?2 WHERE id = ?1",
                params![operator_id, is_online as i64],
            )
            .context("failed to update operator status")?;
        Ok(changed > 0)
    }

    /// First online operator by id. Allocation semantics are deliberately
    /// "assign someone"; load balancing across a pool is out of scope.
    pub fn first_online_operator(&self) -> Result<Option<OperatorRecord>> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT id, name, is_online, max_concurrent FROM operators
                 WHERE is_online = 1 ORDER BY id ASC LIMIT 1",
                [],
                operator_from_row,
            )
            .optional()
            .context("failed to read online operator")
    }

    pub fn any_operator_online(&self) -> Result<bool> {
        Ok(self.first_online_operator()?.is_some())
    }
}
