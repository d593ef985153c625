//! SQLite persistence for identity mappings, conversations, and messages.
//!
//! The store is the single serialization point for conversation state: every
//! operation runs against one `Mutex<Connection>`, and a partial unique index
//! on active conversations guarantees at most one active row per
//! (user, performer) pair even when two inbound messages race on the same
//! dialogue.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::Connection;

mod store_conversations;
mod store_identity;
mod store_messages;
mod store_roster;
#[cfg(test)]
mod tests;

pub use store_conversations::{
    Conversation, ConversationFilters, ConversationSummary, DEFAULT_LIST_LIMIT,
};
pub use store_identity::IdentityMapping;
pub use store_messages::{DraftFinalizeOutcome, MessageRecord, NewMessage};
pub use store_roster::{NewPerformer, OperatorRecord, PerformerRecord};

/// Owns the SQLite connection backing all conversation state.
pub struct ConversationStore {
    connection: Mutex<Connection>,
}

impl ConversationStore {
    /// Open (or create) the store at `path` and initialize its schema.
    pub fn open(path: &Path) -> Result<Self> {
        let connection = Connection::open(path)
            .with_context(|| format!("failed to open conversation store {}", path.display()))?;
        Self::from_connection(connection)
    }

    /// In-memory store used by tests and ephemeral deployments.
    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory conversation store")?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        connection
            .pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub(crate) fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| anyhow::anyhow!("conversation store mutex poisoned"))
    }
}

fn initialize_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS user_mappings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                origin TEXT NOT NULL,
                external_user_id TEXT NOT NULL,
                internal_user_id INTEGER NOT NULL,
                display_name TEXT,
                vip_tier TEXT NOT NULL DEFAULT 'none',
                total_spend INTEGER NOT NULL DEFAULT 0,
                created_unix_ms INTEGER NOT NULL,
                updated_unix_ms INTEGER NOT NULL,
                UNIQUE (origin, external_user_id)
            );
            CREATE UNIQUE INDEX IF NOT EXISTS user_mappings_internal_key
                ON user_mappings (internal_user_id);

            CREATE TABLE IF NOT EXISTS performers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                provider TEXT NOT NULL DEFAULT 'openai_compat',
                model TEXT NOT NULL,
                system_prompt TEXT,
                temperature REAL NOT NULL DEFAULT 0.8,
                max_tokens INTEGER NOT NULL DEFAULT 200,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS operators (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                is_online INTEGER NOT NULL DEFAULT 0,
                max_concurrent INTEGER NOT NULL DEFAULT 10
            );

            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                external_user_id TEXT NOT NULL,
                performer_id INTEGER NOT NULL REFERENCES performers (id),
                agent_id TEXT NOT NULL,
                operator_id INTEGER REFERENCES operators (id),
                mode TEXT NOT NULL DEFAULT 'autonomous',
                priority TEXT NOT NULL DEFAULT 'normal',
                origin TEXT NOT NULL,
                message_count INTEGER NOT NULL DEFAULT 0,
                spend_total INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                last_message_unix_ms INTEGER,
                created_unix_ms INTEGER NOT NULL,
                updated_unix_ms INTEGER NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS conversations_active_key
                ON conversations (user_id, performer_id) WHERE is_active = 1;
            CREATE INDEX IF NOT EXISTS conversations_operator_idx
                ON conversations (operator_id);

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations (id),
                sender TEXT NOT NULL,
                text TEXT NOT NULL,
                channel TEXT NOT NULL,
                is_draft INTEGER NOT NULL DEFAULT 0,
                original_text TEXT,
                edited_by_operator INTEGER NOT NULL DEFAULT 0,
                tokens_used INTEGER,
                model_used TEXT,
                created_unix_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS messages_conversation_idx
                ON messages (conversation_id, id);",
        )
        .context("failed to initialize conversation store schema")?;
    Ok(())
}
