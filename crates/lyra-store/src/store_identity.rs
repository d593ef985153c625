//! External identity to internal user mapping.
//!
//! The (origin, external_user_id) pair is the stable key; internal user ids
//! are issued sequentially inside the insert transaction and never reused,
//! even when cached metadata changes later.

use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use lyra_contract::{Origin, VipTier};
use lyra_core::current_unix_timestamp_ms;

use crate::ConversationStore;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One external actor's link to an internal user, with cached value signals.
pub struct IdentityMapping {
    pub id: i64,
    pub origin: Origin,
    pub external_user_id: String,
    pub internal_user_id: i64,
    pub display_name: Option<String>,
    pub vip_tier: VipTier,
    pub total_spend: i64,
    pub created_unix_ms: u64,
    pub updated_unix_ms: u64,
}

pub(crate) fn parse_column<T>(result: anyhow::Result<T>) -> rusqlite::Result<T> {
    result.map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, error.into())
    })
}

fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<IdentityMapping> {
    let origin_raw: String = row.get("origin")?;
    let tier_raw: String = row.get("vip_tier")?;
    Ok(IdentityMapping {
        id: row.get("id")?,
        origin: parse_column(Origin::parse(&origin_raw))?,
        external_user_id: row.get("external_user_id")?,
        internal_user_id: row.get("internal_user_id")?,
        display_name: row.get("display_name")?,
        vip_tier: VipTier::parse_lossy(&tier_raw),
        total_spend: row.get("total_spend")?,
        created_unix_ms: row.get::<_, i64>("created_unix_ms")? as u64,
        updated_unix_ms: row.get::<_, i64>("updated_unix_ms")? as u64,
    })
}

impl ConversationStore {
    /// Resolve the internal user id for an (origin, external id) pair,
    /// allocating the next sequential id on first contact.
    pub fn resolve_or_create_identity(
        &self,
        origin: Origin,
        external_user_id: &str,
    ) -> Result<i64> {
        let mut connection = self.lock()?;
        let tx = connection
            .transaction()
            .context("failed to begin identity transaction")?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT internal_user_id FROM user_mappings
                 WHERE origin = ?1 AND external_user_id = ?2",
                params![origin.as_str(), external_user_id],
                |row| row.get(0),
            )
            .optional()
            .context("failed to look up identity mapping")?;
        if let Some(internal_user_id) = existing {
            tx.commit().context("failed to commit identity lookup")?;
            return Ok(internal_user_id);
        }

        let next_internal_id: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(internal_user_id), 0) + 1 FROM user_mappings",
                [],
                |row| row.get(0),
            )
            .context("failed to allocate internal user id")?;
        let now = current_unix_timestamp_ms() as i64;
        tx.execute(
            "INSERT INTO user_mappings
                (origin, external_user_id, internal_user_id, created_unix_ms, updated_unix_ms)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![origin.as_str(), external_user_id, next_internal_id, now],
        )
        .context("failed to insert identity mapping")?;
        tx.commit().context("failed to commit identity mapping")?;

        tracing::debug!(
            origin = origin.as_str(),
            external_user_id,
            internal_user_id = next_internal_id,
            "created identity mapping"
        );
        Ok(next_internal_id)
    }

    /// Update cached spend (additive) and tier/display name (replace).
    ///
    /// A no-op when no mapping exists yet; cached stats are advisory routing
    /// input, not an error condition.
    pub fn update_cached_stats(
        &self,
        origin: Origin,
        external_user_id: &str,
        spend_delta: i64,
        vip_tier: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<()> {
        let connection = self.lock()?;
        let now = current_unix_timestamp_ms() as i64;
        let delta = spend_delta.max(0);
        connection
            .execute(
                "UPDATE user_mappings SET
                    total_spend = total_spend + ?3,
                    vip_tier = COALESCE(?4, vip_tier),
                    display_name = COALESCE(?5, display_name),
                    updated_unix_ms = ?6
                 WHERE origin = ?1 AND external_user_id = ?2",
                params![
                    origin.as_str(),
                    external_user_id,
                    delta,
                    vip_tier,
                    display_name,
                    now
                ],
            )
            .context("failed to update cached identity stats")?;
        Ok(())
    }

    /// Cached identity snapshot for routing signals, if the mapping exists.
    pub fn identity_snapshot(
        &self,
        origin: Origin,
        external_user_id: &str,
    ) -> Result<Option<IdentityMapping>> {
        let connection = self.lock()?;
        connection
            .query_row(
                "SELECT id, origin, external_user_id, internal_user_id, display_name,
                        vip_tier, total_spend, created_unix_ms, updated_unix_ms
                 FROM user_mappings
                 WHERE origin = ?1 AND external_user_id = ?2",
                params![origin.as_str(), external_user_id],
                mapping_from_row,
            )
            .optional()
            .context("failed to read identity snapshot")
    }
}
