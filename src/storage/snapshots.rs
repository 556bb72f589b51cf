//! Last-known-good snapshots per `(kind, league, subKey)`.
//!
//! Writes happen only after a successful fetch and always overwrite.
//! Staleness is never stored: `age_seconds` is computed against the
//! reader's clock, so each caller applies its own TTL.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

use super::{from_ms, to_ms, Store};
use crate::types::{ResourceKey, ResourceKind};

/// A persisted payload plus its read-time age.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
    pub age_seconds: i64,
}

impl Snapshot {
    /// Whether this snapshot is older than `ttl` for the caller asking.
    pub fn is_stale(&self, ttl: chrono::Duration) -> bool {
        self.age_seconds > ttl.num_seconds()
    }
}

impl Store {
    /// Persist `payload` as the latest snapshot for `key`.
    pub async fn put_snapshot(&self, key: &ResourceKey, payload: &serde_json::Value) -> Result<()> {
        self.put_snapshot_at(key, payload, Utc::now()).await
    }

    /// As [`Store::put_snapshot`], stamped with an explicit time.
    ///
    /// `fetched_at` keeps the later of the stored and the new timestamp.
    pub async fn put_snapshot_at(
        &self,
        key: &ResourceKey,
        payload: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let body = serde_json::to_string(payload).context("Failed to serialise snapshot payload")?;

        sqlx::query(
            r#"
            INSERT INTO snapshots (kind, league_id, sub_key, payload, fetched_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (kind, league_id, sub_key) DO UPDATE SET
                payload = excluded.payload,
                fetched_at_ms = MAX(snapshots.fetched_at_ms, excluded.fetched_at_ms)
            "#,
        )
        .bind(key.kind.as_str())
        .bind(&key.league_id)
        .bind(key.storage_sub_key())
        .bind(&body)
        .bind(to_ms(now))
        .execute(self.pool())
        .await
        .with_context(|| format!("Failed to write snapshot {key}"))?;

        debug!(key = %key, bytes = body.len(), "Snapshot written");
        Ok(())
    }

    /// Latest snapshot for `key`, aged against the current time.
    pub async fn get_snapshot(&self, key: &ResourceKey) -> Result<Option<Snapshot>> {
        self.get_snapshot_at(key, Utc::now()).await
    }

    /// Latest snapshot for `key`, aged against `now`.
    pub async fn get_snapshot_at(
        &self,
        key: &ResourceKey,
        now: DateTime<Utc>,
    ) -> Result<Option<Snapshot>> {
        let row: Option<(String, i64)> = sqlx::query_as(
            r#"
            SELECT payload, fetched_at_ms
            FROM snapshots
            WHERE kind = ?1 AND league_id = ?2 AND sub_key = ?3
            "#,
        )
        .bind(key.kind.as_str())
        .bind(&key.league_id)
        .bind(key.storage_sub_key())
        .fetch_optional(self.pool())
        .await
        .with_context(|| format!("Failed to read snapshot {key}"))?;

        let Some((body, fetched_at_ms)) = row else {
            return Ok(None);
        };

        let payload = serde_json::from_str(&body)
            .with_context(|| format!("Corrupt snapshot payload for {key}"))?;
        let fetched_at = from_ms(fetched_at_ms);
        let age_seconds = (now - fetched_at).num_seconds().max(0);

        Ok(Some(Snapshot {
            payload,
            fetched_at,
            age_seconds,
        }))
    }

    /// Delete snapshots older than `max_age`, returning counts per kind.
    pub async fn sweep_snapshots(
        &self,
        max_age: chrono::Duration,
    ) -> Result<HashMap<ResourceKind, u64>> {
        self.sweep_snapshots_at(max_age, Utc::now()).await
    }

    /// As [`Store::sweep_snapshots`], against an explicit clock.
    ///
    /// Rows are deleted only when already older than the threshold, so a
    /// concurrent write for the same key is never lost.
    pub async fn sweep_snapshots_at(
        &self,
        max_age: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<HashMap<ResourceKind, u64>> {
        let cutoff = to_ms(now - max_age);
        let mut deleted = HashMap::new();

        for kind in ResourceKind::ALL {
            let result = sqlx::query("DELETE FROM snapshots WHERE kind = ?1 AND fetched_at_ms < ?2")
                .bind(kind.as_str())
                .bind(cutoff)
                .execute(self.pool())
                .await
                .with_context(|| format!("Failed to sweep {kind} snapshots"))?;
            deleted.insert(*kind, result.rows_affected());
        }

        let total: u64 = deleted.values().sum();
        info!(
            total,
            max_age_hours = max_age.num_hours(),
            "Snapshot sweep complete"
        );
        Ok(deleted)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
