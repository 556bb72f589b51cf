//! Persistence layer.
//!
//! A single SQLite database holds the snapshot table and the per-field
//! reference caches (athletes, weekly usage, schedule, injuries, practice).
//! `Store` is an explicit value injected into the fetch executor and the
//! enrichment engine; tests open an isolated in-memory store per case.

pub mod cache;
pub mod snapshots;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub use snapshots::Snapshot;

/// Schema statements, applied in order on every open.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS snapshots (
        kind TEXT NOT NULL,
        league_id TEXT NOT NULL,
        sub_key TEXT NOT NULL DEFAULT '',
        payload TEXT NOT NULL,
        fetched_at_ms INTEGER NOT NULL,
        PRIMARY KEY (kind, league_id, sub_key)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_snapshots_fetched_at ON snapshots(kind, fetched_at_ms)",
    r#"
    CREATE TABLE IF NOT EXISTS athletes (
        player_id TEXT PRIMARY KEY,
        full_name TEXT NOT NULL,
        position TEXT NOT NULL,
        team TEXT,
        depth_chart_order INTEGER,
        injury_status TEXT,
        espn_id TEXT,
        updated_at_ms INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_athletes_espn_id ON athletes(espn_id)",
    r#"
    CREATE TABLE IF NOT EXISTS weekly_usage (
        player_id TEXT NOT NULL,
        season INTEGER NOT NULL,
        week INTEGER NOT NULL,
        team TEXT,
        snap_pct REAL,
        targets REAL,
        routes REAL,
        rz_touches REAL,
        updated_at_ms INTEGER NOT NULL,
        PRIMARY KEY (player_id, season, week)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS schedule (
        season INTEGER NOT NULL,
        week INTEGER NOT NULL,
        team_id TEXT NOT NULL,
        opponent TEXT NOT NULL,
        PRIMARY KEY (season, week, team_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS injuries (
        player_id TEXT PRIMARY KEY,
        team_id TEXT NOT NULL,
        position TEXT,
        status TEXT NOT NULL,
        severity INTEGER NOT NULL,
        confidence INTEGER NOT NULL,
        sources TEXT NOT NULL,
        description TEXT,
        date_reported TEXT,
        updated_at_ms INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS practice (
        player_id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        updated_at_ms INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cache_meta (
        name TEXT PRIMARY KEY,
        refreshed_at_ms INTEGER NOT NULL
    )
    "#,
];

/// Handle to the shared SQLite database.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database url: {database_url}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {database_url}"))?;

        let store = Self { pool };
        store.migrate().await?;
        info!(database_url, "Store opened");
        Ok(store)
    }

    /// Private in-memory database. One connection that never expires, so
    /// the data lives as long as the store.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database url")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema")?;
        }
        debug!(statements = SCHEMA.len(), "Schema applied");
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn to_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
