//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys) are referenced by env-var name in the config and
//! resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::engine::enricher::EnrichmentSettings;
use crate::types::{GridironError, ResourceKind, SeasonContext, MAX_WEEK};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub league_api: LeagueApiConfig,
    pub stats_api: StatsApiConfig,
    pub retry: RetryConfig,
    pub snapshots: SnapshotConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    pub storage: StorageConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    /// Maintenance loop tick.
    pub maintenance_interval_secs: u64,
    /// Used when the league API cannot report the current season/week.
    pub default_season: u16,
    pub default_week: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeagueApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Player directory reload interval.
    #[serde(default = "default_directory_refresh_hours")]
    pub directory_refresh_hours: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsApiConfig {
    pub scoreboard_url: String,
    pub core_url: String,
    #[serde(default)]
    pub usage_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
    #[serde(default = "default_injury_pages")]
    pub max_injury_pages: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Delay before each attempt, in ms. Index 0 is normally 0.
    pub backoff_ms: Vec<u64>,
    /// Overall deadline for one read, retries included.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    pub rosters_ttl_secs: u64,
    pub matchups_ttl_secs: u64,
    pub transactions_ttl_secs: u64,
    pub traded_picks_ttl_secs: u64,
    pub purge_after_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    pub injury_max_age_hours: i64,
    pub practice_max_age_hours: i64,
    pub trend_threshold: f64,
    pub injury_refresh_hours: i64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            injury_max_age_hours: 12,
            practice_max_age_hours: 72,
            trend_threshold: 0.15,
            injury_refresh_hours: 12,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

fn default_directory_refresh_hours() -> u64 {
    12
}

fn default_injury_pages() -> u32 {
    5
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Invalid TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), GridironError> {
        if self.retry.backoff_ms.is_empty() {
            return Err(GridironError::Config("retry.backoff_ms must not be empty".into()));
        }
        if !(1..=MAX_WEEK).contains(&self.service.default_week) {
            return Err(GridironError::Config(format!(
                "service.default_week must be between 1 and {MAX_WEEK}"
            )));
        }
        if self.retry.request_timeout_secs == 0 {
            return Err(GridironError::Config("retry.request_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The optional stats API key, if its variable is set.
    pub fn stats_api_key(&self) -> Option<SecretString> {
        self.stats_api
            .api_key_env
            .as_deref()
            .and_then(|name| Self::resolve_env(name).ok())
            .map(SecretString::new)
    }

    pub fn fallback_context(&self) -> SeasonContext {
        SeasonContext::new(self.service.default_season, self.service.default_week)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.retry.request_timeout_secs)
    }

    /// Freshness window for snapshots of `kind`.
    pub fn snapshot_ttl(&self, kind: ResourceKind) -> chrono::Duration {
        let secs = match kind {
            ResourceKind::Rosters => self.snapshots.rosters_ttl_secs,
            ResourceKind::Matchups => self.snapshots.matchups_ttl_secs,
            ResourceKind::Transactions => self.snapshots.transactions_ttl_secs,
            ResourceKind::TradedPicks => self.snapshots.traded_picks_ttl_secs,
        };
        chrono::Duration::seconds(secs as i64)
    }

    pub fn enrichment_settings(&self) -> EnrichmentSettings {
        EnrichmentSettings {
            injury_max_age: chrono::Duration::hours(self.enrichment.injury_max_age_hours),
            practice_max_age: chrono::Duration::hours(self.enrichment.practice_max_age_hours),
            trend_threshold: self.enrichment.trend_threshold,
            ..EnrichmentSettings::default()
        }
    }
}
