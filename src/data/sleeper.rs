//! Sleeper league API client.
//!
//! API: `https://api.sleeper.app/v1/`. No auth; public leagues only.
//! Private leagues answer 401/403, unknown leagues answer 404 or a bare
//! `null` body.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::fields::{self, extract_str, extract_u8};
use super::{send_json, LeagueProvider, UpstreamError};
use crate::types::{Athlete, ResourceKey, ResourceKind, SeasonContext};

pub const DEFAULT_BASE_URL: &str = "https://api.sleeper.app/v1";

pub struct SleeperClient {
    http: Client,
    base_url: String,
}

impl SleeperClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("GRIDIRON/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build Sleeper HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn resource_url(&self, key: &ResourceKey) -> String {
        let league = urlencoding::encode(&key.league_id);
        let base = format!("{}/league/{}", self.base_url, league);
        match (key.kind, key.week()) {
            (ResourceKind::Rosters, _) => format!("{base}/rosters"),
            (ResourceKind::TradedPicks, _) => format!("{base}/traded_picks"),
            (ResourceKind::Matchups, Some(week)) => format!("{base}/matchups/{week}"),
            (ResourceKind::Transactions, Some(week)) => format!("{base}/transactions/{week}"),
            // Validated keys always carry a week for weekly kinds.
            (ResourceKind::Matchups, None) => format!("{base}/matchups/1"),
            (ResourceKind::Transactions, None) => format!("{base}/transactions/1"),
        }
    }

    async fn get(&self, url: &str) -> Result<Value, UpstreamError> {
        debug!(url, "Sleeper request");
        send_json(self.http.get(url)).await
    }
}

#[async_trait]
impl LeagueProvider for SleeperClient {
    fn name(&self) -> &'static str {
        "sleeper"
    }

    async fn fetch_resource(&self, key: &ResourceKey) -> Result<Value, UpstreamError> {
        let url = self.resource_url(key);
        let value = self.get(&url).await?;
        // A missing league answers `null` rather than 404 on some endpoints.
        if value.is_null() {
            return Err(UpstreamError::Status {
                status: 404,
                body: format!("no data for {key}"),
            });
        }
        Ok(value)
    }

    async fn fetch_league_info(&self, league_id: &str) -> Result<Value, UpstreamError> {
        let url = format!("{}/league/{}", self.base_url, urlencoding::encode(league_id));
        let value = self.get(&url).await?;
        if value.is_null() {
            return Err(UpstreamError::Status {
                status: 404,
                body: format!("league {league_id} not found"),
            });
        }
        Ok(value)
    }

    async fn fetch_season_state(&self) -> Result<SeasonContext, UpstreamError> {
        let url = format!("{}/state/nfl", self.base_url);
        let value = self.get(&url).await?;
        parse_season_state(&value)
            .ok_or_else(|| UpstreamError::Decode("state/nfl missing season or week".into()))
    }

    async fn fetch_player_directory(&self) -> Result<Vec<Athlete>, UpstreamError> {
        let url = format!("{}/players/nfl", self.base_url);
        let value = self.get(&url).await?;
        let athletes = parse_player_directory(&value);
        if athletes.is_empty() {
            return Err(UpstreamError::Decode("player directory is empty".into()));
        }
        Ok(athletes)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// `{"season": "2025", "week": 5, ...}`. Week 0 (preseason) is clamped to 1.
pub fn parse_season_state(value: &Value) -> Option<SeasonContext> {
    let season = fields::extract_f64(value, &["season", "league_season"])?;
    let week = extract_u8(value, &["week", "display_week", "leg"])?;
    let season = u16::try_from(season as i64).ok()?;
    Some(SeasonContext::new(season, week.max(1)))
}

/// The directory is an object keyed by player id. Team defenses are keyed
/// by team abbreviation.
pub fn parse_player_directory(value: &Value) -> Vec<Athlete> {
    let Some(map) = value.as_object() else {
        return Vec::new();
    };

    map.iter()
        .filter_map(|(key, entry)| {
            let position = extract_str(entry, &["position", "fantasy_positions.0"])?;
            let full_name = extract_str(entry, &["full_name"]).or_else(|| {
                let first = extract_str(entry, &["first_name"]).unwrap_or_default();
                let last = extract_str(entry, &["last_name"]).unwrap_or_default();
                let joined = format!("{first} {last}").trim().to_string();
                (!joined.is_empty()).then_some(joined)
            })?;

            Some(Athlete {
                player_id: extract_str(entry, &["player_id"]).unwrap_or_else(|| key.clone()),
                full_name,
                position,
                team: extract_str(entry, fields::TEAM),
                depth_chart_order: extract_u8(entry, &["depth_chart_order"]),
                injury_status: extract_str(entry, &["injury_status"]),
                espn_id: extract_str(entry, &["espn_id"]),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
