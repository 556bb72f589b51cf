//! ESPN stats client: weekly schedule, team usage rows and injuries.
//!
//! Schedule: `site.api.espn.com/.../scoreboard` (public).
//! Injuries: `sports.core.api.espn.com/.../teams/{id}/injuries` (public,
//! paginated; list items may be `$ref` links that need a second fetch).
//! Usage: a configurable JSON endpoint keyed by season/week/team, with an
//! optional `x-api-key` header.
//!
//! Athlete ids in injury observations are ESPN ids; mapping them onto
//! league player ids is the caller's job.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::fields::{self, extract_f64, extract_str};
use super::{send_json, InjuryPage, StatsProvider, UpstreamError};
use crate::types::{InjuryObservation, ScheduledGame, UsageRow};

pub const DEFAULT_SCOREBOARD_URL: &str =
    "https://site.api.espn.com/apis/site/v2/sports/football/nfl/scoreboard";
pub const DEFAULT_CORE_URL: &str = "https://sports.core.api.espn.com/v2/sports/football/leagues/nfl";

/// Last regular-season week; later weeks are postseason (`seasontype=3`).
const REGULAR_SEASON_WEEKS: u8 = 18;

/// League abbreviation → ESPN team id.
pub const TEAM_IDS: &[(&str, u32)] = &[
    ("ARI", 22), ("ATL", 1), ("BAL", 33), ("BUF", 2), ("CAR", 29), ("CHI", 3),
    ("CIN", 4), ("CLE", 5), ("DAL", 6), ("DEN", 7), ("DET", 8), ("GB", 9),
    ("HOU", 34), ("IND", 11), ("JAX", 30), ("KC", 12), ("LV", 13), ("LAC", 24),
    ("LAR", 14), ("MIA", 15), ("MIN", 16), ("NE", 17), ("NO", 18), ("NYG", 19),
    ("NYJ", 20), ("PHI", 21), ("PIT", 23), ("SF", 25), ("SEA", 26), ("TB", 27),
    ("TEN", 10), ("WAS", 28),
];

/// All 32 team abbreviations.
pub fn all_teams() -> impl Iterator<Item = &'static str> {
    TEAM_IDS.iter().map(|(abbr, _)| *abbr)
}

pub fn team_id(abbr: &str) -> Option<u32> {
    let abbr = normalize_team(abbr);
    TEAM_IDS.iter().find(|(a, _)| *a == abbr).map(|(_, id)| *id)
}

/// ESPN spells a few teams differently from the league API.
pub fn normalize_team(abbr: &str) -> String {
    match abbr.trim().to_uppercase().as_str() {
        "WSH" => "WAS".to_string(),
        "LA" => "LAR".to_string(),
        "JAC" => "JAX".to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct EspnClient {
    http: Client,
    scoreboard_url: String,
    core_url: String,
    usage_url: Option<String>,
    api_key: Option<SecretString>,
}

impl EspnClient {
    pub fn new(
        scoreboard_url: &str,
        core_url: &str,
        usage_url: Option<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("GRIDIRON/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build ESPN HTTP client")?;
        Ok(Self {
            http,
            scoreboard_url: scoreboard_url.trim_end_matches('/').to_string(),
            core_url: core_url.trim_end_matches('/').to_string(),
            usage_url,
            api_key,
        })
    }

    fn scoreboard_query(season: u16, week: u8) -> Vec<(&'static str, String)> {
        let (season_type, espn_week) = if week > REGULAR_SEASON_WEEKS {
            (3, week - REGULAR_SEASON_WEEKS)
        } else {
            (2, week)
        };
        vec![
            ("dates", season.to_string()),
            ("seasontype", season_type.to_string()),
            ("week", espn_week.to_string()),
        ]
    }

    /// Resolve one injury list item, following a `$ref` when the item is
    /// only a link.
    async fn resolve_item(&self, item: &Value) -> Option<Value> {
        if item.get("status").is_some() || item.get("type").is_some() {
            return Some(item.clone());
        }
        let link = item.get("$ref").and_then(Value::as_str)?;
        match send_json(self.http.get(link)).await {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(link, error = %e, "Injury item fetch failed");
                None
            }
        }
    }
}

#[async_trait]
impl StatsProvider for EspnClient {
    fn name(&self) -> &'static str {
        "espn"
    }

    async fn fetch_schedule(&self, season: u16, week: u8) -> Result<Vec<ScheduledGame>, UpstreamError> {
        let request = self
            .http
            .get(&self.scoreboard_url)
            .query(&Self::scoreboard_query(season, week));
        let value = send_json(request).await?;
        let games = parse_scoreboard(&value);
        debug!(season, week, games = games.len(), "Schedule fetched");
        Ok(games)
    }

    async fn fetch_team_usage(
        &self,
        season: u16,
        week: u8,
        team: &str,
    ) -> Result<Vec<UsageRow>, UpstreamError> {
        let Some(url) = &self.usage_url else {
            return Err(UpstreamError::NotConfigured("usage_url"));
        };

        let mut request = self.http.get(url).query(&[
            ("season", season.to_string()),
            ("week", week.to_string()),
            ("team", team.to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key.expose_secret().as_str());
        }

        let value = send_json(request).await?;
        Ok(parse_usage_rows(&value, team))
    }

    async fn fetch_team_injuries(&self, team: &str, page: u32) -> Result<InjuryPage, UpstreamError> {
        let Some(espn_team) = team_id(team) else {
            return Err(UpstreamError::Status {
                status: 404,
                body: format!("unknown team {team}"),
            });
        };

        let url = format!("{}/teams/{}/injuries", self.core_url, espn_team);
        let value = send_json(self.http.get(&url).query(&[("page", page.max(1).to_string())])).await?;

        let items = fields::rows(&value);
        let resolved = join_all(items.iter().map(|item| self.resolve_item(item))).await;
        let observations: Vec<InjuryObservation> = resolved
            .iter()
            .flatten()
            .filter_map(|item| parse_injury_item(item, team))
            .collect();

        let dropped = items.len() - observations.len();
        if dropped > 0 {
            warn!(team, page, dropped, "Some injury items could not be parsed");
        }

        Ok(InjuryPage {
            observations,
            page_count: fields::extract_u8(&value, &["pageCount"]).map(u32::from).unwrap_or(1),
        })
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// `events[].competitions[0].competitors[]` with `homeAway` markers.
pub fn parse_scoreboard(value: &Value) -> Vec<ScheduledGame> {
    let events = value.get("events").and_then(Value::as_array);
    events
        .into_iter()
        .flatten()
        .filter_map(|event| {
            let competitors = fields::lookup(event, "competitions.0.competitors")?.as_array()?;
            let side = |marker: &str| {
                competitors
                    .iter()
                    .find(|c| c.get("homeAway").and_then(Value::as_str) == Some(marker))
                    .and_then(|c| extract_str(c, &["team.abbreviation"]))
                    .map(|abbr| normalize_team(&abbr))
            };
            Some(ScheduledGame {
                home: side("home")?,
                away: side("away")?,
            })
        })
        .collect()
}

/// Usage rows for one team. Rows without a player id are dropped.
pub fn parse_usage_rows(value: &Value, team: &str) -> Vec<UsageRow> {
    fields::rows(value)
        .iter()
        .filter_map(|row| {
            let player_id = extract_str(row, fields::PLAYER_ID)?;
            Some(UsageRow {
                player_id,
                team: extract_str(row, fields::TEAM)
                    .map(|t| normalize_team(&t))
                    .or_else(|| Some(team.to_string())),
                snap_pct: extract_f64(row, fields::SNAP_PCT).map(fields::normalize_snap_pct),
                targets: extract_f64(row, fields::TARGETS),
                routes: extract_f64(row, fields::ROUTES),
                rz_touches: extract_f64(row, fields::RZ_TOUCHES),
            })
        })
        .collect()
}

/// Trailing numeric id of an ESPN `$ref` link.
fn id_from_ref(link: &str) -> Option<String> {
    let path = link.split('?').next()?;
    let last = path.trim_end_matches('/').rsplit('/').next()?;
    (!last.is_empty() && last.chars().all(|c| c.is_ascii_digit())).then(|| last.to_string())
}

pub fn parse_injury_item(item: &Value, team: &str) -> Option<InjuryObservation> {
    let player_id = extract_str(item, &["athlete.id", "athleteId"]).or_else(|| {
        fields::lookup(item, "athlete.$ref")
            .and_then(Value::as_str)
            .and_then(id_from_ref)
    })?;
    let status = extract_str(item, fields::INJURY_STATUS)?;

    Some(InjuryObservation {
        player_id,
        team_id: team.to_string(),
        position: extract_str(item, fields::POSITION),
        status,
        description: extract_str(item, fields::INJURY_DESCRIPTION),
        date_reported: extract_str(item, fields::INJURY_DATE),
        practice_status: extract_str(item, fields::PRACTICE_STATUS),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
