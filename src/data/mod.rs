//! Upstream data providers.
//!
//! Defines the `LeagueProvider` (primary league API) and `StatsProvider`
//! (secondary schedule/usage/injury source) traits, plus the shared HTTP
//! plumbing both clients use. Providers return raw outcomes; the fetch
//! executor decides what is retryable.

pub mod espn;
pub mod fields;
pub mod sleeper;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;

use crate::types::{
    Athlete, FailureReason, InjuryObservation, ResourceKey, ScheduledGame, SeasonContext, UsageRow,
};

/// Longest upstream error body kept for logs and envelopes.
const MAX_ERROR_BODY: usize = 300;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single upstream HTTP call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpstreamError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Undecodable response: {0}")]
    Decode(String),

    /// The provider has no endpoint for this data.
    #[error("Not configured: {0}")]
    NotConfigured(&'static str),
}

impl UpstreamError {
    /// Map onto the failure taxonomy.
    pub fn reason(&self) -> FailureReason {
        match self {
            UpstreamError::Status { status, .. } => match status {
                401 | 403 => FailureReason::AccessDenied,
                404 => FailureReason::NotFound,
                429 => FailureReason::RateLimited,
                500..=599 => FailureReason::ServerError,
                _ => FailureReason::Unexpected,
            },
            UpstreamError::Timeout => FailureReason::Timeout,
            UpstreamError::Network(_) => FailureReason::Network,
            UpstreamError::Decode(_) | UpstreamError::NotConfigured(_) => FailureReason::Unexpected,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            UpstreamError::Timeout
        } else if e.is_decode() {
            UpstreamError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            UpstreamError::Status {
                status: status.as_u16(),
                body: e.to_string(),
            }
        } else {
            UpstreamError::Network(e.to_string())
        }
    }
}

/// Send a request and decode a JSON body, mapping every failure mode.
pub(crate) async fn send_json(request: RequestBuilder) -> Result<Value, UpstreamError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| UpstreamError::Decode(e.to_string()))
}

// ---------------------------------------------------------------------------
// Provider traits
// ---------------------------------------------------------------------------

/// Primary fantasy league API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LeagueProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw payload for one league resource.
    async fn fetch_resource(&self, key: &ResourceKey) -> Result<Value, UpstreamError>;

    /// League metadata. A league that does not exist is a 404.
    async fn fetch_league_info(&self, league_id: &str) -> Result<Value, UpstreamError>;

    /// Current NFL season and week.
    async fn fetch_season_state(&self) -> Result<SeasonContext, UpstreamError>;

    /// Full player directory.
    async fn fetch_player_directory(&self) -> Result<Vec<Athlete>, UpstreamError>;
}

/// One page of a team's injury list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InjuryPage {
    pub observations: Vec<InjuryObservation>,
    pub page_count: u32,
}

/// Secondary stats and injury provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_schedule(&self, season: u16, week: u8) -> Result<Vec<ScheduledGame>, UpstreamError>;

    async fn fetch_team_usage(
        &self,
        season: u16,
        week: u8,
        team: &str,
    ) -> Result<Vec<UsageRow>, UpstreamError>;

    /// Injuries for one team. Pages are 1-based.
    async fn fetch_team_injuries(&self, team: &str, page: u32) -> Result<InjuryPage, UpstreamError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
