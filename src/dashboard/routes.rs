//! Read API route handlers.
//!
//! League endpoints return the pipeline `Envelope` as JSON, with the HTTP
//! status mirroring its `errorType`. State is shared via `Arc<ApiState>`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::engine::LeaguePipeline;
use crate::types::{EnrichedPlayerRef, Envelope, ErrorType, InjuryReport, ResourceKey, ResourceKind};

/// Upper bound for `/api/players/enrich`.
pub const MAX_ENRICH_IDS: usize = 200;

const DEFAULT_INJURY_LIMIT: u32 = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ApiState {
    pub pipeline: Arc<LeaguePipeline>,
    pub service_name: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl ApiState {
    pub fn new(pipeline: Arc<LeaguePipeline>, service_name: impl Into<String>) -> Self {
        Self {
            pipeline,
            service_name: service_name.into(),
            start_time: chrono::Utc::now(),
        }
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct EnrichQuery {
    /// Comma-separated player ids.
    #[serde(default)]
    pub ids: String,
}

#[derive(Debug, Deserialize)]
pub struct InjuryQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayersResponse {
    pub success: bool,
    pub data: Vec<EnrichedPlayerRef>,
    pub requested: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InjuriesResponse {
    pub success: bool,
    pub data: Vec<InjuryReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub service: String,
    pub season: u16,
    pub week: u8,
    pub uptime_secs: i64,
}

// ---------------------------------------------------------------------------
// Status mapping
// ---------------------------------------------------------------------------

/// HTTP status for an envelope. Stale successes are still 200.
pub fn status_for(envelope: &Envelope) -> StatusCode {
    if envelope.success {
        return StatusCode::OK;
    }
    match envelope.error_type {
        Some(ErrorType::Validation) => StatusCode::BAD_REQUEST,
        Some(ErrorType::AccessDenied) => StatusCode::FORBIDDEN,
        Some(ErrorType::NotFound) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn respond(envelope: Envelope) -> (StatusCode, Json<Envelope>) {
    (status_for(&envelope), Json(envelope))
}

fn key(kind: ResourceKind, league_id: String, week: Option<String>) -> ResourceKey {
    ResourceKey {
        kind,
        league_id,
        sub_key: week,
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/leagues/:id/rosters
pub async fn get_rosters(
    State(state): State<AppState>,
    Path(league_id): Path<String>,
) -> (StatusCode, Json<Envelope>) {
    respond(state.pipeline.read(key(ResourceKind::Rosters, league_id, None)).await)
}

/// GET /api/leagues/:id/matchups/:week
pub async fn get_matchups(
    State(state): State<AppState>,
    Path((league_id, week)): Path<(String, String)>,
) -> (StatusCode, Json<Envelope>) {
    respond(
        state
            .pipeline
            .read(key(ResourceKind::Matchups, league_id, Some(week)))
            .await,
    )
}

/// GET /api/leagues/:id/transactions/:week
pub async fn get_transactions(
    State(state): State<AppState>,
    Path((league_id, week)): Path<(String, String)>,
) -> (StatusCode, Json<Envelope>) {
    respond(
        state
            .pipeline
            .read(key(ResourceKind::Transactions, league_id, Some(week)))
            .await,
    )
}

/// GET /api/leagues/:id/traded-picks
pub async fn get_traded_picks(
    State(state): State<AppState>,
    Path(league_id): Path<String>,
) -> (StatusCode, Json<Envelope>) {
    respond(
        state
            .pipeline
            .read(key(ResourceKind::TradedPicks, league_id, None))
            .await,
    )
}

/// GET /api/players/enrich?ids=a,b,c
pub async fn get_enriched_players(
    State(state): State<AppState>,
    Query(query): Query<EnrichQuery>,
) -> Result<Json<PlayersResponse>, (StatusCode, Json<Envelope>)> {
    let ids: Vec<String> = query
        .ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect();

    if ids.is_empty() {
        return Err(respond(Envelope::validation("ids must list at least one player id")));
    }
    if ids.len() > MAX_ENRICH_IDS {
        return Err(respond(Envelope::validation(format!(
            "at most {MAX_ENRICH_IDS} ids per request, got {}",
            ids.len()
        ))));
    }

    let data = state.pipeline.enrich_players(&ids).await;
    Ok(Json(PlayersResponse {
        success: true,
        requested: ids.len(),
        resolved: data.len(),
        data,
    }))
}

/// GET /api/injuries?limit=n
pub async fn get_injuries(
    State(state): State<AppState>,
    Query(query): Query<InjuryQuery>,
) -> (StatusCode, Json<InjuriesResponse>) {
    let limit = query.limit.unwrap_or(DEFAULT_INJURY_LIMIT).min(1000);
    match state.pipeline.injuries(limit).await {
        Ok(data) => (
            StatusCode::OK,
            Json(InjuriesResponse {
                success: true,
                data,
                error: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Injury listing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(InjuriesResponse {
                    success: false,
                    data: Vec::new(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let ctx = state.pipeline.season_context().await;
    Json(StatusResponse {
        service: state.service_name.clone(),
        season: ctx.season,
        week: ctx.week,
        uptime_secs: (chrono::Utc::now() - state.start_time).num_seconds(),
    })
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
