//! Deterministic upstream providers for integration testing.
//!
//! `ScriptedLeague` replays a queue of league API answers and then keeps
//! returning a fixed fallback answer; `ScriptedStats` serves canned usage,
//! schedule, and injury data. Both count their calls so tests can assert
//! on upstream traffic. Everything is in-memory.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gridiron::data::{InjuryPage, LeagueProvider, StatsProvider, UpstreamError};
use gridiron::engine::{EnrichmentSettings, Enricher, FetchExecutor, InjuryRefresher, LeaguePipeline};
use gridiron::storage::Store;
use gridiron::types::*;

// ---------------------------------------------------------------------------
// League API
// ---------------------------------------------------------------------------

pub struct ScriptedLeague {
    script: Mutex<VecDeque<Result<Value, UpstreamError>>>,
    /// Returned once the script runs dry.
    fallback: Result<Value, UpstreamError>,
    league_info: Result<Value, UpstreamError>,
    season: SeasonContext,
    /// Applied to every resource call; used to exercise request deadlines.
    delay: Duration,
    resource_calls: AtomicU32,
    info_calls: AtomicU32,
}

impl ScriptedLeague {
    pub fn new(season: SeasonContext) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(json!([])),
            league_info: Ok(json!({"league_id": "784512", "name": "Dynasty Degenerates"})),
            season,
            delay: Duration::ZERO,
            resource_calls: AtomicU32::new(0),
            info_calls: AtomicU32::new(0),
        }
    }

    /// Queue one answer.
    pub fn then(self, answer: Result<Value, UpstreamError>) -> Self {
        self.script.lock().unwrap().push_back(answer);
        self
    }

    /// Answer used after the queue is exhausted.
    pub fn always(mut self, answer: Result<Value, UpstreamError>) -> Self {
        self.fallback = answer;
        self
    }

    pub fn with_league_info(mut self, answer: Result<Value, UpstreamError>) -> Self {
        self.league_info = answer;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn resource_calls(&self) -> u32 {
        self.resource_calls.load(Ordering::SeqCst)
    }

    pub fn info_calls(&self) -> u32 {
        self.info_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LeagueProvider for ScriptedLeague {
    fn name(&self) -> &'static str {
        "scripted-league"
    }

    async fn fetch_resource(&self, _key: &ResourceKey) -> Result<Value, UpstreamError> {
        self.resource_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }

    async fn fetch_league_info(&self, _league_id: &str) -> Result<Value, UpstreamError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.league_info.clone()
    }

    async fn fetch_season_state(&self) -> Result<SeasonContext, UpstreamError> {
        Ok(self.season)
    }

    async fn fetch_player_directory(&self) -> Result<Vec<Athlete>, UpstreamError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Stats API
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct ScriptedStats {
    usage: HashMap<(u8, String), Vec<UsageRow>>,
    schedule: HashMap<u8, Vec<ScheduledGame>>,
    injuries: HashMap<String, Vec<InjuryObservation>>,
    injuries_down: bool,
    /// Applied to usage and injury calls; keeps a backfill in flight.
    delay: Duration,
    usage_calls: AtomicU32,
    injury_calls: AtomicU32,
}

impl ScriptedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_usage(mut self, week: u8, team: &str, rows: Vec<UsageRow>) -> Self {
        self.usage.insert((week, team.to_string()), rows);
        self
    }

    pub fn with_game(mut self, week: u8, home: &str, away: &str) -> Self {
        self.schedule.entry(week).or_default().push(ScheduledGame {
            home: home.to_string(),
            away: away.to_string(),
        });
        self
    }

    pub fn with_injury(mut self, team: &str, obs: InjuryObservation) -> Self {
        self.injuries.entry(team.to_string()).or_default().push(obs);
        self
    }

    /// Make every injury request fail with a 503.
    pub fn injuries_down(mut self) -> Self {
        self.injuries_down = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn usage_calls(&self) -> u32 {
        self.usage_calls.load(Ordering::SeqCst)
    }

    pub fn injury_calls(&self) -> u32 {
        self.injury_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatsProvider for ScriptedStats {
    fn name(&self) -> &'static str {
        "espn"
    }

    async fn fetch_schedule(&self, _season: u16, week: u8) -> Result<Vec<ScheduledGame>, UpstreamError> {
        Ok(self.schedule.get(&week).cloned().unwrap_or_default())
    }

    async fn fetch_team_usage(
        &self,
        _season: u16,
        week: u8,
        team: &str,
    ) -> Result<Vec<UsageRow>, UpstreamError> {
        self.usage_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self
            .usage
            .get(&(week, team.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_team_injuries(&self, team: &str, page: u32) -> Result<InjuryPage, UpstreamError> {
        self.injury_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.injuries_down {
            return Err(UpstreamError::Status {
                status: 503,
                body: "maintenance".into(),
            });
        }
        if page > 1 {
            return Ok(InjuryPage::default());
        }
        Ok(InjuryPage {
            observations: self.injuries.get(team).cloned().unwrap_or_default(),
            page_count: 1,
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const LEAGUE_ID: &str = "784512";

pub fn athlete(id: &str, name: &str, pos: &str, team: &str, depth: Option<u8>) -> Athlete {
    Athlete {
        player_id: id.to_string(),
        full_name: name.to_string(),
        position: pos.to_string(),
        team: Some(team.to_string()),
        depth_chart_order: depth,
        injury_status: None,
        espn_id: None,
    }
}

pub fn usage_row(id: &str, team: &str, snap_pct: f64, targets: f64) -> UsageRow {
    UsageRow {
        player_id: id.to_string(),
        team: Some(team.to_string()),
        snap_pct: Some(snap_pct),
        targets: Some(targets),
        routes: None,
        rz_touches: None,
    }
}

pub fn injury(espn_id: &str, team: &str, status: &str, practice: Option<&str>) -> InjuryObservation {
    InjuryObservation {
        player_id: espn_id.to_string(),
        team_id: team.to_string(),
        position: None,
        status: status.to_string(),
        description: Some("Hamstring".to_string()),
        date_reported: Some("2025-10-01T00:00Z".to_string()),
        practice_status: practice.map(str::to_string),
    }
}

pub fn server_error() -> UpstreamError {
    UpstreamError::Status {
        status: 503,
        body: "upstream unavailable".into(),
    }
}

pub fn not_found() -> UpstreamError {
    UpstreamError::Status {
        status: 404,
        body: String::new(),
    }
}

/// Fully wired pipeline over scripted providers and an in-memory store.
pub struct Harness {
    pub pipeline: LeaguePipeline,
    pub store: Store,
    pub league: Arc<ScriptedLeague>,
    pub stats: Arc<ScriptedStats>,
    pub injuries: Arc<InjuryRefresher>,
}

pub async fn harness(
    league: ScriptedLeague,
    stats: ScriptedStats,
    athletes: &[Athlete],
    request_timeout: Duration,
) -> Harness {
    let store = Store::in_memory().await.unwrap();
    store.upsert_athletes(athletes).await.unwrap();

    let league = Arc::new(league);
    let stats = Arc::new(stats);
    let league_dyn: Arc<dyn LeagueProvider> = league.clone();
    let stats_dyn: Arc<dyn StatsProvider> = stats.clone();

    let injuries = Arc::new(InjuryRefresher::new(Arc::clone(&stats_dyn), store.clone()));
    let enricher = Arc::new(Enricher::new(
        store.clone(),
        Arc::clone(&league_dyn),
        stats_dyn,
        Arc::clone(&injuries),
        EnrichmentSettings::default(),
    ));
    let executor = FetchExecutor::new(league_dyn, store.clone(), vec![Duration::ZERO; 3]);
    let pipeline = LeaguePipeline::new(
        executor,
        enricher,
        store.clone(),
        request_timeout,
        SeasonContext::new(2025, 1),
    );

    Harness {
        pipeline,
        store,
        league,
        stats,
        injuries,
    }
}
