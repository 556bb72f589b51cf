//! Enrichment join engine.
//!
//! Attaches derived, provenance-tagged fields (participation share,
//! opponent, injury and practice status, usage trend) to every player
//! reference in a league payload. Each field reads its own cache and
//! backfills it from upstream on a miss; backfills are single-flight so
//! concurrent requests share one upstream call.
//!
//! A request builds one `EnrichmentSession`, which memoizes per-player
//! results and per-team refreshes for its own lifetime only.

use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::flight::SingleFlight;
use super::injuries::InjuryRefresher;
use crate::data::{LeagueProvider, StatsProvider, UpstreamError};
use crate::storage::Store;
use crate::types::{
    Athlete, EnrichedPlayerRef, InjuryReport, InjuryStatus, OpponentSource, PracticeStatus,
    PracticeStatusSource, ResourceKind, SeasonContext, SnapPctSource, Trend, UsageRow, UsageTrend,
    UsageWindow,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Participation share estimates by depth-chart order.
const STARTER_SNAP_ESTIMATE: f64 = 70.0;
const BACKUP_SNAP_ESTIMATE: f64 = 45.0;
const DEPTH_SNAP_ESTIMATE: f64 = 15.0;

/// Payload fields holding player id lists, per resource kind.
const ROSTER_FIELDS: &[&str] = &["starters", "players", "reserve", "taxi"];
const MATCHUP_FIELDS: &[&str] = &["starters", "players"];
const TRANSACTION_FIELDS: &[&str] = &["adds", "drops"];

const DIRECTORY_MARKER: &str = "players";

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub injury_max_age: Duration,
    pub practice_max_age: Duration,
    /// Relative change beyond which a metric trends up or down.
    pub trend_threshold: f64,
    pub usage_window: u32,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            injury_max_age: Duration::hours(12),
            practice_max_age: Duration::hours(72),
            trend_threshold: 0.15,
            usage_window: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Pure derivations
// ---------------------------------------------------------------------------

/// Share estimate from depth order: 1 → 70, 2 → 45, anything else → 15.
pub fn estimate_snap_pct(depth_chart_order: Option<u8>) -> f64 {
    match depth_chart_order {
        Some(1) => STARTER_SNAP_ESTIMATE,
        Some(2) => BACKUP_SNAP_ESTIMATE,
        _ => DEPTH_SNAP_ESTIMATE,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Per-metric averages over rows (newest first).
pub fn usage_window(rows: &[UsageRow]) -> UsageWindow {
    let collect = |pick: fn(&UsageRow) -> Option<f64>| -> Vec<f64> { rows.iter().filter_map(pick).collect() };
    UsageWindow {
        targets_avg: mean(&collect(|r| r.targets)),
        routes_avg: mean(&collect(|r| r.routes)),
        rz_touches_avg: mean(&collect(|r| r.rz_touches)),
        snap_share_avg: mean(&collect(|r| r.snap_pct)),
        samples: rows.len() as u32,
    }
}

/// Latest value against the mean of the earlier ones. `values` is newest
/// first; fewer than two values has no trend.
pub fn metric_trend(values: &[f64], threshold: f64) -> Option<Trend> {
    let (latest, prior) = values.split_first()?;
    let baseline = mean(prior)?;
    if baseline == 0.0 {
        return Some(if *latest > 0.0 { Trend::Up } else { Trend::Flat });
    }
    let change = (latest - baseline) / baseline;
    Some(if change > threshold {
        Trend::Up
    } else if change < -threshold {
        Trend::Down
    } else {
        Trend::Flat
    })
}

/// Per-metric trends over rows (newest first). A metric missing from the
/// newest row has no trend; gaps in earlier rows are skipped.
pub fn usage_trend(rows: &[UsageRow], threshold: f64) -> Option<UsageTrend> {
    let (newest, prior) = rows.split_first()?;
    if prior.is_empty() {
        return None;
    }
    let series = |pick: fn(&UsageRow) -> Option<f64>| -> Vec<f64> {
        match pick(newest) {
            Some(latest) => std::iter::once(latest).chain(prior.iter().filter_map(pick)).collect(),
            None => Vec::new(),
        }
    };
    Some(UsageTrend {
        targets: metric_trend(&series(|r| r.targets), threshold),
        routes: metric_trend(&series(|r| r.routes), threshold),
        rz_touches: metric_trend(&series(|r| r.rz_touches), threshold),
        snap_share: metric_trend(&series(|r| r.snap_pct), threshold),
    })
}

/// Player ids from an id list (`["4046", ...]`) or an id-keyed map
/// (`{"4046": 3}`).
fn ids_of(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        Value::Object(map) => Some(map.keys().cloned().collect()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

pub struct Enricher {
    store: Store,
    league: Arc<dyn LeagueProvider>,
    stats: Arc<dyn StatsProvider>,
    injuries: Arc<InjuryRefresher>,
    flight: SingleFlight,
    settings: EnrichmentSettings,
}

impl Enricher {
    pub fn new(
        store: Store,
        league: Arc<dyn LeagueProvider>,
        stats: Arc<dyn StatsProvider>,
        injuries: Arc<InjuryRefresher>,
        settings: EnrichmentSettings,
    ) -> Self {
        Self {
            store,
            league,
            stats,
            injuries,
            flight: SingleFlight::new(),
            settings,
        }
    }

    /// Start a request-scoped session.
    pub fn session(&self, ctx: SeasonContext) -> EnrichmentSession<'_> {
        EnrichmentSession {
            enricher: self,
            ctx,
            memo: HashMap::new(),
            refreshed_teams: HashSet::new(),
            attempted_backfills: HashSet::new(),
            directory_checked: false,
            cache_hits: 0,
            backfills: 0,
        }
    }

    /// Enrich a list of player ids. Unknown ids are left out.
    pub async fn enrich(&self, player_ids: &[String], ctx: SeasonContext) -> Vec<EnrichedPlayerRef> {
        let mut session = self.session(ctx);
        let refs = session.enrich_ids(player_ids).await;
        session.finish();
        refs.into_iter().flatten().collect()
    }

    /// Enrich a league payload in place.
    pub async fn enrich_payload(&self, kind: ResourceKind, payload: &mut Value, ctx: SeasonContext) {
        let mut session = self.session(ctx);
        session.enrich_payload(kind, payload).await;
        session.finish();
    }

    /// Reload the full player directory into the athlete cache.
    pub async fn refresh_directory(&self) -> anyhow::Result<usize> {
        let _guard = self.flight.acquire(DIRECTORY_MARKER).await;
        self.load_directory().await
    }

    /// Reload the directory when the last load is older than `max_age`.
    pub async fn refresh_directory_if_due(&self, max_age: Duration) -> anyhow::Result<Option<usize>> {
        if let Some(at) = self.store.refreshed_at(DIRECTORY_MARKER).await? {
            if Utc::now() - at < max_age {
                debug!(loaded_at = %at, "Player directory still fresh");
                return Ok(None);
            }
        }
        self.refresh_directory().await.map(Some)
    }

    async fn load_directory(&self) -> anyhow::Result<usize> {
        let athletes = self
            .league
            .fetch_player_directory()
            .await
            .map_err(|e| anyhow::anyhow!("player directory fetch failed: {e}"))?;
        let count = self.store.upsert_athletes(&athletes).await?;
        self.store.mark_refreshed(DIRECTORY_MARKER).await?;
        info!(count, provider = self.league.name(), "Player directory loaded");
        Ok(count)
    }

    /// Load the directory once when the athlete cache is empty.
    async fn ensure_directory(&self) {
        if matches!(self.store.athlete_count().await, Ok(n) if n > 0) {
            return;
        }
        let _guard = self.flight.acquire(DIRECTORY_MARKER).await;
        if matches!(self.store.athlete_count().await, Ok(n) if n > 0) {
            return;
        }
        if let Err(e) = self.load_directory().await {
            warn!(error = %e, "Athlete cache backfill failed");
        }
    }

    /// Fill the usage cache for one team-week. Returns whether a fetch ran.
    async fn backfill_usage(&self, season: u16, week: u8, team: &str) -> bool {
        let marker = format!("usage:{season}:{week}:{team}");
        let _guard = self.flight.acquire(&marker).await;
        if matches!(self.store.refreshed_at(&marker).await, Ok(Some(_))) {
            return false;
        }

        let rows = match self.stats.fetch_team_usage(season, week, team).await {
            Ok(rows) => rows,
            Err(UpstreamError::NotConfigured(what)) => {
                debug!(what, "No usage feed configured; skipping backfill");
                return false;
            }
            Err(e) => {
                warn!(season, week, team, error = %e, "Usage backfill failed");
                return false;
            }
        };

        let id_map = self.store.espn_id_map().await.unwrap_or_default();
        let rows: Vec<UsageRow> = rows
            .into_iter()
            .map(|mut row| {
                if let Some(player_id) = id_map.get(&row.player_id) {
                    row.player_id = player_id.clone();
                }
                row
            })
            .collect();

        let written = self.store.upsert_usage(season, week, &rows).await;
        match written {
            // An empty answer usually means the feed has not caught up yet;
            // leave the marker unset so a later miss asks again.
            Ok(0) => {
                debug!(season, week, team, "Usage feed returned no rows");
                true
            }
            Ok(count) => {
                if let Err(e) = self.store.mark_refreshed(&marker).await {
                    warn!(error = %e, "Could not mark usage backfill");
                }
                debug!(season, week, team, rows = count, "Usage backfilled");
                true
            }
            Err(e) => {
                warn!(season, week, team, error = %e, "Usage write failed");
                false
            }
        }
    }

    /// Fill the schedule cache for one week.
    async fn backfill_schedule(&self, season: u16, week: u8) -> bool {
        let marker = format!("schedule:{season}:{week}");
        let _guard = self.flight.acquire(&marker).await;
        if matches!(self.store.refreshed_at(&marker).await, Ok(Some(_))) {
            return false;
        }

        match self.stats.fetch_schedule(season, week).await {
            Ok(games) => match self.store.upsert_schedule(season, week, &games).await {
                Ok(0) => {
                    debug!(season, week, "Schedule feed returned no games");
                    true
                }
                Ok(count) => {
                    if let Err(e) = self.store.mark_refreshed(&marker).await {
                        warn!(error = %e, "Could not mark schedule backfill");
                    }
                    debug!(season, week, games = count, "Schedule backfilled");
                    true
                }
                Err(e) => {
                    warn!(season, week, error = %e, "Schedule write failed");
                    false
                }
            },
            Err(e) => {
                warn!(season, week, error = %e, "Schedule backfill failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Request-scoped enrichment state. Owned by one request; never shared.
pub struct EnrichmentSession<'a> {
    enricher: &'a Enricher,
    ctx: SeasonContext,
    memo: HashMap<String, Option<EnrichedPlayerRef>>,
    refreshed_teams: HashSet<String>,
    attempted_backfills: HashSet<String>,
    directory_checked: bool,
    cache_hits: u64,
    backfills: u64,
}

impl<'a> EnrichmentSession<'a> {
    /// Enrich each id, in order. Unknown ids yield `None`.
    pub async fn enrich_ids(&mut self, player_ids: &[String]) -> Vec<Option<EnrichedPlayerRef>> {
        let mut out = Vec::with_capacity(player_ids.len());
        for id in player_ids {
            out.push(self.enrich_one(id).await);
        }
        out
    }

    /// Add `<field>_enriched` arrays next to each player id list.
    /// Original fields are left untouched.
    pub async fn enrich_payload(&mut self, kind: ResourceKind, payload: &mut Value) {
        let fields = match kind {
            ResourceKind::Rosters => ROSTER_FIELDS,
            ResourceKind::Matchups => MATCHUP_FIELDS,
            ResourceKind::Transactions => TRANSACTION_FIELDS,
            ResourceKind::TradedPicks => return,
        };
        let Some(items) = payload.as_array_mut() else {
            return;
        };

        for item in items.iter_mut() {
            let Some(obj) = item.as_object_mut() else {
                continue;
            };
            for field in fields {
                let Some(ids) = obj.get(*field).and_then(ids_of) else {
                    continue;
                };
                let refs = self.enrich_ids(&ids).await;
                match serde_json::to_value(&refs) {
                    Ok(value) => {
                        obj.insert(format!("{field}_enriched"), value);
                    }
                    Err(e) => warn!(field, error = %e, "Could not serialise enriched refs"),
                }
            }
        }
    }

    /// Log the session's counters.
    pub fn finish(self) {
        info!(
            players = self.memo.len(),
            cache_hits = self.cache_hits,
            backfills = self.backfills,
            season = %self.ctx,
            "Enrichment complete"
        );
    }

    async fn enrich_one(&mut self, player_id: &str) -> Option<EnrichedPlayerRef> {
        if let Some(cached) = self.memo.get(player_id) {
            return cached.clone();
        }

        if !self.directory_checked {
            self.directory_checked = true;
            self.enricher.ensure_directory().await;
        }

        let enriched = match self.enricher.store.get_athlete(player_id).await {
            Ok(Some(athlete)) => Some(self.build(athlete).await),
            Ok(None) => {
                debug!(player_id, "Unknown athlete, not enriched");
                None
            }
            Err(e) => {
                warn!(player_id, error = %e, "Athlete lookup failed");
                None
            }
        };
        self.memo.insert(player_id.to_string(), enriched.clone());
        enriched
    }

    async fn build(&mut self, athlete: Athlete) -> EnrichedPlayerRef {
        let (snap_pct, snap_pct_source, snap_pct_week) = if athlete.is_defense() {
            (None, None, None)
        } else {
            match self.snap_share(&athlete).await {
                Some((pct, source, week)) => (Some(pct), Some(source), week),
                None => (None, None, None),
            }
        };

        let (opponent, opponent_source) = if athlete.is_defense() {
            match self.opponent(&athlete).await {
                Some((team, source)) => (Some(team), Some(source)),
                None => (None, None),
            }
        } else {
            (None, None)
        };

        let (injury_status, practice_status, practice_status_source) = self.availability(&athlete).await;

        let (usage_last3_weeks, usage_trend) = if athlete.is_skill_position() {
            self.usage(&athlete).await
        } else {
            (None, None)
        };

        EnrichedPlayerRef {
            player_id: athlete.player_id,
            full_name: athlete.full_name,
            position: athlete.position,
            team: athlete.team,
            snap_pct,
            snap_pct_source,
            snap_pct_week,
            opponent,
            opponent_source,
            injury_status,
            practice_status,
            practice_status_source,
            usage_last3_weeks,
            usage_trend,
        }
    }

    async fn cached_snap(&self, player_id: &str, week: u8) -> Option<f64> {
        match self.enricher.store.get_usage(player_id, self.ctx.season, week).await {
            Ok(row) => row.and_then(|r| r.snap_pct),
            Err(e) => {
                warn!(player_id, week, error = %e, "Usage lookup failed");
                None
            }
        }
    }

    /// Current week, then previous week, then a backfill of the team's
    /// previous week, then a depth-order estimate.
    async fn snap_share(&mut self, athlete: &Athlete) -> Option<(f64, SnapPctSource, Option<u8>)> {
        let id = athlete.player_id.as_str();

        if let Some(pct) = self.cached_snap(id, self.ctx.week).await {
            self.cache_hits += 1;
            return Some((pct, SnapPctSource::Cached, Some(self.ctx.week)));
        }

        if let Some(prev) = self.ctx.previous_week() {
            if let Some(pct) = self.cached_snap(id, prev).await {
                self.cache_hits += 1;
                return Some((pct, SnapPctSource::Cached, Some(prev)));
            }

            if let Some(team) = athlete.team.as_deref() {
                let key = format!("usage:{prev}:{team}");
                if self.attempted_backfills.insert(key) {
                    if self.enricher.backfill_usage(self.ctx.season, prev, team).await {
                        self.backfills += 1;
                    }
                }
                if let Some(pct) = self.cached_snap(id, prev).await {
                    return Some((pct, SnapPctSource::Cached, Some(prev)));
                }
            }
        }

        Some((
            estimate_snap_pct(athlete.depth_chart_order),
            SnapPctSource::Estimated,
            None,
        ))
    }

    /// Opponent for a team defense, backfilling the week's schedule once.
    async fn opponent(&mut self, athlete: &Athlete) -> Option<(String, OpponentSource)> {
        let team = athlete.team.clone().unwrap_or_else(|| athlete.player_id.clone());
        let store = &self.enricher.store;
        let (season, week) = (self.ctx.season, self.ctx.week);

        match store.get_opponent(season, week, &team).await {
            Ok(Some(opp)) => {
                self.cache_hits += 1;
                return Some((opp, OpponentSource::Cached));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(team, error = %e, "Schedule lookup failed");
                return None;
            }
        }

        if self.attempted_backfills.insert(format!("schedule:{week}")) {
            if self.enricher.backfill_schedule(season, week).await {
                self.backfills += 1;
            }
        }

        match store.get_opponent(season, week, &team).await {
            Ok(Some(opp)) => Some((opp, OpponentSource::Fetched)),
            _ => None,
        }
    }

    /// Injury status plus practice status with its provenance.
    async fn availability(
        &mut self,
        athlete: &Athlete,
    ) -> (Option<InjuryStatus>, PracticeStatus, PracticeStatusSource) {
        let id = athlete.player_id.as_str();
        let (mut injury, mut practice) = self.read_availability(id).await;

        if injury.is_none() && practice.is_none() {
            if let Some(team) = athlete.team.as_deref() {
                if self.refreshed_teams.insert(team.to_string()) {
                    match self.enricher.injuries.refresh_team_if_due(team).await {
                        Ok(outcome) => debug!(team, ?outcome, "Injury refresh on miss"),
                        Err(e) => warn!(team, error = %e, "Injury refresh on miss failed"),
                    }
                    (injury, practice) = self.read_availability(id).await;
                }
            }
        } else {
            self.cache_hits += 1;
        }

        let status = injury.map(|r| r.status);
        let (practice_status, source) = match (practice, &status) {
            (Some(p), _) => (p, PracticeStatusSource::Cached),
            (None, Some(s)) => (PracticeStatus::from_injury(s), PracticeStatusSource::DerivedFromInjury),
            (None, None) => (PracticeStatus::Full, PracticeStatusSource::DefaultHealthy),
        };
        (status, practice_status, source)
    }

    async fn read_availability(
        &self,
        player_id: &str,
    ) -> (Option<InjuryReport>, Option<PracticeStatus>) {
        let store = &self.enricher.store;
        let settings = &self.enricher.settings;
        let now = Utc::now();

        let injury = store
            .get_injury(player_id, now - settings.injury_max_age)
            .await
            .unwrap_or_else(|e| {
                warn!(player_id, error = %e, "Injury lookup failed");
                None
            });
        let practice = store
            .get_practice(player_id, now - settings.practice_max_age)
            .await
            .unwrap_or_else(|e| {
                warn!(player_id, error = %e, "Practice lookup failed");
                None
            });
        (injury, practice)
    }

    async fn usage(&mut self, athlete: &Athlete) -> (Option<UsageWindow>, Option<UsageTrend>) {
        let settings = &self.enricher.settings;
        let rows = match self
            .enricher
            .store
            .recent_usage(&athlete.player_id, self.ctx.season, self.ctx.week, settings.usage_window)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(player_id = %athlete.player_id, error = %e, "Recent usage lookup failed");
                return (None, None);
            }
        };
        if rows.is_empty() {
            return (None, None);
        }

        let rows: Vec<UsageRow> = rows.into_iter().map(|(_, row)| row).collect();
        (
            Some(usage_window(&rows)),
            usage_trend(&rows, settings.trend_threshold),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
