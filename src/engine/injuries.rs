//! Per-team injury refresh.
//!
//! Pulls the primary provider's game statuses (already in the athlete
//! cache) and the secondary provider's paginated injury list, merges them
//! through the aggregator and writes the injury and practice caches.

use anyhow::Result;
use chrono::{Duration, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::aggregator::{aggregate, SourceReports};
use super::flight::SingleFlight;
use crate::data::{StatsProvider, UpstreamError};
use crate::storage::Store;
use crate::types::{InjuryObservation, PracticeStatus};

/// Teams refreshed more recently than this are skipped.
pub const DEFAULT_REFRESH_AFTER_HOURS: i64 = 12;

/// Upper bound on injury list pages per team.
pub const DEFAULT_MAX_PAGES: u32 = 5;

pub const PRIMARY_SOURCE: &str = "sleeper";

fn marker(team: &str) -> String {
    format!("injuries:{team}")
}

/// Outcome of one team refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamRefresh {
    /// Both sources merged and written.
    Refreshed { reports: usize },
    /// Secondary source failed; primary-only reports were written.
    Partial { reports: usize },
    /// Refreshed recently; nothing fetched.
    Skipped,
}

pub struct InjuryRefresher {
    stats: Arc<dyn StatsProvider>,
    store: Store,
    flight: SingleFlight,
    refresh_after: Duration,
    max_pages: u32,
}

impl InjuryRefresher {
    pub fn new(stats: Arc<dyn StatsProvider>, store: Store) -> Self {
        Self {
            stats,
            store,
            flight: SingleFlight::new(),
            refresh_after: Duration::hours(DEFAULT_REFRESH_AFTER_HOURS),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_limits(mut self, refresh_after: Duration, max_pages: u32) -> Self {
        self.refresh_after = refresh_after;
        self.max_pages = max_pages.max(1);
        self
    }

    /// Whether `team` was refreshed within the refresh window.
    async fn recently_refreshed(&self, team: &str) -> bool {
        match self.store.refreshed_at(&marker(team)).await {
            Ok(Some(at)) => Utc::now() - at < self.refresh_after,
            _ => false,
        }
    }

    /// Refresh one team unless it was refreshed within the window.
    pub async fn refresh_team_if_due(&self, team: &str) -> Result<TeamRefresh> {
        if self.recently_refreshed(team).await {
            return Ok(TeamRefresh::Skipped);
        }
        let _guard = self.flight.acquire(&SingleFlight::key("injuries", team)).await;
        // Another caller may have finished while we waited.
        if self.recently_refreshed(team).await {
            return Ok(TeamRefresh::Skipped);
        }
        self.refresh_team(team).await
    }

    /// Merge both sources for `team` and write the caches.
    pub async fn refresh_team(&self, team: &str) -> Result<TeamRefresh> {
        let primary: Vec<InjuryObservation> = self
            .store
            .athletes_with_injury_status(Some(team))
            .await?
            .into_iter()
            .filter_map(|a| {
                Some(InjuryObservation {
                    player_id: a.player_id,
                    team_id: team.to_string(),
                    position: Some(a.position),
                    status: a.injury_status?,
                    description: None,
                    date_reported: None,
                    practice_status: None,
                })
            })
            .collect();

        let mut sources = vec![SourceReports::primary(PRIMARY_SOURCE, primary)];
        let secondary_ok = match self.secondary_observations(team).await {
            Ok(observations) => {
                sources.push(SourceReports::secondary(self.stats.name(), observations));
                true
            }
            Err(e) => {
                warn!(team, provider = self.stats.name(), error = %e, "Secondary injury fetch failed");
                false
            }
        };

        let practice: Vec<(String, PracticeStatus)> = sources
            .iter()
            .flat_map(|s| s.observations.iter())
            .filter_map(|o| {
                let raw = o.practice_status.as_deref()?;
                Some((o.player_id.clone(), PracticeStatus::parse(raw)?))
            })
            .collect();

        let reports = aggregate(&sources);

        // A complete run supersedes the team's previous reports; a partial
        // one only adds to them.
        if !secondary_ok {
            self.store.upsert_injuries(&reports).await?;
            for (player_id, status) in &practice {
                self.store.upsert_practice(player_id, *status).await?;
            }
            return Ok(TeamRefresh::Partial {
                reports: reports.len(),
            });
        }

        let removed = self.store.replace_team_injuries(team, &reports, &practice).await?;
        self.store.mark_refreshed(&marker(team)).await?;
        debug!(
            team,
            reports = reports.len(),
            practice = practice.len(),
            removed,
            "Team injuries refreshed"
        );
        Ok(TeamRefresh::Refreshed {
            reports: reports.len(),
        })
    }

    /// All pages of the secondary provider's list, with ids mapped onto
    /// league player ids.
    async fn secondary_observations(&self, team: &str) -> Result<Vec<InjuryObservation>, UpstreamError> {
        let first = self.stats.fetch_team_injuries(team, 1).await?;
        let last_page = first.page_count.clamp(1, self.max_pages);
        let mut observations = first.observations;

        for page in 2..=last_page {
            match self.stats.fetch_team_injuries(team, page).await {
                Ok(next) => observations.extend(next.observations),
                Err(e) => {
                    warn!(team, page, error = %e, "Injury page fetch failed; keeping earlier pages");
                    break;
                }
            }
        }

        let id_map = self.store.espn_id_map().await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not read id map");
            HashMap::new()
        });
        Ok(self.map_ids(observations, &id_map).await)
    }

    /// Translate secondary ids. Unmapped ids survive only when they are
    /// already league player ids.
    async fn map_ids(
        &self,
        observations: Vec<InjuryObservation>,
        id_map: &HashMap<String, String>,
    ) -> Vec<InjuryObservation> {
        let mut mapped = Vec::with_capacity(observations.len());
        for mut obs in observations {
            if let Some(player_id) = id_map.get(&obs.player_id) {
                obs.player_id = player_id.clone();
                mapped.push(obs);
            } else if matches!(self.store.get_athlete(&obs.player_id).await, Ok(Some(_))) {
                mapped.push(obs);
            } else {
                debug!(id = %obs.player_id, "Dropping unmapped injury observation");
            }
        }
        mapped
    }

    /// Fan out across `teams`. Failed teams are logged and omitted.
    pub async fn refresh_teams<'a>(&self, teams: impl IntoIterator<Item = &'a str>) -> usize {
        let teams: Vec<&str> = teams.into_iter().collect();
        let results = join_all(teams.iter().map(|team| self.refresh_team_if_due(team))).await;

        let mut written = 0;
        for (team, result) in teams.iter().zip(results) {
            match result {
                Ok(TeamRefresh::Refreshed { reports }) | Ok(TeamRefresh::Partial { reports }) => {
                    written += reports
                }
                Ok(TeamRefresh::Skipped) => {}
                Err(e) => warn!(team, error = %e, "Team injury refresh failed"),
            }
        }
        info!(teams = teams.len(), reports = written, "Injury refresh complete");
        written
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
