//! League read pipeline.
//!
//! validate → fetch (retry, fallback) → enrich → persist → envelope.
//! Each read is bounded by a request deadline; on expiry the in-flight
//! fetch is dropped and the last snapshot is served instead.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::enricher::Enricher;
use super::executor::{FetchExecutor, FetchResult};
use crate::storage::Store;
use crate::types::{
    EnrichedPlayerRef, Envelope, FailureReason, InjuryReport, ResourceKey, ResourceKind,
    SeasonContext,
};

/// How long a season/week answer from the league API is reused.
const SEASON_CONTEXT_TTL_MINS: i64 = 60;

pub struct LeaguePipeline {
    executor: FetchExecutor,
    enricher: Arc<Enricher>,
    store: Store,
    request_timeout: std::time::Duration,
    fallback_context: SeasonContext,
    ttls: HashMap<ResourceKind, Duration>,
    season: Mutex<Option<(DateTime<Utc>, SeasonContext)>>,
}

impl LeaguePipeline {
    pub fn new(
        executor: FetchExecutor,
        enricher: Arc<Enricher>,
        store: Store,
        request_timeout: std::time::Duration,
        fallback_context: SeasonContext,
    ) -> Self {
        Self {
            executor,
            enricher,
            store,
            request_timeout,
            fallback_context,
            ttls: ResourceKind::ALL
                .iter()
                .map(|kind| (*kind, kind.default_ttl()))
                .collect(),
            season: Mutex::new(None),
        }
    }

    /// Override the freshness window used to flag old snapshots.
    pub fn with_ttl(mut self, kind: ResourceKind, ttl: Duration) -> Self {
        self.ttls.insert(kind, ttl);
        self
    }

    pub fn enricher(&self) -> &Arc<Enricher> {
        &self.enricher
    }

    // -- Resource reads --------------------------------------------------

    pub async fn rosters(&self, league_id: &str) -> Envelope {
        self.read(ResourceKey::league(ResourceKind::Rosters, league_id)).await
    }

    pub async fn matchups(&self, league_id: &str, week: u8) -> Envelope {
        self.read(ResourceKey::weekly(ResourceKind::Matchups, league_id, week))
            .await
    }

    pub async fn transactions(&self, league_id: &str, week: u8) -> Envelope {
        self.read(ResourceKey::weekly(ResourceKind::Transactions, league_id, week))
            .await
    }

    pub async fn traded_picks(&self, league_id: &str) -> Envelope {
        self.read(ResourceKey::league(ResourceKind::TradedPicks, league_id))
            .await
    }

    /// Validate, fetch and enrich one resource.
    pub async fn read(&self, key: ResourceKey) -> Envelope {
        if let Err(e) = key.validate() {
            debug!(key = %key, error = %e, "Rejected request");
            return Envelope::validation(e.to_string());
        }

        let mut envelope =
            match tokio::time::timeout(self.request_timeout, self.fetch_and_enrich(&key)).await {
                Ok(envelope) => envelope,
                Err(_) => {
                    warn!(
                        key = %key,
                        timeout_ms = self.request_timeout.as_millis() as u64,
                        "Request deadline exceeded"
                    );
                    self.deadline_fallback(&key).await
                }
            };
        self.flag_expired(key.kind, &mut envelope);
        envelope
    }

    /// Note on the warning when a served snapshot is past its window.
    fn flag_expired(&self, kind: ResourceKind, envelope: &mut Envelope) {
        let (true, Some(age)) = (envelope.stale, envelope.snapshot_age_seconds) else {
            return;
        };
        let ttl = self.ttls.get(&kind).copied().unwrap_or_else(|| kind.default_ttl());
        if age > ttl.num_seconds() {
            let note = format!("snapshot is older than the {}s {kind} window", ttl.num_seconds());
            envelope.warning = Some(match envelope.warning.take() {
                Some(w) => format!("{w}; {note}"),
                None => note,
            });
        }
    }

    async fn fetch_and_enrich(&self, key: &ResourceKey) -> Envelope {
        let mut report = self.executor.fetch(key).await;

        let enrichable = report.is_fresh() && key.kind != ResourceKind::TradedPicks;
        if enrichable {
            let ctx = self.context_for(key).await;
            if let FetchResult::Fresh { data, .. } = &mut report.result {
                self.enricher.enrich_payload(key.kind, data, ctx).await;
                self.executor.persist(key, data).await;
            }
        }

        let envelope = report.into_envelope();
        info!(
            key = %key,
            success = envelope.success,
            stale = envelope.stale,
            retries = envelope.retries_used,
            "Read complete"
        );
        envelope
    }

    /// Serve the snapshot after the request deadline fired.
    async fn deadline_fallback(&self, key: &ResourceKey) -> Envelope {
        let message = format!(
            "request exceeded {}ms deadline",
            self.request_timeout.as_millis()
        );
        match self.store.get_snapshot(key).await {
            Ok(Some(snapshot)) => Envelope {
                success: true,
                data: Some(snapshot.payload),
                stale: true,
                retries_used: 0,
                failure_reason: Some(FailureReason::Timeout),
                snapshot_fetched_at: Some(snapshot.fetched_at),
                snapshot_age_seconds: Some(snapshot.age_seconds),
                warning: Some(format!("{message}; serving snapshot")),
                error: None,
                error_type: None,
                hint: None,
            },
            Ok(None) => Envelope::failure(FailureReason::Timeout, 0, message, None),
            Err(e) => {
                warn!(key = %key, error = %e, "Snapshot read failed after deadline");
                Envelope::failure(FailureReason::Timeout, 0, message, None)
            }
        }
    }

    // -- Players & injuries ----------------------------------------------

    pub async fn enrich_players(&self, player_ids: &[String]) -> Vec<EnrichedPlayerRef> {
        let ctx = self.season_context().await;
        self.enricher.enrich(player_ids, ctx).await
    }

    pub async fn injuries(&self, limit: u32) -> anyhow::Result<Vec<InjuryReport>> {
        self.store.list_injuries(limit).await
    }

    // -- Season context --------------------------------------------------

    /// Weekly resources are enriched against their own week.
    async fn context_for(&self, key: &ResourceKey) -> SeasonContext {
        let current = self.season_context().await;
        match key.week() {
            Some(week) => SeasonContext::new(current.season, week),
            None => current,
        }
    }

    /// Current season/week from the league API, cached for an hour.
    /// Falls back to the configured context when the API is unavailable.
    pub async fn season_context(&self) -> SeasonContext {
        let mut cached = self.season.lock().await;
        if let Some((at, ctx)) = *cached {
            if Utc::now() - at < Duration::minutes(SEASON_CONTEXT_TTL_MINS) {
                return ctx;
            }
        }

        match self.executor.provider().fetch_season_state().await {
            Ok(ctx) => {
                debug!(season = %ctx, "Season context refreshed");
                *cached = Some((Utc::now(), ctx));
                ctx
            }
            Err(e) => {
                warn!(error = %e, fallback = %self.fallback_context, "Season state unavailable");
                (*cached).map(|(_, ctx)| ctx).unwrap_or(self.fallback_context)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
