//! Retry-and-fallback fetch executor.
//!
//! Issues a league resource request, classifies the outcome, retries
//! transient failures on a backoff schedule and falls back to the last
//! snapshot when the budget runs out. `fetch` never fails: every path
//! ends in a `FetchReport`.
//!
//! Dropping the returned future cancels the loop, including a pending
//! backoff sleep.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::data::{LeagueProvider, UpstreamError};
use crate::storage::{Snapshot, Store};
use crate::types::{Envelope, FailureReason, FetchOutcome, ResourceKey};

/// Default backoff: immediate attempt, then 1s, then 2s.
pub const DEFAULT_BACKOFF_MS: &[u64] = &[0, 1000, 2000];

pub const ACCESS_DENIED_HINT: &str = "league owner must make rosters public";
const NOT_FOUND_HINT: &str = "check the league id and week";
const RATE_LIMITED_HINT: &str = "upstream is throttling requests; try again shortly";

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Run one upstream call and tag its result.
pub async fn classify<F>(call: F) -> FetchOutcome
where
    F: Future<Output = Result<Value, UpstreamError>>,
{
    match call.await {
        Ok(payload) => FetchOutcome::Success(payload),
        Err(e) => {
            let reason = e.reason();
            if reason.is_terminal() {
                FetchOutcome::TerminalFailure {
                    reason,
                    http_status: e.http_status(),
                    detail: e.to_string(),
                }
            } else {
                FetchOutcome::RetryableFailure {
                    reason,
                    detail: e.to_string(),
                }
            }
        }
    }
}

/// Empty arrays, empty objects and `null` all count as "no rows".
pub fn is_empty_collection(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn hint_for(reason: FailureReason) -> Option<String> {
    match reason {
        FailureReason::AccessDenied => Some(ACCESS_DENIED_HINT.to_string()),
        FailureReason::NotFound => Some(NOT_FOUND_HINT.to_string()),
        FailureReason::RateLimited => Some(RATE_LIMITED_HINT.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    /// Straight from upstream. `warning` is set for sparse results.
    Fresh {
        data: Value,
        warning: Option<String>,
    },
    /// Upstream failed; the last-known-good snapshot is served.
    Stale {
        snapshot: Snapshot,
        reason: FailureReason,
        detail: String,
    },
    /// Upstream failed and nothing could be served.
    Failed {
        reason: FailureReason,
        http_status: Option<u16>,
        error: String,
        hint: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchReport {
    pub key: ResourceKey,
    pub retries_used: u32,
    pub result: FetchResult,
}

impl FetchReport {
    /// Fresh upstream data that was not flagged as sparse.
    pub fn is_fresh(&self) -> bool {
        matches!(self.result, FetchResult::Fresh { warning: None, .. })
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match &self.result {
            FetchResult::Fresh { .. } => None,
            FetchResult::Stale { reason, .. } | FetchResult::Failed { reason, .. } => Some(*reason),
        }
    }

    pub fn into_envelope(self) -> Envelope {
        match self.result {
            FetchResult::Fresh { data, warning } => Envelope {
                warning,
                ..Envelope::fresh(data, self.retries_used)
            },
            FetchResult::Stale {
                snapshot,
                reason,
                detail,
            } => Envelope {
                success: true,
                data: Some(snapshot.payload),
                stale: true,
                retries_used: self.retries_used,
                failure_reason: Some(reason),
                snapshot_fetched_at: Some(snapshot.fetched_at),
                snapshot_age_seconds: Some(snapshot.age_seconds),
                warning: Some(format!(
                    "serving snapshot from {} after upstream {reason}: {detail}",
                    snapshot.fetched_at.to_rfc3339()
                )),
                error: None,
                error_type: None,
                hint: None,
            },
            FetchResult::Failed {
                reason, error, hint, ..
            } => Envelope::failure(reason, self.retries_used, error, hint),
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct FetchExecutor {
    provider: Arc<dyn LeagueProvider>,
    store: Store,
    schedule: Vec<Duration>,
}

impl FetchExecutor {
    pub fn new(provider: Arc<dyn LeagueProvider>, store: Store, schedule: Vec<Duration>) -> Self {
        Self {
            provider,
            store,
            schedule,
        }
    }

    /// Schedule from a list of millisecond delays.
    pub fn schedule_from_ms(delays_ms: &[u64]) -> Vec<Duration> {
        delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect()
    }

    pub fn provider(&self) -> &Arc<dyn LeagueProvider> {
        &self.provider
    }

    /// Fetch with the configured backoff schedule.
    pub async fn fetch(&self, key: &ResourceKey) -> FetchReport {
        self.fetch_with(key, &self.schedule).await
    }

    /// Fetch with an explicit schedule: `schedule[i]` is slept before
    /// attempt `i + 1`. An empty schedule means one immediate attempt.
    pub async fn fetch_with(&self, key: &ResourceKey, schedule: &[Duration]) -> FetchReport {
        let immediate = [Duration::ZERO];
        let schedule = if schedule.is_empty() { &immediate[..] } else { schedule };
        let attempts = schedule.len();

        let mut last_reason = FailureReason::Unexpected;
        let mut last_detail = String::from("no attempt made");
        let mut empty_retried = false;

        for (attempt, delay) in schedule.iter().enumerate() {
            let attempt_no = attempt as u32;
            if !delay.is_zero() {
                debug!(key = %key, attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::time::sleep(*delay).await;
            }

            match classify(self.provider.fetch_resource(key)).await {
                FetchOutcome::Success(payload) => {
                    if key.kind.empty_is_suspicious() && is_empty_collection(&payload) {
                        let is_final = attempt + 1 == attempts;
                        if !empty_retried && !is_final {
                            empty_retried = true;
                            last_reason = FailureReason::EmptyAnomaly;
                            last_detail = format!("empty {} payload", key.kind);
                            warn!(key = %key, attempt, "Empty payload, retrying once");
                            continue;
                        }
                        return self.disambiguate_empty(key, payload, attempt_no).await;
                    }

                    self.write_through(key, &payload).await;
                    info!(key = %key, retries = attempt_no, "Fetched");
                    return FetchReport {
                        key: key.clone(),
                        retries_used: attempt_no,
                        result: FetchResult::Fresh {
                            data: payload,
                            warning: None,
                        },
                    };
                }
                FetchOutcome::TerminalFailure {
                    reason,
                    http_status,
                    detail,
                } => {
                    warn!(key = %key, %reason, ?http_status, "Terminal upstream failure");
                    return FetchReport {
                        key: key.clone(),
                        retries_used: attempt_no,
                        result: FetchResult::Failed {
                            reason,
                            http_status,
                            error: detail,
                            hint: hint_for(reason),
                        },
                    };
                }
                FetchOutcome::RetryableFailure { reason, detail } => {
                    if !reason.is_retryable() {
                        warn!(key = %key, %reason, error = %detail, "Non-retryable upstream failure");
                        return self.fallback(key, reason, detail, attempt_no).await;
                    }
                    warn!(key = %key, attempt, %reason, error = %detail, "Retryable upstream failure");
                    last_reason = reason;
                    last_detail = detail;
                }
            }
        }

        self.fallback(key, last_reason, last_detail, attempts as u32).await
    }

    /// An empty collection survived the retry. Ask the league-info
    /// endpoint whether the league exists at all.
    async fn disambiguate_empty(
        &self,
        key: &ResourceKey,
        payload: Value,
        retries_used: u32,
    ) -> FetchReport {
        let warning = match classify(self.provider.fetch_league_info(&key.league_id)).await {
            FetchOutcome::Success(_) => format!(
                "league {} exists but returned no {}; it may be private or not yet drafted",
                key.league_id, key.kind
            ),
            FetchOutcome::TerminalFailure {
                reason: FailureReason::NotFound,
                http_status,
                ..
            } => {
                warn!(key = %key, "Empty payload for a league that does not exist");
                return FetchReport {
                    key: key.clone(),
                    retries_used,
                    result: FetchResult::Failed {
                        reason: FailureReason::NotFound,
                        http_status: http_status.or(Some(404)),
                        error: format!("league {} not found", key.league_id),
                        hint: hint_for(FailureReason::NotFound),
                    },
                };
            }
            other => format!(
                "no {} returned and the league could not be verified ({})",
                key.kind,
                other.reason().map(|r| r.as_str()).unwrap_or("unknown")
            ),
        };

        warn!(key = %key, %warning, "Sparse result");
        FetchReport {
            key: key.clone(),
            retries_used,
            result: FetchResult::Fresh {
                data: payload,
                warning: Some(warning),
            },
        }
    }

    async fn fallback(
        &self,
        key: &ResourceKey,
        reason: FailureReason,
        detail: String,
        retries_used: u32,
    ) -> FetchReport {
        match self.store.get_snapshot(key).await {
            Ok(Some(snapshot)) => {
                warn!(
                    key = %key,
                    %reason,
                    age_seconds = snapshot.age_seconds,
                    "Serving stale snapshot"
                );
                FetchReport {
                    key: key.clone(),
                    retries_used,
                    result: FetchResult::Stale {
                        snapshot,
                        reason,
                        detail,
                    },
                }
            }
            Ok(None) => FetchReport {
                key: key.clone(),
                retries_used,
                result: FetchResult::Failed {
                    reason,
                    http_status: None,
                    error: format!("{detail}; no snapshot available"),
                    hint: hint_for(reason),
                },
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Snapshot read failed");
                FetchReport {
                    key: key.clone(),
                    retries_used,
                    result: FetchResult::Failed {
                        reason,
                        http_status: None,
                        error: format!("{detail}; snapshot unavailable"),
                        hint: hint_for(reason),
                    },
                }
            }
        }
    }

    async fn write_through(&self, key: &ResourceKey, payload: &Value) {
        if let Err(e) = self.store.put_snapshot(key, payload).await {
            warn!(key = %key, error = %e, "Snapshot write failed");
        }
    }

    /// Persist a post-processed payload over the raw one.
    pub async fn persist(&self, key: &ResourceKey, payload: &Value) {
        self.write_through(key, payload).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
