//! League reads through the full pipeline: retries, fallback, sparse
//! results, and request deadlines.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio_test::assert_ok;

use gridiron::data::UpstreamError;
use gridiron::types::{ErrorType, FailureReason, ResourceKey, ResourceKind, SeasonContext};

use crate::mock_upstream::*;

const TIMEOUT: Duration = Duration::from_secs(5);

fn rosters_key() -> ResourceKey {
    ResourceKey::league(ResourceKind::Rosters, LEAGUE_ID)
}

fn roster_payload() -> serde_json::Value {
    json!([
        {"roster_id": 1, "owner_id": "u1", "starters": ["4046", "6794"], "players": ["4046", "6794", "9509"]},
        {"roster_id": 2, "owner_id": "u2", "starters": ["4984"], "players": ["4984"]}
    ])
}

fn season() -> SeasonContext {
    SeasonContext::new(2025, 6)
}

#[tokio::test]
async fn test_repeated_reads_keep_one_snapshot() {
    let league = ScriptedLeague::new(season()).always(Ok(roster_payload()));
    let h = harness(league, ScriptedStats::new(), &[], TIMEOUT).await;

    let first = h.pipeline.rosters(LEAGUE_ID).await;
    let snap_a = assert_ok!(h.store.get_snapshot(&rosters_key()).await).unwrap();
    let second = h.pipeline.rosters(LEAGUE_ID).await;
    let snap_b = assert_ok!(h.store.get_snapshot(&rosters_key()).await).unwrap();

    assert!(first.success && second.success);
    assert_eq!(first.data, second.data);
    assert_eq!(snap_a.payload, snap_b.payload);
    assert!(snap_b.fetched_at >= snap_a.fetched_at);
}

#[tokio::test]
async fn test_snapshot_age_grows_with_clock() {
    let h = harness(ScriptedLeague::new(season()), ScriptedStats::new(), &[], TIMEOUT).await;
    let written = Utc::now() - ChronoDuration::minutes(30);
    assert_ok!(h.store.put_snapshot_at(&rosters_key(), &roster_payload(), written).await);

    let mut last_age = -1;
    for minutes in [0, 5, 60, 600] {
        let now = written + ChronoDuration::minutes(minutes);
        let snap = assert_ok!(h.store.get_snapshot_at(&rosters_key(), now).await).unwrap();
        assert!(snap.age_seconds >= last_age);
        assert_eq!(snap.fetched_at.timestamp_millis(), written.timestamp_millis());
        last_age = snap.age_seconds;
    }
    assert_eq!(last_age, 600 * 60);
}

#[tokio::test]
async fn test_not_found_short_circuits() {
    let league = ScriptedLeague::new(season()).always(Err(not_found()));
    let h = harness(league, ScriptedStats::new(), &[], TIMEOUT).await;

    let env = h.pipeline.rosters(LEAGUE_ID).await;
    assert!(!env.success);
    assert_eq!(env.failure_reason, Some(FailureReason::NotFound));
    assert_eq!(env.error_type, Some(ErrorType::NotFound));
    assert_eq!(env.retries_used, 0);
    assert_eq!(h.league.resource_calls(), 1);
}

#[tokio::test]
async fn test_access_denied_carries_hint() {
    let league = ScriptedLeague::new(season()).always(Err(UpstreamError::Status {
        status: 401,
        body: String::new(),
    }));
    let h = harness(league, ScriptedStats::new(), &[], TIMEOUT).await;

    let env = h.pipeline.matchups(LEAGUE_ID, 3).await;
    assert_eq!(env.error_type, Some(ErrorType::AccessDenied));
    assert!(env.hint.unwrap().contains("public"));
    assert_eq!(h.league.resource_calls(), 1);
}

#[tokio::test]
async fn test_exhaustion_serves_snapshot() {
    let league = ScriptedLeague::new(season()).always(Err(server_error()));
    let h = harness(league, ScriptedStats::new(), &[], TIMEOUT).await;
    let written = Utc::now() - ChronoDuration::minutes(20);
    assert_ok!(h.store.put_snapshot_at(&rosters_key(), &roster_payload(), written).await);

    let env = h.pipeline.rosters(LEAGUE_ID).await;
    assert!(env.success);
    assert!(env.stale);
    assert_eq!(env.retries_used, 3);
    assert_eq!(env.failure_reason, Some(FailureReason::ServerError));
    assert_eq!(env.data, Some(roster_payload()));
    assert!(env.snapshot_age_seconds.unwrap() >= 20 * 60);
    assert_eq!(h.league.resource_calls(), 3);
}

#[tokio::test]
async fn test_exhaustion_without_snapshot_fails() {
    let league = ScriptedLeague::new(season()).always(Err(UpstreamError::Network("reset".into())));
    let h = harness(league, ScriptedStats::new(), &[], TIMEOUT).await;

    let env = h.pipeline.transactions(LEAGUE_ID, 2).await;
    assert!(!env.success);
    assert!(env.data.is_none());
    assert_eq!(env.retries_used, 3);
    assert_eq!(env.failure_reason, Some(FailureReason::Network));
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let league = ScriptedLeague::new(season())
        .then(Err(UpstreamError::Status {
            status: 429,
            body: String::new(),
        }))
        .then(Err(UpstreamError::Timeout))
        .always(Ok(json!([{"round": 1, "season": "2026", "roster_id": 4}])));
    let h = harness(league, ScriptedStats::new(), &[], TIMEOUT).await;

    let env = h.pipeline.traded_picks(LEAGUE_ID).await;
    assert!(env.success);
    assert!(!env.stale);
    assert_eq!(env.retries_used, 2);
    assert!(env.failure_reason.is_none());

    let key = ResourceKey::league(ResourceKind::TradedPicks, LEAGUE_ID);
    assert!(assert_ok!(h.store.get_snapshot(&key).await).is_some());
}

#[tokio::test]
async fn test_empty_rosters_for_existing_league_warn() {
    let league = ScriptedLeague::new(season()).always(Ok(json!([])));
    let h = harness(league, ScriptedStats::new(), &[], TIMEOUT).await;

    let env = h.pipeline.rosters(LEAGUE_ID).await;
    assert!(env.success);
    assert!(!env.stale);
    assert_eq!(env.data, Some(json!([])));
    assert!(env.warning.unwrap().contains("exists"));
    // Retried once, then the league itself was checked.
    assert_eq!(h.league.resource_calls(), 2);
    assert_eq!(h.league.info_calls(), 1);
    // Sparse results never replace a snapshot.
    assert!(assert_ok!(h.store.get_snapshot(&rosters_key()).await).is_none());
}

#[tokio::test]
async fn test_empty_rosters_for_missing_league_not_found() {
    let league = ScriptedLeague::new(season())
        .always(Ok(json!([])))
        .with_league_info(Err(not_found()));
    let h = harness(league, ScriptedStats::new(), &[], TIMEOUT).await;

    let env = h.pipeline.rosters(LEAGUE_ID).await;
    assert!(!env.success);
    assert_eq!(env.error_type, Some(ErrorType::NotFound));
}

#[tokio::test]
async fn test_empty_transactions_are_ordinary() {
    let league = ScriptedLeague::new(season()).always(Ok(json!([])));
    let h = harness(league, ScriptedStats::new(), &[], TIMEOUT).await;

    let env = h.pipeline.transactions(LEAGUE_ID, 4).await;
    assert!(env.success);
    assert!(env.warning.is_none());
    assert_eq!(h.league.resource_calls(), 1);
    assert_eq!(h.league.info_calls(), 0);
}

#[tokio::test]
async fn test_invalid_input_never_reaches_upstream() {
    let h = harness(ScriptedLeague::new(season()), ScriptedStats::new(), &[], TIMEOUT).await;

    let bad_week = h.pipeline.matchups(LEAGUE_ID, 0).await;
    let bad_league = h.pipeline.rosters("league 1; drop").await;
    assert_eq!(bad_week.error_type, Some(ErrorType::Validation));
    assert_eq!(bad_league.error_type, Some(ErrorType::Validation));
    assert_eq!(h.league.resource_calls(), 0);
}

#[tokio::test]
async fn test_deadline_serves_snapshot_and_cancels_fetch() {
    let league = ScriptedLeague::new(season())
        .with_delay(Duration::from_secs(30))
        .always(Ok(roster_payload()));
    let h = harness(league, ScriptedStats::new(), &[], Duration::from_millis(100)).await;
    assert_ok!(h.store.put_snapshot(&rosters_key(), &json!([{"roster_id": 9}])).await);

    let started = Instant::now();
    let env = h.pipeline.rosters(LEAGUE_ID).await;
    assert!(started.elapsed() < Duration::from_secs(5));

    assert!(env.success);
    assert!(env.stale);
    assert_eq!(env.failure_reason, Some(FailureReason::Timeout));
    assert_eq!(env.retries_used, 0);
    assert_eq!(env.data, Some(json!([{"roster_id": 9}])));

    // The abandoned fetch does not keep retrying in the background.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.league.resource_calls(), 1);
}

#[tokio::test]
async fn test_deadline_without_snapshot_fails_with_timeout() {
    let league = ScriptedLeague::new(season()).with_delay(Duration::from_secs(30));
    let h = harness(league, ScriptedStats::new(), &[], Duration::from_millis(50)).await;

    let env = h.pipeline.matchups(LEAGUE_ID, 6).await;
    assert!(!env.success);
    assert_eq!(env.error_type, Some(ErrorType::Timeout));
}

#[tokio::test]
async fn test_sweep_only_drops_old_snapshots() {
    let h = harness(ScriptedLeague::new(season()), ScriptedStats::new(), &[], TIMEOUT).await;
    let old = ResourceKey::weekly(ResourceKind::Matchups, LEAGUE_ID, 1);
    let fresh = ResourceKey::weekly(ResourceKind::Matchups, LEAGUE_ID, 6);
    assert_ok!(h.store.put_snapshot_at(&old, &json!([]), Utc::now() - ChronoDuration::days(45)).await);
    assert_ok!(h.store.put_snapshot(&fresh, &json!([])).await);

    let deleted = assert_ok!(h.store.sweep_snapshots(ChronoDuration::days(30)).await);
    assert_eq!(deleted.get(&ResourceKind::Matchups), Some(&1));
    assert!(assert_ok!(h.store.get_snapshot(&old).await).is_none());
    assert!(assert_ok!(h.store.get_snapshot(&fresh).await).is_some());
}
