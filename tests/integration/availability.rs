//! Player enrichment and multi-source injury aggregation.

use std::time::Duration;
use tokio_test::assert_ok;

use gridiron::engine::aggregator::confidence;
use gridiron::engine::injuries::TeamRefresh;
use gridiron::types::{
    Athlete, InjuryStatus, OpponentSource, PracticeStatus, PracticeStatusSource, SeasonContext,
    SnapPctSource, Trend,
};

use crate::mock_upstream::*;

const TIMEOUT: Duration = Duration::from_secs(5);

fn week6() -> ScriptedLeague {
    ScriptedLeague::new(SeasonContext::new(2025, 6))
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn injured(mut a: Athlete, status: &str, espn_id: &str) -> Athlete {
    a.injury_status = Some(status.to_string());
    a.espn_id = Some(espn_id.to_string());
    a
}

// -- Participation share --

#[tokio::test]
async fn test_depth_chart_estimates() {
    let athletes = [
        athlete("6794", "Justin Jefferson", "WR", "MIN", Some(1)),
        athlete("8146", "Jalen Nailor", "WR", "MIN", Some(2)),
        athlete("9997", "Trent Sherfield", "WR", "MIN", Some(3)),
    ];
    let h = harness(week6(), ScriptedStats::new(), &athletes, TIMEOUT).await;

    let refs = h.pipeline.enrich_players(&ids(&["6794", "8146", "9997"])).await;
    let pcts: Vec<_> = refs.iter().map(|r| r.snap_pct).collect();
    assert_eq!(pcts, vec![Some(70.0), Some(45.0), Some(15.0)]);
    assert!(refs.iter().all(|r| r.snap_pct_source == Some(SnapPctSource::Estimated)));
    assert!(refs.iter().all(|r| r.snap_pct_week.is_none()));
    // One previous-week backfill attempt for the shared team.
    assert_eq!(h.stats.usage_calls(), 1);
}

#[tokio::test]
async fn test_previous_week_from_cache_is_tagged() {
    let athletes = [athlete("6794", "Justin Jefferson", "WR", "MIN", Some(1))];
    let h = harness(week6(), ScriptedStats::new(), &athletes, TIMEOUT).await;
    assert_ok!(
        h.store
            .upsert_usage(2025, 5, &[usage_row("6794", "MIN", 91.0, 11.0)])
            .await
    );

    let refs = h.pipeline.enrich_players(&ids(&["6794"])).await;
    assert_eq!(refs[0].snap_pct, Some(91.0));
    assert_eq!(refs[0].snap_pct_source, Some(SnapPctSource::Cached));
    assert_eq!(refs[0].snap_pct_week, Some(5));
    assert_eq!(h.stats.usage_calls(), 0);
}

#[tokio::test]
async fn test_previous_week_backfilled_on_miss() {
    let athletes = [athlete("6794", "Justin Jefferson", "WR", "MIN", Some(1))];
    let stats = ScriptedStats::new().with_usage(5, "MIN", vec![usage_row("6794", "MIN", 88.0, 9.0)]);
    let h = harness(week6(), stats, &athletes, TIMEOUT).await;

    let refs = h.pipeline.enrich_players(&ids(&["6794"])).await;
    assert_eq!(refs[0].snap_pct, Some(88.0));
    assert_eq!(refs[0].snap_pct_source, Some(SnapPctSource::Cached));
    assert_eq!(refs[0].snap_pct_week, Some(5));

    // Second request reads the cache.
    let again = h.pipeline.enrich_players(&ids(&["6794"])).await;
    assert_eq!(again[0].snap_pct, Some(88.0));
    assert_eq!(h.stats.usage_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_reads_share_one_usage_backfill() {
    let athletes = [
        athlete("6794", "Justin Jefferson", "WR", "MIN", Some(1)),
        athlete("8146", "Jalen Nailor", "WR", "MIN", Some(2)),
    ];
    let stats = ScriptedStats::new()
        .with_delay(Duration::from_millis(100))
        .with_usage(
            5,
            "MIN",
            vec![usage_row("6794", "MIN", 88.0, 9.0), usage_row("8146", "MIN", 52.0, 4.0)],
        );
    let h = harness(week6(), stats, &athletes, TIMEOUT).await;

    let first = ids(&["6794"]);
    let second = ids(&["8146"]);
    let (a, b) = tokio::join!(
        h.pipeline.enrich_players(&first),
        h.pipeline.enrich_players(&second)
    );

    assert_eq!(h.stats.usage_calls(), 1);
    assert_eq!(a[0].snap_pct, Some(88.0));
    assert_eq!(b[0].snap_pct, Some(52.0));
    assert_eq!(b[0].snap_pct_source, Some(SnapPctSource::Cached));
}

#[tokio::test]
async fn test_empty_usage_answer_is_retried_on_next_miss() {
    let athletes = [athlete("6794", "Justin Jefferson", "WR", "MIN", Some(1))];
    let h = harness(week6(), ScriptedStats::new(), &athletes, TIMEOUT).await;

    let first = h.pipeline.enrich_players(&ids(&["6794"])).await;
    assert_eq!(first[0].snap_pct_source, Some(SnapPctSource::Estimated));
    let again = h.pipeline.enrich_players(&ids(&["6794"])).await;
    assert_eq!(again[0].snap_pct_source, Some(SnapPctSource::Estimated));
    assert_eq!(h.stats.usage_calls(), 2);
}

#[tokio::test]
async fn test_usage_window_and_trend_from_cached_weeks() {
    let athletes = [athlete("6794", "Justin Jefferson", "WR", "MIN", Some(1))];
    let h = harness(week6(), ScriptedStats::new(), &athletes, TIMEOUT).await;
    for (week, snap, targets) in [(4, 80.0, 6.0), (5, 84.0, 6.0), (6, 90.0, 12.0)] {
        assert_ok!(
            h.store
                .upsert_usage(2025, week, &[usage_row("6794", "MIN", snap, targets)])
                .await
        );
    }

    let refs = h.pipeline.enrich_players(&ids(&["6794"])).await;
    let window = refs[0].usage_last3_weeks.clone().unwrap();
    assert_eq!(window.samples, 3);
    assert_eq!(window.targets_avg, Some(8.0));
    assert_eq!(window.snap_share_avg, Some(254.0 / 3.0));
    assert!(window.routes_avg.is_none());

    let trend = refs[0].usage_trend.clone().unwrap();
    assert_eq!(trend.targets, Some(Trend::Up));
    assert_eq!(trend.snap_share, Some(Trend::Flat));
    assert!(trend.routes.is_none());
}

#[tokio::test]
async fn test_defense_opponent_fetched_then_cached() {
    let athletes = [athlete("KC", "Kansas City Chiefs", "DEF", "KC", None)];
    let stats = ScriptedStats::new().with_game(6, "LV", "KC");
    let h = harness(week6(), stats, &athletes, TIMEOUT).await;

    let first = h.pipeline.enrich_players(&ids(&["KC"])).await;
    assert_eq!(first[0].opponent.as_deref(), Some("LV"));
    assert_eq!(first[0].opponent_source, Some(OpponentSource::Fetched));
    assert!(first[0].snap_pct.is_none());

    let second = h.pipeline.enrich_players(&ids(&["KC"])).await;
    assert_eq!(second[0].opponent_source, Some(OpponentSource::Cached));
}

// -- Injuries --

#[tokio::test]
async fn test_corroborated_injury_reaches_full_confidence() {
    let athletes = [injured(
        athlete("4046", "Patrick Mahomes", "QB", "KC", Some(1)),
        "Questionable",
        "3139477",
    )];
    let stats = ScriptedStats::new().with_injury("KC", injury("3139477", "KC", "Questionable", Some("Limited")));
    let h = harness(week6(), stats, &athletes, TIMEOUT).await;

    let outcome = assert_ok!(h.injuries.refresh_team("KC").await);
    assert_eq!(outcome, TeamRefresh::Refreshed { reports: 1 });

    let reports = assert_ok!(h.pipeline.injuries(10).await);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].player_id, "4046");
    assert_eq!(reports[0].status, InjuryStatus::Questionable);
    assert_eq!(reports[0].confidence, confidence(true, 2, true));
    assert_eq!(reports[0].confidence, 100);
    assert!(reports[0].sources.contains("espn") && reports[0].sources.contains("sleeper"));

    let refs = h.pipeline.enrich_players(&ids(&["4046"])).await;
    assert_eq!(refs[0].injury_status, Some(InjuryStatus::Questionable));
    assert_eq!(refs[0].practice_status, PracticeStatus::Limited);
    assert_eq!(refs[0].practice_status_source, PracticeStatusSource::Cached);
}

#[tokio::test]
async fn test_disagreement_keeps_primary_status_with_lower_confidence() {
    let athletes = [
        injured(athlete("4046", "Patrick Mahomes", "QB", "KC", Some(1)), "Questionable", "3139477"),
        injured(athlete("4984", "Travis Kelce", "TE", "KC", Some(1)), "Questionable", "15847"),
    ];
    let stats = ScriptedStats::new()
        .with_injury("KC", injury("3139477", "KC", "Questionable", None))
        .with_injury("KC", injury("15847", "KC", "Out", None));
    let h = harness(week6(), stats, &athletes, TIMEOUT).await;
    assert_ok!(h.injuries.refresh_team("KC").await);

    let reports = assert_ok!(h.pipeline.injuries(10).await);
    let agreed = reports.iter().find(|r| r.player_id == "4046").unwrap();
    let split = reports.iter().find(|r| r.player_id == "4984").unwrap();
    assert_eq!(split.status, InjuryStatus::Questionable);
    assert!(split.confidence < agreed.confidence);
}

#[tokio::test]
async fn test_confidence_monotone_in_sources_and_agreement() {
    for primary in [false, true] {
        for agree in [false, true] {
            for n in 0..5 {
                assert!(confidence(primary, n, agree) <= confidence(primary, n + 1, agree));
            }
        }
        for n in 0..5 {
            assert!(confidence(primary, n, false) <= confidence(primary, n, true));
            assert!(confidence(false, n, true) <= confidence(true, n, true));
            assert!(confidence(primary, n, true) <= 100);
        }
    }
}

#[tokio::test]
async fn test_secondary_outage_writes_primary_only_and_retries_later() {
    let athletes = [injured(
        athlete("4046", "Patrick Mahomes", "QB", "KC", Some(1)),
        "Doubtful",
        "3139477",
    )];
    let h = harness(week6(), ScriptedStats::new().injuries_down(), &athletes, TIMEOUT).await;

    let outcome = assert_ok!(h.injuries.refresh_team_if_due("KC").await);
    assert_eq!(outcome, TeamRefresh::Partial { reports: 1 });

    let reports = assert_ok!(h.pipeline.injuries(10).await);
    assert_eq!(reports[0].confidence, confidence(true, 1, true));
    assert_eq!(reports[0].sources.len(), 1);

    // Not marked fresh, so the next pass asks the secondary source again.
    let calls = h.stats.injury_calls();
    assert_ok!(h.injuries.refresh_team_if_due("KC").await);
    assert!(h.stats.injury_calls() > calls);
}

#[tokio::test]
async fn test_concurrent_team_refreshes_fetch_once() {
    let athletes = [injured(
        athlete("4046", "Patrick Mahomes", "QB", "KC", Some(1)),
        "Questionable",
        "3139477",
    )];
    let stats = ScriptedStats::new()
        .with_delay(Duration::from_millis(100))
        .with_injury("KC", injury("3139477", "KC", "Questionable", None));
    let h = harness(week6(), stats, &athletes, TIMEOUT).await;

    let (a, b) = tokio::join!(
        h.injuries.refresh_team_if_due("KC"),
        h.injuries.refresh_team_if_due("KC")
    );
    let mut outcomes = vec![assert_ok!(a), assert_ok!(b)];
    outcomes.sort_by_key(|o| matches!(o, TeamRefresh::Skipped));
    assert_eq!(outcomes, vec![TeamRefresh::Refreshed { reports: 1 }, TeamRefresh::Skipped]);
    assert_eq!(h.stats.injury_calls(), 1);
}

#[tokio::test]
async fn test_fresh_team_is_skipped() {
    let athletes = [athlete("4046", "Patrick Mahomes", "QB", "KC", Some(1))];
    let h = harness(week6(), ScriptedStats::new(), &athletes, TIMEOUT).await;

    assert_ok!(h.injuries.refresh_team_if_due("KC").await);
    let calls = h.stats.injury_calls();
    let outcome = assert_ok!(h.injuries.refresh_team_if_due("KC").await);
    assert_eq!(outcome, TeamRefresh::Skipped);
    assert_eq!(h.stats.injury_calls(), calls);
}

#[tokio::test]
async fn test_practice_derived_from_primary_status() {
    let athletes = [injured(
        athlete("4046", "Patrick Mahomes", "QB", "KC", Some(1)),
        "Out",
        "3139477",
    )];
    let h = harness(week6(), ScriptedStats::new(), &athletes, TIMEOUT).await;

    let refs = h.pipeline.enrich_players(&ids(&["4046"])).await;
    assert_eq!(refs[0].injury_status, Some(InjuryStatus::Out));
    assert_eq!(refs[0].practice_status, PracticeStatus::DidNotPractice);
    assert_eq!(refs[0].practice_status_source, PracticeStatusSource::DerivedFromInjury);
}

#[tokio::test]
async fn test_healthy_player_defaults_to_full() {
    let athletes = [athlete("6794", "Justin Jefferson", "WR", "MIN", Some(1))];
    let h = harness(week6(), ScriptedStats::new(), &athletes, TIMEOUT).await;

    let refs = h.pipeline.enrich_players(&ids(&["6794"])).await;
    assert!(refs[0].injury_status.is_none());
    assert_eq!(refs[0].practice_status, PracticeStatus::Full);
    assert_eq!(refs[0].practice_status_source, PracticeStatusSource::DefaultHealthy);
}

#[tokio::test]
async fn test_team_fan_out_counts_reports() {
    let athletes = [
        injured(athlete("4046", "Patrick Mahomes", "QB", "KC", Some(1)), "Questionable", "3139477"),
        injured(athlete("6794", "Justin Jefferson", "WR", "MIN", Some(1)), "Out", "4262921"),
    ];
    let h = harness(week6(), ScriptedStats::new(), &athletes, TIMEOUT).await;

    let written = h.injuries.refresh_teams(["KC", "MIN", "BUF"]).await;
    assert_eq!(written, 2);
    let reports = assert_ok!(h.pipeline.injuries(10).await);
    // Most severe first.
    assert_eq!(reports[0].player_id, "6794");
}
