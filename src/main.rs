//! GRIDIRON — Resilient fantasy-football data pipeline
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the SQLite store, wires the league and stats clients into the
//! read pipeline, serves the read API, and runs the maintenance loop
//! (snapshot sweep, directory refresh, injury aggregation) with
//! graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use gridiron::config::AppConfig;
use gridiron::dashboard::{self, ApiState};
use gridiron::data::espn::{self, EspnClient};
use gridiron::data::sleeper::SleeperClient;
use gridiron::data::{LeagueProvider, StatsProvider};
use gridiron::engine::{Enricher, FetchExecutor, InjuryRefresher, LeaguePipeline};
use gridiron::storage::Store;
use gridiron::types::ResourceKind;

const BANNER: &str = r#"
  ____ ____  ___ ____ ___ ____   ___  _   _
 / ___|  _ \|_ _|  _ \_ _|  _ \ / _ \| \ | |
| |  _| |_) || || | | | || |_) | | | |  \| |
| |_| |  _ < | || |_| | ||  _ <| |_| | |\  |
 \____|_| \_\___|____/___|_| \_\\___/|_| \_|

  Fantasy-football data acquisition & enrichment
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    let run_id = uuid::Uuid::new_v4();
    info!(
        service = %cfg.service.name,
        run_id = %run_id,
        maintenance_interval_secs = cfg.service.maintenance_interval_secs,
        retry_schedule_ms = ?cfg.retry.backoff_ms,
        "GRIDIRON starting up"
    );

    // -- Storage ---------------------------------------------------------

    let store = Store::connect(&cfg.storage.database_url).await?;

    // -- Upstream clients ------------------------------------------------

    let league: Arc<dyn LeagueProvider> = Arc::new(SleeperClient::new(
        &cfg.league_api.base_url,
        Duration::from_secs(cfg.league_api.timeout_secs),
    )?);

    let stats_key = cfg.stats_api_key();
    if let (Some(name), None) = (&cfg.stats_api.api_key_env, &stats_key) {
        warn!(env = %name, "Stats API key not set — usage backfill limited to the public feed");
    }
    let stats: Arc<dyn StatsProvider> = Arc::new(EspnClient::new(
        &cfg.stats_api.scoreboard_url,
        &cfg.stats_api.core_url,
        cfg.stats_api.usage_url.clone(),
        stats_key,
        Duration::from_secs(cfg.stats_api.timeout_secs),
    )?);

    // -- Engine ----------------------------------------------------------

    let injuries = Arc::new(
        InjuryRefresher::new(Arc::clone(&stats), store.clone()).with_limits(
            chrono::Duration::hours(cfg.enrichment.injury_refresh_hours),
            cfg.stats_api.max_injury_pages,
        ),
    );
    let enricher = Arc::new(Enricher::new(
        store.clone(),
        Arc::clone(&league),
        Arc::clone(&stats),
        Arc::clone(&injuries),
        cfg.enrichment_settings(),
    ));
    let executor = FetchExecutor::new(
        Arc::clone(&league),
        store.clone(),
        FetchExecutor::schedule_from_ms(&cfg.retry.backoff_ms),
    );
    let pipeline = ResourceKind::ALL.iter().fold(
        LeaguePipeline::new(
            executor,
            Arc::clone(&enricher),
            store.clone(),
            cfg.request_timeout(),
            cfg.fallback_context(),
        ),
        |pipeline, kind| pipeline.with_ttl(*kind, cfg.snapshot_ttl(*kind)),
    );
    let pipeline = Arc::new(pipeline);

    // -- Read API --------------------------------------------------------

    if cfg.dashboard.enabled {
        let state = Arc::new(ApiState::new(Arc::clone(&pipeline), cfg.service.name.clone()));
        dashboard::spawn_dashboard(state, cfg.dashboard.port).await?;
    }

    // -- Maintenance loop ------------------------------------------------

    let mut interval =
        tokio::time::interval(Duration::from_secs(cfg.service.maintenance_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.service.maintenance_interval_secs,
        "Entering maintenance loop. Press Ctrl+C to stop."
    );

    let mut cycle: u64 = 0;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                cycle += 1;
                run_maintenance(cycle, &cfg, &store, &enricher, &injuries).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!(cycles = cycle, run_id = %run_id, "GRIDIRON shut down cleanly.");
    Ok(())
}

/// One maintenance pass: directory refresh → injury aggregation → sweep.
/// Each step logs its own failure and the pass always completes.
async fn run_maintenance(
    cycle: u64,
    cfg: &AppConfig,
    store: &Store,
    enricher: &Enricher,
    injuries: &InjuryRefresher,
) {
    info!(cycle, "Starting maintenance");

    // 1. Player directory (half-day cadence by default)
    let directory_age = chrono::Duration::hours(cfg.league_api.directory_refresh_hours as i64);
    match enricher.refresh_directory_if_due(directory_age).await {
        Ok(Some(count)) => info!(count, "Player directory refreshed"),
        Ok(None) => {}
        Err(e) => error!(error = %e, "Player directory refresh failed — continuing"),
    }

    // 2. League-wide injury aggregation, teams already fresh are skipped
    let reports = injuries.refresh_teams(espn::all_teams()).await;

    // 3. Snapshot sweep
    let max_age = chrono::Duration::days(cfg.snapshots.purge_after_days);
    let swept = match store.sweep_snapshots(max_age).await {
        Ok(deleted) => deleted.values().sum::<u64>(),
        Err(e) => {
            error!(error = %e, "Snapshot sweep failed");
            0
        }
    };

    info!(cycle, injury_reports = reports, snapshots_swept = swept, "Maintenance complete");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gridiron=info"));

    let json_logging = std::env::var("GRIDIRON_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
