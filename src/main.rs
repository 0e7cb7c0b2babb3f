//! Match dashboard engine.
//!
//! Keeps a local view of football matches in sync with the collaborator
//! store and drives every watched match through its lifecycle:
//! Upcoming, then InProgress at kickoff, then Finished when its duration
//! runs out.
//!
//! Architecture:
//! - Single-threaded Tokio runtime; one task per live ticker
//! - Reconciliation loop polling the authoritative match list
//! - Transition trigger persisting phase changes over REST
//! - HTTP or in-memory collaborator behind the `MatchApi` trait

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use match_dashboard::api::client::MatchApiClient;
use match_dashboard::api::memory::InMemoryMatchApi;
use match_dashboard::api::MatchApi;
use match_dashboard::clock::{Clock, SystemClock};
use match_dashboard::config::{BackendMode, Settings};
use match_dashboard::data::models::MatchStatus;
use match_dashboard::data::reconciler::{Reconciler, ReconcilerConfig};
use match_dashboard::lifecycle::actions::load_tournaments;
use match_dashboard::lifecycle::scheduler::TickerScheduler;
use match_dashboard::lifecycle::trigger::TransitionTrigger;
use match_dashboard::state::match_store::MatchStore;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load configuration.
    let settings = Settings::from_env();

    // Initialize logging.
    init_logging(&settings);

    info!("=== Match Dashboard Engine ===");
    info!(
        backend = ?settings.backend_mode,
        base_url = %settings.api_base_url,
        tick_interval_ms = settings.tick_interval_ms,
        "Configuration loaded"
    );

    // Validate settings.
    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!(error = %e, "Configuration error");
        }
        anyhow::bail!("Configuration validation failed");
    }

    let api: Arc<dyn MatchApi> = match settings.backend_mode {
        BackendMode::Http => Arc::new(MatchApiClient::new(
            &settings.api_base_url,
            settings.http_rate_limit,
            settings.http_max_attempts,
            settings.http_timeout_seconds,
        )?),
        BackendMode::Memory => {
            warn!("In-memory backend selected, nothing will be persisted");
            Arc::new(InMemoryMatchApi::new())
        }
    };

    let store = MatchStore::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // =========================================================================
    // Initial load
    // =========================================================================
    let reconciler = Reconciler::new(
        api.clone(),
        store.clone(),
        ReconcilerConfig {
            poll_interval: Duration::from_secs_f64(settings.reconcile_interval_seconds),
        },
    );
    match reconciler.poll_once().await {
        Ok(summary) => info!(
            matches = summary.confirmed,
            dropped = summary.dropped_without_id,
            "Initial match list loaded"
        ),
        Err(e) => warn!(error = %e, "Initial load failed, starting with an empty store"),
    }

    match load_tournaments(api.as_ref()).await {
        Ok(tournaments) => {
            for t in &tournaments {
                info!(
                    tournament_id = t.id,
                    name = %t.name,
                    teams = t.teams().len(),
                    matches = t.matches.as_ref().map_or(0, Vec::len),
                    "Tournament loaded"
                );
            }
        }
        Err(e) => warn!(error = %e, "Failed to load tournaments"),
    }

    // =========================================================================
    // Background tasks
    // =========================================================================
    let shutdown = CancellationToken::new();
    let reconciler_task = reconciler.spawn(shutdown.clone());

    let trigger = TransitionTrigger::new(api.clone(), store.clone());
    let mut events = trigger.subscribe();
    let events_shutdown = shutdown.clone();
    let events_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = events_shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => info!(
                        match_id = event.match_id,
                        transition = %event.transition,
                        fixture = %event.fixture,
                        "Match phase changed"
                    ),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Transition event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });

    let tick_every = Duration::from_millis(settings.tick_interval_ms);
    let mut scheduler = TickerScheduler::new(store.clone(), trigger, clock, tick_every);

    // Main loop.
    info!(
        watched = settings.watch_match_ids.len(),
        "Starting live clock (empty watch list follows every match)"
    );

    let mut refresh = tokio::time::interval(tick_every);
    let mut status_log = tokio::time::interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for ctrl+c");
                }
                info!("Shutdown signal received");
                break;
            }
            _ = refresh.tick() => {
                let visible = visible_ids(&settings, &store);
                scheduler.sync_visible(&visible);
                let pruned = scheduler.prune_finished();
                if pruned > 0 {
                    info!(pruned, "Tickers stopped for finished matches");
                }
            }
            _ = status_log.tick() => {
                scheduler.log_running();
            }
        }
    }

    // Graceful shutdown.
    info!("Shutting down...");
    shutdown.cancel();
    scheduler.shutdown().await;
    if let Err(e) = reconciler_task.await {
        warn!(error = %e, "Reconciler task failed");
    }
    let _ = events_task.await;

    let finished = store
        .all()
        .iter()
        .filter(|m| m.status == MatchStatus::Finished)
        .count();
    info!(matches = store.len(), finished, "Shutdown complete.");

    Ok(())
}

/// Ids the scheduler should keep a ticker for: the configured watch list, or
/// every confirmed match that can still change phase.
fn visible_ids(settings: &Settings, store: &MatchStore) -> Vec<u64> {
    if !settings.watch_match_ids.is_empty() {
        return settings.watch_match_ids.clone();
    }
    store
        .all()
        .iter()
        .filter(|m| m.status.is_live_relevant())
        .filter_map(|m| m.id)
        .collect()
}

fn init_logging(settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
