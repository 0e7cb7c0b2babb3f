//! Reconciliation loop.
//!
//! Periodically fetches the authoritative match list and merges it into the
//! match store. A failed fetch leaves the store as it was; the next interval
//! simply tries again.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::MatchApi;
use crate::lifecycle::errors::SyncError;
use crate::state::match_store::{MatchStore, ReplaceSummary};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub poll_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

pub struct Reconciler {
    api: Arc<dyn MatchApi>,
    store: MatchStore,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(api: Arc<dyn MatchApi>, store: MatchStore, config: ReconcilerConfig) -> Self {
        Self { api, store, config }
    }

    /// Fetch once and merge. Used for the initial load and by the loop.
    pub async fn poll_once(&self) -> Result<ReplaceSummary, SyncError> {
        match self.api.list_matches().await {
            Ok(matches) => {
                let fetched = matches.len();
                let summary = self.store.replace_all(matches);
                debug!(
                    fetched,
                    confirmed = summary.confirmed,
                    pending = summary.pending_kept,
                    "Reconciliation applied"
                );
                Ok(summary)
            }
            Err(e) => {
                warn!(error = %e, "Reconciliation fetch failed, keeping current matches");
                Err(SyncError::ReconciliationFetch(e))
            }
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Reconciler starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Reconciler received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    // Errors are logged inside poll_once.
                    let _ = self.poll_once().await;
                }
            }
        }
    }
}
