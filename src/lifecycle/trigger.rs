//! Transition trigger.
//!
//! Persists a phase change decided by the resolver and writes the
//! collaborator's response back into the match store.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::api::MatchApi;
use crate::state::match_store::MatchStore;

use super::errors::SyncError;
use super::resolver::Transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRequest {
    pub match_id: u64,
    pub transition: Transition,
    pub started_at: Option<DateTime<Utc>>,
}

impl TransitionRequest {
    pub fn start(match_id: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            match_id,
            transition: Transition::ToInProgress,
            started_at: Some(started_at),
        }
    }

    pub fn finish(match_id: u64) -> Self {
        Self {
            match_id,
            transition: Transition::ToFinished,
            started_at: None,
        }
    }
}

/// Announced after a transition has been acknowledged by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionEvent {
    pub match_id: u64,
    pub transition: Transition,
    pub fixture: String,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TransitionTrigger {
    api: Arc<dyn MatchApi>,
    store: MatchStore,
    events: broadcast::Sender<TransitionEvent>,
}

impl TransitionTrigger {
    pub fn new(api: Arc<dyn MatchApi>, store: MatchStore) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { api, store, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.events.subscribe()
    }

    /// Write the transition. The store is only touched on success.
    pub async fn fire(&self, request: TransitionRequest) -> Result<(), SyncError> {
        let id = request.match_id;
        let current = self.store.get(id).ok_or(SyncError::UnknownMatch(id))?;
        let target = request.transition.target();

        if !current.status.can_advance_to(target) {
            return Err(SyncError::InvalidTransition {
                match_id: id,
                from: current.status,
                to: target,
            });
        }

        let mut payload = current.clone();
        payload.status = target;
        if let Some(started_at) = request.started_at {
            payload.started_at = Some(started_at);
        }

        match self.api.update_match(id, &payload).await {
            Ok(mut updated) => {
                updated.id.get_or_insert(id);
                info!(
                    match_id = id,
                    transition = %request.transition,
                    fixture = %updated.fixture_label(),
                    "Match transition persisted"
                );
                let event = TransitionEvent {
                    match_id: id,
                    transition: request.transition,
                    fixture: updated.fixture_label(),
                    scheduled_at: updated.scheduled_at,
                };
                self.store.upsert(updated);
                // No subscribers is fine.
                let _ = self.events.send(event);
                Ok(())
            }
            Err(e) => {
                warn!(
                    match_id = id,
                    transition = %request.transition,
                    error = %e,
                    "Transition write failed, will retry on next tick"
                );
                Err(SyncError::TransitionWrite {
                    match_id: id,
                    transition: request.transition,
                    source: e,
                })
            }
        }
    }
}
