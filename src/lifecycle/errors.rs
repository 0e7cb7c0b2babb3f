//! Errors raised by the lifecycle engine.
//!
//! None of these reach the display layer: tickers and the reconciler log
//! them and carry on.

use thiserror::Error;

use crate::api::errors::ApiError;
use crate::data::models::MatchStatus;

use super::resolver::Transition;

#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error("transition {transition} for match {match_id} was not persisted: {source}")]
    TransitionWrite {
        match_id: u64,
        transition: Transition,
        #[source]
        source: ApiError,
    },

    #[error("reconciliation fetch failed: {0}")]
    ReconciliationFetch(#[source] ApiError),

    #[error("match {0} is not in the store")]
    UnknownMatch(u64),

    #[error("match {match_id} cannot move from {from} to {to}")]
    InvalidTransition {
        match_id: u64,
        from: MatchStatus,
        to: MatchStatus,
    },

    #[error("request rejected: {0}")]
    Api(#[from] ApiError),
}

impl SyncError {
    /// Failures the ticker retries on its next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransitionWrite { .. } | Self::ReconciliationFetch(_)
        )
    }
}
