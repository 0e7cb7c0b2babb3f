//! Match/tournament REST collaborator.
//!
//! [`MatchApi`] is the seam the lifecycle engine talks through. The HTTP
//! implementation lives in [`client`]; [`memory`] holds an in-process
//! stand-in used for offline runs and tests.

pub mod client;
pub mod errors;
pub mod memory;

use async_trait::async_trait;

use crate::data::models::{Match, NewTournament, Tournament};
use errors::ApiError;

#[async_trait]
pub trait MatchApi: Send + Sync + 'static {
    /// `GET /matches/`: full snapshot.
    async fn list_matches(&self) -> Result<Vec<Match>, ApiError>;

    /// `POST /matches/`: returns the created record with its assigned id.
    async fn create_match(&self, new_match: &Match) -> Result<Match, ApiError>;

    /// `PUT /matches/{id}` with the full record.
    async fn update_match(&self, id: u64, updated: &Match) -> Result<Match, ApiError>;

    /// `GET /tournaments/`
    async fn list_tournaments(&self) -> Result<Vec<Tournament>, ApiError>;

    /// `POST /tournaments/`
    async fn create_tournament(&self, new: &NewTournament) -> Result<Tournament, ApiError>;

    /// `GET /tournaments/{id}/matches/`
    async fn tournament_matches(&self, tournament_id: u64) -> Result<Vec<Match>, ApiError>;
}
