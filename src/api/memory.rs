//! In-process collaborator store.
//!
//! Holds matches and tournaments in memory and assigns ids the way the REST
//! service does. No network calls are made. Failure injection and write
//! latency let tests exercise the retry and in-flight paths.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::data::models::{Match, NewTournament, Tournament};

use super::errors::ApiError;
use super::MatchApi;

#[derive(Debug, Default)]
struct Inner {
    matches: BTreeMap<u64, Match>,
    tournaments: BTreeMap<u64, Tournament>,
    next_match_id: u64,
    next_tournament_id: u64,
    offline: bool,
    failing_writes: u32,
    write_latency: Duration,
    update_calls: u64,
    list_calls: u64,
}

/// In-memory [`MatchApi`] implementation.
#[derive(Debug, Default)]
pub struct InMemoryMatchApi {
    inner: Mutex<Inner>,
}

impl InMemoryMatchApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing records. Records without an id get one assigned.
    pub fn with_matches(matches: Vec<Match>) -> Self {
        let api = Self::new();
        {
            let mut inner = api.lock();
            for mut m in matches {
                let id = match m.id {
                    Some(id) => id,
                    None => {
                        inner.next_match_id += 1;
                        inner.next_match_id
                    }
                };
                inner.next_match_id = inner.next_match_id.max(id);
                m.id = Some(id);
                inner.matches.insert(id, m);
            }
        }
        api
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// While offline every call fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Make the next `n` write calls (create/update) fail.
    pub fn fail_next_writes(&self, n: u32) {
        self.lock().failing_writes = n;
    }

    /// Delay every write by `latency` before it is applied.
    pub fn set_write_latency(&self, latency: Duration) {
        self.lock().write_latency = latency;
    }

    /// Overwrite a record directly, as another client of the store would.
    pub fn put_external(&self, m: Match) {
        if let Some(id) = m.id {
            self.lock().matches.insert(id, m);
        }
    }

    pub fn get(&self, id: u64) -> Option<Match> {
        self.lock().matches.get(&id).cloned()
    }

    pub fn update_calls(&self) -> u64 {
        self.lock().update_calls
    }

    pub fn list_calls(&self) -> u64 {
        self.lock().list_calls
    }

    fn check_online(&self) -> Result<(), ApiError> {
        if self.lock().offline {
            return Err(ApiError::Network("collaborator unreachable".to_string()));
        }
        Ok(())
    }

    /// Applies latency, then consumes one injected failure if any.
    async fn begin_write(&self) -> Result<(), ApiError> {
        let latency = self.lock().write_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.check_online()?;
        let mut inner = self.lock();
        if inner.failing_writes > 0 {
            inner.failing_writes -= 1;
            return Err(ApiError::Http {
                status_code: 503,
                message: "injected write failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MatchApi for InMemoryMatchApi {
    async fn list_matches(&self) -> Result<Vec<Match>, ApiError> {
        self.lock().list_calls += 1;
        self.check_online()?;
        Ok(self.lock().matches.values().cloned().collect())
    }

    async fn create_match(&self, new_match: &Match) -> Result<Match, ApiError> {
        new_match.validate().map_err(ApiError::InvalidPayload)?;
        self.begin_write().await?;

        let mut inner = self.lock();
        inner.next_match_id += 1;
        let id = inner.next_match_id;
        let mut created = new_match.clone();
        created.id = Some(id);
        inner.matches.insert(id, created.clone());
        debug!(match_id = id, "in-memory store created match");
        Ok(created)
    }

    async fn update_match(&self, id: u64, updated: &Match) -> Result<Match, ApiError> {
        self.lock().update_calls += 1;
        self.begin_write().await?;

        let mut inner = self.lock();
        if !inner.matches.contains_key(&id) {
            return Err(ApiError::NotFound(format!("match {id}")));
        }
        let mut stored = updated.clone();
        stored.id = Some(id);
        inner.matches.insert(id, stored.clone());
        debug!(match_id = id, status = %stored.status, "in-memory store updated match");
        Ok(stored)
    }

    async fn list_tournaments(&self) -> Result<Vec<Tournament>, ApiError> {
        self.check_online()?;
        Ok(self.lock().tournaments.values().cloned().collect())
    }

    async fn create_tournament(&self, new: &NewTournament) -> Result<Tournament, ApiError> {
        self.begin_write().await?;
        let teams = serde_json::to_string(&new.teams)
            .map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

        let mut inner = self.lock();
        inner.next_tournament_id += 1;
        let tournament = Tournament {
            id: inner.next_tournament_id,
            name: new.name.clone(),
            teams,
            start_date: new.start_date,
            end_date: new.end_date,
            location: new.location.clone(),
            matches: None,
        };
        inner.tournaments.insert(tournament.id, tournament.clone());
        Ok(tournament)
    }

    async fn tournament_matches(&self, tournament_id: u64) -> Result<Vec<Match>, ApiError> {
        self.check_online()?;
        let inner = self.lock();
        if !inner.tournaments.contains_key(&tournament_id) {
            return Err(ApiError::NotFound(format!("tournament {tournament_id}")));
        }
        Ok(inner
            .matches
            .values()
            .filter(|m| m.tournament_id == Some(tournament_id))
            .cloned()
            .collect())
    }
}
