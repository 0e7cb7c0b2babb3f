//! User-driven match and tournament flows.
//!
//! Creation is optimistic: the new match is visible in the store as a
//! pending entry until the collaborator confirms it with an id.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{info, warn};

use crate::api::errors::ApiError;
use crate::api::MatchApi;
use crate::data::models::{Match, MatchEdit, MatchStatus, NewTournament, Stage, Tournament};
use crate::state::match_store::MatchStore;

use super::errors::SyncError;

/// Create a match. The pending entry is swapped for the confirmed record on
/// success and removed on failure.
pub async fn create_match(
    api: &dyn MatchApi,
    store: &MatchStore,
    new_match: Match,
) -> Result<Match, SyncError> {
    new_match.validate().map_err(ApiError::InvalidPayload)?;
    let pending = store.insert_pending(new_match.clone());

    let result = api.create_match(&new_match).await.and_then(|created| {
        store
            .confirm_pending(pending, created.clone())
            .map(|_| created)
            .ok_or(ApiError::MissingId)
    });

    match result {
        Ok(created) => {
            info!(
                match_id = ?created.id,
                fixture = %created.fixture_label(),
                kickoff = %created.scheduled_at,
                "Match created"
            );
            Ok(created)
        }
        Err(e) => {
            store.discard_pending(pending);
            warn!(key = %pending, error = %e, "Match creation failed");
            Err(e.into())
        }
    }
}

/// Save score/stat edits. Status and start time are kept as stored.
pub async fn edit_match(
    api: &dyn MatchApi,
    store: &MatchStore,
    match_id: u64,
    edit: &MatchEdit,
) -> Result<Match, SyncError> {
    let mut updated = store
        .get(match_id)
        .ok_or(SyncError::UnknownMatch(match_id))?;
    edit.apply_to(&mut updated);

    let saved = api.update_match(match_id, &updated).await.map_err(|e| {
        warn!(match_id, error = %e, "Match edit failed");
        SyncError::from(e)
    })?;
    store.upsert(saved.clone());
    info!(match_id, score1 = saved.score1, score2 = saved.score2, "Match edited");
    Ok(saved)
}

/// Finish a match by hand with the final edits. This is the only way to
/// finish a match that has no duration. A match that never started gets its
/// start time stamped with `now`.
pub async fn finish_match(
    api: &dyn MatchApi,
    store: &MatchStore,
    match_id: u64,
    edit: &MatchEdit,
    now: DateTime<Utc>,
) -> Result<Match, SyncError> {
    let mut updated = store
        .get(match_id)
        .ok_or(SyncError::UnknownMatch(match_id))?;
    if !updated.status.can_advance_to(MatchStatus::Finished) {
        return Err(SyncError::InvalidTransition {
            match_id,
            from: updated.status,
            to: MatchStatus::Finished,
        });
    }

    edit.apply_to(&mut updated);
    updated.status = MatchStatus::Finished;
    updated.started_at.get_or_insert(now);

    let saved = api.update_match(match_id, &updated).await.map_err(|e| {
        warn!(match_id, error = %e, "Manual finish failed");
        SyncError::from(e)
    })?;
    store.upsert(saved.clone());
    info!(match_id, fixture = %saved.fixture_label(), "Match finished manually");
    Ok(saved)
}

/// A fixture to add to a tournament schedule.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub team1: String,
    pub team2: String,
    pub scheduled_at: DateTime<Utc>,
    pub stage: Option<Stage>,
}

pub async fn schedule_tournament_match(
    api: &dyn MatchApi,
    store: &MatchStore,
    tournament: &Tournament,
    fixture: &Fixture,
) -> Result<Match, SyncError> {
    let new_match = Match::tournament_fixture(
        tournament,
        &fixture.team1,
        &fixture.team2,
        fixture.scheduled_at,
        fixture.stage,
    );
    create_match(api, store, new_match).await
}

pub async fn create_tournament(
    api: &dyn MatchApi,
    new: &NewTournament,
) -> Result<Tournament, SyncError> {
    if new.name.trim().is_empty() {
        return Err(ApiError::InvalidPayload("tournament name is required".to_string()).into());
    }
    if new.end_date < new.start_date {
        return Err(ApiError::InvalidPayload("tournament ends before it starts".to_string()).into());
    }
    let created = api.create_tournament(new).await?;
    info!(tournament_id = created.id, name = %created.name, teams = new.teams.len(), "Tournament created");
    Ok(created)
}

/// List tournaments with their matches attached. Match lists are fetched
/// concurrently; a failed fetch leaves that tournament with no matches.
pub async fn load_tournaments(api: &dyn MatchApi) -> Result<Vec<Tournament>, SyncError> {
    let tournaments = api.list_tournaments().await?;

    let fetches = tournaments.into_iter().map(|mut t| async move {
        match api.tournament_matches(t.id).await {
            Ok(matches) => t.matches = Some(matches),
            Err(e) => {
                warn!(tournament_id = t.id, error = %e, "Failed to fetch tournament matches");
                t.matches = Some(Vec::new());
            }
        }
        t
    });

    Ok(join_all(fetches).await)
}
