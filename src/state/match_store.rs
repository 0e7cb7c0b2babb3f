//! Thread-safe in-memory store of matches.
//!
//! Confirmed matches are keyed by their server id; optimistic entries that
//! have not been confirmed yet get a local key and survive reconciliation
//! until they are confirmed or discarded.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::data::models::Match;

/// Store key: the server id once known, a local id before that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKey {
    Confirmed(u64),
    Pending(Uuid),
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed(id) => write!(f, "{id}"),
            Self::Pending(local) => write!(f, "pending:{local}"),
        }
    }
}

/// Result of merging an authoritative snapshot into the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub confirmed: usize,
    pub pending_kept: usize,
    pub dropped_without_id: usize,
    pub duplicate_ids: usize,
}

#[derive(Debug, Default)]
struct Inner {
    matches: HashMap<MatchKey, Match>,
    revision: u64,
}

/// Cloneable handle to the canonical match list.
#[derive(Debug, Clone, Default)]
pub struct MatchStore {
    inner: Arc<RwLock<Inner>>,
}

impl MatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert or replace a match. A record with an id replaces whatever is
    /// stored under that id; a record without one becomes a pending entry.
    pub fn upsert(&self, m: Match) -> MatchKey {
        let key = match m.id {
            Some(id) => MatchKey::Confirmed(id),
            None => MatchKey::Pending(Uuid::new_v4()),
        };
        let mut inner = self.write();
        inner.matches.insert(key, m);
        inner.revision += 1;
        key
    }

    /// Add an optimistic entry that has not been sent yet.
    pub fn insert_pending(&self, mut m: Match) -> MatchKey {
        m.id = None;
        self.upsert(m)
    }

    /// Swap a pending entry for the server-confirmed record. The confirmed
    /// id may already be present if a snapshot taken after the server
    /// committed the create was applied first; the two entries collapse here.
    pub fn confirm_pending(&self, pending: MatchKey, confirmed: Match) -> Option<MatchKey> {
        let id = confirmed.id?;
        let key = MatchKey::Confirmed(id);
        let mut inner = self.write();
        if let MatchKey::Pending(_) = pending {
            inner.matches.remove(&pending);
        }
        if inner.matches.insert(key, confirmed).is_some() {
            debug!(match_id = id, pending = %pending, "Pending entry merged into reconciled record");
        }
        inner.revision += 1;
        Some(key)
    }

    /// Drop a pending entry (its create call failed).
    pub fn discard_pending(&self, pending: MatchKey) -> Option<Match> {
        if !matches!(pending, MatchKey::Pending(_)) {
            return None;
        }
        let mut inner = self.write();
        let removed = inner.matches.remove(&pending);
        if removed.is_some() {
            inner.revision += 1;
        }
        removed
    }

    /// Replace every confirmed entry with the fetched snapshot. Pending
    /// entries are kept. Records in the snapshot without an id are dropped;
    /// a duplicated id keeps the last occurrence.
    ///
    /// A create the server has committed but not yet answered shows up here
    /// as a confirmed record while its pending entry is still held, so the
    /// match is listed twice until `confirm_pending` runs.
    pub fn replace_all(&self, matches: Vec<Match>) -> ReplaceSummary {
        let mut summary = ReplaceSummary::default();
        let mut fresh: HashMap<MatchKey, Match> = HashMap::with_capacity(matches.len());

        for m in matches {
            match m.id {
                Some(id) => {
                    if fresh.insert(MatchKey::Confirmed(id), m).is_some() {
                        summary.duplicate_ids += 1;
                    }
                }
                None => summary.dropped_without_id += 1,
            }
        }

        let mut inner = self.write();
        for (key, m) in inner.matches.drain() {
            if let MatchKey::Pending(_) = key {
                fresh.insert(key, m);
                summary.pending_kept += 1;
            }
        }
        summary.confirmed = fresh.len() - summary.pending_kept;
        inner.matches = fresh;
        inner.revision += 1;
        drop(inner);

        if summary.dropped_without_id > 0 || summary.duplicate_ids > 0 {
            warn!(
                dropped = summary.dropped_without_id,
                duplicates = summary.duplicate_ids,
                "Snapshot contained records without id or with repeated ids"
            );
        }
        debug!(
            confirmed = summary.confirmed,
            pending = summary.pending_kept,
            "Match store replaced from snapshot"
        );
        summary
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get(&self, id: u64) -> Option<Match> {
        self.read().matches.get(&MatchKey::Confirmed(id)).cloned()
    }

    pub fn get_key(&self, key: &MatchKey) -> Option<Match> {
        self.read().matches.get(key).cloned()
    }

    /// All matches ordered by kickoff, then id.
    pub fn all(&self) -> Vec<Match> {
        let mut all: Vec<Match> = self.read().matches.values().cloned().collect();
        all.sort_by(|a, b| {
            a.scheduled_at
                .cmp(&b.scheduled_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        all
    }

    /// Ids of every confirmed match.
    pub fn confirmed_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .read()
            .matches
            .keys()
            .filter_map(|k| match k {
                MatchKey::Confirmed(id) => Some(*id),
                MatchKey::Pending(_) => None,
            })
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.read().matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_count(&self) -> usize {
        self.read()
            .matches
            .keys()
            .filter(|k| matches!(k, MatchKey::Pending(_)))
            .count()
    }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.read().revision
    }
}
