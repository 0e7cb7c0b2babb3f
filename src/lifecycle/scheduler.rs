//! Owns the running tickers.
//!
//! A ticker runs for each match in view that is still upcoming or in
//! progress. Every ticker is a child of the scheduler's root token, so
//! shutting the scheduler down stops them all.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::data::views::format_countdown;
use crate::state::match_store::MatchStore;

use super::ticker::{LiveTicker, TickerDisplay, TickerHandle};
use super::trigger::TransitionTrigger;

pub struct TickerScheduler {
    store: MatchStore,
    trigger: TransitionTrigger,
    clock: Arc<dyn Clock>,
    tick_every: Duration,
    root: CancellationToken,
    tickers: HashMap<u64, TickerHandle>,
}

impl TickerScheduler {
    pub fn new(
        store: MatchStore,
        trigger: TransitionTrigger,
        clock: Arc<dyn Clock>,
        tick_every: Duration,
    ) -> Self {
        Self {
            store,
            trigger,
            clock,
            tick_every,
            root: CancellationToken::new(),
            tickers: HashMap::new(),
        }
    }

    /// Put a match in view. Returns whether a ticker is running for it.
    pub fn show(&mut self, match_id: u64) -> bool {
        if let Some(handle) = self.tickers.get(&match_id) {
            if !handle.is_finished() {
                return true;
            }
            self.tickers.remove(&match_id);
        }

        let Some(m) = self.store.get(match_id) else {
            debug!(match_id, "Cannot show unknown match");
            return false;
        };
        if !m.status.is_live_relevant() {
            return false;
        }

        let ticker = LiveTicker::new(
            match_id,
            self.store.clone(),
            self.trigger.clone(),
            self.clock.clone(),
            self.tick_every,
        );
        let handle = ticker.spawn(self.root.child_token());
        self.tickers.insert(match_id, handle);
        debug!(match_id, fixture = %m.fixture_label(), "Ticker scheduled");
        true
    }

    /// Take a match out of view, stopping its ticker.
    pub fn hide(&mut self, match_id: u64) -> bool {
        match self.tickers.remove(&match_id) {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Make exactly `visible` the set of matches in view.
    pub fn sync_visible(&mut self, visible: &[u64]) {
        let wanted: HashSet<u64> = visible.iter().copied().collect();
        let stale: Vec<u64> = self
            .tickers
            .keys()
            .filter(|id| !wanted.contains(id))
            .copied()
            .collect();
        for id in stale {
            self.hide(id);
        }
        for id in visible {
            self.show(*id);
        }
    }

    /// Toggle the pause flag of a running ticker; returns the new value.
    pub fn toggle_pause(&self, match_id: u64) -> Option<bool> {
        self.tickers.get(&match_id).map(TickerHandle::toggle_pause)
    }

    pub fn display(&self, match_id: u64) -> Option<TickerDisplay> {
        self.tickers.get(&match_id).map(TickerHandle::display)
    }

    pub fn handle(&self, match_id: u64) -> Option<&TickerHandle> {
        self.tickers.get(&match_id)
    }

    /// Forget tickers whose task has exited. Returns how many were removed.
    pub fn prune_finished(&mut self) -> usize {
        let before = self.tickers.len();
        self.tickers.retain(|_, handle| !handle.is_finished());
        before - self.tickers.len()
    }

    /// Ids with a live ticker, ascending.
    pub fn running(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .tickers
            .iter()
            .filter(|(_, h)| !h.is_finished())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Log one status line per running ticker. Returns how many were logged.
    pub fn log_running(&self) -> usize {
        let mut logged = 0;
        for id in self.running() {
            let Some(shown) = self.display(id) else {
                continue;
            };
            info!(
                match_id = id,
                phase = %shown.phase,
                remaining = %shown.remaining_seconds.map(format_countdown).unwrap_or_default(),
                paused = shown.paused,
                degraded = shown.degraded,
                "Live match"
            );
            logged += 1;
        }
        logged
    }

    /// Cancel every ticker and wait for them to exit.
    pub async fn shutdown(&mut self) {
        self.root.cancel();
        let count = self.tickers.len();
        for (_, handle) in self.tickers.drain() {
            handle.join().await;
        }
        info!(tickers = count, "Ticker scheduler stopped");
    }
}
