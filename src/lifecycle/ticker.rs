//! Live ticker.
//!
//! One task per displayed match. Every tick it reads the match from the
//! store, asks the resolver for the phase at the current time, publishes
//! what should be shown and fires the transition trigger when a phase change
//! is due. Pausing only freezes the published countdown; transitions still
//! fire on real time, so a paused match finishes when its time is up.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::data::models::{Match, MatchStatus};
use crate::state::match_store::MatchStore;

use super::errors::SyncError;
use super::resolver::{resolve_phase, Transition};
use super::trigger::{TransitionRequest, TransitionTrigger};

/// What the display layer should show for one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerDisplay {
    pub phase: MatchStatus,
    pub remaining_seconds: Option<i64>,
    pub paused: bool,
    /// InProgress without a countdown.
    pub degraded: bool,
}

impl TickerDisplay {
    fn initial(phase: MatchStatus) -> Self {
        Self {
            phase,
            remaining_seconds: None,
            paused: false,
            degraded: false,
        }
    }
}

/// Outcome of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub display: TickerDisplay,
    pub request: Option<TransitionRequest>,
    /// The match is finished and nothing is in flight: stop ticking.
    pub done: bool,
}

// =============================================================================
// Tick bookkeeping
// =============================================================================

/// Per-match state carried between ticks. Holds no I/O so it can be driven
/// directly in tests.
#[derive(Debug, Default)]
pub struct TickerState {
    in_flight: Option<Transition>,
    acknowledged: HashSet<Transition>,
    paused_since: Option<DateTime<Utc>>,
    paused_total: Duration,
    frozen: Option<i64>,
    last_shown: Option<i64>,
}

impl TickerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_since.is_some()
    }

    pub fn in_flight(&self) -> Option<Transition> {
        self.in_flight
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.paused_since.is_none() {
            self.paused_since = Some(now);
            self.frozen = self.last_shown;
        }
    }

    /// The countdown picks up from the frozen value, so the display lags
    /// real time by however long it was paused.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Some(since) = self.paused_since.take() {
            self.paused_total += now - since;
            self.frozen = None;
        }
    }

    pub fn evaluate(&mut self, m: &Match, now: DateTime<Utc>) -> TickOutcome {
        let resolution = resolve_phase(m, now);

        // Paused before any countdown was shown: freeze the first one and
        // count the pause from here so resume continues from that value.
        if let (Some(real), None, Some(_)) =
            (resolution.remaining_seconds, self.frozen, self.paused_since)
        {
            self.frozen = Some(real);
            self.paused_since = Some(now);
        }

        let shown = match resolution.remaining_seconds {
            None => None,
            Some(real) if self.is_paused() => Some(self.frozen.unwrap_or(real)),
            Some(0) => Some(0),
            Some(real) => Some(real + self.paused_total.num_seconds()),
        };
        if !self.is_paused() {
            self.last_shown = shown;
        }

        let request = match (resolution.transition, m.id) {
            (Some(t), Some(id)) if self.in_flight.is_none() && !self.acknowledged.contains(&t) => {
                self.in_flight = Some(t);
                Some(match t {
                    Transition::ToInProgress => TransitionRequest::start(id, now),
                    Transition::ToFinished => TransitionRequest::finish(id),
                })
            }
            _ => None,
        };

        TickOutcome {
            display: TickerDisplay {
                phase: resolution.phase,
                remaining_seconds: shown,
                paused: self.is_paused(),
                degraded: resolution.is_degraded(),
            },
            request,
            done: resolution.phase == MatchStatus::Finished && self.in_flight.is_none(),
        }
    }

    /// Record the result of the write started for `transition`. A failure
    /// clears the in-flight flag so the next tick retries.
    pub fn complete_write(&mut self, transition: Transition, persisted: bool) {
        if self.in_flight == Some(transition) {
            self.in_flight = None;
        }
        if persisted {
            self.acknowledged.insert(transition);
        }
    }
}

// =============================================================================
// Ticker task
// =============================================================================

pub struct LiveTicker {
    match_id: u64,
    store: MatchStore,
    trigger: TransitionTrigger,
    clock: Arc<dyn Clock>,
    tick_every: std::time::Duration,
}

impl LiveTicker {
    pub fn new(
        match_id: u64,
        store: MatchStore,
        trigger: TransitionTrigger,
        clock: Arc<dyn Clock>,
        tick_every: std::time::Duration,
    ) -> Self {
        Self {
            match_id,
            store,
            trigger,
            clock,
            tick_every,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> TickerHandle {
        let phase = self
            .store
            .get(self.match_id)
            .map(|m| m.status)
            .unwrap_or_default();
        let (display_tx, display_rx) = watch::channel(TickerDisplay::initial(phase));
        let (paused_tx, paused_rx) = watch::channel(false);
        let match_id = self.match_id;
        let task = tokio::spawn(self.run(display_tx, paused_rx, cancel.clone()));

        TickerHandle {
            match_id,
            paused: paused_tx,
            display: display_rx,
            cancel,
            task,
        }
    }

    async fn run(
        self,
        display_tx: watch::Sender<TickerDisplay>,
        mut paused_rx: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) {
        let id = self.match_id;
        let mut state = TickerState::new();
        let mut write: Option<JoinHandle<(Transition, bool)>> = None;
        let mut interval = tokio::time::interval(self.tick_every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(match_id = id, "Ticker started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(match_id = id, "Ticker cancelled");
                    break;
                }
                changed = paused_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now = self.clock.now();
                    if *paused_rx.borrow_and_update() {
                        state.pause(now);
                    } else {
                        state.resume(now);
                    }
                    display_tx.send_modify(|d| d.paused = state.is_paused());
                }
                Some(joined) = async {
                    match write.as_mut() {
                        Some(handle) => Some(handle.await),
                        None => None,
                    }
                }, if write.is_some() => {
                    write = None;
                    match joined {
                        Ok((transition, persisted)) => state.complete_write(transition, persisted),
                        Err(e) => {
                            warn!(match_id = id, error = %e, "Transition task aborted");
                            if let Some(transition) = state.in_flight() {
                                state.complete_write(transition, false);
                            }
                        }
                    }
                }
                _ = interval.tick() => {
                    let Some(m) = self.store.get(id) else {
                        info!(match_id = id, "Match no longer in store, ticker stopping");
                        break;
                    };
                    let outcome = state.evaluate(&m, self.clock.now());
                    display_tx.send_replace(outcome.display);

                    if let Some(request) = outcome.request {
                        let trigger = self.trigger.clone();
                        write = Some(tokio::spawn(async move {
                            let persisted = write_persisted(trigger.fire(request).await);
                            (request.transition, persisted)
                        }));
                    }

                    if outcome.done {
                        debug!(match_id = id, "Match finished, ticker stopping");
                        break;
                    }
                }
            }
        }
    }
}

/// Whether a trigger call persisted its transition. Write failures are
/// already logged by the trigger; local rejections are logged here.
fn write_persisted(result: Result<(), SyncError>) -> bool {
    match result {
        Ok(()) => true,
        Err(SyncError::TransitionWrite { .. }) => false,
        Err(e) => {
            warn!(error = %e, "Transition rejected before reaching the store");
            false
        }
    }
}

/// Owned handle to a running ticker.
#[derive(Debug)]
pub struct TickerHandle {
    match_id: u64,
    paused: watch::Sender<bool>,
    display: watch::Receiver<TickerDisplay>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TickerHandle {
    pub fn match_id(&self) -> u64 {
        self.match_id
    }

    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Flip the pause flag; returns the new value.
    pub fn toggle_pause(&self) -> bool {
        self.paused.send_modify(|p| *p = !*p);
        *self.paused.borrow()
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    pub fn display(&self) -> TickerDisplay {
        *self.display.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TickerDisplay> {
        self.display.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the ticker task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(match_id = self.match_id, error = %e, "Ticker task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, h, m, s).unwrap()
    }

    fn in_progress(duration: Option<u32>) -> Match {
        let mut m = Match::friendly("A", "B", at(9, 0, 0), "", duration, None);
        m.id = Some(1);
        m.status = MatchStatus::InProgress;
        m.started_at = Some(at(9, 0, 0));
        m
    }

    #[test]
    fn test_single_request_while_in_flight() {
        let mut m = in_progress(Some(90));
        m.status = MatchStatus::Upcoming;
        m.started_at = None;
        let mut state = TickerState::new();

        let first = state.evaluate(&m, at(9, 0, 0));
        assert_eq!(first.request, Some(TransitionRequest::start(1, at(9, 0, 0))));
        assert!(state.evaluate(&m, at(9, 0, 1)).request.is_none());
        assert!(state.evaluate(&m, at(9, 0, 2)).request.is_none());
    }

    #[test]
    fn test_failed_write_retries_next_tick() {
        let mut m = in_progress(Some(90));
        m.status = MatchStatus::Upcoming;
        m.started_at = None;
        let mut state = TickerState::new();

        state.evaluate(&m, at(9, 0, 0));
        state.complete_write(Transition::ToInProgress, false);
        let retry = state.evaluate(&m, at(9, 0, 1));
        assert_eq!(retry.request, Some(TransitionRequest::start(1, at(9, 0, 1))));
    }

    #[test]
    fn test_acknowledged_transition_not_refired_on_stale_snapshot() {
        let mut m = in_progress(Some(90));
        m.status = MatchStatus::Upcoming;
        m.started_at = None;
        let mut state = TickerState::new();

        state.evaluate(&m, at(9, 0, 0));
        state.complete_write(Transition::ToInProgress, true);
        // A stale snapshot still shows the match as upcoming.
        assert!(state.evaluate(&m, at(9, 0, 1)).request.is_none());
    }

    #[test]
    fn test_unconfirmed_match_never_requests() {
        let mut m = in_progress(Some(1));
        m.id = None;
        let mut state = TickerState::new();
        let outcome = state.evaluate(&m, at(12, 0, 0));
        assert!(outcome.request.is_none());
        assert_eq!(state.in_flight(), None);
    }

    #[test]
    fn test_pause_freezes_display_but_not_finish() {
        let m = in_progress(Some(1));
        let mut state = TickerState::new();

        assert_eq!(state.evaluate(&m, at(9, 0, 10)).display.remaining_seconds, Some(50));
        state.pause(at(9, 0, 10));

        let paused = state.evaluate(&m, at(9, 0, 40));
        assert_eq!(paused.display.remaining_seconds, Some(50));
        assert!(paused.display.paused);
        assert!(paused.request.is_none());

        let expired = state.evaluate(&m, at(9, 1, 0));
        assert_eq!(expired.display.remaining_seconds, Some(50));
        assert_eq!(expired.request, Some(TransitionRequest::finish(1)));
    }

    #[test]
    fn test_resume_continues_from_frozen_value() {
        let m = in_progress(Some(10));
        let mut state = TickerState::new();

        state.evaluate(&m, at(9, 0, 0));
        state.evaluate(&m, at(9, 1, 0));
        state.pause(at(9, 1, 0));
        state.resume(at(9, 1, 30));

        // Real remaining is 8:30; the display lost the 30 s spent paused.
        let shown = state.evaluate(&m, at(9, 1, 30)).display.remaining_seconds;
        assert_eq!(shown, Some(540));
        let later = state.evaluate(&m, at(9, 1, 31)).display.remaining_seconds;
        assert_eq!(later, Some(539));
    }

    #[test]
    fn test_pause_before_kickoff_freezes_first_countdown() {
        let mut m = in_progress(Some(90));
        m.status = MatchStatus::Upcoming;
        m.started_at = None;
        let mut state = TickerState::new();

        assert_eq!(state.evaluate(&m, at(8, 59, 0)).display.remaining_seconds, None);
        state.pause(at(8, 59, 0));

        m.status = MatchStatus::InProgress;
        m.started_at = Some(at(9, 0, 0));
        let first = state.evaluate(&m, at(9, 0, 10));
        assert!(first.display.paused);
        assert_eq!(first.display.remaining_seconds, Some(5390));
        let later = state.evaluate(&m, at(9, 0, 40));
        assert_eq!(later.display.remaining_seconds, Some(5390));

        state.resume(at(9, 1, 0));
        let resumed = state.evaluate(&m, at(9, 1, 0));
        assert_eq!(resumed.display.remaining_seconds, Some(5390));
        assert_eq!(state.evaluate(&m, at(9, 1, 1)).display.remaining_seconds, Some(5389));
    }

    #[test]
    fn test_local_rejection_is_not_persisted() {
        assert!(write_persisted(Ok(())));
        assert!(!write_persisted(Err(SyncError::UnknownMatch(3))));
        assert!(!write_persisted(Err(SyncError::InvalidTransition {
            match_id: 3,
            from: MatchStatus::Finished,
            to: MatchStatus::InProgress,
        })));
    }

    #[test]
    fn test_degraded_match_shows_no_countdown() {
        let m = in_progress(None);
        let mut state = TickerState::new();
        let outcome = state.evaluate(&m, at(23, 0, 0));
        assert!(outcome.display.degraded);
        assert_eq!(outcome.display.remaining_seconds, None);
        assert!(outcome.request.is_none());
        assert!(!outcome.done);
    }

    #[test]
    fn test_finished_is_done_once_nothing_in_flight() {
        let mut m = in_progress(Some(90));
        let mut state = TickerState::new();
        assert!(state.evaluate(&m, at(10, 30, 0)).request.is_some());

        m.status = MatchStatus::Finished;
        assert!(!state.evaluate(&m, at(10, 30, 1)).done);
        state.complete_write(Transition::ToFinished, true);
        assert!(state.evaluate(&m, at(10, 30, 2)).done);
    }
}
