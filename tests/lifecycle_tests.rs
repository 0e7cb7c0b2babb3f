//! End-to-end lifecycle tests: tickers, trigger, scheduler and reconciler
//! running against the in-memory collaborator with paused tokio time and a
//! hand-driven wall clock.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use match_dashboard::api::memory::InMemoryMatchApi;
use match_dashboard::clock::ManualClock;
use match_dashboard::data::models::{Match, MatchStatus};
use match_dashboard::data::reconciler::{Reconciler, ReconcilerConfig};
use match_dashboard::lifecycle::actions::create_match;
use match_dashboard::lifecycle::resolver::Transition;
use match_dashboard::lifecycle::scheduler::TickerScheduler;
use match_dashboard::lifecycle::trigger::TransitionTrigger;
use match_dashboard::state::match_store::MatchStore;

const TICK: Duration = Duration::from_secs(1);

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, h, m, s).unwrap()
}

fn upcoming(kickoff: DateTime<Utc>) -> Match {
    Match::friendly("Spartak", "Zenit", kickoff, "Luzhniki", Some(90), None)
}

fn live(started: DateTime<Utc>, duration: Option<u32>) -> Match {
    let mut m = Match::friendly("Spartak", "Zenit", started, "Luzhniki", duration, None);
    m.status = MatchStatus::InProgress;
    m.started_at = Some(started);
    m
}

struct Harness {
    api: Arc<InMemoryMatchApi>,
    store: MatchStore,
    clock: ManualClock,
    trigger: TransitionTrigger,
    scheduler: TickerScheduler,
}

impl Harness {
    async fn new(matches: Vec<Match>, now: DateTime<Utc>) -> Self {
        let api = Arc::new(InMemoryMatchApi::with_matches(matches));
        let store = MatchStore::new();
        let reconciler = Reconciler::new(api.clone(), store.clone(), ReconcilerConfig::default());
        reconciler.poll_once().await.unwrap();

        let clock = ManualClock::new(now);
        let trigger = TransitionTrigger::new(api.clone(), store.clone());
        let scheduler =
            TickerScheduler::new(store.clone(), trigger.clone(), Arc::new(clock.clone()), TICK);
        Self {
            api,
            store,
            clock,
            trigger,
            scheduler,
        }
    }
}

async fn wait(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_upcoming_match_starts_at_kickoff() {
    let kickoff = at(15, 0, 0);
    let mut h = Harness::new(vec![upcoming(kickoff)], at(14, 59, 55)).await;
    let mut events = h.trigger.subscribe();

    assert!(h.scheduler.show(1));
    wait(1_500).await;
    assert_eq!(h.store.get(1).unwrap().status, MatchStatus::Upcoming);
    assert_eq!(h.api.update_calls(), 0);

    h.clock.set(at(15, 0, 2));
    wait(1_000).await;

    let stored = h.store.get(1).unwrap();
    assert_eq!(stored.status, MatchStatus::InProgress);
    assert_eq!(stored.started_at, Some(at(15, 0, 2)));
    assert_eq!(h.api.get(1).unwrap().status, MatchStatus::InProgress);
    assert_eq!(h.api.update_calls(), 1);

    let event = events.try_recv().unwrap();
    assert_eq!(event.match_id, 1);
    assert_eq!(event.transition, Transition::ToInProgress);

    // The ticker keeps running with a countdown.
    wait(1_000).await;
    let display = h.scheduler.display(1).unwrap();
    assert_eq!(display.phase, MatchStatus::InProgress);
    assert_eq!(display.remaining_seconds, Some(90 * 60));
    assert_eq!(h.scheduler.running(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_expired_match_finishes_and_ticker_stops() {
    let mut h = Harness::new(vec![live(at(9, 0, 0), Some(90))], at(10, 30, 1)).await;

    assert!(h.scheduler.show(1));
    wait(1_500).await;

    assert_eq!(h.store.get(1).unwrap().status, MatchStatus::Finished);
    assert_eq!(h.api.update_calls(), 1);
    assert!(h.scheduler.running().is_empty());
    assert_eq!(h.scheduler.prune_finished(), 1);

    // Finished matches never get a ticker again.
    assert!(!h.scheduler.show(1));
}

#[tokio::test(start_paused = true)]
async fn test_match_without_duration_never_auto_finishes() {
    let mut h = Harness::new(vec![live(at(9, 0, 0), None)], at(9, 0, 0)).await;

    assert!(h.scheduler.show(1));
    h.clock.set(at(23, 0, 0));
    wait(10_000).await;

    let display = h.scheduler.display(1).unwrap();
    assert!(display.degraded);
    assert_eq!(display.remaining_seconds, None);
    assert_eq!(h.store.get(1).unwrap().status, MatchStatus::InProgress);
    assert_eq!(h.api.update_calls(), 0);
    assert_eq!(h.scheduler.running(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_writes_retry_on_following_ticks() {
    let mut h = Harness::new(vec![live(at(9, 0, 0), Some(90))], at(10, 31, 0)).await;
    h.api.fail_next_writes(2);

    h.scheduler.show(1);
    wait(500).await;
    assert_eq!(h.api.update_calls(), 1);
    assert_eq!(h.store.get(1).unwrap().status, MatchStatus::InProgress);

    wait(2_000).await;
    assert_eq!(h.api.update_calls(), 3);
    assert_eq!(h.store.get(1).unwrap().status, MatchStatus::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_single_write_while_one_is_in_flight() {
    let mut h = Harness::new(vec![live(at(9, 0, 0), Some(90))], at(10, 31, 0)).await;
    h.api.set_write_latency(Duration::from_millis(3_500));

    h.scheduler.show(1);
    wait(2_500).await;
    assert_eq!(h.api.update_calls(), 1);
    assert_eq!(h.store.get(1).unwrap().status, MatchStatus::InProgress);

    wait(2_000).await;
    assert_eq!(h.api.update_calls(), 1);
    assert_eq!(h.store.get(1).unwrap().status, MatchStatus::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_countdown_but_match_still_finishes() {
    let mut h = Harness::new(vec![live(at(9, 0, 0), Some(1))], at(9, 0, 10)).await;

    h.scheduler.show(1);
    wait(500).await;
    assert_eq!(h.scheduler.display(1).unwrap().remaining_seconds, Some(50));

    assert_eq!(h.scheduler.toggle_pause(1), Some(true));
    h.clock.set(at(9, 0, 30));
    wait(1_000).await;
    let display = h.scheduler.display(1).unwrap();
    assert!(display.paused);
    assert_eq!(display.remaining_seconds, Some(50));

    h.clock.set(at(9, 1, 0));
    wait(1_000).await;
    assert_eq!(h.store.get(1).unwrap().status, MatchStatus::Finished);
    assert_eq!(h.api.update_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hidden_match_is_not_transitioned() {
    let kickoff = at(15, 0, 0);
    let mut h = Harness::new(vec![upcoming(kickoff)], at(14, 59, 0)).await;

    h.scheduler.show(1);
    wait(500).await;
    assert!(h.scheduler.hide(1));
    assert!(h.scheduler.running().is_empty());

    h.clock.set(at(15, 5, 0));
    wait(5_000).await;
    assert_eq!(h.api.update_calls(), 0);
    assert_eq!(h.store.get(1).unwrap().status, MatchStatus::Upcoming);
}

#[tokio::test(start_paused = true)]
async fn test_sync_visible_and_shutdown() {
    let mut h = Harness::new(
        vec![
            upcoming(at(15, 0, 0)),
            upcoming(at(18, 0, 0)),
            live(at(12, 0, 0), Some(90)),
        ],
        at(12, 30, 0),
    )
    .await;

    h.scheduler.sync_visible(&[1, 2, 3]);
    wait(500).await;
    assert_eq!(h.scheduler.running(), vec![1, 2, 3]);

    h.scheduler.sync_visible(&[3]);
    assert_eq!(h.scheduler.running(), vec![3]);
    assert_eq!(h.scheduler.log_running(), 1);
    let shown = h.scheduler.display(3).unwrap();
    assert_eq!(shown.phase, MatchStatus::InProgress);
    assert_eq!(shown.remaining_seconds, Some(60 * 60));

    h.scheduler.shutdown().await;
    assert!(h.scheduler.running().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reconciliation_applies_latest_snapshot() {
    let api = Arc::new(InMemoryMatchApi::with_matches(vec![live(at(9, 0, 0), Some(90))]));
    let store = MatchStore::new();
    let shutdown = CancellationToken::new();
    let task = Reconciler::new(api.clone(), store.clone(), ReconcilerConfig::default())
        .spawn(shutdown.clone());

    wait(5_100).await;
    assert_eq!(store.get(1).unwrap().score1, 0);

    let mut scored = api.get(1).unwrap();
    scored.score1 = 2;
    api.put_external(scored.clone());

    wait(5_000).await;
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(1).unwrap(), scored);

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reconciliation_keeps_optimistic_entry() {
    let api = Arc::new(InMemoryMatchApi::new());
    api.set_write_latency(Duration::from_secs(2));
    let store = MatchStore::new();
    let reconciler = Reconciler::new(api.clone(), store.clone(), ReconcilerConfig::default());

    let create = create_match(api.as_ref(), &store, upcoming(at(15, 0, 0)));
    let reconcile = async {
        wait(500).await;
        reconciler.poll_once().await.unwrap();
        assert_eq!(store.pending_count(), 1);
        assert_eq!(store.len(), 1);
    };
    let (created, ()) = tokio::join!(create, reconcile);

    let created = created.unwrap();
    assert_eq!(store.pending_count(), 0);
    assert_eq!(store.get(created.id.unwrap()).unwrap(), created);
}
