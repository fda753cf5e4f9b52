use super::*;
use crate::content::fallback;
use crate::maturation::progress::{ProgressReporter, ProgressSink, ProgressStore};
use crate::maturation::registry::StopSignal;
use crate::maturation::script::ConversationHistory;
use crate::maturation::testing::{MockGenerator, MockProvider, dispatcher_with, endpoint};
use crate::maturation::throttle::PhoneThrottle;
use std::sync::Arc;

fn scheduler(provider: Arc<MockProvider>) -> RoundScheduler {
    let engine = ScriptEngine::new(
        Arc::new(MockGenerator { fail: false }),
        dispatcher_with("srv", provider),
        0,
        0,
    );
    RoundScheduler::new(engine, 5, 5, Duration::from_secs(5))
}

fn context(store: Arc<ProgressStore>, settings: &RunSettings) -> RunContext {
    store.init("run", settings);
    RunContext {
        topic: fallback::random_topic(),
        templates: Vec::new(),
        history: ConversationHistory::new(),
        throttle: PhoneThrottle::new(1, 1, 0),
        reporter: ProgressReporter::new("run", store),
        stop: StopSignal::new(),
    }
}

fn three_endpoints() -> Vec<Endpoint> {
    vec![
        endpoint("srv", "a", "5511999990001"),
        endpoint("srv", "b", "5511999990002"),
        endpoint("srv", "c", "5511999990003"),
    ]
}

fn settings(rounds: u32, minutes: u64, pause: u64) -> RunSettings {
    RunSettings {
        number_of_rounds: rounds,
        minutes_per_round: minutes,
        pause_minutes_between_rounds: pause,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_two_rounds_take_about_three_minutes() {
    let provider = Arc::new(MockProvider::default());
    let store = Arc::new(ProgressStore::new(1000));
    let settings = settings(2, 1, 1);
    let mut ctx = context(store.clone(), &settings);

    let start = Instant::now();
    let outcome = scheduler(provider.clone())
        .run(&three_endpoints(), &settings, &mut ctx)
        .await;
    let elapsed = start.elapsed();

    assert_eq!(outcome, ScheduleOutcome::Finished);
    assert!(elapsed >= Duration::from_secs(180), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(195), "{:?}", elapsed);

    let snapshot = store.get("run").unwrap();
    assert_eq!(snapshot.stats.active_pairs, 3);
    assert!(snapshot.stats.conversations_completed >= 3);
    assert_eq!(
        snapshot.stats.total_messages,
        snapshot.stats.conversations_completed * 5
    );
    assert_eq!(provider.sent().len() as u64, snapshot.stats.total_messages);
}

#[tokio::test(start_paused = true)]
async fn test_no_sends_during_pause() {
    let provider = Arc::new(MockProvider::default());
    let settings = settings(2, 1, 1);
    let mut ctx = context(Arc::new(ProgressStore::new(1000)), &settings);

    let start = Instant::now();
    scheduler(provider.clone())
        .run(&three_endpoints(), &settings, &mut ctx)
        .await;

    let offsets: Vec<_> = provider.sent().iter().map(|m| m.at - start).collect();
    let last_round_one = offsets
        .iter()
        .filter(|d| **d < Duration::from_secs(90))
        .max()
        .copied()
        .unwrap();
    let first_round_two = offsets
        .iter()
        .filter(|d| **d >= Duration::from_secs(90))
        .min()
        .copied()
        .unwrap();
    assert!(first_round_two - last_round_one >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_stop_mid_round() {
    let provider = Arc::new(MockProvider::default());
    let settings = settings(1, 10, 0);
    let mut ctx = context(Arc::new(ProgressStore::new(1000)), &settings);
    let stop = ctx.stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        stop.request();
    });

    let start = Instant::now();
    let outcome = scheduler(provider.clone())
        .run(&three_endpoints(), &settings, &mut ctx)
        .await;

    assert_eq!(outcome, ScheduleOutcome::Stopped);
    assert!(start.elapsed() < Duration::from_secs(40));
    assert!(
        provider
            .sent()
            .iter()
            .all(|m| m.at - start <= Duration::from_secs(31))
    );
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_pause_lands_within_poll() {
    let provider = Arc::new(MockProvider::default());
    let settings = settings(2, 1, 30);
    let mut ctx = context(Arc::new(ProgressStore::new(1000)), &settings);
    let stop = ctx.stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(120)).await;
        stop.request();
    });

    let start = Instant::now();
    let outcome = scheduler(provider)
        .run(&three_endpoints(), &settings, &mut ctx)
        .await;
    assert_eq!(outcome, ScheduleOutcome::Stopped);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(120));
    assert!(elapsed <= Duration::from_secs(125));
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_start_sends_nothing() {
    let provider = Arc::new(MockProvider::default());
    let settings = settings(1, 1, 0);
    let mut ctx = context(Arc::new(ProgressStore::new(1000)), &settings);
    ctx.stop.request();

    let outcome = scheduler(provider.clone())
        .run(&three_endpoints(), &settings, &mut ctx)
        .await;
    assert_eq!(outcome, ScheduleOutcome::Stopped);
    assert!(provider.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_each_pair_slot_runs_once_per_cycle() {
    let provider = Arc::new(MockProvider::default());
    let settings = RunSettings {
        cadence_seconds: 600,
        ..settings(1, 1, 0)
    };
    let mut ctx = context(Arc::new(ProgressStore::new(1000)), &settings);

    scheduler(provider.clone())
        .run(&three_endpoints(), &settings, &mut ctx)
        .await;

    // The cadence pushes the second cycle past the round deadline
    let openers: Vec<_> = provider
        .sent()
        .chunks(5)
        .map(|c| {
            let mut pair = [c[0].session.clone(), c[1].session.clone()];
            pair.sort();
            pair
        })
        .collect();
    assert_eq!(openers.len(), 3);
    let mut unique = openers.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 3);
}

#[test]
fn test_cycle_delay_bounds() {
    let scheduler = RoundScheduler::new(
        ScriptEngine::new(
            Arc::new(MockGenerator { fail: true }),
            dispatcher_with("srv", Arc::new(MockProvider::default())),
            0,
            0,
        ),
        5,
        20,
        Duration::from_secs(5),
    );
    for _ in 0..50 {
        let d = scheduler.cycle_delay(0);
        assert!(d >= Duration::from_secs(5) && d <= Duration::from_secs(20));
        assert_eq!(scheduler.cycle_delay(45), Duration::from_secs(45));
    }
}

#[test]
fn test_outcome_status() {
    assert_eq!(ScheduleOutcome::Finished.status(), RunStatus::Finished);
    assert_eq!(ScheduleOutcome::Stopped.status(), RunStatus::Stopped);
}
