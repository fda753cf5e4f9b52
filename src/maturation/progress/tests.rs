use super::*;

fn store_with_run(cap: usize) -> Arc<ProgressStore> {
    let store = Arc::new(ProgressStore::new(cap));
    store.init("run-1", &RunSettings::default());
    store
}

#[test]
fn test_unknown_run_has_no_snapshot() {
    let store = ProgressStore::new(10);
    assert!(store.get("missing").is_none());
}

#[test]
fn test_init_reports_full_duration() {
    let store = store_with_run(10);
    let snapshot = store.get("run-1").unwrap();
    assert_eq!(snapshot.status, RunStatus::Created);
    assert_eq!(snapshot.remaining_ms, 30 * 60 * 1000);
    assert!(snapshot.log.is_empty());
    assert!(snapshot.finished_at.is_none());
}

#[test]
fn test_log_is_capped_oldest_first() {
    let store = store_with_run(3);
    let mut reporter = ProgressReporter::new("run-1", store.clone());
    for i in 0..5 {
        reporter.info(format!("entry {}", i));
    }
    let log = store.get("run-1").unwrap().log;
    let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
}

#[test]
fn test_reporter_levels_recorded() {
    let store = store_with_run(10);
    let mut reporter = ProgressReporter::new("run-1", store.clone());
    reporter.info("a");
    reporter.warn("b");
    reporter.error("c");
    let levels: Vec<_> = store
        .get("run-1")
        .unwrap()
        .log
        .iter()
        .map(|e| e.level)
        .collect();
    assert_eq!(levels, vec![LogLevel::Info, LogLevel::Warn, LogLevel::Error]);
}

#[test]
fn test_stats_and_pair_published() {
    let store = store_with_run(10);
    let mut reporter = ProgressReporter::new("run-1", store.clone());
    reporter.set_status(RunStatus::Running);
    reporter.set_active_pairs(3);
    reporter.record_message();
    reporter.record_message();
    reporter.record_conversation();
    reporter.set_pair("Alice", "Bob");

    let snapshot = store.get("run-1").unwrap();
    assert_eq!(snapshot.status, RunStatus::Running);
    assert_eq!(snapshot.stats.total_messages, 2);
    assert_eq!(snapshot.stats.active_pairs, 3);
    assert_eq!(snapshot.stats.conversations_completed, 1);
    assert_eq!(
        snapshot.current_pair,
        Some(CurrentPair {
            from: "Alice".into(),
            to: "Bob".into()
        })
    );

    reporter.clear_pair();
    assert!(store.get("run-1").unwrap().current_pair.is_none());
}

#[test]
fn test_finish_is_sticky() {
    let store = store_with_run(10);
    let mut reporter = ProgressReporter::new("run-1", store.clone());
    reporter.set_status(RunStatus::Running);
    reporter.record_message();
    store.finish(
        "run-1",
        RunStatus::Stopped,
        LogEntry::new(LogLevel::Info, "stopped"),
    );
    reporter.set_status(RunStatus::Sending);

    let snapshot = store.get("run-1").unwrap();
    assert_eq!(snapshot.status, RunStatus::Stopped);
    assert_eq!(snapshot.remaining_ms, 0);
    assert_eq!(snapshot.stats.total_messages, 1);
    assert!(snapshot.finished_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_remaining_time_follows_deadline() {
    let store = store_with_run(10);
    let mut reporter = ProgressReporter::new("run-1", store.clone());
    reporter.set_deadline(Instant::now() + Duration::from_secs(100));
    tokio::time::sleep(Duration::from_secs(40)).await;
    reporter.info("tick");
    assert_eq!(store.get("run-1").unwrap().remaining_ms, 60_000);
}

#[tokio::test(start_paused = true)]
async fn test_prune_only_drops_expired_finished_runs() {
    let store = ProgressStore::new(10);
    store.init("live", &RunSettings::default());
    store.init("done", &RunSettings::default());
    store.finish("done", RunStatus::Finished, LogEntry::new(LogLevel::Info, "ok"));

    assert_eq!(store.prune(Duration::from_secs(60)), 0);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(store.prune(Duration::from_secs(60)), 1);
    assert!(store.get("live").is_some());
    assert!(store.get("done").is_none());
}

#[test]
fn test_next_message_at_is_in_future() {
    let store = store_with_run(10);
    let mut reporter = ProgressReporter::new("run-1", store.clone());
    reporter.expect_next_message_in(Duration::from_secs(30));
    let at = store.get("run-1").unwrap().next_message_at.unwrap();
    assert!(at > Utc::now());
}

#[test]
fn test_snapshot_serializes_camel_case() {
    let store = store_with_run(10);
    let json = serde_json::to_value(store.get("run-1").unwrap()).unwrap();
    assert_eq!(json["runId"], "run-1");
    assert_eq!(json["status"], "created");
    assert!(json.get("remainingMs").is_some());
    assert_eq!(json["config"]["numberOfRounds"], 1);
}
