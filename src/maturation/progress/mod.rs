//! Live run progress.
//!
//! The run task owns a [`ProgressReporter`] and pushes merged updates into a
//! [`ProgressSink`]. Observers poll the sink ([`ProgressStore`]) by run id.

use super::types::{RunSettings, RunStats, RunStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentPair {
    pub from: String,
    pub to: String,
}

/// One push from a run: its current state plus at most one new log line.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub status: RunStatus,
    pub current_pair: Option<CurrentPair>,
    pub remaining_ms: u64,
    pub next_message_at: Option<DateTime<Utc>>,
    pub stats: RunStats,
    pub entry: Option<LogEntry>,
}

/// Latest merged view of a run, as returned to observers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub run_id: String,
    pub status: RunStatus,
    pub current_pair: Option<CurrentPair>,
    pub remaining_ms: u64,
    pub next_message_at: Option<DateTime<Utc>>,
    pub stats: RunStats,
    pub log: Vec<LogEntry>,
    pub config: RunSettings,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Destination for progress pushes.
pub trait ProgressSink: Send + Sync {
    /// Register a run before its first update.
    fn init(&self, run_id: &str, settings: &RunSettings);

    /// Merge an update into the run's snapshot.
    fn publish(&self, run_id: &str, update: ProgressUpdate);

    /// Record the terminal status, keeping the last known counters.
    fn finish(&self, run_id: &str, status: RunStatus, entry: LogEntry);
}

struct StoredRun {
    snapshot: ProgressSnapshot,
    log: VecDeque<LogEntry>,
    finished: Option<Instant>,
}

/// In-memory [`ProgressSink`] keyed by run id, with a capped log per run.
pub struct ProgressStore {
    runs: Mutex<HashMap<String, StoredRun>>,
    max_log_entries: usize,
}

impl ProgressStore {
    pub fn new(max_log_entries: usize) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            max_log_entries: max_log_entries.max(1),
        }
    }

    /// Latest snapshot, or `None` for unknown ids.
    pub fn get(&self, run_id: &str) -> Option<ProgressSnapshot> {
        let runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        runs.get(run_id).map(|run| {
            let mut snapshot = run.snapshot.clone();
            snapshot.log = run.log.iter().cloned().collect();
            snapshot
        })
    }

    pub fn remove(&self, run_id: &str) -> bool {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(run_id)
            .is_some()
    }

    /// Drop snapshots of runs that finished more than `retention` ago.
    pub fn prune(&self, retention: Duration) -> usize {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        let before = runs.len();
        runs.retain(|_, run| run.finished.is_none_or(|at| at.elapsed() < retention));
        before - runs.len()
    }

    pub fn len(&self) -> usize {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_entry(&self, run: &mut StoredRun, entry: LogEntry) {
        run.log.push_back(entry);
        while run.log.len() > self.max_log_entries {
            run.log.pop_front();
        }
    }
}

impl ProgressSink for ProgressStore {
    fn init(&self, run_id: &str, settings: &RunSettings) {
        let now = Utc::now();
        let run = StoredRun {
            snapshot: ProgressSnapshot {
                run_id: run_id.to_string(),
                status: RunStatus::Created,
                current_pair: None,
                remaining_ms: settings.total_duration().as_millis() as u64,
                next_message_at: None,
                stats: RunStats::default(),
                log: Vec::new(),
                config: settings.clone(),
                started_at: now,
                updated_at: now,
                finished_at: None,
            },
            log: VecDeque::new(),
            finished: None,
        };
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(run_id.to_string(), run);
    }

    fn publish(&self, run_id: &str, update: ProgressUpdate) {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(run) = runs.get_mut(run_id) else {
            return;
        };
        // A terminal status is never overwritten by a late update
        if run.finished.is_none() {
            run.snapshot.status = update.status;
        }
        run.snapshot.current_pair = update.current_pair;
        run.snapshot.remaining_ms = update.remaining_ms;
        run.snapshot.next_message_at = update.next_message_at;
        run.snapshot.stats = update.stats;
        run.snapshot.updated_at = Utc::now();
        if let Some(entry) = update.entry {
            self.push_entry(run, entry);
        }
    }

    fn finish(&self, run_id: &str, status: RunStatus, entry: LogEntry) {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(run) = runs.get_mut(run_id) else {
            return;
        };
        let now = Utc::now();
        run.snapshot.status = status;
        run.snapshot.current_pair = None;
        run.snapshot.next_message_at = None;
        run.snapshot.remaining_ms = 0;
        run.snapshot.updated_at = now;
        run.snapshot.finished_at = Some(now);
        run.finished = Some(Instant::now());
        self.push_entry(run, entry);
    }
}

/// Run-local progress state. Owned by the run task; every change is pushed
/// to the sink as a merged update.
pub struct ProgressReporter {
    run_id: String,
    sink: Arc<dyn ProgressSink>,
    status: RunStatus,
    stats: RunStats,
    current_pair: Option<CurrentPair>,
    deadline: Option<Instant>,
    next_message_at: Option<DateTime<Utc>>,
}

impl ProgressReporter {
    pub fn new(run_id: impl Into<String>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            run_id: run_id.into(),
            sink,
            status: RunStatus::Created,
            stats: RunStats::default(),
            current_pair: None,
            deadline: None,
            next_message_at: None,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    pub fn set_status(&mut self, status: RunStatus) {
        if self.status != status {
            self.status = status;
            self.push(None);
        }
    }

    pub fn set_pair(&mut self, from: &str, to: &str) {
        self.current_pair = Some(CurrentPair {
            from: from.to_string(),
            to: to.to_string(),
        });
        self.push(None);
    }

    pub fn clear_pair(&mut self) {
        self.current_pair = None;
        self.push(None);
    }

    pub fn set_active_pairs(&mut self, active_pairs: usize) {
        self.stats.active_pairs = active_pairs;
        self.push(None);
    }

    pub fn record_message(&mut self) {
        self.stats.total_messages += 1;
    }

    pub fn record_conversation(&mut self) {
        self.stats.conversations_completed += 1;
    }

    /// Publish the predicted instant of the next send, `delay` from now.
    pub fn expect_next_message_in(&mut self, delay: Duration) {
        self.next_message_at = chrono::Duration::from_std(delay)
            .ok()
            .map(|d| Utc::now() + d);
        self.push(None);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message.into());
    }

    fn log(&mut self, level: LogLevel, message: String) {
        match level {
            LogLevel::Info => info!("[run {}] {}", self.run_id, message),
            LogLevel::Warn => warn!("[run {}] {}", self.run_id, message),
            LogLevel::Error => error!("[run {}] {}", self.run_id, message),
        }
        self.push(Some(LogEntry::new(level, message)));
    }

    fn remaining_ms(&self) -> u64 {
        self.deadline.map_or(0, |deadline| {
            deadline
                .saturating_duration_since(Instant::now())
                .as_millis() as u64
        })
    }

    fn push(&self, entry: Option<LogEntry>) {
        self.sink.publish(
            &self.run_id,
            ProgressUpdate {
                status: self.status,
                current_pair: self.current_pair.clone(),
                remaining_ms: self.remaining_ms(),
                next_message_at: self.next_message_at,
                stats: self.stats,
                entry,
            },
        );
    }
}

#[cfg(test)]
mod tests;
