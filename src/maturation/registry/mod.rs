use super::types::RunStatus;
use crate::errors::{MaturationError, MaturationResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Cooperative stop flag shared between the registry and a run task.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct RunEntry {
    stop: StopSignal,
    finished: Option<(RunStatus, Instant)>,
}

/// Live and recently finished runs, keyed by run id.
///
/// A live id cannot be reused; a finished id can once it is disposed or
/// pruned.
#[derive(Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<String, RunEntry>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run and hand back its stop signal. At most
    /// `max_active` runs may be live at once.
    pub fn create(&self, run_id: &str, max_active: usize) -> MaturationResult<StopSignal> {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        if runs.get(run_id).is_some_and(|entry| entry.finished.is_none()) {
            return Err(MaturationError::Conflict(format!(
                "maturation '{}' is already running",
                run_id
            )));
        }
        let active = runs.values().filter(|e| e.finished.is_none()).count();
        if active >= max_active {
            return Err(MaturationError::Conflict(format!(
                "too many maturations running ({} of {})",
                active, max_active
            )));
        }
        let stop = StopSignal::new();
        runs.insert(
            run_id.to_string(),
            RunEntry {
                stop: stop.clone(),
                finished: None,
            },
        );
        debug!("registered run {}", run_id);
        Ok(stop)
    }

    /// Raise the stop flag. Returns `false` for unknown or finished runs.
    pub fn request_stop(&self, run_id: &str) -> bool {
        let runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        match runs.get(run_id) {
            Some(entry) if entry.finished.is_none() => {
                entry.stop.request();
                info!("stop requested for run {}", run_id);
                true
            }
            _ => false,
        }
    }

    pub fn mark_finished(&self, run_id: &str, status: RunStatus) {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = runs.get_mut(run_id) {
            entry.finished = Some((status, Instant::now()));
        }
    }

    /// Drop finished runs older than `retention`. Returns the removed ids.
    pub fn prune_expired(&self, retention: Duration) -> Vec<String> {
        let mut runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<String> = runs
            .iter()
            .filter(|(_, entry)| {
                entry
                    .finished
                    .is_some_and(|(_, at)| at.elapsed() >= retention)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            runs.remove(id);
        }
        expired
    }

    pub fn is_active(&self, run_id: &str) -> bool {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(run_id)
            .is_some_and(|entry| entry.finished.is_none())
    }

    pub fn active_count(&self) -> usize {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.finished.is_none())
            .count()
    }

    /// Ids of runs that have not been marked finished.
    pub fn active_ids(&self) -> Vec<String> {
        self.runs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, entry)| entry.finished.is_none())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Raise every live run's stop flag.
    pub fn stop_all(&self) -> usize {
        let runs = self.runs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut count = 0;
        for entry in runs.values().filter(|entry| entry.finished.is_none()) {
            entry.stop.request();
            count += 1;
        }
        count
    }
}
