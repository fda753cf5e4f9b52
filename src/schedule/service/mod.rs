use crate::maturation::MaturationService;
use crate::schedule::types::{MaturationSchedule, ScheduleStatus, ScheduleStore};
use crate::utils::task_tracker::TaskTracker;
use crate::utils::{atomic_write, get_maturation_home, now_ms};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const SCHEDULES_FILE: &str = "schedules.json";
const POLL_TASK: &str = "schedule_service";
const DRAIN_GRACE: Duration = Duration::from_secs(5);
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Persists [`MaturationSchedule`]s and launches them when due.
#[derive(Clone)]
pub struct ScheduleService {
    store_path: PathBuf,
    store: Arc<Mutex<Option<ScheduleStore>>>,
    maturation: MaturationService,
    poll: Duration,
    running: Arc<AtomicBool>,
    task_tracker: Arc<TaskTracker>,
}

impl ScheduleService {
    pub fn new(store_path: PathBuf, maturation: MaturationService, poll: Duration) -> Self {
        Self {
            store_path,
            store: Arc::new(Mutex::new(None)),
            maturation,
            poll,
            running: Arc::new(AtomicBool::new(false)),
            task_tracker: Arc::new(TaskTracker::new()),
        }
    }

    /// `~/.maturation/schedules.json`, or under `MATURATION_HOME`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(get_maturation_home()?.join(SCHEDULES_FILE))
    }

    pub async fn load_store(&self, force_reload: bool) -> Result<ScheduleStore> {
        let mut guard = self.store.lock().await;
        if !force_reload && let Some(ref store) = *guard {
            return Ok(store.clone());
        }
        let store = if self.store_path.exists() {
            let content = std::fs::read_to_string(&self.store_path)
                .with_context(|| format!("reading {}", self.store_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", self.store_path.display()))?
        } else {
            ScheduleStore::default()
        };
        *guard = Some(store.clone());
        Ok(store)
    }

    async fn save_store(&self) -> Result<()> {
        let guard = self.store.lock().await;
        if let Some(store) = guard.as_ref() {
            let content = serde_json::to_string_pretty(store)?;
            atomic_write(&self.store_path, &content)?;
        }
        Ok(())
    }

    /// Apply `f` to one schedule and persist. Returns the updated record.
    async fn update<F>(&self, id: &str, f: F) -> Result<Option<MaturationSchedule>>
    where
        F: FnOnce(&mut MaturationSchedule),
    {
        self.load_store(true).await?;
        let mut guard = self.store.lock().await;
        let Some(schedule) = guard
            .as_mut()
            .and_then(|store| store.schedules.iter_mut().find(|s| s.id == id))
        else {
            return Ok(None);
        };
        f(schedule);
        schedule.updated_at_ms = now_ms();
        let updated = schedule.clone();
        drop(guard);
        self.save_store().await?;
        Ok(Some(updated))
    }

    pub async fn add(&self, schedule: MaturationSchedule) -> Result<MaturationSchedule> {
        schedule
            .start_request()
            .validate()
            .context("invalid schedule settings")?;
        self.load_store(true).await?;
        let mut guard = self.store.lock().await;
        let store = guard.get_or_insert_with(ScheduleStore::default);
        store.schedules.push(schedule.clone());
        drop(guard);
        self.save_store().await?;
        info!(
            "scheduled maturation '{}' ({}) at {}ms",
            schedule.name, schedule.id, schedule.start_at_ms
        );
        Ok(schedule)
    }

    /// All schedules ordered by start time.
    pub async fn list(&self) -> Result<Vec<MaturationSchedule>> {
        let mut schedules = self.load_store(true).await?.schedules;
        schedules.sort_by_key(|s| s.start_at_ms);
        Ok(schedules)
    }

    pub async fn remove(&self, id: &str) -> Result<Option<MaturationSchedule>> {
        self.load_store(true).await?;
        let mut guard = self.store.lock().await;
        let Some(store) = guard.as_mut() else {
            return Ok(None);
        };
        let Some(pos) = store.schedules.iter().position(|s| s.id == id) else {
            return Ok(None);
        };
        let removed = store.schedules.remove(pos);
        drop(guard);
        self.save_store().await?;
        if removed.status == ScheduleStatus::Running
            && let Some(run_id) = &removed.last_run_id
        {
            self.maturation.stop(run_id);
        }
        Ok(Some(removed))
    }

    /// Cancel a schedule. A running schedule has its run stopped; its record
    /// becomes `cancelled` once the run ends.
    pub async fn cancel(&self, id: &str) -> Result<Option<MaturationSchedule>> {
        let maturation = self.maturation.clone();
        self.update(id, |s| {
            if s.status == ScheduleStatus::Running
                && let Some(run_id) = &s.last_run_id
                && maturation.stop(run_id)
            {
                return;
            }
            if !s.status.is_closed() {
                s.status = ScheduleStatus::Cancelled;
            }
        })
        .await
    }

    pub async fn pause(&self, id: &str) -> Result<Option<MaturationSchedule>> {
        self.update(id, |s| {
            if s.status == ScheduleStatus::Scheduled {
                s.status = ScheduleStatus::Paused;
            }
        })
        .await
    }

    pub async fn resume(&self, id: &str) -> Result<Option<MaturationSchedule>> {
        self.update(id, |s| {
            if s.status == ScheduleStatus::Paused {
                s.status = ScheduleStatus::Scheduled;
            }
        })
        .await
    }

    /// Launch every schedule due at `now`. Returns the launched schedule ids.
    pub async fn tick(&self, now: i64) -> Result<Vec<String>> {
        let due: Vec<MaturationSchedule> = self
            .load_store(true)
            .await?
            .schedules
            .into_iter()
            .filter(|s| s.is_due(now))
            .collect();

        let mut launched = Vec::new();
        for schedule in due {
            let started = self
                .maturation
                .start_with_outcome(schedule.start_request())
                .await;
            match started {
                Ok((ack, done)) => {
                    info!(
                        "launched schedule '{}' as run {}",
                        schedule.id, ack.maturation_id
                    );
                    let run_id = ack.maturation_id.clone();
                    self.update(&schedule.id, |s| {
                        s.status = ScheduleStatus::Running;
                        s.last_run_id = Some(run_id);
                        s.last_error = None;
                    })
                    .await?;

                    let service = self.clone();
                    let schedule_id = schedule.id.clone();
                    self.task_tracker
                        .spawn_auto_cleanup(format!("schedule_{}", schedule.id), async move {
                            let (status, error) = match done.await {
                                Ok(outcome) => {
                                    (ScheduleStatus::from_run(outcome.status), outcome.error)
                                }
                                Err(_) => (
                                    ScheduleStatus::Error,
                                    Some("run ended without reporting".to_string()),
                                ),
                            };
                            let result = service
                                .update(&schedule_id, |s| {
                                    s.status = status;
                                    s.last_error = error;
                                })
                                .await;
                            if let Err(e) = result {
                                warn!(
                                    "failed to record schedule '{}' result: {}",
                                    schedule_id, e
                                );
                            }
                        })
                        .await;
                    launched.push(schedule.id);
                }
                Err(e) => {
                    error!("schedule '{}' failed to start: {}", schedule.id, e);
                    let message = e.to_string();
                    self.update(&schedule.id, |s| {
                        s.status = ScheduleStatus::Error;
                        s.last_error = Some(message);
                    })
                    .await?;
                }
            }
        }
        Ok(launched)
    }

    /// Start the polling loop.
    pub async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        let service = self.clone();
        let handle = tokio::spawn(async move {
            while service.running.load(Ordering::SeqCst) {
                if let Err(e) = service.tick(now_ms()).await {
                    warn!("schedule tick failed: {}", e);
                }
                tokio::time::sleep(service.poll).await;
            }
        });
        self.task_tracker
            .spawn(POLL_TASK.to_string(), handle)
            .await;
        info!("schedule service started (poll {}s)", self.poll.as_secs());
    }

    /// Stop polling. Runs that already ended get their result recorded
    /// before the remaining tasks are aborted.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.task_tracker.abort(POLL_TASK).await;
        let deadline = tokio::time::Instant::now() + DRAIN_GRACE;
        while !self.task_tracker.is_empty().await && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(DRAIN_POLL).await;
        }
        self.task_tracker.cancel_all().await;
    }
}
