//! Start, stop and observe maturation runs.

use super::dispatcher::Dispatcher;
use super::progress::{
    LogEntry, LogLevel, ProgressReporter, ProgressSink, ProgressSnapshot, ProgressStore,
};
use super::registry::{RunRegistry, StopSignal};
use super::resolver::{EndpointResolver, ResolveError};
use super::scheduler::RoundScheduler;
use super::script::{ConversationHistory, RunContext, ScriptEngine};
use super::throttle::PhoneThrottle;
use super::types::{Endpoint, RunSettings, RunStats, RunStatus};
use crate::config::{Config, RunsConfig, TimingConfig};
use crate::content::{ContentGenerator, choose_topic, create_generator};
use crate::errors::{MaturationError, MaturationResult};
use crate::providers::ProviderRegistry;
use crate::utils::task_tracker::TaskTracker;
use crate::utils::truncate_chars;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};

pub const MAX_ROUNDS: u32 = 100;
pub const MAX_MINUTES: u64 = 1440;
const MAX_ID_LEN: usize = 64;
const MAX_TEMPLATES: usize = 200;
const MAX_ERROR_CHARS: usize = 500;
const JANITOR_INTERVAL_SECS: u64 = 60;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

fn default_rounds() -> u32 {
    1
}

fn default_minutes() -> u64 {
    30
}

/// Body of a start call.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(default)]
    pub sessions: Vec<String>,
    #[serde(default)]
    pub cadence_seconds: u64,
    #[serde(default)]
    pub message_templates: Vec<String>,
    #[serde(default = "default_rounds")]
    pub number_of_rounds: u32,
    #[serde(default = "default_minutes")]
    pub minutes_per_round: u64,
    #[serde(default)]
    pub pause_minutes_between_rounds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl StartRequest {
    pub fn new(sessions: Vec<String>, settings: RunSettings) -> Self {
        Self {
            sessions,
            cadence_seconds: settings.cadence_seconds,
            message_templates: settings.message_templates,
            number_of_rounds: settings.number_of_rounds,
            minutes_per_round: settings.minutes_per_round,
            pause_minutes_between_rounds: settings.pause_minutes_between_rounds,
            maturation_id: None,
            user_id: None,
        }
    }

    pub fn settings(&self) -> RunSettings {
        RunSettings {
            number_of_rounds: self.number_of_rounds,
            minutes_per_round: self.minutes_per_round,
            pause_minutes_between_rounds: self.pause_minutes_between_rounds,
            cadence_seconds: self.cadence_seconds,
            message_templates: self
                .message_templates
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn validate(&self) -> MaturationResult<()> {
        if !(1..=MAX_ROUNDS).contains(&self.number_of_rounds) {
            return Err(MaturationError::Validation(format!(
                "numberOfRounds must be between 1 and {}",
                MAX_ROUNDS
            )));
        }
        if !(1..=MAX_MINUTES).contains(&self.minutes_per_round) {
            return Err(MaturationError::Validation(format!(
                "minutesPerRound must be between 1 and {}",
                MAX_MINUTES
            )));
        }
        if self.pause_minutes_between_rounds > MAX_MINUTES {
            return Err(MaturationError::Validation(format!(
                "pauseMinutesBetweenRounds must be at most {}",
                MAX_MINUTES
            )));
        }
        if self.cadence_seconds > MAX_MINUTES * 60 {
            return Err(MaturationError::Validation(
                "cadenceSeconds is longer than a day".into(),
            ));
        }
        if self.message_templates.len() > MAX_TEMPLATES {
            return Err(MaturationError::Validation(format!(
                "at most {} messageTemplates are allowed",
                MAX_TEMPLATES
            )));
        }
        if let Some(id) = &self.maturation_id {
            validate_run_id(id)?;
        }
        Ok(())
    }
}

fn validate_run_id(id: &str) -> MaturationResult<()> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(MaturationError::Validation(format!(
            "maturationId must be 1-{} characters of [A-Za-z0-9_-]",
            MAX_ID_LEN
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAck {
    pub success: bool,
    pub started: bool,
    pub maturation_id: String,
}

/// Terminal result of a run, delivered to whoever started it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub stats: RunStats,
    pub error: Option<String>,
}

struct Inner {
    resolver: EndpointResolver,
    dispatcher: Dispatcher,
    generator: Arc<dyn ContentGenerator>,
    timing: TimingConfig,
    runs: RunsConfig,
    registry: RunRegistry,
    store: Arc<ProgressStore>,
    tasks: TaskTracker,
    executions: Mutex<HashMap<String, AbortHandle>>,
}

impl Inner {
    fn stats_of(&self, run_id: &str) -> RunStats {
        self.store
            .get(run_id)
            .map(|s| s.stats)
            .unwrap_or_default()
    }

    fn executions(&self) -> std::sync::MutexGuard<'_, HashMap<String, AbortHandle>> {
        self.executions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Aborts the wrapped task when dropped, so cancelling the supervising
/// task never leaves a run executing on its own.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Entry point for callers (gateway, CLI, schedules). Cheap to clone.
#[derive(Clone)]
pub struct MaturationService {
    inner: Arc<Inner>,
}

impl MaturationService {
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ProviderRegistry::from_config(&config.providers),
            create_generator(&config.content),
            config.timing.clone(),
            config.runs.clone(),
        )
    }

    pub fn new(
        providers: ProviderRegistry,
        generator: Arc<dyn ContentGenerator>,
        timing: TimingConfig,
        runs: RunsConfig,
    ) -> Self {
        let restart_grace = Duration::from_secs(timing.restart_grace_secs);
        Self {
            inner: Arc::new(Inner {
                resolver: EndpointResolver::new(providers.clone()),
                dispatcher: Dispatcher::new(providers, restart_grace),
                generator,
                store: Arc::new(ProgressStore::new(runs.max_log_entries)),
                timing,
                runs,
                registry: RunRegistry::new(),
                tasks: TaskTracker::new(),
                executions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Ready endpoints with phone numbers backfilled where possible.
    pub async fn list_endpoints(&self, user_id: Option<&str>) -> Vec<Endpoint> {
        let mut endpoints = self.inner.resolver.discover(user_id).await;
        self.inner.resolver.backfill_phones(&mut endpoints).await;
        endpoints
    }

    /// Validate and launch a run in the background.
    pub async fn start(&self, req: StartRequest) -> MaturationResult<StartAck> {
        self.start_with_outcome(req).await.map(|(ack, _)| ack)
    }

    /// Like [`start`](Self::start), also returning a receiver that resolves
    /// once the run reaches a terminal status.
    pub async fn start_with_outcome(
        &self,
        req: StartRequest,
    ) -> MaturationResult<(StartAck, oneshot::Receiver<RunOutcome>)> {
        req.validate()?;
        let run_id = req
            .maturation_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let stop = self
            .inner
            .registry
            .create(&run_id, self.inner.runs.max_concurrent_runs)?;
        let settings = req.settings();
        self.inner.store.init(&run_id, &settings);

        let (tx, rx) = oneshot::channel();
        let inner = self.inner.clone();
        let task_run_id = run_id.clone();
        let run_future = async move {
            let handle = tokio::spawn(execute(
                inner.clone(),
                task_run_id.clone(),
                req,
                settings,
                stop,
            ));
            let _guard = AbortOnDrop(handle.abort_handle());
            inner
                .executions()
                .insert(task_run_id.clone(), handle.abort_handle());
            let joined = handle.await;
            inner.executions().remove(&task_run_id);
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => RunOutcome {
                    status: RunStatus::Error,
                    stats: inner.stats_of(&task_run_id),
                    error: Some(truncate_chars(
                        &panic_message(e.into_panic()),
                        MAX_ERROR_CHARS,
                    )),
                },
                Err(_) => RunOutcome {
                    status: RunStatus::Stopped,
                    stats: inner.stats_of(&task_run_id),
                    error: Some("run task was cancelled".into()),
                },
            };
            finalize(&inner, &task_run_id, &outcome);
            let _ = tx.send(outcome);
        };
        self.inner
            .tasks
            .spawn_auto_cleanup(format!("maturation_run_{}", run_id), run_future)
            .await;

        info!("maturation {} accepted", run_id);
        Ok((
            StartAck {
                success: true,
                started: true,
                maturation_id: run_id,
            },
            rx,
        ))
    }

    /// Request a cooperative stop. Returns `false` for unknown or finished runs.
    pub fn stop(&self, run_id: &str) -> bool {
        self.inner.registry.request_stop(run_id)
    }

    pub fn progress(&self, run_id: &str) -> Option<ProgressSnapshot> {
        self.inner.store.get(run_id)
    }

    pub fn is_active(&self, run_id: &str) -> bool {
        self.inner.registry.is_active(run_id)
    }

    pub fn active_count(&self) -> usize {
        self.inner.registry.active_count()
    }

    /// Drop finished runs past the retention window.
    pub fn prune(&self) -> usize {
        let retention = Duration::from_secs(self.inner.runs.retention_secs);
        let expired = self.inner.registry.prune_expired(retention);
        for id in &expired {
            self.inner.store.remove(id);
        }
        expired.len() + self.inner.store.prune(retention)
    }

    /// Periodically prune expired runs.
    pub async fn spawn_janitor(&self) {
        let service = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(JANITOR_INTERVAL_SECS));
            interval.tick().await;
            loop {
                interval.tick().await;
                let pruned = service.prune();
                if pruned > 0 {
                    info!("pruned {} expired maturation records", pruned);
                }
            }
        });
        self.inner
            .tasks
            .spawn("maturation_janitor".to_string(), handle)
            .await;
    }

    /// Stop every live run and abort tracked tasks.
    ///
    /// Every run that was live when this is called ends with a terminal
    /// status in its progress record and is no longer active.
    pub async fn shutdown(&self) {
        let stopped = self.inner.registry.stop_all();
        if stopped > 0 {
            warn!("stopping {} running maturations", stopped);
        }
        let executions: Vec<AbortHandle> =
            self.inner.executions().drain().map(|(_, h)| h).collect();
        for handle in executions {
            handle.abort();
        }

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while self.inner.registry.active_count() > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(SHUTDOWN_POLL).await;
        }
        self.inner.tasks.cancel_all().await;

        for run_id in self.inner.registry.active_ids() {
            warn!("maturation {} did not wind down in time", run_id);
            let outcome = RunOutcome {
                status: RunStatus::Stopped,
                stats: self.inner.stats_of(&run_id),
                error: Some("service shut down".into()),
            };
            finalize(&self.inner, &run_id, &outcome);
        }
    }
}

async fn execute(
    inner: Arc<Inner>,
    run_id: String,
    req: StartRequest,
    settings: RunSettings,
    stop: StopSignal,
) -> RunOutcome {
    let sink: Arc<dyn ProgressSink> = inner.store.clone();
    let mut reporter = ProgressReporter::new(run_id.clone(), sink);

    let endpoints = match inner
        .resolver
        .resolve(&req.sessions, req.user_id.as_deref())
        .await
    {
        Ok(endpoints) => endpoints,
        Err(e) => {
            let status = match e {
                ResolveError::NoSessions { .. } => RunStatus::NoSessions,
                ResolveError::NoNumbers { .. } => RunStatus::NoNumbers,
            };
            return RunOutcome {
                status,
                stats: reporter.stats(),
                error: Some(e.to_string()),
            };
        }
    };
    reporter.set_status(RunStatus::Started);
    reporter.info(format!(
        "maturation started: {} rounds x {} min, {} min pause",
        settings.number_of_rounds,
        settings.minutes_per_round,
        settings.pause_minutes_between_rounds
    ));
    let names: Vec<String> = endpoints.iter().map(Endpoint::label).collect();
    reporter.info(format!(
        "{} endpoints ready: {}",
        endpoints.len(),
        names.join(", ")
    ));

    let topic = choose_topic(inner.generator.as_ref()).await;
    reporter.info(format!("topic: {}", topic.name));

    let timing = &inner.timing;
    let mut ctx = RunContext {
        topic,
        templates: settings.message_templates.clone(),
        history: ConversationHistory::new(),
        throttle: PhoneThrottle::from_timing(timing),
        reporter,
        stop,
    };
    let scheduler = RoundScheduler::new(
        ScriptEngine::new(
            inner.generator.clone(),
            inner.dispatcher.clone(),
            timing.reading_delay_min_secs,
            timing.reading_delay_max_secs,
        ),
        timing.cycle_delay_min_secs,
        timing.cycle_delay_max_secs,
        Duration::from_secs(timing.pause_poll_secs),
    );
    let outcome = scheduler.run(&endpoints, &settings, &mut ctx).await;
    RunOutcome {
        status: outcome.status(),
        stats: ctx.reporter.stats(),
        error: None,
    }
}

fn finalize(inner: &Inner, run_id: &str, outcome: &RunOutcome) {
    let entry = match (outcome.status, &outcome.error) {
        (RunStatus::Finished, _) => LogEntry::new(
            LogLevel::Info,
            format!(
                "maturation finished: {} messages, {} conversations",
                outcome.stats.total_messages, outcome.stats.conversations_completed
            ),
        ),
        (RunStatus::Stopped, _) => LogEntry::new(
            LogLevel::Info,
            format!(
                "maturation stopped after {} messages",
                outcome.stats.total_messages
            ),
        ),
        (status, error) => LogEntry::new(
            LogLevel::Error,
            format!(
                "maturation ended with {}: {}",
                status,
                error.as_deref().unwrap_or("unknown error")
            ),
        ),
    };
    match entry.level {
        LogLevel::Error => error!("[run {}] {}", run_id, entry.message),
        _ => info!("[run {}] {}", run_id, entry.message),
    }
    inner.store.finish(run_id, outcome.status, entry);
    inner.registry.mark_finished(run_id, outcome.status);
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("run task panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("run task panicked: {}", s)
    } else {
        "run task panicked".to_string()
    }
}
