use serde::{Deserialize, Serialize};

fn default_content_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_content_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_content_max_tokens() -> u32 {
    120
}

fn default_content_temperature() -> f32 {
    0.9
}

fn default_content_timeout() -> u64 {
    20
}

/// OpenAI-compatible chat completions endpoint used to write conversation content.
#[derive(Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_content_api_base", rename = "apiBase")]
    pub api_base: String,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default = "default_content_model")]
    pub model: String,
    #[serde(default = "default_content_max_tokens", rename = "maxTokens")]
    pub max_tokens: u32,
    #[serde(default = "default_content_temperature")]
    pub temperature: f32,
    #[serde(default = "default_content_timeout", rename = "timeoutSecs")]
    pub timeout_secs: u64,
}

redact_debug!(
    ContentConfig,
    enabled,
    api_base,
    redact(api_key),
    model,
    max_tokens,
    temperature,
    timeout_secs,
);

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_content_api_base(),
            api_key: String::new(),
            model: default_content_model(),
            max_tokens: default_content_max_tokens(),
            temperature: default_content_temperature(),
            timeout_secs: default_content_timeout(),
        }
    }
}

macro_rules! secs_default {
    ($($name:ident => $value:expr),* $(,)?) => {
        $(fn $name() -> u64 { $value })*
    };
}

secs_default! {
    default_throttle_min => 60,
    default_throttle_max => 180,
    default_throttle_jitter_max => 30,
    default_reading_min => 30,
    default_reading_max => 90,
    default_cycle_min => 5,
    default_cycle_max => 20,
    default_pause_poll => 5,
    default_restart_grace => 5,
}

/// Humanization delays, all in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_throttle_min", rename = "throttleMinSecs")]
    pub throttle_min_secs: u64,
    #[serde(default = "default_throttle_max", rename = "throttleMaxSecs")]
    pub throttle_max_secs: u64,
    #[serde(default = "default_throttle_jitter_max", rename = "throttleJitterMaxSecs")]
    pub throttle_jitter_max_secs: u64,
    #[serde(default = "default_reading_min", rename = "readingDelayMinSecs")]
    pub reading_delay_min_secs: u64,
    #[serde(default = "default_reading_max", rename = "readingDelayMaxSecs")]
    pub reading_delay_max_secs: u64,
    #[serde(default = "default_cycle_min", rename = "cycleDelayMinSecs")]
    pub cycle_delay_min_secs: u64,
    #[serde(default = "default_cycle_max", rename = "cycleDelayMaxSecs")]
    pub cycle_delay_max_secs: u64,
    #[serde(default = "default_pause_poll", rename = "pausePollSecs")]
    pub pause_poll_secs: u64,
    #[serde(default = "default_restart_grace", rename = "restartGraceSecs")]
    pub restart_grace_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            throttle_min_secs: default_throttle_min(),
            throttle_max_secs: default_throttle_max(),
            throttle_jitter_max_secs: default_throttle_jitter_max(),
            reading_delay_min_secs: default_reading_min(),
            reading_delay_max_secs: default_reading_max(),
            cycle_delay_min_secs: default_cycle_min(),
            cycle_delay_max_secs: default_cycle_max(),
            pause_poll_secs: default_pause_poll(),
            restart_grace_secs: default_restart_grace(),
        }
    }
}

fn default_max_log_entries() -> usize {
    300
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_max_concurrent_runs() -> usize {
    16
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunsConfig {
    /// Log entries kept per progress snapshot.
    #[serde(default = "default_max_log_entries", rename = "maxLogEntries")]
    pub max_log_entries: usize,
    /// How long a finished run stays queryable.
    #[serde(default = "default_retention_secs", rename = "retentionSecs")]
    pub retention_secs: u64,
    #[serde(default = "default_max_concurrent_runs", rename = "maxConcurrentRuns")]
    pub max_concurrent_runs: usize,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            max_log_entries: default_max_log_entries(),
            retention_secs: default_retention_secs(),
            max_concurrent_runs: default_max_concurrent_runs(),
        }
    }
}

fn default_schedule_poll() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulesConfig {
    #[serde(default = "super::default_true")]
    pub enabled: bool,
    #[serde(default = "default_schedule_poll", rename = "pollSecs")]
    pub poll_secs: u64,
}

impl Default for SchedulesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_secs: default_schedule_poll(),
        }
    }
}
