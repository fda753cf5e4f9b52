use crate::config::ProviderKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A messaging session or instance that can take part in a run.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub provider_kind: ProviderKind,
    pub server_id: String,
    pub display_name: String,
    pub session: String,
    pub api_base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub phone_number: Option<String>,
    pub health_status: String,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("provider_kind", &self.provider_kind)
            .field("server_id", &self.server_id)
            .field("display_name", &self.display_name)
            .field("session", &self.session)
            .field("api_base_url", &self.api_base_url)
            .field(
                "api_key",
                &if self.api_key.is_empty() {
                    "[empty]"
                } else {
                    "[REDACTED]"
                },
            )
            .field("phone_number", &self.phone_number)
            .field("health_status", &self.health_status)
            .finish()
    }
}

impl Endpoint {
    /// Composite key callers use to select this endpoint: `"{server_id}:{session}"`.
    pub fn key(&self) -> String {
        endpoint_key(&self.server_id, &self.session)
    }

    /// Stable identity used for pairing: phone number, else session, else server id.
    pub fn identity(&self) -> &str {
        self.phone_number
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| Some(self.session.as_str()).filter(|s| !s.is_empty()))
            .unwrap_or(self.server_id.as_str())
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_base_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    /// Display label used in logs: name plus phone when known.
    pub fn label(&self) -> String {
        match &self.phone_number {
            Some(phone) => format!("{} ({})", self.display_name, phone),
            None => self.display_name.clone(),
        }
    }
}

pub fn endpoint_key(server_id: &str, session: &str) -> String {
    format!("{}:{}", server_id, session)
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Started,
    Running,
    Sending,
    Replying,
    Finished,
    Stopped,
    Error,
    NoSessions,
    NoNumbers,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Stopped | Self::Error | Self::NoSessions | Self::NoNumbers
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Running => "running",
            Self::Sending => "sending",
            Self::Replying => "replying",
            Self::Finished => "finished",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::NoSessions => "no_sessions",
            Self::NoNumbers => "no_numbers",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_rounds() -> u32 {
    1
}

fn default_minutes_per_round() -> u64 {
    30
}

/// Caller-chosen shape of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSettings {
    #[serde(default = "default_rounds")]
    pub number_of_rounds: u32,
    #[serde(default = "default_minutes_per_round")]
    pub minutes_per_round: u64,
    #[serde(default)]
    pub pause_minutes_between_rounds: u64,
    /// Lower bound for the delay between cycles, in seconds. 0 keeps the
    /// configured default.
    #[serde(default)]
    pub cadence_seconds: u64,
    /// Replaces the built-in fallback messages when non-empty.
    #[serde(default)]
    pub message_templates: Vec<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            number_of_rounds: default_rounds(),
            minutes_per_round: default_minutes_per_round(),
            pause_minutes_between_rounds: 0,
            cadence_seconds: 0,
            message_templates: Vec::new(),
        }
    }
}

impl RunSettings {
    pub fn round_duration(&self) -> Duration {
        Duration::from_secs(self.minutes_per_round * 60)
    }

    pub fn pause_duration(&self) -> Duration {
        Duration::from_secs(self.pause_minutes_between_rounds * 60)
    }

    /// `rounds * minutes + (rounds - 1) * pause`.
    pub fn total_duration(&self) -> Duration {
        let rounds = u64::from(self.number_of_rounds);
        let minutes = rounds * self.minutes_per_round
            + rounds.saturating_sub(1) * self.pause_minutes_between_rounds;
        Duration::from_secs(minutes * 60)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub total_messages: u64,
    pub active_pairs: usize,
    pub conversations_completed: u64,
}
