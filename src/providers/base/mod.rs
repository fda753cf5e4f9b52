use crate::config::ProviderKind;
use crate::errors::MaturationResult;
use crate::utils::phone::normalize_phone;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// A session or instance as reported by a provider listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    /// Session name (session provider) or instance name (instance provider).
    pub session: String,
    /// Raw status string as reported by the provider.
    pub status: String,
    pub display_name: Option<String>,
    /// Normalized digits, when the listing already carries the owner number.
    pub phone_number: Option<String>,
}

/// Outcome of a pre-send status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthCheck {
    Healthy,
    /// Unhealthy, but a restart is expected to bring the session back.
    Recoverable(String),
    Unhealthy(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: Option<String>,
    pub http_status: u16,
}

/// Why a single message could not be delivered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("invalid phone number: {0:?}")]
    InvalidNumber(String),
    #[error("endpoint has no api url or api key")]
    MissingCredentials,
    #[error("no provider registered for server '{0}'")]
    UnknownServer(String),
    #[error("endpoint unhealthy: {0}")]
    Unhealthy(String),
    #[error("provider rejected message (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// Short machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidNumber(_) => "invalid_number",
            Self::MissingCredentials => "missing_credentials",
            Self::UnknownServer(_) => "unknown_server",
            Self::Unhealthy(_) => "unhealthy",
            Self::Rejected { .. } => "rejected",
            Self::Transport(_) => "transport",
        }
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

/// Adapter for one messaging backend family.
///
/// Implementations are bound to a single configured server. The dispatcher
/// only talks to this trait; it never branches on the provider kind.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Upper-case statuses that count as ready to send.
    fn ready_states(&self) -> &'static [&'static str];

    fn is_ready(&self, status: &str) -> bool {
        let normalized = status.trim().to_ascii_uppercase();
        self.ready_states().contains(&normalized.as_str())
    }

    async fn list_endpoints(&self) -> MaturationResult<Vec<RemoteEndpoint>>;

    /// Best-effort "who am I" lookup. Returns normalized digits or `None`.
    async fn lookup_phone(&self, session: &str) -> Option<String>;

    /// Whether the dispatcher must run [`check_health`](Self::check_health)
    /// before each send.
    fn requires_health_check(&self) -> bool {
        false
    }

    async fn check_health(&self, _session: &str) -> HealthCheck {
        HealthCheck::Healthy
    }

    async fn restart(&self, _session: &str) -> MaturationResult<()> {
        Ok(())
    }

    /// Send one text message. Exactly one network call, no retries.
    async fn send_text(
        &self,
        session: &str,
        to_phone: &str,
        text: &str,
    ) -> Result<SendReceipt, DeliveryError>;
}

const PHONE_KEYS: &[&str] = &[
    "id", "wid", "jid", "ownerJid", "owner", "number", "phone", "me", "instance",
];

/// Dig a phone number out of a loosely shaped "who am I" payload.
///
/// Strings are normalized directly; objects are searched through a fixed list
/// of keys (a few levels deep); arrays use their first element.
pub fn extract_phone(value: &Value) -> Option<String> {
    extract_phone_at_depth(value, 0)
}

fn extract_phone_at_depth(value: &Value, depth: usize) -> Option<String> {
    if depth > 3 {
        return None;
    }
    match value {
        Value::String(s) => normalize_phone(s),
        Value::Number(n) => normalize_phone(&n.to_string()),
        Value::Array(items) => items
            .first()
            .and_then(|v| extract_phone_at_depth(v, depth + 1)),
        Value::Object(map) => PHONE_KEYS
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(|v| extract_phone_at_depth(v, depth + 1))
            .or_else(|| {
                map.get("_serialized")
                    .and_then(|v| extract_phone_at_depth(v, depth + 1))
            }),
        _ => None,
    }
}

/// Build a receipt from a 2xx send response body.
///
/// Bodies that explicitly report failure (`"success": false` or an `error`
/// field) are rejected even though the HTTP status was OK.
pub fn receipt_from_body(http_status: u16, body: &str) -> Result<SendReceipt, DeliveryError> {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return Ok(SendReceipt {
            message_id: None,
            http_status,
        });
    };
    let explicit_failure = json.get("success").and_then(Value::as_bool) == Some(false)
        || json.get("error").is_some_and(|e| !e.is_null());
    if explicit_failure {
        return Err(DeliveryError::Rejected {
            status: http_status,
            body: crate::utils::truncate_chars(body, 300),
        });
    }
    let message_id = json
        .get("id")
        .and_then(|id| {
            id.as_str()
                .or_else(|| id.get("_serialized").and_then(Value::as_str))
                .or_else(|| id.get("id").and_then(Value::as_str))
        })
        .or_else(|| json.pointer("/key/id").and_then(Value::as_str))
        .map(str::to_string);
    Ok(SendReceipt {
        message_id,
        http_status,
    })
}

#[cfg(test)]
mod tests;
