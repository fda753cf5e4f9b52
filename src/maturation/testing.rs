//! Mocks shared by the orchestrator unit tests.

use super::dispatcher::Dispatcher;
use super::service::MaturationService;
use super::types::Endpoint;
use crate::config::{ProviderKind, RunsConfig, ServerConfig, TimingConfig};
use crate::content::{ContentGenerator, ContentRequest, Topic};
use crate::errors::{MaturationError, MaturationResult};
use crate::providers::{
    DeliveryError, MessagingProvider, ProviderRegistry, RemoteEndpoint, SendReceipt,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub session: String,
    pub to: String,
    pub text: String,
    pub at: Instant,
}

/// In-memory provider: fixed endpoint listing, phone lookups from a map,
/// and sends recorded with their (paused-clock) instant.
#[derive(Default)]
pub struct MockProvider {
    pub endpoints: Vec<RemoteEndpoint>,
    pub phones: HashMap<String, String>,
    pub fail_list: bool,
    /// How long each endpoint listing takes.
    pub list_delay: Duration,
    /// Sessions whose sends are rejected.
    pub failing_senders: HashSet<String>,
    pub sent: Mutex<Vec<SentMessage>>,
}

impl MockProvider {
    pub fn with_sessions(sessions: &[(&str, &str, Option<&str>)]) -> Self {
        Self {
            endpoints: sessions
                .iter()
                .map(|(name, status, phone)| RemoteEndpoint {
                    session: name.to_string(),
                    status: status.to_string(),
                    display_name: Some(name.to_string()),
                    phone_number: phone.map(str::to_string),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Session
    }

    fn ready_states(&self) -> &'static [&'static str] {
        &["WORKING", "CONNECTED", "READY"]
    }

    async fn list_endpoints(&self) -> MaturationResult<Vec<RemoteEndpoint>> {
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        if self.fail_list {
            return Err(MaturationError::Provider {
                message: "listing failed".into(),
                retryable: true,
            });
        }
        Ok(self.endpoints.clone())
    }

    async fn lookup_phone(&self, session: &str) -> Option<String> {
        self.phones.get(session).cloned()
    }

    async fn send_text(
        &self,
        session: &str,
        to_phone: &str,
        text: &str,
    ) -> Result<SendReceipt, DeliveryError> {
        self.sent.lock().unwrap().push(SentMessage {
            session: session.to_string(),
            to: to_phone.to_string(),
            text: text.to_string(),
            at: Instant::now(),
        });
        if self.failing_senders.contains(session) {
            return Err(DeliveryError::Rejected {
                status: 500,
                body: "boom".into(),
            });
        }
        Ok(SendReceipt {
            message_id: None,
            http_status: 200,
        })
    }
}

/// Generator that echoes the step kind, or always fails.
pub struct MockGenerator {
    pub fail: bool,
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn topic(&self) -> MaturationResult<Topic> {
        if self.fail {
            return Err(MaturationError::Validation("no topic".into()));
        }
        Ok(Topic {
            name: "weekend".into(),
            description: "plans for the weekend".into(),
        })
    }

    async fn message(&self, req: &ContentRequest<'_>) -> MaturationResult<String> {
        if self.fail {
            return Err(MaturationError::Validation("no text".into()));
        }
        Ok(format!("{} from {} to {}", req.kind, req.from, req.to))
    }
}

pub fn server(id: &str) -> ServerConfig {
    ServerConfig {
        id: id.into(),
        kind: ProviderKind::Session,
        name: String::new(),
        api_url: "http://localhost:3000".into(),
        api_key: "key".into(),
        user_id: None,
        enabled: true,
    }
}

pub fn endpoint(server_id: &str, session: &str, phone: &str) -> Endpoint {
    Endpoint {
        provider_kind: ProviderKind::Session,
        server_id: server_id.into(),
        display_name: session.into(),
        session: session.into(),
        api_base_url: "http://localhost:3000".into(),
        api_key: "key".into(),
        phone_number: Some(phone.into()),
        health_status: "WORKING".into(),
    }
}

pub fn registry_with(server_id: &str, provider: Arc<MockProvider>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.insert(server(server_id), provider);
    registry
}

pub fn dispatcher_with(server_id: &str, provider: Arc<MockProvider>) -> Dispatcher {
    Dispatcher::new(registry_with(server_id, provider), Duration::from_secs(5))
}

/// Timing with 1 s throttle windows and no reading delay.
pub fn fast_timing() -> TimingConfig {
    TimingConfig {
        throttle_min_secs: 1,
        throttle_max_secs: 1,
        throttle_jitter_max_secs: 0,
        reading_delay_min_secs: 0,
        reading_delay_max_secs: 0,
        cycle_delay_min_secs: 5,
        cycle_delay_max_secs: 5,
        ..TimingConfig::default()
    }
}

pub fn service_with(provider: Arc<MockProvider>) -> MaturationService {
    MaturationService::new(
        registry_with("srv", provider),
        Arc::new(MockGenerator { fail: false }),
        fast_timing(),
        RunsConfig {
            retention_secs: 60,
            ..RunsConfig::default()
        },
    )
}

pub fn three_sessions() -> Arc<MockProvider> {
    Arc::new(MockProvider::with_sessions(&[
        ("a", "WORKING", Some("5511999990001")),
        ("b", "WORKING", Some("5511999990002")),
        ("c", "WORKING", Some("5511999990003")),
    ]))
}
