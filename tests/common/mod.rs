// Shared test helpers, not all items used by every test binary.
#![allow(unused)]

use async_trait::async_trait;
use maturation::config::{ProviderKind, RunsConfig, ServerConfig, TimingConfig};
use maturation::content::{ContentGenerator, ContentRequest, Topic};
use maturation::errors::MaturationResult;
use maturation::maturation::{MaturationService, RunSettings, StartRequest};
use maturation::providers::{
    DeliveryError, MessagingProvider, ProviderRegistry, RemoteEndpoint, SendReceipt,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub session: String,
    pub to: String,
    pub text: String,
    pub at: Instant,
}

/// Provider with a fixed session listing that records every send.
#[derive(Default)]
pub struct RecordingProvider {
    pub endpoints: Vec<RemoteEndpoint>,
    pub failing_senders: HashSet<String>,
    pub sent: Mutex<Vec<SentMessage>>,
}

impl RecordingProvider {
    pub fn with_sessions(sessions: &[(&str, Option<&str>)]) -> Self {
        Self {
            endpoints: sessions
                .iter()
                .map(|(name, phone)| RemoteEndpoint {
                    session: name.to_string(),
                    status: "WORKING".to_string(),
                    display_name: Some(name.to_string()),
                    phone_number: phone.map(str::to_string),
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing(mut self, sessions: &[&str]) -> Self {
        self.failing_senders = sessions.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingProvider for RecordingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Session
    }

    fn ready_states(&self) -> &'static [&'static str] {
        &["WORKING"]
    }

    async fn list_endpoints(&self) -> MaturationResult<Vec<RemoteEndpoint>> {
        Ok(self.endpoints.clone())
    }

    async fn lookup_phone(&self, _session: &str) -> Option<String> {
        None
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
                status: 503,
                body: "session busy".into(),
            });
        }
        Ok(SendReceipt {
            message_id: Some(format!("msg-{}", self.sent.lock().unwrap().len())),
            http_status: 200,
        })
    }
}

/// Generator whose text names the step, so tests can tell steps apart.
pub struct EchoGenerator;

#[async_trait]
impl ContentGenerator for EchoGenerator {
    async fn topic(&self) -> MaturationResult<Topic> {
        Ok(Topic {
            name: "music".into(),
            description: "favourite albums".into(),
        })
    }

    async fn message(&self, req: &ContentRequest<'_>) -> MaturationResult<String> {
        Ok(format!("{}|{}|{}", req.kind, req.from, req.to))
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

/// 1 s throttle, no reading delay, 5 s between cycles.
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

pub fn service(provider: Arc<RecordingProvider>, timing: TimingConfig) -> MaturationService {
    let mut registry = ProviderRegistry::new();
    registry.insert(server("srv"), provider);
    MaturationService::new(
        registry,
        Arc::new(EchoGenerator),
        timing,
        RunsConfig::default(),
    )
}

pub fn three_sessions() -> Arc<RecordingProvider> {
    Arc::new(RecordingProvider::with_sessions(&[
        ("a", Some("5511999990001")),
        ("b", Some("5511999990002")),
        ("c", Some("5511999990003")),
    ]))
}

pub fn request(id: &str, rounds: u32, minutes: u64, pause: u64) -> StartRequest {
    StartRequest {
        maturation_id: Some(id.to_string()),
        ..StartRequest::new(
            Vec::new(),
            RunSettings {
                number_of_rounds: rounds,
                minutes_per_round: minutes,
                pause_minutes_between_rounds: pause,
                ..RunSettings::default()
            },
        )
    }
}
