use crate::config::{ProviderKind, ServerConfig};
use crate::errors::MaturationResult;
use crate::providers::base::{
    DeliveryError, HealthCheck, MessagingProvider, RemoteEndpoint, SendReceipt, extract_phone,
    receipt_from_body,
};
use crate::providers::errors::ProviderErrorHandler;
use crate::utils::http::{http_client_with_timeout, join_url};
use crate::utils::phone::normalize_phone;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "X-Api-Key";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const READY_STATES: &[&str] = &["WORKING", "CONNECTED", "READY"];
/// States a restart is expected to recover from.
const RECOVERABLE_STATES: &[&str] = &["FAILED", "STOPPED"];

#[derive(Debug, Deserialize)]
struct SessionRecord {
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    me: Option<SessionMe>,
}

#[derive(Debug, Deserialize)]
struct SessionMe {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "pushName")]
    push_name: Option<String>,
}

/// Adapter for session-oriented servers: sessions have a status that can be
/// checked and restarted, and messages go through a single `sendText` route.
pub struct SessionProvider {
    server_id: String,
    base_url: String,
    api_key: String,
    client: Client,
}

impl SessionProvider {
    pub fn new(server: &ServerConfig) -> Self {
        Self {
            server_id: server.id.clone(),
            base_url: server.api_url.clone(),
            api_key: server.api_key.clone(),
            client: http_client_with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn session_path(session: &str) -> String {
        format!("/api/sessions/{}", urlencoding::encode(session))
    }

    async fn get_json(&self, path: &str) -> MaturationResult<Value> {
        let resp = self
            .client
            .get(self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .with_context(|| format!("GET {} on server '{}'", path, self.server_id))?;
        let resp = ProviderErrorHandler::check_http_status(resp, &self.server_id, path).await?;
        let json = resp
            .json::<Value>()
            .await
            .with_context(|| format!("invalid JSON from {}", path))?;
        Ok(json)
    }

    fn classify(status: &str) -> HealthCheck {
        let normalized = status.trim().to_ascii_uppercase();
        if READY_STATES.contains(&normalized.as_str()) {
            HealthCheck::Healthy
        } else if RECOVERABLE_STATES.contains(&normalized.as_str()) {
            HealthCheck::Recoverable(normalized)
        } else {
            HealthCheck::Unhealthy(normalized)
        }
    }
}

#[async_trait]
impl MessagingProvider for SessionProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Session
    }

    fn ready_states(&self) -> &'static [&'static str] {
        READY_STATES
    }

    async fn list_endpoints(&self) -> MaturationResult<Vec<RemoteEndpoint>> {
        let resp = self
            .client
            .get(self.url("/api/sessions"))
            .query(&[("all", "true")])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .with_context(|| format!("listing sessions on server '{}'", self.server_id))?;
        let resp =
            ProviderErrorHandler::check_http_status(resp, &self.server_id, "list sessions").await?;
        let records: Vec<SessionRecord> = resp
            .json()
            .await
            .context("unexpected session list payload")?;

        Ok(records
            .into_iter()
            .map(|r| {
                let (phone_number, display_name) = match r.me {
                    Some(me) => (normalize_phone(&me.id), me.push_name),
                    None => (None, None),
                };
                RemoteEndpoint {
                    session: r.name,
                    status: r.status,
                    display_name,
                    phone_number,
                }
            })
            .collect())
    }

    async fn lookup_phone(&self, session: &str) -> Option<String> {
        let encoded = urlencoding::encode(session);
        let candidates = [
            format!("/api/sessions/{}/me", encoded),
            format!("/api/{}/auth/me", encoded),
            Self::session_path(session),
        ];
        for path in &candidates {
            match self.get_json(path).await {
                Ok(json) => {
                    if let Some(phone) = extract_phone(&json) {
                        debug!("resolved phone for session '{}' via {}", session, path);
                        return Some(phone);
                    }
                }
                Err(e) => debug!("phone lookup {} failed: {}", path, e),
            }
        }
        None
    }

    fn requires_health_check(&self) -> bool {
        true
    }

    async fn check_health(&self, session: &str) -> HealthCheck {
        match self.get_json(&Self::session_path(session)).await {
            Ok(json) => {
                let status = json.get("status").and_then(Value::as_str).unwrap_or("");
                Self::classify(status)
            }
            Err(e) => HealthCheck::Unhealthy(format!("status check failed: {}", e)),
        }
    }

    async fn restart(&self, session: &str) -> MaturationResult<()> {
        let path = format!("{}/restart", Self::session_path(session));
        let resp = self
            .client
            .post(self.url(&path))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .with_context(|| format!("restarting session '{}'", session))?;
        ProviderErrorHandler::check_http_status(resp, &self.server_id, "restart").await?;
        warn!(
            "restarted session '{}' on server '{}'",
            session, self.server_id
        );
        Ok(())
    }

    async fn send_text(
        &self,
        session: &str,
        to_phone: &str,
        text: &str,
    ) -> Result<SendReceipt, DeliveryError> {
        let digits =
            normalize_phone(to_phone).ok_or_else(|| DeliveryError::InvalidNumber(to_phone.into()))?;
        let body = json!({
            "session": session,
            "chatId": format!("{}@c.us", digits),
            "text": text,
        });
        let resp = self
            .client
            .post(self.url("/api/sendText"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ProviderErrorHandler::rejection(resp).await);
        }
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        receipt_from_body(status, &text)
    }
}
