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
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

const API_KEY_HEADER: &str = "apikey";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const READY_STATES: &[&str] = &["OPEN", "CONNECTED"];

/// Adapter for instance-oriented servers: no pre-send checks, one send route
/// per instance.
pub struct InstanceProvider {
    server_id: String,
    base_url: String,
    api_key: String,
    client: Client,
}

fn str_field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

impl InstanceProvider {
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

    /// Map one `fetchInstances` entry, flat or wrapped in `{"instance": {...}}`.
    fn parse_instance(entry: &Value) -> Option<RemoteEndpoint> {
        let obj = entry.get("instance").unwrap_or(entry);
        let name = str_field(obj, &["name", "instanceName"])?;
        let status = str_field(obj, &["connectionStatus", "status", "state"]).unwrap_or("");
        let phone_number = ["ownerJid", "owner", "number"]
            .iter()
            .filter_map(|k| obj.get(*k).and_then(Value::as_str))
            .find_map(normalize_phone);
        Some(RemoteEndpoint {
            session: name.to_string(),
            status: status.to_string(),
            display_name: str_field(obj, &["profileName"]).map(str::to_string),
            phone_number,
        })
    }
}

#[async_trait]
impl MessagingProvider for InstanceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Instance
    }

    fn ready_states(&self) -> &'static [&'static str] {
        READY_STATES
    }

    async fn list_endpoints(&self) -> MaturationResult<Vec<RemoteEndpoint>> {
        let json = self.get_json("/instance/fetchInstances").await?;
        let entries = json
            .as_array()
            .context("fetchInstances did not return an array")?;
        Ok(entries.iter().filter_map(Self::parse_instance).collect())
    }

    async fn lookup_phone(&self, session: &str) -> Option<String> {
        let encoded = urlencoding::encode(session);
        let candidates = [
            format!("/instance/fetchInstances?instanceName={}", encoded),
            format!("/instance/connectionState/{}", encoded),
        ];
        for path in &candidates {
            match self.get_json(path).await {
                Ok(json) => {
                    if let Some(phone) = extract_phone(&json) {
                        debug!("resolved phone for instance '{}' via {}", session, path);
                        return Some(phone);
                    }
                }
                Err(e) => debug!("phone lookup {} failed: {}", path, e),
            }
        }
        None
    }

    async fn check_health(&self, session: &str) -> HealthCheck {
        let path = format!(
            "/instance/connectionState/{}",
            urlencoding::encode(session)
        );
        match self.get_json(&path).await {
            Ok(json) => {
                let state = json
                    .pointer("/instance/state")
                    .or_else(|| json.get("state"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if self.is_ready(state) {
                    HealthCheck::Healthy
                } else {
                    HealthCheck::Unhealthy(state.trim().to_ascii_uppercase())
                }
            }
            Err(e) => HealthCheck::Unhealthy(format!("connection state failed: {}", e)),
        }
    }

    async fn send_text(
        &self,
        session: &str,
        to_phone: &str,
        text: &str,
    ) -> Result<SendReceipt, DeliveryError> {
        let digits =
            normalize_phone(to_phone).ok_or_else(|| DeliveryError::InvalidNumber(to_phone.into()))?;
        let path = format!("/message/sendText/{}", urlencoding::encode(session));
        let resp = self
            .client
            .post(self.url(&path))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&json!({"number": digits, "text": text}))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ProviderErrorHandler::rejection(resp).await);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        receipt_from_body(status, &body)
    }
}
