use super::types::Endpoint;
use crate::providers::{DeliveryError, HealthCheck, ProviderRegistry, SendReceipt};
use crate::utils::phone::normalize_phone;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sends one text through the adapter that owns the sending endpoint.
///
/// Adapters that ask for a pre-send health check get one restart-and-recheck
/// attempt when the session looks recoverable.
#[derive(Clone)]
pub struct Dispatcher {
    providers: ProviderRegistry,
    restart_grace: Duration,
}

impl Dispatcher {
    pub fn new(providers: ProviderRegistry, restart_grace: Duration) -> Self {
        Self {
            providers,
            restart_grace,
        }
    }

    pub async fn send(
        &self,
        from: &Endpoint,
        to_phone: &str,
        text: &str,
    ) -> Result<SendReceipt, DeliveryError> {
        let phone = normalize_phone(to_phone)
            .ok_or_else(|| DeliveryError::InvalidNumber(to_phone.to_string()))?;
        if !from.has_credentials() {
            return Err(DeliveryError::MissingCredentials);
        }
        let provider = self
            .providers
            .provider(&from.server_id)
            .ok_or_else(|| DeliveryError::UnknownServer(from.server_id.clone()))?;

        if provider.requires_health_check() {
            match provider.check_health(&from.session).await {
                HealthCheck::Healthy => {}
                HealthCheck::Recoverable(status) => {
                    warn!(
                        "session {} is {}, restarting before send",
                        from.key(),
                        status
                    );
                    if let Err(e) = provider.restart(&from.session).await {
                        warn!("restart of {} failed: {}", from.key(), e);
                    }
                    tokio::time::sleep(self.restart_grace).await;
                    match provider.check_health(&from.session).await {
                        HealthCheck::Healthy => {
                            info!("session {} recovered after restart", from.key());
                        }
                        HealthCheck::Recoverable(status) | HealthCheck::Unhealthy(status) => {
                            return Err(DeliveryError::Unhealthy(format!(
                                "{} after restart",
                                status
                            )));
                        }
                    }
                }
                HealthCheck::Unhealthy(status) => {
                    return Err(DeliveryError::Unhealthy(status));
                }
            }
        }

        let receipt = provider.send_text(&from.session, &phone, text).await?;
        debug!(
            "sent via {} to {} (HTTP {})",
            from.key(),
            phone,
            receipt.http_status
        );
        Ok(receipt)
    }
}
