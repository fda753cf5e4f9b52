use super::types::Endpoint;
use crate::providers::{ProviderRegistry, RegisteredServer, RemoteEndpoint};
use crate::utils::phone::normalize_phone;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a run cannot start with the requested endpoints.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("need at least 2 ready sessions, found {found}")]
    NoSessions { found: usize },
    #[error("need at least 2 sessions with a phone number, found {found}")]
    NoNumbers { found: usize },
}

/// Turns provider listings into validated [`Endpoint`]s.
#[derive(Clone)]
pub struct EndpointResolver {
    providers: ProviderRegistry,
}

impl EndpointResolver {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self { providers }
    }

    /// Every ready endpoint with credentials on servers visible to `user_id`.
    /// A server whose listing fails is skipped.
    pub async fn discover(&self, user_id: Option<&str>) -> Vec<Endpoint> {
        let mut found = Vec::new();
        for server in self.providers.iter() {
            if !server.config.visible_to(user_id) {
                continue;
            }
            if !server.config.has_credentials() {
                warn!(
                    "server '{}' has no api url or key, skipping",
                    server.config.id
                );
                continue;
            }
            match server.provider.list_endpoints().await {
                Ok(remote) => {
                    let before = found.len();
                    found.extend(
                        remote
                            .into_iter()
                            .filter(|r| server.provider.is_ready(&r.status))
                            .map(|r| to_endpoint(server, r)),
                    );
                    debug!(
                        "server '{}': {} ready endpoints",
                        server.config.id,
                        found.len() - before
                    );
                }
                Err(e) => warn!("listing endpoints on '{}' failed: {}", server.config.id, e),
            }
        }
        found
    }

    /// Fill in missing phone numbers through the provider's lookup routes.
    pub async fn backfill_phones(&self, endpoints: &mut [Endpoint]) {
        for endpoint in endpoints.iter_mut().filter(|e| e.phone_number.is_none()) {
            let Some(provider) = self.providers.provider(&endpoint.server_id) else {
                continue;
            };
            endpoint.phone_number = provider
                .lookup_phone(&endpoint.session)
                .await
                .and_then(|raw| normalize_phone(&raw));
            match &endpoint.phone_number {
                Some(phone) => debug!("resolved {} to {}", endpoint.key(), phone),
                None => warn!("no phone number for {}", endpoint.key()),
            }
        }
    }

    /// Resolve the endpoints for a run. An empty `requested` list selects every
    /// ready endpoint; entries are either `server:session` keys or bare
    /// session names.
    pub async fn resolve(
        &self,
        requested: &[String],
        user_id: Option<&str>,
    ) -> Result<Vec<Endpoint>, ResolveError> {
        let available = self.discover(user_id).await;
        let mut selected = select(available, requested);
        if selected.len() < 2 {
            return Err(ResolveError::NoSessions {
                found: selected.len(),
            });
        }

        self.backfill_phones(&mut selected).await;
        let mut phones = HashSet::new();
        selected.retain(|e| match &e.phone_number {
            Some(phone) if phones.insert(phone.clone()) => true,
            Some(phone) => {
                warn!(
                    "{} shares phone {} with another endpoint, dropping",
                    e.key(),
                    phone
                );
                false
            }
            None => false,
        });
        if selected.len() < 2 {
            return Err(ResolveError::NoNumbers {
                found: selected.len(),
            });
        }
        info!("resolved {} endpoints", selected.len());
        Ok(selected)
    }
}

fn to_endpoint(server: &RegisteredServer, remote: RemoteEndpoint) -> Endpoint {
    Endpoint {
        provider_kind: server.config.kind,
        server_id: server.config.id.clone(),
        display_name: remote
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| remote.session.clone()),
        session: remote.session,
        api_base_url: server.config.api_url.clone(),
        api_key: server.config.api_key.clone(),
        phone_number: remote.phone_number.as_deref().and_then(normalize_phone),
        health_status: remote.status.trim().to_ascii_uppercase(),
    }
}

fn select(available: Vec<Endpoint>, requested: &[String]) -> Vec<Endpoint> {
    let mut seen = HashSet::new();
    if requested.is_empty() {
        return available
            .into_iter()
            .filter(|e| seen.insert(e.key()))
            .collect();
    }
    let wanted: Vec<&str> = requested
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect();
    for want in &wanted {
        let matched = available.iter().any(|e| matches_request(e, want));
        if !matched {
            warn!("requested endpoint '{}' is not ready or unknown", want);
        }
    }
    available
        .into_iter()
        .filter(|e| wanted.iter().any(|want| matches_request(e, want)))
        .filter(|e| seen.insert(e.key()))
        .collect()
}

fn matches_request(endpoint: &Endpoint, requested: &str) -> bool {
    if requested.contains(':') {
        endpoint.key() == requested
    } else {
        endpoint.session == requested
    }
}
