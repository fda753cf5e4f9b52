use crate::config::{ProviderKind, ProvidersConfig, ServerConfig};
use crate::providers::base::MessagingProvider;
use crate::providers::instance::InstanceProvider;
use crate::providers::session::SessionProvider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A configured server together with its adapter.
#[derive(Clone)]
pub struct RegisteredServer {
    pub config: ServerConfig,
    pub provider: Arc<dyn MessagingProvider>,
}

/// Maps server ids to provider adapters. Insertion order is preserved so
/// endpoint listings come out in config order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    order: Vec<String>,
    servers: HashMap<String, RegisteredServer>,
}

/// Build the adapter matching a server's kind.
pub fn create_provider(server: &ServerConfig) -> Arc<dyn MessagingProvider> {
    match server.kind {
        ProviderKind::Session => Arc::new(SessionProvider::new(server)),
        ProviderKind::Instance => Arc::new(InstanceProvider::new(server)),
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every enabled server from config.
    pub fn from_config(config: &ProvidersConfig) -> Self {
        let mut registry = Self::new();
        for server in config.enabled_servers() {
            debug!("registering {} server '{}'", server.kind, server.id);
            registry.insert(server.clone(), create_provider(server));
        }
        registry
    }

    /// Register (or replace) a server with an explicit adapter.
    pub fn insert(&mut self, config: ServerConfig, provider: Arc<dyn MessagingProvider>) {
        let id = config.id.clone();
        if self
            .servers
            .insert(id.clone(), RegisteredServer { config, provider })
            .is_none()
        {
            self.order.push(id);
        }
    }

    pub fn get(&self, server_id: &str) -> Option<&RegisteredServer> {
        self.servers.get(server_id)
    }

    pub fn provider(&self, server_id: &str) -> Option<Arc<dyn MessagingProvider>> {
        self.servers.get(server_id).map(|s| s.provider.clone())
    }

    /// Servers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredServer> {
        self.order.iter().filter_map(|id| self.servers.get(id))
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests;
