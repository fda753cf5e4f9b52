use serde::{Deserialize, Serialize};
use std::fmt;

use super::default_true;

/// Backend family a messaging server belongs to.
///
/// `Session` servers expose a session API with status checks and restarts.
/// `Instance` servers expose an instance API with connection state only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(alias = "waha")]
    Session,
    #[serde(alias = "evolution")]
    Instance,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Instance => "instance",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured messaging server.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "apiUrl")]
    pub api_url: String,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    /// Owner of the server. Servers without an owner are visible to every user.
    #[serde(default, rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

redact_debug!(
    ServerConfig,
    id,
    kind,
    name,
    api_url,
    redact(api_key),
    user_id,
    enabled,
);

impl ServerConfig {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_url.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    /// Whether a request made on behalf of `user_id` may use this server.
    pub fn visible_to(&self, user_id: Option<&str>) -> bool {
        match (user_id, self.user_id.as_deref()) {
            (Some(requested), Some(owner)) => requested == owner,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl ProvidersConfig {
    pub fn enabled_servers(&self) -> impl Iterator<Item = &ServerConfig> {
        self.servers.iter().filter(|s| s.enabled)
    }

    pub fn get(&self, id: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.id == id)
    }
}
