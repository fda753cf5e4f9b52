use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Generates a `Debug` impl that redacts secret fields.
///
/// Field specifiers:
/// - `field_name` prints normally via `&self.field_name`
/// - `redact(field_name)` `String` field, shows `[empty]` or `[REDACTED]`
/// - `redact_option(field_name)` `Option<String>` field, shows `None` or `Some("[REDACTED]")`
macro_rules! redact_debug {
    // Internal: emit a single .field() call
    (@field $builder:ident, $self:ident, redact($field:ident)) => {
        $builder.field(
            stringify!($field),
            &if $self.$field.is_empty() {
                "[empty]"
            } else {
                "[REDACTED]"
            },
        );
    };
    (@field $builder:ident, $self:ident, redact_option($field:ident)) => {
        $builder.field(
            stringify!($field),
            &$self.$field.as_ref().map(|_| "[REDACTED]"),
        );
    };
    (@field $builder:ident, $self:ident, $field:ident) => {
        $builder.field(stringify!($field), &$self.$field);
    };

    // Internal: recursive TT muncher
    (@fields $builder:ident, $self:ident,) => {};
    (@fields $builder:ident, $self:ident, redact($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, redact_option($field:ident), $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, redact_option($field));
        redact_debug!(@fields $builder, $self, $($rest)*);
    };
    (@fields $builder:ident, $self:ident, $field:ident, $($rest:tt)*) => {
        redact_debug!(@field $builder, $self, $field);
        redact_debug!(@fields $builder, $self, $($rest)*);
    };

    // Entry point
    ($struct_name:ident, $($fields:tt)*) => {
        impl std::fmt::Debug for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut builder = f.debug_struct(stringify!($struct_name));
                redact_debug!(@fields builder, self, $($fields)*);
                builder.finish()
            }
        }
    };
}

// Submodules are declared after the macro so they can use `redact_debug!`
mod maturation;
mod providers;

pub use maturation::*;
pub use providers::*;

use crate::errors::MaturationError;

/// Upper bound for any timing window, in seconds.
const MAX_TIMING_SECS: u64 = 86_400;

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    18790
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub runs: RunsConfig,
    #[serde(default)]
    pub schedules: SchedulesConfig,
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), MaturationError> {
        self.validate_gateway()?;
        self.validate_servers()?;
        self.validate_content()?;
        self.validate_timing()?;
        self.validate_runs()?;
        Ok(())
    }

    fn validate_gateway(&self) -> Result<(), MaturationError> {
        if self.gateway.port == 0 {
            return Err(MaturationError::Config("gateway.port must be > 0".into()));
        }
        if self.gateway.port < 1024 {
            warn!(
                "gateway.port {} is a privileged port (< 1024), may require elevated permissions",
                self.gateway.port
            );
        }
        Ok(())
    }

    fn validate_servers(&self) -> Result<(), MaturationError> {
        let mut seen = HashSet::new();
        for (i, server) in self.providers.servers.iter().enumerate() {
            if server.id.trim().is_empty() {
                return Err(MaturationError::Config(format!(
                    "providers.servers[{i}].id must not be empty"
                )));
            }
            if server.id.contains(':') {
                return Err(MaturationError::Config(format!(
                    "providers.servers[{i}].id must not contain ':' (used in endpoint keys)"
                )));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(MaturationError::Config(format!(
                    "providers.servers[{i}].id '{}' is duplicated",
                    server.id
                )));
            }
            if server.enabled && !server.api_url.is_empty() {
                let parsed = url::Url::parse(&server.api_url).map_err(|e| {
                    MaturationError::Config(format!(
                        "providers.servers[{i}].apiUrl is not a valid URL: {e}"
                    ))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(MaturationError::Config(format!(
                        "providers.servers[{i}].apiUrl must use http or https"
                    )));
                }
            }
            if server.enabled && !server.has_credentials() {
                warn!(
                    "server '{}' has no apiUrl/apiKey, its endpoints will be ignored",
                    server.id
                );
            }
        }
        Ok(())
    }

    fn validate_content(&self) -> Result<(), MaturationError> {
        let c = &self.content;
        if !c.enabled {
            return Ok(());
        }
        if c.api_base.trim().is_empty() {
            return Err(MaturationError::Config(
                "content.apiBase is required when content generation is enabled".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(MaturationError::Config(
                "content.maxTokens must be > 0".into(),
            ));
        }
        if c.temperature.is_nan()
            || c.temperature.is_infinite()
            || c.temperature < 0.0
            || c.temperature > 2.0
        {
            return Err(MaturationError::Config(
                "content.temperature must be a finite number between 0.0 and 2.0".into(),
            ));
        }
        if c.timeout_secs == 0 {
            return Err(MaturationError::Config(
                "content.timeoutSecs must be > 0".into(),
            ));
        }
        Ok(())
    }

    fn validate_timing(&self) -> Result<(), MaturationError> {
        let t = &self.timing;
        let ranges = [
            ("throttle", t.throttle_min_secs, t.throttle_max_secs),
            (
                "readingDelay",
                t.reading_delay_min_secs,
                t.reading_delay_max_secs,
            ),
            ("cycleDelay", t.cycle_delay_min_secs, t.cycle_delay_max_secs),
        ];
        for (name, min, max) in ranges {
            if min > max {
                return Err(MaturationError::Config(format!(
                    "timing.{name}MinSecs must be <= timing.{name}MaxSecs"
                )));
            }
            if max > MAX_TIMING_SECS {
                return Err(MaturationError::Config(format!(
                    "timing.{name}MaxSecs must be at most {MAX_TIMING_SECS}"
                )));
            }
        }
        if t.throttle_jitter_max_secs > MAX_TIMING_SECS {
            return Err(MaturationError::Config(format!(
                "timing.throttleJitterMaxSecs must be at most {MAX_TIMING_SECS}"
            )));
        }
        if t.throttle_min_secs == 0 {
            return Err(MaturationError::Config(
                "timing.throttleMinSecs must be > 0".into(),
            ));
        }
        if t.pause_poll_secs == 0 || t.pause_poll_secs > 5 {
            return Err(MaturationError::Config(
                "timing.pausePollSecs must be between 1 and 5".into(),
            ));
        }
        Ok(())
    }

    fn validate_runs(&self) -> Result<(), MaturationError> {
        if self.runs.max_log_entries == 0 {
            return Err(MaturationError::Config(
                "runs.maxLogEntries must be > 0".into(),
            ));
        }
        if self.runs.max_concurrent_runs == 0 {
            return Err(MaturationError::Config(
                "runs.maxConcurrentRuns must be > 0".into(),
            ));
        }
        if self.schedules.enabled && self.schedules.poll_secs == 0 {
            return Err(MaturationError::Config(
                "schedules.pollSecs must be > 0 when schedules are enabled".into(),
            ));
        }
        Ok(())
    }
}
