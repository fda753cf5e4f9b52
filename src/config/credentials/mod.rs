use super::schema::Config;
use tracing::debug;

macro_rules! define_credentials {
    ($( $name:literal, $env:literal => $($path:ident).+ );* $(;)?) => {
        /// All known fixed credential slot names.
        pub const CREDENTIAL_NAMES: &[&str] = &[$($name),*];

        /// (slot name, env var name) pairs.
        pub const CREDENTIAL_ENV_VARS: &[(&str, &str)] = &[$(($name, $env)),*];

        /// Get the current value of a credential field by slot name.
        pub fn get_credential_value<'a>(config: &'a Config, name: &str) -> Option<&'a str> {
            match name {
                $($name => Some(config.$($path).+.as_str()),)*
                _ => None,
            }
        }

        fn apply_fixed_env_overrides(config: &mut Config) {
            $(
                if let Ok(val) = std::env::var($env) {
                    if !val.is_empty() {
                        config.$($path).+ = val;
                    }
                }
            )*
        }
    };
}

define_credentials! {
    "content-api-key", "MATURATION_CONTENT_API_KEY" => content.api_key;
}

/// Env var that overrides the API key of the server with the given id.
///
/// `"waha-main"` maps to `MATURATION_SERVER_WAHA_MAIN_API_KEY`.
pub fn server_env_var(server_id: &str) -> String {
    let slug: String = server_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("MATURATION_SERVER_{slug}_API_KEY")
}

/// Apply environment variable overrides.
///
/// Any `MATURATION_*` env var that is set and non-empty overwrites the
/// corresponding config field, so secrets can be injected without touching
/// the config file.
pub fn apply_env_overrides(config: &mut Config) {
    apply_fixed_env_overrides(config);
    for server in &mut config.providers.servers {
        let var = server_env_var(&server.id);
        if let Ok(val) = std::env::var(&var)
            && !val.is_empty()
        {
            debug!("loaded api key for server '{}' from {}", server.id, var);
            server.api_key = val;
        }
    }
}

/// Where a credential slot's value currently comes from: `"env"`, `"config"` or `"unset"`.
pub fn detect_source(name: &str, config: &Config) -> &'static str {
    if let Some(&(_, env)) = CREDENTIAL_ENV_VARS.iter().find(|(n, _)| *n == name)
        && std::env::var(env).is_ok_and(|v| !v.is_empty())
    {
        return "env";
    }
    match get_credential_value(config, name) {
        Some(v) if !v.is_empty() => "config",
        _ => "unset",
    }
}
