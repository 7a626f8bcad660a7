//! Process configuration: a YAML file overlaid with `GATEWAY__*` environment variables.

use std::path::Path;

use anyhow::Context;
use api_gateway::ApiGatewayConfig;
use authz_resolver::AuthorizerConfig;
use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;

/// Environment variable prefix; nested keys are separated by `__`,
/// e.g. `GATEWAY__SERVER__BIND_ADDR`.
pub const ENV_PREFIX: &str = "GATEWAY__";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayServerConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub api_gateway: ApiGatewayConfig,
    pub authorizer: AuthorizerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Base URL every authorized request is forwarded to.
    pub upstream_url: String,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_owned(),
            upstream_url: "http://127.0.0.1:3000".to_owned(),
            body_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Human,
        }
    }
}

impl GatewayServerConfig {
    /// Provider chain: optional YAML file, then environment overrides.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file_exact(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration from `path` (if any) and the environment.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or a value has the wrong shape.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        Self::figment(path)
            .extract()
            .context("failed to load gateway configuration")
    }
}
