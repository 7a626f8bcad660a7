use authn_resolver::SecurityConfig;
use serde::Deserialize;

fn default_api_prefix() -> String {
    "/api/v2".to_owned()
}

fn default_policy_timeout_ms() -> u64 {
    5_000
}

/// API gateway security configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiGatewayConfig {
    /// Path prefix under which every protected resource lives.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Token verification settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Upper bound for one policy evaluation; exceeding it rejects the request.
    #[serde(default = "default_policy_timeout_ms")]
    pub policy_timeout_ms: u64,
}

impl Default for ApiGatewayConfig {
    fn default() -> Self {
        Self {
            api_prefix: default_api_prefix(),
            security: SecurityConfig::default(),
            policy_timeout_ms: default_policy_timeout_ms(),
        }
    }
}
