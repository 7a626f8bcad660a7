//! Configuration for the authorizer.

use serde::Deserialize;

/// Which policy engine answers authorization requests.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case", deny_unknown_fields)]
pub enum AuthorizerConfig {
    /// OPA-compatible data API, e.g. `http://opa:8181/v1/data/gateway/allow`.
    Http {
        url: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    /// Fixed decision. Development only.
    Static { allow: bool },
}

fn default_timeout_ms() -> u64 {
    5_000
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self::Static { allow: false }
    }
}
