use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Action derived from the request method and resource family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    /// The method is not permitted on the addressed resource family.
    Invalid,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized description of what a request accesses.
///
/// `item` names the protected resource as a hierarchical path-like string
/// (e.g. `values/some/key`, `context/user/*`, `repo`). `contexts` maps a
/// context type to the identity or value the request concerns. Contexts are
/// kept ordered so two extractions of the same request serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyResource {
    item: String,
    #[serde(default)]
    contexts: BTreeMap<String, String>,
}

impl PolicyResource {
    #[must_use]
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            contexts: BTreeMap::new(),
        }
    }

    /// Add a context attribute; a later value for the same type replaces the earlier one.
    #[must_use]
    pub fn with_context(mut self, context_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.contexts.insert(context_type.into(), value.into());
        self
    }

    #[must_use]
    pub fn item(&self) -> &str {
        &self.item
    }

    #[must_use]
    pub fn contexts(&self) -> &BTreeMap<String, String> {
        &self.contexts
    }

    #[must_use]
    pub fn context(&self, context_type: &str) -> Option<&str> {
        self.contexts.get(context_type).map(String::as_str)
    }
}

impl fmt::Display for PolicyResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.item)?;
        f.write_str(" {")?;
        for (i, (k, v)) in self.contexts.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}
