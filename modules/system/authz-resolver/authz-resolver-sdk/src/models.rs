//! Models for policy evaluation.

use std::collections::BTreeMap;

use gateway_security::{Action, PolicyResource, Subject};
use serde::{Deserialize, Serialize};

/// A single authorization question: may `subject` perform `action` on
/// `resource.item` given `resource.contexts`?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub subject: String,
    pub action: Action,
    pub resource: ResourceInput,
}

/// The resource half of an [`AuthorizationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInput {
    pub item: String,
    #[serde(default)]
    pub contexts: BTreeMap<String, String>,
}

impl AuthorizationRequest {
    #[must_use]
    pub fn new(subject: &Subject, action: Action, resource: &PolicyResource) -> Self {
        Self {
            subject: subject.id().to_owned(),
            action,
            resource: ResourceInput {
                item: resource.item().to_owned(),
                contexts: resource.contexts().clone(),
            },
        }
    }
}
