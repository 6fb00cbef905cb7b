//! Core authorization types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Subject asking for access (user, service account, agent)
///
/// Policies only look at the role names; grant predicates may also read the
/// name, authentication flag and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Subject name (e.g., "alice", "agent:shopping-bot")
    pub name: String,

    /// Whether the subject was authenticated
    #[serde(default)]
    pub authenticated: bool,

    /// Assigned role names
    #[serde(default)]
    pub roles: HashSet<String>,

    /// Additional attributes (e.g., department, clearance)
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl Subject {
    /// Create an unauthenticated subject without roles
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            authenticated: false,
            roles: HashSet::new(),
            attributes: HashMap::new(),
        }
    }

    /// Anonymous subject
    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }

    /// Mark the subject as authenticated
    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    /// Add a role
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Add several roles
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Add an attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Assigned role names
    pub fn roles(&self) -> &HashSet<String> {
        &self.roles
    }

    /// Check for a role by name
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
