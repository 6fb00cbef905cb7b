//! Policy source events and structured policy definitions
//!
//! Sources (file watchers, config services, tests) decode their own format
//! into [`PolicyDefinition`] and report changes as [`SourceEvent`]s.

use crate::error::PolicyLoadError;
use crate::permission::PermissionCache;
use crate::policy::{Policy, PolicyBuilder, RoleBuilder};
use crate::predicate::PredicateCompiler;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Change reported by a policy source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A definition appeared
    Added {
        name: String,
        definition: PolicyDefinition,
    },

    /// A definition changed
    Modified {
        name: String,
        definition: PolicyDefinition,
    },

    /// A definition went away
    Deleted { name: String },
}

impl SourceEvent {
    /// Name of the policy the event refers to
    pub fn name(&self) -> &str {
        match self {
            SourceEvent::Added { name, .. }
            | SourceEvent::Modified { name, .. }
            | SourceEvent::Deleted { name } => name,
        }
    }
}

/// Role declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Role name
    pub name: String,

    /// Permission strings granted by the role
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Names of roles this role implies
    #[serde(default, alias = "implied-roles", alias = "impliedRoles")]
    pub implied_roles: Vec<String>,
}

/// Conditional grant declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantDefinition {
    /// Predicate expression
    pub test: String,

    /// Permission string granted when `test` holds
    #[serde(alias = "then-grant", alias = "thenGrant")]
    pub then_grant: String,
}

/// Structured policy definition, as produced by a source decoder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    #[serde(default)]
    pub roles: Vec<RoleDefinition>,

    /// Grants, in evaluation order
    #[serde(default)]
    pub grants: Vec<GrantDefinition>,
}

impl PolicyDefinition {
    /// Build a policy named `name`
    ///
    /// Predicates are compiled with `compiler` and permissions parsed through
    /// `cache`. The first failure aborts the build.
    pub fn build(
        &self,
        name: &str,
        cache: Arc<PermissionCache>,
        compiler: &dyn PredicateCompiler,
        warn_on_role_cycles: bool,
    ) -> Result<Policy, PolicyLoadError> {
        let mut builder = PolicyBuilder::new(name, cache).warn_on_role_cycles(warn_on_role_cycles);

        for role in &self.roles {
            builder = builder.role(
                RoleBuilder::new(role.name.clone())
                    .permissions(role.permissions.iter().cloned())
                    .implies_roles(role.implied_roles.iter().cloned()),
            );
        }

        for (index, grant) in self.grants.iter().enumerate() {
            let predicate = compiler.compile(&grant.test).map_err(|source| {
                PolicyLoadError::InvalidPredicate {
                    index,
                    expression: grant.test.clone(),
                    source,
                }
            })?;
            builder = builder.grant(predicate, grant.then_grant.clone());
        }

        builder.build()
    }
}

/// Policy name for a definition file: the file name without its final extension
///
/// `etc/permission-policies/admin.xml` becomes `admin`. Returns `None` for
/// paths without a usable file name.
pub fn policy_name_from_path(path: impl AsRef<Path>) -> Option<String> {
    path.as_ref()
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}
