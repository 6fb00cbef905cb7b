//! Error types for the permission policy engine

use crate::permission::ParseError;
use crate::predicate::PredicateError;
use thiserror::Error;

/// Failure to build a policy from its definition
///
/// Any of these aborts the whole load; the registry then drops the policy
/// name instead of keeping a previous or partial version.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyLoadError {
    /// Policy name is empty
    #[error("Policy name cannot be empty")]
    EmptyName,

    /// Role name is empty
    #[error("Role name cannot be empty")]
    EmptyRoleName,

    /// Two roles share a name
    #[error("Duplicate role name: {0}")]
    DuplicateRole(String),

    /// A role implies a role the policy does not define
    #[error("Role '{role}' implies unknown role '{implied}'")]
    UnknownImpliedRole { role: String, implied: String },

    /// A role permission does not parse
    #[error("Invalid permission in role '{role}': {source}")]
    InvalidRolePermission {
        role: String,
        #[source]
        source: ParseError,
    },

    /// A grant permission does not parse
    #[error("Invalid permission in grant #{index}: {source}")]
    InvalidGrantPermission {
        index: usize,
        #[source]
        source: ParseError,
    },

    /// A grant predicate does not compile
    #[error("Invalid predicate in grant #{index} ('{expression}'): {source}")]
    InvalidPredicate {
        index: usize,
        expression: String,
        #[source]
        source: PredicateError,
    },
}

/// Authorization errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthzError {
    /// No active policy under this name
    #[error("Unknown permission policy: {0}")]
    UnknownPolicy(String),

    /// The requested permission string does not parse
    #[error("Invalid permission: {0}")]
    InvalidPermission(#[from] ParseError),

    /// A grant predicate failed while deciding
    #[error("Predicate of grant #{grant} in policy '{policy}' failed: {source}")]
    PredicateEvaluation {
        policy: String,
        grant: usize,
        #[source]
        source: PredicateError,
    },
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
