//! # CretoAI Permission Policies
//!
//! Role and grant based permission engine with hot-reloadable, named policies.
//!
//! ## Features
//!
//! - **Hierarchical permissions** (`resource:read,write:*`) with wildcard and
//!   alternative matching
//! - **Role graphs** with transitive role implication (cycle safe)
//! - **Conditional grants** gated by CEL (Common Expression Language) predicates
//! - **Fail-closed registry**: a policy that fails to reload is disabled
//! - **Bounded permission cache** backed by DashMap
//!
//! ## Example
//!
//! ```rust
//! use cretoai_permissions::{PolicyRegistry, PolicyDefinition, RegistryConfig, Subject};
//!
//! let registry = PolicyRegistry::with_cel(RegistryConfig::default());
//!
//! let definition: PolicyDefinition = serde_json::from_str(r#"{
//!     "roles": [
//!         { "name": "admin", "permissions": ["*"] },
//!         { "name": "viewer", "permissions": ["document:read"] }
//!     ],
//!     "grants": [
//!         { "test": "subject.authenticated", "then-grant": "profile:read" }
//!     ]
//! }"#).unwrap();
//! registry.load("main", &definition).unwrap();
//!
//! let alice = Subject::new("alice").authenticated().with_role("viewer");
//! let policy = registry.get_policy("main").unwrap();
//!
//! assert!(policy.is_permitted(&alice, "document:read:42").unwrap());
//! assert!(policy.is_permitted(&alice, "profile:read").unwrap());
//! assert!(!policy.is_permitted(&alice, "document:delete").unwrap());
//! ```

pub mod config;
pub mod error;
pub mod permission;
pub mod policy;
pub mod predicate;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use config::RegistryConfig;
pub use error::{AuthzError, PolicyLoadError, Result};
pub use permission::{
    CacheStats, ParseError, Permission, PermissionCache, PermissionCacheConfig, Segment,
};
pub use policy::{
    Decision, DecisionReason, GrantRule, Policy, PolicyBuilder, Role, RoleBuilder, RoleId,
};
pub use predicate::{CelCompiler, Predicate, PredicateCompiler, PredicateError};
pub use registry::{
    policy_name_from_path, GrantDefinition, PolicyDefinition, PolicyRegistry, RoleDefinition,
    SourceEvent,
};
pub use types::Subject;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
