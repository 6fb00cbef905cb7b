//! Permission policies
//!
//! A policy combines named roles with an ordered list of conditional grants.
//! Deciding a request runs two passes:
//!
//! 1. Every role of the subject known to the policy is checked, including
//!    the roles it implies transitively
//! 2. Grants are tried in definition order; the first whose predicate holds
//!    and whose permission implies the request allows it
//!
//! Anything else is denied. Policies are assembled with [`PolicyBuilder`]
//! and never change after [`PolicyBuilder::build`].

pub mod grant;
pub mod role;

pub use grant::GrantRule;
pub use role::{Role, RoleBuilder, RoleId};

use crate::error::{AuthzError, PolicyLoadError, Result};
use crate::permission::{Permission, PermissionCache};
use crate::predicate::Predicate;
use crate::types::Subject;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a decision was reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionReason {
    /// A subject role (or a role it implies) holds the permission
    Role { role: String },

    /// A grant matched
    Grant { index: usize, permission: String },

    /// Nothing matched; denied by default
    NoMatch,
}

/// Authorization decision of a single policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Reason for the decision
    pub reason: DecisionReason,
}

impl Decision {
    fn allow(reason: DecisionReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            reason: DecisionReason::NoMatch,
        }
    }
}

/// Immutable, named collection of roles and grants
pub struct Policy {
    name: String,
    roles: Vec<Role>,
    role_index: HashMap<String, RoleId>,
    grants: Vec<GrantRule>,
    permission_cache: Arc<PermissionCache>,
}

impl Policy {
    /// Policy name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a role by name
    pub fn role(&self, name: &str) -> Option<&Role> {
        self.role_index.get(name).map(|id| &self.roles[id.0])
    }

    /// Look up a role by id
    pub fn role_by_id(&self, id: RoleId) -> Option<&Role> {
        self.roles.get(id.0)
    }

    /// All roles, in declaration order
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Role names
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(Role::name)
    }

    /// Grants in evaluation order
    pub fn grants(&self) -> &[GrantRule] {
        &self.grants
    }

    /// Does the named role, directly or through implied roles, imply `requested`?
    ///
    /// Unknown roles imply nothing.
    pub fn role_implies(&self, role: &str, requested: &Permission) -> bool {
        self.role_index
            .get(role)
            .map(|id| role::implies(&self.roles, *id, requested))
            .unwrap_or(false)
    }

    /// [`role_implies`](Self::role_implies) for a raw permission string
    pub fn role_implies_str(&self, role: &str, requested: &str) -> Result<bool> {
        let requested = self.permission_cache.get_or_parse(requested)?;
        Ok(self.role_implies(role, &requested))
    }

    /// Is `subject` permitted `permission` under this policy?
    ///
    /// # Errors
    ///
    /// - [`AuthzError::InvalidPermission`] if `permission` does not parse
    /// - [`AuthzError::PredicateEvaluation`] if a grant predicate fails;
    ///   callers should treat this as a denial
    pub fn is_permitted(&self, subject: &Subject, permission: &str) -> Result<bool> {
        self.explain(subject, permission).map(|decision| decision.allowed)
    }

    /// Like [`is_permitted`](Self::is_permitted), but also reports what matched
    pub fn explain(&self, subject: &Subject, permission: &str) -> Result<Decision> {
        let requested = self.permission_cache.get_or_parse(permission)?;
        self.explain_permission(subject, &requested)
    }

    /// Decide an already parsed permission
    pub fn explain_permission(
        &self,
        subject: &Subject,
        requested: &Permission,
    ) -> Result<Decision> {
        for role_name in subject.roles() {
            if self.role_implies(role_name, requested) {
                debug!(
                    "Policy '{}' allows '{}' to {} via role '{}'",
                    self.name, subject.name, requested, role_name
                );
                return Ok(Decision::allow(DecisionReason::Role {
                    role: role_name.clone(),
                }));
            }
        }

        for (index, grant) in self.grants.iter().enumerate() {
            let granted = grant.grants(subject, requested).map_err(|source| {
                warn!(
                    "Predicate '{}' of grant #{} in policy '{}' failed: {}",
                    grant.predicate().source(),
                    index,
                    self.name,
                    source
                );
                AuthzError::PredicateEvaluation {
                    policy: self.name.clone(),
                    grant: index,
                    source,
                }
            })?;

            if granted {
                debug!(
                    "Policy '{}' allows '{}' to {} via grant #{}",
                    self.name, subject.name, requested, index
                );
                return Ok(Decision::allow(DecisionReason::Grant {
                    index,
                    permission: grant.granted_permission().to_string(),
                }));
            }
        }

        debug!(
            "Policy '{}' denies '{}' to {}: no role or grant matched",
            self.name, subject.name, requested
        );
        Ok(Decision::deny())
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("name", &self.name)
            .field("roles", &self.roles)
            .field("grants", &self.grants)
            .finish()
    }
}

/// Collects roles and grants, then builds an immutable [`Policy`]
///
/// # Example
///
/// ```
/// use cretoai_permissions::policy::{PolicyBuilder, RoleBuilder};
/// use cretoai_permissions::permission::PermissionCache;
/// use cretoai_permissions::predicate::ConstantPredicate;
/// use cretoai_permissions::Subject;
/// use std::sync::Arc;
///
/// let policy = PolicyBuilder::new("docs", Arc::new(PermissionCache::default()))
///     .role(RoleBuilder::new("viewer").permission("document:read"))
///     .role(RoleBuilder::new("editor").permission("document:write").implies_role("viewer"))
///     .grant(Arc::new(ConstantPredicate(true)), "help:read")
///     .build()
///     .unwrap();
///
/// let editor = Subject::new("alice").with_role("editor");
/// assert!(policy.is_permitted(&editor, "document:read:42").unwrap());
/// assert!(policy.is_permitted(&Subject::anonymous(), "help:read").unwrap());
/// assert!(!policy.is_permitted(&Subject::anonymous(), "document:read").unwrap());
/// ```
pub struct PolicyBuilder {
    name: String,
    roles: Vec<RoleBuilder>,
    grants: Vec<(Arc<dyn Predicate>, String)>,
    permission_cache: Arc<PermissionCache>,
    warn_on_role_cycles: bool,
}

impl PolicyBuilder {
    /// Start a policy; permissions are parsed through `permission_cache`
    pub fn new(name: impl Into<String>, permission_cache: Arc<PermissionCache>) -> Self {
        Self {
            name: name.into(),
            roles: Vec::new(),
            grants: Vec::new(),
            permission_cache,
            warn_on_role_cycles: true,
        }
    }

    /// Add a role
    pub fn role(mut self, role: RoleBuilder) -> Self {
        self.roles.push(role);
        self
    }

    /// Append a grant; grants are evaluated in the order they are added
    pub fn grant(mut self, predicate: Arc<dyn Predicate>, permission: impl Into<String>) -> Self {
        self.grants.push((predicate, permission.into()));
        self
    }

    /// Log a warning when the role graph contains a cycle (default: on)
    pub fn warn_on_role_cycles(mut self, enabled: bool) -> Self {
        self.warn_on_role_cycles = enabled;
        self
    }

    /// Resolve role references, parse permissions and freeze the policy
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyLoadError`] for an empty policy or role name, a
    /// duplicate role, an implied role the policy does not define, or a
    /// permission string that does not parse.
    pub fn build(self) -> std::result::Result<Policy, PolicyLoadError> {
        if self.name.trim().is_empty() {
            return Err(PolicyLoadError::EmptyName);
        }

        let mut seen = HashSet::new();
        let mut roles = Vec::with_capacity(self.roles.len());
        for declared in &self.roles {
            if declared.name.trim().is_empty() {
                return Err(PolicyLoadError::EmptyRoleName);
            }
            if !seen.insert(declared.name.as_str()) {
                return Err(PolicyLoadError::DuplicateRole(declared.name.clone()));
            }

            let permissions = declared
                .permissions
                .iter()
                .map(|raw| {
                    self.permission_cache.get_or_parse(raw).map_err(|source| {
                        PolicyLoadError::InvalidRolePermission {
                            role: declared.name.clone(),
                            source,
                        }
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;

            roles.push(Role::new(declared.name.clone(), permissions));
        }

        let role_index = role::index_by_name(&roles);
        for (idx, declared) in self.roles.iter().enumerate() {
            for implied in &declared.implied_roles {
                let id = role_index.get(implied).copied().ok_or_else(|| {
                    PolicyLoadError::UnknownImpliedRole {
                        role: declared.name.clone(),
                        implied: implied.clone(),
                    }
                })?;
                roles[idx].add_implied_role(id);
            }
        }

        if self.warn_on_role_cycles {
            if let Some(cycle) = role::find_cycle(&roles) {
                warn!(
                    "Policy '{}' has cyclic role implication: {}",
                    self.name,
                    cycle.join(" -> ")
                );
            }
        }

        let grants = self
            .grants
            .into_iter()
            .enumerate()
            .map(|(index, (predicate, raw))| {
                self.permission_cache
                    .get_or_parse(&raw)
                    .map(|permission| GrantRule::new(predicate, permission))
                    .map_err(|source| PolicyLoadError::InvalidGrantPermission { index, source })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Policy {
            name: self.name,
            roles,
            role_index,
            grants,
            permission_cache: self.permission_cache,
        })
    }
}
