//! Policy registry
//!
//! Holds the active policy for every name and swaps policies as source
//! events arrive. Loading is fail-closed: a definition that does not build
//! removes the name, so neither a stale nor a half-built policy stays in
//! force.
//!
//! Reads go through a `DashMap` and hand out `Arc<Policy>` snapshots, so a
//! caller keeps deciding against the policy it fetched even while a reload
//! replaces it.

pub mod source;

pub use source::{
    policy_name_from_path, GrantDefinition, PolicyDefinition, RoleDefinition, SourceEvent,
};

use crate::config::RegistryConfig;
use crate::error::{AuthzError, PolicyLoadError, Result};
use crate::permission::{ParseError, Permission, PermissionCache};
use crate::policy::Policy;
use crate::predicate::{CelCompiler, PredicateCompiler};
use crate::types::Subject;
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// Concurrent map of policy name to active policy
pub struct PolicyRegistry {
    policies: DashMap<String, Arc<Policy>>,
    permission_cache: Arc<PermissionCache>,
    compiler: Arc<dyn PredicateCompiler>,
    config: RegistryConfig,
}

impl PolicyRegistry {
    /// Create an empty registry compiling predicates with `compiler`
    pub fn new(config: RegistryConfig, compiler: Arc<dyn PredicateCompiler>) -> Self {
        let permission_cache = Arc::new(PermissionCache::new(config.permission_cache.clone()));

        info!(
            "PolicyRegistry initialized with permission cache size={}, idle_ttl={:?}",
            config.permission_cache.max_entries, config.permission_cache.idle_ttl
        );

        Self {
            policies: DashMap::new(),
            permission_cache,
            compiler,
            config,
        }
    }

    /// Create an empty registry with CEL predicates
    pub fn with_cel(config: RegistryConfig) -> Self {
        let compiler = CelCompiler::with_max_programs(config.max_cel_programs);
        Self::new(config, Arc::new(compiler))
    }

    /// Parse a permission string through the shared cache
    pub fn parse_permission(
        &self,
        raw: &str,
    ) -> std::result::Result<Arc<Permission>, ParseError> {
        self.permission_cache.get_or_parse(raw)
    }

    /// Current policy for `name`
    pub fn get_policy(&self, name: &str) -> Option<Arc<Policy>> {
        self.policies.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Build `definition` and make it the active policy for `name`
    ///
    /// On failure the name is removed and the error returned.
    pub fn load(
        &self,
        name: &str,
        definition: &PolicyDefinition,
    ) -> std::result::Result<Arc<Policy>, PolicyLoadError> {
        let built = definition.build(
            name,
            Arc::clone(&self.permission_cache),
            self.compiler.as_ref(),
            self.config.warn_on_role_cycles,
        );

        match built {
            Ok(policy) => {
                let policy = Arc::new(policy);
                let replaced = self
                    .policies
                    .insert(name.to_string(), Arc::clone(&policy))
                    .is_some();
                info!(
                    "{} permission policy '{}' ({} roles, {} grants)",
                    if replaced { "Reloaded" } else { "Loaded" },
                    name,
                    policy.roles().len(),
                    policy.grants().len()
                );
                Ok(policy)
            }
            Err(e) => {
                self.policies.remove(name);
                error!(
                    "Failed to load permission policy '{}', policy disabled: {}",
                    name, e
                );
                Err(e)
            }
        }
    }

    /// Drop the policy for `name`; returns whether one was active
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.policies.remove(name).is_some();
        if removed {
            info!("Removed permission policy '{}'", name);
        }
        removed
    }

    /// Apply one source event
    ///
    /// Load failures are logged and leave the name absent.
    pub fn apply(&self, event: SourceEvent) {
        match event {
            SourceEvent::Added { name, definition }
            | SourceEvent::Modified { name, definition } => {
                // the error was already logged by `load`
                let _ = self.load(&name, &definition);
            }
            SourceEvent::Deleted { name } => {
                self.remove(&name);
            }
        }
    }

    /// Apply events until the stream ends
    pub async fn consume<S>(&self, events: S)
    where
        S: Stream<Item = SourceEvent>,
    {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            self.apply(event);
        }
    }

    /// Is `subject` permitted `permission` under the policy `policy_name`?
    ///
    /// # Errors
    ///
    /// [`AuthzError::UnknownPolicy`] when no policy is active under the name,
    /// plus everything [`Policy::is_permitted`] returns.
    pub fn is_permitted(
        &self,
        policy_name: &str,
        subject: &Subject,
        permission: &str,
    ) -> Result<bool> {
        let policy = self
            .get_policy(policy_name)
            .ok_or_else(|| AuthzError::UnknownPolicy(policy_name.to_string()))?;
        policy.is_permitted(subject, permission)
    }

    /// Names of active policies, sorted
    pub fn policy_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.policies.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of active policies
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// True when no policy is active
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Permission cache shared by all policies of this registry
    pub fn permission_cache(&self) -> &Arc<PermissionCache> {
        &self.permission_cache
    }

    /// Registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::with_cel(RegistryConfig::default())
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("policies", &self.policy_names())
            .field("config", &self.config)
            .finish()
    }
}
