//! Registry configuration

use crate::permission::PermissionCacheConfig;
use crate::predicate::cel::DEFAULT_MAX_PROGRAMS;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding the permission cache size
pub const ENV_CACHE_SIZE: &str = "PERMISSION_CACHE_SIZE";

/// Environment variable overriding the permission cache idle TTL, in seconds
pub const ENV_CACHE_TTL: &str = "PERMISSION_CACHE_TTL";

/// Policy registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Shared permission parse cache
    #[serde(default)]
    pub permission_cache: PermissionCacheConfig,

    /// Log a warning when a loaded policy has cyclic role implication
    #[serde(default = "default_warn_on_role_cycles")]
    pub warn_on_role_cycles: bool,

    /// Bound on compiled CEL programs kept by [`crate::PolicyRegistry::with_cel`]
    #[serde(default = "default_max_cel_programs")]
    pub max_cel_programs: usize,
}

fn default_warn_on_role_cycles() -> bool {
    true
}

fn default_max_cel_programs() -> usize {
    DEFAULT_MAX_PROGRAMS
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            permission_cache: PermissionCacheConfig::default(),
            warn_on_role_cycles: default_warn_on_role_cycles(),
            max_cel_programs: default_max_cel_programs(),
        }
    }
}

impl RegistryConfig {
    /// Defaults, overridden by `PERMISSION_CACHE_SIZE` and `PERMISSION_CACHE_TTL`
    ///
    /// Invalid values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CACHE_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(size) => config.permission_cache.max_entries = size,
                Err(e) => warn!("Ignoring {}={:?}: {}", ENV_CACHE_SIZE, raw, e),
            }
        }

        if let Some(raw) = lookup(ENV_CACHE_TTL) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => config.permission_cache.idle_ttl = Duration::from_secs(secs),
                Err(e) => warn!("Ignoring {}={:?}: {}", ENV_CACHE_TTL, raw, e),
            }
        }

        config
    }
}
