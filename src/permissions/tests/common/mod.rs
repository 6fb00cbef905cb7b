//! Shared helpers for integration tests

#![allow(dead_code)]

use cretoai_permissions::{
    GrantDefinition, PolicyDefinition, PolicyRegistry, RegistryConfig, RoleDefinition,
};

/// Install a test subscriber honouring `RUST_LOG`; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cretoai_permissions=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn registry() -> PolicyRegistry {
    init_tracing();
    PolicyRegistry::with_cel(RegistryConfig::default())
}

pub fn role(name: &str, permissions: &[&str], implied: &[&str]) -> RoleDefinition {
    RoleDefinition {
        name: name.to_string(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        implied_roles: implied.iter().map(|r| r.to_string()).collect(),
    }
}

pub fn grant(test: &str, then_grant: &str) -> GrantDefinition {
    GrantDefinition {
        test: test.to_string(),
        then_grant: then_grant.to_string(),
    }
}

pub fn definition(roles: Vec<RoleDefinition>, grants: Vec<GrantDefinition>) -> PolicyDefinition {
    PolicyDefinition { roles, grants }
}
