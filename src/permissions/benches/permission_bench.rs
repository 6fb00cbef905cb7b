//! Permission engine benchmarks
//!
//! Parsing (cold and cached), implication, and full policy decisions over
//! role graphs of increasing depth.

use cretoai_permissions::{
    GrantDefinition, Permission, PermissionCache, PolicyDefinition, PolicyRegistry,
    RegistryConfig, RoleDefinition, Subject,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    group.bench_function("uncached", |b| {
        b.iter(|| Permission::parse(black_box("document:read,write,delete:folder:item")))
    });

    let cache = PermissionCache::default();
    group.bench_function("cached", |b| {
        b.iter(|| cache.get_or_parse(black_box("document:read,write,delete:folder:item")))
    });

    group.finish();
}

fn bench_implies(c: &mut Criterion) {
    let held = Permission::parse("document:read,write:*").unwrap();
    let requested = Permission::parse("document:read:folder:item").unwrap();
    let miss = Permission::parse("document:delete:folder").unwrap();

    c.bench_function("implies_hit", |b| {
        b.iter(|| black_box(&held).implies(black_box(&requested)))
    });
    c.bench_function("implies_miss", |b| {
        b.iter(|| black_box(&held).implies(black_box(&miss)))
    });
}

/// Chain of `depth` roles where `role-0` implies `role-1` and so on; only the
/// last role holds the permission
fn role_chain(depth: usize) -> PolicyDefinition {
    let roles = (0..depth)
        .map(|i| RoleDefinition {
            name: format!("role-{}", i),
            permissions: if i + 1 == depth {
                vec!["document:read".to_string()]
            } else {
                vec![format!("other-{}", i)]
            },
            implied_roles: if i + 1 < depth {
                vec![format!("role-{}", i + 1)]
            } else {
                vec![]
            },
        })
        .collect();

    PolicyDefinition {
        roles,
        grants: vec![GrantDefinition {
            test: "subject.authenticated".to_string(),
            then_grant: "profile:read".to_string(),
        }],
    }
}

fn bench_is_permitted(c: &mut Criterion) {
    let mut group = c.benchmark_group("is_permitted");

    for depth in [1, 10, 100].iter() {
        let registry = PolicyRegistry::with_cel(RegistryConfig::default());
        registry.load("bench", &role_chain(*depth)).unwrap();
        let policy = registry.get_policy("bench").unwrap();
        let subject = Subject::new("alice").authenticated().with_role("role-0");

        group.bench_with_input(BenchmarkId::new("role_depth", depth), depth, |b, _| {
            b.iter(|| policy.is_permitted(black_box(&subject), black_box("document:read:42")))
        });
    }

    let registry = PolicyRegistry::with_cel(RegistryConfig::default());
    registry.load("bench", &role_chain(1)).unwrap();
    let subject = Subject::new("alice").authenticated();
    group.bench_function("cel_grant", |b| {
        b.iter(|| registry.is_permitted("bench", black_box(&subject), black_box("profile:read")))
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_implies, bench_is_permitted);
criterion_main!(benches);
