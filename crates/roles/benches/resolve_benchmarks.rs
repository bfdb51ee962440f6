use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use deptauthz_auth::{PrincipalRecord, RequestContext};
use deptauthz_core::{BranchId, PrincipalId};
use deptauthz_roles::{
    CacheConfig, DepartmentRoles, DepartmentRolesConfig, InMemoryCacheStore, InMemoryDirectory,
    RoleRegistry, RoleSettings, RoleTable,
};
use std::sync::Arc;

const HQ: BranchId = BranchId::new(1);
const PRINCIPAL: PrincipalId = PrincipalId::new(42);

fn config(role_count: usize, cache_enabled: bool) -> DepartmentRolesConfig {
    let mut table = RoleTable::new();
    for i in 0..role_count {
        table.insert(
            format!("role{i}"),
            RoleSettings {
                enabled: Some(true),
                ..RoleSettings::default()
            },
        );
    }
    DepartmentRolesConfig {
        default_roles: table,
        cache: CacheConfig {
            enabled: cache_enabled,
            ..CacheConfig::default()
        },
        ..DepartmentRolesConfig::default()
    }
}

/// Directory with `branch_count` branches; the principal holds the last role
/// at every branch so each check scans the whole role list.
fn world(role_count: usize, branch_count: u64) -> (DepartmentRoles, Vec<BranchId>) {
    let directory = InMemoryDirectory::arc();
    let branches: Vec<BranchId> = (1..=branch_count).map(BranchId::new).collect();
    for id in &branches {
        directory.add_branch(*id, format!("branch {id}"));
        directory.assign(*id, "Electric", &format!("role{}", role_count - 1), PRINCIPAL);
    }
    directory.add_principal(PrincipalRecord::new(PRINCIPAL).with_home_branch(HQ));

    let registry = Arc::new(RoleRegistry::new(Arc::new(config(role_count, false))));
    let roles = DepartmentRoles::new(registry, Arc::new(directory.models(HQ)));
    (roles, branches)
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    let request = RequestContext::authenticated(PRINCIPAL);

    for branch_count in [1u64, 10, 50] {
        let (roles, branches) = world(3, branch_count);
        group.throughput(Throughput::Elements(branch_count * 3));
        group.bench_with_input(
            BenchmarkId::new("permission_map", branch_count),
            &branch_count,
            |b, _| {
                b.iter(|| {
                    let resolver = roles
                        .resolver(&request)
                        .unwrap()
                        .for_branches(branches.iter().copied());
                    black_box(resolver.resolve(None).unwrap())
                })
            },
        );
    }

    group.finish();
}

fn bench_has_any_role(c: &mut Criterion) {
    let mut group = c.benchmark_group("has_any_branch_role");
    let request = RequestContext::authenticated(PRINCIPAL);

    for role_count in [3usize, 20] {
        let (roles, _) = world(role_count, 2);
        let resolver = roles.resolver(&request).unwrap();
        group.bench_with_input(
            BenchmarkId::new("last_relation_matches", role_count),
            &role_count,
            |b, _| b.iter(|| black_box(resolver.has_any_branch_role(BranchId::new(2), None))),
        );
    }

    group.finish();
}

fn bench_catalogue_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalogue_load");

    group.bench_function("fresh", |b| {
        let registry = RoleRegistry::new(Arc::new(config(20, false)));
        b.iter(|| black_box(registry.load()))
    });

    group.bench_function("cache_hit", |b| {
        let registry =
            RoleRegistry::with_cache(Arc::new(config(20, true)), InMemoryCacheStore::arc());
        registry.load();
        b.iter(|| black_box(registry.load()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_resolve,
    bench_has_any_role,
    bench_catalogue_load
);
criterion_main!(benches);
