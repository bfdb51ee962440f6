//! Department-role authorization.
//!
//! - `config`: configuration tree
//! - `registry`: role catalogue and lookups
//! - `models`: collaborator stores and the headquarters id
//! - `checker`: headquarters and branch role checkers
//! - `resolver`: per-principal permission maps
//! - `policy`: helpers for branch-scoped model policies

pub mod cache;
pub mod checker;
pub mod config;
pub mod memory;
pub mod models;
pub mod policy;
pub mod registry;
pub mod resolver;
pub mod view_as;

pub use cache::{CacheStore, Clock, InMemoryCacheStore};
pub use checker::RoleChecker;
pub use config::{
    AuthorizationConfig, CacheConfig, ConfigError, DepartmentRolesConfig, RoleSettings, RoleTable,
    ValidationConfig,
};
pub use memory::{BranchFixture, DepartmentFixture, DirectoryFixture, InMemoryDirectory, MemberFixture};
pub use models::{AuthorizationModels, BranchRecord, BranchStore, DepartmentStore};
pub use policy::{BranchScoped, DepartmentPolicy};
pub use registry::{
    RelationQuery, RoleCatalogue, RoleDefinition, RoleRegistry, ValidationError, ValidationRules,
};
pub use resolver::{BranchDepartmentPermissionResolver, CustomRoleSetting, DepartmentRoles, PermissionMap};
pub use view_as::check_view_as_permissions;
