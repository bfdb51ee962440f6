//! In-memory directory for tests, benchmarks and the CLI.
//!
//! Implements all three collaborator stores over one fixture: principals,
//! branches, and per-branch departments with their role memberships.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use deptauthz_auth::{PrincipalRecord, PrincipalStore};
use deptauthz_core::{BranchId, LookupError, PrincipalId};

use crate::config::ConfigError;
use crate::models::{AuthorizationModels, BranchRecord, BranchStore, DepartmentStore};
use crate::registry::RelationQuery;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFixture {
    pub principal_id: PrincipalId,
    pub dep_role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentFixture {
    pub name: String,
    #[serde(default)]
    pub members: Vec<MemberFixture>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFixture {
    pub id: BranchId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub departments: Vec<DepartmentFixture>,
}

/// Serialized form of an [`InMemoryDirectory`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryFixture {
    #[serde(default)]
    pub principals: Vec<PrincipalRecord>,
    #[serde(default)]
    pub branches: Vec<BranchFixture>,
}

impl DirectoryFixture {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct MembershipKey {
    branch_id: BranchId,
    department: String,
    dep_role: String,
}

#[derive(Debug, Default)]
struct DirectoryState {
    principals: BTreeMap<PrincipalId, PrincipalRecord>,
    branches: BTreeMap<BranchId, BranchRecord>,
    memberships: BTreeMap<MembershipKey, BTreeSet<PrincipalId>>,
    failing_departments: BTreeSet<String>,
}

/// Principal, branch and department store backed by maps.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
    membership_queries: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn from_fixture(fixture: DirectoryFixture) -> Self {
        let directory = Self::new();
        for principal in fixture.principals {
            directory.add_principal(principal);
        }
        for branch in fixture.branches {
            directory.add_branch(branch.id, branch.name);
            for department in branch.departments {
                for member in department.members {
                    directory.assign(branch.id, &department.name, &member.dep_role, member.principal_id);
                }
            }
        }
        directory
    }

    /// Models wired to this directory for all three stores.
    pub fn models(self: &Arc<Self>, main_branch_id: BranchId) -> AuthorizationModels {
        AuthorizationModels::new()
            .with_principals(self.clone())
            .with_branches(self.clone())
            .with_departments(self.clone())
            .with_main_branch_id(main_branch_id)
    }

    pub fn add_principal(&self, principal: PrincipalRecord) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.principals.insert(principal.id, principal);
    }

    pub fn add_branch(&self, id: BranchId, name: impl Into<String>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.branches.insert(
            id,
            BranchRecord {
                id,
                name: name.into(),
            },
        );
    }

    /// Gives `principal` the `dep_role` position in `department` at `branch_id`.
    pub fn assign(&self, branch_id: BranchId, department: &str, dep_role: &str, principal: PrincipalId) {
        let key = MembershipKey {
            branch_id,
            department: department.to_string(),
            dep_role: dep_role.to_string(),
        };
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.memberships.entry(key).or_default().insert(principal);
    }

    pub fn revoke(&self, branch_id: BranchId, department: &str, dep_role: &str, principal: PrincipalId) {
        let key = MembershipKey {
            branch_id,
            department: department.to_string(),
            dep_role: dep_role.to_string(),
        };
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(members) = state.memberships.get_mut(&key) {
            members.remove(&principal);
        }
    }

    /// Membership queries against `department` fail with a store error.
    pub fn fail_department(&self, department: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.failing_departments.insert(department.to_string());
    }

    /// Number of membership queries answered so far.
    pub fn membership_queries(&self) -> usize {
        self.membership_queries.load(Ordering::Relaxed)
    }
}

impl PrincipalStore for InMemoryDirectory {
    fn find_principal(&self, id: PrincipalId) -> Result<Option<PrincipalRecord>, LookupError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.principals.get(&id).cloned())
    }
}

impl BranchStore for InMemoryDirectory {
    fn find_branch(&self, id: BranchId) -> Result<Option<BranchRecord>, LookupError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.branches.get(&id).cloned())
    }
}

impl DepartmentStore for InMemoryDirectory {
    fn has_member(
        &self,
        branch: &BranchRecord,
        department: &str,
        relation: &RelationQuery,
        principal: PrincipalId,
    ) -> Result<bool, LookupError> {
        self.membership_queries.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.failing_departments.contains(department) {
            return Err(LookupError::store(format!(
                "department {department} unavailable at branch {}",
                branch.id
            )));
        }
        let key = MembershipKey {
            branch_id: branch.id,
            department: department.to_string(),
            dep_role: relation.dep_role_value.clone(),
        };
        Ok(state
            .memberships
            .get(&key)
            .is_some_and(|members| members.contains(&principal)))
    }
}
