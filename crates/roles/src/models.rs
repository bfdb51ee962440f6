//! Collaborator registry: the principal, branch and department stores plus
//! the headquarters branch id.
//!
//! Configured once at startup, then shared read-only by `Arc`. Accessors fail
//! loudly (`LookupError::NotConfigured`) when a store was never registered;
//! role checkers downgrade that to `false`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use deptauthz_auth::{PrincipalRecord, PrincipalStore};
use deptauthz_core::{AuthorizationError, AuthzResult, BranchId, LookupError, ModelKind, PrincipalId};

use crate::config::DEFAULT_MAIN_BRANCH_ID;
use crate::registry::RelationQuery;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub id: BranchId,
    #[serde(default)]
    pub name: String,
}

pub trait BranchStore: Send + Sync {
    /// Returns `Ok(None)` when no branch has this id.
    fn find_branch(&self, id: BranchId) -> Result<Option<BranchRecord>, LookupError>;
}

pub trait DepartmentStore: Send + Sync {
    /// Whether `branch` has a department named `department` whose `relation`
    /// membership includes `principal`.
    fn has_member(
        &self,
        branch: &BranchRecord,
        department: &str,
        relation: &RelationQuery,
        principal: PrincipalId,
    ) -> Result<bool, LookupError>;
}

#[derive(Clone)]
pub struct AuthorizationModels {
    principals: Option<Arc<dyn PrincipalStore>>,
    branches: Option<Arc<dyn BranchStore>>,
    departments: Option<Arc<dyn DepartmentStore>>,
    main_branch_id: BranchId,
}

impl Default for AuthorizationModels {
    fn default() -> Self {
        Self {
            principals: None,
            branches: None,
            departments: None,
            main_branch_id: DEFAULT_MAIN_BRANCH_ID,
        }
    }
}

impl core::fmt::Debug for AuthorizationModels {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthorizationModels")
            .field("principals", &self.principals.is_some())
            .field("branches", &self.branches.is_some())
            .field("departments", &self.departments.is_some())
            .field("main_branch_id", &self.main_branch_id)
            .finish()
    }
}

impl AuthorizationModels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_principals(mut self, store: Arc<dyn PrincipalStore>) -> Self {
        self.principals = Some(store);
        self
    }

    pub fn with_branches(mut self, store: Arc<dyn BranchStore>) -> Self {
        self.branches = Some(store);
        self
    }

    pub fn with_departments(mut self, store: Arc<dyn DepartmentStore>) -> Self {
        self.departments = Some(store);
        self
    }

    pub fn with_main_branch_id(mut self, id: BranchId) -> Self {
        self.main_branch_id = id;
        self
    }

    pub fn principals(&self) -> Result<&Arc<dyn PrincipalStore>, LookupError> {
        self.principals
            .as_ref()
            .ok_or(LookupError::NotConfigured(ModelKind::Principal))
    }

    pub fn branches(&self) -> Result<&Arc<dyn BranchStore>, LookupError> {
        self.branches
            .as_ref()
            .ok_or(LookupError::NotConfigured(ModelKind::Branch))
    }

    pub fn departments(&self) -> Result<&Arc<dyn DepartmentStore>, LookupError> {
        self.departments
            .as_ref()
            .ok_or(LookupError::NotConfigured(ModelKind::Department))
    }

    pub fn main_branch_id(&self) -> BranchId {
        self.main_branch_id
    }

    pub fn is_main_branch(&self, id: BranchId) -> bool {
        id == self.main_branch_id
    }

    pub fn principal_by_id(&self, id: PrincipalId) -> Result<Option<PrincipalRecord>, LookupError> {
        self.principals()?.find_principal(id)
    }

    pub fn branch_by_id(&self, id: BranchId) -> Result<Option<BranchRecord>, LookupError> {
        self.branches()?.find_branch(id)
    }

    pub fn main_branch(&self) -> Result<Option<BranchRecord>, LookupError> {
        self.branch_by_id(self.main_branch_id)
    }

    pub fn is_configured(&self) -> bool {
        self.missing().is_empty()
    }

    fn missing(&self) -> Vec<ModelKind> {
        let mut missing = Vec::new();
        if self.branches.is_none() {
            missing.push(ModelKind::Branch);
        }
        if self.departments.is_none() {
            missing.push(ModelKind::Department);
        }
        if self.principals.is_none() {
            missing.push(ModelKind::Principal);
        }
        missing
    }

    pub fn validate_configuration(&self) -> AuthzResult<()> {
        let missing = self.missing();
        if missing.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = missing.iter().map(|k| k.as_str()).collect();
        Err(AuthorizationError::misconfiguration(format!(
            "authorization models are not fully configured; missing: {}",
            names.join(", ")
        )))
    }

    /// Drops every store and restores the default headquarters id.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
