use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use deptauthz_core::{BranchId, LookupError, PrincipalId};

use crate::Permission;

/// A principal as seen by the authorization core.
///
/// Role assignments are not part of this record; they live in the department
/// membership store and are only queried, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalRecord {
    pub id: PrincipalId,

    /// The principal's home branch. Resolution always evaluates it.
    #[serde(default)]
    pub home_branch_id: Option<BranchId>,

    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
}

impl PrincipalRecord {
    pub fn new(id: PrincipalId) -> Self {
        Self {
            id,
            home_branch_id: None,
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_home_branch(mut self, branch_id: BranchId) -> Self {
        self.home_branch_id = Some(branch_id);
        self
    }

    pub fn with_permissions<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    /// Permission accessor; empty when the principal holds none.
    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }
}

/// Principal lookup contract implemented by the host (ORM, directory, ...).
pub trait PrincipalStore: Send + Sync {
    /// Returns `Ok(None)` when no principal has this id.
    fn find_principal(&self, id: PrincipalId) -> Result<Option<PrincipalRecord>, LookupError>;
}
