//! Headquarters and branch role checkers.
//!
//! Both answer "does the principal hold any of these relations in the named
//! department of a branch" and differ only in how the branch is chosen. They
//! never raise: an unconfigured store, an unknown branch or an unknown relation
//! is a negative answer.

use std::sync::Arc;

use deptauthz_core::{BranchId, PrincipalId};

use crate::models::{AuthorizationModels, BranchRecord};
use crate::registry::RoleRegistry;

/// Role checker bound to one principal.
#[derive(Clone)]
pub struct RoleChecker {
    registry: Arc<RoleRegistry>,
    models: Arc<AuthorizationModels>,
    principal_id: PrincipalId,
}

impl RoleChecker {
    pub fn new(
        registry: Arc<RoleRegistry>,
        models: Arc<AuthorizationModels>,
        principal_id: PrincipalId,
    ) -> Self {
        Self {
            registry,
            models,
            principal_id,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    /// Checks the headquarters branch.
    pub fn hq_role_checker<S: AsRef<str>>(&self, relations: &[S], department: &str) -> bool {
        let branch = match self.models.main_branch() {
            Ok(Some(branch)) => branch,
            Ok(None) => {
                tracing::debug!(
                    branch_id = %self.models.main_branch_id(),
                    "headquarters branch not found"
                );
                return false;
            }
            Err(err) => {
                tracing::warn!(error = %err, "headquarters role check skipped");
                return false;
            }
        };
        self.holds_any(&branch, relations, department)
    }

    /// Checks an explicit branch; an absent id is a negative answer.
    pub fn branch_role_checker<S: AsRef<str>>(
        &self,
        branch_id: Option<BranchId>,
        relations: &[S],
        department: &str,
    ) -> bool {
        let Some(branch_id) = branch_id else {
            return false;
        };
        let branch = match self.models.branch_by_id(branch_id) {
            Ok(Some(branch)) => branch,
            Ok(None) => {
                tracing::debug!(branch_id = %branch_id, "branch not found");
                return false;
            }
            Err(err) => {
                tracing::warn!(branch_id = %branch_id, error = %err, "branch role check skipped");
                return false;
            }
        };
        self.holds_any(&branch, relations, department)
    }

    /// Relations are evaluated in order; the first match wins.
    fn holds_any<S: AsRef<str>>(
        &self,
        branch: &BranchRecord,
        relations: &[S],
        department: &str,
    ) -> bool {
        let departments = match self.models.departments() {
            Ok(store) => store,
            Err(err) => {
                tracing::warn!(branch_id = %branch.id, error = %err, "role check skipped");
                return false;
            }
        };

        for relation in relations {
            let relation = relation.as_ref();
            let Some(query) = self.registry.relation_query(relation) else {
                tracing::debug!(relation, "relation is not an active department role");
                continue;
            };
            match departments.has_member(branch, department, &query, self.principal_id) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        branch_id = %branch.id,
                        relation,
                        department,
                        error = %err,
                        "membership query failed"
                    );
                }
            }
        }
        false
    }
}
