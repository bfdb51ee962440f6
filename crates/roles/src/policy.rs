//! Department-role helpers for model policies.
//!
//! Policies for branch-scoped models compose these checks with their own
//! rules (super-admin bypass, ownership, ...).

use deptauthz_auth::RequestContext;
use deptauthz_core::{AuthorizationError, AuthzResult, BranchId, PrincipalId};

use crate::resolver::{BranchDepartmentPermissionResolver, DepartmentRoles};
use crate::view_as::RESTRICTED_VIEW_AS;

pub const POLICY_DENY_STATUS_CODE: u16 = 406;

/// A model that belongs to a branch.
pub trait BranchScoped {
    fn branch_id(&self) -> Option<BranchId>;

    fn creator_id(&self) -> Option<PrincipalId> {
        None
    }

    /// Department whose roles govern this model; the configured default when `None`.
    fn department_name(&self) -> Option<&str> {
        None
    }
}

#[derive(Clone)]
pub struct DepartmentPolicy {
    roles: DepartmentRoles,
}

impl DepartmentPolicy {
    pub fn new(roles: DepartmentRoles) -> Self {
        Self { roles }
    }

    pub fn department_name_for<M: BranchScoped>(&self, model: &M) -> String {
        model
            .department_name()
            .unwrap_or_else(|| self.roles.registry().default_department_name())
            .to_string()
    }

    fn resolver_for<M: BranchScoped>(
        &self,
        request: &RequestContext,
        model: &M,
    ) -> AuthzResult<BranchDepartmentPermissionResolver> {
        Ok(self
            .roles
            .resolver(request)?
            .for_department(self.department_name_for(model)))
    }

    /// Any of `relations` at the model's branch (HQ checker when the model
    /// lives at headquarters). Models without a branch are denied.
    pub fn has_role_for_model<M: BranchScoped>(
        &self,
        request: &RequestContext,
        model: &M,
        relations: &[String],
    ) -> AuthzResult<bool> {
        let Some(branch_id) = model.branch_id() else {
            return Ok(false);
        };
        let resolver = self.resolver_for(request, model)?;
        if self.roles.models().is_main_branch(branch_id) {
            Ok(resolver.has_any_hq_role(Some(relations)))
        } else {
            Ok(resolver.has_any_branch_role(branch_id, Some(relations)))
        }
    }

    pub fn has_manager_or_engineer_role_for_model<M: BranchScoped>(
        &self,
        request: &RequestContext,
        model: &M,
    ) -> AuthzResult<bool> {
        let relations = self.roles.registry().manager_and_engineer_relations();
        self.has_role_for_model(request, model, &relations)
    }

    pub fn has_manager_role_for_model<M: BranchScoped>(
        &self,
        request: &RequestContext,
        model: &M,
    ) -> AuthzResult<bool> {
        let Some(manager) = self.roles.registry().manager_relation() else {
            return Ok(false);
        };
        self.has_role_for_model(request, model, &[manager])
    }

    /// Standard roles plus `custom_roles` relations.
    pub fn has_any_role_for_model<M: BranchScoped>(
        &self,
        request: &RequestContext,
        model: &M,
        custom_roles: &[String],
    ) -> AuthzResult<bool> {
        let relations = self
            .roles
            .registry()
            .merge_custom_roles_with_defaults(custom_roles);
        self.has_role_for_model(request, model, &relations)
    }

    /// Restricted view-as modes (`private`, `draft`) need a standard role at
    /// headquarters or at the model's branch. Other modes, or no view-as
    /// value, are allowed.
    pub fn has_view_as_permission<M: BranchScoped>(
        &self,
        request: &RequestContext,
        model: &M,
    ) -> AuthzResult<bool> {
        let Some(view_as) = request.view_as().filter(|v| !v.is_empty()) else {
            return Ok(true);
        };
        if !RESTRICTED_VIEW_AS.contains(&view_as) {
            return Ok(true);
        }

        let relations = self.roles.registry().all_default_role_relations();
        let resolver = self.resolver_for(request, model)?;
        if resolver.has_any_hq_role(Some(relations.as_slice())) {
            return Ok(true);
        }
        Ok(match model.branch_id() {
            Some(branch_id) => resolver.has_any_branch_role(branch_id, Some(relations.as_slice())),
            // No branch to check against: deny instead of falling back to
            // the plain view-as allow-list, which would always match here.
            None => false,
        })
    }

    pub fn is_creator<M: BranchScoped>(&self, principal_id: PrincipalId, model: &M) -> bool {
        model.creator_id() == Some(principal_id)
    }

    pub fn authorize_or_fail(&self, authorized: bool, message: &str) -> AuthzResult<()> {
        if authorized {
            Ok(())
        } else {
            Err(AuthorizationError::unauthorized(message, POLICY_DENY_STATUS_CODE))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{DepartmentRolesConfig, RoleSettings, RoleTable};
    use crate::memory::InMemoryDirectory;
    use crate::registry::RoleRegistry;
    use deptauthz_auth::PrincipalRecord;

    const HQ: BranchId = BranchId::new(1);
    const SOUTH: BranchId = BranchId::new(4);
    const BOB: PrincipalId = PrincipalId::new(20);

    struct Ticket {
        branch_id: Option<BranchId>,
        creator_id: PrincipalId,
        department: Option<&'static str>,
    }

    impl BranchScoped for Ticket {
        fn branch_id(&self) -> Option<BranchId> {
            self.branch_id
        }

        fn creator_id(&self) -> Option<PrincipalId> {
            Some(self.creator_id)
        }

        fn department_name(&self) -> Option<&str> {
            self.department
        }
    }

    fn ticket(branch_id: Option<BranchId>) -> Ticket {
        Ticket {
            branch_id,
            creator_id: BOB,
            department: None,
        }
    }

    fn setup() -> (DepartmentPolicy, Arc<InMemoryDirectory>) {
        let on = RoleSettings {
            enabled: Some(true),
            ..RoleSettings::default()
        };
        let config = DepartmentRolesConfig {
            default_roles: RoleTable::new()
                .with("manager", on.clone())
                .with("engineer", on.clone())
                .with("rep", on.clone())
                .with("auditor", on),
            ..DepartmentRolesConfig::default()
        };
        let directory = InMemoryDirectory::arc();
        directory.add_branch(HQ, "HQ");
        directory.add_branch(SOUTH, "South");
        directory.add_principal(PrincipalRecord::new(BOB).with_home_branch(SOUTH));
        let roles = DepartmentRoles::new(
            Arc::new(RoleRegistry::new(Arc::new(config))),
            Arc::new(directory.models(HQ)),
        );
        (DepartmentPolicy::new(roles), directory)
    }

    #[test]
    fn manager_role_is_checked_at_the_model_branch() {
        let (policy, directory) = setup();
        let request = RequestContext::authenticated(BOB);
        directory.assign(SOUTH, "Electric", "engineer", BOB);

        assert!(policy.has_manager_or_engineer_role_for_model(&request, &ticket(Some(SOUTH))).unwrap());
        assert!(!policy.has_manager_role_for_model(&request, &ticket(Some(SOUTH))).unwrap());
        assert!(!policy.has_manager_or_engineer_role_for_model(&request, &ticket(Some(HQ))).unwrap());
        assert!(!policy.has_manager_or_engineer_role_for_model(&request, &ticket(None)).unwrap());
    }

    #[test]
    fn model_department_overrides_default() {
        let (policy, directory) = setup();
        let request = RequestContext::authenticated(BOB);
        directory.assign(SOUTH, "Plumbing", "manager", BOB);

        let mut plumbing = ticket(Some(SOUTH));
        plumbing.department = Some("Plumbing");
        assert_eq!(policy.department_name_for(&plumbing), "Plumbing");
        assert!(policy.has_manager_role_for_model(&request, &plumbing).unwrap());
        assert!(!policy.has_manager_role_for_model(&request, &ticket(Some(SOUTH))).unwrap());
    }

    #[test]
    fn custom_roles_extend_the_standard_set() {
        let (policy, directory) = setup();
        let request = RequestContext::authenticated(BOB);
        directory.assign(HQ, "Electric", "auditor", BOB);

        assert!(!policy.has_any_role_for_model(&request, &ticket(Some(HQ)), &[]).unwrap());
        let auditors = vec!["auditors".to_string()];
        assert!(policy.has_any_role_for_model(&request, &ticket(Some(HQ)), &auditors).unwrap());
    }

    #[test]
    fn restricted_view_as_needs_a_standard_role() {
        let (policy, directory) = setup();
        let draft = RequestContext::authenticated(BOB).with_query("view_as", "draft");
        let public = RequestContext::authenticated(BOB).with_query("view_as", "public");

        assert!(policy.has_view_as_permission(&RequestContext::authenticated(BOB), &ticket(None)).unwrap());
        assert!(policy.has_view_as_permission(&public, &ticket(None)).unwrap());
        assert!(!policy.has_view_as_permission(&draft, &ticket(Some(SOUTH))).unwrap());

        directory.assign(SOUTH, "Electric", "rep", BOB);
        assert!(policy.has_view_as_permission(&draft, &ticket(Some(SOUTH))).unwrap());
        assert!(!policy.has_view_as_permission(&draft, &ticket(None)).unwrap());

        directory.assign(HQ, "Electric", "manager", BOB);
        assert!(policy.has_view_as_permission(&draft, &ticket(None)).unwrap());
    }

    #[test]
    fn creator_and_denial() {
        let (policy, _) = setup();
        assert!(policy.is_creator(BOB, &ticket(None)));
        assert!(!policy.is_creator(PrincipalId::new(1), &ticket(None)));

        assert!(policy.authorize_or_fail(true, "nope").is_ok());
        let err = policy.authorize_or_fail(false, "nope").unwrap_err();
        assert_eq!(err.status_code(), 406);
        assert_eq!(err.to_string(), "nope");
    }
}
