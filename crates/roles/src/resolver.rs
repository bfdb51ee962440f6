//! Branch-department permission resolver.
//!
//! Computes, for one principal, which department roles apply at headquarters
//! and at each evaluated branch, as a flat map keyed `is_hq_<role>` /
//! `is_<branch>_<role>`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use deptauthz_auth::RequestContext;
use deptauthz_core::{AuthorizationError, AuthzResult, BranchId, PrincipalId};

use crate::checker::RoleChecker;
use crate::models::AuthorizationModels;
use crate::registry::{RoleDefinition, RoleRegistry};
use crate::view_as::check_view_as_permissions;

/// Flat permission map owned by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(BTreeMap<String, bool>);

impl PermissionMap {
    pub fn hq_key(role: &RoleDefinition) -> String {
        format!("is_hq_{}", role.permission_suffix())
    }

    pub fn branch_key(branch_id: BranchId, role: &RoleDefinition) -> String {
        format!("is_{}_{}", branch_id, role.permission_suffix())
    }

    pub fn insert(&mut self, key: String, allowed: bool) {
        self.0.insert(key, allowed);
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.0.get(key).copied()
    }

    /// `false` for keys that were never evaluated.
    pub fn is_allowed(&self, key: &str) -> bool {
        self.get(key).unwrap_or(false)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, bool> {
        self.0
    }
}

/// Per-relation toggle for [`BranchDepartmentPermissionResolver::resolve_with_custom_settings`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomRoleSetting {
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl CustomRoleSetting {
    pub fn enabled() -> Self {
        Self {
            enabled: Some(true),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: Some(false),
        }
    }

    /// Only an explicit `false` disables.
    pub fn is_disabled(&self) -> bool {
        self.enabled == Some(false)
    }
}

/// Process-scoped handles the resolver needs, shared by `Arc`.
#[derive(Clone)]
pub struct DepartmentRoles {
    registry: Arc<RoleRegistry>,
    models: Arc<AuthorizationModels>,
}

impl DepartmentRoles {
    pub fn new(registry: Arc<RoleRegistry>, models: Arc<AuthorizationModels>) -> Self {
        Self { registry, models }
    }

    pub fn registry(&self) -> &Arc<RoleRegistry> {
        &self.registry
    }

    pub fn models(&self) -> &Arc<AuthorizationModels> {
        &self.models
    }

    /// Resolver for the principal authenticated on `request`.
    pub fn resolver(&self, request: &RequestContext) -> AuthzResult<BranchDepartmentPermissionResolver> {
        BranchDepartmentPermissionResolver::make(self, request, None)
    }

    /// Resolver for an explicit principal; falls back to the authenticated one.
    pub fn resolver_for(
        &self,
        request: &RequestContext,
        principal_id: Option<PrincipalId>,
    ) -> AuthzResult<BranchDepartmentPermissionResolver> {
        BranchDepartmentPermissionResolver::make(self, request, principal_id)
    }
}

pub struct BranchDepartmentPermissionResolver {
    roles: DepartmentRoles,
    request: RequestContext,
    checker: RoleChecker,
    filtered_branch_ids: Vec<BranchId>,
    department_name: Option<String>,
}

impl BranchDepartmentPermissionResolver {
    /// Fails with `Unauthenticated` when neither `principal_id` nor the request
    /// carries a principal.
    pub fn make(
        roles: &DepartmentRoles,
        request: &RequestContext,
        principal_id: Option<PrincipalId>,
    ) -> AuthzResult<Self> {
        let principal_id = principal_id.or(request.principal_id()).ok_or_else(|| {
            AuthorizationError::unauthenticated("department roles require an authenticated principal")
        })?;
        Ok(Self {
            checker: RoleChecker::new(roles.registry.clone(), roles.models.clone(), principal_id),
            roles: roles.clone(),
            request: request.clone(),
            filtered_branch_ids: Vec::new(),
            department_name: None,
        })
    }

    pub fn for_user(mut self, principal_id: PrincipalId) -> Self {
        self.checker = RoleChecker::new(
            self.roles.registry.clone(),
            self.roles.models.clone(),
            principal_id,
        );
        self
    }

    pub fn for_branches(mut self, branch_ids: impl IntoIterator<Item = BranchId>) -> Self {
        self.filtered_branch_ids = branch_ids.into_iter().collect();
        self
    }

    pub fn for_department(mut self, department: impl Into<String>) -> Self {
        self.department_name = Some(department.into());
        self
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.checker.principal_id()
    }

    pub fn checker(&self) -> &RoleChecker {
        &self.checker
    }

    /// Department in effect: the explicit one or the configured default.
    pub fn department_name(&self) -> &str {
        self.department_name
            .as_deref()
            .unwrap_or_else(|| self.roles.registry.default_department_name())
    }

    fn registry(&self) -> &RoleRegistry {
        &self.roles.registry
    }

    fn models(&self) -> &AuthorizationModels {
        &self.roles.models
    }

    /// The principal's home branch. A missing principal store is a
    /// misconfiguration; an unknown principal has no home branch.
    pub fn home_branch_id(&self) -> AuthzResult<Option<BranchId>> {
        let record = self.models().principal_by_id(self.principal_id())?;
        Ok(record.and_then(|r| r.home_branch_id))
    }

    /// Filtered branches plus the home branch, each once, in order.
    pub fn effective_branch_ids(&self) -> AuthzResult<Vec<BranchId>> {
        let mut branch_ids: Vec<BranchId> = Vec::with_capacity(self.filtered_branch_ids.len() + 1);
        for id in &self.filtered_branch_ids {
            if !branch_ids.contains(id) {
                branch_ids.push(*id);
            }
        }
        if let Some(home) = self.home_branch_id()? {
            if !branch_ids.contains(&home) {
                branch_ids.push(home);
            }
        }
        Ok(branch_ids)
    }

    /// Resolves with `roles`, or with the active catalogue when `None`.
    pub fn resolve(&self, roles: Option<&[RoleDefinition]>) -> AuthzResult<PermissionMap> {
        let catalogue;
        let roles = match roles {
            Some(roles) => roles,
            None => {
                catalogue = self.registry().default_roles();
                catalogue.as_slice()
            }
        };

        let branch_ids = self.effective_branch_ids()?;
        let main_branch_id = self.models().main_branch_id();
        let department = self.department_name();
        let mut permissions = PermissionMap::default();

        if branch_ids.contains(&main_branch_id) {
            for role in roles {
                let allowed = self
                    .checker
                    .hq_role_checker(std::slice::from_ref(&role.relation), department);
                permissions.insert(PermissionMap::hq_key(role), allowed);
            }
        }

        for branch_id in branch_ids.iter().filter(|id| **id != main_branch_id) {
            for role in roles {
                let allowed = self.checker.branch_role_checker(
                    Some(*branch_id),
                    std::slice::from_ref(&role.relation),
                    department,
                );
                permissions.insert(PermissionMap::branch_key(*branch_id, role), allowed);
            }
        }

        tracing::debug!(
            principal_id = %self.principal_id(),
            department,
            branches = branch_ids.len(),
            entries = permissions.len(),
            "department permissions resolved"
        );
        Ok(permissions)
    }

    /// Resolves with a role set derived from per-relation toggles.
    ///
    /// Explicitly disabled relations are always dropped. With `use_defaults`
    /// the rest of the catalogue is kept; without it only relations named in
    /// `settings` (and known to the registry) are evaluated.
    pub fn resolve_with_custom_settings(
        &self,
        settings: &BTreeMap<String, CustomRoleSetting>,
        use_defaults: bool,
    ) -> AuthzResult<PermissionMap> {
        let roles = self.roles_from_settings(settings, use_defaults);
        self.resolve(Some(roles.as_slice()))
    }

    fn roles_from_settings(
        &self,
        settings: &BTreeMap<String, CustomRoleSetting>,
        use_defaults: bool,
    ) -> Vec<RoleDefinition> {
        let catalogue = self.registry().default_roles();
        catalogue
            .iter()
            .filter(|role| match settings.get(&role.relation) {
                Some(setting) => !setting.is_disabled(),
                None => use_defaults,
            })
            .cloned()
            .collect()
    }

    fn relations_or_all(&self, relations: Option<&[String]>) -> Vec<String> {
        match relations {
            Some(relations) => relations.to_vec(),
            None => self.registry().relation_names(),
        }
    }

    pub fn has_any_hq_role(&self, relations: Option<&[String]>) -> bool {
        let relations = self.relations_or_all(relations);
        self.checker
            .hq_role_checker(relations.as_slice(), self.department_name())
    }

    pub fn has_any_branch_role(&self, branch_id: BranchId, relations: Option<&[String]>) -> bool {
        let relations = self.relations_or_all(relations);
        self.checker
            .branch_role_checker(Some(branch_id), relations.as_slice(), self.department_name())
    }

    /// Whether the principal may add records to `branch_id`, or, without a
    /// branch, whether the request's view-as value is one of the required
    /// roles' view-as tokens. A principal without a home branch never can.
    pub fn can_add(
        &self,
        branch_id: Option<BranchId>,
        required_roles: Option<&[String]>,
    ) -> AuthzResult<bool> {
        if self.home_branch_id()?.is_none() {
            return Ok(false);
        }

        match branch_id {
            Some(id) if self.models().is_main_branch(id) => Ok(self.has_any_hq_role(required_roles)),
            Some(id) => Ok(self.has_any_branch_role(id, required_roles)),
            None => {
                let tokens = self.view_as_tokens(required_roles);
                Ok(self.check_view_as_permissions(tokens.as_slice()))
            }
        }
    }

    /// View-as tokens for roles named by key (or relation); all roles when `None`.
    pub fn view_as_tokens(&self, roles: Option<&[String]>) -> Vec<String> {
        let catalogue = self.registry().catalogue();
        match roles {
            None => catalogue
                .iter()
                .map(|r| r.view_as_constant_prefix.clone())
                .collect(),
            Some(names) => names
                .iter()
                .filter_map(|name| catalogue.get(name).or_else(|| catalogue.by_relation(name)))
                .map(|r| r.view_as_constant_prefix.clone())
                .collect(),
        }
    }

    pub fn check_view_as_permissions<S: AsRef<str>>(&self, allowed: &[S]) -> bool {
        check_view_as_permissions(&self.request, allowed)
    }

    pub fn check_creator_permission(&self, creator_id: PrincipalId) -> bool {
        self.principal_id() == creator_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DepartmentRolesConfig, RoleSettings, RoleTable};
    use crate::memory::InMemoryDirectory;
    use deptauthz_auth::PrincipalRecord;

    const HQ: BranchId = BranchId::new(1);
    const NORTH: BranchId = BranchId::new(7);
    const ALICE: PrincipalId = PrincipalId::new(10);

    fn enabled() -> RoleSettings {
        RoleSettings {
            enabled: Some(true),
            ..RoleSettings::default()
        }
    }

    fn setup() -> (DepartmentRoles, Arc<InMemoryDirectory>) {
        let config = DepartmentRolesConfig {
            default_roles: RoleTable::new()
                .with("manager", enabled())
                .with("engineer", enabled())
                .with("rep", enabled()),
            ..DepartmentRolesConfig::default()
        };
        let directory = InMemoryDirectory::arc();
        directory.add_branch(HQ, "HQ");
        directory.add_branch(NORTH, "North");
        directory.add_principal(PrincipalRecord::new(ALICE).with_home_branch(NORTH));
        let roles = DepartmentRoles::new(
            Arc::new(RoleRegistry::new(Arc::new(config))),
            Arc::new(directory.models(HQ)),
        );
        (roles, directory)
    }

    #[test]
    fn permission_keys_use_lowercased_prefix() {
        let role = RoleDefinition::normalize("manager", &enabled(), 0);
        assert_eq!(PermissionMap::hq_key(&role), "is_hq_manager");
        assert_eq!(PermissionMap::branch_key(NORTH, &role), "is_7_manager");
    }

    #[test]
    fn missing_principal_is_unauthenticated() {
        let (roles, _) = setup();
        let err = roles.resolver(&RequestContext::anonymous()).err().unwrap();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn explicit_principal_overrides_request() {
        let (roles, _) = setup();
        let request = RequestContext::authenticated(PrincipalId::new(99));
        let resolver = roles.resolver_for(&request, Some(ALICE)).unwrap();
        assert_eq!(resolver.principal_id(), ALICE);
        assert_eq!(resolver.for_user(PrincipalId::new(3)).principal_id(), PrincipalId::new(3));
    }

    #[test]
    fn effective_branches_are_deduplicated_with_home_last() {
        let (roles, _) = setup();
        let resolver = roles
            .resolver(&RequestContext::authenticated(ALICE))
            .unwrap()
            .for_branches([HQ, NORTH, HQ]);
        assert_eq!(resolver.effective_branch_ids().unwrap(), vec![HQ, NORTH]);
    }

    #[test]
    fn department_defaults_to_configured_name() {
        let (roles, _) = setup();
        let resolver = roles.resolver(&RequestContext::authenticated(ALICE)).unwrap();
        assert_eq!(resolver.department_name(), "Electric");
        assert_eq!(resolver.for_department("Plumbing").department_name(), "Plumbing");
    }

    #[test]
    fn custom_settings_drop_disabled_relations() {
        let (roles, directory) = setup();
        directory.assign(NORTH, "Electric", "manager", ALICE);
        let resolver = roles.resolver(&RequestContext::authenticated(ALICE)).unwrap();

        let settings = BTreeMap::from([
            ("managers".to_string(), CustomRoleSetting::enabled()),
            ("reps".to_string(), CustomRoleSetting::disabled()),
        ]);

        let with_defaults = resolver.resolve_with_custom_settings(&settings, true).unwrap();
        let keys: Vec<&str> = with_defaults.keys().collect();
        assert_eq!(keys, vec!["is_7_engineer", "is_7_manager"]);
        assert!(with_defaults.is_allowed("is_7_manager"));

        let only_named = resolver.resolve_with_custom_settings(&settings, false).unwrap();
        assert_eq!(only_named.keys().collect::<Vec<_>>(), vec!["is_7_manager"]);
    }

    #[test]
    fn empty_override_resolves_nothing() {
        let (roles, _) = setup();
        let resolver = roles.resolver(&RequestContext::authenticated(ALICE)).unwrap();
        assert!(resolver.resolve(Some(&[][..])).unwrap().is_empty());
    }

    #[test]
    fn can_add_requires_a_home_branch() {
        let (roles, directory) = setup();
        let drifter = PrincipalId::new(11);
        directory.add_principal(PrincipalRecord::new(drifter));
        directory.assign(NORTH, "Electric", "manager", drifter);

        let resolver = roles.resolver(&RequestContext::authenticated(drifter)).unwrap();
        assert!(resolver.has_any_branch_role(NORTH, None));
        assert!(!resolver.can_add(Some(NORTH), None).unwrap());
    }

    #[test]
    fn can_add_checks_the_target_branch() {
        let (roles, directory) = setup();
        directory.assign(NORTH, "Electric", "rep", ALICE);
        let resolver = roles.resolver(&RequestContext::authenticated(ALICE)).unwrap();
        let managers = vec!["managers".to_string()];

        assert!(resolver.can_add(Some(NORTH), None).unwrap());
        assert!(!resolver.can_add(Some(NORTH), Some(managers.as_slice())).unwrap());
        assert!(!resolver.can_add(Some(HQ), None).unwrap());
    }

    #[test]
    fn can_add_without_branch_uses_view_as_tokens() {
        let (roles, _) = setup();
        let request = RequestContext::authenticated(ALICE).with_query("view_as", "MANAGER");
        let resolver = roles.resolver(&request).unwrap();

        let named = vec!["manager".to_string(), "reps".to_string()];
        assert_eq!(
            resolver.view_as_tokens(Some(named.as_slice())),
            vec!["MANAGER".to_string(), "REP".to_string()]
        );
        assert!(resolver.can_add(None, None).unwrap());
        let engineer = vec!["engineer".to_string()];
        assert!(!resolver.can_add(None, Some(engineer.as_slice())).unwrap());
    }

    #[test]
    fn creator_check_is_exact() {
        let (roles, _) = setup();
        let resolver = roles.resolver(&RequestContext::authenticated(ALICE)).unwrap();
        assert!(resolver.check_creator_permission(ALICE));
        assert!(!resolver.check_creator_permission(PrincipalId::new(11)));
    }
}
