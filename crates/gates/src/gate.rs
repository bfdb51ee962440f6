//! In-process authorization dispatcher.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use deptauthz_auth::{DenyPolicy, RequestContext};
use deptauthz_core::{AuthorizationError, AuthzResult, PrincipalId};

use crate::catalog::GateCatalog;
use crate::element::{Ability, GateRegistrar, ModelPolicy};

/// Holds policy bindings and abilities; policies are instantiated on first use
/// and then reused.
pub struct Gate {
    catalog: Arc<GateCatalog>,
    bindings: BTreeMap<String, String>,
    abilities: BTreeMap<String, Ability>,
    instances: RwLock<BTreeMap<String, Arc<dyn ModelPolicy>>>,
    deny: Arc<DenyPolicy>,
}

impl Gate {
    pub fn new(catalog: Arc<GateCatalog>) -> Self {
        Self {
            catalog,
            bindings: BTreeMap::new(),
            abilities: BTreeMap::new(),
            instances: RwLock::new(BTreeMap::new()),
            deny: Arc::new(DenyPolicy::default()),
        }
    }

    pub fn with_deny_policy(mut self, deny: Arc<DenyPolicy>) -> Self {
        self.deny = deny;
        self
    }

    pub fn deny_policy(&self) -> &Arc<DenyPolicy> {
        &self.deny
    }

    pub fn policy_name_for(&self, model: &str) -> Option<&str> {
        self.bindings.get(model).map(String::as_str)
    }

    pub fn has_ability(&self, name: &str) -> bool {
        self.abilities.contains_key(name)
    }

    pub fn ability_names(&self) -> impl Iterator<Item = &str> {
        self.abilities.keys().map(String::as_str)
    }

    pub fn instantiated_policies(&self) -> usize {
        self.instances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn policy_for(&self, model: &str) -> Option<Arc<dyn ModelPolicy>> {
        let name = self.bindings.get(model)?;
        {
            let instances = self.instances.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(policy) = instances.get(name) {
                return Some(policy.clone());
            }
        }
        let policy = self.catalog.instantiate_policy(name)?;
        let mut instances = self.instances.write().unwrap_or_else(PoisonError::into_inner);
        Some(instances.entry(name.clone()).or_insert(policy).clone())
    }

    /// Checks `action` against `model`'s policy, or the ability named `action`
    /// when no model is given. Unbound models and unknown abilities deny.
    pub fn check(
        &self,
        action: &str,
        model: Option<&str>,
        request: &RequestContext,
    ) -> AuthzResult<bool> {
        let principal_id = request.principal_id().ok_or_else(|| {
            AuthorizationError::unauthenticated("authorization checks require an authenticated principal")
        })?;
        self.check_for(principal_id, action, model, request)
    }

    fn check_for(
        &self,
        principal_id: PrincipalId,
        action: &str,
        model: Option<&str>,
        request: &RequestContext,
    ) -> AuthzResult<bool> {
        match model {
            Some(model) => match self.policy_for(model) {
                Some(policy) => policy.check(action, principal_id, request),
                None => {
                    tracing::debug!(model, action, "no policy bound to model");
                    Ok(false)
                }
            },
            None => match self.abilities.get(action) {
                Some(ability) => ability(principal_id, request),
                None => {
                    tracing::debug!(ability = action, "ability not defined");
                    Ok(false)
                }
            },
        }
    }

    /// Like [`Gate::check`], but a denial becomes the deny policy's error.
    pub fn authorize(
        &self,
        action: &str,
        model: Option<&str>,
        request: &RequestContext,
    ) -> AuthzResult<()> {
        if self.check(action, model, request)? {
            Ok(())
        } else {
            tracing::info!(action, model, "authorization denied");
            Err(self.deny.unauthorized_error())
        }
    }
}

impl GateRegistrar for Gate {
    fn register_policy(&mut self, model: &str, policy: &str) {
        self.bindings.insert(model.to_string(), policy.to_string());
    }

    fn define_ability(&mut self, name: &str, ability: Ability) {
        self.abilities.insert(name.to_string(), ability);
    }
}

impl core::fmt::Debug for Gate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Gate")
            .field("bindings", &self.bindings)
            .field("abilities", &self.abilities.keys().collect::<Vec<_>>())
            .finish()
    }
}
