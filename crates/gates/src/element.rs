//! Authorization elements: model policies and independent gates.

use std::sync::Arc;

use deptauthz_auth::RequestContext;
use deptauthz_core::{AuthzResult, PrincipalId};

/// Ability callback registered by an independent gate.
pub type Ability = Arc<dyn Fn(PrincipalId, &RequestContext) -> AuthzResult<bool> + Send + Sync>;

/// Host-side registration contract.
pub trait GateRegistrar {
    /// Binds `model` to the policy registered in the catalog as `policy`.
    /// The policy is instantiated on first use, not here.
    fn register_policy(&mut self, model: &str, policy: &str);

    fn define_ability(&mut self, name: &str, ability: Ability);
}

/// A gate that registers its own abilities.
pub trait IndependentGate: Send + Sync {
    fn name(&self) -> &str;

    fn define(&self, registrar: &mut dyn GateRegistrar);
}

/// Per-model policy. `action` is the host's action name (`view`, `update`, ...).
pub trait ModelPolicy: Send + Sync {
    fn check(
        &self,
        action: &str,
        principal_id: PrincipalId,
        request: &RequestContext,
    ) -> AuthzResult<bool>;
}
