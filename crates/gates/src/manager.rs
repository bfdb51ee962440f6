//! Managers register container elements with a [`GateRegistrar`].

use std::sync::Arc;

use deptauthz_roles::AuthorizationConfig;

use crate::catalog::GateCatalog;
use crate::container::{AuthorizationElementContainer, IndependentGateContainer, PolicyContainer};
use crate::element::GateRegistrar;
use crate::gate::Gate;

pub trait AuthorizationManager {
    /// Registers every element; returns how many were registered.
    fn define_all(&self, registrar: &mut dyn GateRegistrar) -> usize;
}

pub struct PolicyManager {
    container: Arc<PolicyContainer>,
}

impl PolicyManager {
    pub fn new(container: Arc<PolicyContainer>) -> Self {
        Self { container }
    }
}

impl AuthorizationManager for PolicyManager {
    fn define_all(&self, registrar: &mut dyn GateRegistrar) -> usize {
        let bindings = self.container.elements();
        for binding in bindings {
            registrar.register_policy(&binding.model, &binding.policy);
        }
        bindings.len()
    }
}

pub struct IndependentGateManager {
    container: Arc<IndependentGateContainer>,
}

impl IndependentGateManager {
    pub fn new(container: Arc<IndependentGateContainer>) -> Self {
        Self { container }
    }
}

impl AuthorizationManager for IndependentGateManager {
    fn define_all(&self, registrar: &mut dyn GateRegistrar) -> usize {
        let gates = self.container.elements();
        for gate in gates {
            tracing::debug!(gate = gate.name(), "defining independent gate");
            gate.define(registrar);
        }
        gates.len()
    }
}

/// Builds a [`Gate`] with every policy and independent gate named in `config`.
/// The gate denies with `config`'s denial settings; `custom_exception` names
/// one of the catalog's custom denials.
pub fn boot(config: &AuthorizationConfig, catalog: Arc<GateCatalog>) -> Gate {
    let policies = Arc::new(PolicyContainer::new(catalog.clone(), config.policies.clone()));
    let gates = Arc::new(IndependentGateContainer::new(
        catalog.clone(),
        config.independent_gates.clone(),
    ));

    let deny = Arc::new(config.deny_policy(catalog.custom_denials()));
    let mut gate = Gate::new(catalog).with_deny_policy(deny);
    let policy_count = PolicyManager::new(policies).define_all(&mut gate);
    let gate_count = IndependentGateManager::new(gates).define_all(&mut gate);
    tracing::info!(policies = policy_count, gates = gate_count, "authorization elements registered");
    gate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{IndependentGate, ModelPolicy};
    use deptauthz_auth::{CustomDenial, RequestContext};
    use deptauthz_core::{AuthorizationError, AuthzResult, BoxError, PrincipalId};

    struct BranchPolicy;

    impl ModelPolicy for BranchPolicy {
        fn check(&self, action: &str, _: PrincipalId, _: &RequestContext) -> AuthzResult<bool> {
            Ok(action == "view")
        }
    }

    struct ReportsGate;

    impl IndependentGate for ReportsGate {
        fn name(&self) -> &str {
            "reports"
        }

        fn define(&self, registrar: &mut dyn GateRegistrar) {
            registrar.define_ability(
                "view-reports",
                Arc::new(|principal_id: PrincipalId, _: &RequestContext| -> AuthzResult<bool> {
                    Ok(principal_id.get() < 100)
                }),
            );
        }
    }

    #[test]
    fn boot_registers_configured_elements() {
        let config = AuthorizationConfig::from_json(
            r#"{
                "policies": { "Branch": "BranchPolicy", "Ghost": "GhostPolicy" },
                "independent_gates": ["reports", "unknown"]
            }"#,
        )
        .unwrap();
        let catalog = Arc::new(
            GateCatalog::new()
                .with_model("Branch")
                .with_policy("BranchPolicy", || BranchPolicy)
                .with_gate("reports", || ReportsGate),
        );

        let gate = boot(&config, catalog);
        assert_eq!(gate.policy_name_for("Branch"), Some("BranchPolicy"));
        assert_eq!(gate.policy_name_for("Ghost"), None);
        assert_eq!(gate.ability_names().collect::<Vec<_>>(), vec!["view-reports"]);

        let request = RequestContext::authenticated(PrincipalId::new(7));
        assert!(gate.check("view-reports", None, &request).unwrap());
        assert!(gate.check("view", Some("Branch"), &request).unwrap());
        assert!(!gate.check("delete", Some("Branch"), &request).unwrap());
    }

    #[derive(Debug, thiserror::Error)]
    #[error("branch is locked")]
    struct BranchLocked;

    fn locked_denial() -> CustomDenial {
        CustomDenial {
            name: "BranchLocked".to_string(),
            status_code: 403,
            factory: Arc::new(|| Box::new(BranchLocked) as BoxError),
        }
    }

    #[test]
    fn boot_denies_with_configured_custom_exception() {
        let config = AuthorizationConfig::from_json(
            r#"{
                "custom_exception": "BranchLocked",
                "policies": { "Branch": "BranchPolicy" }
            }"#,
        )
        .unwrap();
        let catalog = Arc::new(
            GateCatalog::new()
                .with_model("Branch")
                .with_policy("BranchPolicy", || BranchPolicy)
                .with_custom_denial(locked_denial()),
        );

        let gate = boot(&config, catalog);
        let request = RequestContext::authenticated(PrincipalId::new(7));
        assert!(gate.authorize("view", Some("Branch"), &request).is_ok());

        let err = gate.authorize("delete", Some("Branch"), &request).unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.to_string(), "branch is locked");
        assert!(matches!(err, AuthorizationError::Custom { .. }));
    }

    #[test]
    fn boot_without_custom_exception_uses_deny_settings() {
        let config = AuthorizationConfig::from_json(
            r#"{ "deny": { "message": "closed", "status_code": 409 } }"#,
        )
        .unwrap();
        let catalog = Arc::new(GateCatalog::new().with_custom_denial(locked_denial()));

        let gate = boot(&config, catalog);
        let err = gate
            .authorize("anything", None, &RequestContext::authenticated(PrincipalId::new(1)))
            .unwrap_err();
        assert!(matches!(
            err,
            AuthorizationError::Unauthorized { ref message, status_code: 409 } if message == "closed"
        ));
    }

    #[test]
    fn managers_report_registration_counts() {
        let catalog = Arc::new(GateCatalog::new().with_gate("reports", || ReportsGate));
        let container = Arc::new(IndependentGateContainer::new(
            catalog.clone(),
            vec!["reports".to_string(), "reports".to_string()],
        ));
        let mut gate = Gate::new(catalog);
        assert_eq!(IndependentGateManager::new(container).define_all(&mut gate), 2);
        assert!(gate.has_ability("view-reports"));
    }
}
