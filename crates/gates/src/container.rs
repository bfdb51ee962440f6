//! Containers: configuration names resolved against the catalog, once.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::catalog::GateCatalog;
use crate::element::IndependentGate;

/// Lazily built list of authorization elements.
pub trait AuthorizationElementContainer {
    type Element;

    /// Built on first call; later calls return the same elements.
    fn elements(&self) -> &[Self::Element];
}

/// Model to policy binding. The policy is referenced by name only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyBinding {
    pub model: String,
    pub policy: String,
}

pub struct PolicyContainer {
    catalog: Arc<GateCatalog>,
    policy_map: BTreeMap<String, String>,
    elements: OnceLock<Vec<PolicyBinding>>,
}

impl PolicyContainer {
    pub fn new(catalog: Arc<GateCatalog>, policy_map: BTreeMap<String, String>) -> Self {
        Self {
            catalog,
            policy_map,
            elements: OnceLock::new(),
        }
    }

    fn build(&self) -> Vec<PolicyBinding> {
        self.policy_map
            .iter()
            .filter_map(|(model, policy)| {
                if self.catalog.has_model(model) && self.catalog.has_policy(policy) {
                    Some(PolicyBinding {
                        model: model.clone(),
                        policy: policy.clone(),
                    })
                } else {
                    tracing::warn!(model, policy, "skipping policy binding with unknown model or policy");
                    None
                }
            })
            .collect()
    }
}

impl AuthorizationElementContainer for PolicyContainer {
    type Element = PolicyBinding;

    fn elements(&self) -> &[PolicyBinding] {
        self.elements.get_or_init(|| self.build())
    }
}

/// Gates are instantiated when the container is built, in configuration order.
pub struct IndependentGateContainer {
    catalog: Arc<GateCatalog>,
    gate_names: Vec<String>,
    elements: OnceLock<Vec<Box<dyn IndependentGate>>>,
}

impl IndependentGateContainer {
    pub fn new(catalog: Arc<GateCatalog>, gate_names: Vec<String>) -> Self {
        Self {
            catalog,
            gate_names,
            elements: OnceLock::new(),
        }
    }

    fn build(&self) -> Vec<Box<dyn IndependentGate>> {
        self.gate_names
            .iter()
            .filter_map(|name| {
                let gate = self.catalog.instantiate_gate(name);
                if gate.is_none() {
                    tracing::warn!(gate = %name, "skipping unknown independent gate");
                }
                gate
            })
            .collect()
    }
}

impl AuthorizationElementContainer for IndependentGateContainer {
    type Element = Box<dyn IndependentGate>;

    fn elements(&self) -> &[Box<dyn IndependentGate>] {
        self.elements.get_or_init(|| self.build())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::element::{GateRegistrar, ModelPolicy};
    use deptauthz_auth::RequestContext;
    use deptauthz_core::{AuthzResult, PrincipalId};

    struct Allow;

    impl ModelPolicy for Allow {
        fn check(&self, _: &str, _: PrincipalId, _: &RequestContext) -> AuthzResult<bool> {
            Ok(true)
        }
    }

    struct Noop(&'static str);

    impl IndependentGate for Noop {
        fn name(&self) -> &str {
            self.0
        }

        fn define(&self, _: &mut dyn GateRegistrar) {}
    }

    #[test]
    fn policy_bindings_need_known_model_and_policy() {
        let catalog = Arc::new(
            GateCatalog::new()
                .with_model("Ticket")
                .with_model("Invoice")
                .with_policy("TicketPolicy", || Allow),
        );
        let map = BTreeMap::from([
            ("Ticket".to_string(), "TicketPolicy".to_string()),
            ("Invoice".to_string(), "InvoicePolicy".to_string()),
            ("Ghost".to_string(), "TicketPolicy".to_string()),
        ]);
        let container = PolicyContainer::new(catalog, map);
        assert_eq!(
            container.elements(),
            &[PolicyBinding {
                model: "Ticket".to_string(),
                policy: "TicketPolicy".to_string(),
            }]
        );
    }

    #[test]
    fn gates_are_built_once_in_order() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);
        let catalog = Arc::new(
            GateCatalog::new()
                .with_gate("reports", || {
                    BUILT.fetch_add(1, Ordering::SeqCst);
                    Noop("reports")
                })
                .with_gate("exports", || Noop("exports")),
        );
        let container = IndependentGateContainer::new(
            catalog,
            vec!["exports".to_string(), "missing".to_string(), "reports".to_string()],
        );

        let names: Vec<&str> = container.elements().iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["exports", "reports"]);
        container.elements();
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
    }
}
