//! Name to constructor catalog.
//!
//! Configuration refers to models, policies, gates and the custom denial
//! error by name. Only names registered here exist; anything else is skipped
//! when containers resolve configuration.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use deptauthz_auth::CustomDenial;

use crate::element::{IndependentGate, ModelPolicy};

pub type GateFactory = Arc<dyn Fn() -> Box<dyn IndependentGate> + Send + Sync>;

pub type PolicyFactory = Arc<dyn Fn() -> Arc<dyn ModelPolicy> + Send + Sync>;

#[derive(Clone, Default)]
pub struct GateCatalog {
    models: BTreeSet<String>,
    policies: BTreeMap<String, PolicyFactory>,
    gates: BTreeMap<String, GateFactory>,
    denials: HashMap<String, CustomDenial>,
}

impl GateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, name: impl Into<String>) -> Self {
        self.models.insert(name.into());
        self
    }

    pub fn with_policy<F, P>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
        P: ModelPolicy + 'static,
    {
        let factory: PolicyFactory = Arc::new(move || Arc::new(factory()) as Arc<dyn ModelPolicy>);
        self.policies.insert(name.into(), factory);
        self
    }

    pub fn with_gate<F, G>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> G + Send + Sync + 'static,
        G: IndependentGate + 'static,
    {
        let factory: GateFactory = Arc::new(move || Box::new(factory()) as Box<dyn IndependentGate>);
        self.gates.insert(name.into(), factory);
        self
    }

    pub fn with_custom_denial(mut self, denial: CustomDenial) -> Self {
        self.denials.insert(denial.name.clone(), denial);
        self
    }

    pub fn custom_denials(&self) -> &HashMap<String, CustomDenial> {
        &self.denials
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains(name)
    }

    pub fn has_policy(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn has_gate(&self, name: &str) -> bool {
        self.gates.contains_key(name)
    }

    pub fn instantiate_policy(&self, name: &str) -> Option<Arc<dyn ModelPolicy>> {
        self.policies.get(name).map(|factory| factory())
    }

    pub fn instantiate_gate(&self, name: &str) -> Option<Box<dyn IndependentGate>> {
        self.gates.get(name).map(|factory| factory())
    }
}

impl core::fmt::Debug for GateCatalog {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GateCatalog")
            .field("models", &self.models)
            .field("policies", &self.policies.keys().collect::<Vec<_>>())
            .field("gates", &self.gates.keys().collect::<Vec<_>>())
            .field("denials", &self.denials.keys().collect::<Vec<_>>())
            .finish()
    }
}
