//! `deptauthz-gates`: policy and independent gate registration.
//!
//! Configuration names policies and gates; a [`GateCatalog`] maps those names
//! to code. Containers resolve the names lazily, managers register the
//! results with a [`GateRegistrar`] (usually the in-process [`Gate`]).

pub mod catalog;
pub mod container;
pub mod element;
pub mod gate;
pub mod manager;

pub use catalog::{GateCatalog, GateFactory, PolicyFactory};
pub use container::{
    AuthorizationElementContainer, IndependentGateContainer, PolicyBinding, PolicyContainer,
};
pub use element::{Ability, GateRegistrar, IndependentGate, ModelPolicy};
pub use gate::Gate;
pub use manager::{AuthorizationManager, IndependentGateManager, PolicyManager, boot};
