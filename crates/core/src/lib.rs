//! `deptauthz-core`: identifiers and the two-tier error model.
//!
//! This crate has no knowledge of roles, stores or requests.

pub mod error;
pub mod id;

pub use error::{AuthorizationError, AuthzResult, BoxError, InvalidId, LookupError, ModelKind};
pub use id::{BranchId, PrincipalId};
