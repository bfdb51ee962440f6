//! `deptauthz-auth`: principal-facing authorization primitives.
//!
//! This crate is decoupled from HTTP and storage: principals come from a
//! [`PrincipalStore`] and request parameters from a [`RequestContext`].

pub mod context;
pub mod examiner;
pub mod permissions;
pub mod principal;

pub use context::{RequestContext, VIEW_AS_PARAM};
pub use examiner::{
    CustomDenial, DenyConfig, DenyErrorFactory, DenyPolicy, ExaminationReport, PermissionExaminer,
    DEFAULT_DENY_MESSAGE, DEFAULT_DENY_STATUS_CODE,
};
pub use permissions::Permission;
pub use principal::{PrincipalRecord, PrincipalStore};
