//! Error model for the authorization boundary.
//!
//! Two tiers:
//! - [`LookupError`] is recoverable. Role and branch resolution downgrade it
//!   to a negative answer so one bad lookup never aborts a permission map.
//! - [`AuthorizationError`] is terminal. Only the permission examiner and the
//!   policy-check entry point raise it to callers.

use core::num::ParseIntError;

use thiserror::Error;

/// Boxed error used for host-supplied custom denial errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for terminal authorization decisions.
pub type AuthzResult<T> = Result<T, AuthorizationError>;

/// External collaborator kinds the core depends on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Principal,
    Branch,
    Department,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Principal => "principal",
            ModelKind::Branch => "branch",
            ModelKind::Department => "department",
        }
    }
}

impl core::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recoverable lookup failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// A collaborator store was never registered.
    #[error("{0} store not configured; register it on AuthorizationModels at startup")]
    NotConfigured(ModelKind),

    /// The collaborator store itself failed.
    #[error("store error: {0}")]
    Store(String),
}

impl LookupError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }
}

/// A string that does not parse as an identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid {kind} `{value}`: {source}")]
pub struct InvalidId {
    pub kind: &'static str,
    pub value: String,
    #[source]
    pub source: ParseIntError,
}

impl InvalidId {
    pub fn new(kind: &'static str, value: impl Into<String>, source: ParseIntError) -> Self {
        Self {
            kind,
            value: value.into(),
            source,
        }
    }
}

/// Terminal authorization failure.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// No principal is present where a decision requires one.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The principal lacks the required permissions.
    #[error("{message}")]
    Unauthorized { message: String, status_code: u16 },

    /// A host-registered error replaced the default denial.
    #[error("{source}")]
    Custom {
        source: BoxError,
        status_code: u16,
    },

    /// A required collaborator is missing.
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),

    /// A collaborator failed while answering a terminal decision.
    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl AuthorizationError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn unauthorized(message: impl Into<String>, status_code: u16) -> Self {
        Self::Unauthorized {
            message: message.into(),
            status_code,
        }
    }

    pub fn misconfiguration(msg: impl Into<String>) -> Self {
        Self::Misconfiguration(msg.into())
    }

    /// HTTP-style status code a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthorizationError::Unauthenticated(_) => 401,
            AuthorizationError::Unauthorized { status_code, .. } => *status_code,
            AuthorizationError::Custom { status_code, .. } => *status_code,
            AuthorizationError::Misconfiguration(_) | AuthorizationError::Collaborator(_) => 500,
        }
    }
}

impl From<LookupError> for AuthorizationError {
    fn from(value: LookupError) -> Self {
        match value {
            LookupError::NotConfigured(kind) => {
                Self::Misconfiguration(LookupError::NotConfigured(kind).to_string())
            }
            LookupError::Store(msg) => Self::Collaborator(msg),
        }
    }
}
