//! Permission examiner: turns a declared set of required permissions into an
//! allow/deny decision for the current principal.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use deptauthz_core::{AuthorizationError, AuthzResult, BoxError, PrincipalId};

use crate::{Permission, PrincipalStore, RequestContext};

pub const DEFAULT_DENY_MESSAGE: &str = "You don't have the permission for browsing this page!";
pub const DEFAULT_DENY_STATUS_CODE: u16 = 406;

/// Serializable denial settings (the `deny` / `custom_exception` config keys).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenyConfig {
    pub message: String,
    pub status_code: u16,
}

impl Default for DenyConfig {
    fn default() -> Self {
        Self {
            message: DEFAULT_DENY_MESSAGE.to_string(),
            status_code: DEFAULT_DENY_STATUS_CODE,
        }
    }
}

/// Builds a host-defined error that replaces the default denial.
pub type DenyErrorFactory = Arc<dyn Fn() -> BoxError + Send + Sync>;

/// A custom denial error registered by the host.
#[derive(Clone)]
pub struct CustomDenial {
    pub name: String,
    pub status_code: u16,
    pub factory: DenyErrorFactory,
}

impl core::fmt::Debug for CustomDenial {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CustomDenial")
            .field("name", &self.name)
            .field("status_code", &self.status_code)
            .finish_non_exhaustive()
    }
}

/// How an unauthorized decision is turned into an error.
///
/// Built once at startup and shared by `Arc`.
#[derive(Debug, Clone)]
pub struct DenyPolicy {
    message: String,
    status_code: u16,
    custom: Option<CustomDenial>,
}

impl Default for DenyPolicy {
    fn default() -> Self {
        Self::from_config(&DenyConfig::default())
    }
}

impl DenyPolicy {
    pub fn from_config(config: &DenyConfig) -> Self {
        Self {
            message: config.message.clone(),
            status_code: config.status_code,
            custom: None,
        }
    }

    /// Denial settings plus the configured custom error name, resolved
    /// against the errors the host registered.
    pub fn from_authorization(
        config: &DenyConfig,
        custom_name: Option<&str>,
        registered: &HashMap<String, CustomDenial>,
    ) -> Self {
        Self::from_config(config).with_registered_custom(custom_name, registered)
    }

    /// Resolves the configured custom error name against the host's registered
    /// errors. An unknown name keeps the default denial.
    pub fn with_registered_custom(
        mut self,
        custom_name: Option<&str>,
        registered: &HashMap<String, CustomDenial>,
    ) -> Self {
        let Some(name) = custom_name.filter(|n| !n.is_empty()) else {
            return self;
        };
        match registered.get(name) {
            Some(custom) => self.custom = Some(custom.clone()),
            None => tracing::warn!(
                custom_error = name,
                "custom denial error is not registered; using default denial"
            ),
        }
        self
    }

    pub fn with_custom(mut self, custom: CustomDenial) -> Self {
        self.custom = Some(custom);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// The error raised on deny. The configured message and status code only
    /// apply to the default error.
    pub fn unauthorized_error(&self) -> AuthorizationError {
        match &self.custom {
            Some(custom) => AuthorizationError::Custom {
                source: (custom.factory)(),
                status_code: custom.status_code,
            },
            None => AuthorizationError::unauthorized(self.message.clone(), self.status_code),
        }
    }
}

/// Audit view of one examination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExaminationReport {
    pub principal_id: PrincipalId,
    pub required: Vec<String>,
    pub held: Vec<String>,
    pub missing: Vec<String>,
    pub granted: bool,
}

/// Accumulates required permissions and checks them against the principal.
///
/// Semantics are AND: every required permission must be held. A principal with
/// no permissions at all is denied even when nothing is required.
pub struct PermissionExaminer {
    principal_id: Option<PrincipalId>,
    principals: Arc<dyn PrincipalStore>,
    deny: Arc<DenyPolicy>,
    required: Vec<Permission>,
}

impl PermissionExaminer {
    pub fn new(
        principal_id: Option<PrincipalId>,
        principals: Arc<dyn PrincipalStore>,
        deny: Arc<DenyPolicy>,
    ) -> Self {
        Self {
            principal_id,
            principals,
            deny,
            required: Vec::new(),
        }
    }

    /// Examiner for the principal authenticated on `request`.
    pub fn for_request(
        request: &RequestContext,
        principals: Arc<dyn PrincipalStore>,
        deny: Arc<DenyPolicy>,
    ) -> Self {
        Self::new(request.principal_id(), principals, deny)
    }

    pub fn add_permission_to_check(&mut self, permission: impl Into<Permission>) -> &mut Self {
        self.required.push(permission.into());
        self
    }

    pub fn add_permissions_to_check<I, P>(&mut self, permissions: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        for permission in permissions {
            self.add_permission_to_check(permission);
        }
        self
    }

    pub fn required(&self) -> &[Permission] {
        &self.required
    }

    fn held_permissions(&self) -> AuthzResult<(PrincipalId, BTreeSet<Permission>)> {
        let Some(principal_id) = self.principal_id else {
            return Err(AuthorizationError::unauthenticated(
                "there is no logged principal to be authorized",
            ));
        };
        let record = self.principals.find_principal(principal_id)?.ok_or_else(|| {
            AuthorizationError::unauthenticated(format!(
                "principal {principal_id} is not known to the principal store"
            ))
        })?;
        Ok((principal_id, record.permissions))
    }

    /// `Ok(true)` iff the principal holds at least one permission and every
    /// required one.
    pub fn has_permissions(&self) -> AuthzResult<bool> {
        let (_, held) = self.held_permissions()?;
        Ok(grants(&held, &self.required))
    }

    /// Succeeds or raises the configured unauthorized error.
    pub fn has_permissions_or_fail(&self) -> AuthzResult<()> {
        let (principal_id, held) = self.held_permissions()?;
        if grants(&held, &self.required) {
            return Ok(());
        }
        tracing::info!(
            principal_id = %principal_id,
            required = ?self.required,
            "permission check denied"
        );
        Err(self.deny.unauthorized_error())
    }

    pub fn explain(&self) -> AuthzResult<ExaminationReport> {
        let (principal_id, held) = self.held_permissions()?;
        let required: BTreeSet<&Permission> = self.required.iter().collect();
        let missing = required
            .iter()
            .filter(|p| !held.contains(**p))
            .map(|p| p.as_str().to_string())
            .collect();

        Ok(ExaminationReport {
            principal_id,
            required: required.iter().map(|p| p.as_str().to_string()).collect(),
            held: held.iter().map(|p| p.as_str().to_string()).collect(),
            missing,
            granted: grants(&held, &self.required),
        })
    }
}

fn grants(held: &BTreeSet<Permission>, required: &[Permission]) -> bool {
    !held.is_empty() && required.iter().all(|p| held.contains(p))
}
