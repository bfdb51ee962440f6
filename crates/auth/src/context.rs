use std::collections::BTreeMap;

use serde_json::{Map, Value};

use deptauthz_core::PrincipalId;

/// Name of the request parameter carrying the view-as hint.
pub const VIEW_AS_PARAM: &str = "view_as";

/// Inbound request context (authenticated identity + parameters).
///
/// The transport layer builds this once per request; the core only reads it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    principal_id: Option<PrincipalId>,
    query: BTreeMap<String, String>,
    body: Map<String, Value>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(principal_id: PrincipalId) -> Self {
        Self {
            principal_id: Some(principal_id),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_body_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.body.insert(name.into(), value);
        self
    }

    pub fn principal_id(&self) -> Option<PrincipalId> {
        self.principal_id
    }

    /// Reads a string parameter; the query string takes precedence over the body.
    ///
    /// Body values that are not JSON strings are reported as absent so they can
    /// never match a string allow-list.
    pub fn string_param(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.query.get(name) {
            return Some(value.as_str());
        }
        match self.body.get(name) {
            Some(Value::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn view_as(&self) -> Option<&str> {
        self.string_param(VIEW_AS_PARAM)
    }
}
