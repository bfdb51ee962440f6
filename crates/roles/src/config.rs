//! Configuration tree for the authorization add-on.
//!
//! Loaded from JSON. Every field has a default so a partial file is valid.
//!
//! ```json
//! {
//!   "main_branch_id": 1,
//!   "department_roles": {
//!     "default_roles": {
//!       "manager": { "relation": "managers", "enabled": true, "can_be_disabled": false },
//!       "engineer": { "enabled": true }
//!     },
//!     "hierarchy": { "manager": 100, "engineer": 50 },
//!     "cache": { "enabled": true, "ttl": 3600 }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use deptauthz_auth::{CustomDenial, DenyConfig, DenyPolicy};
use deptauthz_core::BranchId;

pub const DEFAULT_DEPARTMENT_NAME: &str = "Electric";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_MAX_LENGTH: usize = 50;
pub const DEFAULT_MAIN_BRANCH_ID: BranchId = BranchId::new(1);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Model name to policy name bindings.
    pub policies: BTreeMap<String, String>,

    /// Independent gate names, in registration order.
    pub independent_gates: Vec<String>,

    /// Name of a host-registered error that replaces the default denial.
    pub custom_exception: Option<String>,

    /// Headquarters branch id.
    pub main_branch_id: BranchId,

    pub deny: DenyConfig,

    pub department_roles: DepartmentRolesConfig,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            policies: BTreeMap::new(),
            independent_gates: Vec::new(),
            custom_exception: None,
            main_branch_id: DEFAULT_MAIN_BRANCH_ID,
            deny: DenyConfig::default(),
            department_roles: DepartmentRolesConfig::default(),
        }
    }
}

impl AuthorizationConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.department_roles.validate()
    }

    /// The denial policy for this configuration. `custom_exception` is looked
    /// up in `registered`.
    pub fn deny_policy(&self, registered: &HashMap<String, CustomDenial>) -> DenyPolicy {
        DenyPolicy::from_authorization(&self.deny, self.custom_exception.as_deref(), registered)
    }
}

/// Department role settings (the `department_roles` key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepartmentRolesConfig {
    pub default_roles: RoleTable,
    pub hierarchy: BTreeMap<String, i64>,
    pub department_specific_roles: BTreeMap<String, Vec<String>>,
    pub validation: ValidationConfig,
    pub cache: CacheConfig,
    pub default_department_name: String,
}

impl Default for DepartmentRolesConfig {
    fn default() -> Self {
        Self {
            default_roles: RoleTable::default(),
            hierarchy: BTreeMap::new(),
            department_specific_roles: BTreeMap::new(),
            validation: ValidationConfig::default(),
            cache: CacheConfig::default(),
            default_department_name: DEFAULT_DEPARTMENT_NAME.to_string(),
        }
    }
}

impl DepartmentRolesConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some((key, _)) = self.default_roles.iter().find(|(k, _)| k.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "role key must not be blank (got {key:?})"
            )));
        }
        Ok(())
    }
}

/// Partial role fields as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleSettings {
    pub relation: Option<String>,
    pub dep_role_value: Option<String>,
    pub view_as_constant_prefix: Option<String>,
    pub label: Option<String>,
    pub enabled: Option<bool>,
    pub can_be_disabled: Option<bool>,
}

impl RoleSettings {
    /// A role is materialized only when `enabled` is explicitly true.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }
}

/// Ordered, key-unique table of role settings.
///
/// Serialized as a JSON object; entry order is the file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleTable(Vec<(String, RoleSettings)>);

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, settings: RoleSettings) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = settings,
            None => self.0.push((key, settings)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, settings: RoleSettings) -> Self {
        self.insert(key, settings);
        self
    }

    pub fn get(&self, key: &str) -> Option<&RoleSettings> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RoleSettings)> {
        self.0.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for RoleTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, settings) in &self.0 {
            map.serialize_entry(key, settings)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RoleTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RoleTableVisitor;

        impl<'de> Visitor<'de> for RoleTableVisitor {
            type Value = RoleTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of role key to role settings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, RoleSettings)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, settings)) = access.next_entry::<String, RoleSettings>()? {
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(de::Error::custom(format!("duplicate role key `{key}`")));
                    }
                    entries.push((key, settings));
                }
                Ok(RoleTable(entries))
            }
        }

        deserializer.deserialize_map(RoleTableVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub max_length: usize,
    pub nullable: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            nullable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Seconds.
    pub ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_roles_keep_file_order() {
        let config = DepartmentRolesConfig::from_json(
            r#"{"default_roles": {"rep": {"enabled": true}, "manager": {"enabled": true}, "engineer": {}}}"#,
        )
        .unwrap();
        let keys: Vec<&str> = config.default_roles.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["rep", "manager", "engineer"]);
    }

    #[test]
    fn duplicate_role_keys_are_rejected() {
        let err = DepartmentRolesConfig::from_json(
            r#"{"default_roles": {"rep": {}, "rep": {"enabled": true}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate role key"));
    }

    #[test]
    fn blank_role_keys_are_rejected() {
        let err = DepartmentRolesConfig::from_json(r#"{"default_roles": {" ": {}}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = AuthorizationConfig::from_json("{}").unwrap();
        assert_eq!(config.main_branch_id, BranchId::new(1));
        assert_eq!(config.department_roles.default_department_name, "Electric");
        assert_eq!(config.department_roles.cache.ttl, 3600);
        assert!(!config.department_roles.cache.enabled);
        assert_eq!(config.department_roles.validation.max_length, 50);
        assert_eq!(config.deny.status_code, 406);
    }

    #[test]
    fn role_table_serializes_back_in_order() {
        let table = RoleTable::new()
            .with("b", RoleSettings::default())
            .with("a", RoleSettings::default());
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.find("\"b\"").unwrap() < json.find("\"a\"").unwrap());
    }
}
