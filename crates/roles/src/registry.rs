//! Department role registry.
//!
//! Department roles are positions inside a department (manager, engineer,
//! rep), distinct from application-wide roles. The registry materializes the
//! enabled roles from configuration into an ordered [`RoleCatalogue`] and
//! answers lookups against it. Unknown keys, relations and values are never
//! errors; they are absent.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::{CacheStore, Clock};
use crate::config::{DepartmentRolesConfig, RoleSettings, ValidationConfig};

/// Cache key under which the serialized catalogue is stored.
pub const CATALOGUE_CACHE_KEY: &str = "authorization_department_roles";

/// Keys of the roles every installation ships with.
pub const STANDARD_ROLE_KEYS: [&str; 3] = ["manager", "engineer", "rep"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub key: String,
    /// Membership query name, e.g. `managers`.
    pub relation: String,
    /// Value stored on the principal's role column.
    pub dep_role_value: String,
    pub view_as_constant_prefix: String,
    pub label: String,
    pub enabled: bool,
    pub can_be_disabled: bool,
    /// Higher means more authority. Only used for pairwise comparisons.
    pub hierarchy_level: i64,
}

impl RoleDefinition {
    /// Fills every absent field with its deterministic default.
    pub fn normalize(key: &str, settings: &RoleSettings, hierarchy_level: i64) -> Self {
        Self {
            key: key.to_string(),
            relation: settings
                .relation
                .clone()
                .unwrap_or_else(|| format!("{key}s")),
            dep_role_value: settings
                .dep_role_value
                .clone()
                .unwrap_or_else(|| key.to_string()),
            view_as_constant_prefix: settings
                .view_as_constant_prefix
                .clone()
                .unwrap_or_else(|| key.to_uppercase()),
            label: settings.label.clone().unwrap_or_else(|| capitalize(key)),
            enabled: settings.enabled.unwrap_or(true),
            can_be_disabled: settings.can_be_disabled.unwrap_or(true),
            hierarchy_level,
        }
    }

    /// Lowercased view-as prefix used in permission keys.
    pub fn permission_suffix(&self) -> String {
        self.view_as_constant_prefix.to_lowercase()
    }

    pub fn relation_query(&self) -> RelationQuery {
        RelationQuery {
            relation: self.relation.clone(),
            dep_role_value: self.dep_role_value.clone(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// What a department store evaluates for one relation: principals whose role
/// column equals `dep_role_value` in the department.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationQuery {
    pub relation: String,
    pub dep_role_value: String,
}

/// Active, normalized roles in configuration order. Keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCatalogue {
    roles: Vec<RoleDefinition>,
}

impl RoleCatalogue {
    pub fn from_config(config: &DepartmentRolesConfig) -> Self {
        let roles = config
            .default_roles
            .iter()
            .filter(|(_, settings)| settings.is_enabled())
            .map(|(key, settings)| {
                let level = config.hierarchy.get(key).copied().unwrap_or(0);
                RoleDefinition::normalize(key, settings, level)
            })
            .collect();
        Self { roles }
    }

    pub fn from_roles(roles: Vec<RoleDefinition>) -> Self {
        let mut catalogue = Self::default();
        for role in roles {
            if !catalogue.contains_key(&role.key) {
                catalogue.roles.push(role);
            }
        }
        catalogue
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleDefinition> {
        self.roles.iter()
    }

    pub fn as_slice(&self) -> &[RoleDefinition] {
        &self.roles
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.key == key)
    }

    /// First role with this relation; relation names are not enforced unique.
    pub fn by_relation(&self, relation: &str) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.relation == relation)
    }

    pub fn by_dep_role_value(&self, value: &str) -> Option<&RoleDefinition> {
        self.roles.iter().find(|r| r.dep_role_value == value)
    }

    pub fn keys(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.key.clone()).collect()
    }

    pub fn relation_names(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.relation.clone()).collect()
    }

    pub fn dep_role_values(&self) -> Vec<String> {
        self.roles.iter().map(|r| r.dep_role_value.clone()).collect()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("a department role is required")]
    Required,

    #[error("department role is {len} characters long; maximum is {max}")]
    TooLong { len: usize, max: usize },

    #[error("`{0}` is not a known department role")]
    NotAllowed(String),
}

/// Rules for a principal's department-role column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationRules {
    pub max_length: usize,
    pub nullable: bool,
    pub allowed: Vec<String>,
}

impl ValidationRules {
    pub fn new(config: &ValidationConfig, allowed: Vec<String>) -> Self {
        Self {
            max_length: config.max_length,
            nullable: config.nullable,
            allowed,
        }
    }

    /// Rule strings for a form-validation layer.
    pub fn rules(&self) -> Vec<String> {
        let mut rules = vec!["string".to_string(), format!("max:{}", self.max_length)];
        if self.nullable {
            rules.push("nullable".to_string());
        }
        if !self.allowed.is_empty() {
            rules.push(format!("in:{}", self.allowed.join(",")));
        }
        rules
    }

    pub fn validate(&self, value: Option<&str>) -> Result<(), ValidationError> {
        let Some(value) = value else {
            return if self.nullable {
                Ok(())
            } else {
                Err(ValidationError::Required)
            };
        };
        let len = value.chars().count();
        if len > self.max_length {
            return Err(ValidationError::TooLong {
                len,
                max: self.max_length,
            });
        }
        if !self.allowed.is_empty() && !self.allowed.iter().any(|a| a == value) {
            return Err(ValidationError::NotAllowed(value.to_string()));
        }
        Ok(())
    }
}

struct Loaded {
    catalogue: Arc<RoleCatalogue>,
    expires_at: Option<DateTime<Utc>>,
}

/// Process-scoped role registry.
///
/// Built once at startup and shared by `Arc`. The catalogue is built lazily on
/// first access. With caching enabled it is also stored in the [`CacheStore`]
/// and refreshed after the TTL; `clear_cache`/`reload` force a rebuild.
pub struct RoleRegistry {
    config: Arc<DepartmentRolesConfig>,
    cache: Option<Arc<dyn CacheStore>>,
    clock: Clock,
    loaded: RwLock<Option<Loaded>>,
}

impl RoleRegistry {
    pub fn new(config: Arc<DepartmentRolesConfig>) -> Self {
        Self {
            config,
            cache: None,
            clock: Arc::new(Utc::now),
            loaded: RwLock::new(None),
        }
    }

    pub fn with_cache(config: Arc<DepartmentRolesConfig>, cache: Arc<dyn CacheStore>) -> Self {
        Self::with_cache_and_clock(config, cache, Arc::new(Utc::now))
    }

    /// Like [`RoleRegistry::with_cache`]; the local copy expires by `clock`.
    pub fn with_cache_and_clock(
        config: Arc<DepartmentRolesConfig>,
        cache: Arc<dyn CacheStore>,
        clock: Clock,
    ) -> Self {
        Self {
            config,
            cache: Some(cache),
            clock,
            loaded: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &DepartmentRolesConfig {
        &self.config
    }

    fn cache_store(&self) -> Option<&Arc<dyn CacheStore>> {
        if self.config.cache.enabled {
            self.cache.as_ref()
        } else {
            None
        }
    }

    /// Builds (or fetches from cache) the catalogue, bypassing the local copy.
    pub fn load(&self) -> RoleCatalogue {
        let Some(cache) = self.cache_store() else {
            return RoleCatalogue::from_config(&self.config);
        };

        if let Some(raw) = cache.get(CATALOGUE_CACHE_KEY) {
            match serde_json::from_str::<RoleCatalogue>(&raw) {
                Ok(catalogue) => {
                    tracing::debug!(roles = catalogue.len(), "role catalogue cache hit");
                    return catalogue;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "discarding unreadable role catalogue cache entry");
                }
            }
        }

        let catalogue = RoleCatalogue::from_config(&self.config);
        match serde_json::to_string(&catalogue) {
            Ok(raw) => cache.put(CATALOGUE_CACHE_KEY, raw, self.config.cache.ttl()),
            Err(err) => tracing::warn!(error = %err, "failed to serialize role catalogue"),
        }
        tracing::debug!(roles = catalogue.len(), "role catalogue rebuilt");
        catalogue
    }

    /// The active catalogue.
    pub fn catalogue(&self) -> Arc<RoleCatalogue> {
        let now = (self.clock)();
        {
            let loaded = self.loaded.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(loaded) = loaded.as_ref() {
                if loaded.expires_at.is_none_or(|at| now < at) {
                    return loaded.catalogue.clone();
                }
            }
        }

        let catalogue = Arc::new(self.load());
        let expires_at = self.cache_store().map(|_| {
            let ttl = chrono::Duration::from_std(self.config.cache.ttl()).unwrap_or(chrono::Duration::MAX);
            now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        *loaded = Some(Loaded {
            catalogue: catalogue.clone(),
            expires_at,
        });
        catalogue
    }

    /// Drops the cached catalogue; the next access recomputes it.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.forget(CATALOGUE_CACHE_KEY);
        }
        let mut loaded = self.loaded.write().unwrap_or_else(PoisonError::into_inner);
        *loaded = None;
    }

    pub fn reload(&self) -> Arc<RoleCatalogue> {
        self.clear_cache();
        self.catalogue()
    }

    pub fn all(&self) -> Arc<RoleCatalogue> {
        self.catalogue()
    }

    /// Same as [`Self::all`]: only default roles are materialized.
    pub fn default_roles(&self) -> Arc<RoleCatalogue> {
        self.catalogue()
    }

    pub fn get(&self, key: &str) -> Option<RoleDefinition> {
        self.catalogue().get(key).cloned()
    }

    pub fn by_relation(&self, relation: &str) -> Option<RoleDefinition> {
        self.catalogue().by_relation(relation).cloned()
    }

    pub fn by_dep_role_value(&self, value: &str) -> Option<RoleDefinition> {
        self.catalogue().by_dep_role_value(value).cloned()
    }

    pub fn is_valid_role(&self, key: &str) -> bool {
        self.catalogue().contains_key(key)
    }

    pub fn is_valid_dep_role(&self, value: &str) -> bool {
        self.catalogue().by_dep_role_value(value).is_some()
    }

    pub fn dep_role_values(&self) -> Vec<String> {
        self.catalogue().dep_role_values()
    }

    pub fn role_value(&self, key: &str) -> Option<String> {
        self.get(key).map(|r| r.dep_role_value)
    }

    pub fn relation_names(&self) -> Vec<String> {
        self.catalogue().relation_names()
    }

    pub fn relation_name(&self, key: &str) -> Option<String> {
        self.get(key).map(|r| r.relation)
    }

    /// Relations for the given keys; unknown keys are skipped, duplicates dropped.
    pub fn relation_names_for_keys<S: AsRef<str>>(&self, keys: &[S]) -> Vec<String> {
        let catalogue = self.catalogue();
        dedup(
            keys.iter()
                .filter_map(|k| catalogue.get(k.as_ref()))
                .map(|r| r.relation.clone()),
        )
    }

    pub fn manager_relation(&self) -> Option<String> {
        self.relation_name("manager")
    }

    pub fn engineer_relation(&self) -> Option<String> {
        self.relation_name("engineer")
    }

    pub fn rep_relation(&self) -> Option<String> {
        self.relation_name("rep")
    }

    pub fn manager_and_engineer_relations(&self) -> Vec<String> {
        self.relation_names_for_keys(&["manager", "engineer"])
    }

    /// Relations of the standard roles present in the catalogue.
    pub fn all_default_role_relations(&self) -> Vec<String> {
        self.relation_names_for_keys(&STANDARD_ROLE_KEYS)
    }

    /// Default relations followed by `custom`, each relation once.
    pub fn merge_custom_roles_with_defaults<S: AsRef<str>>(&self, custom: &[S]) -> Vec<String> {
        let defaults = self.all_default_role_relations();
        if custom.is_empty() {
            return defaults;
        }
        dedup(
            defaults
                .into_iter()
                .chain(custom.iter().map(|c| c.as_ref().to_string())),
        )
    }

    /// Roles configured for a department, or the full catalogue when the
    /// department has no (or an empty) specific subset.
    pub fn for_department(&self, department: &str) -> Vec<RoleDefinition> {
        let catalogue = self.catalogue();
        match self.config.department_specific_roles.get(department) {
            Some(keys) if !keys.is_empty() => catalogue
                .iter()
                .filter(|r| keys.iter().any(|k| *k == r.key))
                .cloned()
                .collect(),
            _ => catalogue.as_slice().to_vec(),
        }
    }

    /// `false` when either key is unknown.
    pub fn is_higher_than(&self, role: &str, other: &str) -> bool {
        let catalogue = self.catalogue();
        match (catalogue.get(role), catalogue.get(other)) {
            (Some(a), Some(b)) => a.hierarchy_level > b.hierarchy_level,
            _ => false,
        }
    }

    /// Data-driven relation dispatch: the query a department store evaluates
    /// for `relation`, or `None` when no active role uses it.
    pub fn relation_query(&self, relation: &str) -> Option<RelationQuery> {
        self.catalogue()
            .by_relation(relation)
            .map(RoleDefinition::relation_query)
    }

    /// Relation name to query table for every active role.
    pub fn relation_queries(&self) -> BTreeMap<String, RelationQuery> {
        let mut queries = BTreeMap::new();
        for role in self.catalogue().iter() {
            queries
                .entry(role.relation.clone())
                .or_insert_with(|| role.relation_query());
        }
        queries
    }

    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules::new(&self.config.validation, self.dep_role_values())
    }

    pub fn default_department_name(&self) -> &str {
        &self.config.default_department_name
    }
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
