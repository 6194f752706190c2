//! Managed resources: metadata, desired parameters and status.
//!
//! Every desired field is an `Option` so "not specified" stays distinct from
//! `false`/`0`. Unset fields are late-initialised from the first observation
//! and then persisted by whoever owns the resource record.

use serde::{Deserialize, Serialize};

use crate::status::ResourceStatus;
use crate::types::{Privilege, ReplicationStrategy, ResourceKind};

// ============================================================================
// Metadata
// ============================================================================

/// Identity of a managed resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Name of the resource record itself.
    pub name: String,
    /// Literal name of the object in the store. Assigned once, then immutable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_name: Option<String>,
    /// The owner wants the remote object gone.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deletion_requested: bool,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The join key for every statement: the external name, or the
    /// resource's own name if none has been assigned yet.
    pub fn external_name(&self) -> &str {
        self.external_name.as_deref().unwrap_or(&self.name)
    }

    /// Default the external name to the resource name.
    ///
    /// Returns `true` if a value was assigned. An existing value is never
    /// replaced.
    pub fn initialize_external_name(&mut self) -> bool {
        if self.external_name.is_some() {
            return false;
        }
        self.external_name = Some(self.name.clone());
        true
    }
}

// ============================================================================
// Desired parameters
// ============================================================================

/// Ties a parameter block to the kind of object it describes.
pub trait ResourceParameters:
    Clone + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static
{
    const KIND: ResourceKind;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_class: Option<ReplicationStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durable_writes: Option<bool>,
}

impl ResourceParameters for KeyspaceParameters {
    const KIND: ResourceKind = ResourceKind::Keyspace;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superuser: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<bool>,
}

impl ResourceParameters for RoleParameters {
    const KIND: ResourceKind = ResourceKind::Role;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantParameters {
    /// Transported as a list; treated as a set.
    #[serde(default)]
    pub privileges: Vec<Privilege>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyspace: Option<String>,
}

impl GrantParameters {
    /// Desired privileges with duplicates collapsed, first occurrence wins.
    pub fn privilege_set(&self) -> Vec<Privilege> {
        let mut seen = Vec::with_capacity(self.privileges.len());
        for privilege in &self.privileges {
            if !seen.contains(privilege) {
                seen.push(*privilege);
            }
        }
        seen
    }
}

impl ResourceParameters for GrantParameters {
    const KIND: ResourceKind = ResourceKind::Grant;
}

/// A database is a keyspace tracked by existence alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseParameters {}

impl ResourceParameters for DatabaseParameters {
    const KIND: ResourceKind = ResourceKind::Database;
}

// ============================================================================
// Resources
// ============================================================================

/// A managed resource record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource<P> {
    #[serde(flatten)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: P,
    #[serde(default, skip_serializing_if = "ResourceStatus::is_empty")]
    pub status: ResourceStatus,
}

impl<P: ResourceParameters> Resource<P> {
    pub fn new(name: impl Into<String>, spec: P) -> Self {
        Self {
            metadata: ObjectMeta::new(name),
            spec,
            status: ResourceStatus::default(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        P::KIND
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn external_name(&self) -> &str {
        self.metadata.external_name()
    }

    pub fn with_external_name(mut self, external_name: impl Into<String>) -> Self {
        self.metadata.external_name = Some(external_name.into());
        self
    }
}

pub type Keyspace = Resource<KeyspaceParameters>;
pub type Role = Resource<RoleParameters>;
pub type Grant = Resource<GrantParameters>;
pub type Database = Resource<DatabaseParameters>;

/// Any managed resource, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagedResource {
    Keyspace(Keyspace),
    Role(Role),
    Grant(Grant),
    Database(Database),
}

impl ManagedResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ManagedResource::Keyspace(_) => ResourceKind::Keyspace,
            ManagedResource::Role(_) => ResourceKind::Role,
            ManagedResource::Grant(_) => ResourceKind::Grant,
            ManagedResource::Database(_) => ResourceKind::Database,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            ManagedResource::Keyspace(r) => &r.metadata,
            ManagedResource::Role(r) => &r.metadata,
            ManagedResource::Grant(r) => &r.metadata,
            ManagedResource::Database(r) => &r.metadata,
        }
    }

    pub fn status(&self) -> &ResourceStatus {
        match self {
            ManagedResource::Keyspace(r) => &r.status,
            ManagedResource::Role(r) => &r.status,
            ManagedResource::Grant(r) => &r.status,
            ManagedResource::Database(r) => &r.status,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ManagedResource::Keyspace(r) => &mut r.metadata,
            ManagedResource::Role(r) => &mut r.metadata,
            ManagedResource::Grant(r) => &mut r.metadata,
            ManagedResource::Database(r) => &mut r.metadata,
        }
    }

    pub fn status_mut(&mut self) -> &mut ResourceStatus {
        match self {
            ManagedResource::Keyspace(r) => &mut r.status,
            ManagedResource::Role(r) => &mut r.status,
            ManagedResource::Grant(r) => &mut r.status,
            ManagedResource::Database(r) => &mut r.status,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata().name
    }
}

impl From<Keyspace> for ManagedResource {
    fn from(value: Keyspace) -> Self {
        ManagedResource::Keyspace(value)
    }
}

impl From<Role> for ManagedResource {
    fn from(value: Role) -> Self {
        ManagedResource::Role(value)
    }
}

impl From<Grant> for ManagedResource {
    fn from(value: Grant) -> Self {
        ManagedResource::Grant(value)
    }
}

impl From<Database> for ManagedResource {
    fn from(value: Database) -> Self {
        ManagedResource::Database(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_name_defaults_to_name() {
        let mut meta = ObjectMeta::new("analytics");
        assert_eq!(meta.external_name(), "analytics");
        assert!(meta.initialize_external_name());
        assert_eq!(meta.external_name.as_deref(), Some("analytics"));
    }

    #[test]
    fn test_external_name_is_never_replaced() {
        let mut meta = ObjectMeta::new("analytics");
        meta.external_name = Some("analytics_v1".to_string());
        assert!(!meta.initialize_external_name());
        assert_eq!(meta.external_name(), "analytics_v1");
    }

    #[test]
    fn test_privilege_set_collapses_duplicates() {
        let params = GrantParameters {
            privileges: vec![Privilege::Select, Privilege::Modify, Privilege::Select],
            role: Some("alice".to_string()),
            keyspace: Some("analytics".to_string()),
        };
        assert_eq!(params.privilege_set(), vec![Privilege::Select, Privilege::Modify]);
    }

    #[test]
    fn test_keyspace_toml_leaves_unset_fields_absent() {
        let raw = r#"
            name = "analytics"

            [spec]
            replication_factor = 3
        "#;
        let keyspace: Keyspace = toml::from_str(raw).unwrap();
        assert_eq!(keyspace.name(), "analytics");
        assert_eq!(keyspace.spec.replication_factor, Some(3));
        assert_eq!(keyspace.spec.replication_class, None);
        assert_eq!(keyspace.spec.durable_writes, None);
        assert!(!keyspace.metadata.deletion_requested);
    }

    #[test]
    fn test_database_spec_is_optional() {
        let database: Database = toml::from_str("name = \"legacy\"").unwrap();
        assert_eq!(database.kind(), ResourceKind::Database);
        assert_eq!(database.external_name(), "legacy");
    }
}
