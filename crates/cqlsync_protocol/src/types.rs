//! Closed enumerations used by resource parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Resource kinds
// ============================================================================

/// The kinds of remote objects cqlsync converges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Keyspace,
    Role,
    Grant,
    /// A keyspace managed by existence only.
    Database,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Keyspace => "keyspace",
            ResourceKind::Role => "role",
            ResourceKind::Grant => "grant",
            ResourceKind::Database => "database",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Privileges
// ============================================================================

/// A permission that can be granted to a role on a keyspace.
///
/// The declared names use underscores; the store's permission vocabulary
/// uses spaces (`ALL PERMISSIONS`). See [`Privilege::cql_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Privilege {
    AllPermissions,
    Alter,
    Authorize,
    Create,
    Describe,
    Drop,
    Execute,
    Modify,
    Select,
}

impl Privilege {
    pub const ALL: [Privilege; 9] = [
        Privilege::AllPermissions,
        Privilege::Alter,
        Privilege::Authorize,
        Privilege::Create,
        Privilege::Describe,
        Privilege::Drop,
        Privilege::Execute,
        Privilege::Modify,
        Privilege::Select,
    ];

    /// Declared (portable) name, e.g. `ALL_PERMISSIONS`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Privilege::AllPermissions => "ALL_PERMISSIONS",
            Privilege::Alter => "ALTER",
            Privilege::Authorize => "AUTHORIZE",
            Privilege::Create => "CREATE",
            Privilege::Describe => "DESCRIBE",
            Privilege::Drop => "DROP",
            Privilege::Execute => "EXECUTE",
            Privilege::Modify => "MODIFY",
            Privilege::Select => "SELECT",
        }
    }

    /// Name as the store spells it in statements and in `role_permissions`.
    pub fn cql_name(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Privilege {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(' ', "_");
        Privilege::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("Invalid privilege: '{}'", s))
    }
}

// ============================================================================
// Replication strategies
// ============================================================================

/// Keyspace replication class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplicationStrategy {
    #[serde(rename = "SimpleStrategy")]
    Simple,
    #[serde(rename = "NetworkTopologyStrategy")]
    NetworkTopology,
}

impl ReplicationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationStrategy::Simple => "SimpleStrategy",
            ReplicationStrategy::NetworkTopology => "NetworkTopologyStrategy",
        }
    }

    /// Parse a class name as reported by the store.
    ///
    /// Fully qualified names collapse to their short form, so
    /// `org.apache.cassandra.locator.SimpleStrategy` parses as
    /// [`ReplicationStrategy::Simple`].
    pub fn from_class_name(class: &str) -> Option<Self> {
        let short = class.trim().rsplit('.').next().unwrap_or_default();
        short.parse().ok()
    }
}

impl Default for ReplicationStrategy {
    fn default() -> Self {
        ReplicationStrategy::Simple
    }
}

impl fmt::Display for ReplicationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReplicationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SimpleStrategy" => Ok(ReplicationStrategy::Simple),
            "NetworkTopologyStrategy" => Ok(ReplicationStrategy::NetworkTopology),
            _ => Err(format!(
                "Invalid replication strategy: '{}'. Expected: SimpleStrategy or NetworkTopologyStrategy",
                s
            )),
        }
    }
}
