//! Resource model for cqlsync.
//!
//! Everything a controller reads (desired parameters, object metadata) and
//! everything it writes back (status conditions, connection secrets) lives
//! here so the controller, test utilities and CLI agree on one shape.

pub mod defaults;
pub mod resources;
pub mod secret;
pub mod status;
pub mod types;

pub use resources::{
    Database, DatabaseParameters, Grant, GrantParameters, Keyspace, KeyspaceParameters,
    ManagedResource, ObjectMeta, Resource, ResourceParameters, Role, RoleParameters,
};
pub use secret::ConnectionSecret;
pub use status::{Condition, ConditionReason, ConditionType, ResourceStatus};
pub use types::{Privilege, ReplicationStrategy, ResourceKind};
