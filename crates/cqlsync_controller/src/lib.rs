//! Convergence core for cqlsync.
//!
//! Each resource kind has an [`ExternalClient`] implementing
//! Observe/Create/Update/Delete against a [`cqlsync_db::StoreExecutor`].
//! Diffing and late-initialisation are pure functions in [`diff`]. The
//! [`Reconciler`] drives one pass per resource and records the outcome as
//! status conditions.
//!
//! Controllers never retry and never log; retry timing belongs to whoever
//! schedules passes.

pub mod database;
pub mod diff;
pub mod error;
pub mod grant;
pub mod keyspace;
pub mod observation;
pub mod password;
pub mod reconciler;
pub mod role;

pub use database::DatabaseClient;
pub use error::{ControllerError, ControllerResult, PasswordError, Phase};
pub use grant::GrantClient;
pub use keyspace::KeyspaceClient;
pub use observation::{ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate};
pub use password::{FixedPassword, PasswordGenerator, RandomPassword};
pub use reconciler::{
    reconcile_all, ConnectionPublisher, Connector, MemoryPublisher, PublishError, ReconcileAction,
    ReconcileOutcome, Reconciler, ReconcilerConfig,
};
pub use role::RoleClient;
