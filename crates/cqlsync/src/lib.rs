//! cqlsync: converge Cassandra keyspaces, roles and grants to a manifest.

pub mod connector;
pub mod manifest;
pub mod secrets;
pub mod sweep;

pub use connector::ClusterConnector;
pub use manifest::Manifest;
pub use secrets::{DiscardingPublisher, FileSecretPublisher};
pub use sweep::{run_sweep, SweepReport};
