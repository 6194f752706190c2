//! Store executor boundary for cqlsync.
//!
//! Controllers only ever talk to a [`StoreExecutor`]. This crate provides:
//! - the executor trait with typed values, rows and a scan cursor
//! - identifier/literal quoting for statement text
//! - connection configuration and credential-map parsing
//! - [`TracedExecutor`], which adds per-statement tracing spans
//! - `ScyllaExecutor` for live clusters (`scylla` feature)
//!
//! # Usage
//!
//! ```rust,ignore
//! use cqlsync_db::{quote_identifier, DbValue, StoreExecutor};
//!
//! let mut rows = db
//!     .query("SELECT is_superuser, can_login FROM system_auth.roles WHERE role = ?", &[DbValue::from("alice")])
//!     .await?;
//! db.exec(&format!("DROP ROLE IF EXISTS {}", quote_identifier("alice")), &[]).await?;
//! ```

mod backend;
mod config;
mod quote;
mod traced;

#[cfg(feature = "scylla")]
mod cluster;

pub use backend::{BackendError, DbRow, DbValue, FromDbValue, RowCursor, StoreExecutor};
pub use config::{ConfigError, ConnectionConfig};
pub use quote::{quote_identifier, quote_literal};
pub use traced::{statement_op, TracedExecutor};

#[cfg(feature = "scylla")]
pub use cluster::ScyllaExecutor;

/// Name of the cargo feature that enables live-cluster support.
pub const LIVE_BACKEND_FEATURE: &str = "scylla";

/// Whether this build can talk to a live cluster.
pub fn live_backend_available() -> bool {
    cfg!(feature = "scylla")
}
