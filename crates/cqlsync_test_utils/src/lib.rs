//! Test infrastructure for cqlsync.
//!
//! - [`RecordingStore`]: scripted query results, recorded statements and
//!   injected failures, for asserting exact statement text.
//! - [`SimulatedCluster`]: an in-memory cluster that applies the keyspace,
//!   role and permission statements the controllers issue, for convergence
//!   tests across several passes.

pub mod recording;
pub mod rows;
pub mod simulated;
mod statement;

pub use recording::{RecordedStatement, RecordingStore};
pub use simulated::{SimulatedCluster, SimulatedSession};
