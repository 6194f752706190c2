//! Canonical default values shared across controllers and the CLI.

/// Native CQL protocol port, used when credentials carry no usable port.
pub const DEFAULT_CQL_PORT: u16 = 9042;

/// Replication factor applied on keyspace creation when none is desired.
pub const DEFAULT_REPLICATION_FACTOR: u32 = 1;

/// `durable_writes` applied on keyspace creation when none is desired.
pub const DEFAULT_DURABLE_WRITES: bool = true;

/// Upper bound on concurrently running reconciliation passes.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Budget for a single reconciliation pass before it is cancelled.
pub const DEFAULT_PASS_TIMEOUT_SECS: u64 = 30;

/// Length of generated role passwords.
pub const GENERATED_PASSWORD_LENGTH: usize = 27;

/// Namespace prefix the store puts in front of built-in replication classes.
pub const REPLICATION_CLASS_PREFIX: &str = "org.apache.cassandra.locator.";
