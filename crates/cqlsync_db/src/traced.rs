//! Tracing wrapper for any [`StoreExecutor`].

use std::time::Instant;

use async_trait::async_trait;
use cqlsync_protocol::ConnectionSecret;
use tracing::{debug_span, Instrument};

use crate::backend::{BackendError, DbValue, RowCursor, StoreExecutor};

/// Opens a `db.exec` / `db.query` span around every call.
///
/// Only the statement verb is recorded: role statements carry password
/// literals and must not reach the logs.
pub struct TracedExecutor<E> {
    inner: E,
}

impl<E: StoreExecutor> TracedExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<E: StoreExecutor> StoreExecutor for TracedExecutor<E> {
    async fn exec(&self, statement: &str, params: &[DbValue]) -> Result<(), BackendError> {
        let span = debug_span!(
            "db.exec",
            op = %statement_op(statement),
            params = params.len(),
            duration_ms = tracing::field::Empty
        );
        let start = Instant::now();
        let result = self.inner.exec(statement, params).instrument(span.clone()).await;
        span.record("duration_ms", start.elapsed().as_millis() as u64);
        result
    }

    async fn query(&self, statement: &str, params: &[DbValue]) -> Result<RowCursor, BackendError> {
        let span = debug_span!(
            "db.query",
            op = %statement_op(statement),
            params = params.len(),
            duration_ms = tracing::field::Empty
        );
        let start = Instant::now();
        let result = self.inner.query(statement, params).instrument(span.clone()).await;
        span.record("duration_ms", start.elapsed().as_millis() as u64);
        result
    }

    fn close(&mut self) {
        self.inner.close()
    }

    fn connection_details(&self, username: &str, password: &str) -> ConnectionSecret {
        self.inner.connection_details(username, password)
    }
}

/// Leading verb and object type, e.g. `CREATE ROLE` or `SELECT`.
pub fn statement_op(statement: &str) -> String {
    let mut words = statement.split_whitespace();
    match words.next() {
        Some(verb) if verb.eq_ignore_ascii_case("SELECT") => "SELECT".to_string(),
        Some(verb) => match words.next() {
            Some(object) => format!("{} {}", verb.to_uppercase(), object.to_uppercase()),
            None => verb.to_uppercase(),
        },
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_op_never_includes_literals() {
        let op = statement_op(
            "CREATE ROLE IF NOT EXISTS \"alice\" WITH SUPERUSER = false AND LOGIN = true AND PASSWORD = 'p@ss1'",
        );
        assert_eq!(op, "CREATE ROLE");
        assert_eq!(statement_op("GRANT SELECT ON KEYSPACE \"a\" TO \"b\""), "GRANT SELECT");
        assert_eq!(statement_op("SELECT is_superuser FROM system_auth.roles"), "SELECT");
        assert_eq!(statement_op("   "), "unknown");
    }
}
