//! Scripted executor that records every statement it sees.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use cqlsync_db::{BackendError, ConnectionConfig, DbRow, DbValue, RowCursor, StoreExecutor};
use cqlsync_protocol::ConnectionSecret;

/// One statement handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub statement: String,
    pub params: Vec<DbValue>,
    pub succeeded: bool,
}

#[derive(Default)]
struct State {
    query_results: VecDeque<Result<Vec<DbRow>, String>>,
    queries: Vec<RecordedStatement>,
    execs: Vec<RecordedStatement>,
    fail_exec_at: Option<(usize, String)>,
    closed: bool,
    close_calls: usize,
}

/// Executor with scripted query results.
///
/// Clones share state, so a test can keep one handle while the code under
/// test owns another. Queries with nothing scripted return no rows.
#[derive(Clone)]
pub struct RecordingStore {
    state: Arc<Mutex<State>>,
    config: ConnectionConfig,
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::with_endpoint("cassandra.test", 9042)
    }

    pub fn with_endpoint(endpoint: &str, port: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            config: ConnectionConfig::new(endpoint, port),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("recording store poisoned")
    }

    /// Queue the rows returned by the next query.
    pub fn push_rows(&self, rows: Vec<DbRow>) -> &Self {
        self.state().query_results.push_back(Ok(rows));
        self
    }

    /// Make the next query fail.
    pub fn push_query_error(&self, message: &str) -> &Self {
        self.state().query_results.push_back(Err(message.to_string()));
        self
    }

    /// Make the `index`-th exec call (0-based, counting all attempts) fail.
    pub fn fail_exec_at(&self, index: usize, message: &str) -> &Self {
        self.state().fail_exec_at = Some((index, message.to_string()));
        self
    }

    /// Statements that executed successfully, in order.
    pub fn exec_statements(&self) -> Vec<String> {
        self.state()
            .execs
            .iter()
            .filter(|s| s.succeeded)
            .map(|s| s.statement.clone())
            .collect()
    }

    /// Every exec attempt, including failed ones.
    pub fn attempted_execs(&self) -> Vec<RecordedStatement> {
        self.state().execs.clone()
    }

    pub fn queries(&self) -> Vec<RecordedStatement> {
        self.state().queries.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn close_calls(&self) -> usize {
        self.state().close_calls
    }
}

#[async_trait]
impl StoreExecutor for RecordingStore {
    async fn exec(&self, statement: &str, params: &[DbValue]) -> Result<(), BackendError> {
        let mut state = self.state();
        if state.closed {
            return Err(BackendError::NotConnected);
        }
        let attempt = state.execs.len();
        let failure = match &state.fail_exec_at {
            Some((index, message)) if *index == attempt => Some(message.clone()),
            _ => None,
        };
        state.execs.push(RecordedStatement {
            statement: statement.to_string(),
            params: params.to_vec(),
            succeeded: failure.is_none(),
        });
        match failure {
            Some(message) => Err(BackendError::Execution(message)),
            None => Ok(()),
        }
    }

    async fn query(&self, statement: &str, params: &[DbValue]) -> Result<RowCursor, BackendError> {
        let mut state = self.state();
        if state.closed {
            return Err(BackendError::NotConnected);
        }
        let result = state.query_results.pop_front().unwrap_or_else(|| Ok(Vec::new()));
        state.queries.push(RecordedStatement {
            statement: statement.to_string(),
            params: params.to_vec(),
            succeeded: result.is_ok(),
        });
        result.map(RowCursor::new).map_err(BackendError::Query)
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.closed = true;
        state.close_calls += 1;
    }

    fn connection_details(&self, username: &str, password: &str) -> ConnectionSecret {
        self.config.connection_details(username, password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::role_row;

    #[tokio::test]
    async fn test_scripted_rows_are_returned_in_order() {
        let store = RecordingStore::new();
        store.push_rows(vec![role_row(true, false)]).push_query_error("timeout");

        let mut cursor = store.query("SELECT 1", &[]).await.unwrap();
        assert!(cursor.next_row().is_some());
        assert!(store.query("SELECT 2", &[]).await.is_err());
        assert!(store.query("SELECT 3", &[]).await.unwrap().next_row().is_none());
        assert_eq!(store.queries().len(), 3);
    }

    #[tokio::test]
    async fn test_exec_failure_is_recorded_as_attempt() {
        let store = RecordingStore::new();
        store.fail_exec_at(1, "unavailable");

        store.exec("A", &[]).await.unwrap();
        assert!(store.exec("B", &[]).await.is_err());
        store.exec("C", &[]).await.unwrap();

        assert_eq!(store.exec_statements(), vec!["A".to_string(), "C".to_string()]);
        assert_eq!(store.attempted_execs().len(), 3);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = RecordingStore::new();
        let mut handle = store.clone();
        handle.close();
        handle.close();
        assert!(matches!(store.exec("A", &[]).await, Err(BackendError::NotConnected)));
        assert_eq!(store.close_calls(), 2);
    }
}
