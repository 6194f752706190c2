//! Live-cluster executor backed by the scylla CQL driver.
//!
//! Statements run at consistency `ALL`: schema and auth changes must be
//! visible on every replica before the next observation reads them back.

use async_trait::async_trait;
use cqlsync_protocol::ConnectionSecret;
use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::statement::Consistency;
use scylla::value::{CqlValue, Row};
use tracing::info;

use crate::backend::{BackendError, DbRow, DbValue, RowCursor, StoreExecutor};
use crate::config::ConnectionConfig;

/// One driver session, owned by a single reconciliation pass.
pub struct ScyllaExecutor {
    session: Option<Session>,
    config: ConnectionConfig,
}

impl ScyllaExecutor {
    /// Connect, failing here rather than on the first statement.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, BackendError> {
        let profile = ExecutionProfile::builder()
            .consistency(Consistency::All)
            .build();
        let mut builder = SessionBuilder::new()
            .known_node(config.known_node())
            .default_execution_profile_handle(profile.into_handle());
        if config.has_credentials() {
            builder = builder.user(config.username.clone(), config.password.clone());
        }

        let session = builder
            .build()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;
        info!(node = %config.known_node(), "Connected to cluster");

        Ok(Self {
            session: Some(session),
            config: config.clone(),
        })
    }

    fn session(&self) -> Result<&Session, BackendError> {
        self.session.as_ref().ok_or(BackendError::NotConnected)
    }

    fn to_cql_params(params: &[DbValue]) -> Vec<Option<CqlValue>> {
        params.iter().map(to_cql_value).collect()
    }
}

#[async_trait]
impl StoreExecutor for ScyllaExecutor {
    async fn exec(&self, statement: &str, params: &[DbValue]) -> Result<(), BackendError> {
        self.session()?
            .query_unpaged(statement, Self::to_cql_params(params))
            .await
            .map_err(|e| BackendError::Execution(e.to_string()))?;
        Ok(())
    }

    async fn query(&self, statement: &str, params: &[DbValue]) -> Result<RowCursor, BackendError> {
        let result = self
            .session()?
            .query_unpaged(statement, Self::to_cql_params(params))
            .await
            .map_err(|e| BackendError::Query(e.to_string()))?;
        let rows_result = result
            .into_rows_result()
            .map_err(|e| BackendError::Query(e.to_string()))?;

        let columns: Vec<String> = rows_result
            .column_specs()
            .iter()
            .map(|spec| spec.name().to_string())
            .collect();

        let mut rows = Vec::new();
        for row in rows_result
            .rows::<Row>()
            .map_err(|e| BackendError::TypeConversion(e.to_string()))?
        {
            let row = row.map_err(|e| BackendError::TypeConversion(e.to_string()))?;
            let values = row
                .columns
                .into_iter()
                .map(|cell| cell.map(from_cql_value).unwrap_or(DbValue::Null))
                .collect();
            rows.push(DbRow::new(columns.clone(), values));
        }

        Ok(RowCursor::new(rows))
    }

    fn close(&mut self) {
        // Dropping the session tears down its connection pool.
        self.session.take();
    }

    fn connection_details(&self, username: &str, password: &str) -> ConnectionSecret {
        self.config.connection_details(username, password)
    }
}

fn to_cql_value(value: &DbValue) -> Option<CqlValue> {
    match value {
        DbValue::Null => None,
        DbValue::Boolean(v) => Some(CqlValue::Boolean(*v)),
        DbValue::Integer(v) => Some(CqlValue::BigInt(*v)),
        DbValue::Text(v) => Some(CqlValue::Text(v.clone())),
        DbValue::List(items) => Some(CqlValue::List(
            items.iter().filter_map(to_cql_value).collect(),
        )),
        DbValue::Map(entries) => Some(CqlValue::Map(
            entries
                .iter()
                .filter_map(|(k, v)| Some((to_cql_value(k)?, to_cql_value(v)?)))
                .collect(),
        )),
    }
}

fn from_cql_value(value: CqlValue) -> DbValue {
    match value {
        CqlValue::Boolean(v) => DbValue::Boolean(v),
        CqlValue::TinyInt(v) => DbValue::Integer(v as i64),
        CqlValue::SmallInt(v) => DbValue::Integer(v as i64),
        CqlValue::Int(v) => DbValue::Integer(v as i64),
        CqlValue::BigInt(v) => DbValue::Integer(v),
        CqlValue::Text(v) | CqlValue::Ascii(v) => DbValue::Text(v),
        CqlValue::List(items) | CqlValue::Set(items) => {
            DbValue::List(items.into_iter().map(from_cql_value).collect())
        }
        CqlValue::Map(entries) => DbValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (from_cql_value(k), from_cql_value(v)))
                .collect(),
        ),
        CqlValue::Empty => DbValue::Null,
        other => DbValue::Text(format!("{:?}", other)),
    }
}
