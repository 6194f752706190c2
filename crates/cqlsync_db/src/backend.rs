//! Store executor abstraction.
//!
//! Controllers see the cluster as two capabilities: execute a statement, or
//! run a query and scan the rows it returns. Connection failures surface once
//! when the executor is built; after that every call is individually fallible.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use cqlsync_protocol::ConnectionSecret;
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Store handle is not connected")]
    NotConnected,

    #[error("Statement failed: {0}")]
    Execution(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Backend not available: {0}")]
    NotAvailable(String),
}

// ============================================================================
// Values
// ============================================================================

/// Value type for statement parameters and row cells.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Text(String),
    /// Lists and sets.
    List(Vec<DbValue>),
    Map(Vec<(DbValue, DbValue)>),
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        DbValue::Boolean(v)
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Integer(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DbValue::Null,
        }
    }
}

impl<T: Into<DbValue>> From<Vec<T>> for DbValue {
    fn from(v: Vec<T>) -> Self {
        DbValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Trait for converting from DbValue.
pub trait FromDbValue: Sized {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError>;
}

impl FromDbValue for bool {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Boolean(v) => Ok(*v),
            DbValue::Null => Err(BackendError::TypeConversion(
                "bool field is NULL - use Option<bool> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected boolean".to_string())),
        }
    }
}

impl FromDbValue for i64 {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Integer(v) => Ok(*v),
            DbValue::Null => Err(BackendError::TypeConversion(
                "i64 field is NULL - use Option<i64> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected integer".to_string())),
        }
    }
}

impl FromDbValue for String {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Text(v) => Ok(v.clone()),
            DbValue::Null => Err(BackendError::TypeConversion(
                "String field is NULL - use Option<String> for nullable columns".to_string(),
            )),
            _ => Err(BackendError::TypeConversion("Expected text".to_string())),
        }
    }
}

impl<T: FromDbValue> FromDbValue for Option<T> {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Null => Ok(None),
            _ => T::from_db_value(value).map(Some),
        }
    }
}

/// A NULL collection reads as empty; the store does not distinguish them.
impl<T: FromDbValue> FromDbValue for Vec<T> {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::List(items) => items.iter().map(T::from_db_value).collect(),
            DbValue::Null => Ok(Vec::new()),
            _ => Err(BackendError::TypeConversion("Expected list or set".to_string())),
        }
    }
}

impl FromDbValue for BTreeMap<String, String> {
    fn from_db_value(value: &DbValue) -> Result<Self, BackendError> {
        match value {
            DbValue::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((String::from_db_value(k)?, String::from_db_value(v)?)))
                .collect(),
            DbValue::Null => Ok(BTreeMap::new()),
            _ => Err(BackendError::TypeConversion("Expected map".to_string())),
        }
    }
}

// ============================================================================
// Rows
// ============================================================================

/// Row data from a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct DbRow {
    columns: Vec<String>,
    values: Vec<DbValue>,
}

impl DbRow {
    /// Create a new row with column names and values.
    pub fn new(columns: Vec<String>, values: Vec<DbValue>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column index.
    pub fn get<T: FromDbValue>(&self, index: usize) -> Result<T, BackendError> {
        self.values
            .get(index)
            .ok_or_else(|| {
                BackendError::TypeConversion(format!("Column index {} out of bounds", index))
            })
            .and_then(|v| T::from_db_value(v))
    }

    /// Get a value by column name.
    pub fn get_by_name<T: FromDbValue>(&self, name: &str) -> Result<T, BackendError> {
        let index =
            self.columns.iter().position(|c| c == name).ok_or_else(|| {
                BackendError::TypeConversion(format!("Column '{}' not found", name))
            })?;
        self.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Sequential cursor over the rows of one query.
#[derive(Debug, Default)]
pub struct RowCursor {
    rows: VecDeque<DbRow>,
    closed: bool,
}

impl RowCursor {
    pub fn new(rows: Vec<DbRow>) -> Self {
        Self {
            rows: rows.into(),
            closed: false,
        }
    }

    /// Advance to the next row. A closed cursor yields nothing.
    pub fn next_row(&mut self) -> Option<DbRow> {
        if self.closed {
            return None;
        }
        self.rows.pop_front()
    }

    /// Release remaining rows. Safe to call more than once.
    pub fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Iterator for RowCursor {
    type Item = DbRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row()
    }
}

// ============================================================================
// Executor
// ============================================================================

/// The store as seen by controllers.
///
/// Futures returned by `exec`/`query` may be dropped at any await point to
/// cancel the call; no cleanup beyond that is attempted.
#[async_trait]
pub trait StoreExecutor: Send + Sync {
    /// Execute a statement that returns no rows.
    async fn exec(&self, statement: &str, params: &[DbValue]) -> Result<(), BackendError>;

    /// Run a query and return a cursor over its rows.
    async fn query(&self, statement: &str, params: &[DbValue]) -> Result<RowCursor, BackendError>;

    /// Release the underlying connection. Safe on a closed handle.
    fn close(&mut self);

    /// Assemble login details for `username` against this store. No remote call.
    fn connection_details(&self, username: &str, password: &str) -> ConnectionSecret;
}

#[async_trait]
impl<E: StoreExecutor + ?Sized> StoreExecutor for Box<E> {
    async fn exec(&self, statement: &str, params: &[DbValue]) -> Result<(), BackendError> {
        (**self).exec(statement, params).await
    }

    async fn query(&self, statement: &str, params: &[DbValue]) -> Result<RowCursor, BackendError> {
        (**self).query(statement, params).await
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn connection_details(&self, username: &str, password: &str) -> ConnectionSecret {
        (**self).connection_details(username, password)
    }
}
