//! Quoting for names and literals interpolated into statements.
//!
//! Identifiers cannot be bound as parameters, so every keyspace or role name
//! that ends up in statement text must pass through [`quote_identifier`].

/// Wrap an identifier in double quotes, doubling embedded double quotes.
pub fn quote_identifier(id: &str) -> String {
    format!("\"{}\"", id.replace('"', "\"\""))
}

/// Wrap a string literal in single quotes, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
