//! Row builders shaped like the system tables the controllers read.

use cqlsync_db::{DbRow, DbValue};

fn row(columns: &[&str], values: Vec<DbValue>) -> DbRow {
    DbRow::new(columns.iter().map(|c| c.to_string()).collect(), values)
}

/// A `system_schema.keyspaces` row (`replication`, `durable_writes`).
pub fn keyspace_row(class: &str, replication_factor: Option<&str>, durable_writes: bool) -> DbRow {
    let mut replication = vec![(DbValue::from("class"), DbValue::from(class))];
    if let Some(factor) = replication_factor {
        replication.push((DbValue::from("replication_factor"), DbValue::from(factor)));
    }
    row(
        &["replication", "durable_writes"],
        vec![DbValue::Map(replication), DbValue::from(durable_writes)],
    )
}

/// A `system_schema.keyspaces` row with only `keyspace_name`.
pub fn keyspace_name_row(name: &str) -> DbRow {
    row(&["keyspace_name"], vec![DbValue::from(name)])
}

/// A `system_auth.roles` row (`is_superuser`, `can_login`).
pub fn role_row(is_superuser: bool, can_login: bool) -> DbRow {
    row(
        &["is_superuser", "can_login"],
        vec![DbValue::from(is_superuser), DbValue::from(can_login)],
    )
}

/// A `system_auth.role_permissions` row (`permissions`).
pub fn permissions_row(permissions: &[&str]) -> DbRow {
    row(
        &["permissions"],
        vec![DbValue::List(permissions.iter().map(|p| DbValue::from(*p)).collect())],
    )
}
