//! Keyspace convergence.

use std::collections::BTreeMap;

use async_trait::async_trait;
use cqlsync_db::{quote_identifier, BackendError, DbRow, DbValue, StoreExecutor};
use cqlsync_protocol::defaults::{DEFAULT_DURABLE_WRITES, DEFAULT_REPLICATION_FACTOR};
use cqlsync_protocol::{
    Condition, Keyspace, KeyspaceParameters, ReplicationStrategy, ResourceKind,
};

use crate::diff::{keyspace_late_init, keyspace_up_to_date};
use crate::error::{ControllerError, ControllerResult, Phase};
use crate::observation::{ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate};

const SELECT_KEYSPACE: &str =
    "SELECT replication, durable_writes FROM system_schema.keyspaces WHERE keyspace_name = ?";

pub struct KeyspaceClient<'a> {
    db: &'a dyn StoreExecutor,
}

impl<'a> KeyspaceClient<'a> {
    pub fn new(db: &'a dyn StoreExecutor) -> Self {
        Self { db }
    }
}

fn fail(phase: Phase) -> impl FnOnce(BackendError) -> ControllerError {
    ControllerError::operation(ResourceKind::Keyspace, phase)
}

/// Parse a `system_schema.keyspaces` row. Values that cannot be
/// interpreted are left unknown rather than defaulted.
fn observed_parameters(row: &DbRow) -> Result<KeyspaceParameters, BackendError> {
    let replication: BTreeMap<String, String> = row.get_by_name("replication")?;
    let durable_writes: Option<bool> = row.get_by_name("durable_writes")?;
    Ok(KeyspaceParameters {
        replication_class: replication
            .get("class")
            .and_then(|class| ReplicationStrategy::from_class_name(class)),
        replication_factor: replication
            .get("replication_factor")
            .and_then(|factor| factor.parse().ok()),
        durable_writes,
    })
}

/// `CREATE KEYSPACE IF NOT EXISTS`, with defaults for unset fields.
pub fn create_statement(name: &str, spec: &KeyspaceParameters) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': '{}', 'replication_factor': {}}} AND durable_writes = {}",
        quote_identifier(name),
        spec.replication_class.unwrap_or_default(),
        spec.replication_factor.unwrap_or(DEFAULT_REPLICATION_FACTOR),
        spec.durable_writes.unwrap_or(DEFAULT_DURABLE_WRITES),
    )
}

pub fn drop_statement(name: &str) -> String {
    format!("DROP KEYSPACE IF EXISTS {}", quote_identifier(name))
}

#[async_trait]
impl ExternalClient for KeyspaceClient<'_> {
    type Parameters = KeyspaceParameters;

    async fn observe(&self, resource: &mut Keyspace) -> ControllerResult<ExternalObservation> {
        let params = [DbValue::from(resource.external_name())];
        let mut rows = self
            .db
            .query(SELECT_KEYSPACE, &params)
            .await
            .map_err(fail(Phase::Observe))?;
        let row = rows.next_row();
        rows.close();

        let Some(row) = row else {
            return Ok(ExternalObservation::absent());
        };
        let observed = observed_parameters(&row).map_err(fail(Phase::Observe))?;

        resource.status.set_condition(Condition::available());
        let late_initialized = keyspace_late_init(&mut resource.spec, &observed);
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: keyspace_up_to_date(&resource.spec, &observed),
            resource_late_initialized: late_initialized,
        })
    }

    async fn create(&self, resource: &Keyspace) -> ControllerResult<ExternalCreation> {
        let statement = create_statement(resource.external_name(), &resource.spec);
        self.db.exec(&statement, &[]).await.map_err(fail(Phase::Create))?;
        Ok(ExternalCreation::default())
    }

    /// Replication changes are never applied to an existing keyspace.
    async fn update(&self, _resource: &Keyspace) -> ControllerResult<ExternalUpdate> {
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, resource: &Keyspace) -> ControllerResult<()> {
        let statement = drop_statement(resource.external_name());
        self.db.exec(&statement, &[]).await.map_err(fail(Phase::Delete))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqlsync_protocol::ConditionType;
    use cqlsync_test_utils::rows::keyspace_row;
    use cqlsync_test_utils::RecordingStore;

    fn analytics(spec: KeyspaceParameters) -> Keyspace {
        Keyspace::new("analytics", spec)
    }

    fn nts_three() -> KeyspaceParameters {
        KeyspaceParameters {
            replication_class: Some(ReplicationStrategy::NetworkTopology),
            replication_factor: Some(3),
            durable_writes: Some(true),
        }
    }

    #[tokio::test]
    async fn test_observe_without_row_reports_absent() {
        let store = RecordingStore::new();
        let client = KeyspaceClient::new(&store);
        let mut keyspace = analytics(nts_three());

        let observation = client.observe(&mut keyspace).await.unwrap();

        assert_eq!(observation, ExternalObservation::absent());
        assert!(keyspace.status.is_empty());
        let queries = store.queries();
        assert_eq!(queries[0].statement, SELECT_KEYSPACE);
        assert_eq!(queries[0].params, vec![DbValue::from("analytics")]);
    }

    #[tokio::test]
    async fn test_create_then_matching_observe_is_up_to_date() {
        let store = RecordingStore::new();
        let client = KeyspaceClient::new(&store);
        let mut keyspace = analytics(nts_three());

        client.create(&keyspace).await.unwrap();
        assert_eq!(
            store.exec_statements(),
            vec![
                "CREATE KEYSPACE IF NOT EXISTS \"analytics\" WITH replication = {'class': 'NetworkTopologyStrategy', 'replication_factor': 3} AND durable_writes = true"
                    .to_string()
            ]
        );

        store.push_rows(vec![keyspace_row(
            "org.apache.cassandra.locator.NetworkTopologyStrategy",
            Some("3"),
            true,
        )]);
        let observation = client.observe(&mut keyspace).await.unwrap();
        assert!(observation.resource_exists);
        assert!(observation.resource_up_to_date);
        assert!(!observation.resource_late_initialized);
        assert!(keyspace.status.is_ready());
        assert!(keyspace.status.condition(ConditionType::Ready).is_some());
    }

    #[tokio::test]
    async fn test_create_uses_defaults_for_unset_fields() {
        let store = RecordingStore::new();
        let client = KeyspaceClient::new(&store);

        client
            .create(&analytics(KeyspaceParameters {
                durable_writes: Some(false),
                ..Default::default()
            }))
            .await
            .unwrap();

        assert_eq!(
            store.exec_statements()[0],
            "CREATE KEYSPACE IF NOT EXISTS \"analytics\" WITH replication = {'class': 'SimpleStrategy', 'replication_factor': 1} AND durable_writes = false"
        );
    }

    #[tokio::test]
    async fn test_observe_late_initializes_unset_fields() {
        let store = RecordingStore::new();
        store.push_rows(vec![keyspace_row(
            "org.apache.cassandra.locator.SimpleStrategy",
            Some("2"),
            false,
        )]);
        let client = KeyspaceClient::new(&store);
        let mut keyspace = analytics(KeyspaceParameters::default());

        let observation = client.observe(&mut keyspace).await.unwrap();

        assert!(observation.resource_late_initialized);
        assert!(observation.resource_up_to_date);
        assert_eq!(keyspace.spec.replication_class, Some(ReplicationStrategy::Simple));
        assert_eq!(keyspace.spec.replication_factor, Some(2));
        assert_eq!(keyspace.spec.durable_writes, Some(false));
    }

    #[tokio::test]
    async fn test_observe_without_factor_is_never_up_to_date() {
        let store = RecordingStore::new();
        store.push_rows(vec![keyspace_row(
            "org.apache.cassandra.locator.NetworkTopologyStrategy",
            None,
            true,
        )]);
        let client = KeyspaceClient::new(&store);
        let mut keyspace = analytics(nts_three());

        let observation = client.observe(&mut keyspace).await.unwrap();

        assert!(observation.resource_exists);
        assert!(!observation.resource_up_to_date);
        assert_eq!(keyspace.spec.replication_factor, Some(3));
    }

    #[tokio::test]
    async fn test_update_has_no_remote_effect() {
        let store = RecordingStore::new();
        let client = KeyspaceClient::new(&store);
        client.update(&analytics(nts_three())).await.unwrap();
        assert!(store.attempted_execs().is_empty());
    }

    #[tokio::test]
    async fn test_delete_quotes_external_name() {
        let store = RecordingStore::new();
        let client = KeyspaceClient::new(&store);
        let keyspace = analytics(KeyspaceParameters::default()).with_external_name("we\"ird");

        client.delete(&keyspace).await.unwrap();

        assert_eq!(store.exec_statements(), vec!["DROP KEYSPACE IF EXISTS \"we\"\"ird\"".to_string()]);
    }

    #[tokio::test]
    async fn test_failures_are_labelled_by_phase() {
        let store = RecordingStore::new();
        store.push_query_error("no host").fail_exec_at(0, "unavailable");
        let client = KeyspaceClient::new(&store);
        let mut keyspace = analytics(nts_three());

        let err = client.observe(&mut keyspace).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot observe keyspace");

        let err = client.create(&keyspace).await.unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Create));
        assert_eq!(err.kind(), Some(ResourceKind::Keyspace));
    }
}
