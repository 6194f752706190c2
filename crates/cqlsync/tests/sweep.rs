//! Sweeps over a manifest against an in-memory cluster.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use cqlsync::manifest::Manifest;
use cqlsync::{run_sweep, FileSecretPublisher};
use cqlsync_controller::{Connector, FixedPassword, ReconcileAction, Reconciler};
use cqlsync_db::{BackendError, StoreExecutor};
use cqlsync_protocol::ReplicationStrategy;
use cqlsync_test_utils::SimulatedCluster;

struct ClusterConnector(SimulatedCluster);

#[async_trait]
impl Connector for ClusterConnector {
    async fn connect(&self) -> Result<Box<dyn StoreExecutor>, BackendError> {
        Ok(Box::new(self.0.connect()?))
    }
}

fn fixture() -> Manifest {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/cluster.toml");
    Manifest::load(&path).unwrap()
}

fn reconciler(cluster: &SimulatedCluster, manifest: &Manifest, secrets: &Path) -> Arc<Reconciler> {
    Arc::new(
        Reconciler::new(
            Arc::new(ClusterConnector(cluster.clone())),
            Arc::new(FileSecretPublisher::new(secrets)),
        )
        .with_passwords(Arc::new(FixedPassword("generated".to_string())))
        .with_config(manifest.reconcile.reconciler_config().unwrap()),
    )
}

#[tokio::test]
async fn test_sweeps_converge_and_write_back() {
    let dir = tempfile::tempdir().unwrap();
    let cluster = SimulatedCluster::new();
    let mut manifest = fixture();
    let reconciler = reconciler(&cluster, &manifest, &dir.path().join("secrets"));

    // The grant may run before its role and keyspace exist, so it can take a
    // second sweep; everything settles by the third.
    let first = run_sweep(&mut manifest, reconciler.clone()).await;
    assert_eq!(first.entries.len(), 5);
    assert!(first.records_changed());
    run_sweep(&mut manifest, reconciler.clone()).await;
    let third = run_sweep(&mut manifest, reconciler.clone()).await;

    assert_eq!(third.failures(), 0);
    for entry in &third.entries {
        let outcome = entry.result.as_ref().unwrap();
        assert_eq!(outcome.action, ReconcileAction::Unchanged, "{} {}", entry.kind, entry.name);
        assert!(!outcome.record_changed());
    }

    assert!(cluster.keyspace("scratch_v2").is_some());
    assert!(cluster.keyspace("scratch").is_none());
    assert_eq!(cluster.permissions("alice", "analytics").len(), 2);

    let secret = fs::read_to_string(dir.path().join("secrets/role-alice.json")).unwrap();
    assert!(secret.contains("\"generated\""));
    assert!(secret.contains("cassandra.sim"));

    let path = dir.path().join("cluster.toml");
    manifest.save(&path).unwrap();
    let saved = Manifest::load(&path).unwrap();
    let analytics = &saved.keyspaces[0];
    assert_eq!(analytics.metadata.external_name.as_deref(), Some("analytics"));
    assert_eq!(analytics.spec.replication_class, Some(ReplicationStrategy::NetworkTopology));
    assert_eq!(analytics.spec.durable_writes, Some(true));
    assert!(analytics.status.is_ready());
    assert!(analytics.status.is_synced());
    assert_eq!(saved.roles[0].spec.superuser, Some(false));
    assert_eq!(saved.connection.password_env.as_deref(), Some("CQLSYNC_PASSWORD"));
}

#[tokio::test]
async fn test_unreachable_cluster_fails_every_resource() {
    let dir = tempfile::tempdir().unwrap();
    let cluster = SimulatedCluster::new();
    cluster.set_unreachable(true);
    let mut manifest = fixture();
    let reconciler = reconciler(&cluster, &manifest, dir.path());

    let report = run_sweep(&mut manifest, reconciler).await;

    assert_eq!(report.failures(), 5);
    assert!(report.entries[0]
        .result
        .as_ref()
        .unwrap_err()
        .starts_with("Cannot connect to cluster"));
    assert_eq!(manifest.len(), 5);
    assert!(manifest.roles.iter().all(|r| !r.status.is_synced()));
}
