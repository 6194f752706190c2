//! One reconciliation sweep over a manifest.

use std::sync::Arc;

use cqlsync_controller::{reconcile_all, ReconcileOutcome, Reconciler};
use cqlsync_protocol::ResourceKind;

use crate::manifest::Manifest;

#[derive(Debug)]
pub struct SweepEntry {
    pub kind: ResourceKind,
    pub name: String,
    /// Outcome, or the failure with its causes.
    pub result: Result<ReconcileOutcome, String>,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub entries: Vec<SweepEntry>,
}

impl SweepReport {
    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_err()).count()
    }

    /// Any desired parameters or external names that need persisting.
    pub fn records_changed(&self) -> bool {
        self.entries
            .iter()
            .any(|e| matches!(&e.result, Ok(outcome) if outcome.record_changed()))
    }
}

/// Reconcile every resource in `manifest`, writing the updated records back
/// into it.
pub async fn run_sweep(manifest: &mut Manifest, reconciler: Arc<Reconciler>) -> SweepReport {
    let resources = manifest.take_resources();
    let results = reconcile_all(reconciler, resources).await;

    let mut report = SweepReport::default();
    let mut updated = Vec::with_capacity(results.len());
    for (resource, result) in results {
        report.entries.push(SweepEntry {
            kind: resource.kind(),
            name: resource.name().to_string(),
            result: result.map_err(|e| e.chain_message()),
        });
        updated.push(resource);
    }
    manifest.restore_resources(updated);
    report
}
