use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use cqlsync::{run_sweep, ClusterConnector, DiscardingPublisher, FileSecretPublisher, Manifest};
use cqlsync_controller::{ConnectionPublisher, Reconciler};
use tracing::{info, warn};

pub struct ReconcileArgs {
    pub manifest: PathBuf,
    pub write_back: bool,
    pub secrets_dir: Option<PathBuf>,
}

pub async fn run(args: ReconcileArgs) -> Result<ExitCode> {
    super::require_live_backend()?;

    let mut manifest = Manifest::load(&args.manifest)?;
    let base_dir = args.manifest.parent().unwrap_or(Path::new("."));
    let connection = manifest.connection.resolve(base_dir)?;
    let config = manifest.reconcile.reconciler_config()?;

    let publisher: Arc<dyn ConnectionPublisher> = match &args.secrets_dir {
        Some(dir) => Arc::new(FileSecretPublisher::new(dir)),
        None => {
            if !manifest.roles.is_empty() {
                warn!("No --secrets-dir given; passwords of newly created roles will be lost");
            }
            Arc::new(DiscardingPublisher)
        }
    };

    info!(
        "Reconciling {} resources against {}",
        manifest.len(),
        connection.known_node()
    );
    let reconciler = Arc::new(
        Reconciler::new(Arc::new(ClusterConnector::new(connection)), publisher).with_config(config),
    );
    let report = run_sweep(&mut manifest, reconciler).await;

    for entry in &report.entries {
        match &entry.result {
            Ok(outcome) => println!("{} {}: {}", entry.kind, entry.name, outcome.action),
            Err(message) => println!("{} {}: failed: {}", entry.kind, entry.name, message),
        }
    }

    if args.write_back {
        manifest.save(&args.manifest)?;
        info!("Wrote back {}", args.manifest.display());
    } else if report.records_changed() {
        info!("Late-initialised fields were not persisted; pass --write-back to keep them");
    }

    if report.failures() > 0 {
        warn!("{} of {} resources failed", report.failures(), report.entries.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
