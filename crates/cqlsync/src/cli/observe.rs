use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use cqlsync::{ClusterConnector, DiscardingPublisher, Manifest};
use cqlsync_controller::Reconciler;

pub async fn run(manifest_path: &Path) -> Result<ExitCode> {
    super::require_live_backend()?;

    let mut manifest = Manifest::load(manifest_path)?;
    let base_dir = manifest_path.parent().unwrap_or(Path::new("."));
    let connection = manifest.connection.resolve(base_dir)?;
    let config = manifest.reconcile.reconciler_config()?;
    let reconciler = Reconciler::new(
        Arc::new(ClusterConnector::new(connection)),
        Arc::new(DiscardingPublisher),
    )
    .with_config(config);

    let mut failed = false;
    for mut resource in manifest.take_resources() {
        match reconciler.observe(&mut resource).await {
            Ok(observation) => println!(
                "{} {}: exists={} up_to_date={}",
                resource.kind(),
                resource.name(),
                observation.resource_exists,
                observation.resource_up_to_date
            ),
            Err(e) => {
                failed = true;
                println!("{} {}: failed: {}", resource.kind(), resource.name(), e.chain_message());
            }
        }
    }

    Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
