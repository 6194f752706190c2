//! Subcommand implementations.

pub mod observe;
pub mod reconcile;

use anyhow::{bail, Result};
use cqlsync_db::{live_backend_available, LIVE_BACKEND_FEATURE};

/// Fail early when this build cannot reach a live cluster.
pub fn require_live_backend() -> Result<()> {
    if !live_backend_available() {
        bail!(
            "this build has no cluster driver; rebuild with the '{}' feature",
            LIVE_BACKEND_FEATURE
        );
    }
    Ok(())
}
