//! Where connection secrets emitted by role creation end up.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cqlsync_controller::{ConnectionPublisher, PublishError};
use cqlsync_protocol::{ConnectionSecret, ResourceKind};
use tracing::{info, warn};

/// Writes each secret to `<dir>/<kind>-<name>.json`, readable by the owner only.
/// The name is percent-encoded.
pub struct FileSecretPublisher {
    dir: PathBuf,
}

impl FileSecretPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn secret_path(&self, kind: ResourceKind, name: &str) -> PathBuf {
        self.dir.join(format!("{}-{}.json", kind, encode_name(name)))
    }
}

#[async_trait]
impl ConnectionPublisher for FileSecretPublisher {
    async fn publish(
        &self,
        kind: ResourceKind,
        name: &str,
        secret: ConnectionSecret,
    ) -> Result<(), PublishError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.secret_path(kind, name);
        let body = serde_json::to_string_pretty(&secret.to_map())?;
        write_private(&path, body.as_bytes())?;
        info!("Wrote connection secret for {} {} to {}", kind, name, path.display());
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(body)
}

#[cfg(not(unix))]
fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(body)
}

/// Used when no secrets directory is configured. The password is lost.
pub struct DiscardingPublisher;

#[async_trait]
impl ConnectionPublisher for DiscardingPublisher {
    async fn publish(
        &self,
        kind: ResourceKind,
        name: &str,
        _secret: ConnectionSecret,
    ) -> Result<(), PublishError> {
        warn!(
            "No secrets directory configured; the password for {} {} was not saved",
            kind, name
        );
        Ok(())
    }
}

/// Percent-encode every byte outside `[A-Za-z0-9._-]`, `%` included, so
/// distinct names never share a file and no name contains a separator.
fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}
