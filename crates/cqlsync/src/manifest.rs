//! TOML manifest: where the cluster is and what it should contain.
//!
//! ```toml
//! [connection]
//! endpoint = "10.0.0.5"
//! username = "cassandra"
//! password_env = "CQLSYNC_PASSWORD"
//!
//! [reconcile]
//! max_concurrency = 5
//!
//! [[keyspace]]
//! name = "analytics"
//! [keyspace.spec]
//! replication_class = "NetworkTopologyStrategy"
//! replication_factor = 3
//!
//! [[grant]]
//! name = "alice-analytics"
//! [grant.spec]
//! role = "alice"
//! keyspace = "analytics"
//! privileges = ["SELECT", "MODIFY"]
//! ```

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use cqlsync_controller::ReconcilerConfig;
use cqlsync_db::ConnectionConfig;
use cqlsync_protocol::defaults::{DEFAULT_CQL_PORT, DEFAULT_MAX_CONCURRENCY, DEFAULT_PASS_TIMEOUT_SECS};
use cqlsync_protocol::{Database, Grant, Keyspace, ManagedResource, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub connection: ConnectionSection,
    #[serde(default)]
    pub reconcile: ReconcileSection,
    #[serde(default, rename = "keyspace", skip_serializing_if = "Vec::is_empty")]
    pub keyspaces: Vec<Keyspace>,
    #[serde(default, rename = "role", skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Role>,
    #[serde(default, rename = "grant", skip_serializing_if = "Vec::is_empty")]
    pub grants: Vec<Grant>,
    #[serde(default, rename = "database", skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<Database>,
}

/// Either a credentials file or inline connection fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSection {
    /// JSON object with `endpoint`, `port`, `username`, `password`.
    /// Relative paths resolve against the manifest's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl ConnectionSection {
    pub fn resolve(&self, base_dir: &Path) -> Result<ConnectionConfig> {
        if let Some(file) = &self.credentials_file {
            let path = base_dir.join(file);
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
            let values: HashMap<String, serde_json::Value> = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid credentials file: {}", path.display()))?;
            let creds = credential_text(values);
            return ConnectionConfig::from_credentials(&creds)
                .with_context(|| format!("Invalid credentials file: {}", path.display()));
        }

        let Some(endpoint) = self.endpoint.as_deref().filter(|e| !e.is_empty()) else {
            bail!("[connection] needs either credentials_file or endpoint");
        };
        let password = match (&self.password, &self.password_env) {
            (Some(_), Some(_)) => bail!("[connection] sets both password and password_env"),
            (Some(password), None) => password.clone(),
            (None, Some(var)) => std::env::var(var)
                .with_context(|| format!("Environment variable {} is not set", var))?,
            (None, None) => String::new(),
        };
        Ok(
            ConnectionConfig::new(endpoint, self.port.unwrap_or(DEFAULT_CQL_PORT))
                .with_credentials(self.username.clone().unwrap_or_default(), password),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSection {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_pass_timeout_secs")]
    pub pass_timeout_secs: u64,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_pass_timeout_secs() -> u64 {
    DEFAULT_PASS_TIMEOUT_SECS
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            pass_timeout_secs: DEFAULT_PASS_TIMEOUT_SECS,
        }
    }
}

impl ReconcileSection {
    pub fn reconciler_config(&self) -> Result<ReconcilerConfig> {
        if self.max_concurrency == 0 {
            bail!("[reconcile] max_concurrency must be at least 1");
        }
        if self.pass_timeout_secs == 0 {
            bail!("[reconcile] pass_timeout_secs must be at least 1");
        }
        Ok(ReconcilerConfig {
            max_concurrency: self.max_concurrency,
            pass_timeout: Duration::from_secs(self.pass_timeout_secs),
        })
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let manifest: Manifest = toml::from_str(raw)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Names must be unique per kind: secrets and write-back key on them.
    fn validate(&self) -> Result<()> {
        fn unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
            let mut seen = std::collections::HashSet::new();
            for name in names {
                if name.is_empty() {
                    bail!("{} with an empty name", kind);
                }
                if !seen.insert(name) {
                    bail!("Duplicate {} '{}'", kind, name);
                }
            }
            Ok(())
        }
        unique("keyspace", self.keyspaces.iter().map(|r| r.name()))?;
        unique("role", self.roles.iter().map(|r| r.name()))?;
        unique("grant", self.grants.iter().map(|r| r.name()))?;
        unique("database", self.databases.iter().map(|r| r.name()))?;
        Ok(())
    }

    /// Write atomically: a temporary sibling file, then a rename.
    ///
    /// The replacement keeps the permissions of the file it replaces; a new
    /// file is owner-only.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = toml::to_string_pretty(self).context("Failed to serialize manifest")?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        write_owner_only(&tmp, raw.as_bytes())
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        if let Ok(existing) = fs::metadata(path) {
            fs::set_permissions(&tmp, existing.permissions())
                .with_context(|| format!("Failed to set permissions on {}", tmp.display()))?;
        }
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace manifest: {}", path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keyspaces.len() + self.roles.len() + self.grants.len() + self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every resource out, keyspaces and databases first, then roles,
    /// then grants.
    pub fn take_resources(&mut self) -> Vec<ManagedResource> {
        let mut resources = Vec::with_capacity(self.len());
        resources.extend(self.keyspaces.drain(..).map(ManagedResource::from));
        resources.extend(self.databases.drain(..).map(ManagedResource::from));
        resources.extend(self.roles.drain(..).map(ManagedResource::from));
        resources.extend(self.grants.drain(..).map(ManagedResource::from));
        resources
    }

    /// Put resources back, grouped by kind in their original order.
    pub fn restore_resources(&mut self, resources: impl IntoIterator<Item = ManagedResource>) {
        for resource in resources {
            match resource {
                ManagedResource::Keyspace(r) => self.keyspaces.push(r),
                ManagedResource::Role(r) => self.roles.push(r),
                ManagedResource::Grant(r) => self.grants.push(r),
                ManagedResource::Database(r) => self.databases.push(r),
            }
        }
    }
}

/// Strings are taken as is and numbers or booleans as their JSON text, so
/// `"port": 9142` and `"port": "9142"` read the same. Nulls and nested
/// values are dropped.
fn credential_text(values: HashMap<String, serde_json::Value>) -> HashMap<String, String> {
    values
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(s) => Some((key, s)),
            serde_json::Value::Number(n) => Some((key, n.to_string())),
            serde_json::Value::Bool(b) => Some((key, b.to_string())),
            _ => None,
        })
        .collect()
}

#[cfg(unix)]
fn write_owner_only(path: &Path, body: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // A stale temporary file keeps whatever mode it was created with.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(body)
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqlsync_protocol::{Privilege, ReplicationStrategy};

    const MANIFEST: &str = r#"
        [connection]
        endpoint = "10.0.0.5"
        username = "cassandra"
        password = "cassandra"

        [[keyspace]]
        name = "analytics"
        [keyspace.spec]
        replication_class = "NetworkTopologyStrategy"
        replication_factor = 3

        [[role]]
        name = "alice"
        [role.spec]
        login = true

        [[grant]]
        name = "alice-analytics"
        [grant.spec]
        role = "alice"
        keyspace = "analytics"
        privileges = ["SELECT", "ALL_PERMISSIONS"]
    "#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.len(), 3);
        assert_eq!(manifest.reconcile, ReconcileSection::default());
        assert_eq!(
            manifest.keyspaces[0].spec.replication_class,
            Some(ReplicationStrategy::NetworkTopology)
        );
        assert_eq!(
            manifest.grants[0].spec.privileges,
            vec![Privilege::Select, Privilege::AllPermissions]
        );

        let config = manifest.connection.resolve(Path::new(".")).unwrap();
        assert_eq!(config.known_node(), "10.0.0.5:9042");
        assert_eq!(config.username, "cassandra");
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let raw = r#"
            [connection]
            endpoint = "localhost"
            [[role]]
            name = "alice"
            [[role]]
            name = "alice"
        "#;
        let err = Manifest::parse(raw).unwrap_err();
        assert!(err.to_string().contains("Duplicate role 'alice'"));
    }

    #[test]
    fn test_password_env_is_resolved() {
        std::env::set_var("CQLSYNC_TEST_PASSWORD", "from-env");
        let section = ConnectionSection {
            endpoint: Some("localhost".to_string()),
            username: Some("admin".to_string()),
            password_env: Some("CQLSYNC_TEST_PASSWORD".to_string()),
            ..Default::default()
        };
        let config = section.resolve(Path::new(".")).unwrap();
        assert_eq!(config.password, "from-env");

        let missing = ConnectionSection {
            password_env: Some("CQLSYNC_TEST_UNSET_PASSWORD".to_string()),
            ..section
        };
        assert!(missing.resolve(Path::new(".")).is_err());
    }

    #[test]
    fn test_credentials_file_relative_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("creds.json"),
            r#"{"endpoint": "cassandra.internal", "port": "9142", "username": "admin", "password": "pw"}"#,
        )
        .unwrap();
        let section = ConnectionSection {
            credentials_file: Some(PathBuf::from("creds.json")),
            ..Default::default()
        };

        let config = section.resolve(dir.path()).unwrap();

        assert_eq!(config.known_node(), "cassandra.internal:9142");
        assert_eq!(config.password, "pw");
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let section = ReconcileSection {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(section.reconciler_config().is_err());
    }

    #[test]
    fn test_save_round_trips_resources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.toml");
        let mut manifest = Manifest::parse(MANIFEST).unwrap();
        let mut resources = manifest.take_resources();
        assert!(manifest.is_empty());
        resources[0].metadata_mut().initialize_external_name();
        manifest.restore_resources(resources);

        manifest.save(&path).unwrap();
        let reloaded = Manifest::load(&path).unwrap();

        assert_eq!(reloaded, manifest);
        assert_eq!(reloaded.keyspaces[0].metadata.external_name.as_deref(), Some("analytics"));
        assert!(!dir.path().join("cluster.toml.tmp").exists());
    }

    #[test]
    fn test_credentials_file_with_numeric_port() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("creds.json"),
            r#"{"endpoint": "cassandra.internal", "port": 9142, "username": "admin", "password": "pw"}"#,
        )
        .unwrap();
        let section = ConnectionSection {
            credentials_file: Some(PathBuf::from("creds.json")),
            ..Default::default()
        };

        let config = section.resolve(dir.path()).unwrap();

        assert_eq!(config.known_node(), "cassandra.internal:9142");
        assert_eq!(config.username, "admin");
    }

    #[test]
    fn test_credentials_file_with_unusable_port_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("creds.json"),
            r#"{"endpoint": "cassandra.internal", "port": 70000, "username": "admin", "password": null}"#,
        )
        .unwrap();
        let section = ConnectionSection {
            credentials_file: Some(PathBuf::from("creds.json")),
            ..Default::default()
        };

        let config = section.resolve(dir.path()).unwrap();

        assert_eq!(config.known_node(), "cassandra.internal:9042");
        assert_eq!(config.password, "");
    }

    #[cfg(unix)]
    #[test]
    fn test_save_keeps_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.toml");
        fs::write(&path, MANIFEST).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        manifest.save(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(fs::read_to_string(&path).unwrap().contains("password = \"cassandra\""));
    }

    #[cfg(unix)]
    #[test]
    fn test_save_creates_new_manifest_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.toml");
        fs::write(dir.path().join("fresh.toml.tmp"), "stale").unwrap();
        fs::set_permissions(dir.path().join("fresh.toml.tmp"), fs::Permissions::from_mode(0o644))
            .unwrap();

        Manifest::parse(MANIFEST).unwrap().save(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
