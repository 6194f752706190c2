//! In-memory cluster that applies controller statements.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use cqlsync_db::{BackendError, ConnectionConfig, DbRow, DbValue, RowCursor, StoreExecutor};
use cqlsync_protocol::defaults::REPLICATION_CLASS_PREFIX;
use cqlsync_protocol::ConnectionSecret;

use crate::rows::{keyspace_name_row, keyspace_row, permissions_row, role_row};
use crate::statement::{parse, Statement};

/// Permissions a keyspace-level resource accepts. `ALL PERMISSIONS` expands to these.
pub const KEYSPACE_PERMISSIONS: [&str; 6] = ["ALTER", "AUTHORIZE", "CREATE", "DROP", "MODIFY", "SELECT"];

const SELECT_KEYSPACE: &str = "SELECT replication, durable_writes FROM system_schema.keyspaces";
const SELECT_KEYSPACE_NAME: &str = "SELECT keyspace_name FROM system_schema.keyspaces";
const SELECT_ROLE: &str = "SELECT is_superuser, can_login FROM system_auth.roles";
const SELECT_PERMISSIONS: &str = "SELECT permissions FROM system_auth.role_permissions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspaceRecord {
    pub replication: BTreeMap<String, String>,
    pub durable_writes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    pub superuser: bool,
    pub login: bool,
    pub password: String,
}

#[derive(Default)]
struct ClusterState {
    keyspaces: BTreeMap<String, KeyspaceRecord>,
    roles: BTreeMap<String, RoleRecord>,
    /// (role, resource) -> permissions
    permissions: BTreeMap<(String, String), BTreeSet<String>>,
    statements: Vec<String>,
    unreachable: bool,
    fail_next_containing: Option<String>,
}

/// Shared cluster state; each pass opens its own [`SimulatedSession`].
#[derive(Clone, Default)]
pub struct SimulatedCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl SimulatedCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().expect("simulated cluster poisoned")
    }

    /// Open a session, failing if the cluster is marked unreachable.
    pub fn connect(&self) -> Result<SimulatedSession, BackendError> {
        if self.state().unreachable {
            return Err(BackendError::Connection("no hosts available".to_string()));
        }
        Ok(SimulatedSession {
            cluster: self.clone(),
            config: ConnectionConfig::new("cassandra.sim", 9042),
            closed: false,
        })
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Fail the next exec whose text contains `pattern`.
    pub fn fail_next_exec_containing(&self, pattern: &str) {
        self.state().fail_next_containing = Some(pattern.to_string());
    }

    pub fn keyspace(&self, name: &str) -> Option<KeyspaceRecord> {
        self.state().keyspaces.get(name).cloned()
    }

    pub fn role(&self, name: &str) -> Option<RoleRecord> {
        self.state().roles.get(name).cloned()
    }

    /// Permissions `role` holds on keyspace `keyspace`.
    pub fn permissions(&self, role: &str, keyspace: &str) -> BTreeSet<String> {
        self.state()
            .permissions
            .get(&(role.to_string(), format!("data/{}", keyspace)))
            .cloned()
            .unwrap_or_default()
    }

    /// Every successfully applied statement, in order.
    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    /// Create a keyspace directly, bypassing the controllers.
    pub fn insert_keyspace(&self, name: &str, class: &str, replication_factor: &str, durable_writes: bool) {
        let replication = BTreeMap::from([
            ("class".to_string(), format!("{}{}", REPLICATION_CLASS_PREFIX, class)),
            ("replication_factor".to_string(), replication_factor.to_string()),
        ]);
        self.state().keyspaces.insert(
            name.to_string(),
            KeyspaceRecord {
                replication,
                durable_writes,
            },
        );
    }

    /// Create a role directly, bypassing the controllers.
    pub fn insert_role(&self, name: &str, superuser: bool, login: bool) {
        self.state().roles.insert(
            name.to_string(),
            RoleRecord {
                superuser,
                login,
                password: String::new(),
            },
        );
    }

    /// Revoke permissions directly, simulating an out-of-band change.
    pub fn revoke_directly(&self, role: &str, keyspace: &str, permission: &str) {
        if let Some(set) = self
            .state()
            .permissions
            .get_mut(&(role.to_string(), format!("data/{}", keyspace)))
        {
            set.remove(permission);
        }
    }

    fn apply(&self, statement: &str) -> Result<(), BackendError> {
        let mut state = self.state();
        if let Some(pattern) = state.fail_next_containing.clone() {
            if statement.contains(&pattern) {
                state.fail_next_containing = None;
                return Err(BackendError::Execution(format!("injected failure for '{}'", pattern)));
            }
        }

        let parsed = parse(statement).map_err(BackendError::Execution)?;
        match parsed {
            Statement::CreateKeyspace {
                name,
                replication,
                durable_writes,
            } => {
                let mut replication = replication;
                if let Some(class) = replication.get_mut("class") {
                    if !class.contains('.') {
                        *class = format!("{}{}", REPLICATION_CLASS_PREFIX, class);
                    }
                }
                state.keyspaces.entry(name).or_insert(KeyspaceRecord {
                    replication,
                    durable_writes: durable_writes.unwrap_or(true),
                });
            }
            Statement::DropKeyspace { name } => {
                state.keyspaces.remove(&name);
                let resource = format!("data/{}", name);
                state.permissions.retain(|(_, r), _| *r != resource);
            }
            Statement::CreateRole {
                name,
                superuser,
                login,
                password,
            } => {
                state.roles.entry(name).or_insert(RoleRecord {
                    superuser,
                    login,
                    password,
                });
            }
            Statement::AlterRole {
                name,
                superuser,
                login,
            } => {
                let role = state
                    .roles
                    .get_mut(&name)
                    .ok_or_else(|| BackendError::Execution(format!("{} doesn't exist", name)))?;
                role.superuser = superuser;
                role.login = login;
            }
            Statement::DropRole { name } => {
                state.roles.remove(&name);
                state.permissions.retain(|(role, _), _| *role != name);
            }
            Statement::Grant {
                permission,
                keyspace,
                role,
            } => {
                let expanded = Self::expand(&permission)?;
                if !state.roles.contains_key(&role) {
                    return Err(BackendError::Execution(format!("Role {} doesn't exist", role)));
                }
                if !state.keyspaces.contains_key(&keyspace) {
                    return Err(BackendError::Execution(format!(
                        "Resource <keyspace {}> doesn't exist",
                        keyspace
                    )));
                }
                let set = state
                    .permissions
                    .entry((role, format!("data/{}", keyspace)))
                    .or_default();
                set.extend(expanded);
            }
            Statement::Revoke {
                permission,
                keyspace,
                role,
            } => {
                let expanded = Self::expand(&permission)?;
                if let Some(set) = state.permissions.get_mut(&(role, format!("data/{}", keyspace))) {
                    for p in expanded {
                        set.remove(&p);
                    }
                }
            }
        }
        state.statements.push(statement.to_string());
        Ok(())
    }

    fn expand(permission: &str) -> Result<Vec<String>, BackendError> {
        if permission == "ALL PERMISSIONS" || permission == "ALL" {
            return Ok(KEYSPACE_PERMISSIONS.iter().map(|p| p.to_string()).collect());
        }
        if KEYSPACE_PERMISSIONS.contains(&permission) {
            return Ok(vec![permission.to_string()]);
        }
        Err(BackendError::Execution(format!(
            "Resource type DataResource does not support the requested permissions: {}",
            permission
        )))
    }

    fn select(&self, statement: &str, params: &[DbValue]) -> Result<Vec<DbRow>, BackendError> {
        let text = |index: usize| -> Result<String, BackendError> {
            match params.get(index) {
                Some(DbValue::Text(v)) => Ok(v.clone()),
                _ => Err(BackendError::Query(format!("missing text parameter {}", index))),
            }
        };

        let state = self.state();
        if statement.starts_with(SELECT_KEYSPACE) {
            let name = text(0)?;
            return Ok(state
                .keyspaces
                .get(&name)
                .map(|ks| {
                    let class = ks.replication.get("class").cloned().unwrap_or_default();
                    keyspace_row(
                        &class,
                        ks.replication.get("replication_factor").map(String::as_str),
                        ks.durable_writes,
                    )
                })
                .into_iter()
                .collect());
        }
        if statement.starts_with(SELECT_KEYSPACE_NAME) {
            let name = text(0)?;
            return Ok(state
                .keyspaces
                .contains_key(&name)
                .then(|| keyspace_name_row(&name))
                .into_iter()
                .collect());
        }
        if statement.starts_with(SELECT_ROLE) {
            let name = text(0)?;
            return Ok(state
                .roles
                .get(&name)
                .map(|r| role_row(r.superuser, r.login))
                .into_iter()
                .collect());
        }
        if statement.starts_with(SELECT_PERMISSIONS) {
            let key = (text(0)?, text(1)?);
            return Ok(state
                .permissions
                .get(&key)
                .filter(|set| !set.is_empty())
                .map(|set| {
                    let names: Vec<&str> = set.iter().map(String::as_str).collect();
                    permissions_row(&names)
                })
                .into_iter()
                .collect());
        }
        Err(BackendError::Query(format!("unsupported query: {}", statement)))
    }
}

/// One connection to a [`SimulatedCluster`].
pub struct SimulatedSession {
    cluster: SimulatedCluster,
    config: ConnectionConfig,
    closed: bool,
}

#[async_trait]
impl StoreExecutor for SimulatedSession {
    async fn exec(&self, statement: &str, _params: &[DbValue]) -> Result<(), BackendError> {
        if self.closed {
            return Err(BackendError::NotConnected);
        }
        self.cluster.apply(statement)
    }

    async fn query(&self, statement: &str, params: &[DbValue]) -> Result<RowCursor, BackendError> {
        if self.closed {
            return Err(BackendError::NotConnected);
        }
        self.cluster.select(statement, params).map(RowCursor::new)
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn connection_details(&self, username: &str, password: &str) -> ConnectionSecret {
        self.config.connection_details(username, password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grant_requires_role_and_keyspace() {
        let cluster = SimulatedCluster::new();
        let session = cluster.connect().unwrap();
        assert!(session
            .exec("GRANT SELECT ON KEYSPACE \"ks\" TO \"alice\"", &[])
            .await
            .is_err());

        cluster.insert_role("alice", false, true);
        cluster.insert_keyspace("ks", "SimpleStrategy", "1", true);
        session
            .exec("GRANT SELECT ON KEYSPACE \"ks\" TO \"alice\"", &[])
            .await
            .unwrap();
        assert!(cluster.permissions("alice", "ks").contains("SELECT"));
    }

    #[tokio::test]
    async fn test_all_permissions_expands() {
        let cluster = SimulatedCluster::new();
        cluster.insert_role("alice", false, true);
        cluster.insert_keyspace("ks", "SimpleStrategy", "1", true);
        let session = cluster.connect().unwrap();
        session
            .exec("GRANT ALL PERMISSIONS ON KEYSPACE \"ks\" TO \"alice\"", &[])
            .await
            .unwrap();
        assert_eq!(cluster.permissions("alice", "ks").len(), KEYSPACE_PERMISSIONS.len());
    }

    #[tokio::test]
    async fn test_create_keyspace_is_idempotent() {
        let cluster = SimulatedCluster::new();
        let session = cluster.connect().unwrap();
        let create = "CREATE KEYSPACE IF NOT EXISTS \"ks\" WITH replication = {'class': 'SimpleStrategy', 'replication_factor': 1} AND durable_writes = false";
        session.exec(create, &[]).await.unwrap();
        session.exec(create, &[]).await.unwrap();
        let ks = cluster.keyspace("ks").unwrap();
        assert_eq!(ks.replication["class"], "org.apache.cassandra.locator.SimpleStrategy");
        assert!(!ks.durable_writes);
    }

    #[test]
    fn test_unreachable_cluster_fails_connect() {
        let cluster = SimulatedCluster::new();
        cluster.set_unreachable(true);
        assert!(matches!(cluster.connect(), Err(BackendError::Connection(_))));
    }
}
