//! One reconciliation pass per resource, and bounded concurrent sweeps.
//!
//! A pass opens its own executor, so passes for different resources share
//! no mutable state. Status conditions are written onto the resource; the
//! caller persists them.

use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cqlsync_db::{BackendError, StoreExecutor, TracedExecutor};
use cqlsync_protocol::defaults::{DEFAULT_MAX_CONCURRENCY, DEFAULT_PASS_TIMEOUT_SECS};
use cqlsync_protocol::{Condition, ConnectionSecret, ManagedResource, Resource, ResourceKind};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};

use crate::database::DatabaseClient;
use crate::error::{ControllerError, ControllerResult};
use crate::grant::GrantClient;
use crate::keyspace::KeyspaceClient;
use crate::observation::{ExternalClient, ExternalObservation};
use crate::password::{PasswordGenerator, RandomPassword};
use crate::role::RoleClient;

// ============================================================================
// Collaborators
// ============================================================================

/// Opens a fresh executor from resolved connection details.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn StoreExecutor>, BackendError>;
}

pub type PublishError = Box<dyn StdError + Send + Sync>;

/// Receives connection secrets emitted by Create. Ownership of the secret
/// passes here; nothing reads it back.
#[async_trait]
pub trait ConnectionPublisher: Send + Sync {
    async fn publish(
        &self,
        kind: ResourceKind,
        name: &str,
        secret: ConnectionSecret,
    ) -> Result<(), PublishError>;
}

/// Keeps published secrets in memory.
#[derive(Default)]
pub struct MemoryPublisher {
    secrets: Mutex<Vec<(ResourceKind, String, ConnectionSecret)>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn secrets(&self) -> Vec<(ResourceKind, String, ConnectionSecret)> {
        self.secrets.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ConnectionPublisher for MemoryPublisher {
    async fn publish(
        &self,
        kind: ResourceKind,
        name: &str,
        secret: ConnectionSecret,
    ) -> Result<(), PublishError> {
        self.secrets
            .lock()
            .map_err(|_| "secret store poisoned")?
            .push((kind, name.to_string(), secret));
        Ok(())
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// What a pass did to the remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Unchanged,
    Created,
    Updated,
    Deleted,
}

impl ReconcileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileAction::Unchanged => "unchanged",
            ReconcileAction::Created => "created",
            ReconcileAction::Updated => "updated",
            ReconcileAction::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub action: ReconcileAction,
    /// Desired parameters were filled from the store and need persisting.
    pub late_initialized: bool,
    /// The external name was defaulted this pass and needs persisting.
    pub external_name_assigned: bool,
}

impl ReconcileOutcome {
    /// Whether the resource record changed and should be written back.
    pub fn record_changed(&self) -> bool {
        self.late_initialized || self.external_name_assigned
    }
}

// ============================================================================
// Reconciler
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Passes allowed in flight at once during [`reconcile_all`].
    pub max_concurrency: usize,
    /// Budget for one whole pass, connect through close.
    pub pass_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            pass_timeout: Duration::from_secs(DEFAULT_PASS_TIMEOUT_SECS),
        }
    }
}

pub struct Reconciler {
    connector: Arc<dyn Connector>,
    publisher: Arc<dyn ConnectionPublisher>,
    passwords: Arc<dyn PasswordGenerator>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(connector: Arc<dyn Connector>, publisher: Arc<dyn ConnectionPublisher>) -> Self {
        Self {
            connector,
            publisher,
            passwords: Arc::new(RandomPassword::default()),
            config: ReconcilerConfig::default(),
        }
    }

    pub fn with_passwords(mut self, passwords: Arc<dyn PasswordGenerator>) -> Self {
        self.passwords = passwords;
        self
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one pass for `resource`, updating its metadata, spec and status.
    ///
    /// On timeout the pending store call is dropped; nothing is rolled back.
    pub async fn reconcile(&self, resource: &mut ManagedResource) -> ControllerResult<ReconcileOutcome> {
        let kind = resource.kind();
        let name = resource.name().to_string();
        let span = info_span!("reconcile.pass", kind = %kind, name = %name);

        async {
            let result = match tokio::time::timeout(self.config.pass_timeout, self.pass(resource)).await {
                Ok(result) => result,
                Err(_) => Err(ControllerError::Timeout(self.config.pass_timeout)),
            };
            match &result {
                Ok(outcome) => {
                    resource.status_mut().set_condition(Condition::reconcile_success());
                    info!("Reconciled {} {}: {}", kind, name, outcome.action);
                }
                Err(err) => {
                    let message = err.chain_message();
                    warn!("Failed to reconcile {} {}: {}", kind, name, message);
                    resource.status_mut().set_condition(Condition::reconcile_error(message));
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Observe only: no statements are issued and no Synced condition is written.
    ///
    /// Observe still sets `Ready` and may late-initialise `spec`.
    pub async fn observe(&self, resource: &mut ManagedResource) -> ControllerResult<ExternalObservation> {
        let timeout = self.config.pass_timeout;
        let observe = async {
            let mut db = TracedExecutor::new(self.connector.connect().await.map_err(ControllerError::Connect)?);
            let result = match resource {
                ManagedResource::Keyspace(r) => KeyspaceClient::new(&db).observe(r).await,
                ManagedResource::Role(r) => {
                    RoleClient::new(&db, self.passwords.as_ref()).observe(r).await
                }
                ManagedResource::Grant(r) => GrantClient::new(&db).observe(r).await,
                ManagedResource::Database(r) => DatabaseClient::new(&db).observe(r).await,
            };
            db.close();
            result
        };
        tokio::time::timeout(timeout, observe)
            .await
            .unwrap_or(Err(ControllerError::Timeout(timeout)))
    }

    async fn pass(&self, resource: &mut ManagedResource) -> ControllerResult<ReconcileOutcome> {
        let mut db = TracedExecutor::new(self.connector.connect().await.map_err(ControllerError::Connect)?);
        let external_name_assigned = resource.metadata_mut().initialize_external_name();

        let publisher = self.publisher.as_ref();
        let result = match resource {
            ManagedResource::Keyspace(r) => drive(&KeyspaceClient::new(&db), r, publisher).await,
            ManagedResource::Role(r) => {
                drive(&RoleClient::new(&db, self.passwords.as_ref()), r, publisher).await
            }
            ManagedResource::Grant(r) => drive(&GrantClient::new(&db), r, publisher).await,
            ManagedResource::Database(r) => drive(&DatabaseClient::new(&db), r, publisher).await,
        };
        db.close();

        let (action, late_initialized) = result?;
        Ok(ReconcileOutcome {
            action,
            late_initialized,
            external_name_assigned,
        })
    }
}

/// Observe, then at most one of Delete, Create or Update.
async fn drive<C: ExternalClient>(
    client: &C,
    resource: &mut Resource<C::Parameters>,
    publisher: &dyn ConnectionPublisher,
) -> ControllerResult<(ReconcileAction, bool)> {
    let observation = client.observe(resource).await?;
    let late_initialized = observation.resource_late_initialized;

    if resource.metadata.deletion_requested {
        resource.status.set_condition(Condition::deleting());
        if !observation.resource_exists {
            return Ok((ReconcileAction::Unchanged, late_initialized));
        }
        client.delete(resource).await?;
        return Ok((ReconcileAction::Deleted, late_initialized));
    }

    if !observation.resource_exists {
        resource.status.set_condition(Condition::creating());
        let creation = client.create(resource).await?;
        if let Some(secret) = creation.connection_secret {
            publisher
                .publish(resource.kind(), resource.name(), secret)
                .await
                .map_err(|source| ControllerError::Publish {
                    name: resource.name().to_string(),
                    source,
                })?;
        }
        return Ok((ReconcileAction::Created, late_initialized));
    }

    if !observation.resource_up_to_date {
        client.update(resource).await?;
        return Ok((ReconcileAction::Updated, late_initialized));
    }
    Ok((ReconcileAction::Unchanged, late_initialized))
}

/// Reconcile every resource, at most `max_concurrency` at a time.
///
/// Results come back in input order, each paired with its updated resource.
pub async fn reconcile_all(
    reconciler: Arc<Reconciler>,
    resources: Vec<ManagedResource>,
) -> Vec<(ManagedResource, ControllerResult<ReconcileOutcome>)> {
    let permits = Arc::new(Semaphore::new(reconciler.config.max_concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for (index, mut resource) in resources.into_iter().enumerate() {
        let reconciler = Arc::clone(&reconciler);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let result = reconciler.reconcile(&mut resource).await;
            (index, resource, result)
        });
    }

    let mut finished = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => finished.push(entry),
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => warn!("Reconcile task cancelled: {}", err),
        }
    }
    finished.sort_by_key(|(index, _, _)| *index);
    finished
        .into_iter()
        .map(|(_, resource, result)| (resource, result))
        .collect()
}
