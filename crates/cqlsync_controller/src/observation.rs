//! The per-kind external client contract.

use async_trait::async_trait;
use cqlsync_protocol::{ConnectionSecret, Resource, ResourceParameters};

use crate::error::ControllerResult;

/// What Observe learned about the remote object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
    /// Desired parameters were filled from observed values and must be
    /// persisted by the owner of the resource record.
    pub resource_late_initialized: bool,
}

impl ExternalObservation {
    pub fn absent() -> Self {
        Self::default()
    }
}

/// Result of a successful Create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalCreation {
    /// Login details to hand off to the secret store. Only roles emit one.
    pub connection_secret: Option<ConnectionSecret>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalUpdate {}

/// Observe/Create/Update/Delete for one resource kind.
///
/// Implementations issue every remote call sequentially, never retry, and
/// never log. Observe may late-initialise `resource.spec` and set the
/// `Ready` condition.
#[async_trait]
pub trait ExternalClient: Send + Sync {
    type Parameters: ResourceParameters;

    async fn observe(
        &self,
        resource: &mut Resource<Self::Parameters>,
    ) -> ControllerResult<ExternalObservation>;

    async fn create(&self, resource: &Resource<Self::Parameters>) -> ControllerResult<ExternalCreation>;

    async fn update(&self, resource: &Resource<Self::Parameters>) -> ControllerResult<ExternalUpdate>;

    async fn delete(&self, resource: &Resource<Self::Parameters>) -> ControllerResult<()>;
}
