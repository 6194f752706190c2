//! Database convergence: a keyspace tracked by existence alone.

use async_trait::async_trait;
use cqlsync_db::{quote_identifier, BackendError, DbValue, StoreExecutor};
use cqlsync_protocol::{Condition, Database, DatabaseParameters, ResourceKind};

use crate::error::{ControllerError, ControllerResult, Phase};
use crate::keyspace;
use crate::observation::{ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate};

const SELECT_DATABASE: &str =
    "SELECT keyspace_name FROM system_schema.keyspaces WHERE keyspace_name = ?";

pub struct DatabaseClient<'a> {
    db: &'a dyn StoreExecutor,
}

impl<'a> DatabaseClient<'a> {
    pub fn new(db: &'a dyn StoreExecutor) -> Self {
        Self { db }
    }
}

fn fail(phase: Phase) -> impl FnOnce(BackendError) -> ControllerError {
    ControllerError::operation(ResourceKind::Database, phase)
}

pub fn create_statement(name: &str) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
        quote_identifier(name)
    )
}

#[async_trait]
impl ExternalClient for DatabaseClient<'_> {
    type Parameters = DatabaseParameters;

    async fn observe(&self, resource: &mut Database) -> ControllerResult<ExternalObservation> {
        let params = [DbValue::from(resource.external_name())];
        let mut rows = self
            .db
            .query(SELECT_DATABASE, &params)
            .await
            .map_err(fail(Phase::Observe))?;
        let exists = rows.next_row().is_some();
        rows.close();

        if !exists {
            return Ok(ExternalObservation::absent());
        }
        resource.status.set_condition(Condition::available());
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: true,
            resource_late_initialized: false,
        })
    }

    async fn create(&self, resource: &Database) -> ControllerResult<ExternalCreation> {
        let statement = create_statement(resource.external_name());
        self.db.exec(&statement, &[]).await.map_err(fail(Phase::Create))?;
        Ok(ExternalCreation::default())
    }

    async fn update(&self, _resource: &Database) -> ControllerResult<ExternalUpdate> {
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, resource: &Database) -> ControllerResult<()> {
        let statement = keyspace::drop_statement(resource.external_name());
        self.db.exec(&statement, &[]).await.map_err(fail(Phase::Delete))
    }
}
