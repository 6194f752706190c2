//! Role convergence and credential emission.

use async_trait::async_trait;
use cqlsync_db::{quote_identifier, quote_literal, BackendError, DbValue, StoreExecutor};
use cqlsync_protocol::{Condition, ResourceKind, Role, RoleParameters};

use crate::diff::{role_late_init, role_up_to_date};
use crate::error::{ControllerError, ControllerResult, Phase};
use crate::observation::{ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate};
use crate::password::PasswordGenerator;

const SELECT_ROLE: &str = "SELECT is_superuser, can_login FROM system_auth.roles WHERE role = ?";

pub struct RoleClient<'a> {
    db: &'a dyn StoreExecutor,
    passwords: &'a dyn PasswordGenerator,
}

impl<'a> RoleClient<'a> {
    pub fn new(db: &'a dyn StoreExecutor, passwords: &'a dyn PasswordGenerator) -> Self {
        Self { db, passwords }
    }
}

fn fail(phase: Phase) -> impl FnOnce(BackendError) -> ControllerError {
    ControllerError::operation(ResourceKind::Role, phase)
}

pub fn create_statement(name: &str, spec: &RoleParameters, password: &str) -> String {
    format!(
        "CREATE ROLE IF NOT EXISTS {} WITH SUPERUSER = {} AND LOGIN = {} AND PASSWORD = {}",
        quote_identifier(name),
        spec.superuser.unwrap_or(false),
        spec.login.unwrap_or(false),
        quote_literal(password),
    )
}

pub fn alter_statement(name: &str, spec: &RoleParameters) -> String {
    format!(
        "ALTER ROLE {} WITH SUPERUSER = {} AND LOGIN = {}",
        quote_identifier(name),
        spec.superuser.unwrap_or(false),
        spec.login.unwrap_or(false),
    )
}

pub fn drop_statement(name: &str) -> String {
    format!("DROP ROLE IF EXISTS {}", quote_identifier(name))
}

#[async_trait]
impl ExternalClient for RoleClient<'_> {
    type Parameters = RoleParameters;

    async fn observe(&self, resource: &mut Role) -> ControllerResult<ExternalObservation> {
        let params = [DbValue::from(resource.external_name())];
        let mut rows = self
            .db
            .query(SELECT_ROLE, &params)
            .await
            .map_err(fail(Phase::Observe))?;
        let row = rows.next_row();
        rows.close();

        let Some(row) = row else {
            return Ok(ExternalObservation::absent());
        };
        let observed = RoleParameters {
            superuser: row.get_by_name("is_superuser").map_err(fail(Phase::Observe))?,
            login: row.get_by_name("can_login").map_err(fail(Phase::Observe))?,
        };

        resource.status.set_condition(Condition::available());
        let late_initialized = role_late_init(&mut resource.spec, &observed);
        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: role_up_to_date(&resource.spec, &observed),
            resource_late_initialized: late_initialized,
        })
    }

    /// The password exists only in the statement and the returned secret.
    async fn create(&self, resource: &Role) -> ControllerResult<ExternalCreation> {
        let password = self.passwords.generate().map_err(ControllerError::Password)?;
        let name = resource.external_name();
        let statement = create_statement(name, &resource.spec, &password);
        self.db.exec(&statement, &[]).await.map_err(fail(Phase::Create))?;
        Ok(ExternalCreation {
            connection_secret: Some(self.db.connection_details(name, &password)),
        })
    }

    async fn update(&self, resource: &Role) -> ControllerResult<ExternalUpdate> {
        let statement = alter_statement(resource.external_name(), &resource.spec);
        self.db.exec(&statement, &[]).await.map_err(fail(Phase::Update))?;
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, resource: &Role) -> ControllerResult<()> {
        let statement = drop_statement(resource.external_name());
        self.db.exec(&statement, &[]).await.map_err(fail(Phase::Delete))
    }
}
