//! Grant convergence: one statement per privilege.
//!
//! Each GRANT/REVOKE is idempotent in the store, so a loop that fails
//! halfway leaves earlier privileges applied and the next pass resumes.

use std::collections::BTreeSet;

use async_trait::async_trait;
use cqlsync_db::{quote_identifier, BackendError, DbValue, StoreExecutor};
use cqlsync_protocol::{Condition, Grant, GrantParameters, Privilege, ResourceKind};

use crate::diff::grant_state;
use crate::error::{ControllerError, ControllerResult, Phase};
use crate::observation::{ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate};

const SELECT_PERMISSIONS: &str =
    "SELECT permissions FROM system_auth.role_permissions WHERE role = ? AND resource = ?";

pub struct GrantClient<'a> {
    db: &'a dyn StoreExecutor,
}

impl<'a> GrantClient<'a> {
    pub fn new(db: &'a dyn StoreExecutor) -> Self {
        Self { db }
    }

    async fn grant_all(&self, spec: &GrantParameters, phase: Phase) -> ControllerResult<()> {
        let target = Target::of(spec)?;
        for privilege in spec.privilege_set() {
            self.db
                .exec(&grant_statement(privilege, target.keyspace, target.role), &[])
                .await
                .map_err(fail(phase))?;
        }
        Ok(())
    }
}

fn fail(phase: Phase) -> impl FnOnce(BackendError) -> ControllerError {
    ControllerError::operation(ResourceKind::Grant, phase)
}

/// The role and keyspace a grant applies to.
struct Target<'s> {
    role: &'s str,
    keyspace: &'s str,
}

impl<'s> Target<'s> {
    fn of(spec: &'s GrantParameters) -> ControllerResult<Self> {
        let missing = |field| ControllerError::MissingField {
            kind: ResourceKind::Grant,
            field,
        };
        Ok(Self {
            role: spec.role.as_deref().ok_or_else(|| missing("role"))?,
            keyspace: spec.keyspace.as_deref().ok_or_else(|| missing("keyspace"))?,
        })
    }

    /// Resource name as stored in `role_permissions`.
    fn resource(&self) -> String {
        format!("data/{}", self.keyspace)
    }
}

pub fn grant_statement(privilege: Privilege, keyspace: &str, role: &str) -> String {
    format!(
        "GRANT {} ON KEYSPACE {} TO {}",
        privilege.cql_name(),
        quote_identifier(keyspace),
        quote_identifier(role)
    )
}

pub fn revoke_statement(privilege: Privilege, keyspace: &str, role: &str) -> String {
    format!(
        "REVOKE {} ON KEYSPACE {} FROM {}",
        privilege.cql_name(),
        quote_identifier(keyspace),
        quote_identifier(role)
    )
}

#[async_trait]
impl ExternalClient for GrantClient<'_> {
    type Parameters = GrantParameters;

    async fn observe(&self, resource: &mut Grant) -> ControllerResult<ExternalObservation> {
        let target = Target::of(&resource.spec)?;
        let params = [DbValue::from(target.role), DbValue::from(target.resource())];
        let rows = self
            .db
            .query(SELECT_PERMISSIONS, &params)
            .await
            .map_err(fail(Phase::Observe))?;

        let mut observed = BTreeSet::new();
        for row in rows {
            let permissions: Vec<String> =
                row.get_by_name("permissions").map_err(fail(Phase::Observe))?;
            observed.extend(permissions);
        }

        let (exists, up_to_date) = grant_state(&resource.spec.privilege_set(), &observed);
        if exists {
            resource.status.set_condition(Condition::available());
        }
        Ok(ExternalObservation {
            resource_exists: exists,
            resource_up_to_date: up_to_date,
            resource_late_initialized: false,
        })
    }

    async fn create(&self, resource: &Grant) -> ControllerResult<ExternalCreation> {
        self.grant_all(&resource.spec, Phase::Create).await?;
        Ok(ExternalCreation::default())
    }

    /// Re-issues every GRANT rather than computing the missing subset.
    async fn update(&self, resource: &Grant) -> ControllerResult<ExternalUpdate> {
        self.grant_all(&resource.spec, Phase::Update).await?;
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, resource: &Grant) -> ControllerResult<()> {
        let target = Target::of(&resource.spec)?;
        for privilege in resource.spec.privilege_set() {
            self.db
                .exec(&revoke_statement(privilege, target.keyspace, target.role), &[])
                .await
                .map_err(fail(Phase::Delete))?;
        }
        Ok(())
    }
}
