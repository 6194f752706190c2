//! Controller error taxonomy.
//!
//! Not-found is never an error: a missing row is reported through
//! [`ExternalObservation`](crate::ExternalObservation). Everything here is
//! scoped to one resource and one pass.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use cqlsync_db::BackendError;
use cqlsync_protocol::ResourceKind;
use thiserror::Error;

/// Which step of a pass failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Observe,
    Create,
    Update,
    Delete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Observe => "observe",
            Phase::Create => "create",
            Phase::Update => "update",
            Phase::Delete => "delete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Password generator failed: {0}")]
pub struct PasswordError(pub String);

#[derive(Debug, Error)]
pub enum ControllerError {
    /// A query or statement failed during one phase.
    #[error("Cannot {phase} {kind}")]
    Operation {
        kind: ResourceKind,
        phase: Phase,
        #[source]
        source: BackendError,
    },

    /// Aborts role creation before any statement is issued.
    #[error("Cannot create role")]
    Password(#[source] PasswordError),

    #[error("{kind} is missing required field '{field}'")]
    MissingField {
        kind: ResourceKind,
        field: &'static str,
    },

    #[error("Cannot connect to cluster")]
    Connect(#[source] BackendError),

    #[error("Cannot publish connection secret for {name}")]
    Publish {
        name: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Reconcile pass timed out after {0:?}")]
    Timeout(Duration),
}

pub type ControllerResult<T> = Result<T, ControllerError>;

impl ControllerError {
    /// Adapter for `map_err` on store calls.
    pub(crate) fn operation(kind: ResourceKind, phase: Phase) -> impl FnOnce(BackendError) -> Self {
        move |source| ControllerError::Operation { kind, phase, source }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            ControllerError::Operation { phase, .. } => Some(*phase),
            ControllerError::Password(_) => Some(Phase::Create),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        match self {
            ControllerError::Operation { kind, .. } | ControllerError::MissingField { kind, .. } => {
                Some(*kind)
            }
            ControllerError::Password(_) => Some(ResourceKind::Role),
            _ => None,
        }
    }

    /// This error and its sources joined with `": "`, for status messages.
    pub fn chain_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }
}
