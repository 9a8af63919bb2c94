//! Errors for the sync service and server reconciliation.

use tandem_core::ChangesetError;
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::ProtocolError;
use crate::record::Revision;

#[derive(Debug, Clone, Error)]
pub enum CollabError {
    /// A changeset or selection was malformed or not composable.
    #[error(transparent)]
    Changeset(#[from] ChangesetError),

    /// A submission or catch-up targeted a revision outside the window of
    /// records still held.
    #[error("revision {target} is outside the available range {oldest}..={head}")]
    RevisionRange {
        target: Revision,
        oldest: Revision,
        head: Revision,
    },

    /// A post-transition invariant failed. Signals a bug, never user input.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unknown document {0}")]
    UnknownDocument(Uuid),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl CollabError {
    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

pub type Result<T, E = CollabError> = std::result::Result<T, E>;
