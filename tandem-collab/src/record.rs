//! Records exchanged between sync clients and the server.
//!
//! ```text
//!  client                                   server
//!  ──────                                   ──────
//!  SubmittedRecord { id, target_revision, ─► rebase onto head
//!                    changeset, ... }        │
//!                                            ▼
//!            ◄── ServerRecord { revision, author_id, idempotency_id,
//!                               changeset, inverse, selection, ... }
//! ```

use serde::{Deserialize, Serialize};
use tandem_core::{Changeset, Selection};
use uuid::Uuid;

/// Server revision number. Revision 0 is the empty document.
pub type Revision = u64;

/// Identifies the author of a record (one per user, shared by sessions).
pub type AuthorId = Uuid;

/// An edit accepted by the server. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub revision: Revision,
    pub author_id: AuthorId,
    pub idempotency_id: Uuid,
    /// Edit over the text at `revision - 1`.
    pub changeset: Changeset,
    /// Undoes `changeset` over the text at `revision`.
    pub inverse: Changeset,
    /// Author's selection before the edit.
    pub selection_inverse: Selection,
    /// Author's selection after the edit.
    pub selection: Selection,
}

impl ServerRecord {
    /// True when this record is the server's copy of `submitted` by `author_id`.
    pub fn is_copy_of(&self, author_id: AuthorId, submitted: &SubmittedRecord) -> bool {
        self.author_id == author_id && self.idempotency_id == submitted.id
    }
}

/// A client submission awaiting reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedRecord {
    /// Idempotency token; a retry carries the same id.
    pub id: Uuid,
    /// Revision whose text `changeset` applies to.
    pub target_revision: Revision,
    pub changeset: Changeset,
    pub selection: Selection,
    pub selection_inverse: Selection,
}

impl SubmittedRecord {
    /// A submission with a fresh idempotency token.
    pub fn new(
        target_revision: Revision,
        changeset: Changeset,
        selection: Selection,
        selection_inverse: Selection,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_revision,
            changeset,
            selection,
            selection_inverse,
        }
    }
}

/// Unsent local edits layered on top of the submitted ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecord {
    pub changeset: Changeset,
    pub selection: Selection,
    pub selection_inverse: Selection,
}

/// A composed text snapshot at a revision: the head or tail of history.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RevisionText {
    pub revision: Revision,
    pub text: String,
}

impl RevisionText {
    pub fn new(revision: Revision, text: impl Into<String>) -> Self {
        Self {
            revision,
            text: text.into(),
        }
    }
}

/// Newest snapshot of a document.
pub type HeadRecord = RevisionText;

/// Oldest snapshot history is still reconstructable from.
pub type TailRecord = RevisionText;
