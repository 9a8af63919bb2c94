//! Server-side reconciliation: rebasing submissions onto the head,
//! duplicate detection and folding old records into the tail.

use std::sync::Arc;

use tandem_core::text::char_len;
use tandem_core::{Bias, ChangesetError};

use crate::error::{CollabError, Result};
use crate::record::{AuthorId, HeadRecord, ServerRecord, SubmittedRecord, TailRecord};
use crate::server::records::DocumentRecords;

/// Result of reconciling one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The submission was already applied; this is the original record.
    Duplicate(Arc<ServerRecord>),
    /// The submission was rebased into a new record at `head.revision`.
    New {
        record: Arc<ServerRecord>,
        head: HeadRecord,
    },
}

impl Outcome {
    pub fn record(&self) -> &Arc<ServerRecord> {
        match self {
            Outcome::Duplicate(record) | Outcome::New { record, .. } => record,
        }
    }
}

/// Rebases `submitted` onto the head of `records`.
///
/// Already-applied history wins insertion ties. Does not modify `records`;
/// see [`DocumentRecords::reconcile`].
pub fn process_submitted_record(
    author_id: AuthorId,
    submitted: &SubmittedRecord,
    records: &DocumentRecords,
) -> Result<Outcome> {
    let tail = records.tail().revision;
    let head = records.head();
    let target = submitted.target_revision;

    if target < tail || target > head.revision {
        return Err(CollabError::RevisionRange {
            target,
            oldest: tail,
            head: head.revision,
        });
    }

    let later = records.range(target + 1, head.revision + 1)?;

    if let Some(original) = later.iter().find(|r| r.is_copy_of(author_id, submitted)) {
        log::debug!(
            "duplicate submission {} from {} (revision {})",
            submitted.id,
            author_id,
            original.revision
        );
        return Ok(Outcome::Duplicate(Arc::clone(original)));
    }

    submitted.changeset.validate()?;
    let mut changeset = submitted.changeset.clone();
    let mut selection = submitted.selection;
    let mut selection_inverse = submitted.selection_inverse;
    for record in &later {
        changeset = changeset.follow(&record.changeset, false)?;
        selection = selection.follow(&record.changeset, Bias::Left);
        selection_inverse = selection_inverse.follow(&record.changeset, Bias::Left);
    }

    let text = changeset.apply(&head.text)?;
    let inverse = changeset.inverse(&head.text)?;
    let revision = head.revision + 1;

    let record = Arc::new(ServerRecord {
        revision,
        author_id,
        idempotency_id: submitted.id,
        selection: selection.clamp(changeset.output_length()),
        selection_inverse: selection_inverse.clamp(changeset.input_length()),
        changeset,
        inverse,
    });

    log::debug!(
        "submission {} from {} rebased over {} record(s) to revision {}",
        submitted.id,
        author_id,
        later.len(),
        revision
    );

    Ok(Outcome::New {
        record,
        head: HeadRecord::new(revision, text),
    })
}

/// Folds the oldest `count` of `records` into `tail`.
pub fn compose_new_tail(
    tail: &TailRecord,
    records: &[Arc<ServerRecord>],
    count: usize,
) -> Result<TailRecord> {
    let mut next = tail.clone();
    for record in records.iter().take(count) {
        if record.revision != next.revision + 1 {
            return Err(CollabError::invalid_state(format!(
                "record {} does not follow tail {}",
                record.revision, next.revision
            )));
        }
        next.text = record.changeset.apply(&next.text)?;
        next.revision = record.revision;
    }
    Ok(next)
}

/// Rebuilds the in-memory `(tail, records, head)` triple from persisted
/// records, checking that they are contiguous and composable.
pub fn create_state_from_records(
    tail: TailRecord,
    records: Vec<ServerRecord>,
) -> Result<DocumentRecords> {
    let mut head = tail.clone();
    let mut held = Vec::with_capacity(records.len());

    for record in records {
        if record.revision != head.revision + 1 {
            return Err(CollabError::invalid_state(format!(
                "record {} does not follow revision {}",
                record.revision, head.revision
            )));
        }
        let length = char_len(&head.text);
        if record.changeset.input_length() != length {
            return Err(ChangesetError::Composability {
                context: "record changeset",
                expected: length,
                actual: record.changeset.input_length(),
            }
            .into());
        }
        record.changeset.assert_is_composable(&record.inverse)?;

        head.text = record.changeset.apply(&head.text)?;
        head.revision = record.revision;
        held.push(Arc::new(record));
    }

    Ok(DocumentRecords::from_parts(tail, held, head))
}
