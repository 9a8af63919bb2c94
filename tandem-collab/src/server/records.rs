//! In-memory history of one document: a tail snapshot, the records after
//! it and the head snapshot they compose to.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::{CollabError, Result};
use crate::record::{AuthorId, HeadRecord, Revision, ServerRecord, SubmittedRecord, TailRecord};
use crate::server::reconcile::{compose_new_tail, process_submitted_record, Outcome};

#[derive(Debug, Clone, Default)]
pub struct DocumentRecords {
    tail: TailRecord,
    /// Revisions `tail.revision + 1 ..= head.revision`, oldest first.
    records: VecDeque<Arc<ServerRecord>>,
    head: HeadRecord,
}

impl DocumentRecords {
    /// An empty document at revision 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// A document whose history starts at `snapshot`.
    pub fn from_snapshot(snapshot: TailRecord) -> Self {
        Self {
            head: snapshot.clone(),
            tail: snapshot,
            records: VecDeque::new(),
        }
    }

    pub(crate) fn from_parts(
        tail: TailRecord,
        records: Vec<Arc<ServerRecord>>,
        head: HeadRecord,
    ) -> Self {
        Self {
            tail,
            records: records.into(),
            head,
        }
    }

    pub fn head(&self) -> &HeadRecord {
        &self.head
    }

    pub fn tail(&self) -> &TailRecord {
        &self.tail
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<ServerRecord>> {
        self.records.iter()
    }

    fn index_of(&self, revision: Revision) -> Option<usize> {
        if revision <= self.tail.revision || revision > self.head.revision {
            return None;
        }
        usize::try_from(revision - self.tail.revision - 1).ok()
    }

    pub fn get(&self, revision: Revision) -> Option<Arc<ServerRecord>> {
        self.index_of(revision)
            .and_then(|i| self.records.get(i))
            .cloned()
    }

    /// Records `start..end`. Both bounds must lie inside the held window.
    pub fn range(&self, start: Revision, end: Revision) -> Result<Vec<Arc<ServerRecord>>> {
        let first = self.tail.revision + 1;
        let past_head = self.head.revision + 1;
        if start > end || start < first || end > past_head {
            return Err(CollabError::RevisionRange {
                target: if start < first { start } else { end },
                oldest: self.tail.revision,
                head: self.head.revision,
            });
        }
        Ok((start..end).filter_map(|revision| self.get(revision)).collect())
    }

    /// Text at `revision`, rebuilt forward from the tail.
    pub fn text_at(&self, revision: Revision) -> Result<String> {
        if revision == self.head.revision {
            return Ok(self.head.text.clone());
        }
        let mut text = self.tail.text.clone();
        for record in self.range(self.tail.revision + 1, revision + 1)? {
            text = record.changeset.apply(&text)?;
        }
        Ok(text)
    }

    pub fn has_older_than(&self, revision: Revision) -> bool {
        revision > 1 && self.index_of(revision - 1).is_some()
    }

    /// Reconciles `submitted` and appends the new record, if any.
    pub fn reconcile(&mut self, author_id: AuthorId, submitted: &SubmittedRecord) -> Result<Outcome> {
        let outcome = process_submitted_record(author_id, submitted, self)?;
        if let Outcome::New { record, head } = &outcome {
            self.records.push_back(Arc::clone(record));
            self.head = head.clone();
        }
        Ok(outcome)
    }

    /// Folds old records into the tail once more than
    /// `record_retention_limit + cleanup_threshold` are held, keeping the
    /// newest `record_retention_limit`. Returns the new tail revision.
    pub fn compact(&mut self, config: &ServerConfig) -> Result<Option<Revision>> {
        let limit = config.record_retention_limit;
        if self.records.len() <= limit + config.cleanup_threshold {
            return Ok(None);
        }

        let count = self.records.len() - limit;
        let tail = compose_new_tail(&self.tail, self.records.make_contiguous(), count)?;
        self.records.drain(..count);

        log::info!(
            "compacted {} record(s): tail {} -> {}",
            count,
            self.tail.revision,
            tail.revision
        );
        self.tail = tail;
        Ok(Some(self.tail.revision))
    }
}
