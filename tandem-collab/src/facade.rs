//! Read access to a document's server history.
//!
//! The client service uses a [`ServerFacade`] to catch up after a
//! disconnect and to undo edits from earlier sessions. [`SharedRecords`]
//! is the in-process implementation the hub hands out.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::events::{Event, EventBus, SubscriptionId};
use crate::record::{AuthorId, HeadRecord, Revision, ServerRecord, SubmittedRecord};
use crate::server::reconcile::Outcome;
use crate::server::records::DocumentRecords;

/// History of one document as seen by a client.
pub trait ServerFacade: Send + Sync {
    /// Newest snapshot.
    fn head(&self) -> HeadRecord;

    /// Full text at `revision`.
    fn text(&self, revision: Revision) -> Result<String>;

    /// Records with revisions in `start..end`, oldest first.
    fn range(&self, start: Revision, end: Revision) -> Result<Vec<Arc<ServerRecord>>>;

    /// The record at `revision`, if still held.
    fn at(&self, revision: Revision) -> Option<Arc<ServerRecord>>;

    /// Records at or below `start_revision`, newest first, stopping at the
    /// first one no longer held.
    fn older_iterable(
        &self,
        start_revision: Revision,
    ) -> Box<dyn Iterator<Item = Arc<ServerRecord>> + '_> {
        Box::new(
            (1..=start_revision)
                .rev()
                .map_while(move |revision| self.at(revision)),
        )
    }

    /// True if the record just below `revision` is still held.
    fn has_older_than(&self, revision: Revision) -> bool {
        revision > 1 && self.at(revision - 1).is_some()
    }
}

/// Notifications from a [`SharedRecords`] facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacadeEvent {
    HeadUpdated(HeadRecord),
    /// Records `start..end` became available (or were folded into the tail).
    RecordsUpdated { start: Revision, end: Revision },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacadeEventKind {
    HeadUpdated,
    RecordsUpdated,
}

impl Event for FacadeEvent {
    type Kind = FacadeEventKind;

    fn kind(&self) -> FacadeEventKind {
        match self {
            FacadeEvent::HeadUpdated(_) => FacadeEventKind::HeadUpdated,
            FacadeEvent::RecordsUpdated { .. } => FacadeEventKind::RecordsUpdated,
        }
    }
}

/// Cloneable handle to one document's records.
///
/// The write lock is the document's critical section: reconciliation,
/// compaction, event queueing and the broadcast of new records run under
/// it, reads share it. Events and broadcasts therefore follow revision
/// order even with concurrent submitters.
#[derive(Debug, Clone)]
pub struct SharedRecords {
    doc_id: Uuid,
    records: Arc<RwLock<DocumentRecords>>,
    events: EventBus<FacadeEvent>,
    broadcast: broadcast::Sender<Arc<ServerRecord>>,
}

impl SharedRecords {
    pub fn new(doc_id: Uuid, records: DocumentRecords) -> Self {
        Self::with_capacity(doc_id, records, ServerConfig::default().broadcast_capacity)
    }

    /// Like [`new`](Self::new) with `capacity` records buffered per
    /// broadcast receiver.
    pub fn with_capacity(doc_id: Uuid, records: DocumentRecords, capacity: usize) -> Self {
        let (broadcast, _) = broadcast::channel(capacity.max(1));
        Self {
            doc_id,
            records: Arc::new(RwLock::new(records)),
            events: EventBus::new(),
            broadcast,
        }
    }

    pub fn doc_id(&self) -> Uuid {
        self.doc_id
    }

    pub fn events(&self) -> &EventBus<FacadeEvent> {
        &self.events
    }

    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&FacadeEvent) + Send + Sync + 'static,
    {
        self.events.subscribe_all(handler)
    }

    /// New records as they are created, in revision order.
    pub fn subscribe_records(&self) -> broadcast::Receiver<Arc<ServerRecord>> {
        self.broadcast.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, DocumentRecords> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DocumentRecords> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reconciles a submission and compacts history if it grew past the
    /// configured slack. A new record is broadcast and its events queued
    /// under the write lock; handlers run after the lock is released.
    pub fn submit(
        &self,
        author_id: AuthorId,
        submitted: &SubmittedRecord,
        config: &ServerConfig,
    ) -> Result<Outcome> {
        let (outcome, compacted) = {
            let mut records = self.write();
            let outcome = records.reconcile(author_id, submitted)?;
            let compacted = match &outcome {
                Outcome::New { record, head } => {
                    // No receivers is fine; they catch up later.
                    let _ = self.broadcast.send(Arc::clone(record));
                    self.events.enqueue(FacadeEvent::RecordsUpdated {
                        start: record.revision,
                        end: record.revision + 1,
                    });
                    self.events.enqueue(FacadeEvent::HeadUpdated(head.clone()));

                    let compacted = records.compact(config);
                    if let Ok(Some(tail)) = compacted {
                        self.events.enqueue(FacadeEvent::RecordsUpdated {
                            start: 1,
                            end: tail + 1,
                        });
                    }
                    compacted
                }
                Outcome::Duplicate(_) => Ok(None),
            };
            (outcome, compacted)
        };

        self.events.flush();
        compacted?;
        Ok(outcome)
    }

    pub fn tail_revision(&self) -> Revision {
        self.read().tail().revision
    }

    pub fn record_count(&self) -> usize {
        self.read().len()
    }
}

impl ServerFacade for SharedRecords {
    fn head(&self) -> HeadRecord {
        self.read().head().clone()
    }

    fn text(&self, revision: Revision) -> Result<String> {
        self.read().text_at(revision)
    }

    fn range(&self, start: Revision, end: Revision) -> Result<Vec<Arc<ServerRecord>>> {
        self.read().range(start, end)
    }

    fn at(&self, revision: Revision) -> Option<Arc<ServerRecord>> {
        self.read().get(revision)
    }

    fn has_older_than(&self, revision: Revision) -> bool {
        self.read().has_older_than(revision)
    }
}

impl ServerFacade for DocumentRecords {
    fn head(&self) -> HeadRecord {
        DocumentRecords::head(self).clone()
    }

    fn text(&self, revision: Revision) -> Result<String> {
        self.text_at(revision)
    }

    fn range(&self, start: Revision, end: Revision) -> Result<Vec<Arc<ServerRecord>>> {
        DocumentRecords::range(self, start, end)
    }

    fn at(&self, revision: Revision) -> Option<Arc<ServerRecord>> {
        self.get(revision)
    }

    fn has_older_than(&self, revision: Revision) -> bool {
        DocumentRecords::has_older_than(self, revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tandem_core::{Changeset, Selection};

    fn insert_at_end(shared: &SharedRecords, text: &str) -> SubmittedRecord {
        let head = shared.head();
        let len = tandem_core::text::char_len(&head.text);
        SubmittedRecord::new(
            head.revision,
            Changeset::insertion(len, len, text).unwrap(),
            Selection::caret(len + tandem_core::text::char_len(text)),
            Selection::caret(len),
        )
    }

    #[test]
    fn test_submit_emits_records_then_head() {
        let shared = SharedRecords::new(Uuid::new_v4(), DocumentRecords::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        shared.subscribe_all(move |e| sink.lock().unwrap().push(e.kind()));

        let author = Uuid::new_v4();
        let submitted = insert_at_end(&shared, "hi");
        shared
            .submit(author, &submitted, &ServerConfig::default())
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![FacadeEventKind::RecordsUpdated, FacadeEventKind::HeadUpdated]
        );
        assert_eq!(shared.head().text, "hi");
    }

    #[test]
    fn test_concurrent_submitters_see_heads_in_revision_order() {
        for _ in 0..20 {
            let shared = SharedRecords::new(Uuid::new_v4(), DocumentRecords::new());
            let heads = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&heads);
            shared.subscribe_all(move |e| {
                if let FacadeEvent::HeadUpdated(head) = e {
                    sink.lock().unwrap().push(head.revision);
                }
            });
            let mut rx = shared.subscribe_records();

            let threads: Vec<_> = (0..4)
                .map(|i| {
                    let shared = shared.clone();
                    std::thread::spawn(move || {
                        let author = Uuid::new_v4();
                        for _ in 0..25 {
                            let submitted = insert_at_end(&shared, &i.to_string());
                            shared
                                .submit(author, &submitted, &ServerConfig::default())
                                .unwrap();
                        }
                    })
                })
                .collect();
            for thread in threads {
                thread.join().unwrap();
            }

            let expected: Vec<Revision> = (1..=100).collect();
            assert_eq!(*heads.lock().unwrap(), expected);

            let mut broadcast = Vec::new();
            while let Ok(record) = rx.try_recv() {
                broadcast.push(record.revision);
            }
            assert_eq!(broadcast, expected);
        }
    }

    #[test]
    fn test_older_iterable_walks_down() {
        let shared = SharedRecords::new(Uuid::new_v4(), DocumentRecords::new());
        let author = Uuid::new_v4();
        for word in ["a", "b", "c"] {
            let submitted = insert_at_end(&shared, word);
            shared
                .submit(author, &submitted, &ServerConfig::default())
                .unwrap();
        }

        let revisions: Vec<_> = shared.older_iterable(2).map(|r| r.revision).collect();
        assert_eq!(revisions, vec![2, 1]);
        assert!(shared.has_older_than(3));
        assert!(!shared.has_older_than(1));
        assert_eq!(shared.text(2).unwrap(), "ab");
    }

    #[test]
    fn test_duplicate_emits_nothing() {
        let shared = SharedRecords::new(Uuid::new_v4(), DocumentRecords::new());
        let author = Uuid::new_v4();
        let submitted = insert_at_end(&shared, "x");
        shared
            .submit(author, &submitted, &ServerConfig::default())
            .unwrap();

        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        shared.subscribe_all(move |_| *sink.lock().unwrap() += 1);

        let outcome = shared
            .submit(author, &submitted, &ServerConfig::default())
            .unwrap();
        assert!(matches!(outcome, Outcome::Duplicate(_)));
        assert_eq!(*seen.lock().unwrap(), 0);
        assert_eq!(shared.record_count(), 1);
    }
}
