use std::collections::BTreeMap;

use crate::record::{Revision, ServerRecord};

/// A server message that arrived ahead of its predecessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub record: ServerRecord,
    /// Delivered as an acknowledgement of this replica's submission.
    pub acknowledgement: bool,
}

/// Out-of-order messages keyed by revision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageQueue {
    pending: BTreeMap<Revision, Incoming>,
}

impl MessageQueue {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Buffers `incoming`, then drops the newest messages past `limit`.
    /// Returns how many were dropped.
    pub fn insert(&mut self, incoming: Incoming, limit: usize) -> usize {
        self.pending.insert(incoming.record.revision, incoming);
        let mut dropped = 0;
        while self.pending.len() > limit.max(1) {
            if let Some((revision, _)) = self.pending.pop_last() {
                log::debug!("message queue full, dropping revision {}", revision);
            }
            dropped += 1;
        }
        dropped
    }

    /// Takes the message for `revision` if it is the oldest buffered one,
    /// discarding anything older first.
    pub fn take_next(&mut self, revision: Revision) -> Option<Incoming> {
        while let Some(entry) = self.pending.first_entry() {
            if *entry.key() < revision {
                entry.remove();
                continue;
            }
            if *entry.key() == revision {
                return Some(entry.remove());
            }
            return None;
        }
        None
    }

    /// Missing revisions `[server_revision + 1, first buffered)`, if any.
    pub fn gap(&self, server_revision: Revision) -> Option<(Revision, Revision)> {
        let first = *self.pending.keys().next()?;
        (first > server_revision + 1).then_some((server_revision + 1, first))
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::{Changeset, Selection};
    use uuid::Uuid;

    fn incoming(revision: Revision) -> Incoming {
        Incoming {
            record: ServerRecord {
                revision,
                author_id: Uuid::nil(),
                idempotency_id: Uuid::nil(),
                changeset: Changeset::identity(0),
                inverse: Changeset::identity(0),
                selection_inverse: Selection::caret(0),
                selection: Selection::caret(0),
            },
            acknowledgement: false,
        }
    }

    #[test]
    fn test_gap_and_drain_order() {
        let mut queue = MessageQueue::default();
        queue.insert(incoming(5), 10);
        queue.insert(incoming(4), 10);
        assert_eq!(queue.gap(1), Some((2, 4)));

        assert_eq!(queue.take_next(2), None);
        assert_eq!(queue.take_next(4).map(|i| i.record.revision), Some(4));
        assert_eq!(queue.take_next(5).map(|i| i.record.revision), Some(5));
        assert!(queue.is_empty());
        assert_eq!(queue.gap(5), None);
    }

    #[test]
    fn test_stale_entries_are_discarded() {
        let mut queue = MessageQueue::default();
        queue.insert(incoming(3), 10);
        queue.insert(incoming(6), 10);
        assert_eq!(queue.take_next(6).map(|i| i.record.revision), Some(6));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_limit_drops_newest() {
        let mut queue = MessageQueue::default();
        for revision in [3, 9, 4] {
            queue.insert(incoming(revision), 2);
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.gap(1), Some((2, 3)));
        assert_eq!(queue.take_next(3).map(|i| i.record.revision), Some(3));
        assert_eq!(queue.take_next(4).map(|i| i.record.revision), Some(4));
    }
}
