//! In-process authority for many documents.
//!
//! ```text
//! Client A ──┐                   ┌── DocumentRecords (tail, records, head)
//!            ├── SharedRecords ──┤   write lock = reconciliation + send
//! Client B ──┘     (doc_id)      └── broadcast::Sender<Arc<ServerRecord>>
//!                                         │
//!                              ┌──────────┼──────────┐
//!                              ▼          ▼          ▼
//!                           Client A   Client B   Client C
//! ```
//!
//! The room map is only write-locked to create rooms. Submissions to
//! different documents never contend; submissions to the same document
//! serialize on that document's records lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{CollabError, Result};
use crate::facade::{ServerFacade, SharedRecords};
use crate::protocol::{MessageType, SyncMessage};
use crate::record::{AuthorId, HeadRecord, Revision, ServerRecord, SubmittedRecord, TailRecord};
use crate::server::reconcile::{create_state_from_records, Outcome};
use crate::server::records::DocumentRecords;

/// Hub statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubStats {
    pub documents: usize,
    pub records_created: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub messages: u64,
}

/// Lock-free counters behind [`HubStats`].
#[derive(Default)]
struct Counters {
    records_created: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    messages: AtomicU64,
}

pub struct DocumentHub {
    config: ServerConfig,
    rooms: Arc<RwLock<HashMap<Uuid, SharedRecords>>>,
    counters: Arc<Counters>,
}

impl DocumentHub {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            rooms: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the document's records, creating an empty document if needed.
    pub async fn open_document(&self, doc_id: Uuid) -> SharedRecords {
        if let Some(room) = self.rooms.read().await.get(&doc_id) {
            return room.clone();
        }

        let mut rooms = self.rooms.write().await;
        let room = rooms.entry(doc_id).or_insert_with(|| {
            log::info!("opened document {}", doc_id);
            SharedRecords::with_capacity(
                doc_id,
                DocumentRecords::new(),
                self.config.broadcast_capacity,
            )
        });
        room.clone()
    }

    /// Opens a document from persisted history. Fails if the document is
    /// already open or the records do not chain onto `tail`.
    pub async fn restore_document(
        &self,
        doc_id: Uuid,
        tail: TailRecord,
        records: Vec<ServerRecord>,
    ) -> Result<SharedRecords> {
        let state = create_state_from_records(tail, records)?;
        let head = state.head().revision;

        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&doc_id) {
            return Err(CollabError::invalid_state(format!(
                "document {} is already open",
                doc_id
            )));
        }
        let shared = SharedRecords::with_capacity(doc_id, state, self.config.broadcast_capacity);
        rooms.insert(doc_id, shared.clone());

        log::info!("restored document {} at revision {}", doc_id, head);
        Ok(shared)
    }

    async fn room(&self, doc_id: Uuid) -> Result<SharedRecords> {
        self.rooms
            .read()
            .await
            .get(&doc_id)
            .cloned()
            .ok_or(CollabError::UnknownDocument(doc_id))
    }

    /// Reconciles a submission; a new record is broadcast by its document.
    pub async fn submit(
        &self,
        doc_id: Uuid,
        author_id: AuthorId,
        submitted: &SubmittedRecord,
    ) -> Result<Outcome> {
        let records = self.room(doc_id).await?;

        let outcome = match records.submit(author_id, submitted, &self.config) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                log::warn!("rejected submission {} to {}: {}", submitted.id, doc_id, e);
                return Err(e);
            }
        };

        match &outcome {
            Outcome::New { .. } => {
                self.counters.records_created.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Duplicate(_) => {
                self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(outcome)
    }

    /// Records after `after_revision` up to the head.
    pub async fn catch_up(
        &self,
        doc_id: Uuid,
        after_revision: Revision,
    ) -> Result<Vec<Arc<ServerRecord>>> {
        let records = self.room(doc_id).await?;
        let head = records.head().revision;
        records.range(after_revision + 1, head.max(after_revision) + 1)
    }

    /// New records of `doc_id` as they are created.
    pub async fn subscribe(&self, doc_id: Uuid) -> Result<broadcast::Receiver<Arc<ServerRecord>>> {
        Ok(self.room(doc_id).await?.subscribe_records())
    }

    pub async fn facade(&self, doc_id: Uuid) -> Result<SharedRecords> {
        self.room(doc_id).await
    }

    pub async fn head(&self, doc_id: Uuid) -> Result<HeadRecord> {
        Ok(self.room(doc_id).await?.head())
    }

    pub async fn stats(&self) -> HubStats {
        HubStats {
            documents: self.rooms.read().await.len(),
            records_created: self.counters.records_created.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            messages: self.counters.messages.load(Ordering::Relaxed),
        }
    }

    /// Decodes a client message, dispatches it and returns the encoded
    /// reply. Request failures are answered with an `Error` message; only
    /// undecodable input is returned as an error.
    pub async fn handle_message(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let msg = SyncMessage::decode(bytes)?;
        self.counters.messages.fetch_add(1, Ordering::Relaxed);

        let reply = match self.dispatch(&msg).await {
            Ok(reply) => reply,
            Err(e) => {
                log::debug!("{:?} from {} failed: {}", msg.msg_type, msg.author_id, e);
                SyncMessage::error(msg.author_id, msg.doc_id, e.to_string())
            }
        };
        Ok(reply.encode()?)
    }

    async fn dispatch(&self, msg: &SyncMessage) -> Result<SyncMessage> {
        match msg.msg_type {
            MessageType::Submit => {
                let submitted = msg.submitted_record()?;
                // Submitting implicitly opens the document.
                self.open_document(msg.doc_id).await;
                match self.submit(msg.doc_id, msg.author_id, &submitted).await? {
                    Outcome::New { record, .. } => Ok(SyncMessage::acknowledge(msg.doc_id, &record)?),
                    Outcome::Duplicate(record) => Ok(SyncMessage::duplicate(msg.doc_id, &record)?),
                }
            }
            MessageType::CatchUp => {
                let request = msg.catch_up_request()?;
                self.open_document(msg.doc_id).await;
                let records: Vec<ServerRecord> = self
                    .catch_up(msg.doc_id, request.after_revision)
                    .await?
                    .iter()
                    .map(|r| ServerRecord::clone(r))
                    .collect();
                Ok(SyncMessage::records(msg.author_id, msg.doc_id, &records)?)
            }
            MessageType::Ping => Ok(SyncMessage::pong(msg.author_id)),
            other => Err(CollabError::invalid_state(format!(
                "{:?} is not a client request",
                other
            ))),
        }
    }
}
