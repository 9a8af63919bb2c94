//! # tandem-collab: sync client and authority for collaborative text
//!
//! Each participant runs a [`Service`] that owns an optimistic replica of
//! one document. The [`DocumentHub`] is the single authority that orders
//! submissions into numbered revisions.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────┐   SubmittedRecord   ┌──────────────────┐
//! │ Service (per replica) │ ──────────────────► │   DocumentHub    │
//! │                       │                     │  (authority)     │
//! │ server ─ submitted ─  │ ◄────────────────── │                  │
//! │   local ─ view        │    ServerRecord     │ tail ─ records ─ │
//! │ undo / redo stacks    │                     │   head           │
//! └──────────┬────────────┘                     └────────┬─────────┘
//!            │ ServerFacade (catch-up, server undo)      │
//!            └──────────────────────────────────────────►┤
//!                                               ┌────────┴─────────┐
//!                                               │ broadcast fan-out│
//!                                               └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`record`]: server, submitted and local records
//! - [`service`]: the replica state machine, undo/redo and snapshots
//! - [`server`]: reconciliation, record retention and the hub
//! - [`facade`]: read access to server history for replicas
//! - [`protocol`]: bincode wire messages
//! - [`events`]: typed event bus with FIFO delivery
//! - [`config`]: service and server tunables

pub mod config;
pub mod error;
pub mod events;
pub mod facade;
pub mod protocol;
pub mod record;
pub mod server;
pub mod service;

pub use config::{ServerConfig, ServiceConfig};
pub use error::{CollabError, Result};
pub use events::{Event, EventBus, SubscriptionId};
pub use facade::{FacadeEvent, FacadeEventKind, ServerFacade, SharedRecords};
pub use protocol::{MessageType, ProtocolError, SyncMessage, PROTOCOL_VERSION};
pub use record::{
    AuthorId, HeadRecord, LocalRecord, Revision, RevisionText, ServerRecord, SubmittedRecord,
    TailRecord,
};
pub use server::{DocumentHub, DocumentRecords, HubStats, Outcome};
pub use service::{HistoryMode, Service, ServiceEvent, ServiceEventKind, ServiceSnapshot};
