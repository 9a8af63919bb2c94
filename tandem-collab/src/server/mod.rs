//! The authoritative side of sync.
//!
//! - `records`: one document's tail, records and head
//! - `reconcile`: rebasing submissions, duplicate detection, tail compaction
//! - `hub`: async multi-document authority with broadcast fan-out

pub mod hub;
pub mod reconcile;
pub mod records;

pub use hub::{DocumentHub, HubStats};
pub use reconcile::{compose_new_tail, create_state_from_records, process_submitted_record, Outcome};
pub use records::DocumentRecords;
