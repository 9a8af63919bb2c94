//! # tandem-core: operational-transform algebra for plain text
//!
//! The leaf crate of the tandem workspace. Everything that decides how two
//! concurrent edits combine lives here; the sync client and the server in
//! `tandem-collab` only ever call into it.
//!
//! ```text
//!            ┌──────────────┐
//!  text ───► │  Changeset   │ ───► text'
//!            │  Retain/Ins/ │
//!            │  Remove      │
//!            └──────┬───────┘
//!     compose ──────┼────── inverse
//!                   │
//!                follow (OT rebase, insert bias tie-break)
//!                   │
//!            ┌──────▼───────┐
//!            │  Selection   │  carets and ranges follow changesets
//!            └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`strip`]: retain/insert/remove segments
//! - [`changeset`]: compose, inverse, follow, apply, position mapping
//! - [`selection`]: selections that reposition under a changeset
//! - [`codec`]: compact text encoding, also used by serde
//! - [`error`]: validation and composability errors

pub mod changeset;
pub mod codec;
pub mod error;
mod op;
pub mod selection;
pub mod strip;
pub mod text;

pub use changeset::{Bias, Changeset, ChangesetBuilder};
pub use error::{ChangesetError, ParseError};
pub use selection::Selection;
pub use strip::Strip;
