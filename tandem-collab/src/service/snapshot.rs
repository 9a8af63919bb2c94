//! Persisted form of a replica.
//!
//! The view log and the out-of-order queue are not persisted: a restored
//! replica starts with an empty log (so entries can no longer merge across
//! external changes) and re-requests anything it had buffered.

use serde::{Deserialize, Serialize};
use tandem_core::text::char_len;
use tandem_core::Selection;

use super::history::HistoryEntry;
use super::queue::MessageQueue;
use super::state::ServiceState;
use super::view_log::ViewLog;
use crate::error::{CollabError, Result};
use crate::record::{LocalRecord, Revision, SubmittedRecord};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSnapshot {
    pub schema_version: u32,
    pub server_revision: Revision,
    pub server_text: String,
    pub submitted: Option<SubmittedRecord>,
    pub local: Option<LocalRecord>,
    pub selection: Selection,
    pub undo_stack: Vec<HistoryEntry>,
    pub redo_stack: Vec<HistoryEntry>,
}

impl ServiceSnapshot {
    pub fn capture(state: &ServiceState) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            server_revision: state.server_revision,
            server_text: state.server_text.clone(),
            submitted: state.submitted.clone(),
            local: state.local.clone(),
            selection: state.selection,
            undo_stack: state.undo_stack.clone(),
            redo_stack: state.redo_stack.clone(),
        }
    }

    /// Rebuilds a state, checking that every layer and history entry still
    /// composes.
    pub fn restore(self) -> Result<ServiceState> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(CollabError::Serialization(format!(
                "unsupported schema version {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }

        let mut view_text = self.server_text.clone();
        if let Some(submitted) = &self.submitted {
            view_text = submitted.changeset.apply(&view_text)?;
        }
        if let Some(local) = &self.local {
            view_text = local.changeset.apply(&view_text)?;
        }

        for entry in self.undo_stack.iter().chain(&self.redo_stack) {
            if let HistoryEntry::View(view) = entry {
                view.changeset.assert_is_composable(&view.inverse)?;
                view.inverse.assert_is_composable(&view.changeset)?;
            }
        }

        Ok(ServiceState {
            server_revision: self.server_revision,
            selection: self.selection.clamp(char_len(&view_text)),
            server_text: self.server_text,
            submitted: self.submitted,
            local: self.local,
            view_text,
            view_log: ViewLog::new(),
            undo_stack: self.undo_stack,
            redo_stack: self.redo_stack,
            queue: MessageQueue::default(),
            missing: None,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CollabError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CollabError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::Changeset;

    #[test]
    fn test_rejects_unknown_schema() {
        let mut snapshot = ServiceSnapshot::capture(&ServiceState::default());
        snapshot.schema_version = 2;
        assert!(matches!(
            snapshot.restore(),
            Err(CollabError::Serialization(_))
        ));
    }

    #[test]
    fn test_rejects_layer_that_does_not_compose() {
        let mut snapshot = ServiceSnapshot::capture(&ServiceState::default());
        snapshot.server_text = "abc".into();
        snapshot.local = Some(LocalRecord {
            changeset: Changeset::insertion(5, 0, "x").unwrap(),
            selection: Selection::caret(1),
            selection_inverse: Selection::caret(0),
        });
        assert!(snapshot.restore().is_err());
    }

    #[test]
    fn test_json_shape() {
        let mut snapshot = ServiceSnapshot::capture(&ServiceState::default());
        snapshot.server_text = "hi".into();
        snapshot.server_revision = 3;
        let json = snapshot.to_json().unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["server_revision"], 3);

        let restored = ServiceSnapshot::from_json(&json).unwrap().restore().unwrap();
        assert_eq!(restored.view_text(), "hi");
    }
}
