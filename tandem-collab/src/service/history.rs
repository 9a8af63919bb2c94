//! Undo/redo stack entries and their bounded cleanup.

use serde::{Deserialize, Serialize};
use tandem_core::{Bias, Changeset, Selection};

use crate::error::Result;
use crate::facade::ServerFacade;
use crate::record::Revision;

/// How a local edit enters the undo history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistoryMode {
    /// New undo entry; clears redo.
    #[default]
    Yes,
    /// Folded into the most recent undo entry.
    Merge,
    /// Never undoable; recorded as an external change on the stack tops.
    No,
}

/// An undoable edit in view coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEntry {
    pub changeset: Changeset,
    pub inverse: Changeset,
    /// Selection after `changeset`.
    pub selection: Selection,
    /// Selection before `changeset`.
    pub selection_inverse: Selection,
    /// Changes applied to the view since `changeset`, oldest first.
    pub external: Vec<Changeset>,
    /// View log index at which the text right after `changeset` can be
    /// rebuilt. Released when the log is pruned past it.
    #[serde(skip)]
    pub log_index: Option<usize>,
}

impl ViewEntry {
    /// The inverse rebased across the recorded external changes, along with
    /// those changes rebased onto the inverse.
    ///
    /// Applying the returned inverse to the current view undoes `changeset`
    /// while keeping the external changes.
    pub fn rebased_inverse(&self) -> Result<(Changeset, Vec<Changeset>, Selection)> {
        let mut inverse = self.inverse.clone();
        let mut selection = self.selection_inverse;
        let mut rebased_external = Vec::with_capacity(self.external.len());

        for external in &self.external {
            let next_inverse = inverse.follow(external, false)?;
            let next_external = external.follow(&inverse, true)?;
            selection = selection.follow(&next_external, Bias::Left);
            rebased_external.push(next_external);
            inverse = next_inverse;
        }
        Ok((inverse, rebased_external, selection))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryEntry {
    View(ViewEntry),
    /// Undoes server history at or below `revision` (and above
    /// `until_revision`, when set) through the attached facade.
    ServerPointer {
        revision: Revision,
        until_revision: Option<Revision>,
    },
}

impl HistoryEntry {
    pub fn as_view(&self) -> Option<&ViewEntry> {
        match self {
            HistoryEntry::View(entry) => Some(entry),
            HistoryEntry::ServerPointer { .. } => None,
        }
    }

    fn is_pointer(&self) -> bool {
        matches!(self, HistoryEntry::ServerPointer { .. })
    }
}

/// View entries, plus one per contiguous run of server pointers.
pub fn history_size(stack: &[HistoryEntry]) -> usize {
    let mut size = 0;
    let mut in_pointer_run = false;
    for entry in stack {
        match entry {
            HistoryEntry::View(_) => {
                size += 1;
                in_pointer_run = false;
            }
            HistoryEntry::ServerPointer { .. } => {
                if !in_pointer_run {
                    size += 1;
                }
                in_pointer_run = true;
            }
        }
    }
    size
}

/// Records `changeset` as applied on top of the newest entry of `stack`.
pub fn annotate_top(stack: &mut [HistoryEntry], changeset: &Changeset) {
    if let Some(HistoryEntry::View(entry)) = stack.last_mut() {
        entry.external.push(changeset.clone());
    }
}

/// Appends `changes` to the externals of the newest view entry.
pub fn extend_top(stack: &mut [HistoryEntry], changes: impl IntoIterator<Item = Changeset>) {
    if let Some(HistoryEntry::View(entry)) = stack.last_mut() {
        entry.external.extend(changes);
    }
}

/// Drops the oldest entries once the stack is more than `threshold` past
/// `limit`, bringing it back to `limit`. Returns the number removed.
pub fn cleanup(stack: &mut Vec<HistoryEntry>, limit: usize, threshold: usize) -> usize {
    let mut size = history_size(stack);
    if size <= limit + threshold {
        return 0;
    }

    let mut remove = 0;
    while size > limit && remove < stack.len() {
        let entry = &stack[remove];
        let next_is_pointer = stack.get(remove + 1).is_some_and(HistoryEntry::is_pointer);
        // Removing one pointer of a run only shrinks the size at its end.
        if !entry.is_pointer() || !next_is_pointer {
            size -= 1;
        }
        remove += 1;
    }
    stack.drain(..remove);
    remove
}

/// Drops server pointers whose revision the facade no longer holds.
pub fn drop_unreachable_pointers(stack: &mut Vec<HistoryEntry>, facade: &dyn ServerFacade) -> usize {
    let before = stack.len();
    stack.retain(|entry| match entry {
        HistoryEntry::ServerPointer { revision, .. } => {
            let reachable = facade.at(*revision).is_some();
            if !reachable {
                log::warn!("dropping unreachable server pointer at revision {}", revision);
            }
            reachable
        }
        HistoryEntry::View(_) => true,
    });
    before - stack.len()
}

/// Lowest view log index referenced by any entry.
pub fn min_log_index<'a>(stacks: impl IntoIterator<Item = &'a [HistoryEntry]>) -> Option<usize> {
    stacks
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.as_view().and_then(|e| e.log_index))
        .min()
}

/// Clears log references below `offset`.
pub fn release_log_indexes(stack: &mut [HistoryEntry], offset: usize) {
    for entry in stack {
        if let HistoryEntry::View(view) = entry {
            if view.log_index.is_some_and(|i| i < offset) {
                view.log_index = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(text: &str) -> HistoryEntry {
        let changeset = Changeset::insertion(0, 0, text).unwrap();
        HistoryEntry::View(ViewEntry {
            inverse: changeset.inverse("").unwrap(),
            changeset,
            selection: Selection::caret(0),
            selection_inverse: Selection::caret(0),
            external: Vec::new(),
            log_index: None,
        })
    }

    fn pointer(revision: Revision) -> HistoryEntry {
        HistoryEntry::ServerPointer {
            revision,
            until_revision: None,
        }
    }

    #[test]
    fn test_history_size_counts_pointer_runs_once() {
        let stack = vec![pointer(3), pointer(2), view("a"), pointer(9), view("b")];
        assert_eq!(history_size(&stack), 4);
    }

    #[test]
    fn test_cleanup_waits_for_threshold() {
        let mut stack: Vec<_> = (0..6).map(|_| view("x")).collect();
        assert_eq!(cleanup(&mut stack, 4, 2), 0);
        stack.push(view("y"));
        assert_eq!(cleanup(&mut stack, 4, 2), 3);
        assert_eq!(history_size(&stack), 4);
        assert_eq!(stack.last(), Some(&view("y")));
    }

    #[test]
    fn test_cleanup_removes_whole_pointer_run() {
        let mut stack = vec![pointer(5), pointer(4), view("a"), view("b"), view("c")];
        assert_eq!(cleanup(&mut stack, 2, 1), 3);
        assert_eq!(stack, vec![view("b"), view("c")]);
    }

    #[test]
    fn test_rebased_inverse_keeps_external_changes() {
        // "ab" -> "aXb", then someone appends "!" -> "aXb!".
        let changeset = Changeset::insertion(2, 1, "X").unwrap();
        let external = Changeset::insertion(3, 3, "!").unwrap();
        let entry = ViewEntry {
            inverse: changeset.inverse("ab").unwrap(),
            changeset,
            selection: Selection::caret(2),
            selection_inverse: Selection::caret(1),
            external: vec![external],
            log_index: None,
        };

        let (inverse, rebased, selection) = entry.rebased_inverse().unwrap();
        assert_eq!(inverse.apply("aXb!").unwrap(), "ab!");
        assert_eq!(rebased.len(), 1);
        assert_eq!(rebased[0].apply("ab").unwrap(), "ab!");
        assert_eq!(selection, Selection::caret(1));
    }

    #[test]
    fn test_release_log_indexes() {
        let mut stack = vec![view("a"), view("b")];
        if let HistoryEntry::View(v) = &mut stack[0] {
            v.log_index = Some(2);
        }
        if let HistoryEntry::View(v) = &mut stack[1] {
            v.log_index = Some(7);
        }

        assert_eq!(min_log_index([stack.as_slice()]), Some(2));
        release_log_indexes(&mut stack, 5);
        assert_eq!(min_log_index([stack.as_slice()]), Some(7));
    }
}
