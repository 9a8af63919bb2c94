use tandem_core::Changeset;

use crate::error::Result;

/// Append-only log of view deltas addressed by absolute index.
///
/// Index `i` names the view text after the `i`-th delta. Entries below
/// `offset` have been pruned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewLog {
    offset: usize,
    /// `(changeset, inverse)` pairs, oldest first.
    entries: Vec<(Changeset, Changeset)>,
}

impl ViewLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty log whose first delta will produce index `offset + 1`.
    pub fn starting_at(offset: usize) -> Self {
        Self {
            offset,
            entries: Vec::new(),
        }
    }

    /// Oldest index still reconstructable.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Index of the current view text.
    pub fn end(&self) -> usize {
        self.offset + self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a delta and returns the index of the text it produced.
    pub fn push(&mut self, changeset: Changeset, inverse: Changeset) -> usize {
        self.entries.push((changeset, inverse));
        self.end()
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.offset && index <= self.end()
    }

    /// The view text at `index`, rebuilt backward from `current`.
    pub fn text_at(&self, index: usize, current: &str) -> Result<Option<String>> {
        if !self.contains(index) {
            return Ok(None);
        }
        let mut text = current.to_owned();
        for (_, inverse) in self.entries[index - self.offset..].iter().rev() {
            text = inverse.apply(&text)?;
        }
        Ok(Some(text))
    }

    /// Every delta after `index` composed into one changeset.
    pub fn changes_since(&self, index: usize) -> Result<Option<Changeset>> {
        if !self.contains(index) {
            return Ok(None);
        }
        let mut deltas = self.entries[index - self.offset..].iter().map(|(c, _)| c);
        let Some(first) = deltas.next() else {
            return Ok(None);
        };
        let mut composed = first.clone();
        for delta in deltas {
            composed = composed.compose(delta)?;
        }
        Ok(Some(composed))
    }

    /// Drops entries below `new_offset`.
    pub fn prune_to(&mut self, new_offset: usize) {
        let new_offset = new_offset.min(self.end());
        if new_offset <= self.offset {
            return;
        }
        self.entries.drain(..new_offset - self.offset);
        self.offset = new_offset;
    }
}
