//! Caret and range selections that follow concurrent edits.

use crate::changeset::{Bias, Changeset};

/// A selection `start..end` in char positions.
///
/// `start == end` is a collapsed selection (a caret). Serializes through
/// the compact encoding (`"3"`, `"2,7"`); decoding orders the endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    /// Creates a selection, ordering the endpoints.
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// A collapsed selection at `position`.
    pub fn caret(position: usize) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }

    /// Repositions the selection across `changeset`.
    ///
    /// A caret uses `bias` when text is inserted exactly at it. A range keeps
    /// text inserted on its boundaries outside: its start moves right and its
    /// end stays left.
    pub fn follow(&self, changeset: &Changeset, bias: Bias) -> Self {
        if self.is_collapsed() {
            return Self::caret(changeset.map_position(self.start, bias));
        }
        let start = changeset.map_position(self.start, Bias::Right);
        let end = changeset.map_position(self.end, Bias::Left);
        Self::new(start, end.max(start))
    }

    /// Clamps both endpoints into `0..=length`.
    pub fn clamp(&self, length: usize) -> Self {
        Self::new(self.start.min(length), self.end.min(length))
    }

    /// Resolves possibly negative endpoints, counted back from `length`.
    pub fn clamp_signed(start: i64, end: i64, length: usize) -> Self {
        let resolve = |value: i64| -> usize {
            if value < 0 {
                let back = usize::try_from(value.unsigned_abs()).unwrap_or(usize::MAX);
                length.saturating_sub(back)
            } else {
                usize::try_from(value).unwrap_or(usize::MAX).min(length)
            }
        };
        Self::new(resolve(start), resolve(end))
    }
}
