//! Strips: the atomic segments a changeset is made of.

use crate::text::char_len;

/// One segment of a [`Changeset`](crate::Changeset).
///
/// `Retain` and `Remove` address characters of the source text by range;
/// `Insert` carries literal text. Source characters covered by no strip are
/// deleted, so `Remove` is only an explicit marker produced by inverses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strip {
    /// Copy source characters `start..end` to the output.
    Retain { start: usize, end: usize },
    /// Emit new text; consumes no source characters.
    Insert(String),
    /// Consume source characters `start..end` without output.
    Remove { start: usize, end: usize },
}

impl Strip {
    pub fn retain(start: usize, end: usize) -> Self {
        Self::Retain { start, end }
    }

    pub fn insert(text: impl Into<String>) -> Self {
        Self::Insert(text.into())
    }

    pub fn remove(start: usize, end: usize) -> Self {
        Self::Remove { start, end }
    }

    /// Number of source characters this strip consumes.
    pub fn input_length(&self) -> usize {
        match self {
            Self::Retain { start, end } | Self::Remove { start, end } => end - start,
            Self::Insert(_) => 0,
        }
    }

    /// Number of characters this strip produces.
    pub fn output_length(&self) -> usize {
        match self {
            Self::Retain { start, end } => end - start,
            Self::Insert(text) => char_len(text),
            Self::Remove { .. } => 0,
        }
    }

    /// Source range addressed by a `Retain` or `Remove`.
    pub fn source_range(&self) -> Option<(usize, usize)> {
        match self {
            Self::Retain { start, end } | Self::Remove { start, end } => Some((*start, *end)),
            Self::Insert(_) => None,
        }
    }

    /// True when the strip neither consumes nor produces anything.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Retain { start, end } | Self::Remove { start, end } => start == end,
            Self::Insert(text) => text.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_lengths() {
        let retain = Strip::retain(2, 5);
        assert_eq!(retain.input_length(), 3);
        assert_eq!(retain.output_length(), 3);

        let insert = Strip::insert("héllo");
        assert_eq!(insert.input_length(), 0);
        assert_eq!(insert.output_length(), 5);

        let remove = Strip::remove(0, 4);
        assert_eq!(remove.input_length(), 4);
        assert_eq!(remove.output_length(), 0);
    }

    #[test]
    fn test_strip_empty() {
        assert!(Strip::retain(3, 3).is_empty());
        assert!(Strip::insert("").is_empty());
        assert!(!Strip::remove(0, 1).is_empty());
    }
}
