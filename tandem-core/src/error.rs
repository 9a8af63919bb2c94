//! Error types for the changeset algebra.

use thiserror::Error;

/// Errors raised by changeset and selection operations.
///
/// Every fallible algebra operation either returns a fully valid result or
/// one of these errors; no operation leaves a partially built value behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangesetError {
    /// A changeset or selection has a malformed shape (overlapping or
    /// descending ranges, ranges past the declared input length, ...).
    #[error("invalid changeset: {0}")]
    Validation(String),

    /// Two operands cannot be combined because their lengths disagree.
    #[error("{context}: expected length {expected}, got {actual}")]
    Composability {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl ChangesetError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn composability(context: &'static str, expected: usize, actual: usize) -> Self {
        Self::Composability {
            context,
            expected,
            actual,
        }
    }
}

/// Errors raised while parsing the compact text encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { offset: usize, found: char },
    #[error("number out of range at offset {0}")]
    NumberOverflow(usize),
    #[error(transparent)]
    Invalid(#[from] ChangesetError),
}
