//! Sequential operation form used internally by compose, follow and inverse.
//!
//! A changeset stores range strips; the transformation algorithms are far
//! simpler over a run-length stream of retain/delete/insert that walks the
//! source text left to right. `Changeset::to_ops` and `Changeset::from_ops`
//! convert between the two.

use crate::text::{byte_offset, char_len};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Retain(usize),
    Delete(usize),
    Insert(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpKind {
    Retain,
    Delete,
    Insert,
}

impl Op {
    pub(crate) fn len(&self) -> usize {
        match self {
            Op::Retain(n) | Op::Delete(n) => *n,
            Op::Insert(text) => char_len(text),
        }
    }

    pub(crate) fn kind(&self) -> OpKind {
        match self {
            Op::Retain(_) => OpKind::Retain,
            Op::Delete(_) => OpKind::Delete,
            Op::Insert(_) => OpKind::Insert,
        }
    }
}

/// Appends `op`, merging it into the previous op when both are the same kind.
pub(crate) fn push_op(ops: &mut Vec<Op>, op: Op) {
    if op.len() == 0 {
        return;
    }
    if let Some(last) = ops.last_mut() {
        match (last, &op) {
            (Op::Retain(n), Op::Retain(m)) | (Op::Delete(n), Op::Delete(m)) => {
                *n += m;
                return;
            }
            (Op::Insert(prev), Op::Insert(text)) => {
                prev.push_str(text);
                return;
            }
            _ => {}
        }
    }
    ops.push(op);
}

/// A stream of ops whose head can be consumed partially.
pub(crate) struct OpStream {
    rest: std::vec::IntoIter<Op>,
    head: Option<Op>,
}

impl OpStream {
    pub(crate) fn new(ops: Vec<Op>) -> Self {
        let mut rest = ops.into_iter();
        let head = rest.next();
        Self { rest, head }
    }

    pub(crate) fn kind(&self) -> Option<OpKind> {
        self.head.as_ref().map(Op::kind)
    }

    pub(crate) fn head_len(&self) -> usize {
        self.head.as_ref().map_or(0, Op::len)
    }

    /// Removes and returns the whole head op.
    pub(crate) fn next_op(&mut self) -> Option<Op> {
        let head = self.head.take();
        self.head = self.rest.next();
        head
    }

    /// Removes and returns the first `n` units of the head op, splitting it
    /// when it is longer than `n`.
    pub(crate) fn take(&mut self, n: usize) -> Option<Op> {
        if n >= self.head_len() {
            return self.next_op();
        }
        let head = self.head.as_mut()?;
        Some(match head {
            Op::Retain(m) => {
                *m -= n;
                Op::Retain(n)
            }
            Op::Delete(m) => {
                *m -= n;
                Op::Delete(n)
            }
            Op::Insert(text) => {
                let at = byte_offset(text, n);
                let rest = text.split_off(at);
                Op::Insert(std::mem::replace(text, rest))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_op_merges_same_kind() {
        let mut ops = Vec::new();
        push_op(&mut ops, Op::Retain(2));
        push_op(&mut ops, Op::Retain(3));
        push_op(&mut ops, Op::Insert("a".into()));
        push_op(&mut ops, Op::Insert("b".into()));
        push_op(&mut ops, Op::Delete(0));
        assert_eq!(ops, vec![Op::Retain(5), Op::Insert("ab".into())]);
    }

    #[test]
    fn test_stream_take_splits_insert() {
        let mut stream = OpStream::new(vec![Op::Insert("héllo".into()), Op::Retain(4)]);
        assert_eq!(stream.take(2), Some(Op::Insert("hé".into())));
        assert_eq!(stream.head_len(), 3);
        assert_eq!(stream.take(10), Some(Op::Insert("llo".into())));
        assert_eq!(stream.kind(), Some(OpKind::Retain));
        assert_eq!(stream.take(1), Some(Op::Retain(1)));
        assert_eq!(stream.head_len(), 3);
    }
}
