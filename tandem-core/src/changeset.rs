//! The changeset algebra: apply, compose, inverse and follow.
//!
//! A [`Changeset`] transforms a source text of a fixed length into a new
//! text. Retained ranges point into the source, inserted text is carried
//! literally, and anything not retained is deleted.
//!
//! ```text
//!  source   h e l l o _ w o r l d
//!           └──┬──┘     └───┬───┘
//!  strips   =0,3  +2:"y!"  =6,11       →  "hely!world"
//! ```
//!
//! The three algebraic operations:
//! - `compose(A, B)`: apply A then B as one changeset
//! - `inverse(A, T)`: undo A, given the text A was applied to
//! - `follow(A, B)`: rebase A so it applies after a concurrent B
//!
//! Reference: Ellis & Gibbs, "Concurrency Control in Groupware Systems" (1989)

use crate::error::ChangesetError;
use crate::op::{push_op, Op, OpKind, OpStream};
use crate::strip::Strip;
use crate::text::{char_boundaries, char_len};

type Result<T> = std::result::Result<T, ChangesetError>;

/// How a position sitting exactly on an insertion point is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bias {
    /// Stay before text inserted at the position.
    #[default]
    Left,
    /// Move after text inserted at the position.
    Right,
}

impl Bias {
    pub fn flip(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// An immutable edit over a text of `input_length` chars.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Changeset {
    strips: Vec<Strip>,
    input_length: usize,
    output_length: usize,
}

impl Changeset {
    /// Validates `strips` against `input_length` and normalizes them
    /// (adjacent same-kind strips merged, empty strips dropped).
    pub fn new(strips: Vec<Strip>, input_length: usize) -> Result<Self> {
        validate_strips(&strips, input_length)?;

        let mut builder = ChangesetBuilder::new();
        for strip in strips {
            match strip {
                Strip::Retain { start, end } => {
                    builder.delete(start - builder.position());
                    builder.retain(end - start);
                }
                Strip::Remove { start, end } => {
                    builder.delete(start - builder.position());
                    builder.remove(end - start);
                }
                Strip::Insert(text) => {
                    builder.insert(&text);
                }
            }
        }
        builder.finish(input_length)
    }

    /// The changeset that leaves a text of `length` chars untouched.
    pub fn identity(length: usize) -> Self {
        let mut builder = ChangesetBuilder::new();
        builder.retain(length);
        Self {
            strips: builder.strips,
            input_length: length,
            output_length: length,
        }
    }

    /// Creates `text` from the empty document.
    pub fn from_text(text: &str) -> Self {
        let mut builder = ChangesetBuilder::new();
        builder.insert(text);
        Self {
            strips: builder.strips,
            input_length: 0,
            output_length: builder.output_length,
        }
    }

    /// Inserts `text` at `position` of a text with `input_length` chars.
    pub fn insertion(input_length: usize, position: usize, text: &str) -> Result<Self> {
        Self::replacement(input_length, position, position, text)
    }

    /// Deletes chars `start..end` of a text with `input_length` chars.
    pub fn deletion(input_length: usize, start: usize, end: usize) -> Result<Self> {
        Self::replacement(input_length, start, end, "")
    }

    /// Replaces chars `start..end` with `text`.
    pub fn replacement(input_length: usize, start: usize, end: usize, text: &str) -> Result<Self> {
        if start > end || end > input_length {
            return Err(ChangesetError::validation(format!(
                "range {start}..{end} does not fit a text of length {input_length}"
            )));
        }
        let mut builder = ChangesetBuilder::new();
        builder
            .retain(start)
            .delete(end - start)
            .insert(text)
            .retain(input_length - end);
        builder.finish(input_length)
    }

    pub fn strips(&self) -> &[Strip] {
        &self.strips
    }

    pub fn input_length(&self) -> usize {
        self.input_length
    }

    pub fn output_length(&self) -> usize {
        self.output_length
    }

    /// True when the changeset retains its whole input and inserts nothing.
    pub fn is_identity(&self) -> bool {
        match self.strips.as_slice() {
            [] => self.input_length == 0,
            [Strip::Retain { start: 0, end }] => *end == self.input_length,
            _ => false,
        }
    }

    /// True when applying the changeset to `text` yields `text` again.
    ///
    /// This is weaker than [`is_identity`](Self::is_identity): deleting a
    /// char and inserting the same char back is a no-op but not an identity.
    pub fn is_no_op(&self, text: &str) -> Result<bool> {
        if self.is_identity() {
            return Ok(char_len(text) == self.input_length);
        }
        Ok(self.apply(text)? == text)
    }

    /// Checks the structural invariants of the strips.
    pub fn validate(&self) -> Result<()> {
        validate_strips(&self.strips, self.input_length)?;
        let output: usize = self.strips.iter().map(Strip::output_length).sum();
        if output != self.output_length {
            return Err(ChangesetError::composability(
                "cached output length is stale",
                output,
                self.output_length,
            ));
        }
        Ok(())
    }

    /// Fails unless `self` can be followed by `other`.
    pub fn assert_is_composable(&self, other: &Changeset) -> Result<()> {
        if self.output_length != other.input_length {
            return Err(ChangesetError::composability(
                "changesets are not composable",
                self.output_length,
                other.input_length,
            ));
        }
        Ok(())
    }

    /// Applies the changeset to `text`.
    pub fn apply(&self, text: &str) -> Result<String> {
        let bounds = char_boundaries(text);
        let length = bounds.len() - 1;
        if length != self.input_length {
            return Err(ChangesetError::composability(
                "text does not match changeset input",
                self.input_length,
                length,
            ));
        }

        let mut out = String::with_capacity(text.len());
        for strip in &self.strips {
            match strip {
                Strip::Retain { start, end } => out.push_str(&text[bounds[*start]..bounds[*end]]),
                Strip::Insert(inserted) => out.push_str(inserted),
                Strip::Remove { .. } => {}
            }
        }
        Ok(out)
    }

    /// `self` followed by `other`, as a single changeset.
    pub fn compose(&self, other: &Changeset) -> Result<Changeset> {
        self.assert_is_composable(other)?;

        let mut a = OpStream::new(self.to_ops());
        let mut b = OpStream::new(other.to_ops());
        let mut ops = Vec::new();

        loop {
            match (a.kind(), b.kind()) {
                (None, None) => break,
                // Deleted by A: B never sees these chars.
                (Some(OpKind::Delete), _) => push_some(&mut ops, a.next_op()),
                // Inserted by B: A never sees these chars.
                (_, Some(OpKind::Insert)) => push_some(&mut ops, b.next_op()),
                (Some(_), Some(kind)) => {
                    let n = a.head_len().min(b.head_len());
                    let left = a.take(n);
                    b.take(n);
                    match (left, kind) {
                        (Some(Op::Retain(m)), OpKind::Retain) => push_op(&mut ops, Op::Retain(m)),
                        (Some(Op::Retain(m)), OpKind::Delete) => push_op(&mut ops, Op::Delete(m)),
                        (Some(Op::Insert(text)), OpKind::Retain) => {
                            push_op(&mut ops, Op::Insert(text))
                        }
                        // Inserted by A, then deleted by B.
                        _ => {}
                    }
                }
                (None, Some(_)) | (Some(_), None) => {
                    return Err(ChangesetError::composability(
                        "compose ran out of operations",
                        self.output_length,
                        other.input_length,
                    ));
                }
            }
        }

        Self::from_ops(ops, self.input_length)
    }

    /// The changeset undoing `self`, given the `base` text it applies to.
    ///
    /// Inserted spans become `Remove` strips and deleted spans are re-inserted
    /// from `base`.
    pub fn inverse(&self, base: &str) -> Result<Changeset> {
        let bounds = char_boundaries(base);
        let length = bounds.len() - 1;
        if length != self.input_length {
            return Err(ChangesetError::composability(
                "inverse base text does not match changeset input",
                self.input_length,
                length,
            ));
        }

        let mut builder = ChangesetBuilder::new();
        let mut source = 0;
        for op in self.to_ops() {
            match op {
                Op::Retain(n) => {
                    builder.retain(n);
                    source += n;
                }
                Op::Insert(text) => {
                    builder.remove(char_len(&text));
                }
                Op::Delete(n) => {
                    builder.insert(&base[bounds[source]..bounds[source + n]]);
                    source += n;
                }
            }
        }
        builder.finish(self.output_length)
    }

    /// Rebases `self` to apply after `other`, both derived from the same text.
    ///
    /// For any base `T`: `T∘A∘follow(B, A, !bias) == T∘B∘follow(A, B, bias)`.
    /// With `insert_bias` set, text inserted by `self` ends up left of text
    /// inserted by `other` at the same position.
    pub fn follow(&self, other: &Changeset, insert_bias: bool) -> Result<Changeset> {
        if self.input_length != other.input_length {
            return Err(ChangesetError::composability(
                "follow requires changesets over the same text",
                self.input_length,
                other.input_length,
            ));
        }

        let mut a = OpStream::new(self.to_ops());
        let mut b = OpStream::new(other.to_ops());
        let mut ops = Vec::new();

        loop {
            match (a.kind(), b.kind()) {
                (None, None) => break,
                (Some(OpKind::Insert), Some(OpKind::Insert)) if !insert_bias => {
                    push_op(&mut ops, Op::Retain(b.head_len()));
                    b.next_op();
                }
                (Some(OpKind::Insert), _) => push_some(&mut ops, a.next_op()),
                (_, Some(OpKind::Insert)) => {
                    push_op(&mut ops, Op::Retain(b.head_len()));
                    b.next_op();
                }
                (Some(_), Some(kind)) => {
                    let n = a.head_len().min(b.head_len());
                    let left = a.take(n);
                    b.take(n);
                    match (left, kind) {
                        (Some(Op::Retain(m)), OpKind::Retain) => push_op(&mut ops, Op::Retain(m)),
                        (Some(Op::Delete(m)), OpKind::Retain) => push_op(&mut ops, Op::Delete(m)),
                        // Already deleted by `other`.
                        _ => {}
                    }
                }
                (None, Some(_)) | (Some(_), None) => {
                    return Err(ChangesetError::composability(
                        "follow ran out of operations",
                        self.input_length,
                        other.input_length,
                    ));
                }
            }
        }

        Self::from_ops(ops, other.output_length)
    }

    /// Maps a source position to the corresponding output position.
    ///
    /// Positions inside a deleted span collapse onto the deletion point.
    pub fn map_position(&self, position: usize, bias: Bias) -> usize {
        let mut old = 0;
        let mut new = 0;
        for op in self.to_ops() {
            match op {
                Op::Retain(n) => {
                    if position < old + n {
                        return new + (position - old);
                    }
                    old += n;
                    new += n;
                }
                Op::Delete(n) => {
                    if position < old + n {
                        return new;
                    }
                    old += n;
                }
                Op::Insert(text) => {
                    if old == position && bias == Bias::Left {
                        return new;
                    }
                    new += char_len(&text);
                }
            }
        }
        new
    }

    /// Run-length op form over the source text, inserts ahead of deletes at
    /// the same position.
    pub(crate) fn to_ops(&self) -> Vec<Op> {
        let mut ops = Vec::with_capacity(self.strips.len() + 1);
        let mut cursor = 0;
        for strip in &self.strips {
            match strip {
                Strip::Retain { start, end } => {
                    push_op(&mut ops, Op::Delete(start - cursor));
                    push_op(&mut ops, Op::Retain(end - start));
                    cursor = *end;
                }
                Strip::Remove { start: _, end } => {
                    push_op(&mut ops, Op::Delete(end - cursor));
                    cursor = *end;
                }
                Strip::Insert(text) => push_op(&mut ops, Op::Insert(text.clone())),
            }
        }
        push_op(&mut ops, Op::Delete(self.input_length - cursor));
        ops
    }

    pub(crate) fn from_ops(ops: Vec<Op>, input_length: usize) -> Result<Self> {
        let mut builder = ChangesetBuilder::new();
        for op in ops {
            match op {
                Op::Retain(n) => builder.retain(n),
                Op::Delete(n) => builder.delete(n),
                Op::Insert(text) => builder.insert(&text),
            };
        }
        builder.finish(input_length)
    }
}

fn push_some(ops: &mut Vec<Op>, op: Option<Op>) {
    if let Some(op) = op {
        push_op(ops, op);
    }
}

fn validate_strips(strips: &[Strip], input_length: usize) -> Result<()> {
    let mut cursor = 0;
    for (i, strip) in strips.iter().enumerate() {
        let Some((start, end)) = strip.source_range() else {
            continue;
        };
        if start > end {
            return Err(ChangesetError::validation(format!(
                "strip {i} starts at {start}, after its end {end}"
            )));
        }
        if start < cursor {
            return Err(ChangesetError::validation(format!(
                "strip {i} starts at {start}, inside the previous range ending at {cursor}"
            )));
        }
        if end > input_length {
            return Err(ChangesetError::validation(format!(
                "strip {i} ends at {end}, past input length {input_length}"
            )));
        }
        cursor = end;
    }
    Ok(())
}

/// Builds a changeset by walking the source text left to right.
///
/// ```
/// use tandem_core::ChangesetBuilder;
///
/// let mut builder = ChangesetBuilder::new();
/// builder.retain(5).insert(",").retain(6);
/// let changeset = builder.finish(11).unwrap();
/// assert_eq!(changeset.apply("hello world").unwrap(), "hello, world");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChangesetBuilder {
    strips: Vec<Strip>,
    cursor: usize,
    output_length: usize,
}

impl ChangesetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source position the next op starts at.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Keeps the next `n` source chars.
    pub fn retain(&mut self, n: usize) -> &mut Self {
        if n == 0 {
            return self;
        }
        let cursor = self.cursor;
        match self.strips.last_mut() {
            Some(Strip::Retain { end, .. }) if *end == cursor => *end += n,
            _ => self.strips.push(Strip::Retain {
                start: cursor,
                end: cursor + n,
            }),
        }
        self.cursor += n;
        self.output_length += n;
        self
    }

    /// Drops the next `n` source chars without leaving a marker.
    pub fn delete(&mut self, n: usize) -> &mut Self {
        self.cursor += n;
        self
    }

    /// Drops the next `n` source chars, recording an explicit `Remove`.
    pub fn remove(&mut self, n: usize) -> &mut Self {
        if n == 0 {
            return self;
        }
        let cursor = self.cursor;
        match self.strips.last_mut() {
            Some(Strip::Remove { end, .. }) if *end == cursor => *end += n,
            _ => self.strips.push(Strip::Remove {
                start: cursor,
                end: cursor + n,
            }),
        }
        self.cursor += n;
        self
    }

    /// Emits `text` at the current position.
    pub fn insert(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        self.output_length += char_len(text);
        match self.strips.last_mut() {
            Some(Strip::Insert(prev)) => prev.push_str(text),
            _ => self.strips.push(Strip::Insert(text.to_owned())),
        }
        self
    }

    /// Finishes the changeset; source chars past the last op are deleted.
    pub fn finish(self, input_length: usize) -> Result<Changeset> {
        if self.cursor > input_length {
            return Err(ChangesetError::composability(
                "builder walked past the end of its input",
                input_length,
                self.cursor,
            ));
        }
        Ok(Changeset {
            strips: self.strips,
            input_length,
            output_length: self.output_length,
        })
    }
}
