//! Char-indexed helpers over `str`.
//!
//! Every position and length in this crate counts Unicode scalar values.
//! These helpers translate those positions into byte offsets.

/// Number of chars in `text`.
#[inline]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the `n`th char, or `text.len()` when `n` is past the end.
#[inline]
pub fn byte_offset(text: &str, n: usize) -> usize {
    text.char_indices().nth(n).map_or(text.len(), |(i, _)| i)
}

/// The chars `start..end` of `text`.
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let from = byte_offset(text, start);
    let to = from + byte_offset(&text[from..], end.saturating_sub(start));
    &text[from..to]
}

/// Byte offsets of every char boundary, including the final one.
///
/// Lets a caller slice many ranges out of the same text in O(1) each.
pub(crate) fn char_boundaries(text: &str) -> Vec<usize> {
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    offsets.push(text.len());
    offsets
}
