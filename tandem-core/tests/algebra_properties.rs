//! Property tests for the changeset algebra.
//!
//! Verifies, for randomly generated texts and concurrent edits:
//! - inverse undoes a changeset exactly
//! - follow converges regardless of which edit the server saw first
//! - compose agrees with applying changesets one after another
//! - selections stay inside the text they follow into

use proptest::prelude::*;
use tandem_core::text::char_len;
use tandem_core::{Bias, Changeset, ChangesetBuilder, Selection};

/// A random edit over a text of `len` chars.
fn edit(len: usize) -> impl Strategy<Value = Changeset> {
    prop::collection::vec((0u8..3, 1usize..4, "[x-zü]{1,3}"), 0..6).prop_map(move |steps| {
        let mut builder = ChangesetBuilder::new();
        let mut remaining = len;
        for (kind, n, text) in steps {
            match kind {
                0 => {
                    let n = n.min(remaining);
                    builder.retain(n);
                    remaining -= n;
                }
                1 => {
                    let n = n.min(remaining);
                    builder.delete(n);
                    remaining -= n;
                }
                _ => {
                    builder.insert(&text);
                }
            }
        }
        builder.retain(remaining);
        builder.finish(len).unwrap()
    })
}

/// A base text with two concurrent edits over it.
fn concurrent_edits() -> impl Strategy<Value = (String, Changeset, Changeset, bool)> {
    "[a-cé]{0,12}".prop_flat_map(|text| {
        let len = char_len(&text);
        (Just(text), edit(len), edit(len), any::<bool>())
    })
}

proptest! {
    #[test]
    fn prop_inverse_restores_base((text, a, _b, _bias) in concurrent_edits()) {
        let changed = a.apply(&text).unwrap();
        let inverse = a.inverse(&text).unwrap();
        prop_assert_eq!(inverse.apply(&changed).unwrap(), text.clone());

        let round_trip = a.compose(&inverse).unwrap();
        prop_assert!(round_trip.is_no_op(&text).unwrap());
    }

    #[test]
    fn prop_follow_converges((text, a, b, bias) in concurrent_edits()) {
        let a_then_b = b.follow(&a, !bias).unwrap().apply(&a.apply(&text).unwrap()).unwrap();
        let b_then_a = a.follow(&b, bias).unwrap().apply(&b.apply(&text).unwrap()).unwrap();
        prop_assert_eq!(a_then_b, b_then_a);
    }

    #[test]
    fn prop_compose_matches_sequential_apply((text, a, b, bias) in concurrent_edits()) {
        let b_after_a = b.follow(&a, bias).unwrap();
        let composed = a.compose(&b_after_a).unwrap();
        let sequential = b_after_a.apply(&a.apply(&text).unwrap()).unwrap();
        prop_assert_eq!(composed.apply(&text).unwrap(), sequential);
        prop_assert_eq!(composed.input_length(), a.input_length());
        prop_assert_eq!(composed.output_length(), b_after_a.output_length());
    }

    #[test]
    fn prop_compose_is_associative((text, a, b, bias) in concurrent_edits()) {
        let b2 = b.follow(&a, bias).unwrap();
        let inverse = a.compose(&b2).unwrap().inverse(&text).unwrap();
        let left = a.compose(&b2).unwrap().compose(&inverse).unwrap();
        let right = a.compose(&b2.compose(&inverse).unwrap()).unwrap();
        prop_assert_eq!(left.apply(&text).unwrap(), right.apply(&text).unwrap());
    }

    #[test]
    fn prop_encoding_is_lossless((text, a, _b, _bias) in concurrent_edits()) {
        let inverse = a.inverse(&text).unwrap();
        for changeset in [a, inverse] {
            let parsed: Changeset = changeset.to_string().parse().unwrap();
            prop_assert_eq!(parsed, changeset);
        }
    }

    #[test]
    fn prop_selection_stays_in_bounds(
        (text, a, _b, _bias) in concurrent_edits(),
        start in 0usize..16,
        end in 0usize..16,
    ) {
        let len = char_len(&text);
        let selection = Selection::new(start, end).clamp(len);
        for bias in [Bias::Left, Bias::Right] {
            let moved = selection.follow(&a, bias);
            prop_assert!(moved.start <= moved.end);
            prop_assert!(moved.end <= a.output_length());
        }
    }
}
