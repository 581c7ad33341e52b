//! Property-based tests using proptest
//!
//! These tests verify engine invariants across generated inputs:
//! determinism, rollback exactness, and longest-match arbitration.

use peglog::prelude::*;
use proptest::prelude::*;
use std::rc::Rc;

fn opts() -> ParseOptions {
    ParseOptions::new()
}

/// A grammar that pushes one value per matched letter.
fn letters(g: &mut Grammar) -> NodeId {
    let letter = g.char_pred("letter", |c| c.is_ascii_lowercase());
    let push = g.collect(letter, false, |ctx: &mut ParseContext, scope: &ActionScope| {
        ctx.push(Rc::new(scope.start));
    });
    g.repeat(push, 1, false)
}

proptest! {
    /// Running the same grammar over the same input twice gives the same
    /// observable outcome.
    #[test]
    fn prop_run_is_deterministic(input in "[ab]{0,12}") {
        let mut g = Grammar::new();
        let a = g.string("ab");
        let b = g.string("a");
        let item = g.choice([a, b]);
        let root = g.repeat(item, 0, false);

        let first = g.run(root, input.as_str(), &opts()).unwrap();
        let second = g.run(root, input.as_str(), &opts()).unwrap();
        prop_assert_eq!(first.success, second.success);
        prop_assert_eq!(first.match_len, second.match_len);
        prop_assert_eq!(first.error_pos, second.error_pos);
        prop_assert_eq!(first.values.len(), second.values.len());
    }

    /// A failing parse rolls back every effect: no values survive.
    #[test]
    fn prop_failed_parse_leaves_no_values(input in "[a-z]{1,10}") {
        let mut g = Grammar::new();
        let word = letters(&mut g);
        let terminator = g.string("!");
        let root = g.seq([word, terminator]);

        let result = g.run(root, input.as_str(), &opts()).unwrap();
        prop_assert!(!result.success);
        prop_assert!(result.values.is_empty());
    }

    /// A successful parse pushes exactly one value per consumed letter.
    #[test]
    fn prop_success_pushes_per_element(input in "[a-z]{1,10}") {
        let mut g = Grammar::new();
        let root = letters(&mut g);
        let result = g.run(root, input.as_str(), &opts()).unwrap();
        prop_assert!(result.full_match);
        prop_assert_eq!(result.values.len(), input.chars().count());
    }

    /// Longest always consumes at least as much as ordered choice over the
    /// same alternatives, and exactly as much as the longest matching one.
    #[test]
    fn prop_longest_dominates_choice(input in "a{0,6}") {
        let mut g = Grammar::new();
        let one = g.string("a");
        let three = g.string("aaa");
        let choice = g.choice([one, three]);
        let longest = g.longest([one, three]);

        let c = g.run(choice, input.as_str(), &opts()).unwrap();
        let l = g.run(longest, input.as_str(), &opts()).unwrap();
        prop_assert_eq!(c.success, l.success);
        if l.success {
            prop_assert!(l.match_len >= c.match_len);
            let expected = if input.len() >= 3 { 3 } else if input.is_empty() { 0 } else { 1 };
            prop_assert_eq!(l.match_len, expected);
        }
    }

    /// Memoized and unmemoized parses agree.
    #[test]
    fn prop_memo_is_transparent(input in "[ab]{0,10}") {
        let mut g = Grammar::new();
        let a = g.string("ab");
        let plain_item = g.choice([a]);
        let plain = g.repeat(plain_item, 0, false);

        let memoed = g.memo(a, MemoStrategy::Table, None);
        let memo_item = g.choice([memoed]);
        let cached = g.repeat(memo_item, 0, false);

        let p = g.run(plain, input.as_str(), &opts()).unwrap();
        let c = g.run(cached, input.as_str(), &opts()).unwrap();
        prop_assert_eq!(p.success, c.success);
        prop_assert_eq!(p.match_len, c.match_len);
    }
}
