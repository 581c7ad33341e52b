//! Integration tests for the well-formedness checker and hard failures
//!
//! These tests cover:
//! - Rejection of unmanaged left recursion and nullable repetitions
//! - The recursion guard when checking is disabled
//! - Unresolved forward references
//! - Report rendering and serialization

use peglog::prelude::*;

fn opts() -> ParseOptions {
    ParseOptions::new()
}

fn left_recursive_grammar() -> (Grammar, NodeId) {
    let mut g = Grammar::new();
    let fwd = g.forward();
    let plus = g.string("+");
    let num = g.char_pred("digit", |c| c.is_ascii_digit());
    let rec = g.seq([fwd, plus, num]);
    let root = g.choice([rec, num]);
    g.define_forward(fwd, root).unwrap();
    (g, root)
}

// ============================================================================
// Pre-Parse Checking
// ============================================================================

#[test]
fn test_run_rejects_unmanaged_left_recursion() {
    let (g, root) = left_recursive_grammar();
    let err = g.run(root, "1+2", &opts()).unwrap_err();
    match err {
        EngineError::Malformed(report) => {
            assert!(!report.left_recursive_cycles.is_empty());
            assert!(report.nullable_repetitions.is_empty());
        }
        other => panic!("expected Malformed, got {}", other),
    }
}

#[test]
fn test_run_rejects_nullable_repetition() {
    let mut g = Grammar::new();
    let x = g.string("x");
    let maybe = g.opt(x);
    let root = g.repeat(maybe, 0, false);
    let err = g.run(root, "xx", &opts()).unwrap_err();
    match err {
        EngineError::Malformed(report) => {
            assert_eq!(report.nullable_repetitions, vec![root]);
        }
        other => panic!("expected Malformed, got {}", other),
    }
}

#[test]
fn test_guard_trips_when_checking_disabled() {
    let (g, root) = left_recursive_grammar();
    let err = g
        .run(root, "1+2", &opts().without_check().with_max_depth(64))
        .unwrap_err();
    match err {
        EngineError::RecursionOverflow { depth, .. } => assert_eq!(depth, 64),
        other => panic!("expected RecursionOverflow, got {}", other),
    }
}

#[test]
fn test_error_display_mentions_malformed_grammar() {
    let (g, root) = left_recursive_grammar();
    let err = g
        .run(root, "1", &opts().without_check().with_max_depth(16))
        .unwrap_err();
    assert!(err.to_string().contains("likely malformed"));
}

#[test]
fn test_managed_left_recursion_is_accepted() {
    let mut g = Grammar::new();
    let fwd = g.forward();
    let plus = g.string("+");
    let num = g.char_pred("digit", |c| c.is_ascii_digit());
    let rec = g.seq([fwd, plus, num]);
    let body = g.choice([rec, num]);
    let root = g.left_recursive(body);
    g.define_forward(fwd, root).unwrap();

    let result = g.run(root, "1+2", &opts()).unwrap();
    assert!(result.full_match);
}

// ============================================================================
// Forward References
// ============================================================================

#[test]
fn test_unresolved_forward_reference_is_an_error() {
    let mut g = Grammar::new();
    let fwd = g.forward();
    let a = g.string("a");
    let root = g.seq([a, fwd]);
    let err = g.run(root, "ab", &opts()).unwrap_err();
    assert!(matches!(err, EngineError::Unresolved { node } if node == fwd));
}

// ============================================================================
// Reports
// ============================================================================

#[test]
fn test_check_without_running() {
    let (g, root) = left_recursive_grammar();
    let report = check(&g, root);
    assert!(!report.is_well_formed());
    let rendered = report.to_string();
    assert!(rendered.contains("left recursion"));
    let json = report.to_json().unwrap();
    assert!(json.contains("left_recursive_cycles"));
}

#[test]
fn test_clean_grammar_report_is_empty() {
    let mut g = Grammar::new();
    let a = g.string("a");
    let root = g.repeat(a, 0, false);
    let report = check(&g, root);
    assert!(report.is_well_formed());
    assert_eq!(report.to_string(), "grammar is well-formed");
}
