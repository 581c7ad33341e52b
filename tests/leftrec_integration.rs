//! Integration tests for left recursion and expression matching
//!
//! These tests cover:
//! - Seed-growing fixed points for directly left-recursive rules
//! - Left-associative folding through the fixed point
//! - Guarded recursion inside nested constructs
//! - Left- and right-associative expression nodes with step actions

use peglog::prelude::*;
use std::rc::Rc;

fn opts() -> ParseOptions {
    ParseOptions::new()
}

fn text_of(value: &Value) -> String {
    value
        .downcast_ref::<String>()
        .expect("value is not a String")
        .clone()
}

/// Push the matched digit as a one-character string.
fn digit_value(g: &mut Grammar) -> NodeId {
    let digit = g.char_pred("digit", |c| c.is_ascii_digit());
    g.collect(digit, false, |ctx: &mut ParseContext, scope: &ActionScope| {
        if let Input::Text(chars) = &ctx.input {
            ctx.push(Rc::new(chars[scope.start].to_string()));
        }
    })
}

/// Fold the collected items into `(a+b)` style strings.
fn fold_pair(ctx: &mut ParseContext, scope: &ActionScope) {
    let parts: Vec<String> = scope
        .items
        .iter()
        .filter_map(|v| v.downcast_ref::<String>().cloned())
        .collect();
    ctx.push(Rc::new(format!("({})", parts.join("+"))));
}

/// `expr = expr "+" num | num`, folding left-associatively.
fn additive(g: &mut Grammar, num: NodeId) -> NodeId {
    let fwd = g.forward();
    let plus = g.string("+");
    let pair = g.seq([fwd, plus, num]);
    let rec = g.collect(pair, true, fold_pair);
    let body = g.choice([rec, num]);
    let root = g.left_recursive(body);
    g.define_forward(fwd, root).unwrap();
    root
}

// ============================================================================
// Seed Growing
// ============================================================================

#[test]
fn test_left_recursion_matches_full_input() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let root = additive(&mut g, num);
    let result = g.run(root, "1+2+3", &opts()).unwrap();
    assert!(result.full_match);
}

#[test]
fn test_left_recursion_folds_left_associatively() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let root = additive(&mut g, num);
    let result = g.run(root, "1+2+3", &opts()).unwrap();
    assert_eq!(result.values.len(), 1);
    assert_eq!(text_of(&result.values[0]), "((1+2)+3)");
}

#[test]
fn test_left_recursion_seed_alone() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let root = additive(&mut g, num);
    let result = g.run(root, "7", &opts()).unwrap();
    assert!(result.full_match);
    assert_eq!(text_of(&result.values[0]), "7");
}

#[test]
fn test_left_recursion_stops_at_partial_operator() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let root = additive(&mut g, num);
    // The dangling "+" cannot extend the match; the best prior result wins.
    let result = g.run(root, "1+2+", &opts()).unwrap();
    assert!(result.success);
    assert_eq!(result.match_len, 3);
    assert_eq!(text_of(&result.values[0]), "(1+2)");
}

#[test]
fn test_left_recursion_fails_without_seed() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let root = additive(&mut g, num);
    let result = g.run(root, "+1", &opts()).unwrap();
    assert!(!result.success);
}

#[test]
fn test_independent_fixed_points_at_different_positions() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let expr = additive(&mut g, num);
    let semi = g.string(";");
    let stmt = g.seq([expr, semi]);
    let root = g.repeat(stmt, 1, false);
    let result = g.run(root, "1+2;3+4;", &opts()).unwrap();
    assert!(result.full_match);
    assert_eq!(result.values.len(), 2);
    assert_eq!(text_of(&result.values[0]), "(1+2)");
    assert_eq!(text_of(&result.values[1]), "(3+4)");
}

// ============================================================================
// Guarded Recursion
// ============================================================================

#[test]
fn test_guarded_recursion_inside_parentheses() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);

    let expr_fwd = g.forward();
    let open = g.string("(");
    let close = g.string(")");
    let guarded = g.guarded(expr_fwd);
    let group_body = g.seq([open, guarded, close]);
    let group = g.collect(group_body, true, |ctx: &mut ParseContext, scope: &ActionScope| {
        let parts: Vec<String> = scope
            .items
            .iter()
            .filter_map(|v| v.downcast_ref::<String>().cloned())
            .collect();
        ctx.push(Rc::new(format!("[{}]", parts.join(""))));
    });
    let primary = g.choice([num, group]);

    let plus = g.string("+");
    let pair = g.seq([expr_fwd, plus, primary]);
    let rec = g.collect(pair, true, fold_pair);
    let body = g.choice([rec, primary]);
    let expr = g.left_recursive(body);
    g.define_forward(expr_fwd, expr).unwrap();

    let result = g.run(expr, "(1+2)+3", &opts()).unwrap();
    assert!(result.full_match);
    assert_eq!(text_of(&result.values[0]), "([(1+2)]+3)");
}

#[test]
fn test_guard_is_transparent_for_plain_parsing() {
    let mut g = Grammar::new();
    let a = g.string("ab");
    let root = g.guarded(a);
    let result = g.run(root, "ab", &opts()).unwrap();
    assert!(result.full_match);
}

// ============================================================================
// Expression Nodes
// ============================================================================

#[test]
fn test_left_expr_folds_immediately() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let minus = g.string("-");
    let root = ExprBuilder::new()
        .operand(num)
        .infix_step(minus, |ctx: &mut ParseContext, scope: &ActionScope| {
            let parts: Vec<String> = scope
                .items
                .iter()
                .filter_map(|v| v.downcast_ref::<String>().cloned())
                .collect();
            ctx.push(Rc::new(format!("({})", parts.join("-"))));
        })
        .build_left(&mut g)
        .unwrap();

    let result = g.run(root, "9-2-1", &opts()).unwrap();
    assert!(result.full_match);
    assert_eq!(result.values.len(), 1);
    assert_eq!(text_of(&result.values[0]), "((9-2)-1)");
}

#[test]
fn test_right_expr_folds_in_reverse() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let caret = g.string("^");
    let root = ExprBuilder::new()
        .operand(num)
        .infix_step(caret, |ctx: &mut ParseContext, scope: &ActionScope| {
            let parts: Vec<String> = scope
                .items
                .iter()
                .filter_map(|v| v.downcast_ref::<String>().cloned())
                .collect();
            ctx.push(Rc::new(format!("({})", parts.join("^"))));
        })
        .build_right(&mut g)
        .unwrap();

    let result = g.run(root, "2^3^4", &opts()).unwrap();
    assert!(result.full_match);
    assert_eq!(result.values.len(), 1);
    assert_eq!(text_of(&result.values[0]), "(2^(3^4))");
}

#[test]
fn test_right_expr_prefix_operators() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let bang = g.string("!");
    let root = ExprBuilder::new()
        .operand(num)
        .affix_step(bang, |ctx: &mut ParseContext, scope: &ActionScope| {
            let parts: Vec<String> = scope
                .items
                .iter()
                .filter_map(|v| v.downcast_ref::<String>().cloned())
                .collect();
            ctx.push(Rc::new(format!("(!{})", parts.join(""))));
        })
        .build_right(&mut g)
        .unwrap();

    let result = g.run(root, "!!5", &opts()).unwrap();
    assert!(result.full_match);
    assert_eq!(text_of(&result.values[0]), "(!(!5))");
}

#[test]
fn test_expr_operator_required() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let minus = g.string("-");
    let root = ExprBuilder::new()
        .operand(num)
        .infix(minus)
        .require_operator()
        .build_left(&mut g)
        .unwrap();

    assert!(g.run(root, "1-2", &opts()).unwrap().success);
    assert!(!g.run(root, "1", &opts()).unwrap().success);
}

#[test]
fn test_expr_builder_validation() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let minus = g.string("-");

    let err = ExprBuilder::new().infix(minus).build_left(&mut g).unwrap_err();
    assert!(matches!(err, GrammarError::MissingOperand { which: "left" }));

    let err = ExprBuilder::new().operand(num).build_left(&mut g).unwrap_err();
    assert!(matches!(err, GrammarError::NoOperators));
}

#[test]
fn test_expr_infix_without_operand_backtracks() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let minus = g.string("-");
    let root = ExprBuilder::new()
        .operand(num)
        .infix(minus)
        .build_left(&mut g)
        .unwrap();

    // "3-" matches "3"; the dangling operator is not consumed.
    let result = g.run(root, "3-", &opts()).unwrap();
    assert!(result.success);
    assert_eq!(result.match_len, 1);
}

#[test]
fn test_right_expr_dangling_operator_backtracks() {
    let mut g = Grammar::new();
    let num = digit_value(&mut g);
    let caret = g.string("^");
    let root = ExprBuilder::new()
        .operand(num)
        .infix_step(caret, |ctx: &mut ParseContext, scope: &ActionScope| {
            let parts: Vec<String> = scope
                .items
                .iter()
                .filter_map(|v| v.downcast_ref::<String>().cloned())
                .collect();
            ctx.push(Rc::new(format!("({})", parts.join("^"))));
        })
        .build_right(&mut g)
        .unwrap();

    // "2^3^" matches "2^3": the chain unwinds its last pair so the final
    // operand lands where the dangling operator began.
    let result = g.run(root, "2^3^", &opts()).unwrap();
    assert!(result.success);
    assert_eq!(result.match_len, 3);
    assert_eq!(result.values.len(), 1);
    assert_eq!(text_of(&result.values[0]), "(2^3)");
}
