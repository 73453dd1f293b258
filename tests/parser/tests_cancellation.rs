//! Cooperative cancellation and timeouts.

use std::time::Duration;

use canopy::grammars::wren;
use canopy::{ErrorCode, ParseOptions, ParseStatus, Parser, Severity, TextRange, TextSize};
use tokio_util::sync::CancellationToken;

use crate::helpers::source_fixtures::numbered_statements;
use crate::helpers::tree_assertions::{assert_tiles, parse_fresh};

fn cancelled_options() -> ParseOptions {
    let token = CancellationToken::new();
    token.cancel();
    ParseOptions::default().with_cancellation(token).with_check_interval(1)
}

#[test]
fn test_cancelled_parse_returns_partial_tree_covering_input() {
    let text = numbered_statements(200);
    let tree = Parser::new(wren::language())
        .with_options(cancelled_options())
        .parse(&text, None);

    assert_eq!(tree.status(), ParseStatus::Cancelled);
    assert!(tree.is_cancelled());
    assert_tiles(&tree, &text);

    let errors = tree.diagnostics();
    let remainder = errors.last().unwrap();
    assert_eq!(remainder.code, ErrorCode::E0301);
    assert_eq!(remainder.severity, Severity::Warning);
    assert_eq!(remainder.range.end(), TextSize::of(text.as_str()));
}

#[test]
fn test_cancelled_tree_can_seed_a_full_reparse() {
    let text = numbered_statements(50);
    let mut parser = Parser::new(wren::language()).with_options(cancelled_options());
    let partial = parser.parse(&text, None);
    assert!(partial.is_cancelled());

    parser.set_options(ParseOptions::default());
    let full = parser.parse(&text, Some(&partial));
    assert_eq!(full.status(), ParseStatus::Complete);
    assert_eq!(full.to_sexp(), parse_fresh(&text).to_sexp());
    assert!(full.diagnostics().is_empty());
}

#[test]
fn test_token_cancelled_between_parses() {
    let token = CancellationToken::new();
    let options = ParseOptions::default()
        .with_cancellation(token.clone())
        .with_check_interval(1);
    let mut parser = Parser::new(wren::language()).with_options(options);

    let first = parser.parse("var a = 1", None);
    assert_eq!(first.status(), ParseStatus::Complete);

    token.cancel();
    let second = parser.parse("var a = 1", None);
    assert_eq!(second.status(), ParseStatus::Cancelled);
    assert_eq!(second.root_node().byte_range(), TextRange::up_to(TextSize::new(9)));
}

#[test]
fn test_cancellation_from_another_thread() {
    let text = numbered_statements(2000);
    let token = CancellationToken::new();
    let options = ParseOptions::default().with_cancellation(token.clone());

    let canceller = std::thread::spawn(move || token.cancel());
    canceller.join().unwrap();

    let tree = Parser::new(wren::language()).with_options(options).parse(&text, None);
    assert!(tree.is_cancelled());
    assert_tiles(&tree, &text);
}

#[test]
fn test_generous_timeout_completes() {
    let text = numbered_statements(100);
    let options = ParseOptions::default().with_timeout(Duration::from_secs(60));
    let tree = Parser::new(wren::language()).with_options(options).parse(&text, None);
    assert_eq!(tree.status(), ParseStatus::Complete);
    assert_eq!(tree.root_node().named_child_count(), 100);
}

#[test]
fn test_zero_timeout_cancels() {
    let text = numbered_statements(100);
    let options = ParseOptions::default()
        .with_timeout(Duration::ZERO)
        .with_check_interval(1);
    let tree = Parser::new(wren::language()).with_options(options).parse(&text, None);
    assert_eq!(tree.status(), ParseStatus::Cancelled);
    assert_eq!(tree.len(), TextSize::of(text.as_str()));
}
