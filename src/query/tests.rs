use rstest::rstest;
use text_size::{TextRange, TextSize};

use super::*;
use crate::base::Edit;
use crate::grammars::wren;
use crate::parser::Parser;
use crate::tree::Tree;

fn parse_wren(text: &str) -> Tree {
    Parser::new(wren::language()).parse(text, None)
}

fn query(source: &str) -> Query {
    Query::new(&wren::language(), source).unwrap()
}

/// Text of every capture, in match order
fn captured(source: &str, text: &str) -> Vec<String> {
    let tree = parse_wren(text);
    let query = query(source);
    QueryCursor::new()
        .captures(&query, tree.root_node(), text)
        .map(|(found, index)| found.captures[index].node.utf8_text(text).to_string())
        .collect()
}

/// Number of captures in each match
fn capture_counts(source: &str, text: &str) -> Vec<usize> {
    let tree = parse_wren(text);
    let query = query(source);
    QueryCursor::new()
        .matches(&query, tree.root_node(), text)
        .map(|found| found.captures.len())
        .collect()
}

const PROGRAM: &str = "var a = 1\nvar b = a + 2\nprint(b)";

// =============================================================================
// Lexing and parsing
// =============================================================================

#[test]
fn test_tokenize() {
    let kinds: Vec<_> = lexer::Lexer::new("(identifier) @id ; note\n#eq? \"a\\\"b\" $")
        .map(|token| token.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            SyntaxKind::L_PAREN,
            SyntaxKind::IDENT,
            SyntaxKind::R_PAREN,
            SyntaxKind::WHITESPACE,
            SyntaxKind::CAPTURE,
            SyntaxKind::WHITESPACE,
            SyntaxKind::COMMENT,
            SyntaxKind::WHITESPACE,
            SyntaxKind::PREDICATE_NAME,
            SyntaxKind::WHITESPACE,
            SyntaxKind::STRING,
            SyntaxKind::WHITESPACE,
            SyntaxKind::ERROR,
        ]
    );
}

#[rstest]
#[case("(var_statement name: (identifier) @name)")]
#[case("[(number) (string)] @literal ; trailing comment")]
#[case("((identifier) @id (#eq? @id \"x\"))")]
#[case("(block . (_)* @s .)")]
#[case("(if_statement !alternative)")]
fn test_parse_is_lossless(#[case] source: &str) {
    let parse = parse(source);
    assert!(parse.ok(), "{:?}", parse.errors);
    assert_eq!(parse.syntax().to_string(), source);
    assert_eq!(parse.syntax().kind(), SyntaxKind::QUERY);
}

#[test]
fn test_parse_recovers() {
    let parse = parse("(identifier :) (number");
    assert!(!parse.ok());
    assert_eq!(parse.syntax().to_string(), "(identifier :) (number");
    assert_eq!(Query::check_syntax("(identifier :) (number").len(), parse.errors.len());
}

// =============================================================================
// Compilation
// =============================================================================

#[test]
fn test_capture_names() {
    let query = query("(var_statement name: (identifier) @name value: (_) @value) (number) @name");
    assert_eq!(query.pattern_count(), 2);
    assert_eq!(query.capture_names().collect::<Vec<_>>(), vec!["name", "value"]);
    assert_eq!(query.capture_index_for_name("value"), Some(1));
    assert_eq!(query.capture_name(0), Some("name"));
    assert_eq!(query.capture_index_for_name("missing"), None);
    assert_eq!(query.start_byte_for_pattern(1), Some(TextSize::new(59)));
    assert_eq!(query.start_byte_for_pattern(2), None);
}

#[rstest]
#[case::syntax("(identifier", QueryErrorKind::Syntax)]
#[case::stray_field("name: (identifier)", QueryErrorKind::Syntax)]
#[case::unknown_kind("(nonexistent)", QueryErrorKind::NodeType)]
#[case::hidden_kind("(_expression)", QueryErrorKind::NodeType)]
#[case::unknown_literal("\"nope\"", QueryErrorKind::NodeType)]
#[case::unknown_field("(var_statement bogus: (identifier))", QueryErrorKind::Field)]
#[case::unknown_negated_field("(var_statement !bogus)", QueryErrorKind::Field)]
#[case::unknown_capture("((identifier) @a (#eq? @b \"x\"))", QueryErrorKind::Capture)]
#[case::unknown_predicate("((identifier) @a (#frobnicate? @a \"x\"))", QueryErrorKind::Predicate)]
#[case::predicate_arity("((identifier) @a (#eq? @a))", QueryErrorKind::Predicate)]
#[case::predicate_outside("(#eq? @a \"x\")", QueryErrorKind::Predicate)]
#[case::invalid_regex("((identifier) @a (#match? @a \"[a-\"))", QueryErrorKind::Predicate)]
fn test_compile_errors(#[case] source: &str, #[case] kind: QueryErrorKind) {
    let error = Query::new(&wren::language(), source).unwrap_err();
    assert_eq!(error.kind, kind);
}

#[test]
fn test_invalid_regex_reports_predicate_offset() {
    let error = Query::new(&wren::language(), "((identifier) @a (#match? @a \"(\"))").unwrap_err();
    assert_eq!(error.kind, QueryErrorKind::Predicate);
    assert_eq!(error.offset, TextSize::new(17));
    assert!(error.to_string().starts_with("E0505 at offset 17: invalid regex in `#match?`"));
}

#[test]
fn test_error_reporting() {
    let error = Query::new(&wren::language(), "(var_statement bogus: (identifier))").unwrap_err();
    assert_eq!(error.offset, TextSize::new(15));
    assert_eq!(error.to_string(), "E0503 at offset 15: unknown field `bogus`");

    let diagnostic = error.to_diagnostic();
    assert_eq!(diagnostic.code, crate::diagnostics::ErrorCode::E0503);
    assert_eq!(diagnostic.range, TextRange::empty(TextSize::new(15)));
}

// =============================================================================
// Matching
// =============================================================================

#[rstest]
#[case::field("(var_statement name: (identifier) @name)", vec!["a", "b"])]
#[case::kind("(number) @n", vec!["1", "2"])]
#[case::literal("\"+\" @op", vec!["+"])]
#[case::literal_field("(binary_expression operator: \"+\" @op)", vec!["+"])]
#[case::alternation("[(number) (identifier)] @x", vec!["a", "1", "b", "a", "2", "print", "b"])]
#[case::nested(
    "(call_expression function: (identifier) @f arguments: (argument_list (identifier) @arg))",
    vec!["print", "b"]
)]
#[case::any_named("(var_statement (_) @child)", vec!["a", "b"])]
#[case::any("(var_statement _ @child)", vec!["var", "var"])]
#[case::eq("((identifier) @id (#eq? @id \"b\"))", vec!["b", "b"])]
#[case::not_eq("((identifier) @id (#not-eq? @id \"b\"))", vec!["a", "a", "print"])]
#[case::match_unanchored("((identifier) @id (#match? @id \"rin\"))", vec!["print"])]
#[case::match_anchored("((identifier) @id (#match? @id \"^[a-z]$\"))", vec!["a", "b", "a", "b"])]
#[case::match_class("((number) @n (#match? @n \"^\\\\d+$\"))", vec!["1", "2"])]
#[case::not_match_anchored("((identifier) @id (#not-match? @id \"^[ab]$\"))", vec!["print"])]
#[case::not_match("((number) @n (#not-match? @n \"1\"))", vec!["2"])]
#[case::captures_compared(
    "(binary_expression left: (_) @l right: (_) @r (#not-eq? @l @r))",
    vec!["a", "2"]
)]
fn test_matches(#[case] source: &str, #[case] expected: Vec<&str>) {
    assert_eq!(captured(source, PROGRAM), expected);
}

#[test]
fn test_match_records_pattern_index() {
    let tree = parse_wren(PROGRAM);
    let query = query("(number) @n (var_statement) @v");
    let found: Vec<_> = QueryCursor::new()
        .matches(&query, tree.root_node(), PROGRAM)
        .map(|found| (found.pattern_index, found.captures[0].node.kind()))
        .collect();
    assert_eq!(
        found,
        vec![(1, "var_statement"), (0, "number"), (1, "var_statement"), (0, "number")]
    );
}

#[rstest]
#[case::one_or_more("(block (expression_statement)+ @s)", "{ a\nb\nc }\n{}", vec![3])]
#[case::zero_or_more("(block (expression_statement)* @s)", "{ a\nb\nc }\n{}", vec![3, 0])]
#[case::optional(
    "(var_statement name: (identifier) @name value: (_)? @value)",
    "var a\nvar b = 1",
    vec![1, 2]
)]
#[case::top_level_repetition("(expression_statement)+ @s", "a\nb\nc", vec![3, 2, 1])]
#[case::sequence("((var_statement) @a (var_statement) @b)", "var a\nvar b\nvar c", vec![2, 2])]
fn test_quantifiers(#[case] source: &str, #[case] text: &str, #[case] expected: Vec<usize>) {
    assert_eq!(capture_counts(source, text), expected);
}

#[rstest]
#[case::first("(block . (expression_statement) @s)", vec!["a"])]
#[case::last("(block (expression_statement) @s .)", vec!["c"])]
#[case::unanchored("(block (expression_statement) @s)", vec!["a"])]
#[case::adjacent("(block (expression_statement) @x . (expression_statement) @y .)", vec!["b", "c"])]
fn test_anchors(#[case] source: &str, #[case] expected: Vec<&str>) {
    assert_eq!(captured(source, "{ a\nb\nc }"), expected);
}

#[test]
fn test_negated_field() {
    let text = "if (a) b\nif (c) d else e";
    let tree = parse_wren(text);
    let query = query("(if_statement !alternative) @bare");
    let ranges: Vec<_> = QueryCursor::new()
        .matches(&query, tree.root_node(), text)
        .map(|found| found.captures[0].node.byte_range())
        .collect();
    assert_eq!(ranges, vec![TextRange::new(0.into(), 8.into())]);
}

#[rstest]
#[case::error("(ERROR) @e", "var a = 1 )", vec![")"])]
#[case::missing("(MISSING) @m", "var a =", vec![""])]
#[case::missing_kind("(var_statement value: (identifier) @v)", "var a =", vec![""])]
fn test_error_nodes(#[case] source: &str, #[case] text: &str, #[case] expected: Vec<&str>) {
    assert_eq!(captured(source, text), expected);
}

#[test]
fn test_nodes_for_capture_index() {
    let text = "{ a\nb }";
    let tree = parse_wren(text);
    let query = query("(block (expression_statement)+ @s)");
    let found = QueryCursor::new()
        .matches(&query, tree.root_node(), text)
        .next()
        .unwrap();
    let texts: Vec<_> = found.nodes_for_capture_index(0).map(|node| node.utf8_text(text)).collect();
    assert_eq!(texts, vec!["a", "b"]);
    assert_eq!(found.nodes_for_capture_index(1).count(), 0);
}

// =============================================================================
// Cursor settings
// =============================================================================

#[test]
fn test_byte_range_restriction() {
    let tree = parse_wren(PROGRAM);
    let query = query("(identifier) @id");
    let mut cursor = QueryCursor::new();
    cursor.set_byte_range(TextRange::new(24.into(), 32.into()));
    let texts: Vec<_> = cursor
        .captures(&query, tree.root_node(), PROGRAM)
        .map(|(found, index)| found.captures[index].node.utf8_text(PROGRAM))
        .collect();
    assert_eq!(texts, vec!["print", "b"]);

    cursor.set_byte_ranges(Vec::new());
    assert_eq!(cursor.captures(&query, tree.root_node(), PROGRAM).count(), 5);
}

#[test]
fn test_requery_changed_ranges() {
    let text = "var a = 1\nvar b = 2\n";
    let mut parser = Parser::new(wren::language());
    let old = parser.parse(text, None);
    let (new_text, edit) = Edit::apply(text, TextRange::new(18.into(), 19.into()), "42");
    let edited = old.edit(&edit);
    let new = parser.parse(&new_text, Some(&edited));

    let query = query("(number) @n");
    let mut cursor = QueryCursor::new();
    cursor.set_byte_ranges(edited.changed_ranges(&new));
    let texts: Vec<_> = cursor
        .captures(&query, new.root_node(), &new_text)
        .map(|(found, index)| found.captures[index].node.utf8_text(&new_text).to_string())
        .collect();
    assert_eq!(texts, vec!["42"]);
}

#[test]
fn test_match_limit() {
    let tree = parse_wren(PROGRAM);
    let query = query("(var_statement name: (identifier) @name)");
    let cursor = QueryCursor::new().with_match_limit(1);
    let mut matches = cursor.matches(&query, tree.root_node(), PROGRAM);
    assert!(matches.by_ref().next().is_none());
    assert!(matches.did_exceed_match_limit());

    let mut matches = QueryCursor::new().matches(&query, tree.root_node(), PROGRAM);
    assert_eq!(matches.by_ref().count(), 2);
    assert!(!matches.did_exceed_match_limit());
}

#[test]
fn test_matches_are_deterministic() {
    let tree = parse_wren(PROGRAM);
    let query = query("(identifier) @id [(number) (string)] @lit (var_statement) @v");
    let run = || {
        QueryCursor::new()
            .matches(&query, tree.root_node(), PROGRAM)
            .map(|found| {
                let captures: Vec<_> = found
                    .captures
                    .iter()
                    .map(|capture| (capture.index, capture.node.byte_range()))
                    .collect();
                (found.pattern_index, captures)
            })
            .collect::<Vec<_>>()
    };
    let first = run();
    assert!(!first.is_empty());
    assert_eq!(first, run());
}

#[test]
fn test_query_from_other_language_matches_nothing() {
    use crate::grammars::builder::{GrammarBuilder, Pattern, sym};
    use crate::language::Language;

    let mut grammar = GrammarBuilder::new("tiny");
    grammar
        .start("source_file")
        .token("word", Pattern::literal("x"))
        .rule("source_file", [sym("word")]);
    let other = Language::new(grammar.build().unwrap()).unwrap();
    let query = Query::new(&other, "(word) @w").unwrap();
    let tree = parse_wren("x");
    assert_eq!(QueryCursor::new().matches(&query, tree.root_node(), "x").count(), 0);
}
