//! Queries over realistic trees, including incrementally reparsed ones.

use canopy::grammars::wren;
use canopy::query::QueryErrorKind;
use canopy::{Edit, Parser, Query, QueryCursor, TextRange, TextSize, Tree};
use rstest::rstest;

use crate::helpers::source_fixtures::{CONTROL_FLOW, ERROR_IN_MIDDLE};
use crate::helpers::tree_assertions::parse_fresh;

/// (pattern, capture name, captured text) for every capture
fn run(source: &str, tree: &Tree, text: &str) -> Vec<(usize, String, String)> {
    let query = Query::new(&wren::language(), source).unwrap();
    QueryCursor::new()
        .captures(&query, tree.root_node(), text)
        .map(|(found, index)| {
            let capture = found.captures[index];
            (
                found.pattern_index,
                query.capture_name(capture.index).unwrap_or_default().to_string(),
                capture.node.utf8_text(text).to_string(),
            )
        })
        .collect()
}

fn texts(source: &str, text: &str) -> Vec<String> {
    run(source, &parse_fresh(text), text)
        .into_iter()
        .map(|(_, _, text)| text)
        .collect()
}

#[rstest]
#[case::loop_header(
    "(for_statement variable: (identifier) @var iterator: (call_expression function: (identifier) @fn))",
    vec!["i", "range"]
)]
#[case::operators("(binary_expression operator: _ @op)", vec![">", "+", ">", "-"])]
#[case::assignments("(assignment_expression left: (identifier) @target)", vec!["total", "total"])]
#[case::early_exit("[(break_statement) (return_statement)] @exit", vec!["break", "return total"])]
#[case::conditions(
    "[(if_statement condition: (_) @cond) (while_statement condition: (_) @cond)]",
    vec!["i > 5", "total > 0"]
)]
#[case::literal_compare("((number) @n (#eq? @n \"0\"))", vec!["0", "0"])]
fn test_captures_in_control_flow(#[case] source: &str, #[case] expected: Vec<&str>) {
    assert_eq!(texts(source, CONTROL_FLOW), expected);
}

#[test]
fn test_capture_names_are_reported() {
    let tree = parse_fresh(CONTROL_FLOW);
    let captures = run("(for_statement variable: (identifier) @var body: (block) @body)", &tree, CONTROL_FLOW);
    let names: Vec<_> = captures.iter().map(|(_, name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["var", "body"]);
}

#[test]
fn test_incremental_tree_matches_like_fresh_tree() {
    let source = "(identifier) @id (number) @n (var_statement name: (identifier) @declared)";
    let mut parser = Parser::new(wren::language());
    let old = parser.parse(CONTROL_FLOW, None);

    let replaced = TextRange::new(TextSize::new(4), TextSize::new(9));
    let (new_text, edit) = Edit::apply(CONTROL_FLOW, replaced, "sum");
    let incremental = parser.parse(&new_text, Some(&old.edit(&edit)));
    let fresh = parse_fresh(&new_text);

    let expected = run(source, &fresh, &new_text);
    assert!(expected.iter().any(|(_, name, text)| name == "declared" && text == "sum"));
    assert_eq!(run(source, &incremental, &new_text), expected);
}

#[test]
fn test_queries_see_through_errors() {
    let tree = parse_fresh(ERROR_IN_MIDDLE);
    assert_eq!(
        texts("(var_statement name: (identifier) @name)", ERROR_IN_MIDDLE)
            .first()
            .map(String::as_str),
        Some("a")
    );
    let errors = run("(ERROR) @error", &tree, ERROR_IN_MIDDLE);
    assert!(!errors.is_empty());
    assert!(errors.iter().all(|(_, _, text)| text == "@"), "{errors:?}");
}

#[rstest]
#[case::unknown_kind("(while_statement body: (nonexistent))", QueryErrorKind::NodeType, "E0502")]
#[case::unknown_field("(while_statement bogus: (block))", QueryErrorKind::Field, "E0503")]
#[case::unclosed("(while_statement", QueryErrorKind::Syntax, "E0501")]
fn test_query_errors(#[case] source: &str, #[case] kind: QueryErrorKind, #[case] code: &str) {
    let error = Query::new(&wren::language(), source).unwrap_err();
    assert_eq!(error.kind, kind);
    assert!(error.to_string().starts_with(code), "{error}");
}
