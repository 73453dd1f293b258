//! Error recovery: every input yields a tree and errors stay local.

use canopy::{ErrorCode, Severity, TextRange, TextSize};
use rstest::rstest;

use crate::helpers::source_fixtures::{CONTROL_FLOW, ERROR_IN_MIDDLE, STATEMENTS, WITH_COMMENTS};
use crate::helpers::tree_assertions::{assert_nested, assert_no_errors, assert_tiles, parse_fresh};

#[rstest]
#[case(STATEMENTS)]
#[case(CONTROL_FLOW)]
#[case(WITH_COMMENTS)]
fn test_fixtures_parse_cleanly(#[case] text: &str) {
    assert_no_errors(text);
    let tree = parse_fresh(text);
    assert_tiles(&tree, text);
    assert_nested(tree.root_node());
}

#[rstest]
#[case::closers(")))")]
#[case::unknown_characters("@@@ $ ~")]
#[case::lone_keyword("var")]
#[case::open_condition("if (")]
#[case::open_blocks("{{{{")]
#[case::unterminated_string("print(\"abc")]
#[case::repeated_operators("var = = = 1")]
#[case::open_call("print(a, ")]
#[case::stray_else("else print(a)")]
#[case::keyword_as_name("var while = 1")]
#[case::keyword_as_value("var x = in")]
#[case::keyword_as_argument("print(class)")]
#[case::comment_inside_open_call("print(a /* never closed")]
#[case::mixed("var a = 1 ) var b = ( 2\n@ while")]
fn test_malformed_input_still_produces_a_tree(#[case] text: &str) {
    let tree = parse_fresh(text);
    let root = tree.root_node();
    assert_eq!(root.kind(), "source_file");
    assert!(root.has_error(), "{}", tree.to_sexp());
    assert!(!tree.diagnostics().is_empty());
    assert_tiles(&tree, text);
    assert_nested(root);
}

#[rstest]
#[case::prefixed_by_keyword("var elsewhere = 1\nprint(elsewhere)")]
#[case::keyword_prefix("var whi = iffy\nprint(classy, in_range)")]
fn test_words_containing_keywords_parse_as_identifiers(#[case] text: &str) {
    assert_no_errors(text);
}

#[test]
fn test_error_stays_inside_its_statement() {
    let tree = parse_fresh(ERROR_IN_MIDDLE);
    let root = tree.root_node();

    let first = root.named_child(0).unwrap();
    assert_eq!(first.kind(), "var_statement");
    assert!(!first.has_error());
    assert_eq!(first.utf8_text(ERROR_IN_MIDDLE).trim_end(), "var a = 1");

    let last = root.named_child(root.named_child_count() - 1).unwrap();
    assert_eq!(last.kind(), "var_statement");
    assert!(!last.has_error());
    assert_eq!(last.utf8_text(ERROR_IN_MIDDLE).trim(), "var c = 3");

    // The statements around the error parse as they would without it
    let clean_text = "var a = 1\nvar c = 3";
    let clean = parse_fresh(clean_text);
    let clean_root = clean.root_node();
    assert_eq!(first.to_sexp(), clean_root.named_child(0).unwrap().to_sexp());
    assert_eq!(last.to_sexp(), clean_root.named_child(1).unwrap().to_sexp());

    let middle_line = TextRange::new(TextSize::new(10), TextSize::new(21));
    let errors = tree.diagnostics();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].code, ErrorCode::E0101);
    assert_eq!(errors[0].severity, Severity::Error);
    assert!(middle_line.contains_range(errors[0].range));
}

#[test]
fn test_errors_on_separate_lines_are_reported_separately() {
    let text = "var a = 1 )\nvar b = 2\nvar c = 3 )";
    let tree = parse_fresh(text);
    let errors = tree.diagnostics();
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors.iter().all(|error| error.code == ErrorCode::E0201));
    assert_eq!(errors[0].range, TextRange::new(TextSize::new(10), TextSize::new(11)));
    assert!(errors[1].range.start() >= TextSize::new(22));

    let clean: Vec<_> = tree
        .root_node()
        .named_children()
        .filter(|statement| !statement.has_error())
        .map(|statement| statement.utf8_text(text).trim().to_string())
        .collect();
    assert!(clean.contains(&"var b = 2".to_string()), "{}", tree.to_sexp());
}

#[test]
fn test_missing_closer_is_reported_at_end() {
    let text = "while (a) { print(a)";
    let tree = parse_fresh(text);
    let errors = tree.diagnostics();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].code, ErrorCode::E0202);
    assert_eq!(errors[0].range, TextRange::empty(TextSize::of(text)));
    assert!(tree.to_sexp().contains("(MISSING \"}\")"));
}
