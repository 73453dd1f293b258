use rstest::rstest;

use super::*;
use crate::lexer::{ExternalScanner, ScanCursor};
use crate::parser::Parser;

#[test]
fn test_language_loads() {
    let language = language();
    assert_eq!(language.name(), "wren");
    assert!(language.version() >= crate::language::MIN_COMPATIBLE_VERSION);
    for name in [
        "source_file",
        "var_statement",
        "binary_expression",
        "block_comment",
        "class_definition",
        "import_statement",
        "map_literal",
    ] {
        assert!(language.symbol_for_name(name, true).is_some(), "{name}");
    }
    for keyword in [
        "var", "if", "else", "while", "for", "in", "return", "+", "||", "class", "import", "super", "#!",
    ] {
        assert!(language.symbol_for_name(keyword, false).is_some(), "{keyword}");
    }
}

#[test]
fn test_hidden_and_extra_symbols() {
    let language = language();
    let whitespace = language.symbol_for_name("_whitespace", true).unwrap();
    let statement = language.symbol_for_name("_statement", true).unwrap();
    let comment = language.symbol_for_name("line_comment", true).unwrap();
    assert!(!language.is_visible(whitespace));
    assert!(language.is_extra(whitespace));
    assert!(!language.is_visible(statement));
    assert!(language.is_visible(comment) && language.is_extra(comment));
}

#[test]
fn test_blob_is_stable() {
    assert_eq!(grammar_blob(), language().to_blob().as_slice());
    assert_eq!(grammar().compile().unwrap(), grammar_blob());
}

#[rstest]
#[case::empty_class(
    "class A {}",
    "(source_file (class_definition name: (identifier)))"
)]
#[case::constructor(
    "class B is A { construct new(x) { _x = x } }",
    "(source_file (class_definition name: (identifier) superclass: (identifier) (constructor_definition name: (identifier) parameters: (parameter_list (identifier)) body: (method_body (expression_statement (assignment_expression left: (field) right: (identifier)))))))"
)]
#[case::getter_setter_static(
    "class C { x { _x } x=(v) { _x = v } static zero { __zero } }",
    "(source_file (class_definition name: (identifier) (method_definition (getter_definition name: (identifier) body: (method_body (expression_statement (field))))) (method_definition (setter_definition name: (identifier) parameter: (identifier) body: (method_body (expression_statement (assignment_expression left: (field) right: (identifier)))))) (method_definition (getter_definition name: (identifier) body: (method_body (expression_statement (static_field)))))))"
)]
#[case::operators_and_subscripts(
    "class V { +(o) { this } -{ null } [i] { i } [i]=(v) { v } }",
    "(source_file (class_definition name: (identifier) (method_definition (operator_method parameter: (identifier) body: (method_body (expression_statement (this))))) (method_definition (prefix_operator_method body: (method_body (expression_statement (null))))) (method_definition (subscript_method parameters: (subscript_parameter_list (identifier)) body: (method_body (expression_statement (identifier))))) (method_definition (subscript_setter_method parameters: (subscript_parameter_list (identifier)) value_parameter: (identifier) body: (method_body (expression_statement (identifier)))))))"
)]
#[case::foreign_members(
    "foreign class F { foreign method(a) static foreign count }",
    "(source_file (class_definition name: (identifier) (foreign_method (foreign_named_method name: (identifier) parameters: (parameter_list (identifier)))) (foreign_method (foreign_getter name: (identifier)))))"
)]
#[case::attributes(
    "#doc = \"x\"\n#!meta(a, b = 1)\nclass A {}",
    "(source_file (class_definition (attribute name: (identifier) value: (string)) (attribute name: (identifier) (attribute_group (attribute_entry key: (identifier)) (attribute_entry key: (identifier) value: (number)))) name: (identifier)))"
)]
#[case::super_calls(
    "class B is A { construct new() { super(1) } foo { super.foo } }",
    "(source_file (class_definition name: (identifier) superclass: (identifier) (constructor_definition name: (identifier) parameters: (parameter_list) body: (method_body (expression_statement (super_expression arguments: (argument_list (number)))))) (method_definition (getter_definition name: (identifier) body: (method_body (expression_statement (super_expression method: (identifier))))))))"
)]
#[case::import_with_alias(
    "import \"io\" for File, Dir as D",
    "(source_file (import_statement path: (string) variables: (import_variable_list (import_variable name: (identifier)) (import_variable name: (identifier) alias: (identifier)))))"
)]
#[case::shebang_and_method_call(
    "#!/usr/bin/env wren\nSystem.print(this)",
    "(source_file (shebang) (expression_statement (method_call_expression receiver: (identifier) method: (identifier) arguments: (argument_list (this)))))"
)]
#[case::conditional_collections(
    "var r = a ? [1, 2][0] : {\"k\": b.c}",
    "(source_file (var_statement name: (identifier) value: (conditional_expression condition: (identifier) consequence: (subscript_expression receiver: (list_literal (number) (number)) (number)) alternative: (map_literal (map_entry key: (string) value: (method_call_expression receiver: (identifier) method: (identifier)))))))"
)]
#[case::logical_and_range(
    "x = a || b && c..d",
    "(source_file (expression_statement (assignment_expression left: (identifier) right: (logical_expression left: (identifier) right: (logical_expression left: (identifier) right: (binary_expression left: (identifier) right: (identifier)))))))"
)]
#[case::raw_string(
    "var s = \"\"\"a \"quoted\" b\"\"\"",
    "(source_file (var_statement name: (identifier) value: (raw_string)))"
)]
fn test_parse_language_constructs(#[case] text: &str, #[case] expected: &str) {
    let tree = Parser::new(language()).parse(text, None);
    assert_eq!(tree.to_sexp(), expected);
    assert!(!tree.root_node().has_error());
}

#[test]
fn test_language_is_shared() {
    assert!(language().ptr_eq(&language()));
}

fn scan(text: &str) -> Option<usize> {
    let mut input = text;
    let mut cursor = ScanCursor::new(&mut input, 0);
    WrenScanner.scan(&mut cursor, &[true])?;
    Some(cursor.token_end())
}

#[rstest]
#[case::simple("/* a */ x", Some(7))]
#[case::nested("/* a /* b */ c */ x", Some(17))]
#[case::unterminated("/* a /* b */", Some(12))]
#[case::star_slash_inside("/** **/ x", Some(7))]
#[case::line_comment("// a", None)]
#[case::division("a / b", None)]
#[case::slash_only("/", None)]
fn test_block_comment_scan(#[case] text: &str, #[case] expected: Option<usize>) {
    assert_eq!(scan(text), expected);
}

#[test]
fn test_block_comment_requires_validity() {
    let mut input = "/* x */";
    let mut cursor = ScanCursor::new(&mut input, 0);
    assert_eq!(WrenScanner.scan(&mut cursor, &[false]), None);
}
