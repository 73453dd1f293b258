//! Bundled grammar for [Wren](https://wren.io)
//!
//! Covers variables, control flow (`if`/`else`, `while`, `for ... in`,
//! `return`, `break`, `continue`), imports, classes (constructors, methods,
//! getters, setters, operators, subscripts, foreign and static members,
//! attributes), and expressions with Wren's operator precedence: calls,
//! method calls, subscripts, list and map literals, fields, `this`, `super`
//! and the conditional operator. Whitespace, `//` line comments and nested
//! `/* */` block comments are extras; block comments are recognized by
//! [`WrenScanner`]. `identifier` is the word token, so keywords are
//! reserved.
//!
//! Not covered: string interpolation, block arguments and closures, and
//! newline-terminated statements.

mod scanner;

use std::sync::LazyLock;

use crate::grammars::builder::{Assoc, GrammarBuilder, Item, Pattern, field, lit, sym};
use crate::language::Language;

pub use scanner::WrenScanner;

mod prec {
    pub const ASSIGNMENT: i32 = 1;
    pub const CONDITIONAL: i32 = 2;
    pub const LOGICAL_OR: i32 = 3;
    pub const LOGICAL_AND: i32 = 4;
    pub const EQUALITY: i32 = 5;
    pub const IS: i32 = 6;
    pub const COMPARISON: i32 = 7;
    pub const BITWISE_OR: i32 = 8;
    pub const BITWISE_XOR: i32 = 9;
    pub const BITWISE_AND: i32 = 10;
    pub const SHIFT: i32 = 11;
    pub const RANGE: i32 = 12;
    pub const ADD: i32 = 13;
    pub const MULTIPLY: i32 = 14;
    pub const PREFIX: i32 = 15;
    pub const CALL: i32 = 16;
}

const BINARY_OPERATORS: &[(&str, i32)] = &[
    ("==", prec::EQUALITY),
    ("!=", prec::EQUALITY),
    ("<", prec::COMPARISON),
    ("<=", prec::COMPARISON),
    (">", prec::COMPARISON),
    (">=", prec::COMPARISON),
    ("+", prec::ADD),
    ("-", prec::ADD),
    ("*", prec::MULTIPLY),
    ("/", prec::MULTIPLY),
    ("%", prec::MULTIPLY),
    ("..", prec::RANGE),
    ("...", prec::RANGE),
    ("<<", prec::SHIFT),
    (">>", prec::SHIFT),
    ("&", prec::BITWISE_AND),
    ("^", prec::BITWISE_XOR),
    ("|", prec::BITWISE_OR),
    ("is", prec::IS),
];

const LOGICAL_OPERATORS: &[(&str, i32)] = &[("||", prec::LOGICAL_OR), ("&&", prec::LOGICAL_AND)];

/// Infix operators a class can define
const OPERATOR_METHODS: &[&str] = &[
    "+", "-", "*", "/", "%", "<", ">", "<=", ">=", "==", "!=", "&", "|", "^", "<<", ">>", "..", "...",
    "is",
];

static BLOB: LazyLock<Vec<u8>> = LazyLock::new(|| match grammar().compile() {
    Ok(blob) => blob,
    Err(error) => panic!("bundled Wren grammar failed to build: {error}"),
});

static LANGUAGE: LazyLock<Language> = LazyLock::new(|| match Language::load(&BLOB) {
    Ok(language) => language.with_external_scanner(|| Box::new(WrenScanner)),
    Err(error) => panic!("bundled Wren grammar failed to load: {error}"),
});

/// The compiled Wren grammar blob
pub fn grammar_blob() -> &'static [u8] {
    &BLOB
}

/// The Wren language with its external scanner attached.
///
/// # Panics
///
/// Only if the bundled grammar definition is itself invalid.
pub fn language() -> Language {
    LANGUAGE.clone()
}

/// The Wren grammar definition
pub fn grammar() -> GrammarBuilder {
    let digit = || Pattern::chars(&[('0', '9')]);
    let digits = || Pattern::repeat1(digit());

    let name_rest = || Pattern::repeat(Pattern::chars(&[('a', 'z'), ('A', 'Z'), ('0', '9'), ('_', '_')]));

    let mut g = GrammarBuilder::new("wren");
    g.start("source_file").word("identifier");

    // =========================================================================
    // Tokens
    // =========================================================================

    g.token(
        "identifier",
        Pattern::seq([Pattern::chars(&[('a', 'z'), ('A', 'Z')]), name_rest()]),
    )
    .token(
        "number",
        Pattern::choice([
            Pattern::seq([
                Pattern::literal("0x"),
                Pattern::repeat1(Pattern::chars(&[('0', '9'), ('a', 'f'), ('A', 'F')])),
            ]),
            Pattern::seq([
                digits(),
                Pattern::optional(Pattern::seq([Pattern::char('.'), digits()])),
                Pattern::optional(Pattern::seq([
                    Pattern::chars(&[('e', 'e'), ('E', 'E')]),
                    Pattern::optional(Pattern::chars(&[('+', '+'), ('-', '-')])),
                    digits(),
                ])),
            ]),
        ]),
    )
    .token(
        "string",
        Pattern::seq([
            Pattern::char('"'),
            Pattern::repeat(Pattern::choice([
                Pattern::not_chars(&[('"', '"'), ('\\', '\\'), ('\n', '\n')]),
                Pattern::seq([Pattern::char('\\'), Pattern::any()]),
            ])),
            Pattern::char('"'),
        ]),
    )
    .token(
        "line_comment",
        Pattern::seq([Pattern::literal("//"), Pattern::repeat(Pattern::not_chars(&[('\n', '\n')]))]),
    )
    .token(
        "_whitespace",
        Pattern::repeat1(Pattern::chars(&[(' ', ' '), ('\t', '\t'), ('\r', '\r'), ('\n', '\n')])),
    )
    .token(
        "field",
        Pattern::seq([Pattern::char('_'), Pattern::chars(&[('a', 'z'), ('A', 'Z')]), name_rest()]),
    )
    .token(
        "static_field",
        Pattern::seq([
            Pattern::literal("__"),
            Pattern::chars(&[('a', 'z'), ('A', 'Z'), ('_', '_')]),
            name_rest(),
        ]),
    )
    .token(
        "raw_string",
        Pattern::seq([
            Pattern::literal("\"\"\""),
            Pattern::repeat(Pattern::choice([
                Pattern::not_chars(&[('"', '"')]),
                Pattern::seq([Pattern::char('"'), Pattern::not_chars(&[('"', '"')])]),
                Pattern::seq([Pattern::literal("\"\""), Pattern::not_chars(&[('"', '"')])]),
            ])),
            Pattern::literal("\"\"\""),
        ]),
    )
    .token(
        "shebang",
        Pattern::seq([Pattern::literal("#!"), Pattern::repeat(Pattern::not_chars(&[('\n', '\n')]))]),
    )
    .external("block_comment")
    .extra("_whitespace")
    .extra("line_comment")
    .extra("block_comment");

    // =========================================================================
    // Statements
    // =========================================================================

    g.rule("source_file", Vec::<Item>::new())
        .rule("source_file", [sym("_statements")])
        .rule("source_file", [sym("shebang")])
        .rule("source_file", [sym("shebang"), sym("_statements")])
        .repeat("_statements", "_statement");

    for statement in [
        "var_statement",
        "if_statement",
        "while_statement",
        "for_statement",
        "return_statement",
        "break_statement",
        "continue_statement",
        "block",
        "expression_statement",
        "class_definition",
        "import_statement",
    ] {
        g.rule("_statement", [sym(statement)]);
    }

    g.rule("var_statement", [lit("var"), field("name", sym("identifier"))])
        .rule(
            "var_statement",
            [
                lit("var"),
                field("name", sym("identifier")),
                lit("="),
                field("value", sym("_expression")),
            ],
        )
        .rule("expression_statement", [sym("_expression")]);

    let if_head = || {
        [
            lit("if"),
            lit("("),
            field("condition", sym("_expression")),
            lit(")"),
            field("consequence", sym("_statement")),
        ]
    };
    g.rule_prec("if_statement", 0, Assoc::Right, if_head())
        .rule_prec(
            "if_statement",
            0,
            Assoc::Right,
            if_head()
                .into_iter()
                .chain([lit("else"), field("alternative", sym("_statement"))]),
        )
        .rule(
            "while_statement",
            [
                lit("while"),
                lit("("),
                field("condition", sym("_expression")),
                lit(")"),
                field("body", sym("_statement")),
            ],
        )
        .rule(
            "for_statement",
            [
                lit("for"),
                lit("("),
                field("variable", sym("identifier")),
                lit("in"),
                field("iterator", sym("_expression")),
                lit(")"),
                field("body", sym("_statement")),
            ],
        )
        .rule_prec("return_statement", 0, Assoc::Right, [lit("return")])
        .rule_prec(
            "return_statement",
            0,
            Assoc::Right,
            [lit("return"), field("value", sym("_expression"))],
        )
        .rule("break_statement", [lit("break")])
        .rule("continue_statement", [lit("continue")])
        .rule("block", [lit("{"), lit("}")])
        .rule("block", [lit("{"), sym("_statements"), lit("}")]);

    // =========================================================================
    // Expressions
    // =========================================================================

    for expression in [
        "identifier",
        "number",
        "string",
        "boolean",
        "null",
        "assignment_expression",
        "binary_expression",
        "unary_expression",
        "call_expression",
        "parenthesized_expression",
    ] {
        g.rule("_expression", [sym(expression)]);
    }

    g.rule_prec(
        "assignment_expression",
        prec::ASSIGNMENT,
        Assoc::Right,
        [
            field("left", sym("identifier")),
            lit("="),
            field("right", sym("_expression")),
        ],
    );
    for &(operator, level) in BINARY_OPERATORS {
        g.rule_prec(
            "binary_expression",
            level,
            Assoc::Left,
            [
                field("left", sym("_expression")),
                field("operator", lit(operator)),
                field("right", sym("_expression")),
            ],
        );
    }
    for operator in ["-", "!"] {
        g.rule_prec(
            "unary_expression",
            prec::PREFIX,
            Assoc::None,
            [field("operator", lit(operator)), field("operand", sym("_expression"))],
        );
    }
    g.rule_prec(
        "call_expression",
        prec::CALL,
        Assoc::None,
        [
            field("function", sym("identifier")),
            field("arguments", sym("argument_list")),
        ],
    )
    // Argument lists bind to the callee, so a call never ends before `(`
    .rule_prec("argument_list", prec::CALL, Assoc::None, [lit("("), lit(")")])
    .rule_prec(
        "argument_list",
        prec::CALL,
        Assoc::None,
        [lit("("), sym("_arguments"), lit(")")],
    )
    .rule("_arguments", [sym("_expression")])
    .rule("_arguments", [sym("_arguments"), lit(","), sym("_expression")])
    .rule("parenthesized_expression", [lit("("), sym("_expression"), lit(")")])
    .rule("boolean", [lit("true")])
    .rule("boolean", [lit("false")])
    .rule("null", [lit("null")]);

    more_expressions(&mut g);
    imports(&mut g);
    classes(&mut g);
    g
}

fn more_expressions(g: &mut GrammarBuilder) {
    for expression in [
        "field",
        "static_field",
        "raw_string",
        "this",
        "super_expression",
        "logical_expression",
        "conditional_expression",
        "method_call_expression",
        "subscript_expression",
        "list_literal",
        "map_literal",
    ] {
        g.rule("_expression", [sym(expression)]);
    }

    for target in ["field", "static_field", "method_call_expression", "subscript_expression"] {
        g.rule_prec(
            "assignment_expression",
            prec::ASSIGNMENT,
            Assoc::Right,
            [
                field("left", sym(target)),
                lit("="),
                field("right", sym("_expression")),
            ],
        );
    }
    for &(operator, level) in LOGICAL_OPERATORS {
        g.rule_prec(
            "logical_expression",
            level,
            Assoc::Left,
            [
                field("left", sym("_expression")),
                field("operator", lit(operator)),
                field("right", sym("_expression")),
            ],
        );
    }
    g.rule_prec(
        "unary_expression",
        prec::PREFIX,
        Assoc::None,
        [field("operator", lit("~")), field("operand", sym("_expression"))],
    )
    .rule_prec(
        "conditional_expression",
        prec::CONDITIONAL,
        Assoc::Right,
        [
            field("condition", sym("_expression")),
            lit("?"),
            field("consequence", sym("_expression")),
            lit(":"),
            field("alternative", sym("_expression")),
        ],
    );

    g.rule_prec(
        "method_call_expression",
        prec::CALL,
        Assoc::Right,
        [
            field("receiver", sym("_expression")),
            lit("."),
            field("method", sym("identifier")),
        ],
    )
    .rule_prec(
        "method_call_expression",
        prec::CALL,
        Assoc::Left,
        [
            field("receiver", sym("_expression")),
            lit("."),
            field("method", sym("identifier")),
            field("arguments", sym("argument_list")),
        ],
    )
    .rule_prec(
        "subscript_expression",
        prec::CALL,
        Assoc::Left,
        [
            field("receiver", sym("_expression")),
            lit("["),
            sym("_arguments"),
            lit("]"),
        ],
    );

    g.rule("this", [lit("this")])
        .rule_prec("super_expression", -1, Assoc::None, [lit("super")])
        .rule(
            "super_expression",
            [lit("super"), lit("."), field("method", sym("identifier"))],
        )
        .rule(
            "super_expression",
            [
                lit("super"),
                lit("."),
                field("method", sym("identifier")),
                field("arguments", sym("argument_list")),
            ],
        )
        .rule("super_expression", [lit("super"), field("arguments", sym("argument_list"))]);

    g.rule("list_literal", [lit("["), lit("]")])
        .rule("list_literal", [lit("["), sym("_arguments"), lit("]")])
        .rule("list_literal", [lit("["), sym("_arguments"), lit(","), lit("]")])
        .rule("map_literal", [lit("{"), lit("}")])
        .rule("map_literal", [lit("{"), sym("_map_entries"), lit("}")])
        .rule("map_literal", [lit("{"), sym("_map_entries"), lit(","), lit("}")])
        .rule("_map_entries", [sym("map_entry")])
        .rule("_map_entries", [sym("_map_entries"), lit(","), sym("map_entry")])
        .rule(
            "map_entry",
            [
                field("key", sym("_expression")),
                lit(":"),
                field("value", sym("_expression")),
            ],
        );
}

fn imports(g: &mut GrammarBuilder) {
    g.rule_prec(
        "import_statement",
        0,
        Assoc::Right,
        [lit("import"), field("path", sym("string"))],
    )
    .rule_prec(
        "import_statement",
        0,
        Assoc::Right,
        [
            lit("import"),
            field("path", sym("string")),
            lit("for"),
            field("variables", sym("import_variable_list")),
        ],
    )
    .rule("import_variable_list", [sym("_import_variables")])
    .rule("_import_variables", [sym("import_variable")])
    .rule(
        "_import_variables",
        [sym("_import_variables"), lit(","), sym("import_variable")],
    )
    .rule("import_variable", [field("name", sym("identifier"))])
    .rule(
        "import_variable",
        [
            field("name", sym("identifier")),
            lit("as"),
            field("alias", sym("identifier")),
        ],
    );
}

fn classes(g: &mut GrammarBuilder) {
    // [attributes] [foreign] class Name [is Super] { [members] }
    for attributes in [false, true] {
        for foreign in [false, true] {
            for superclass in [false, true] {
                for members in [false, true] {
                    let mut items = Vec::new();
                    if attributes {
                        items.push(sym("_attributes"));
                    }
                    if foreign {
                        items.push(lit("foreign"));
                    }
                    items.extend([lit("class"), field("name", sym("identifier"))]);
                    if superclass {
                        items.extend([lit("is"), field("superclass", sym("identifier"))]);
                    }
                    items.push(lit("{"));
                    if members {
                        items.push(sym("_class_members"));
                    }
                    items.push(lit("}"));
                    g.rule("class_definition", items);
                }
            }
        }
    }
    g.repeat("_attributes", "attribute")
        .repeat("_class_members", "_class_member");

    for marker in ["#", "#!"] {
        g.rule("attribute", [lit(marker), field("name", sym("identifier"))])
            .rule(
                "attribute",
                [
                    lit(marker),
                    field("name", sym("identifier")),
                    lit("="),
                    field("value", sym("_attribute_value")),
                ],
            )
            .rule(
                "attribute",
                [lit(marker), field("name", sym("identifier")), sym("attribute_group")],
            );
    }
    g.rule("attribute_group", [lit("("), sym("_attribute_entries"), lit(")")])
        .rule("_attribute_entries", [sym("attribute_entry")])
        .rule(
            "_attribute_entries",
            [sym("_attribute_entries"), lit(","), sym("attribute_entry")],
        )
        .rule("attribute_entry", [field("key", sym("identifier"))])
        .rule(
            "attribute_entry",
            [
                field("key", sym("identifier")),
                lit("="),
                field("value", sym("_attribute_value")),
            ],
        );
    for value in ["identifier", "string", "boolean", "number"] {
        g.rule("_attribute_value", [sym(value)]);
    }

    for member in ["method_definition", "constructor_definition", "foreign_method"] {
        g.rule("_class_member", [sym(member)]);
    }

    // Optional attributes, then an optional `static`
    let prefixes = || {
        [
            vec![],
            vec![sym("_attributes")],
            vec![lit("static")],
            vec![sym("_attributes"), lit("static")],
        ]
    };
    for prefix in prefixes() {
        g.rule("method_definition", prefix.into_iter().chain([sym("_method")]));
    }
    for prefix in prefixes() {
        g.rule(
            "foreign_method",
            prefix.into_iter().chain([lit("foreign"), sym("_foreign_method")]),
        );
    }
    for attributes in [false, true] {
        for parameters in [false, true] {
            let mut items = Vec::new();
            if attributes {
                items.push(sym("_attributes"));
            }
            items.extend([lit("construct"), field("name", sym("identifier"))]);
            if parameters {
                items.push(field("parameters", sym("parameter_list")));
            }
            items.push(field("body", sym("method_body")));
            g.rule("constructor_definition", items);
        }
    }

    for method in [
        "getter_definition",
        "setter_definition",
        "named_method",
        "operator_method",
        "prefix_operator_method",
        "subscript_method",
        "subscript_setter_method",
    ] {
        g.rule("_method", [sym(method)]);
    }
    g.rule(
        "getter_definition",
        [field("name", sym("identifier")), field("body", sym("method_body"))],
    )
    .rule(
        "setter_definition",
        [
            field("name", sym("identifier")),
            lit("="),
            lit("("),
            field("parameter", sym("identifier")),
            lit(")"),
            field("body", sym("method_body")),
        ],
    )
    .rule(
        "named_method",
        [
            field("name", sym("identifier")),
            field("parameters", sym("parameter_list")),
            field("body", sym("method_body")),
        ],
    );
    for &operator in OPERATOR_METHODS {
        g.rule(
            "operator_method",
            [
                field("operator", lit(operator)),
                lit("("),
                field("parameter", sym("identifier")),
                lit(")"),
                field("body", sym("method_body")),
            ],
        );
    }
    for operator in ["-", "!", "~"] {
        g.rule(
            "prefix_operator_method",
            [field("operator", lit(operator)), field("body", sym("method_body"))],
        );
    }
    g.rule(
        "subscript_method",
        [
            lit("["),
            field("parameters", sym("subscript_parameter_list")),
            lit("]"),
            field("body", sym("method_body")),
        ],
    )
    .rule(
        "subscript_setter_method",
        [
            lit("["),
            field("parameters", sym("subscript_parameter_list")),
            lit("]"),
            lit("="),
            lit("("),
            field("value_parameter", sym("identifier")),
            lit(")"),
            field("body", sym("method_body")),
        ],
    )
    .rule("subscript_parameter_list", [sym("_parameters")]);

    g.rule("_foreign_method", [sym("foreign_named_method")])
        .rule("_foreign_method", [sym("foreign_getter")])
        .rule(
            "foreign_named_method",
            [
                field("name", sym("identifier")),
                field("parameters", sym("parameter_list")),
            ],
        )
        .rule("foreign_getter", [field("name", sym("identifier"))]);

    g.rule("parameter_list", [lit("("), lit(")")])
        .rule("parameter_list", [lit("("), sym("_parameters"), lit(")")])
        .rule("_parameters", [sym("identifier")])
        .rule("_parameters", [sym("_parameters"), lit(","), sym("identifier")])
        .rule("method_body", [lit("{"), lit("}")])
        .rule("method_body", [lit("{"), sym("_statements"), lit("}")]);
}

#[cfg(test)]
mod tests;
