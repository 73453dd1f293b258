//! Edit and reparse: equivalence with fresh parses, work bounded by the
//! edit, and old trees left intact.

use canopy::grammars::wren;
use canopy::{Edit, Parser, TextRange, TextSize, Tree};
use rstest::rstest;

use crate::helpers::source_fixtures::{CONTROL_FLOW, STATEMENTS, WITH_COMMENTS, numbered_statements};
use crate::helpers::tree_assertions::{assert_nested, assert_tiles, parse_fresh};

fn range(start: usize, end: usize) -> TextRange {
    TextRange::new(TextSize::new(start as u32), TextSize::new(end as u32))
}

fn visible_ranges(tree: &Tree) -> Vec<(String, TextRange)> {
    tree.preorder()
        .map(|node| (node.kind().to_string(), node.byte_range()))
        .collect()
}

/// Apply one replacement, reparse incrementally, and compare with a fresh parse
fn assert_reparse_matches(text: &str, start: usize, end: usize, replacement: &str) {
    let mut parser = Parser::new(wren::language());
    let old = parser.parse(text, None);

    let (new_text, edit) = Edit::apply(text, range(start, end), replacement);
    let incremental = parser.parse(&new_text, Some(&old.edit(&edit)));
    let fresh = parse_fresh(&new_text);

    assert_eq!(incremental.to_sexp(), fresh.to_sexp(), "after editing {text:?} into {new_text:?}");
    assert_eq!(visible_ranges(&incremental), visible_ranges(&fresh));
    assert_eq!(incremental.diagnostics(), fresh.diagnostics());
    assert_tiles(&incremental, &new_text);
    assert_nested(incremental.root_node());
}

#[rstest]
#[case::rename_variable(STATEMENTS, 4, 5, "alpha")]
#[case::change_literal(STATEMENTS, 8, 9, "42")]
#[case::insert_statement(STATEMENTS, 10, 10, "var z = 0\n")]
#[case::delete_statement(STATEMENTS, 10, 24, "")]
#[case::break_syntax(STATEMENTS, 16, 17, "= =")]
#[case::repair_syntax("var a = = 1\nvar b = 2", 8, 10, "")]
#[case::retype_operator(STATEMENTS, 20, 21, "*")]
#[case::open_block(CONTROL_FLOW, 0, 0, "{")]
#[case::edit_loop_body(CONTROL_FLOW, 62, 67, "sum")]
#[case::edit_inside_comment(WITH_COMMENTS, 3, 10, "changed")]
#[case::insert_comment(WITH_COMMENTS, 19, 19, "/* extra */ ")]
#[case::clear_everything(STATEMENTS, 0, 33, "")]
#[case::append(STATEMENTS, 33, 33, "print(a)")]
fn test_incremental_reparse_matches_fresh_parse(
    #[case] text: &str,
    #[case] start: usize,
    #[case] end: usize,
    #[case] replacement: &str,
) {
    assert_reparse_matches(text, start, end, replacement);
}

#[test]
fn test_sequence_of_edits_matches_fresh_parse() {
    let mut parser = Parser::new(wren::language());
    let mut text = String::from("var a = 1\n");
    let mut tree = parser.parse(&text, None);

    let steps: &[(usize, usize, &str)] = &[
        (10, 10, "var b = a"),
        (19, 19, " + 1"),
        (0, 3, "    var"),
        (27, 27, "\nif (b) print(b) else print(a)"),
        (4, 6, ""),
    ];
    for &(start, end, replacement) in steps {
        let (new_text, edit) = Edit::apply(&text, range(start, end), replacement);
        tree = parser.parse(&new_text, Some(&tree.edit(&edit)));
        text = new_text;
        assert_eq!(tree.to_sexp(), parse_fresh(&text).to_sexp(), "text {text:?}");
    }
}

#[test]
fn test_reparse_work_is_bounded_by_the_edit() {
    let small = numbered_statements(10);
    let large = numbered_statements(1000);
    let mut parser = Parser::new(wren::language());

    parser.parse(&large, None);
    let full = parser.stats();

    // Replace the value of the statement in the middle of each file
    let reparse = |text: &str, parser: &mut Parser| {
        let old = parser.parse(text, None);
        let line = text.lines().count() / 2;
        let line_start: usize = text.lines().take(line).map(|l| l.len() + 1).sum();
        let value_start = line_start + text[line_start..].find('=').unwrap_or(0) + 2;
        let value_end = line_start + text[line_start..].find('\n').unwrap_or(0);
        let (new_text, edit) = Edit::apply(text, range(value_start, value_end), "7");
        let new = parser.parse(&new_text, Some(&old.edit(&edit)));
        assert_eq!(new.to_sexp(), parse_fresh(&new_text).to_sexp());
        parser.stats()
    };
    let small_stats = reparse(&small, &mut parser);
    let large_stats = reparse(&large, &mut parser);

    assert!(large_stats.subtrees_reused > 0);
    assert!(
        large_stats.tokens_lexed * 10 < full.tokens_lexed,
        "relexed {} of {} tokens",
        large_stats.tokens_lexed,
        full.tokens_lexed
    );
    // A file a hundred times larger costs far less than a hundred times more
    assert!(
        large_stats.tokens_lexed < small_stats.tokens_lexed.max(1) * 20,
        "small reparse lexed {}, large reparse lexed {}",
        small_stats.tokens_lexed,
        large_stats.tokens_lexed
    );
}

#[test]
fn test_old_tree_survives_edit_and_reparse() {
    let mut parser = Parser::new(wren::language());
    let old = parser.parse(STATEMENTS, None);
    let old_sexp = old.to_sexp();
    let old_ids: Vec<_> = old.preorder().map(|node| (node.id(), node.byte_range())).collect();

    let (new_text, edit) = Edit::apply(STATEMENTS, range(4, 5), "renamed");
    let edited = old.edit(&edit);
    let new = parser.parse(&new_text, Some(&edited));
    drop(edited);

    assert_eq!(old.to_sexp(), old_sexp);
    assert!(!old.root_node().has_changes());
    let ids_after: Vec<_> = old.preorder().map(|node| (node.id(), node.byte_range())).collect();
    assert_eq!(ids_after, old_ids);

    // Both trees stay usable side by side
    assert_tiles(&old, STATEMENTS);
    assert_tiles(&new, &new_text);
    let name = new
        .root_node()
        .named_child(0)
        .and_then(|statement| statement.child_by_field_name("name"))
        .map(|name| name.utf8_text(&new_text));
    assert_eq!(name, Some("renamed"));
}

#[test]
fn test_unchanged_statements_share_nodes_with_old_tree() {
    let mut parser = Parser::new(wren::language());
    let old = parser.parse(STATEMENTS, None);
    let (new_text, edit) = Edit::apply(STATEMENTS, range(24, 24), " ");
    let new = parser.parse(&new_text, Some(&old.edit(&edit)));

    let first_old = old.root_node().named_child(0).unwrap();
    let first_new = new.root_node().named_child(0).unwrap();
    assert_eq!(first_old.id(), first_new.id());
    assert_eq!(first_old.byte_range(), first_new.byte_range());
}

#[test]
fn test_changed_ranges_cover_the_edit() {
    let mut parser = Parser::new(wren::language());
    let old = parser.parse(STATEMENTS, None);
    let (new_text, edit) = Edit::apply(STATEMENTS, range(8, 9), "(1)");
    let edited = old.edit(&edit);
    let new = parser.parse(&new_text, Some(&edited));

    let changed = edited.changed_ranges(&new);
    assert!(!changed.is_empty());
    assert!(changed.iter().any(|r| r.contains_range(range(8, 11))));
    // The third statement did not change
    let print_start = TextSize::new(new_text.find("print").unwrap() as u32);
    assert!(changed.iter().all(|r| r.end() <= print_start));
    assert!(changed.windows(2).all(|pair| pair[0].end() <= pair[1].start()));
}

#[rstest]
#[case::skipped_tokens_before_keyword(",print(a) in  */(", 5, 8, "if }")]
#[case::stray_operator_in_middle("var a = 1\nvar b = 2 @\nvar c = 3", 19, 19, " +")]
#[case::close_unbalanced_paren("print((a)\nvar b = 2", 9, 9, ")")]
#[case::break_next_to_error("var a = = 1\nprint(a)", 12, 17, "prin t")]
fn test_reparse_next_to_errors_matches_fresh_parse(
    #[case] text: &str,
    #[case] start: usize,
    #[case] end: usize,
    #[case] replacement: &str,
) {
    assert_reparse_matches(text, start, end, replacement);
}

/// Minimal linear congruential generator so the edit sequence is stable
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as usize
    }

    fn below(&mut self, bound: usize) -> usize {
        self.next() % bound.max(1)
    }
}

const FRAGMENTS: &[&str] = &[
    "var a = 1\n", "print(a)", "if (", "}", "{", " in ", "*/", "else", "while", ",", "= =", "@",
    "(", ")", "a + ", "\n", "for (i in x) ", "return", "/* c */", "\"s\"", "if }", "break\n",
];

#[test]
fn test_random_edits_over_erroneous_sources_match_fresh_parse() {
    let mut rng = Lcg(0x5eed_cafe);
    for round in 0..300 {
        let pieces = 1 + rng.below(8);
        let text: String = (0..pieces).map(|_| FRAGMENTS[rng.below(FRAGMENTS.len())]).collect();
        let start = rng.below(text.len() + 1);
        let end = start + rng.below(text.len() - start + 1);
        let replacement = if rng.below(4) == 0 { "" } else { FRAGMENTS[rng.below(FRAGMENTS.len())] };

        let mut parser = Parser::new(wren::language());
        let old = parser.parse(&text, None);
        let (new_text, edit) = Edit::apply(&text, range(start, end), replacement);
        let incremental = parser.parse(&new_text, Some(&old.edit(&edit)));
        let fresh = parse_fresh(&new_text);

        assert_eq!(
            incremental.to_sexp(),
            fresh.to_sexp(),
            "round {round}: editing {text:?} at {start}..{end} with {replacement:?}"
        );
        assert_eq!(visible_ranges(&incremental), visible_ranges(&fresh), "round {round}");
    }
}
