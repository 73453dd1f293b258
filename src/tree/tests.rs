use text_size::{TextRange, TextSize};

use super::*;
use crate::base::{Edit, LineIndex, Point};
use crate::diagnostics::ErrorCode;
use crate::grammars::wren;
use crate::parser::Parser;

const SOURCE: &str = "var a = 1\nif (a) b";

fn parse(text: &str) -> Tree {
    Parser::new(wren::language()).parse(text, None)
}

fn range(start: u32, end: u32) -> TextRange {
    TextRange::new(start.into(), end.into())
}

/// Every node's children cover it exactly, in order
fn assert_tiles(subtree: &Subtree) {
    let mut stack = vec![subtree];
    while let Some(subtree) = stack.pop() {
        if subtree.children().is_empty() {
            continue;
        }
        let mut position = TextSize::new(0);
        for (child, &offset) in subtree.children().iter().zip(subtree.offsets()) {
            assert_eq!(offset, position);
            position += child.size();
            stack.push(child);
        }
        assert_eq!(position, subtree.size());
    }
}

// =============================================================================
// Nodes
// =============================================================================

#[test]
fn test_root_node() {
    let tree = parse(SOURCE);
    let root = tree.root_node();
    assert_eq!(root.kind(), "source_file");
    assert_eq!(root.byte_range(), range(0, 18));
    assert_eq!(root.child_count(), 2);
    assert_eq!(root.named_child_count(), 2);
    assert!(root.parent().is_none());
    assert!(!root.has_error());
    assert!(!root.is_extra());
}

#[test]
fn test_children_and_fields() {
    let tree = parse(SOURCE);
    let var = tree.root_node().named_child(0).unwrap();
    assert_eq!(var.kind(), "var_statement");
    assert_eq!(var.child_count(), 4);
    let kinds: Vec<_> = var.children().map(|child| child.kind()).collect();
    assert_eq!(kinds, vec!["var", "identifier", "=", "number"]);
    assert_eq!(var.field_name_for_child(1), Some("name"));
    assert_eq!(var.field_name_for_child(0), None);

    let name = var.child_by_field_name("name").unwrap();
    assert_eq!(name.utf8_text(SOURCE), "a");
    assert_eq!(name.parent(), Some(var));
    let value = var.child_by_field_name("value").unwrap();
    assert_eq!(value.kind(), "number");
    assert_eq!(value.byte_range(), range(8, 9));
    assert!(var.child_by_field_name("condition").is_none());
}

#[test]
fn test_hidden_nodes_are_flattened() {
    let tree = parse(SOURCE);
    let statement = tree.root_node().named_child(1).unwrap();
    assert_eq!(statement.kind(), "if_statement");
    // `_expression` and `_statement` never show up
    let condition = statement.child_by_field_name("condition").unwrap();
    assert_eq!(condition.kind(), "identifier");
    let consequence = statement.child_by_field_name("consequence").unwrap();
    assert_eq!(consequence.kind(), "expression_statement");
    assert_eq!(consequence.parent(), Some(statement));
}

#[test]
fn test_siblings() {
    let tree = parse(SOURCE);
    let root = tree.root_node();
    let var = root.child(0).unwrap();
    let if_statement = var.next_sibling().unwrap();
    assert_eq!(if_statement.kind(), "if_statement");
    assert_eq!(if_statement.prev_sibling(), Some(var));
    assert!(if_statement.next_sibling().is_none());

    let keyword = var.child(0).unwrap();
    assert_eq!(keyword.kind(), "var");
    assert!(!keyword.is_named());
    assert_eq!(keyword.next_named_sibling().map(|node| node.kind()), Some("identifier"));
    assert_eq!(var.child(3).unwrap().prev_named_sibling().map(|node| node.kind()), Some("identifier"));
}

#[test]
fn test_descendant_for_range() {
    let tree = parse(SOURCE);
    let root = tree.root_node();
    let name = root.descendant_for_byte_range(range(4, 5)).unwrap();
    assert_eq!(name.kind(), "identifier");
    assert_eq!(name.utf8_text(SOURCE), "a");

    let keyword = root.descendant_for_byte_range(range(0, 3)).unwrap();
    assert_eq!(keyword.kind(), "var");
    let named = root.named_descendant_for_byte_range(range(0, 3)).unwrap();
    assert_eq!(named.kind(), "var_statement");

    assert!(root.descendant_for_byte_range(range(0, 40)).is_none());
}

#[test]
fn test_points() {
    let tree = parse(SOURCE);
    let index = LineIndex::new(SOURCE);
    let statement = tree.root_node().named_child(1).unwrap();
    assert_eq!(statement.start_point(&index), Point::new(1, 0));
    assert_eq!(statement.end_point(&index), Point::new(1, 8));
}

#[test]
fn test_sexp_of_subtree() {
    let tree = parse(SOURCE);
    let statement = tree.root_node().named_child(1).unwrap();
    assert_eq!(
        statement.to_sexp(),
        "(if_statement condition: (identifier) consequence: (expression_statement (identifier)))"
    );
}

#[test]
fn test_tree_clone_shares_root() {
    let tree = parse(SOURCE);
    let copy = tree.clone();
    assert!(copy.root().ptr_eq(tree.root()));
    assert_eq!(copy.root_node().id(), tree.root_node().id());
}

// =============================================================================
// Cursor and traversal
// =============================================================================

#[test]
fn test_cursor_walk() {
    let tree = parse(SOURCE);
    let mut cursor = tree.walk();
    assert_eq!(cursor.node().kind(), "source_file");
    assert_eq!(cursor.depth(), 0);

    assert!(cursor.goto_first_child());
    assert_eq!(cursor.node().kind(), "var_statement");
    assert_eq!(cursor.depth(), 1);

    assert!(cursor.goto_first_child());
    assert_eq!(cursor.node().kind(), "var");
    assert_eq!(cursor.field_name(), None);
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.field_name(), Some("name"));
    assert_eq!(cursor.depth(), 2);

    assert!(cursor.goto_parent());
    assert_eq!(cursor.node().kind(), "var_statement");
    assert!(cursor.goto_next_sibling());
    assert_eq!(cursor.node().kind(), "if_statement");
    assert!(!cursor.goto_next_sibling());
    assert!(cursor.goto_parent());
    assert!(!cursor.goto_parent());
}

#[test]
fn test_cursor_child_for_byte() {
    let tree = parse(SOURCE);
    let mut cursor = tree.walk();
    assert_eq!(cursor.goto_first_child_for_byte(12), Some(1));
    assert_eq!(cursor.node().kind(), "if_statement");

    cursor.reset(tree.root_node());
    assert_eq!(cursor.goto_first_child_for_byte(100), None);
    assert_eq!(cursor.node().kind(), "source_file");
}

#[test]
fn test_preorder() {
    let tree = parse(SOURCE);
    let kinds: Vec<_> = tree.preorder().map(|node| node.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            "source_file",
            "var_statement",
            "var",
            "identifier",
            "=",
            "number",
            "if_statement",
            "if",
            "(",
            "identifier",
            ")",
            "expression_statement",
            "identifier",
        ]
    );
}

#[test]
fn test_preorder_with_ranges() {
    let tree = parse(SOURCE);
    let kinds: Vec<_> = tree
        .preorder()
        .with_ranges(vec![range(17, 18)])
        .map(|node| node.kind())
        .collect();
    assert_eq!(kinds, vec!["source_file", "if_statement", "expression_statement", "identifier"]);
}

#[test]
fn test_preorder_reset() {
    let tree = parse(SOURCE);
    let mut preorder = tree.preorder();
    assert_eq!(preorder.by_ref().count(), 13);
    assert!(preorder.next().is_none());

    let statement = tree.root_node().named_child(1).unwrap();
    preorder.reset(statement);
    assert_eq!(preorder.next(), Some(statement));
    assert_eq!(preorder.count(), 6);
}

// =============================================================================
// Editing
// =============================================================================

#[test]
fn test_edit_leaves_original_untouched() {
    let tree = parse(SOURCE);
    let before = tree.to_sexp();
    let edited = tree.edit(&Edit::replace(range(4, 5), TextSize::new(3)));

    assert_eq!(tree.len(), TextSize::new(18));
    assert!(!tree.root_node().has_changes());
    assert_eq!(tree.to_sexp(), before);

    assert_eq!(edited.len(), TextSize::new(20));
    assert!(edited.root_node().has_changes());
    assert_tiles(edited.root());
}

#[test]
fn test_edit_marks_only_touched_nodes() {
    let tree = parse(SOURCE);
    let edited = tree.edit(&Edit::replace(range(4, 5), TextSize::new(3)));
    let var = edited.root_node().named_child(0).unwrap();
    assert!(var.has_changes());
    assert_eq!(var.byte_range(), range(0, 11));

    let statement = edited.root_node().named_child(1).unwrap();
    assert!(!statement.has_changes());
    assert_eq!(statement.byte_range(), range(12, 20));
    let old_statement = tree.root_node().named_child(1).unwrap();
    assert_eq!(statement.id(), old_statement.id());
}

#[test]
fn test_edit_spanning_children() {
    let tree = parse(SOURCE);
    let edited = tree.edit(&Edit::delete(range(6, 14)));
    assert_eq!(edited.len(), TextSize::new(10));
    assert_tiles(edited.root());
}

#[test]
fn test_edit_is_clamped() {
    let tree = parse("var a");
    let edited = tree.edit(&Edit::new(3.into(), 50.into(), 60.into()));
    assert_tiles(edited.root());
    assert!(edited.root_node().has_changes());
}

#[test]
fn test_insert_at_end() {
    let tree = parse("var a");
    let edited = tree.edit(&Edit::insert(TextSize::new(5), TextSize::new(4)));
    assert_eq!(edited.len(), TextSize::new(9));
    assert_tiles(edited.root());
}

#[test]
fn test_changed_ranges_for_reparse() {
    let mut parser = Parser::new(wren::language());
    let old = parser.parse(SOURCE, None);
    let (text, edit) = Edit::apply(SOURCE, range(8, 9), "2");
    let edited = old.edit(&edit);
    let new = parser.parse(&text, Some(&edited));

    let ranges = edited.changed_ranges(&new);
    assert!(!ranges.is_empty());
    assert!(ranges.iter().any(|changed| changed.contains(TextSize::new(8))));
    // The `if` statement was reused
    assert!(ranges.iter().all(|changed| changed.end() <= TextSize::new(10)));
}

#[test]
fn test_changed_ranges_of_identical_trees() {
    let tree = parse(SOURCE);
    assert!(tree.changed_ranges(&tree).is_empty());
    assert!(tree.changed_ranges(&tree.clone()).is_empty());
}

#[test]
fn test_changed_ranges_of_unrelated_parse() {
    let old = parse("var a");
    let new = parse("var a = 1");
    let ranges = old.changed_ranges(&new);
    assert_eq!(ranges, vec![range(0, 9)]);
}

// =============================================================================
// Diagnostics
// =============================================================================

#[test]
fn test_clean_tree_has_no_diagnostics() {
    assert!(parse(SOURCE).diagnostics().is_empty());
}

#[test]
fn test_diagnostics_in_source_order() {
    let tree = parse("var a = 1 @\nvar b = 2 )");
    let codes: Vec<_> = tree.diagnostics().iter().map(|error| error.code).collect();
    assert_eq!(codes, vec![ErrorCode::E0101, ErrorCode::E0201]);
}

// =============================================================================
// Deep trees
// =============================================================================

const DEEP: usize = 20_000;

fn deeply_nested() -> String {
    format!("var x = {}1{}", "(".repeat(DEEP), ")".repeat(DEEP))
}

/// Run `f` on a thread with a 2 MiB stack
fn on_small_stack(f: impl FnOnce() + Send + 'static) {
    std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap();
}

#[test]
fn test_sexp_of_deep_tree() {
    on_small_stack(|| {
        let tree = parse(&deeply_nested());
        let sexp = tree.to_sexp();
        assert!(sexp.starts_with("(source_file (var_statement name: (identifier) value: (parenthesized_expression"));
        assert_eq!(sexp.matches("(parenthesized_expression").count(), DEEP);
        assert!(sexp.ends_with(&format!("(number){}))", ")".repeat(DEEP))));
    });
}

#[test]
fn test_parent_of_deepest_node() {
    on_small_stack(|| {
        let tree = parse(&deeply_nested());
        let offset = 8 + DEEP as u32;
        let number = tree
            .root_node()
            .descendant_for_byte_range(range(offset, offset + 1))
            .unwrap();
        assert_eq!(number.kind(), "number");
        let parent = number.parent().unwrap();
        assert_eq!(parent.kind(), "parenthesized_expression");
        assert_eq!(parent.byte_range(), range(offset - 1, offset + 2));
    });
}

#[test]
fn test_edit_and_reparse_deep_tree() {
    on_small_stack(|| {
        let text = deeply_nested();
        let mut parser = Parser::new(wren::language());
        let old = parser.parse(&text, None);
        let offset = 8 + DEEP as u32;
        let (new_text, edit) = Edit::apply(&text, range(offset, offset + 1), "42");
        let edited = old.edit(&edit);
        assert_tiles(edited.root());
        assert!(edited.root_node().has_changes());

        let new = parser.parse(&new_text, Some(&edited));
        assert!(!new.root_node().has_error());
        assert_eq!(new.len(), TextSize::of(new_text.as_str()));
        assert_eq!(new.to_sexp(), parse(&new_text).to_sexp());
    });
}
