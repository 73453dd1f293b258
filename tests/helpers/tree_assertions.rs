//! Structural assertions over parsed trees.

use canopy::grammars::wren;
use canopy::tree::Subtree;
use canopy::{Node, Parser, TextSize, Tree};

/// Parse `text` from scratch with the Wren grammar.
pub fn parse_fresh(text: &str) -> Tree {
    Parser::new(wren::language()).parse(text, None)
}

/// Assert every node is exactly covered by its children and the root
/// covers the whole text.
pub fn assert_tiles(tree: &Tree, text: &str) {
    assert_eq!(tree.root().size(), TextSize::of(text), "root does not cover the text");
    let mut stack = vec![tree.root()];
    while let Some(subtree) = stack.pop() {
        if subtree.children().is_empty() {
            continue;
        }
        let covered: TextSize = subtree.children().iter().map(Subtree::size).sum();
        assert_eq!(covered, subtree.size(), "children do not tile their parent");
        stack.extend(subtree.children());
    }
}

/// Assert visible nodes nest inside their parents and siblings are ordered.
pub fn assert_nested(node: Node<'_>) {
    let mut previous_end = node.start_byte();
    for child in node.children() {
        assert!(child.start_byte() >= previous_end, "{} overlaps its sibling", child.kind());
        assert!(child.end_byte() <= node.end_byte(), "{} escapes {}", child.kind(), node.kind());
        previous_end = child.end_byte();
        assert_nested(child);
    }
}

/// Assert `text` has a clean parse.
pub fn assert_no_errors(text: &str) {
    let tree = parse_fresh(text);
    let errors = tree.diagnostics();
    assert!(
        errors.is_empty(),
        "Expected no errors, got {}:\n{}",
        errors.len(),
        errors
            .iter()
            .map(|error| format!("  {error}"))
            .collect::<Vec<_>>()
            .join("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::source_fixtures::STATEMENTS;

    #[test]
    fn test_assert_no_errors_passes_for_valid_source() {
        assert_no_errors(STATEMENTS);
    }

    #[test]
    fn test_assert_tiles_accepts_fresh_parse() {
        let tree = parse_fresh(STATEMENTS);
        assert_tiles(&tree, STATEMENTS);
    }
}
