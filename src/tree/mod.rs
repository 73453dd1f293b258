//! Concrete syntax trees
//!
//! ```text
//! Tree ── root: Subtree ── children: [Subtree] (relative offsets)
//!  │                          │
//!  │    Node<'tree> = (tree, &Subtree, absolute start)
//!  │
//!  ├── walk()       → TreeCursor (visible nodes, explicit frame stack)
//!  ├── preorder()   → Preorder (lazy, restartable DFS)
//!  ├── edit()       → copy-on-write spine with `has_changes` marks
//!  └── changed_ranges(new) → ranges whose structure differs
//! ```
//!
//! Trees are immutable and cheap to clone. Hidden nodes (names starting with
//! `_`, repetition helpers) stay in the structure but are flattened away by
//! [`Node`] and [`TreeCursor`].

mod cursor;
mod diagnostics;
mod edit;
mod node;
mod subtree;

use text_size::{TextRange, TextSize};

use crate::language::Language;

pub use cursor::{Preorder, TreeCursor};
pub use node::Node;
pub use subtree::Subtree;
pub(crate) use subtree::{Edge, NO_PRODUCTION};

/// Whether a parse ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseStatus {
    #[default]
    Complete,
    /// Stopped by a cancellation token or timeout; the tree is partial
    Cancelled,
}

/// A parsed syntax tree
#[derive(Clone)]
pub struct Tree {
    root: Subtree,
    language: Language,
    status: ParseStatus,
}

impl Tree {
    pub(crate) fn new(root: Subtree, language: Language, status: ParseStatus) -> Self {
        Self {
            root,
            language,
            status,
        }
    }

    pub fn root_node(&self) -> Node<'_> {
        Node::new(self, &self.root, TextSize::new(0))
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn status(&self) -> ParseStatus {
        self.status
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == ParseStatus::Cancelled
    }

    /// Length of the parsed text
    pub fn len(&self) -> TextSize {
        self.root.size()
    }

    pub fn is_empty(&self) -> bool {
        self.root.size() == TextSize::new(0)
    }

    pub fn root(&self) -> &Subtree {
        &self.root
    }

    pub fn walk(&self) -> TreeCursor<'_> {
        self.root_node().walk()
    }

    pub fn preorder(&self) -> Preorder<'_> {
        Preorder::new(self.root_node())
    }

    /// S-expression of the visible, named structure
    pub fn to_sexp(&self) -> String {
        self.root_node().to_sexp()
    }

    /// Does the tree contain `subtree` starting at `start`?
    pub(crate) fn contains_at(&self, subtree: &Subtree, start: TextSize) -> bool {
        let end = start + subtree.size();
        let mut current = &self.root;
        let mut current_start = TextSize::new(0);
        loop {
            if current.ptr_eq(subtree) && current_start == start {
                return true;
            }
            let next = current
                .children()
                .iter()
                .zip(current.offsets())
                .map(|(child, &offset)| (child, current_start + offset))
                .find(|(child, child_start)| {
                    *child_start <= start
                        && end <= *child_start + child.size()
                        && child.size() >= subtree.size()
                });
            match next {
                Some((child, child_start)) => {
                    current = child;
                    current_start = child_start;
                }
                None => return false,
            }
        }
    }

    /// Does the tree have a node of `symbol` spanning exactly `range`?
    pub(crate) fn has_node(&self, symbol: crate::language::Symbol, range: TextRange) -> bool {
        let mut current = &self.root;
        let mut current_start = TextSize::new(0);
        loop {
            if current.symbol() == symbol && TextRange::at(current_start, current.size()) == range {
                return true;
            }
            let next = current
                .children()
                .iter()
                .zip(current.offsets())
                .map(|(child, &offset)| (child, current_start + offset))
                .find(|(child, child_start)| {
                    *child_start <= range.start() && range.end() <= *child_start + child.size()
                });
            match next {
                Some((child, child_start)) => {
                    current = child;
                    current_start = child_start;
                }
                None => return false,
            }
        }
    }
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("language", &self.language.name())
            .field("status", &self.status)
            .field("root", &self.to_sexp())
            .finish()
    }
}

#[cfg(test)]
mod tests;
