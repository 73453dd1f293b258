//! Stateful traversal over visible nodes
//!
//! [`TreeCursor`] keeps an explicit stack of frames from the node it was
//! created on down to the current node, including the hidden nodes in
//! between, so moving to a parent or sibling never re-descends from the
//! root. [`Preorder`] drives a cursor as a lazy depth-first iterator.

use text_size::{TextRange, TextSize};

use super::node::{Node, field_for_child};
use super::subtree::Subtree;
use super::Tree;
use crate::language::FieldId;

#[derive(Clone)]
struct Frame<'tree> {
    subtree: &'tree Subtree,
    start: TextSize,
    /// Index in the parent's children
    child_index: usize,
    /// Index among the parent's non-extra children
    structural_index: u16,
    field: Option<FieldId>,
}

/// Cursor over the visible nodes below (and including) a starting node
#[derive(Clone)]
pub struct TreeCursor<'tree> {
    tree: &'tree Tree,
    stack: Vec<Frame<'tree>>,
}

impl<'tree> TreeCursor<'tree> {
    pub(crate) fn new(node: Node<'tree>) -> Self {
        Self {
            tree: node.tree(),
            stack: vec![Frame {
                subtree: node.subtree(),
                start: node.byte_range().start(),
                child_index: 0,
                structural_index: 0,
                field: None,
            }],
        }
    }

    /// Restart at `node`
    pub fn reset(&mut self, node: Node<'tree>) {
        *self = Self::new(node);
    }

    pub fn node(&self) -> Node<'tree> {
        let frame = self.top();
        Node::new(self.tree, frame.subtree, frame.start)
    }

    /// Field of the current node within its visible parent
    pub fn field_name(&self) -> Option<&'tree str> {
        self.tree.language().field_name(self.field_id()?)
    }

    pub fn field_id(&self) -> Option<FieldId> {
        if self.stack.len() < 2 {
            return None;
        }
        self.top().field
    }

    /// Depth of the current node below the node the cursor started on
    pub fn depth(&self) -> usize {
        let language = self.tree.language();
        self.stack[1..]
            .iter()
            .filter(|frame| language.is_visible(frame.subtree.symbol()))
            .count()
    }

    fn top(&self) -> &Frame<'tree> {
        &self.stack[self.stack.len() - 1]
    }

    fn is_visible(&self, subtree: &Subtree) -> bool {
        self.tree.language().is_visible(subtree.symbol())
    }

    /// Frame for child `index` of the current top frame
    fn child_frame(&self, index: usize, structural_index: u16) -> Frame<'tree> {
        let parent = self.top();
        let parent_subtree: &'tree Subtree = parent.subtree;
        let child = &parent_subtree.children()[index];
        let inherited = if self.stack.len() > 1 && !self.is_visible(parent.subtree) {
            parent.field
        } else {
            None
        };
        let field = if child.is_extra() {
            None
        } else {
            field_for_child(self.tree.language(), parent.subtree, structural_index).or(inherited)
        };
        Frame {
            subtree: child,
            start: parent.start + parent_subtree.offsets()[index],
            child_index: index,
            structural_index,
            field,
        }
    }

    /// Descend from the top frame to its first visible descendant, starting
    /// at child `from` with `structural` non-extra children before it
    fn descend_from(&mut self, mut from: usize, mut structural: u16) -> bool {
        loop {
            let subtree: &'tree Subtree = self.top().subtree;
            let children = subtree.children();
            let mut descended = false;
            while from < children.len() {
                let child = &children[from];
                let frame = self.child_frame(from, structural);
                if !child.is_extra() {
                    structural += 1;
                }
                from += 1;
                if self.is_visible(child) {
                    self.stack.push(frame);
                    return true;
                }
                if child.data().visible_child_count > 0 {
                    self.stack.push(frame);
                    descended = true;
                    break;
                }
            }
            if !descended {
                return false;
            }
            from = 0;
            structural = 0;
        }
    }

    pub fn goto_first_child(&mut self) -> bool {
        self.descend_from(0, 0)
    }

    pub fn goto_next_sibling(&mut self) -> bool {
        let snapshot = self.stack.clone();
        while self.stack.len() > 1 {
            let Some(frame) = self.stack.pop() else {
                break;
            };
            let next_structural = frame.structural_index + u16::from(!frame.subtree.is_extra());
            if self.descend_from(frame.child_index + 1, next_structural) {
                return true;
            }
            // Only climb out of hidden parents
            if self.stack.len() == 1 || self.is_visible(self.top().subtree) {
                break;
            }
        }
        self.stack = snapshot;
        false
    }

    pub fn goto_parent(&mut self) -> bool {
        while self.stack.len() > 1 {
            self.stack.pop();
            if self.stack.len() == 1 || self.is_visible(self.top().subtree) {
                return true;
            }
        }
        false
    }

    /// Move to the first child that ends after `byte`; returns its index
    pub fn goto_first_child_for_byte(&mut self, byte: usize) -> Option<usize> {
        if !self.goto_first_child() {
            return None;
        }
        let mut index = 0;
        loop {
            if self.node().end_byte() > byte {
                return Some(index);
            }
            if !self.goto_next_sibling() {
                self.goto_parent();
                return None;
            }
            index += 1;
        }
    }
}

/// Lazy pre-order traversal of visible nodes.
///
/// Optionally restricted to byte ranges: subtrees that intersect none of
/// them are skipped without being visited.
#[derive(Clone)]
pub struct Preorder<'tree> {
    cursor: TreeCursor<'tree>,
    ranges: Vec<TextRange>,
    started: bool,
    done: bool,
}

impl<'tree> Preorder<'tree> {
    pub fn new(node: Node<'tree>) -> Self {
        Self {
            cursor: TreeCursor::new(node),
            ranges: Vec::new(),
            started: false,
            done: false,
        }
    }

    /// Only visit nodes intersecting one of `ranges` (all nodes if empty)
    pub fn with_ranges(mut self, ranges: Vec<TextRange>) -> Self {
        self.ranges = ranges;
        self
    }

    /// Restart from `node`, keeping the range restriction
    pub fn reset(&mut self, node: Node<'tree>) {
        self.cursor.reset(node);
        self.started = false;
        self.done = false;
    }

    /// The cursor positioned on the most recently yielded node
    pub fn cursor(&self) -> &TreeCursor<'tree> {
        &self.cursor
    }

    fn wanted(&self, node: &Node<'_>) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(|&range| intersects(node.byte_range(), range))
    }

    /// Advance to the next sibling, or the next sibling of an ancestor
    fn advance_past(&mut self) -> bool {
        loop {
            if self.cursor.goto_next_sibling() {
                return true;
            }
            if !self.cursor.goto_parent() {
                return false;
            }
        }
    }
}

impl<'tree> Iterator for Preorder<'tree> {
    type Item = Node<'tree>;

    fn next(&mut self) -> Option<Node<'tree>> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            let node = self.cursor.node();
            if self.wanted(&node) {
                return Some(node);
            }
            self.done = true;
            return None;
        }
        let mut moved = self.cursor.goto_first_child() || self.advance_past();
        while moved {
            let node = self.cursor.node();
            if self.wanted(&node) {
                return Some(node);
            }
            moved = self.advance_past();
        }
        self.done = true;
        None
    }
}

/// Ranges overlap, or an empty one lies within the other
fn intersects(a: TextRange, b: TextRange) -> bool {
    if a.is_empty() || b.is_empty() {
        return a.start() <= b.end() && b.start() <= a.end();
    }
    a.start() < b.end() && b.start() < a.end()
}
