//! Positioned view of a subtree

use std::fmt;

use text_size::{TextRange, TextSize};

use super::cursor::TreeCursor;
use super::subtree::{NO_PRODUCTION, Subtree};
use super::Tree;
use crate::base::{LineIndex, Point};
use crate::language::{FieldId, Language, Symbol};

/// A visible node at an absolute position in a [`Tree`].
///
/// Nodes are cheap `Copy` handles. Their children are the visible nodes
/// below them, with hidden nodes flattened away.
#[derive(Clone, Copy)]
pub struct Node<'tree> {
    tree: &'tree Tree,
    subtree: &'tree Subtree,
    start: TextSize,
}

impl<'tree> Node<'tree> {
    pub(crate) fn new(tree: &'tree Tree, subtree: &'tree Subtree, start: TextSize) -> Self {
        Self {
            tree,
            subtree,
            start,
        }
    }

    pub(crate) fn tree(&self) -> &'tree Tree {
        self.tree
    }

    pub(crate) fn subtree(&self) -> &'tree Subtree {
        self.subtree
    }

    fn language(&self) -> &'tree Language {
        self.tree.language()
    }

    /// Identity of the underlying shared node
    pub fn id(&self) -> usize {
        self.subtree.id()
    }

    // =========================================================================
    // Kind and flags
    // =========================================================================

    pub fn kind(&self) -> &'tree str {
        self.language().symbol_name(self.subtree.symbol())
    }

    pub fn symbol(&self) -> Symbol {
        self.subtree.symbol()
    }

    pub fn is_named(&self) -> bool {
        self.language().is_named(self.subtree.symbol())
    }

    pub fn is_extra(&self) -> bool {
        self.subtree.is_extra()
    }

    pub fn is_error(&self) -> bool {
        self.subtree.symbol().is_error()
    }

    pub fn is_missing(&self) -> bool {
        self.subtree.is_missing()
    }

    pub fn has_error(&self) -> bool {
        self.subtree.has_error()
    }

    pub fn has_changes(&self) -> bool {
        self.subtree.has_changes()
    }

    // =========================================================================
    // Position
    // =========================================================================

    pub fn byte_range(&self) -> TextRange {
        TextRange::at(self.start, self.subtree.size())
    }

    pub fn start_byte(&self) -> usize {
        self.start.into()
    }

    pub fn end_byte(&self) -> usize {
        (self.start + self.subtree.size()).into()
    }

    pub fn start_point(&self, index: &LineIndex) -> Point {
        index.point(self.start)
    }

    pub fn end_point(&self, index: &LineIndex) -> Point {
        index.point(self.start + self.subtree.size())
    }

    /// The node's slice of `source`
    pub fn utf8_text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start_byte()..self.end_byte()).unwrap_or_default()
    }

    // =========================================================================
    // Children
    // =========================================================================

    pub fn child_count(&self) -> usize {
        self.subtree.data().visible_child_count as usize
    }

    pub fn named_child_count(&self) -> usize {
        self.subtree.data().named_child_count as usize
    }

    pub fn child(&self, index: usize) -> Option<Node<'tree>> {
        self.children().nth(index)
    }

    pub fn named_child(&self, index: usize) -> Option<Node<'tree>> {
        self.named_children().nth(index)
    }

    pub fn children(&self) -> impl Iterator<Item = Node<'tree>> + 'tree {
        self.children_with_fields().map(|(node, _)| node)
    }

    pub fn named_children(&self) -> impl Iterator<Item = Node<'tree>> + 'tree {
        self.children().filter(Node::is_named)
    }

    /// Visible children with the field each one fills
    pub(crate) fn children_with_fields(&self) -> ChildIter<'tree> {
        ChildIter::new(*self)
    }

    pub fn child_by_field_name(&self, name: &str) -> Option<Node<'tree>> {
        self.children_by_field_name(name).next()
    }

    pub fn children_by_field_name(&self, name: &str) -> impl Iterator<Item = Node<'tree>> + 'tree {
        let field = self.language().field_id(name);
        self.children_by_field_id(field)
    }

    pub(crate) fn children_by_field_id(
        &self,
        field: Option<FieldId>,
    ) -> impl Iterator<Item = Node<'tree>> + 'tree {
        self.children_with_fields()
            .filter(move |(_, child_field)| field.is_some() && *child_field == field)
            .map(|(node, _)| node)
    }

    pub fn field_name_for_child(&self, index: usize) -> Option<&'tree str> {
        let language = self.language();
        let (_, field) = self.children_with_fields().nth(index)?;
        language.field_name(field?)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// The nearest visible ancestor, found by descending from the root
    pub fn parent(&self) -> Option<Node<'tree>> {
        let root = self.tree.root_node();
        if *self == root {
            return None;
        }
        find_parent(self.tree, root, self)
    }

    pub fn next_sibling(&self) -> Option<Node<'tree>> {
        let mut siblings = self.parent()?.children();
        siblings.find(|sibling| sibling == self)?;
        siblings.next()
    }

    pub fn prev_sibling(&self) -> Option<Node<'tree>> {
        let mut previous = None;
        for sibling in self.parent()?.children() {
            if sibling == *self {
                return previous;
            }
            previous = Some(sibling);
        }
        None
    }

    pub fn next_named_sibling(&self) -> Option<Node<'tree>> {
        let mut siblings = self.parent()?.children();
        siblings.find(|sibling| sibling == self)?;
        siblings.find(Node::is_named)
    }

    pub fn prev_named_sibling(&self) -> Option<Node<'tree>> {
        let mut previous = None;
        for sibling in self.parent()?.children() {
            if sibling == *self {
                return previous;
            }
            if sibling.is_named() {
                previous = Some(sibling);
            }
        }
        None
    }

    /// Visible nodes below this one, plus itself
    pub fn descendant_count(&self) -> usize {
        self.subtree.data().visible_descendant_count as usize + 1
    }

    /// Smallest visible node spanning `range`
    pub fn descendant_for_byte_range(&self, range: TextRange) -> Option<Node<'tree>> {
        self.descendant_for_range(range, false)
    }

    /// Smallest named node spanning `range`
    pub fn named_descendant_for_byte_range(&self, range: TextRange) -> Option<Node<'tree>> {
        self.descendant_for_range(range, true)
    }

    fn descendant_for_range(&self, range: TextRange, named: bool) -> Option<Node<'tree>> {
        if !self.byte_range().contains_range(range) {
            return None;
        }
        let language = self.language();
        let mut result = *self;
        let mut current = self.subtree;
        let mut current_start = self.start;

        'descend: loop {
            let offsets = current.offsets();
            let relative = range.start().checked_sub(current_start).unwrap_or_default();
            let first = offsets.partition_point(|&offset| offset <= relative).saturating_sub(1);
            for (index, child) in current.children().iter().enumerate().skip(first) {
                let child_start = current_start + offsets[index];
                let child_end = child_start + child.size();
                if child_end < range.end() || child_end <= range.start() {
                    continue;
                }
                if range.start() < child_start {
                    break;
                }
                let symbol = child.symbol();
                if language.is_visible(symbol) && (!named || language.is_named(symbol)) {
                    result = Node::new(self.tree, child, child_start);
                }
                current = child;
                current_start = child_start;
                continue 'descend;
            }
            break;
        }
        Some(result)
    }

    /// First visible child that ends after `byte`
    pub fn first_child_for_byte(&self, byte: usize) -> Option<Node<'tree>> {
        self.children().find(|child| child.end_byte() > byte)
    }

    pub fn walk(&self) -> TreeCursor<'tree> {
        TreeCursor::new(*self)
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// S-expression of the named structure: `(kind field: (child) ...)`
    pub fn to_sexp(&self) -> String {
        let language = self.language();
        let mut out = String::new();
        if !open_sexp(&mut out, self, None) {
            return out;
        }
        let mut open = vec![self.children_with_fields()];
        while let Some(children) = open.last_mut() {
            let Some((child, field)) = children.next() else {
                open.pop();
                out.push(')');
                continue;
            };
            if !child.is_named() && !child.is_missing() {
                continue;
            }
            out.push(' ');
            if open_sexp(&mut out, &child, field.and_then(|f| language.field_name(f))) {
                open.push(child.children_with_fields());
            }
        }
        out
    }
}

/// Write the field label and the start of `node`; `false` if that already
/// wrote the whole node
fn open_sexp(out: &mut String, node: &Node<'_>, field: Option<&str>) -> bool {
    if let Some(field) = field {
        out.push_str(field);
        out.push_str(": ");
    }
    if node.is_missing() {
        out.push_str("(MISSING ");
        if node.is_named() {
            out.push_str(node.kind());
        } else {
            out.push('"');
            out.push_str(node.kind());
            out.push('"');
        }
        out.push(')');
        return false;
    }
    out.push('(');
    out.push_str(node.kind());
    true
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.subtree.ptr_eq(other.subtree) && self.start == other.start
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind(), self.byte_range())
    }
}

fn find_parent<'tree>(tree: &'tree Tree, root: Node<'tree>, target: &Node<'tree>) -> Option<Node<'tree>> {
    let target_end = target.start + target.subtree.size();
    let mut pending = vec![(root.subtree, root.start, root)];
    while let Some((subtree, start, nearest)) = pending.pop() {
        let mut inside = Vec::new();
        for (child, &offset) in subtree.children().iter().zip(subtree.offsets()) {
            let child_start = start + offset;
            if child_start > target.start {
                break;
            }
            if child_start + child.size() < target_end || child.size() < target.subtree.size() {
                continue;
            }
            if child.ptr_eq(target.subtree) && child_start == target.start {
                return Some(nearest);
            }
            let next = if tree.language().is_visible(child.symbol()) {
                Node::new(tree, child, child_start)
            } else {
                nearest
            };
            inside.push((child, child_start, next));
        }
        pending.extend(inside.into_iter().rev());
    }
    None
}

/// Field filled by the `structural`th non-extra child of `parent`
pub(crate) fn field_for_child(
    language: &Language,
    parent: &Subtree,
    structural: u16,
) -> Option<FieldId> {
    let production_id = parent.data().production_id;
    if production_id == NO_PRODUCTION || production_id as usize >= language.table().production_count() {
        return None;
    }
    language
        .production(production_id)
        .fields
        .iter()
        .find(|(child, _)| *child == structural)
        .map(|&(_, field)| field)
}

struct ChildFrame<'tree> {
    subtree: &'tree Subtree,
    start: TextSize,
    index: usize,
    structural: u16,
    inherited: Option<FieldId>,
}

/// Visible children of a node, descending through hidden ones
pub(crate) struct ChildIter<'tree> {
    tree: &'tree Tree,
    stack: Vec<ChildFrame<'tree>>,
}

impl<'tree> ChildIter<'tree> {
    fn new(node: Node<'tree>) -> Self {
        Self {
            tree: node.tree,
            stack: vec![ChildFrame {
                subtree: node.subtree,
                start: node.start,
                index: 0,
                structural: 0,
                inherited: None,
            }],
        }
    }
}

impl<'tree> Iterator for ChildIter<'tree> {
    type Item = (Node<'tree>, Option<FieldId>);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let language = tree.language();
        loop {
            let frame = self.stack.last_mut()?;
            let Some(child) = frame.subtree.children().get(frame.index) else {
                self.stack.pop();
                continue;
            };
            let child_start = frame.start + frame.subtree.offsets()[frame.index];
            frame.index += 1;
            let field = if child.is_extra() {
                None
            } else {
                let own = field_for_child(language, frame.subtree, frame.structural);
                frame.structural += 1;
                own.or(frame.inherited)
            };

            if language.is_visible(child.symbol()) {
                return Some((Node::new(tree, child, child_start), field));
            }
            if child.data().visible_child_count > 0 {
                self.stack.push(ChildFrame {
                    subtree: child,
                    start: child_start,
                    index: 0,
                    structural: 0,
                    inherited: field,
                });
            }
        }
    }
}
