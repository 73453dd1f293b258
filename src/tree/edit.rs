//! Applying text edits to an existing tree
//!
//! ```text
//!        root*                 * = rebuilt, has_changes
//!       /     \
//!    stmt*    stmt             untouched siblings are shared (Arc clone)
//!    /   \
//!  tok*  tok
//! ```
//!
//! Edits are carried down the tree relative to each subtree's start, so a
//! subtree after the edit needs no rewrite: its parent's offset absorbs the
//! shift.

use text_size::{TextRange, TextSize};

use super::{Subtree, Tree};
use crate::base::Edit;

/// An edit expressed relative to the start of one subtree
#[derive(Debug, Clone, Copy)]
struct RelativeEdit {
    start: TextSize,
    old_end: TextSize,
    new_end: TextSize,
}

impl RelativeEdit {
    /// The same edit relative to a child starting at `offset`
    fn shifted(self, offset: TextSize) -> Self {
        Self {
            start: self.start - offset,
            old_end: self.old_end - offset,
            new_end: self.new_end - offset,
        }
    }
}

impl From<Edit> for RelativeEdit {
    fn from(edit: Edit) -> Self {
        Self {
            start: edit.start_byte,
            old_end: edit.old_end_byte,
            new_end: edit.new_end_byte,
        }
    }
}

impl Tree {
    /// The tree after `edit`, ready to be passed to a reparse.
    ///
    /// Only the nodes whose range or lookahead window the edit touches are
    /// rebuilt (and flagged `has_changes`); everything else is shared with
    /// `self`, which is left as it was.
    pub fn edit(&self, edit: &Edit) -> Tree {
        let edit = edit.clamped(self.root.size());
        tracing::trace!(?edit, "editing tree");
        let root = edit_subtree(&self.root, edit.into());
        Tree::new(root, self.language.clone(), self.status)
    }

    /// Ranges of `new` whose structure differs from this (edited) tree.
    ///
    /// Subtrees `new` shares with `self` at the same position are skipped.
    /// Leaves that are not shared are reported, and so are interior nodes
    /// that have no counterpart of the same kind and range in `self`.
    /// The result is sorted and merged.
    pub fn changed_ranges(&self, new: &Tree) -> Vec<TextRange> {
        let mut ranges = Vec::new();
        let mut stack = vec![(new.root(), TextSize::new(0))];
        while let Some((subtree, start)) = stack.pop() {
            if self.contains_at(subtree, start) {
                continue;
            }
            let range = TextRange::at(start, subtree.size());
            if subtree.children().is_empty() || !self.has_node(subtree.symbol(), range) {
                ranges.push(range);
                continue;
            }
            for (child, &offset) in subtree.children().iter().zip(subtree.offsets()).rev() {
                stack.push((child, start + offset));
            }
        }
        merge_ranges(ranges)
    }
}

/// A node being rebuilt: untouched children are shared, touched ones are
/// edited before the node is finished
struct EditFrame<'a> {
    subtree: &'a Subtree,
    edit: RelativeEdit,
    index: usize,
    /// An earlier child took the start of the edit; later touched children
    /// only lose their deleted prefix
    absorbed: bool,
    children: Vec<Subtree>,
}

impl<'a> EditFrame<'a> {
    fn new(subtree: &'a Subtree, edit: RelativeEdit) -> Self {
        Self {
            subtree,
            edit,
            index: 0,
            absorbed: false,
            children: Vec::with_capacity(subtree.children().len()),
        }
    }

    /// Share children up to the next one the edit touches, and return that
    /// child with the edit relative to it
    fn next_touched(&mut self) -> Option<(&'a Subtree, RelativeEdit)> {
        let subtree: &'a Subtree = self.subtree;
        let edit = self.edit;
        while let Some(child) = subtree.children().get(self.index) {
            let offset = subtree.offsets()[self.index];
            self.index += 1;
            let child_end = offset + child.size();
            let window_end = child_end + TextSize::new(child.lookahead_bytes());
            let touched = if self.absorbed {
                edit.old_end >= offset
            } else {
                edit.start <= window_end && edit.old_end >= offset
            };
            if !touched {
                self.children.push(child.clone());
                continue;
            }
            if self.absorbed {
                // The rest of the deleted range overlaps this child's prefix
                let deleted = (edit.old_end - offset).min(child.size());
                let prefix = RelativeEdit {
                    start: TextSize::new(0),
                    old_end: deleted,
                    new_end: TextSize::new(0),
                };
                return Some((child, prefix));
            }
            self.absorbed = edit.start <= child_end;
            return Some((child, edit.shifted(offset)));
        }
        None
    }

    fn finish(self) -> Subtree {
        let size = self.subtree.size();
        let edit = self.edit;
        let new_size = if edit.start > size {
            // Only the lookahead window was reached
            size
        } else if edit.old_end <= size {
            size - edit.old_end + edit.new_end
        } else {
            edit.new_end
        };

        let mut data = self.subtree.data().clone();
        data.size = new_size;
        data.flags.has_changes = true;

        if !self.subtree.children().is_empty() {
            let mut offsets = Vec::with_capacity(self.children.len());
            let mut position = TextSize::new(0);
            for child in &self.children {
                offsets.push(position);
                position += child.size();
            }
            debug_assert_eq!(position, new_size, "children must tile an edited node");
            data.children = self.children.into_boxed_slice();
            data.offsets = offsets.into_boxed_slice();
        }

        Subtree::from_data(data)
    }
}

fn edit_subtree(root: &Subtree, edit: RelativeEdit) -> Subtree {
    let mut root_frame = EditFrame::new(root, edit);
    let mut stack: Vec<EditFrame<'_>> = Vec::new();
    loop {
        let frame = stack.last_mut().unwrap_or(&mut root_frame);
        if let Some((child, edit)) = frame.next_touched() {
            stack.push(EditFrame::new(child, edit));
            continue;
        }
        let Some(done) = stack.pop() else {
            return root_frame.finish();
        };
        let edited = done.finish();
        stack.last_mut().unwrap_or(&mut root_frame).children.push(edited);
    }
}

/// Sort ranges and merge the ones that overlap or touch
fn merge_ranges(mut ranges: Vec<TextRange>) -> Vec<TextRange> {
    ranges.sort_by_key(|range| (range.start(), range.end()));
    let mut merged: Vec<TextRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start() <= last.end() => {
                *last = last.cover(range);
            }
            _ => merged.push(range),
        }
    }
    merged
}
