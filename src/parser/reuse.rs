//! Walking an edited tree in step with the parser

use std::sync::Arc;

use text_size::TextSize;

use crate::tree::{Edge, Subtree, Tree};

static ROOT_OFFSETS: [TextSize; 1] = [TextSize::new(0)];

struct Frame<'a> {
    siblings: &'a [Subtree],
    offsets: &'a [TextSize],
    /// Absolute start of the parent
    base: TextSize,
    index: usize,
}

/// Position in an old tree, moved forward as the parser consumes text
pub(crate) struct ReuseCursor<'a> {
    frames: Vec<Frame<'a>>,
    /// Scanner state before the current subtree in the old parse
    external_state: Option<Arc<[u8]>>,
}

impl<'a> ReuseCursor<'a> {
    pub(crate) fn new(tree: &'a Tree) -> Self {
        Self {
            frames: vec![Frame {
                siblings: std::slice::from_ref(tree.root()),
                offsets: &ROOT_OFFSETS,
                base: TextSize::new(0),
                index: 0,
            }],
            external_state: None,
        }
    }

    /// The current candidate and its absolute start
    pub(crate) fn current(&self) -> Option<(&'a Subtree, TextSize)> {
        let frame = self.frames.last()?;
        let siblings: &'a [Subtree] = frame.siblings;
        let subtree = siblings.get(frame.index)?;
        Some((subtree, frame.base + frame.offsets[frame.index]))
    }

    pub(crate) fn external_state(&self) -> Option<&Arc<[u8]>> {
        self.external_state.as_ref()
    }

    /// Move past the current subtree
    pub(crate) fn advance(&mut self) {
        if let Some((subtree, _)) = self.current() {
            if subtree.data().flags.has_external_tokens {
                self.external_state = subtree.data().external_state.clone();
            }
        }
        while let Some(frame) = self.frames.last_mut() {
            frame.index += 1;
            if frame.index < frame.siblings.len() {
                return;
            }
            self.frames.pop();
        }
    }

    /// Move to the first child of the current subtree, or past it if it is
    /// a leaf
    pub(crate) fn descend(&mut self) {
        let Some((subtree, start)) = self.current() else {
            return;
        };
        if subtree.children().is_empty() {
            self.advance();
            return;
        }
        self.frames.push(Frame {
            siblings: subtree.children(),
            offsets: subtree.offsets(),
            base: start,
            index: 0,
        });
    }

    /// Whether the old tree has an ERROR or MISSING node right before or
    /// right after the current subtree, ignoring clean extras
    pub(crate) fn borders_error(&self) -> bool {
        self.neighbor(Edge::Leading)
            .is_some_and(|subtree| subtree.error_on_edge(Edge::Trailing))
            || self
                .neighbor(Edge::Trailing)
                .is_some_and(|subtree| subtree.error_on_edge(Edge::Leading))
    }

    /// The nearest subtree before (`Leading`) or after (`Trailing`) the
    /// current one
    fn neighbor(&self, side: Edge) -> Option<&'a Subtree> {
        let relevant = |subtree: &&'a Subtree| !subtree.is_extra() || subtree.has_error();
        for frame in self.frames.iter().rev() {
            let siblings: &'a [Subtree] = frame.siblings;
            let found = match side {
                Edge::Leading => siblings[..frame.index].iter().rev().find(relevant),
                Edge::Trailing => siblings.get(frame.index + 1..).and_then(|rest| rest.iter().find(relevant)),
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }
}
