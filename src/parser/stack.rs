//! The LR parse stack

use std::sync::Arc;

use text_size::TextSize;

use crate::language::StateId;
use crate::tree::{Edge, Subtree};

#[derive(Debug, Clone)]
pub(crate) struct StackEntry {
    /// State after this entry; extras repeat the state below them
    pub(crate) state: StateId,
    pub(crate) subtree: Subtree,
    /// Offset just past this entry
    pub(crate) position: TextSize,
    /// Scanner state after the last external token at or below this entry
    pub(crate) external_state: Option<Arc<[u8]>>,
}

#[derive(Debug, Default)]
pub(crate) struct ParseStack {
    entries: Vec<StackEntry>,
}

impl ParseStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn top_state(&self) -> StateId {
        self.entries.last().map_or(0, |entry| entry.state)
    }

    pub(crate) fn position(&self) -> TextSize {
        self.entries.last().map_or(TextSize::new(0), |entry| entry.position)
    }

    pub(crate) fn external_state(&self) -> Option<&Arc<[u8]>> {
        self.entries.last().and_then(|entry| entry.external_state.as_ref())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    pub(crate) fn push(&mut self, state: StateId, subtree: Subtree) {
        let position = self.position() + subtree.size();
        let external_state = if subtree.data().flags.has_external_tokens {
            subtree.data().external_state.clone()
        } else {
            self.external_state().cloned()
        };
        self.entries.push(StackEntry {
            state,
            subtree,
            position,
            external_state,
        });
    }

    /// Push an extra without changing the state
    pub(crate) fn push_extra(&mut self, subtree: Subtree) {
        self.push(self.top_state(), subtree);
    }

    pub(crate) fn pop(&mut self) -> Option<StackEntry> {
        self.entries.pop()
    }

    /// Pop the extras on top of the stack, in stack order
    pub(crate) fn pop_extras(&mut self) -> Vec<Subtree> {
        let mut extras = Vec::new();
        while self.entries.last().is_some_and(|entry| entry.subtree.is_extra()) {
            if let Some(entry) = self.entries.pop() {
                extras.push(entry.subtree);
            }
        }
        extras.reverse();
        extras
    }

    /// Pop entries until `count` structural ones have been removed; returns
    /// the popped subtrees in stack order, interior extras included
    pub(crate) fn pop_structural(&mut self, count: usize) -> Vec<Subtree> {
        let mut popped = Vec::new();
        let mut remaining = count;
        while remaining > 0 {
            let Some(entry) = self.entries.pop() else {
                break;
            };
            if !entry.subtree.is_extra() {
                remaining -= 1;
            }
            popped.push(entry.subtree);
        }
        popped.reverse();
        popped
    }

    /// Remove every entry, bottom first
    pub(crate) fn take_all(&mut self) -> Vec<Subtree> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .map(|entry| entry.subtree)
            .collect()
    }

    /// `0` followed by the state of every structural entry
    pub(crate) fn structural_states(&self) -> Vec<StateId> {
        std::iter::once(0)
            .chain(
                self.entries
                    .iter()
                    .filter(|entry| !entry.subtree.is_extra())
                    .map(|entry| entry.state),
            )
            .collect()
    }

    /// Whether the nearest entry that is not a clean extra ends in an
    /// ERROR or MISSING node
    pub(crate) fn follows_error(&self) -> bool {
        self.entries
            .iter()
            .rev()
            .find(|entry| !entry.subtree.is_extra() || entry.subtree.has_error())
            .is_some_and(|entry| entry.subtree.error_on_edge(Edge::Trailing))
    }
}
