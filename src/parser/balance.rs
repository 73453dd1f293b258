//! Rebalancing repetition chains
//!
//! An LR parser builds `R -> R R` repetitions as left-leaning chains, one
//! level per item. After a parse, every chain made of freshly built nodes is
//! flattened into its chunks and rebuilt as a tree split by descendant
//! weight, so a list of n statements is O(log n) deep.
//!
//! ```text
//!         R                      R
//!        / \                   /   \
//!       R   d       ──▶       R     R
//!      / \                   / \   / \
//!     R   c                 a   b c   d
//!    / \
//!   a   b
//! ```
//!
//! Reused subtrees are never entered, so nodes shared with an older tree
//! keep their identity.

use rustc_hash::FxHashSet;

use crate::language::{Language, ProductionId, Symbol};
use crate::tree::Subtree;

enum Frame {
    Enter(Subtree),
    /// Rebuild `original` from the last `count` results if any changed
    Exit { original: Subtree, count: usize },
    /// Rebuild a flattened chain from the last `count` results
    ExitChain { original: Subtree, count: usize },
}

/// Balance the fresh repetition chains below `root`. `fresh` holds the ids
/// of nodes built by the parse that produced `root`.
pub(crate) fn balance(language: &Language, root: Subtree, fresh: &FxHashSet<usize>) -> Subtree {
    let fallback = root.clone();
    let mut frames = vec![Frame::Enter(root)];
    let mut results: Vec<Subtree> = Vec::new();

    while let Some(frame) = frames.pop() {
        match frame {
            Frame::Enter(subtree) => {
                if subtree.children().is_empty() || !fresh.contains(&subtree.id()) {
                    results.push(subtree);
                    continue;
                }
                if is_chain_link(language, &subtree, fresh) {
                    let chunks = flatten_chain(language, &subtree, fresh);
                    frames.push(Frame::ExitChain {
                        count: chunks.len(),
                        original: subtree,
                    });
                    frames.extend(chunks.into_iter().rev().map(Frame::Enter));
                } else {
                    let children = subtree.children().to_vec();
                    frames.push(Frame::Exit {
                        count: children.len(),
                        original: subtree,
                    });
                    frames.extend(children.into_iter().rev().map(Frame::Enter));
                }
            }
            Frame::Exit { original, count } => {
                let children = results.split_off(results.len() - count);
                let unchanged = children
                    .iter()
                    .zip(original.children())
                    .all(|(new, old)| new.ptr_eq(old));
                if unchanged {
                    results.push(original);
                } else {
                    results.push(rebuild(language, &original, children));
                }
            }
            Frame::ExitChain { original, count } => {
                let chunks = results.split_off(results.len() - count);
                results.push(build_chain(language, &original, chunks));
            }
        }
    }

    results.pop().unwrap_or(fallback)
}

/// A fresh `R -> R R` node
fn is_chain_link(language: &Language, subtree: &Subtree, fresh: &FxHashSet<usize>) -> bool {
    fresh.contains(&subtree.id())
        && language.binary_repeat(subtree.symbol()) == Some(subtree.data().production_id)
}

/// The chunks of a chain in source order: its items, reused repetition
/// nodes and the extras between them
fn flatten_chain(language: &Language, root: &Subtree, fresh: &FxHashSet<usize>) -> Vec<Subtree> {
    let symbol = root.symbol();
    let mut chunks = Vec::new();
    let mut pending: Vec<&Subtree> = root.children().iter().rev().collect();
    while let Some(subtree) = pending.pop() {
        if subtree.symbol() == symbol && is_chain_link(language, subtree, fresh) {
            pending.extend(subtree.children().iter().rev());
        } else {
            chunks.push(subtree.clone());
        }
    }
    chunks
}

fn rebuild(language: &Language, original: &Subtree, children: Vec<Subtree>) -> Subtree {
    let data = original.data();
    let mut node = Subtree::node(
        language,
        data.symbol,
        children,
        data.production_id,
        data.parse_state,
    )
    .with_min_lookahead(data.lookahead_bytes);
    if data.flags.extra {
        node.update(|data| data.flags.extra = true);
    }
    node
}

/// Items of a flattened chain, with the extras between them
struct Chain {
    symbol: Symbol,
    production_id: ProductionId,
    items: Vec<Subtree>,
    /// `gaps[i]` holds the extras between `items[i]` and `items[i + 1]`
    gaps: Vec<Vec<Subtree>>,
    /// Prefix sums of item weights
    weights: Vec<usize>,
}

fn build_chain(language: &Language, original: &Subtree, chunks: Vec<Subtree>) -> Subtree {
    let mut leading = Vec::new();
    let mut items = Vec::new();
    let mut gaps: Vec<Vec<Subtree>> = Vec::new();
    let mut trailing = Vec::new();
    for chunk in chunks {
        if !chunk.is_extra() {
            if !items.is_empty() {
                gaps.push(std::mem::take(&mut trailing));
            }
            items.push(chunk);
        } else if items.is_empty() {
            leading.push(chunk);
        } else {
            trailing.push(chunk);
        }
    }
    if items.len() < 2 {
        return original.clone();
    }

    let mut weights = Vec::with_capacity(items.len() + 1);
    weights.push(0);
    for item in &items {
        let total = weights[weights.len() - 1] + item.descendant_count();
        weights.push(total);
    }

    let chain = Chain {
        symbol: original.symbol(),
        production_id: original.data().production_id,
        items,
        gaps,
        weights,
    };
    let top = chain.build(language, 0, chain.items.len(), leading, trailing);
    tracing::trace!(
        symbol = language.symbol_name(chain.symbol),
        items = chain.items.len(),
        "balanced repetition"
    );
    top.with_min_lookahead(original.lookahead_bytes())
}

impl Chain {
    fn build(
        &self,
        language: &Language,
        lo: usize,
        hi: usize,
        leading: Vec<Subtree>,
        trailing: Vec<Subtree>,
    ) -> Subtree {
        if hi - lo == 1 {
            return self.items[lo].clone();
        }
        let split = self.split(lo, hi);
        let mut children = leading;
        children.push(self.build(language, lo, split, Vec::new(), Vec::new()));
        children.extend(self.gaps[split - 1].iter().cloned());
        children.push(self.build(language, split, hi, Vec::new(), Vec::new()));
        children.extend(trailing);
        Subtree::node(
            language,
            self.symbol,
            children,
            self.production_id,
            self.items[lo].parse_state(),
        )
    }

    /// First index where the left side carries at least half the weight,
    /// kept strictly inside `lo..hi`
    fn split(&self, lo: usize, hi: usize) -> usize {
        let base = self.weights[lo];
        let total = self.weights[hi] - base;
        let mut split = lo + 1;
        while split < hi - 1 && (self.weights[split] - base) * 2 < total {
            split += 1;
        }
        split
    }
}
