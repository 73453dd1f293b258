//! Running compiled queries over trees
//!
//! Matching is a backtracking search over sibling lists. Quantifiers are
//! greedy and the first solution wins, so each (node, pattern) pair yields
//! at most one match and the result order is fixed for a given tree.

use text_size::TextRange;

use super::Query;
use super::compile::{ChildStep, NodeTest, Predicate, PredicateArg, StepId, StepKind};
use crate::language::FieldId;
use crate::tree::{Node, Preorder};

/// Default bound on matching steps per node and pattern
pub const DEFAULT_MATCH_LIMIT: u32 = 10_000;

/// A node captured by a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryCapture<'tree> {
    pub index: u32,
    pub node: Node<'tree>,
}

/// One solution of one pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMatch<'tree> {
    pub pattern_index: usize,
    pub captures: Vec<QueryCapture<'tree>>,
}

impl<'tree> QueryMatch<'tree> {
    /// Nodes captured under `index`, in match order
    pub fn nodes_for_capture_index(&self, index: u32) -> impl Iterator<Item = Node<'tree>> + '_ {
        self.captures
            .iter()
            .filter(move |capture| capture.index == index)
            .map(|capture| capture.node)
    }
}

/// Settings for running queries
#[derive(Debug, Clone)]
pub struct QueryCursor {
    ranges: Vec<TextRange>,
    match_limit: u32,
}

impl Default for QueryCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCursor {
    pub fn new() -> Self {
        Self {
            ranges: Vec::new(),
            match_limit: DEFAULT_MATCH_LIMIT,
        }
    }

    pub fn with_match_limit(mut self, limit: u32) -> Self {
        self.match_limit = limit.max(1);
        self
    }

    pub fn match_limit(&self) -> u32 {
        self.match_limit
    }

    pub fn set_match_limit(&mut self, limit: u32) {
        self.match_limit = limit.max(1);
    }

    /// Only report matches for nodes intersecting `range`
    pub fn set_byte_range(&mut self, range: TextRange) {
        self.ranges = vec![range];
    }

    /// Only report matches for nodes intersecting one of `ranges`; an empty
    /// list lifts the restriction. Pass [`Tree::changed_ranges`](crate::tree::Tree::changed_ranges)
    /// to re-query just what a reparse changed.
    pub fn set_byte_ranges(&mut self, ranges: Vec<TextRange>) {
        self.ranges = ranges;
    }

    pub fn byte_ranges(&self) -> &[TextRange] {
        &self.ranges
    }

    /// Lazily match `query` against `node` and its descendants, in
    /// pre-order and then pattern order
    pub fn matches<'q, 'tree, 't>(
        &self,
        query: &'q Query,
        node: Node<'tree>,
        text: &'t str,
    ) -> QueryMatches<'q, 'tree, 't> {
        let compatible = query.language().name() == node.tree().language().name()
            && query.language().symbol_count() == node.tree().language().symbol_count();
        if !compatible {
            tracing::warn!(
                query = query.language().name(),
                tree = node.tree().language().name(),
                "query was compiled for another language; no matches"
            );
        }
        QueryMatches {
            query,
            text,
            preorder: Preorder::new(node).with_ranges(self.ranges.clone()),
            current: None,
            next_pattern: 0,
            match_limit: self.match_limit,
            exceeded: false,
            done: !compatible,
        }
    }

    /// Every capture of every match, in match order
    pub fn captures<'q, 'tree, 't>(
        &self,
        query: &'q Query,
        node: Node<'tree>,
        text: &'t str,
    ) -> QueryCaptures<'q, 'tree, 't> {
        QueryCaptures {
            matches: self.matches(query, node, text),
            current: None,
            next_capture: 0,
        }
    }
}

/// Lazy iterator over query matches
pub struct QueryMatches<'q, 'tree, 't> {
    query: &'q Query,
    text: &'t str,
    preorder: Preorder<'tree>,
    current: Option<Node<'tree>>,
    next_pattern: usize,
    match_limit: u32,
    exceeded: bool,
    done: bool,
}

impl<'tree> QueryMatches<'_, 'tree, '_> {
    /// Whether some (node, pattern) pair was abandoned at the match limit
    pub fn did_exceed_match_limit(&self) -> bool {
        self.exceeded
    }

    fn try_pattern(&mut self, pattern_index: usize, node: Node<'tree>) -> Option<QueryMatch<'tree>> {
        let query = self.query;
        let pattern = &query.patterns[pattern_index];
        let mut search = Search {
            query,
            budget: self.match_limit,
            exhausted: false,
        };
        let mut captures = Vec::new();

        let simple = pattern.items.len() == 1 && query.steps[pattern.items[0].step].quantifier.max() == 1;
        let found = if simple {
            search.step(pattern.items[0].step, node, &mut captures)
        } else {
            let siblings: Vec<_> = match node.parent() {
                Some(parent) => parent.children_with_fields().collect(),
                None => vec![(node, None)],
            };
            let start = siblings.iter().position(|(sibling, _)| *sibling == node).unwrap_or(0);
            let sequence = Sequence {
                items: &pattern.items,
                siblings: &siblings,
                anchored_end: false,
                top_level: true,
            };
            search.sequence(&sequence, 0, start, 0, &mut captures)
        };

        if search.exhausted {
            tracing::debug!(
                pattern = pattern_index,
                node = node.kind(),
                limit = self.match_limit,
                "query match limit exceeded"
            );
            self.exceeded = true;
        }
        if !found || !predicates_hold(&pattern.predicates, &captures, self.text) {
            return None;
        }
        Some(QueryMatch {
            pattern_index,
            captures,
        })
    }
}

impl<'tree> Iterator for QueryMatches<'_, 'tree, '_> {
    type Item = QueryMatch<'tree>;

    fn next(&mut self) -> Option<QueryMatch<'tree>> {
        if self.done {
            return None;
        }
        loop {
            let node = match self.current {
                Some(node) => node,
                None => {
                    let Some(node) = self.preorder.next() else {
                        self.done = true;
                        return None;
                    };
                    self.current = Some(node);
                    self.next_pattern = 0;
                    node
                }
            };
            while self.next_pattern < self.query.patterns.len() {
                let index = self.next_pattern;
                self.next_pattern += 1;
                if let Some(found) = self.try_pattern(index, node) {
                    return Some(found);
                }
            }
            self.current = None;
        }
    }
}

/// Lazy iterator over the captures of query matches
pub struct QueryCaptures<'q, 'tree, 't> {
    matches: QueryMatches<'q, 'tree, 't>,
    current: Option<QueryMatch<'tree>>,
    next_capture: usize,
}

impl QueryCaptures<'_, '_, '_> {
    pub fn did_exceed_match_limit(&self) -> bool {
        self.matches.did_exceed_match_limit()
    }
}

impl<'tree> Iterator for QueryCaptures<'_, 'tree, '_> {
    /// The match and the position of the capture within it
    type Item = (QueryMatch<'tree>, usize);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = &self.current {
                if self.next_capture < current.captures.len() {
                    let index = self.next_capture;
                    self.next_capture += 1;
                    return Some((current.clone(), index));
                }
            }
            self.current = Some(self.matches.next()?);
            self.next_capture = 0;
        }
    }
}

// =============================================================================
// Matching
// =============================================================================

type Sibling<'tree> = (Node<'tree>, Option<FieldId>);

struct Sequence<'a, 'tree> {
    items: &'a [ChildStep],
    siblings: &'a [Sibling<'tree>],
    anchored_end: bool,
    /// Top-level sequences start at a fixed sibling and stay adjacent
    top_level: bool,
}

/// Which siblings an occurrence may skip before matching
enum Gap {
    None,
    Anonymous,
    Any,
}

struct Search<'q> {
    query: &'q Query,
    budget: u32,
    exhausted: bool,
}

impl<'q> Search<'q> {
    fn tick(&mut self) -> bool {
        if self.budget == 0 {
            self.exhausted = true;
            return false;
        }
        self.budget -= 1;
        true
    }

    fn step<'tree>(&mut self, id: StepId, node: Node<'tree>, captures: &mut Vec<QueryCapture<'tree>>) -> bool {
        if !self.tick() {
            return false;
        }
        let query = self.query;
        let step = &query.steps[id];
        let mark = captures.len();
        captures.extend(step.captures.iter().map(|&index| QueryCapture { index, node }));

        let matched = match &step.kind {
            StepKind::Node {
                test,
                children,
                anchored_end,
                negated_fields,
            } => {
                test_node(*test, node)
                    && (negated_fields.is_empty()
                        || !node
                            .children_with_fields()
                            .any(|(_, field)| field.is_some_and(|field| negated_fields.contains(&field))))
                    && (children.is_empty() || {
                        let siblings: Vec<_> = node.children_with_fields().collect();
                        let sequence = Sequence {
                            items: children,
                            siblings: &siblings,
                            anchored_end: *anchored_end,
                            top_level: false,
                        };
                        self.sequence(&sequence, 0, 0, 0, captures)
                    })
            }
            StepKind::Alternation(branches) => branches.iter().any(|&branch| {
                let inner = captures.len();
                let matched = self.step(branch, node, captures);
                if !matched {
                    captures.truncate(inner);
                }
                matched
            }),
        };
        if !matched {
            captures.truncate(mark);
        }
        matched
    }

    /// Match `items[index..]` against `siblings[position..]`, where `count`
    /// occurrences of `items[index]` are already matched
    fn sequence<'tree>(
        &mut self,
        sequence: &Sequence<'_, 'tree>,
        index: usize,
        position: usize,
        count: usize,
        captures: &mut Vec<QueryCapture<'tree>>,
    ) -> bool {
        if !self.tick() {
            return false;
        }
        let Some(item) = sequence.items.get(index) else {
            return !sequence.anchored_end
                || sequence.siblings[position..].iter().all(|(node, _)| !node.is_named());
        };
        let quantifier = self.query.steps[item.step].quantifier;

        if count < quantifier.max() {
            let gap = if sequence.top_level {
                if index == 0 && count == 0 { Gap::None } else { Gap::Anonymous }
            } else if item.anchored && count == 0 {
                Gap::Anonymous
            } else {
                Gap::Any
            };
            for (offset, &(node, field)) in sequence.siblings[position..].iter().enumerate() {
                if item.field.is_none_or(|wanted| field == Some(wanted)) {
                    let mark = captures.len();
                    if self.step(item.step, node, captures)
                        && self.sequence(sequence, index, position + offset + 1, count + 1, captures)
                    {
                        return true;
                    }
                    captures.truncate(mark);
                }
                if self.exhausted {
                    return false;
                }
                match gap {
                    Gap::None => break,
                    Gap::Anonymous if node.is_named() => break,
                    _ => {}
                }
            }
        }

        count >= quantifier.min() && self.sequence(sequence, index + 1, position, 0, captures)
    }
}

fn test_node(test: NodeTest, node: Node<'_>) -> bool {
    match test {
        NodeTest::Any => true,
        NodeTest::AnyNamed => node.is_named(),
        NodeTest::Symbol(symbol) => node.symbol() == symbol,
        NodeTest::Error => node.is_error(),
        NodeTest::Missing => node.is_missing(),
    }
}

/// Predicates over captures that did not participate pass
fn predicates_hold(predicates: &[Predicate], captures: &[QueryCapture<'_>], text: &str) -> bool {
    let texts = |index: u32| {
        captures
            .iter()
            .filter(move |capture| capture.index == index)
            .map(|capture| capture.node.utf8_text(text))
    };
    predicates.iter().all(|predicate| match predicate {
        Predicate::Eq {
            capture,
            value,
            negated,
        } => texts(*capture).all(|left| {
            let equal = match value {
                PredicateArg::Text(right) => left == right,
                PredicateArg::Capture(other) => texts(*other).all(|right| left == right),
            };
            equal != *negated
        }),
        Predicate::Match {
            capture,
            regex,
            negated,
        } => texts(*capture).all(|haystack| regex.is_match(haystack) != *negated),
    })
}
