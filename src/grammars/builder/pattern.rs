//! Token patterns and their compilation to the lexical NFA.

use std::collections::BTreeSet;

use crate::language::{LexNode, Symbol};

/// A regular token pattern over characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Literal(String),
    /// One character in (or outside, if `negated`) sorted, disjoint ranges
    Chars {
        ranges: Vec<(char, char)>,
        negated: bool,
    },
    Seq(Vec<Pattern>),
    Choice(Vec<Pattern>),
    /// Zero or more
    Repeat(Box<Pattern>),
    /// One or more
    Repeat1(Box<Pattern>),
    Optional(Box<Pattern>),
}

impl Pattern {
    pub fn literal(text: &str) -> Self {
        Self::Literal(text.to_string())
    }

    /// One character from the given inclusive ranges
    pub fn chars(ranges: &[(char, char)]) -> Self {
        Self::Chars {
            ranges: normalize(ranges),
            negated: false,
        }
    }

    /// One character outside the given inclusive ranges
    pub fn not_chars(ranges: &[(char, char)]) -> Self {
        Self::Chars {
            ranges: normalize(ranges),
            negated: true,
        }
    }

    /// Exactly the character `c`
    pub fn char(c: char) -> Self {
        Self::chars(&[(c, c)])
    }

    /// Any character
    pub fn any() -> Self {
        Self::not_chars(&[])
    }

    pub fn seq(items: impl IntoIterator<Item = Pattern>) -> Self {
        Self::Seq(items.into_iter().collect())
    }

    pub fn choice(items: impl IntoIterator<Item = Pattern>) -> Self {
        Self::Choice(items.into_iter().collect())
    }

    pub fn repeat(item: Pattern) -> Self {
        Self::Repeat(Box::new(item))
    }

    pub fn repeat1(item: Pattern) -> Self {
        Self::Repeat1(Box::new(item))
    }

    pub fn optional(item: Pattern) -> Self {
        Self::Optional(Box::new(item))
    }

    /// Whether the pattern matches the empty string
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Literal(text) => text.is_empty(),
            Self::Chars { .. } => false,
            Self::Seq(items) => items.iter().all(Pattern::is_nullable),
            Self::Choice(items) => items.iter().any(Pattern::is_nullable),
            Self::Repeat(_) | Self::Optional(_) => true,
            Self::Repeat1(item) => item.is_nullable(),
        }
    }

    /// Whether the pattern matches all of `text`
    pub fn matches(&self, text: &str) -> bool {
        let chars: Vec<char> = text.chars().collect();
        self.ends(&chars, &BTreeSet::from([0]))
            .contains(&chars.len())
    }

    /// Offsets into `text` where a match starting at one of `starts` ends
    fn ends(&self, text: &[char], starts: &BTreeSet<usize>) -> BTreeSet<usize> {
        match self {
            Self::Literal(literal) => {
                let literal: Vec<char> = literal.chars().collect();
                starts
                    .iter()
                    .filter(|&&start| text[start..].starts_with(&literal))
                    .map(|&start| start + literal.len())
                    .collect()
            }
            Self::Chars { ranges, negated } => starts
                .iter()
                .filter(|&&start| {
                    text.get(start)
                        .is_some_and(|&c| LexNode::matches(ranges, *negated, c))
                })
                .map(|&start| start + 1)
                .collect(),
            Self::Seq(items) => items
                .iter()
                .fold(starts.clone(), |reached, item| item.ends(text, &reached)),
            Self::Choice(items) => items.iter().flat_map(|item| item.ends(text, starts)).collect(),
            Self::Optional(item) => {
                let mut ends = item.ends(text, starts);
                ends.extend(starts);
                ends
            }
            Self::Repeat(item) => item.repeated_ends(text, starts.clone()),
            Self::Repeat1(item) => {
                let once = item.ends(text, starts);
                item.repeated_ends(text, once)
            }
        }
    }

    /// `reached` plus every offset reachable by matching `self` again
    fn repeated_ends(&self, text: &[char], mut reached: BTreeSet<usize>) -> BTreeSet<usize> {
        let mut frontier = reached.clone();
        while !frontier.is_empty() {
            frontier = self
                .ends(text, &frontier)
                .into_iter()
                .filter(|end| !reached.contains(end))
                .collect();
            reached.extend(&frontier);
        }
        reached
    }
}

fn normalize(ranges: &[(char, char)]) -> Vec<(char, char)> {
    let mut sorted: Vec<(char, char)> = ranges
        .iter()
        .map(|&(lo, hi)| if lo <= hi { (lo, hi) } else { (hi, lo) })
        .collect();
    sorted.sort();
    let mut merged: Vec<(char, char)> = Vec::with_capacity(sorted.len());
    for (lo, hi) in sorted {
        match merged.last_mut() {
            Some(last) if (last.1 as u32).saturating_add(1) >= lo as u32 => {
                last.1 = last.1.max(hi);
            }
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

/// Thompson construction into a shared node arena
#[derive(Debug, Default)]
pub(crate) struct NfaBuilder {
    pub(crate) nodes: Vec<LexNode>,
}

impl NfaBuilder {
    fn push(&mut self, node: LexNode) -> u32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    /// Compile `pattern` for `symbol`, returning the start node
    pub(crate) fn add_token(&mut self, symbol: Symbol, pattern: &Pattern) -> u32 {
        let accept = self.push(LexNode::Accept(symbol));
        self.compile(pattern, accept)
    }

    /// Compile `pattern` so that completing it continues at `next`
    fn compile(&mut self, pattern: &Pattern, next: u32) -> u32 {
        match pattern {
            Pattern::Literal(text) => text.chars().rev().fold(next, |next, c| {
                self.push(LexNode::Chars {
                    ranges: vec![(c, c)],
                    negated: false,
                    next,
                })
            }),
            Pattern::Chars { ranges, negated } => self.push(LexNode::Chars {
                ranges: ranges.clone(),
                negated: *negated,
                next,
            }),
            Pattern::Seq(items) => items
                .iter()
                .rev()
                .fold(next, |next, item| self.compile(item, next)),
            Pattern::Choice(items) => {
                let mut entries: Vec<u32> = items.iter().map(|item| self.compile(item, next)).collect();
                let Some(mut entry) = entries.pop() else {
                    return next;
                };
                while let Some(previous) = entries.pop() {
                    entry = self.push(LexNode::Split(previous, entry));
                }
                entry
            }
            Pattern::Optional(item) => {
                let entry = self.compile(item, next);
                self.push(LexNode::Split(entry, next))
            }
            Pattern::Repeat(item) => {
                let fork = self.push(LexNode::Split(next, next));
                let body = self.compile(item, fork);
                self.nodes[fork as usize] = LexNode::Split(body, next);
                fork
            }
            Pattern::Repeat1(item) => {
                let fork = self.push(LexNode::Split(next, next));
                let body = self.compile(item, fork);
                self.nodes[fork as usize] = LexNode::Split(body, next);
                body
            }
        }
    }
}

#[cfg(test)]
mod tests;
