//! LR(0) automaton with SLR(1) lookaheads

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{Assoc, BuildError, LoweredGrammar};
use crate::language::{ParseAction, ProductionId, StateId, Symbol};

/// States above this would collide with reserved ids
const MAX_STATES: usize = u16::MAX as usize - 1;

pub(crate) struct Automaton {
    pub(crate) state_count: u16,
    pub(crate) actions: Vec<Option<ParseAction>>,
    pub(crate) gotos: Vec<Option<StateId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct LrItem {
    production: u32,
    dot: u16,
}

struct Context<'g> {
    grammar: &'g LoweredGrammar,
    /// Index of the synthetic `S' -> start` production
    augmented: u32,
    /// Productions per nonterminal column
    by_lhs: Vec<Vec<u32>>,
}

impl<'g> Context<'g> {
    fn new(grammar: &'g LoweredGrammar) -> Self {
        let token_count = grammar.token_count as usize;
        let mut by_lhs = vec![Vec::new(); grammar.symbols.len() - token_count];
        for (index, production) in grammar.productions.iter().enumerate() {
            by_lhs[production.lhs.index() - token_count].push(index as u32);
        }
        Self {
            grammar,
            augmented: grammar.productions.len() as u32,
            by_lhs,
        }
    }

    fn rhs(&self, production: u32) -> &[Symbol] {
        if production == self.augmented {
            std::slice::from_ref(&self.grammar.start_symbol)
        } else {
            &self.grammar.productions[production as usize].rhs
        }
    }

    fn next_symbol(&self, item: LrItem) -> Option<Symbol> {
        self.rhs(item.production).get(item.dot as usize).copied()
    }

    fn precedence(&self, production: u32) -> i32 {
        self.grammar
            .productions
            .get(production as usize)
            .map_or(0, |p| p.precedence)
    }

    fn closure(&self, kernel: &[LrItem]) -> Vec<LrItem> {
        let token_count = self.grammar.token_count as usize;
        let mut items = kernel.to_vec();
        let mut expanded = FxHashSet::default();
        let mut index = 0;
        while index < items.len() {
            if let Some(symbol) = self.next_symbol(items[index]) {
                if !self.grammar.is_terminal(symbol) && expanded.insert(symbol) {
                    for &production in &self.by_lhs[symbol.index() - token_count] {
                        items.push(LrItem { production, dot: 0 });
                    }
                }
            }
            index += 1;
        }
        items
    }

    /// Decide a conflict between an existing action and a reduction by
    /// `reduce` on `lookahead`
    fn resolve(
        &self,
        items: &[LrItem],
        lookahead: Symbol,
        existing: ParseAction,
        reduce: ProductionId,
    ) -> ParseAction {
        let grammar = self.grammar;
        match existing {
            ParseAction::Accept => ParseAction::Accept,
            ParseAction::Reduce(other) => {
                tracing::warn!(
                    grammar = %grammar.name,
                    lookahead = %grammar.symbols[lookahead.index()].name,
                    first = other,
                    second = reduce,
                    "reduce/reduce conflict, keeping the earlier production"
                );
                ParseAction::Reduce(other.min(reduce))
            }
            ParseAction::Shift(target) => {
                let production = &grammar.productions[reduce as usize];
                if production.binary_repeat {
                    return ParseAction::Reduce(reduce);
                }
                let shift_precedence = items
                    .iter()
                    .filter(|&&item| self.next_symbol(item) == Some(lookahead))
                    .map(|item| self.precedence(item.production))
                    .max()
                    .unwrap_or(0);
                match shift_precedence.cmp(&production.precedence) {
                    Ordering::Greater => ParseAction::Shift(target),
                    Ordering::Less => ParseAction::Reduce(reduce),
                    Ordering::Equal => match production.assoc {
                        Assoc::Left => ParseAction::Reduce(reduce),
                        Assoc::Right => ParseAction::Shift(target),
                        Assoc::None => {
                            tracing::debug!(
                                grammar = %grammar.name,
                                lookahead = %grammar.symbols[lookahead.index()].name,
                                production = reduce,
                                "shift/reduce conflict resolved as shift"
                            );
                            ParseAction::Shift(target)
                        }
                    },
                }
            }
        }
    }
}

pub(crate) fn build(grammar: &LoweredGrammar) -> Result<Automaton, BuildError> {
    let context = Context::new(grammar);
    let token_count = grammar.token_count as usize;
    let nonterminal_count = grammar.symbols.len() - token_count;

    // =========================================================================
    // Canonical LR(0) collection, breadth first in symbol order
    // =========================================================================

    let start = vec![LrItem {
        production: context.augmented,
        dot: 0,
    }];
    let mut kernels = vec![start.clone()];
    let mut ids: FxHashMap<Vec<LrItem>, StateId> = FxHashMap::default();
    ids.insert(start, 0);
    let mut closures = Vec::new();
    let mut transitions: Vec<Vec<(Symbol, StateId)>> = Vec::new();

    let mut index = 0;
    while index < kernels.len() {
        let items = context.closure(&kernels[index]);
        let mut successors: BTreeMap<Symbol, Vec<LrItem>> = BTreeMap::new();
        for &item in &items {
            if let Some(symbol) = context.next_symbol(item) {
                successors.entry(symbol).or_default().push(LrItem {
                    dot: item.dot + 1,
                    ..item
                });
            }
        }

        let mut edges = Vec::with_capacity(successors.len());
        for (symbol, mut kernel) in successors {
            kernel.sort();
            kernel.dedup();
            let target = match ids.get(&kernel) {
                Some(&id) => id,
                None => {
                    if kernels.len() >= MAX_STATES {
                        return Err(BuildError::TooManyStates { max: MAX_STATES });
                    }
                    let id = kernels.len() as StateId;
                    ids.insert(kernel.clone(), id);
                    kernels.push(kernel);
                    id
                }
            };
            edges.push((symbol, target));
        }
        closures.push(items);
        transitions.push(edges);
        index += 1;
    }

    // =========================================================================
    // Action and goto tables
    // =========================================================================

    let follow = follow_sets(grammar);
    let state_count = kernels.len();
    let mut actions = vec![None; state_count * token_count];
    let mut gotos = vec![None; state_count * nonterminal_count];

    for (state, items) in closures.iter().enumerate() {
        for &(symbol, target) in &transitions[state] {
            if grammar.is_terminal(symbol) {
                actions[state * token_count + symbol.index()] = Some(ParseAction::Shift(target));
            } else {
                gotos[state * nonterminal_count + symbol.index() - token_count] = Some(target);
            }
        }

        for &item in items.iter().filter(|&&item| context.next_symbol(item).is_none()) {
            if item.production == context.augmented {
                actions[state * token_count + Symbol::END.index()] = Some(ParseAction::Accept);
                continue;
            }
            let production = item.production as ProductionId;
            let lhs = grammar.productions[item.production as usize].lhs;
            for (terminal, _) in follow[lhs.index()].iter().enumerate().filter(|(_, f)| **f) {
                let slot = &mut actions[state * token_count + terminal];
                *slot = Some(match *slot {
                    None => ParseAction::Reduce(production),
                    Some(existing) => {
                        context.resolve(items, Symbol(terminal as u16), existing, production)
                    }
                });
            }
        }
    }

    Ok(Automaton {
        state_count: state_count as u16,
        actions,
        gotos,
    })
}

// =============================================================================
// FIRST / FOLLOW
// =============================================================================

/// Per-symbol terminal sets, `token_count` wide
type TerminalSets = Vec<Vec<bool>>;

fn union(into: &mut [bool], from: &[bool]) -> bool {
    let mut changed = false;
    for (slot, &bit) in into.iter_mut().zip(from) {
        if bit && !*slot {
            *slot = true;
            changed = true;
        }
    }
    changed
}

fn first_sets(grammar: &LoweredGrammar) -> (Vec<bool>, TerminalSets) {
    let token_count = grammar.token_count as usize;
    let symbol_count = grammar.symbols.len();
    let mut nullable = vec![false; symbol_count];
    let mut first = vec![vec![false; token_count]; symbol_count];
    for (terminal, set) in first.iter_mut().enumerate().take(token_count) {
        set[terminal] = true;
    }

    let mut changed = true;
    while changed {
        changed = false;
        for production in &grammar.productions {
            let lhs = production.lhs.index();
            let mut all_nullable = true;
            for &symbol in &production.rhs {
                let from = first[symbol.index()].clone();
                changed |= union(&mut first[lhs], &from);
                if !nullable[symbol.index()] {
                    all_nullable = false;
                    break;
                }
            }
            if all_nullable && !nullable[lhs] {
                nullable[lhs] = true;
                changed = true;
            }
        }
    }
    (nullable, first)
}

fn follow_sets(grammar: &LoweredGrammar) -> TerminalSets {
    let (nullable, first) = first_sets(grammar);
    let token_count = grammar.token_count as usize;
    let mut follow = vec![vec![false; token_count]; grammar.symbols.len()];
    follow[grammar.start_symbol.index()][Symbol::END.index()] = true;

    let mut changed = true;
    while changed {
        changed = false;
        for production in &grammar.productions {
            let lhs = production.lhs.index();
            for (position, &symbol) in production.rhs.iter().enumerate() {
                if grammar.is_terminal(symbol) {
                    continue;
                }
                let mut rest_nullable = true;
                for &next in &production.rhs[position + 1..] {
                    changed |= union(&mut follow[symbol.index()], &first[next.index()]);
                    if !nullable[next.index()] {
                        rest_nullable = false;
                        break;
                    }
                }
                if rest_nullable {
                    let from = follow[lhs].clone();
                    changed |= union(&mut follow[symbol.index()], &from);
                }
            }
        }
    }
    follow
}
