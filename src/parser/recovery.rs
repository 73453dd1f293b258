//! Pluggable error recovery
//!
//! When the parse table has no action for the lookahead, the parser asks a
//! [`RecoveryStrategy`] what to do. The strategy sees a read-only
//! [`RecoveryContext`] and can simulate the table on it; the parser checks
//! the answer before acting on it, so a strategy can only choose between
//! recoveries, never break the tree.

use text_size::TextSize;

use crate::language::{Language, ParseAction, StateId, Symbol};

/// What to do about a lookahead the parser cannot accept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Wrap the lookahead in an ERROR node and move past it
    SkipToken,
    /// Insert a zero-width MISSING token before the lookahead
    InsertMissing(Symbol),
    /// Wrap the top `depth` structural stack entries in an ERROR node
    PopStack(usize),
}

/// Chooses a [`Recovery`] for each syntax error
pub trait RecoveryStrategy: Send + Sync {
    fn recover(&self, context: &RecoveryContext<'_>) -> Recovery;
}

/// Bounds the table simulation of [`RecoveryContext::accepts`]
const MAX_SIMULATED_STEPS: usize = 256;

/// The parser's situation at a syntax error
#[derive(Debug)]
pub struct RecoveryContext<'a> {
    pub(crate) language: &'a Language,
    /// `0` followed by the state of each structural stack entry
    pub(crate) states: Vec<StateId>,
    pub(crate) lookahead: Symbol,
    pub(crate) following: Symbol,
    pub(crate) is_lexical_error: bool,
    pub(crate) position: TextSize,
    pub(crate) max_pop_depth: usize,
}

impl<'a> RecoveryContext<'a> {
    pub fn language(&self) -> &'a Language {
        self.language
    }

    /// States of the structural stack entries, bottom first
    pub fn states(&self) -> &[StateId] {
        &self.states
    }

    /// Number of structural entries that can be popped
    pub fn depth(&self) -> usize {
        self.states.len() - 1
    }

    pub fn lookahead(&self) -> Symbol {
        self.lookahead
    }

    /// The token after the lookahead, skipping extras
    pub fn following(&self) -> Symbol {
        self.following
    }

    /// The lookahead is unrecognized input rather than a misplaced token
    pub fn is_lexical_error(&self) -> bool {
        self.is_lexical_error
    }

    pub fn position(&self) -> TextSize {
        self.position
    }

    pub fn max_pop_depth(&self) -> usize {
        self.max_pop_depth
    }

    /// Would the parser shift every one of `symbols` in turn after popping
    /// `depth` structural entries? Reaching accept counts as success.
    pub fn accepts(&self, depth: usize, symbols: &[Symbol]) -> bool {
        if depth > self.depth() {
            return false;
        }
        let mut states = self.states[..self.states.len() - depth].to_vec();
        let mut steps = 0;
        for &symbol in symbols {
            loop {
                steps += 1;
                if steps > MAX_SIMULATED_STEPS {
                    return false;
                }
                let top = states.last().copied().unwrap_or(0);
                match self.language.action(top, symbol) {
                    Some(ParseAction::Shift(next)) => {
                        states.push(next);
                        break;
                    }
                    Some(ParseAction::Reduce(id)) => {
                        let production = self.language.production(id);
                        let keep = states.len().saturating_sub(production.child_count as usize).max(1);
                        states.truncate(keep);
                        let below = states.last().copied().unwrap_or(0);
                        match self.language.goto(below, production.lhs) {
                            Some(next) => states.push(next),
                            None => return false,
                        }
                    }
                    Some(ParseAction::Accept) => return true,
                    None => return false,
                }
            }
        }
        true
    }

    /// Terminals with an action after popping `depth` entries
    pub fn valid_terminals(&self, depth: usize) -> Vec<Symbol> {
        if depth > self.depth() {
            return Vec::new();
        }
        let state = self.states[self.states.len() - 1 - depth];
        self.language.table().valid_terminals(state).collect()
    }
}

/// The default strategy.
///
/// In order of preference:
/// 1. skip unrecognized input;
/// 2. skip the lookahead if the token after it fits;
/// 3. insert one missing token that makes the lookahead (and the token
///    after it) fit;
/// 4. pop the fewest stack entries after which the lookahead fits;
/// 5. skip the lookahead.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicMode;

impl RecoveryStrategy for PanicMode {
    fn recover(&self, cx: &RecoveryContext<'_>) -> Recovery {
        let lookahead = cx.lookahead();
        if cx.is_lexical_error() {
            return Recovery::SkipToken;
        }
        if lookahead != Symbol::END && cx.accepts(0, &[cx.following()]) {
            return Recovery::SkipToken;
        }

        for missing in cx.valid_terminals(0) {
            if missing == Symbol::END || cx.language().is_extra(missing) {
                continue;
            }
            if !cx.accepts(0, &[missing, lookahead]) {
                continue;
            }
            if lookahead == Symbol::END || cx.accepts(0, &[missing, lookahead, cx.following()]) {
                return Recovery::InsertMissing(missing);
            }
        }

        let deepest = cx.max_pop_depth().min(cx.depth());
        if let Some(depth) = (1..=deepest).find(|&depth| cx.accepts(depth, &[lookahead])) {
            return Recovery::PopStack(depth);
        }

        Recovery::SkipToken
    }
}
