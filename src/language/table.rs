//! Compiled grammar tables.
//!
//! ```text
//! symbols      → names, visibility, extras, repetition helpers
//! productions  → lhs, child count, field map
//! actions      → states × terminals    → Shift | Reduce | Accept | (error)
//! gotos        → states × nonterminals → state
//! lex NFA      → per-terminal start node, longest match at runtime
//! ```

use smol_str::SmolStr;

use super::blob::LoadError;
use super::symbol::{FieldId, ProductionId, StateId, Symbol, SymbolInfo};

/// One entry of the action table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseAction {
    Shift(StateId),
    Reduce(ProductionId),
    Accept,
}

/// A grammar production after lowering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub lhs: Symbol,
    /// Number of structural (non-extra) children
    pub child_count: u16,
    /// `(structural child index, field)` pairs, sorted by child index
    pub fields: Vec<(u16, FieldId)>,
}

/// A node of the lexical NFA (Thompson construction over characters)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexNode {
    /// Consume one character in (or, if `negated`, outside) the ranges
    Chars {
        ranges: Vec<(char, char)>,
        negated: bool,
        next: u32,
    },
    /// Epsilon fork
    Split(u32, u32),
    /// The token matched so far is complete
    Accept(Symbol),
}

impl LexNode {
    /// `ranges` are sorted and disjoint
    pub(crate) fn matches(ranges: &[(char, char)], negated: bool, c: char) -> bool {
        let index = ranges.partition_point(|&(_, hi)| hi < c);
        let inside = ranges.get(index).is_some_and(|&(lo, _)| lo <= c);
        inside != negated
    }
}

/// How the internal lexer recognizes a terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenLex {
    /// NFA start node, `None` for end of input and external tokens
    pub start: Option<u32>,
    /// Exact string token; beats patterns of equal length
    pub literal: bool,
    /// A literal the word token also matches; lexed by first matching the
    /// word token, then checking the keywords
    pub keyword: bool,
}

/// The complete, immutable table set of one grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarTable {
    pub(crate) name: SmolStr,
    pub(crate) symbols: Vec<SymbolInfo>,
    pub(crate) token_count: u16,
    pub(crate) fields: Vec<SmolStr>,
    pub(crate) productions: Vec<Production>,
    pub(crate) state_count: u16,
    pub(crate) actions: Vec<Option<ParseAction>>,
    pub(crate) gotos: Vec<Option<StateId>>,
    pub(crate) lex_nodes: Vec<LexNode>,
    pub(crate) token_lex: Vec<TokenLex>,
    pub(crate) extras: Vec<Symbol>,
    pub(crate) external_tokens: Vec<Symbol>,
    pub(crate) start_symbol: Symbol,
    /// Identifier-like token that keywords are extracted from
    pub(crate) word_token: Option<Symbol>,
}

impl GrammarTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn token_count(&self) -> usize {
        self.token_count as usize
    }

    pub fn state_count(&self) -> usize {
        self.state_count as usize
    }

    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    fn nonterminal_count(&self) -> usize {
        self.symbols.len() - self.token_count as usize
    }

    #[inline]
    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.0 < self.token_count
    }

    #[inline]
    pub fn action(&self, state: StateId, symbol: Symbol) -> Option<ParseAction> {
        if !self.is_terminal(symbol) || state >= self.state_count {
            return None;
        }
        self.actions[state as usize * self.token_count as usize + symbol.index()]
    }

    #[inline]
    pub fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        if self.is_terminal(symbol) || symbol.index() >= self.symbols.len() {
            return None;
        }
        let column = symbol.index() - self.token_count as usize;
        self.gotos[state as usize * self.nonterminal_count() + column]
    }

    #[inline]
    pub fn production(&self, id: ProductionId) -> &Production {
        &self.productions[id as usize]
    }

    pub fn symbol_info(&self, symbol: Symbol) -> Option<&SymbolInfo> {
        self.symbols.get(symbol.index())
    }

    pub fn is_extra(&self, symbol: Symbol) -> bool {
        self.symbol_info(symbol).is_some_and(|info| info.extra)
    }

    pub fn extras(&self) -> &[Symbol] {
        &self.extras
    }

    pub fn external_tokens(&self) -> &[Symbol] {
        &self.external_tokens
    }

    pub fn start_symbol(&self) -> Symbol {
        self.start_symbol
    }

    pub fn word_token(&self) -> Option<Symbol> {
        self.word_token
    }

    /// Literals reserved against the word token, in symbol order
    pub fn keywords(&self) -> impl Iterator<Item = Symbol> + '_ {
        (0..self.token_count)
            .map(Symbol)
            .filter(move |symbol| self.token_lex[symbol.index()].keyword)
    }

    /// Terminals with a non-error action in `state`, in symbol order
    pub(crate) fn valid_terminals(&self, state: StateId) -> impl Iterator<Item = Symbol> + '_ {
        (0..self.token_count)
            .map(Symbol)
            .filter(move |&symbol| self.action(state, symbol).is_some())
    }

    /// Check every cross-reference in the tables
    pub(crate) fn validate(&self) -> Result<(), LoadError> {
        let symbol_count = self.symbols.len();
        let token_count = self.token_count as usize;
        let state_count = self.state_count as usize;

        if token_count == 0 || token_count > symbol_count {
            return Err(malformed(format!(
                "token count {token_count} out of range for {symbol_count} symbols"
            )));
        }
        if symbol_count >= Symbol::ERROR.index() {
            return Err(malformed("too many symbols"));
        }
        if state_count == 0 {
            return Err(malformed("grammar has no parse states"));
        }
        if self.actions.len() != state_count * token_count {
            return Err(malformed("action table has the wrong dimensions"));
        }
        if self.gotos.len() != state_count * (symbol_count - token_count) {
            return Err(malformed("goto table has the wrong dimensions"));
        }
        if self.token_lex.len() != token_count {
            return Err(malformed("token lexing table has the wrong length"));
        }
        if self.is_terminal(self.start_symbol) || self.start_symbol.index() >= symbol_count {
            return Err(malformed("start symbol must be a nonterminal"));
        }

        for production in &self.productions {
            if self.is_terminal(production.lhs) || production.lhs.index() >= symbol_count {
                return Err(malformed("production lhs must be a nonterminal"));
            }
            for &(child, field) in &production.fields {
                if child >= production.child_count || field.0 as usize >= self.fields.len() {
                    return Err(malformed("production field map out of range"));
                }
            }
        }

        for action in self.actions.iter().flatten() {
            match *action {
                ParseAction::Shift(state) if state as usize >= state_count => {
                    return Err(malformed(format!("shift to unknown state {state}")));
                }
                ParseAction::Reduce(id) if id as usize >= self.productions.len() => {
                    return Err(malformed(format!("reduce by unknown production {id}")));
                }
                _ => {}
            }
        }
        if let Some(state) = self.gotos.iter().flatten().find(|&&s| s as usize >= state_count) {
            return Err(malformed(format!("goto to unknown state {state}")));
        }

        let node_count = self.lex_nodes.len();
        for node in &self.lex_nodes {
            let in_range = match node {
                LexNode::Chars { ranges, next, .. } => {
                    let sorted = ranges.iter().all(|&(lo, hi)| lo <= hi)
                        && ranges.windows(2).all(|pair| pair[0].1 < pair[1].0);
                    sorted && (*next as usize) < node_count
                }
                LexNode::Split(a, b) => (*a as usize) < node_count && (*b as usize) < node_count,
                LexNode::Accept(symbol) => self.is_terminal(*symbol),
            };
            if !in_range {
                return Err(malformed("lexical automaton reference out of range"));
            }
        }
        if self
            .token_lex
            .iter()
            .filter_map(|lex| lex.start)
            .any(|start| start as usize >= node_count)
        {
            return Err(malformed("token start node out of range"));
        }

        if let Some(word) = self.word_token {
            let lexable = self
                .token_lex
                .get(word.index())
                .is_some_and(|lex| lex.start.is_some() && !lex.literal);
            if !lexable {
                return Err(malformed("word token must be a pattern token"));
            }
        }
        let stray_keyword = self
            .token_lex
            .iter()
            .any(|lex| lex.keyword && (self.word_token.is_none() || !lex.literal));
        if stray_keyword {
            return Err(malformed("keywords must be literals of a grammar with a word token"));
        }

        for &symbol in self.extras.iter().chain(&self.external_tokens) {
            if !self.is_terminal(symbol) || symbol == Symbol::END {
                return Err(malformed("extras and external tokens must be terminals"));
            }
        }
        Ok(())
    }
}

fn malformed(message: impl Into<String>) -> LoadError {
    LoadError::Malformed(message.into())
}
