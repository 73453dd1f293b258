//! SLR(1) table builder
//!
//! Compiles small BNF grammars into [`GrammarTable`]s. It exists to produce
//! the bundled grammars and test fixtures, not as a general grammar
//! compiler.
//!
//! ```text
//! tokens (patterns) ──▶ Thompson NFA ───────────────┐
//! rules (BNF + fields + precedence)                 ▼
//!    └──▶ LR(0) item sets ──▶ FIRST/FOLLOW ──▶ GrammarTable ──▶ blob
//!                                 │
//!                    conflict resolution (precedence,
//!                    associativity, repetition, shift)
//! ```
//!
//! Conflict resolution, in order:
//! 1. reduce/reduce: the earlier production wins
//! 2. a `R -> R R` repetition reduce beats any shift (left-leaning lists,
//!    rebalanced after each parse)
//! 3. higher precedence wins; at equal precedence the reduce production's
//!    associativity decides (left: reduce, right/none: shift)

mod lr;
mod pattern;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use thiserror::Error;

use crate::language::{FieldId, GrammarTable, LoadError, Production, Symbol, SymbolInfo, TokenLex};

pub use pattern::Pattern;
use pattern::NfaBuilder;

/// Errors building a grammar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("grammar has no rules")]
    NoRules,
    #[error("symbol `{0}` is used but never defined")]
    UndefinedSymbol(SmolStr),
    #[error("symbol `{0}` is defined more than once")]
    DuplicateSymbol(SmolStr),
    #[error("token `{0}` matches the empty string")]
    EmptyToken(SmolStr),
    #[error("extra `{0}` must be a token")]
    InvalidExtra(SmolStr),
    #[error("word token `{0}` must be a named pattern token")]
    InvalidWord(SmolStr),
    #[error("grammar needs more than {max} parse states")]
    TooManyStates { max: usize },
    #[error(transparent)]
    Table(#[from] LoadError),
}

/// Associativity used to break shift/reduce ties at equal precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Assoc {
    Left,
    Right,
    #[default]
    None,
}

/// One element of a rule's right-hand side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// A named token, external token or rule
    Symbol(SmolStr),
    /// An anonymous literal token
    Literal(SmolStr),
    /// An item labelled with a field name
    Field(SmolStr, Box<Item>),
}

/// Reference a named token or rule
pub fn sym(name: &str) -> Item {
    Item::Symbol(SmolStr::new(name))
}

/// An anonymous literal token
pub fn lit(text: &str) -> Item {
    Item::Literal(SmolStr::new(text))
}

/// Label `item` with a field name
pub fn field(name: &str, item: Item) -> Item {
    Item::Field(SmolStr::new(name), Box::new(item))
}

#[derive(Debug, Clone)]
struct RuleDef {
    lhs: SmolStr,
    items: Vec<Item>,
    precedence: i32,
    assoc: Assoc,
}

/// Declarative grammar description
#[derive(Debug, Clone, Default)]
pub struct GrammarBuilder {
    name: SmolStr,
    tokens: Vec<(SmolStr, Pattern)>,
    externals: Vec<SmolStr>,
    extras: Vec<SmolStr>,
    rules: Vec<RuleDef>,
    repeats: Vec<(SmolStr, SmolStr)>,
    start: Option<SmolStr>,
    word: Option<SmolStr>,
}

impl GrammarBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: SmolStr::new(name),
            ..Self::default()
        }
    }

    /// Start symbol; defaults to the lhs of the first rule
    pub fn start(&mut self, name: &str) -> &mut Self {
        self.start = Some(SmolStr::new(name));
        self
    }

    /// A named token recognized by `pattern`
    pub fn token(&mut self, name: &str, pattern: Pattern) -> &mut Self {
        self.tokens.push((SmolStr::new(name), pattern));
        self
    }

    /// A named token recognized by the language's external scanner
    pub fn external(&mut self, name: &str) -> &mut Self {
        self.externals.push(SmolStr::new(name));
        self
    }

    /// The identifier token. Literals it also matches become keywords:
    /// they are reserved everywhere instead of lexing as identifiers in
    /// states that cannot accept them.
    pub fn word(&mut self, name: &str) -> &mut Self {
        self.word = Some(SmolStr::new(name));
        self
    }

    /// A token that may appear between any two tokens
    pub fn extra(&mut self, name: &str) -> &mut Self {
        self.extras.push(SmolStr::new(name));
        self
    }

    /// `lhs -> items`
    pub fn rule(&mut self, lhs: &str, items: impl IntoIterator<Item = Item>) -> &mut Self {
        self.rule_prec(lhs, 0, Assoc::None, items)
    }

    /// `lhs -> items` with a precedence level and associativity
    pub fn rule_prec(
        &mut self,
        lhs: &str,
        precedence: i32,
        assoc: Assoc,
        items: impl IntoIterator<Item = Item>,
    ) -> &mut Self {
        self.rules.push(RuleDef {
            lhs: SmolStr::new(lhs),
            items: items.into_iter().collect(),
            precedence,
            assoc,
        });
        self
    }

    /// Hidden repetition `lhs -> lhs lhs | item` (one or more `item`s)
    pub fn repeat(&mut self, lhs: &str, item: &str) -> &mut Self {
        self.repeats.push((SmolStr::new(lhs), SmolStr::new(item)));
        self
    }

    /// Build and encode the grammar as a compiled blob
    pub fn compile(&self) -> Result<Vec<u8>, BuildError> {
        Ok(crate::language::encode(&self.build()?))
    }

    /// Build the grammar tables
    pub fn build(&self) -> Result<GrammarTable, BuildError> {
        let grammar = self.lower()?;
        let automaton = lr::build(&grammar)?;
        let table = grammar.into_table(automaton);
        table.validate()?;
        tracing::debug!(
            grammar = %table.name(),
            states = table.state_count(),
            productions = table.production_count(),
            "built grammar tables"
        );
        Ok(table)
    }

    // =========================================================================
    // Lowering: names → symbols, items → productions
    // =========================================================================

    fn lower(&self) -> Result<LoweredGrammar, BuildError> {
        if self.rules.is_empty() && self.repeats.is_empty() {
            return Err(BuildError::NoRules);
        }

        let mut symbols = vec![SymbolInfo::end()];
        let mut names: FxHashMap<SmolStr, Symbol> = FxHashMap::default();
        let mut nfa = NfaBuilder::default();
        let mut token_lex = vec![TokenLex::default()];

        let mut declare = |symbols: &mut Vec<SymbolInfo>, name: &SmolStr, info: SymbolInfo| {
            if names.contains_key(name) {
                return Err(BuildError::DuplicateSymbol(name.clone()));
            }
            let symbol = Symbol(symbols.len() as u16);
            symbols.push(info);
            names.insert(name.clone(), symbol);
            Ok(symbol)
        };

        for (name, pattern) in &self.tokens {
            if pattern.is_nullable() {
                return Err(BuildError::EmptyToken(name.clone()));
            }
            let symbol = declare(&mut symbols, name, named_info(name, false))?;
            token_lex.push(TokenLex {
                start: Some(nfa.add_token(symbol, pattern)),
                ..TokenLex::default()
            });
        }
        let mut external_tokens = Vec::new();
        for name in &self.externals {
            external_tokens.push(declare(&mut symbols, name, named_info(name, false))?);
            token_lex.push(TokenLex::default());
        }

        // Literal tokens, in order of first use
        let mut literals: IndexMap<SmolStr, Symbol> = IndexMap::new();
        for rule in &self.rules {
            for item in &rule.items {
                if let Some(text) = literal_of(item) {
                    if !literals.contains_key(text) {
                        let symbol = Symbol(symbols.len() as u16);
                        symbols.push(SymbolInfo {
                            name: text.clone(),
                            visible: true,
                            named: false,
                            extra: false,
                            repetition: false,
                        });
                        token_lex.push(TokenLex {
                            start: Some(nfa.add_token(symbol, &Pattern::literal(text))),
                            literal: true,
                            keyword: false,
                        });
                        literals.insert(text.clone(), symbol);
                    }
                }
            }
        }
        let token_count = symbols.len() as u16;

        let word_token = match &self.word {
            Some(name) => {
                let pattern = self
                    .tokens
                    .iter()
                    .find(|(token, _)| token == name)
                    .map(|(_, pattern)| pattern)
                    .ok_or_else(|| BuildError::InvalidWord(name.clone()))?;
                for (text, symbol) in &literals {
                    if pattern.matches(text) {
                        token_lex[symbol.index()].keyword = true;
                    }
                }
                Some(names[name])
            }
            None => None,
        };

        // Nonterminals, in order of first definition
        let repetition_names: Vec<&SmolStr> = self.repeats.iter().map(|(lhs, _)| lhs).collect();
        let lhs_order = self
            .rules
            .iter()
            .map(|rule| &rule.lhs)
            .chain(repetition_names.iter().copied());
        for lhs in lhs_order {
            if let Some(&existing) = names.get(lhs) {
                if existing.0 < token_count {
                    return Err(BuildError::DuplicateSymbol(lhs.clone()));
                }
                continue;
            }
            let repetition = repetition_names.contains(&lhs);
            let info = named_info(lhs, repetition);
            let symbol = Symbol(symbols.len() as u16);
            symbols.push(info);
            names.insert(lhs.clone(), symbol);
        }

        let mut extras = Vec::new();
        for name in &self.extras {
            let symbol = *names
                .get(name)
                .ok_or_else(|| BuildError::UndefinedSymbol(name.clone()))?;
            if symbol.0 >= token_count {
                return Err(BuildError::InvalidExtra(name.clone()));
            }
            symbols[symbol.index()].extra = true;
            extras.push(symbol);
        }

        let mut fields: IndexMap<SmolStr, FieldId> = IndexMap::new();
        let mut productions = Vec::new();
        let resolve = |name: &SmolStr| {
            names
                .get(name)
                .copied()
                .ok_or_else(|| BuildError::UndefinedSymbol(name.clone()))
        };

        for rule in &self.rules {
            let mut rhs = Vec::with_capacity(rule.items.len());
            let mut production_fields = Vec::new();
            for (index, item) in rule.items.iter().enumerate() {
                let mut item = item;
                while let Item::Field(name, inner) = item {
                    let next_id = FieldId(fields.len() as u16);
                    let id = *fields.entry(name.clone()).or_insert(next_id);
                    production_fields.push((index as u16, id));
                    item = inner;
                }
                let symbol = match item {
                    Item::Symbol(name) => resolve(name)?,
                    Item::Literal(text) => literals[text],
                    Item::Field(..) => unreachable!("fields are unwrapped above"),
                };
                rhs.push(symbol);
            }
            production_fields.sort();
            productions.push(LoweredProduction {
                lhs: resolve(&rule.lhs)?,
                rhs,
                fields: production_fields,
                precedence: rule.precedence,
                assoc: rule.assoc,
                binary_repeat: false,
            });
        }
        for (lhs, item) in &self.repeats {
            let lhs = resolve(lhs)?;
            let item = resolve(item)?;
            productions.push(LoweredProduction {
                lhs,
                rhs: vec![lhs, lhs],
                fields: Vec::new(),
                precedence: 0,
                assoc: Assoc::Left,
                binary_repeat: true,
            });
            productions.push(LoweredProduction {
                lhs,
                rhs: vec![item],
                fields: Vec::new(),
                precedence: 0,
                assoc: Assoc::None,
                binary_repeat: false,
            });
        }

        for (index, info) in symbols.iter().enumerate().skip(token_count as usize) {
            if !productions.iter().any(|p| p.lhs.index() == index) {
                return Err(BuildError::UndefinedSymbol(info.name.clone()));
            }
        }

        let start_symbol = match &self.start {
            Some(name) => resolve(name)?,
            None => productions[0].lhs,
        };

        Ok(LoweredGrammar {
            name: self.name.clone(),
            symbols,
            token_count,
            fields: fields.into_keys().collect(),
            productions,
            lex_nodes: nfa.nodes,
            token_lex,
            extras,
            external_tokens,
            start_symbol,
            word_token,
        })
    }
}

fn named_info(name: &str, repetition: bool) -> SymbolInfo {
    SymbolInfo {
        name: SmolStr::new(name),
        visible: !name.starts_with('_') && !repetition,
        named: true,
        extra: false,
        repetition,
    }
}

fn literal_of(item: &Item) -> Option<&SmolStr> {
    match item {
        Item::Literal(text) => Some(text),
        Item::Field(_, inner) => literal_of(inner),
        Item::Symbol(_) => None,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LoweredProduction {
    pub(crate) lhs: Symbol,
    pub(crate) rhs: Vec<Symbol>,
    pub(crate) fields: Vec<(u16, FieldId)>,
    pub(crate) precedence: i32,
    pub(crate) assoc: Assoc,
    pub(crate) binary_repeat: bool,
}

#[derive(Debug)]
pub(crate) struct LoweredGrammar {
    pub(crate) name: SmolStr,
    pub(crate) symbols: Vec<SymbolInfo>,
    pub(crate) token_count: u16,
    pub(crate) fields: Vec<SmolStr>,
    pub(crate) productions: Vec<LoweredProduction>,
    pub(crate) lex_nodes: Vec<crate::language::LexNode>,
    pub(crate) token_lex: Vec<TokenLex>,
    pub(crate) extras: Vec<Symbol>,
    pub(crate) external_tokens: Vec<Symbol>,
    pub(crate) start_symbol: Symbol,
    pub(crate) word_token: Option<Symbol>,
}

impl LoweredGrammar {
    pub(crate) fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.0 < self.token_count
    }

    fn into_table(self, automaton: lr::Automaton) -> GrammarTable {
        GrammarTable {
            name: self.name,
            symbols: self.symbols,
            token_count: self.token_count,
            fields: self.fields,
            productions: self
                .productions
                .into_iter()
                .map(|p| Production {
                    lhs: p.lhs,
                    child_count: p.rhs.len() as u16,
                    fields: p.fields,
                })
                .collect(),
            state_count: automaton.state_count,
            actions: automaton.actions,
            gotos: automaton.gotos,
            lex_nodes: self.lex_nodes,
            token_lex: self.token_lex,
            extras: self.extras,
            external_tokens: self.external_tokens,
            start_symbol: self.start_symbol,
            word_token: self.word_token,
        }
    }
}
