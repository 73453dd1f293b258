//! Languages: loaded grammar tables
//!
//! ```text
//! compiled blob ──decode──▶ GrammarTable ──validate──▶ Language
//!                                                        │
//!                       lex modes, name lookup ◀─────────┤
//!                       external scanner factory ◀───────┘
//! ```
//!
//! A [`Language`] is cheap to clone and immutable; every parse session and
//! every tree holds one.

mod blob;
mod symbol;
mod table;

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::lexer::ExternalScanner;

pub use blob::{FORMAT_VERSION, LoadError, MAGIC, MIN_COMPATIBLE_VERSION, decode, encode};
pub use symbol::{
    ERROR_LEX_MODE, FieldId, LexModeId, ProductionId, StateId, Symbol, SymbolInfo,
};
pub use table::{GrammarTable, LexNode, ParseAction, Production, TokenLex};

/// Creates a fresh external scanner for each parse session
pub type ScannerFactory = Arc<dyn Fn() -> Box<dyn ExternalScanner> + Send + Sync>;

/// The terminals the lexer may produce in a group of parse states
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LexMode {
    /// Internally lexed terminals (including extras), in symbol order
    pub(crate) tokens: Vec<Symbol>,
    /// Validity of each external token, indexed like the external token list
    pub(crate) externals: Vec<bool>,
}

impl LexMode {
    pub fn tokens(&self) -> &[Symbol] {
        &self.tokens
    }

    pub fn has_externals(&self) -> bool {
        self.externals.iter().any(|&valid| valid)
    }
}

/// A loaded grammar
#[derive(Clone)]
pub struct Language(Arc<LanguageInner>);

#[derive(Clone)]
struct LanguageInner {
    table: GrammarTable,
    version: u16,
    lex_modes: Vec<LexMode>,
    state_lex_modes: Vec<LexModeId>,
    error_mode: LexMode,
    /// Literals lexed by matching the word token first
    keywords: Vec<Symbol>,
    /// `covers[outer * modes + inner]`: every terminal of `inner` is in `outer`
    covers: Vec<bool>,
    symbols_by_name: FxHashMap<(SmolStr, bool), Symbol>,
    fields_by_name: FxHashMap<SmolStr, FieldId>,
    binary_repeats: FxHashMap<Symbol, ProductionId>,
    scanner: Option<ScannerFactory>,
}

impl Language {
    /// Load a compiled grammar blob.
    ///
    /// Fails with [`LoadError::GrammarVersionMismatch`] when the blob was
    /// written for an incompatible format version.
    pub fn load(blob: &[u8]) -> Result<Self, LoadError> {
        let (table, version) = blob::decode(blob)?;
        tracing::debug!(
            grammar = %table.name(),
            version,
            states = table.state_count(),
            symbols = table.symbol_count(),
            "loaded grammar"
        );
        Ok(Self::from_validated(table, version))
    }

    /// Wrap an in-memory table after validating it
    pub fn new(table: GrammarTable) -> Result<Self, LoadError> {
        table.validate()?;
        Ok(Self::from_validated(table, FORMAT_VERSION))
    }

    fn from_validated(table: GrammarTable, version: u16) -> Self {
        let external_count = table.external_tokens.len();
        let keywords: Vec<Symbol> = table.keywords().collect();
        let mut lex_modes: Vec<LexMode> = Vec::new();
        let mut mode_ids: FxHashMap<LexMode, LexModeId> = FxHashMap::default();
        let mut state_lex_modes = Vec::with_capacity(table.state_count());

        for state in 0..table.state_count {
            let mut mode = LexMode {
                tokens: Vec::new(),
                externals: vec![false; external_count],
            };
            let valid = table.valid_terminals(state).chain(table.extras.iter().copied());
            for symbol in valid {
                if let Some(index) = table.external_tokens.iter().position(|&e| e == symbol) {
                    mode.externals[index] = true;
                } else if table.token_lex[symbol.index()].start.is_some()
                    && !mode.tokens.contains(&symbol)
                {
                    mode.tokens.push(symbol);
                }
            }
            extract_keywords(&mut mode.tokens, &keywords, table.word_token);
            mode.tokens.sort();
            let id = *mode_ids.entry(mode.clone()).or_insert_with(|| {
                lex_modes.push(mode);
                (lex_modes.len() - 1) as LexModeId
            });
            state_lex_modes.push(id);
        }

        let mode_count = lex_modes.len();
        let mut covers = vec![false; mode_count * mode_count];
        for (outer_id, outer) in lex_modes.iter().enumerate() {
            for (inner_id, inner) in lex_modes.iter().enumerate() {
                let tokens = inner.tokens.iter().all(|symbol| outer.tokens.binary_search(symbol).is_ok());
                let externals = inner
                    .externals
                    .iter()
                    .zip(&outer.externals)
                    .all(|(&inner, &outer)| !inner || outer);
                covers[outer_id * mode_count + inner_id] = tokens && externals;
            }
        }

        let mut error_mode = LexMode {
            tokens: (0..table.token_count)
                .map(Symbol)
                .filter(|symbol| table.token_lex[symbol.index()].start.is_some())
                .collect(),
            externals: vec![true; external_count],
        };
        extract_keywords(&mut error_mode.tokens, &keywords, table.word_token);

        let mut symbols_by_name = FxHashMap::default();
        for (index, info) in table.symbols.iter().enumerate().skip(1) {
            symbols_by_name
                .entry((info.name.clone(), info.named))
                .or_insert(Symbol(index as u16));
        }
        let fields_by_name = table
            .fields
            .iter()
            .enumerate()
            .map(|(index, name)| (name.clone(), FieldId(index as u16)))
            .collect();

        let mut binary_repeats = FxHashMap::default();
        for (id, production) in table.productions.iter().enumerate() {
            let repetition = table
                .symbol_info(production.lhs)
                .is_some_and(|info| info.repetition);
            if repetition && production.child_count == 2 {
                binary_repeats.entry(production.lhs).or_insert(id as ProductionId);
            }
        }

        Self(Arc::new(LanguageInner {
            table,
            version,
            lex_modes,
            state_lex_modes,
            error_mode,
            keywords,
            covers,
            symbols_by_name,
            fields_by_name,
            binary_repeats,
            scanner: None,
        }))
    }

    /// Attach the external scanner implementation for this grammar's
    /// external tokens
    pub fn with_external_scanner<F>(self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ExternalScanner> + Send + Sync + 'static,
    {
        let mut inner = Arc::unwrap_or_clone(self.0);
        inner.scanner = Some(Arc::new(factory));
        Self(Arc::new(inner))
    }

    /// Serialize the underlying table back into a compiled blob
    pub fn to_blob(&self) -> Vec<u8> {
        blob::encode(&self.0.table)
    }

    pub fn name(&self) -> &str {
        self.0.table.name()
    }

    /// Format version of the blob this language was loaded from
    pub fn version(&self) -> u16 {
        self.0.version
    }

    pub fn symbol_count(&self) -> usize {
        self.0.table.symbol_count()
    }

    pub fn token_count(&self) -> usize {
        self.0.table.token_count()
    }

    pub fn state_count(&self) -> usize {
        self.0.table.state_count()
    }

    pub fn field_count(&self) -> usize {
        self.0.table.fields.len()
    }

    pub fn symbol_name(&self, symbol: Symbol) -> &str {
        if symbol.is_error() {
            return "ERROR";
        }
        self.0
            .table
            .symbol_info(symbol)
            .map(|info| info.name.as_str())
            .unwrap_or("")
    }

    /// Look up a symbol by name; `named` distinguishes `identifier` from `"identifier"`
    pub fn symbol_for_name(&self, name: &str, named: bool) -> Option<Symbol> {
        if named && name == "ERROR" {
            return Some(Symbol::ERROR);
        }
        self.0
            .symbols_by_name
            .get(&(SmolStr::new(name), named))
            .copied()
    }

    pub fn is_visible(&self, symbol: Symbol) -> bool {
        symbol.is_error() || self.0.table.symbol_info(symbol).is_some_and(|i| i.visible)
    }

    pub fn is_named(&self, symbol: Symbol) -> bool {
        symbol.is_error() || self.0.table.symbol_info(symbol).is_some_and(|i| i.named)
    }

    pub fn is_extra(&self, symbol: Symbol) -> bool {
        self.0.table.is_extra(symbol)
    }

    pub fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.is_error() || self.0.table.is_terminal(symbol)
    }

    pub fn field_name(&self, field: FieldId) -> Option<&str> {
        self.0.table.fields.get(field.0 as usize).map(SmolStr::as_str)
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.0.fields_by_name.get(name).copied()
    }

    pub fn table(&self) -> &GrammarTable {
        &self.0.table
    }

    pub fn ptr_eq(&self, other: &Language) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    // =========================================================================
    // Runtime accessors
    // =========================================================================

    #[inline]
    pub(crate) fn action(&self, state: StateId, symbol: Symbol) -> Option<ParseAction> {
        self.0.table.action(state, symbol)
    }

    #[inline]
    pub(crate) fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        self.0.table.goto(state, symbol)
    }

    #[inline]
    pub(crate) fn production(&self, id: ProductionId) -> &Production {
        self.0.table.production(id)
    }

    pub(crate) fn lex_mode_id(&self, state: StateId) -> LexModeId {
        self.0
            .state_lex_modes
            .get(state as usize)
            .copied()
            .unwrap_or(ERROR_LEX_MODE)
    }

    pub(crate) fn lex_mode(&self, id: LexModeId) -> &LexMode {
        self.0.lex_modes.get(id as usize).unwrap_or(&self.0.error_mode)
    }

    /// Would a `symbol` token lexed in mode `lexed_in` be lexed the same in
    /// `mode`? True when `mode` still admits the token and offers no
    /// terminal that `lexed_in` lacked.
    pub(crate) fn can_relex_as(&self, symbol: Symbol, lexed_in: LexModeId, mode: LexModeId) -> bool {
        if lexed_in == mode {
            return true;
        }
        let count = self.0.lex_modes.len();
        let (outer, inner) = (lexed_in as usize, mode as usize);
        if outer >= count || inner >= count || !self.0.covers[outer * count + inner] {
            return false;
        }
        let current = &self.0.lex_modes[inner];
        let symbol = match self.0.table.word_token {
            Some(word) if self.is_keyword(symbol) => word,
            _ => symbol,
        };
        match self.0.table.external_tokens.iter().position(|&e| e == symbol) {
            Some(index) => current.externals[index],
            None => current.tokens.binary_search(&symbol).is_ok(),
        }
    }

    pub(crate) fn keywords(&self) -> &[Symbol] {
        &self.0.keywords
    }

    pub(crate) fn is_keyword(&self, symbol: Symbol) -> bool {
        self.0
            .table
            .token_lex
            .get(symbol.index())
            .is_some_and(|lex| lex.keyword)
    }

    /// `R -> R R` production of a repetition symbol
    pub(crate) fn binary_repeat(&self, symbol: Symbol) -> Option<ProductionId> {
        self.0.binary_repeats.get(&symbol).copied()
    }

    pub(crate) fn new_scanner(&self) -> Option<Box<dyn ExternalScanner>> {
        self.0.scanner.as_ref().map(|factory| factory())
    }
}

/// Lex keywords through the word token: a mode that admits any keyword
/// matches the word token instead, and the lexer then checks the keywords
fn extract_keywords(tokens: &mut Vec<Symbol>, keywords: &[Symbol], word: Option<Symbol>) {
    let Some(word) = word else {
        return;
    };
    let before = tokens.len();
    tokens.retain(|symbol| !keywords.contains(symbol));
    if tokens.len() != before && !tokens.contains(&word) {
        tokens.push(word);
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("symbols", &self.symbol_count())
            .field("states", &self.state_count())
            .field("external_scanner", &self.0.scanner.is_some())
            .finish()
    }
}
