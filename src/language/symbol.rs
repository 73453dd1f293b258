//! Grammar symbols, fields and automaton ids.

use smol_str::SmolStr;

/// Parser automaton state
pub type StateId = u16;

/// Index into the grammar's production list
pub type ProductionId = u16;

/// Index of a deduplicated lexical mode
pub type LexModeId = u16;

/// Lex mode of tokens lexed with every terminal enabled (during recovery)
pub const ERROR_LEX_MODE: LexModeId = u16::MAX;

/// A grammar symbol.
///
/// Terminals come first (`0..token_count`, with `0` reserved for end of
/// input), nonterminals follow. [`Symbol::ERROR`] lies outside both ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(pub u16);

impl Symbol {
    /// End of input
    pub const END: Symbol = Symbol(0);
    /// Error tokens and error nodes
    pub const ERROR: Symbol = Symbol(u16::MAX);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn is_error(self) -> bool {
        self == Self::ERROR
    }
}

/// Index into the grammar's field name table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub u16);

/// Display and structural metadata for one symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: SmolStr,
    /// Shown by [`crate::tree::Node`] navigation; hidden nodes are flattened
    pub visible: bool,
    /// Named rule or token (as opposed to an anonymous literal)
    pub named: bool,
    /// May appear anywhere between tokens (whitespace, comments)
    pub extra: bool,
    /// Helper symbol of the form `R -> R R | item`
    pub repetition: bool,
}

impl SymbolInfo {
    pub(crate) fn end() -> Self {
        Self {
            name: SmolStr::new_static("end"),
            visible: false,
            named: false,
            extra: false,
            repetition: false,
        }
    }
}
