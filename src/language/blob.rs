//! Binary encoding of [`GrammarTable`]s
//!
//! ```text
//! "CNPY" | version: u16 | flags: u16
//! name | symbols | token_count | fields | productions
//! state_count | actions | gotos | lex nodes | token lex
//! extras | externals | start symbol | word token (since version 2)
//! ```
//!
//! All integers are little-endian; strings are a `u32` length followed by
//! UTF-8 bytes.

use smol_str::SmolStr;
use thiserror::Error;

use super::symbol::{FieldId, Symbol, SymbolInfo};
use super::table::{GrammarTable, LexNode, ParseAction, Production, TokenLex};

/// Magic bytes of a compiled grammar: "CNPY"
pub const MAGIC: &[u8; 4] = b"CNPY";

/// Format version written by this runtime
pub const FORMAT_VERSION: u16 = 2;

/// Oldest format version this runtime can load
pub const MIN_COMPATIBLE_VERSION: u16 = 1;

mod symbol_flags {
    pub const VISIBLE: u8 = 0x01;
    pub const NAMED: u8 = 0x02;
    pub const EXTRA: u8 = 0x04;
    pub const REPETITION: u8 = 0x08;
}

mod token_flags {
    pub const HAS_START: u8 = 0x01;
    pub const LITERAL: u8 = 0x02;
    pub const KEYWORD: u8 = 0x04;
}

mod action_tag {
    pub const NONE: u8 = 0;
    pub const SHIFT: u8 = 1;
    pub const REDUCE: u8 = 2;
    pub const ACCEPT: u8 = 3;
}

mod lex_tag {
    pub const CHARS: u8 = 0;
    pub const SPLIT: u8 = 1;
    pub const ACCEPT: u8 = 2;
}

/// Reasons a compiled grammar cannot be turned into a [`super::Language`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("not a compiled grammar (bad magic bytes)")]
    InvalidMagic,
    #[error("grammar format version {found} is not supported (supported: {min}..={max})")]
    GrammarVersionMismatch { found: u16, min: u16, max: u16 },
    #[error("compiled grammar is truncated at byte {offset}")]
    UnexpectedEof { offset: usize },
    #[error("compiled grammar contains an invalid UTF-8 string")]
    InvalidUtf8,
    #[error("malformed grammar table: {0}")]
    Malformed(String),
}

/// Serialize a table to the compiled grammar format
pub fn encode(table: &GrammarTable) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    put_u16(&mut out, FORMAT_VERSION);
    put_u16(&mut out, 0); // flags (reserved)

    put_str(&mut out, &table.name);

    put_u32(&mut out, table.symbols.len() as u32);
    for info in &table.symbols {
        put_str(&mut out, &info.name);
        let mut flags = 0;
        if info.visible {
            flags |= symbol_flags::VISIBLE;
        }
        if info.named {
            flags |= symbol_flags::NAMED;
        }
        if info.extra {
            flags |= symbol_flags::EXTRA;
        }
        if info.repetition {
            flags |= symbol_flags::REPETITION;
        }
        out.push(flags);
    }
    put_u16(&mut out, table.token_count);

    put_u32(&mut out, table.fields.len() as u32);
    for field in &table.fields {
        put_str(&mut out, field);
    }

    put_u32(&mut out, table.productions.len() as u32);
    for production in &table.productions {
        put_u16(&mut out, production.lhs.0);
        put_u16(&mut out, production.child_count);
        put_u16(&mut out, production.fields.len() as u16);
        for &(child, field) in &production.fields {
            put_u16(&mut out, child);
            put_u16(&mut out, field.0);
        }
    }

    put_u16(&mut out, table.state_count);
    for action in &table.actions {
        match action {
            None => out.push(action_tag::NONE),
            Some(ParseAction::Shift(state)) => {
                out.push(action_tag::SHIFT);
                put_u16(&mut out, *state);
            }
            Some(ParseAction::Reduce(production)) => {
                out.push(action_tag::REDUCE);
                put_u16(&mut out, *production);
            }
            Some(ParseAction::Accept) => out.push(action_tag::ACCEPT),
        }
    }
    for goto in &table.gotos {
        match goto {
            None => out.push(0),
            Some(state) => {
                out.push(1);
                put_u16(&mut out, *state);
            }
        }
    }

    put_u32(&mut out, table.lex_nodes.len() as u32);
    for node in &table.lex_nodes {
        match node {
            LexNode::Chars {
                ranges,
                negated,
                next,
            } => {
                out.push(lex_tag::CHARS);
                out.push(u8::from(*negated));
                put_u32(&mut out, *next);
                put_u32(&mut out, ranges.len() as u32);
                for &(lo, hi) in ranges {
                    put_u32(&mut out, lo as u32);
                    put_u32(&mut out, hi as u32);
                }
            }
            LexNode::Split(a, b) => {
                out.push(lex_tag::SPLIT);
                put_u32(&mut out, *a);
                put_u32(&mut out, *b);
            }
            LexNode::Accept(symbol) => {
                out.push(lex_tag::ACCEPT);
                put_u16(&mut out, symbol.0);
            }
        }
    }
    for lex in &table.token_lex {
        let mut flags = 0;
        if lex.start.is_some() {
            flags |= token_flags::HAS_START;
        }
        if lex.literal {
            flags |= token_flags::LITERAL;
        }
        if lex.keyword {
            flags |= token_flags::KEYWORD;
        }
        out.push(flags);
        put_u32(&mut out, lex.start.unwrap_or(0));
    }

    put_symbols(&mut out, &table.extras);
    put_symbols(&mut out, &table.external_tokens);
    put_u16(&mut out, table.start_symbol.0);
    // END is never a word token, so 0 means none
    put_u16(&mut out, table.word_token.map_or(0, |symbol| symbol.0));
    out
}

/// Parse and validate a compiled grammar
pub fn decode(data: &[u8]) -> Result<(GrammarTable, u16), LoadError> {
    let mut reader = Reader::new(data);

    if reader.bytes(MAGIC.len())? != MAGIC {
        return Err(LoadError::InvalidMagic);
    }
    let version = reader.u16()?;
    if !(MIN_COMPATIBLE_VERSION..=FORMAT_VERSION).contains(&version) {
        return Err(LoadError::GrammarVersionMismatch {
            found: version,
            min: MIN_COMPATIBLE_VERSION,
            max: FORMAT_VERSION,
        });
    }
    let _flags = reader.u16()?;

    let name = reader.string()?;

    let symbol_count = reader.count()?;
    let mut symbols = Vec::with_capacity(symbol_count);
    for _ in 0..symbol_count {
        let name = reader.string()?;
        let flags = reader.u8()?;
        symbols.push(SymbolInfo {
            name,
            visible: flags & symbol_flags::VISIBLE != 0,
            named: flags & symbol_flags::NAMED != 0,
            extra: flags & symbol_flags::EXTRA != 0,
            repetition: flags & symbol_flags::REPETITION != 0,
        });
    }
    let token_count = reader.u16()?;
    if token_count as usize > symbols.len() {
        return Err(LoadError::Malformed("token count exceeds symbol count".into()));
    }

    let field_count = reader.count()?;
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        fields.push(reader.string()?);
    }

    let production_count = reader.count()?;
    let mut productions = Vec::with_capacity(production_count);
    for _ in 0..production_count {
        let lhs = Symbol(reader.u16()?);
        let child_count = reader.u16()?;
        let mapped = reader.u16()?;
        let mut production_fields = Vec::with_capacity(mapped as usize);
        for _ in 0..mapped {
            production_fields.push((reader.u16()?, FieldId(reader.u16()?)));
        }
        productions.push(Production {
            lhs,
            child_count,
            fields: production_fields,
        });
    }

    let state_count = reader.u16()?;
    let action_count = state_count as usize * token_count as usize;
    let mut actions = Vec::with_capacity(action_count);
    for _ in 0..action_count {
        let action = match reader.u8()? {
            action_tag::NONE => None,
            action_tag::SHIFT => Some(ParseAction::Shift(reader.u16()?)),
            action_tag::REDUCE => Some(ParseAction::Reduce(reader.u16()?)),
            action_tag::ACCEPT => Some(ParseAction::Accept),
            tag => return Err(LoadError::Malformed(format!("unknown action tag {tag}"))),
        };
        actions.push(action);
    }
    let goto_count = state_count as usize * (symbols.len() - token_count as usize);
    let mut gotos = Vec::with_capacity(goto_count);
    for _ in 0..goto_count {
        gotos.push(match reader.u8()? {
            0 => None,
            _ => Some(reader.u16()?),
        });
    }

    let node_count = reader.count()?;
    let mut lex_nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let node = match reader.u8()? {
            lex_tag::CHARS => {
                let negated = reader.u8()? != 0;
                let next = reader.u32()?;
                let range_count = reader.count()?;
                let mut ranges = Vec::with_capacity(range_count);
                for _ in 0..range_count {
                    ranges.push((reader.char()?, reader.char()?));
                }
                LexNode::Chars {
                    ranges,
                    negated,
                    next,
                }
            }
            lex_tag::SPLIT => LexNode::Split(reader.u32()?, reader.u32()?),
            lex_tag::ACCEPT => LexNode::Accept(Symbol(reader.u16()?)),
            tag => return Err(LoadError::Malformed(format!("unknown lexer node tag {tag}"))),
        };
        lex_nodes.push(node);
    }
    let mut token_lex = Vec::with_capacity(token_count as usize);
    for _ in 0..token_count {
        let flags = reader.u8()?;
        let start = reader.u32()?;
        token_lex.push(TokenLex {
            start: (flags & token_flags::HAS_START != 0).then_some(start),
            literal: flags & token_flags::LITERAL != 0,
            keyword: version >= 2 && flags & token_flags::KEYWORD != 0,
        });
    }

    let extras = reader.symbols()?;
    let external_tokens = reader.symbols()?;
    let start_symbol = Symbol(reader.u16()?);
    let word_token = if version >= 2 {
        Some(Symbol(reader.u16()?)).filter(|&symbol| symbol != Symbol::END)
    } else {
        None
    };

    if !reader.is_at_end() {
        return Err(LoadError::Malformed("trailing bytes after grammar table".into()));
    }

    let table = GrammarTable {
        name,
        symbols,
        token_count,
        fields,
        productions,
        state_count,
        actions,
        gotos,
        lex_nodes,
        token_lex,
        extras,
        external_tokens,
        start_symbol,
        word_token,
    };
    table.validate()?;
    Ok((table, version))
}

// ============================================================================
// Primitive writers
// ============================================================================

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_str(out: &mut Vec<u8>, value: &str) {
    put_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

fn put_symbols(out: &mut Vec<u8>, symbols: &[Symbol]) {
    put_u16(out, symbols.len() as u16);
    for symbol in symbols {
        put_u16(out, symbol.0);
    }
}

// ============================================================================
// Reader
// ============================================================================

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.offset == self.data.len()
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], LoadError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(LoadError::UnexpectedEof {
                offset: self.offset,
            })?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], LoadError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.bytes(N)?);
        Ok(array)
    }

    fn u8(&mut self) -> Result<u8, LoadError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, LoadError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, LoadError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// A `u32` element count, bounded by the remaining input so corrupt
    /// counts fail as truncation rather than huge allocations
    fn count(&mut self) -> Result<usize, LoadError> {
        let len = self.u32()? as usize;
        if len > self.data.len() - self.offset {
            return Err(LoadError::UnexpectedEof {
                offset: self.offset,
            });
        }
        Ok(len)
    }

    fn char(&mut self) -> Result<char, LoadError> {
        let value = self.u32()?;
        char::from_u32(value)
            .ok_or_else(|| LoadError::Malformed(format!("invalid character {value:#x}")))
    }

    fn string(&mut self) -> Result<SmolStr, LoadError> {
        let len = self.count()?;
        let bytes = self.bytes(len)?;
        std::str::from_utf8(bytes)
            .map(SmolStr::new)
            .map_err(|_| LoadError::InvalidUtf8)
    }

    fn symbols(&mut self) -> Result<Vec<Symbol>, LoadError> {
        let count = self.u16()?;
        (0..count).map(|_| Ok(Symbol(self.u16()?))).collect()
    }
}
