//! On-demand lexer
//!
//! ```text
//! parser state ──▶ lex mode ──▶ external scanner? ──▶ NFA longest match
//!                                                       │ no match
//!                                                       ▼
//!                                  error mode (all terminals) ──▶ error token
//! ```
//!
//! The lexer is called by the parser with the offset of the next token and
//! the lex mode of the current parse state. When the grammar names a word
//! token, keywords are reserved: a word is matched first and then checked
//! against the keywords, so `while` is never an identifier, even where the
//! parser cannot accept the keyword. Every token records how far past its
//! end the lexer looked (`lookahead_bytes`); edits inside that window
//! invalidate the token.

mod external;
mod input;

use std::sync::Arc;

use text_size::{TextRange, TextSize};

use crate::language::{ERROR_LEX_MODE, GrammarTable, Language, LexModeId, LexNode, Symbol};

pub use external::{ExternalScanner, ScanCursor};
pub use input::{ChunkedInput, TextInput};
pub(crate) use input::char_at;

/// A lexed token. Ephemeral: the parser turns it into a leaf subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub symbol: Symbol,
    pub start: TextSize,
    pub size: TextSize,
    /// Bytes inspected past the end of the token
    pub lookahead_bytes: u32,
    pub lex_mode: LexModeId,
    /// Unrecognized input
    pub is_error: bool,
    /// Scanner state after an external token
    pub external_state: Option<Arc<[u8]>>,
}

impl Token {
    pub fn end(&self) -> TextSize {
        self.start + self.size
    }

    pub fn range(&self) -> TextRange {
        TextRange::at(self.start, self.size)
    }
}

/// Reusable lexer for one language; holds only scratch buffers
pub struct Lexer {
    language: Language,
    current: Vec<u32>,
    next: Vec<u32>,
    stack: Vec<u32>,
    marks: Vec<u32>,
    generation: u32,
}

/// Longest internal match
struct Match {
    symbol: Symbol,
    end: usize,
    furthest: usize,
}

impl Lexer {
    pub fn new(language: Language) -> Self {
        let node_count = language.table().lex_nodes.len();
        Self {
            language,
            current: Vec::new(),
            next: Vec::new(),
            stack: Vec::new(),
            marks: vec![0; node_count],
            generation: 0,
        }
    }

    /// Lex the token starting at `position` in `mode`.
    ///
    /// `external_state` is the scanner state to restore before calling the
    /// external scanner (the state after the last external token).
    pub fn lex(
        &mut self,
        input: &mut dyn TextInput,
        position: usize,
        mode: LexModeId,
        scanner: Option<&mut Box<dyn ExternalScanner>>,
        external_state: Option<&[u8]>,
    ) -> Token {
        let language = self.language.clone();
        let lex_mode = language.lex_mode(mode);

        if let Some(scanner) = scanner.filter(|_| lex_mode.has_externals()) {
            let scanner: &mut dyn ExternalScanner = &mut **scanner;
            if let Some(token) = self.lex_external(input, position, mode, scanner, external_state) {
                return token;
            }
        }

        if char_at(input, position).is_none() {
            return Token {
                symbol: Symbol::END,
                start: offset(position),
                size: TextSize::new(0),
                lookahead_bytes: 0,
                lex_mode: mode,
                is_error: false,
                external_state: None,
            };
        }

        if let Some(found) = self.longest_match(input, position, &lex_mode.tokens) {
            let found = self.keyword_for(input, position, found);
            return self.token(position, found, mode);
        }

        if mode != ERROR_LEX_MODE {
            let all = language.lex_mode(ERROR_LEX_MODE);
            if let Some(found) = self.longest_match(input, position, &all.tokens) {
                let found = self.keyword_for(input, position, found);
                tracing::trace!(
                    position,
                    symbol = language.symbol_name(found.symbol),
                    "token lexed outside the expected lex mode"
                );
                return self.token(position, found, ERROR_LEX_MODE);
            }
        }

        self.error_token(input, position)
    }

    fn lex_external(
        &mut self,
        input: &mut dyn TextInput,
        position: usize,
        mode: LexModeId,
        scanner: &mut dyn ExternalScanner,
        external_state: Option<&[u8]>,
    ) -> Option<Token> {
        let language = self.language.clone();
        let lex_mode = language.lex_mode(mode);
        scanner.deserialize(external_state.unwrap_or_default());

        let mut cursor = ScanCursor::new(input, position);
        let index = scanner.scan(&mut cursor, &lex_mode.externals)?;
        if !lex_mode.externals.get(index).copied().unwrap_or(false) {
            tracing::warn!(index, "external scanner returned a token that is not valid here");
            return None;
        }
        let symbol = language.table().external_tokens()[index];
        let end = cursor.token_end().max(position);
        if end == position && language.is_extra(symbol) {
            return None;
        }
        let furthest = cursor.furthest().max(end);

        let mut state = Vec::new();
        scanner.serialize(&mut state);
        Some(Token {
            symbol,
            start: offset(position),
            size: offset(end - position),
            lookahead_bytes: (furthest - end) as u32,
            lex_mode: mode,
            is_error: false,
            external_state: Some(state.into()),
        })
    }

    fn token(&self, position: usize, found: Match, mode: LexModeId) -> Token {
        Token {
            symbol: found.symbol,
            start: offset(position),
            size: offset(found.end - position),
            lookahead_bytes: (found.furthest.max(found.end) - found.end) as u32,
            lex_mode: mode,
            is_error: false,
            external_state: None,
        }
    }

    /// Consume unrecognized characters up to the next offset where some
    /// terminal matches (always at least one character)
    fn error_token(&mut self, input: &mut dyn TextInput, position: usize) -> Token {
        let all = self.language.lex_mode(ERROR_LEX_MODE).tokens.clone();
        let mut end = position;
        let mut furthest = position;
        while let Some((_, len)) = char_at(input, end) {
            end += len;
            furthest = furthest.max(end);
            if char_at(input, end).is_none() {
                break;
            }
            if let Some(found) = self.longest_match(input, end, &all) {
                furthest = furthest.max(found.furthest);
                break;
            }
        }
        tracing::debug!(start = position, end, "unrecognized input");
        Token {
            symbol: Symbol::ERROR,
            start: offset(position),
            size: offset(end - position),
            lookahead_bytes: (furthest.max(end) - end) as u32,
            lex_mode: ERROR_LEX_MODE,
            is_error: true,
            external_state: None,
        }
    }

    /// A word spelling a keyword lexes as that keyword
    fn keyword_for(&mut self, input: &mut dyn TextInput, position: usize, found: Match) -> Match {
        let language = self.language.clone();
        if language.table().word_token() != Some(found.symbol) {
            return found;
        }
        match self.longest_match(input, position, language.keywords()) {
            Some(keyword) if keyword.end == found.end => Match {
                symbol: keyword.symbol,
                end: found.end,
                furthest: found.furthest.max(keyword.furthest),
            },
            _ => found,
        }
    }

    // =========================================================================
    // NFA simulation
    // =========================================================================

    fn longest_match(
        &mut self,
        input: &mut dyn TextInput,
        position: usize,
        tokens: &[Symbol],
    ) -> Option<Match> {
        let language = self.language.clone();
        let table = language.table();

        self.generation = self.generation.wrapping_add(1);
        self.current.clear();
        for &symbol in tokens {
            if let Some(start) = table.token_lex[symbol.index()].start {
                self.add_closure(start, Current);
            }
        }

        let mut best: Option<(usize, Symbol)> = None;
        let mut pos = position;
        let mut furthest = position;
        loop {
            let consuming = self.current.iter().any(|&node| {
                matches!(table.lex_nodes[node as usize], LexNode::Chars { .. })
            });
            if !consuming {
                break;
            }
            let Some((c, len)) = char_at(input, pos) else {
                break;
            };
            furthest = furthest.max(pos + len);

            self.generation = self.generation.wrapping_add(1);
            self.next.clear();
            let current = std::mem::take(&mut self.current);
            for &node in &current {
                if let LexNode::Chars {
                    ranges,
                    negated,
                    next,
                } = &table.lex_nodes[node as usize]
                {
                    if LexNode::matches(ranges, *negated, c) {
                        self.add_closure(*next, Next);
                    }
                }
            }
            self.current = current;
            std::mem::swap(&mut self.current, &mut self.next);
            pos += len;
            if self.current.is_empty() {
                break;
            }

            for &node in &self.current {
                if let LexNode::Accept(symbol) = table.lex_nodes[node as usize] {
                    let better = match best {
                        None => true,
                        Some((end, incumbent)) => {
                            pos > end
                                || (pos == end && outranks(table, symbol, incumbent))
                        }
                    };
                    if better {
                        best = Some((pos, symbol));
                    }
                }
            }
        }

        best.map(|(end, symbol)| Match {
            symbol,
            end,
            furthest,
        })
    }

    /// Add `node` and everything reachable through splits to a state set
    fn add_closure(&mut self, node: u32, target: SetTarget) {
        let table = self.language.table();
        self.stack.clear();
        self.stack.push(node);
        while let Some(node) = self.stack.pop() {
            let slot = &mut self.marks[node as usize];
            if *slot == self.generation {
                continue;
            }
            *slot = self.generation;
            match table.lex_nodes[node as usize] {
                LexNode::Split(a, b) => {
                    self.stack.push(b);
                    self.stack.push(a);
                }
                _ => match target {
                    Current => self.current.push(node),
                    Next => self.next.push(node),
                },
            }
        }
    }
}

#[derive(Clone, Copy)]
enum SetTarget {
    Current,
    Next,
}
use SetTarget::{Current, Next};

/// Tie-break between two tokens of equal length: literals beat patterns,
/// then the lower symbol wins
fn outranks(table: &GrammarTable, candidate: Symbol, incumbent: Symbol) -> bool {
    let candidate_literal = table.token_lex[candidate.index()].literal;
    let incumbent_literal = table.token_lex[incumbent.index()].literal;
    match (candidate_literal, incumbent_literal) {
        (true, false) => true,
        (false, true) => false,
        _ => candidate < incumbent,
    }
}

#[inline]
fn offset(bytes: usize) -> TextSize {
    TextSize::new(bytes as u32)
}
