//! Tree queries
//!
//! ```text
//! query source ──▶ Lexer (logos) ──▶ Parser (rowan CST)
//!                                        │
//!                                        ▼
//!                  compile: kinds and fields resolved ──▶ Query
//!                                                          │
//! Tree ──▶ QueryCursor (byte ranges, match limit) ──▶ QueryMatches ──▶ QueryCaptures
//! ```
//!
//! The syntax follows tree-sitter's:
//!
//! ```text
//! (var_statement name: (identifier) @name value: (_)? @value)
//! (binary_expression "+" @op)
//! [(number) (string)] @literal
//! ((identifier) @id (#eq? @id "self"))
//! (block . (_) @first)
//! (if_statement !alternative) @bare_if
//! ```
//!
//! `#eq?`, `#not-eq?`, `#match?` and `#not-match?` are supported. The
//! `#match?` pattern is a [`regex`] searched anywhere in the capture text;
//! anchor it with `^` and `$` to test the whole text.

mod compile;
mod cursor;
mod lexer;
mod parser;
mod syntax_kind;

use indexmap::IndexSet;
use smol_str::SmolStr;
use text_size::TextSize;
use thiserror::Error;

use crate::diagnostics::{ErrorCode, SyntaxError};
use crate::language::Language;

pub use cursor::{DEFAULT_MATCH_LIMIT, QueryCapture, QueryCaptures, QueryCursor, QueryMatch, QueryMatches};
pub use parser::{Parse, ParseError, parse};
pub use syntax_kind::{QueryLanguage, SyntaxElement, SyntaxKind, SyntaxNode, SyntaxToken};

use compile::{Pattern, Step};

/// What went wrong compiling a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    Syntax,
    NodeType,
    Field,
    Capture,
    Predicate,
}

impl QueryErrorKind {
    pub fn code(self) -> ErrorCode {
        match self {
            Self::Syntax => ErrorCode::E0501,
            Self::NodeType => ErrorCode::E0502,
            Self::Field => ErrorCode::E0503,
            Self::Capture => ErrorCode::E0504,
            Self::Predicate => ErrorCode::E0505,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} at offset {at}: {message}", code = .kind.code(), at = u32::from(*.offset))]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub offset: TextSize,
    pub message: String,
}

impl QueryError {
    pub(crate) fn new(kind: QueryErrorKind, offset: TextSize, message: impl Into<String>) -> Self {
        Self {
            kind,
            offset,
            message: message.into(),
        }
    }

    /// The error as a diagnostic over the query source
    pub fn to_diagnostic(&self) -> SyntaxError {
        SyntaxError::at(self.kind.code(), self.offset, self.message.clone())
    }
}

/// A compiled query
#[derive(Debug)]
pub struct Query {
    language: Language,
    steps: Vec<Step>,
    patterns: Vec<Pattern>,
    capture_names: IndexSet<SmolStr>,
}

impl Query {
    pub fn new(language: &Language, source: &str) -> Result<Self, QueryError> {
        let compiled = compile::compile(language, source)?;
        Ok(Self {
            language: language.clone(),
            steps: compiled.steps,
            patterns: compiled.patterns,
            capture_names: compiled.capture_names,
        })
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Capture names, indexed by [`QueryCapture::index`]
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.capture_names.iter().map(SmolStr::as_str)
    }

    pub fn capture_name(&self, index: u32) -> Option<&str> {
        self.capture_names.get_index(index as usize).map(SmolStr::as_str)
    }

    pub fn capture_index_for_name(&self, name: &str) -> Option<u32> {
        self.capture_names.get_index_of(name).map(|index| index as u32)
    }

    /// Where pattern `index` starts in the query source
    pub fn start_byte_for_pattern(&self, index: usize) -> Option<TextSize> {
        self.patterns.get(index).map(|pattern| pattern.start_byte)
    }

    /// Every syntax error in `source`, without stopping at the first
    pub fn check_syntax(source: &str) -> Vec<SyntaxError> {
        parse(source)
            .errors
            .into_iter()
            .map(|error| SyntaxError::new(ErrorCode::E0501, error.range, error.message))
            .collect()
    }
}

#[cfg(test)]
mod tests;
