//! Recursive descent parser for the query language
//!
//! Builds a lossless rowan tree. Errors are collected rather than returned
//! early, so a query with a typo still produces a full tree.

use rowan::{GreenNode, GreenNodeBuilder};
use text_size::{TextRange, TextSize};

use super::lexer::{Lexer, Token};
use super::syntax_kind::{SyntaxKind, SyntaxNode};

/// Parse result containing the green tree and any errors
#[derive(Debug, Clone)]
pub struct Parse {
    pub green: GreenNode,
    pub errors: Vec<ParseError>,
}

impl Parse {
    /// Get the root syntax node
    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    /// Check if parsing succeeded without errors
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A query syntax error with location and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub range: TextRange,
}

impl ParseError {
    pub fn new(message: impl Into<String>, range: TextRange) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }
}

/// Parse query source into a CST
pub fn parse(input: &str) -> Parse {
    let tokens: Vec<_> = Lexer::new(input).collect();
    let mut parser = Parser::new(&tokens, TextSize::of(input));
    parser.parse_query();
    parser.finish()
}

/// Tokens that can start a pattern
const PATTERN_START: &[SyntaxKind] = &[
    SyntaxKind::L_PAREN,
    SyntaxKind::L_BRACKET,
    SyntaxKind::STRING,
    SyntaxKind::IDENT,
];

struct Parser<'a> {
    tokens: &'a [Token<'a>],
    pos: usize,
    end: TextSize,
    builder: GreenNodeBuilder<'static>,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token<'a>], end: TextSize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
            builder: GreenNodeBuilder::new(),
            errors: Vec::new(),
        }
    }

    fn finish(self) -> Parse {
        Parse {
            green: self.builder.finish(),
            errors: self.errors,
        }
    }

    // =========================================================================
    // Token inspection
    // =========================================================================

    fn current(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn current_kind(&self) -> SyntaxKind {
        self.current().map(|t| t.kind).unwrap_or(SyntaxKind::ERROR)
    }

    fn at(&self, kind: SyntaxKind) -> bool {
        self.current_kind() == kind
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// The `n`th non-trivia token kind from here; `None` at end of input
    fn nth(&self, n: usize) -> Option<SyntaxKind> {
        self.tokens[self.pos.min(self.tokens.len())..]
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .nth(n)
            .map(|t| t.kind)
    }

    /// Text of the `n`th non-trivia token from here
    fn nth_text(&self, n: usize) -> &'a str {
        self.tokens[self.pos.min(self.tokens.len())..]
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .nth(n)
            .map(|t| t.text)
            .unwrap_or("")
    }

    // =========================================================================
    // Token consumption
    // =========================================================================

    fn bump(&mut self) {
        if let Some(token) = self.current() {
            self.builder.token(token.kind.into(), token.text);
            self.pos += 1;
        }
    }

    fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: SyntaxKind, what: &str) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error(format!("expected {what}"));
            false
        }
    }

    fn skip_trivia(&mut self) {
        while self.current().map(|t| t.kind.is_trivia()).unwrap_or(false) {
            self.bump();
        }
    }

    // =========================================================================
    // Error handling
    // =========================================================================

    fn error(&mut self, message: impl Into<String>) {
        let range = self
            .current()
            .map(|t| TextRange::at(t.offset, TextSize::of(t.text)))
            .unwrap_or_else(|| TextRange::empty(self.end));
        self.errors.push(ParseError::new(message, range));
    }

    /// Report an error and wrap the current token in an ERROR node
    fn error_bump(&mut self, message: impl Into<String>) {
        self.error(message);
        self.builder.start_node(SyntaxKind::ERROR.into());
        self.bump();
        self.builder.finish_node();
    }

    fn start_node(&mut self, kind: SyntaxKind) {
        self.builder.start_node(kind.into());
    }

    fn finish_node(&mut self) {
        self.builder.finish_node();
    }

    // =========================================================================
    // Grammar rules
    // =========================================================================

    /// Query = (Pattern | Predicate)*
    fn parse_query(&mut self) {
        self.start_node(SyntaxKind::QUERY);
        loop {
            self.skip_trivia();
            if self.at_eof() {
                break;
            }
            let pos_before = self.pos;
            if self.at_predicate() {
                self.parse_predicate();
            } else if self.at(SyntaxKind::IDENT) && self.nth_text(0) != "_" {
                self.error_bump("expected a pattern; field names are only allowed inside a node");
            } else if PATTERN_START.contains(&self.current_kind()) {
                self.parse_pattern(true);
            } else {
                self.error_bump(format!("unexpected `{}`", self.current_text()));
            }
            if self.pos == pos_before {
                self.error_bump("stuck on token");
            }
        }
        self.finish_node();
    }

    fn current_text(&self) -> &'a str {
        self.current().map(|t| t.text).unwrap_or("")
    }

    fn at_predicate(&self) -> bool {
        self.at(SyntaxKind::L_PAREN) && self.nth(1) == Some(SyntaxKind::PREDICATE_NAME)
    }

    /// Pattern = (NodePattern | Group | Alternation | String | `_`) Quantifier? Capture*
    fn parse_pattern(&mut self, top_level: bool) {
        self.start_node(SyntaxKind::PATTERN);
        match self.current_kind() {
            SyntaxKind::L_PAREN => match self.nth(1) {
                Some(SyntaxKind::IDENT) => self.parse_node_pattern(),
                Some(SyntaxKind::L_PAREN | SyntaxKind::L_BRACKET | SyntaxKind::STRING) => {
                    if !top_level {
                        self.error("grouped sequences are only supported at the top level");
                    }
                    self.parse_group();
                }
                _ => {
                    self.bump();
                    self.error("expected a node kind after `(`");
                    self.skip_trivia();
                    self.eat(SyntaxKind::R_PAREN);
                }
            },
            SyntaxKind::L_BRACKET => self.parse_alternation(),
            SyntaxKind::STRING => {
                self.start_node(SyntaxKind::ANONYMOUS_PATTERN);
                self.bump();
                self.finish_node();
            }
            SyntaxKind::IDENT if self.current_text() == "_" => {
                self.start_node(SyntaxKind::WILDCARD_PATTERN);
                self.bump();
                self.finish_node();
            }
            _ => self.error_bump("expected a pattern"),
        }

        if self.nth(0).is_some_and(SyntaxKind::is_quantifier) {
            self.skip_trivia();
            self.bump();
        }
        while self.nth(0) == Some(SyntaxKind::CAPTURE) {
            self.skip_trivia();
            self.bump();
        }
        self.finish_node();
    }

    /// NodePattern = `(` Ident Child* `)`
    fn parse_node_pattern(&mut self) {
        self.start_node(SyntaxKind::NODE_PATTERN);
        self.bump(); // (
        self.skip_trivia();
        self.bump(); // kind
        self.parse_children();
        self.expect(SyntaxKind::R_PAREN, "`)`");
        self.finish_node();
    }

    /// Group = `(` Child+ `)`
    fn parse_group(&mut self) {
        self.start_node(SyntaxKind::GROUP);
        self.bump(); // (
        self.parse_children();
        self.expect(SyntaxKind::R_PAREN, "`)`");
        self.finish_node();
    }

    /// Child = Anchor | NegatedField | Field | Predicate | Pattern
    fn parse_children(&mut self) {
        loop {
            self.skip_trivia();
            if self.at_eof() || self.at(SyntaxKind::R_PAREN) {
                return;
            }
            let pos_before = self.pos;
            match self.current_kind() {
                SyntaxKind::DOT => {
                    self.start_node(SyntaxKind::ANCHOR);
                    self.bump();
                    self.finish_node();
                }
                SyntaxKind::BANG => {
                    self.start_node(SyntaxKind::NEGATED_FIELD);
                    self.bump();
                    self.skip_trivia();
                    self.expect(SyntaxKind::IDENT, "a field name after `!`");
                    self.finish_node();
                }
                SyntaxKind::IDENT if self.nth(1) == Some(SyntaxKind::COLON) => {
                    self.start_node(SyntaxKind::FIELD);
                    self.bump(); // name
                    self.skip_trivia();
                    self.bump(); // :
                    self.skip_trivia();
                    if PATTERN_START.contains(&self.current_kind()) {
                        self.parse_pattern(false);
                    } else {
                        self.error("expected a pattern after the field name");
                    }
                    self.finish_node();
                }
                SyntaxKind::L_PAREN if self.at_predicate() => self.parse_predicate(),
                SyntaxKind::IDENT if self.current_text() != "_" => {
                    self.error_bump(format!(
                        "unexpected `{}`; node kinds must be parenthesized",
                        self.current_text()
                    ));
                }
                kind if PATTERN_START.contains(&kind) => self.parse_pattern(false),
                SyntaxKind::R_BRACKET => return,
                _ => self.error_bump(format!("unexpected `{}`", self.current_text())),
            }
            if self.pos == pos_before {
                self.error_bump("stuck on token");
            }
        }
    }

    /// Alternation = `[` Pattern+ `]`
    fn parse_alternation(&mut self) {
        self.start_node(SyntaxKind::ALTERNATION);
        self.bump(); // [
        loop {
            self.skip_trivia();
            if self.at_eof() || self.at(SyntaxKind::R_BRACKET) {
                break;
            }
            let pos_before = self.pos;
            if self.at(SyntaxKind::IDENT) && self.current_text() != "_" {
                self.error_bump("expected a pattern inside `[`");
            } else if PATTERN_START.contains(&self.current_kind()) {
                self.parse_pattern(false);
            } else if self.at(SyntaxKind::R_PAREN) {
                break;
            } else {
                self.error_bump(format!("unexpected `{}`", self.current_text()));
            }
            if self.pos == pos_before {
                self.error_bump("stuck on token");
            }
        }
        self.expect(SyntaxKind::R_BRACKET, "`]`");
        self.finish_node();
    }

    /// Predicate = `(` PredicateName (Capture | String | Ident)* `)`
    fn parse_predicate(&mut self) {
        self.start_node(SyntaxKind::PREDICATE);
        self.bump(); // (
        self.skip_trivia();
        self.bump(); // #name
        loop {
            self.skip_trivia();
            match self.current_kind() {
                SyntaxKind::CAPTURE | SyntaxKind::STRING | SyntaxKind::IDENT => self.bump(),
                _ => break,
            }
        }
        self.expect(SyntaxKind::R_PAREN, "`)` to close the predicate");
        self.finish_node();
    }
}
