//! Logos-based lexer for the query language

use logos::Logos;
use text_size::TextSize;

use super::syntax_kind::SyntaxKind;

/// A query token and where it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: SyntaxKind,
    pub text: &'a str,
    pub offset: TextSize,
}

/// Lossless token stream over query source; unrecognized input comes out
/// as [`SyntaxKind::ERROR`] tokens
pub struct Lexer<'a> {
    inner: logos::Lexer<'a, LogosToken>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            inner: LogosToken::lexer(source),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let kind = self.inner.next()?.map_or(SyntaxKind::ERROR, SyntaxKind::from);
        Some(Token {
            kind,
            text: self.inner.slice(),
            offset: TextSize::new(self.inner.span().start as u32),
        })
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
pub enum LogosToken {
    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    #[regex(r";[^\n]*")]
    Comment,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    #[regex(r#""([^"\\]|\\.)*""#)]
    String,

    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_.\-]*")]
    Capture,

    #[regex(r"#[a-zA-Z_][a-zA-Z0-9_\-]*[?!]?")]
    PredicateName,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    #[token(":")]
    Colon,

    #[token("!")]
    Bang,

    #[token(".")]
    Dot,

    #[token("?")]
    Question,

    #[token("*")]
    Star,

    #[token("+")]
    Plus,
}

impl From<LogosToken> for SyntaxKind {
    fn from(token: LogosToken) -> Self {
        match token {
            LogosToken::Whitespace => SyntaxKind::WHITESPACE,
            LogosToken::Comment => SyntaxKind::COMMENT,
            LogosToken::Ident => SyntaxKind::IDENT,
            LogosToken::String => SyntaxKind::STRING,
            LogosToken::Capture => SyntaxKind::CAPTURE,
            LogosToken::PredicateName => SyntaxKind::PREDICATE_NAME,
            LogosToken::LParen => SyntaxKind::L_PAREN,
            LogosToken::RParen => SyntaxKind::R_PAREN,
            LogosToken::LBracket => SyntaxKind::L_BRACKET,
            LogosToken::RBracket => SyntaxKind::R_BRACKET,
            LogosToken::Colon => SyntaxKind::COLON,
            LogosToken::Bang => SyntaxKind::BANG,
            LogosToken::Dot => SyntaxKind::DOT,
            LogosToken::Question => SyntaxKind::QUESTION,
            LogosToken::Star => SyntaxKind::STAR,
            LogosToken::Plus => SyntaxKind::PLUS,
        }
    }
}
