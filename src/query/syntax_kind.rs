//! Syntax kinds for the query CST

/// Token and node kinds of the query language
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum SyntaxKind {
    // =========================================================================
    // TRIVIA
    // =========================================================================
    WHITESPACE = 0,
    COMMENT, // ; to end of line

    // =========================================================================
    // TOKENS
    // =========================================================================
    IDENT,          // node kind, field name or `_`
    STRING,         // "literal"
    CAPTURE,        // @name
    PREDICATE_NAME, // #eq?
    L_PAREN,        // (
    R_PAREN,        // )
    L_BRACKET,      // [
    R_BRACKET,      // ]
    COLON,          // :
    BANG,           // !
    DOT,            // .
    QUESTION,       // ?
    STAR,           // *
    PLUS,           // +

    // =========================================================================
    // NODES
    // =========================================================================
    QUERY,
    /// A pattern with its quantifier and captures
    PATTERN,
    /// `(kind child*)`
    NODE_PATTERN,
    /// `"literal"`
    ANONYMOUS_PATTERN,
    /// `_`
    WILDCARD_PATTERN,
    /// `[ pattern+ ]`
    ALTERNATION,
    /// `( pattern+ )` at the top level
    GROUP,
    /// `name: pattern`
    FIELD,
    /// `!name`
    NEGATED_FIELD,
    ANCHOR,
    /// `(#name? arg*)`
    PREDICATE,

    ERROR,

    #[doc(hidden)]
    __LAST,
}

impl SyntaxKind {
    const ALL: [SyntaxKind; SyntaxKind::__LAST as usize] = [
        Self::WHITESPACE,
        Self::COMMENT,
        Self::IDENT,
        Self::STRING,
        Self::CAPTURE,
        Self::PREDICATE_NAME,
        Self::L_PAREN,
        Self::R_PAREN,
        Self::L_BRACKET,
        Self::R_BRACKET,
        Self::COLON,
        Self::BANG,
        Self::DOT,
        Self::QUESTION,
        Self::STAR,
        Self::PLUS,
        Self::QUERY,
        Self::PATTERN,
        Self::NODE_PATTERN,
        Self::ANONYMOUS_PATTERN,
        Self::WILDCARD_PATTERN,
        Self::ALTERNATION,
        Self::GROUP,
        Self::FIELD,
        Self::NEGATED_FIELD,
        Self::ANCHOR,
        Self::PREDICATE,
        Self::ERROR,
    ];

    /// Check if this is a trivia token (whitespace or comment)
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::WHITESPACE | Self::COMMENT)
    }

    /// Check if this is a quantifier token
    pub fn is_quantifier(self) -> bool {
        matches!(self, Self::QUESTION | Self::STAR | Self::PLUS)
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

impl From<rowan::SyntaxKind> for SyntaxKind {
    fn from(raw: rowan::SyntaxKind) -> Self {
        Self::ALL.get(raw.0 as usize).copied().unwrap_or(Self::ERROR)
    }
}

/// Language definition for Rowan
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryLanguage {}

impl rowan::Language for QueryLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        raw.into()
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

pub type SyntaxNode = rowan::SyntaxNode<QueryLanguage>;
pub type SyntaxToken = rowan::SyntaxToken<QueryLanguage>;
pub type SyntaxElement = rowan::SyntaxElement<QueryLanguage>;
