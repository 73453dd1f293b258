//! Error codes
//!
//! - E01xx: lexical (input no token matches)
//! - E02xx: syntax (tokens the grammar rejects or lacks)
//! - E03xx: parse lifecycle
//! - E05xx: query compilation

use std::fmt;

use super::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCode {
    /// Character not matched by any token of the grammar
    E0101,
    /// Token(s) that do not fit the grammar at this position
    E0201,
    /// Token the grammar required but the source lacks
    E0202,
    /// Parse stopped early; the tree is incomplete
    E0301,
    /// Malformed query source
    E0501,
    /// Node kind not defined by the language
    E0502,
    /// Field not defined by the language
    E0503,
    /// Capture referenced by a predicate but not bound by its pattern
    E0504,
    /// Unknown predicate or wrong predicate arguments
    E0505,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E0101 => "E0101",
            Self::E0201 => "E0201",
            Self::E0202 => "E0202",
            Self::E0301 => "E0301",
            Self::E0501 => "E0501",
            Self::E0502 => "E0502",
            Self::E0503 => "E0503",
            Self::E0504 => "E0504",
            Self::E0505 => "E0505",
        }
    }

    /// Message used when nothing more specific is known
    pub fn summary(self) -> &'static str {
        match self {
            Self::E0101 => "unrecognized character",
            Self::E0201 => "unexpected token",
            Self::E0202 => "missing token",
            Self::E0301 => "parse stopped before the end of the input",
            Self::E0501 => "invalid query syntax",
            Self::E0502 => "unknown node type",
            Self::E0503 => "unknown field",
            Self::E0504 => "unknown capture",
            Self::E0505 => "invalid predicate",
        }
    }

    /// A cancelled parse leaves a usable tree, so it only warns
    pub fn severity(self) -> Severity {
        match self {
            Self::E0301 => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn is_query_error(self) -> bool {
        matches!(
            self,
            Self::E0501 | Self::E0502 | Self::E0503 | Self::E0504 | Self::E0505
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
