//! The diagnostic value

use std::fmt;

use text_size::{TextRange, TextSize};

use super::codes::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Input the grammar rejects
    Error,
    /// The tree is usable but not authoritative
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
        })
    }
}

/// One problem in a source text or a query.
///
/// Displays as `E0201 [4..5]: <message>`, with the hint on a second line
/// when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub code: ErrorCode,
    pub severity: Severity,
    pub range: TextRange,
    pub message: String,
    pub hint: Option<String>,
}

impl SyntaxError {
    pub fn new(code: ErrorCode, range: TextRange, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            range,
            message: message.into(),
            hint: None,
        }
    }

    /// A zero-width diagnostic at `offset`
    pub fn at(code: ErrorCode, offset: TextSize, message: impl Into<String>) -> Self {
        Self::new(code, TextRange::empty(offset), message)
    }

    /// A diagnostic carrying the code's summary as its message
    pub fn from_code(code: ErrorCode, range: TextRange) -> Self {
        Self::new(code, range, code.summary())
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}..{}]: {}",
            self.code,
            u32::from(self.range.start()),
            u32::from(self.range.end()),
            self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}
