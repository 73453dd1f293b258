//! # canopy-base
//!
//! Incremental parsing runtime: table-driven LR parsing with error recovery,
//! immutable syntax trees that share structure across edits, and a pattern
//! query engine over those trees.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! query       → Query DSL (logos + rowan), compiled patterns, QueryCursor
//!   ↓
//! parser      → LR driver, error recovery, subtree reuse, cancellation
//!   ↓
//! tree        → Tree, Node, TreeCursor, edits, changed ranges
//!   ↓
//! lexer       → Lex modes, external scanners, text inputs
//!   ↓
//! language    → Grammar tables and the versioned grammar blob
//!   ↓
//! diagnostics → Error codes and SyntaxError
//!   ↓
//! base        → Edit, Point, LineIndex, TextRange
//! ```
//!
//! `grammars` holds the grammar builder and the bundled Wren grammar.
//!
//! ```
//! let mut parser = canopy::Parser::new(canopy::grammars::wren::language());
//! let tree = parser.parse("var a = 1", None);
//! assert_eq!(
//!     tree.root_node().to_sexp(),
//!     "(source_file (var_statement name: (identifier) value: (number)))"
//! );
//! ```

// ============================================================================
// MODULES (dependency order: base → diagnostics → language → lexer → tree → parser → query)
// ============================================================================

/// Foundation types: Edit, Point, LineIndex, TextRange
pub mod base;

/// Error codes and syntax diagnostics
pub mod diagnostics;

/// Grammar tables and grammar blob loading
pub mod language;

/// Table-driven lexer with lex modes and external scanners
pub mod lexer;

/// Syntax trees: nodes, cursors, edits, changed ranges
pub mod tree;

/// Incremental LR parser with error recovery
pub mod parser;

/// Tree queries
pub mod query;

/// Grammar builder and bundled grammars
pub mod grammars;

// Re-export foundation types
pub use base::{Edit, LineIndex, Point, TextRange, TextSize};

// Re-export the main entry points
pub use diagnostics::{ErrorCode, Severity, SyntaxError};
pub use language::{Language, LoadError};
pub use lexer::{ExternalScanner, TextInput};
pub use parser::{ParseOptions, ParseStats, Parser};
pub use query::{Query, QueryCapture, QueryCursor, QueryError, QueryMatch};
pub use tree::{Node, ParseStatus, Tree, TreeCursor};
