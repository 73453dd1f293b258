//! Diagnostics for in-content errors
//!
//! Trees never fail to build: malformed input becomes ERROR and MISSING
//! nodes, and [`Tree::diagnostics`](crate::tree::Tree::diagnostics) reports
//! them here. Query compile errors use the same type.

mod codes;
mod error;

pub use codes::ErrorCode;
pub use error::{Severity, SyntaxError};
