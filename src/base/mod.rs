//! Foundation types for the canopy runtime.
//!
//! This module provides fundamental types used throughout the engine:
//! - [`TextRange`], [`TextSize`] - Byte offsets and ranges (from `text-size`)
//! - [`Point`], [`LineIndex`] - Row/column conversion
//! - [`Edit`] - A single contiguous text replacement
//!
//! This module has NO dependencies on other canopy modules.

mod edit;
mod position;

pub use edit::Edit;
pub use position::{LineIndex, Point};

// Re-export text-size types for convenience
pub use text_size;
pub use text_size::{TextRange, TextSize};

