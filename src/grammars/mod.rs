//! Grammar construction and bundled grammars
//!
//! - [`builder`]: SLR(1) table builder producing compiled blobs
//! - [`wren`]: the bundled Wren grammar and its external scanner

pub mod builder;
pub mod wren;
