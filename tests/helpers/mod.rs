//! Shared fixtures and assertions for integration tests.

pub mod source_fixtures;
pub mod tree_assertions;
