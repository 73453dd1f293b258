//! External scanner for Wren's nested block comments

use crate::lexer::{ExternalScanner, ScanCursor};

/// Index of `block_comment` in the grammar's external token list
const BLOCK_COMMENT: usize = 0;

/// Recognizes `/* ... /* ... */ ... */`.
///
/// Nesting is resolved within a single token, so the scanner carries no
/// state between tokens. An unterminated comment extends to end of input.
#[derive(Debug, Default, Clone, Copy)]
pub struct WrenScanner;

impl ExternalScanner for WrenScanner {
    fn scan(&mut self, cursor: &mut ScanCursor<'_>, valid: &[bool]) -> Option<usize> {
        if !valid.get(BLOCK_COMMENT).copied().unwrap_or(false) {
            return None;
        }
        if cursor.lookahead() != Some('/') {
            return None;
        }
        cursor.advance();
        if cursor.lookahead() != Some('*') {
            return None;
        }
        cursor.advance();

        let mut depth = 1usize;
        while depth > 0 {
            match cursor.lookahead() {
                None => break,
                Some('/') => {
                    cursor.advance();
                    if cursor.lookahead() == Some('*') {
                        cursor.advance();
                        depth += 1;
                    }
                }
                Some('*') => {
                    cursor.advance();
                    if cursor.lookahead() == Some('/') {
                        cursor.advance();
                        depth -= 1;
                    }
                }
                Some(_) => cursor.advance(),
            }
        }
        cursor.mark_end();
        Some(BLOCK_COMMENT)
    }

    fn serialize(&self, _buffer: &mut Vec<u8>) {}

    fn deserialize(&mut self, _state: &[u8]) {}
}
