//! External scanners: grammar-supplied lexing for tokens the NFA cannot
//! express (nesting, indentation, heredocs).
//!
//! A scanner is created per parse session and driven through a
//! [`ScanCursor`]. Between calls its state is captured with
//! [`ExternalScanner::serialize`] and stored on the tokens it produced, so a
//! reparse can resume scanning at any offset by restoring that state.

use super::input::{TextInput, char_at};

/// Grammar-specific token scanner
pub trait ExternalScanner: Send {
    /// Try to recognize one token at the cursor.
    ///
    /// `valid` is indexed like the grammar's external token list. Returns the
    /// index of the recognized token; the token ends at the last
    /// [`ScanCursor::mark_end`] (or the cursor position if never marked).
    fn scan(&mut self, cursor: &mut ScanCursor<'_>, valid: &[bool]) -> Option<usize>;

    /// Append the scanner's state to `buffer`
    fn serialize(&self, buffer: &mut Vec<u8>);

    /// Restore a state produced by [`serialize`](Self::serialize); an empty
    /// slice means the initial state
    fn deserialize(&mut self, state: &[u8]);
}

/// Character cursor handed to [`ExternalScanner::scan`]
pub struct ScanCursor<'a> {
    input: &'a mut dyn TextInput,
    start: usize,
    position: usize,
    lookahead: Option<(char, usize)>,
    marked_end: Option<usize>,
    furthest: usize,
}

impl<'a> ScanCursor<'a> {
    pub(crate) fn new(input: &'a mut dyn TextInput, start: usize) -> Self {
        let lookahead = char_at(input, start);
        let furthest = start + lookahead.map_or(0, |(_, len)| len);
        Self {
            input,
            start,
            position: start,
            lookahead,
            marked_end: None,
            furthest,
        }
    }

    /// The current character, `None` at end of input
    pub fn lookahead(&self) -> Option<char> {
        self.lookahead.map(|(c, _)| c)
    }

    /// Consume the current character
    pub fn advance(&mut self) {
        if let Some((_, len)) = self.lookahead {
            self.position += len;
            self.lookahead = char_at(self.input, self.position);
            if let Some((_, len)) = self.lookahead {
                self.furthest = self.furthest.max(self.position + len);
            }
        }
    }

    /// End the token at the current position
    pub fn mark_end(&mut self) {
        self.marked_end = Some(self.position);
    }

    pub fn eof(&self) -> bool {
        self.lookahead.is_none()
    }

    /// Byte offset of the current character
    pub fn position(&self) -> usize {
        self.position
    }

    /// Byte offset the token started at
    pub fn token_start(&self) -> usize {
        self.start
    }

    pub(crate) fn token_end(&self) -> usize {
        self.marked_end.unwrap_or(self.position)
    }

    /// One past the furthest byte inspected
    pub(crate) fn furthest(&self) -> usize {
        self.furthest
    }
}
