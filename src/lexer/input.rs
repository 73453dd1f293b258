//! Byte sources for the lexer.
//!
//! The lexer never needs the whole text at once: it asks for the bytes
//! starting at an offset and decodes characters on the fly. Contiguous
//! sources hand out slices directly; [`ChunkedInput`] pulls chunks from a
//! callback (for ropes, piece tables or streamed files).

/// A random-access source of bytes
pub trait TextInput {
    /// The bytes starting at `offset`. An empty slice means end of input.
    fn chunk_at(&mut self, offset: usize) -> &[u8];
}

impl TextInput for &str {
    fn chunk_at(&mut self, offset: usize) -> &[u8] {
        self.as_bytes().get(offset..).unwrap_or_default()
    }
}

impl TextInput for &[u8] {
    fn chunk_at(&mut self, offset: usize) -> &[u8] {
        self.get(offset..).unwrap_or_default()
    }
}

impl TextInput for String {
    fn chunk_at(&mut self, offset: usize) -> &[u8] {
        self.as_bytes().get(offset..).unwrap_or_default()
    }
}

impl TextInput for Vec<u8> {
    fn chunk_at(&mut self, offset: usize) -> &[u8] {
        self.get(offset..).unwrap_or_default()
    }
}

/// Input read through a callback that returns the chunk starting at a
/// given offset (empty at end of input).
///
/// The most recent chunk is cached, so sequential reads call back once per
/// chunk rather than once per character.
pub struct ChunkedInput<F> {
    read: F,
    chunk_start: usize,
    chunk: Vec<u8>,
}

impl<F> ChunkedInput<F>
where
    F: FnMut(usize) -> Vec<u8>,
{
    pub fn new(read: F) -> Self {
        Self {
            read,
            chunk_start: 0,
            chunk: Vec::new(),
        }
    }
}

impl<F> TextInput for ChunkedInput<F>
where
    F: FnMut(usize) -> Vec<u8>,
{
    fn chunk_at(&mut self, offset: usize) -> &[u8] {
        let cached = offset >= self.chunk_start && offset < self.chunk_start + self.chunk.len();
        if !cached {
            self.chunk = (self.read)(offset);
            self.chunk_start = offset;
        }
        &self.chunk[offset - self.chunk_start..]
    }
}

/// Width of a UTF-8 sequence from its lead byte, or 0 if invalid
fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

/// Decode the character at `offset`, returning it with its byte length.
///
/// Sequences may straddle chunk boundaries. Invalid bytes decode as
/// U+FFFD, one byte at a time. Returns `None` at end of input.
pub(crate) fn char_at(input: &mut dyn TextInput, offset: usize) -> Option<(char, usize)> {
    let mut buf = [0u8; 4];
    let (width, mut filled) = {
        let chunk = input.chunk_at(offset);
        let lead = *chunk.first()?;
        if lead < 0x80 {
            return Some((lead as char, 1));
        }
        let width = utf8_width(lead);
        if width == 0 {
            return Some((char::REPLACEMENT_CHARACTER, 1));
        }
        let take = width.min(chunk.len());
        buf[..take].copy_from_slice(&chunk[..take]);
        (width, take)
    };
    while filled < width {
        let chunk = input.chunk_at(offset + filled);
        if chunk.is_empty() {
            return Some((char::REPLACEMENT_CHARACTER, 1));
        }
        let take = (width - filled).min(chunk.len());
        buf[filled..filled + take].copy_from_slice(&chunk[..take]);
        filled += take;
    }
    match std::str::from_utf8(&buf[..width]) {
        Ok(s) => s.chars().next().map(|c| (c, width)),
        Err(_) => Some((char::REPLACEMENT_CHARACTER, 1)),
    }
}
