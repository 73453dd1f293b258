//! Text edit descriptor.

use text_size::{TextRange, TextSize};

/// A single contiguous text replacement.
///
/// The bytes in `start_byte..old_end_byte` of the old text were replaced by
/// the bytes in `start_byte..new_end_byte` of the new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edit {
    pub start_byte: TextSize,
    pub old_end_byte: TextSize,
    pub new_end_byte: TextSize,
}

impl Edit {
    pub fn new(start_byte: TextSize, old_end_byte: TextSize, new_end_byte: TextSize) -> Self {
        debug_assert!(start_byte <= old_end_byte && start_byte <= new_end_byte);
        Self {
            start_byte,
            old_end_byte,
            new_end_byte,
        }
    }

    /// Replace `range` of the old text with `new_len` bytes
    pub fn replace(range: TextRange, new_len: TextSize) -> Self {
        Self::new(range.start(), range.end(), range.start() + new_len)
    }

    /// Insert `len` bytes at `offset`
    pub fn insert(offset: TextSize, len: TextSize) -> Self {
        Self::new(offset, offset, offset + len)
    }

    /// Delete `range` of the old text
    pub fn delete(range: TextRange) -> Self {
        Self::new(range.start(), range.end(), range.start())
    }

    /// Apply a replacement to `text`, returning the new text and its edit
    pub fn apply(text: &str, range: TextRange, replacement: &str) -> (String, Edit) {
        let mut new_text = String::with_capacity(text.len() + replacement.len());
        new_text.push_str(&text[..usize::from(range.start())]);
        new_text.push_str(replacement);
        new_text.push_str(&text[usize::from(range.end())..]);
        (new_text, Self::replace(range, TextSize::of(replacement)))
    }

    pub fn old_range(&self) -> TextRange {
        TextRange::new(self.start_byte, self.old_end_byte)
    }

    pub fn new_range(&self) -> TextRange {
        TextRange::new(self.start_byte, self.new_end_byte)
    }

    /// Signed byte delta between the new and old text lengths
    pub fn delta(&self) -> i64 {
        i64::from(u32::from(self.new_end_byte)) - i64::from(u32::from(self.old_end_byte))
    }

    /// Map an offset in the old text to the corresponding offset in the new text.
    ///
    /// Offsets inside the replaced region collapse onto the end of the insertion.
    pub fn translate(&self, offset: TextSize) -> TextSize {
        if offset <= self.start_byte {
            offset
        } else if offset < self.old_end_byte {
            self.new_end_byte
        } else {
            let shifted = i64::from(u32::from(offset)) + self.delta();
            TextSize::new(shifted.max(0) as u32)
        }
    }

    /// Clamp the edit to a text of `len` bytes
    pub(crate) fn clamped(&self, len: TextSize) -> Edit {
        let old_end_byte = self.old_end_byte.min(len);
        let start_byte = self.start_byte.min(old_end_byte);
        let new_end_byte = self.new_end_byte.max(start_byte);
        Edit {
            start_byte,
            old_end_byte,
            new_end_byte,
        }
    }
}
