//! Row/column positions.
//!
//! Nodes only carry byte offsets. Rows and columns are recovered on demand
//! through a [`LineIndex`] built from the source text.

use text_size::TextSize;

/// A position in source code (0-indexed row, byte column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

/// Line start table for offset <-> point conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<TextSize>,
    len: TextSize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::new(0)];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(TextSize::new(offset as u32 + 1));
            }
        }
        Self {
            line_starts,
            len: TextSize::of(text),
        }
    }

    /// Number of lines (a trailing newline opens an empty last line)
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Convert a byte offset to a point. Offsets past the end clamp to the end.
    pub fn point(&self, offset: TextSize) -> Point {
        let offset = offset.min(self.len);
        let row = match self.line_starts.binary_search(&offset) {
            Ok(row) => row,
            Err(next) => next - 1,
        };
        let column = offset - self.line_starts[row];
        Point::new(row as u32, column.into())
    }

    /// Convert a point back to a byte offset, if it lies within the text
    pub fn offset(&self, point: Point) -> Option<TextSize> {
        let start = *self.line_starts.get(point.row as usize)?;
        let end = self
            .line_starts
            .get(point.row as usize + 1)
            .copied()
            .unwrap_or(self.len);
        let offset = start + TextSize::new(point.column);
        (offset <= end).then_some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_round_trips_through_offsets() {
        let index = LineIndex::new("var a\nvar b\n");
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.point(TextSize::new(0)), Point::new(0, 0));
        assert_eq!(index.point(TextSize::new(8)), Point::new(1, 2));
        assert_eq!(index.point(TextSize::new(12)), Point::new(2, 0));
        assert_eq!(index.offset(Point::new(1, 2)), Some(TextSize::new(8)));
        assert_eq!(index.offset(Point::new(4, 0)), None);
    }

    #[test]
    fn test_point_clamps_past_end() {
        let index = LineIndex::new("ab");
        assert_eq!(index.point(TextSize::new(10)), Point::new(0, 2));
    }
}
