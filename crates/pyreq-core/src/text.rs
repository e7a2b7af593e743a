//! Text and position utilities.
//!
//! LSP positions count columns in UTF-16 code units while Rust strings are
//! indexed by bytes. Everything that crosses that boundary goes through the
//! helpers in this module.

use tower_lsp_server::ls_types::{Position, Range};

/// Precomputed line start offsets for O(log n) byte offset to position lookups.
///
/// # Examples
///
/// ```
/// use pyreq_core::text::LineOffsetTable;
/// use tower_lsp_server::ls_types::Position;
///
/// let content = "[project]\ndependencies = [\"é\", \"b\"]";
/// let table = LineOffsetTable::new(content);
/// let offset = content.find("\"b\"").unwrap();
/// // "é" is two bytes but a single UTF-16 unit
/// assert_eq!(table.position_at(content, offset), Position::new(1, 21));
/// ```
#[derive(Debug, Clone)]
pub struct LineOffsetTable {
    line_starts: Vec<usize>,
}

impl LineOffsetTable {
    pub fn new(content: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in content.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Converts a byte offset into an LSP position.
    pub fn position_at(&self, content: &str, offset: usize) -> Position {
        let offset = floor_char_boundary(content, offset);
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line];

        Position::new(line as u32, utf16_len(&content[line_start..offset]))
    }

    /// Converts a byte span into an LSP range.
    pub fn range_of(&self, content: &str, start: usize, end: usize) -> Range {
        Range::new(
            self.position_at(content, start),
            self.position_at(content, end),
        )
    }

    /// Byte offset where `line` starts, if the line exists.
    pub fn line_start(&self, line: u32) -> Option<usize> {
        self.line_starts.get(line as usize).copied()
    }
}

fn floor_char_boundary(s: &str, mut offset: usize) -> usize {
    offset = offset.min(s.len());
    while !s.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Length of `s` in UTF-16 code units.
pub fn utf16_len(s: &str) -> u32 {
    s.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Converts a UTF-16 column into a byte offset within `s`.
///
/// Returns `None` when the column lies past the end of the string. A column
/// that falls inside a surrogate pair rounds up to the next character.
///
/// # Examples
///
/// ```
/// use pyreq_core::text::utf16_to_byte_offset;
///
/// assert_eq!(utf16_to_byte_offset("abc", 2), Some(2));
/// assert_eq!(utf16_to_byte_offset("é=1", 1), Some(2));
/// assert_eq!(utf16_to_byte_offset("abc", 3), Some(3));
/// assert_eq!(utf16_to_byte_offset("abc", 4), None);
/// ```
pub fn utf16_to_byte_offset(s: &str, utf16_offset: u32) -> Option<usize> {
    let mut utf16_count = 0u32;
    for (byte_idx, ch) in s.char_indices() {
        if utf16_count >= utf16_offset {
            return Some(byte_idx);
        }
        utf16_count += ch.len_utf16() as u32;
    }
    if utf16_count >= utf16_offset {
        return Some(s.len());
    }
    None
}

/// Like [`utf16_to_byte_offset`], clamping out-of-range columns to the end.
pub fn clamp_utf16_to_byte_offset(s: &str, utf16_offset: u32) -> usize {
    utf16_to_byte_offset(s, utf16_offset).unwrap_or(s.len())
}

/// Returns the text of line `line` without its terminator.
///
/// Both `\n` and `\r\n` endings are accepted.
pub fn line_at(content: &str, line: u32) -> Option<&str> {
    content
        .split('\n')
        .nth(line as usize)
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
}

/// Returns `true` if `position` lies within `range`, end inclusive.
pub fn range_contains(range: &Range, position: Position) -> bool {
    let at = (position.line, position.character);
    at >= (range.start.line, range.start.character) && at <= (range.end.line, range.end.character)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_at_multiline() {
        let content = "a\nbb\nccc";
        let table = LineOffsetTable::new(content);
        assert_eq!(table.position_at(content, 0), Position::new(0, 0));
        assert_eq!(table.position_at(content, 2), Position::new(1, 0));
        assert_eq!(table.position_at(content, 4), Position::new(1, 2));
        assert_eq!(table.position_at(content, 8), Position::new(2, 3));
    }

    #[test]
    fn test_position_at_clamps_past_end() {
        let content = "abc";
        let table = LineOffsetTable::new(content);
        assert_eq!(table.position_at(content, 99), Position::new(0, 3));
    }

    #[test]
    fn test_range_of_utf16() {
        let content = "x = \"😀a\"";
        let table = LineOffsetTable::new(content);
        let start = content.find('a').unwrap();
        let range = table.range_of(content, start, start + 1);
        // the emoji takes two UTF-16 units
        assert_eq!(range.start, Position::new(0, 7));
        assert_eq!(range.end, Position::new(0, 8));
    }

    #[test]
    fn test_line_start() {
        let table = LineOffsetTable::new("ab\ncd\n");
        assert_eq!(table.line_start(1), Some(3));
        assert_eq!(table.line_start(2), Some(6));
        assert_eq!(table.line_start(3), None);
    }

    #[test]
    fn test_utf16_helpers() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("😀"), 2);
        assert_eq!(utf16_to_byte_offset("😀b", 2), Some(4));
        assert_eq!(clamp_utf16_to_byte_offset("ab", 10), 2);
    }

    #[test]
    fn test_line_at_crlf() {
        let content = "first\r\nsecond\r\n";
        assert_eq!(line_at(content, 0), Some("first"));
        assert_eq!(line_at(content, 1), Some("second"));
        assert_eq!(line_at(content, 2), Some(""));
        assert_eq!(line_at(content, 3), None);
    }

    #[test]
    fn test_range_contains_inclusive_end() {
        let range = Range::new(Position::new(1, 2), Position::new(1, 8));
        assert!(range_contains(&range, Position::new(1, 2)));
        assert!(range_contains(&range, Position::new(1, 8)));
        assert!(!range_contains(&range, Position::new(1, 9)));
        assert!(!range_contains(&range, Position::new(0, 5)));
    }
}
