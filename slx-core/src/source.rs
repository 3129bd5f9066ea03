//! Source text wrapper and position tracking.

use std::fmt;

/// Position inside a source stream. Lines and columns are 1-based;
/// zero means "no position".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(line: u32, column: u32) -> Self {
        SourcePosition { line, column }
    }

    pub fn is_valid(&self) -> bool {
        self.line > 0 && self.column > 0
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A contiguous region of source text, anchored at its start position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceArea {
    pub pos: SourcePosition,
    pub length: u32,
}

impl SourceArea {
    pub const ZERO: SourceArea = SourceArea {
        pos: SourcePosition { line: 0, column: 0 },
        length: 0,
    };

    pub fn new(pos: SourcePosition, length: u32) -> Self {
        SourceArea { pos, length }
    }

    pub fn is_valid(&self) -> bool {
        self.pos.is_valid() && self.length > 0
    }

    /// Smallest area covering both `self` and `other`.
    pub fn merged(&self, other: SourceArea) -> SourceArea {
        if !self.is_valid() {
            return other;
        }
        if !other.is_valid() {
            return *self;
        }
        let (first, last) = if (self.pos.line, self.pos.column) <= (other.pos.line, other.pos.column) {
            (*self, other)
        } else {
            (other, *self)
        };
        if first.pos.line == last.pos.line {
            SourceArea::new(first.pos, last.pos.column + last.length - first.pos.column)
        } else {
            first
        }
    }
}

impl fmt::Display for SourceArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pos)
    }
}

/// Source text of one translation unit chunk, with the filename it came
/// from. Reading is character based with single lookahead; the scanner
/// layers token recognition on top.
#[derive(Debug, Clone)]
pub struct SourceCode {
    filename: String,
    text: String,
}

impl SourceCode {
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        SourceCode {
            filename: filename.into(),
            text: text.into(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Fetch a single line (1-based) for diagnostics, without its line break.
    pub fn line(&self, line: u32) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.text.lines().nth(line as usize - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        let pos = SourcePosition::new(3, 14);
        assert_eq!(pos.to_string(), "3:14");
        assert!(pos.is_valid());
        assert!(!SourcePosition::default().is_valid());
    }

    #[test]
    fn test_area_merge_same_line() {
        let a = SourceArea::new(SourcePosition::new(1, 5), 3);
        let b = SourceArea::new(SourcePosition::new(1, 10), 4);
        let merged = a.merged(b);
        assert_eq!(merged.pos, SourcePosition::new(1, 5));
        assert_eq!(merged.length, 9);
    }

    #[test]
    fn test_line_lookup() {
        let src = SourceCode::new("test.hlsl", "float x;\nfloat y;\n");
        assert_eq!(src.line(2), Some("float y;"));
        assert_eq!(src.line(3), None);
        assert_eq!(src.line(0), None);
    }
}
