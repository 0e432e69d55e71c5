//! Position and line/column utilities.
//!
//! The lexer/parser/checker work in byte offsets (`Span`); diagnostics and
//! any future LSP-style surface need line/column positions. This module
//! converts between the two via a `LineMap` built once per source file.

use crate::span::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    /// 0-indexed line number.
    pub line: u32,
    /// 0-indexed column, in UTF-8 byte offset within the line.
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Maps byte offsets to line/column positions.
///
/// Line terminators recognized: LF, CR, CRLF. The source is expected to
/// already be normalized to LF internally; `LineMap` is built from the
/// pre-normalization source so original CR/CRLF offsets still resolve
/// correctly when diagnostics point at the raw input.
#[derive(Debug, Clone)]
pub struct LineMap {
    /// Byte offset of the start of each line.
    line_starts: Vec<u32>,
}

impl LineMap {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        let bytes = source.as_bytes();
        let mut i = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    line_starts.push((i + 1) as u32);
                    i += 1;
                }
                b'\r' => {
                    let next = if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                        i + 2
                    } else {
                        i + 1
                    };
                    line_starts.push(next as u32);
                    i = next;
                }
                _ => i += 1,
            }
        }
        LineMap { line_starts }
    }

    pub fn position(&self, offset: u32) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_at) => insert_at.saturating_sub(1),
        };
        let line_start = self.line_starts[line];
        Position::new(line as u32, offset - line_start)
    }

    pub fn range(&self, span: Span) -> Range {
        Range::new(self.position(span.start), self.position(span.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_lf_lines() {
        let map = LineMap::new("ab\ncd\nef");
        assert_eq!(map.position(0), Position::new(0, 0));
        assert_eq!(map.position(3), Position::new(1, 0));
        assert_eq!(map.position(7), Position::new(2, 1));
    }

    #[test]
    fn tracks_crlf_lines() {
        let map = LineMap::new("ab\r\ncd");
        assert_eq!(map.position(4), Position::new(1, 0));
    }
}
