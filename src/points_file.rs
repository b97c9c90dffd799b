// points_file.rs — Plain-text vertex source.
//
// Format (whitespace separated, line breaks free):
//
//   <numVertices> <rows> <cols>
//   <x0> <y0>
//   <x1> <y1>
//   ...
//
// x is the column and y the row. Exactly numVertices pairs must follow the
// header. The parsed set goes through the same validation as the engine,
// so a file that loads is one the engine accepts.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::{Result, TriangulationError};
use crate::geometry::Point;
use crate::ownership::validate;

/// A vertex set and the raster it lives on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexInput {
    pub vertices: Vec<Point>,
    pub rows: usize,
    pub cols: usize,
}

impl VertexInput {
    /// Validate and wrap.
    pub fn new(vertices: Vec<Point>, rows: usize, cols: usize) -> Result<Self> {
        validate(&vertices, rows, cols)?;
        Ok(VertexInput { vertices, rows, cols })
    }

    /// Parse the text format.
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = Tokens::new(text);
        let count: usize = tokens.next_number("vertex count")?;
        let rows: usize = tokens.next_number("rows")?;
        let cols: usize = tokens.next_number("cols")?;

        let mut vertices = Vec::with_capacity(count.min(1 << 20));
        for i in 0..count {
            let x: i32 = tokens.next_number(&format!("x of vertex {i}"))?;
            let y: i32 = tokens.next_number(&format!("y of vertex {i}"))?;
            vertices.push(Point::new(x, y));
        }
        if let Some((line, tok)) = tokens.next() {
            return Err(TriangulationError::Parse {
                line,
                message: format!("unexpected token `{tok}` after {count} vertices"),
            });
        }
        Self::new(vertices, rows, cols)
    }

    /// Read and parse a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Render in the text format, one vertex per line.
    pub fn to_text(&self) -> String {
        let mut out = format!("{} {} {}\n", self.vertices.len(), self.rows, self.cols);
        for p in &self.vertices {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{} {}", p.x, p.y);
        }
        out
    }

    /// Write the text format to `path`.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }
}

/// Whitespace tokenizer that remembers 1-based line numbers.
struct Tokens<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    current: Option<(usize, std::str::SplitWhitespace<'a>)>,
    last_line: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Tokens { lines: text.lines().enumerate(), current: None, last_line: 1 }
    }

    fn next_number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let (line, tok) = self.next().ok_or_else(|| TriangulationError::Parse {
            line: self.last_line,
            message: format!("unexpected end of input, expected {what}"),
        })?;
        tok.parse().map_err(|_| TriangulationError::Parse {
            line,
            message: format!("expected {what}, found `{tok}`"),
        })
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((line, words)) = &mut self.current {
                if let Some(tok) = words.next() {
                    return Some((*line, tok));
                }
            }
            let (i, text) = self.lines.next()?;
            self.last_line = i + 1;
            self.current = Some((i + 1, text.split_whitespace()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_basic() {
        let input = VertexInput::parse("3 10 20\n0 0\n19 0\n5 9\n").unwrap();
        assert_eq!(input.rows, 10);
        assert_eq!(input.cols, 20);
        assert_eq!(input.vertices, vec![Point::new(0, 0), Point::new(19, 0), Point::new(5, 9)]);
    }

    #[test]
    fn test_parse_free_layout() {
        let input = VertexInput::parse("2 4 4 1 1\n\n  2 3").unwrap();
        assert_eq!(input.vertices, vec![Point::new(1, 1), Point::new(2, 3)]);
    }

    #[test]
    fn test_truncated_file_reports_line() {
        let err = VertexInput::parse("3 10 10\n1 1\n2 2\n").unwrap_err();
        match err {
            TriangulationError::Parse { line, ref message } => {
                assert_eq!(line, 3);
                assert!(message.contains("end of input"), "{message}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bad_token() {
        let err = VertexInput::parse("1 10 10\n1 x\n").unwrap_err();
        assert!(matches!(err, TriangulationError::Parse { line: 2, .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        let err = VertexInput::parse("1 10 10\n1 1\n7 7\n").unwrap_err();
        assert!(matches!(err, TriangulationError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_out_of_bounds_vertex() {
        let err = VertexInput::parse("1 10 10\n10 0\n").unwrap_err();
        assert!(matches!(err, TriangulationError::VertexOutOfBounds { index: 0, .. }));
    }

    #[test]
    fn test_empty_set_is_invalid() {
        let err = VertexInput::parse("0 10 10\n").unwrap_err();
        assert!(matches!(err, TriangulationError::EmptyVertexSet));
    }

    #[test]
    fn test_text_reparses() {
        let input = VertexInput::new(vec![Point::new(3, 1), Point::new(0, 2)], 4, 5).unwrap();
        assert_eq!(VertexInput::parse(&input.to_text()).unwrap(), input);
    }
}
