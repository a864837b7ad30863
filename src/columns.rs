//! Declarative fixed-width column layouts.
//!
//! HELP reports and CWEEDS files are positional: a field is identified by the
//! character positions it occupies rather than by a delimiter. Each format
//! describes its fields as a table of [`Column`]s and reads them through
//! [`Column::parse`], so that differences between format variants are data
//! rather than duplicated parsing code.

use std::str::FromStr;

/// Character positions occupied by a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    /// Characters `start..end`, clamped to the length of the line.
    Range(usize, usize),
    /// The last `n` characters of the line.
    Tail(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub span: Span,
}

impl Column {
    pub const fn new(name: &'static str, start: usize, end: usize) -> Self {
        Self {
            name,
            span: Span::Range(start, end),
        }
    }

    pub const fn tail(name: &'static str, width: usize) -> Self {
        Self {
            name,
            span: Span::Tail(width),
        }
    }

    /// Text of this column in `line` once the first `offset` characters of the
    /// line have been discarded. Positions past the end of the line yield a
    /// shorter (possibly empty) slice.
    pub fn slice<'a>(&self, line: &'a str, offset: usize) -> &'a str {
        let line = &line[byte_index(line, offset)..];

        match self.span {
            Span::Range(start, end) => {
                let start = byte_index(line, start);
                let end = byte_index(line, end).max(start);
                &line[start..end]
            }
            Span::Tail(n) => {
                let len = line.chars().count();
                &line[byte_index(line, len.saturating_sub(n))..]
            }
        }
    }

    /// Parses the column as a number, `None` when the field is blank or not a
    /// number of type `T`.
    pub fn parse<T: FromStr>(&self, line: &str, offset: usize) -> Option<T> {
        let text = self.slice(line, offset).trim();
        if text.is_empty() {
            None
        } else {
            text.parse().ok()
        }
    }
}

/// Byte index of the `n`th character of `s`, or `s.len()` if there are fewer.
fn byte_index(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}
