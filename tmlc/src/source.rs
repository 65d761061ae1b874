//! Source buffers and byte spans.
//!
//! A [`Source`] owns the UTF-8 text of one compilation unit and the byte
//! offset of every line start, so any later stage can turn a byte offset
//! into a `(line, column)` pair without rescanning the text. Every node
//! produced by the lexer, parser, and type checker carries a [`SourceSpan`]
//! rather than cloning the text it covers.

use std::fmt;
use std::rc::Rc;

/// An immutable UTF-8 source buffer, shared by reference among every stage
/// that derives something from it (tokens, AST nodes, diagnostics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    inner: Rc<SourceInner>,
}

#[derive(Debug, PartialEq, Eq)]
struct SourceInner {
    path: String,
    text: String,
    /// Byte offset of the first character of each line. `line_starts[0] == 0`.
    line_starts: Vec<usize>,
}

impl Source {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }

        Self {
            inner: Rc::new(SourceInner {
                path: path.into(),
                text,
                line_starts,
            }),
        }
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn text(&self) -> &str {
        &self.inner.text
    }

    pub fn len(&self) -> usize {
        self.inner.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.text.is_empty()
    }

    pub fn byte_at(&self, offset: usize) -> Option<u8> {
        self.inner.text.as_bytes().get(offset).copied()
    }

    /// Zero-indexed `(line, column)` of a byte offset, both counted in bytes
    /// within their line. `offset` may equal `self.len()` for an end span.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.inner.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(insert_at) => insert_at - 1,
        };
        let col = offset - self.inner.line_starts[line];
        (line, col)
    }

    /// The raw text a span covers. Panics if the span does not lie on a
    /// UTF-8 boundary or exceeds the buffer — both are parser invariants.
    pub fn slice(&self, span: SourceSpan) -> &str {
        &self.inner.text[span.start..span.end]
    }

    pub fn span(&self, start: usize, end: usize) -> SourceSpan {
        SourceSpan::new(start, end)
    }
}

/// A half-open `[start, end)` byte range inside one [`Source`].
///
/// Spans do not carry a reference back to their `Source` — callers combine
/// spans by [`SourceSpan::join`] and only resolve line/column lazily, via
/// `Source::line_col`, when a diagnostic actually needs to be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start must not exceed its end");
        Self { start, end }
    }

    /// A zero-width span, used for synthesized nodes that have no concrete
    /// source location (e.g. a default-method specialization).
    pub fn synthetic() -> Self {
        Self { start: 0, end: 0 }
    }

    /// The smallest span enclosing both `a` and `b`.
    pub fn join(a: SourceSpan, b: SourceSpan) -> SourceSpan {
        SourceSpan {
            start: a.start.min(b.start),
            end: a.end.max(b.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Spans are tracked for diagnostics, not semantics: two nodes built the same
/// way from different source text should still compare equal by their
/// content alone in loose AST comparisons. Most call sites go through the
/// `LooseEq` derive for that; this default keeps manual `PartialEq` impls
/// from having to special-case the position field themselves.
impl Default for SourceSpan {
    fn default() -> Self {
        Self::synthetic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_tracks_newlines() {
        let src = Source::new("test.tml", "abc\ndef\nghi");
        assert_eq!(src.line_col(0), (0, 0));
        assert_eq!(src.line_col(4), (1, 0));
        assert_eq!(src.line_col(9), (2, 1));
    }

    #[test]
    fn slice_round_trips() {
        let src = Source::new("test.tml", "func main() -> I32 { 0 }");
        let span = src.span(0, 4);
        assert_eq!(src.slice(span), "func");
    }

    #[test]
    fn join_produces_enclosing_span() {
        let a = SourceSpan::new(4, 8);
        let b = SourceSpan::new(2, 6);
        assert_eq!(SourceSpan::join(a, b), SourceSpan::new(2, 8));
    }
}
