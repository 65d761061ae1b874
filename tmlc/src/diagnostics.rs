//! Structured diagnostics shared by every phase. The core never formats
//! these for a terminal — it hands back spans and messages; a presentation
//! layer outside the core renders them (the `bin/tmlc.rs` CLI uses
//! `colored` for a minimal one).

use std::fmt;

use crate::source::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DiagnosticKind {
    Lex,
    Parse,
    Type,
    Borrow,
    Codegen,
    Invariant,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::Lex => "lex",
            DiagnosticKind::Parse => "parse",
            DiagnosticKind::Type => "type",
            DiagnosticKind::Borrow => "borrow",
            DiagnosticKind::Codegen => "codegen",
            DiagnosticKind::Invariant => "invariant",
        };
        write!(f, "{s}")
    }
}

/// A mechanical correction suggested alongside a diagnostic. Informative
/// only — the driver never applies one automatically.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FixIt {
    Insert { at: SourceSpan, text: String },
    Replace { span: SourceSpan, text: String },
    Delete { span: SourceSpan },
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: SourceSpan,
    pub notes: Vec<String>,
    pub fixes: Vec<FixIt>,
    /// A short machine-stable code, e.g. `"E0308"`-style or an invariant
    /// name like `"INVARIANT_A"` for codegen failures.
    pub code: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, code: impl Into<String>, message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            notes: Vec::new(),
            fixes: Vec::new(),
            code: code.into(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_fix(mut self, fix: FixIt) -> Self {
        self.fixes.push(fix);
        self
    }

    pub fn lex(message: impl Into<String>, span: SourceSpan) -> Self {
        Self::new(DiagnosticKind::Lex, "LEX", message, span)
    }

    pub fn parse(code: impl Into<String>, message: impl Into<String>, span: SourceSpan) -> Self {
        Self::new(DiagnosticKind::Parse, code, message, span)
    }

    pub fn ty(code: impl Into<String>, message: impl Into<String>, span: SourceSpan) -> Self {
        Self::new(DiagnosticKind::Type, code, message, span)
    }

    pub fn borrow(code: impl Into<String>, message: impl Into<String>, span: SourceSpan) -> Self {
        Self::new(DiagnosticKind::Borrow, code, message, span)
    }

    pub fn codegen_invariant(name: impl Into<String>, message: impl Into<String>, span: SourceSpan) -> Self {
        Self::new(DiagnosticKind::Invariant, name, message, span)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) at {}",
            self.kind, self.message, self.code, self.span
        )
    }
}

impl std::error::Error for Diagnostic {}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticBag {
    pub diagnostics: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, other: DiagnosticBag) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_code() {
        let d = Diagnostic::parse("E_EXPECT", "expected ')'", SourceSpan::new(0, 1));
        let text = d.to_string();
        assert!(text.contains("parse"));
        assert!(text.contains("E_EXPECT"));
    }
}
