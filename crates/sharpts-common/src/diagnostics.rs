//! Diagnostics emitted by the lexer, parser, and checker.
//!
//! A diagnostic's shape: severity, message, source location (line, column,
//! span), and optional expected/actual type text. Diagnostics are data,
//! never thrown as Rust errors.

use crate::limits::DEFAULT_DIAGNOSTIC_CAP;
use crate::position::{LineMap, Range};
use crate::span::Span;

#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DiagnosticCategory {
    Error,
    Warning,
    Suggestion,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub span: Span,
    pub message: String,
    pub expected_type: Option<String>,
    pub actual_type: Option<String>,
}

impl Diagnostic {
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            category: DiagnosticCategory::Error,
            span,
            message: message.into(),
            expected_type: None,
            actual_type: None,
        }
    }

    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            category: DiagnosticCategory::Warning,
            span,
            message: message.into(),
            expected_type: None,
            actual_type: None,
        }
    }

    pub fn with_types(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected_type = Some(expected.into());
        self.actual_type = Some(actual.into());
        self
    }

    /// Render in the `tsc`-style `file:line:col - error: message` form used
    /// by `sharpts-cli`.
    pub fn render(&self, file: &str, line_map: &LineMap) -> String {
        let Range { start, .. } = line_map.range(self.span);
        let kind = match self.category {
            DiagnosticCategory::Error => "error",
            DiagnosticCategory::Warning => "warning",
            DiagnosticCategory::Suggestion => "suggestion",
        };
        format!(
            "{file}:{}:{} - {kind}: {}",
            start.line + 1,
            start.column + 1,
            self.message
        )
    }
}

/// Collects diagnostics during a single lex/parse/check run, enforcing a
/// cap-then-suppress behavior once too many errors accumulate.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    cap: usize,
    suppressed: usize,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        DiagnosticSink {
            diagnostics: Vec::new(),
            cap: DEFAULT_DIAGNOSTIC_CAP,
            suppressed: 0,
        }
    }

    pub fn with_cap(cap: usize) -> Self {
        DiagnosticSink {
            diagnostics: Vec::new(),
            cap,
            suppressed: 0,
        }
    }

    /// Returns `true` if the diagnostic was recorded, `false` if the cap
    /// had already been reached and it was suppressed.
    pub fn push(&mut self, diagnostic: Diagnostic) -> bool {
        if self.diagnostics.len() >= self.cap {
            self.suppressed += 1;
            return false;
        }
        self.diagnostics.push(diagnostic);
        true
    }

    /// Once the cap is reached, remaining checks should short-circuit
    /// rather than keep computing diagnostics that will be suppressed.
    pub fn at_cap(&self) -> bool {
        self.diagnostics.len() >= self.cap
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.category == DiagnosticCategory::Error)
    }

    pub fn suppressed_count(&self) -> usize {
        self.suppressed
    }

    pub fn into_sorted(mut self) -> Vec<Diagnostic> {
        self.diagnostics.sort_by_key(|d| d.span.start);
        self.diagnostics
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_at_configured_limit() {
        let mut sink = DiagnosticSink::with_cap(2);
        assert!(sink.push(Diagnostic::error(Span::at(0), "a")));
        assert!(sink.push(Diagnostic::error(Span::at(1), "b")));
        assert!(!sink.push(Diagnostic::error(Span::at(2), "c")));
        assert!(sink.at_cap());
        assert_eq!(sink.suppressed_count(), 1);
        assert_eq!(sink.into_sorted().len(), 2);
    }

    #[test]
    fn sorts_by_source_position() {
        let mut sink = DiagnosticSink::new();
        sink.push(Diagnostic::error(Span::at(5), "later"));
        sink.push(Diagnostic::error(Span::at(1), "earlier"));
        let sorted = sink.into_sorted();
        assert_eq!(sorted[0].message, "earlier");
        assert_eq!(sorted[1].message, "later");
    }
}
