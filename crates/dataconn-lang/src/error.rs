//! Error types for filter expressions.

use crate::span::Span;
use thiserror::Error;

/// Why an expression was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Neither `field op ?` nor `? op field`.
    Syntax,
    UnknownOperator,
}

/// A rejected filter expression, located by span.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub span: Span,
    pub hint: Option<String>,
}

impl ParseError {
    fn new(kind: ParseErrorKind, message: String, span: Span) -> Self {
        Self {
            kind,
            message,
            span,
            hint: None,
        }
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(ParseErrorKind::Syntax, message.into(), span)
    }

    pub fn unknown_operator(operator: &str, span: Span) -> Self {
        Self::new(
            ParseErrorKind::UnknownOperator,
            format!("unknown operator '{}'", operator),
            span,
        )
    }

    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        Self {
            hint: Some(hint.into()),
            ..self
        }
    }

    /// Render the message over the expression, marking the span.
    ///
    /// ```text
    /// error: unknown operator '~'
    ///    | name ~ ?
    ///    |      ^
    /// ```
    pub fn format_with_source(&self, source: &str) -> String {
        let offset = self.span.start.min(source.len());
        let marker = format!("^{}", "~".repeat(self.span.len().saturating_sub(1)));
        let mut out = format!(
            "error: {}\n   | {}\n   | {}{}\n",
            self.message,
            source,
            " ".repeat(offset),
            marker
        );
        if let Some(hint) = &self.hint {
            out.push_str("   = hint: ");
            out.push_str(hint);
            out.push('\n');
        }
        out
    }
}

/// Error while turning an expression and its parameters into a filter.
#[derive(Debug, Error)]
pub enum LangError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("filter error: {0}")]
    Filter(#[from] dataconn_proto::Error),
}
