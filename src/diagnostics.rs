//!
//! # Overview
//!
//! This module defines the unified, `miette`-based diagnostic type for the
//! expander. Every failure the library can report is a [`MacroError`]: fatal
//! errors raised by handlers, the recursion guard, quotation misuse, name
//! encoding, registry conflicts and rule/tree loading.
//!
//! Declining to handle a node is *not* an error and never appears here; see
//! [`crate::macros::Expansion::Unsupported`].
//!
//! # Error Construction Macros
//!
//! - `err_msg!(Template, "unbound pattern variable `{}`", var)` for a
//!   message with no position.
//! - `err_ctx!(Expansion, span = tree.span, "bad shape")` for a message
//!   attached to an optional span.
//!
//! Errors without a position get one filled in by the expander from the
//! reference tree in force when they surfaced.

use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode};
use thiserror::Error;

use crate::ast::Span;

pub type SourceArc = Arc<NamedSource<String>>;

/// Type-safe error classification that corresponds to `MacroError` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Fatal error raised by a macro handler
    Expansion,
    /// Expansion exceeded the configured depth
    RecursionLimit,
    /// Quotation matching or substitution misuse
    Template,
    /// Invalid hygienic name input
    Name,
    /// Duplicate or conflicting registrations
    Registry,
    /// Rule set or tree file could not be read or decoded
    Load,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Expansion => "Expansion",
            ErrorType::RecursionLimit => "RecursionLimit",
            ErrorType::Template => "Template",
            ErrorType::Name => "Name",
            ErrorType::Registry => "Registry",
            ErrorType::Load => "Load",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single additional label for multi-span diagnostics.
#[derive(Debug, Clone)]
pub struct RelatedLabel {
    pub span: Span,
    pub label: String,
}

/// Minimal, composable error context for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    /// Source text the spans point into, attached by the CLI when known.
    pub source: Option<SourceArc>,
    /// The primary position for this error.
    pub span: Option<Span>,
    /// An optional help message.
    pub help: Option<String>,
    /// Additional labeled spans.
    pub related: Vec<RelatedLabel>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_span(span: Option<Span>) -> Self {
        Self {
            span,
            ..Self::default()
        }
    }
}

/// Unified error type for all expander failure modes.
#[derive(Debug, Error)]
pub enum MacroError {
    #[error("Macro error: {message}")]
    Expansion {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Maximum macro recursion depth ({limit}) exceeded while expanding `{kind}`")]
    RecursionLimit {
        limit: usize,
        kind: String,
        ctx: ErrorContext,
    },
    #[error("Template error: {message}")]
    Template {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Name error: {message}")]
    Name {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Registry error: {message}")]
    Registry {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
    #[error("Load error: {message}")]
    Load {
        message: String,
        ctx: ErrorContext,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl MacroError {
    fn ctx(&self) -> &ErrorContext {
        match self {
            MacroError::Expansion { ctx, .. }
            | MacroError::RecursionLimit { ctx, .. }
            | MacroError::Template { ctx, .. }
            | MacroError::Name { ctx, .. }
            | MacroError::Registry { ctx, .. }
            | MacroError::Load { ctx, .. } => ctx,
        }
    }

    fn ctx_mut(&mut self) -> &mut ErrorContext {
        match self {
            MacroError::Expansion { ctx, .. }
            | MacroError::RecursionLimit { ctx, .. }
            | MacroError::Template { ctx, .. }
            | MacroError::Name { ctx, .. }
            | MacroError::Registry { ctx, .. }
            | MacroError::Load { ctx, .. } => ctx,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            MacroError::Expansion { .. } => ErrorType::Expansion,
            MacroError::RecursionLimit { .. } => ErrorType::RecursionLimit,
            MacroError::Template { .. } => ErrorType::Template,
            MacroError::Name { .. } => ErrorType::Name,
            MacroError::Registry { .. } => ErrorType::Registry,
            MacroError::Load { .. } => ErrorType::Load,
        }
    }

    /// The position this error is reported at, if any.
    pub fn span(&self) -> Option<Span> {
        self.ctx().span
    }

    /// The bare message, without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            MacroError::Expansion { message, .. }
            | MacroError::Template { message, .. }
            | MacroError::Name { message, .. }
            | MacroError::Registry { message, .. }
            | MacroError::Load { message, .. } => message.clone(),
            MacroError::RecursionLimit { .. } => self.to_string(),
        }
    }

    /// Fills in the position if the error does not carry one yet.
    pub fn or_span(mut self, span: Option<Span>) -> Self {
        let ctx = self.ctx_mut();
        if ctx.span.is_none() {
            ctx.span = span;
        }
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.ctx_mut().help = Some(help.into());
        self
    }

    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.ctx_mut().related.push(RelatedLabel {
            span,
            label: label.into(),
        });
        self
    }

    /// Attaches the source text spans refer to, for rendering.
    pub fn with_source(mut self, source: SourceArc) -> Self {
        self.ctx_mut().source = Some(source);
        self
    }

    pub fn is_recursion_limit(&self) -> bool {
        matches!(self, MacroError::RecursionLimit { .. })
    }
}

impl Diagnostic for MacroError {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match self.error_type() {
            ErrorType::Expansion => "hygiene::expansion",
            ErrorType::RecursionLimit => "hygiene::recursion_limit",
            ErrorType::Template => "hygiene::template",
            ErrorType::Name => "hygiene::name",
            ErrorType::Registry => "hygiene::registry",
            ErrorType::Load => "hygiene::load",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn std::fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.ctx()
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.ctx();
        let mut labels = Vec::new();
        if let Some(span) = ctx.span {
            labels.push(LabeledSpan::new(
                Some(self.message()),
                span.start,
                span.len().max(1),
            ));
        }
        for rel in &ctx.related {
            labels.push(LabeledSpan::new(
                Some(rel.label.clone()),
                rel.span.start,
                rel.span.len().max(1),
            ));
        }
        if labels.is_empty() {
            None
        } else {
            Some(Box::new(labels.into_iter()))
        }
    }
}

/// Converts source text into a shared `NamedSource` for error rendering.
pub fn to_error_source(name: impl AsRef<str>, source: impl Into<String>) -> SourceArc {
    Arc::new(NamedSource::new(name.as_ref(), source.into()))
}

/// Constructs a `MacroError` variant with a formatted message and no position.
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $($fmt:tt)+) => {
        $crate::MacroError::$variant {
            message: format!($($fmt)+),
            ctx: $crate::ErrorContext::none(),
            source: None,
        }
    };
}

/// Constructs a `MacroError` variant with a formatted message and an
/// optional span.
#[macro_export]
macro_rules! err_ctx {
    ($variant:ident, span = $span:expr, $($fmt:tt)+) => {
        $crate::MacroError::$variant {
            message: format!($($fmt)+),
            ctx: $crate::ErrorContext::with_span($span),
            source: None,
        }
    };
}

#[cfg(test)]
mod diagnostics_tests {
    use miette::Report;

    use super::*;

    #[test]
    fn report_renders_labels_and_help() {
        let src = to_error_source("input.lean", "const x + y");
        let err = err_ctx!(Expansion, span = Some(Span::new(6, 7)), "unexpected `{}`", "x")
            .with_help("pass an identifier")
            .with_related(Span::new(0, 5), "in this macro call")
            .with_source(src);
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("unexpected `x`"));
        assert!(output.contains("pass an identifier"));
        assert!(output.contains("in this macro call"));
        assert!(output.contains("hygiene::expansion"));
    }

    #[test]
    fn or_span_only_fills_missing_positions() {
        let err = err_msg!(Expansion, "boom").or_span(Some(Span::new(1, 2)));
        assert_eq!(err.span(), Some(Span::new(1, 2)));
        let err = err.or_span(Some(Span::new(5, 9)));
        assert_eq!(err.span(), Some(Span::new(1, 2)));
    }

    #[test]
    fn underlying_error_is_exposed_as_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing rules");
        let err = MacroError::Load {
            message: "cannot read rules.json".to_string(),
            ctx: ErrorContext::none(),
            source: Some(Box::new(io)),
        };
        let source = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("missing rules"));
        assert!(std::error::Error::source(&err_msg!(Load, "plain")).is_none());
    }

    #[test]
    fn error_type_and_message() {
        let err = err_msg!(Template, "unbound `{}`", "a");
        assert_eq!(err.error_type(), ErrorType::Template);
        assert_eq!(err.message(), "unbound `a`");
        assert_eq!(err.to_string(), "Template error: unbound `a`");
    }
}
