//! Diagnostics and error types for the evaluation pipeline.
//!
//! Every failure the pipeline can produce is one of the types below:
//!
//! - [`CompilationError`]: the transpiler rejected the source. Carries the
//!   aggregated `Line <L>, Column <C>: <message>` text plus the structured
//!   [`Diagnostic`] list, and renders through `miette` with source labels.
//! - [`ExecutionSetupError`]: the synthesized test program failed before any
//!   case ran (syntax error in the concatenated text, or a throw during the
//!   registration pass). Reported as a `Code Execution Error` outcome.
//! - [`HarnessError`]: the harness itself could not run. Reported as a
//!   `Test Runner Error` outcome.
//! - [`ChallengeError`]: a challenge definition could not be loaded.
//!
//! Only `CompilationError` ever reaches a caller of the pipeline as an `Err`;
//! the harness turns everything else into a report.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use miette::{LabeledSpan, NamedSource, SourceCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::syntax::{Span, SyntaxError};

pub type SourceArc = Arc<NamedSource<String>>;

/// Converts a source string into an `Arc<NamedSource<String>>` for use in error reports.
pub fn to_error_source<S: AsRef<str>>(name: &str, source: S) -> SourceArc {
    Arc::new(NamedSource::new(name, source.as_ref().to_string()))
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Suggestion,
    Message,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Suggestion => "suggestion",
            Severity::Message => "message",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based line and column; columns count UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Location of a byte offset within `source`.
    pub fn of_offset(source: &str, offset: usize) -> Self {
        let mut offset = offset.min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &source[..offset];
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line = before.matches('\n').count() + 1;
        let column = before[line_start..].encode_utf16().count() + 1;
        Location { line, column }
    }
}

/// One problem reported by the transpiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: u32,
    pub message: String,
    pub location: Option<Location>,
    #[serde(skip)]
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            location: None,
            span: None,
        }
    }

    pub fn warning(code: u32, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message)
        }
    }

    /// Attach a position, resolving line and column against `source`.
    pub fn at(mut self, source: &str, span: Span) -> Self {
        self.location = Some(Location::of_offset(source, span.start));
        self.span = Some(span);
        self
    }

    pub fn from_syntax_error(error: &SyntaxError, source: &str) -> Self {
        Self::error(error.code, error.message.clone()).at(source, error.span)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `Line <L>, Column <C>: <message>`, or just the message without a position.
    pub fn format_line(&self) -> String {
        match self.location {
            Some(loc) => format!("Line {}, Column {}: {}", loc.line, loc.column, self.message),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} TS{}: {}", self.severity, self.code, self.format_line())
    }
}

// ============================================================================
// COMPILATION ERROR
// ============================================================================

/// The transpiler could not produce executable code.
#[derive(Debug, Error)]
pub enum CompilationError {
    #[error("TypeScript compilation errors:\n{message}")]
    Diagnostics {
        /// Formatted error lines joined with newlines.
        message: String,
        diagnostics: Vec<Diagnostic>,
        source_code: SourceArc,
    },
    #[error("Failed to transpile TypeScript: {detail}")]
    Internal { detail: String },
}

impl CompilationError {
    /// Aggregates the error-severity diagnostics; `None` when there are none.
    pub fn from_diagnostics(diagnostics: &[Diagnostic], source: &str) -> Option<Self> {
        let errors: Vec<Diagnostic> = diagnostics.iter().filter(|d| d.is_error()).cloned().collect();
        if errors.is_empty() {
            return None;
        }
        let message = errors
            .iter()
            .map(Diagnostic::format_line)
            .collect::<Vec<_>>()
            .join("\n");
        Some(CompilationError::Diagnostics {
            message,
            diagnostics: errors,
            source_code: to_error_source("submission.ts", source),
        })
    }

    pub fn internal(detail: impl fmt::Display) -> Self {
        CompilationError::Internal {
            detail: detail.to_string(),
        }
    }

    /// Error diagnostics behind this failure; empty for internal failures.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompilationError::Diagnostics { diagnostics, .. } => diagnostics,
            CompilationError::Internal { .. } => &[],
        }
    }
}

impl miette::Diagnostic for CompilationError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self {
            CompilationError::Diagnostics { .. } => "codetrial::compile",
            CompilationError::Internal { .. } => "codetrial::internal",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        match self {
            CompilationError::Diagnostics { diagnostics, .. } if diagnostics.len() > 1 => Some(Box::new(
                format!("{} errors must be fixed before the tests can run", diagnostics.len()),
            )),
            _ => None,
        }
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        match self {
            CompilationError::Diagnostics { source_code, .. } => Some(source_code.as_ref() as &dyn SourceCode),
            CompilationError::Internal { .. } => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let CompilationError::Diagnostics { diagnostics, .. } = self else {
            return None;
        };
        let labels: Vec<LabeledSpan> = diagnostics
            .iter()
            .filter_map(|d| {
                let span = d.span?;
                let len = if span.end > span.start { span.end - span.start } else { 1 };
                Some(LabeledSpan::new(Some(d.message.clone()), span.start, len))
            })
            .collect();
        if labels.is_empty() {
            None
        } else {
            Some(Box::new(labels.into_iter()))
        }
    }
}

// ============================================================================
// EXECUTION ERRORS
// ============================================================================

/// The synthesized program failed before any test case ran.
#[derive(Debug, Clone, PartialEq, Error, miette::Diagnostic)]
pub enum ExecutionSetupError {
    /// The concatenated program text does not parse.
    #[error("{message}")]
    #[diagnostic(code(codetrial::execution::syntax))]
    Syntax {
        message: String,
        location: Option<Location>,
    },
    /// The program threw while registering its suite.
    #[error("{message}")]
    #[diagnostic(code(codetrial::execution::thrown))]
    Thrown { message: String },
}

impl ExecutionSetupError {
    pub fn message(&self) -> &str {
        match self {
            ExecutionSetupError::Syntax { message, .. } | ExecutionSetupError::Thrown { message } => message,
        }
    }
}

/// The harness could not orchestrate a run.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum HarnessError {
    #[error("failed to start test worker: {0}")]
    #[diagnostic(code(codetrial::harness::spawn))]
    Spawn(#[from] std::io::Error),
    #[error("test worker panicked: {0}")]
    #[diagnostic(code(codetrial::harness::panic))]
    WorkerPanicked(String),
    #[error("test worker stopped without reporting")]
    #[diagnostic(code(codetrial::harness::disconnected))]
    Disconnected,
}

// ============================================================================
// CHALLENGE ERRORS
// ============================================================================

#[derive(Debug, Error, miette::Diagnostic)]
pub enum ChallengeError {
    #[error("could not read challenge file {path}")]
    #[diagnostic(code(codetrial::challenge::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid challenge definition in {path}: {source}")]
    #[diagnostic(
        code(codetrial::challenge::yaml),
        help("a challenge needs name, description, starter_code and suite fields")
    )]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("challenge directory {path} could not be walked: {message}")]
    #[diagnostic(code(codetrial::challenge::discovery))]
    Discovery { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_counts_utf16_columns() {
        let source = "let s = '😀';\nlet t = 1 +;";
        let offset = source.find('+').unwrap();
        assert_eq!(Location::of_offset(source, offset), Location { line: 2, column: 11 });
        let emoji_end = source.find("';").unwrap();
        assert_eq!(Location::of_offset(source, emoji_end).column, 12);
    }

    #[test]
    fn test_format_line() {
        let diagnostic = Diagnostic::error(1005, "';' expected.").at("a b", Span::new(2, 3));
        assert_eq!(diagnostic.format_line(), "Line 1, Column 3: ';' expected.");
        assert_eq!(Diagnostic::error(1, "no position").format_line(), "no position");
    }

    #[test]
    fn test_warnings_do_not_aggregate() {
        let diagnostics = vec![Diagnostic::warning(7027, "Unreachable code detected.")];
        assert!(CompilationError::from_diagnostics(&diagnostics, "").is_none());
    }

    #[test]
    fn test_aggregated_message() {
        let source = "x\ny";
        let diagnostics = vec![
            Diagnostic::error(1, "first").at(source, Span::new(0, 1)),
            Diagnostic::warning(2, "ignored"),
            Diagnostic::error(3, "second").at(source, Span::new(2, 3)),
        ];
        let error = CompilationError::from_diagnostics(&diagnostics, source).unwrap();
        assert_eq!(
            error.to_string(),
            "TypeScript compilation errors:\nLine 1, Column 1: first\nLine 2, Column 1: second"
        );
        assert_eq!(error.diagnostics().len(), 2);
    }
}
