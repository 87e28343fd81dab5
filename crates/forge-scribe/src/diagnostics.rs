//! Error types and diagnostics
//!
//! This module provides error handling and diagnostic reporting for the
//! parser and the resolver. Warnings and errors are collected through a
//! [`DiagnosticSink`] and never abort a run; a fatal condition is returned
//! as [`ScribeError::Fatal`] and unwinds to the caller.

use crate::location::Location;
use std::path::PathBuf;
use std::io;
use termcolor::{Color, ColorSpec, WriteColor};
use thiserror::Error;

/// Result type for forge-scribe operations
pub type ScribeResult<T> = Result<T, ScribeError>;

/// Main error type for forge-scribe
#[derive(Debug, Error)]
pub enum ScribeError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error in {file}: {message}")]
    Parse {
        file: PathBuf,
        message: String,
        line: Option<usize>,
        col: Option<usize>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML decoding error
    #[error("Configuration syntax error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed index content
    #[error("Index error: {0}")]
    Index(String),

    /// XML reader/writer failure
    #[error("XML error: {0}")]
    Xml(String),

    /// The run cannot continue
    #[error("{location}: fatal: {message}")]
    Fatal { location: Location, message: String },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl ScribeError {
    /// Create a parse error
    pub fn parse(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ScribeError::Parse {
            file: file.into(),
            message: message.into(),
            line: None,
            col: None,
        }
    }

    /// Create a parse error with location
    pub fn parse_at(
        file: impl Into<PathBuf>,
        message: impl Into<String>,
        line: usize,
        col: usize,
    ) -> Self {
        ScribeError::Parse {
            file: file.into(),
            message: message.into(),
            line: Some(line),
            col: Some(col),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        ScribeError::Config(message.into())
    }

    /// Create an index error
    pub fn index(message: impl Into<String>) -> Self {
        ScribeError::Index(message.into())
    }

    /// Wrap an XML reader or writer error
    pub fn xml(err: impl std::fmt::Display) -> Self {
        ScribeError::Xml(err.to_string())
    }

    /// Create a fatal error
    pub fn fatal(location: Location, message: impl Into<String>) -> Self {
        ScribeError::Fatal {
            location,
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        ScribeError::Other(message.into())
    }

    /// Check whether this error aborts the run
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScribeError::Fatal { .. })
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational message
    Info,
    /// Recoverable, processing continues with a fallback
    Warning,
    /// Output is produced but known to be incomplete or wrong
    Error,
    /// The run cannot continue
    Fatal,
}

impl Severity {
    /// Get display string
    pub fn display(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        }
    }

    /// Terminal color for this severity
    pub fn color(&self) -> Color {
        match self {
            Severity::Info => Color::Blue,
            Severity::Warning => Color::Yellow,
            Severity::Error | Severity::Fatal => Color::Red,
        }
    }
}

/// A diagnostic message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Message
    pub message: String,
    /// Second line of explanation ("Maybe you meant ...")
    pub details: Option<String>,
    /// Where the problem was found
    pub location: Option<Location>,
    /// Diagnostic code (for categorization)
    pub code: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            details: None,
            location: None,
            code: None,
        }
    }

    /// Create a warning diagnostic
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Create an error diagnostic
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Create a fatal diagnostic
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, message)
    }

    /// Create an info diagnostic
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// Set the location
    pub fn at_location(mut self, location: &Location) -> Self {
        self.location = Some(location.clone());
        self
    }

    /// Set the details line
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        if !details.is_empty() {
            self.details = Some(details);
        }
        self
    }

    /// Set the diagnostic code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Format the diagnostic for display
    pub fn format(&self) -> String {
        let mut result = String::new();

        if let Some(location) = self.location.as_ref().filter(|l| !l.is_unknown()) {
            result.push_str(&location.to_string());
            result.push_str(": ");
        }

        result.push_str(self.severity.display());
        if let Some(ref code) = self.code {
            result.push('[');
            result.push_str(code);
            result.push(']');
        }
        result.push_str(": ");
        result.push_str(&self.message);

        if let Some(ref details) = self.details {
            result.push_str("\n    ");
            result.push_str(details);
        }

        result
    }

    /// Write the diagnostic with the severity label colored
    pub fn format_colored<W: WriteColor>(&self, w: &mut W) -> io::Result<()> {
        if let Some(location) = self.location.as_ref().filter(|l| !l.is_unknown()) {
            w.set_color(ColorSpec::new().set_bold(true))?;
            write!(w, "{}: ", location)?;
            w.reset()?;
        }

        w.set_color(ColorSpec::new().set_fg(Some(self.severity.color())).set_bold(true))?;
        write!(w, "{}", self.severity.display())?;
        if let Some(ref code) = self.code {
            write!(w, "[{}]", code)?;
        }
        w.reset()?;
        writeln!(w, ": {}", self.message)?;

        if let Some(ref details) = self.details {
            w.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
            writeln!(w, "    {}", details)?;
            w.reset()?;
        }
        Ok(())
    }

    /// Turn a fatal diagnostic into the error that aborts the run
    pub fn into_error(self) -> ScribeError {
        ScribeError::fatal(self.location.unwrap_or_default(), self.message)
    }
}

/// Receiver for diagnostics produced while parsing and resolving
pub trait DiagnosticSink {
    /// Accept one diagnostic
    fn report(&mut self, diagnostic: Diagnostic);

    /// Report a warning at `location`
    fn warn_at(&mut self, location: &Location, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Diagnostic::warning(message).at_location(location));
    }
}

/// Collector for diagnostics during a run
#[derive(Debug, Default, Clone)]
pub struct DiagnosticsCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticsCollector {
    /// Create a new collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic
    pub fn add(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Fatal => tracing::warn!("fatal diagnostic: {}", diagnostic.format()),
            _ => tracing::debug!("{}", diagnostic.format()),
        }
        self.diagnostics.push(diagnostic);
    }

    /// Add an error
    pub fn error(&mut self, message: impl Into<String>) {
        self.add(Diagnostic::error(message));
    }

    /// Add a warning
    pub fn warning(&mut self, message: impl Into<String>) {
        self.add(Diagnostic::warning(message));
    }

    /// Add an info message
    pub fn info(&mut self, message: impl Into<String>) {
        self.add(Diagnostic::info(message));
    }

    /// Check if there are any errors (fatal included)
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity >= Severity::Error)
    }

    /// Get all diagnostics
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics of exactly `severity`
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.severity == severity)
    }

    /// Messages of all warnings, in report order
    pub fn warnings(&self) -> Vec<&str> {
        self.with_severity(Severity::Warning)
            .map(|d| d.message.as_str())
            .collect()
    }

    /// Get error count
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Error)
            .count()
    }

    /// Get warning count
    pub fn warning_count(&self) -> usize {
        self.with_severity(Severity::Warning).count()
    }

    /// Check whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Remove and return everything collected so far
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

impl DiagnosticSink for DiagnosticsCollector {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.add(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scribe_error() {
        let err = ScribeError::parse("qtcore.index", "unexpected element");
        assert!(err.to_string().contains("qtcore.index"));
        assert!(err.to_string().contains("unexpected element"));

        let fatal = ScribeError::fatal(Location::new("a.qdoc", 4, 2), "Too many nested");
        assert!(fatal.is_fatal());
        assert_eq!(fatal.to_string(), "a.qdoc:4:2: fatal: Too many nested");
    }

    #[test]
    fn test_diagnostic() {
        let diag = Diagnostic::warning("Unknown command '\\sidebr'")
            .at_location(&Location::new("main.cpp", 10, 5))
            .with_details("Maybe you meant '\\sidebar'?")
            .with_code("W001");

        assert_eq!(diag.severity, Severity::Warning);
        let text = diag.format();
        assert!(text.starts_with("main.cpp:10:5: warning[W001]: Unknown command"));
        assert!(text.ends_with("\n    Maybe you meant '\\sidebar'?"));
    }

    #[test]
    fn test_format_colored_plain_buffer() {
        let diag = Diagnostic::error("Ambiguous link").at_location(&Location::new("a.qdoc", 2, 1));
        let mut buffer = termcolor::Buffer::no_color();
        diag.format_colored(&mut buffer).unwrap();
        let out = String::from_utf8(buffer.into_inner()).unwrap();
        assert_eq!(out, "a.qdoc:2:1: error: Ambiguous link\n");
    }

    #[test]
    fn test_empty_details_ignored() {
        let diag = Diagnostic::warning("x").with_details("");
        assert_eq!(diag.details, None);
    }

    #[test]
    fn test_diagnostics_collector() {
        let mut collector = DiagnosticsCollector::new();
        collector.error("error 1");
        collector.warning("warning 1");
        collector.info("info 1");
        collector.report(Diagnostic::fatal("fatal 1"));

        assert!(collector.has_errors());
        assert_eq!(collector.error_count(), 2);
        assert_eq!(collector.warning_count(), 1);
        assert_eq!(collector.warnings(), vec!["warning 1"]);
        assert_eq!(collector.diagnostics().len(), 4);

        let taken = collector.take();
        assert_eq!(taken.len(), 4);
        assert!(collector.is_empty());
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Fatal > Severity::Error);
        assert!(Severity::Error > Severity::Warning);
        assert_eq!(Severity::Warning.color(), Color::Yellow);
    }
}
