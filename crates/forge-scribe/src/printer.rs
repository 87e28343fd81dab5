//! Terminal diagnostic printer
//!
//! Renders collected diagnostics with colored severity labels, followed by
//! a one-line summary.
//!
//! # Example
//!
//! ```no_run
//! use forge_scribe::diagnostics::DiagnosticsCollector;
//! use forge_scribe::printer::DiagnosticPrinter;
//!
//! let collector = DiagnosticsCollector::new();
//! DiagnosticPrinter::new(&collector, true).print_to_stderr();
//! ```

use crate::diagnostics::{DiagnosticsCollector, Severity};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Terminal diagnostic printer
pub struct DiagnosticPrinter<'a> {
    /// Diagnostics to print
    collector: &'a DiagnosticsCollector,
    /// Whether to use colored output
    use_color: bool,
    /// Lowest severity that is printed
    min_severity: Severity,
}

impl<'a> DiagnosticPrinter<'a> {
    /// Create a new printer
    pub fn new(collector: &'a DiagnosticsCollector, use_color: bool) -> Self {
        Self {
            collector,
            use_color,
            min_severity: Severity::Warning,
        }
    }

    /// Also print diagnostics below warning level
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.min_severity = if verbose {
            Severity::Info
        } else {
            Severity::Warning
        };
        self
    }

    /// Print to stderr, honouring the color setting
    pub fn print_to_stderr(&self) {
        let choice = if self.use_color {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        let mut stderr = StandardStream::stderr(choice);
        if let Err(e) = self.write_colored(&mut stderr) {
            tracing::warn!("failed to print diagnostics: {}", e);
        }
    }

    /// Write with colors to a WriteColor implementor
    pub fn write_colored<W: WriteColor>(&self, w: &mut W) -> io::Result<()> {
        for diagnostic in self.collector.diagnostics() {
            if diagnostic.severity >= self.min_severity {
                diagnostic.format_colored(w)?;
            }
        }

        let (errors, warnings) = (self.collector.error_count(), self.collector.warning_count());
        if errors == 0 && warnings == 0 {
            return Ok(());
        }

        let color = if errors > 0 { Color::Red } else { Color::Yellow };
        w.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        writeln!(w, "{}", self.summary())?;
        w.reset()
    }

    /// Summary line, e.g. `2 errors, 1 warning`
    pub fn summary(&self) -> String {
        fn plural(n: usize, word: &str) -> String {
            if n == 1 {
                format!("{} {}", n, word)
            } else {
                format!("{} {}s", n, word)
            }
        }
        format!(
            "{}, {}",
            plural(self.collector.error_count(), "error"),
            plural(self.collector.warning_count(), "warning")
        )
    }
}

impl Display for DiagnosticPrinter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for diagnostic in self.collector.diagnostics() {
            if diagnostic.severity >= self.min_severity {
                writeln!(f, "{}", diagnostic.format())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Diagnostic, DiagnosticSink};
    use crate::location::Location;

    fn collector() -> DiagnosticsCollector {
        let mut c = DiagnosticsCollector::new();
        c.report(
            Diagnostic::warning("Unknown command '\\bx'").at_location(&Location::new("a.qdoc", 1, 3)),
        );
        c.report(Diagnostic::error("Namespace 'NS' documented more than once"));
        c.info("read 3 index files");
        c
    }

    #[test]
    fn test_summary() {
        let c = collector();
        assert_eq!(DiagnosticPrinter::new(&c, false).summary(), "1 error, 1 warning");
    }

    #[test]
    fn test_write_plain() {
        let c = collector();
        let mut buffer = termcolor::Buffer::no_color();
        DiagnosticPrinter::new(&c, false)
            .write_colored(&mut buffer)
            .unwrap();
        let out = String::from_utf8(buffer.into_inner()).unwrap();
        assert!(out.contains("a.qdoc:1:3: warning: Unknown command '\\bx'"));
        assert!(!out.contains("read 3 index files"));
        assert!(out.ends_with("1 error, 1 warning\n"));
    }

    #[test]
    fn test_display_verbose() {
        let c = collector();
        let text = DiagnosticPrinter::new(&c, false).verbose(true).to_string();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("info: read 3 index files"));
    }

    #[test]
    fn test_nothing_to_print() {
        let c = DiagnosticsCollector::new();
        let mut buffer = termcolor::Buffer::no_color();
        DiagnosticPrinter::new(&c, false)
            .write_colored(&mut buffer)
            .unwrap();
        assert!(buffer.into_inner().is_empty());
    }
}
