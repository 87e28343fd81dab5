//! Quoting code from example files
//!
//! `\quotefromfile` loads a file into the quoter; `\printline`,
//! `\printto`, `\printuntil` and their `skip` forms then walk through it
//! line by line, and `\snippet` extracts the block between two
//! `//! [id]` markers.

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::location::Location;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Finds files named in documentation comments
pub trait FileResolver {
    /// Path of the first match for `name`
    fn resolve(&self, name: &str) -> Option<PathBuf>;

    /// Directories searched, for diagnostics
    fn search_directories(&self) -> &[PathBuf];
}

/// Resolver that looks in a fixed list of directories, in order
#[derive(Debug, Clone, Default)]
pub struct DirectoryResolver {
    directories: Vec<PathBuf>,
}

impl DirectoryResolver {
    pub fn new<I, P>(directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
        }
    }
}

impl FileResolver for DirectoryResolver {
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let path = Path::new(name);
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }
        self.directories
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
    }

    fn search_directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

/// Walks through a quoted file on behalf of the parser
pub trait Quoter {
    /// Forget the current file
    fn reset(&mut self);

    /// Start quoting from `code`, the contents of `path`
    fn quote_from_file(&mut self, path: &str, code: &str);

    /// Take the next line if it matches `pattern`
    fn quote_line(
        &mut self,
        doc_location: &Location,
        command: &str,
        pattern: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> String;

    /// Take lines up to, not including, the first one matching `pattern`.
    /// An empty pattern takes the rest of the file.
    fn quote_to(
        &mut self,
        doc_location: &Location,
        command: &str,
        pattern: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> String;

    /// Take lines up to and including the first one matching `pattern`
    fn quote_until(
        &mut self,
        doc_location: &Location,
        command: &str,
        pattern: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> String;

    /// Take the lines between the two markers of snippet `identifier`
    fn quote_snippet(
        &mut self,
        doc_location: &Location,
        identifier: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> String;
}

/// The standard line-oriented [`Quoter`]
#[derive(Debug, Clone, Default)]
pub struct LineQuoter {
    silent: bool,
    plain_lines: Vec<String>,
    output_lines: Vec<String>,
    next: usize,
    code_location: Location,
}

impl LineQuoter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines not taken yet
    pub fn remaining(&self) -> usize {
        self.plain_lines.len() - self.next
    }

    fn current(&self) -> Option<&str> {
        self.plain_lines.get(self.next).map(String::as_str)
    }

    fn comment_for_code(&self) -> &'static str {
        let name = self.code_location.file_name();
        if name == "CMakeLists.txt" {
            return "#!";
        }
        match name.rsplit_once('.').map(|(_, ext)| ext) {
            Some("pro" | "py" | "cmake") => "#!",
            Some("html" | "qrc" | "ui" | "xml" | "xq") => "<!--",
            _ => "//!",
        }
    }

    fn get_line(&mut self, unindent: usize) -> String {
        let Some(line) = self.output_lines.get(self.next) else {
            return String::new();
        };
        self.next += 1;
        let skip = line.chars().take(unindent).take_while(|&c| c == ' ').count();
        let mut t: String = line.chars().skip(skip).collect();
        t.push('\n');
        self.code_location.line += t.matches('\n').count();
        t
    }

    fn matches(
        &mut self,
        doc_location: &Location,
        pattern: &str,
        line: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> bool {
        let line = line.trim_end_matches('\n');
        if pattern.len() > 2 && pattern.starts_with('/') && pattern.ends_with('/') {
            let expr = &pattern[1..pattern.len() - 1];
            return match Regex::new(expr) {
                Ok(re) => re.is_match(line),
                Err(_) => {
                    if !self.silent {
                        sink.report(
                            Diagnostic::warning(format!("Invalid regular expression '{}'", expr))
                                .at_location(doc_location),
                        );
                        self.silent = true;
                    }
                    false
                }
            };
        }
        trim_white_space(line).contains(&trim_white_space(pattern))
    }

    fn failed_at_end(&mut self, doc_location: &Location, command: &str, sink: &mut dyn DiagnosticSink) {
        if self.silent || command.is_empty() {
            return;
        }
        let message = if self.code_location.file.is_empty() {
            format!("Unexpected '\\{}'", command)
        } else {
            format!(
                "Command '\\{}' failed at end of file '{}'",
                command, self.code_location.file
            )
        };
        sink.report(Diagnostic::warning(message).at_location(doc_location));
        self.silent = true;
    }

    fn remove_special_lines(&mut self, comment: &str, unindent: usize) -> String {
        let Some(line) = self.current().map(str::to_string) else {
            return String::new();
        };
        let trimmed = line.trim();
        if trimmed.starts_with("QT_BEGIN_NAMESPACE") {
            self.get_line(0);
            String::new()
        } else if trimmed.starts_with("QT_END_NAMESPACE") {
            self.get_line(0);
            "\n".to_string()
        } else if !trimmed.starts_with(comment) {
            self.get_line(unindent)
        } else {
            self.get_line(0);
            if line.contains('\n') {
                "\n".to_string()
            } else {
                String::new()
            }
        }
    }
}

impl Quoter for LineQuoter {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn quote_from_file(&mut self, path: &str, code: &str) {
        self.silent = false;
        self.code_location = Location::start_of(path);
        self.plain_lines = split_lines(code);
        self.output_lines = self.plain_lines.iter().map(|l| squeeze_newlines(l)).collect();
        self.next = 0;
    }

    fn quote_line(
        &mut self,
        doc_location: &Location,
        command: &str,
        pattern: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> String {
        let Some(line) = self.current().map(str::to_string) else {
            self.failed_at_end(doc_location, command, sink);
            return String::new();
        };
        if pattern.is_empty() {
            sink.report(
                Diagnostic::warning(format!("Missing pattern after '\\{}'", command))
                    .at_location(doc_location),
            );
            return String::new();
        }
        if self.matches(doc_location, pattern, &line, sink) {
            return self.get_line(0);
        }
        if !self.silent {
            sink.report(
                Diagnostic::warning(format!("Command '\\{}' failed", command)).at_location(doc_location),
            );
            sink.report(
                Diagnostic::warning(format!("Pattern '{}' didn't match here", pattern))
                    .at_location(&self.code_location),
            );
            self.silent = true;
        }
        String::new()
    }

    fn quote_to(
        &mut self,
        doc_location: &Location,
        command: &str,
        pattern: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> String {
        let mut t = String::new();
        let comment = self.comment_for_code();
        if pattern.is_empty() {
            while self.current().is_some() {
                t.push_str(&self.remove_special_lines(comment, 0));
            }
            return t;
        }
        while let Some(line) = self.current().map(str::to_string) {
            if self.matches(doc_location, pattern, &line, sink) {
                return t;
            }
            t.push_str(&self.get_line(0));
        }
        self.failed_at_end(doc_location, command, sink);
        t
    }

    fn quote_until(
        &mut self,
        doc_location: &Location,
        command: &str,
        pattern: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> String {
        let mut t = self.quote_to(doc_location, command, pattern, sink);
        t.push_str(&self.get_line(0));
        t
    }

    fn quote_snippet(
        &mut self,
        doc_location: &Location,
        identifier: &str,
        sink: &mut dyn DiagnosticSink,
    ) -> String {
        let comment = self.comment_for_code();
        let delimiter = format!("{} [{}]", comment, identifier);
        let mut t = String::new();
        let mut indent = 0;

        while let Some(line) = self.current().map(str::to_string) {
            if self.matches(doc_location, &delimiter, &line, sink) {
                let start = self.get_line(0);
                indent = start.chars().take_while(|&c| c == ' ').count();
                break;
            }
            self.get_line(0);
        }

        while let Some(line) = self.current().map(str::to_string) {
            if self.matches(doc_location, &delimiter, &line, sink) {
                let last = self.get_line(indent);
                if let Some(at) = last.find(&delimiter).filter(|&at| at > 0) {
                    let mut leading = &last[..at];
                    if let Some(c) = leading.find(comment) {
                        leading = &leading[..c];
                    }
                    if !leading.trim().is_empty() {
                        t.push_str(leading);
                    }
                }
                return t;
            }
            t.push_str(&self.remove_special_lines(comment, indent));
        }

        self.failed_at_end(doc_location, &format!("snippet ({})", delimiter), sink);
        t
    }
}

/// Split `code` into logical lines. Blank lines stay attached to the line
/// before them as extra newlines so that line counting stays exact.
pub fn split_lines(code: &str) -> Vec<String> {
    let chars: Vec<char> = code.chars().collect();
    let mut result = Vec::new();
    let mut end = chars.len();
    loop {
        let mut j = end;
        while j > 0 && chars[j - 1] == '\n' {
            j -= 1;
        }
        while j > 0 && chars[j - 1] != '\n' {
            j -= 1;
        }
        result.push(chars[j..end].iter().collect());
        if j == 0 {
            break;
        }
        end = j - 1;
    }
    result.reverse();
    result
}

fn squeeze_newlines(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut previous_newline = false;
    for ch in line.chars() {
        let newline = ch == '\n';
        if !(previous_newline && newline) {
            out.push(ch);
        }
        previous_newline = newline;
    }
    out
}

/// Drop whitespace except a single space between two alphanumerics, so
/// `int x = 3 + 4` becomes `int x=3+4`.
fn trim_white_space(s: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Normal,
        MetAlnum,
        MetSpace,
    }
    let mut state = State::Normal;
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            if state == State::Normal {
                state = State::MetAlnum;
            } else {
                if state == State::MetSpace {
                    out.push(' ');
                }
                state = State::Normal;
            }
            out.push(ch);
        } else if ch.is_whitespace() {
            if state == State::MetAlnum {
                state = State::MetSpace;
            }
        } else {
            state = State::Normal;
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticsCollector;
    use pretty_assertions::assert_eq;

    const CODE: &str = "int main()\n{\n    //! [setup]\n    Widget w;\n\n    w.show();\n    //! [setup]\n    return 0;\n}\n";

    fn quoter() -> LineQuoter {
        let mut q = LineQuoter::new();
        q.quote_from_file("main.cpp", CODE);
        q
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("a\nb\n\nc"), vec!["a", "b\n", "c"]);
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b\n"]);
    }

    #[test]
    fn test_print_commands() {
        let mut q = quoter();
        let mut sink = DiagnosticsCollector::new();
        let here = Location::start_of("doc.qdoc");
        assert_eq!(q.quote_line(&here, "printline", "main", &mut sink), "int main()\n");
        assert_eq!(q.quote_to(&here, "skipto", "Widget", &mut sink), "{\n    //! [setup]\n");
        assert_eq!(
            q.quote_until(&here, "printuntil", "show", &mut sink),
            "    Widget w;\n\n    w.show();\n"
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_pattern_spacing_and_regex() {
        let mut q = quoter();
        let mut sink = DiagnosticsCollector::new();
        let here = Location::start_of("doc.qdoc");
        assert_eq!(q.quote_line(&here, "printline", "int  main ( )", &mut sink), "int main()\n");
        q.quote_to(&here, "skipto", "/w\\.sh.w/", &mut sink);
        assert_eq!(q.quote_line(&here, "printline", "show", &mut sink), "    w.show();\n");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_snippet() {
        let mut q = quoter();
        let mut sink = DiagnosticsCollector::new();
        let snippet = q.quote_snippet(&Location::start_of("doc.qdoc"), "setup", &mut sink);
        assert_eq!(snippet, "Widget w;\n\nw.show();\n");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_failures_go_silent() {
        let mut q = quoter();
        let mut sink = DiagnosticsCollector::new();
        let here = Location::start_of("doc.qdoc");
        assert_eq!(q.quote_line(&here, "printline", "nothing", &mut sink), "");
        assert_eq!(sink.warning_count(), 2);
        assert_eq!(sink.warnings()[0], "Command '\\printline' failed");
        assert_eq!(sink.warnings()[1], "Pattern 'nothing' didn't match here");
        q.quote_line(&here, "printline", "nothing", &mut sink);
        assert_eq!(sink.warning_count(), 2);
    }

    #[test]
    fn test_failed_at_end() {
        let mut q = quoter();
        let mut sink = DiagnosticsCollector::new();
        q.quote_to(&Location::start_of("doc.qdoc"), "printto", "absent", &mut sink);
        assert_eq!(q.remaining(), 0);
        assert_eq!(sink.warnings(), vec!["Command '\\printto' failed at end of file 'main.cpp'"]);

        let mut empty = LineQuoter::new();
        let mut sink = DiagnosticsCollector::new();
        empty.quote_line(&Location::start_of("doc.qdoc"), "printline", "x", &mut sink);
        assert_eq!(sink.warnings(), vec!["Unexpected '\\printline'"]);
    }

    #[test]
    fn test_comment_markers() {
        let mut q = LineQuoter::new();
        q.quote_from_file("build.pro", "#! [vars]\nQT += core\n#! [vars]\n");
        let mut sink = DiagnosticsCollector::new();
        assert_eq!(q.quote_snippet(&Location::unknown(), "vars", &mut sink), "QT += core\n");
    }

    #[test]
    fn test_directory_resolver() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("snippet.cpp"), "x").unwrap();
        let resolver = DirectoryResolver::new([PathBuf::from("/nonexistent"), dir.path().to_path_buf()]);
        assert_eq!(resolver.resolve("snippet.cpp"), Some(dir.path().join("snippet.cpp")));
        assert_eq!(resolver.resolve("missing.cpp"), None);
        assert_eq!(resolver.search_directories().len(), 2);
    }
}
