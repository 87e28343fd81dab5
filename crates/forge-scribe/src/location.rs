//! Source locations
//!
//! A `Location` names a position inside a documentation comment or an
//! index file. The parser keeps a `LocationStack` so that text spliced in by
//! `\include` reports positions in the included file until the cursor
//! passes the end of the included range.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    /// Source file path as given by the caller
    pub file: String,
    /// 1-indexed line number (0 when unknown)
    pub line: usize,
    /// 1-indexed column number (0 when unknown)
    pub col: usize,
}

impl Location {
    /// Create a new location
    pub fn new(file: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            file: file.into(),
            line,
            col,
        }
    }

    /// Location at the first character of `file`
    pub fn start_of(file: impl Into<String>) -> Self {
        Self::new(file, 1, 1)
    }

    /// Create an unknown/unset location
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Check if this location is unknown/unset
    pub fn is_unknown(&self) -> bool {
        self.file.is_empty() && self.line == 0 && self.col == 0
    }

    /// File name without directories
    pub fn file_name(&self) -> &str {
        self.file
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(self.file.as_str())
    }

    /// Move past one character of input.
    pub fn advance(&mut self, ch: char, tab_size: usize) {
        match ch {
            '\n' => {
                self.line += 1;
                self.col = 1;
            }
            '\t' => {
                let tab = tab_size.max(1);
                self.col = 1 + tab * ((self.col + tab - 1) / tab);
            }
            _ => self.col += 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            return write!(f, "<unknown>");
        }
        write!(f, "{}", self.file)?;
        if self.line > 0 {
            write!(f, ":{}", self.line)?;
            if self.col > 0 {
                write!(f, ":{}", self.col)?;
            }
        }
        Ok(())
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.file
            .cmp(&other.file)
            .then(self.line.cmp(&other.line))
            .then(self.col.cmp(&other.col))
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Stack of locations, one entry per open `\include`
#[derive(Debug, Clone)]
pub struct LocationStack {
    entries: Vec<Location>,
}

impl LocationStack {
    /// Start a stack at `start`
    pub fn new(start: Location) -> Self {
        Self {
            entries: vec![start],
        }
    }

    /// Current location
    pub fn top(&self) -> &Location {
        // the stack is never empty: `pop` refuses to remove the bottom entry
        &self.entries[self.entries.len() - 1]
    }

    /// Number of nested files, 1 for the outermost comment
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Enter an included file
    pub fn push(&mut self, file: impl Into<String>) {
        self.entries.push(Location::start_of(file));
    }

    /// Leave the innermost included file
    pub fn pop(&mut self) {
        if self.entries.len() > 1 {
            self.entries.pop();
        }
    }

    /// Advance the innermost location by one character
    pub fn advance(&mut self, ch: char, tab_size: usize) {
        if let Some(top) = self.entries.last_mut() {
            top.advance(ch, tab_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("a.cpp", 3, 7).to_string(), "a.cpp:3:7");
        assert_eq!(Location::new("a.cpp", 0, 0).to_string(), "a.cpp");
        assert_eq!(Location::unknown().to_string(), "<unknown>");
    }

    #[test]
    fn test_location_advance() {
        let mut loc = Location::start_of("x.qdoc");
        for ch in "ab\ncd".chars() {
            loc.advance(ch, 8);
        }
        assert_eq!((loc.line, loc.col), (2, 3));

        let mut loc = Location::start_of("x.qdoc");
        loc.advance('\t', 4);
        assert_eq!(loc.col, 5);
        loc.advance('a', 4);
        loc.advance('\t', 4);
        assert_eq!(loc.col, 9);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(Location::new("src/doc/intro.qdoc", 1, 1).file_name(), "intro.qdoc");
        assert_eq!(Location::new("intro.qdoc", 1, 1).file_name(), "intro.qdoc");
    }

    #[test]
    fn test_location_stack() {
        let mut stack = LocationStack::new(Location::start_of("main.cpp"));
        stack.push("snippet.qdocinc");
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.top().file, "snippet.qdocinc");
        stack.pop();
        stack.pop();
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.top().file, "main.cpp");
    }
}
