//! Atoms, the typed units of a parsed document
//!
//! An atom is a type tag plus one or two strings. Paired types (`ParaLeft`
//! and `ParaRight`, `ListLeft` and `ListRight`, ...) bracket structure; the
//! parser keeps them balanced, the atom itself does not.
//!
//! Link atoms additionally carry the bracketed scope parameters of
//! `\l [QtCore qml] {target}`. The parameters are interpreted once, on first
//! use, into a [`LinkScope`].

use crate::node::{Genus, TreeId};
use std::fmt;
use std::sync::OnceLock;

/// Atom type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AtomType {
    AnnotatedList,
    AutoLink,
    BaseName,
    BR,
    BriefLeft,
    BriefRight,
    C,
    CaptionLeft,
    CaptionRight,
    Code,
    CodeBad,
    CodeQuoteArgument,
    CodeQuoteCommand,
    ComparesLeft,
    ComparesRight,
    DetailsLeft,
    DetailsRight,
    DivLeft,
    DivRight,
    ExampleFileLink,
    ExampleImageLink,
    FootnoteLeft,
    FootnoteRight,
    FormatElse,
    FormatEndif,
    FormatIf,
    FormattingLeft,
    FormattingRight,
    GeneratedList,
    HR,
    Image,
    ImageText,
    ImportantLeft,
    ImportantRight,
    InlineImage,
    Keyword,
    LegaleseLeft,
    LegaleseRight,
    LineBreak,
    Link,
    LinkNode,
    ListLeft,
    ListItemNumber,
    ListTagLeft,
    ListTagRight,
    ListItemLeft,
    ListItemRight,
    ListRight,
    NavAutoLink,
    NavLink,
    Nop,
    NoteLeft,
    NoteRight,
    ParaLeft,
    ParaRight,
    Qml,
    QuotationLeft,
    QuotationRight,
    RawString,
    SectionLeft,
    SectionRight,
    SectionHeadingLeft,
    SectionHeadingRight,
    SidebarLeft,
    SidebarRight,
    SinceList,
    SinceTagLeft,
    SinceTagRight,
    SnippetCommand,
    SnippetIdentifier,
    SnippetLocation,
    String,
    TableLeft,
    TableRight,
    TableHeaderLeft,
    TableHeaderRight,
    TableRowLeft,
    TableRowRight,
    TableItemLeft,
    TableItemRight,
    TableOfContents,
    Target,
    UnhandledFormat,
    WarningLeft,
    WarningRight,
    UnknownCommand,
}

impl AtomType {
    /// Name of the type, for dumps and traces
    pub fn name(&self) -> String {
        format!("{:?}", self)
    }

    /// Types whose string is rendered as visible text
    pub fn is_textual(&self) -> bool {
        matches!(self, AtomType::String | AtomType::AutoLink | AtomType::C)
    }
}

// Strings carried by FormattingLeft/FormattingRight
pub const FORMATTING_BOLD: &str = "bold";
pub const FORMATTING_INDEX: &str = "index";
pub const FORMATTING_ITALIC: &str = "italic";
pub const FORMATTING_LINK: &str = "link";
pub const FORMATTING_PARAMETER: &str = "parameter";
pub const FORMATTING_SPAN: &str = "span ";
pub const FORMATTING_SUBSCRIPT: &str = "subscript";
pub const FORMATTING_SUPERSCRIPT: &str = "superscript";
pub const FORMATTING_TELETYPE: &str = "teletype";
pub const FORMATTING_TRADEMARK: &str = "trademark";
pub const FORMATTING_UICONTROL: &str = "uicontrol";
pub const FORMATTING_UNDERLINE: &str = "underline";

// Strings carried by ListLeft/ListRight
pub const LIST_BULLET: &str = "bullet";
pub const LIST_TAG: &str = "tag";
pub const LIST_VALUE: &str = "value";
pub const LIST_LOWERALPHA: &str = "loweralpha";
pub const LIST_LOWERROMAN: &str = "lowerroman";
pub const LIST_NUMERIC: &str = "numeric";
pub const LIST_UPPERALPHA: &str = "upperalpha";
pub const LIST_UPPERROMAN: &str = "upperroman";

/// Interpreted `[...]` parameters of a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkScope {
    /// Genus the target must belong to
    pub genus: Genus,
    /// Tree the link is restricted to
    pub domain: Option<TreeId>,
    /// The raw parameters, when one of them was not understood
    pub error: Option<String>,
}

impl Default for LinkScope {
    fn default() -> Self {
        Self {
            genus: Genus::DontCare,
            domain: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
struct LinkParams {
    square_bracket_params: String,
    scope: OnceLock<LinkScope>,
}

/// One unit of a parsed document
#[derive(Debug, Clone)]
pub struct Atom {
    atom_type: AtomType,
    strings: Vec<String>,
    link: Option<LinkParams>,
}

impl Atom {
    /// Create an atom with one string
    pub fn new(atom_type: AtomType, string: impl Into<String>) -> Self {
        Self {
            atom_type,
            strings: vec![string.into()],
            link: None,
        }
    }

    /// Create an atom with no payload
    pub fn bare(atom_type: AtomType) -> Self {
        Self::new(atom_type, String::new())
    }

    /// Create an atom with two strings; an empty second string is dropped
    pub fn with_two(atom_type: AtomType, p1: impl Into<String>, p2: impl Into<String>) -> Self {
        let mut atom = Self::new(atom_type, p1);
        let p2 = p2.into();
        if !p2.is_empty() {
            atom.strings.push(p2);
        }
        atom
    }

    /// Create a `Link` atom with its bracketed scope parameters
    pub fn link(target: impl Into<String>, square_bracket_params: impl Into<String>) -> Self {
        Self {
            atom_type: AtomType::Link,
            strings: vec![target.into()],
            link: Some(LinkParams {
                square_bracket_params: square_bracket_params.into(),
                scope: OnceLock::new(),
            }),
        }
    }

    pub fn atom_type(&self) -> AtomType {
        self.atom_type
    }

    /// First string
    pub fn string(&self) -> &str {
        self.strings.first().map(String::as_str).unwrap_or("")
    }

    /// String `i`, empty when absent
    pub fn string_at(&self, i: usize) -> &str {
        self.strings.get(i).map(String::as_str).unwrap_or("")
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Number of strings
    pub fn count(&self) -> usize {
        self.strings.len()
    }

    pub fn append_char(&mut self, ch: char) {
        self.first_mut().push(ch);
    }

    pub fn append_str(&mut self, s: &str) {
        self.first_mut().push_str(s);
    }

    /// Remove the last character of the first string
    pub fn chop(&mut self) {
        self.first_mut().pop();
    }

    pub fn set_string(&mut self, s: impl Into<String>) {
        *self.first_mut() = s.into();
    }

    /// Add one more string after the existing ones
    pub fn add_string(&mut self, s: impl Into<String>) {
        self.first_mut();
        self.strings.push(s.into());
    }

    fn first_mut(&mut self) -> &mut String {
        if self.strings.is_empty() {
            self.strings.push(String::new());
        }
        &mut self.strings[0]
    }

    pub fn is_link_atom(&self) -> bool {
        self.link.is_some()
    }

    /// Raw `[...]` parameters of a link atom
    pub fn square_bracket_params(&self) -> Option<&str> {
        self.link
            .as_ref()
            .map(|l| l.square_bracket_params.as_str())
    }

    /// Interpret the bracket parameters, once.
    ///
    /// Each space-separated word is first tried as a module name through
    /// `find_tree` (until a domain is found), then as a genus (`qml`, `cpp`,
    /// `doc`, `api`). Anything else records the raw parameters as the error
    /// and stops. Atoms that are not links get the default scope.
    pub fn link_scope<F>(&self, find_tree: F) -> LinkScope
    where
        F: Fn(&str) -> Option<TreeId>,
    {
        let Some(link) = &self.link else {
            return LinkScope::default();
        };
        link.scope
            .get_or_init(|| {
                let mut scope = LinkScope::default();
                let lowered = link.square_bracket_params.to_lowercase();
                for param in lowered.split_whitespace() {
                    if scope.domain.is_none() {
                        if let Some(tree) = find_tree(param) {
                            scope.domain = Some(tree);
                            continue;
                        }
                    }
                    match param {
                        "qml" => scope.genus = Genus::Qml,
                        "cpp" => scope.genus = Genus::Cpp,
                        "doc" => scope.genus = Genus::Doc,
                        "api" => scope.genus = Genus::Api,
                        _ => {
                            scope.error = Some(link.square_bracket_params.clone());
                            break;
                        }
                    }
                }
                scope
            })
            .clone()
    }

    /// Check whether the scope has already been interpreted
    pub fn is_scope_resolved(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|l| l.scope.get().is_some())
    }
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.atom_type == other.atom_type
            && self.strings == other.strings
            && self.square_bracket_params() == other.square_bracket_params()
    }
}

impl Eq for Atom {}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.atom_type)?;
        for s in &self.strings {
            write!(f, " {:?}", s)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atom_strings() {
        let mut atom = Atom::new(AtomType::String, "Hell");
        atom.append_char('o');
        atom.append_str(" world!");
        atom.chop();
        assert_eq!(atom.string(), "Hello world");
        assert_eq!(atom.count(), 1);
        assert_eq!(atom.string_at(1), "");

        let pair = Atom::with_two(AtomType::ListLeft, LIST_NUMERIC, "");
        assert_eq!(pair.count(), 1);
        let pair = Atom::with_two(AtomType::TableLeft, "50%", "generic");
        assert_eq!(pair.string_at(1), "generic");
    }

    #[test]
    fn test_link_scope_genus_and_domain() {
        let atom = Atom::link("QObject", "QtCore qml");
        let scope = atom.link_scope(|name| (name == "qtcore").then_some(TreeId(3)));
        assert_eq!(scope.domain, Some(TreeId(3)));
        assert_eq!(scope.genus, Genus::Qml);
        assert_eq!(scope.error, None);
        assert!(atom.is_scope_resolved());
    }

    #[test]
    fn test_link_scope_error() {
        let atom = Atom::link("QObject", "QtCore bogus");
        let scope = atom.link_scope(|_| None);
        assert_eq!(scope.error.as_deref(), Some("QtCore bogus"));
        assert_eq!(scope.domain, None);
    }

    #[test]
    fn test_link_scope_resolved_once() {
        let atom = Atom::link("x", "mod");
        let first = atom.link_scope(|_| Some(TreeId(1)));
        let second = atom.link_scope(|_| Some(TreeId(2)));
        assert_eq!(first, second);
    }

    #[test]
    fn test_link_without_params() {
        let atom = Atom::link("QObject", "");
        assert_eq!(atom.link_scope(|_| None), LinkScope::default());
    }

    #[test]
    fn test_non_link_scope() {
        let atom = Atom::new(AtomType::String, "x");
        assert_eq!(atom.link_scope(|_| Some(TreeId(0))), LinkScope::default());
        assert!(!atom.is_link_atom());
    }

    #[test]
    fn test_display() {
        let atom = Atom::with_two(AtomType::ImageText, "a", "b");
        assert_eq!(atom.to_string(), "ImageText \"a\" \"b\"");
    }
}
