//! Parsed documentation comments
//!
//! A [`Doc`] is a cheap handle to a shared [`DocPrivate`]. Cloning a `Doc`
//! shares the parsed representation; the first mutation through
//! [`Doc::private_mut`] detaches the handle onto its own copy.

use crate::atom::AtomType;
use crate::location::Location;
use crate::text::Text;
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

/// Argument of a meta-command: the argument text and the optional
/// bracketed string written right after the command.
pub type ArgPair = (String, String);

/// A topic command found in a comment, such as `\class QString`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub topic: String,
    pub args: String,
}

impl Topic {
    pub fn new(topic: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            args: args.into(),
        }
    }
}

/// A `\target` or `\keyword` registered by a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorDef {
    /// Name as written
    pub name: String,
    /// Index of the `Target`/`Keyword` atom in the body
    pub atom: usize,
    /// Where the command appeared
    pub location: Location,
}

/// Category argument of `\compareswith`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComparisonCategory {
    Strong,
    Weak,
    Partial,
    Equality,
}

impl ComparisonCategory {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "strong" => Some(Self::Strong),
            "weak" => Some(Self::Weak),
            "partial" => Some(Self::Partial),
            "equality" => Some(Self::Equality),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Weak => "weak",
            Self::Partial => "partial",
            Self::Equality => "equality",
        }
    }
}

/// Everything the parser extracts from one comment
#[derive(Debug, Clone, Default)]
pub struct DocPrivate {
    pub start_loc: Location,
    pub end_loc: Location,
    pub source: String,
    pub text: Text,
    /// Names given to `\a`
    pub params: IndexSet<String>,
    /// One link text per `\sa` entry
    pub also_list: Vec<Text>,
    pub enum_items: Vec<String>,
    pub omit_enum_items: Vec<String>,
    pub metacommands_used: IndexSet<String>,
    pub meta_command_map: IndexMap<String, Vec<ArgPair>>,
    pub topics: Vec<Topic>,
    pub has_legalese: bool,
    pub targets: Vec<AnchorDef>,
    pub keywords: Vec<AnchorDef>,
    /// Indices of `SectionLeft` atoms
    pub toc: Vec<usize>,
    pub toc_levels: Vec<u8>,
    /// `\meta` name/value pairs; one name may carry several values
    pub meta_map: IndexMap<String, Vec<String>>,
    pub compares_with: IndexMap<ComparisonCategory, Vec<Text>>,
}

impl DocPrivate {
    pub fn new(start_loc: Location, end_loc: Location, source: impl Into<String>) -> Self {
        Self {
            start_loc,
            end_loc,
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn add_also(&mut self, also: Text) {
        self.also_list.push(also);
    }
}

/// Handle to a parsed comment
#[derive(Debug, Clone, Default)]
pub struct Doc {
    inner: Option<Arc<DocPrivate>>,
}

lazy_static::lazy_static! {
    static ref EMPTY_TEXT: Text = Text::new();
    static ref UNKNOWN_LOCATION: Location = Location::unknown();
}

impl Doc {
    /// Wrap parser output
    pub fn from_private(private: DocPrivate) -> Self {
        Self {
            inner: Some(Arc::new(private)),
        }
    }

    /// Number of handles sharing the representation
    pub fn ref_count(&self) -> usize {
        self.inner.as_ref().map(Arc::strong_count).unwrap_or(0)
    }

    /// Check whether two handles share one representation
    pub fn shares_with(&self, other: &Doc) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn private(&self) -> Option<&DocPrivate> {
        self.inner.as_deref()
    }

    /// Mutable access, detaching from other handles first
    pub fn private_mut(&mut self) -> &mut DocPrivate {
        Arc::make_mut(self.inner.get_or_insert_with(Default::default))
    }

    pub fn location(&self) -> &Location {
        self.private()
            .map(|p| &p.start_loc)
            .unwrap_or(&UNKNOWN_LOCATION)
    }

    pub fn end_location(&self) -> &Location {
        self.private()
            .map(|p| &p.end_loc)
            .unwrap_or(&UNKNOWN_LOCATION)
    }

    pub fn source(&self) -> &str {
        self.private().map(|p| p.source.as_str()).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.source().is_empty()
    }

    pub fn body(&self) -> &Text {
        self.private().map(|p| &p.text).unwrap_or(&EMPTY_TEXT)
    }

    pub fn brief_text(&self, inclusive: bool) -> Text {
        self.body()
            .sub_text(AtomType::BriefLeft, AtomType::BriefRight, None, inclusive)
    }

    /// The brief reduced to what the entity is, e.g. "The QString class
    /// provides a Unicode string." becomes "Unicode string".
    pub fn trimmed_brief_text(&self, class_name: &str) -> Text {
        let brief = self.brief_text(false);
        if brief.is_empty() {
            return Text::new();
        }
        let class_name_only = class_name.rsplit("::").next().unwrap_or(class_name);
        let brief_str = brief.to_plain_string();
        let mut words: Vec<&str> = brief_str.split(' ').collect();

        fn drop_first_if(words: &mut Vec<&str>, pred: impl Fn(&str) -> bool) {
            if words.first().is_some_and(|w| pred(w)) {
                words.remove(0);
            }
        }

        if words.first() != Some(&"Returns") {
            drop_first_if(&mut words, |w| w == "The");
            drop_first_if(&mut words, |w| w == class_name || w == class_name_only);
            drop_first_if(&mut words, |w| {
                matches!(
                    w,
                    "class" | "function" | "macro" | "widget" | "namespace" | "header"
                )
            });
            drop_first_if(&mut words, |w| w == "is" || w == "provides");
            drop_first_if(&mut words, |w| w == "a" || w == "an");
        }

        let mut whats = words.join(" ");
        if whats.ends_with('.') {
            whats.pop();
        }
        let mut chars = whats.chars();
        let whats = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Text::from_string(&whats)
    }

    pub fn legalese_text(&self) -> Text {
        match self.private() {
            Some(p) if p.has_legalese => {
                self.body()
                    .sub_text(AtomType::LegaleseLeft, AtomType::LegaleseRight, None, false)
            }
            _ => Text::new(),
        }
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.private()
            .map(|p| p.params.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn enum_item_names(&self) -> &[String] {
        self.private().map(|p| p.enum_items.as_slice()).unwrap_or(&[])
    }

    pub fn omit_enum_item_names(&self) -> &[String] {
        self.private()
            .map(|p| p.omit_enum_items.as_slice())
            .unwrap_or(&[])
    }

    pub fn meta_commands_used(&self) -> Vec<&str> {
        self.private()
            .map(|p| p.metacommands_used.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    fn uses_meta_command(&self, name: &str) -> bool {
        self.private()
            .is_some_and(|p| p.metacommands_used.contains(name))
    }

    /// `\internal` was used
    pub fn is_internal(&self) -> bool {
        self.uses_meta_command("internal")
    }

    /// `\reimp` was used
    pub fn is_marked_reimp(&self) -> bool {
        self.uses_meta_command("reimp")
    }

    pub fn topics_used(&self) -> &[Topic] {
        self.private().map(|p| p.topics.as_slice()).unwrap_or(&[])
    }

    pub fn meta_command_args(&self, meta_command: &str) -> &[ArgPair] {
        self.private()
            .and_then(|p| p.meta_command_map.get(meta_command))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn also_list(&self) -> &[Text] {
        self.private().map(|p| p.also_list.as_slice()).unwrap_or(&[])
    }

    pub fn has_table_of_contents(&self) -> bool {
        self.private().is_some_and(|p| !p.toc.is_empty())
    }

    pub fn has_keywords(&self) -> bool {
        self.private().is_some_and(|p| !p.keywords.is_empty())
    }

    pub fn has_targets(&self) -> bool {
        self.private().is_some_and(|p| !p.targets.is_empty())
    }

    pub fn table_of_contents(&self) -> &[usize] {
        self.private().map(|p| p.toc.as_slice()).unwrap_or(&[])
    }

    pub fn table_of_contents_levels(&self) -> &[u8] {
        self.private().map(|p| p.toc_levels.as_slice()).unwrap_or(&[])
    }

    pub fn keywords(&self) -> &[AnchorDef] {
        self.private().map(|p| p.keywords.as_slice()).unwrap_or(&[])
    }

    pub fn targets(&self) -> &[AnchorDef] {
        self.private().map(|p| p.targets.as_slice()).unwrap_or(&[])
    }

    pub fn meta_tag_map(&self) -> Option<&IndexMap<String, Vec<String>>> {
        self.private().map(|p| &p.meta_map)
    }

    pub fn compares_with_map(&self) -> Option<&IndexMap<ComparisonCategory, Vec<Text>>> {
        self.private().map(|p| &p.compares_with)
    }

    /// Strip the `/*!` ... `*/` frame and the leading asterisk column of a
    /// C-style comment, moving `location` past the opening delimiter.
    ///
    /// `location` must point at the `/` of `/*!`. The asterisk column is
    /// only blanked out when every line carries one.
    pub fn trim_c_style_comment(location: &mut Location, text: &str, tab_size: usize) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut cleaned = String::with_capacity(text.len());
        let mut m = location.clone();
        let mut met_aster_column = true;
        let aster_column = location.col + 1;
        let mut cleaned_len = 0;

        for &ch in &chars {
            if m.col == aster_column {
                if ch != '*' {
                    break;
                }
                cleaned.push(' ');
                met_aster_column = true;
            } else {
                if ch == '\n' {
                    if !met_aster_column {
                        break;
                    }
                    met_aster_column = false;
                }
                cleaned.push(ch);
            }
            cleaned_len += 1;
            m.advance(ch, tab_size);
        }

        let source: Vec<char> = if cleaned_len == chars.len() {
            cleaned.chars().collect()
        } else {
            chars
        };

        for &ch in source.iter().take(3) {
            location.advance(ch, tab_size);
        }
        if source.len() < 5 {
            return String::new();
        }
        source[3..source.len() - 2].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use pretty_assertions::assert_eq;

    fn doc_with_brief(brief: &str) -> Doc {
        let mut private = DocPrivate::new(Location::start_of("a.cpp"), Location::unknown(), "x");
        private
            .text
            .push_type(AtomType::BriefLeft)
            .push_str(brief)
            .push_type(AtomType::BriefRight);
        Doc::from_private(private)
    }

    #[test]
    fn test_empty_doc() {
        let doc = Doc::default();
        assert!(doc.is_empty());
        assert!(doc.body().is_empty());
        assert!(doc.location().is_unknown());
        assert_eq!(doc.ref_count(), 0);
        assert!(doc.meta_command_args("since").is_empty());
    }

    #[test]
    fn test_copy_on_write() {
        let original = doc_with_brief("The QString class provides a Unicode string.");
        let mut copy = original.clone();
        assert!(copy.shares_with(&original));
        assert_eq!(original.ref_count(), 2);

        copy.private_mut().text.push_str("extra");
        assert!(!copy.shares_with(&original));
        assert_eq!(original.ref_count(), 1);
        assert_eq!(original.body().len(), 3);
        assert_eq!(copy.body().len(), 4);
    }

    #[test]
    fn test_trimmed_brief_text() {
        let doc = doc_with_brief("The QString class provides a Unicode string.");
        assert_eq!(doc.trimmed_brief_text("QString").to_plain_string(), "Unicode string");

        let doc = doc_with_brief("Returns the length.");
        assert_eq!(doc.trimmed_brief_text("QString").to_plain_string(), "Returns the length");

        let doc = doc_with_brief("The Qt::Key enum is an index.");
        assert_eq!(doc.trimmed_brief_text("Qt::Key").to_plain_string(), "Enum is an index");
    }

    #[test]
    fn test_legalese_requires_flag() {
        let mut private = DocPrivate::default();
        private
            .text
            .push_type(AtomType::LegaleseLeft)
            .push(Atom::new(AtomType::String, "GPL"))
            .push_type(AtomType::LegaleseRight);
        let mut doc = Doc::from_private(private);
        assert!(doc.legalese_text().is_empty());
        doc.private_mut().has_legalese = true;
        assert_eq!(doc.legalese_text().to_plain_string(), "GPL");
    }

    #[test]
    fn test_meta_commands() {
        let mut doc = Doc::default();
        doc.private_mut().metacommands_used.insert("internal".into());
        doc.private_mut()
            .meta_command_map
            .entry("since".into())
            .or_default()
            .push(("6.5".into(), String::new()));
        assert!(doc.is_internal());
        assert!(!doc.is_marked_reimp());
        assert_eq!(doc.meta_command_args("since")[0].0, "6.5");
    }

    #[test]
    fn test_comparison_category() {
        assert_eq!(ComparisonCategory::from_name("weak"), Some(ComparisonCategory::Weak));
        assert_eq!(ComparisonCategory::from_name("total"), None);
        assert_eq!(ComparisonCategory::Equality.name(), "equality");
    }

    #[test]
    fn test_trim_c_style_comment() {
        let mut loc = Location::new("a.cpp", 1, 1);
        let trimmed = Doc::trim_c_style_comment(&mut loc, "/*!\n * Hello\n */", 8);
        assert_eq!(trimmed, "\n   Hello\n ");
        assert_eq!(loc.col, 4);

        // misaligned asterisks leave the text as written
        let mut loc = Location::new("a.cpp", 1, 1);
        let trimmed = Doc::trim_c_style_comment(&mut loc, "/*!\n  Hello\n */", 8);
        assert_eq!(trimmed, "\n  Hello\n ");
    }
}
