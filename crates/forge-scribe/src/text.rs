//! Text, an ordered sequence of atoms
//!
//! Atoms are stored in a vector and addressed by index, so "the atom after
//! `i`" is `i + 1` and a sub-range is a slice copy.

use crate::atom::{Atom, AtomType, FORMATTING_LINK};
use std::cmp::Ordering;
use std::fmt::Write as _;

#[derive(Debug, Clone, Default)]
pub struct Text {
    atoms: Vec<Atom>,
}

impl Text {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text holding a single `String` atom
    pub fn from_string(s: &str) -> Self {
        let mut text = Self::new();
        text.push_str(s);
        text
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn get(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(index)
    }

    pub fn first_atom(&self) -> Option<&Atom> {
        self.atoms.first()
    }

    pub fn last_atom(&self) -> Option<&Atom> {
        self.atoms.last()
    }

    pub fn last_atom_mut(&mut self) -> Option<&mut Atom> {
        self.atoms.last_mut()
    }

    /// Index of the last atom
    pub fn last_index(&self) -> Option<usize> {
        self.atoms.len().checked_sub(1)
    }

    /// Type of the last atom, `Nop` for an empty text
    pub fn last_type(&self) -> AtomType {
        self.atoms
            .last()
            .map(Atom::atom_type)
            .unwrap_or(AtomType::Nop)
    }

    /// Append one atom
    pub fn push(&mut self, atom: Atom) -> &mut Self {
        self.atoms.push(atom);
        self
    }

    /// Append an atom without payload
    pub fn push_type(&mut self, atom_type: AtomType) -> &mut Self {
        self.push(Atom::bare(atom_type))
    }

    /// Append a `String` atom; empty strings are ignored
    pub fn push_str(&mut self, s: &str) -> &mut Self {
        if !s.is_empty() {
            self.push(Atom::new(AtomType::String, s));
        }
        self
    }

    /// Splice a copy of every atom of `other` onto the end
    pub fn append_text(&mut self, other: &Text) -> &mut Self {
        self.atoms.extend(other.atoms.iter().cloned());
        self
    }

    pub fn strip_first(&mut self) {
        if !self.atoms.is_empty() {
            self.atoms.remove(0);
        }
    }

    pub fn strip_last(&mut self) {
        self.atoms.pop();
    }

    pub fn clear(&mut self) {
        self.atoms.clear();
    }

    /// Cut the text at the first atom of type `atom_type`, returning that
    /// atom and everything after it. Empty when there is no such atom.
    pub fn split_at_first(&mut self, atom_type: AtomType) -> Text {
        match self.find_from(0, atom_type) {
            Some(at) => Text {
                atoms: self.atoms.split_off(at),
            },
            None => Text::new(),
        }
    }

    /// Index of the atom right after `index` when it has type `atom_type`
    pub fn next_of_type(&self, index: usize, atom_type: AtomType) -> Option<usize> {
        self.atoms
            .get(index + 1)
            .filter(|a| a.atom_type() == atom_type)
            .map(|_| index + 1)
    }

    /// Concatenation of the visible strings (`String`, `AutoLink`, `C`)
    pub fn to_plain_string(&self) -> String {
        self.atoms
            .iter()
            .filter(|a| a.atom_type().is_textual())
            .map(Atom::string)
            .collect()
    }

    /// Case-insensitive substring search over the visible strings
    pub fn contains(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.atoms
            .iter()
            .filter(|a| a.atom_type().is_textual())
            .any(|a| a.string().to_lowercase().contains(&needle))
    }

    /// Copy of the atoms in `begin..end`
    pub fn sub_range(&self, begin: usize, end: usize) -> Text {
        let end = end.min(self.atoms.len());
        if begin >= end {
            return Text::new();
        }
        Text {
            atoms: self.atoms[begin..end].to_vec(),
        }
    }

    /// Extract the atoms between the first `left` at or after `from` and
    /// the following `right`.
    ///
    /// With `inclusive` the bounding atoms are part of the result. When no
    /// matching `right` follows, the result is empty.
    pub fn sub_text(
        &self,
        left: AtomType,
        right: AtomType,
        from: Option<usize>,
        inclusive: bool,
    ) -> Text {
        let start = from.unwrap_or(0);
        let Some(left_at) = self.find_from(start, left) else {
            return Text::new();
        };
        let begin = if inclusive { left_at } else { left_at + 1 };
        let Some(right_at) = self.find_from(begin, right) else {
            return Text::new();
        };
        let end = if inclusive { right_at + 1 } else { right_at };
        self.sub_range(begin, end)
    }

    /// Heading of the section opened at `section_left`
    pub fn section_heading(&self, section_left: usize) -> Text {
        let Some(heading_left) = self.find_from(section_left, AtomType::SectionHeadingLeft) else {
            return Text::new();
        };
        match self.find_from(heading_left + 1, AtomType::SectionHeadingRight) {
            Some(heading_right) => self.sub_range(heading_left + 1, heading_right),
            None => Text::new(),
        }
    }

    /// Visible text of the link atom at `link`.
    ///
    /// When the link is followed by a `link` formatting span, the span's
    /// strings are the text; otherwise the target itself is.
    pub fn link_text(&self, link: usize) -> String {
        let Some(atom) = self.atoms.get(link) else {
            return String::new();
        };
        match self.atoms.get(link + 1) {
            Some(next) if next.string() == FORMATTING_LINK => self.atoms[link + 2..]
                .iter()
                .take_while(|a| a.atom_type() != AtomType::FormattingRight)
                .map(Atom::string)
                .collect(),
            _ => atom.string().to_string(),
        }
    }

    fn find_from(&self, start: usize, atom_type: AtomType) -> Option<usize> {
        self.atoms
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, a)| a.atom_type() == atom_type)
            .map(|(i, _)| i)
    }

    /// One line per atom: the type name padded to 15 columns, then the
    /// escaped first string in quotes when it is not empty.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for atom in &self.atoms {
            let mut escaped = String::new();
            for ch in atom.string().chars() {
                match ch {
                    '\\' => escaped.push_str("\\\\"),
                    '"' => escaped.push_str("\\\""),
                    '\n' => escaped.push_str("\\n"),
                    ' '..='~' => escaped.push(ch),
                    _ => escaped.push('?'),
                }
            }
            let _ = write!(out, "    {:<15}", atom.atom_type().name());
            if !escaped.is_empty() {
                let _ = write!(out, " \"{}\"", escaped);
            }
            out.push('\n');
        }
        out
    }

    /// Lexicographic comparison over `(type, first string)` pairs, the
    /// shorter text ordering first when one is a prefix of the other.
    pub fn compare(&self, other: &Text) -> Ordering {
        for (a, b) in self.atoms.iter().zip(other.atoms.iter()) {
            let ord = a
                .atom_type()
                .cmp(&b.atom_type())
                .then_with(|| a.string().cmp(b.string()));
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.atoms.len().cmp(&other.atoms.len())
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Text {}

impl PartialOrd for Text {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Text {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl From<Vec<Atom>> for Text {
    fn from(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }
}

impl<'a> IntoIterator for &'a Text {
    type Item = &'a Atom;
    type IntoIter = std::slice::Iter<'a, Atom>;

    fn into_iter(self) -> Self::IntoIter {
        self.atoms.iter()
    }
}
