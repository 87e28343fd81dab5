//! Numbering state of an open `\list`

use crate::atom::{
    LIST_BULLET, LIST_LOWERALPHA, LIST_LOWERROMAN, LIST_NUMERIC, LIST_TAG, LIST_UPPERALPHA,
    LIST_UPPERROMAN, LIST_VALUE,
};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref HINT: Regex = Regex::new(r"^(\W*)([0-9]+|[A-Z]+|[a-z]+)(\W*)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Bullet,
    Tag,
    Value,
    Numeric,
    UpperAlpha,
    LowerAlpha,
    UpperRoman,
    LowerRoman,
}

impl ListStyle {
    pub fn name(&self) -> &'static str {
        match self {
            ListStyle::Bullet => LIST_BULLET,
            ListStyle::Tag => LIST_TAG,
            ListStyle::Value => LIST_VALUE,
            ListStyle::Numeric => LIST_NUMERIC,
            ListStyle::UpperAlpha => LIST_UPPERALPHA,
            ListStyle::LowerAlpha => LIST_LOWERALPHA,
            ListStyle::UpperRoman => LIST_UPPERROMAN,
            ListStyle::LowerRoman => LIST_LOWERROMAN,
        }
    }
}

/// A list being parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedList {
    style: ListStyle,
    initial: i64,
    next: i64,
    prefix: String,
    suffix: String,
}

impl OpenedList {
    pub fn new(style: ListStyle) -> Self {
        Self {
            style,
            initial: 1,
            next: 0,
            prefix: String::new(),
            suffix: String::new(),
        }
    }

    /// Interpret the argument of `\list`: empty for bullets, otherwise the
    /// first item's number written as `1`, `a`, `A`, `i` or `I`, optionally
    /// wrapped in punctuation such as `(a)`.
    ///
    /// Returns `None` for a hint that cannot be understood.
    pub fn from_hint(hint: &str) -> Option<Self> {
        if hint.is_empty() {
            return Some(Self::new(ListStyle::Bullet));
        }
        let caps = HINT.captures(hint)?;
        let body = &caps[2];
        let lower = hint == hint.to_lowercase();
        let (style, initial) = if let Ok(n) = body.parse::<i64>() {
            (ListStyle::Numeric, n)
        } else {
            match from_roman(body) {
                Some(n) if n != 100 && n != 500 => {
                    let style = if lower { ListStyle::LowerRoman } else { ListStyle::UpperRoman };
                    (style, n)
                }
                _ => {
                    let style = if lower { ListStyle::LowerAlpha } else { ListStyle::UpperAlpha };
                    (style, from_alpha(body))
                }
            }
        };
        Some(Self {
            style,
            initial,
            next: initial - 1,
            prefix: caps[1].to_string(),
            suffix: caps[3].to_string(),
        })
    }

    pub fn style(&self) -> ListStyle {
        self.style
    }

    pub fn style_string(&self) -> &'static str {
        self.style.name()
    }

    /// Whether an item has been started
    pub fn is_started(&self) -> bool {
        self.next >= self.initial
    }

    /// Move to the next item
    pub fn next(&mut self) {
        self.next += 1;
    }

    /// Number of the current item
    pub fn number(&self) -> i64 {
        self.next
    }

    pub fn number_string(&self) -> String {
        self.next.to_string()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

fn from_alpha(s: &str) -> i64 {
    let mut n: i64 = 0;
    for c in s.chars() {
        let c = c.to_ascii_lowercase();
        if !c.is_ascii_lowercase() {
            return 0;
        }
        n = n.saturating_mul(26).saturating_add(c as i64 - 'a' as i64 + 1);
    }
    n
}

fn from_roman(s: &str) -> Option<i64> {
    let mut total = 0;
    let mut max_seen = 0;
    for c in s.chars().rev() {
        let v = match c.to_ascii_lowercase() {
            'i' => 1,
            'v' => 5,
            'x' => 10,
            'l' => 50,
            'c' => 100,
            'd' => 500,
            'm' => 1000,
            _ => return None,
        };
        if v < max_seen {
            total -= v;
        } else {
            total += v;
            max_seen = v;
        }
    }
    (total > 0).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hints() {
        let bullet = OpenedList::from_hint("").unwrap();
        assert_eq!(bullet.style(), ListStyle::Bullet);
        assert!(!bullet.is_started());

        let numeric = OpenedList::from_hint("3").unwrap();
        assert_eq!(numeric.style(), ListStyle::Numeric);
        assert_eq!(numeric.number(), 2);

        assert_eq!(OpenedList::from_hint("a").unwrap().style(), ListStyle::LowerAlpha);
        assert_eq!(OpenedList::from_hint("A").unwrap().style(), ListStyle::UpperAlpha);
        assert_eq!(OpenedList::from_hint("iv").unwrap().style(), ListStyle::LowerRoman);
        assert_eq!(OpenedList::from_hint("I").unwrap().style(), ListStyle::UpperRoman);
        // c and d are letters first
        assert_eq!(OpenedList::from_hint("c").unwrap().style(), ListStyle::LowerAlpha);

        let wrapped = OpenedList::from_hint("(a)").unwrap();
        assert_eq!(wrapped.prefix(), "(");
        assert_eq!(wrapped.suffix(), ")");

        assert!(OpenedList::from_hint("a1!").is_none());
    }

    #[test]
    fn test_numbering() {
        let mut list = OpenedList::from_hint("1").unwrap();
        list.next();
        assert!(list.is_started());
        assert_eq!(list.number_string(), "1");
        list.next();
        assert_eq!(list.number_string(), "2");
        assert_eq!(list.style_string(), "numeric");
    }

    #[test]
    fn test_roman() {
        assert_eq!(from_roman("xiv"), Some(14));
        assert_eq!(from_roman("bullet"), None);
        assert_eq!(from_alpha("ab"), 28);
    }
}
