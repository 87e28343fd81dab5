//! Evaluation of `\if` conditions
//!
//! A condition combines terms with `!`, `&&`, `||` and parentheses. A
//! `defined(NAME)` term holds when `NAME` matches one of the configured
//! defines; any other term holds unless it is one of the falsehoods.

use crate::diagnostics::{ScribeError, ScribeResult};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DEFINED: Regex = Regex::new(r"^defined ?\(?([A-Z_0-9a-z]+) ?\)?$").unwrap();
    static ref QDOC_ONLY: Regex = Regex::new(r"^(?:qdoc)$").unwrap();
}

/// Symbols an `\if` condition is evaluated against
#[derive(Debug, Clone)]
pub struct Condition {
    defines: Regex,
    falsehoods: Option<Regex>,
}

impl Default for Condition {
    fn default() -> Self {
        Self {
            defines: QDOC_ONLY.clone(),
            falsehoods: None,
        }
    }
}

impl Condition {
    /// Build from the configured define patterns; `qdoc` is always
    /// defined.
    pub fn new(defines: &[String], falsehoods: &[String]) -> ScribeResult<Self> {
        let mut all = defines.to_vec();
        all.push("qdoc".to_string());
        let falsehoods = if falsehoods.is_empty() {
            None
        } else {
            Some(anchored(falsehoods)?)
        };
        Ok(Self {
            defines: anchored(&all)?,
            falsehoods,
        })
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defines.is_match(name)
    }

    /// Evaluate `condition`; an empty condition holds
    pub fn is_true(&self, condition: &str) -> bool {
        let chars: Vec<char> = condition.chars().collect();
        let mut first_or = None;
        let mut first_and = None;
        let mut depth = 0i32;
        for i in 0..chars.len().saturating_sub(1) {
            let ch = chars[i];
            match ch {
                '(' => depth += 1,
                ')' => depth -= 1,
                '|' | '&' if depth == 0 && chars[i + 1] == ch => {
                    if ch == '|' {
                        first_or = Some(i);
                        break;
                    }
                    first_and.get_or_insert(i);
                }
                _ => {}
            }
        }
        let split = |at: usize| {
            let left: String = chars[..at].iter().collect();
            let right: String = chars[at + 2..].iter().collect();
            (left, right)
        };
        if let Some(at) = first_or {
            let (left, right) = split(at);
            return self.is_true(&left) || self.is_true(&right);
        }
        if let Some(at) = first_and {
            let (left, right) = split(at);
            return self.is_true(&left) && self.is_true(&right);
        }

        let term = crate::utils::simplified(condition);
        if term.is_empty() {
            return true;
        }
        if let Some(rest) = term.strip_prefix('!') {
            return !self.is_true(rest);
        }
        if term.starts_with('(') && term.ends_with(')') && term.len() >= 2 {
            return self.is_true(&term[1..term.len() - 1]);
        }
        if let Some(caps) = DEFINED.captures(&term) {
            return self.is_defined(&caps[1]);
        }
        !self.falsehoods.as_ref().is_some_and(|f| f.is_match(&term))
    }
}

fn anchored(patterns: &[String]) -> ScribeResult<Regex> {
    let joined = format!("^(?:{})$", patterns.join("|"));
    Regex::new(&joined).map_err(|e| ScribeError::config(format!("Invalid define pattern: {}", e)))
}
