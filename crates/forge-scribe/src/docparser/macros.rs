//! User-defined macros
//!
//! A macro has a default definition written in markup, which is expanded
//! in place and re-scanned, and optionally one raw definition per output
//! format, which is emitted inside `FormatIf` blocks. `\1` to `\9` in a
//! definition are replaced by the arguments of the call. An optional
//! `match` pattern filters the expanded default definition down to the
//! concatenation of its matches.

use crate::config::MacroSpec;
use crate::diagnostics::{Diagnostic, DiagnosticSink, ScribeError, ScribeResult};
use indexmap::IndexMap;
use regex::Regex;

/// One piece of an expanded format definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroSegment {
    /// Definition text, emitted as a raw string
    Raw(String),
    /// A call argument, emitted as ordinary text
    Arg(String),
}

/// A macro ready for expansion
#[derive(Debug, Clone)]
pub struct Macro {
    /// Default definition with parameters encoded as `\u{1}`..`\u{9}`
    pub default_def: Option<String>,
    /// Format name to raw definition, parameters encoded the same way
    pub formats: IndexMap<String, String>,
    pub match_expr: Option<Regex>,
    /// Highest parameter number used by any definition
    pub num_params: usize,
}

impl Macro {
    /// Build a macro from its configuration entry. A second value names
    /// the problem when definitions disagree on the parameter count.
    pub fn from_spec(name: &str, spec: &MacroSpec) -> ScribeResult<(Macro, Option<String>)> {
        let (default_def, match_expr, formats) = match spec {
            MacroSpec::Simple(def) => (Some(def.clone()), None, IndexMap::new()),
            MacroSpec::Full {
                default,
                match_expr,
                formats,
            } => (default.clone(), match_expr.clone(), formats.clone()),
        };

        let mut counts: Vec<(String, usize)> = Vec::new();
        if let Some(def) = &default_def {
            counts.push(("default".to_string(), count_params(def)));
        }
        for (format, def) in &formats {
            counts.push((format.clone(), count_params(def)));
        }
        let num_params = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
        let problem = counts
            .iter()
            .find(|(_, n)| *n != counts[0].1)
            .map(|(format, n)| {
                format!(
                    "Macro '\\{}' takes inconsistent number of arguments ({} {}, {} {})",
                    name, counts[0].0, counts[0].1, format, n
                )
            });

        let match_expr = match match_expr {
            Some(expr) if !expr.is_empty() => Some(Regex::new(&expr).map_err(|e| {
                ScribeError::config(format!("macro '{}' has an invalid match pattern: {}", name, e))
            })?),
            _ => None,
        };

        let macro_def = Macro {
            default_def: default_def.map(|d| encode_params(&d)),
            formats: formats
                .into_iter()
                .map(|(format, def)| (format, encode_params(&def)))
                .collect(),
            match_expr,
            num_params,
        };
        Ok((macro_def, problem))
    }

    pub fn has_default(&self) -> bool {
        self.default_def.as_deref().is_some_and(|d| !d.is_empty())
    }

    /// The default definition with `args` substituted and the match
    /// pattern applied
    pub fn expand_default(&self, args: &[String]) -> String {
        let raw = substitute(self.default_def.as_deref().unwrap_or_default(), args);
        let Some(re) = &self.match_expr else {
            return raw;
        };
        let first_group = if re.captures_len() > 1 { 1 } else { 0 };
        let mut result = String::new();
        for caps in re.captures_iter(&raw) {
            for group in first_group..caps.len() {
                if let Some(m) = caps.get(group) {
                    result.push_str(m.as_str());
                }
            }
        }
        result
    }

    /// Split a format definition into raw text and arguments
    pub fn segments(def: &str, args: &[String]) -> Vec<MacroSegment> {
        if args.is_empty() {
            return vec![MacroSegment::Raw(def.to_string())];
        }
        let mut segments = Vec::new();
        let mut raw = String::new();
        for ch in def.chars() {
            match param_number(ch).filter(|&n| n <= args.len()) {
                Some(n) => {
                    if !raw.is_empty() {
                        segments.push(MacroSegment::Raw(std::mem::take(&mut raw)));
                    }
                    segments.push(MacroSegment::Arg(args[n - 1].clone()));
                }
                None => raw.push(ch),
            }
        }
        if !raw.is_empty() {
            segments.push(MacroSegment::Raw(raw));
        }
        segments
    }
}

/// All macros of a run
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: IndexMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from the `[macros]` configuration section
    pub fn from_config(
        specs: &IndexMap<String, MacroSpec>,
        sink: &mut dyn DiagnosticSink,
    ) -> ScribeResult<Self> {
        let mut table = Self::new();
        for (name, spec) in specs {
            let (macro_def, problem) = Macro::from_spec(name, spec)?;
            if let Some(problem) = problem {
                sink.report(Diagnostic::warning(problem));
            }
            table.insert(name.clone(), macro_def);
        }
        tracing::debug!(macros = table.len(), "macro table built");
        Ok(table)
    }

    pub fn insert(&mut self, name: impl Into<String>, macro_def: Macro) {
        self.macros.insert(name.into(), macro_def);
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

fn param_number(ch: char) -> Option<usize> {
    let n = ch as usize;
    (1..=9).contains(&n).then_some(n)
}

/// Replace `\1`..`\9` with the control characters standing for them
fn encode_params(def: &str) -> String {
    let mut out = String::with_capacity(def.len());
    let mut chars = def.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(d) = chars.peek().and_then(|c| c.to_digit(10)).filter(|d| (1..=9).contains(d)) {
                chars.next();
                out.push(char::from(d as u8));
                continue;
            }
        }
        out.push(ch);
    }
    out
}

/// Highest `\N` used in a definition
fn count_params(def: &str) -> usize {
    encode_params(def)
        .chars()
        .filter_map(param_number)
        .max()
        .unwrap_or(0)
}

fn substitute(def: &str, args: &[String]) -> String {
    def.chars()
        .map(|ch| match param_number(ch).filter(|&n| n <= args.len()) {
            Some(n) => args[n - 1].clone(),
            None => ch.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticsCollector;
    use pretty_assertions::assert_eq;

    fn full(default: Option<&str>, formats: &[(&str, &str)], match_expr: Option<&str>) -> MacroSpec {
        MacroSpec::Full {
            default: default.map(str::to_string),
            match_expr: match_expr.map(str::to_string),
            formats: formats.iter().map(|(f, d)| (f.to_string(), d.to_string())).collect(),
        }
    }

    #[test]
    fn test_param_count() {
        let (m, problem) = Macro::from_spec("pair", &MacroSpec::Simple("\\1 and \\2".into())).unwrap();
        assert_eq!(m.num_params, 2);
        assert!(problem.is_none());
        assert_eq!(m.expand_default(&["a".into(), "b".into()]), "a and b");
    }

    #[test]
    fn test_inconsistent_counts() {
        let spec = full(Some("\\b{\\1}"), &[("html", "<b>\\1</b> \\2")], None);
        let mut specs = IndexMap::new();
        specs.insert("bolded".to_string(), spec);
        let mut sink = DiagnosticsCollector::new();
        let table = MacroTable::from_config(&specs, &mut sink).unwrap();
        assert_eq!(table.get("bolded").unwrap().num_params, 2);
        assert_eq!(sink.warning_count(), 1);
        assert!(sink.warnings()[0].contains("inconsistent number of arguments"));
    }

    #[test]
    fn test_match_expression() {
        let spec = full(Some("\\1"), &[], Some("[a-z]+"));
        let (m, _) = Macro::from_spec("lower", &spec).unwrap();
        assert_eq!(m.expand_default(&["AbcDef".into()]), "bcef");

        let spec = full(Some("\\1"), &[], Some("v([0-9])"));
        let (m, _) = Macro::from_spec("version", &spec).unwrap();
        assert_eq!(m.expand_default(&["v1.v2".into()]), "12");
    }

    #[test]
    fn test_segments() {
        let (m, _) = Macro::from_spec("link", &full(None, &[("html", "<a href=\"\\1\">\\2</a>")], None)).unwrap();
        let def = &m.formats["html"];
        assert_eq!(
            Macro::segments(def, &["x.html".into(), "X".into()]),
            vec![
                MacroSegment::Raw("<a href=\"".into()),
                MacroSegment::Arg("x.html".into()),
                MacroSegment::Raw("\">".into()),
                MacroSegment::Arg("X".into()),
                MacroSegment::Raw("</a>".into()),
            ]
        );
        assert!(!m.has_default());
    }

    #[test]
    fn test_invalid_match() {
        assert!(Macro::from_spec("bad", &full(Some("x"), &[], Some("("))).is_err());
    }
}
