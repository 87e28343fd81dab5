//! Run configuration
//!
//! A `scribe.toml` file describes one documentation module: its identity
//! (written into the index root), the defines used by `\if`, the declared
//! dependency order, search directories for `\include` and quoting, and the
//! user macro table.
//!
//! ```toml
//! project = "QtGui"
//! url = "https://doc.example.org/qtgui"
//! dependencies = ["qtcore", "qtnetwork"]
//! defines = ["qt6", "doc.*"]
//!
//! [macros]
//! Qt = "\\e{Qt}"
//! bold = { default = "\\b{\\1}", formats = { html = "<b>\\1</b>" } }
//! ```

use crate::diagnostics::{ScribeError, ScribeResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_tab_size() -> usize {
    8
}

fn default_falsehoods() -> Vec<String> {
    vec!["0".to_string(), "false".to_string()]
}

/// Configuration of one documentation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScribeConfig {
    /// Module name, written as the index `project` attribute
    #[serde(default)]
    pub project: String,
    /// Base URL of the generated documentation
    #[serde(default)]
    pub url: String,
    /// Human title of the module
    #[serde(default)]
    pub title: String,
    /// Module version
    #[serde(default)]
    pub version: String,
    /// Title of the page that represents the whole module
    #[serde(default)]
    pub index_title: String,
    /// Column width of a tab stop
    #[serde(default = "default_tab_size")]
    pub tab_size: usize,
    /// Words never turned into auto-links
    #[serde(default)]
    pub ignore_words: Vec<String>,
    /// Emit quoting atoms for `\snippet` and friends
    #[serde(default)]
    pub quoting_information: bool,
    /// Regex patterns that count as defined in `\if` expressions
    #[serde(default)]
    pub defines: Vec<String>,
    /// Regex patterns of `\if` terms that count as false
    #[serde(default = "default_falsehoods")]
    pub falsehoods: Vec<String>,
    /// Declared module dependencies, in search order
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Directories searched for `\include` files
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    /// Directories searched for quoted example files
    #[serde(default)]
    pub example_paths: Vec<PathBuf>,
    /// Do not report unresolvable links
    #[serde(default)]
    pub no_link_errors: bool,
    /// User macros by name
    #[serde(default)]
    pub macros: IndexMap<String, MacroSpec>,
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            project: String::new(),
            url: String::new(),
            title: String::new(),
            version: String::new(),
            index_title: String::new(),
            tab_size: default_tab_size(),
            ignore_words: Vec::new(),
            quoting_information: false,
            defines: Vec::new(),
            falsehoods: default_falsehoods(),
            dependencies: Vec::new(),
            include_paths: Vec::new(),
            example_paths: Vec::new(),
            no_link_errors: false,
            macros: IndexMap::new(),
        }
    }
}

/// One macro definition as written in the configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MacroSpec {
    /// Only a default definition
    Simple(String),
    /// Default plus per-format variants and an optional match pattern
    Full {
        #[serde(default)]
        default: Option<String>,
        #[serde(default, rename = "match")]
        match_expr: Option<String>,
        #[serde(default)]
        formats: IndexMap<String, String>,
    },
}

impl ScribeConfig {
    /// Create a configuration for `project` with defaults everywhere else
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> ScribeResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a file
    pub fn load(path: &Path) -> ScribeResult<Self> {
        let content = fs::read_to_string(path)?;
        tracing::debug!("loading configuration from {}", path.display());
        Self::from_toml_str(&content).map_err(|e| match e {
            ScribeError::Toml(err) => {
                ScribeError::config(format!("{}: {}", path.display(), err))
            }
            other => other,
        })
    }

    /// Check values that deserialization cannot check
    pub fn validate(&self) -> ScribeResult<()> {
        if !(1..=8).contains(&self.tab_size) {
            return Err(ScribeError::config(format!(
                "tab-size must be between 1 and 8, got {}",
                self.tab_size
            )));
        }
        for (name, spec) in &self.macros {
            if name.is_empty() {
                return Err(ScribeError::config("macro with empty name"));
            }
            if let MacroSpec::Full {
                default: None,
                formats,
                ..
            } = spec
            {
                if formats.is_empty() {
                    return Err(ScribeError::config(format!(
                        "macro '{}' has no definition",
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Additional requirements for writing an index file
    pub fn validate_for_index(&self) -> ScribeResult<()> {
        self.validate()?;
        if self.project.trim().is_empty() {
            return Err(ScribeError::config("an index requires a project name"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ScribeConfig::from_toml_str("").unwrap();
        assert_eq!(config.tab_size, 8);
        assert!(config.macros.is_empty());
        assert!(!config.quoting_information);
    }

    #[test]
    fn test_full_config() {
        let config = ScribeConfig::from_toml_str(
            r#"
project = "QtGui"
index-title = "Qt GUI"
tab-size = 4
dependencies = ["qtcore", "qtnetwork"]
defines = ["qt6"]

[macros]
Qt = "\\e{Qt}"
bold = { default = "\\b{\\1}", formats = { html = "<b>\\1</b>" } }
"#,
        )
        .unwrap();

        assert_eq!(config.project, "QtGui");
        assert_eq!(config.index_title, "Qt GUI");
        assert_eq!(config.tab_size, 4);
        assert_eq!(config.dependencies, vec!["qtcore", "qtnetwork"]);
        assert_eq!(
            config.macros.get("Qt"),
            Some(&MacroSpec::Simple("\\e{Qt}".to_string()))
        );
        match config.macros.get("bold") {
            Some(MacroSpec::Full {
                default, formats, ..
            }) => {
                assert_eq!(default.as_deref(), Some("\\b{\\1}"));
                assert_eq!(formats.get("html").map(String::as_str), Some("<b>\\1</b>"));
            }
            other => panic!("unexpected macro spec: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_tab_size() {
        let err = ScribeConfig::from_toml_str("tab-size = 0").unwrap_err();
        assert!(matches!(err, ScribeError::Config(_)));
    }

    #[test]
    fn test_syntax_error() {
        let err = ScribeConfig::from_toml_str("project = ").unwrap_err();
        assert!(matches!(err, ScribeError::Toml(_)));
    }

    #[test]
    fn test_index_requires_project() {
        assert!(ScribeConfig::default().validate_for_index().is_err());
        assert!(ScribeConfig::new("qtcore").validate_for_index().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "project = \"qtcore\"\nversion = \"6.5\"").unwrap();
        let config = ScribeConfig::load(file.path()).unwrap();
        assert_eq!(config.project, "qtcore");
        assert_eq!(config.version, "6.5");
    }
}
