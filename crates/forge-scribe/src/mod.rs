//! forge-scribe: Documentation-comment compiler for Forge
//!
//! This crate turns documentation comments written in a backslash-command
//! markup into structured documents and resolves the links between them:
//! - Parsing comment text into atom sequences plus side tables (targets,
//!   keywords, table of contents, meta-commands, "see also" lists)
//! - Expanding user macros and evaluating `\if` conditions from the config
//! - Attaching docs to a tree of documented entities per module
//! - Joining module trees in a forest and resolving links, base classes,
//!   namespaces and proxies across them
//! - Reading and writing the index files that let one module link into
//!   another without re-parsing its sources
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────┐
//! │ doc comments    │    │ dependency index │
//! │ (DocParser)     │    │ (IndexReader)    │
//! └────────┬────────┘    └────────┬─────────┘
//!          │                      │
//!          ▼                      ▼
//!   ┌─────────────┐        ┌─────────────┐
//!   │ primary Tree│        │ index Trees │
//!   └──────┬──────┘        └──────┬──────┘
//!          └──────────┬───────────┘
//!                     ▼
//!              ┌──────────────┐
//!              │    Forest    │  search order, link resolution
//!              └──────┬───────┘
//!                     │
//!          ┌──────────┴──────────┐
//!          ▼                     ▼
//!    ┌──────────┐         ┌─────────────┐
//!    │ renderers│         │ IndexWriter │
//!    └──────────┘         └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use forge_scribe::{Location, ScribeConfig, Session};
//! use std::path::Path;
//!
//! let config = ScribeConfig::load(Path::new("scribe.toml")).expect("config");
//! let mut session = Session::new(config).expect("session");
//! session.read_index(Path::new("qtcore.index")).expect("index");
//! let doc = session
//!     .parse_doc("\\brief Widgets for everyone.", Location::start_of("widgets.qdoc"))
//!     .expect("doc");
//! assert!(!doc.is_empty());
//! session.resolve().expect("resolve");
//! session.write_index(Path::new("qtgui.index")).expect("write");
//! ```

// Core types
pub mod atom;
pub mod doc;
pub mod location;
pub mod text;

// Diagnostics and configuration
pub mod config;
pub mod diagnostics;
pub mod printer;

// Parsing
pub mod docparser;

// Symbol database
pub mod forest;
pub mod node;
pub mod tree;
pub mod visibility;

// Interchange and orchestration
pub mod index;
pub mod session;

pub mod test;
pub mod utils;

// Re-exports for convenience
pub use atom::{Atom, AtomType, LinkScope};
pub use config::{MacroSpec, ScribeConfig};
pub use diagnostics::{
    Diagnostic, DiagnosticSink, DiagnosticsCollector, ScribeError, ScribeResult, Severity,
};
pub use doc::{AnchorDef, ArgPair, ComparisonCategory, Doc, DocPrivate, Topic};
pub use location::Location;
pub use text::Text;

pub use docparser::{Condition, DocParser, MacroTable};

pub use forest::Forest;
pub use node::{
    ClassFlavor, CollectionKind, FindFlags, FunctionData, Genus, Node, NodeId, NodeKind, NodeRef,
    TreeId,
};
pub use tree::{NodeStore, TargetMatch, TargetRec, TargetType, Tree};
pub use visibility::{Access, Status};

pub use index::{IndexMeta, IndexReader, IndexWriter};
pub use session::Session;

// Terminal output
pub use printer::DiagnosticPrinter;

pub use utils::{canonical_title, edit_distance, nearest_name, simplified};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
