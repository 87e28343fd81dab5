//! Session - the context of one documentation run
//!
//! A [`Session`] owns everything a run shares between comments: the
//! configuration, the macro table, the `\if` condition, the forest and the
//! diagnostics. Two sessions never share state, so independent runs can
//! live side by side in one process.

use crate::atom::Atom;
use crate::config::ScribeConfig;
use crate::diagnostics::{Diagnostic, DiagnosticsCollector, ScribeResult};
use crate::doc::Doc;
use crate::docparser::{Condition, DocParser, MacroTable};
use crate::forest::Forest;
use crate::index::{IndexMeta, IndexReader, IndexWriter};
use crate::location::Location;
use crate::node::{Genus, Node, NodeId, NodeRef, Status, TreeId};
use crate::tree::{NodeStore, TargetMatch, TargetType, Tree};
use std::collections::HashSet;
use std::path::Path;

/// Commands that introduce the entity a comment documents
pub const TOPIC_COMMANDS: &[&str] = &[
    "class",
    "enum",
    "example",
    "externalpage",
    "fn",
    "group",
    "headerfile",
    "macro",
    "module",
    "namespace",
    "page",
    "property",
    "qmlattachedproperty",
    "qmlmethod",
    "qmlmodule",
    "qmlproperty",
    "qmlsignal",
    "qmltype",
    "struct",
    "typealias",
    "typedef",
    "union",
    "variable",
];

/// Commands recorded with their argument for the caller, besides topics
pub const META_COMMANDS: &[&str] = &[
    "deprecated",
    "ingroup",
    "inmodule",
    "inqmlmodule",
    "internal",
    "obsolete",
    "preliminary",
    "reimp",
    "relates",
    "since",
];

/// Context of one documentation run
pub struct Session {
    config: ScribeConfig,
    macros: MacroTable,
    condition: Condition,
    forest: Forest,
    primary: TreeId,
    meta_commands: HashSet<String>,
    topics: HashSet<String>,
    diagnostics: DiagnosticsCollector,
}

impl Session {
    /// Create a session for the module `config.project` describes
    pub fn new(config: ScribeConfig) -> ScribeResult<Self> {
        config.validate()?;
        let mut diagnostics = DiagnosticsCollector::new();
        let macros = MacroTable::from_config(&config.macros, &mut diagnostics)?;
        let condition = Condition::new(&config.defines, &config.falsehoods)?;
        let mut forest = Forest::new();
        let primary = forest.new_primary_tree(&config.project);

        let topics: HashSet<String> = TOPIC_COMMANDS.iter().map(|s| s.to_string()).collect();
        let mut meta_commands: HashSet<String> = META_COMMANDS.iter().map(|s| s.to_string()).collect();
        meta_commands.extend(topics.iter().cloned());

        tracing::debug!(project = %config.project, "session created");
        Ok(Self {
            config,
            macros,
            condition,
            forest,
            primary,
            meta_commands,
            topics,
            diagnostics,
        })
    }

    /// Recognize additional meta-commands
    pub fn with_meta_commands<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta_commands.extend(names.into_iter().map(Into::into));
        self
    }

    /// Recognize additional topic commands
    pub fn with_topics<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.meta_commands.insert(name.clone());
            self.topics.insert(name);
        }
        self
    }

    pub fn config(&self) -> &ScribeConfig {
        &self.config
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn forest_mut(&mut self) -> &mut Forest {
        &mut self.forest
    }

    pub fn primary(&self) -> TreeId {
        self.primary
    }

    /// The tree of the module being documented
    pub fn tree(&self) -> &Tree {
        &self.forest.trees()[self.primary.0]
    }

    pub fn tree_mut(&mut self) -> &mut Tree {
        let primary = self.primary;
        match self.forest.tree_mut(primary) {
            Some(tree) => tree,
            None => unreachable!("the primary tree is created with the session"),
        }
    }

    pub fn diagnostics(&self) -> &DiagnosticsCollector {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticsCollector {
        &mut self.diagnostics
    }

    /// Parse the text of a comment that starts at `location`
    pub fn parse_doc(&mut self, source: &str, location: Location) -> ScribeResult<Doc> {
        let parser = DocParser::new(&self.config, &self.macros, &self.condition);
        parser.parse(
            source,
            location,
            &self.meta_commands,
            &self.topics,
            &mut self.diagnostics,
        )
    }

    /// Parse a `/*! ... */` comment, leading asterisks included
    pub fn parse_comment(&mut self, comment: &str, location: Location) -> ScribeResult<Doc> {
        let mut location = location;
        let source = Doc::trim_c_style_comment(&mut location, comment, self.config.tab_size);
        self.parse_doc(&source, location)
    }

    /// Add an undocumented node to the primary tree
    pub fn add_node(&mut self, parent: NodeId, node: Node) -> NodeId {
        self.tree_mut().add_child(parent, node)
    }

    /// Parse `source` as the documentation of `node` and add the node under
    /// `parent`.
    ///
    /// `\since`, `\internal`, `\deprecated`/`\obsolete` and `\preliminary`
    /// set the node's attributes; `\ingroup`, `\inmodule` and
    /// `\inqmlmodule` add it to collections.
    pub fn document(
        &mut self,
        parent: NodeId,
        node: Node,
        source: &str,
        location: Location,
    ) -> ScribeResult<NodeId> {
        let doc = self.parse_doc(source, location)?;
        let mut node = node.with_doc(doc.clone());
        if let Some((since, _)) = doc.meta_command_args("since").first() {
            node.since = since.clone();
        }
        let used = doc.meta_commands_used();
        if doc.is_internal() {
            node.status = Status::Internal;
        } else if used.contains(&"deprecated") || used.contains(&"obsolete") {
            node.status = Status::Deprecated;
        } else if used.contains(&"preliminary") {
            node.status = Status::Preliminary;
        }

        let tree = self.tree_mut();
        let id = tree.add_child(parent, node);
        for (group, _) in doc.meta_command_args("ingroup") {
            for name in group.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                tree.add_to_group(name, id);
            }
        }
        if let Some((module, _)) = doc.meta_command_args("inmodule").first() {
            tree.add_to_module(module, id);
        }
        if let Some((module, _)) = doc.meta_command_args("inqmlmodule").first() {
            tree.add_to_qml_module(module, id);
        }
        Ok(id)
    }

    /// Load the index of a dependency module
    pub fn read_index(&mut self, path: &Path) -> ScribeResult<TreeId> {
        IndexReader::new(&mut self.forest, &mut self.diagnostics).read_file(path)
    }

    /// Load index text, as if read from `file_name`
    pub fn read_index_str(&mut self, content: &str, file_name: &str) -> ScribeResult<TreeId> {
        IndexReader::new(&mut self.forest, &mut self.diagnostics).read_str(content, file_name)
    }

    /// Fix the search order and run the resolution passes.
    ///
    /// Targets are indexed in every tree, then base classes, namespaces and
    /// proxies are resolved across the forest.
    pub fn resolve(&mut self) -> ScribeResult<()> {
        self.forest.set_search_order(&self.config.dependencies)?;
        for index in 0..self.forest.trees().len() {
            if let Some(tree) = self.forest.tree_mut(TreeId(index)) {
                tree.resolve_targets(&mut self.diagnostics);
            }
        }
        let bases = self.forest.resolve_base_classes();
        tracing::debug!(bases, "base classes resolved");
        self.forest
            .resolve_namespaces(!self.config.no_link_errors, &mut self.diagnostics);
        self.forest.resolve_proxies(&mut self.diagnostics);
        Ok(())
    }

    /// Resolve the link `atom` written in the documentation of `relative`.
    ///
    /// When other nodes define an anchor of the same name and priority, an
    /// "ambiguous" error is reported and the first definition is used.
    /// Unresolved links are reported unless `no-link-errors` is set.
    pub fn resolve_link(&mut self, atom: &Atom, relative: Option<NodeRef>) -> Option<TargetMatch> {
        let location = relative
            .and_then(|r| self.forest.node(r))
            .map(|n| n.doc_location().clone())
            .unwrap_or_default();

        let genus = if atom.is_link_atom() {
            let scope = atom.link_scope(|module| self.forest.find_tree(module));
            if let Some(params) = scope.error {
                self.diagnostics.add(
                    Diagnostic::warning(format!("Unrecognized link parameters '{}'", params))
                        .at_location(&location),
                );
            }
            scope.genus
        } else {
            Genus::DontCare
        };

        let found = self.forest.find_node_for_atom(atom, relative, genus);
        let target = atom.string().split('#').next().unwrap_or_default().trim();
        match &found {
            Some(m) if m.target_type != TargetType::Unknown => {
                let competing = self
                    .forest
                    .tree(m.node.tree)
                    .map(|tree| {
                        tree.competing_targets(target, genus)
                            .into_iter()
                            .map(|r| r.location.to_string())
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                if !competing.is_empty() {
                    self.diagnostics.add(
                        Diagnostic::error(format!("Link target '{}' is ambiguous", target))
                            .at_location(&location)
                            .with_details(format!("Also defined at {}", competing.join(", "))),
                    );
                }
            }
            Some(_) => {}
            None if !self.config.no_link_errors => {
                self.diagnostics.add(
                    Diagnostic::warning(format!("Can't link to '{}'", atom.string())).at_location(&location),
                );
            }
            None => {}
        }
        found
    }

    /// Index text of the primary tree
    pub fn index_string(&self) -> ScribeResult<String> {
        self.config.validate_for_index()?;
        IndexWriter::new(&self.forest, self.primary, IndexMeta::from_config(&self.config))?.write_to_string()
    }

    /// Write the index of the primary tree to `path`
    pub fn write_index(&self, path: &Path) -> ScribeResult<()> {
        self.config.validate_for_index()?;
        IndexWriter::new(&self.forest, self.primary, IndexMeta::from_config(&self.config))?.write_to_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{ScribeError, Severity};
    use crate::node::{ClassFlavor, CollectionKind, NodeKind};
    use pretty_assertions::assert_eq;

    fn session(project: &str) -> Session {
        Session::new(ScribeConfig::new(project)).unwrap()
    }

    fn loc(file: &str) -> Location {
        Location::new(file, 1, 1)
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ScribeConfig::new("qtcore");
        config.tab_size = 0;
        assert!(matches!(Session::new(config), Err(ScribeError::Config(_))));
    }

    #[test]
    fn test_meta_commands_set_attributes() {
        let mut s = session("QtCore");
        let root = s.tree().root();
        let id = s
            .document(
                root,
                Node::new("QObject", NodeKind::class(ClassFlavor::Class)),
                "\\since 6.1\n\\ingroup objects\n\\inmodule QtCore\n\\deprecated\nThe base object.",
                loc("qobject.cpp"),
            )
            .unwrap();

        let node = s.tree().get(id);
        assert_eq!(node.since, "6.1");
        assert_eq!(node.status, Status::Deprecated);
        assert_eq!(node.groups, vec!["objects".to_string()]);
        assert_eq!(node.physical_module, "QtCore");
        assert!(s.tree().get_collection("objects", CollectionKind::Group).is_some());
    }

    #[test]
    fn test_internal_nodes_stay_out_of_groups() {
        let mut s = session("QtCore");
        let root = s.tree().root();
        let id = s
            .document(
                root,
                Node::new("QPrivate", NodeKind::class(ClassFlavor::Class)),
                "\\internal\n\\ingroup objects\nHidden.",
                loc("qprivate.cpp"),
            )
            .unwrap();
        assert!(s.tree().get(id).is_internal());
        assert!(s.tree().get(id).groups.is_empty());
    }

    #[test]
    fn test_resolve_link_to_target() {
        let mut s = session("QtCore");
        let root = s.tree().root();
        let page = s
            .document(
                root,
                Node::new("overview.html", NodeKind::page("Overview")),
                "\\target Getting Started\nRead this first.",
                loc("overview.qdoc"),
            )
            .unwrap();
        s.resolve().unwrap();

        let found = s.resolve_link(&Atom::link("Getting Started", ""), None).unwrap();
        assert_eq!(found.node.node, page);
        assert_eq!(found.anchor, "getting-started");
        assert_eq!(found.target_type, TargetType::Target);
        assert!(!s.diagnostics().has_errors());
    }

    #[test]
    fn test_ambiguous_link_is_an_error() {
        let mut s = session("QtCore");
        let root = s.tree().root();
        let first = s
            .document(
                root,
                Node::new("a.html", NodeKind::page("Page A")),
                "\\keyword Widgets\nFirst.",
                loc("a.qdoc"),
            )
            .unwrap();
        s.document(
            root,
            Node::new("b.html", NodeKind::page("Page B")),
            "\\keyword Widgets\nSecond.",
            loc("b.qdoc"),
        )
        .unwrap();
        s.resolve().unwrap();

        let found = s.resolve_link(&Atom::link("Widgets", ""), None).unwrap();
        assert_eq!(found.node.node, first);
        let errors: Vec<_> = s.diagnostics().with_severity(Severity::Error).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("ambiguous"));
    }

    #[test]
    fn test_unresolved_link_warns() {
        let mut s = session("QtCore");
        s.resolve().unwrap();
        assert!(s.resolve_link(&Atom::link("Nowhere", ""), None).is_none());
        assert_eq!(s.diagnostics().warnings(), vec!["Can't link to 'Nowhere'"]);

        let mut config = ScribeConfig::new("QtCore");
        config.no_link_errors = true;
        let mut quiet = Session::new(config).unwrap();
        quiet.resolve().unwrap();
        assert!(quiet.resolve_link(&Atom::link("Nowhere", ""), None).is_none());
        assert!(quiet.diagnostics().is_empty());
    }

    #[test]
    fn test_link_into_dependency_index() {
        let mut core = session("QtCore");
        let root = core.tree().root();
        core.document(
            root,
            Node::new("QObject", NodeKind::class(ClassFlavor::Class)),
            "The base object.",
            loc("qobject.cpp"),
        )
        .unwrap();
        core.resolve().unwrap();
        let index = core.index_string().unwrap();

        let mut config = ScribeConfig::new("QtGui");
        config.dependencies = vec!["qtcore".to_string()];
        let mut gui = Session::new(config).unwrap();
        let core_tree = gui.read_index_str(&index, "qtcore.index").unwrap();
        gui.resolve().unwrap();

        assert_eq!(gui.forest().search_order(), vec![gui.primary(), core_tree]);
        let found = gui.resolve_link(&Atom::link("QObject", ""), None).unwrap();
        assert_eq!(found.node.tree, core_tree);
        assert!(gui.forest().node(found.node).unwrap().from_index);
    }

    #[test]
    fn test_write_index_requires_project() {
        let s = session("");
        let dir = tempfile::tempdir().unwrap();
        let err = s.write_index(&dir.path().join("none.index")).unwrap_err();
        assert!(matches!(err, ScribeError::Config(_)));
    }

    #[test]
    fn test_write_index_to_file() {
        let mut s = session("QtCore");
        s.resolve().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qtcore.index");
        s.write_index(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("project=\"QtCore\""));
    }

    #[test]
    fn test_independent_sessions() {
        let mut config = ScribeConfig::new("One");
        config.macros.insert(
            "Qt".to_string(),
            crate::config::MacroSpec::Simple("\\e{Qt}".to_string()),
        );
        let one = Session::new(config).unwrap();
        let two = session("Two");
        assert!(one.macros().contains("Qt"));
        assert!(!two.macros().contains("Qt"));
    }
}
