//! Test utilities and mock objects for forge-scribe.
//!
//! Builders for locations, docs, nodes, trees and sessions, for tests in
//! this crate and in crates that build on it.
//!
//! # Example
//!
//! ```
//! use forge_scribe::test::{mock_class, mock_forest};
//!
//! let (mut forest, tree) = mock_forest("QtCore");
//! let tree = forest.tree_mut(tree).unwrap();
//! let root = tree.root();
//! let class = tree.add_child(root, mock_class("QObject"));
//! assert_eq!(tree.get(class).name, "QObject");
//! ```

use crate::atom::{Atom, AtomType};
use crate::config::ScribeConfig;
use crate::doc::{AnchorDef, Doc, DocPrivate};
use crate::forest::Forest;
use crate::location::Location;
use crate::node::{
    ClassFlavor, CollectionKind, FunctionData, Node, NodeId, NodeKind, Parameter, RelatedClass,
    TreeId,
};
use crate::session::Session;
use crate::visibility::Access;

/// Create a mock location.
///
/// Returns a location pointing to "test.cpp" at line 1, column 1.
pub fn mock_location() -> Location {
    Location::new("test.cpp", 1, 1)
}

/// Create a mock location with custom values.
pub fn mock_location_at(filename: &str, line: usize, col: usize) -> Location {
    Location::new(filename, line, col)
}

/// Configuration for `project` with defaults everywhere else
pub fn mock_config(project: &str) -> ScribeConfig {
    ScribeConfig::new(project)
}

/// Create a session for `project`.
///
/// # Panics
///
/// Never for a plain project name; the default configuration is valid.
pub fn mock_session(project: &str) -> Session {
    match Session::new(mock_config(project)) {
        Ok(session) => session,
        Err(e) => panic!("mock session for {}: {}", project, e),
    }
}

/// A doc whose body is a brief paragraph holding `brief`
pub fn mock_doc(brief: &str) -> Doc {
    mock_doc_with_anchors(brief, &[], &[])
}

/// A doc with a brief plus `\target` and `\keyword` anchors.
///
/// The anchors are registered as if the parser had seen them, so a tree
/// indexes them in `resolve_targets`.
pub fn mock_doc_with_anchors(brief: &str, targets: &[&str], keywords: &[&str]) -> Doc {
    let loc = mock_location();
    let mut private = DocPrivate::new(loc.clone(), loc.clone(), brief);
    private.text.push_type(AtomType::BriefLeft);
    private.text.push_str(brief);
    private.text.push_type(AtomType::BriefRight);
    for (names, atom_type) in [(targets, AtomType::Target), (keywords, AtomType::Keyword)] {
        for name in names {
            let atom = private.text.len();
            private.text.push(Atom::new(atom_type, *name));
            let def = AnchorDef {
                name: name.to_string(),
                atom,
                location: loc.clone(),
            };
            if atom_type == AtomType::Target {
                private.targets.push(def);
            } else {
                private.keywords.push(def);
            }
        }
    }
    Doc::from_private(private)
}

/// Create a mock namespace node.
pub fn mock_namespace(name: &str) -> Node {
    Node::new(name, NodeKind::namespace()).at(mock_location())
}

/// Create a mock documented class node.
///
/// # Example
///
/// ```
/// use forge_scribe::test::mock_class;
///
/// let class = mock_class("QWidget");
/// assert!(class.is_class());
/// assert!(class.has_doc());
/// ```
pub fn mock_class(name: &str) -> Node {
    Node::new(name, NodeKind::class(ClassFlavor::Class))
        .with_doc(mock_doc(&format!("The {} class.", name)))
}

/// Create a mock class deriving publicly from each of `bases`.
///
/// The bases stay unresolved until a forest resolves base classes.
pub fn mock_class_with_bases(name: &str, bases: &[&str]) -> Node {
    let mut node = mock_class(name);
    if let NodeKind::Class { bases: list, .. } = &mut node.kind {
        list.extend(bases.iter().map(|b| RelatedClass::unresolved(Access::Public, b)));
    }
    node
}

/// Create a mock function node.
///
/// # Arguments
///
/// * `name` - The function name
/// * `params` - `(type, name)` pairs
pub fn mock_function(name: &str, params: &[(&str, &str)]) -> Node {
    let data = FunctionData {
        return_type: "void".to_string(),
        parameters: params.iter().map(|(t, n)| Parameter::new(*t, *n)).collect(),
        ..FunctionData::default()
    };
    Node::new(name, NodeKind::function(data)).with_doc(mock_doc(&format!("Does {}.", name)))
}

/// Create a mock documented page.
pub fn mock_page(name: &str, title: &str) -> Node {
    Node::new(name, NodeKind::page(title)).with_doc(mock_doc(title))
}

/// Create a mock group collection titled `title`.
pub fn mock_group(name: &str, title: &str) -> Node {
    let mut node = Node::new(name, NodeKind::collection(CollectionKind::Group));
    node.set_title(title);
    node
}

/// A forest whose primary tree documents `module`
pub fn mock_forest(module: &str) -> (Forest, TreeId) {
    let mut forest = Forest::new();
    let tree = forest.new_primary_tree(module);
    (forest, tree)
}

/// A forest whose primary tree holds `ns::Base` and `ns::Derived : Base`
/// with one member function `ns::Derived::run()`.
///
/// Returns the forest, the primary tree and the `Derived` node.
pub fn mock_tree(module: &str) -> (Forest, TreeId, NodeId) {
    let (mut forest, id) = mock_forest(module);
    let derived = match forest.tree_mut(id) {
        Some(tree) => {
            let root = tree.root();
            let ns = tree.add_child(root, mock_namespace("ns"));
            tree.add_child(ns, mock_class("Base"));
            let derived = tree.add_child(ns, mock_class_with_bases("Derived", &["Base"]));
            tree.add_child(derived, mock_function("run", &[]));
            derived
        }
        None => unreachable!("primary tree was just created"),
    };
    (forest, id, derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticsCollector;
    use crate::tree::NodeStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mock_location() {
        let loc = mock_location();
        assert_eq!(loc.file, "test.cpp");
        assert_eq!(loc.line, 1);
    }

    #[test]
    fn test_mock_doc() {
        let doc = mock_doc("Hello.");
        assert!(!doc.is_empty());
        assert_eq!(doc.brief_text(false).to_plain_string(), "Hello.");
    }

    #[test]
    fn test_mock_doc_with_anchors() {
        let doc = mock_doc_with_anchors("Page.", &["Start"], &["Begin"]);
        assert_eq!(doc.targets().len(), 1);
        assert_eq!(doc.keywords().len(), 1);
        assert!(doc.has_targets());
        assert!(doc.has_keywords());
    }

    #[test]
    fn test_mock_tree_resolves_bases() {
        let (mut forest, tree, derived) = mock_tree("QtCore");
        forest.set_search_order(&[]).unwrap();
        assert_eq!(forest.resolve_base_classes(), 1);

        let tree = forest.tree(tree).unwrap();
        let base = tree.get(derived).bases()[0].node.unwrap();
        assert_eq!(forest.full_name(base), "ns::Base");
    }

    #[test]
    fn test_mock_page_targets() {
        let (mut forest, id) = mock_forest("QtCore");
        let tree = forest.tree_mut(id).unwrap();
        let root = tree.root();
        let mut page = mock_page("intro.html", "Introduction");
        page.doc = mock_doc_with_anchors("Introduction", &["First Steps"], &[]);
        let page = tree.add_child(root, page);

        let mut sink = DiagnosticsCollector::new();
        tree.resolve_targets(&mut sink);
        assert!(sink.is_empty());
        assert_eq!(tree.targets_for(page).len(), 1);
        assert_eq!(tree.find_page_node_by_title("Introduction"), Some(page));
    }

    #[test]
    fn test_mock_session() {
        let session = mock_session("QtCore");
        assert_eq!(session.tree().module_name(), "QtCore");
        assert!(session.diagnostics().is_empty());
    }

    #[test]
    fn test_mock_group() {
        let group = mock_group("tools", "Tool Classes");
        assert!(group.is_collection());
        assert_eq!(group.title(), "Tool Classes");
    }
}
