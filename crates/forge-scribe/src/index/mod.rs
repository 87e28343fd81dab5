//! Index files
//!
//! An index file is the serialized form of one [`Tree`], written after a
//! module has been documented so that other modules can link into it
//! without parsing its sources again.
//!
//! ```text
//! <!DOCTYPE QDOCINDEX>
//! <INDEX url=".." title=".." indexTitle=".." version=".." project="QtCore">
//!   <namespace name="" ...>              the tree root
//!     <class name="QObject" href="qobject.html" bases="..." ...>
//!       <target name="anchor" title="Anchor"/>
//!       <function name="setParent" overload-number="1" ...>
//!         <parameter type="QObject *" name="parent" default=""/>
//!       </function>
//!     </class>
//!   </namespace>
//!   <group name="io" title=".." seen="true">   collections come last
//!     <member name="QFile"/>
//!   </group>
//! </INDEX>
//! ```

mod reader;
mod writer;

pub use reader::IndexReader;
pub use writer::IndexWriter;

use crate::config::ScribeConfig;
use crate::node::{NodeId, NodeKind};
use crate::tree::{NodeStore, Tree};
use crate::utils::canonical_title;

/// Document type name of index files
pub const INDEX_DOCTYPE: &str = "QDOCINDEX";

/// Attributes of the `<INDEX>` root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMeta {
    /// Base URL prepended to every `href` read back from the index
    pub url: String,
    pub title: String,
    pub index_title: String,
    pub version: String,
    /// Module name; the tree read from the index is named after it
    pub project: String,
}

impl IndexMeta {
    pub fn from_config(config: &ScribeConfig) -> Self {
        Self {
            url: config.url.clone(),
            title: config.title.clone(),
            index_title: if config.index_title.is_empty() {
                config.title.clone()
            } else {
                config.index_title.clone()
            },
            version: config.version.clone(),
            project: config.project.clone(),
        }
    }
}

/// Page-relative location of a node, `qstring.html` or
/// `qstring.html#arg-2`. Empty for the root and for members of the root.
pub fn href_for(tree: &Tree, id: NodeId) -> String {
    let node = tree.get(id);
    if !node.url.is_empty() {
        return node.url.clone();
    }
    match &node.kind {
        NodeKind::Page { .. } => {
            if node.name.ends_with(".html") {
                node.name.clone()
            } else {
                format!("{}.html", node.name)
            }
        }
        NodeKind::Collection { .. } => format!("{}.html", canonical_title(&node.name)),
        NodeKind::Namespace { .. } if node.parent.is_none() => String::new(),
        NodeKind::Namespace { .. }
        | NodeKind::Class { .. }
        | NodeKind::QmlType { .. }
        | NodeKind::HeaderFile { .. }
        | NodeKind::Proxy => {
            let path = tree.qualified_path(tree.node_ref(id));
            format!("{}.html", path.join("-").to_lowercase())
        }
        _ => {
            let Some(parent) = node.parent else {
                return String::new();
            };
            let page = href_for(tree, parent);
            if page.is_empty() {
                return String::new();
            }
            let mut anchor = canonical_title(&node.name);
            if let Some(f) = node.function_data() {
                if f.overload_number > 1 {
                    anchor.push_str(&format!("-{}", f.overload_number));
                }
            }
            format!("{}#{}", page, anchor)
        }
    }
}

/// Name a collection member is listed under: the qualified name, with the
/// overload number appended for every function but the first of its name
pub(crate) fn member_key(tree: &Tree, id: NodeId) -> String {
    let mut key = tree.full_name(tree.node_ref(id));
    if let Some(f) = tree.get(id).function_data() {
        if f.overload_number > 1 {
            key.push_str(&format!("-{}", f.overload_number));
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticsCollector;
    use crate::doc::{AnchorDef, Doc, DocPrivate};
    use crate::forest::Forest;
    use crate::location::Location;
    use crate::node::{
        Access, ClassFlavor, CollectionKind, EnumItem, FunctionData, Node, NodeRef, Parameter,
        RelatedClass,
    };
    use crate::atom::{Atom, AtomType};
    use crate::tree::TargetType;
    use crate::visibility::Status;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn documented(file: &str, brief: &str, targets: &[&str], keywords: &[&str]) -> Doc {
        let loc = Location::new(file, 10, 1);
        let mut private = DocPrivate::new(loc.clone(), loc.clone(), "source");
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
                match atom_type {
                    AtomType::Target => private.targets.push(def),
                    _ => private.keywords.push(def),
                }
            }
        }
        Doc::from_private(private)
    }

    fn function(name: &str, params: &[(&str, &str)]) -> Node {
        let data = FunctionData {
            return_type: "void".to_string(),
            parameters: params.iter().map(|(t, n)| Parameter::new(*t, *n)).collect(),
            ..FunctionData::default()
        };
        Node::new(name, NodeKind::function(data))
    }

    /// `ns { Base, Derived : Base { set(int), set(QString), Mode }, page, group }`
    fn source_forest() -> (Forest, NodeId) {
        let mut forest = Forest::new();
        let p = forest.new_primary_tree("QtCore");
        let tree = forest.tree_mut(p).expect("tree");
        let root = tree.root();
        let ns = tree.add_child(root, Node::new("ns", NodeKind::namespace()));
        let base = tree.add_child(
            ns,
            Node::new("Base", NodeKind::class(ClassFlavor::Class))
                .with_doc(documented("base.cpp", "The Base class is a root.", &[], &[])),
        );
        let mut kind = NodeKind::class(ClassFlavor::Struct);
        if let NodeKind::Class { bases, .. } = &mut kind {
            bases.push(RelatedClass::unresolved(Access::Public, "Base"));
            bases.push(RelatedClass::unresolved(Access::Public, "Elsewhere::Mixin"));
        }
        let derived = tree.add_child(
            ns,
            Node::new("Derived", kind).with_doc(documented("derived.cpp", "Derived things.", &["extra"], &["derive"])),
        );
        tree.get_mut(derived).since = "6.2".to_string();
        tree.add_child(derived, function("set", &[("int", "value")]));
        tree.add_child(
            derived,
            Node::new(
                "Mode",
                NodeKind::Enum {
                    scoped: true,
                    items: vec![EnumItem {
                        name: "Fast".into(),
                        value: "0x1".into(),
                        since: "6.3".into(),
                    }],
                },
            ),
        );
        tree.add_child(derived, function("set", &[("const QString &", "text")]));
        tree.add_child(derived, function("hidden", &[]).with_access(Access::Private));
        let page = tree.add_child(
            root,
            Node::new("overview.html", NodeKind::page("Core Overview"))
                .with_doc(documented("overview.qdoc", "Overview.", &["Start Here"], &[])),
        );
        let group = tree.add_collection("tools", CollectionKind::Group);
        tree.get_mut(group).set_title("Tool Classes");
        tree.add_to_group("tools", base);
        tree.add_to_group("tools", page);
        let mut internal = Node::new("Secret", NodeKind::class(ClassFlavor::Class));
        internal.status = Status::Internal;
        tree.add_child(ns, internal);

        let mut sink = DiagnosticsCollector::new();
        tree.resolve_targets(&mut sink);
        assert!(sink.is_empty());
        (forest, derived)
    }

    fn meta() -> IndexMeta {
        IndexMeta {
            url: "https://doc.example.org/qtcore".to_string(),
            title: "Qt Core".to_string(),
            index_title: "Qt Core Reference".to_string(),
            version: "6.5".to_string(),
            project: "QtCore".to_string(),
        }
    }

    /// `(qualified name, element, access, since, brief)` of every indexed
    /// node except collections, sorted
    fn summary(forest: &Forest, tree: &Tree) -> Vec<(String, &'static str, &'static str, String, String)> {
        let mut rows: Vec<_> = tree
            .preorder()
            .into_iter()
            .filter(|&id| !tree.get(id).is_collection() && !tree.get(id).is_private())
            .map(|id| {
                let node = tree.get(id);
                let brief = if node.doc.is_empty() {
                    node.brief.clone()
                } else {
                    node.doc.trimmed_brief_text(&node.name).to_plain_string()
                };
                (
                    forest.full_name(tree.node_ref(id)),
                    node.kind.element_name(),
                    node.access.name(),
                    node.since.clone(),
                    brief,
                )
            })
            .collect();
        rows.sort();
        rows
    }

    fn targets(tree: &Tree) -> Vec<(String, String, TargetType, u8, String)> {
        let mut rows: Vec<_> = tree
            .target_records()
            .map(|(key, rec)| {
                (
                    key.to_string(),
                    rec.title.clone(),
                    rec.target_type,
                    rec.priority,
                    tree.full_name(tree.node_ref(rec.node)),
                )
            })
            .collect();
        rows.sort_by(|a, b| (&a.0, &a.1, a.3).cmp(&(&b.0, &b.1, b.3)));
        rows
    }

    #[test]
    fn test_href_for() {
        let (forest, derived) = source_forest();
        let tree = forest.primary_tree().expect("primary");
        assert_eq!(href_for(tree, tree.root()), "");
        assert_eq!(href_for(tree, derived), "ns-derived.html");
        let children = &tree.get(derived).children;
        assert_eq!(href_for(tree, children[0]), "ns-derived.html#set");
        assert_eq!(href_for(tree, children[2]), "ns-derived.html#set-2");
        assert_eq!(member_key(tree, children[2]), "ns::Derived::set-2");
    }

    #[test]
    fn test_round_trip() {
        let (forest, _) = source_forest();
        let primary = forest.primary().expect("primary");
        let xml = IndexWriter::new(&forest, primary, meta())
            .expect("tree exists")
            .write_to_string()
            .expect("written");
        assert!(xml.contains("<!DOCTYPE QDOCINDEX>"));
        assert!(!xml.contains("hidden"));

        let mut loaded = Forest::new();
        let mut sink = DiagnosticsCollector::new();
        let id = IndexReader::new(&mut loaded, &mut sink)
            .read_str(&xml, "qtcore.index")
            .expect("read back");
        assert!(sink.is_empty(), "{:?}", sink.diagnostics());

        let original = forest.primary_tree().expect("primary");
        let read = loaded.tree(id).expect("tree");
        assert_eq!(read.module_name(), "QtCore");
        assert_eq!(read.index_title(), "Qt Core Reference");
        assert_eq!(summary(&loaded, read), summary(&forest, original));
        assert_eq!(targets(read), targets(original));
        assert!(read.preorder().iter().all(|&n| read.get(n).from_index));
    }

    #[test]
    fn test_round_trip_details() {
        let (forest, _) = source_forest();
        let primary = forest.primary().expect("primary");
        let xml = IndexWriter::new(&forest, primary, meta())
            .expect("tree exists")
            .write_to_string()
            .expect("written");
        let mut loaded = Forest::new();
        let mut sink = DiagnosticsCollector::new();
        let id = IndexReader::new(&mut loaded, &mut sink)
            .read_str(&xml, "qtcore.index")
            .expect("read back");
        let tree = loaded.tree(id).expect("tree");

        // Bases stay names; the one defined in this index gets resolved
        let derived = tree.find_aggregate("ns::Derived").expect("derived");
        let node = tree.get(derived);
        assert_eq!(
            node.bases().iter().map(|b| b.signature()).collect::<Vec<_>>(),
            vec!["Base", "Elsewhere::Mixin"]
        );
        let base = tree.find_aggregate("ns::Base").expect("base");
        assert_eq!(node.bases()[0].node, Some(tree.node_ref(base)));
        assert_eq!(node.bases()[1].node, None);
        assert!(matches!(node.kind, NodeKind::Class { flavor: ClassFlavor::Struct, .. }));
        assert_eq!(node.url, "https://doc.example.org/qtcore/ns-derived.html");
        assert!(node.had_doc);

        // Overloads keep their numbers and parameters
        let overloads: Vec<(u16, bool, Vec<Parameter>)> = node
            .children
            .iter()
            .filter_map(|&c| tree.get(c).function_data())
            .map(|f| (f.overload_number, f.is_overload, f.parameters.clone()))
            .collect();
        assert_eq!(
            overloads,
            vec![
                (1, false, vec![Parameter::new("int", "value")]),
                (2, true, vec![Parameter::new("const QString &", "text")]),
            ]
        );

        let mode = tree.get(node.children[2]);
        assert!(mode.is_scoped_enum());
        assert!(mode.has_enum_item("Fast"));

        // Collections: title, seen flag and members
        let group = tree.get_collection("tools", CollectionKind::Group).expect("group");
        match &tree.get(group).kind {
            NodeKind::Collection { title, seen, members, .. } => {
                assert_eq!(title, "Tool Classes");
                assert!(seen);
                assert_eq!(members.len(), 2);
                assert_eq!(members[0], NodeRef::new(id, base));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(tree.get(base).groups, vec!["tools"]);
        assert_eq!(
            tree.find_page_node_by_title("Core Overview").map(|p| tree.get(p).name.as_str()),
            Some("overview.html")
        );
        let secret = tree.find_aggregate("ns::Secret").expect("internal class is indexed");
        assert!(tree.get(secret).is_internal());
    }

    #[test]
    fn test_index_file_on_disk() {
        let (forest, _) = source_forest();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qtcore.index");
        IndexWriter::new(&forest, forest.primary().expect("primary"), meta())
            .unwrap()
            .write_to_file(&path)
            .unwrap();

        let mut loaded = Forest::new();
        let mut sink = DiagnosticsCollector::new();
        let id = IndexReader::new(&mut loaded, &mut sink).read_file(&path).unwrap();
        let tree = loaded.tree(id).unwrap();
        assert_eq!(tree.index_file_name(), path.display().to_string());
        assert!(tree.find_aggregate("ns::Base").is_some());
    }

    #[test]
    fn test_read_skips_nodes_from_other_indexes() {
        let (mut forest, derived) = source_forest();
        let primary = forest.primary().expect("primary");
        forest
            .tree_mut(primary)
            .expect("tree")
            .get_mut(derived)
            .from_index = true;
        let xml = IndexWriter::new(&forest, primary, meta())
            .unwrap()
            .write_to_string()
            .unwrap();
        assert!(!xml.contains("Derived"));
        assert!(xml.contains("Base"));
    }
}
