//! Reading an index file into a new tree

use super::{member_key, IndexMeta};
use crate::diagnostics::{Diagnostic, DiagnosticSink, ScribeError, ScribeResult};
use crate::forest::Forest;
use crate::location::Location;
use crate::node::{
    ClassFlavor, CollectionKind, EnumItem, FunctionData, Metaness, Node, NodeId, NodeKind,
    PageSubtype, Parameter, RelatedClass, TreeId, Virtualness,
};
use crate::tree::{TargetType, Tree};
use crate::visibility::{Access, Status};
use indexmap::IndexMap;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::path::Path;
use std::str::FromStr;

/// Loads index files into a forest, one new tree per file.
///
/// Every node read is marked as coming from an index. Base classes are
/// kept as names while the file is read and bound once it is complete.
pub struct IndexReader<'a> {
    forest: &'a mut Forest,
    sink: &'a mut dyn DiagnosticSink,
}

impl<'a> IndexReader<'a> {
    pub fn new(forest: &'a mut Forest, sink: &'a mut dyn DiagnosticSink) -> Self {
        Self { forest, sink }
    }

    pub fn read_file(&mut self, path: &Path) -> ScribeResult<TreeId> {
        let content = std::fs::read_to_string(path)?;
        self.read_str(&content, &path.display().to_string())
    }

    /// Read the index in `content`; `file_name` is used for diagnostics
    /// and recorded as the tree's index file
    pub fn read_str(&mut self, content: &str, file_name: &str) -> ScribeResult<TreeId> {
        tracing::debug!(file = file_name, "reading index");
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);
        let decoder = reader.decoder();
        let location = Location::start_of(file_name);

        let (meta, has_body) = loop {
            match reader.read_event().map_err(ScribeError::xml)? {
                Event::Start(e) if e.name().as_ref() == b"INDEX" => {
                    break (meta_from(&read_attributes(&e, decoder)?), true)
                }
                Event::Empty(e) if e.name().as_ref() == b"INDEX" => {
                    break (meta_from(&read_attributes(&e, decoder)?), false)
                }
                Event::Start(e) | Event::Empty(e) => {
                    return Err(ScribeError::fatal(
                        location,
                        format!("Index root element is <{}>, expected <INDEX>", element_name(&e)),
                    ))
                }
                Event::Eof => {
                    return Err(ScribeError::fatal(location, "Index file has no <INDEX> element"))
                }
                _ => {}
            }
        };

        let module = if meta.project.is_empty() {
            Path::new(file_name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            meta.project.clone()
        };
        let tree_id = self.forest.new_index_tree(&module);
        let tree = self
            .forest
            .tree_mut(tree_id)
            .ok_or_else(|| ScribeError::index(format!("Tree for {} was not created", module)))?;
        tree.set_index_file_name(file_name);
        tree.set_index_title(&meta.index_title);

        let mut builder = TreeBuilder {
            tree,
            url: meta.url.trim_end_matches('/').to_string(),
            members: IndexMap::new(),
        };
        let mut stack: Vec<NodeId> = Vec::new();
        while has_body {
            match reader.read_event().map_err(ScribeError::xml)? {
                Event::Start(e) => {
                    let name = element_name(&e);
                    let attrs = read_attributes(&e, decoder)?;
                    match builder.open(&name, &attrs, stack.last().copied())? {
                        Opened::Node(id) => stack.push(id),
                        Opened::Leaf => {
                            reader.read_to_end(e.name()).map_err(ScribeError::xml)?;
                        }
                        Opened::Unknown => {
                            self.sink.report(unknown_element(&name, &location));
                            reader.read_to_end(e.name()).map_err(ScribeError::xml)?;
                        }
                    }
                }
                Event::Empty(e) => {
                    let name = element_name(&e);
                    let attrs = read_attributes(&e, decoder)?;
                    if let Opened::Unknown = builder.open(&name, &attrs, stack.last().copied())? {
                        self.sink.report(unknown_element(&name, &location));
                    }
                }
                Event::End(e) => {
                    if e.name().as_ref() == b"INDEX" {
                        break;
                    }
                    stack.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }
        let nodes = builder.tree.len();

        self.forest.resolve_base_classes_in(tree_id);
        if let Some(tree) = self.forest.tree_mut(tree_id) {
            tree.resolve_targets(&mut *self.sink);
        }
        tracing::debug!(module = %module, nodes, "index read");
        Ok(tree_id)
    }
}

enum Opened {
    /// A node element; its children belong to this node
    Node(NodeId),
    /// Data attached to the enclosing node
    Leaf,
    Unknown,
}

struct TreeBuilder<'t> {
    tree: &'t mut Tree,
    url: String,
    /// Collection member names to the nodes they name
    members: IndexMap<String, NodeId>,
}

impl TreeBuilder<'_> {
    fn open(&mut self, element: &str, attrs: &Attrs, parent: Option<NodeId>) -> ScribeResult<Opened> {
        match element {
            "target" | "keyword" | "contents" => {
                if let (Some(node), Some(target_type)) = (parent, TargetType::from_element_name(element)) {
                    let anchor = attrs.get("name");
                    let title = match attrs.get("title") {
                        "" => anchor,
                        title => title,
                    };
                    self.tree
                        .insert_target(anchor, title, target_type, node, target_type.priority());
                }
                Ok(Opened::Leaf)
            }
            "parameter" => {
                if let Some(p) = parent {
                    if let Some(data) = self.tree.get_mut(p).function_data_mut() {
                        data.parameters.push(Parameter {
                            ty: attrs.get("type").to_string(),
                            name: attrs.get("name").to_string(),
                            default_value: attrs.get("default").to_string(),
                        });
                    }
                }
                Ok(Opened::Leaf)
            }
            "value" => {
                if let Some(p) = parent {
                    if let NodeKind::Enum { items, .. } = &mut self.tree.get_mut(p).kind {
                        items.push(EnumItem {
                            name: attrs.get("name").to_string(),
                            value: attrs.get("value").to_string(),
                            since: attrs.get("since").to_string(),
                        });
                    }
                }
                Ok(Opened::Leaf)
            }
            "member" => {
                if let Some(collection) = parent {
                    self.add_member(collection, attrs.get("name"));
                }
                Ok(Opened::Leaf)
            }
            _ => Ok(match self.create_node(element, attrs, parent) {
                Some(id) => Opened::Node(id),
                None => Opened::Unknown,
            }),
        }
    }

    fn create_node(&mut self, element: &str, attrs: &Attrs, parent: Option<NodeId>) -> Option<NodeId> {
        let kind = kind_for_element(element, attrs)?;
        let name = attrs.get("name");
        let collection = match &kind {
            NodeKind::Collection { kind, .. } => Some(*kind),
            _ => None,
        };
        let is_root = parent.is_none() && name.is_empty() && matches!(kind, NodeKind::Namespace { .. });

        let id = if is_root {
            self.tree.root()
        } else if let Some(collection) = collection {
            let id = if attrs.flag("seen") {
                self.tree.add_collection(name, collection)
            } else {
                self.tree.find_collection(name, collection)
            };
            self.tree.get_mut(id).set_title(attrs.get("title"));
            id
        } else {
            let parent = parent.unwrap_or(self.tree.root());
            self.tree.add_child(parent, Node::new(name, kind))
        };
        self.apply_common(id, attrs);
        if !is_root && collection.is_none() {
            let key = member_key(&*self.tree, id);
            self.members.entry(key).or_insert(id);
        }
        Some(id)
    }

    fn apply_common(&mut self, id: NodeId, attrs: &Attrs) {
        let url = match attrs.get("href") {
            "" => String::new(),
            href if self.url.is_empty() => href.to_string(),
            href => format!("{}/{}", self.url, href),
        };
        let file = match attrs.get("filepath") {
            "" => attrs.get("location"),
            path => path,
        };
        let node = self.tree.get_mut(id);
        node.from_index = true;
        node.had_doc = attrs.flag("documented");
        node.access = Access::from_name(attrs.get("access"));
        node.status = Status::from_name(attrs.get("status"));
        node.since = attrs.get("since").to_string();
        node.brief = attrs.get("brief").to_string();
        node.related_nonmember = attrs.flag("related");
        node.physical_module = attrs.get("module").to_string();
        if !url.is_empty() {
            node.url = url;
        }
        if !file.is_empty() {
            node.location = Location::new(file, attrs.number("lineno"), 1);
        }
        // `groups` is informational; membership comes from the collections
    }

    fn add_member(&mut self, collection: NodeId, key: &str) {
        let Some(&member) = self.members.get(key) else {
            tracing::debug!(member = key, "collection member not in index");
            return;
        };
        let node = self.tree.get(collection);
        let NodeKind::Collection { kind, .. } = node.kind else {
            return;
        };
        let name = node.name.clone();
        match kind {
            CollectionKind::Group => self.tree.add_to_group(&name, member),
            CollectionKind::Module => self.tree.add_to_module(&name, member),
            CollectionKind::QmlModule => self.tree.add_to_qml_module(&name, member),
        };
    }
}

fn kind_for_element(element: &str, attrs: &Attrs) -> Option<NodeKind> {
    let text = |key: &str| attrs.get(key).to_string();
    let kind = match element {
        "namespace" => NodeKind::namespace(),
        "class" | "struct" | "union" => {
            let flavor = match element {
                "struct" => ClassFlavor::Struct,
                "union" => ClassFlavor::Union,
                _ => ClassFlavor::Class,
            };
            let bases = attrs
                .get("bases")
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(|b| RelatedClass::unresolved(Access::Public, b))
                .collect();
            NodeKind::Class {
                flavor,
                bases,
                derived: Vec::new(),
                is_abstract: attrs.flag("abstract"),
            }
        }
        "header" => NodeKind::HeaderFile { title: text("title") },
        "qmlclass" => NodeKind::QmlType {
            base: text("qml-base-type"),
            title: text("title"),
        },
        "qmlproperty" => NodeKind::QmlProperty {
            data_type: text("type"),
            read_only: attrs.flag("readonly"),
        },
        "group" => NodeKind::collection(CollectionKind::Group),
        "module" => NodeKind::collection(CollectionKind::Module),
        "qmlmodule" => NodeKind::collection(CollectionKind::QmlModule),
        "page" => NodeKind::Page {
            title: text("title"),
            subtitle: text("subtitle"),
            subtype: PageSubtype::from_name(attrs.get("subtype")),
        },
        "enum" => NodeKind::Enum {
            scoped: attrs.flag("scoped"),
            items: Vec::new(),
        },
        "typedef" => NodeKind::Typedef,
        "alias" => NodeKind::TypeAlias { aliased: text("aliased") },
        "property" => NodeKind::Property {
            data_type: text("type"),
            writable: attrs.flag("writable"),
            bindable: attrs.flag("bindable"),
        },
        "function" => NodeKind::Function(FunctionData {
            metaness: Metaness::from_name(attrs.get("meta")),
            overload_number: attrs.number("overload-number"),
            is_overload: attrs.flag("overload"),
            virtualness: Virtualness::from_name(attrs.get("virtual")),
            is_const: attrs.flag("const"),
            is_static: attrs.flag("static"),
            return_type: text("type"),
            parameters: Vec::new(),
        }),
        "variable" => NodeKind::Variable {
            data_type: text("type"),
            is_static: attrs.flag("static"),
        },
        "proxy" => NodeKind::Proxy,
        _ => return None,
    };
    Some(kind)
}

/// Attribute values of one element, unescaped
#[derive(Debug, Default)]
struct Attrs(IndexMap<String, String>);

impl Attrs {
    /// Value of `key`, empty when absent
    fn get(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key) == "true"
    }

    fn number<T: FromStr + Default>(&self, key: &str) -> T {
        self.get(key).parse().unwrap_or_default()
    }
}

fn read_attributes(e: &BytesStart<'_>, decoder: Decoder) -> ScribeResult<Attrs> {
    let mut attrs = IndexMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(ScribeError::xml)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(ScribeError::xml)?;
        attrs.insert(key, value.into_owned());
    }
    Ok(Attrs(attrs))
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn meta_from(attrs: &Attrs) -> IndexMeta {
    IndexMeta {
        url: attrs.get("url").to_string(),
        title: attrs.get("title").to_string(),
        index_title: match attrs.get("indexTitle") {
            "" => attrs.get("title").to_string(),
            title => title.to_string(),
        },
        version: attrs.get("version").to_string(),
        project: attrs.get("project").to_string(),
    }
}

fn unknown_element(name: &str, location: &Location) -> Diagnostic {
    Diagnostic::warning(format!("Unknown index element <{}> skipped", name)).at_location(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticsCollector;
    use crate::node::NodeRef;
    use crate::tree::NodeStore;
    use pretty_assertions::assert_eq;

    fn read(xml: &str) -> (Forest, ScribeResult<TreeId>, DiagnosticsCollector) {
        let mut forest = Forest::new();
        let mut sink = DiagnosticsCollector::new();
        let result = IndexReader::new(&mut forest, &mut sink).read_str(xml, "dep.index");
        (forest, result, sink)
    }

    #[test]
    fn test_wrong_root_is_fatal() {
        let (_, result, _) = read("<?xml version=\"1.0\"?><INDEXES project=\"x\"/>");
        let err = result.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("expected <INDEX>"));

        let (_, result, _) = read("<?xml version=\"1.0\"?>");
        assert!(result.unwrap_err().is_fatal());
    }

    #[test]
    fn test_empty_index() {
        let (forest, result, sink) = read("<INDEX project=\"QtSql\" url=\"u\"/>");
        let id = result.unwrap();
        assert!(sink.is_empty());
        let tree = forest.tree(id).unwrap();
        assert_eq!(tree.module_name(), "QtSql");
        assert!(tree.is_empty());
        assert_eq!(forest.find_tree("qtsql"), Some(id));
    }

    #[test]
    fn test_module_named_after_file_without_project() {
        let (forest, result, _) = read("<INDEX><namespace name=\"\"/></INDEX>");
        let tree = forest.tree(result.unwrap()).unwrap();
        assert_eq!(tree.module_name(), "dep");
    }

    #[test]
    fn test_unknown_element_is_skipped() {
        let xml = r#"<INDEX project="Dep">
            <namespace name="">
              <gadget name="x"><class name="Inner"/></gadget>
              <class name="Outer" href="outer.html" access="protected" status="deprecated" since="5.1" documented="true" location="outer.h" lineno="12"/>
            </namespace>
          </INDEX>"#;
        let (forest, result, sink) = read(xml);
        let id = result.unwrap();
        assert_eq!(sink.warnings(), vec!["Unknown index element <gadget> skipped"]);

        let tree = forest.tree(id).unwrap();
        assert_eq!(tree.find_aggregate("Inner"), None);
        let outer = tree.find_aggregate("Outer").unwrap();
        let node = tree.get(outer);
        assert_eq!(node.access, Access::Protected);
        assert_eq!(node.status, Status::Deprecated);
        assert_eq!(node.since, "5.1");
        assert_eq!(node.url, "outer.html");
        assert_eq!(node.location, Location::new("outer.h", 12, 1));
        assert!(node.had_doc && node.from_index);
    }

    #[test]
    fn test_escaped_attributes_and_targets() {
        let xml = r#"<INDEX project="Dep" url="https://x.org/dep/">
            <namespace name="">
              <page name="ops.html" title="Operators &amp; Friends" subtype="page">
                <keyword name="a-b" title="a&lt;b"/>
                <contents name="usage" title="Usage"/>
              </page>
            </namespace>
          </INDEX>"#;
        let (forest, result, _) = read(xml);
        let id = result.unwrap();
        let tree = forest.tree(id).unwrap();
        let page = tree.find_page_node_by_title("Operators & Friends").unwrap();
        assert_eq!(tree.get(page).url, "https://x.org/dep/ops.html");

        let rec = tree.find_unambiguous_target("a<b", crate::node::Genus::DontCare).unwrap();
        assert_eq!((rec.anchor.as_str(), rec.target_type, rec.priority), ("a-b", TargetType::Keyword, 1));
        let found = forest.find_node_for_target("Usage", None, None, crate::node::Genus::DontCare).unwrap();
        assert_eq!(found.node, NodeRef::new(id, page));
        assert_eq!(found.target_type, TargetType::Contents);
    }

    #[test]
    fn test_bases_resolved_after_reading() {
        // The subclass comes before its base in the file
        let xml = r#"<INDEX project="Dep">
            <namespace name="">
              <namespace name="ns">
                <class name="Sub" bases="Base"/>
                <class name="Base"/>
              </namespace>
            </namespace>
          </INDEX>"#;
        let (forest, result, _) = read(xml);
        let id = result.unwrap();
        let tree = forest.tree(id).unwrap();
        let sub = tree.find_aggregate("ns::Sub").unwrap();
        let base = tree.find_aggregate("ns::Base").unwrap();
        assert_eq!(
            forest.all_base_classes(NodeRef::new(id, sub)),
            vec![NodeRef::new(id, base)]
        );
    }

    #[test]
    fn test_qml_module_members() {
        let xml = r#"<INDEX project="QtQuick">
            <namespace name="">
              <qmlclass name="Item" qml-base-type="QtObject"/>
            </namespace>
            <qmlmodule name="QtQuick" title="Qt Quick QML Types" seen="true">
              <member name="Item"/>
              <member name="Missing"/>
            </qmlmodule>
          </INDEX>"#;
        let (forest, result, sink) = read(xml);
        let id = result.unwrap();
        assert!(sink.is_empty());
        let tree = forest.tree(id).unwrap();
        let item = tree.lookup_qml_type("QtQuick::Item").unwrap();
        assert!(matches!(&tree.get(item).kind, NodeKind::QmlType { base, .. } if base == "QtObject"));
        let module = tree.get_collection("QtQuick", CollectionKind::QmlModule).unwrap();
        assert_eq!(tree.get(module).title(), "Qt Quick QML Types");
    }
}
