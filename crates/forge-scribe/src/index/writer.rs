//! Writing a tree as an index file

use super::{href_for, member_key, IndexMeta, INDEX_DOCTYPE};
use crate::diagnostics::{ScribeError, ScribeResult};
use crate::forest::Forest;
use crate::node::{CollectionKind, Node, NodeId, NodeKind, TreeId};
use crate::tree::{NodeStore, Tree};
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;
use std::path::Path;

type Attributes = Vec<(&'static str, String)>;

/// Serializes one tree of a forest.
///
/// Targets are taken from the tree's anchor indices, so the tree must have
/// had its targets resolved. Private nodes and nodes read from another
/// index are left out together with everything below them.
pub struct IndexWriter<'a> {
    forest: &'a Forest,
    tree: &'a Tree,
    meta: IndexMeta,
    writer: Writer<Vec<u8>>,
}

impl<'a> IndexWriter<'a> {
    pub fn new(forest: &'a Forest, tree: TreeId, meta: IndexMeta) -> ScribeResult<Self> {
        let tree = forest
            .tree(tree)
            .ok_or_else(|| ScribeError::index(format!("No tree with id {}", tree.0)))?;
        Ok(Self {
            forest,
            tree,
            meta,
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        })
    }

    /// Serialize the tree and return the document
    pub fn write_to_string(mut self) -> ScribeResult<String> {
        tracing::debug!(module = %self.tree.module_name(), "writing index");
        if !self.tree.targets_resolved() {
            tracing::warn!(module = %self.tree.module_name(), "writing index before targets are resolved");
        }
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.emit(Event::DocType(BytesText::new(INDEX_DOCTYPE)))?;

        let mut root = BytesStart::new("INDEX");
        root.push_attribute(("url", self.meta.url.as_str()));
        root.push_attribute(("title", self.meta.title.as_str()));
        root.push_attribute(("indexTitle", self.meta.index_title.as_str()));
        root.push_attribute(("version", self.meta.version.as_str()));
        root.push_attribute(("project", self.meta.project.as_str()));
        self.emit(Event::Start(root))?;

        let tree_root = self.tree.root();
        self.write_node(tree_root)?;
        self.write_collections()?;

        self.emit(Event::End(BytesEnd::new("INDEX")))?;
        String::from_utf8(self.writer.into_inner()).map_err(ScribeError::xml)
    }

    pub fn write_to_file(self, path: &Path) -> ScribeResult<()> {
        let content = self.write_to_string()?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "index written");
        Ok(())
    }

    fn emit(&mut self, event: Event<'_>) -> ScribeResult<()> {
        self.writer.write_event(event).map_err(ScribeError::xml)
    }

    fn write_node(&mut self, id: NodeId) -> ScribeResult<()> {
        let tree = self.tree;
        let element = tree.get(id).kind.element_name();
        self.open(element, self.node_attributes(id))?;
        self.write_anchors(id)?;
        self.write_details(id)?;
        for child in self.ordered_children(id) {
            self.write_node(child)?;
        }
        self.emit(Event::End(BytesEnd::new(element)))
    }

    fn open(&mut self, element: &str, attributes: Attributes) -> ScribeResult<()> {
        let mut start = BytesStart::new(element);
        for (key, value) in &attributes {
            start.push_attribute((*key, value.as_str()));
        }
        self.emit(Event::Start(start))
    }

    fn empty(&mut self, element: &str, attributes: &[(&str, &str)]) -> ScribeResult<()> {
        let mut start = BytesStart::new(element);
        for attribute in attributes {
            start.push_attribute(*attribute);
        }
        self.emit(Event::Empty(start))
    }

    /// Functions first, each overload chain in overload order, then the
    /// other children
    fn ordered_children(&self, id: NodeId) -> Vec<NodeId> {
        let tree = self.tree;
        let children: Vec<NodeId> = tree
            .get(id)
            .children
            .iter()
            .copied()
            .filter(|&c| is_indexed(tree.get(c)))
            .collect();

        let mut chains: IndexMap<&str, Vec<NodeId>> = IndexMap::new();
        for &c in &children {
            let node = tree.get(c);
            if node.is_function() {
                chains.entry(node.name.as_str()).or_default().push(c);
            }
        }
        let mut ordered = Vec::with_capacity(children.len());
        for (_, mut chain) in chains {
            chain.sort_by_key(|&c| tree.get(c).function_data().map_or(0, |f| f.overload_number));
            ordered.extend(chain);
        }
        ordered.extend(children.into_iter().filter(|&c| !tree.get(c).is_function()));
        ordered
    }

    fn node_attributes(&self, id: NodeId) -> Attributes {
        let tree = self.tree;
        let node = tree.get(id);
        let mut attrs: Attributes = vec![("name", node.name.clone())];
        let href = href_for(tree, id);
        if !href.is_empty() {
            attrs.push(("href", href));
        }
        attrs.push(("status", node.status.name().to_string()));
        attrs.push(("access", node.access.name().to_string()));
        if !node.since.is_empty() {
            attrs.push(("since", node.since.clone()));
        }
        if node.related_nonmember {
            attrs.push(("related", flag(true)));
        }
        let location = node.doc_location();
        if !location.is_unknown() {
            attrs.push(("location", location.file_name().to_string()));
            attrs.push(("filepath", location.file.clone()));
            attrs.push(("lineno", location.line.to_string()));
        }
        attrs.push(("documented", flag(node.has_doc())));
        if !node.groups.is_empty() {
            attrs.push(("groups", node.groups.join(",")));
        }
        if !node.physical_module.is_empty() {
            attrs.push(("module", node.physical_module.clone()));
        }

        match &node.kind {
            NodeKind::Class {
                bases, is_abstract, ..
            } => {
                let names: Vec<String> = bases
                    .iter()
                    .map(|b| match b.node {
                        Some(r) => self.forest.full_name(r),
                        None => b.signature(),
                    })
                    .collect();
                if !names.is_empty() {
                    attrs.push(("bases", names.join(",")));
                }
                attrs.push(("abstract", flag(*is_abstract)));
            }
            NodeKind::HeaderFile { title } => attrs.push(("title", title.clone())),
            NodeKind::QmlType { base, title } => {
                attrs.push(("title", title.clone()));
                if !base.is_empty() {
                    attrs.push(("qml-base-type", base.clone()));
                }
            }
            NodeKind::QmlProperty {
                data_type,
                read_only,
            } => {
                attrs.push(("type", data_type.clone()));
                attrs.push(("readonly", flag(*read_only)));
            }
            NodeKind::Collection { title, seen, .. } => {
                attrs.push(("title", title.clone()));
                attrs.push(("seen", flag(*seen)));
            }
            NodeKind::Page {
                title,
                subtitle,
                subtype,
            } => {
                attrs.push(("title", title.clone()));
                if !subtitle.is_empty() {
                    attrs.push(("subtitle", subtitle.clone()));
                }
                attrs.push(("subtype", subtype.name().to_string()));
            }
            NodeKind::Enum { scoped, .. } => attrs.push(("scoped", flag(*scoped))),
            NodeKind::TypeAlias { aliased } => attrs.push(("aliased", aliased.clone())),
            NodeKind::Property {
                data_type,
                writable,
                bindable,
            } => {
                attrs.push(("type", data_type.clone()));
                attrs.push(("writable", flag(*writable)));
                attrs.push(("bindable", flag(*bindable)));
            }
            NodeKind::Function(data) => {
                attrs.push(("meta", data.metaness.name().to_string()));
                attrs.push(("virtual", data.virtualness.name().to_string()));
                attrs.push(("const", flag(data.is_const)));
                attrs.push(("static", flag(data.is_static)));
                attrs.push(("overload", flag(data.is_overload)));
                attrs.push(("overload-number", data.overload_number.to_string()));
                attrs.push(("signature", data.signature(&node.name)));
                attrs.push(("type", data.return_type.clone()));
            }
            NodeKind::Variable {
                data_type,
                is_static,
            } => {
                attrs.push(("type", data_type.clone()));
                attrs.push(("static", flag(*is_static)));
            }
            NodeKind::Namespace { .. } | NodeKind::Typedef | NodeKind::Proxy => {}
        }

        let brief = if node.doc.is_empty() {
            node.brief.clone()
        } else {
            node.doc.trimmed_brief_text(&node.name).to_plain_string()
        };
        if !brief.is_empty() {
            attrs.push(("brief", brief));
        }
        attrs
    }

    /// `<target>`, `<keyword>` and `<contents>` records owned by the node
    fn write_anchors(&mut self, id: NodeId) -> ScribeResult<()> {
        let tree = self.tree;
        for (_, rec) in tree.targets_for(id) {
            self.empty(
                rec.target_type.element_name(),
                &[("name", rec.anchor.as_str()), ("title", rec.title.as_str())],
            )?;
        }
        Ok(())
    }

    /// Function parameters and enum values
    fn write_details(&mut self, id: NodeId) -> ScribeResult<()> {
        let tree = self.tree;
        match &tree.get(id).kind {
            NodeKind::Function(data) => {
                for p in &data.parameters {
                    self.empty(
                        "parameter",
                        &[
                            ("type", p.ty.as_str()),
                            ("name", p.name.as_str()),
                            ("default", p.default_value.as_str()),
                        ],
                    )?;
                }
            }
            NodeKind::Enum { items, .. } => {
                for item in items {
                    let mut attrs = vec![("name", item.name.as_str()), ("value", item.value.as_str())];
                    if !item.since.is_empty() {
                        attrs.push(("since", item.since.as_str()));
                    }
                    self.empty("value", &attrs)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Groups, modules and QML modules, after every node they can list
    fn write_collections(&mut self) -> ScribeResult<()> {
        let tree = self.tree;
        for kind in [
            CollectionKind::Group,
            CollectionKind::Module,
            CollectionKind::QmlModule,
        ] {
            for (_, &id) in tree.collections(kind) {
                let node = tree.get(id);
                if node.from_index || node.is_private() {
                    continue;
                }
                self.open(kind.element_name(), self.node_attributes(id))?;
                self.write_anchors(id)?;
                if let NodeKind::Collection { members, .. } = &node.kind {
                    for member in members {
                        if member.tree != tree.id() || !is_indexed(tree.get(member.node)) {
                            continue;
                        }
                        let key = member_key(tree, member.node);
                        self.empty("member", &[("name", key.as_str())])?;
                    }
                }
                self.emit(Event::End(BytesEnd::new(kind.element_name())))?;
            }
        }
        Ok(())
    }
}

fn is_indexed(node: &Node) -> bool {
    !node.is_private() && !node.from_index && !node.is_collection()
}

fn flag(value: bool) -> String {
    let text = if value { "true" } else { "false" };
    text.to_string()
}
