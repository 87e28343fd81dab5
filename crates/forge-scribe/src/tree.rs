//! One module's documented entities
//!
//! A [`Tree`] owns an arena of [`Node`]s rooted at an unnamed namespace,
//! plus the module's anchor indices: targets, keywords and section titles
//! keyed both by their exact title and by their canonical slug, and the
//! page-title index.
//!
//! Name lookups that can leave the tree (through a base class defined in
//! another module) are written against [`NodeStore`], which both a single
//! `Tree` and the whole [`Forest`](crate::forest::Forest) implement.

use crate::atom::AtomType;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::location::Location;
use crate::node::{
    Access, CollectionKind, FindFlags, Genus, Node, NodeId, NodeKind, NodeRef, Parameter,
    RelatedClass, TreeId,
};
use crate::utils::canonical_title;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Kind of anchor a [`TargetRec`] was made from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    Unknown,
    Target,
    Keyword,
    Contents,
}

impl TargetType {
    /// Lower wins when one name has several records
    pub fn priority(&self) -> u8 {
        match self {
            TargetType::Keyword => 1,
            TargetType::Target => 2,
            TargetType::Contents => 3,
            TargetType::Unknown => 4,
        }
    }

    pub fn element_name(&self) -> &'static str {
        match self {
            TargetType::Target => "target",
            TargetType::Keyword => "keyword",
            TargetType::Contents => "contents",
            TargetType::Unknown => "unknown",
        }
    }

    pub fn from_element_name(name: &str) -> Option<Self> {
        match name {
            "target" => Some(TargetType::Target),
            "keyword" => Some(TargetType::Keyword),
            "contents" => Some(TargetType::Contents),
            _ => None,
        }
    }
}

/// One linkable anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRec {
    /// Fragment identifier on the owning node's page
    pub anchor: String,
    /// Name or heading as written
    pub title: String,
    pub target_type: TargetType,
    pub node: NodeId,
    pub genus: Genus,
    pub priority: u8,
    pub location: Location,
}

/// Result of a target search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMatch {
    pub node: NodeRef,
    /// Fragment to link to, empty for the page itself
    pub anchor: String,
    /// `Unknown` when the node was found by name rather than by anchor
    pub target_type: TargetType,
}

/// Read access to nodes by [`NodeRef`], plus the child and base-class
/// searches built on it
pub trait NodeStore {
    fn node(&self, r: NodeRef) -> Option<&Node>;

    fn parent_of(&self, r: NodeRef) -> Option<NodeRef> {
        self.node(r)?.parent.map(|p| NodeRef::new(r.tree, p))
    }

    /// Children of `parent` called `name`, in insertion order
    fn children_named(&self, parent: NodeRef, name: &str) -> Vec<(NodeRef, &Node)> {
        let Some(p) = self.node(parent) else {
            return Vec::new();
        };
        p.children
            .iter()
            .filter_map(|&c| {
                let r = NodeRef::new(parent.tree, c);
                self.node(r).filter(|n| n.name == name).map(|n| (r, n))
            })
            .collect()
    }

    /// Find the child called `name`.
    ///
    /// With `DontCare` the first non-function child wins. Otherwise the
    /// first non-function child of a matching genus wins, honouring
    /// `TYPES_ONLY` and `IGNORE_MODULES`. When no non-function matches, the
    /// primary function of that name is returned, provided `genus` also
    /// matches `parent`.
    fn find_child_node(
        &self,
        parent: NodeRef,
        name: &str,
        genus: Genus,
        flags: FindFlags,
    ) -> Option<NodeRef> {
        let children = self.children_named(parent, name);
        let mut non_functions = children.iter().filter(|(_, n)| !n.is_function());
        if genus == Genus::DontCare {
            if let Some((r, _)) = non_functions.next() {
                return Some(*r);
            }
        } else {
            for (r, n) in non_functions {
                if !genus.matches(n.genus) {
                    continue;
                }
                if flags.contains(FindFlags::TYPES_ONLY) {
                    if !n.is_type() {
                        continue;
                    }
                } else if flags.contains(FindFlags::IGNORE_MODULES) && n.is_module() {
                    continue;
                }
                return Some(*r);
            }
            if !genus.matches(self.node(parent)?.genus) {
                return None;
            }
        }
        children
            .iter()
            .find(|(_, n)| n.is_function())
            .map(|(r, _)| *r)
    }

    /// All children called `name`: the overloads first, then the rest
    fn find_children(&self, parent: NodeRef, name: &str) -> Vec<NodeRef> {
        let children = self.children_named(parent, name);
        let functions = children.iter().filter(|(_, n)| n.is_function());
        let others = children.iter().filter(|(_, n)| !n.is_function());
        functions.chain(others).map(|(r, _)| *r).collect()
    }

    /// Find the overload of `name` taking `params`.
    ///
    /// Parameter types are compared with whitespace removed. Empty `params`
    /// prefers a function without parameters and otherwise accepts the first
    /// overload that is not internal.
    fn find_function_child(
        &self,
        parent: NodeRef,
        name: &str,
        params: &[Parameter],
    ) -> Option<NodeRef> {
        let overloads: Vec<(NodeRef, &Node)> = self
            .children_named(parent, name)
            .into_iter()
            .filter(|(_, n)| n.is_function())
            .collect();
        let (first, first_node) = *overloads.first()?;
        let param_count = |n: &Node| n.function_data().map_or(0, |f| f.parameters.len());

        if params.is_empty() && param_count(first_node) == 0 && !first_node.is_internal() {
            return Some(first);
        }
        let squeeze = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
        for (r, n) in &overloads {
            if n.is_internal() || param_count(n) != params.len() {
                continue;
            }
            let Some(data) = n.function_data() else {
                continue;
            };
            let matched = params
                .iter()
                .zip(&data.parameters)
                .all(|(a, b)| squeeze(&a.ty) == squeeze(&b.ty));
            if matched {
                return Some(*r);
            }
        }
        if params.is_empty() {
            return overloads
                .iter()
                .find(|(_, n)| !n.is_internal())
                .map(|(r, _)| *r)
                .or(Some(first));
        }
        None
    }

    /// The enum child of `parent` that has a value called `value`
    fn find_enum_node_for_value(&self, parent: NodeRef, value: &str) -> Option<NodeRef> {
        let p = self.node(parent)?;
        p.children
            .iter()
            .map(|&c| NodeRef::new(parent.tree, c))
            .find(|&r| self.node(r).is_some_and(|n| n.has_enum_item(value)))
    }

    /// Resolved base classes of `class`, transitively, nearest first
    fn all_base_classes(&self, class: NodeRef) -> Vec<NodeRef> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(class);
        collect_bases(self, class, &mut seen, &mut result);
        result
    }

    /// Names from the root down to `r`, root excluded
    fn qualified_path(&self, r: NodeRef) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(r);
        while let Some(c) = current {
            let Some(node) = self.node(c) else {
                break;
            };
            if node.parent.is_none() {
                break;
            }
            path.push(node.name.clone());
            current = self.parent_of(c);
        }
        path.reverse();
        path
    }

    /// `A::B::c`
    fn full_name(&self, r: NodeRef) -> String {
        self.qualified_path(r).join("::")
    }
}

fn collect_bases<S: NodeStore + ?Sized>(
    store: &S,
    class: NodeRef,
    seen: &mut HashSet<NodeRef>,
    result: &mut Vec<NodeRef>,
) {
    let Some(node) = store.node(class) else {
        return;
    };
    for base in node.bases() {
        if let Some(b) = base.node {
            if seen.insert(b) {
                result.push(b);
                collect_bases(store, b, seen, result);
            }
        }
    }
}

/// Documented entities of one module
#[derive(Debug, Clone)]
pub struct Tree {
    id: TreeId,
    module_name: String,
    physical_module_name: String,
    index_file_name: String,
    index_title: String,
    nodes: Vec<Node>,
    targets_by_ref: IndexMap<String, Vec<TargetRec>>,
    targets_by_title: IndexMap<String, Vec<TargetRec>>,
    page_nodes_by_title: IndexMap<String, Vec<NodeId>>,
    groups: IndexMap<String, NodeId>,
    modules: IndexMap<String, NodeId>,
    qml_modules: IndexMap<String, NodeId>,
    qml_type_map: IndexMap<String, NodeId>,
    targets_resolved: bool,
}

impl Tree {
    /// Create a tree holding only its root namespace
    pub fn new(id: TreeId, module_name: impl Into<String>) -> Self {
        let module_name = module_name.into();
        Self {
            id,
            physical_module_name: module_name.to_lowercase(),
            module_name,
            index_file_name: String::new(),
            index_title: String::new(),
            nodes: vec![Node::new("", NodeKind::namespace())],
            targets_by_ref: IndexMap::new(),
            targets_by_title: IndexMap::new(),
            page_nodes_by_title: IndexMap::new(),
            groups: IndexMap::new(),
            modules: IndexMap::new(),
            qml_modules: IndexMap::new(),
            qml_type_map: IndexMap::new(),
            targets_resolved: false,
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    /// Module name as configured, `QtCore`
    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Lower-cased module name, the key used by the forest
    pub fn physical_module_name(&self) -> &str {
        &self.physical_module_name
    }

    pub fn index_file_name(&self) -> &str {
        &self.index_file_name
    }

    pub fn set_index_file_name(&mut self, name: impl Into<String>) {
        self.index_file_name = name.into();
    }

    pub fn index_title(&self) -> &str {
        &self.index_title
    }

    pub fn set_index_title(&mut self, title: impl Into<String>) {
        self.index_title = title.into();
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_ref(&self) -> NodeRef {
        self.node_ref(self.root())
    }

    pub fn node_ref(&self, id: NodeId) -> NodeRef {
        NodeRef::new(self.id, id)
    }

    /// Node by id; ids are only ever minted by this tree
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn try_get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Add `node` as the last child of `parent`.
    ///
    /// A function whose overload number is unset is numbered after the
    /// existing functions of the same name.
    pub fn add_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        if let NodeKind::Function(data) = &mut node.kind {
            if data.overload_number == 0 {
                let existing = self.nodes[parent.0]
                    .children
                    .iter()
                    .filter(|c| {
                        let sibling = &self.nodes[c.0];
                        sibling.is_function() && sibling.name == node.name
                    })
                    .count();
                data.overload_number = existing as u16 + 1;
                data.is_overload = existing > 0;
            }
        }
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Every node below the root, depth first, parents before children
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.nodes[0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        order
    }

    /// Search downwards from `start` for `path`, accepting the last element
    /// only when `is_match` holds. Does not look at base classes.
    pub fn find_node_recursive(
        &self,
        path: &[String],
        index: usize,
        start: NodeId,
        is_match: fn(&Node) -> bool,
    ) -> Option<NodeId> {
        if path.is_empty() {
            return None;
        }
        let node = self.try_get(start)?;
        if !node.is_aggregate() {
            return (index >= path.len()).then_some(start);
        }
        let name = path.get(index)?;
        for &child in &node.children {
            let c = &self.nodes[child.0];
            if c.name != *name {
                continue;
            }
            if index + 1 >= path.len() {
                if is_match(c) {
                    return Some(child);
                }
                continue;
            }
            if let Some(found) = self.find_node_recursive(path, index + 1, child, is_match) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_class_node(&self, path: &[String], start: Option<NodeId>) -> Option<NodeId> {
        self.find_node_recursive(path, 0, start.unwrap_or(self.root()), Node::is_class)
    }

    pub fn find_namespace_node(&self, path: &[String]) -> Option<NodeId> {
        self.find_node_recursive(path, 0, self.root(), Node::is_namespace)
    }

    /// Find a namespace, class or QML type by its `::` qualified name
    pub fn find_aggregate(&self, name: &str) -> Option<NodeId> {
        let path: Vec<String> = name.split("::").map(str::to_string).collect();
        self.find_node_recursive(&path, 0, self.root(), Node::is_first_class_aggregate)
    }

    /// Insert an anchor record read from an index
    pub fn insert_target(
        &mut self,
        name: &str,
        title: &str,
        target_type: TargetType,
        node: NodeId,
        priority: u8,
    ) {
        let rec = TargetRec {
            anchor: name.to_string(),
            title: title.to_string(),
            target_type,
            node,
            genus: self.nodes[node.0].genus,
            priority,
            location: self.nodes[node.0].location.clone(),
        };
        self.targets_by_title
            .entry(title.to_string())
            .or_default()
            .push(rec.clone());
        self.targets_by_ref
            .entry(name.to_string())
            .or_default()
            .push(rec);
    }

    /// Build the page-title and anchor indices from the parsed docs.
    ///
    /// Runs once; later calls return immediately.
    pub fn resolve_targets(&mut self, sink: &mut dyn DiagnosticSink) {
        if self.targets_resolved {
            return;
        }
        tracing::debug!(module = %self.module_name, "resolving targets");
        for id in self.preorder() {
            self.index_page_title(id, sink);
            self.index_anchors(id, sink);
        }
        self.targets_resolved = true;
    }

    pub fn targets_resolved(&self) -> bool {
        self.targets_resolved
    }

    fn index_page_title(&mut self, id: NodeId, sink: &mut dyn DiagnosticSink) {
        let node = &self.nodes[id.0];
        let title = match &node.kind {
            NodeKind::Page { title, .. } | NodeKind::Collection { title, .. } => title.as_str(),
            _ => return,
        };
        if title.is_empty() {
            return;
        }
        let key = if title.contains(' ') {
            canonical_title(title)
        } else {
            title.to_string()
        };
        let existing = self.page_nodes_by_title.get(&key).cloned().unwrap_or_default();
        let already_there = existing.iter().any(|&e| {
            let other = &self.nodes[e.0];
            other.is_external_page() && other.name == node.name
        });
        if already_there {
            return;
        }
        if node.url.is_empty() && !node.from_index {
            let duplicate = existing.iter().find(|&&e| {
                let other = &self.nodes[e.0];
                other.url.is_empty() && !other.from_index
            });
            if let Some(&first) = duplicate {
                sink.report(
                    Diagnostic::warning(format!(
                        "This page title exists in more than one file: {}",
                        title
                    ))
                    .at_location(&self.nodes[first.0].location),
                );
                sink.report(Diagnostic::warning("[It also exists here]").at_location(&node.location));
            }
        }
        self.page_nodes_by_title.entry(key).or_default().push(id);
    }

    fn index_anchors(&mut self, id: NodeId, sink: &mut dyn DiagnosticSink) {
        let doc = self.nodes[id.0].doc.clone();
        let genus = self.nodes[id.0].genus;
        let body = doc.body();
        let mut records = Vec::new();

        for &atom in doc.table_of_contents() {
            let title = body.section_heading(atom).to_plain_string();
            let anchor = ref_for_atom(body, atom);
            if !anchor.is_empty() && !title.is_empty() {
                records.push((TargetType::Contents, anchor, title, doc.location().clone()));
            }
        }
        for (target_type, anchors) in [
            (TargetType::Keyword, doc.keywords()),
            (TargetType::Target, doc.targets()),
        ] {
            for anchor_def in anchors {
                let anchor = canonical_title(&anchor_def.name);
                if !anchor.is_empty() {
                    records.push((
                        target_type,
                        anchor,
                        anchor_def.name.clone(),
                        anchor_def.location.clone(),
                    ));
                }
            }
        }

        for (target_type, anchor, title, location) in records {
            let rec = TargetRec {
                anchor,
                title,
                target_type,
                node: id,
                genus,
                priority: target_type.priority(),
                location,
            };
            self.insert_record(canonical_title(&rec.title), rec, sink);
        }
    }

    fn insert_record(&mut self, key: String, rec: TargetRec, sink: &mut dyn DiagnosticSink) {
        if matches!(rec.target_type, TargetType::Target | TargetType::Keyword) {
            let prior = self.targets_by_ref.get(&key).and_then(|recs| {
                recs.iter()
                    .find(|r| r.target_type == rec.target_type && r.node != rec.node)
            });
            if let Some(prior) = prior {
                sink.report(
                    Diagnostic::warning(format!("Duplicate target '{}'", rec.title))
                        .at_location(&rec.location)
                        .with_details(format!("Previously defined at {}", prior.location)),
                );
            }
        }
        self.targets_by_title
            .entry(rec.title.clone())
            .or_default()
            .push(rec.clone());
        self.targets_by_ref.entry(key).or_default().push(rec);
    }

    /// Every anchor record, keyed by canonical slug
    pub fn target_records(&self) -> impl Iterator<Item = (&str, &TargetRec)> {
        self.targets_by_ref
            .iter()
            .flat_map(|(k, recs)| recs.iter().map(move |r| (k.as_str(), r)))
    }

    /// Anchor records owned by `node`, in registration order
    pub fn targets_for(&self, node: NodeId) -> Vec<(&str, &TargetRec)> {
        self.target_records().filter(|(_, r)| r.node == node).collect()
    }

    fn best_candidate<'a>(recs: Option<&'a Vec<TargetRec>>, genus: Genus) -> Option<&'a TargetRec> {
        let mut best: Option<&TargetRec> = None;
        for candidate in recs.into_iter().flatten() {
            if genus.matches(candidate.genus) && best.map_or(true, |b| candidate.priority < b.priority) {
                best = Some(candidate);
            }
        }
        best
    }

    /// Best anchor record for `target`: exact titles first, then canonical
    /// slugs. Within one map the lowest priority wins and the first
    /// registered record wins a tie.
    pub fn find_unambiguous_target(&self, target: &str, genus: Genus) -> Option<&TargetRec> {
        Self::best_candidate(self.targets_by_title.get(target), genus).or_else(|| {
            Self::best_candidate(self.targets_by_ref.get(&canonical_title(target)), genus)
        })
    }

    /// Records that tie with the best one for `target` but belong to other
    /// nodes; empty when the best record is unique.
    pub fn competing_targets(&self, target: &str, genus: Genus) -> Vec<&TargetRec> {
        let Some(best) = self.find_unambiguous_target(target, genus) else {
            return Vec::new();
        };
        let from_titles = Self::best_candidate(self.targets_by_title.get(target), genus).is_some();
        let recs = if from_titles {
            self.targets_by_title.get(target)
        } else {
            self.targets_by_ref.get(&canonical_title(target))
        };
        recs.into_iter()
            .flatten()
            .filter(|r| {
                genus.matches(r.genus) && r.priority == best.priority && r.node != best.node
            })
            .collect()
    }

    /// Anchor for `target` on `node`, if `node` owns such a record
    pub fn get_ref(&self, target: &str, node: NodeRef) -> Option<String> {
        if node.tree != self.id {
            return None;
        }
        let owned = |recs: Option<&Vec<TargetRec>>| {
            recs.into_iter()
                .flatten()
                .find(|r| r.node == node.node)
                .map(|r| r.anchor.clone())
        };
        owned(self.targets_by_title.get(target))
            .or_else(|| owned(self.targets_by_ref.get(&canonical_title(target))))
    }

    /// First page with `title`; titles containing spaces are matched by
    /// canonical slug
    pub fn find_page_node_by_title(&self, title: &str) -> Option<NodeId> {
        let key = if title.contains(' ') {
            canonical_title(title)
        } else {
            title.to_string()
        };
        self.page_nodes_by_title.get(&key)?.first().copied()
    }

    pub fn insert_qml_type(&mut self, key: impl Into<String>, node: NodeId) {
        self.qml_type_map.entry(key.into()).or_insert(node);
    }

    /// QML type by `module::Type` key
    pub fn lookup_qml_type(&self, key: &str) -> Option<NodeId> {
        self.qml_type_map.get(key).copied()
    }

    fn lookup_qml_path(&self, path: &[String], genus: Genus) -> Option<NodeId> {
        if matches!(genus, Genus::Qml | Genus::DontCare) && path.len() >= 2 && !path[0].is_empty() {
            self.lookup_qml_type(&format!("{}::{}", path[0], path[1]))
        } else {
            None
        }
    }

    /// Find the node that `path` plus the optional `target` anchor names.
    ///
    /// Tried in order: a page titled `path[0]` (doc genus only), the best
    /// anchor record for the joined path, then the path as a qualified name
    /// from `start` and each of its ancestors. An anchor that only names a
    /// section title is kept as the fallback when nothing better is found.
    pub fn find_node_for_target(
        &self,
        path: &[String],
        target: &str,
        start: Option<NodeRef>,
        flags: FindFlags,
        genus: Genus,
        store: &dyn NodeStore,
    ) -> Option<TargetMatch> {
        let ref_on = |n: NodeRef| -> Option<String> {
            if target.is_empty() {
                Some(String::new())
            } else {
                self.get_ref(target, n)
            }
        };

        if matches!(genus, Genus::DontCare | Genus::Doc) {
            if let Some(page) = path.first().and_then(|t| self.find_page_node_by_title(t)) {
                let page = self.node_ref(page);
                if let Some(anchor) = ref_on(page) {
                    return Some(TargetMatch {
                        node: page,
                        anchor,
                        target_type: TargetType::Unknown,
                    });
                }
            }
        }

        let mut deferred = None;
        if let Some(rec) = self.find_unambiguous_target(&path.join("::"), genus) {
            let node = self.node_ref(rec.node);
            if let Some(anchor) = ref_on(node) {
                if rec.target_type != TargetType::Contents {
                    let anchor = if target.is_empty() { rec.anchor.clone() } else { anchor };
                    return Some(TargetMatch {
                        node,
                        anchor,
                        target_type: rec.target_type,
                    });
                }
                deferred = Some(TargetMatch {
                    node,
                    anchor: rec.anchor.clone(),
                    target_type: TargetType::Contents,
                });
            }
        }

        let mut current = Some(start.unwrap_or_else(|| self.root_ref()));
        let mut index = 0;
        if let Some(qml_type) = self.lookup_qml_path(path, genus) {
            let qml_type = self.node_ref(qml_type);
            if path.len() == 2 {
                return ref_on(qml_type).map(|anchor| TargetMatch {
                    node: qml_type,
                    anchor,
                    target_type: TargetType::Unknown,
                });
            }
            current = Some(qml_type);
            index = 2;
        }

        while let Some(c) = current {
            if store.node(c).is_some_and(Node::is_aggregate) {
                if let Some(found) =
                    self.match_path_and_target(path, index, target, c, flags, genus, store)
                {
                    return Some(found);
                }
            }
            current = store.parent_of(c);
            index = 0;
        }
        deferred
    }

    #[allow(clippy::too_many_arguments)]
    fn match_path_and_target(
        &self,
        path: &[String],
        index: usize,
        target: &str,
        node: NodeRef,
        flags: FindFlags,
        genus: Genus,
        store: &dyn NodeStore,
    ) -> Option<TargetMatch> {
        let n = store.node(node)?;
        if index == path.len() {
            let anchor = if target.is_empty() {
                String::new()
            } else {
                self.get_ref(target, node)?
            };
            let mut found = node;
            if n.is_function() {
                if let Some(parent) = store.parent_of(node) {
                    if store.node(parent).is_some_and(|p| p.name == n.name) {
                        found = parent;
                    }
                }
            }
            return Some(TargetMatch {
                node: found,
                anchor,
                target_type: TargetType::Unknown,
            });
        }

        let name = &path[index];
        let visible = |m: &TargetMatch| !store.node(m.node).is_some_and(Node::is_private);
        if n.is_aggregate() {
            for child in store.find_children(node, name) {
                if !store.node(child).is_some_and(|c| genus.matches(c.genus)) {
                    continue;
                }
                if let Some(m) =
                    self.match_path_and_target(path, index + 1, target, child, flags, genus, store)
                {
                    if visible(&m) {
                        return Some(m);
                    }
                }
            }
        }
        let by_name = |node: NodeRef| TargetMatch {
            node,
            anchor: String::new(),
            target_type: TargetType::Unknown,
        };
        let search_enums = target.is_empty() && flags.contains(FindFlags::SEARCH_ENUM_VALUES);
        if search_enums {
            let enum_node = if n.is_aggregate() {
                find_enum_node(None, Some(node), path, index, store)
            } else {
                find_enum_node(Some(node), None, path, index, store)
            };
            if let Some(e) = enum_node {
                return Some(by_name(e));
            }
        }
        if matches!(genus, Genus::Cpp | Genus::DontCare)
            && n.is_class()
            && flags.contains(FindFlags::SEARCH_BASE_CLASSES)
        {
            for base in store.all_base_classes(node) {
                if let Some(m) =
                    self.match_path_and_target(path, index, target, base, flags, genus, store)
                {
                    if visible(&m) {
                        return Some(m);
                    }
                }
                if search_enums {
                    let child = store.find_child_node(base, name, genus, flags);
                    if let Some(e) = find_enum_node(child, Some(base), path, index, store) {
                        return Some(by_name(e));
                    }
                }
            }
        }
        None
    }

    /// Resolve `path` as a qualified name from `start`, retrying from each
    /// ancestor of `start` in turn.
    ///
    /// Elements before the last must be non-module scopes; `TYPES_ONLY`
    /// applies to the last element alone.
    pub fn find_node(
        &self,
        path: &[String],
        start: Option<NodeRef>,
        flags: FindFlags,
        genus: Genus,
        store: &dyn NodeStore,
    ) -> Option<NodeRef> {
        let mut current = start.unwrap_or_else(|| self.root_ref());
        loop {
            let mut node = Some(current);
            let mut i = 0;
            if let Some(qml_type) = self.lookup_qml_path(path, genus) {
                let qml_type = self.node_ref(qml_type);
                if path.len() == 2 {
                    return Some(qml_type);
                }
                node = Some(qml_type);
                i = 2;
            }

            while i < path.len() {
                let Some(n) = node.filter(|&n| store.node(n).is_some_and(Node::is_aggregate)) else {
                    break;
                };
                let step_flags = if i + 1 < path.len() {
                    flags.without(FindFlags::TYPES_ONLY) | FindFlags::IGNORE_MODULES
                } else {
                    flags
                };
                let mut next = store.find_child_node(n, &path[i], genus, step_flags);
                if flags.contains(FindFlags::SEARCH_ENUM_VALUES) {
                    if let Some(e) = find_enum_node(next, Some(n), path, i, store) {
                        return Some(e);
                    }
                }
                if next.is_none()
                    && matches!(genus, Genus::Cpp | Genus::DontCare)
                    && store.node(n).is_some_and(Node::is_class)
                    && flags.contains(FindFlags::SEARCH_BASE_CLASSES)
                {
                    for base in store.all_base_classes(n) {
                        next = store.find_child_node(base, &path[i], genus, step_flags);
                        if flags.contains(FindFlags::SEARCH_ENUM_VALUES) {
                            if let Some(e) = find_enum_node(next, Some(base), path, i, store) {
                                return Some(e);
                            }
                        }
                        if next.is_some() {
                            break;
                        }
                    }
                }
                node = next;
                i += 1;
            }
            if let Some(n) = node {
                if i == path.len() {
                    return Some(n);
                }
            }
            current = store.parent_of(current)?;
        }
    }

    /// Find the function `path` taking `params`, starting at `relative` and
    /// walking up through its ancestors. Base classes are searched too.
    pub fn find_function_node(
        &self,
        path: &[String],
        params: &[Parameter],
        relative: Option<NodeRef>,
        genus: Genus,
        store: &dyn NodeStore,
    ) -> Option<NodeRef> {
        if path.len() == 3 && !path[0].is_empty() && matches!(genus, Genus::Qml | Genus::DontCare) {
            let qml_type = self
                .lookup_qml_type(&format!("{}::{}", path[0], path[1]))
                .or_else(|| self.find_node_recursive(&path[1..2], 0, self.root(), Node::is_qml_type));
            if let Some(q) = qml_type {
                return store.find_function_child(self.node_ref(q), &path[2], params);
            }
        }

        let mut relative = match relative {
            Some(r) if genus == Genus::DontCare || store.node(r).is_some_and(|n| genus.matches(n.genus)) => r,
            _ => self.root_ref(),
        };
        loop {
            let mut node = Some(relative);
            let mut i = 0;
            while i < path.len() {
                let Some(n) = node.filter(|&n| store.node(n).is_some_and(Node::is_aggregate)) else {
                    break;
                };
                let last = i + 1 == path.len();
                let step = |aggregate: NodeRef| {
                    if last {
                        store.find_function_child(aggregate, &path[i], params)
                    } else {
                        store.find_child_node(aggregate, &path[i], genus, FindFlags::NONE)
                    }
                };
                let mut next = step(n);
                if next.is_none() && store.node(n).is_some_and(Node::is_class) {
                    next = store.all_base_classes(n).into_iter().find_map(step);
                }
                node = next;
                i += 1;
            }
            if let Some(n) = node {
                if i == path.len() && store.node(n).is_some_and(Node::is_function) {
                    return Some(n);
                }
            }
            relative = store.parent_of(relative)?;
        }
    }

    /// Base classes recorded by name but not yet bound to a node, as
    /// `(class, base index, path)`
    pub fn unresolved_bases(&self) -> Vec<(NodeId, usize, Vec<String>)> {
        let mut result = Vec::new();
        for id in self.preorder() {
            for (i, base) in self.nodes[id.0].bases().iter().enumerate() {
                if base.node.is_none() {
                    result.push((id, i, base.path.clone()));
                }
            }
        }
        result
    }

    /// Bind base `index` of `class` to `base`
    pub fn set_base_node(&mut self, class: NodeId, index: usize, base: NodeRef) {
        if let NodeKind::Class { bases, .. } = &mut self.nodes[class.0].kind {
            if let Some(b) = bases.get_mut(index) {
                b.node = Some(base);
            }
        }
    }

    /// Record `derived` as a subclass of `class`
    pub fn add_derived_class(&mut self, class: NodeId, access: Access, derived: NodeRef) {
        if let NodeKind::Class { derived: list, .. } = &mut self.nodes[class.0].kind {
            if !list.iter().any(|d| d.node == Some(derived)) {
                list.push(RelatedClass::resolved(access, derived));
            }
        }
    }

    fn collection_map(&self, kind: CollectionKind) -> &IndexMap<String, NodeId> {
        match kind {
            CollectionKind::Group => &self.groups,
            CollectionKind::Module => &self.modules,
            CollectionKind::QmlModule => &self.qml_modules,
        }
    }

    /// Collections of one kind, by name
    pub fn collections(&self, kind: CollectionKind) -> &IndexMap<String, NodeId> {
        self.collection_map(kind)
    }

    pub fn get_collection(&self, name: &str, kind: CollectionKind) -> Option<NodeId> {
        self.collection_map(kind).get(name).copied()
    }

    /// Find the collection, creating it under the root and marked not seen
    /// when absent
    pub fn find_collection(&mut self, name: &str, kind: CollectionKind) -> NodeId {
        if let Some(id) = self.get_collection(name, kind) {
            return id;
        }
        let root = self.root();
        let id = self.add_child(root, Node::new(name, NodeKind::collection(kind)));
        match kind {
            CollectionKind::Group => self.groups.insert(name.to_string(), id),
            CollectionKind::Module => self.modules.insert(name.to_string(), id),
            CollectionKind::QmlModule => self.qml_modules.insert(name.to_string(), id),
        };
        id
    }

    /// Find or create the collection and mark it as defined by a topic
    /// command
    pub fn add_collection(&mut self, name: &str, kind: CollectionKind) -> NodeId {
        let id = self.find_collection(name, kind);
        if let NodeKind::Collection { seen, .. } = &mut self.nodes[id.0].kind {
            *seen = true;
        }
        id
    }

    fn add_member(&mut self, collection: NodeId, member: NodeRef) {
        if let NodeKind::Collection { members, .. } = &mut self.nodes[collection.0].kind {
            if !members.contains(&member) {
                members.push(member);
            }
        }
    }

    /// Add `node` to group `name`; internal nodes are left out
    pub fn add_to_group(&mut self, name: &str, node: NodeId) -> NodeId {
        let group = self.find_collection(name, CollectionKind::Group);
        if !self.nodes[node.0].is_internal() {
            let member = self.node_ref(node);
            self.add_member(group, member);
            self.nodes[node.0].groups.push(name.to_string());
        }
        group
    }

    pub fn add_to_module(&mut self, name: &str, node: NodeId) -> NodeId {
        let module = self.find_collection(name, CollectionKind::Module);
        let member = self.node_ref(node);
        self.add_member(module, member);
        self.nodes[node.0].physical_module = name.to_string();
        module
    }

    /// Add `node` to the QML module named by the first word of `name`.
    ///
    /// A QML type is also registered under `module::Type`, and with a
    /// version such as `QtQuick 2.5` under `QtQuick2.5::Type` and
    /// `QtQuick2::Type`.
    pub fn add_to_qml_module(&mut self, name: &str, node: NodeId) -> NodeId {
        let mut words = name.split(' ');
        let module_name = words.next().unwrap_or_default();
        let mut ids = vec![module_name.to_string()];
        if let Some(version) = words.next() {
            ids.push(format!("{}{}", module_name, version));
            let major = version.split('.').next().unwrap_or_default();
            ids.push(format!("{}{}", module_name, major));
        }

        let module = self.find_collection(module_name, CollectionKind::QmlModule);
        let member = self.node_ref(node);
        self.add_member(module, member);
        if self.nodes[node.0].is_qml_type() {
            let type_name = self.nodes[node.0].name.clone();
            for id in ids {
                self.insert_qml_type(format!("{}::{}", id, type_name), node);
            }
        }
        module
    }
}

impl NodeStore for Tree {
    fn node(&self, r: NodeRef) -> Option<&Node> {
        if r.tree == self.id {
            self.nodes.get(r.node.0)
        } else {
            None
        }
    }
}

/// Match an enum for the element of `path` at `offset`, which must be the
/// last one.
///
/// When `node` is a scoped enum that has the value, it is the match (the
/// path spells `Enum::Value`). Otherwise, when nothing was found by name,
/// `aggregate` is asked for an enum having the value (`Class::Value`).
pub fn find_enum_node(
    node: Option<NodeRef>,
    aggregate: Option<NodeRef>,
    path: &[String],
    offset: usize,
    store: &dyn NodeStore,
) -> Option<NodeRef> {
    if offset + 1 != path.len() {
        return None;
    }
    let last = &path[offset];
    if let Some(r) = node {
        if store
            .node(r)
            .is_some_and(|n| n.is_scoped_enum() && n.has_enum_item(last))
        {
            return Some(r);
        }
    }
    match (node, aggregate) {
        (None, Some(a)) => store.find_enum_node_for_value(a, last),
        _ => None,
    }
}

/// Anchor for the section, target or keyword atom at `atom` in `text`
pub fn ref_for_atom(text: &crate::text::Text, atom: usize) -> String {
    match text.get(atom).map(|a| (a.atom_type(), a.string())) {
        Some((AtomType::SectionLeft, _)) => canonical_title(&text.section_heading(atom).to_plain_string()),
        Some((AtomType::Target | AtomType::Keyword, s)) => canonical_title(s),
        _ => String::new(),
    }
}
