//! All loaded trees and the passes that join them
//!
//! A [`Forest`] holds the primary tree (the module being documented) and
//! one tree per dependency index. Every cross-module lookup walks the trees
//! in the search order: the primary tree first, then the declared
//! dependencies, then whatever else was loaded.
//!
//! The resolution passes (base classes, namespaces, proxies, collections)
//! run after all trees exist and mutate several trees at once, so each pass
//! first collects what it will change and then applies it.

use crate::atom::Atom;
use crate::diagnostics::{Diagnostic, DiagnosticSink, ScribeError, ScribeResult};
use crate::location::Location;
use crate::node::{
    CollectionKind, FindFlags, Genus, Node, NodeId, NodeKind, NodeRef, Parameter, TreeId,
};
use crate::tree::{NodeStore, TargetMatch, TargetType, Tree};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashSet;

lazy_static::lazy_static! {
    static ref SINGLE_DIGIT: Regex = Regex::new(r"\b([0-9])\b").unwrap();
}

/// The set of loaded trees
#[derive(Debug, Default)]
pub struct Forest {
    trees: Vec<Tree>,
    primary: Option<TreeId>,
    /// Lower-cased module name to tree, in load order
    modules: IndexMap<String, TreeId>,
    /// Index tree being read
    current: Option<TreeId>,
    search_order: Vec<TreeId>,
    namespace_index: IndexMap<String, NodeRef>,
    namespaces_resolved: bool,
    merged: HashSet<NodeRef>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_tree(&mut self, module: &str) -> TreeId {
        let id = TreeId(self.trees.len());
        self.trees.push(Tree::new(id, module));
        self.modules.insert(module.to_lowercase(), id);
        id
    }

    /// Create the tree an index file for `module` is read into. It heads
    /// the search order until the final order is set.
    pub fn new_index_tree(&mut self, module: &str) -> TreeId {
        let id = self.add_tree(module);
        self.current = Some(id);
        tracing::debug!(module, tree = id.0, "new index tree");
        id
    }

    /// Create the tree for the module being documented
    pub fn new_primary_tree(&mut self, module: &str) -> TreeId {
        let id = self.add_tree(module);
        self.primary = Some(id);
        id
    }

    pub fn primary(&self) -> Option<TreeId> {
        self.primary
    }

    pub fn primary_tree(&self) -> Option<&Tree> {
        self.primary.and_then(|id| self.trees.get(id.0))
    }

    pub fn primary_tree_mut(&mut self) -> Option<&mut Tree> {
        self.primary.and_then(|id| self.trees.get_mut(id.0))
    }

    pub fn tree(&self, id: TreeId) -> Option<&Tree> {
        self.trees.get(id.0)
    }

    pub fn tree_mut(&mut self, id: TreeId) -> Option<&mut Tree> {
        self.trees.get_mut(id.0)
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Tree of `module`, matched case-insensitively
    pub fn find_tree(&self, module: &str) -> Option<TreeId> {
        self.modules.get(&module.to_lowercase()).copied()
    }

    pub fn node_mut(&mut self, r: NodeRef) -> Option<&mut Node> {
        let tree = self.trees.get_mut(r.tree.0)?;
        (r.node.0 < tree.len()).then(|| tree.get_mut(r.node))
    }

    /// Fix the search order: the primary tree, then `dependencies` in the
    /// given order, then any other loaded tree in load order.
    ///
    /// Only the first call has an effect.
    pub fn set_search_order(&mut self, dependencies: &[String]) -> ScribeResult<()> {
        if !self.search_order.is_empty() {
            return Ok(());
        }
        let primary = self
            .primary
            .ok_or_else(|| ScribeError::fatal(Location::unknown(), "No primary tree to search"))?;
        let mut order = vec![primary];
        for dependency in dependencies {
            if let Some(id) = self.find_tree(dependency) {
                if !order.contains(&id) {
                    order.push(id);
                }
            }
        }
        for &id in self.modules.values() {
            if !order.contains(&id) {
                order.push(id);
            }
        }
        tracing::debug!(
            order = ?order.iter().map(|id| self.trees[id.0].module_name()).collect::<Vec<_>>(),
            "search order set"
        );
        self.search_order = order;
        self.current = None;
        Ok(())
    }

    pub fn is_search_order_set(&self) -> bool {
        !self.search_order.is_empty()
    }

    /// Trees in search order. Until the order is set, the index tree being
    /// read comes first and the other trees follow in load order.
    pub fn search_order(&self) -> Vec<TreeId> {
        if !self.search_order.is_empty() {
            return self.search_order.clone();
        }
        let mut order: Vec<TreeId> = self.current.into_iter().collect();
        order.extend(self.modules.values().copied().filter(|&id| Some(id) != self.current));
        order
    }

    /// First node along the search order whose `path` matches `is_match`
    pub fn find_node_by_name_and_type(&self, path: &[String], is_match: fn(&Node) -> bool) -> Option<NodeRef> {
        self.search_order().into_iter().find_map(|id| {
            let tree = &self.trees[id.0];
            tree.find_node_recursive(path, 0, tree.root(), is_match)
                .map(|n| tree.node_ref(n))
        })
    }

    pub fn find_class_node(&self, path: &[String]) -> Option<NodeRef> {
        self.search_order().into_iter().find_map(|id| {
            let tree = &self.trees[id.0];
            tree.find_class_node(path, None).map(|n| tree.node_ref(n))
        })
    }

    /// Namespace, class or QML type by `::` qualified name
    pub fn find_aggregate(&self, name: &str) -> Option<NodeRef> {
        self.search_order().into_iter().find_map(|id| {
            let tree = &self.trees[id.0];
            tree.find_aggregate(name).map(|n| tree.node_ref(n))
        })
    }

    pub fn find_page_node_by_title(&self, title: &str) -> Option<NodeRef> {
        self.search_order().into_iter().find_map(|id| {
            let tree = &self.trees[id.0];
            tree.find_page_node_by_title(title).map(|n| tree.node_ref(n))
        })
    }

    /// Resolve `entity` (a `::` qualified name, page title or anchor) with
    /// an optional `target` anchor on the found node.
    ///
    /// `relative` only applies to the first tree searched. A match on a
    /// section title is kept while the remaining trees are searched for a
    /// better one.
    pub fn find_node_for_target(
        &self,
        entity: &str,
        target: Option<&str>,
        relative: Option<NodeRef>,
        genus: Genus,
    ) -> Option<TargetMatch> {
        let flags = FindFlags::SEARCH_BASE_CLASSES | FindFlags::SEARCH_ENUM_VALUES;
        let path: Vec<String> = entity.split("::").map(str::to_string).collect();
        let target = target.unwrap_or("");
        let mut relative = relative;
        let mut section = None;
        for id in self.search_order() {
            let found = self.trees[id.0].find_node_for_target(&path, target, relative, flags, genus, self);
            if let Some(m) = found {
                if m.target_type != TargetType::Contents {
                    return Some(m);
                }
                section.get_or_insert(m);
            }
            relative = None;
        }
        section
    }

    /// Resolve a function reference such as `QString::arg(int, int)` or
    /// `QObject::tr()`
    pub fn find_function_node(&self, target: &str, relative: Option<NodeRef>, genus: Genus) -> Option<NodeRef> {
        let (path, params) = split_function_target(target);
        let mut relative = relative;
        for id in self.search_order() {
            if let Some(f) = self.trees[id.0].find_function_node(&path, &params, relative, genus, self) {
                return Some(f);
            }
            relative = None;
        }
        None
    }

    /// Resolve `target` as a `.html` page name, a qualified name, or a page
    /// title, in that order. An empty target names `relative`.
    pub fn find_node_by_path(&self, target: &str, relative: Option<NodeRef>) -> Option<NodeRef> {
        if target.is_empty() {
            return relative;
        }
        if target.ends_with(".html") {
            return self.find_node_by_name_and_type(&[target.to_string()], Node::is_text_page);
        }
        let path: Vec<String> = target.split("::").map(str::to_string).collect();
        let flags = FindFlags::SEARCH_BASE_CLASSES | FindFlags::SEARCH_ENUM_VALUES;
        let mut relative = relative;
        for id in self.search_order() {
            if let Some(n) = self.trees[id.0].find_node(&path, relative, flags, Genus::DontCare, self) {
                return Some(n);
            }
            relative = None;
        }
        self.find_page_node_by_title(target)
    }

    /// Resolve the link or auto-link `atom` written in the docs of
    /// `relative`.
    ///
    /// The atom string is `path#anchor`. A link scoped to one module by its
    /// bracket parameters searches only that module's tree; otherwise the
    /// whole search order is used. A `#anchor` alone refers to `relative`.
    pub fn find_node_for_atom(&self, atom: &Atom, relative: Option<NodeRef>, genus: Genus) -> Option<TargetMatch> {
        let mut legs = atom.string().split('#');
        let first = legs.next().unwrap_or_default().trim();
        let anchor_leg = legs.next();

        let (domain, genus) = if atom.is_link_atom() {
            let scope = atom.link_scope(|module| self.find_tree(module));
            (scope.domain, scope.genus)
        } else {
            (None, genus)
        };

        let mut node = None;
        if first.is_empty() {
            node = relative;
        } else if let Some(domain) = domain {
            let tree = self.trees.get(domain.0)?;
            if first.ends_with(".html") {
                node = tree
                    .find_node_recursive(&[first.to_string()], 0, tree.root(), Node::is_text_page)
                    .map(|n| tree.node_ref(n));
            } else if first.ends_with(')') {
                let (path, params) = split_function_target(first);
                node = tree.find_function_node(&path, &params, None, genus, self);
            }
            if node.is_none() {
                let path: Vec<String> = first.split("::").map(str::to_string).collect();
                let flags = FindFlags::SEARCH_BASE_CLASSES | FindFlags::SEARCH_ENUM_VALUES;
                let relative = relative.filter(|r| r.tree == domain);
                return tree.find_node_for_target(&path, anchor_leg.unwrap_or(""), relative, flags, genus, self);
            }
        } else {
            if first.ends_with(".html") {
                node = self.find_node_by_name_and_type(&[first.to_string()], Node::is_text_page);
            } else if first.ends_with(')') {
                node = self.find_function_node(first, relative, genus);
            }
            if node.is_none() {
                return self.find_node_for_target(first, anchor_leg, relative, genus);
            }
        }

        let node = node?;
        let mut anchor = String::new();
        if self.node(node)?.url.is_empty() {
            if let Some(target) = anchor_leg {
                anchor = self.trees.get(node.tree.0)?.get_ref(target, node)?;
            }
        }
        Some(TargetMatch {
            node,
            anchor,
            target_type: TargetType::Unknown,
        })
    }

    /// Bind the base classes of every class in `tree` that are still
    /// unresolved. Returns how many were bound.
    ///
    /// A base is looked up by qualified name along the search order; if that
    /// fails and the class sits in a named namespace, the name is retried
    /// from that namespace.
    pub fn resolve_base_classes_in(&mut self, tree_id: TreeId) -> usize {
        let Some(tree) = self.trees.get(tree_id.0) else {
            return 0;
        };
        let mut bindings = Vec::new();
        for (class, index, path) in tree.unresolved_bases() {
            let mut base = self.find_class_node(&path);
            if base.is_none() {
                if let Some(parent) = tree.get(class).parent {
                    let p = tree.get(parent);
                    if p.is_namespace() && !p.name.is_empty() {
                        base = tree.find_class_node(&path, Some(parent)).map(|b| tree.node_ref(b));
                    }
                }
            }
            if let Some(base) = base {
                let access = tree.get(class).bases().get(index).map(|b| b.access).unwrap_or_default();
                bindings.push((class, index, base, access));
            }
        }

        let bound = bindings.len();
        for (class, index, base, access) in bindings {
            self.trees[tree_id.0].set_base_node(class, index, base);
            if let Some(base_tree) = self.trees.get_mut(base.tree.0) {
                base_tree.add_derived_class(base.node, access, NodeRef::new(tree_id, class));
            }
        }
        tracing::debug!(module = %self.trees[tree_id.0].module_name(), bound, "resolved base classes");
        bound
    }

    /// Retry unresolved base classes in every tree
    pub fn resolve_base_classes(&mut self) -> usize {
        self.search_order()
            .into_iter()
            .map(|id| self.resolve_base_classes_in(id))
            .sum()
    }

    /// Join same-named namespaces across trees.
    ///
    /// The namespace documented in this run becomes the reference page and
    /// includes the public children of the others. Several documented
    /// namespaces of one name are an error. When none is documented here
    /// but an index says it was documented elsewhere, the others point at
    /// that one. When none is documented anywhere and `report_link_errors`
    /// is set, each documented child is reported.
    pub fn resolve_namespaces(&mut self, report_link_errors: bool, sink: &mut dyn DiagnosticSink) {
        if self.namespaces_resolved {
            return;
        }
        let mut groups: IndexMap<String, Vec<NodeRef>> = IndexMap::new();
        for id in self.search_order() {
            let tree = &self.trees[id.0];
            collect_namespaces(tree, tree.root(), &mut groups);
        }

        for (name, namespaces) in groups {
            let documented_here = namespaces
                .iter()
                .copied()
                .find(|&r| self.node(r).is_some_and(|n| !n.from_index && !n.doc.is_empty()));
            let documented_elsewhere = namespaces
                .iter()
                .copied()
                .filter(|&r| self.node(r).is_some_and(|n| n.from_index && n.had_doc))
                .last();

            if let Some(ns) = documented_here {
                let ns_location = self.node(ns).map(|n| n.doc_location().clone()).unwrap_or_default();
                for &other in &namespaces {
                    let Some(o) = self.node(other) else {
                        continue;
                    };
                    if other != ns && o.has_doc() {
                        sink.report(
                            Diagnostic::error(format!("Namespace {} documented more than once", name))
                                .at_location(&ns_location)
                                .with_details(format!("also seen here: {}", o.doc_location())),
                        );
                    }
                }
            } else if let Some(index_ns) = documented_elsewhere {
                for &other in &namespaces {
                    if other == index_ns {
                        continue;
                    }
                    if let Some(NodeKind::Namespace { doc_node, .. }) = self.node_mut(other).map(|n| &mut n.kind) {
                        *doc_node = Some(index_ns);
                    }
                }
            } else if report_link_errors {
                for &r in &namespaces {
                    if self.node(r).is_some_and(|n| !n.from_index) {
                        self.report_undocumented_namespace(r, &name, sink);
                    }
                }
            }

            if let Some(ns) = documented_here {
                let mut included = Vec::new();
                for &other in namespaces.iter().filter(|&&o| o != ns) {
                    for child in self.child_refs(other) {
                        if self.node(child).is_some_and(|c| c.access.is_public() && !c.is_internal()) {
                            included.push(child);
                        }
                    }
                }
                if let Some(NodeKind::Namespace { included_children, .. }) = self.node_mut(ns).map(|n| &mut n.kind) {
                    included_children.extend(included);
                }
            }

            let main = documented_here
                .or(documented_elsewhere)
                .or_else(|| namespaces.last().copied());
            if let Some(main) = main {
                self.namespace_index.insert(name, main);
            }
        }
        self.namespaces_resolved = true;
        tracing::debug!(namespaces = self.namespace_index.len(), "resolved namespaces");
    }

    fn report_undocumented_namespace(&self, ns: NodeRef, name: &str, sink: &mut dyn DiagnosticSink) {
        for child in self.child_refs(ns) {
            let Some(c) = self.node(child) else {
                continue;
            };
            if !c.is_in_api() {
                continue;
            }
            let mut subject = c.name.clone();
            if c.is_function() {
                subject.push_str("()");
            }
            sink.report(
                Diagnostic::warning(format!(
                    "{} is documented, but namespace {} is not documented in any module.",
                    subject, name
                ))
                .at_location(c.doc_location())
                .with_details(format!(
                    "Add /*! '\\namespace {}' ... */ or remove the qdoc comment marker (!) at that line number.",
                    name
                )),
            );
        }
    }

    /// The namespace chosen as the reference page for each qualified name
    pub fn namespace_index(&self) -> &IndexMap<String, NodeRef> {
        &self.namespace_index
    }

    fn child_refs(&self, parent: NodeRef) -> Vec<NodeRef> {
        self.node(parent)
            .map(|p| p.children.iter().map(|&c| NodeRef::new(parent.tree, c)).collect())
            .unwrap_or_default()
    }

    /// Children of a namespace plus those included from same-named
    /// namespaces in other trees
    pub fn namespace_members(&self, ns: NodeRef) -> Vec<NodeRef> {
        let mut members = self.child_refs(ns);
        if let Some(NodeKind::Namespace { included_children, .. }) = self.node(ns).map(|n| &n.kind) {
            members.extend(included_children.iter().copied());
        }
        members
    }

    /// Attach the members of proxies in dependency trees to the primary
    /// tree's aggregate of the same name, as related non-members. Proxies
    /// naming an aggregate the primary tree lacks lose their members.
    pub fn resolve_proxies(&mut self, sink: &mut dyn DiagnosticSink) {
        let Some(primary) = self.primary else {
            return;
        };
        let mut splices = Vec::new();
        let mut orphans = Vec::new();
        for id in self.search_order().into_iter().filter(|&id| id != primary) {
            let tree = &self.trees[id.0];
            for node_id in tree.preorder() {
                let proxy = tree.get(node_id);
                if !proxy.is_proxy() || proxy.children.is_empty() {
                    continue;
                }
                match self.trees[primary.0].find_aggregate(&proxy.name) {
                    Some(aggregate) => splices.push((aggregate, id, proxy.children.clone())),
                    None => orphans.push((id, node_id)),
                }
            }
        }

        for (aggregate, tree_id, children) in splices {
            for child in children {
                self.trees[tree_id.0].get_mut(child).related_nonmember = true;
                self.trees[primary.0]
                    .get_mut(aggregate)
                    .related
                    .push(NodeRef::new(tree_id, child));
            }
        }
        for (tree_id, proxy_id) in orphans {
            let proxy = self.trees[tree_id.0].get_mut(proxy_id);
            sink.report(
                Diagnostic::warning(format!(
                    "Cannot find '{}' in the primary module; dropping {} related members",
                    proxy.name,
                    proxy.children.len()
                ))
                .at_location(&proxy.location),
            );
            proxy.children.clear();
        }
        tracing::debug!("resolved proxies");
    }

    /// Merge the members of every same-named collection of `collection`'s
    /// kind into it. A placeholder takes the title and URL of the first
    /// defined one found. Runs once per collection.
    pub fn merge_collection(&mut self, collection: NodeRef) {
        if self.merged.contains(&collection) {
            return;
        }
        let Some((name, kind)) = self.node(collection).and_then(|n| match &n.kind {
            NodeKind::Collection { kind, .. } => Some((n.name.clone(), *kind)),
            _ => None,
        }) else {
            return;
        };

        let mut members = Vec::new();
        let mut definition = None;
        for id in self.search_order() {
            let tree = &self.trees[id.0];
            let Some(other) = tree.get_collection(&name, kind).map(|c| tree.node_ref(c)) else {
                continue;
            };
            if other == collection {
                continue;
            }
            if let Some(NodeKind::Collection { members: m, seen, title, .. }) = self.node(other).map(|n| &n.kind) {
                members.extend(m.iter().copied());
                if *seen && definition.is_none() {
                    definition = Some((title.clone(), self.node(other).map(|n| n.url.clone()).unwrap_or_default()));
                }
            }
        }

        if let Some(node) = self.node_mut(collection) {
            let mut adopt = None;
            if let NodeKind::Collection { members: m, seen, title, .. } = &mut node.kind {
                for member in members {
                    if !m.contains(&member) {
                        m.push(member);
                    }
                }
                if let (false, Some((other_title, url))) = (*seen, definition) {
                    *seen = true;
                    *title = other_title;
                    adopt = Some(url);
                }
            }
            if let Some(url) = adopt {
                node.url = url;
            }
        }
        self.merged.insert(collection);
    }

    /// One collection per name for `kind`, keyed by a sort key made from its
    /// title, with the members of its same-named peers merged in. Only
    /// collections defined by a topic command are listed, never `relative`.
    pub fn merge_collections(&mut self, kind: CollectionKind, relative: Option<NodeRef>) -> IndexMap<String, NodeRef> {
        let mut by_name: IndexMap<String, Vec<NodeRef>> = IndexMap::new();
        for id in self.search_order() {
            let tree = &self.trees[id.0];
            for (name, &c) in tree.collections(kind) {
                if !tree.get(c).is_internal() {
                    by_name.entry(name.clone()).or_default().push(tree.node_ref(c));
                }
            }
        }

        let mut result = IndexMap::new();
        for (_, collections) in by_name {
            let chosen = collections.iter().copied().find(|&c| {
                Some(c) != relative
                    && matches!(self.node(c).map(|n| &n.kind), Some(NodeKind::Collection { seen: true, .. }))
            });
            let Some(chosen) = chosen else {
                continue;
            };
            let mut extra = Vec::new();
            for &other in collections.iter().filter(|&&c| c != chosen) {
                if let Some(NodeKind::Collection { members, .. }) = self.node(other).map(|n| &n.kind) {
                    extra.extend(members.iter().copied());
                }
            }
            if let Some(NodeKind::Collection { members, .. }) = self.node_mut(chosen).map(|n| &mut n.kind) {
                for member in extra {
                    if !members.contains(&member) {
                        members.push(member);
                    }
                }
            }
            let title = self.node(chosen).map(|n| n.title().to_lowercase()).unwrap_or_default();
            result.insert(collection_sort_key(&title), chosen);
        }
        result.sort_keys();
        result
    }
}

impl NodeStore for Forest {
    fn node(&self, r: NodeRef) -> Option<&Node> {
        self.trees.get(r.tree.0)?.try_get(r.node)
    }
}

fn collect_namespaces(tree: &Tree, parent: NodeId, groups: &mut IndexMap<String, Vec<NodeRef>>) {
    for &child in &tree.get(parent).children {
        let node = tree.get(child);
        if !node.is_aggregate() || node.is_private() {
            continue;
        }
        if node.is_namespace() && !node.name.is_empty() {
            let r = tree.node_ref(child);
            groups.entry(tree.full_name(r)).or_default().push(r);
        }
        collect_namespaces(tree, child, groups);
    }
}

/// Sort key for a collection title: a leading "the " is dropped and
/// single digits are zero-padded so that "Qt 5" sorts before "Qt 10"
fn collection_sort_key(title: &str) -> String {
    let title = title.strip_prefix("the ").unwrap_or(title);
    SINGLE_DIGIT.replace_all(title, "0${1}").into_owned()
}

/// Split `A::f(int, bool)` into its path and parameter list
pub fn split_function_target(target: &str) -> (Vec<String>, Vec<Parameter>) {
    let mut function = target.strip_suffix("()").unwrap_or(target);
    let mut signature = "";
    if function.ends_with(')') {
        if let Some(open) = function.rfind('(') {
            signature = &function[open + 1..function.len() - 1];
            function = &function[..open];
        }
    }
    (
        function.split("::").map(str::to_string).collect(),
        Parameter::parse_list(signature),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticsCollector;
    use crate::doc::{Doc, DocPrivate};
    use crate::node::{Access, ClassFlavor, FunctionData, RelatedClass};
    use pretty_assertions::assert_eq;

    fn documented(file: &str, line: usize) -> Doc {
        let loc = Location::new(file, line, 1);
        Doc::from_private(DocPrivate::new(loc.clone(), loc, "documented"))
    }

    fn class_with_base(name: &str, base: &str) -> Node {
        let mut kind = NodeKind::class(ClassFlavor::Class);
        if let NodeKind::Class { bases, .. } = &mut kind {
            bases.push(RelatedClass::unresolved(Access::Public, base));
        }
        Node::new(name, kind)
    }

    fn add(forest: &mut Forest, tree: TreeId, parent: Option<NodeId>, node: Node) -> NodeId {
        let t = forest.tree_mut(tree).expect("tree exists");
        let parent = parent.unwrap_or(t.root());
        t.add_child(parent, node)
    }

    #[test]
    fn test_search_order() {
        let mut forest = Forest::new();
        let a = forest.new_index_tree("A");
        let c = forest.new_index_tree("C");
        let b = forest.new_index_tree("B");
        let p = forest.new_primary_tree("P");

        forest
            .set_search_order(&["A".to_string(), "B".to_string()])
            .expect("primary exists");
        assert_eq!(forest.search_order(), vec![p, a, b, c]);

        // Fixed after the first call
        forest
            .set_search_order(&["B".to_string()])
            .expect("primary exists");
        assert_eq!(forest.search_order(), vec![p, a, b, c]);
    }

    #[test]
    fn test_search_order_while_loading() {
        let mut forest = Forest::new();
        let a = forest.new_index_tree("A");
        let b = forest.new_index_tree("B");
        assert_eq!(forest.search_order(), vec![b, a]);
        let c = forest.new_index_tree("C");
        assert_eq!(forest.search_order(), vec![c, a, b]);
    }

    #[test]
    fn test_search_order_needs_primary() {
        let mut forest = Forest::new();
        forest.new_index_tree("A");
        let err = forest.set_search_order(&[]).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_base_class_in_other_tree() {
        let mut forest = Forest::new();
        let core = forest.new_index_tree("QtCore");
        let object = add(&mut forest, core, None, Node::new("QObject", NodeKind::class(ClassFlavor::Class)));
        let gui = forest.new_primary_tree("QtGui");
        let window = add(&mut forest, gui, None, class_with_base("QWindow", "QObject"));
        forest.set_search_order(&["QtCore".to_string()]).expect("primary exists");

        assert_eq!(forest.resolve_base_classes(), 1);
        let window_ref = NodeRef::new(gui, window);
        assert_eq!(forest.all_base_classes(window_ref), vec![NodeRef::new(core, object)]);
        match &forest.node(NodeRef::new(core, object)).map(|n| &n.kind) {
            Some(NodeKind::Class { derived, .. }) => assert_eq!(derived[0].node, Some(window_ref)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unqualified_base_in_same_namespace() {
        let mut forest = Forest::new();
        let p = forest.new_primary_tree("P");
        let ns = add(&mut forest, p, None, Node::new("ns", NodeKind::namespace()));
        let base = add(&mut forest, p, Some(ns), Node::new("Base", NodeKind::class(ClassFlavor::Class)));
        let sub = add(&mut forest, p, Some(ns), class_with_base("Sub", "Base"));
        forest.set_search_order(&[]).expect("primary exists");

        forest.resolve_base_classes();
        assert_eq!(forest.all_base_classes(NodeRef::new(p, sub)), vec![NodeRef::new(p, base)]);
    }

    #[test]
    fn test_base_resolved_in_second_pass() {
        let mut forest = Forest::new();
        let p = forest.new_primary_tree("P");
        let sub = add(&mut forest, p, None, class_with_base("Sub", "Late"));
        assert_eq!(forest.resolve_base_classes_in(p), 0);

        let late = forest.new_index_tree("L");
        let late_base = add(&mut forest, late, None, Node::new("Late", NodeKind::class(ClassFlavor::Class)));
        forest.set_search_order(&[]).expect("primary exists");
        assert_eq!(forest.resolve_base_classes(), 1);
        assert_eq!(forest.all_base_classes(NodeRef::new(p, sub)), vec![NodeRef::new(late, late_base)]);
    }

    #[test]
    fn test_namespace_merge() {
        let mut forest = Forest::new();
        let dep = forest.new_index_tree("Dep");
        let dep_ns = add(&mut forest, dep, None, Node::new("NS", NodeKind::namespace()));
        forest.tree_mut(dep).expect("tree").get_mut(dep_ns).from_index = true;
        let b = add(&mut forest, dep, Some(dep_ns), Node::new("b", NodeKind::Typedef));
        add(&mut forest, dep, Some(dep_ns), Node::new("hidden", NodeKind::Typedef).with_access(Access::Private));

        let p = forest.new_primary_tree("P");
        let ns = add(&mut forest, p, None, Node::new("NS", NodeKind::namespace()).with_doc(documented("ns.cpp", 1)));
        let a = add(&mut forest, p, Some(ns), Node::new("a", NodeKind::Typedef));
        forest.set_search_order(&[]).expect("primary exists");

        let mut sink = DiagnosticsCollector::new();
        forest.resolve_namespaces(true, &mut sink);
        assert!(sink.is_empty());
        assert_eq!(
            forest.namespace_members(NodeRef::new(p, ns)),
            vec![NodeRef::new(p, a), NodeRef::new(dep, b)]
        );
        assert_eq!(forest.namespace_index().get("NS"), Some(&NodeRef::new(p, ns)));
    }

    #[test]
    fn test_namespace_documented_twice() {
        let mut forest = Forest::new();
        let p = forest.new_primary_tree("P");
        add(&mut forest, p, None, Node::new("NS", NodeKind::namespace()).with_doc(documented("one.cpp", 4)));
        let dep = forest.new_index_tree("Dep");
        let other = add(&mut forest, dep, None, Node::new("NS", NodeKind::namespace()).at(Location::new("two.cpp", 9, 1)));
        {
            let node = forest.tree_mut(dep).expect("tree").get_mut(other);
            node.from_index = true;
            node.had_doc = true;
        }
        forest.set_search_order(&[]).expect("primary exists");

        let mut sink = DiagnosticsCollector::new();
        forest.resolve_namespaces(true, &mut sink);
        assert_eq!(sink.error_count(), 1);
        let formatted = sink.diagnostics()[0].format();
        assert!(formatted.contains("Namespace NS documented more than once"));
        assert!(formatted.contains("one.cpp:4"));
        assert!(formatted.contains("two.cpp:9"));
    }

    #[test]
    fn test_documented_child_in_undocumented_namespace() {
        let mut forest = Forest::new();
        let p = forest.new_primary_tree("P");
        let ns = add(&mut forest, p, None, Node::new("NS", NodeKind::namespace()));
        add(&mut forest, p, Some(ns), Node::new("f", NodeKind::function(FunctionData::default())).with_doc(documented("f.cpp", 2)));
        add(&mut forest, p, Some(ns), Node::new("g", NodeKind::function(FunctionData::default())));
        forest.set_search_order(&[]).expect("primary exists");

        let mut sink = DiagnosticsCollector::new();
        forest.resolve_namespaces(true, &mut sink);
        assert_eq!(
            sink.warnings(),
            vec!["f() is documented, but namespace NS is not documented in any module."]
        );
    }

    #[test]
    fn test_namespace_documented_elsewhere() {
        let mut forest = Forest::new();
        let dep = forest.new_index_tree("Dep");
        let dep_ns = add(&mut forest, dep, None, Node::new("NS", NodeKind::namespace()));
        {
            let node = forest.tree_mut(dep).expect("tree").get_mut(dep_ns);
            node.from_index = true;
            node.had_doc = true;
        }
        let p = forest.new_primary_tree("P");
        let ns = add(&mut forest, p, None, Node::new("NS", NodeKind::namespace()));
        forest.set_search_order(&[]).expect("primary exists");

        let mut sink = DiagnosticsCollector::new();
        forest.resolve_namespaces(true, &mut sink);
        assert!(sink.is_empty());
        match forest.node(NodeRef::new(p, ns)).map(|n| &n.kind) {
            Some(NodeKind::Namespace { doc_node, .. }) => assert_eq!(*doc_node, Some(NodeRef::new(dep, dep_ns))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resolve_proxies() {
        let mut forest = Forest::new();
        let p = forest.new_primary_tree("P");
        let string = add(&mut forest, p, None, Node::new("QString", NodeKind::class(ClassFlavor::Class)));
        let dep = forest.new_index_tree("Dep");
        let proxy = add(&mut forest, dep, None, Node::new("QString", NodeKind::Proxy));
        let helper = add(&mut forest, dep, Some(proxy), Node::new("qHash", NodeKind::function(FunctionData::default())));
        let orphan = add(&mut forest, dep, None, Node::new("Missing", NodeKind::Proxy));
        add(&mut forest, dep, Some(orphan), Node::new("f", NodeKind::function(FunctionData::default())));
        forest.set_search_order(&[]).expect("primary exists");

        let mut sink = DiagnosticsCollector::new();
        forest.resolve_proxies(&mut sink);
        let string_node = forest.node(NodeRef::new(p, string)).expect("node");
        assert_eq!(string_node.related, vec![NodeRef::new(dep, helper)]);
        assert!(forest.node(NodeRef::new(dep, helper)).is_some_and(|n| n.related_nonmember));
        assert_eq!(sink.warning_count(), 1);
        assert!(forest.node(NodeRef::new(dep, orphan)).is_some_and(|n| n.children.is_empty()));
    }

    #[test]
    fn test_section_title_is_a_fallback() {
        use crate::atom::{Atom, AtomType};
        use crate::doc::AnchorDef;

        let mut forest = Forest::new();
        let p = forest.new_primary_tree("P");
        let loc = Location::new("p.qdoc", 1, 1);
        let mut private = DocPrivate::new(loc.clone(), loc.clone(), "x");
        private.text.push(Atom::new(AtomType::SectionLeft, "1"));
        private.text.push(Atom::new(AtomType::SectionHeadingLeft, "1"));
        private.text.push_str("Overview");
        private.text.push(Atom::new(AtomType::SectionHeadingRight, "1"));
        private.toc.push(0);
        private.toc_levels.push(1);
        add(&mut forest, p, None, Node::new("p.html", NodeKind::page("P")).with_doc(Doc::from_private(private)));

        let dep = forest.new_index_tree("Dep");
        let mut target_doc = DocPrivate::new(loc.clone(), loc.clone(), "x");
        target_doc.text.push(Atom::new(AtomType::Target, "Overview"));
        target_doc.targets.push(AnchorDef { name: "Overview".into(), atom: 0, location: loc });
        let page = add(&mut forest, dep, None, Node::new("d.html", NodeKind::page("D")).with_doc(Doc::from_private(target_doc)));
        forest.set_search_order(&[]).expect("primary exists");

        let mut sink = DiagnosticsCollector::new();
        for id in forest.search_order() {
            forest.tree_mut(id).expect("tree").resolve_targets(&mut sink);
        }
        let found = forest.find_node_for_target("Overview", None, None, Genus::DontCare).expect("found");
        assert_eq!(found.node, NodeRef::new(dep, page));
        assert_eq!(found.target_type, TargetType::Target);
    }

    #[test]
    fn test_find_node_for_atom() {
        let mut forest = Forest::new();
        let p = forest.new_primary_tree("P");
        add(&mut forest, p, None, Node::new("QWidget", NodeKind::class(ClassFlavor::Class)));
        let core = forest.new_index_tree("QtCore");
        let object = add(&mut forest, core, None, Node::new("QObject", NodeKind::class(ClassFlavor::Class)));
        let data = FunctionData {
            parameters: vec![Parameter::new("const char *", "name")],
            ..FunctionData::default()
        };
        let set_name = add(&mut forest, core, Some(object), Node::new("setObjectName", NodeKind::function(data)));
        let page = add(&mut forest, core, None, Node::new("signals.html", NodeKind::page("Signals")));
        forest.set_search_order(&["QtCore".to_string()]).expect("primary exists");

        let link = Atom::link("QObject", "QtCore");
        let found = forest.find_node_for_atom(&link, None, Genus::DontCare).expect("found");
        assert_eq!(found.node, NodeRef::new(core, object));

        let wrong_module = Atom::link("QWidget", "QtCore");
        assert_eq!(forest.find_node_for_atom(&wrong_module, None, Genus::DontCare), None);

        let function = Atom::link("QObject::setObjectName(const char*)", "");
        let found = forest.find_node_for_atom(&function, None, Genus::DontCare).expect("found");
        assert_eq!(found.node, NodeRef::new(core, set_name));

        let html = Atom::new(crate::atom::AtomType::AutoLink, "signals.html");
        let found = forest.find_node_for_atom(&html, None, Genus::DontCare).expect("found");
        assert_eq!(found.node, NodeRef::new(core, page));

        let missing_anchor = Atom::link("signals.html#nowhere", "");
        assert_eq!(forest.find_node_for_atom(&missing_anchor, None, Genus::DontCare), None);
    }

    #[test]
    fn test_find_node_by_path() {
        let mut forest = Forest::new();
        let p = forest.new_primary_tree("P");
        let class = add(&mut forest, p, None, Node::new("QString", NodeKind::class(ClassFlavor::Class)));
        let page = add(&mut forest, p, None, Node::new("intro.html", NodeKind::page("Getting Started")));
        let mut sink = DiagnosticsCollector::new();
        forest.tree_mut(p).expect("tree").resolve_targets(&mut sink);
        forest.set_search_order(&[]).expect("primary exists");

        assert_eq!(forest.find_node_by_path("QString", None), Some(NodeRef::new(p, class)));
        assert_eq!(forest.find_node_by_path("intro.html", None), Some(NodeRef::new(p, page)));
        assert_eq!(forest.find_node_by_path("Getting Started", None), Some(NodeRef::new(p, page)));
        assert_eq!(forest.find_node_by_path("", Some(NodeRef::new(p, class))), Some(NodeRef::new(p, class)));
        assert_eq!(forest.find_aggregate("QString"), Some(NodeRef::new(p, class)));
    }

    #[test]
    fn test_merge_collections() {
        let mut forest = Forest::new();
        let p = forest.new_primary_tree("P");
        let widget = add(&mut forest, p, None, Node::new("QWidget", NodeKind::class(ClassFlavor::Class)));
        let placeholder = forest.tree_mut(p).expect("tree").add_to_group("painting", widget);

        let dep = forest.new_index_tree("Dep");
        let pen = add(&mut forest, dep, None, Node::new("QPen", NodeKind::class(ClassFlavor::Class)));
        {
            let tree = forest.tree_mut(dep).expect("tree");
            let group = tree.add_collection("painting", CollectionKind::Group);
            tree.get_mut(group).set_title("The Painting Classes 2");
            tree.get_mut(group).url = "https://example.org/painting.html".into();
            tree.add_to_group("painting", pen);
        }
        forest.set_search_order(&[]).expect("primary exists");

        let placeholder = NodeRef::new(p, placeholder);
        forest.merge_collection(placeholder);
        match forest.node(placeholder).map(|n| (&n.kind, n.url.as_str())) {
            Some((NodeKind::Collection { members, seen, title, .. }, url)) => {
                assert_eq!(members, &vec![NodeRef::new(p, widget), NodeRef::new(dep, pen)]);
                assert!(seen);
                assert_eq!(title, "The Painting Classes 2");
                assert_eq!(url, "https://example.org/painting.html");
            }
            other => panic!("unexpected {:?}", other),
        }

        let merged = forest.merge_collections(CollectionKind::Group, None);
        let keys: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["painting classes 02"]);
        assert_eq!(merged.get("painting classes 02"), Some(&placeholder));
    }

    #[test]
    fn test_split_function_target() {
        let (path, params) = split_function_target("QString::arg(int, QChar)");
        assert_eq!(path, vec!["QString", "arg"]);
        assert_eq!(params.iter().map(|p| p.ty.as_str()).collect::<Vec<_>>(), vec!["int", "QChar"]);
        let (path, params) = split_function_target("QObject::tr()");
        assert_eq!(path, vec!["QObject", "tr"]);
        assert!(params.is_empty());
    }

    #[test]
    fn test_collection_sort_key() {
        assert_eq!(collection_sort_key("the qt 5 modules"), "qt 05 modules");
        assert_eq!(collection_sort_key("qt 10"), "qt 10");
    }
}
