//! Documented entities
//!
//! This module provides `Node`, the record for any documented entity: a
//! namespace, class, function, page, module and so on. Nodes live in the
//! arena of the [`Tree`](crate::tree::Tree) that owns them and refer to each
//! other by [`NodeId`]; references that cross trees use [`NodeRef`].
//!
//! The kinds form a closed set, [`NodeKind`], with the kind-specific data
//! carried in each variant.

use crate::doc::Doc;
use crate::location::Location;
pub use crate::visibility::{Access, Status};
use std::fmt;
use std::ops::BitOr;

/// Index of a node in its tree's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub usize);

/// Index of a tree in the forest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TreeId(pub usize);

/// A node anywhere in the forest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef {
    pub tree: TreeId,
    pub node: NodeId,
}

impl NodeRef {
    pub fn new(tree: TreeId, node: NodeId) -> Self {
        Self { tree, node }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tree.0, self.node.0)
    }
}

/// Language family of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Genus {
    #[default]
    DontCare,
    Cpp,
    Qml,
    Doc,
    /// C++ or QML
    Api,
}

impl Genus {
    fn bits(self) -> u8 {
        match self {
            Genus::DontCare => 0,
            Genus::Cpp => 0b001,
            Genus::Qml => 0b010,
            Genus::Doc => 0b100,
            Genus::Api => 0b011,
        }
    }

    /// Check whether an entity of genus `other` satisfies a search for
    /// `self`. `DontCare` accepts everything.
    pub fn matches(self, other: Genus) -> bool {
        self == Genus::DontCare || self.bits() & other.bits() != 0
    }

    pub fn name(&self) -> &'static str {
        match self {
            Genus::DontCare => "dontcare",
            Genus::Cpp => "cpp",
            Genus::Qml => "qml",
            Genus::Doc => "doc",
            Genus::Api => "api",
        }
    }
}

/// Restrictions for tree searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FindFlags(u8);

impl FindFlags {
    pub const NONE: FindFlags = FindFlags(0);
    /// Also look in the transitive base classes of a class
    pub const SEARCH_BASE_CLASSES: FindFlags = FindFlags(0b0001);
    /// Accept an enum whose values include the last path element
    pub const SEARCH_ENUM_VALUES: FindFlags = FindFlags(0b0010);
    /// Only typedefs, classes, QML types and enums match the last element
    pub const TYPES_ONLY: FindFlags = FindFlags(0b0100);
    /// Skip module collections
    pub const IGNORE_MODULES: FindFlags = FindFlags(0b1000);

    pub fn contains(self, other: FindFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn without(self, other: FindFlags) -> FindFlags {
        FindFlags(self.0 & !other.0)
    }
}

impl BitOr for FindFlags {
    type Output = FindFlags;

    fn bitor(self, rhs: FindFlags) -> FindFlags {
        FindFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassFlavor {
    Class,
    Struct,
    Union,
}

impl ClassFlavor {
    pub fn element_name(&self) -> &'static str {
        match self {
            ClassFlavor::Class => "class",
            ClassFlavor::Struct => "struct",
            ClassFlavor::Union => "union",
        }
    }
}

/// A base (or derived) class relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedClass {
    pub access: Access,
    /// Qualified name as written, split on `::`
    pub path: Vec<String>,
    /// The class once resolved
    pub node: Option<NodeRef>,
}

impl RelatedClass {
    pub fn unresolved(access: Access, signature: &str) -> Self {
        Self {
            access,
            path: signature.split("::").map(str::to_string).collect(),
            node: None,
        }
    }

    pub fn resolved(access: Access, node: NodeRef) -> Self {
        Self {
            access,
            path: Vec::new(),
            node: Some(node),
        }
    }

    /// The name as written, `A::B`
    pub fn signature(&self) -> String {
        self.path.join("::")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Group,
    Module,
    QmlModule,
}

impl CollectionKind {
    pub fn element_name(&self) -> &'static str {
        match self {
            CollectionKind::Group => "group",
            CollectionKind::Module => "module",
            CollectionKind::QmlModule => "qmlmodule",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PageSubtype {
    #[default]
    Page,
    Example,
    ExternalPage,
}

impl PageSubtype {
    pub fn name(&self) -> &'static str {
        match self {
            PageSubtype::Page => "page",
            PageSubtype::Example => "example",
            PageSubtype::ExternalPage => "externalpage",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "example" => PageSubtype::Example,
            "externalpage" => PageSubtype::ExternalPage,
            _ => PageSubtype::Page,
        }
    }
}

/// One value of an enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumItem {
    pub name: String,
    pub value: String,
    pub since: String,
}

/// One function parameter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Parameter {
    pub ty: String,
    pub name: String,
    pub default_value: String,
}

impl Parameter {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
            default_value: String::new(),
        }
    }

    /// Parse a comma separated C++ parameter list such as
    /// `const QString &str, int n = 0`.
    ///
    /// The last identifier of each entry is the name when the entry has
    /// more than one word; commas inside `<>` or `()` do not split.
    pub fn parse_list(signature: &str) -> Vec<Parameter> {
        let mut params = Vec::new();
        let mut depth = 0i32;
        let mut current = String::new();
        for ch in signature.chars() {
            match ch {
                '<' | '(' | '[' => depth += 1,
                '>' | ')' | ']' => depth -= 1,
                ',' if depth == 0 => {
                    params.extend(Self::parse_one(&current));
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }
        params.extend(Self::parse_one(&current));
        params
    }

    fn parse_one(text: &str) -> Option<Parameter> {
        let (decl, default_value) = match text.split_once('=') {
            Some((d, v)) => (d.trim(), v.trim().to_string()),
            None => (text.trim(), String::new()),
        };
        if decl.is_empty() {
            return None;
        }
        let split_at = decl
            .char_indices()
            .rev()
            .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
            .map(|(i, c)| i + c.len_utf8());
        let (ty, name) = match split_at {
            Some(i) if i < decl.len() && !decl[..i].trim().is_empty() => {
                (decl[..i].trim().to_string(), decl[i..].to_string())
            }
            _ => (decl.to_string(), String::new()),
        };
        Some(Parameter {
            ty,
            name,
            default_value,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Metaness {
    #[default]
    Plain,
    Signal,
    Slot,
    Ctor,
    Dtor,
    CCtor,
    MCtor,
    CAssign,
    MAssign,
    Native,
    MacroWithParams,
    MacroWithoutParams,
    QmlSignal,
    QmlSignalHandler,
    QmlMethod,
}

impl Metaness {
    pub fn name(&self) -> &'static str {
        match self {
            Metaness::Plain => "plain",
            Metaness::Signal => "signal",
            Metaness::Slot => "slot",
            Metaness::Ctor => "constructor",
            Metaness::Dtor => "destructor",
            Metaness::CCtor => "copy-constructor",
            Metaness::MCtor => "move-constructor",
            Metaness::CAssign => "copy-assign",
            Metaness::MAssign => "move-assign",
            Metaness::Native => "native",
            Metaness::MacroWithParams => "macrowithparams",
            Metaness::MacroWithoutParams => "macrowithoutparams",
            Metaness::QmlSignal => "qmlsignal",
            Metaness::QmlSignalHandler => "qmlsignalhandler",
            Metaness::QmlMethod => "qmlmethod",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "signal" => Metaness::Signal,
            "slot" => Metaness::Slot,
            "constructor" => Metaness::Ctor,
            "destructor" => Metaness::Dtor,
            "copy-constructor" => Metaness::CCtor,
            "move-constructor" => Metaness::MCtor,
            "copy-assign" => Metaness::CAssign,
            "move-assign" => Metaness::MAssign,
            "native" => Metaness::Native,
            "macrowithparams" | "macro" => Metaness::MacroWithParams,
            "macrowithoutparams" => Metaness::MacroWithoutParams,
            "qmlsignal" => Metaness::QmlSignal,
            "qmlsignalhandler" => Metaness::QmlSignalHandler,
            "qmlmethod" => Metaness::QmlMethod,
            _ => Metaness::Plain,
        }
    }

    pub fn is_qml(&self) -> bool {
        matches!(
            self,
            Metaness::QmlSignal | Metaness::QmlSignalHandler | Metaness::QmlMethod
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Virtualness {
    #[default]
    NonVirtual,
    Virtual,
    PureVirtual,
}

impl Virtualness {
    pub fn name(&self) -> &'static str {
        match self {
            Virtualness::NonVirtual => "non",
            Virtualness::Virtual => "virtual",
            Virtualness::PureVirtual => "pure",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "virtual" => Virtualness::Virtual,
            "pure" => Virtualness::PureVirtual,
            _ => Virtualness::NonVirtual,
        }
    }
}

/// Function-specific data
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionData {
    pub metaness: Metaness,
    /// Position in the overload chain, 1 for the primary function
    pub overload_number: u16,
    pub is_overload: bool,
    pub virtualness: Virtualness,
    pub is_const: bool,
    pub is_static: bool,
    pub return_type: String,
    pub parameters: Vec<Parameter>,
}

impl FunctionData {
    /// Parameter types joined for display, `(int, const QString &)`
    pub fn signature(&self, name: &str) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| {
                if p.name.is_empty() {
                    p.ty.clone()
                } else {
                    format!("{} {}", p.ty, p.name)
                }
            })
            .collect();
        let mut sig = format!("{}({})", name, params.join(", "));
        if self.is_const {
            sig.push_str(" const");
        }
        sig
    }
}

/// Kind of a node plus its kind-specific data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Namespace {
        /// Namespace node, possibly in another tree, that carries the
        /// documentation for every namespace of this name
        doc_node: Option<NodeRef>,
        /// Public children of same-named namespaces in other trees
        included_children: Vec<NodeRef>,
    },
    Class {
        flavor: ClassFlavor,
        bases: Vec<RelatedClass>,
        derived: Vec<RelatedClass>,
        is_abstract: bool,
    },
    HeaderFile {
        title: String,
    },
    QmlType {
        base: String,
        title: String,
    },
    QmlProperty {
        data_type: String,
        read_only: bool,
    },
    Collection {
        kind: CollectionKind,
        title: String,
        /// A `\group`, `\module` or `\qmlmodule` command was seen
        seen: bool,
        members: Vec<NodeRef>,
    },
    Page {
        title: String,
        subtitle: String,
        subtype: PageSubtype,
    },
    Enum {
        scoped: bool,
        items: Vec<EnumItem>,
    },
    Typedef,
    TypeAlias {
        aliased: String,
    },
    Property {
        data_type: String,
        writable: bool,
        bindable: bool,
    },
    Function(FunctionData),
    Variable {
        data_type: String,
        is_static: bool,
    },
    /// Members of a type that lives in another tree
    Proxy,
}

impl NodeKind {
    pub fn namespace() -> Self {
        NodeKind::Namespace {
            doc_node: None,
            included_children: Vec::new(),
        }
    }

    pub fn class(flavor: ClassFlavor) -> Self {
        NodeKind::Class {
            flavor,
            bases: Vec::new(),
            derived: Vec::new(),
            is_abstract: false,
        }
    }

    pub fn page(title: impl Into<String>) -> Self {
        NodeKind::Page {
            title: title.into(),
            subtitle: String::new(),
            subtype: PageSubtype::Page,
        }
    }

    pub fn collection(kind: CollectionKind) -> Self {
        NodeKind::Collection {
            kind,
            title: String::new(),
            seen: false,
            members: Vec::new(),
        }
    }

    pub fn function(data: FunctionData) -> Self {
        NodeKind::Function(data)
    }

    /// Genus a new node of this kind gets
    pub fn default_genus(&self) -> Genus {
        match self {
            NodeKind::QmlType { .. } | NodeKind::QmlProperty { .. } => Genus::Qml,
            NodeKind::Collection {
                kind: CollectionKind::QmlModule,
                ..
            } => Genus::Qml,
            NodeKind::Collection {
                kind: CollectionKind::Group,
                ..
            }
            | NodeKind::Page { .. } => Genus::Doc,
            NodeKind::Function(data) if data.metaness.is_qml() => Genus::Qml,
            _ => Genus::Cpp,
        }
    }

    /// Element name used in index files
    pub fn element_name(&self) -> &'static str {
        match self {
            NodeKind::Namespace { .. } => "namespace",
            NodeKind::Class { flavor, .. } => flavor.element_name(),
            NodeKind::HeaderFile { .. } => "header",
            NodeKind::QmlType { .. } => "qmlclass",
            NodeKind::QmlProperty { .. } => "qmlproperty",
            NodeKind::Collection { kind, .. } => kind.element_name(),
            NodeKind::Page { .. } => "page",
            NodeKind::Enum { .. } => "enum",
            NodeKind::Typedef => "typedef",
            NodeKind::TypeAlias { .. } => "alias",
            NodeKind::Property { .. } => "property",
            NodeKind::Function(_) => "function",
            NodeKind::Variable { .. } => "variable",
            NodeKind::Proxy => "proxy",
        }
    }
}

/// A documented entity
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub genus: Genus,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub access: Access,
    pub status: Status,
    pub since: String,
    /// Page URL when the entity lives outside the generated pages
    pub url: String,
    pub location: Location,
    pub doc: Doc,
    /// Brief description read from an index
    pub brief: String,
    /// Read from an index rather than from sources
    pub from_index: bool,
    /// Documented in the module that wrote the index
    pub had_doc: bool,
    /// Attached to a class as a related non-member
    pub related_nonmember: bool,
    /// Related non-members spliced in from proxies in other trees
    pub related: Vec<NodeRef>,
    pub physical_module: String,
    pub groups: Vec<String>,
}

impl Node {
    /// Create a node with the default genus for its kind
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let genus = kind.default_genus();
        Self {
            name: name.into(),
            kind,
            genus,
            parent: None,
            children: Vec::new(),
            access: Access::Public,
            status: Status::Active,
            since: String::new(),
            url: String::new(),
            location: Location::unknown(),
            doc: Doc::default(),
            brief: String::new(),
            from_index: false,
            had_doc: false,
            related_nonmember: false,
            related: Vec::new(),
            physical_module: String::new(),
            groups: Vec::new(),
        }
    }

    /// Attach documentation
    pub fn with_doc(mut self, doc: Doc) -> Self {
        self.location = doc.location().clone();
        self.doc = doc;
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Kinds that have children
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Namespace { .. }
                | NodeKind::Class { .. }
                | NodeKind::HeaderFile { .. }
                | NodeKind::QmlType { .. }
                | NodeKind::Proxy
        )
    }

    /// Aggregates that have their own reference page
    pub fn is_first_class_aggregate(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Namespace { .. } | NodeKind::Class { .. } | NodeKind::QmlType { .. }
        )
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self.kind, NodeKind::Namespace { .. })
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, NodeKind::Class { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, NodeKind::Function(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self.kind, NodeKind::Enum { .. })
    }

    pub fn is_typedef(&self) -> bool {
        matches!(self.kind, NodeKind::Typedef | NodeKind::TypeAlias { .. })
    }

    pub fn is_qml_type(&self) -> bool {
        matches!(self.kind, NodeKind::QmlType { .. })
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, NodeKind::Proxy)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, NodeKind::Collection { .. })
    }

    /// Module or QML module collection
    pub fn is_module(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Collection {
                kind: CollectionKind::Module | CollectionKind::QmlModule,
                ..
            }
        )
    }

    /// Pages whose title can be linked to directly
    pub fn is_text_page(&self) -> bool {
        matches!(self.kind, NodeKind::Page { .. } | NodeKind::Collection { .. })
    }

    pub fn is_external_page(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Page {
                subtype: PageSubtype::ExternalPage,
                ..
            }
        )
    }

    /// Typedefs, classes, QML types and enums
    pub fn is_type(&self) -> bool {
        self.is_typedef() || self.is_class() || self.is_qml_type() || self.is_enum()
    }

    pub fn is_private(&self) -> bool {
        self.access == Access::Private
    }

    pub fn is_internal(&self) -> bool {
        self.status == Status::Internal
    }

    /// Documented here, or documented in the module that wrote the index
    pub fn has_doc(&self) -> bool {
        self.had_doc || !self.doc.is_empty()
    }

    /// Public, not internal, and documented
    pub fn is_in_api(&self) -> bool {
        !self.is_private() && !self.is_internal() && self.has_doc()
    }

    /// Where the documentation was written, falling back to the
    /// declaration
    pub fn doc_location(&self) -> &Location {
        if self.doc.is_empty() {
            &self.location
        } else {
            self.doc.location()
        }
    }

    /// Page title, collection title, or the name
    pub fn title(&self) -> &str {
        let title = match &self.kind {
            NodeKind::Page { title, .. }
            | NodeKind::Collection { title, .. }
            | NodeKind::HeaderFile { title }
            | NodeKind::QmlType { title, .. } => title.as_str(),
            _ => "",
        };
        if title.is_empty() {
            &self.name
        } else {
            title
        }
    }

    /// Set the title of a page-like node; ignored for other kinds
    pub fn set_title(&mut self, new_title: impl Into<String>) {
        match &mut self.kind {
            NodeKind::Page { title, .. }
            | NodeKind::Collection { title, .. }
            | NodeKind::HeaderFile { title }
            | NodeKind::QmlType { title, .. } => *title = new_title.into(),
            _ => {}
        }
    }

    pub fn function_data(&self) -> Option<&FunctionData> {
        match &self.kind {
            NodeKind::Function(data) => Some(data),
            _ => None,
        }
    }

    pub fn function_data_mut(&mut self) -> Option<&mut FunctionData> {
        match &mut self.kind {
            NodeKind::Function(data) => Some(data),
            _ => None,
        }
    }

    /// Base classes of a class; empty for other kinds
    pub fn bases(&self) -> &[RelatedClass] {
        match &self.kind {
            NodeKind::Class { bases, .. } => bases,
            _ => &[],
        }
    }

    /// Check whether an enum has a value called `item`
    pub fn has_enum_item(&self, item: &str) -> bool {
        match &self.kind {
            NodeKind::Enum { items, .. } => items.iter().any(|i| i.name == item),
            _ => false,
        }
    }

    pub fn is_scoped_enum(&self) -> bool {
        matches!(self.kind, NodeKind::Enum { scoped: true, .. })
    }
}
