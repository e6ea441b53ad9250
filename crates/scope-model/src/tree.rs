//! Versioned configuration snapshots
//!
//! A [`ConfigTree`] is the persisted state of one configuration object at one
//! scope path. Its root is a [`ComplexNode`] whose properties are keyed by
//! property name. Each property is one of five kinds:
//!
//! | kind | type | merge behaviour |
//! |------|------|-----------------|
//! | simple | [`SimpleValue`] | per-property strategy |
//! | complex | [`ComplexNode`] | recursive |
//! | list / set | [`Collection`] | replaced as a whole |
//! | map | [`MapNode`] | replaced as a whole |
//!
//! Children are reference counted. Cloning a tree is cheap and edits through
//! `*_mut` accessors copy only the nodes they touch, so untouched subtrees
//! stay shared between a snapshot and its edited copy.

use crate::{ConfigKey, Error, Result, ScopePath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The kind of a property node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Simple,
    Complex,
    List,
    Set,
    Map,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Simple => "simple",
            Self::Complex => "complex",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
        };
        f.write_str(s)
    }
}

/// Version metadata carried by every node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    /// Type identity, e.g. `string`, `bool` or a schema type name.
    pub property_type: String,
    /// Snapshot version this node was last written at.
    pub version: u64,
    /// Version of the ancestor-scope snapshot this node was derived from, 0 if none.
    #[serde(default)]
    pub parent_version: u64,
    /// Defining scope name of that ancestor snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_scope_name: Option<String>,
}

impl NodeMeta {
    pub fn new(property_type: impl Into<String>) -> Self {
        Self {
            property_type: property_type.into(),
            version: 1,
            parent_version: 0,
            parent_scope_name: None,
        }
    }

    /// Overwrite all version fields at once.
    pub fn stamp(&mut self, version: u64, parent_version: u64, parent_scope_name: Option<&str>) {
        self.version = version;
        self.parent_version = parent_version;
        self.parent_scope_name = parent_scope_name.map(str::to_string);
    }
}

/// A leaf value serialized as a string. `None` is an explicit null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleValue {
    pub meta: NodeMeta,
    #[serde(default)]
    pub value: Option<String>,
}

impl SimpleValue {
    pub fn new(property_type: impl Into<String>, value: Option<String>) -> Self {
        Self {
            meta: NodeMeta::new(property_type),
            value,
        }
    }

    pub fn of(property_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(property_type, Some(value.into()))
    }

    pub fn null(property_type: impl Into<String>) -> Self {
        Self::new(property_type, None)
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    fn content_eq(&self, other: &SimpleValue) -> bool {
        self.meta.property_type == other.meta.property_type && self.value == other.value
    }
}

/// An entry of a list, set or map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    Simple {
        #[serde(default)]
        value: Option<String>,
    },
    Complex(Arc<ComplexNode>),
}

impl Element {
    pub fn simple(value: impl Into<String>) -> Self {
        Self::Simple {
            value: Some(value.into()),
        }
    }

    pub fn null() -> Self {
        Self::Simple { value: None }
    }

    pub fn complex(node: ComplexNode) -> Self {
        Self::Complex(Arc::new(node))
    }

    /// The string value of a simple element; `None` for nulls and complex elements.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Simple { value } => value.as_deref(),
            Self::Complex(_) => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ComplexNode> {
        match self {
            Self::Complex(node) => Some(node),
            Self::Simple { .. } => None,
        }
    }

    pub fn content_eq(&self, other: &Element) -> bool {
        match (self, other) {
            (Self::Simple { value: a }, Self::Simple { value: b }) => a == b,
            (Self::Complex(a), Self::Complex(b)) => Arc::ptr_eq(a, b) || a.content_eq(b),
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Simple { value: Some(v) } => format!("{v:?}"),
            Self::Simple { value: None } => "null".to_string(),
            Self::Complex(node) => format!("<{}>", node.meta.property_type),
        }
    }
}

/// An ordered list or an unordered set of elements.
///
/// `meta.property_type` names the element type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub meta: NodeMeta,
    #[serde(default)]
    pub items: Vec<Element>,
}

impl Collection {
    pub fn new(element_type: impl Into<String>) -> Self {
        Self {
            meta: NodeMeta::new(element_type),
            items: Vec::new(),
        }
    }

    /// A collection of simple string elements.
    pub fn of<I, S>(element_type: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collection = Self::new(element_type);
        collection
            .items
            .extend(values.into_iter().map(Element::simple));
        collection
    }

    pub fn push(&mut self, element: Element) {
        self.items.push(element);
    }

    /// Add an element unless an equal one is already present (set semantics).
    pub fn insert_unique(&mut self, element: Element) -> bool {
        if self.items.iter().any(|e| e.content_eq(&element)) {
            return false;
        }
        self.items.push(element);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn ordered_eq(&self, other: &Collection) -> bool {
        self.meta.property_type == other.meta.property_type
            && self.items.len() == other.items.len()
            && self.items.iter().zip(&other.items).all(|(a, b)| a.content_eq(b))
    }

    fn unordered_eq(&self, other: &Collection) -> bool {
        if self.meta.property_type != other.meta.property_type
            || self.items.len() != other.items.len()
        {
            return false;
        }
        let mut used = vec![false; other.items.len()];
        self.items.iter().all(|item| {
            let found = other
                .items
                .iter()
                .enumerate()
                .position(|(i, candidate)| !used[i] && item.content_eq(candidate));
            match found {
                Some(i) => {
                    used[i] = true;
                    true
                }
                None => false,
            }
        })
    }

    fn describe(&self) -> String {
        let items: Vec<String> = self.items.iter().map(Element::describe).collect();
        format!("[{}]", items.join(", "))
    }
}

/// A string-keyed map of elements. `meta.property_type` names the value type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapNode {
    pub meta: NodeMeta,
    #[serde(default)]
    pub entries: BTreeMap<String, Element>,
}

impl MapNode {
    pub fn new(value_type: impl Into<String>) -> Self {
        Self {
            meta: NodeMeta::new(value_type),
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, element: Element) -> Option<Element> {
        self.entries.insert(key.into(), element)
    }

    pub fn get(&self, key: &str) -> Option<&Element> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn content_eq(&self, other: &MapNode) -> bool {
        self.meta.property_type == other.meta.property_type
            && self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.entries.get(k).is_some_and(|o| v.content_eq(o)))
    }

    fn describe(&self) -> String {
        let entries: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("{k}: {}", v.describe()))
            .collect();
        format!("{{{}}}", entries.join(", "))
    }
}

/// One named child of a [`ComplexNode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Property {
    Simple(Arc<SimpleValue>),
    Complex(Arc<ComplexNode>),
    List(Arc<Collection>),
    Set(Arc<Collection>),
    Map(Arc<MapNode>),
}

impl Property {
    pub fn simple(property_type: impl Into<String>, value: Option<String>) -> Self {
        Self::Simple(Arc::new(SimpleValue::new(property_type, value)))
    }

    pub fn complex(node: ComplexNode) -> Self {
        Self::Complex(Arc::new(node))
    }

    pub fn list(collection: Collection) -> Self {
        Self::List(Arc::new(collection))
    }

    pub fn set(collection: Collection) -> Self {
        Self::Set(Arc::new(collection))
    }

    pub fn map(map: MapNode) -> Self {
        Self::Map(Arc::new(map))
    }

    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Simple(_) => PropertyKind::Simple,
            Self::Complex(_) => PropertyKind::Complex,
            Self::List(_) => PropertyKind::List,
            Self::Set(_) => PropertyKind::Set,
            Self::Map(_) => PropertyKind::Map,
        }
    }

    pub fn meta(&self) -> &NodeMeta {
        match self {
            Self::Simple(v) => &v.meta,
            Self::Complex(v) => &v.meta,
            Self::List(v) | Self::Set(v) => &v.meta,
            Self::Map(v) => &v.meta,
        }
    }

    /// Mutable metadata; copies the node first if it is shared.
    pub fn meta_mut(&mut self) -> &mut NodeMeta {
        match self {
            Self::Simple(v) => &mut Arc::make_mut(v).meta,
            Self::Complex(v) => &mut Arc::make_mut(v).meta,
            Self::List(v) | Self::Set(v) => &mut Arc::make_mut(v).meta,
            Self::Map(v) => &mut Arc::make_mut(v).meta,
        }
    }

    pub fn property_type(&self) -> &str {
        &self.meta().property_type
    }

    pub fn as_simple(&self) -> Option<&SimpleValue> {
        match self {
            Self::Simple(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<&ComplexNode> {
        match self {
            Self::Complex(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Self::List(v) | Self::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapNode> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Whether both properties point at the same node object.
    pub fn ptr_eq(&self, other: &Property) -> bool {
        match (self, other) {
            (Self::Simple(a), Self::Simple(b)) => Arc::ptr_eq(a, b),
            (Self::Complex(a), Self::Complex(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) | (Self::Set(a), Self::Set(b)) => Arc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Equality of content, ignoring version metadata and set order.
    pub fn content_eq(&self, other: &Property) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self, other) {
            (Self::Simple(a), Self::Simple(b)) => a.content_eq(b),
            (Self::Complex(a), Self::Complex(b)) => a.content_eq(b),
            (Self::List(a), Self::List(b)) => a.ordered_eq(b),
            (Self::Set(a), Self::Set(b)) => a.unordered_eq(b),
            (Self::Map(a), Self::Map(b)) => a.content_eq(b),
            _ => false,
        }
    }

    /// Short human-readable rendering used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Simple(v) => match v.value() {
                Some(s) => format!("{s:?}"),
                None => "null".to_string(),
            },
            Self::Complex(v) => format!("<{}>", v.meta.property_type),
            Self::List(v) | Self::Set(v) => v.describe(),
            Self::Map(v) => v.describe(),
        }
    }
}

/// Content equality of two optional properties.
pub fn optional_content_eq(a: Option<&Property>, b: Option<&Property>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.content_eq(b),
        (None, None) => true,
        _ => false,
    }
}

/// A complex object: named properties under one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexNode {
    pub meta: NodeMeta,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
}

impl ComplexNode {
    pub fn new(property_type: impl Into<String>) -> Self {
        Self {
            meta: NodeMeta::new(property_type),
            properties: BTreeMap::new(),
        }
    }

    pub fn builder(property_type: impl Into<String>) -> ComplexNodeBuilder {
        ComplexNodeBuilder {
            node: Self::new(property_type),
        }
    }

    pub fn property_type(&self) -> &str {
        &self.meta.property_type
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.get_mut(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, property: Property) -> Option<Property> {
        self.properties.insert(name.into(), property)
    }

    pub fn remove(&mut self, name: &str) -> Option<Property> {
        self.properties.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn simple(&self, name: &str) -> Option<&SimpleValue> {
        self.get(name).and_then(Property::as_simple)
    }

    /// The string value of a simple property, `None` if absent, null or not simple.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.simple(name).and_then(SimpleValue::value)
    }

    pub fn complex(&self, name: &str) -> Option<&ComplexNode> {
        self.get(name).and_then(Property::as_complex)
    }

    /// Mutable access to a complex child; copies it first if shared.
    pub fn complex_mut(&mut self, name: &str) -> Option<&mut ComplexNode> {
        match self.properties.get_mut(name) {
            Some(Property::Complex(node)) => Some(Arc::make_mut(node)),
            _ => None,
        }
    }

    /// Insert or replace a simple property.
    pub fn set_value(
        &mut self,
        name: impl Into<String>,
        property_type: impl Into<String>,
        value: Option<String>,
    ) {
        self.insert(name, Property::simple(property_type, value));
    }

    /// Look up a property by dotted path, descending through complex nodes.
    pub fn property_at(&self, path: &str) -> Option<&Property> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.get(first)?;
        for segment in segments {
            current = current.as_complex()?.get(segment)?;
        }
        Some(current)
    }

    /// Set (`Some`) or remove (`None`) the property at a dotted path.
    ///
    /// Missing intermediate complex nodes are created with the type found at
    /// the same position in `template`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPropertyPath`] if the path is empty, crosses a
    /// non-complex property, or needs an intermediate node that `template`
    /// does not describe.
    pub fn replace_at(
        &mut self,
        path: &str,
        value: Option<Property>,
        template: &ComplexNode,
    ) -> Result<()> {
        let invalid = || Error::InvalidPropertyPath {
            path: path.to_string(),
        };
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid());
        }

        let (last, parents) = segments.split_last().ok_or_else(invalid)?;
        let mut node = self;
        let mut template_node = Some(template);
        for segment in parents {
            template_node = template_node.and_then(|t| t.complex(segment));
            if !node.contains(segment) {
                if value.is_none() {
                    return Ok(());
                }
                let property_type = template_node.ok_or_else(invalid)?.property_type();
                node.insert(*segment, Property::complex(ComplexNode::new(property_type)));
            }
            node = node.complex_mut(segment).ok_or_else(invalid)?;
        }

        match value {
            Some(property) => {
                node.insert(*last, property);
            }
            None => {
                node.remove(last);
            }
        }
        Ok(())
    }

    /// Equality of content, ignoring version metadata.
    pub fn content_eq(&self, other: &ComplexNode) -> bool {
        self.meta.property_type == other.meta.property_type
            && self.properties.len() == other.properties.len()
            && self
                .properties
                .iter()
                .all(|(k, v)| other.properties.get(k).is_some_and(|o| v.content_eq(o)))
    }
}

/// Fluent construction of [`ComplexNode`]s.
///
/// ```
/// use scope_model::ComplexNode;
///
/// let node = ComplexNode::builder("AppConfig")
///     .simple("theme", "string", "dark")
///     .list("plugins", "string", ["git", "lsp"])
///     .complex("db", ComplexNode::builder("Database").simple("port", "u16", "5432").build())
///     .build();
///
/// assert_eq!(node.value("theme"), Some("dark"));
/// assert_eq!(node.property_at("db.port").unwrap().describe(), "\"5432\"");
/// ```
#[derive(Debug, Clone)]
pub struct ComplexNodeBuilder {
    node: ComplexNode,
}

impl ComplexNodeBuilder {
    #[must_use]
    pub fn simple(
        mut self,
        name: impl Into<String>,
        property_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.node
            .set_value(name, property_type, Some(value.into()));
        self
    }

    #[must_use]
    pub fn null(mut self, name: impl Into<String>, property_type: impl Into<String>) -> Self {
        self.node.set_value(name, property_type, None);
        self
    }

    #[must_use]
    pub fn complex(mut self, name: impl Into<String>, node: ComplexNode) -> Self {
        self.node.insert(name, Property::complex(node));
        self
    }

    #[must_use]
    pub fn list<I, S>(mut self, name: impl Into<String>, element_type: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node
            .insert(name, Property::list(Collection::of(element_type, values)));
        self
    }

    #[must_use]
    pub fn set<I, S>(mut self, name: impl Into<String>, element_type: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut collection = Collection::new(element_type);
        for value in values {
            collection.insert_unique(Element::simple(value));
        }
        self.node.insert(name, Property::set(collection));
        self
    }

    #[must_use]
    pub fn map(mut self, name: impl Into<String>, map: MapNode) -> Self {
        self.node.insert(name, Property::map(map));
        self
    }

    #[must_use]
    pub fn property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.node.insert(name, property);
        self
    }

    pub fn build(self) -> ComplexNode {
        self.node
    }
}

/// The snapshot of one root configuration object at one scope path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTree {
    defining_scope_path: ScopePath,
    class_version: u32,
    root: ComplexNode,
}

impl ConfigTree {
    /// A brand-new, never persisted snapshot: version 1, class version 1.
    pub fn new(type_name: impl Into<String>, path: ScopePath) -> Self {
        Self::from_root(path, ComplexNode::new(type_name))
    }

    pub fn from_root(path: ScopePath, root: ComplexNode) -> Self {
        Self {
            defining_scope_path: path,
            class_version: 1,
            root,
        }
    }

    /// Set the schema version while building a tree.
    ///
    /// There is no in-place setter: a stored snapshot only changes class
    /// version by being rebuilt, which the migration resolver does once every
    /// step has succeeded.
    #[must_use]
    pub fn with_class_version(mut self, class_version: u32) -> Self {
        self.class_version = class_version;
        self
    }

    pub fn type_name(&self) -> &str {
        &self.root.meta.property_type
    }

    pub fn defining_scope_path(&self) -> &ScopePath {
        &self.defining_scope_path
    }

    pub fn key(&self) -> ConfigKey {
        ConfigKey::new(self.type_name(), self.defining_scope_path.clone())
    }

    pub fn version(&self) -> u64 {
        self.root.meta.version
    }

    pub fn parent_version(&self) -> u64 {
        self.root.meta.parent_version
    }

    pub fn parent_scope_name(&self) -> Option<&str> {
        self.root.meta.parent_scope_name.as_deref()
    }

    pub fn class_version(&self) -> u32 {
        self.class_version
    }

    pub fn set_version(&mut self, version: u64) {
        self.root.meta.version = version;
    }

    pub fn root(&self) -> &ComplexNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut ComplexNode {
        &mut self.root
    }

    pub fn into_root(self) -> ComplexNode {
        self.root
    }

    /// Look up a property by dotted path.
    pub fn get(&self, path: &str) -> Option<&Property> {
        self.root.property_at(path)
    }

    /// Equality of content and class version, ignoring version metadata.
    pub fn content_eq(&self, other: &ConfigTree) -> bool {
        self.class_version == other.class_version && self.root.content_eq(&other.root)
    }
}
