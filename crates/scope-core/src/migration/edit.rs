//! Tree editing primitives available to migration transformers

use scope_model::{ComplexNode, ConfigTree, Element, Property};
use std::sync::Arc;

/// Failure inside a transformer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// A rename or add would overwrite an existing property.
    #[error("Property '{path}' already exists")]
    TargetExists { path: String },

    /// The complex node a property should be added to does not exist.
    #[error("Parent of '{path}' is not a complex property")]
    MissingParent { path: String },

    #[error("Invalid property path '{path}'")]
    InvalidPath { path: String },

    #[error("{0}")]
    Custom(String),
}

impl TransformError {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

pub type TransformResult<T> = std::result::Result<T, TransformError>;

/// Mutable view of a snapshot handed to transformers.
///
/// Paths are dotted property paths relative to the root. The editor cannot
/// change the snapshot's class version; the resolver sets it once every step
/// has succeeded.
///
/// ```
/// use scope_core::migration::TreeEditor;
/// use scope_model::{ComplexNode, ConfigTree};
///
/// let root = ComplexNode::builder("AppConfig").simple("colour", "string", "red").build();
/// let mut tree = ConfigTree::from_root("global".parse().unwrap(), root);
///
/// let mut editor = TreeEditor::new(&mut tree);
/// editor.rename("colour", "color").unwrap();
/// editor.add_simple("size", "u32", Some("12")).unwrap();
/// editor.change_simple_value("color", Some("blue"), Some("green"));
///
/// assert_eq!(tree.root().value("color"), Some("red"));
/// assert_eq!(tree.root().value("size"), Some("12"));
/// ```
#[derive(Debug)]
pub struct TreeEditor<'a> {
    tree: &'a mut ConfigTree,
}

impl<'a> TreeEditor<'a> {
    pub fn new(tree: &'a mut ConfigTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &ConfigTree {
        self.tree
    }

    /// Direct access to the root node for edits the primitives do not cover.
    pub fn root_mut(&mut self) -> &mut ComplexNode {
        self.tree.root_mut()
    }

    /// Rename the property at `path` to `new_name` within the same parent.
    /// The node itself is moved, not copied. A missing source is a no-op.
    pub fn rename(&mut self, path: &str, new_name: &str) -> TransformResult<()> {
        let (parent, name) = split(path)?;
        let Some(node) = node_at(self.tree.root_mut(), parent) else {
            return Ok(());
        };
        rename_in(node, name, new_name, path)?;
        Ok(())
    }

    /// Remove the property at `path`. A missing property is a no-op.
    pub fn delete(&mut self, path: &str) -> TransformResult<()> {
        let (parent, name) = split(path)?;
        if let Some(node) = node_at(self.tree.root_mut(), parent) {
            node.remove(name);
        }
        Ok(())
    }

    /// Add a simple property. Nothing is added when `value` is `None`.
    pub fn add_simple(
        &mut self,
        path: &str,
        property_type: &str,
        value: Option<&str>,
    ) -> TransformResult<()> {
        let Some(value) = value else {
            return Ok(());
        };
        let (parent, name) = split(path)?;
        let node = node_at(self.tree.root_mut(), parent).ok_or_else(|| {
            TransformError::MissingParent {
                path: path.to_string(),
            }
        })?;
        add_in(node, name, property_type, value, path)
    }

    /// Compare-and-set a simple value. Returns whether the value was replaced;
    /// a mismatch, a missing property or a non-simple property leave the tree
    /// untouched.
    pub fn change_simple_value(
        &mut self,
        path: &str,
        expected: Option<&str>,
        new_value: Option<&str>,
    ) -> bool {
        let Ok((parent, name)) = split(path) else {
            return false;
        };
        match node_at(self.tree.root_mut(), parent) {
            Some(node) => change_in(node, name, expected, new_value),
            None => false,
        }
    }

    /// Rename `old_name` to `new_name` in every complex node of `parent_type`,
    /// including complex collection elements. Returns the number of renames.
    pub fn rename_recursively(
        &mut self,
        parent_type: &str,
        old_name: &str,
        new_name: &str,
    ) -> TransformResult<usize> {
        visit_typed(self.tree.root_mut(), parent_type, &mut |node| {
            rename_in(node, old_name, new_name, new_name).map(usize::from)
        })
    }

    pub fn delete_recursively(&mut self, parent_type: &str, name: &str) -> TransformResult<usize> {
        visit_typed(self.tree.root_mut(), parent_type, &mut |node| {
            Ok(usize::from(node.remove(name).is_some()))
        })
    }

    pub fn add_simple_recursively(
        &mut self,
        parent_type: &str,
        name: &str,
        property_type: &str,
        value: Option<&str>,
    ) -> TransformResult<usize> {
        let Some(value) = value else {
            return Ok(0);
        };
        visit_typed(self.tree.root_mut(), parent_type, &mut |node| {
            add_in(node, name, property_type, value, name).map(|()| 1)
        })
    }

    pub fn change_simple_value_recursively(
        &mut self,
        parent_type: &str,
        name: &str,
        expected: Option<&str>,
        new_value: Option<&str>,
    ) -> TransformResult<usize> {
        visit_typed(self.tree.root_mut(), parent_type, &mut |node| {
            Ok(usize::from(change_in(node, name, expected, new_value)))
        })
    }
}

fn split(path: &str) -> TransformResult<(Option<&str>, &str)> {
    let (parent, name) = match path.rsplit_once('.') {
        Some((parent, name)) => (Some(parent), name),
        None => (None, path),
    };
    if name.is_empty() || parent.is_some_and(|p| p.split('.').any(str::is_empty)) {
        return Err(TransformError::InvalidPath {
            path: path.to_string(),
        });
    }
    Ok((parent, name))
}

fn node_at<'n>(root: &'n mut ComplexNode, path: Option<&str>) -> Option<&'n mut ComplexNode> {
    let Some(path) = path else {
        return Some(root);
    };
    let mut node = root;
    for segment in path.split('.') {
        node = node.complex_mut(segment)?;
    }
    Some(node)
}

fn rename_in(
    node: &mut ComplexNode,
    old_name: &str,
    new_name: &str,
    reported: &str,
) -> TransformResult<bool> {
    if !node.contains(old_name) {
        return Ok(false);
    }
    if node.contains(new_name) {
        return Err(TransformError::TargetExists {
            path: reported.to_string(),
        });
    }
    if let Some(property) = node.remove(old_name) {
        node.insert(new_name, property);
    }
    Ok(true)
}

fn add_in(
    node: &mut ComplexNode,
    name: &str,
    property_type: &str,
    value: &str,
    reported: &str,
) -> TransformResult<()> {
    if node.contains(name) {
        return Err(TransformError::TargetExists {
            path: reported.to_string(),
        });
    }
    node.set_value(name, property_type, Some(value.to_string()));
    Ok(())
}

fn change_in(
    node: &mut ComplexNode,
    name: &str,
    expected: Option<&str>,
    new_value: Option<&str>,
) -> bool {
    match node.get_mut(name) {
        Some(Property::Simple(simple)) if simple.value() == expected => {
            Arc::make_mut(simple).value = new_value.map(str::to_string);
            true
        }
        _ => false,
    }
}

/// Apply `f` to every complex node of `parent_type`, root included.
///
/// Subtrees without a matching node are not descended into, so they stay
/// shared with the source snapshot.
fn visit_typed(
    node: &mut ComplexNode,
    parent_type: &str,
    f: &mut dyn FnMut(&mut ComplexNode) -> TransformResult<usize>,
) -> TransformResult<usize> {
    let mut count = 0;
    if node.property_type() == parent_type {
        count += f(node)?;
    }

    let names: Vec<String> = node
        .properties
        .iter()
        .filter(|(_, property)| property_contains(property, parent_type))
        .map(|(name, _)| name.clone())
        .collect();

    for name in names {
        let Some(property) = node.properties.get_mut(&name) else {
            continue;
        };
        match property {
            Property::Complex(child) => {
                count += visit_typed(Arc::make_mut(child), parent_type, f)?;
            }
            Property::List(collection) | Property::Set(collection) => {
                for element in &mut Arc::make_mut(collection).items {
                    count += visit_element(element, parent_type, f)?;
                }
            }
            Property::Map(map) => {
                for element in Arc::make_mut(map).entries.values_mut() {
                    count += visit_element(element, parent_type, f)?;
                }
            }
            Property::Simple(_) => {}
        }
    }
    Ok(count)
}

fn visit_element(
    element: &mut Element,
    parent_type: &str,
    f: &mut dyn FnMut(&mut ComplexNode) -> TransformResult<usize>,
) -> TransformResult<usize> {
    match element {
        Element::Complex(node) if node_contains(node, parent_type) => {
            visit_typed(Arc::make_mut(node), parent_type, f)
        }
        _ => Ok(0),
    }
}

fn node_contains(node: &ComplexNode, parent_type: &str) -> bool {
    node.property_type() == parent_type
        || node
            .properties
            .values()
            .any(|property| property_contains(property, parent_type))
}

fn property_contains(property: &Property, parent_type: &str) -> bool {
    let element_contains = |element: &Element| {
        element
            .as_complex()
            .is_some_and(|node| node_contains(node, parent_type))
    };
    match property {
        Property::Simple(_) => false,
        Property::Complex(node) => node_contains(node, parent_type),
        Property::List(collection) | Property::Set(collection) => {
            collection.items.iter().any(element_contains)
        }
        Property::Map(map) => map.entries.values().any(element_contains),
    }
}
