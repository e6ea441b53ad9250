//! Cross-configuration references
//!
//! A reference property stores the scope path of another configuration of a
//! declared target type. The graph is explored breadth-first from a start
//! key; a visited set stops the walk at keys already seen, so cycles end the
//! traversal instead of looping. Cycles are reported, not rejected.

use crate::{Error, Result};
use scope_model::{ConfigKey, ConfigTree, PropertyKind, SchemaRegistry, ScopePath};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// One reference from a property of one configuration to another configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEdge {
    pub from: ConfigKey,
    /// Dotted path of the reference property.
    pub property: String,
    pub to: ConfigKey,
}

/// Directed graph of references reachable from one configuration.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    nodes: Vec<ConfigKey>,
    edges: Vec<ReferenceEdge>,
}

impl ReferenceGraph {
    /// Walk references from `start`, resolving each configuration with `resolve`.
    ///
    /// # Errors
    ///
    /// Propagates resolution failures, and fails with a validation error if a
    /// reference property holds an unparsable scope path.
    pub fn build<F>(start: ConfigKey, schemas: &SchemaRegistry, mut resolve: F) -> Result<Self>
    where
        F: FnMut(&ConfigKey) -> Result<ConfigTree>,
    {
        let mut graph = Self::default();
        let mut visited = HashSet::from([start.clone()]);
        let mut queue = VecDeque::from([start]);

        while let Some(key) = queue.pop_front() {
            let tree = resolve(&key)?;
            for (property, target_type) in reference_properties(schemas, &key.type_name) {
                let Some(raw) = tree
                    .get(&property)
                    .and_then(|p| p.as_simple())
                    .and_then(|s| s.value())
                else {
                    continue;
                };
                let path: ScopePath = raw.parse().map_err(Error::Model)?;
                let to = ConfigKey::new(target_type, path);
                tracing::trace!(from = %key, %property, to = %to, "Found reference");
                if visited.insert(to.clone()) {
                    queue.push_back(to.clone());
                }
                graph.edges.push(ReferenceEdge {
                    from: key.clone(),
                    property,
                    to,
                });
            }
            graph.nodes.push(key);
        }
        Ok(graph)
    }

    /// Visited configurations in breadth-first order, the start key first.
    pub fn nodes(&self) -> &[ConfigKey] {
        &self.nodes
    }

    pub fn edges(&self) -> &[ReferenceEdge] {
        &self.edges
    }

    pub fn references_from<'a>(&'a self, key: &'a ConfigKey) -> impl Iterator<Item = &'a ReferenceEdge> {
        self.edges.iter().filter(move |e| &e.from == key)
    }

    pub fn has_cycle(&self) -> bool {
        !self.cycle_members().is_empty()
    }

    /// Keys that can reach themselves through one or more references.
    pub fn cycle_members(&self) -> BTreeSet<ConfigKey> {
        let mut successors: HashMap<&ConfigKey, Vec<&ConfigKey>> = HashMap::new();
        for edge in &self.edges {
            successors.entry(&edge.from).or_default().push(&edge.to);
        }

        self.nodes
            .iter()
            .filter(|start| {
                let mut seen = HashSet::new();
                let mut stack: Vec<&ConfigKey> =
                    successors.get(*start).cloned().unwrap_or_default();
                while let Some(key) = stack.pop() {
                    if key == *start {
                        return true;
                    }
                    if seen.insert(key) {
                        stack.extend(successors.get(key).into_iter().flatten().copied());
                    }
                }
                false
            })
            .cloned()
            .collect()
    }
}

/// Dotted paths and target types of every reference property of `type_name`,
/// including those inside nested complex properties.
fn reference_properties(schemas: &SchemaRegistry, type_name: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    let mut expanding = HashSet::new();
    collect_references(schemas, type_name, "", &mut expanding, &mut found);
    found
}

fn collect_references<'s>(
    schemas: &'s SchemaRegistry,
    type_name: &'s str,
    prefix: &str,
    expanding: &mut HashSet<&'s str>,
    found: &mut Vec<(String, String)>,
) {
    let Some(schema) = schemas.get(type_name) else {
        return;
    };
    if !expanding.insert(type_name) {
        return;
    }
    for property in schema.properties() {
        let path = crate::merge::join_path(prefix, &property.name);
        if let Some(target) = &property.references {
            found.push((path, target.clone()));
        } else if property.kind == PropertyKind::Complex {
            collect_references(schemas, &property.type_name, &path, expanding, found);
        }
    }
    expanding.remove(type_name);
}
