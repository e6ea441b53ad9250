//! Schema version migration
//!
//! Each configuration type may register migration edges
//! `(from, to, transformer)`. When a snapshot with an older class version is
//! loaded, the resolver finds a path through the edge graph and applies the
//! transformers in order to a working copy. Only after every step succeeds is
//! the copy's class version set to the target.
//!
//! Path selection is breadth-first: the path with the fewest edges wins, and
//! among equally short paths the one using earlier-registered edges.

mod edit;

pub use edit::{TransformError, TransformResult, TreeEditor};

use crate::{Error, Result};
use scope_model::ConfigTree;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// One migration step.
pub trait Transformer: Send + Sync {
    fn transform(&self, editor: &mut TreeEditor<'_>) -> TransformResult<()>;
}

impl<F> Transformer for F
where
    F: Fn(&mut TreeEditor<'_>) -> TransformResult<()> + Send + Sync,
{
    fn transform(&self, editor: &mut TreeEditor<'_>) -> TransformResult<()> {
        self(editor)
    }
}

/// A directed edge between two class versions.
#[derive(Clone)]
pub struct MigrationEdge {
    pub from: u32,
    pub to: u32,
    transformer: Arc<dyn Transformer>,
}

impl MigrationEdge {
    pub fn new(from: u32, to: u32, transformer: impl Transformer + 'static) -> Self {
        Self {
            from,
            to,
            transformer: Arc::new(transformer),
        }
    }

    fn apply(&self, tree: &mut ConfigTree) -> TransformResult<()> {
        self.transformer.transform(&mut TreeEditor::new(tree))
    }
}

impl fmt::Debug for MigrationEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationEdge")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

/// Migration edges per configuration type, in registration order.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    edges: HashMap<String, Vec<MigrationEdge>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure transformer.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMigrationEdge`] unless `from < to`.
    pub fn register<F>(
        &mut self,
        type_name: impl Into<String>,
        from: u32,
        to: u32,
        transformer: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&mut TreeEditor<'_>) -> TransformResult<()> + Send + Sync + 'static,
    {
        self.register_transformer(type_name, from, to, transformer)
    }

    pub fn register_transformer(
        &mut self,
        type_name: impl Into<String>,
        from: u32,
        to: u32,
        transformer: impl Transformer + 'static,
    ) -> Result<&mut Self> {
        let type_name = type_name.into();
        if from >= to {
            return Err(Error::InvalidMigrationEdge {
                type_name,
                from,
                to,
            });
        }
        self.edges
            .entry(type_name)
            .or_default()
            .push(MigrationEdge::new(from, to, transformer));
        Ok(self)
    }

    /// Edges of `type_name`; empty if none are registered.
    pub fn edges(&self, type_name: &str) -> &[MigrationEdge] {
        self.edges.get(type_name).map_or(&[], Vec::as_slice)
    }
}

/// Finds and applies migration paths. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationResolver;

impl MigrationResolver {
    /// Bring `tree` to class version `target`.
    ///
    /// Returns the input unchanged when it is already at `target`.
    ///
    /// # Errors
    ///
    /// [`Error::MigrationNotFound`] if no path exists, [`Error::TransformFailed`]
    /// if a step fails. Failures leave `tree` untouched.
    pub fn migrate<'a>(
        tree: &'a ConfigTree,
        target: u32,
        edges: &[MigrationEdge],
    ) -> Result<Cow<'a, ConfigTree>> {
        let from = tree.class_version();
        if from == target {
            return Ok(Cow::Borrowed(tree));
        }

        let path = Self::find_path(edges, from, target).ok_or_else(|| {
            Error::MigrationNotFound {
                type_name: tree.type_name().to_string(),
                from,
                to: target,
            }
        })?;

        let mut working = tree.clone();
        for edge in path {
            edge.apply(&mut working)
                .map_err(|source| Error::TransformFailed {
                    type_name: tree.type_name().to_string(),
                    from: edge.from,
                    to: edge.to,
                    source,
                })?;
            tracing::debug!(
                key = %tree.key(),
                from = edge.from,
                to = edge.to,
                "Applied migration step"
            );
        }
        Ok(Cow::Owned(working.with_class_version(target)))
    }

    /// Shortest edge sequence from `from` to `to`, if any.
    pub fn find_path(edges: &[MigrationEdge], from: u32, to: u32) -> Option<Vec<&MigrationEdge>> {
        let mut reached_by: HashMap<u32, usize> = HashMap::new();
        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);

        while let Some(version) = queue.pop_front() {
            if version == to {
                break;
            }
            for (index, edge) in edges.iter().enumerate() {
                if edge.from == version && visited.insert(edge.to) {
                    reached_by.insert(edge.to, index);
                    queue.push_back(edge.to);
                }
            }
        }

        if !visited.contains(&to) {
            return None;
        }
        let mut path = Vec::new();
        let mut version = to;
        while version != from {
            let edge = &edges[*reached_by.get(&version)?];
            path.push(edge);
            version = edge.from;
        }
        path.reverse();
        Some(path)
    }
}
