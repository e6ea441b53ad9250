//! Chain merging
//!
//! A chain is the root-first list of snapshots found along a scope path. The
//! engine folds it left to right, each step merging an ancestor with the next
//! descendant:
//!
//! - a property present on one side only is taken from that side
//! - simple properties on both sides go through the property's strategy
//! - complex properties merge recursively
//! - lists, sets and maps are replaced as a whole by the descendant's
//!
//! The result carries the descendant's identity and version metadata and the
//! higher of the two class versions.

use crate::strategy::{Resolution, StrategyLookup};
use crate::{Error, Result};
use scope_model::{ComplexNode, ConfigTree, Property, SimpleValue};
use std::borrow::Borrow;
use std::sync::Arc;

/// Folds snapshot chains into one effective tree. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine;

impl MergeEngine {
    /// Merge a root-first chain.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyChain`] for an empty chain, [`Error::TypeMismatch`] if two
    /// levels disagree on the kind or type of a property.
    pub fn merge<T, L>(chain: &[T], lookup: &L) -> Result<ConfigTree>
    where
        T: Borrow<ConfigTree>,
        L: StrategyLookup + ?Sized,
    {
        let (first, rest) = chain.split_first().ok_or(Error::EmptyChain)?;
        let mut merged: ConfigTree = <T as Borrow<ConfigTree>>::borrow(first).clone();
        for child in rest {
            merged = Self::merge_two(&merged, <T as Borrow<ConfigTree>>::borrow(child), lookup)?;
        }
        Ok(merged)
    }

    /// Merge one ancestor snapshot with one descendant snapshot.
    pub fn merge_two<L>(parent: &ConfigTree, child: &ConfigTree, lookup: &L) -> Result<ConfigTree>
    where
        L: StrategyLookup + ?Sized,
    {
        if parent.type_name() != child.type_name() {
            return Err(Error::TypeMismatch {
                property: "<root>".to_string(),
                parent: parent.type_name().to_string(),
                child: child.type_name().to_string(),
            });
        }
        tracing::trace!(
            parent = %parent.defining_scope_path(),
            child = %child.defining_scope_path(),
            "Merging snapshot pair"
        );

        let root = merge_nodes(parent.root(), child.root(), "", lookup)?;
        Ok(ConfigTree::from_root(child.defining_scope_path().clone(), root)
            .with_class_version(parent.class_version().max(child.class_version())))
    }
}

/// Merge the properties of two complex nodes of the same type. The result
/// keeps the child node's metadata.
pub(crate) fn merge_nodes<L>(
    parent: &ComplexNode,
    child: &ComplexNode,
    prefix: &str,
    lookup: &L,
) -> Result<ComplexNode>
where
    L: StrategyLookup + ?Sized,
{
    let owner_type = child.property_type();
    let mut merged = child.clone();

    for (name, parent_prop) in &parent.properties {
        let Some(child_prop) = child.get(name) else {
            merged.insert(name.clone(), parent_prop.clone());
            continue;
        };
        if parent_prop.ptr_eq(child_prop) {
            continue;
        }

        let path = join_path(prefix, name);
        check_compatible(&path, parent_prop, child_prop)?;

        match (parent_prop, child_prop) {
            (Property::Simple(p), Property::Simple(c)) => {
                let strategy = lookup.strategy_for(owner_type, name);
                match strategy.resolve(p.value(), c.value()) {
                    Resolution::TakeChild => {}
                    Resolution::KeepParent => {
                        merged.insert(name.clone(), parent_prop.clone());
                    }
                    Resolution::Computed(value) => {
                        let computed = SimpleValue {
                            meta: c.meta.clone(),
                            value,
                        };
                        merged.insert(name.clone(), Property::Simple(Arc::new(computed)));
                    }
                }
            }
            (Property::Complex(p), Property::Complex(c)) => {
                let node = merge_nodes(p, c, &path, lookup)?;
                merged.insert(name.clone(), Property::complex(node));
            }
            // Collections and maps: the descendant's value replaces the ancestor's.
            _ => {}
        }
    }

    Ok(merged)
}

pub(crate) fn check_compatible(path: &str, parent: &Property, child: &Property) -> Result<()> {
    if parent.kind() != child.kind() || parent.property_type() != child.property_type() {
        return Err(Error::TypeMismatch {
            property: path.to_string(),
            parent: format!("{} {}", parent.kind(), parent.property_type()),
            child: format!("{} {}", child.kind(), child.property_type()),
        });
    }
    Ok(())
}

pub(crate) fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
