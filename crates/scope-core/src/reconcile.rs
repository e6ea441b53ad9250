//! Save-time reconciliation of concurrent edits
//!
//! A caller loads a chain (the *baseline*), edits the effective tree and
//! saves it. Meanwhile other writers may have persisted new snapshots
//! anywhere along the same path (the *latest* chain). The reconciler:
//!
//! 1. diffs the edited tree against the baseline's effective tree to find the
//!    properties this save changes, and rejects any change whose kind or type
//!    disagrees with what the persisted ancestors define,
//! 2. flags a conflict where the latest effective value of a changed property
//!    differs from both the baseline value and the local value,
//! 3. settles each conflict with the property's staleness policy, or fails,
//! 4. writes the changed properties over the latest leaf snapshot, so the
//!    persisted leaf keeps holding overrides only.

use crate::merge::{MergeEngine, check_compatible, join_path, merge_nodes};
use crate::strategy::{Resolution, StrategyLookup};
use crate::{Error, Result};
use scope_model::tree::optional_content_eq;
use scope_model::{ComplexNode, ConfigTree, Property, ScopePath, SimpleValue, StalenessPolicy};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::sync::Arc;

/// What the storage layer has to do with a reconciled snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No snapshot exists at the leaf yet.
    Create,
    /// The leaf snapshot is replaced with a newer version.
    Update,
    /// Content is identical to the persisted leaf; nothing to write.
    Unchanged,
}

/// A conflict settled by a staleness policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConflict {
    pub property: String,
    pub policy: StalenessPolicy,
    pub persisted: String,
    pub local: String,
}

/// Result of [`VersionReconciler::reconcile_on_save`].
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// The leaf snapshot to persist, already stamped.
    pub tree: ConfigTree,
    pub outcome: SaveOutcome,
    pub resolved: Vec<ResolvedConflict>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VersionReconciler;

impl VersionReconciler {
    /// Reconcile an edited effective tree against the latest persisted chain.
    ///
    /// `local` is addressed at the leaf scope path being saved. Both chains
    /// are root-first and hold only snapshots that exist.
    ///
    /// # Errors
    ///
    /// [`Error::ConflictUnresolved`] if a conflicting property has no
    /// staleness policy. [`Error::TypeMismatch`] if a changed property no
    /// longer matches the kind or type an ancestor snapshot gives it, or if
    /// merging fails.
    pub fn reconcile_on_save<A, B, L>(
        local: &ConfigTree,
        latest: &[A],
        baseline: &[B],
        lookup: &L,
    ) -> Result<Reconciliation>
    where
        A: Borrow<ConfigTree>,
        B: Borrow<ConfigTree>,
        L: StrategyLookup + ?Sized,
    {
        let leaf_path = local.defining_scope_path();
        let type_name = local.type_name();

        let baseline_effective = effective_root(baseline, type_name, lookup)?;
        let latest_effective = effective_root(latest, type_name, lookup)?;

        let latest_trees: Vec<&ConfigTree> = latest
            .iter()
            .map(<A as Borrow<ConfigTree>>::borrow)
            .collect();
        let latest_leaf = latest_trees
            .last()
            .copied()
            .filter(|t| t.defining_scope_path() == leaf_path);
        let ancestor = latest_trees
            .iter()
            .rev()
            .copied()
            .find(|t| t.defining_scope_path() != leaf_path);

        let mut changed = Vec::new();
        diff_nodes(local.root(), &baseline_effective, "", &mut changed);

        // The leaf must stay mergeable under its ancestors.
        let ancestors: Vec<&ConfigTree> = latest_trees
            .iter()
            .copied()
            .filter(|t| t.defining_scope_path() != leaf_path)
            .collect();
        let inherited = effective_root(&ancestors, type_name, lookup)?;
        for path in &changed {
            if let (Some(parent), Some(child)) = (inherited.property_at(path), local.get(path)) {
                check_compatible(path, parent, child)?;
            }
        }

        let fast_path = signature(latest) == signature(baseline);
        tracing::debug!(
            path = %leaf_path,
            changed = changed.len(),
            fast_path,
            "Reconciling save"
        );

        let mut writes = Vec::with_capacity(changed.len());
        let mut resolved = Vec::new();
        for path in changed {
            let local_value = local.get(&path);
            if !fast_path {
                let persisted = latest_effective.property_at(&path);
                let base = baseline_effective.property_at(&path);
                let conflict = !optional_content_eq(persisted, base)
                    && !optional_content_eq(persisted, local_value);
                if conflict {
                    let (owner, name) =
                        owner_of(&path, local.root(), &latest_effective, type_name);
                    let Some(policy) = lookup.staleness_policy(&owner, name) else {
                        return Err(Error::ConflictUnresolved {
                            scope_path: leaf_path.clone(),
                            property: path.clone(),
                            persisted: describe(persisted),
                            local: describe(local_value),
                        });
                    };
                    tracing::debug!(property = %path, ?policy, "Resolved concurrent edit");
                    resolved.push(ResolvedConflict {
                        property: path.clone(),
                        policy,
                        persisted: describe(persisted),
                        local: describe(local_value),
                    });

                    let write = match policy {
                        StalenessPolicy::UseParent => Write {
                            value: latest_leaf.and_then(|t| t.get(&path)).cloned(),
                            stamp: false,
                            path: path.clone(),
                        },
                        StalenessPolicy::Merge => Write {
                            value: merge_values(
                                persisted,
                                local_value,
                                &owner,
                                name,
                                &path,
                                lookup,
                            )?,
                            stamp: true,
                            path: path.clone(),
                        },
                    };
                    writes.push(write);
                    continue;
                }
            }
            writes.push(Write {
                value: local_value.cloned(),
                stamp: true,
                path,
            });
        }

        let version = latest_leaf.map_or(1, |t| t.version() + 1);
        let parent_version = ancestor.map_or(0, ConfigTree::version);
        let parent_scope_name = ancestor.map(|t| t.defining_scope_path().last_scope().name());

        let mut overrides = latest_leaf
            .map(|t| t.root().clone())
            .unwrap_or_else(|| ComplexNode::new(type_name));
        for Write { path, value, stamp } in writes {
            let value = value.map(|mut property| {
                if stamp {
                    property
                        .meta_mut()
                        .stamp(version, parent_version, parent_scope_name);
                }
                property
            });
            if overrides
                .replace_at(&path, value.clone(), local.root())
                .is_err()
            {
                overrides.replace_at(&path, value, &latest_effective)?;
            }
        }

        if let Some(leaf) = latest_leaf
            && leaf.class_version() == local.class_version()
            && leaf.root().content_eq(&overrides)
        {
            tracing::debug!(path = %leaf_path, version = leaf.version(), "Save is a no-op");
            return Ok(Reconciliation {
                tree: leaf.clone(),
                outcome: SaveOutcome::Unchanged,
                resolved,
            });
        }

        overrides
            .meta
            .stamp(version, parent_version, parent_scope_name);
        let outcome = if latest_leaf.is_some() {
            SaveOutcome::Update
        } else {
            SaveOutcome::Create
        };
        let tree = ConfigTree::from_root(leaf_path.clone(), overrides)
            .with_class_version(local.class_version());

        Ok(Reconciliation {
            tree,
            outcome,
            resolved,
        })
    }
}

struct Write {
    path: String,
    value: Option<Property>,
    stamp: bool,
}

fn effective_root<T, L>(chain: &[T], type_name: &str, lookup: &L) -> Result<ComplexNode>
where
    T: Borrow<ConfigTree>,
    L: StrategyLookup + ?Sized,
{
    if chain.is_empty() {
        return Ok(ComplexNode::new(type_name));
    }
    Ok(MergeEngine::merge(chain, lookup)?.into_root())
}

fn signature<T: Borrow<ConfigTree>>(chain: &[T]) -> Vec<(&ScopePath, u64)> {
    chain
        .iter()
        .map(|t| {
            let tree = <T as Borrow<ConfigTree>>::borrow(t);
            (tree.defining_scope_path(), tree.version())
        })
        .collect()
}

/// Collect the dotted paths at which `local` differs from `base`.
fn diff_nodes(local: &ComplexNode, base: &ComplexNode, prefix: &str, out: &mut Vec<String>) {
    let names: BTreeSet<&String> = local
        .properties
        .keys()
        .chain(base.properties.keys())
        .collect();

    for name in names {
        let path = join_path(prefix, name);
        match (local.get(name), base.get(name)) {
            (Some(Property::Complex(l)), Some(Property::Complex(b)))
                if l.property_type() == b.property_type() =>
            {
                if !Arc::ptr_eq(l, b) {
                    diff_nodes(l, b, &path, out);
                }
            }
            (l, b) => {
                if !optional_content_eq(l, b) {
                    out.push(path);
                }
            }
        }
    }
}

/// The type of the node holding the property at `path`, and the property name.
fn owner_of<'p>(
    path: &'p str,
    local: &ComplexNode,
    latest: &ComplexNode,
    root_type: &str,
) -> (String, &'p str) {
    match path.rsplit_once('.') {
        None => (root_type.to_string(), path),
        Some((parent, name)) => {
            let owner = local
                .property_at(parent)
                .or_else(|| latest.property_at(parent))
                .map_or_else(String::new, |p| p.property_type().to_string());
            (owner, name)
        }
    }
}

/// Recombine a persisted and a local value with the regular merge rules,
/// the persisted value acting as the ancestor.
fn merge_values<L>(
    persisted: Option<&Property>,
    local: Option<&Property>,
    owner: &str,
    name: &str,
    path: &str,
    lookup: &L,
) -> Result<Option<Property>>
where
    L: StrategyLookup + ?Sized,
{
    let (persisted, local) = match (persisted, local) {
        (Some(p), Some(l)) => (p, l),
        (p, l) => return Ok(l.or(p).cloned()),
    };
    check_compatible(path, persisted, local)?;

    let merged = match (persisted, local) {
        (Property::Simple(p), Property::Simple(l)) => {
            match lookup.strategy_for(owner, name).resolve(p.value(), l.value()) {
                Resolution::KeepParent => persisted.clone(),
                Resolution::TakeChild => local.clone(),
                Resolution::Computed(value) => Property::Simple(Arc::new(SimpleValue {
                    meta: l.meta.clone(),
                    value,
                })),
            }
        }
        (Property::Complex(p), Property::Complex(l)) => {
            Property::complex(merge_nodes(p, l, path, lookup)?)
        }
        _ => local.clone(),
    };
    Ok(Some(merged))
}

fn describe(property: Option<&Property>) -> String {
    property.map_or_else(|| "<absent>".to_string(), Property::describe)
}
