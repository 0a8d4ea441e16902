//! Concurrent hydration of a whole manifest tree.
//!
//! Every intermediate entry of a manifest is loaded by its own rayon task and
//! each task recurses into the child it loaded, so siblings at every depth are
//! fetched in parallel. A parent only returns once all of its children have.
//! The first failure is kept and cancels the shared token; tasks that see the
//! token cancelled stop fanning out and report nothing further.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use storage::Reference;

use crate::cancel::{CancellationToken, FirstError};
use crate::error::{IndexError, Result};
use crate::manifest::{ChildRef, Manifest, Target};
use crate::store::ManifestStore;
use crate::tree::{Tree, WriteMode};

/// A manifest together with its hydrated children.
#[derive(Debug)]
pub struct LoadedNode {
    pub manifest: Manifest,
    /// Key prefix this node stands for.
    pub prefix: String,
    /// One node per intermediate entry, in entry order.
    pub children: Vec<LoadedNode>,
    /// Leaves in this subtree.
    pub leaves: u64,
}

impl LoadedNode {
    fn new(manifest: Manifest, prefix: String, children: Vec<LoadedNode>) -> Self {
        let own = manifest.entries.iter().filter(|e| e.is_leaf()).count() as u64;
        let leaves = own + children.iter().map(|child| child.leaves).sum::<u64>();
        Self {
            manifest,
            prefix,
            children,
            leaves,
        }
    }

    fn collect_leaves(&self, out: &mut Vec<(String, Reference)>) {
        let mut children = self.children.iter();
        for entry in &self.manifest.entries {
            match entry.value() {
                Some(reference) => {
                    out.push((format!("{}{}", self.prefix, entry.name), reference.clone()))
                }
                None => {
                    if let Some(child) = children.next() {
                        child.collect_leaves(out);
                    }
                }
            }
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let mut children = self.children.iter();
        for entry in &self.manifest.entries {
            let indent = "  ".repeat(depth);
            match entry.value() {
                Some(reference) => writeln!(f, "{indent}{:?} = {reference}", entry.name)?,
                None => {
                    writeln!(f, "{indent}{:?}/", entry.name)?;
                    if let Some(child) = children.next() {
                        child.fmt_indented(f, depth + 1)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// A fully hydrated index tree.
#[derive(Debug)]
pub struct TreeSnapshot {
    pub root: LoadedNode,
    /// Number of manifests that were read.
    pub manifests: usize,
}

impl TreeSnapshot {
    /// Total leaf count.
    pub fn leaves(&self) -> u64 {
        self.root.leaves
    }

    /// Every key and its reference, in key order.
    pub fn entries(&self) -> Vec<(String, Reference)> {
        let mut out = Vec::with_capacity(self.root.leaves as usize);
        self.root.collect_leaves(&mut out);
        out
    }
}

impl fmt::Display for TreeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({} leaves, {} manifests)",
            self.root.manifest.name, self.root.leaves, self.manifests
        )?;
        self.root.fmt_indented(f, 1)
    }
}

/// Shared state of one load.
struct LoadContext<'a> {
    tree: Tree<'a>,
    token: CancellationToken,
    errors: FirstError<IndexError>,
    manifests: AtomicUsize,
}

impl LoadContext<'_> {
    /// Records a task failure. Once the load is cancelled further errors are
    /// dropped and this returns false.
    fn fail(&self, error: IndexError) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        log::warn!("failed to load manifest under {}: {error}", self.tree.root());
        let recorded = self.errors.record(error);
        if recorded {
            self.token.cancel();
        }
        recorded
    }
}

/// Loads the tree rooted at `root_path` with every branch hydrated.
///
/// Runs on `pool` when given, otherwise on the global rayon pool.
pub fn load_tree(
    store: &ManifestStore,
    root_path: &str,
    pool: Option<&rayon::ThreadPool>,
) -> Result<TreeSnapshot> {
    let root = store.load(root_path)?;
    let context = LoadContext {
        tree: Tree::new(store, root_path, WriteMode::Stage),
        token: CancellationToken::new(),
        errors: FirstError::default(),
        manifests: AtomicUsize::new(1),
    };

    let loaded = match pool {
        Some(pool) => pool.install(|| hydrate(&context, root, String::new())),
        None => hydrate(&context, root, String::new()),
    };

    let LoadContext {
        errors, manifests, ..
    } = context;
    if let Some(error) = errors.into_inner() {
        return Err(error);
    }
    let root = loaded.ok_or_else(|| {
        IndexError::Internal(format!("loading {root_path} was cancelled without an error"))
    })?;
    Ok(TreeSnapshot {
        root,
        manifests: manifests.into_inner(),
    })
}

/// Builds a dedicated loader pool.
pub fn build_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("manifest-loader-{index}"))
        .build()
        .map_err(|error| IndexError::Internal(format!("failed to build loader pool: {error}")))
}

fn hydrate(context: &LoadContext, manifest: Manifest, prefix: String) -> Option<LoadedNode> {
    context.token.is_active()?;

    let children: Option<Vec<LoadedNode>> = manifest
        .entries
        .par_iter()
        .filter(|entry| !entry.is_leaf())
        .map(|entry| {
            context.token.is_active()?;
            let child_prefix = format!("{prefix}{}", entry.name);
            let child = match &entry.target {
                Target::Branch(ChildRef::Persisted(reference)) => {
                    match context.tree.load_child(&child_prefix, reference) {
                        Ok(child) => child,
                        Err(error) => {
                            context.fail(error);
                            return None;
                        }
                    }
                }
                Target::Branch(ChildRef::Staged(child)) => child.as_ref().clone(),
                Target::Leaf(_) => return None,
            };
            context.manifests.fetch_add(1, Ordering::Relaxed);
            hydrate(context, child, child_prefix)
        })
        .collect();

    Some(LoadedNode::new(manifest, prefix, children?))
}
