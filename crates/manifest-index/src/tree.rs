//! Mutation and lookup over a manifest trie.
//!
//! A node's logical path is the index root for the root node and
//! `root + "/" + prefix` for every other node, where `prefix` is the full key
//! prefix the node stands for. Splits and collapses only ever rename entries,
//! so a subtree never has to be moved to a new path.
//!
//! ## Module Structure
//!
//! - `insert` - insert-or-update with prefix splits
//! - `remove` - delete with branch collapse
//! - `lookup` - exact-key location

mod insert;
mod lookup;
mod remove;

use crate::error::Result;
use crate::manifest::{ChildRef, Manifest, Target};
use crate::store::ManifestStore;

pub use insert::Upsert;
pub use lookup::Location;

/// Whether mutations write through to the store or stay in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// New and changed nodes are persisted before the call returns.
    Persist,
    /// New nodes stay attached as staged children until [`Tree::flush`].
    Stage,
}

/// Operations over one trie, rooted at the logical path `root`.
#[derive(Debug, Clone, Copy)]
pub struct Tree<'a> {
    store: &'a ManifestStore,
    root: &'a str,
    mode: WriteMode,
}

impl<'a> Tree<'a> {
    pub fn new(store: &'a ManifestStore, root: &'a str, mode: WriteMode) -> Self {
        Self { store, root, mode }
    }

    pub fn root(&self) -> &str {
        self.root
    }

    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Path of the node that stands for `prefix`.
    pub fn node_path(&self, prefix: &str) -> String {
        node_path(self.root, prefix)
    }

    /// Loads the persisted child behind an intermediate entry.
    pub(crate) fn load_child(&self, prefix: &str, reference: &storage::Reference) -> Result<Manifest> {
        self.store.load_child(&self.node_path(prefix), reference)
    }

    /// Persists every staged child of `manifest` depth-first, then the
    /// manifest itself if it changed.
    pub fn flush(&self, manifest: &mut Manifest) -> Result<()> {
        for entry in manifest.entries.iter_mut() {
            let flushed = match &mut entry.target {
                Target::Branch(ChildRef::Staged(child)) => {
                    self.flush(child)?;
                    Some(ManifestStore::reference(&child.name))
                }
                _ => None,
            };
            if let Some(reference) = flushed {
                entry.target = Target::Branch(ChildRef::Persisted(reference));
                manifest.dirty = true;
            }
        }
        if manifest.dirty {
            self.store.store(manifest)?;
            manifest.dirty = false;
        }
        Ok(())
    }

    /// Deletes a record that is no longer linked from the trie.
    ///
    /// The unlink already happened, so a failure here only leaves garbage.
    pub(crate) fn discard(&self, path: &str) {
        if self.mode == WriteMode::Stage {
            return;
        }
        if let Err(error) = self.store.delete(path) {
            log::warn!("failed to delete unlinked manifest {path}: {error}");
        }
    }
}

pub fn node_path(root: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        root.to_string()
    } else {
        format!("{root}/{prefix}")
    }
}

/// Length in bytes of the longest common prefix, on character boundaries.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .take_while(|((_, left), right)| left == right)
        .last()
        .map(|((offset, c), _)| offset + c.len_utf8())
        .unwrap_or(0)
}
