//! Deferred writes against one index.
//!
//! A batch collects puts and deletes in an in-memory shadow tree that shares
//! the index's root path. Nothing reaches the store until [`Batch::write`],
//! which merges the shadow tree into the persisted one and flushes every
//! changed node, children before parents.

use storage::Reference;

use crate::error::{IndexError, Result};
use crate::index::Index;
use crate::manifest::{Entry, Manifest, Target};
use crate::tree::{Upsert, WriteMode};

pub struct Batch<'a> {
    index: &'a Index,
    shadow: Option<Manifest>,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(index: &'a Index) -> Self {
        Self {
            index,
            shadow: None,
        }
    }

    /// Whether the batch holds no staged keys.
    pub fn is_empty(&self) -> bool {
        self.shadow.as_ref().map_or(true, Manifest::is_empty)
    }

    /// Stages `key` -> `value`.
    pub fn put(&mut self, key: &str, value: Reference) -> Result<()> {
        let index = self.index;
        let shadow = self
            .shadow
            .get_or_insert_with(|| Manifest::new(index.name()));
        index.tree(WriteMode::Stage).put(shadow, key, value)?;
        Ok(())
    }

    /// Removes a key staged earlier in this batch.
    ///
    /// Only the batch's own keys are visible here: a key that exists in the
    /// index but was not put through this batch is `EntryNotFound`. Use
    /// [`Index::delete`] for those.
    pub fn delete(&mut self, key: &str) -> Result<Reference> {
        let Some(shadow) = self.shadow.as_mut() else {
            return Err(IndexError::EntryNotFound(key.to_string()));
        };
        self.index.tree(WriteMode::Stage).remove(shadow, key)
    }

    /// Merges the staged keys into the index.
    ///
    /// Fails with `ManifestNotFound` if the index root cannot be loaded. An
    /// empty batch writes nothing.
    pub fn write(mut self) -> Result<()> {
        let Some(mut shadow) = self.shadow.take().filter(|shadow| !shadow.is_empty()) else {
            return Ok(());
        };
        let mut root = self.index.load_root()?;
        let tree = self.index.tree(WriteMode::Stage);
        let mut inserted = 0u64;
        let mut spliced = 0usize;

        for entry in std::mem::take(&mut shadow.entries) {
            if root.find_by_first_char(&entry.name).is_none() {
                inserted += leaf_count(&entry)?;
                spliced += 1;
                root.insert_sorted(entry);
                continue;
            }
            let mut leaves = Vec::new();
            match &entry.target {
                Target::Leaf(reference) => leaves.push((entry.name.clone(), reference.clone())),
                Target::Branch(_) => match entry.staged_child() {
                    Some(child) => child.staged_leaves(&entry.name, &mut leaves)?,
                    None => {
                        return Err(IndexError::Internal(format!(
                            "batch entry {:?} is not staged",
                            entry.name
                        )))
                    }
                },
            }
            for (key, value) in leaves {
                if tree.insert_or_update(&mut root, "", &key, value)? == Upsert::Inserted {
                    inserted += 1;
                }
            }
        }

        tree.flush(&mut root)?;
        self.index.add_to_count(inserted);
        log::debug!(
            "wrote batch to {} ({inserted} new keys, {spliced} subtrees spliced)",
            self.index.name()
        );
        Ok(())
    }
}

fn leaf_count(entry: &Entry) -> Result<u64> {
    match entry.staged_child() {
        Some(child) => {
            let mut leaves = Vec::new();
            child.staged_leaves("", &mut leaves)?;
            Ok(leaves.len() as u64)
        }
        None if entry.is_leaf() => Ok(1),
        None => Err(IndexError::Internal(format!(
            "batch entry {:?} is not staged",
            entry.name
        ))),
    }
}
