use std::borrow::Cow;

use storage::Reference;

use super::Tree;
use crate::error::{IndexError, Result};
use crate::manifest::{ChildRef, Entry, Manifest, Target};

/// Where a key lives: the manifest that owns its leaf and the entry index.
#[derive(Debug)]
pub struct Location<'a> {
    /// Borrowed when the owner is the searched root or one of its staged
    /// children, owned when it had to be loaded from the store.
    pub manifest: Cow<'a, Manifest>,
    pub index: usize,
    /// Key prefix the owning manifest stands for.
    pub prefix: String,
}

impl Location<'_> {
    pub fn entry(&self) -> &Entry {
        &self.manifest.entries[self.index]
    }

    /// The located leaf's reference.
    pub fn value(&self) -> Option<&Reference> {
        self.entry().value()
    }

    /// The full key, reassembled from the prefix and the entry name.
    pub fn key(&self) -> String {
        format!("{}{}", self.prefix, self.entry().name)
    }
}

enum Step {
    Found(usize),
    Descend(usize),
}

impl Tree<'_> {
    /// Finds the leaf holding `key` under `root`.
    pub fn locate<'m>(&self, root: &'m Manifest, key: &str) -> Result<Location<'m>> {
        let not_found = || IndexError::EntryNotFound(key.to_string());
        let mut current = Cow::Borrowed(root);
        let mut prefix = String::new();
        let mut rest = key;

        loop {
            let step = {
                let index = current.find_by_first_char(rest).ok_or_else(not_found)?;
                let entry = &current.entries[index];
                match &entry.target {
                    Target::Leaf(_) if entry.name == rest => Step::Found(index),
                    Target::Branch(_) if rest.starts_with(entry.name.as_str()) => {
                        Step::Descend(index)
                    }
                    _ => return Err(not_found()),
                }
            };

            let index = match step {
                Step::Found(index) => {
                    return Ok(Location {
                        manifest: current,
                        index,
                        prefix,
                    })
                }
                Step::Descend(index) => index,
            };

            let name_len = current.entries[index].name.len();
            prefix.push_str(&rest[..name_len]);
            rest = &rest[name_len..];
            current = match current {
                Cow::Borrowed(node) => match &node.entries[index].target {
                    Target::Branch(ChildRef::Staged(child)) => Cow::Borrowed(child.as_ref()),
                    Target::Branch(ChildRef::Persisted(reference)) => {
                        Cow::Owned(self.load_child(&prefix, reference)?)
                    }
                    Target::Leaf(_) => return Err(not_found()),
                },
                Cow::Owned(mut node) => match node.entries.remove(index).target {
                    Target::Branch(ChildRef::Staged(child)) => Cow::Owned(*child),
                    Target::Branch(ChildRef::Persisted(reference)) => {
                        Cow::Owned(self.load_child(&prefix, &reference)?)
                    }
                    Target::Leaf(_) => return Err(not_found()),
                },
            };
        }
    }

    /// The reference stored for `key`.
    pub fn get(&self, root: &Manifest, key: &str) -> Result<Reference> {
        let location = self.locate(root, key)?;
        location
            .value()
            .cloned()
            .ok_or_else(|| IndexError::Internal(format!("{key:?} located on a branch entry")))
    }
}
