use storage::Reference;

use super::{Tree, WriteMode};
use crate::error::{IndexError, Result};
use crate::manifest::{ChildRef, Manifest, Target};
use crate::store::ManifestStore;

impl Tree<'_> {
    /// Removes `key` from the trie rooted at `root` and returns the reference
    /// it held.
    ///
    /// A branch left with a single entry is folded back into its parent and
    /// an empty branch is unlinked, so no single-child node survives.
    pub fn remove(&self, root: &mut Manifest, key: &str) -> Result<Reference> {
        let removed = self.remove_from(root, "", key, key)?;
        if self.mode == WriteMode::Persist {
            self.flush(root)?;
        }
        Ok(removed)
    }

    fn remove_from(
        &self,
        manifest: &mut Manifest,
        prefix: &str,
        key: &str,
        full_key: &str,
    ) -> Result<Reference> {
        let not_found = || IndexError::EntryNotFound(full_key.to_string());
        let index = manifest.find_by_first_char(key).ok_or_else(not_found)?;
        let entry = &mut manifest.entries[index];
        if !key.starts_with(entry.name.as_str()) {
            return Err(not_found());
        }
        let child_prefix = format!("{prefix}{}", entry.name);
        let rest = &key[entry.name.len()..];

        let (removed, child, had_record) = match &mut entry.target {
            Target::Leaf(reference) => {
                if !rest.is_empty() {
                    return Err(not_found());
                }
                let removed = reference.clone();
                manifest.entries.remove(index);
                manifest.dirty = true;
                return Ok(removed);
            }
            Target::Branch(ChildRef::Staged(child)) => {
                let removed = self.remove_from(child, &child_prefix, rest, full_key)?;
                (removed, std::mem::take(child.as_mut()), false)
            }
            Target::Branch(ChildRef::Persisted(reference)) => {
                let mut child = self.load_child(&child_prefix, reference)?;
                let removed = self.remove_from(&mut child, &child_prefix, rest, full_key)?;
                (removed, child, true)
            }
        };

        self.relink(manifest, index, child, had_record)?;
        Ok(removed)
    }

    /// Puts a branch that just lost an entry back under `manifest.entries[index]`,
    /// collapsing it when it has fewer than two entries left.
    fn relink(
        &self,
        manifest: &mut Manifest,
        index: usize,
        mut child: Manifest,
        had_record: bool,
    ) -> Result<()> {
        match child.entries.len() {
            0 => {
                let unlinked = manifest.entries.remove(index);
                log::debug!("unlinked empty branch {:?} ({})", unlinked.name, child.name);
                manifest.dirty = true;
                if had_record {
                    self.discard(&child.name);
                }
            }
            1 => {
                let Some(last) = child.entries.pop() else {
                    return Ok(());
                };
                let entry = &mut manifest.entries[index];
                log::debug!(
                    "collapsed branch {} into {:?}",
                    child.name,
                    format!("{}{}", entry.name, last.name)
                );
                entry.name.push_str(&last.name);
                entry.target = last.target;
                manifest.dirty = true;
                if had_record {
                    self.discard(&child.name);
                }
            }
            _ => {
                let entry = &mut manifest.entries[index];
                match self.mode {
                    WriteMode::Persist => {
                        self.flush(&mut child)?;
                        entry.target =
                            Target::Branch(ChildRef::Persisted(ManifestStore::reference(&child.name)));
                        manifest.dirty |= !had_record;
                    }
                    WriteMode::Stage => {
                        entry.target = Target::Branch(ChildRef::Staged(Box::new(child)));
                        manifest.dirty = true;
                    }
                }
            }
        }
        Ok(())
    }
}
