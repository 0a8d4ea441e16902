use storage::Reference;

use super::{common_prefix_len, Tree, WriteMode};
use crate::error::Result;
use crate::manifest::{ChildRef, Entry, Manifest, Target};

/// Outcome of an insert-or-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

impl Tree<'_> {
    /// Sets `key` to `value` in the trie rooted at `root`.
    ///
    /// In [`WriteMode::Persist`] every touched node, `root` included, is
    /// stored before returning. In [`WriteMode::Stage`] nothing is written.
    pub fn put(&self, root: &mut Manifest, key: &str, value: Reference) -> Result<Upsert> {
        let outcome = self.insert_or_update(root, "", key, value)?;
        if self.mode == WriteMode::Persist {
            self.flush(root)?;
        }
        Ok(outcome)
    }

    /// Inserts `key` (relative to `manifest`, which stands for `prefix`).
    pub(crate) fn insert_or_update(
        &self,
        manifest: &mut Manifest,
        prefix: &str,
        key: &str,
        value: Reference,
    ) -> Result<Upsert> {
        let Some(index) = manifest.find_by_first_char(key) else {
            manifest.insert_sorted(Entry::leaf(key, value));
            return Ok(Upsert::Inserted);
        };

        let entry = &mut manifest.entries[index];
        let shared = common_prefix_len(key, &entry.name);

        match &mut entry.target {
            Target::Leaf(existing) if entry.name == key => {
                *existing = value;
                manifest.dirty = true;
                return Ok(Upsert::Updated);
            }
            Target::Leaf(existing) => {
                // Two leaves share a prefix: push both below a new branch.
                let branch_prefix = format!("{prefix}{}", &key[..shared]);
                let mut branch = Manifest::new(self.node_path(&branch_prefix));
                branch.insert_sorted(Entry::leaf(&entry.name[shared..], existing.clone()));
                branch.insert_sorted(Entry::leaf(&key[shared..], value));
                log::debug!("split leaf {:?} into branch {}", entry.name, branch.name);
                *entry = Entry::staged(&key[..shared], branch);
                manifest.dirty = true;
                return Ok(Upsert::Inserted);
            }
            Target::Branch(child_ref) if shared == entry.name.len() => {
                // The key runs through this branch.
                let child_prefix = format!("{prefix}{}", entry.name);
                let rest = &key[shared..];
                return match child_ref {
                    ChildRef::Staged(child) => {
                        let outcome = self.insert_or_update(child, &child_prefix, rest, value)?;
                        manifest.dirty |= child.dirty;
                        Ok(outcome)
                    }
                    ChildRef::Persisted(reference) => {
                        let mut child = self.load_child(&child_prefix, reference)?;
                        let outcome =
                            self.insert_or_update(&mut child, &child_prefix, rest, value)?;
                        match self.mode {
                            WriteMode::Persist => self.flush(&mut child)?,
                            WriteMode::Stage => {
                                *child_ref = ChildRef::Staged(Box::new(child));
                                manifest.dirty = true;
                            }
                        }
                        Ok(outcome)
                    }
                };
            }
            Target::Branch(_) => {}
        }

        // The key diverges inside this branch's name: insert a new branch
        // above the existing child. The child keeps its path.
        let branch_prefix = format!("{prefix}{}", &key[..shared]);
        let mut branch = Manifest::new(self.node_path(&branch_prefix));
        let child = std::mem::replace(
            &mut entry.target,
            Target::Branch(ChildRef::Persisted(Reference::default())),
        );
        branch.insert_sorted(Entry {
            name: entry.name[shared..].to_string(),
            target: child,
        });
        branch.insert_sorted(Entry::leaf(&key[shared..], value));
        log::debug!(
            "split branch {:?} at {:?} into {}",
            entry.name,
            &key[..shared],
            branch.name
        );
        *entry = Entry::staged(&key[..shared], branch);
        manifest.dirty = true;
        Ok(Upsert::Inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::EntryKind;
    use crate::store::ManifestStore;
    use crate::test_support::{memory_store, reference};

    const ROOT: &str = "/users/name";

    fn names(manifest: &Manifest) -> Vec<(&str, EntryKind)> {
        manifest
            .entries
            .iter()
            .map(|e| (e.name.as_str(), e.kind()))
            .collect()
    }

    fn staged_child<'m>(manifest: &'m Manifest, name: &str) -> &'m Manifest {
        manifest
            .entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.staged_child())
            .expect("staged child")
    }

    #[test]
    fn new_keys_are_inserted_sorted() {
        let (_, store) = memory_store();
        let tree = Tree::new(&store, ROOT, WriteMode::Stage);
        let mut root = Manifest::new(ROOT);
        for (i, key) in ["m", "c", "x", ""].iter().enumerate() {
            assert_eq!(
                tree.put(&mut root, key, reference(i as u8)).unwrap(),
                Upsert::Inserted
            );
        }
        assert_eq!(
            names(&root),
            vec![
                ("", EntryKind::Leaf),
                ("c", EntryKind::Leaf),
                ("m", EntryKind::Leaf),
                ("x", EntryKind::Leaf)
            ]
        );
    }

    #[test]
    fn same_key_updates_in_place() {
        let (_, store) = memory_store();
        let tree = Tree::new(&store, ROOT, WriteMode::Stage);
        let mut root = Manifest::new(ROOT);
        tree.put(&mut root, "bob", reference(1)).unwrap();
        assert_eq!(
            tree.put(&mut root, "bob", reference(2)).unwrap(),
            Upsert::Updated
        );
        assert_eq!(root.entries.len(), 1);
        assert_eq!(root.entries[0].value(), Some(&reference(2)));
    }

    #[test]
    fn shared_leaf_prefix_creates_branch() {
        let (_, store) = memory_store();
        let tree = Tree::new(&store, ROOT, WriteMode::Stage);
        let mut root = Manifest::new(ROOT);
        tree.put(&mut root, "apple", reference(1)).unwrap();
        tree.put(&mut root, "app", reference(2)).unwrap();

        assert_eq!(names(&root), vec![("app", EntryKind::Intermediate)]);
        let branch = staged_child(&root, "app");
        assert_eq!(branch.name, "/users/name/app");
        assert_eq!(
            names(branch),
            vec![("", EntryKind::Leaf), ("le", EntryKind::Leaf)]
        );
    }

    #[test]
    fn key_inside_branch_name_splits_branch() {
        let (_, store) = memory_store();
        let tree = Tree::new(&store, ROOT, WriteMode::Stage);
        let mut root = Manifest::new(ROOT);
        tree.put(&mut root, "abcd", reference(1)).unwrap();
        tree.put(&mut root, "abce", reference(2)).unwrap();
        // root: "abc" -> {d, e}
        tree.put(&mut root, "abx", reference(3)).unwrap();

        assert_eq!(names(&root), vec![("ab", EntryKind::Intermediate)]);
        let ab = staged_child(&root, "ab");
        assert_eq!(ab.name, "/users/name/ab");
        assert_eq!(
            names(ab),
            vec![("c", EntryKind::Intermediate), ("x", EntryKind::Leaf)]
        );
        // The re-parented child kept its path.
        assert_eq!(staged_child(ab, "c").name, "/users/name/abc");

        tree.put(&mut root, "a", reference(4)).unwrap();
        let a = staged_child(&root, "a");
        assert_eq!(
            names(a),
            vec![("", EntryKind::Leaf), ("b", EntryKind::Intermediate)]
        );
    }

    #[test]
    fn persist_mode_writes_every_node() {
        let (_, store) = memory_store();
        let tree = Tree::new(&store, ROOT, WriteMode::Persist);
        let mut root = Manifest::new(ROOT);
        tree.put(&mut root, "apple", reference(1)).unwrap();
        tree.put(&mut root, "app", reference(2)).unwrap();
        tree.put(&mut root, "application", reference(3)).unwrap();

        assert!(!root.dirty);
        assert!(!root.has_staged_children());
        let stored_root = store.load(ROOT).unwrap();
        assert_eq!(names(&stored_root), vec![("app", EntryKind::Intermediate)]);
        let app = store.load("/users/name/app").unwrap();
        assert_eq!(
            names(&app),
            vec![("", EntryKind::Leaf), ("l", EntryKind::Intermediate)]
        );
        let appl = store.load("/users/name/appl").unwrap();
        assert_eq!(
            names(&appl),
            vec![("e", EntryKind::Leaf), ("ication", EntryKind::Leaf)]
        );
        assert_eq!(
            app.entries[1].target_reference(),
            Some(&ManifestStore::reference("/users/name/appl"))
        );
    }

    #[test]
    fn stage_mode_attaches_loaded_children() {
        let (_, store) = memory_store();
        let mut root = Manifest::new(ROOT);
        Tree::new(&store, ROOT, WriteMode::Persist)
            .put(&mut root, "ab", reference(1))
            .unwrap();
        Tree::new(&store, ROOT, WriteMode::Persist)
            .put(&mut root, "ac", reference(2))
            .unwrap();

        let staged = Tree::new(&store, ROOT, WriteMode::Stage);
        staged.put(&mut root, "ad", reference(3)).unwrap();
        assert!(root.dirty);
        let a = staged_child(&root, "a");
        assert_eq!(a.entries.len(), 3);
        // Nothing reached the store yet.
        assert_eq!(store.load("/users/name/a").unwrap().entries.len(), 2);

        staged.flush(&mut root).unwrap();
        assert_eq!(store.load("/users/name/a").unwrap().entries.len(), 3);
    }
}
