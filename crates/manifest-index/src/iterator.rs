//! Ordered traversal of an index.
//!
//! The iterator keeps the depth-first path from the root to the cursor as a
//! stack of frames. Each frame owns the manifest it walks, the offset of the
//! next entry to visit and the key prefix that manifest stands for. Branches
//! are loaded lazily as the cursor reaches them.

use storage::Reference;

use crate::error::{IndexError, Result};
use crate::manifest::{ChildRef, Manifest, Target};
use crate::tree::Tree;
use crate::types::decode_number_key;

#[derive(Debug)]
struct Frame {
    manifest: Manifest,
    next: usize,
    prefix: String,
}

/// Forward iterator over `(key, reference)` pairs in key order.
///
/// Keys are bounded above by `end`: a key is produced while `end` is empty,
/// the key sorts at or before `end`, or the key starts with `end`.
#[derive(Debug)]
pub struct IndexIterator<'a> {
    tree: Tree<'a>,
    root: Manifest,
    stack: Vec<Frame>,
    end: String,
    limit: Option<usize>,
    delivered: usize,
    current: Option<(String, Reference)>,
    exhausted: bool,
}

impl<'a> IndexIterator<'a> {
    /// Creates an iterator positioned at the first key `>= start`.
    ///
    /// A `limit` of zero or less means no limit.
    pub fn new(tree: Tree<'a>, root: Manifest, start: &str, end: &str, limit: i64) -> Result<Self> {
        let mut iterator = Self {
            tree,
            root,
            stack: Vec::new(),
            end: end.to_string(),
            limit: usize::try_from(limit).ok().filter(|limit| *limit > 0),
            delivered: 0,
            current: None,
            exhausted: false,
        };
        iterator.seek(start)?;
        Ok(iterator)
    }

    /// Key of the last pair produced.
    pub fn key(&self) -> Option<&str> {
        self.current.as_ref().map(|(key, _)| key.as_str())
    }

    /// Reference of the last pair produced.
    pub fn value(&self) -> Option<&Reference> {
        self.current.as_ref().map(|(_, value)| value)
    }

    /// Number of pairs produced so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    fn finish(&mut self) -> Result<(String, Reference)> {
        self.exhausted = true;
        self.stack.clear();
        self.current = None;
        Err(IndexError::NoMoreEntries)
    }

    /// Repositions the cursor so that the next pair produced is the
    /// smallest key `>= key`. Resets exhaustion but not the limit count.
    pub fn seek(&mut self, key: &str) -> Result<()> {
        self.stack.clear();
        self.current = None;
        self.exhausted = false;

        let mut manifest = self.root.clone();
        let mut prefix = String::new();
        let mut rest = key;

        loop {
            if rest.is_empty() {
                self.stack.push(Frame {
                    manifest,
                    next: 0,
                    prefix,
                });
                return Ok(());
            }

            let wanted = rest.chars().next();
            let mut position = manifest.entries.len();
            let mut descend = None;
            for (index, entry) in manifest.entries.iter().enumerate() {
                let first = entry.first_char();
                if first < wanted {
                    continue;
                }
                position = if first > wanted {
                    index
                } else if entry.is_leaf() {
                    if entry.name.as_str() >= rest {
                        index
                    } else {
                        index + 1
                    }
                } else if rest.starts_with(entry.name.as_str()) {
                    descend = Some(index);
                    index + 1
                } else if entry.name.as_str() > rest {
                    index
                } else {
                    index + 1
                };
                break;
            }

            let Some(index) = descend else {
                self.stack.push(Frame {
                    manifest,
                    next: position,
                    prefix,
                });
                return Ok(());
            };

            let entry = &manifest.entries[index];
            let child_prefix = format!("{prefix}{}", entry.name);
            let child = open_child(&self.tree, &child_prefix, &entry.target)?;
            rest = &rest[entry.name.len()..];
            self.stack.push(Frame {
                manifest,
                next: position,
                prefix,
            });
            manifest = child;
            prefix = child_prefix;
        }
    }

    /// Advances to the next pair, or `Err(NoMoreEntries)` once the end
    /// bound, the limit or the last key has been reached.
    pub fn next_entry(&mut self) -> Result<(String, Reference)> {
        loop {
            if self.exhausted {
                return Err(IndexError::NoMoreEntries);
            }
            if self.limit.is_some_and(|limit| self.delivered >= limit) {
                return self.finish();
            }
            let Some(frame) = self.stack.last_mut() else {
                return self.finish();
            };
            let Some(entry) = frame.manifest.entries.get(frame.next) else {
                self.stack.pop();
                continue;
            };
            frame.next += 1;
            let key = format!("{}{}", frame.prefix, entry.name);

            if !within_end(&self.end, &key) {
                // Every later key sorts after this one, so none can be in range.
                return self.finish();
            }

            match &entry.target {
                Target::Leaf(reference) => {
                    let pair = (key, reference.clone());
                    self.delivered += 1;
                    self.current = Some(pair.clone());
                    return Ok(pair);
                }
                target => {
                    let child = open_child(&self.tree, &key, target)?;
                    self.stack.push(Frame {
                        manifest: child,
                        next: 0,
                        prefix: key,
                    });
                }
            }
        }
    }

    /// Adapts this iterator to decode number keys.
    pub fn numbers(self) -> NumberIter<'a> {
        NumberIter { inner: self }
    }
}

fn within_end(end: &str, key: &str) -> bool {
    end.is_empty() || key <= end || key.starts_with(end)
}

fn open_child(tree: &Tree<'_>, prefix: &str, target: &Target) -> Result<Manifest> {
    match target {
        Target::Branch(ChildRef::Persisted(reference)) => tree.load_child(prefix, reference),
        Target::Branch(ChildRef::Staged(child)) => Ok(child.as_ref().clone()),
        Target::Leaf(_) => Err(IndexError::Internal(format!(
            "{prefix:?} is a leaf, not a branch"
        ))),
    }
}

impl Iterator for IndexIterator<'_> {
    type Item = Result<(String, Reference)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_entry() {
            Ok(pair) => Some(Ok(pair)),
            Err(IndexError::NoMoreEntries) => None,
            Err(error) => {
                self.exhausted = true;
                Some(Err(error))
            }
        }
    }
}

/// Iterator over a number index, yielding decoded keys.
#[derive(Debug)]
pub struct NumberIter<'a> {
    inner: IndexIterator<'a>,
}

impl Iterator for NumberIter<'_> {
    type Item = Result<(i64, Reference)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        Some(item.and_then(|(key, value)| Ok((decode_number_key(&key)?, value))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ManifestStore;
    use crate::test_support::{memory_store, reference};
    use crate::tree::WriteMode;

    const ROOT: &str = "/words/text";
    const KEYS: [&str; 10] = [
        "apple",
        "app",
        "application",
        "b",
        "banana",
        "band",
        "bandana",
        "cherry",
        "",
        "zebra",
    ];

    fn populated(store: &ManifestStore) -> Manifest {
        let tree = Tree::new(store, ROOT, WriteMode::Persist);
        let mut root = Manifest::new(ROOT);
        for (i, key) in KEYS.iter().enumerate() {
            tree.put(&mut root, key, reference(i as u8)).unwrap();
        }
        root
    }

    fn sorted_keys() -> Vec<String> {
        let mut keys: Vec<String> = KEYS.iter().map(|k| k.to_string()).collect();
        keys.sort();
        keys
    }

    fn collect(iterator: IndexIterator<'_>) -> Vec<String> {
        iterator.map(|item| item.unwrap().0).collect()
    }

    #[test]
    fn full_scan_is_sorted_and_complete() {
        let (_, store) = memory_store();
        let root = populated(&store);
        let tree = Tree::new(&store, ROOT, WriteMode::Persist);
        let iterator = IndexIterator::new(tree, root, "", "", 0).unwrap();
        assert_eq!(collect(iterator), sorted_keys());
    }

    #[test]
    fn values_follow_their_keys() {
        let (_, store) = memory_store();
        let root = populated(&store);
        let tree = Tree::new(&store, ROOT, WriteMode::Persist);
        for item in IndexIterator::new(tree, root, "", "", 0).unwrap() {
            let (key, value) = item.unwrap();
            let position = KEYS.iter().position(|k| *k == key).unwrap();
            assert_eq!(value, reference(position as u8));
        }
    }

    #[test]
    fn limit_caps_results() {
        let (_, store) = memory_store();
        let root = populated(&store);
        let tree = Tree::new(&store, ROOT, WriteMode::Persist);
        let mut iterator = IndexIterator::new(tree, root, "", "", 3).unwrap();
        let mut seen = Vec::new();
        while let Ok((key, _)) = iterator.next_entry() {
            seen.push(key);
        }
        assert_eq!(seen, sorted_keys()[..3].to_vec());
        assert_eq!(iterator.delivered(), 3);
        assert!(matches!(
            iterator.next_entry(),
            Err(IndexError::NoMoreEntries)
        ));
    }

    #[test]
    fn seek_matches_full_scan_suffix() {
        let (_, store) = memory_store();
        let root = populated(&store);
        let all = sorted_keys();
        for target in [
            "", "a", "app", "appl", "apple", "applz", "ba", "ban", "bana", "bandb", "c", "cherryx",
            "d", "zebra", "zz",
        ] {
            let tree = Tree::new(&store, ROOT, WriteMode::Persist);
            let iterator = IndexIterator::new(tree, root.clone(), target, "", 0).unwrap();
            let expected: Vec<String> =
                all.iter().filter(|k| k.as_str() >= target).cloned().collect();
            assert_eq!(collect(iterator), expected, "seek {target:?}");
        }
    }

    #[test]
    fn seek_repositions_mid_scan() {
        let (_, store) = memory_store();
        let root = populated(&store);
        let tree = Tree::new(&store, ROOT, WriteMode::Persist);
        let mut iterator = IndexIterator::new(tree, root, "", "", 0).unwrap();
        iterator.next_entry().unwrap();
        iterator.next_entry().unwrap();
        iterator.seek("band").unwrap();
        assert_eq!(iterator.next_entry().unwrap().0, "band");
        assert_eq!(iterator.key(), Some("band"));
        assert_eq!(iterator.next_entry().unwrap().0, "bandana");
    }

    #[test]
    fn end_bound_includes_prefix_matches() {
        let (_, store) = memory_store();
        let root = populated(&store);
        let tree = Tree::new(&store, ROOT, WriteMode::Persist);
        let iterator = IndexIterator::new(tree, root.clone(), "b", "band", 0).unwrap();
        assert_eq!(collect(iterator), vec!["b", "banana", "band", "bandana"]);

        let tree = Tree::new(&store, ROOT, WriteMode::Persist);
        let iterator = IndexIterator::new(tree, root, "", "b", 0).unwrap();
        assert_eq!(
            collect(iterator),
            vec!["", "app", "apple", "application", "b", "banana", "band", "bandana"]
        );
    }

    #[test]
    fn branches_past_the_end_are_not_loaded() {
        let (_, store) = memory_store();
        let root = populated(&store);
        // Break the "b" branch; a scan that ends before it must not touch it.
        store.delete("/words/text/b").unwrap();
        let tree = Tree::new(&store, ROOT, WriteMode::Persist);
        let iterator = IndexIterator::new(tree, root.clone(), "", "apz", 0).unwrap();
        assert_eq!(collect(iterator), vec!["", "app", "apple", "application"]);

        let tree = Tree::new(&store, ROOT, WriteMode::Persist);
        let results: Vec<_> = IndexIterator::new(tree, root, "", "", 0).unwrap().collect();
        assert!(results.iter().any(|item| item.is_err()));
    }

    #[test]
    fn empty_tree_yields_nothing() {
        let (_, store) = memory_store();
        let tree = Tree::new(&store, ROOT, WriteMode::Persist);
        let mut iterator = IndexIterator::new(tree, Manifest::new(ROOT), "", "", 0).unwrap();
        assert!(matches!(
            iterator.next_entry(),
            Err(IndexError::NoMoreEntries)
        ));
        assert!(iterator.key().is_none());
    }
}
