//! Trie node model.
//!
//! A [`Manifest`] is one node of the radix trie. Its entries are kept
//! ordered by first character, with at most one empty-named entry and that
//! one always first. Sibling names never share a first character, so a scan
//! can stop as soon as an entry sorts past the key being looked for.
//!
//! ## Module Structure
//!
//! - `entry` - Entry, its target and the staged/persisted child reference
//! - `codec` - Record encoding (postcard, optionally zstd-compressed)

mod codec;
mod entry;

use storage::Reference;
use thin_vec::ThinVec;

use crate::error::{IndexError, Result};
use crate::types::IndexType;

pub use codec::{decode_manifest, encode_manifest, RecordCodec, MANIFEST_FORMAT_VERSION};
pub use entry::{ChildRef, Entry, EntryKind, Target};

#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Full logical path of this node.
    pub name: String,
    /// Seconds since the Unix epoch.
    pub creation_time: i64,
    /// Declared field type; only set on root manifests.
    pub index_type: Option<IndexType>,
    pub entries: ThinVec<Entry>,
    /// Set when the in-memory copy differs from the stored record. Never
    /// persisted.
    pub dirty: bool,
}

impl Manifest {
    /// Creates an empty node that has not been written anywhere yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creation_time: chrono::Utc::now().timestamp(),
            index_type: None,
            entries: ThinVec::new(),
            dirty: true,
        }
    }

    pub fn root(name: impl Into<String>, index_type: IndexType) -> Self {
        let mut manifest = Self::new(name);
        manifest.index_type = Some(index_type);
        manifest
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `entry` at its ordered position and returns that position.
    pub fn insert_sorted(&mut self, entry: Entry) -> usize {
        let key = entry.first_char();
        let position = self
            .entries
            .partition_point(|existing| existing.first_char() <= key);
        self.entries.insert(position, entry);
        self.dirty = true;
        position
    }

    /// Index of the entry whose name starts with the same character as
    /// `key` (or the empty-named entry when `key` is empty).
    pub fn find_by_first_char(&self, key: &str) -> Option<usize> {
        let wanted = key.chars().next();
        for (index, entry) in self.entries.iter().enumerate() {
            let first = entry.first_char();
            if first == wanted {
                return Some(index);
            }
            if first > wanted {
                break;
            }
        }
        None
    }

    /// Whether any entry still holds an in-memory child.
    pub fn has_staged_children(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.staged_child().is_some())
    }

    /// Collects every leaf of a fully staged subtree in key order.
    ///
    /// Fails if the subtree reaches a persisted child.
    pub fn staged_leaves(&self, prefix: &str, out: &mut Vec<(String, Reference)>) -> Result<()> {
        for entry in &self.entries {
            let key = format!("{prefix}{}", entry.name);
            match &entry.target {
                Target::Leaf(reference) => out.push((key, reference.clone())),
                Target::Branch(ChildRef::Staged(child)) => child.staged_leaves(&key, out)?,
                Target::Branch(ChildRef::Persisted(_)) => {
                    return Err(IndexError::Internal(format!(
                        "staged manifest {} points at a persisted child",
                        self.name
                    )))
                }
            }
        }
        Ok(())
    }
}
