//! Trie edges.

use serde::{Deserialize, Serialize};
use storage::Reference;

use super::Manifest;

/// Persisted type tag of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Leaf,
    Intermediate,
}

/// Where an intermediate entry's child lives.
#[derive(Debug, Clone)]
pub enum ChildRef {
    /// The child has a record in the manifest store.
    Persisted(Reference),
    /// The child exists only in memory and must be flushed before its
    /// parent is written.
    Staged(Box<Manifest>),
}

#[derive(Debug, Clone)]
pub enum Target {
    Leaf(Reference),
    Branch(ChildRef),
}

/// An edge from a manifest to either a value or a child manifest.
///
/// `name` is the key suffix relative to the owning manifest, not a path.
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub target: Target,
}

impl Entry {
    pub fn leaf(name: impl Into<String>, reference: Reference) -> Self {
        Self {
            name: name.into(),
            target: Target::Leaf(reference),
        }
    }

    pub fn persisted(name: impl Into<String>, reference: Reference) -> Self {
        Self {
            name: name.into(),
            target: Target::Branch(ChildRef::Persisted(reference)),
        }
    }

    pub fn staged(name: impl Into<String>, child: Manifest) -> Self {
        Self {
            name: name.into(),
            target: Target::Branch(ChildRef::Staged(Box::new(child))),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self.target {
            Target::Leaf(_) => EntryKind::Leaf,
            Target::Branch(_) => EntryKind::Intermediate,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.target, Target::Leaf(_))
    }

    /// The ordering key: empty names sort before everything else.
    #[inline]
    pub fn first_char(&self) -> Option<char> {
        self.name.chars().next()
    }

    /// Reference of a leaf entry.
    pub fn value(&self) -> Option<&Reference> {
        match &self.target {
            Target::Leaf(reference) => Some(reference),
            Target::Branch(_) => None,
        }
    }

    /// Reference stored for this entry: the value of a leaf or the address
    /// of a persisted child.
    pub fn target_reference(&self) -> Option<&Reference> {
        match &self.target {
            Target::Leaf(reference) | Target::Branch(ChildRef::Persisted(reference)) => {
                Some(reference)
            }
            Target::Branch(ChildRef::Staged(_)) => None,
        }
    }

    /// The staged child of an intermediate entry, if it is held in memory.
    pub fn staged_child(&self) -> Option<&Manifest> {
        match &self.target {
            Target::Branch(ChildRef::Staged(child)) => Some(child),
            _ => None,
        }
    }
}
