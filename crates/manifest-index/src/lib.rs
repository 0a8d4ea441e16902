//! Versioned manifest-trie index over feed and blob storage.
//!
//! This crate provides the index core:
//! - A radix trie whose nodes (manifests) are stored as feed records
//! - Insert, lookup and delete with prefix split and collapse
//! - Parallel tree hydration for counting and snapshots
//! - Ordered iteration with seek, end bound and limit
//! - Batches that stage writes in memory and merge them on commit

pub mod batch;
pub mod cancel;
pub mod config;
pub mod error;
pub mod index;
pub mod iterator;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod store;
pub mod tree;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export main types
pub use batch::Batch;
pub use cancel::CancellationToken;
pub use config::IndexConfig;
pub use error::{IndexError, Result};
pub use index::{index_name, Backend, Index};
pub use iterator::{IndexIterator, NumberIter};
pub use loader::{LoadedNode, TreeSnapshot};
pub use manifest::{ChildRef, Entry, EntryKind, Manifest, Target};
pub use registry::IndexRegistry;
pub use store::ManifestStore;
pub use tree::{Location, Tree, Upsert, WriteMode};
pub use types::IndexType;
