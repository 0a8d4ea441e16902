//! Feed and blob storage services consumed by the manifest index.
//!
//! This crate provides the storage collaborators the index is built on:
//! - `Feed`: mutable, owner-scoped records addressed by a topic hash
//! - `BlobStore`: immutable content-addressed objects
//! - In-memory implementations of both, plus a directory-backed feed

pub mod address;
pub mod blob;
pub mod error;
pub mod feed;
pub mod file;

// Re-export main types
pub use address::{Owner, Reference, Topic};
pub use blob::{BlobStore, MemoryBlobStore};
pub use error::{Result, StorageError};
pub use feed::{Feed, MemoryFeed, MAX_CHUNK_LENGTH};
pub use file::FileFeed;
