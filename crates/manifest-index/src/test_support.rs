use std::sync::Arc;

use storage::{MemoryBlobStore, MemoryFeed, Owner, Reference};

use crate::config::IndexConfig;
use crate::index::Backend;
use crate::manifest::RecordCodec;
use crate::store::ManifestStore;

pub(crate) fn owner() -> Owner {
    Owner::new([0xab; 20])
}

pub(crate) fn reference(byte: u8) -> Reference {
    Reference::new(vec![byte; 32])
}

pub(crate) fn memory_store() -> (Arc<MemoryFeed>, ManifestStore) {
    let feed = Arc::new(MemoryFeed::new());
    let store = ManifestStore::new(feed.clone(), owner(), RecordCodec::default());
    (feed, store)
}

pub(crate) struct MemoryBackend {
    pub feed: Arc<MemoryFeed>,
    pub blobs: Arc<MemoryBlobStore>,
    pub backend: Backend,
}

pub(crate) fn memory_backend() -> MemoryBackend {
    memory_backend_with(MemoryFeed::new(), IndexConfig::default())
}

pub(crate) fn memory_backend_with(feed: MemoryFeed, config: IndexConfig) -> MemoryBackend {
    let feed = Arc::new(feed);
    let blobs = Arc::new(MemoryBlobStore::new());
    let backend = Backend::new(feed.clone(), blobs.clone(), owner()).with_config(config);
    MemoryBackend {
        feed,
        blobs,
        backend,
    }
}
