//! Index handle over one manifest trie.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use storage::{BlobStore, Feed, Owner, Reference};

use crate::batch::Batch;
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::iterator::{IndexIterator, NumberIter};
use crate::loader::{build_pool, load_tree, TreeSnapshot};
use crate::manifest::{Manifest, RecordCodec};
use crate::store::ManifestStore;
use crate::tree::{Location, Tree, Upsert, WriteMode};
use crate::types::{encode_number_key, IndexType};

/// The storage services an index is built on.
#[derive(Clone)]
pub struct Backend {
    pub feed: Arc<dyn Feed>,
    pub blobs: Arc<dyn BlobStore>,
    /// Account that owns every feed record of the index.
    pub owner: Owner,
    pub config: IndexConfig,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("owner", &self.owner)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Backend {
    pub fn new(feed: Arc<dyn Feed>, blobs: Arc<dyn BlobStore>, owner: Owner) -> Self {
        Self {
            feed,
            blobs,
            owner,
            config: IndexConfig::default(),
        }
    }

    pub fn with_config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    fn manifest_store(&self) -> ManifestStore {
        ManifestStore::new(
            self.feed.clone(),
            self.owner,
            RecordCodec::from(&self.config),
        )
    }
}

/// Root path of the index over `field` in `collection`.
pub fn index_name(collection: &str, field: &str) -> Result<String> {
    for part in [collection, field] {
        if part.is_empty() || part.contains('/') {
            return Err(IndexError::InvalidName(format!(
                "{part:?} (names must be non-empty and must not contain '/')"
            )));
        }
    }
    Ok(format!("/{collection}/{field}"))
}

/// An open index.
///
/// Callers serialize mutations (`put`, `delete`, batch writes) on one index;
/// reads may run alongside each other.
pub struct Index {
    name: String,
    index_type: IndexType,
    store: ManifestStore,
    blobs: Arc<dyn BlobStore>,
    config: IndexConfig,
    count: AtomicU64,
    pool: Option<rayon::ThreadPool>,
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("index_type", &self.index_type)
            .field("count", &self.count.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Index {
    /// Creates an empty index. Fails if one already exists under that name.
    pub fn create(
        backend: &Backend,
        collection: &str,
        field: &str,
        index_type: IndexType,
    ) -> Result<()> {
        let name = index_name(collection, field)?;
        let root = Manifest::root(name.as_str(), index_type);
        match backend.manifest_store().create(&root) {
            Ok(_) => {
                log::debug!("created {index_type} index {name}");
                Ok(())
            }
            Err(IndexError::ManifestAlreadyExists(_)) => Err(IndexError::IndexAlreadyExists(name)),
            Err(error) => Err(error),
        }
    }

    /// Opens an existing index and counts its entries.
    pub fn open(backend: &Backend, collection: &str, field: &str) -> Result<Self> {
        let started = Instant::now();
        let name = index_name(collection, field)?;
        let store = backend.manifest_store();
        let root = match store.load(&name) {
            Ok(root) => root,
            Err(IndexError::ManifestNotFound(_)) => return Err(IndexError::IndexNotFound(name)),
            Err(error) => return Err(error),
        };
        let index_type = root.index_type.unwrap_or_default();
        let pool = backend
            .config
            .loader_threads
            .map(build_pool)
            .transpose()?;

        let index = Self {
            name,
            index_type,
            store,
            blobs: backend.blobs.clone(),
            config: backend.config.clone(),
            count: AtomicU64::new(0),
            pool,
        };
        let leaves = index.sync()?;
        log::info!(
            "opened {} index {} ({leaves} entries) in {}ms",
            index.index_type,
            index.name,
            started.elapsed().as_millis()
        );
        Ok(index)
    }

    /// Removes an index and every manifest of its tree.
    ///
    /// Branch records are removed best-effort; the call fails only when the
    /// root record cannot be cleared.
    pub fn delete_index(backend: &Backend, collection: &str, field: &str) -> Result<()> {
        let name = index_name(collection, field)?;
        let store = backend.manifest_store();
        match store.load(&name) {
            Ok(_) => {}
            Err(IndexError::ManifestNotFound(_)) => return Err(IndexError::IndexNotFound(name)),
            Err(error) => return Err(error),
        }

        match load_tree(&store, &name, None) {
            Ok(snapshot) => {
                let mut pending: Vec<_> = snapshot.root.children.iter().collect();
                while let Some(node) = pending.pop() {
                    pending.extend(node.children.iter());
                    if let Err(error) = store.delete(&node.manifest.name) {
                        log::warn!("failed to delete branch {}: {error}", node.manifest.name);
                    }
                }
            }
            Err(error) => {
                log::warn!("deleting index {name} without its branches: {error}");
            }
        }

        store.delete(&name).map_err(|error| match error {
            IndexError::ManifestNotFound(_) => IndexError::IndexNotFound(name.clone()),
            other => other,
        })?;
        log::debug!("deleted index {name}");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Best-effort number of keys, as of the last sync plus later mutations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub(crate) fn tree(&self, mode: WriteMode) -> Tree<'_> {
        Tree::new(&self.store, &self.name, mode)
    }

    pub(crate) fn load_root(&self) -> Result<Manifest> {
        self.store.load(&self.name)
    }

    pub(crate) fn add_to_count(&self, added: u64) {
        self.count.fetch_add(added, Ordering::Relaxed);
    }

    fn decrement_count(&self) {
        let _ = self
            .count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| {
                count.checked_sub(1)
            });
    }

    /// Loads the whole tree and resets the count from it.
    ///
    /// On failure the count is reset to zero and the first load error is
    /// returned.
    pub fn sync(&self) -> Result<u64> {
        match self.snapshot() {
            Ok(snapshot) => {
                let leaves = snapshot.leaves();
                self.count.store(leaves, Ordering::Relaxed);
                Ok(leaves)
            }
            Err(error) => {
                self.count.store(0, Ordering::Relaxed);
                Err(error)
            }
        }
    }

    /// Loads the whole tree into memory.
    pub fn snapshot(&self) -> Result<TreeSnapshot> {
        load_tree(&self.store, &self.name, self.pool.as_ref())
    }

    pub fn put(&self, key: &str, value: Reference) -> Result<()> {
        let mut root = self.load_root()?;
        if self.tree(WriteMode::Persist).put(&mut root, key, value)? == Upsert::Inserted {
            self.add_to_count(1);
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Reference> {
        let root = self.load_root()?;
        self.tree(WriteMode::Persist).get(&root, key)
    }

    /// Finds the manifest and entry that hold `key`.
    pub fn locate(&self, key: &str) -> Result<Location<'static>> {
        let root = self.load_root()?;
        let location = self.tree(WriteMode::Persist).locate(&root, key)?;
        Ok(Location {
            manifest: Cow::Owned(location.manifest.into_owned()),
            index: location.index,
            prefix: location.prefix,
        })
    }

    /// Removes `key` and returns the reference it held.
    pub fn delete(&self, key: &str) -> Result<Reference> {
        let mut root = self.load_root()?;
        let removed = self.tree(WriteMode::Persist).remove(&mut root, key)?;
        self.decrement_count();
        Ok(removed)
    }

    /// Iterates keys from `start` up to `end` (see [`IndexIterator`]).
    /// A `limit` of zero or less is unbounded.
    pub fn new_iterator(&self, start: &str, end: &str, limit: i64) -> Result<IndexIterator<'_>> {
        let root = self.load_root()?;
        IndexIterator::new(self.tree(WriteMode::Persist), root, start, end, limit)
    }

    pub fn new_batch(&self) -> Batch<'_> {
        Batch::new(self)
    }

    pub fn put_string(&self, key: &str, value: Reference) -> Result<()> {
        self.index_type.require_string_keys()?;
        self.put(key, value)
    }

    pub fn get_string(&self, key: &str) -> Result<Reference> {
        self.index_type.require_string_keys()?;
        self.get(key)
    }

    pub fn put_number(&self, key: i64, value: Reference) -> Result<()> {
        self.index_type.require_number_keys()?;
        self.put(&encode_number_key(key), value)
    }

    pub fn get_number(&self, key: i64) -> Result<Reference> {
        self.index_type.require_number_keys()?;
        self.get(&encode_number_key(key))
    }

    pub fn delete_number(&self, key: i64) -> Result<Reference> {
        self.index_type.require_number_keys()?;
        self.delete(&encode_number_key(key))
    }

    /// Iterates a number index in numeric order. Both bounds are inclusive.
    pub fn number_iterator(
        &self,
        start: Option<i64>,
        end: Option<i64>,
        limit: i64,
    ) -> Result<NumberIter<'_>> {
        self.index_type.require_number_keys()?;
        let start = start.map(encode_number_key).unwrap_or_default();
        let end = end.map(encode_number_key).unwrap_or_default();
        Ok(self.new_iterator(&start, &end, limit)?.numbers())
    }

    /// Uploads `data` to the blob store and indexes it under `key`.
    ///
    /// Each indexed key holds the blob it points at. Replacing a key
    /// releases its hold on the previous blob, and a failed index write
    /// releases the hold just taken.
    pub fn put_blob(&self, key: &str, data: &[u8]) -> Result<Reference> {
        let previous = match self.get(key) {
            Ok(previous) => Some(previous),
            Err(IndexError::EntryNotFound(_)) => None,
            Err(error) => return Err(error),
        };
        let reference = self
            .blobs
            .upload(data, self.config.pin_blobs, self.config.encrypt_blobs)?;
        if let Err(error) = self.put(key, reference.clone()) {
            self.release_blob(&reference, key);
            return Err(error);
        }
        if let Some(previous) = previous {
            self.release_blob(&previous, key);
        }
        Ok(reference)
    }

    fn release_blob(&self, reference: &Reference, key: &str) {
        if let Err(error) = self.blobs.delete(reference) {
            log::warn!("failed to release blob {reference} held by {key:?}: {error}");
        }
    }

    pub fn get_blob(&self, key: &str) -> Result<Vec<u8>> {
        let reference = self.get(key)?;
        Ok(self.blobs.download(&reference)?)
    }

    /// Removes `key` and releases its hold on the blob.
    pub fn delete_blob(&self, key: &str) -> Result<()> {
        let reference = self.delete(key)?;
        self.blobs.delete(&reference)?;
        Ok(())
    }
}
