//! Open-index table.
//!
//! The registry owns a [`Backend`] and hands out shared handles, so one
//! index is opened (and synced) at most once however many callers use it.

use std::sync::Arc;

use fnv::FnvHashMap;
use parking_lot::Mutex;

use crate::error::Result;
use crate::index::{index_name, Backend, Index};
use crate::types::IndexType;

#[derive(Debug)]
pub struct IndexRegistry {
    backend: Backend,
    open: Mutex<FnvHashMap<String, Arc<Index>>>,
}

impl IndexRegistry {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            open: Mutex::new(FnvHashMap::default()),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Creates a new index and opens it.
    pub fn create(
        &self,
        collection: &str,
        field: &str,
        index_type: IndexType,
    ) -> Result<Arc<Index>> {
        Index::create(&self.backend, collection, field, index_type)?;
        self.open(collection, field)
    }

    /// Returns the open handle, opening the index first if needed.
    ///
    /// The table is not locked while the tree loads. When two callers race
    /// to open the same index, the first handle registered wins.
    pub fn open(&self, collection: &str, field: &str) -> Result<Arc<Index>> {
        let name = index_name(collection, field)?;
        if let Some(index) = self.open.lock().get(&name) {
            return Ok(index.clone());
        }
        let index = Arc::new(Index::open(&self.backend, collection, field)?);
        Ok(self.open.lock().entry(name).or_insert(index).clone())
    }

    /// The open handle, if any.
    pub fn get(&self, collection: &str, field: &str) -> Option<Arc<Index>> {
        let name = index_name(collection, field).ok()?;
        self.open.lock().get(&name).cloned()
    }

    /// Drops the registry's handle. Returns false if it was not open.
    pub fn close(&self, collection: &str, field: &str) -> bool {
        let Ok(name) = index_name(collection, field) else {
            return false;
        };
        self.open.lock().remove(&name).is_some()
    }

    /// Closes and deletes an index.
    pub fn delete(&self, collection: &str, field: &str) -> Result<()> {
        self.close(collection, field);
        Index::delete_index(&self.backend, collection, field)
    }

    /// Names of the open indexes, sorted.
    pub fn open_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.open.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use crate::test_support::{memory_backend, owner, reference};
    use std::sync::mpsc::{channel, Receiver, Sender};
    use storage::{
        Feed, MemoryBlobStore, MemoryFeed, Owner, Reference, Result as StorageResult, Topic,
    };

    /// Feed whose next `get` parks until released.
    #[derive(Default)]
    struct GatedFeed {
        inner: MemoryFeed,
        entered: Mutex<Option<Sender<()>>>,
        release: Mutex<Option<Receiver<()>>>,
    }

    impl Feed for GatedFeed {
        fn create(&self, topic: &Topic, owner: &Owner, data: &[u8]) -> StorageResult<Reference> {
            self.inner.create(topic, owner, data)
        }

        fn get(&self, topic: &Topic, owner: &Owner) -> StorageResult<(Reference, Vec<u8>)> {
            if let Some(entered) = self.entered.lock().take() {
                entered.send(()).unwrap();
                if let Some(release) = self.release.lock().take() {
                    release.recv().unwrap();
                }
            }
            self.inner.get(topic, owner)
        }

        fn update(&self, topic: &Topic, owner: &Owner, data: &[u8]) -> StorageResult<Reference> {
            self.inner.update(topic, owner, data)
        }

        fn delete(&self, topic: &Topic, owner: &Owner) -> StorageResult<()> {
            self.inner.delete(topic, owner)
        }
    }

    #[test]
    fn open_is_idempotent() {
        let registry = IndexRegistry::new(memory_backend().backend);
        let created = registry.create("users", "email", IndexType::String).unwrap();
        created.put("a@example.com", reference(1)).unwrap();

        let opened = registry.open("users", "email").unwrap();
        assert!(Arc::ptr_eq(&created, &opened));
        assert_eq!(opened.count(), 1);
        assert_eq!(registry.open_names(), vec!["/users/email"]);
    }

    #[test]
    fn close_and_reopen_resyncs() {
        let registry = IndexRegistry::new(memory_backend().backend);
        let index = registry.create("users", "email", IndexType::String).unwrap();
        index.put("a", reference(1)).unwrap();
        index.put("b", reference(2)).unwrap();

        assert!(registry.close("users", "email"));
        assert!(!registry.close("users", "email"));
        assert!(registry.get("users", "email").is_none());

        let reopened = registry.open("users", "email").unwrap();
        assert!(!Arc::ptr_eq(&index, &reopened));
        assert_eq!(reopened.count(), 2);
    }

    #[test]
    fn delete_removes_the_index() {
        let registry = IndexRegistry::new(memory_backend().backend);
        registry.create("users", "email", IndexType::String).unwrap();
        registry.delete("users", "email").unwrap();
        assert!(registry.open_names().is_empty());
        assert!(matches!(
            registry.open("users", "email"),
            Err(IndexError::IndexNotFound(_))
        ));
        assert!(matches!(
            registry.create("users", "bad/name", IndexType::String),
            Err(IndexError::InvalidName(_))
        ));
    }

    #[test]
    fn table_stays_usable_while_an_index_loads() {
        let feed = Arc::new(GatedFeed::default());
        let backend = Backend::new(feed.clone(), Arc::new(MemoryBlobStore::new()), owner());
        Index::create(&backend, "users", "email", IndexType::String).unwrap();
        let registry = IndexRegistry::new(backend);
        registry.create("users", "name", IndexType::String).unwrap();

        let (entered_tx, entered_rx) = channel();
        let (release_tx, release_rx) = channel();
        *feed.entered.lock() = Some(entered_tx);
        *feed.release.lock() = Some(release_rx);

        std::thread::scope(|scope| {
            let loading = scope.spawn(|| registry.open("users", "email"));
            entered_rx.recv().unwrap();

            assert_eq!(registry.open_names(), vec!["/users/name"]);
            assert!(registry.get("users", "email").is_none());
            assert!(registry.get("users", "name").is_some());
            assert!(registry.close("users", "name"));

            release_tx.send(()).unwrap();
            loading.join().unwrap().unwrap();
        });
        assert_eq!(registry.open_names(), vec!["/users/email"]);
    }
}
