//! Blob store trait and in-memory implementation.

use fnv::FnvHashMap;
use parking_lot::RwLock;

use crate::address::Reference;
use crate::error::{Result, StorageError};

/// Immutable content-addressed object store.
///
/// Identical bytes share one reference. Every `upload` takes a hold on the
/// blob and every `delete` releases one; the data is dropped with the last
/// hold.
pub trait BlobStore: Send + Sync {
    fn upload(&self, data: &[u8], pin: bool, encrypt: bool) -> Result<Reference>;
    fn download(&self, reference: &Reference) -> Result<Vec<u8>>;
    /// Releases one hold. `NotFound` if the blob holds none.
    fn delete(&self, reference: &Reference) -> Result<()>;
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    pinned: bool,
    encrypted: bool,
    holders: usize,
}

// --- Memory Implementation ---

/// In-memory blob store.
///
/// Data is kept as uploaded; the `encrypt` flag is only recorded.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<FnvHashMap<Reference, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Returns the pin state of a stored blob.
    pub fn is_pinned(&self, reference: &Reference) -> Option<bool> {
        self.blobs.read().get(reference).map(|blob| blob.pinned)
    }

    /// Number of uploads not yet released by a delete.
    pub fn holders(&self, reference: &Reference) -> usize {
        self.blobs.read().get(reference).map_or(0, |blob| blob.holders)
    }

    /// Returns whether a stored blob was uploaded with encryption requested.
    pub fn is_encrypted(&self, reference: &Reference) -> Option<bool> {
        self.blobs.read().get(reference).map(|blob| blob.encrypted)
    }
}

impl BlobStore for MemoryBlobStore {
    fn upload(&self, data: &[u8], pin: bool, encrypt: bool) -> Result<Reference> {
        let reference = Reference::content_address(data);
        let mut blobs = self.blobs.write();
        let blob = blobs.entry(reference.clone()).or_insert_with(|| StoredBlob {
            data: data.to_vec(),
            pinned: false,
            encrypted: encrypt,
            holders: 0,
        });
        blob.pinned |= pin;
        blob.holders += 1;
        Ok(reference)
    }

    fn download(&self, reference: &Reference) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(reference)
            .map(|blob| blob.data.clone())
            .ok_or(StorageError::NotFound)
    }

    fn delete(&self, reference: &Reference) -> Result<()> {
        let mut blobs = self.blobs.write();
        let blob = blobs.get_mut(reference).ok_or(StorageError::NotFound)?;
        blob.holders -= 1;
        if blob.holders == 0 {
            blobs.remove(reference);
        }
        Ok(())
    }
}
