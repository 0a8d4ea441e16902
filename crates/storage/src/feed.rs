//! Feed trait and in-memory implementation.

use fnv::FnvHashMap;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::address::{Owner, Reference, Topic};
use crate::error::{Result, StorageError};

/// Maximum payload of a single feed update on a chunked network feed.
pub const MAX_CHUNK_LENGTH: usize = 4096;

/// Mutable, owner-scoped storage slot keyed by topic.
pub trait Feed: Send + Sync {
    /// Creates a new record. Fails with `AlreadyExists` if the slot is taken.
    fn create(&self, topic: &Topic, owner: &Owner, data: &[u8]) -> Result<Reference>;
    /// Returns the latest record and its reference, or `NotFound`.
    fn get(&self, topic: &Topic, owner: &Owner) -> Result<(Reference, Vec<u8>)>;
    /// Overwrites the record, creating it if absent.
    fn update(&self, topic: &Topic, owner: &Owner, data: &[u8]) -> Result<Reference>;
    /// Clears the record. Fails with `NotFound` if the slot is empty.
    fn delete(&self, topic: &Topic, owner: &Owner) -> Result<()>;
}

/// Reference of a feed record: the hash of its slot and its payload.
pub(crate) fn record_reference(topic: &Topic, data: &[u8]) -> Reference {
    let mut hasher = Sha256::new();
    hasher.update(topic.as_bytes());
    hasher.update(data);
    Reference::new(hasher.finalize().to_vec())
}

pub(crate) fn check_payload(max_payload: Option<usize>, data: &[u8]) -> Result<()> {
    match max_payload {
        Some(max) if data.len() > max => Err(StorageError::PayloadTooLarge {
            len: data.len(),
            max,
        }),
        _ => Ok(()),
    }
}

// --- Memory Implementation ---

#[derive(Debug, Default)]
pub struct MemoryFeed {
    records: RwLock<FnvHashMap<(Owner, Topic), Vec<u8>>>,
    max_payload: Option<usize>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects payloads above `max` bytes, like a chunk-limited network feed.
    pub fn with_max_payload(mut self, max: usize) -> Self {
        self.max_payload = Some(max);
        self
    }

    /// Number of live records across all owners.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Feed for MemoryFeed {
    fn create(&self, topic: &Topic, owner: &Owner, data: &[u8]) -> Result<Reference> {
        check_payload(self.max_payload, data)?;
        let mut records = self.records.write();
        if records.contains_key(&(*owner, *topic)) {
            return Err(StorageError::AlreadyExists);
        }
        records.insert((*owner, *topic), data.to_vec());
        Ok(record_reference(topic, data))
    }

    fn get(&self, topic: &Topic, owner: &Owner) -> Result<(Reference, Vec<u8>)> {
        self.records
            .read()
            .get(&(*owner, *topic))
            .map(|data| (record_reference(topic, data), data.clone()))
            .ok_or(StorageError::NotFound)
    }

    fn update(&self, topic: &Topic, owner: &Owner, data: &[u8]) -> Result<Reference> {
        check_payload(self.max_payload, data)?;
        self.records.write().insert((*owner, *topic), data.to_vec());
        Ok(record_reference(topic, data))
    }

    fn delete(&self, topic: &Topic, owner: &Owner) -> Result<()> {
        self.records
            .write()
            .remove(&(*owner, *topic))
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}
