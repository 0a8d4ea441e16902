//! Manifest store: logical path to versioned record, on top of a feed.
//!
//! Every manifest lives in the feed slot addressed by the SHA-256 of its
//! logical path. The reference of a stored manifest is that topic, so it is
//! stable across rewrites and can be recomputed from the path alone.

use std::sync::Arc;

use storage::{Feed, Owner, Reference, StorageError, Topic};

use crate::error::{IndexError, Result};
use crate::manifest::{decode_manifest, encode_manifest, Manifest, RecordCodec};

pub struct ManifestStore {
    feed: Arc<dyn Feed>,
    owner: Owner,
    codec: RecordCodec,
}

impl std::fmt::Debug for ManifestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestStore")
            .field("owner", &self.owner)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl ManifestStore {
    pub fn new(feed: Arc<dyn Feed>, owner: Owner, codec: RecordCodec) -> Self {
        Self { feed, owner, codec }
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// The reference under which the manifest at `path` is stored.
    pub fn reference(path: &str) -> Reference {
        Reference::from(Topic::from_path(path))
    }

    /// Writes the first version of a manifest. Fails if one already exists.
    pub fn create(&self, manifest: &Manifest) -> Result<Reference> {
        let bytes = encode_manifest(manifest, self.codec)?;
        let topic = Topic::from_path(&manifest.name);
        match self.feed.create(&topic, &self.owner, &bytes) {
            Ok(_) => {
                log::debug!("created manifest {} ({} bytes)", manifest.name, bytes.len());
                Ok(Reference::from(topic))
            }
            Err(StorageError::AlreadyExists) => {
                Err(IndexError::ManifestAlreadyExists(manifest.name.clone()))
            }
            Err(source) => Err(IndexError::PersistFailed {
                path: manifest.name.clone(),
                source,
            }),
        }
    }

    pub fn load(&self, path: &str) -> Result<Manifest> {
        let topic = Topic::from_path(path);
        let (_, bytes) = self.feed.get(&topic, &self.owner).map_err(|error| {
            if error.is_not_found() {
                IndexError::ManifestNotFound(path.to_string())
            } else {
                IndexError::Storage(error)
            }
        })?;
        let manifest = decode_manifest(path, &bytes)?;
        log::debug!(
            "loaded manifest {path} ({} entries)",
            manifest.entries.len()
        );
        Ok(manifest)
    }

    /// Loads the child at `path` that an intermediate entry points at,
    /// checking that the entry's reference really addresses that path.
    pub fn load_child(&self, path: &str, reference: &Reference) -> Result<Manifest> {
        if *reference != Self::reference(path) {
            return Err(IndexError::corrupt(
                path,
                format!("parent entry references {reference}"),
            ));
        }
        self.load(path)
    }

    /// Overwrites the record of `manifest`.
    pub fn store(&self, manifest: &Manifest) -> Result<Reference> {
        let bytes = encode_manifest(manifest, self.codec)?;
        let topic = Topic::from_path(&manifest.name);
        self.feed
            .update(&topic, &self.owner, &bytes)
            .map_err(|source| IndexError::PersistFailed {
                path: manifest.name.clone(),
                source,
            })?;
        log::debug!("stored manifest {} ({} bytes)", manifest.name, bytes.len());
        Ok(Reference::from(topic))
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        let topic = Topic::from_path(path);
        match self.feed.delete(&topic, &self.owner) {
            Ok(()) => {
                log::debug!("deleted manifest {path}");
                Ok(())
            }
            Err(error) if error.is_not_found() => {
                Err(IndexError::ManifestNotFound(path.to_string()))
            }
            Err(source) => Err(IndexError::DeleteFailed {
                path: path.to_string(),
                source,
            }),
        }
    }
}
