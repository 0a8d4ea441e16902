//! Directory-backed feed.
//!
//! Each record lives at `<root>/<owner hex>/<topic hex>`. Writes go to a
//! temp file first and are renamed into place.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::address::{Owner, Reference, Topic};
use crate::error::{Result, StorageError};
use crate::feed::{check_payload, record_reference, Feed};

#[derive(Debug, Clone)]
pub struct FileFeed {
    root: PathBuf,
    max_payload: Option<usize>,
}

impl FileFeed {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            max_payload: None,
        }
    }

    pub fn with_max_payload(mut self, max: usize) -> Self {
        self.max_payload = Some(max);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, topic: &Topic, owner: &Owner) -> PathBuf {
        self.root.join(owner.to_hex()).join(topic.to_hex())
    }

    fn ensure_parent_dir(path: &Path) -> Result<()> {
        let Some(parent) = path.parent() else {
            return Err(StorageError::Path(path.to_path_buf()));
        };
        fs::create_dir_all(parent).map_err(|error| {
            StorageError::Backend(format!(
                "failed to create feed directory {}: {error}",
                parent.display()
            ))
        })
    }

    fn write_record(path: &Path, data: &[u8]) -> Result<()> {
        Self::ensure_parent_dir(path)?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, data).map_err(|error| {
            StorageError::Backend(format!(
                "failed to write feed record {}: {error}",
                tmp_path.display()
            ))
        })?;
        fs::rename(&tmp_path, path).map_err(|error| {
            StorageError::Backend(format!(
                "failed to finalize feed record {}: {error}",
                path.display()
            ))
        })?;
        Ok(())
    }
}

impl Feed for FileFeed {
    fn create(&self, topic: &Topic, owner: &Owner, data: &[u8]) -> Result<Reference> {
        check_payload(self.max_payload, data)?;
        let path = self.record_path(topic, owner);
        if path.exists() {
            return Err(StorageError::AlreadyExists);
        }
        Self::write_record(&path, data)?;
        log::debug!("created feed record {}", path.display());
        Ok(record_reference(topic, data))
    }

    fn get(&self, topic: &Topic, owner: &Owner) -> Result<(Reference, Vec<u8>)> {
        let path = self.record_path(topic, owner);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound),
            Err(error) => return Err(StorageError::Io(error)),
        };
        Ok((record_reference(topic, &data), data))
    }

    fn update(&self, topic: &Topic, owner: &Owner, data: &[u8]) -> Result<Reference> {
        check_payload(self.max_payload, data)?;
        let path = self.record_path(topic, owner);
        Self::write_record(&path, data)?;
        Ok(record_reference(topic, data))
    }

    fn delete(&self, topic: &Topic, owner: &Owner) -> Result<()> {
        let path = self.record_path(topic, owner);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("deleted feed record {}", path.display());
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(error) => Err(StorageError::Io(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn owner() -> Owner {
        Owner::new([3; 20])
    }

    #[test]
    fn writes_and_reads_records() {
        let dir = tempdir().expect("tempdir");
        let feed = FileFeed::new(dir.path().to_path_buf());
        let topic = Topic::from_path("/users/id");
        let created = feed.create(&topic, &owner(), b"manifest").expect("create");
        let (reference, data) = feed.get(&topic, &owner()).expect("get");
        assert_eq!(reference, created);
        assert_eq!(data, b"manifest");
        assert!(dir
            .path()
            .join(owner().to_hex())
            .join(topic.to_hex())
            .exists());
    }

    #[test]
    fn missing_record_is_not_found() {
        let dir = tempdir().expect("tempdir");
        let feed = FileFeed::new(dir.path().to_path_buf());
        let err = feed.get(&Topic::from_path("/nope"), &owner()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn create_existing_fails_but_update_overwrites() {
        let dir = tempdir().expect("tempdir");
        let feed = FileFeed::new(dir.path().to_path_buf());
        let topic = Topic::from_path("/users/id");
        feed.create(&topic, &owner(), b"v1").expect("create");
        assert!(matches!(
            feed.create(&topic, &owner(), b"v2"),
            Err(StorageError::AlreadyExists)
        ));
        feed.update(&topic, &owner(), b"v2").expect("update");
        assert_eq!(feed.get(&topic, &owner()).expect("get").1, b"v2");
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempdir().expect("tempdir");
        let feed = FileFeed::new(dir.path().to_path_buf());
        let topic = Topic::from_path("/users/id");
        feed.update(&topic, &owner(), b"v").expect("update");
        feed.delete(&topic, &owner()).expect("delete");
        assert!(feed.get(&topic, &owner()).unwrap_err().is_not_found());
        assert!(feed.delete(&topic, &owner()).unwrap_err().is_not_found());
    }

    #[test]
    fn payload_limit_is_enforced() {
        let dir = tempdir().expect("tempdir");
        let feed = FileFeed::new(dir.path().to_path_buf()).with_max_payload(2);
        let err = feed
            .update(&Topic::from_path("/big"), &owner(), b"abc")
            .unwrap_err();
        assert!(matches!(err, StorageError::PayloadTooLarge { .. }));
    }
}
