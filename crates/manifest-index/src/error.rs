use storage::StorageError;

use crate::types::IndexType;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("invalid index name: {0}")]
    InvalidName(String),

    #[error("manifest already exists: {0}")]
    ManifestAlreadyExists(String),

    #[error("manifest not found: {0}")]
    ManifestNotFound(String),

    #[error("manifest {path} is corrupt: {reason}")]
    ManifestCorrupt { path: String, reason: String },

    #[error("entry not found: {0:?}")]
    EntryNotFound(String),

    #[error("no more entries")]
    NoMoreEntries,

    #[error("index type {0} is not supported for this operation")]
    UnsupportedIndexType(IndexType),

    #[error("invalid index type: {0}")]
    InvalidIndexType(String),

    #[error("failed to persist manifest {path}: {source}")]
    PersistFailed {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to delete manifest {path}: {source}")]
    DeleteFailed {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexError {
    /// Returns true for lookup misses.
    pub fn is_entry_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound(_))
    }

    pub(crate) fn corrupt(path: &str, reason: impl std::fmt::Display) -> Self {
        Self::ManifestCorrupt {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
