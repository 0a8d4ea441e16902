use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record already exists")]
    AlreadyExists,

    #[error("record not found")]
    NotFound,

    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("storage path error: {0}")]
    Path(PathBuf),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Returns true for the "no such record" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
