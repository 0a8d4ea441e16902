//! Index configuration.

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Records larger than this many bytes are zstd-compressed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

/// Zstd level used for manifest records.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Encoded manifests above this size are compressed before writing.
    pub compression_threshold: usize,
    pub compression_level: i32,
    /// Dedicated rayon pool size for tree hydration. `None` uses the
    /// global pool.
    pub loader_threads: Option<usize>,
    /// Pin flag passed to the blob store by the blob helpers.
    pub pin_blobs: bool,
    /// Encrypt flag passed to the blob store by the blob helpers.
    pub encrypt_blobs: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            loader_threads: None,
            pin_blobs: true,
            encrypt_blobs: false,
        }
    }
}

impl IndexConfig {
    /// Parses a JSON configuration; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|error| IndexError::Internal(format!("invalid index config: {error}")))
    }

    pub fn with_compression_threshold(mut self, bytes: usize) -> Self {
        self.compression_threshold = bytes;
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_loader_threads(mut self, threads: usize) -> Self {
        self.loader_threads = Some(threads);
        self
    }

    pub fn with_blob_flags(mut self, pin: bool, encrypt: bool) -> Self {
        self.pin_blobs = pin;
        self.encrypt_blobs = encrypt;
        self
    }
}
