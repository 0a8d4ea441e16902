//! Address types shared by feeds and blobs.
//!
//! - `Topic`: SHA-256 of a logical path, the storage slot of a feed record
//! - `Owner`: 20-byte account address scoping a feed namespace
//! - `Reference`: opaque reference bytes returned by the storage services

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, StorageError};

/// Deterministic one-way hash of a logical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Topic([u8; 32]);

impl Topic {
    /// Hashes a logical path into its topic.
    pub fn from_path(path: &str) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&Sha256::digest(path.as_bytes()));
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering, used for file names.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Account address owning a feed namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Owner([u8; 20]);

impl Owner {
    pub const LEN: usize = 20;

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parses a hex address, with or without the `0x` prefix.
    pub fn from_hex(input: &str) -> Result<Self> {
        let digits = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .unwrap_or(input);
        let bytes = hex::decode(digits)
            .map_err(|error| StorageError::InvalidAddress(format!("{input}: {error}")))?;
        let bytes: [u8; 20] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            StorageError::InvalidAddress(format!(
                "{input}: expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Opaque reference bytes (blob address, feed record address, or a
/// manifest topic).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(Vec<u8>);

impl Reference {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// SHA-256 content address of `data`.
    pub fn content_address(data: &[u8]) -> Self {
        Self(Sha256::digest(data).to_vec())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl From<Vec<u8>> for Reference {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Reference {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Topic> for Reference {
    fn from(topic: Topic) -> Self {
        Self(topic.0.to_vec())
    }
}

impl AsRef<[u8]> for Reference {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_is_deterministic() {
        let a = Topic::from_path("/users/id");
        let b = Topic::from_path("/users/id");
        let c = Topic::from_path("/users/id/a");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn owner_parses_prefixed_and_bare_hex() {
        let hex = "00112233445566778899aabbccddeeff00112233";
        let bare = Owner::from_hex(hex).unwrap();
        let prefixed = Owner::from_hex(&format!("0x{hex}")).unwrap();
        assert_eq!(bare, prefixed);
        assert_eq!(prefixed.to_string(), format!("0x{hex}"));
    }

    #[test]
    fn owner_rejects_wrong_length() {
        let err = Owner::from_hex("0x0011").unwrap_err();
        assert!(matches!(err, StorageError::InvalidAddress(_)));
        assert!(Owner::from_hex("zz").is_err());
    }

    #[test]
    fn reference_from_topic_keeps_bytes() {
        let topic = Topic::from_path("/a/b");
        let reference = Reference::from(topic);
        assert_eq!(reference.as_bytes(), topic.as_bytes());
        assert_eq!(reference.to_string(), topic.to_string());
    }
}
