//! Index field types and typed key encodings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Declared type of the field an index is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    #[default]
    String,
    Number,
    Bytes,
    Map,
    List,
}

impl IndexType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Bytes => "bytes",
            Self::Map => "map",
            Self::List => "list",
        }
    }

    /// Checks that string keys can be used with this index.
    pub fn require_string_keys(self) -> Result<()> {
        match self {
            Self::String | Self::Map | Self::List => Ok(()),
            Self::Number => Err(IndexError::InvalidIndexType(format!(
                "string key used on a {self} index"
            ))),
            Self::Bytes => Err(IndexError::UnsupportedIndexType(self)),
        }
    }

    /// Checks that numeric keys can be used with this index.
    pub fn require_number_keys(self) -> Result<()> {
        match self {
            Self::Number => Ok(()),
            Self::Bytes => Err(IndexError::UnsupportedIndexType(self)),
            _ => Err(IndexError::InvalidIndexType(format!(
                "number key used on a {self} index"
            ))),
        }
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = IndexError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "bytes" => Ok(Self::Bytes),
            "map" => Ok(Self::Map),
            "list" => Ok(Self::List),
            _ => Err(IndexError::InvalidIndexType(value.to_string())),
        }
    }
}

const SIGN_BIT: u64 = 1 << 63;

/// Encodes a number as a fixed-width key whose string order matches numeric
/// order.
pub fn encode_number_key(value: i64) -> String {
    format!("{:016x}", (value as u64) ^ SIGN_BIT)
}

/// Inverse of [`encode_number_key`].
pub fn decode_number_key(key: &str) -> Result<i64> {
    if key.len() != 16 {
        return Err(IndexError::InvalidIndexType(format!(
            "{key:?} is not a number key"
        )));
    }
    let raw = u64::from_str_radix(key, 16)
        .map_err(|_| IndexError::InvalidIndexType(format!("{key:?} is not a number key")))?;
    Ok((raw ^ SIGN_BIT) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_types_case_insensitively() {
        assert_eq!("number".parse::<IndexType>().unwrap(), IndexType::Number);
        assert_eq!("MAP".parse::<IndexType>().unwrap(), IndexType::Map);
        assert!(matches!(
            "float".parse::<IndexType>(),
            Err(IndexError::InvalidIndexType(_))
        ));
    }

    #[test]
    fn key_shape_checks() {
        assert!(IndexType::List.require_string_keys().is_ok());
        assert!(matches!(
            IndexType::Number.require_string_keys(),
            Err(IndexError::InvalidIndexType(_))
        ));
        assert!(matches!(
            IndexType::Bytes.require_number_keys(),
            Err(IndexError::UnsupportedIndexType(IndexType::Bytes))
        ));
    }

    #[test]
    fn number_keys_sort_numerically() {
        let values = [i64::MIN, -1000, -1, 0, 1, 42, 1000, i64::MAX];
        let keys: Vec<String> = values.iter().map(|v| encode_number_key(*v)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        for (value, key) in values.iter().zip(&keys) {
            assert_eq!(decode_number_key(key).unwrap(), *value);
        }
    }

    #[test]
    fn rejects_malformed_number_keys() {
        assert!(decode_number_key("abc").is_err());
        assert!(decode_number_key("zzzzzzzzzzzzzzzz").is_err());
    }
}
