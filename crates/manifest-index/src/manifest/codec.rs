//! Manifest record encoding.
//!
//! A record is a one-byte codec tag followed by a postcard payload:
//! tag `0` is plain postcard, tag `1` is zstd-compressed postcard. Records
//! above the configured threshold are compressed so that wide manifests
//! still fit into a single feed update.

use std::io::Read;

use serde::{Deserialize, Serialize};
use storage::Reference;
use thin_vec::ThinVec;

use super::{ChildRef, Entry, EntryKind, Manifest, Target};
use crate::config::{IndexConfig, DEFAULT_COMPRESSION_LEVEL, DEFAULT_COMPRESSION_THRESHOLD};
use crate::error::{IndexError, Result};
use crate::types::IndexType;

/// Record format version - increment when changing the format.
pub const MANIFEST_FORMAT_VERSION: u32 = 1;

const TAG_PLAIN: u8 = 0;
const TAG_ZSTD: u8 = 1;

/// Upper bound on a decompressed record.
pub const MAX_DECODED_RECORD_LEN: usize = 16 * 1024 * 1024;

#[derive(Serialize, Deserialize)]
struct ManifestRecord {
    version: u32,
    name: String,
    creation_time: i64,
    index_type: Option<IndexType>,
    entries: Vec<EntryRecord>,
}

#[derive(Serialize, Deserialize)]
struct EntryRecord {
    name: String,
    kind: EntryKind,
    reference: Reference,
}

/// Compression settings for manifest records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCodec {
    pub compression_threshold: usize,
    pub compression_level: i32,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self {
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl From<&IndexConfig> for RecordCodec {
    fn from(config: &IndexConfig) -> Self {
        Self {
            compression_threshold: config.compression_threshold,
            compression_level: config.compression_level,
        }
    }
}

/// Encodes a manifest whose children have all been persisted.
pub fn encode_manifest(manifest: &Manifest, codec: RecordCodec) -> Result<Vec<u8>> {
    let mut entries = Vec::with_capacity(manifest.entries.len());
    for entry in &manifest.entries {
        let reference = match &entry.target {
            Target::Leaf(reference) | Target::Branch(ChildRef::Persisted(reference)) => {
                reference.clone()
            }
            Target::Branch(ChildRef::Staged(child)) => {
                return Err(IndexError::Internal(format!(
                    "cannot encode {}: child {} is not persisted",
                    manifest.name, child.name
                )))
            }
        };
        entries.push(EntryRecord {
            name: entry.name.clone(),
            kind: entry.kind(),
            reference,
        });
    }

    let record = ManifestRecord {
        version: MANIFEST_FORMAT_VERSION,
        name: manifest.name.clone(),
        creation_time: manifest.creation_time,
        index_type: manifest.index_type,
        entries,
    };
    let payload = postcard::to_allocvec(&record).map_err(|error| {
        IndexError::Internal(format!(
            "failed to encode manifest {} with postcard: {error}",
            manifest.name
        ))
    })?;

    if payload.len() <= codec.compression_threshold {
        let mut bytes = Vec::with_capacity(payload.len() + 1);
        bytes.push(TAG_PLAIN);
        bytes.extend_from_slice(&payload);
        return Ok(bytes);
    }

    let compressed = zstd::bulk::compress(&payload, codec.compression_level).map_err(|error| {
        IndexError::Internal(format!(
            "failed to compress manifest {}: {error}",
            manifest.name
        ))
    })?;
    let mut bytes = Vec::with_capacity(compressed.len() + 1);
    bytes.push(TAG_ZSTD);
    bytes.extend_from_slice(&compressed);
    Ok(bytes)
}

/// Decodes the record stored for `path`.
///
/// Anything unreadable is reported as corrupt, including a record whose
/// embedded name is not `path`.
pub fn decode_manifest(path: &str, bytes: &[u8]) -> Result<Manifest> {
    decode_record(path, bytes, MAX_DECODED_RECORD_LEN)
}

fn decode_record(path: &str, bytes: &[u8], max_len: usize) -> Result<Manifest> {
    let Some((&tag, body)) = bytes.split_first() else {
        return Err(IndexError::corrupt(path, "empty record"));
    };
    let payload = match tag {
        TAG_PLAIN => body.to_vec(),
        TAG_ZSTD => inflate(body, max_len)
            .map_err(|error| IndexError::corrupt(path, format!("zstd: {error}")))?
            .ok_or_else(|| {
                IndexError::corrupt(path, format!("decompresses past {max_len} bytes"))
            })?,
        other => {
            return Err(IndexError::corrupt(
                path,
                format!("unknown codec tag {other}"),
            ))
        }
    };

    let record: ManifestRecord = postcard::from_bytes(&payload)
        .map_err(|error| IndexError::corrupt(path, format!("postcard: {error}")))?;
    if record.version != MANIFEST_FORMAT_VERSION {
        return Err(IndexError::corrupt(
            path,
            format!(
                "format version {} (expected {MANIFEST_FORMAT_VERSION})",
                record.version
            ),
        ));
    }
    if record.name != path {
        return Err(IndexError::corrupt(
            path,
            format!("record belongs to {}", record.name),
        ));
    }

    let entries: ThinVec<Entry> = record
        .entries
        .into_iter()
        .map(|entry| match entry.kind {
            EntryKind::Leaf => Entry::leaf(entry.name, entry.reference),
            EntryKind::Intermediate => Entry::persisted(entry.name, entry.reference),
        })
        .collect();

    Ok(Manifest {
        name: record.name,
        creation_time: record.creation_time,
        index_type: record.index_type,
        entries,
        dirty: false,
    })
}

/// Decompresses at most `max_len` bytes. `None` if the frame holds more.
fn inflate(body: &[u8], max_len: usize) -> std::io::Result<Option<Vec<u8>>> {
    let mut payload = Vec::new();
    zstd::stream::read::Decoder::with_buffer(body)?
        .take(max_len as u64 + 1)
        .read_to_end(&mut payload)?;
    Ok((payload.len() <= max_len).then_some(payload))
}
