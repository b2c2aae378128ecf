use super::compression::CompressedPayload;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Free-form annotations attached to an entry
pub type EntryMetadata = HashMap<String, String>;

/// Stored form of a value
#[derive(Debug, Clone)]
pub enum EntryPayload<V> {
    Inline(V),
    Compressed(CompressedPayload),
}

/// Cache entry with access bookkeeping. Owned by exactly one store.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub payload: EntryPayload<V>,
    /// Insertion time, ms since epoch
    pub inserted_at: u64,
    /// Seconds
    pub ttl: u64,
    pub access_count: u64,
    /// ms since epoch
    pub last_accessed: u64,
    /// Position in the LRU index
    pub access_seq: u64,
    /// Position in insertion order
    pub insert_seq: u64,
    /// Estimated bytes held for this entry (key + stored payload)
    pub size_bytes: usize,
    /// Serialized size before compression
    pub original_size: usize,
    pub metadata: Option<EntryMetadata>,
}

impl<V> CacheEntry<V> {
    pub fn is_compressed(&self) -> bool {
        matches!(self.payload, EntryPayload::Compressed(_))
    }

    pub fn is_expired(&self, now_ms: u64, max_age_ms: u64) -> bool {
        is_expired(self.inserted_at, self.ttl, max_age_ms, now_ms)
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.inserted_at)
    }

    /// Milliseconds left before the TTL runs out
    pub fn remaining_ttl_ms(&self, now_ms: u64) -> u64 {
        (self.ttl.saturating_mul(1000)).saturating_sub(self.age_ms(now_ms))
    }

    pub fn info(&self, key: &str) -> EntryInfo {
        EntryInfo {
            key: key.to_string(),
            inserted_at: self.inserted_at,
            ttl: self.ttl,
            access_count: self.access_count,
            last_accessed: self.last_accessed,
            compressed: self.is_compressed(),
            size_bytes: self.size_bytes,
            metadata: self.metadata.clone(),
        }
    }
}

/// The single expiry predicate shared by lazy reads and the sweep.
///
/// Expired iff the age exceeds `ttl` seconds, or exceeds `max_age_ms` when
/// that ceiling is non-zero.
pub fn is_expired(inserted_at: u64, ttl_secs: u64, max_age_ms: u64, now_ms: u64) -> bool {
    let elapsed = now_ms.saturating_sub(inserted_at);
    elapsed > ttl_secs.saturating_mul(1000) || (max_age_ms > 0 && elapsed > max_age_ms)
}

/// Payload-free view of an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    pub key: String,
    pub inserted_at: u64,
    pub ttl: u64,
    pub access_count: u64,
    pub last_accessed: u64,
    pub compressed: bool,
    pub size_bytes: usize,
    pub metadata: Option<EntryMetadata>,
}
