use crate::utils::helpers::percentage;
use serde::{Deserialize, Serialize};

/// Monotonic counters plus rates derived from them.
///
/// Rates are recomputed after every access so `hit_rate + miss_rate` is 100
/// whenever there was at least one request, and both are 0 otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub compressions: u64,
    pub decompressions: u64,
    pub evictions: u64,
    /// Entries removed because they expired
    pub expired: u64,
    /// Internal faults that were caught and turned into misses or failed writes
    pub errors: u64,
    pub size: usize,
    /// Rolling average over hits, milliseconds
    pub average_access_time: f64,
    pub hit_rate: f64,
    pub miss_rate: f64,
}

impl CacheMetrics {
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn record_hit(&mut self, latency_ms: f64) {
        self.hits += 1;
        let n = self.hits as f64;
        self.average_access_time = (self.average_access_time * (n - 1.0) + latency_ms) / n;
        self.recompute_rates();
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
        self.recompute_rates();
    }

    pub fn recompute_rates(&mut self) {
        let requests = self.requests();
        if requests == 0 {
            self.hit_rate = 0.0;
            self.miss_rate = 0.0;
        } else {
            self.hit_rate = percentage(self.hits, requests);
            self.miss_rate = 100.0 - self.hit_rate;
        }
    }

    /// Evictions per 100 writes
    pub fn eviction_rate(&self) -> f64 {
        percentage(self.evictions, self.sets)
    }
}

/// Point-in-time view of a store's contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub keys: Vec<String>,
    pub size: usize,
    /// Estimated bytes held
    pub memory_usage: u64,
    /// Insertion time of the oldest entry, ms since epoch
    pub oldest_entry: Option<u64>,
    pub newest_entry: Option<u64>,
    pub most_accessed_key: Option<String>,
    pub least_accessed_key: Option<String>,
    /// Original bytes / stored bytes over compressed entries, 1.0 when none
    pub compression_ratio: f64,
    /// Evictions per 100 writes
    pub eviction_rate: f64,
}
