//! Cache Store Configuration
//!
//! Option bag accepted by a single [`CacheStore`](super::CacheStore). Field names on the
//! wire are camelCase; unknown fields are ignored and omitted fields fall back to defaults.

use crate::utils::{CacheEngineError, CacheEngineResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Behaviour of `set` for a new key when the store is full and LRU is disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Refuse the write; `set` returns false
    #[default]
    Reject,
    /// Drop the entry that was inserted first
    EvictOldestInserted,
    /// Grow past `max_size`
    Unbounded,
}

/// Thresholds evaluated by the store health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthThresholds {
    /// Hit-rate floor in percent
    pub min_hit_rate: f64,
    /// Memory ceiling in bytes
    pub max_memory_bytes: u64,
    /// Evictions per 100 writes
    pub max_eviction_rate: f64,
    /// Original bytes / stored bytes, checked only once something was compressed
    pub min_compression_ratio: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            min_hit_rate: 70.0,
            max_memory_bytes: 50 * 1024 * 1024,
            max_eviction_rate: 10.0,
            min_compression_ratio: 1.2,
        }
    }
}

/// Configuration of one cache store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Default TTL in seconds
    #[serde(rename = "defaultTTL")]
    pub default_ttl: u64,
    /// Maximum number of entries
    pub max_size: usize,
    /// Enable the compression transform for large payloads
    pub compression: bool,
    /// Serialized size in bytes above which payloads are compressed
    pub compression_threshold: usize,
    /// Expiry sweep interval in milliseconds
    pub cleanup_interval: u64,
    /// Hard age ceiling in milliseconds, 0 disables it
    pub max_age: u64,
    pub enable_metrics: bool,
    #[serde(rename = "enableLRU")]
    pub enable_lru: bool,
    pub overflow_policy: OverflowPolicy,
    /// Share one in-flight factory call between concurrent `get_or_set` callers
    pub dedupe_loads: bool,
    pub health_thresholds: HealthThresholds,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: 300,
            max_size: 1000,
            compression: true,
            compression_threshold: 1024,
            cleanup_interval: 60_000,
            max_age: 3_600_000,
            enable_metrics: true,
            enable_lru: true,
            overflow_policy: OverflowPolicy::default(),
            dedupe_loads: false,
            health_thresholds: HealthThresholds::default(),
        }
    }
}

impl CacheConfig {
    /// Build a configuration from a loose JSON option bag
    pub fn from_json(options: &serde_json::Value) -> CacheEngineResult<Self> {
        serde_json::from_value(options.clone()).map_err(|e| {
            crate::log_warn!(
                "Rejected cache store options",
                serde_json::json!({ "error": e.to_string() })
            );
            CacheEngineError::config_error(format!("Invalid cache store options: {}", e))
        })
    }

    pub fn with_default_ttl(mut self, seconds: u64) -> Self {
        self.default_ttl = seconds;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_max_age(mut self, max_age_ms: u64) -> Self {
        self.max_age = max_age_ms;
        self
    }

    pub fn with_lru(mut self, enabled: bool) -> Self {
        self.enable_lru = enabled;
        self
    }

    pub fn with_compression(mut self, enabled: bool, threshold_bytes: usize) -> Self {
        self.compression = enabled;
        self.compression_threshold = threshold_bytes;
        self
    }

    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    pub fn with_dedupe_loads(mut self, enabled: bool) -> Self {
        self.dedupe_loads = enabled;
        self
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval)
    }

    /// Lists suspicious values. Construction never calls this; callers that
    /// want to reject bad configuration can.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.max_size == 0 {
            issues.push("maxSize is 0; every write will overflow".to_string());
        }
        if self.default_ttl == 0 {
            issues.push("defaultTTL is 0; entries expire immediately".to_string());
        }
        if self.cleanup_interval == 0 {
            issues.push("cleanupInterval is 0; the sweep task cannot be scheduled".to_string());
        }
        if self.max_age > 0 && self.max_age < self.default_ttl.saturating_mul(1000) {
            issues.push(format!(
                "maxAge ({} ms) is shorter than defaultTTL ({} s)",
                self.max_age, self.default_ttl
            ));
        }
        issues
    }
}
