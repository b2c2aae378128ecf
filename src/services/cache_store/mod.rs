// Cache Store Module - named in-process stores with TTL, LRU, compression and metrics

pub mod compression;
pub mod config;
pub mod entry;
pub mod health;
pub mod metrics;
pub mod store;

pub use compression::{CompressedPayload, CompressionCodec, GzipCodec, NoopCodec, NOOP_CODEC};
pub use config::{CacheConfig, HealthThresholds, OverflowPolicy};
pub use entry::{is_expired, CacheEntry, EntryInfo, EntryMetadata, EntryPayload};
pub use health::{evaluate_health, CacheHealthReport};
pub use metrics::{CacheMetrics, CacheStats};
pub use store::{CacheStore, CacheValue, TuningOutcome};
