// src/services/mod.rs

pub mod cache_coordinator;
pub mod cache_store;

pub use cache_coordinator::{
    CacheCoordinator, CachePerformanceReport, DefaultMetricsAdapter, InvalidationOptions,
    InvalidationRule, ManagedCache, MetricsAdapter, MonitoringConfig, ReportStatus,
};
pub use cache_store::{CacheConfig, CacheStore, CompressionCodec, GzipCodec, NoopCodec};
