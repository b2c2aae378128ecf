//! In-process multi-tier cache plane.
//!
//! [`CacheStore`] is a single named cache with TTL expiry, LRU eviction,
//! pluggable compression and self-reported metrics. [`CacheCoordinator`]
//! registers several stores and treats them as one logical cache: it scores
//! them, raises alerts, drains an optimization queue and fans invalidations
//! out across them.
//!
//! ```no_run
//! use cache_plane::{CacheConfig, CacheCoordinator, CacheStore, CacheTier, MonitoringConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> cache_plane::CacheEngineResult<()> {
//! let dashboards: Arc<CacheStore<String>> =
//!     Arc::new(CacheStore::new("dashboards", CacheConfig::default()));
//! let coordinator = CacheCoordinator::new(MonitoringConfig::default());
//! coordinator.register("dashboards", CacheTier::Hot, dashboards.clone())?;
//!
//! dashboards.set("revenue", "…".to_string(), Some(60), None);
//! let report = coordinator.validate_performance().await;
//! println!("{} ({})", report.overall_score, report.status.as_str());
//! # Ok(())
//! # }
//! ```

pub mod services;
pub mod types;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

pub use services::cache_coordinator::{
    CacheCoordinator, CachePerformanceReport, InvalidationOptions, InvalidationRule,
    ManagedCache, MetricsAdapter, MonitoringConfig, ReportStatus,
};
pub use services::cache_store::{CacheConfig, CacheStore, CompressionCodec};
pub use types::{CacheTier, HealthStatus, SystemMetrics};
pub use utils::{CacheEngineError, CacheEngineResult, ErrorKind};
