use crate::services::cache_coordinator::{ManagedCache, MetricsAdapter, StoreSnapshot};
use crate::services::cache_store::{CacheConfig, CacheStore, TuningOutcome};
use crate::types::SystemMetrics;
use crate::utils::{CacheEngineError, CacheEngineResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// Managed cache whose snapshot and invalidation calls can be made to fail.
/// Everything else is served by an inner JSON store.
pub struct FailingStore {
    pub inner: CacheStore<Value>,
    fail_snapshots: AtomicBool,
    fail_invalidations: AtomicBool,
    failing_pattern: Mutex<Option<String>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: CacheStore::new("failing", CacheConfig::default()),
            fail_snapshots: AtomicBool::new(false),
            fail_invalidations: AtomicBool::new(false),
            failing_pattern: Mutex::new(None),
        }
    }

    pub fn fail_snapshots(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }

    pub fn fail_invalidations(&self, fail: bool) {
        self.fail_invalidations.store(fail, Ordering::SeqCst);
    }

    /// Fail invalidation of this one pattern only
    pub fn fail_pattern(&self, pattern: &str) {
        *self.failing_pattern.lock() = Some(pattern.to_string());
    }

    fn check(&self, flag: &AtomicBool, operation: &str) -> CacheEngineResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(CacheEngineError::subsystem_unavailable(
                "failing",
                format!("simulated {} failure", operation),
            ));
        }
        Ok(())
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ManagedCache for FailingStore {
    async fn snapshot(&self) -> CacheEngineResult<StoreSnapshot> {
        self.check(&self.fail_snapshots, "snapshot")?;
        self.inner.snapshot().await
    }

    async fn get_json(&self, key: &str) -> CacheEngineResult<Option<Value>> {
        self.inner.get_json(key).await
    }

    async fn set_json(&self, key: &str, value: Value, ttl: Option<u64>) -> CacheEngineResult<bool> {
        self.inner.set_json(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheEngineResult<bool> {
        ManagedCache::delete(&self.inner, key).await
    }

    async fn invalidate_pattern(&self, pattern: &str) -> CacheEngineResult<usize> {
        self.check(&self.fail_invalidations, "invalidation")?;
        if self.failing_pattern.lock().as_deref() == Some(pattern) {
            return Err(CacheEngineError::subsystem_unavailable(
                "failing",
                format!("simulated invalidation failure for '{}'", pattern),
            ));
        }
        ManagedCache::invalidate_pattern(&self.inner, pattern).await
    }

    async fn keys(&self, pattern: Option<&str>) -> CacheEngineResult<Vec<String>> {
        ManagedCache::keys(&self.inner, pattern).await
    }

    async fn hot_keys(&self, limit: usize) -> CacheEngineResult<Vec<String>> {
        ManagedCache::hot_keys(&self.inner, limit).await
    }

    async fn extend_ttl(&self, key: &str, extra_seconds: u64) -> CacheEngineResult<bool> {
        ManagedCache::extend_ttl(&self.inner, key, extra_seconds).await
    }

    async fn set_default_ttl(&self, seconds: u64) -> CacheEngineResult<()> {
        ManagedCache::set_default_ttl(&self.inner, seconds).await
    }

    async fn tune(&self) -> CacheEngineResult<TuningOutcome> {
        ManagedCache::tune(&self.inner).await
    }

    fn config(&self) -> CacheConfig {
        self.inner.config().clone()
    }
}

/// Adapter that ignores the snapshot and reports preset metrics
#[derive(Debug, Clone)]
pub struct FixedMetricsAdapter {
    pub metrics: SystemMetrics,
}

impl FixedMetricsAdapter {
    pub fn new(hit_rate: f64, response_time: f64, memory_usage_mb: f64) -> Self {
        Self {
            metrics: SystemMetrics {
                hit_rate,
                miss_rate: 100.0 - hit_rate,
                response_time,
                memory_usage: memory_usage_mb,
                entry_count: 10,
                request_count: 100,
                invalidation_count: 0,
                error_count: 0,
                efficiency: hit_rate,
            },
        }
    }
}

impl MetricsAdapter for FixedMetricsAdapter {
    fn normalize(&self, _snapshot: &StoreSnapshot) -> CacheEngineResult<SystemMetrics> {
        Ok(self.metrics.clone())
    }
}

/// Adapter that cannot make sense of any snapshot
#[derive(Debug, Clone, Default)]
pub struct BrokenMetricsAdapter;

impl MetricsAdapter for BrokenMetricsAdapter {
    fn normalize(&self, _snapshot: &StoreSnapshot) -> CacheEngineResult<SystemMetrics> {
        Err(CacheEngineError::serialization_error(
            "native statistics could not be normalized",
        ))
    }
}
