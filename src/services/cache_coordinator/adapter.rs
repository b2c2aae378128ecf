// Registration contract between the coordinator and the stores it manages

use crate::services::cache_store::{
    CacheConfig, CacheMetrics, CacheStats, CacheStore, CacheValue, TuningOutcome,
};
use crate::types::SystemMetrics;
use crate::utils::helpers::bytes_to_mb;
use crate::utils::CacheEngineResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Native statistics of one store at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub metrics: CacheMetrics,
    pub stats: CacheStats,
    pub default_ttl: u64,
    pub max_size: usize,
}

/// Public surface a store exposes to the coordinator.
///
/// Values cross this boundary as JSON so stores holding different payload
/// types can sit behind one coordinator. The coordinator never reaches into a
/// store's internals; optimizations go through these calls too.
#[async_trait]
pub trait ManagedCache: Send + Sync {
    async fn snapshot(&self) -> CacheEngineResult<StoreSnapshot>;
    async fn get_json(&self, key: &str) -> CacheEngineResult<Option<Value>>;
    async fn set_json(&self, key: &str, value: Value, ttl: Option<u64>)
        -> CacheEngineResult<bool>;
    async fn delete(&self, key: &str) -> CacheEngineResult<bool>;
    /// Delete every key matching the glob; returns the count removed
    async fn invalidate_pattern(&self, pattern: &str) -> CacheEngineResult<usize>;
    async fn keys(&self, pattern: Option<&str>) -> CacheEngineResult<Vec<String>>;
    async fn hot_keys(&self, limit: usize) -> CacheEngineResult<Vec<String>>;
    async fn extend_ttl(&self, key: &str, extra_seconds: u64) -> CacheEngineResult<bool>;
    async fn set_default_ttl(&self, seconds: u64) -> CacheEngineResult<()>;
    async fn tune(&self) -> CacheEngineResult<TuningOutcome>;
    fn config(&self) -> CacheConfig;
}

#[async_trait]
impl<V: CacheValue> ManagedCache for CacheStore<V> {
    async fn snapshot(&self) -> CacheEngineResult<StoreSnapshot> {
        Ok(StoreSnapshot {
            metrics: self.get_metrics(),
            stats: self.get_stats(),
            default_ttl: self.default_ttl(),
            max_size: CacheStore::config(self).max_size,
        })
    }

    async fn get_json(&self, key: &str) -> CacheEngineResult<Option<Value>> {
        Ok(self.get(key).map(serde_json::to_value).transpose()?)
    }

    async fn set_json(
        &self,
        key: &str,
        value: Value,
        ttl: Option<u64>,
    ) -> CacheEngineResult<bool> {
        let typed: V = serde_json::from_value(value)?;
        Ok(self.set(key, typed, ttl, None))
    }

    async fn delete(&self, key: &str) -> CacheEngineResult<bool> {
        Ok(CacheStore::delete(self, key))
    }

    async fn invalidate_pattern(&self, pattern: &str) -> CacheEngineResult<usize> {
        CacheStore::invalidate_pattern(self, pattern)
    }

    async fn keys(&self, pattern: Option<&str>) -> CacheEngineResult<Vec<String>> {
        CacheStore::keys(self, pattern)
    }

    async fn hot_keys(&self, limit: usize) -> CacheEngineResult<Vec<String>> {
        Ok(CacheStore::hot_keys(self, limit))
    }

    async fn extend_ttl(&self, key: &str, extra_seconds: u64) -> CacheEngineResult<bool> {
        Ok(CacheStore::extend_ttl(self, key, extra_seconds))
    }

    async fn set_default_ttl(&self, seconds: u64) -> CacheEngineResult<()> {
        CacheStore::set_default_ttl(self, seconds);
        Ok(())
    }

    async fn tune(&self) -> CacheEngineResult<TuningOutcome> {
        Ok(CacheStore::tune(self))
    }

    fn config(&self) -> CacheConfig {
        CacheStore::config(self).clone()
    }
}

/// Turns a store's native statistics into the coordinator's common shape
pub trait MetricsAdapter: Send + Sync {
    fn normalize(&self, snapshot: &StoreSnapshot) -> CacheEngineResult<SystemMetrics>;
}

/// Maps [`CacheMetrics`]/[`CacheStats`] field by field
#[derive(Debug, Clone, Default)]
pub struct DefaultMetricsAdapter;

impl MetricsAdapter for DefaultMetricsAdapter {
    fn normalize(&self, snapshot: &StoreSnapshot) -> CacheEngineResult<SystemMetrics> {
        let metrics = &snapshot.metrics;
        Ok(SystemMetrics {
            hit_rate: metrics.hit_rate,
            miss_rate: metrics.miss_rate,
            response_time: metrics.average_access_time,
            memory_usage: bytes_to_mb(snapshot.stats.memory_usage),
            entry_count: snapshot.stats.size as u64,
            request_count: metrics.requests(),
            invalidation_count: metrics.deletes,
            error_count: metrics.errors,
            efficiency: metrics.hit_rate,
        })
    }
}
