// Cache Coordinator - treats several registered stores as one logical cache plane

use super::adapter::{DefaultMetricsAdapter, ManagedCache, MetricsAdapter};
use super::config::MonitoringConfig;
use super::invalidation::InvalidationRule;
use super::monitoring::CacheAlert;
use super::optimizer::{plan_actions, AppliedOptimization, OptimizationQueue};
use super::report::{CachePerformanceReport, GlobalMetrics};
use crate::types::{CacheTier, SystemMetrics};
use crate::utils::logger::Logger;
use crate::utils::time::{Clock, SystemClock};
use crate::utils::{CacheEngineError, CacheEngineResult};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

pub const REPORT_HISTORY_LIMIT: usize = 100;
pub const ALERT_HISTORY_LIMIT: usize = 100;
pub const OPTIMIZATION_LOG_LIMIT: usize = 50;
/// Number of log entries copied into each report
pub const RECENT_OPTIMIZATIONS_IN_REPORT: usize = 10;

/// Store name that addresses every registered store
pub const ALL_STORES: &str = "all";

#[derive(Clone)]
pub struct RegisteredCache {
    pub name: String,
    pub tier: CacheTier,
    pub cache: Arc<dyn ManagedCache>,
    pub adapter: Arc<dyn MetricsAdapter>,
}

impl std::fmt::Debug for RegisteredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCache")
            .field("name", &self.name)
            .field("tier", &self.tier)
            .finish()
    }
}

pub(super) struct CoordinatorInner {
    pub(super) config: MonitoringConfig,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) logger: Logger,
    pub(super) registry: RwLock<Vec<RegisteredCache>>,
    pub(super) history: Mutex<VecDeque<CachePerformanceReport>>,
    pub(super) queue: Mutex<OptimizationQueue>,
    pub(super) optimization_log: Mutex<VecDeque<AppliedOptimization>>,
    pub(super) alerts: Mutex<VecDeque<CacheAlert>>,
    pub(super) rules: RwLock<Vec<InvalidationRule>>,
    pub(super) last_auto_optimization: Mutex<Option<u64>>,
    pub(super) monitor_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        if let Some(handle) = self.monitor_task.get_mut().take() {
            handle.abort();
        }
    }
}

/// One value to preload during warm-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmUpEntry {
    pub key: String,
    pub value: Value,
    pub ttl: Option<u64>,
}

impl WarmUpEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            ttl: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmUpResult {
    /// Entries written, per store
    pub loaded: BTreeMap<String, usize>,
    pub total_loaded: usize,
    pub failed: usize,
    pub hit_rate_before: f64,
    pub hit_rate_after: f64,
    pub hit_rate_delta: f64,
    pub duration_ms: u64,
}

/// Owns references to registered stores and everything computed across them.
///
/// Cloning is cheap and every clone shares the same registry, history and
/// optimization queue. The monitoring task stops once the last clone is
/// dropped.
#[derive(Clone)]
pub struct CacheCoordinator {
    pub(super) inner: Arc<CoordinatorInner>,
}

impl CacheCoordinator {
    pub fn new(config: MonitoringConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: MonitoringConfig, clock: Arc<dyn Clock>) -> Self {
        let logger = Logger::for_component("cache_coordinator");
        for issue in config.validate() {
            logger.warn(&format!("Monitoring configuration: {}", issue));
        }

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                clock,
                logger,
                registry: RwLock::new(Vec::new()),
                history: Mutex::new(VecDeque::new()),
                queue: Mutex::new(OptimizationQueue::default()),
                optimization_log: Mutex::new(VecDeque::new()),
                alerts: Mutex::new(VecDeque::new()),
                rules: RwLock::new(Vec::new()),
                last_auto_optimization: Mutex::new(None),
                monitor_task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.inner.config
    }

    pub(super) fn now_ms(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    /// Register a store under `name` using [`DefaultMetricsAdapter`]
    pub fn register(
        &self,
        name: &str,
        tier: CacheTier,
        cache: Arc<dyn ManagedCache>,
    ) -> CacheEngineResult<()> {
        self.register_with_adapter(name, tier, cache, Arc::new(DefaultMetricsAdapter))
    }

    pub fn register_with_adapter(
        &self,
        name: &str,
        tier: CacheTier,
        cache: Arc<dyn ManagedCache>,
        adapter: Arc<dyn MetricsAdapter>,
    ) -> CacheEngineResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CacheEngineError::registration_error(
                "Store name must not be empty",
            ));
        }
        if name == ALL_STORES {
            return Err(CacheEngineError::registration_error(format!(
                "'{}' is reserved for addressing every store",
                ALL_STORES
            )));
        }

        let mut registry = self.inner.registry.write();
        if registry.iter().any(|c| c.name == name) {
            return Err(CacheEngineError::registration_error(format!(
                "Store '{}' is already registered",
                name
            ))
            .with_subsystem(name));
        }
        registry.push(RegisteredCache {
            name: name.to_string(),
            tier,
            cache,
            adapter,
        });
        drop(registry);

        self.inner.logger.info_with_meta(
            "Store registered",
            Some(&serde_json::json!({ "store": name, "tier": tier.as_str() })),
        );
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut registry = self.inner.registry.write();
        let before = registry.len();
        registry.retain(|c| c.name != name);
        before != registry.len()
    }

    /// Registered store names in registration order
    pub fn store_names(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    pub(super) fn registered(&self) -> Vec<RegisteredCache> {
        self.inner.registry.read().clone()
    }

    pub(super) fn find(&self, name: &str) -> Option<RegisteredCache> {
        self.inner
            .registry
            .read()
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    /// Snapshot and normalize every store concurrently. A store whose snapshot
    /// or adapter fails is reported as `Err` without affecting the others.
    pub(super) async fn collect_metrics(
        &self,
    ) -> Vec<(String, CacheEngineResult<SystemMetrics>)> {
        let caches = self.registered();
        join_all(caches.into_iter().map(|registered| async move {
            let result = match registered.cache.snapshot().await {
                Ok(snapshot) => registered.adapter.normalize(&snapshot),
                Err(e) => Err(e),
            };
            (registered.name, result)
        }))
        .await
    }

    async fn current_global_metrics(&self) -> GlobalMetrics {
        let collected = self.collect_metrics().await;
        GlobalMetrics::aggregate(
            collected
                .iter()
                .filter_map(|(_, result)| result.as_ref().ok()),
        )
    }

    /// Collect, score and archive a report, then queue optimizations for any
    /// breached trigger. Never fails: unavailable stores are zeroed.
    pub async fn validate_performance(&self) -> CachePerformanceReport {
        let config = &self.inner.config;
        let mut report = CachePerformanceReport::pending(self.now_ms());

        for (name, result) in self.collect_metrics().await {
            match result {
                Ok(metrics) => report.record_subsystem(&name, metrics),
                Err(e) => {
                    self.inner.logger.warn_with_meta(
                        "Store unavailable during report collection",
                        Some(&serde_json::json!({ "store": name, "error": e.to_string() })),
                    );
                    report.record_failure(&name, e.to_string());
                }
            }
        }

        report.score(config.memory_budget);
        report.recommend(&config.alert_thresholds);
        report.archive(self.recent_optimizations(RECENT_OPTIMIZATIONS_IN_REPORT));

        let alerts = self.raise_alerts(&report);

        {
            let mut history = self.inner.history.lock();
            history.push_back(report.clone());
            while history.len() > REPORT_HISTORY_LIMIT {
                history.pop_front();
            }
        }

        let planned = plan_actions(
            &report,
            &self.registered(),
            &config.optimization_triggers,
            self.now_ms(),
        );
        let queued = if planned.is_empty() {
            0
        } else {
            self.inner.queue.lock().enqueue_all(planned)
        };

        self.inner.logger.info_with_meta(
            "Performance validated",
            Some(&serde_json::json!({
                "reportId": report.id,
                "score": report.overall_score,
                "status": report.status.as_str(),
                "alerts": alerts,
                "queued": queued,
            })),
        );
        report
    }

    /// Reports from oldest to newest
    pub fn report_history(&self) -> Vec<CachePerformanceReport> {
        self.inner.history.lock().iter().cloned().collect()
    }

    pub fn latest_report(&self) -> Option<CachePerformanceReport> {
        self.inner.history.lock().back().cloned()
    }

    /// Preload caller-supplied values into the named stores
    pub async fn warm_up_caches(&self, entries: HashMap<String, Vec<WarmUpEntry>>) -> WarmUpResult {
        let started = Instant::now();
        let hit_rate_before = self.current_global_metrics().await.hit_rate;
        let mut result = WarmUpResult {
            hit_rate_before,
            ..Default::default()
        };

        let mut targets: Vec<(String, Vec<WarmUpEntry>)> = entries.into_iter().collect();
        targets.sort_by(|a, b| a.0.cmp(&b.0));

        for (store, values) in targets {
            let Some(registered) = self.find(&store) else {
                self.inner.logger.warn_with_meta(
                    "Warm-up skipped unknown store",
                    Some(&serde_json::json!({ "store": store, "entries": values.len() })),
                );
                result.failed += values.len();
                continue;
            };

            let mut loaded = 0;
            for entry in values {
                match registered
                    .cache
                    .set_json(&entry.key, entry.value, entry.ttl)
                    .await
                {
                    Ok(true) => loaded += 1,
                    Ok(false) => result.failed += 1,
                    Err(e) => {
                        result.failed += 1;
                        self.inner.logger.warn_with_meta(
                            "Warm-up write failed",
                            Some(&serde_json::json!({
                                "store": store,
                                "key": entry.key,
                                "error": e.to_string(),
                            })),
                        );
                    }
                }
            }
            result.total_loaded += loaded;
            result.loaded.insert(store, loaded);
        }

        self.finish_warm_up(&mut result, started).await;
        result
    }

    /// Load `keys` through `loader` concurrently and store the results in `store`
    pub async fn warm_up_from_loader<F, Fut>(
        &self,
        store: &str,
        keys: &[String],
        loader: F,
    ) -> CacheEngineResult<WarmUpResult>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = anyhow::Result<Value>>,
    {
        let registered = self.find(store).ok_or_else(|| {
            CacheEngineError::not_found(format!("Store '{}' is not registered", store))
        })?;

        let started = Instant::now();
        let mut result = WarmUpResult {
            hit_rate_before: self.current_global_metrics().await.hit_rate,
            ..Default::default()
        };

        let loaded_values = join_all(keys.iter().map(|key| {
            let fut = loader(key.clone());
            async move { (key, fut.await) }
        }))
        .await;

        let mut loaded = 0;
        for (key, value) in loaded_values {
            let written = match value {
                Ok(value) => registered.cache.set_json(key, value, None).await,
                Err(e) => Err(CacheEngineError::from(e).with_subsystem(store)),
            };
            match written {
                Ok(true) => loaded += 1,
                Ok(false) => result.failed += 1,
                Err(e) => {
                    result.failed += 1;
                    self.inner.logger.warn_with_meta(
                        "Warm-up load failed",
                        Some(&serde_json::json!({
                            "store": store,
                            "key": key,
                            "error": e.to_string(),
                        })),
                    );
                }
            }
        }
        result.total_loaded = loaded;
        result.loaded.insert(store.to_string(), loaded);

        self.finish_warm_up(&mut result, started).await;
        Ok(result)
    }

    async fn finish_warm_up(&self, result: &mut WarmUpResult, started: Instant) {
        result.hit_rate_after = self.current_global_metrics().await.hit_rate;
        result.hit_rate_delta = result.hit_rate_after - result.hit_rate_before;
        result.duration_ms = started.elapsed().as_millis() as u64;

        self.inner.logger.info_with_meta(
            "Warm-up finished",
            Some(&serde_json::json!({
                "loaded": result.total_loaded,
                "failed": result.failed,
                "durationMs": result.duration_ms,
            })),
        );
    }
}
