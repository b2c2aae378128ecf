// Cache Store - single named in-process cache with TTL expiration, LRU eviction
// and self-reported metrics

use super::compression::{CompressedPayload, CompressionCodec, NoopCodec};
use super::config::{CacheConfig, OverflowPolicy};
use super::entry::{CacheEntry, EntryInfo, EntryMetadata, EntryPayload};
use super::health::{evaluate_health, CacheHealthReport};
use super::metrics::{CacheMetrics, CacheStats};
use crate::utils::helpers::KeyPattern;
use crate::utils::logger::Logger;
use crate::utils::time::{Clock, SystemClock};
use crate::utils::{CacheEngineError, CacheEngineResult};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Bounds every cached payload type must satisfy
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Result of [`CacheStore::tune`]
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningOutcome {
    pub expired_removed: usize,
    pub evicted: usize,
}

struct StoreState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// access_seq -> key; first entry is the least recently used
    lru_index: BTreeMap<u64, String>,
    /// insert_seq -> key
    insertion_index: BTreeMap<u64, String>,
    metrics: CacheMetrics,
    metrics_enabled: bool,
    next_seq: u64,
    default_ttl: u64,
    memory_usage: u64,
}

impl<V> StoreState<V> {
    fn new(config: &CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            lru_index: BTreeMap::new(),
            insertion_index: BTreeMap::new(),
            metrics: CacheMetrics::default(),
            metrics_enabled: config.enable_metrics,
            next_seq: 0,
            default_ttl: config.default_ttl,
            memory_usage: 0,
        }
    }

    fn record(&mut self, f: impl FnOnce(&mut CacheMetrics)) {
        if self.metrics_enabled {
            f(&mut self.metrics);
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn insert_entry(&mut self, key: String, entry: CacheEntry<V>) {
        self.lru_index.insert(entry.access_seq, key.clone());
        self.insertion_index.insert(entry.insert_seq, key.clone());
        self.memory_usage += entry.size_bytes as u64;
        self.entries.insert(key, entry);
        self.metrics.size = self.entries.len();
    }

    /// Removes the entry from the main map and every index
    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru_index.remove(&entry.access_seq);
        self.insertion_index.remove(&entry.insert_seq);
        self.memory_usage = self.memory_usage.saturating_sub(entry.size_bytes as u64);
        self.metrics.size = self.entries.len();
        Some(entry)
    }

    fn touch(&mut self, key: &str, now_ms: u64) {
        let seq = self.next_seq();
        if let Some(entry) = self.entries.get_mut(key) {
            self.lru_index.remove(&entry.access_seq);
            entry.access_seq = seq;
            entry.access_count += 1;
            entry.last_accessed = now_ms;
            self.lru_index.insert(seq, key.to_string());
        }
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (_, key) = self.lru_index.iter().next()?;
        let key = key.clone();
        self.remove_entry(&key)?;
        self.record(|m| m.evictions += 1);
        Some(key)
    }

    fn evict_oldest_inserted(&mut self) -> Option<String> {
        let (_, key) = self.insertion_index.iter().next()?;
        let key = key.clone();
        self.remove_entry(&key)?;
        self.record(|m| m.evictions += 1);
        Some(key)
    }

    fn expired_keys(&self, now_ms: u64, max_age_ms: u64) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now_ms, max_age_ms))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

struct StoreShared<V> {
    name: String,
    config: CacheConfig,
    codec: Arc<dyn CompressionCodec>,
    clock: Arc<dyn Clock>,
    logger: Logger,
    state: Mutex<StoreState<V>>,
}

impl<V: CacheValue> StoreShared<V> {
    fn decode(&self, payload: &EntryPayload<V>) -> CacheEngineResult<V> {
        match payload {
            EntryPayload::Inline(value) => Ok(value.clone()),
            EntryPayload::Compressed(compressed) => {
                let raw = compressed.open(self.codec.as_ref())?;
                Ok(serde_json::from_slice(&raw)?)
            }
        }
    }

    fn cleanup_expired(&self) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let expired = state.expired_keys(now, self.config.max_age);
        for key in &expired {
            state.remove_entry(key);
        }
        let count = expired.len() as u64;
        state.record(|m| m.expired += count);
        drop(state);

        if !expired.is_empty() {
            self.logger.debug_with_meta(
                "Expired entries swept",
                Some(&serde_json::json!({ "removed": expired.len() })),
            );
        }
        expired
    }
}

/// Single named cache store.
///
/// All state lives behind one mutex that is never held across an await, so
/// the sweep task, the coordinator and request handlers can share a store
/// freely. Payloads larger than the compression threshold are stored as
/// [`CompressedPayload`]s.
pub struct CacheStore<V> {
    shared: Arc<StoreShared<V>>,
    inflight: Mutex<HashMap<String, LoadGate>>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

type LoadGate = Arc<tokio::sync::Mutex<()>>;

/// One caller's claim on a key's load gate. The map entry is pruned when the
/// last claim is released, whether the load finished or was cancelled.
struct InflightSlot<'a> {
    inflight: &'a Mutex<HashMap<String, LoadGate>>,
    key: &'a str,
    gate: Option<LoadGate>,
}

impl<'a> InflightSlot<'a> {
    fn claim(inflight: &'a Mutex<HashMap<String, LoadGate>>, key: &'a str) -> Self {
        let gate = inflight
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        Self {
            inflight,
            key,
            gate: Some(gate),
        }
    }

    async fn wait(&self) -> Option<tokio::sync::OwnedMutexGuard<()>> {
        let gate = self.gate.clone()?;
        Some(gate.lock_owned().await)
    }
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        drop(self.gate.take());
        let mut inflight = self.inflight.lock();
        if inflight
            .get(self.key)
            .map(|gate| Arc::strong_count(gate) == 1)
            .unwrap_or(false)
        {
            inflight.remove(self.key);
        }
    }
}

impl<V: CacheValue> CacheStore<V> {
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        Self::with_components(name, config, Arc::new(NoopCodec), Arc::new(SystemClock))
    }

    pub fn with_components(
        name: impl Into<String>,
        config: CacheConfig,
        codec: Arc<dyn CompressionCodec>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let name = name.into();
        let logger = Logger::for_component("cache_store")
            .with_field("store", name.clone());

        logger.info(&format!(
            "CacheStore initialized: maxSize={}, defaultTTL={}s, lru={}, compression={} ({})",
            config.max_size,
            config.default_ttl,
            config.enable_lru,
            config.compression,
            codec.name()
        ));

        Self {
            shared: Arc::new(StoreShared {
                state: Mutex::new(StoreState::new(&config)),
                name,
                config,
                codec,
                clock,
                logger,
            }),
            inflight: Mutex::new(HashMap::new()),
            cleanup_task: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.shared.config
    }

    pub fn default_ttl(&self) -> u64 {
        self.shared.state.lock().default_ttl
    }

    pub fn set_default_ttl(&self, seconds: u64) {
        self.shared.state.lock().default_ttl = seconds;
    }

    /// Get a live value. Never fails: faults are logged and counted as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        self.read(key, true)
    }

    fn read(&self, key: &str, record: bool) -> Option<V> {
        let start = Instant::now();
        let shared = &self.shared;
        let now = shared.clock.now_ms();
        let mut state = shared.state.lock();

        let expired = state
            .entries
            .get(key)
            .map(|entry| entry.is_expired(now, shared.config.max_age))
            .unwrap_or(false);
        if expired {
            state.remove_entry(key);
            state.record(|m| m.expired += 1);
        }

        let lookup = state
            .entries
            .get(key)
            .map(|entry| (shared.decode(&entry.payload), entry.is_compressed()));

        match lookup {
            Some((Ok(value), compressed)) => {
                state.touch(key, now);
                if record {
                    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                    state.record(|m| {
                        if compressed {
                            m.decompressions += 1;
                        }
                        m.record_hit(latency_ms);
                    });
                }
                Some(value)
            }
            Some((Err(err), _)) => {
                state.remove_entry(key);
                state.record(|m| {
                    m.errors += 1;
                    if record {
                        m.record_miss();
                    }
                });
                drop(state);
                let fault = CacheEngineError::transient(format!("Unreadable entry '{}'", key))
                    .with_subsystem(&shared.name);
                shared.logger.warn_with_source(
                    &fault.to_string(),
                    &err,
                    Some(&serde_json::json!({ "key": key, "kind": fault.kind.as_str() })),
                );
                None
            }
            None => {
                if record {
                    state.record(|m| m.record_miss());
                }
                None
            }
        }
    }

    /// Store a value. Returns false when the write was refused or failed.
    pub fn set(
        &self,
        key: &str,
        value: V,
        ttl: Option<u64>,
        metadata: Option<EntryMetadata>,
    ) -> bool {
        let shared = &self.shared;
        let config = &shared.config;

        if config.max_size == 0 {
            return false;
        }

        let (payload, original_size, stored_size) = match self.encode(key, value) {
            Ok(encoded) => encoded,
            Err(err) => {
                shared.state.lock().record(|m| m.errors += 1);
                shared.logger.warn_with_meta(
                    "Failed to store entry",
                    Some(&serde_json::json!({ "key": key, "error": err.to_string() })),
                );
                return false;
            }
        };
        let compressed = matches!(payload, EntryPayload::Compressed(_));

        let now = shared.clock.now_ms();
        let mut state = shared.state.lock();

        if state.remove_entry(key).is_none() && state.entries.len() >= config.max_size {
            let evicted = if config.enable_lru {
                state.evict_lru()
            } else {
                match config.overflow_policy {
                    OverflowPolicy::Reject => {
                        drop(state);
                        shared.logger.debug_with_meta(
                            "Write rejected: store at capacity",
                            Some(&serde_json::json!({ "key": key })),
                        );
                        return false;
                    }
                    OverflowPolicy::EvictOldestInserted => state.evict_oldest_inserted(),
                    OverflowPolicy::Unbounded => None,
                }
            };
            if let Some(evicted) = evicted {
                shared.logger.debug_with_meta(
                    "Entry evicted",
                    Some(&serde_json::json!({ "evicted": evicted, "for": key })),
                );
            }
        }

        let seq = state.next_seq();
        let ttl = ttl.unwrap_or(state.default_ttl);
        let entry = CacheEntry {
            payload,
            inserted_at: now,
            ttl,
            access_count: 0,
            last_accessed: now,
            access_seq: seq,
            insert_seq: seq,
            size_bytes: key.len() + stored_size,
            original_size,
            metadata,
        };
        state.insert_entry(key.to_string(), entry);
        state.record(|m| {
            m.sets += 1;
            if compressed {
                m.compressions += 1;
            }
        });
        true
    }

    fn encode(&self, key: &str, value: V) -> CacheEngineResult<(EntryPayload<V>, usize, usize)> {
        let shared = &self.shared;
        let raw = serde_json::to_vec(&value)?;
        let original_size = raw.len();

        if !shared.config.compression || original_size <= shared.config.compression_threshold {
            return Ok((EntryPayload::Inline(value), original_size, original_size));
        }

        match CompressedPayload::seal(shared.codec.as_ref(), &raw) {
            Ok(payload) => {
                let stored = payload.stored_size();
                Ok((EntryPayload::Compressed(payload), original_size, stored))
            }
            Err(err) => {
                shared.state.lock().record(|m| m.errors += 1);
                shared.logger.warn_with_meta(
                    "Compression failed, storing uncompressed",
                    Some(&serde_json::json!({ "key": key, "error": err.to_string() })),
                );
                Ok((EntryPayload::Inline(value), original_size, original_size))
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.shared.state.lock();
        let removed = state.remove_entry(key).is_some();
        if removed {
            state.record(|m| m.deletes += 1);
        }
        removed
    }

    /// Presence of a live entry. No metric or LRU side effects.
    pub fn has(&self, key: &str) -> bool {
        let now = self.shared.clock.now_ms();
        let state = self.shared.state.lock();
        state
            .entries
            .get(key)
            .map(|entry| !entry.is_expired(now, self.shared.config.max_age))
            .unwrap_or(false)
    }

    /// Values for the keys that were found
    pub fn get_many(&self, keys: &[&str]) -> HashMap<String, V> {
        keys.iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }

    /// Per-key success flags; one failed write does not stop the rest
    pub fn set_many(
        &self,
        items: impl IntoIterator<Item = (String, V, Option<u64>)>,
    ) -> HashMap<String, bool> {
        items
            .into_iter()
            .map(|(key, value, ttl)| {
                let ok = self.set(&key, value, ttl, None);
                (key, ok)
            })
            .collect()
    }

    /// Return the cached value, or run `factory`, cache its result and return it.
    ///
    /// Concurrent callers for the same missing key each run their own factory
    /// unless `dedupeLoads` is enabled.
    pub async fn get_or_set<F, Fut>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<u64>,
        metadata: Option<EntryMetadata>,
    ) -> CacheEngineResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        if !self.shared.config.dedupe_loads {
            return self.load_and_store(key, factory, ttl, metadata).await;
        }

        let slot = InflightSlot::claim(&self.inflight, key);
        let _guard = slot.wait().await;
        match self.read(key, false) {
            Some(value) => Ok(value),
            None => self.load_and_store(key, factory, ttl, metadata).await,
        }
    }

    #[cfg(test)]
    fn inflight_len(&self) -> usize {
        self.inflight.lock().len()
    }

    async fn load_and_store<F, Fut>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<u64>,
        metadata: Option<EntryMetadata>,
    ) -> CacheEngineResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        let value = factory()
            .await
            .map_err(|e| CacheEngineError::from(e).with_subsystem(self.name()))?;
        self.set(key, value.clone(), ttl, metadata);
        Ok(value)
    }

    /// Remove every entry. Counters are kept.
    pub fn clear(&self) {
        let mut state = self.shared.state.lock();
        let removed = state.entries.len();
        state.entries.clear();
        state.lru_index.clear();
        state.insertion_index.clear();
        state.memory_usage = 0;
        state.metrics.size = 0;
        drop(state);

        self.shared.logger.info_with_meta(
            "Store cleared",
            Some(&serde_json::json!({ "removed": removed })),
        );
    }

    /// Live keys, sorted, optionally filtered by a glob
    pub fn keys(&self, pattern: Option<&str>) -> CacheEngineResult<Vec<String>> {
        let pattern = pattern.map(KeyPattern::new).transpose()?;
        let now = self.shared.clock.now_ms();
        let state = self.shared.state.lock();

        let mut keys: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now, self.shared.config.max_age))
            .filter(|(key, _)| pattern.as_ref().map(|p| p.matches(key)).unwrap_or(true))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Delete every live key matching the glob; returns how many were removed
    pub fn invalidate_pattern(&self, pattern: &str) -> CacheEngineResult<usize> {
        let keys = self.keys(Some(pattern))?;
        let removed = keys.iter().filter(|key| self.delete(key)).count();

        self.shared.logger.debug_with_meta(
            "Pattern invalidated",
            Some(&serde_json::json!({ "pattern": pattern, "removed": removed })),
        );
        Ok(removed)
    }

    /// Lengthen the TTL of a live entry. Returns false when the key is absent.
    pub fn extend_ttl(&self, key: &str, extra_seconds: u64) -> bool {
        let now = self.shared.clock.now_ms();
        let mut state = self.shared.state.lock();
        match state.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now, self.shared.config.max_age) => {
                entry.ttl = entry.ttl.saturating_add(extra_seconds);
                true
            }
            _ => false,
        }
    }

    /// Most-read live keys first
    pub fn hot_keys(&self, limit: usize) -> Vec<String> {
        let now = self.shared.clock.now_ms();
        let state = self.shared.state.lock();
        let mut live: Vec<(&String, &CacheEntry<V>)> = state
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now, self.shared.config.max_age))
            .collect();
        live.sort_by(|a, b| {
            b.1.access_count
                .cmp(&a.1.access_count)
                .then(b.1.access_seq.cmp(&a.1.access_seq))
        });
        live.into_iter()
            .take(limit)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Payload-free view of an entry, no side effects
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        self.shared
            .state
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.info(key))
    }

    /// Remaining TTL in whole seconds for a live entry
    pub fn remaining_ttl(&self, key: &str) -> Option<u64> {
        let now = self.shared.clock.now_ms();
        let state = self.shared.state.lock();
        state
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now, self.shared.config.max_age))
            .map(|entry| entry.remaining_ttl_ms(now).div_ceil(1000))
    }

    /// Remove every expired entry; returns the removed keys
    pub fn cleanup_expired(&self) -> Vec<String> {
        self.shared.cleanup_expired()
    }

    /// Sweep expired entries, then trim to 75% of capacity when above 90%
    pub fn tune(&self) -> TuningOutcome {
        let expired_removed = self.cleanup_expired().len();
        let config = &self.shared.config;
        let mut evicted = 0;

        if config.enable_lru && config.max_size > 0 {
            let mut state = self.shared.state.lock();
            let high_water = config.max_size.saturating_mul(9) / 10;
            let target = config.max_size.saturating_mul(3) / 4;
            if state.entries.len() > high_water {
                while state.entries.len() > target {
                    if state.evict_lru().is_none() {
                        break;
                    }
                    evicted += 1;
                }
            }
        }

        self.shared.logger.info_with_meta(
            "Store tuned",
            Some(&serde_json::json!({ "expired": expired_removed, "evicted": evicted })),
        );
        TuningOutcome {
            expired_removed,
            evicted,
        }
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_metrics(&self) -> CacheMetrics {
        let state = self.shared.state.lock();
        let mut metrics = state.metrics.clone();
        metrics.size = state.entries.len();
        metrics
    }

    pub fn get_stats(&self) -> CacheStats {
        let state = self.shared.state.lock();
        let mut keys: Vec<String> = state.entries.keys().cloned().collect();
        keys.sort();

        let oldest_entry = state.entries.values().map(|e| e.inserted_at).min();
        let newest_entry = state.entries.values().map(|e| e.inserted_at).max();
        let most_accessed_key = state
            .entries
            .iter()
            .max_by(|a, b| a.1.access_count.cmp(&b.1.access_count).then(b.0.cmp(a.0)))
            .map(|(key, _)| key.clone());
        let least_accessed_key = state
            .entries
            .iter()
            .min_by(|a, b| a.1.access_count.cmp(&b.1.access_count).then(a.0.cmp(b.0)))
            .map(|(key, _)| key.clone());

        let (original, stored) = state
            .entries
            .values()
            .filter_map(|entry| match &entry.payload {
                EntryPayload::Compressed(payload) => {
                    Some((payload.original_size, payload.stored_size()))
                }
                EntryPayload::Inline(_) => None,
            })
            .fold((0usize, 0usize), |acc, (o, s)| (acc.0 + o, acc.1 + s));
        let compression_ratio = if stored == 0 {
            1.0
        } else {
            original as f64 / stored as f64
        };

        CacheStats {
            size: state.entries.len(),
            memory_usage: state.memory_usage,
            oldest_entry,
            newest_entry,
            most_accessed_key,
            least_accessed_key,
            compression_ratio,
            eviction_rate: state.metrics.eviction_rate(),
            keys,
        }
    }

    pub fn get_health_report(&self) -> CacheHealthReport {
        let metrics = self.get_metrics();
        let stats = self.get_stats();
        evaluate_health(
            self.name(),
            self.shared.codec.name(),
            &metrics,
            &stats,
            &self.shared.config.health_thresholds,
            self.shared.clock.now_ms(),
        )
    }

    /// Spawn the periodic expiry sweep on the current tokio runtime.
    /// Returns false when it is already running or the interval is zero.
    pub fn start_cleanup_task(&self) -> bool {
        let mut task = self.cleanup_task.lock();
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return false;
        }
        let period = self.shared.config.cleanup_interval();
        if period.is_zero() {
            return false;
        }

        let weak: Weak<StoreShared<V>> = Arc::downgrade(&self.shared);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(shared) => {
                        shared.cleanup_expired();
                    }
                    None => break,
                }
            }
        }));

        self.shared.logger.info(&format!(
            "Expiry sweep started: every {}ms",
            period.as_millis()
        ));
        true
    }

    /// Cancel the sweep task. Returns false when none was running.
    pub fn stop_cleanup_task(&self) -> bool {
        match self.cleanup_task.lock().take() {
            Some(handle) => {
                handle.abort();
                self.shared.logger.info("Expiry sweep stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup_task
            .lock()
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }
}

impl<V> Drop for CacheStore<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup_task.lock().take() {
            handle.abort();
        }
    }
}
