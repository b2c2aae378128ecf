// Optimization queue and the actions the coordinator can apply to a store

use super::config::OptimizationTriggers;
use super::coordinator::{CacheCoordinator, RegisteredCache, OPTIMIZATION_LOG_LIMIT};
use super::report::CachePerformanceReport;
use crate::utils::{CacheEngineError, CacheEngineResult};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Hot keys whose TTL is lengthened along with the store default
const EXTEND_TTL_HOT_KEYS: usize = 20;
const PROMOTION_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizationKind {
    /// Multiply the default TTL and lengthen the hottest live entries to match
    ExtendTtl { factor: f64 },
    /// Copy the hottest keys into a faster store
    PromoteHotKeys { to: String, limit: usize },
    /// Invoke the store's own tuning hook
    TuneStore,
}

impl OptimizationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OptimizationKind::ExtendTtl { .. } => "extend_ttl",
            OptimizationKind::PromoteHotKeys { .. } => "promote_hot_keys",
            OptimizationKind::TuneStore => "tune_store",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationAction {
    pub id: String,
    /// Store the action runs against
    pub target: String,
    pub kind: OptimizationKind,
    /// Higher runs first
    pub priority: u8,
    pub enqueued_at: u64,
}

impl OptimizationAction {
    pub fn new(target: &str, kind: OptimizationKind, priority: u8, enqueued_at: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            target: target.to_string(),
            kind,
            priority,
            enqueued_at,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Outcome of one executed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedOptimization {
    pub action_id: String,
    pub name: String,
    pub target: String,
    pub success: bool,
    pub detail: String,
    pub error: Option<String>,
    pub executed_at: u64,
    pub duration_ms: u64,
}

/// Pending actions. At most one action per (kind, target) is queued.
#[derive(Debug, Default)]
pub struct OptimizationQueue {
    pending: Vec<OptimizationAction>,
}

impl OptimizationQueue {
    /// Returns false when an equivalent action is already queued
    pub fn enqueue(&mut self, action: OptimizationAction) -> bool {
        let duplicate = self
            .pending
            .iter()
            .any(|queued| queued.target == action.target && queued.name() == action.name());
        if duplicate {
            return false;
        }
        self.pending.push(action);
        true
    }

    pub fn enqueue_all(&mut self, actions: impl IntoIterator<Item = OptimizationAction>) -> usize {
        let mut added = 0;
        for action in actions {
            if self.enqueue(action) {
                added += 1;
            }
        }
        added
    }

    /// Empty the queue, highest priority first, oldest first within a priority
    pub fn drain_by_priority(&mut self) -> Vec<OptimizationAction> {
        let mut drained = std::mem::take(&mut self.pending);
        drained.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.enqueued_at.cmp(&b.enqueued_at))
        });
        drained
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Actions for the stores that breach a trigger in `report`
pub fn plan_actions(
    report: &CachePerformanceReport,
    registry: &[RegisteredCache],
    triggers: &OptimizationTriggers,
    now_ms: u64,
) -> Vec<OptimizationAction> {
    let global = &report.global_metrics;
    let mut actions = Vec::new();
    if global.subsystem_count == 0 {
        return actions;
    }

    for (name, metrics) in report.healthy_subsystems() {
        let Some(registered) = registry.iter().find(|r| &r.name == name) else {
            continue;
        };

        if global.hit_rate < triggers.hit_rate_threshold
            && metrics.request_count > 0
            && metrics.hit_rate < triggers.hit_rate_threshold
        {
            actions.push(OptimizationAction::new(
                name,
                OptimizationKind::ExtendTtl { factor: 1.5 },
                80,
                now_ms,
            ));
        }

        if global.response_time > triggers.response_time_threshold
            && metrics.response_time > triggers.response_time_threshold
        {
            let faster = registry
                .iter()
                .filter(|r| r.tier.priority() > registered.tier.priority())
                .min_by_key(|r| r.tier.priority());
            match faster {
                Some(target) => actions.push(OptimizationAction::new(
                    name,
                    OptimizationKind::PromoteHotKeys {
                        to: target.name.clone(),
                        limit: PROMOTION_LIMIT,
                    },
                    70,
                    now_ms,
                )),
                None => actions.push(OptimizationAction::new(
                    name,
                    OptimizationKind::TuneStore,
                    60,
                    now_ms,
                )),
            }
        }

        if global.memory_usage > triggers.memory_threshold
            && metrics.memory_usage > triggers.memory_threshold
        {
            actions.push(OptimizationAction::new(
                name,
                OptimizationKind::TuneStore,
                65,
                now_ms,
            ));
        }
    }

    actions
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub before: CachePerformanceReport,
    pub after: CachePerformanceReport,
    pub applied: Vec<AppliedOptimization>,
    pub score_delta: f64,
}

impl CacheCoordinator {
    /// Snapshot, drain the queue, snapshot again.
    ///
    /// A failing action is recorded and skipped; the remaining actions and
    /// the second snapshot still run.
    pub async fn optimize_cache_strategy(&self) -> OptimizationResult {
        let before = self.validate_performance().await;
        let actions = self.inner.queue.lock().drain_by_priority();

        let mut applied = Vec::with_capacity(actions.len());
        for action in actions {
            let started = Instant::now();
            let outcome = self.execute_action(&action).await;
            let record = AppliedOptimization {
                action_id: action.id.clone(),
                name: action.name().to_string(),
                target: action.target.clone(),
                success: outcome.is_ok(),
                detail: outcome.as_ref().cloned().unwrap_or_default(),
                error: outcome.as_ref().err().map(|e| e.to_string()),
                executed_at: self.now_ms(),
                duration_ms: started.elapsed().as_millis() as u64,
            };

            match &outcome {
                Ok(detail) => self.inner.logger.info_with_meta(
                    "Optimization applied",
                    Some(&serde_json::json!({
                        "action": action.name(),
                        "store": action.target,
                        "detail": detail,
                    })),
                ),
                Err(e) => self.inner.logger.error_with_source(
                    "Optimization failed",
                    e,
                    Some(&serde_json::json!({
                        "action": action.name(),
                        "store": action.target,
                    })),
                ),
            }

            self.log_optimization(record.clone());
            applied.push(record);
        }

        let after = self.validate_performance().await;
        OptimizationResult {
            score_delta: after.overall_score - before.overall_score,
            before,
            after,
            applied,
        }
    }

    async fn execute_action(&self, action: &OptimizationAction) -> CacheEngineResult<String> {
        let target = self.find(&action.target).ok_or_else(|| {
            CacheEngineError::optimization_failure(format!(
                "Store '{}' is no longer registered",
                action.target
            ))
        })?;
        let cache = &target.cache;
        let wrap = |e: CacheEngineError| {
            CacheEngineError::optimization_failure(format!("{} failed: {}", action.name(), e))
                .with_subsystem(&action.target)
        };

        match &action.kind {
            OptimizationKind::ExtendTtl { factor } => {
                let current = cache.snapshot().await.map_err(wrap)?.default_ttl;
                let extended = ((current as f64) * factor).ceil() as u64;
                let extra = extended.saturating_sub(current);
                cache.set_default_ttl(extended).await.map_err(wrap)?;

                let mut touched = 0;
                for key in cache.hot_keys(EXTEND_TTL_HOT_KEYS).await.map_err(wrap)? {
                    if cache.extend_ttl(&key, extra).await.map_err(wrap)? {
                        touched += 1;
                    }
                }
                Ok(format!(
                    "defaultTTL {}s -> {}s, {} live keys extended",
                    current, extended, touched
                ))
            }
            OptimizationKind::PromoteHotKeys { to, limit } => {
                let destination = self.find(to).ok_or_else(|| {
                    CacheEngineError::optimization_failure(format!(
                        "Promotion target '{}' is not registered",
                        to
                    ))
                })?;

                let mut promoted = 0;
                for key in cache.hot_keys(*limit).await.map_err(wrap)? {
                    if let Some(value) = cache.get_json(&key).await.map_err(wrap)? {
                        if destination
                            .cache
                            .set_json(&key, value, None)
                            .await
                            .map_err(wrap)?
                        {
                            promoted += 1;
                        }
                    }
                }
                Ok(format!("{} hot keys promoted to '{}'", promoted, to))
            }
            OptimizationKind::TuneStore => {
                let outcome = cache.tune().await.map_err(wrap)?;
                Ok(format!(
                    "{} expired removed, {} evicted",
                    outcome.expired_removed, outcome.evicted
                ))
            }
        }
    }

    fn log_optimization(&self, record: AppliedOptimization) {
        let mut log = self.inner.optimization_log.lock();
        log.push_back(record);
        while log.len() > OPTIMIZATION_LOG_LIMIT {
            log.pop_front();
        }
    }

    /// The last `limit` executed actions, oldest first
    pub fn recent_optimizations(&self, limit: usize) -> Vec<AppliedOptimization> {
        let log = self.inner.optimization_log.lock();
        log.iter()
            .skip(log.len().saturating_sub(limit))
            .cloned()
            .collect()
    }

    pub fn queued_optimizations(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Queue an action by hand; returns false when an equivalent one is pending
    pub fn enqueue_optimization(&self, action: OptimizationAction) -> bool {
        self.inner.queue.lock().enqueue(action)
    }
}
