// Coordinated invalidation across registered stores

use super::coordinator::{CacheCoordinator, RegisteredCache, ALL_STORES};
use crate::utils::helpers::KeyPattern;
use crate::utils::{CacheEngineError, CacheEngineResult};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvalidationOptions {
    /// Also fire registered rules triggered by the invalidated patterns
    pub cascade: bool,
    /// Milliseconds to wait before invalidating
    pub delay: u64,
    pub reason: Option<String>,
    /// Store names; empty or `"all"` means every registered store
    pub affected_systems: Vec<String>,
}

impl Default for InvalidationOptions {
    fn default() -> Self {
        Self {
            cascade: false,
            delay: 0,
            reason: None,
            affected_systems: vec![ALL_STORES.to_string()],
        }
    }
}

impl InvalidationOptions {
    pub fn for_stores(stores: &[&str]) -> Self {
        Self {
            affected_systems: stores.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_cascade(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = delay_ms;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Named fan-out of one key pattern, fired by trigger names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationRule {
    pub name: String,
    pub pattern: String,
    /// Event names, or patterns whose invalidation should cascade into this rule
    pub triggers: Vec<String>,
    pub cascade: bool,
    /// Milliseconds
    pub delay: u64,
    pub affected_systems: Vec<String>,
}

impl InvalidationRule {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            triggers: Vec::new(),
            cascade: false,
            delay: 0,
            affected_systems: vec![ALL_STORES.to_string()],
        }
    }

    pub fn with_triggers(mut self, triggers: &[&str]) -> Self {
        self.triggers = triggers.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_cascade(mut self, cascade: bool) -> Self {
        self.cascade = cascade;
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay = delay_ms;
        self
    }

    pub fn with_affected_systems(mut self, stores: &[&str]) -> Self {
        self.affected_systems = stores.iter().map(|s| s.to_string()).collect();
        self
    }

    fn is_triggered_by(&self, trigger: &str) -> bool {
        self.triggers.iter().any(|t| t == trigger)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationResult {
    pub invalidated: usize,
    /// Keys removed per store; failed stores contribute 0
    pub per_store: BTreeMap<String, usize>,
    /// Stores whose invalidation failed or that are not registered
    pub failed_stores: Vec<String>,
    pub patterns: Vec<String>,
    pub fired_rules: Vec<String>,
    pub reason: Option<String>,
    pub duration_ms: u64,
}

impl InvalidationResult {
    fn add(&mut self, store: &str, count: usize) {
        *self.per_store.entry(store.to_string()).or_insert(0) += count;
        self.invalidated += count;
    }

    fn mark_failed(&mut self, store: &str) {
        if !self.failed_stores.iter().any(|s| s == store) {
            self.failed_stores.push(store.to_string());
        }
    }

    fn merge(&mut self, other: InvalidationResult) {
        for (store, count) in other.per_store {
            self.add(&store, count);
        }
        for store in other.failed_stores {
            self.mark_failed(&store);
        }
        self.patterns.extend(other.patterns);
        self.fired_rules.extend(other.fired_rules);
    }
}

impl CacheCoordinator {
    /// Invalidate `patterns` across the selected stores.
    ///
    /// Never fails: a store whose invalidation errors contributes 0 and is
    /// listed in `failed_stores`.
    pub async fn coordinated_invalidation(
        &self,
        patterns: &[&str],
        options: InvalidationOptions,
    ) -> InvalidationResult {
        self.invalidate_with(patterns, options, HashSet::new()).await
    }

    async fn invalidate_with(
        &self,
        patterns: &[&str],
        options: InvalidationOptions,
        mut fired: HashSet<String>,
    ) -> InvalidationResult {
        let started = Instant::now();
        if options.delay > 0 {
            tokio::time::sleep(Duration::from_millis(options.delay)).await;
        }

        let mut result = InvalidationResult {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            reason: options.reason.clone(),
            ..Default::default()
        };
        let targets = self.resolve_targets(&options.affected_systems, &mut result);
        self.fan_out(&result.patterns.clone(), &targets, &mut result)
            .await;

        if options.cascade {
            let mut frontier: VecDeque<String> = result.patterns.iter().cloned().collect();
            while let Some(trigger) = frontier.pop_front() {
                let rules: Vec<_> = self
                    .inner
                    .rules
                    .read()
                    .iter()
                    .filter(|rule| rule.is_triggered_by(&trigger) && !fired.contains(&rule.name))
                    .cloned()
                    .collect();

                for rule in rules {
                    fired.insert(rule.name.clone());
                    if rule.delay > 0 {
                        tokio::time::sleep(Duration::from_millis(rule.delay)).await;
                    }
                    let targets = self.resolve_targets(&rule.affected_systems, &mut result);
                    self.fan_out(&[rule.pattern.clone()], &targets, &mut result)
                        .await;
                    result.fired_rules.push(rule.name.clone());
                    if rule.cascade {
                        frontier.push_back(rule.pattern);
                    }
                }
            }
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        self.inner.logger.info_with_meta(
            "Coordinated invalidation finished",
            Some(&serde_json::json!({
                "patterns": result.patterns,
                "invalidated": result.invalidated,
                "failed": result.failed_stores,
                "rules": result.fired_rules,
                "reason": result.reason,
                "durationMs": result.duration_ms,
            })),
        );
        result
    }

    fn resolve_targets(
        &self,
        systems: &[String],
        result: &mut InvalidationResult,
    ) -> Vec<RegisteredCache> {
        if systems.is_empty() || systems.iter().any(|s| s == ALL_STORES) {
            return self.registered();
        }

        let mut targets = Vec::with_capacity(systems.len());
        for name in systems {
            match self.find(name) {
                Some(registered) => targets.push(registered),
                None => {
                    self.inner.logger.warn_with_meta(
                        "Invalidation addressed an unknown store",
                        Some(&serde_json::json!({ "store": name })),
                    );
                    result.mark_failed(name);
                }
            }
        }
        targets
    }

    async fn fan_out(
        &self,
        patterns: &[String],
        targets: &[RegisteredCache],
        result: &mut InvalidationResult,
    ) {
        let outcomes = join_all(targets.iter().map(|registered| async move {
            let mut removed = 0;
            let mut failures = Vec::new();
            for pattern in patterns {
                match registered.cache.invalidate_pattern(pattern).await {
                    Ok(count) => removed += count,
                    Err(e) => failures.push((pattern.as_str(), e)),
                }
            }
            (removed, failures)
        }))
        .await;

        for (registered, (removed, failures)) in targets.iter().zip(outcomes) {
            // Keys removed by patterns that succeeded stay counted
            result.add(&registered.name, removed);
            for (pattern, e) in &failures {
                self.inner.logger.warn_with_meta(
                    "Store invalidation failed",
                    Some(&serde_json::json!({
                        "store": registered.name,
                        "pattern": pattern,
                        "error": e.to_string(),
                    })),
                );
            }
            if !failures.is_empty() {
                result.mark_failed(&registered.name);
            }
        }
    }

    /// Register or replace a rule by name
    pub fn add_invalidation_rule(&self, rule: InvalidationRule) -> CacheEngineResult<()> {
        if rule.name.trim().is_empty() {
            return Err(CacheEngineError::config_error(
                "Invalidation rule name must not be empty",
            ));
        }
        KeyPattern::new(&rule.pattern)?;

        let mut rules = self.inner.rules.write();
        rules.retain(|existing| existing.name != rule.name);
        rules.push(rule);
        Ok(())
    }

    pub fn remove_invalidation_rule(&self, name: &str) -> bool {
        let mut rules = self.inner.rules.write();
        let before = rules.len();
        rules.retain(|rule| rule.name != name);
        before != rules.len()
    }

    pub fn invalidation_rules(&self) -> Vec<InvalidationRule> {
        self.inner.rules.read().clone()
    }

    /// Fire every rule whose triggers name `event`
    pub async fn trigger_event(&self, event: &str) -> InvalidationResult {
        let started = Instant::now();
        let rules: Vec<InvalidationRule> = self
            .inner
            .rules
            .read()
            .iter()
            .filter(|rule| rule.is_triggered_by(event))
            .cloned()
            .collect();

        let mut combined = InvalidationResult {
            reason: Some(format!("event:{}", event)),
            ..Default::default()
        };
        for rule in rules {
            let options = InvalidationOptions {
                cascade: rule.cascade,
                delay: rule.delay,
                reason: combined.reason.clone(),
                affected_systems: rule.affected_systems.clone(),
            };
            let mut fired = HashSet::new();
            fired.insert(rule.name.clone());

            let outcome = self
                .invalidate_with(&[rule.pattern.as_str()], options, fired)
                .await;
            combined.fired_rules.push(rule.name);
            combined.merge(outcome);
        }

        combined.duration_ms = started.elapsed().as_millis() as u64;
        combined
    }
}
