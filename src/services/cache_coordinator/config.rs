//! Coordinator monitoring configuration
//!
//! Wire names are camelCase. Omitted fields take the defaults below and
//! unknown fields are ignored.

use crate::utils::{CacheEngineError, CacheEngineResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits compared against the latest report to raise dashboard alerts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlertThresholds {
    /// Percent
    pub hit_rate_min: f64,
    /// Milliseconds
    pub response_time_max: f64,
    /// MB
    pub memory_usage_max: f64,
    /// Errors per 100 requests
    pub error_rate_max: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            hit_rate_min: 80.0,
            response_time_max: 100.0,
            memory_usage_max: 100.0,
            error_rate_max: 5.0,
        }
    }
}

/// Global-metric levels that queue optimization actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizationTriggers {
    /// Queue TTL extension when the global hit rate is below this percent
    pub hit_rate_threshold: f64,
    /// Queue hot-key promotion when the global response time is above this (ms)
    pub response_time_threshold: f64,
    /// Queue store tuning when global memory is above this (MB)
    pub memory_threshold: f64,
    /// The monitoring loop optimizes automatically below this overall score
    pub overall_score_threshold: f64,
}

impl Default for OptimizationTriggers {
    fn default() -> Self {
        Self {
            hit_rate_threshold: 70.0,
            response_time_threshold: 200.0,
            memory_threshold: 80.0,
            overall_score_threshold: 75.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitoringConfig {
    pub enabled: bool,
    /// Monitoring loop period in milliseconds
    pub reporting_interval: u64,
    pub alert_thresholds: AlertThresholds,
    pub optimization_triggers: OptimizationTriggers,
    /// Minimum milliseconds between two automatic optimization runs
    pub validation_frequency: u64,
    /// MB of total memory that maps to a memory score of 0
    pub memory_budget: f64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reporting_interval: 60_000,
            alert_thresholds: AlertThresholds::default(),
            optimization_triggers: OptimizationTriggers::default(),
            validation_frequency: 300_000,
            memory_budget: 100.0,
        }
    }
}

impl MonitoringConfig {
    pub fn from_json(options: &serde_json::Value) -> CacheEngineResult<Self> {
        serde_json::from_value(options.clone()).map_err(|e| {
            crate::log_warn!(
                "Rejected monitoring options",
                serde_json::json!({ "error": e.to_string() })
            );
            CacheEngineError::config_error(format!("Invalid monitoring options: {}", e))
        })
    }

    pub fn reporting_interval(&self) -> Duration {
        Duration::from_millis(self.reporting_interval)
    }

    pub fn with_reporting_interval(mut self, interval_ms: u64) -> Self {
        self.reporting_interval = interval_ms;
        self
    }

    pub fn with_validation_frequency(mut self, frequency_ms: u64) -> Self {
        self.validation_frequency = frequency_ms;
        self
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.enabled && self.reporting_interval == 0 {
            issues.push("reportingInterval is 0; the monitoring loop cannot run".to_string());
        }
        if self.memory_budget <= 0.0 {
            issues.push("memoryBudget must be positive".to_string());
        }
        if !(0.0..=100.0).contains(&self.alert_thresholds.hit_rate_min) {
            issues.push("alertThresholds.hitRateMin must be within 0..=100".to_string());
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitoringConfig::default();
        assert!(config.enabled);
        assert_eq!(config.reporting_interval, 60_000);
        assert_eq!(config.alert_thresholds.hit_rate_min, 80.0);
        assert_eq!(config.alert_thresholds.error_rate_max, 5.0);
        assert_eq!(config.optimization_triggers.hit_rate_threshold, 70.0);
        assert_eq!(config.optimization_triggers.overall_score_threshold, 75.0);
        assert_eq!(config.validation_frequency, 300_000);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_from_json_nested_partial() {
        let config = MonitoringConfig::from_json(&serde_json::json!({
            "reportingInterval": 5000,
            "alertThresholds": { "hitRateMin": 60 },
            "unknown": [1, 2, 3]
        }))
        .unwrap();
        assert_eq!(config.reporting_interval, 5_000);
        assert_eq!(config.alert_thresholds.hit_rate_min, 60.0);
        assert_eq!(config.alert_thresholds.response_time_max, 100.0);
        assert_eq!(config.optimization_triggers.memory_threshold, 80.0);
    }
}
