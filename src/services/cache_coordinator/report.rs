//! Performance reports
//!
//! A report moves through [`ReportStage`] once: per-store metrics are
//! collected while `Pending`, the weighted score is computed (`Scored`),
//! recommendations are attached (`Recommended`) and the report is pushed into
//! the bounded history (`Archived`). Archived reports are never modified.

use super::config::AlertThresholds;
use super::optimizer::AppliedOptimization;
use crate::types::SystemMetrics;
use crate::utils::helpers::{clamp_score, mean, percentage, round_to_decimal_places};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const HIT_RATE_WEIGHT: f64 = 0.30;
pub const RESPONSE_TIME_WEIGHT: f64 = 0.25;
pub const MEMORY_WEIGHT: f64 = 0.20;
pub const CONSISTENCY_WEIGHT: f64 = 0.15;
pub const INVALIDATION_WEIGHT: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl ReportStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            ReportStatus::Excellent
        } else if score >= 75.0 {
            ReportStatus::Good
        } else if score >= 60.0 {
            ReportStatus::Warning
        } else {
            ReportStatus::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Excellent => "excellent",
            ReportStatus::Good => "good",
            ReportStatus::Warning => "warning",
            ReportStatus::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStage {
    Pending,
    Scored,
    Recommended,
    Archived,
}

/// Aggregate over the stores that reported successfully
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMetrics {
    /// Mean of per-store hit rates
    pub hit_rate: f64,
    pub miss_rate: f64,
    /// Mean of per-store response times, ms
    pub response_time: f64,
    /// Mean of per-store memory, MB
    pub memory_usage: f64,
    pub entry_count: u64,
    pub request_count: u64,
    pub invalidation_count: u64,
    pub error_count: u64,
    /// Errors per 100 requests
    pub error_rate: f64,
    /// Lowest per-store efficiency
    pub consistency: f64,
    pub efficiency: f64,
    pub subsystem_count: usize,
}

impl GlobalMetrics {
    pub fn aggregate<'a>(metrics: impl IntoIterator<Item = &'a SystemMetrics>) -> Self {
        let metrics: Vec<&SystemMetrics> = metrics.into_iter().collect();
        if metrics.is_empty() {
            return Self::default();
        }

        let collect = |f: fn(&SystemMetrics) -> f64| -> Vec<f64> {
            metrics.iter().map(|m| f(m)).collect()
        };
        let hit_rate = mean(&collect(|m| m.hit_rate));
        let request_count = metrics.iter().map(|m| m.request_count).sum();
        let error_count = metrics.iter().map(|m| m.error_count).sum();

        Self {
            hit_rate,
            miss_rate: mean(&collect(|m| m.miss_rate)),
            response_time: mean(&collect(|m| m.response_time)),
            memory_usage: mean(&collect(|m| m.memory_usage)),
            entry_count: metrics.iter().map(|m| m.entry_count).sum(),
            request_count,
            invalidation_count: metrics.iter().map(|m| m.invalidation_count).sum(),
            error_count,
            error_rate: percentage(error_count, request_count),
            consistency: metrics
                .iter()
                .map(|m| m.efficiency)
                .fold(f64::INFINITY, f64::min),
            efficiency: hit_rate,
            subsystem_count: metrics.len(),
        }
    }
}

/// Per-term scores, each within 0..=100
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub hit_rate: f64,
    pub response_time: f64,
    pub memory: f64,
    pub consistency: f64,
    pub invalidation: f64,
}

impl ScoreBreakdown {
    pub fn from_global(global: &GlobalMetrics, memory_budget_mb: f64) -> Self {
        let memory = if memory_budget_mb > 0.0 {
            100.0 - global.memory_usage / memory_budget_mb * 100.0
        } else {
            100.0
        };
        let churn = percentage(
            global.invalidation_count,
            global.invalidation_count + global.entry_count,
        );

        Self {
            hit_rate: clamp_score(global.hit_rate),
            response_time: clamp_score(100.0 - global.response_time / 10.0),
            memory: clamp_score(memory),
            consistency: clamp_score(global.consistency),
            invalidation: clamp_score(100.0 - churn),
        }
    }

    pub fn overall(&self) -> f64 {
        clamp_score(
            HIT_RATE_WEIGHT * self.hit_rate
                + RESPONSE_TIME_WEIGHT * self.response_time
                + MEMORY_WEIGHT * self.memory
                + CONSISTENCY_WEIGHT * self.consistency
                + INVALIDATION_WEIGHT * self.invalidation,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Higher first
    pub priority: u8,
    pub category: String,
    pub message: String,
    pub subsystem: Option<String>,
}

impl Recommendation {
    fn new(priority: u8, category: &str, message: String, subsystem: Option<&str>) -> Self {
        Self {
            priority,
            category: category.to_string(),
            message,
            subsystem: subsystem.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePerformanceReport {
    pub id: String,
    pub timestamp: u64,
    pub stage: ReportStage,
    pub overall_score: f64,
    pub status: ReportStatus,
    /// Keyed by store name; failed stores are present with zeroed metrics
    pub subsystems: BTreeMap<String, SystemMetrics>,
    /// Store name -> failure message
    pub failed_subsystems: BTreeMap<String, String>,
    pub global_metrics: GlobalMetrics,
    pub scores: ScoreBreakdown,
    pub recommendations: Vec<Recommendation>,
    pub recent_optimizations: Vec<AppliedOptimization>,
}

impl CachePerformanceReport {
    pub fn pending(timestamp: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            stage: ReportStage::Pending,
            overall_score: 0.0,
            status: ReportStatus::Critical,
            subsystems: BTreeMap::new(),
            failed_subsystems: BTreeMap::new(),
            global_metrics: GlobalMetrics::default(),
            scores: ScoreBreakdown::default(),
            recommendations: Vec::new(),
            recent_optimizations: Vec::new(),
        }
    }

    pub fn record_subsystem(&mut self, name: &str, metrics: SystemMetrics) {
        if self.stage == ReportStage::Pending {
            self.subsystems.insert(name.to_string(), metrics);
        }
    }

    /// Zeroed metrics, excluded from the global aggregate
    pub fn record_failure(&mut self, name: &str, reason: String) {
        if self.stage == ReportStage::Pending {
            self.subsystems
                .insert(name.to_string(), SystemMetrics::zeroed());
            self.failed_subsystems.insert(name.to_string(), reason);
        }
    }

    pub fn healthy_subsystems(&self) -> impl Iterator<Item = (&String, &SystemMetrics)> {
        self.subsystems
            .iter()
            .filter(|(name, _)| !self.failed_subsystems.contains_key(*name))
    }

    pub fn score(&mut self, memory_budget_mb: f64) {
        if self.stage != ReportStage::Pending {
            return;
        }
        self.global_metrics = GlobalMetrics::aggregate(self.healthy_subsystems().map(|(_, m)| m));
        self.scores = ScoreBreakdown::from_global(&self.global_metrics, memory_budget_mb);
        self.overall_score = round_to_decimal_places(self.scores.overall(), 2);
        self.status = ReportStatus::from_score(self.overall_score);
        self.stage = ReportStage::Scored;
    }

    pub fn recommend(&mut self, thresholds: &AlertThresholds) {
        if self.stage != ReportStage::Scored {
            return;
        }
        self.recommendations = build_recommendations(self, thresholds);
        self.stage = ReportStage::Recommended;
    }

    pub fn archive(&mut self, recent_optimizations: Vec<AppliedOptimization>) {
        if self.stage != ReportStage::Recommended {
            return;
        }
        self.recent_optimizations = recent_optimizations;
        self.stage = ReportStage::Archived;
    }
}

fn build_recommendations(
    report: &CachePerformanceReport,
    thresholds: &AlertThresholds,
) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    let global = &report.global_metrics;

    for (name, reason) in &report.failed_subsystems {
        recs.push(Recommendation::new(
            95,
            "availability",
            format!("Store '{}' was unavailable during collection: {}", name, reason),
            Some(name),
        ));
    }

    if global.subsystem_count > 0 {
        if global.hit_rate < thresholds.hit_rate_min {
            recs.push(Recommendation::new(
                90,
                "hit_rate",
                format!(
                    "Low hit rate: {:.1}% is below the {:.1}% target; extend TTLs or warm hot keys",
                    global.hit_rate, thresholds.hit_rate_min
                ),
                None,
            ));
        }
        if global.error_rate > thresholds.error_rate_max {
            recs.push(Recommendation::new(
                85,
                "errors",
                format!(
                    "High error rate: {:.1}% of requests hit an internal fault",
                    global.error_rate
                ),
                None,
            ));
        }
        if global.response_time > thresholds.response_time_max {
            recs.push(Recommendation::new(
                80,
                "response_time",
                format!(
                    "High response time: {:.1} ms average exceeds {:.1} ms; promote hot keys to a faster tier",
                    global.response_time, thresholds.response_time_max
                ),
                None,
            ));
        }
        if global.memory_usage > thresholds.memory_usage_max {
            recs.push(Recommendation::new(
                70,
                "memory",
                format!(
                    "High memory usage: {:.1} MB exceeds {:.1} MB; lower maxSize or enable compression",
                    global.memory_usage, thresholds.memory_usage_max
                ),
                None,
            ));
        }

        let efficiencies: Vec<f64> = report
            .healthy_subsystems()
            .map(|(_, m)| m.efficiency)
            .collect();
        let spread = efficiencies.iter().cloned().fold(f64::MIN, f64::max)
            - efficiencies.iter().cloned().fold(f64::MAX, f64::min);
        if efficiencies.len() > 1 && spread > 30.0 {
            recs.push(Recommendation::new(
                50,
                "consistency",
                format!(
                    "Inconsistent efficiency across stores ({:.1} point spread)",
                    spread
                ),
                None,
            ));
        }
    }

    for (name, metrics) in report.healthy_subsystems() {
        if metrics.request_count > 0 && metrics.hit_rate < thresholds.hit_rate_min {
            recs.push(Recommendation::new(
                60,
                "hit_rate",
                format!("Store '{}' hit rate is {:.1}%", name, metrics.hit_rate),
                Some(name),
            ));
        }
        if metrics.response_time > thresholds.response_time_max {
            recs.push(Recommendation::new(
                55,
                "response_time",
                format!(
                    "Store '{}' averages {:.1} ms per read",
                    name, metrics.response_time
                ),
                Some(name),
            ));
        }
    }

    recs.sort_by(|a, b| b.priority.cmp(&a.priority));
    recs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(hit_rate: f64, response_time: f64, memory_usage: f64) -> SystemMetrics {
        SystemMetrics {
            hit_rate,
            miss_rate: 100.0 - hit_rate,
            response_time,
            memory_usage,
            request_count: 100,
            efficiency: hit_rate,
            ..Default::default()
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total = HIT_RATE_WEIGHT
            + RESPONSE_TIME_WEIGHT
            + MEMORY_WEIGHT
            + CONSISTENCY_WEIGHT
            + INVALIDATION_WEIGHT;
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_status_cutoffs() {
        assert_eq!(ReportStatus::from_score(90.0), ReportStatus::Excellent);
        assert_eq!(ReportStatus::from_score(89.99), ReportStatus::Good);
        assert_eq!(ReportStatus::from_score(75.0), ReportStatus::Good);
        assert_eq!(ReportStatus::from_score(60.0), ReportStatus::Warning);
        assert_eq!(ReportStatus::from_score(59.9), ReportStatus::Critical);
    }

    #[test]
    fn test_aggregate_means_and_consistency() {
        let metrics = [store(90.0, 50.0, 30.0), store(40.0, 800.0, 60.0), store(95.0, 40.0, 30.0)];
        let global = GlobalMetrics::aggregate(metrics.iter());
        assert!((global.hit_rate - 75.0).abs() < 1e-9);
        assert!((global.response_time - 296.666).abs() < 0.01);
        assert_eq!(global.memory_usage, 40.0);
        assert_eq!(global.consistency, 40.0);
        assert_eq!(global.request_count, 300);
    }

    #[test]
    fn test_response_time_score_floors_at_zero() {
        let global = GlobalMetrics {
            response_time: 5_000.0,
            ..Default::default()
        };
        let scores = ScoreBreakdown::from_global(&global, 100.0);
        assert_eq!(scores.response_time, 0.0);
        assert_eq!(scores.memory, 100.0);
        assert_eq!(scores.invalidation, 100.0);
    }

    #[test]
    fn test_lifecycle_only_moves_forward() {
        let mut report = CachePerformanceReport::pending(1);
        report.record_subsystem("a", store(90.0, 50.0, 30.0));
        report.score(100.0);
        assert_eq!(report.stage, ReportStage::Scored);

        report.record_subsystem("late", store(10.0, 10.0, 10.0));
        assert!(!report.subsystems.contains_key("late"));

        report.archive(Vec::new());
        assert_eq!(report.stage, ReportStage::Scored);

        report.recommend(&AlertThresholds::default());
        report.archive(Vec::new());
        assert_eq!(report.stage, ReportStage::Archived);
    }

    #[test]
    fn test_failed_subsystem_excluded_and_recommended() {
        let mut report = CachePerformanceReport::pending(1);
        report.record_subsystem("a", store(95.0, 5.0, 1.0));
        report.record_failure("b", "snapshot failed".to_string());
        report.score(100.0);
        report.recommend(&AlertThresholds::default());

        assert_eq!(report.global_metrics.subsystem_count, 1);
        assert_eq!(report.global_metrics.hit_rate, 95.0);
        assert!(report.subsystems["b"].is_zeroed());
        assert_eq!(report.recommendations[0].category, "availability");
    }

    #[test]
    fn test_recommendations_ranked_by_priority() {
        let mut report = CachePerformanceReport::pending(1);
        report.record_subsystem("slow", store(40.0, 800.0, 10.0));
        report.score(100.0);
        report.recommend(&AlertThresholds::default());

        let priorities: Vec<u8> = report.recommendations.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
        assert!(report.recommendations[0].message.starts_with("Low hit rate"));
    }
}
