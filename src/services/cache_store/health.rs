use super::compression::NOOP_CODEC;
use super::config::HealthThresholds;
use super::metrics::{CacheMetrics, CacheStats};
use crate::types::HealthStatus;
use crate::utils::helpers::{bytes_to_mb, round_to_decimal_places};
use serde::{Deserialize, Serialize};

/// Health verdict for a single store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHealthReport {
    pub store: String,
    pub status: HealthStatus,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub hit_rate: f64,
    pub memory_usage: u64,
    pub eviction_rate: f64,
    pub compression_ratio: f64,
    pub checked_at: u64,
}

/// Evaluate the health thresholds against current metrics. Pure.
///
/// `codec` is the name of the store's compression codec; the ratio floor is
/// not applied to the identity codec.
pub fn evaluate_health(
    store: &str,
    codec: &str,
    metrics: &CacheMetrics,
    stats: &CacheStats,
    thresholds: &HealthThresholds,
    checked_at: u64,
) -> CacheHealthReport {
    let mut status = HealthStatus::Healthy;
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if metrics.requests() > 0 && metrics.hit_rate < thresholds.min_hit_rate {
        let severity = if metrics.hit_rate < thresholds.min_hit_rate / 2.0 {
            HealthStatus::Critical
        } else {
            HealthStatus::Warning
        };
        status = status.worst(severity);
        issues.push(format!(
            "Low hit rate: {:.1}% (floor {:.1}%)",
            metrics.hit_rate, thresholds.min_hit_rate
        ));
        recommendations
            .push("Increase defaultTTL or warm frequently read keys at startup".to_string());
    }

    let memory_ceiling = thresholds.max_memory_bytes;
    if stats.memory_usage > memory_ceiling {
        status = status.worst(HealthStatus::Critical);
        issues.push(format!(
            "Memory usage {:.2} MB exceeds ceiling {:.2} MB",
            bytes_to_mb(stats.memory_usage),
            bytes_to_mb(memory_ceiling)
        ));
        recommendations.push("Lower maxSize or enable compression".to_string());
    } else if memory_ceiling > 0 && stats.memory_usage as f64 > memory_ceiling as f64 * 0.8 {
        status = status.worst(HealthStatus::Warning);
        issues.push(format!(
            "Memory usage {:.2} MB is above 80% of ceiling",
            bytes_to_mb(stats.memory_usage)
        ));
        recommendations.push("Review maxSize before the memory ceiling is hit".to_string());
    }

    if stats.eviction_rate > thresholds.max_eviction_rate {
        let severity = if stats.eviction_rate > thresholds.max_eviction_rate * 2.0 {
            HealthStatus::Critical
        } else {
            HealthStatus::Warning
        };
        status = status.worst(severity);
        issues.push(format!(
            "Eviction rate {:.1}% exceeds {:.1}%",
            stats.eviction_rate, thresholds.max_eviction_rate
        ));
        recommendations.push("Increase maxSize; the working set does not fit".to_string());
    }

    if codec != NOOP_CODEC
        && metrics.compressions > 0
        && stats.compression_ratio < thresholds.min_compression_ratio
    {
        status = status.worst(HealthStatus::Warning);
        issues.push(format!(
            "Compression ratio {:.2} is below {:.2}",
            stats.compression_ratio, thresholds.min_compression_ratio
        ));
        recommendations
            .push("Raise compressionThreshold or switch to a stronger codec".to_string());
    }

    CacheHealthReport {
        store: store.to_string(),
        status,
        issues,
        recommendations,
        hit_rate: round_to_decimal_places(metrics.hit_rate, 2),
        memory_usage: stats.memory_usage,
        eviction_rate: round_to_decimal_places(stats.eviction_rate, 2),
        compression_ratio: round_to_decimal_places(stats.compression_ratio, 2),
        checked_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(hits: u64, misses: u64) -> CacheMetrics {
        let mut m = CacheMetrics {
            hits,
            misses,
            ..Default::default()
        };
        m.recompute_rates();
        m
    }

    #[test]
    fn test_fresh_store_is_healthy() {
        let report = evaluate_health(
            "dashboards",
            "gzip",
            &CacheMetrics::default(),
            &CacheStats::default(),
            &HealthThresholds::default(),
            0,
        );
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_low_hit_rate_is_warning_then_critical() {
        let thresholds = HealthThresholds::default();
        let stats = CacheStats::default();
        let warning = evaluate_health("s", "gzip", &metrics(6, 4), &stats, &thresholds, 0);
        assert_eq!(warning.status, HealthStatus::Warning);

        let critical = evaluate_health("s", "gzip", &metrics(1, 9), &stats, &thresholds, 0);
        assert_eq!(critical.status, HealthStatus::Critical);
        assert_eq!(critical.recommendations.len(), 1);
    }

    #[test]
    fn test_memory_and_eviction_issues_accumulate() {
        let thresholds = HealthThresholds {
            max_memory_bytes: 1_000,
            ..Default::default()
        };
        let stats = CacheStats {
            memory_usage: 1_500,
            eviction_rate: 12.0,
            ..Default::default()
        };
        let report = evaluate_health("s", "gzip", &CacheMetrics::default(), &stats, &thresholds, 0);
        assert_eq!(report.status, HealthStatus::Critical);
        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn test_compression_ratio_only_checked_after_compressing() {
        let stats = CacheStats {
            compression_ratio: 1.0,
            ..Default::default()
        };
        let untouched = evaluate_health(
            "s",
            "gzip",
            &CacheMetrics::default(),
            &stats,
            &HealthThresholds::default(),
            0,
        );
        assert_eq!(untouched.status, HealthStatus::Healthy);

        let compressed = CacheMetrics {
            compressions: 3,
            ..Default::default()
        };
        let report = evaluate_health(
            "s",
            "gzip",
            &compressed,
            &stats,
            &HealthThresholds::default(),
            0,
        );
        assert_eq!(report.status, HealthStatus::Warning);

        let identity = evaluate_health(
            "s",
            NOOP_CODEC,
            &compressed,
            &stats,
            &HealthThresholds::default(),
            0,
        );
        assert_eq!(identity.status, HealthStatus::Healthy);
        assert!(identity.issues.is_empty());
    }
}
