// Monitoring loop, threshold alerts and the read-only dashboard

use super::config::AlertThresholds;
use super::coordinator::{CacheCoordinator, ALERT_HISTORY_LIMIT, RECENT_OPTIMIZATIONS_IN_REPORT};
use super::optimizer::AppliedOptimization;
use super::report::CachePerformanceReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Number of archived reports behind each trend series
pub const TREND_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheAlert {
    pub id: String,
    pub report_id: String,
    pub severity: AlertSeverity,
    pub metric: String,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub subsystem: Option<String>,
    pub raised_at: u64,
}

impl CacheAlert {
    fn new(
        report: &CachePerformanceReport,
        severity: AlertSeverity,
        metric: &str,
        value: f64,
        threshold: f64,
        message: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            report_id: report.id.clone(),
            severity,
            metric: metric.to_string(),
            message,
            value,
            threshold,
            subsystem: None,
            raised_at: report.timestamp,
        }
    }

    fn for_subsystem(mut self, subsystem: &str) -> Self {
        self.subsystem = Some(subsystem.to_string());
        self
    }
}

/// Compare a report against the alert thresholds. Pure.
pub fn derive_alerts(
    report: &CachePerformanceReport,
    thresholds: &AlertThresholds,
) -> Vec<CacheAlert> {
    let mut alerts = Vec::new();

    for (name, reason) in &report.failed_subsystems {
        alerts.push(
            CacheAlert::new(
                report,
                AlertSeverity::Critical,
                "availability",
                0.0,
                0.0,
                format!("Store '{}' unavailable: {}", name, reason),
            )
            .for_subsystem(name),
        );
    }

    let global = &report.global_metrics;
    if global.subsystem_count == 0 {
        return alerts;
    }

    if global.hit_rate < thresholds.hit_rate_min {
        let severity = if global.hit_rate < thresholds.hit_rate_min / 2.0 {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        alerts.push(CacheAlert::new(
            report,
            severity,
            "hit_rate",
            global.hit_rate,
            thresholds.hit_rate_min,
            format!(
                "Hit rate {:.1}% below {:.1}%",
                global.hit_rate, thresholds.hit_rate_min
            ),
        ));
    }

    if global.response_time > thresholds.response_time_max {
        let severity = if global.response_time > thresholds.response_time_max * 2.0 {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Warning
        };
        alerts.push(CacheAlert::new(
            report,
            severity,
            "response_time",
            global.response_time,
            thresholds.response_time_max,
            format!(
                "Response time {:.1} ms above {:.1} ms",
                global.response_time, thresholds.response_time_max
            ),
        ));
    }

    if global.memory_usage > thresholds.memory_usage_max {
        alerts.push(CacheAlert::new(
            report,
            AlertSeverity::Warning,
            "memory_usage",
            global.memory_usage,
            thresholds.memory_usage_max,
            format!(
                "Memory usage {:.1} MB above {:.1} MB",
                global.memory_usage, thresholds.memory_usage_max
            ),
        ));
    }

    if global.error_rate > thresholds.error_rate_max {
        alerts.push(CacheAlert::new(
            report,
            AlertSeverity::Critical,
            "error_rate",
            global.error_rate,
            thresholds.error_rate_max,
            format!(
                "Error rate {:.1}% above {:.1}%",
                global.error_rate, thresholds.error_rate_max
            ),
        ));
    }

    alerts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubsystemHealth {
    Healthy,
    Degraded,
    Critical,
    Unavailable,
}

impl SubsystemHealth {
    pub fn from_efficiency(efficiency: f64) -> Self {
        if efficiency >= 80.0 {
            SubsystemHealth::Healthy
        } else if efficiency >= 60.0 {
            SubsystemHealth::Degraded
        } else {
            SubsystemHealth::Critical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub timestamp: u64,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardTrends {
    pub hit_rate: Vec<TrendPoint>,
    pub response_time: Vec<TrendPoint>,
    pub memory_usage: Vec<TrendPoint>,
}

impl DashboardTrends {
    fn from_reports<'a>(reports: impl IntoIterator<Item = &'a CachePerformanceReport>) -> Self {
        let mut trends = Self::default();
        for report in reports {
            let point = |value: f64| TrendPoint {
                timestamp: report.timestamp,
                value,
            };
            trends.hit_rate.push(point(report.global_metrics.hit_rate));
            trends
                .response_time
                .push(point(report.global_metrics.response_time));
            trends
                .memory_usage
                .push(point(report.global_metrics.memory_usage));
        }
        trends
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDashboard {
    pub generated_at: u64,
    pub latest_report: Option<CachePerformanceReport>,
    pub trends: DashboardTrends,
    /// Alerts raised by the latest report
    pub alerts: Vec<CacheAlert>,
    pub subsystem_health: BTreeMap<String, SubsystemHealth>,
    pub queued_optimizations: usize,
    pub recent_optimizations: Vec<AppliedOptimization>,
    pub monitoring_active: bool,
}

/// What one pass of the monitoring loop did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringCycle {
    pub report_id: String,
    pub overall_score: f64,
    pub optimized: bool,
}

impl CacheCoordinator {
    pub(super) fn raise_alerts(&self, report: &CachePerformanceReport) -> usize {
        let alerts = derive_alerts(report, &self.inner.config.alert_thresholds);
        for alert in &alerts {
            self.inner.logger.warn_with_meta(
                &alert.message,
                Some(&serde_json::json!({
                    "alertId": alert.id,
                    "severity": alert.severity.as_str(),
                    "metric": alert.metric,
                    "store": alert.subsystem,
                })),
            );
        }

        let raised = alerts.len();
        let mut history = self.inner.alerts.lock();
        history.extend(alerts);
        while history.len() > ALERT_HISTORY_LIMIT {
            history.pop_front();
        }
        raised
    }

    /// Alert history, oldest first
    pub fn alert_history(&self) -> Vec<CacheAlert> {
        self.inner.alerts.lock().iter().cloned().collect()
    }

    /// Read-only composite view; does not produce a new report
    pub fn get_cache_monitoring_dashboard(&self) -> CacheDashboard {
        let (latest, trends) = {
            let history = self.inner.history.lock();
            let skip = history.len().saturating_sub(TREND_WINDOW);
            (
                history.back().cloned(),
                DashboardTrends::from_reports(history.iter().skip(skip)),
            )
        };

        let alerts = match &latest {
            Some(report) => self
                .inner
                .alerts
                .lock()
                .iter()
                .filter(|alert| alert.report_id == report.id)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        let subsystem_health = latest
            .as_ref()
            .map(|report| {
                report
                    .subsystems
                    .iter()
                    .map(|(name, metrics)| {
                        let health = if report.failed_subsystems.contains_key(name) {
                            SubsystemHealth::Unavailable
                        } else {
                            SubsystemHealth::from_efficiency(metrics.efficiency)
                        };
                        (name.clone(), health)
                    })
                    .collect()
            })
            .unwrap_or_default();

        CacheDashboard {
            generated_at: self.now_ms(),
            latest_report: latest,
            trends,
            alerts,
            subsystem_health,
            queued_optimizations: self.queued_optimizations(),
            recent_optimizations: self.recent_optimizations(RECENT_OPTIMIZATIONS_IN_REPORT),
            monitoring_active: self.is_monitoring(),
        }
    }

    /// One pass of the monitoring loop: validate, then optimize when at least
    /// one store reported, the score is below the trigger and the cooldown
    /// has elapsed.
    pub async fn run_monitoring_cycle(&self) -> MonitoringCycle {
        let report = self.validate_performance().await;
        let triggers = &self.inner.config.optimization_triggers;

        let now = self.now_ms();
        let cooled_down = self
            .inner
            .last_auto_optimization
            .lock()
            .map(|last| now.saturating_sub(last) >= self.inner.config.validation_frequency)
            .unwrap_or(true);

        let optimized = report.global_metrics.subsystem_count > 0
            && report.overall_score < triggers.overall_score_threshold
            && cooled_down;
        if optimized {
            *self.inner.last_auto_optimization.lock() = Some(now);
            self.inner.logger.info_with_meta(
                "Score below trigger, optimizing",
                Some(&serde_json::json!({
                    "score": report.overall_score,
                    "threshold": triggers.overall_score_threshold,
                })),
            );
            self.optimize_cache_strategy().await;
        }

        MonitoringCycle {
            report_id: report.id,
            overall_score: report.overall_score,
            optimized,
        }
    }

    /// Spawn the monitoring loop on the current tokio runtime. Returns false
    /// when monitoring is disabled, already running or the interval is zero.
    pub fn start_monitoring(&self) -> bool {
        let config = &self.inner.config;
        if !config.enabled || config.reporting_interval == 0 {
            return false;
        }

        let mut task = self.inner.monitor_task.lock();
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return false;
        }

        let period = config.reporting_interval();
        let weak = Arc::downgrade(&self.inner);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                CacheCoordinator { inner }.run_monitoring_cycle().await;
            }
        }));

        self.inner.logger.info(&format!(
            "Monitoring started: every {}ms",
            period.as_millis()
        ));
        true
    }

    pub fn stop_monitoring(&self) -> bool {
        match self.inner.monitor_task.lock().take() {
            Some(handle) => {
                handle.abort();
                self.inner.logger.info("Monitoring stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.inner
            .monitor_task
            .lock()
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }
}
