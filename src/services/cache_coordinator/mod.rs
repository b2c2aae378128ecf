// Cache Coordinator Module - scoring, optimization, coordinated invalidation and
// monitoring across registered cache stores

pub mod adapter;
pub mod config;
pub mod coordinator;
pub mod invalidation;
pub mod monitoring;
pub mod optimizer;
pub mod report;

pub use adapter::{DefaultMetricsAdapter, ManagedCache, MetricsAdapter, StoreSnapshot};
pub use config::{AlertThresholds, MonitoringConfig, OptimizationTriggers};
pub use coordinator::{
    CacheCoordinator, RegisteredCache, WarmUpEntry, WarmUpResult, ALL_STORES,
    REPORT_HISTORY_LIMIT,
};
pub use invalidation::{InvalidationOptions, InvalidationResult, InvalidationRule};
pub use monitoring::{
    derive_alerts, AlertSeverity, CacheAlert, CacheDashboard, DashboardTrends, MonitoringCycle,
    SubsystemHealth, TrendPoint,
};
pub use optimizer::{
    plan_actions, AppliedOptimization, OptimizationAction, OptimizationKind, OptimizationQueue,
    OptimizationResult,
};
pub use report::{
    CachePerformanceReport, GlobalMetrics, Recommendation, ReportStage, ReportStatus,
    ScoreBreakdown,
};
