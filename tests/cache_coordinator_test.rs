// Integration tests for the coordinator across several stores

mod common;

use cache_plane::services::cache_coordinator::{
    CacheCoordinator, InvalidationOptions, InvalidationRule, MonitoringConfig, ReportStage,
    SubsystemHealth, WarmUpEntry,
};
use cache_plane::services::cache_store::{CacheConfig, CacheStore};
use cache_plane::{CacheTier, ErrorKind};
use common::{BrokenMetricsAdapter, FailingStore, FixedMetricsAdapter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn json_store(name: &str) -> Arc<CacheStore<serde_json::Value>> {
    Arc::new(CacheStore::new(name, CacheConfig::default()))
}

#[tokio::test]
async fn test_report_survives_failing_adapter() {
    let coordinator = CacheCoordinator::new(MonitoringConfig::default());
    let dashboards = json_store("dashboards");
    dashboards.set("d1", serde_json::json!({"widgets": 3}), None, None);
    dashboards.get("d1");
    assert_ok!(coordinator.register("dashboards", CacheTier::Hot, dashboards.clone()));
    assert_ok!(coordinator.register(
        "analytics",
        CacheTier::Cold,
        Arc::new(FailingStore::failing_everything())
    ));

    let report = coordinator.validate_performance().await;
    assert_eq!(report.stage, ReportStage::Archived);
    assert_eq!(report.subsystems.len(), 2);
    assert_eq!(report.subsystems["dashboards"].hit_rate, 100.0);
    assert!(report.subsystems["analytics"].is_zeroed());
    assert_eq!(report.global_metrics.subsystem_count, 1);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.subsystem.as_deref() == Some("analytics")));
}

#[tokio::test]
async fn test_report_survives_adapter_that_cannot_normalize() {
    let coordinator = CacheCoordinator::new(MonitoringConfig::default());
    let sessions = json_store("sessions");
    sessions.set("s1", serde_json::json!("token"), None, None);
    sessions.get("s1");
    sessions.get("s2");
    let exports = json_store("exports");
    exports.set("e1", serde_json::json!("csv"), None, None);
    assert_ok!(coordinator.register("sessions", CacheTier::Hot, sessions.clone()));
    assert_ok!(coordinator.register_with_adapter(
        "exports",
        CacheTier::Cold,
        exports.clone(),
        Arc::new(BrokenMetricsAdapter)
    ));

    let report = coordinator.validate_performance().await;
    assert_eq!(report.stage, ReportStage::Archived);
    assert_eq!(report.subsystems["sessions"].hit_rate, 50.0);
    assert_eq!(report.subsystems["sessions"].request_count, 2);
    assert!(report.subsystems["exports"].is_zeroed());
    assert!(report.failed_subsystems.contains_key("exports"));
    assert_eq!(report.global_metrics.subsystem_count, 1);
    assert!((report.global_metrics.hit_rate - 50.0).abs() < 1e-9);

    // The store itself is untouched
    assert!(exports.has("e1"));
}

#[tokio::test]
async fn test_partial_invalidation_counts_only_healthy_store() {
    let coordinator = CacheCoordinator::new(MonitoringConfig::default());
    let a = json_store("a");
    for key in ["user_1", "user_2", "user_3", "org_1"] {
        a.set(key, serde_json::json!(key), None, None);
    }
    let b = Arc::new(FailingStore::new());
    b.inner.set("user_9", serde_json::json!(9), None, None);
    b.fail_invalidations(true);

    coordinator.register("a", CacheTier::Hot, a.clone()).unwrap();
    coordinator.register("b", CacheTier::Warm, b.clone()).unwrap();

    let result = coordinator
        .coordinated_invalidation(&["user_*"], InvalidationOptions::for_stores(&["a", "b"]))
        .await;
    assert_eq!(result.invalidated, 3);
    assert_eq!(result.per_store["a"], 3);
    assert_eq!(result.per_store["b"], 0);
    assert_eq!(result.failed_stores, vec!["b"]);
    assert!(b.inner.has("user_9"));
    assert_eq!(a.keys(None).unwrap(), vec!["org_1"]);
}

#[tokio::test]
async fn test_registration_errors_propagate() {
    let coordinator = CacheCoordinator::new(MonitoringConfig::default());
    assert_ok!(coordinator.register("users", CacheTier::Hot, json_store("users")));
    let err = assert_err!(coordinator.register("users", CacheTier::Hot, json_store("users")));
    assert_eq!(err.kind, ErrorKind::RegistrationError);
    assert_eq!(err.subsystem.as_deref(), Some("users"));
}

#[tokio::test]
async fn test_warm_up_improves_subsequent_hit_rate() {
    let coordinator = CacheCoordinator::new(MonitoringConfig::default());
    let users = json_store("users");
    coordinator
        .register("users", CacheTier::Hot, users.clone())
        .unwrap();

    // Cold store: every read misses
    users.get("user_1");
    users.get("user_2");

    let mut entries = HashMap::new();
    entries.insert(
        "users".to_string(),
        vec![
            WarmUpEntry::new("user_1", serde_json::json!({"name": "Ada"})),
            WarmUpEntry::new("user_2", serde_json::json!({"name": "Lin"})),
        ],
    );
    let warm = coordinator.warm_up_caches(entries).await;
    assert_eq!(warm.total_loaded, 2);
    assert_eq!(warm.hit_rate_before, 0.0);

    users.get("user_1");
    users.get("user_2");
    let report = coordinator.validate_performance().await;
    assert_eq!(report.subsystems["users"].hit_rate, 50.0);
}

#[tokio::test]
async fn test_event_rules_cascade_across_stores() {
    let coordinator = CacheCoordinator::new(MonitoringConfig::default());
    let profiles = json_store("profiles");
    let feeds = json_store("feeds");
    profiles.set("profile_7", serde_json::json!("p"), None, None);
    feeds.set("feed_7", serde_json::json!("f"), None, None);
    feeds.set("feed_8", serde_json::json!("f"), None, None);
    coordinator
        .register("profiles", CacheTier::Warm, profiles.clone())
        .unwrap();
    coordinator
        .register("feeds", CacheTier::Cold, feeds.clone())
        .unwrap();

    coordinator
        .add_invalidation_rule(
            InvalidationRule::new("user-profile", "profile_*")
                .with_triggers(&["user.updated"])
                .with_affected_systems(&["profiles"])
                .with_cascade(true),
        )
        .unwrap();
    coordinator
        .add_invalidation_rule(
            InvalidationRule::new("user-feed", "feed_*")
                .with_triggers(&["profile_*"])
                .with_affected_systems(&["feeds"]),
        )
        .unwrap();

    let result = coordinator.trigger_event("user.updated").await;
    assert_eq!(result.invalidated, 3);
    assert_eq!(result.per_store["profiles"], 1);
    assert_eq!(result.per_store["feeds"], 2);
    assert_eq!(result.fired_rules, vec!["user-profile", "user-feed"]);
}

#[tokio::test]
async fn test_dashboard_serializes_camel_case() {
    let coordinator = CacheCoordinator::new(MonitoringConfig::default());
    coordinator
        .register_with_adapter(
            "fast",
            CacheTier::Hot,
            json_store("fast"),
            Arc::new(FixedMetricsAdapter::new(97.0, 4.0, 2.0)),
        )
        .unwrap();
    coordinator
        .register_with_adapter(
            "middling",
            CacheTier::Warm,
            json_store("middling"),
            Arc::new(FixedMetricsAdapter::new(65.0, 30.0, 5.0)),
        )
        .unwrap();
    coordinator.validate_performance().await;

    let dashboard = coordinator.get_cache_monitoring_dashboard();
    assert_eq!(dashboard.subsystem_health["fast"], SubsystemHealth::Healthy);
    assert_eq!(dashboard.subsystem_health["middling"], SubsystemHealth::Degraded);

    let json = serde_json::to_value(&dashboard).unwrap();
    assert!(json["latestReport"]["overallScore"].is_number());
    assert_eq!(json["trends"]["hitRate"].as_array().unwrap().len(), 1);
    assert_eq!(json["subsystemHealth"]["middling"], "degraded");
}

#[tokio::test]
async fn test_monitoring_config_from_option_bag() {
    let config = assert_ok!(MonitoringConfig::from_json(&serde_json::json!({
        "enabled": true,
        "reportingInterval": 10_000,
        "optimizationTriggers": { "overallScoreThreshold": 90 },
        "validationFrequency": 0
    })));
    let coordinator = CacheCoordinator::new(config);
    coordinator
        .register_with_adapter(
            "s",
            CacheTier::Warm,
            json_store("s"),
            Arc::new(FixedMetricsAdapter::new(70.0, 20.0, 1.0)),
        )
        .unwrap();

    // Scores about 85.8: above the default trigger, below the raised one
    assert!(coordinator.run_monitoring_cycle().await.optimized);
    assert!(coordinator.run_monitoring_cycle().await.optimized);
}
