// End-to-end walkthroughs of the main store and coordinator flows

mod common;

use cache_plane::services::cache_coordinator::{
    CacheCoordinator, InvalidationOptions, MonitoringConfig, ReportStatus,
};
use cache_plane::services::cache_store::{CacheConfig, CacheStore};
use cache_plane::CacheTier;
use common::{manual_store, FixedMetricsAdapter};
use std::sync::Arc;

#[test]
fn scenario_entry_expires_after_ttl() {
    let (store, clock) = manual_store::<String>("sessions", CacheConfig::default());
    assert!(store.set("x", "1".to_string(), Some(1), None));
    assert_eq!(store.get("x"), Some("1".to_string()));

    let misses_before = store.get_metrics().misses;
    clock.advance_ms(1_100);
    assert_eq!(store.get("x"), None);
    assert_eq!(store.get_metrics().misses, misses_before + 1);
    assert!(!store.has("x"));
}

#[test]
fn scenario_least_recently_used_is_evicted() {
    let (store, _) = manual_store::<u32>("lru", CacheConfig::default().with_max_size(2));
    store.set("a", 1, None, None);
    store.set("b", 2, None, None);
    assert_eq!(store.get("a"), Some(1));

    store.set("c", 3, None, None);
    assert!(store.has("a"));
    assert!(!store.has("b"));
    assert!(store.has("c"));
    assert_eq!(store.get_metrics().evictions, 1);
}

#[tokio::test]
async fn scenario_report_over_three_stores() {
    let coordinator = CacheCoordinator::new(MonitoringConfig::default());
    let presets = [
        ("users", CacheTier::Hot, 90.0, 50.0, 30.0),
        ("search", CacheTier::Warm, 40.0, 800.0, 60.0),
        ("config", CacheTier::Cold, 95.0, 40.0, 30.0),
    ];
    for (name, tier, hit, rt, mem) in presets {
        let store: Arc<CacheStore<serde_json::Value>> =
            Arc::new(CacheStore::new(name, CacheConfig::default()));
        let adapter = Arc::new(FixedMetricsAdapter::new(hit, rt, mem));
        coordinator
            .register_with_adapter(name, tier, store, adapter)
            .unwrap();
    }

    let report = coordinator.validate_performance().await;
    assert_eq!(report.subsystems.len(), 3);
    assert!((report.global_metrics.hit_rate - 75.0).abs() < 1e-9);
    assert!((report.global_metrics.response_time - 296.666).abs() < 0.01);
    assert!(matches!(
        report.status,
        ReportStatus::Warning | ReportStatus::Critical
    ));
    assert!(report.recommendations.iter().any(|r| {
        let message = r.message.to_lowercase();
        message.contains("low hit rate") || message.contains("high response time")
    }));
    assert_eq!(coordinator.latest_report().map(|r| r.id), Some(report.id));
}

#[tokio::test]
async fn scenario_invalidate_pattern_everywhere() {
    let coordinator = CacheCoordinator::new(MonitoringConfig::default());
    let mut stores = Vec::new();
    for (name, tier) in [
        ("hot", CacheTier::Hot),
        ("warm", CacheTier::Warm),
        ("cold", CacheTier::Cold),
    ] {
        let store: Arc<CacheStore<String>> =
            Arc::new(CacheStore::new(name, CacheConfig::default()));
        store.set("user_1", "u".to_string(), None, None);
        store.set("config_1", "c".to_string(), None, None);
        coordinator.register(name, tier, store.clone()).unwrap();
        stores.push(store);
    }

    let result = coordinator
        .coordinated_invalidation(&["user_*"], InvalidationOptions::default())
        .await;
    assert_eq!(result.invalidated, 3);
    for name in ["hot", "warm", "cold"] {
        assert_eq!(result.per_store[name], 1);
    }
    assert!(result.failed_stores.is_empty());
    for store in stores {
        assert!(!store.has("user_1"));
        assert!(store.has("config_1"));
    }
}
