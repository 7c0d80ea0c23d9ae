//! Integration tests for cache warming.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::json;
use voxbridge_cache::{
    CacheCategory, CacheConfig, MultiLevelCache, WarmingKey, WarmingSpec,
};
use voxbridge_core::RedisConfig;

fn offline_config() -> CacheConfig {
    CacheConfig {
        redis: RedisConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn counting_key(key: &str, calls: &Arc<AtomicU32>, value: serde_json::Value) -> WarmingKey {
    let calls = calls.clone();
    WarmingKey::new(key, move || {
        let calls = calls.clone();
        let value = value.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
    })
}

#[tokio::test]
async fn test_warm_keys_skips_cached_and_drains_in_flight() {
    let cache = MultiLevelCache::new(offline_config());
    let category = CacheCategory::BusinessLookup;

    // One of the three keys is already cached.
    cache.set("warm-b", json!("existing"), &category).await;

    let calls = Arc::new(AtomicU32::new(0));
    let keys = vec![
        counting_key("warm-a", &calls, json!("a")),
        counting_key("warm-b", &calls, json!("b")),
        counting_key("warm-c", &calls, json!("c")),
    ];

    cache.warm_keys(category.clone(), keys).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2, "cached key is skipped");
    assert_eq!(cache.warming_in_flight(), 0, "in-flight set drains");
    assert_eq!(cache.get("warm-b", &category).await, Some(json!("existing")));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cache.get("warm-a", &category).await, Some(json!("a")));
    assert_eq!(cache.get("warm-c", &category).await, Some(json!("c")));

    let snapshot = cache.stats().stats;
    assert_eq!(snapshot.efficiency.warming_operations, 2);
}

#[tokio::test]
async fn test_warm_keys_deduplicates_within_batch() {
    let cache = MultiLevelCache::new(offline_config());
    let calls = Arc::new(AtomicU32::new(0));

    let keys = vec![
        counting_key("dup", &calls, json!(1)),
        counting_key("dup", &calls, json!(1)),
    ];
    cache.warm_keys(CacheCategory::Default, keys).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1, "duplicate key warmed once");
    assert_eq!(cache.warming_in_flight(), 0);
}

#[tokio::test]
async fn test_warming_failure_leaves_key_cold() {
    let cache = MultiLevelCache::new(offline_config());
    let category = CacheCategory::Default;

    let keys = vec![WarmingKey::new("doomed", || async {
        Err(voxbridge_core::CacheError::compute("lookup unavailable"))
    })];
    cache.warm_keys(category.clone(), keys).await;

    assert_eq!(cache.warming_in_flight(), 0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cache.get("doomed", &category).await.is_none());
}

#[tokio::test]
async fn test_warm_custom_with_ttl_override() {
    let cache = MultiLevelCache::new(offline_config());

    let specs = vec![
        WarmingSpec::new("custom-1", CacheCategory::KnowledgeBase, || async {
            Ok(json!({"answer": 42}))
        })
        .with_ttl(Duration::from_secs(10)),
    ];
    cache.warm_custom(specs).await;

    assert_eq!(
        cache.get("custom-1", &CacheCategory::KnowledgeBase).await,
        Some(json!({"answer": 42}))
    );
    assert_eq!(cache.warming_in_flight(), 0);
}

#[tokio::test]
async fn test_warming_disabled_is_noop() {
    let config = CacheConfig {
        warming_enabled: false,
        ..offline_config()
    };
    let cache = MultiLevelCache::new(config);
    let calls = Arc::new(AtomicU32::new(0));

    let keys = vec![counting_key("never", &calls, json!(1))];
    cache.warm_keys(CacheCategory::Default, keys).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!cache.warming_status().enabled);
}
