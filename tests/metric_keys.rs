//! Asserts the cache emits its documented metric keys.

use std::collections::HashSet;
use std::sync::Arc;

use fresco::{
    AuthContext, CacheConfig, CacheEntry, CachedResponse, NO_TIMEOUT, PlainKey, RenderCache,
    ResourceId, StaticGate, telemetry,
};
use metrics_util::debugging::DebuggingRecorder;

#[test]
fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let tmp = tempfile::tempdir().expect("tempdir");
    let config = CacheConfig {
        artifact_root: tmp.path().to_path_buf(),
        ..CacheConfig::default()
    };
    let cache: RenderCache<PlainKey> =
        RenderCache::new(config, Arc::new(StaticGate::new(["admin"])));

    // Miss, hit, expired eviction.
    let request = PlainKey::with_variation(ResourceId::online("/a"), "v1", NO_TIMEOUT);
    assert!(cache.get(&request).is_none());

    let key = PlainKey::new(ResourceId::online("/a"), NO_TIMEOUT);
    cache.put(
        key,
        CacheEntry::new(CachedResponse::ok("body")),
        Some("v1".to_string()),
    );
    assert!(cache.get(&request).is_some());

    let short_lived = PlainKey::new(ResourceId::online("/b"), 1);
    cache.put(
        short_lived,
        CacheEntry::new(CachedResponse::ok("stale")),
        Some("v1".to_string()),
    );
    let expired_request = PlainKey::with_variation(ResourceId::online("/b"), "v1", 70_000);
    assert!(cache.get(&expired_request).is_none());

    // Clear and purge.
    cache.clear();
    cache.purge_artifact_repository(&AuthContext::event_controlled());

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "fresco_cache_hit_total",
        "fresco_cache_miss_total",
        "fresco_cache_expired_evict_total",
        "fresco_cache_clear_total",
        "fresco_cache_purge_ms",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
