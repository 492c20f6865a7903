//! End-to-end behavior of the render cache: the online/offline scenario,
//! event-driven invalidation through the hub, and counter consistency
//! under concurrent use.

use std::sync::Arc;
use std::thread;

use fresco::{
    ACTION_KEY, AuthContext, CacheConfig, CacheEntry, CachedResponse, ClearAction, EventHub,
    EventKind, NO_TIMEOUT, PlainKey, RenderCache, ResourceId, StaticGate,
};
use serde_json::{Map, Value};

fn cache() -> Arc<RenderCache<PlainKey>> {
    Arc::new(RenderCache::new(
        CacheConfig::default(),
        Arc::new(StaticGate::new(["admin"])),
    ))
}

fn store(cache: &RenderCache<PlainKey>, resource: ResourceId, variation: &str, body: &str) {
    let key = PlainKey::new(resource, NO_TIMEOUT);
    assert!(cache.put(
        key,
        CacheEntry::new(CachedResponse::ok(body.to_string())),
        Some(variation.to_string()),
    ));
}

fn request(resource: ResourceId, variation: &str) -> PlainKey {
    PlainKey::with_variation(resource, variation, NO_TIMEOUT)
}

#[test]
fn online_offline_renderings_invalidate_independently() {
    let cache = cache();
    let admin = AuthContext::principal("admin");

    store(&cache, ResourceId::online("/a"), "v1", "E1");
    store(&cache, ResourceId::offline("/a"), "v1", "E2");

    cache.clear_online(&admin);

    assert_eq!(
        cache.cached_resources(&admin),
        Some(vec!["/a [offline]".to_string()])
    );
    assert!(cache.get(&request(ResourceId::online("/a"), "v1")).is_none());

    let survivor = cache
        .get(&request(ResourceId::offline("/a"), "v1"))
        .expect("offline rendering must survive an online clear");
    assert_eq!(survivor.response().body, bytes::Bytes::from("E2"));
}

#[test]
fn publish_event_through_the_hub_empties_the_cache() {
    let cache = cache();
    let hub = EventHub::new();
    let subscription = hub.subscribe(cache.clone());

    store(&cache, ResourceId::online("/a"), "v1", "one");
    store(&cache, ResourceId::offline("/b"), "v1", "two");
    assert_eq!(cache.size(), 2);

    hub.publish(EventKind::ProjectPublished, None, AuthContext::anonymous());

    assert_eq!(cache.size(), 0);
    assert_eq!(cache.key_size(), 0);
    assert!(cache.is_empty());

    hub.unsubscribe(subscription);
}

#[test]
fn partial_clear_event_removes_only_the_offline_partition() {
    let cache = cache();
    let hub = EventHub::new();
    hub.subscribe(cache.clone());

    store(&cache, ResourceId::online("/a"), "v1", "one");
    store(&cache, ResourceId::offline("/a"), "v1", "two");
    store(&cache, ResourceId::offline("/b"), "v1", "three");

    let mut payload = Map::new();
    payload.insert(
        ACTION_KEY.to_string(),
        Value::from(ClearAction::OfflineAll.code()),
    );
    hub.publish(
        EventKind::PartialClear,
        Some(payload),
        AuthContext::principal("admin"),
    );

    assert_eq!(
        cache.cached_resources(&AuthContext::principal("admin")),
        Some(vec!["/a [online]".to_string()])
    );
    assert_eq!(cache.size(), 1);
}

#[test]
fn disabled_cache_never_subscribes_and_never_stores() {
    let cache: Arc<RenderCache<PlainKey>> = Arc::new(RenderCache::new(
        CacheConfig::disabled(),
        Arc::new(StaticGate::new(["admin"])),
    ));

    let key = PlainKey::new(ResourceId::online("/a"), NO_TIMEOUT);
    assert!(!cache.put(
        key,
        CacheEntry::new(CachedResponse::ok("one")),
        Some("v1".to_string()),
    ));
    assert_eq!(cache.size(), 0);
    assert!(cache.is_empty());
    assert!(
        cache
            .cached_resources(&AuthContext::principal("admin"))
            .is_none()
    );
}

#[test]
fn counter_stays_consistent_under_concurrent_writers() {
    let cache = cache();
    let threads = 8;
    let per_thread = 50;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let cache = cache.clone();
            thread::spawn(move || {
                for i in 0..per_thread {
                    let resource = ResourceId::online(format!("/t{t}/r{i}"));
                    let key = PlainKey::new(resource.clone(), NO_TIMEOUT);
                    cache.put(
                        key,
                        CacheEntry::new(CachedResponse::ok("body")),
                        Some("v1".to_string()),
                    );
                    assert!(cache.get(&request(resource, "v1")).is_some());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer thread should not panic");
    }

    assert_eq!(cache.size(), (threads * per_thread) as u64);
    assert_eq!(cache.key_size(), threads * per_thread);
}

#[test]
fn concurrent_clears_and_writes_do_not_wedge() {
    let cache = cache();
    let admin = AuthContext::principal("admin");

    let writer = {
        let cache = cache.clone();
        thread::spawn(move || {
            for i in 0..200 {
                let resource = ResourceId::offline(format!("/w/{i}"));
                let key = PlainKey::new(resource, NO_TIMEOUT);
                cache.put(
                    key,
                    CacheEntry::new(CachedResponse::ok("body")),
                    Some("v1".to_string()),
                );
            }
        })
    };
    let sweeper = {
        let cache = cache.clone();
        let admin = admin.clone();
        thread::spawn(move || {
            for _ in 0..20 {
                cache.clear_offline_entries(&admin);
            }
        })
    };

    writer.join().expect("writer should finish");
    sweeper.join().expect("sweeper should finish");

    cache.clear();
    assert_eq!(cache.size(), 0);
    assert!(cache.is_empty());
}
