//! Fresco: a two-level in-memory cache for rendered responses.
//!
//! A content-rendering pipeline asks the cache before rendering and stores
//! the result afterwards, keyed by resource identifier and a
//! request-dependent variation:
//!
//! - **Level one**: resource identifier → variation bucket. Resources are
//!   partitioned along an online/offline axis so the published and the
//!   workplace renderings of one resource invalidate independently.
//! - **Level two**: variation string → cached entry.
//!
//! Invalidation is event-driven: the embedding application subscribes the
//! cache to an [`EventHub`] and publishes lifecycle events (project
//! published, global flush, repository purge, parameterized partial
//! clear). Administrative operations are gated through an [`AdminGate`].
//!
//! There is no bounded eviction: the cache only shrinks through expiry on
//! lookup, explicit removal, or the full and half flushes.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use fresco::{
//!     CacheConfig, CacheEntry, CachedResponse, EventHub, PlainKey, RenderCache,
//!     ResourceId, StaticGate, NO_TIMEOUT,
//! };
//!
//! let gate = Arc::new(StaticGate::new(["admin"]));
//! let cache = Arc::new(RenderCache::new(CacheConfig::default(), gate));
//!
//! // The composition root owns the subscription.
//! let hub = EventHub::new();
//! let subscription = hub.subscribe(cache.clone());
//!
//! let key = PlainKey::new(ResourceId::online("/index.html"), NO_TIMEOUT);
//! let entry = CacheEntry::new(CachedResponse::ok("<html>...</html>"));
//! cache.put(key, entry, Some("lang=en".to_string()));
//!
//! let request = PlainKey::with_variation(ResourceId::online("/index.html"), "lang=en", NO_TIMEOUT);
//! assert!(cache.get(&request).is_some());
//!
//! hub.unsubscribe(subscription);
//! ```

mod config;
mod entry;
mod events;
mod gate;
mod invalidate;
mod keys;
mod lock;
mod store;
pub mod telemetry;

pub use config::CacheConfig;
pub use entry::{CacheEntry, CachedResponse};
pub use events::{
    ACTION_KEY, CacheEvent, CacheEventListener, ClearAction, Epoch, EventHub, EventKind,
    SubscriberId,
};
pub use gate::{AdminGate, AuthContext, GateError, StaticGate};
pub use keys::{
    NO_TIMEOUT, OFFLINE_SUFFIX, ONLINE_SUFFIX, Partition, PlainKey, ResourceId, VariationKey,
};
pub use store::RenderCache;
