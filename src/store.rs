//! Cache engine: index structures and the read/write path.
//!
//! The index is two-level: resource id → variation bucket, variation →
//! entry. Both levels are sharded concurrent maps, so lookups and stores
//! for unrelated resources (and unrelated variations of one resource)
//! proceed independently. The outer `RwLock` exists solely so a full clear
//! can swap in a fresh index; ordinary operations only ever take its read
//! half.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::gate::{AdminGate, AuthContext};
use crate::keys::{NO_TIMEOUT, ResourceId, VariationKey};
use crate::lock::rw_read;
use crate::telemetry::{METRIC_EXPIRED_EVICT_TOTAL, METRIC_HIT_TOTAL, METRIC_MISS_TOTAL};

const SOURCE: &str = "fresco::store";

/// Per-resource container: the stored key and its variation → entry map.
pub(crate) struct VariationBucket<K> {
    pub(crate) key: K,
    pub(crate) entries: DashMap<String, Arc<CacheEntry>>,
}

impl<K> VariationBucket<K> {
    fn new(key: K, capacity: usize) -> Self {
        Self {
            key,
            entries: DashMap::with_capacity(capacity),
        }
    }
}

pub(crate) type ResourceIndex<K> = DashMap<ResourceId, Arc<VariationBucket<K>>>;

/// Allocated state of an enabled cache.
pub(crate) struct CacheState<K> {
    /// Write half is taken only to swap in a fresh index on a full clear.
    pub(crate) index: RwLock<ResourceIndex<K>>,
    /// Serializes the clear family against itself.
    pub(crate) sweep: Mutex<()>,
    entry_count: AtomicU64,
}

impl<K> CacheState<K> {
    fn new(config: &CacheConfig) -> Self {
        Self {
            index: RwLock::new(DashMap::with_capacity(config.resource_capacity)),
            sweep: Mutex::new(()),
            entry_count: AtomicU64::new(0),
        }
    }

    pub(crate) fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::SeqCst)
    }

    pub(crate) fn inc_entries(&self) {
        self.entry_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Clamped at zero: a racing bulk reset may already have accounted for
    /// the entry being removed.
    pub(crate) fn dec_entries(&self) {
        self.sub_entries(1);
    }

    pub(crate) fn sub_entries(&self, n: u64) {
        let _ = self
            .entry_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(n))
            });
    }

    pub(crate) fn reset_entries(&self) {
        self.entry_count.store(0, Ordering::SeqCst);
    }
}

/// Two-level in-memory cache for rendered responses.
///
/// Construction fixes whether the cache is enabled for its whole lifetime.
/// A disabled cache never allocates its index; every operation answers with
/// its neutral value (`None`, `false`, `0`, empty).
pub struct RenderCache<K: VariationKey> {
    pub(crate) config: CacheConfig,
    pub(crate) gate: Arc<dyn AdminGate>,
    pub(crate) state: Option<CacheState<K>>,
}

impl<K: VariationKey> RenderCache<K> {
    pub fn new(config: CacheConfig, gate: Arc<dyn AdminGate>) -> Self {
        let state = config.enabled.then(|| CacheState::new(&config));
        Self {
            config,
            gate,
            state,
        }
    }

    /// Whether the cache is actually caching entries.
    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    /// Whether the pipeline should offer offline resources to the cache.
    pub fn cache_offline(&self) -> bool {
        self.config.cache_offline
    }

    /// Authorization with failures downgraded to denial.
    pub(crate) fn authorized(&self, ctx: &AuthContext) -> bool {
        match self.gate.is_authorized(ctx) {
            Ok(authorized) => authorized,
            Err(error) => {
                warn!(%error, "Authorization check failed; treating as denied");
                false
            }
        }
    }

    // ========================================================================
    // Read path
    // ========================================================================

    /// Look up the entry for a request key.
    ///
    /// The bucket's stored key decides whether and how the request maps to
    /// a variation. An entry found past its expiry is removed here as a
    /// side effect and reported as a miss.
    pub fn get(&self, request: &K) -> Option<Arc<CacheEntry>> {
        let state = self.state.as_ref()?;

        let bucket = {
            let index = rw_read(&state.index, SOURCE, "get");
            match index.get(request.resource()) {
                Some(bucket) => Arc::clone(bucket.value()),
                None => return self.miss(request, "no bucket"),
            }
        };

        let Some(variation) = bucket.key.resolve_variation(request) else {
            return self.miss(request, "not cacheable for this request");
        };

        if bucket.key.timeout() < 0 {
            // Never-expiring resource: existence alone decides.
            return match bucket.entries.get(&variation) {
                Some(entry) => self.hit(Arc::clone(entry.value())),
                None => self.miss(request, "no entry for variation"),
            };
        }

        let Some(entry) = bucket.entries.get(&variation).map(|e| Arc::clone(e.value())) else {
            return self.miss(request, "no entry for variation");
        };

        // TODO: the request key's timeout field doubles as the freshness
        // reference here; revisit once key builders stamp an absolute
        // deadline instead.
        if entry.expiry().unwrap_or(NO_TIMEOUT) < request.timeout() {
            if bucket.entries.remove(&variation).is_some() {
                state.dec_entries();
                counter!(METRIC_EXPIRED_EVICT_TOTAL).increment(1);
            }
            return self.miss(request, "entry expired");
        }

        self.hit(entry)
    }

    /// True iff `get` for this key would be a hit.
    ///
    /// Shares the read path, including its expired-entry eviction.
    pub fn contains_key(&self, request: &K) -> bool {
        self.get(request).is_some()
    }

    fn hit(&self, entry: Arc<CacheEntry>) -> Option<Arc<CacheEntry>> {
        counter!(METRIC_HIT_TOTAL).increment(1);
        Some(entry)
    }

    fn miss(&self, request: &K, reason: &'static str) -> Option<Arc<CacheEntry>> {
        counter!(METRIC_MISS_TOTAL).increment(1);
        debug!(resource = %request.resource(), reason, "Cache miss");
        None
    }

    // ========================================================================
    // Write path
    // ========================================================================

    /// Register a key with a new, empty variation bucket.
    ///
    /// If the resource already has a bucket its key is left untouched:
    /// first writer wins.
    pub fn put_key(&self, key: K) {
        let Some(state) = &self.state else { return };
        let capacity = self.config.variation_capacity;

        let index = rw_read(&state.index, SOURCE, "put_key");
        index
            .entry(key.resource().clone())
            .or_insert_with(|| Arc::new(VariationBucket::new(key, capacity)));
    }

    /// Store an entry under the given variation.
    ///
    /// A `None` variation means the pipeline decided the response is not
    /// cacheable; nothing is stored and `false` is returned. Duplicate
    /// stores are not suppressed here.
    pub fn put(&self, mut key: K, entry: CacheEntry, variation: Option<String>) -> bool {
        let Some(state) = &self.state else { return false };

        let Some(variation) = variation else {
            debug!(
                resource = %key.resource(),
                "Not stored: response not cacheable for this request"
            );
            return false;
        };

        key.set_variation(variation.clone());
        self.store(state, key, variation, entry);
        true
    }

    fn store(&self, state: &CacheState<K>, key: K, variation: String, mut entry: CacheEntry) {
        if key.timeout() > 0 {
            // Minutes to milliseconds; the offset semantics belong to
            // whoever built the key.
            entry.set_expiry(key.timeout() * 60_000);
        }

        let resource = key.resource().clone();
        let capacity = self.config.variation_capacity;

        let bucket = {
            let index = rw_read(&state.index, SOURCE, "store");
            Arc::clone(
                index
                    .entry(resource.clone())
                    .or_insert_with(|| Arc::new(VariationBucket::new(key, capacity)))
                    .value(),
            )
        };

        let previous = bucket.entries.insert(variation.clone(), Arc::new(entry));
        if previous.is_none() {
            state.inc_entries();
        }

        debug!(
            resource = %resource,
            variation,
            total_entries = state.entry_count(),
            "Cache entry stored"
        );
    }

    /// Remove the entry the key's variation points at, if present.
    pub fn remove(&self, key: &K) {
        let Some(state) = &self.state else { return };
        let Some(variation) = key.variation() else { return };

        let bucket = {
            let index = rw_read(&state.index, SOURCE, "remove");
            match index.get(key.resource()) {
                Some(bucket) => Arc::clone(bucket.value()),
                None => return,
            }
        };

        if bucket.entries.remove(variation).is_some() {
            state.dec_entries();
        }
    }

    // ========================================================================
    // Enumeration and inspection
    // ========================================================================

    /// Suffix-tagged identifiers of every cached resource, for diagnostics.
    ///
    /// Gated: `None` when the cache is disabled or the context is denied.
    pub fn cached_resources(&self, ctx: &AuthContext) -> Option<Vec<String>> {
        let state = self.state.as_ref()?;
        if !self.authorized(ctx) {
            return None;
        }

        let index = rw_read(&state.index, SOURCE, "cached_resources");
        let mut resources: Vec<String> = index.iter().map(|slot| slot.key().tagged()).collect();
        resources.sort();
        Some(resources)
    }

    /// Variation strings cached for one resource, for diagnostics.
    pub fn cached_variations(&self, resource: &ResourceId, ctx: &AuthContext) -> Option<Vec<String>> {
        let state = self.state.as_ref()?;
        if !self.authorized(ctx) {
            return None;
        }

        let bucket = {
            let index = rw_read(&state.index, SOURCE, "cached_variations");
            Arc::clone(index.get(resource)?.value())
        };
        let mut variations: Vec<String> =
            bucket.entries.iter().map(|e| e.key().clone()).collect();
        variations.sort();
        Some(variations)
    }

    /// The key stored for one resource, for diagnostics.
    pub fn cached_key(&self, resource: &ResourceId, ctx: &AuthContext) -> Option<K> {
        let state = self.state.as_ref()?;
        if !self.authorized(ctx) {
            return None;
        }

        let index = rw_read(&state.index, SOURCE, "cached_key");
        index.get(resource).map(|bucket| bucket.key.clone())
    }

    /// The key stored for one resource. Ungated: the rendering pipeline
    /// uses this to reuse caching directives parsed on an earlier request.
    pub fn stored_key(&self, resource: &ResourceId) -> Option<K> {
        let state = self.state.as_ref()?;
        let index = rw_read(&state.index, SOURCE, "stored_key");
        index.get(resource).map(|bucket| bucket.key.clone())
    }

    /// Total number of cached entries across all resources.
    pub fn size(&self) -> u64 {
        self.state.as_ref().map_or(0, CacheState::entry_count)
    }

    /// Number of resource buckets.
    pub fn key_size(&self) -> usize {
        match &self.state {
            Some(state) => rw_read(&state.index, SOURCE, "key_size").len(),
            None => 0,
        }
    }

    /// True if the cache holds no buckets (or is disabled).
    pub fn is_empty(&self) -> bool {
        match &self.state {
            Some(state) => rw_read(&state.index, SOURCE, "is_empty").is_empty(),
            None => true,
        }
    }
}
