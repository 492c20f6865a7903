//! Metric names and descriptions.
//!
//! The cache emits through the `metrics` facade; the embedding application
//! installs the recorder and exporter. Calling [`describe_metrics`] is
//! optional but gives exporters units and help text.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

pub(crate) const METRIC_HIT_TOTAL: &str = "fresco_cache_hit_total";
pub(crate) const METRIC_MISS_TOTAL: &str = "fresco_cache_miss_total";
pub(crate) const METRIC_EXPIRED_EVICT_TOTAL: &str = "fresco_cache_expired_evict_total";
pub(crate) const METRIC_CLEAR_TOTAL: &str = "fresco_cache_clear_total";
pub(crate) const METRIC_PURGE_MS: &str = "fresco_cache_purge_ms";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Register descriptions for every metric the cache emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_HIT_TOTAL,
            Unit::Count,
            "Total number of response-cache hits."
        );
        describe_counter!(
            METRIC_MISS_TOTAL,
            Unit::Count,
            "Total number of response-cache misses."
        );
        describe_counter!(
            METRIC_EXPIRED_EVICT_TOTAL,
            Unit::Count,
            "Total number of entries evicted on lookup because they had expired."
        );
        describe_counter!(
            METRIC_CLEAR_TOTAL,
            Unit::Count,
            "Total number of bulk invalidations, full or partial."
        );
        describe_histogram!(
            METRIC_PURGE_MS,
            Unit::Milliseconds,
            "Artifact repository purge latency in milliseconds."
        );
    });
}
