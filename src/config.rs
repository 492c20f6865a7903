//! Cache configuration.
//!
//! Controls whether the cache is active at all, whether offline resources
//! should be offered to it, and where the materialized artifact repository
//! lives on disk.

use std::path::PathBuf;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_ARTIFACT_ROOT: &str = "artifact-repository";
const DEFAULT_RESOURCE_CAPACITY: usize = 509;
const DEFAULT_VARIATION_CAPACITY: usize = 7;

/// Cache configuration.
///
/// `enabled` is fixed for the lifetime of the cache: a cache constructed
/// with `enabled = false` never allocates its index and answers every
/// operation with a neutral result.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the response cache.
    pub enabled: bool,
    /// Advisory flag: should offline resources be offered to the cache.
    ///
    /// The engine stores and exposes this but does not branch on it; the
    /// rendering pipeline consults it before calling `put` for offline
    /// resources.
    pub cache_offline: bool,
    /// Root directory of the on-disk artifact repository.
    ///
    /// The online and offline repositories are the `online/` and `offline/`
    /// subdirectories of this root.
    pub artifact_root: PathBuf,
    /// Initial capacity of the resource index.
    pub resource_capacity: usize,
    /// Initial capacity of a per-resource variation map.
    pub variation_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_offline: true,
            artifact_root: PathBuf::from(DEFAULT_ARTIFACT_ROOT),
            resource_capacity: DEFAULT_RESOURCE_CAPACITY,
            variation_capacity: DEFAULT_VARIATION_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Configuration for a cache that is switched off entirely.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
