//! Resource identifiers and the cache-key contract.
//!
//! A resource is addressed by its name plus an online/offline partition.
//! Externally (enumeration, diagnostics, legacy tooling) the partition is
//! rendered as a suffix on the resource name; internally it is a typed
//! field so the hot path never does string matching.

use std::fmt;

/// Raw timeout value meaning "this resource never expires".
pub const NO_TIMEOUT: i64 = -1;

/// Suffix appended to online resource identifiers at the external boundary.
pub const ONLINE_SUFFIX: &str = " [online]";

/// Suffix appended to offline resource identifiers at the external boundary.
pub const OFFLINE_SUFFIX: &str = " [offline]";

/// The partition a resource belongs to.
///
/// Published (online) and workplace (offline) renderings of the same
/// resource are cached side by side and invalidated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Online,
    Offline,
}

impl Partition {
    /// The legacy string suffix for this partition.
    pub fn suffix(self) -> &'static str {
        match self {
            Partition::Online => ONLINE_SUFFIX,
            Partition::Offline => OFFLINE_SUFFIX,
        }
    }

    /// Subdirectory of the artifact repository holding this partition.
    pub fn repository_dir(self) -> &'static str {
        match self {
            Partition::Online => "online",
            Partition::Offline => "offline",
        }
    }
}

/// Identifies one cacheable resource within a partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    name: String,
    partition: Partition,
}

impl ResourceId {
    pub fn new(name: impl Into<String>, partition: Partition) -> Self {
        Self {
            name: name.into(),
            partition,
        }
    }

    pub fn online(name: impl Into<String>) -> Self {
        Self::new(name, Partition::Online)
    }

    pub fn offline(name: impl Into<String>) -> Self {
        Self::new(name, Partition::Offline)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Render the suffix-tagged external form, e.g. `/index.html [online]`.
    pub fn tagged(&self) -> String {
        format!("{}{}", self.name, self.partition.suffix())
    }

    /// Parse a suffix-tagged external identifier back into a `ResourceId`.
    ///
    /// Returns `None` if the string carries neither partition suffix.
    pub fn parse_tagged(tagged: &str) -> Option<Self> {
        if let Some(name) = tagged.strip_suffix(ONLINE_SUFFIX) {
            Some(Self::online(name))
        } else {
            tagged.strip_suffix(OFFLINE_SUFFIX).map(Self::offline)
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.partition.suffix())
    }
}

/// Contract for cache keys.
///
/// A key is produced by the rendering pipeline from a response and carries
/// the caching directives for its resource. The cache stores the key that
/// was current when a resource's bucket was created and later asks it to
/// resolve variations for incoming request keys; how that resolution works
/// (header matching, parameter matching) is entirely the implementor's
/// business.
pub trait VariationKey: Clone + Send + Sync + 'static {
    /// The resource this key describes.
    fn resource(&self) -> &ResourceId;

    /// The concrete variation, once one has been assigned.
    fn variation(&self) -> Option<&str>;

    /// Assign the concrete variation. Called by the cache on `put`.
    fn set_variation(&mut self, variation: String);

    /// Raw timeout field.
    ///
    /// Negative means the resource never expires. On a key being stored, a
    /// positive value is the relative TTL in minutes. On an incoming lookup
    /// key the same field serves as the reference value for the freshness
    /// check in `get`.
    fn timeout(&self) -> i64;

    /// Resolve the concrete variation string for an incoming request key,
    /// or `None` if the response is not cacheable under this request.
    ///
    /// `self` is the key stored with the resource's bucket; `request` is
    /// the key built from the incoming request.
    fn resolve_variation(&self, request: &Self) -> Option<String>;
}

/// A minimal [`VariationKey`] for pipelines that precompute variations.
///
/// `resolve_variation` simply trusts the variation carried on the request
/// key. Pipelines with header- or parameter-dependent caching directives
/// should bring their own key type instead.
#[derive(Debug, Clone)]
pub struct PlainKey {
    resource: ResourceId,
    variation: Option<String>,
    timeout: i64,
}

impl PlainKey {
    /// Create a key with no variation assigned yet.
    pub fn new(resource: ResourceId, timeout: i64) -> Self {
        Self {
            resource,
            variation: None,
            timeout,
        }
    }

    /// Create a key carrying a precomputed variation.
    pub fn with_variation(resource: ResourceId, variation: impl Into<String>, timeout: i64) -> Self {
        Self {
            resource,
            variation: Some(variation.into()),
            timeout,
        }
    }
}

impl VariationKey for PlainKey {
    fn resource(&self) -> &ResourceId {
        &self.resource
    }

    fn variation(&self) -> Option<&str> {
        self.variation.as_deref()
    }

    fn set_variation(&mut self, variation: String) {
        self.variation = Some(variation);
    }

    fn timeout(&self) -> i64 {
        self.timeout
    }

    fn resolve_variation(&self, request: &Self) -> Option<String> {
        request.variation.clone()
    }
}
