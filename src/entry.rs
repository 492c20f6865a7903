//! Cached payloads.
//!
//! A `CacheEntry` is one rendered output for one variation of one resource,
//! plus the absolute expiry stamped on it when it is stored.

use bytes::Bytes;

/// A rendered response as produced by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    /// A bare `200 OK` response with the given body, no headers.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

/// One cached rendering output.
///
/// The expiry is stamped by the cache's internal store operation when the
/// owning key carries a positive timeout; it is never rewritten afterwards.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    response: CachedResponse,
    expires_at: Option<i64>,
}

impl CacheEntry {
    pub fn new(response: CachedResponse) -> Self {
        Self {
            response,
            expires_at: None,
        }
    }

    pub fn response(&self) -> &CachedResponse {
        &self.response
    }

    /// Absolute expiry in epoch milliseconds, if one has been stamped.
    pub fn expiry(&self) -> Option<i64> {
        self.expires_at
    }

    /// Stamp the absolute expiry. Called once by the cache at store time.
    pub fn set_expiry(&mut self, expires_at_millis: i64) {
        self.expires_at = Some(expires_at_millis);
    }
}
