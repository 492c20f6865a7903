//! Bulk invalidation.
//!
//! Full and partial clears, the on-disk artifact repository purge, and the
//! event dispatch that drives them. Clears are serialized against each
//! other through the state's sweep mutex but deliberately not against the
//! ordinary read/write path: a sweep iterates a snapshot of resource ids,
//! so buckets created mid-sweep are simply not visited.

use std::fs;
use std::path::Path;
use std::time::Instant;

use dashmap::DashMap;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::events::{CacheEvent, CacheEventListener, ClearAction, EventKind};
use crate::gate::AuthContext;
use crate::keys::{Partition, ResourceId, VariationKey};
use crate::lock::{mutex_lock, rw_read, rw_write};
use crate::store::RenderCache;
use crate::telemetry::{METRIC_CLEAR_TOTAL, METRIC_PURGE_MS};

const SOURCE: &str = "fresco::invalidate";

impl<K: VariationKey> RenderCache<K> {
    /// Unconditionally empty the cache: fresh index, counter to zero.
    ///
    /// This is the ungated primitive; it is what event handling and the
    /// repository purge fall back on. Interactive administration goes
    /// through [`clear_all`](Self::clear_all) instead.
    pub fn clear(&self) {
        let Some(state) = &self.state else { return };
        let _sweep = mutex_lock(&state.sweep, SOURCE, "clear");

        {
            let mut index = rw_write(&state.index, SOURCE, "clear");
            *index = DashMap::with_capacity(self.config.resource_capacity);
        }
        state.reset_entries();

        counter!(METRIC_CLEAR_TOTAL).increment(1);
        info!("Complete cache cleared");
    }

    /// Gated full clear: keys and entries.
    pub fn clear_all(&self, ctx: &AuthContext) {
        if self.state.is_none() || !self.authorized(ctx) {
            return;
        }
        self.clear();
    }

    /// Gated clear of all entries; every bucket and its key is retained.
    pub fn clear_entries(&self, ctx: &AuthContext) {
        let Some(state) = &self.state else { return };
        if !self.authorized(ctx) {
            return;
        }

        let _sweep = mutex_lock(&state.sweep, SOURCE, "clear_entries");
        let index = rw_read(&state.index, SOURCE, "clear_entries");

        let resources: Vec<ResourceId> = index.iter().map(|slot| slot.key().clone()).collect();
        for resource in &resources {
            if let Some(bucket) = index.get(resource) {
                bucket.entries.clear();
            }
        }
        state.reset_entries();

        counter!(METRIC_CLEAR_TOTAL).increment(1);
        info!(buckets = resources.len(), "All cache entries cleared, keys retained");
    }

    /// Gated clear of the online partition: keys and entries.
    pub fn clear_online(&self, ctx: &AuthContext) {
        self.gated_partition_clear(ctx, Partition::Online, false);
    }

    /// Gated clear of the online partition's entries; keys retained.
    pub fn clear_online_entries(&self, ctx: &AuthContext) {
        self.gated_partition_clear(ctx, Partition::Online, true);
    }

    /// Gated clear of the offline partition: keys and entries.
    pub fn clear_offline(&self, ctx: &AuthContext) {
        self.gated_partition_clear(ctx, Partition::Offline, false);
    }

    /// Gated clear of the offline partition's entries; keys retained.
    pub fn clear_offline_entries(&self, ctx: &AuthContext) {
        self.gated_partition_clear(ctx, Partition::Offline, true);
    }

    fn gated_partition_clear(&self, ctx: &AuthContext, partition: Partition, entries_only: bool) {
        if self.state.is_none() || !self.authorized(ctx) {
            return;
        }
        self.clear_partition(partition, entries_only);
    }

    /// Clear one half of the cache: every bucket in `partition`.
    ///
    /// With `entries_only` the buckets and their keys survive; otherwise
    /// the buckets are removed from the index entirely. The other
    /// partition is untouched.
    pub(crate) fn clear_partition(&self, partition: Partition, entries_only: bool) {
        let Some(state) = &self.state else { return };
        let _sweep = mutex_lock(&state.sweep, SOURCE, "clear_partition");
        let index = rw_read(&state.index, SOURCE, "clear_partition");

        let resources: Vec<ResourceId> = index
            .iter()
            .map(|slot| slot.key().clone())
            .filter(|resource| resource.partition() == partition)
            .collect();

        for resource in &resources {
            if entries_only {
                if let Some(bucket) = index.get(resource) {
                    state.sub_entries(bucket.entries.len() as u64);
                    bucket.entries.clear();
                }
            } else if let Some((_, bucket)) = index.remove(resource) {
                state.sub_entries(bucket.entries.len() as u64);
            }
        }

        counter!(METRIC_CLEAR_TOTAL).increment(1);
        info!(
            partition = ?partition,
            entries_only,
            buckets = resources.len(),
            "Cache partition cleared"
        );
    }

    /// Purge the on-disk artifact repositories, then clear the cache.
    ///
    /// Deletes every regular file directly inside the online and offline
    /// repository directories; subdirectories are left alone and per-file
    /// failures are logged and skipped. Requires either an authorized
    /// context or an event-controlled one. This does blocking disk I/O and
    /// must stay off latency-sensitive request paths.
    pub fn purge_artifact_repository(&self, ctx: &AuthContext) {
        if self.state.is_none() {
            return;
        }
        if !ctx.event_controlled && !self.authorized(ctx) {
            return;
        }

        let started = Instant::now();
        for partition in [Partition::Online, Partition::Offline] {
            let dir = self.config.artifact_root.join(partition.repository_dir());
            purge_repository_dir(&dir, partition);
        }
        histogram!(METRIC_PURGE_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        self.clear();
        info!(root = %self.config.artifact_root.display(), "Artifact repository purged");
    }
}

fn purge_repository_dir(dir: &Path, partition: Partition) {
    let listing = match fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(error) => {
            warn!(
                %error,
                dir = %dir.display(),
                partition = ?partition,
                "Artifact repository directory not readable; skipping"
            );
            return;
        }
    };

    let mut removed = 0usize;
    for item in listing {
        let path = match item {
            Ok(item) => item.path(),
            Err(error) => {
                warn!(%error, dir = %dir.display(), "Unreadable directory entry; skipping");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(error) => {
                warn!(%error, file = %path.display(), "Could not delete artifact; skipping");
            }
        }
    }

    debug!(
        dir = %dir.display(),
        partition = ?partition,
        removed,
        "Artifact repository directory purged"
    );
}

impl<K: VariationKey> CacheEventListener for RenderCache<K> {
    fn on_cache_event(&self, event: &CacheEvent) {
        // A disabled engine is never subscribed, but events handed to it
        // directly are ignored all the same.
        if self.state.is_none() {
            return;
        }

        match event.kind {
            EventKind::ProjectPublished | EventKind::ClearAllCaches => {
                info!(event_id = %event.id, kind = ?event.kind, "Event received, clearing cache");
                self.clear();
            }
            EventKind::PurgeArtifactRepository => {
                info!(event_id = %event.id, "Event received, purging artifact repository");
                self.purge_artifact_repository(&event.ctx);
            }
            EventKind::PartialClear => {
                let Some(action) = event.action() else {
                    debug!(event_id = %event.id, "Partial clear event without usable action; ignored");
                    return;
                };
                info!(event_id = %event.id, action = ?action, "Event received, clearing part of cache");
                match action {
                    ClearAction::All => self.clear_all(&event.ctx),
                    ClearAction::Entries => self.clear_entries(&event.ctx),
                    ClearAction::OnlineAll => self.clear_online(&event.ctx),
                    ClearAction::OnlineEntries => self.clear_online_entries(&event.ctx),
                    ClearAction::OfflineAll => self.clear_offline(&event.ctx),
                    ClearAction::OfflineEntries => self.clear_offline_entries(&event.ctx),
                }
            }
        }
    }
}
