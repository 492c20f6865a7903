//! Cache lifecycle events.
//!
//! The surrounding system announces publishes and administrative flushes as
//! events; the cache reacts by invalidating itself. Only the handling side
//! lives here — the transport is whatever the embedding application uses,
//! reduced to an in-process [`EventHub`] the cache is subscribed to at
//! composition time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::gate::AuthContext;
use crate::lock::{rw_read, rw_write};

const SOURCE: &str = "fresco::events";

/// Payload key carrying the [`ClearAction`] wire code on partial-clear events.
pub const ACTION_KEY: &str = "action";

/// Monotonic epoch for ordering events within this process.
pub type Epoch = u64;

/// Types of lifecycle events the cache reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A project was published; the whole cache is stale.
    ProjectPublished,
    /// All system caches were asked to flush.
    ClearAllCaches,
    /// The on-disk artifact repository should be purged.
    PurgeArtifactRepository,
    /// A parameterized partial clear; the action code rides in the payload.
    PartialClear,
}

/// Wire-coded partial-clear actions.
///
/// The codes are stable: external tooling puts them in event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearAction {
    All,
    Entries,
    OnlineAll,
    OnlineEntries,
    OfflineAll,
    OfflineEntries,
}

impl ClearAction {
    /// The integer wire code for this action.
    pub fn code(self) -> i64 {
        match self {
            ClearAction::All => 0,
            ClearAction::Entries => 1,
            ClearAction::OnlineAll => 2,
            ClearAction::OnlineEntries => 3,
            ClearAction::OfflineAll => 4,
            ClearAction::OfflineEntries => 5,
        }
    }

    /// Decode a wire code, `None` for unknown codes.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ClearAction::All),
            1 => Some(ClearAction::Entries),
            2 => Some(ClearAction::OnlineAll),
            3 => Some(ClearAction::OnlineEntries),
            4 => Some(ClearAction::OfflineAll),
            5 => Some(ClearAction::OfflineEntries),
            _ => None,
        }
    }
}

/// A lifecycle event delivered to cache listeners.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    /// Unique identifier for idempotency and log correlation.
    pub id: Uuid,
    /// Monotonic epoch assigned at publish time.
    pub epoch: Epoch,
    /// The type of event.
    pub kind: EventKind,
    /// Opaque payload; partial clears carry their action code here.
    pub payload: Option<Map<String, Value>>,
    /// Authorization context of whoever raised the event.
    pub ctx: AuthContext,
    /// When the event was created.
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    /// Create a new event with the given kind and epoch.
    pub fn new(kind: EventKind, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            kind,
            payload: None,
            ctx: AuthContext::anonymous(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_context(mut self, ctx: AuthContext) -> Self {
        self.ctx = ctx;
        self
    }

    /// Decode the partial-clear action from the payload.
    ///
    /// A missing payload, missing key, wrong-typed value, or unknown code
    /// all yield `None`; the event is then ignored without error.
    pub fn action(&self) -> Option<ClearAction> {
        self.payload
            .as_ref()?
            .get(ACTION_KEY)?
            .as_i64()
            .and_then(ClearAction::from_code)
    }
}

/// Receives lifecycle events. Implemented by the cache engine.
pub trait CacheEventListener: Send + Sync {
    fn on_cache_event(&self, event: &CacheEvent);
}

/// Handle identifying one subscription on an [`EventHub`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

/// In-process event hub with synchronous dispatch.
///
/// The composition root subscribes the cache engine here (only when the
/// cache is enabled) and owns the returned [`SubscriberId`] for
/// unsubscription at shutdown. Dispatch happens on the publisher's thread,
/// which may race with in-flight reads and writes; every listener operation
/// must tolerate that.
pub struct EventHub {
    listeners: RwLock<Vec<(SubscriberId, Arc<dyn CacheEventListener>)>>,
    epoch_counter: AtomicU64,
    subscriber_counter: AtomicU64,
}

impl EventHub {
    /// Create a hub with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            epoch_counter: AtomicU64::new(0),
            subscriber_counter: AtomicU64::new(0),
        }
    }

    /// Get the next epoch number.
    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Register a listener and return its subscription handle.
    pub fn subscribe(&self, listener: Arc<dyn CacheEventListener>) -> SubscriberId {
        let id = SubscriberId(self.subscriber_counter.fetch_add(1, Ordering::SeqCst));
        rw_write(&self.listeners, SOURCE, "subscribe").push((id, listener));
        id
    }

    /// Remove a listener. Returns false if the handle was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut listeners = rw_write(&self.listeners, SOURCE, "unsubscribe");
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        rw_read(&self.listeners, SOURCE, "listener_count").len()
    }

    /// Build an event and deliver it to every listener.
    pub fn publish(
        &self,
        kind: EventKind,
        payload: Option<Map<String, Value>>,
        ctx: AuthContext,
    ) {
        let epoch = self.next_epoch();
        let mut event = CacheEvent::new(kind, epoch).with_context(ctx);
        if let Some(payload) = payload {
            event = event.with_payload(payload);
        }

        // Observable: log event dispatch
        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Cache event dispatching"
        );

        // Snapshot so a listener may subscribe/unsubscribe reentrantly.
        let listeners: Vec<Arc<dyn CacheEventListener>> =
            rw_read(&self.listeners, SOURCE, "publish")
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect();

        for listener in listeners {
            listener.on_cache_event(&event);
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder {
        seen: Mutex<Vec<(EventKind, Epoch)>>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl CacheEventListener for Recorder {
        fn on_cache_event(&self, event: &CacheEvent) {
            self.seen
                .lock()
                .unwrap()
                .push((event.kind, event.epoch));
        }
    }

    #[test]
    fn clear_action_codes_round_trip() {
        for action in [
            ClearAction::All,
            ClearAction::Entries,
            ClearAction::OnlineAll,
            ClearAction::OnlineEntries,
            ClearAction::OfflineAll,
            ClearAction::OfflineEntries,
        ] {
            assert_eq!(ClearAction::from_code(action.code()), Some(action));
        }
        assert_eq!(ClearAction::from_code(6), None);
        assert_eq!(ClearAction::from_code(-1), None);
    }

    #[test]
    fn action_decoding_tolerates_malformed_payloads() {
        let event = CacheEvent::new(EventKind::PartialClear, 0);
        assert_eq!(event.action(), None);

        let mut payload = Map::new();
        payload.insert("unrelated".to_string(), Value::from(3));
        let event = CacheEvent::new(EventKind::PartialClear, 0).with_payload(payload);
        assert_eq!(event.action(), None);

        let mut payload = Map::new();
        payload.insert(ACTION_KEY.to_string(), Value::from("three"));
        let event = CacheEvent::new(EventKind::PartialClear, 0).with_payload(payload);
        assert_eq!(event.action(), None);

        let mut payload = Map::new();
        payload.insert(ACTION_KEY.to_string(), Value::from(4));
        let event = CacheEvent::new(EventKind::PartialClear, 0).with_payload(payload);
        assert_eq!(event.action(), Some(ClearAction::OfflineAll));
    }

    #[test]
    fn epoch_monotonicity() {
        let hub = EventHub::new();

        let e1 = hub.next_epoch();
        let e2 = hub.next_epoch();
        let e3 = hub.next_epoch();

        assert!(e1 < e2);
        assert!(e2 < e3);
    }

    #[test]
    fn publish_reaches_subscribers_in_order() {
        let hub = EventHub::new();
        let recorder = Arc::new(Recorder::new());
        hub.subscribe(recorder.clone());

        hub.publish(EventKind::ProjectPublished, None, AuthContext::anonymous());
        hub.publish(EventKind::ClearAllCaches, None, AuthContext::anonymous());

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, EventKind::ProjectPublished);
        assert_eq!(seen[1].0, EventKind::ClearAllCaches);
        assert!(seen[0].1 < seen[1].1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let hub = EventHub::new();
        let recorder = Arc::new(Recorder::new());
        let id = hub.subscribe(recorder.clone());
        assert_eq!(hub.listener_count(), 1);

        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
        assert_eq!(hub.listener_count(), 0);

        hub.publish(EventKind::ProjectPublished, None, AuthContext::anonymous());
        assert!(recorder.seen.lock().unwrap().is_empty());
    }
}
