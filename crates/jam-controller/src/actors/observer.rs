//! Observer handles and the per-room fan-out set.
//!
//! An observer is one live gateway connection. The gateway owns the
//! connection itself; actors hold only an [`ObserverHandle`] (id + event
//! sender) and use [`FanoutSet`] to broadcast. Delivery is best-effort:
//! a full or closed observer channel drops the event for that observer
//! only, and its own disconnect handling reconciles state afterwards.

use crate::gateway::protocol::ServerEvent;

use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Buffer size for a single observer's outbound event channel.
pub const OBSERVER_CHANNEL_BUFFER: usize = 64;

/// Unique identifier for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(Uuid);

impl ObserverId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sending side of one observer's event stream.
///
/// Cheap to clone; the gateway keeps the receiving side and pumps events
/// onto the wire.
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    id: ObserverId,
    sender: mpsc::Sender<ServerEvent>,
}

impl ObserverHandle {
    #[must_use]
    pub fn new(id: ObserverId, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self { id, sender }
    }

    /// Create a handle with a fresh id, returning the receiving side.
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(OBSERVER_CHANNEL_BUFFER);
        (Self::new(ObserverId::new(), sender), receiver)
    }

    /// Get the observer ID.
    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Deliver one event, best-effort. A slow or disconnected observer
    /// loses the event rather than blocking the room.
    pub fn emit(&self, event: ServerEvent) {
        if let Err(err) = self.sender.try_send(event) {
            debug!(
                target: "jc.broadcast",
                observer_id = %self.id,
                error = %err,
                "Dropped event for observer"
            );
            metrics::counter!("jc_events_dropped_total").increment(1);
        }
    }
}

/// The set of observers subscribed to one room (or to the global
/// `sessionCreated` feed).
#[derive(Debug, Default)]
pub struct FanoutSet {
    observers: HashMap<ObserverId, ObserverHandle>,
}

impl FanoutSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer; no effect if already subscribed.
    pub fn subscribe(&mut self, observer: ObserverHandle) {
        self.observers.entry(observer.id()).or_insert(observer);
    }

    /// Remove an observer; no effect if absent.
    pub fn unsubscribe(&mut self, observer_id: ObserverId) {
        self.observers.remove(&observer_id);
    }

    /// Whether the observer is currently subscribed.
    #[must_use]
    pub fn contains(&self, observer_id: ObserverId) -> bool {
        self.observers.contains_key(&observer_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Deliver an event to every subscribed observer, optionally skipping
    /// one (the originator of the change).
    pub fn broadcast(&self, event: &ServerEvent, except: Option<ObserverId>) {
        for observer in self.observers.values() {
            if Some(observer.id()) == except {
                continue;
            }
            observer.emit(event.clone());
        }
    }

    /// Remove and return all observers (used when a room turns terminal).
    pub fn drain(&mut self) -> Vec<ObserverHandle> {
        self.observers.drain().map(|(_, handle)| handle).collect()
    }
}
