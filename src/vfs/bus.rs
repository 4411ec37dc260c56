/*!
 * Event Bus
 * Publish side of watch notifications: in-process emit plus filtered
 * broadcast to connected listeners
 */

use ahash::RandomState;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace, warn};

use super::observable::EventBroadcaster;
use super::traits::ChangeKind;
use super::watch::WatchEvent;
use crate::core::limits::{EVENT_BUS_CAPACITY, LISTENER_QUEUE_CAPACITY};

/// Attributes attached to a listener connection (e.g. `username`)
pub type ListenerAttributes = BTreeMap<String, String>;

/// Predicate deciding whether a listener receives a broadcast
pub type ListenerFilter = dyn Fn(&ListenerAttributes) -> bool + Send + Sync;

/// Listener connection identifier
pub type ListenerId = u64;

/// Payload delivered to remote listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchNotice {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
}

/// Named message sent to remote listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BroadcastMessage {
    pub event: String,
    pub notice: WatchNotice,
}

impl BroadcastMessage {
    pub fn new<S: Into<String>>(event: S, notice: WatchNotice) -> Self {
        Self {
            event: event.into(),
            notice,
        }
    }
}

/// In-process event as seen by `subscribe()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusEvent {
    pub name: String,
    pub payload: WatchEvent,
}

/// Message bus injected into the watch manager
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Emit once to in-process subscribers
    fn emit(&self, event: &str, payload: WatchEvent);

    /// Deliver to every listener accepted by `filter`, returning the number
    /// of successful deliveries. Never waits on a slow listener: a full
    /// queue fails that delivery alone.
    async fn broadcast(&self, message: BroadcastMessage, filter: &ListenerFilter) -> usize;
}

struct ListenerEntry {
    attributes: ListenerAttributes,
    sender: mpsc::Sender<BroadcastMessage>,
}

/// Receiving end of a listener connection
#[derive(Debug)]
pub struct Listener {
    pub id: ListenerId,
    receiver: mpsc::Receiver<BroadcastMessage>,
}

impl Listener {
    pub async fn recv(&mut self) -> Option<BroadcastMessage> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<BroadcastMessage> {
        self.receiver.try_recv().ok()
    }
}

/// Bus for a single process: tokio broadcast for `emit`, bounded queues for
/// listeners
pub struct LocalBus {
    events: EventBroadcaster<BusEvent>,
    listeners: DashMap<ListenerId, ListenerEntry, RandomState>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUS_CAPACITY, LISTENER_QUEUE_CAPACITY)
    }

    pub fn with_capacity(event_capacity: usize, queue_capacity: usize) -> Self {
        Self {
            events: EventBroadcaster::new(event_capacity),
            listeners: DashMap::with_hasher(RandomState::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a listener connection with its attributes
    pub fn connect(&self, attributes: ListenerAttributes) -> Listener {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        self.listeners.insert(id, ListenerEntry { attributes, sender });
        debug!(listener = id, "Listener connected");
        Listener { id, receiver }
    }

    pub fn disconnect(&self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(&id).is_some();
        if removed {
            debug!(listener = id, "Listener disconnected");
        }
        removed
    }

    /// Subscribe to in-process events
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.events.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBus")
            .field("listeners", &self.listeners.len())
            .field("subscribers", &self.events.subscriber_count())
            .finish()
    }
}

#[async_trait]
impl EventBus for LocalBus {
    fn emit(&self, event: &str, payload: WatchEvent) {
        self.events.emit(BusEvent {
            name: event.to_string(),
            payload,
        });
    }

    async fn broadcast(&self, message: BroadcastMessage, filter: &ListenerFilter) -> usize {
        // Snapshot so removals below don't contend with map guards
        let targets: Vec<(ListenerId, mpsc::Sender<BroadcastMessage>)> = self
            .listeners
            .iter()
            .filter(|entry| filter(&entry.value().attributes))
            .map(|entry| (*entry.key(), entry.value().sender.clone()))
            .collect();

        let mut delivered = 0;
        for (id, sender) in targets {
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(listener = id, "Listener queue full, dropping notice");
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(listener = id, "Pruning closed listener");
                    self.listeners.remove(&id);
                }
            }
        }
        delivered
    }
}

/// Every hint key must be present on the listener with an equal value
pub fn hints_match(hints: &BTreeMap<String, String>, attributes: &ListenerAttributes) -> bool {
    hints
        .iter()
        .all(|(key, value)| attributes.get(key) == Some(value))
}
