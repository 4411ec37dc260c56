/*!
 * Watch Manager
 * One native watch session per mountpoint, translated and fanned out
 * through the event bus
 */

use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use futures::StreamExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::bus::{hints_match, BroadcastMessage, EventBus, ListenerAttributes, WatchNotice};
use super::traits::{Adapter, ChangeKind, RawChange, WatchCloser, WatchStream};
use super::types::*;
use crate::core::limits::WATCH_CHANGE_EVENT;

/// Domain event produced from a native change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchEvent {
    pub mountpoint_id: MountId,
    pub mountpoint: String,
    /// Mountpoint-qualified path (`name:/dir`)
    pub target: String,
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub hints: BTreeMap<String, String>,
}

impl WatchEvent {
    pub fn translate(mountpoint: &Mountpoint, raw: RawChange) -> Self {
        Self {
            mountpoint_id: mountpoint.id,
            mountpoint: mountpoint.name.clone(),
            target: mountpoint.virtual_path(&raw.dir),
            kind: raw.kind,
            hints: raw.hints,
        }
    }

    pub fn notice(&self) -> WatchNotice {
        WatchNotice {
            path: self.target.clone(),
            kind: self.kind,
        }
    }
}

/// Translate one native change, emit it in-process, then broadcast it to
/// the listeners whose attributes satisfy every hint. Returns the number of
/// listeners reached.
pub async fn dispatch(bus: &dyn EventBus, mountpoint: &Mountpoint, raw: RawChange) -> usize {
    let event = WatchEvent::translate(mountpoint, raw);
    let message = BroadcastMessage::new(WATCH_CHANGE_EVENT, event.notice());
    let hints = event.hints.clone();

    bus.emit(WATCH_CHANGE_EVENT, event);

    let filter = move |attributes: &ListenerAttributes| hints_match(&hints, attributes);
    bus.broadcast(message, &filter).await
}

/// An open watch on one mountpoint
///
/// Dropping the session cancels its event loop; `close()` additionally
/// waits for the loop to finish and releases the native handle.
pub struct WatchSession {
    mountpoint_id: MountId,
    name: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    closer: Option<WatchCloser>,
}

impl WatchSession {
    /// Start the event loop for an opened native watch
    pub fn start(
        mountpoint: Arc<Mountpoint>,
        events: WatchStream,
        closer: Option<WatchCloser>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let mountpoint_id = mountpoint.id;
        let name = mountpoint.name.clone();
        let task = tokio::spawn(run_session(mountpoint, events, bus, cancel.clone()));

        Self {
            mountpoint_id,
            name,
            cancel,
            task: Some(task),
            closer,
        }
    }

    pub fn mountpoint_id(&self) -> MountId {
        self.mountpoint_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() && self.task.is_none() && self.closer.is_none()
    }

    /// Stop the event loop and release the native watch. Idempotent.
    pub async fn close(&mut self) -> VfsResult<()> {
        self.cancel.cancel();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(mountpoint = %self.name, "Watch task panicked");
                }
            }
        }

        match self.closer.take() {
            Some(closer) => closer().await.map_err(|e| VfsError::WatchSetup {
                mountpoint: self.name.clone(),
                reason: format!("close failed: {}", e),
            }),
            None => Ok(()),
        }
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("mountpoint_id", &self.mountpoint_id)
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run_session(
    mountpoint: Arc<Mountpoint>,
    mut events: WatchStream,
    bus: Arc<dyn EventBus>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = events.next() => match next {
                Some(Ok(raw)) => {
                    // Finish delivering this event before reading the next one
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = dispatch(bus.as_ref(), &mountpoint, raw) => {}
                    }
                }
                Some(Err(e)) => {
                    warn!(mountpoint = %mountpoint.name, error = %e, "Watch error");
                }
                None => {
                    debug!(mountpoint = %mountpoint.name, "Watch stream ended");
                    break;
                }
            }
        }
    }
}

/// Close every session, continuing past individual failures. Returns the
/// number of sessions closed cleanly.
pub async fn close_watches(sessions: Vec<WatchSession>) -> usize {
    let results = join_all(sessions.into_iter().map(|mut session| async move {
        let result = session.close().await;
        (session.name.clone(), result)
    }))
    .await;

    results
        .into_iter()
        .filter(|(name, result)| match result {
            Ok(()) => true,
            Err(e) => {
                warn!(mountpoint = %name, error = %e, "Failed to close watch");
                false
            }
        })
        .count()
}

/// Owns the active watch sessions, keyed by mountpoint id
pub struct WatchManager {
    bus: Arc<dyn EventBus>,
    enabled: bool,
    sessions: DashMap<MountId, WatchSession, RandomState>,
}

impl WatchManager {
    pub fn new(bus: Arc<dyn EventBus>, enabled: bool) -> Self {
        Self {
            bus,
            enabled,
            sessions: DashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Open a watch for a mountpoint if it asks for one and the adapter can
    /// provide it. Returns whether a new session was started.
    pub async fn watch(
        &self,
        mountpoint: &Arc<Mountpoint>,
        adapter: &Arc<dyn Adapter>,
    ) -> VfsResult<bool> {
        let attributes = &mountpoint.attributes;
        if !attributes.watch || !self.enabled || attributes.root.is_none() {
            return Ok(false);
        }

        if !adapter.capabilities().contains(Capability::Watch) {
            debug!(
                mountpoint = %mountpoint.name,
                adapter = adapter.name(),
                "Adapter cannot watch"
            );
            return Ok(false);
        }

        if self.sessions.contains_key(&mountpoint.id) {
            return Ok(false);
        }

        let native = adapter
            .watch(mountpoint)
            .await
            .map_err(|e| VfsError::WatchSetup {
                mountpoint: mountpoint.name.clone(),
                reason: e.to_string(),
            })?;

        let (events, closer) = native.into_parts();
        let session = WatchSession::start(Arc::clone(mountpoint), events, closer, Arc::clone(&self.bus));

        let rejected = match self.sessions.entry(mountpoint.id) {
            Entry::Occupied(_) => Some(session),
            Entry::Vacant(slot) => {
                slot.insert(session);
                None
            }
        };

        if let Some(mut session) = rejected {
            if let Err(e) = session.close().await {
                warn!(mountpoint = %mountpoint.name, error = %e, "Failed to close duplicate watch");
            }
            return Ok(false);
        }

        info!(mountpoint = %mountpoint.name, "Watching mountpoint");
        Ok(true)
    }

    /// Close and forget the session for a mountpoint. Returns whether one
    /// existed; close failures are logged.
    pub async fn unwatch(&self, id: MountId) -> bool {
        let Some((_, mut session)) = self.sessions.remove(&id) else {
            return false;
        };

        match session.close().await {
            Ok(()) => debug!(mountpoint = %session.name, "Watch closed"),
            Err(e) => warn!(mountpoint = %session.name, error = %e, "Failed to close watch"),
        }
        true
    }

    /// Close all sessions greedily
    pub async fn close_all(&self) -> usize {
        let ids: Vec<MountId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let sessions: Vec<WatchSession> = ids
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id).map(|(_, session)| session))
            .collect();

        close_watches(sessions).await
    }

    pub fn is_watching(&self, id: MountId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl std::fmt::Debug for WatchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchManager")
            .field("enabled", &self.enabled)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
