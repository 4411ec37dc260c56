/*!
 * Observable VFS - In-process event fan-out
 * Thin wrapper over a tokio broadcast channel
 */

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::core::limits::EVENT_BUS_CAPACITY;

/// Event broadcaster
/// Uses tokio broadcast channel for lock-free MPMC
#[derive(Debug)]
pub struct EventBroadcaster<T> {
    sender: Arc<broadcast::Sender<T>>,
}

impl<T> Clone for EventBroadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T: Clone> EventBroadcaster<T> {
    /// Create new broadcaster with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Emit event to all subscribers, returning how many received it
    pub fn emit(&self, event: T) -> usize {
        // No subscribers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventBroadcaster<T> {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}
