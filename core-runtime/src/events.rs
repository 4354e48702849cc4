//! # Event Bus System
//!
//! Typed broadcast events over `tokio::sync::broadcast`, decoupling the sync
//! engine from whatever host surface wants to observe it.
//!
//! ## Overview
//!
//! - **Event types**: [`CoreEvent`] wraps per-domain enums ([`SyncEvent`],
//!   [`ConnectivityEvent`]) so subscribers match on exactly the transitions
//!   they care about
//! - **[`EventBus`]**: one broadcast channel; clone to publish, `subscribe()`
//!   for an independent receiver
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, SyncEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::FlushStarted { pending: 3 }))
//!     .ok();
//! ```
//!
//! ## Error Handling
//!
//! Receivers see `RecvError::Lagged(n)` after missing `n` events (non-fatal,
//! keep receiving) and `RecvError::Closed` once every sender is gone
//! (shutdown). Emitting with no subscribers errs; fire-and-forget callers
//! write `emit(...).ok()`.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall behind by more than this amount receive
/// `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
///
/// This is the main event type published and received through the event bus.
/// It wraps domain-specific event types for different modules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Synchronization-related events
    Sync(SyncEvent),
    /// Connectivity transitions observed by the sync engine
    Connectivity(ConnectivityEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Connectivity(e) => e.description(),
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events emitted by the sync engine during flush passes and bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A flush pass started.
    FlushStarted {
        /// Number of pending queue items at the start of the pass.
        pending: u64,
    },
    /// One queue item was synced to the remote store.
    ItemSynced {
        /// Entity kind of the synced record.
        entity: String,
        /// Server-assigned id of the record.
        server_id: String,
    },
    /// One queue item failed and will be retried on a later pass.
    ItemFailed {
        /// Entity kind of the failed record.
        entity: String,
        /// Human-readable error message.
        message: String,
        /// Number of attempts so far.
        attempts: u32,
    },
    /// One queue item was moved to the dead-letter state and will not be
    /// retried automatically.
    ItemDeadLettered {
        /// Entity kind of the record.
        entity: String,
        /// Human-readable error message.
        message: String,
    },
    /// A flush pass finished.
    FlushCompleted {
        /// Items synced (and pruned) during the pass.
        synced: u64,
        /// Items that failed during the pass.
        failed: u64,
    },
    /// A bootstrap replaced local tables with the remote snapshot.
    BootstrapCompleted {
        /// Total records fetched across all entity kinds.
        records: u64,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::FlushStarted { .. } => "Flush pass started",
            SyncEvent::ItemSynced { .. } => "Queue item synced",
            SyncEvent::ItemFailed { .. } => "Queue item failed",
            SyncEvent::ItemDeadLettered { .. } => "Queue item dead-lettered",
            SyncEvent::FlushCompleted { .. } => "Flush pass completed",
            SyncEvent::BootstrapCompleted { .. } => "Bootstrap completed",
        }
    }
}

// ============================================================================
// Connectivity Events
// ============================================================================

/// Connectivity transitions, re-broadcast from the host network monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectivityEvent {
    /// The host became reachable; a flush attempt follows.
    Online,
    /// The host became unreachable; writes keep landing in the queue.
    Offline,
}

impl ConnectivityEvent {
    fn description(&self) -> &str {
        match self {
            ConnectivityEvent::Online => "Connectivity restored",
            ConnectivityEvent::Offline => "Connectivity lost",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel carrying [`CoreEvent`]s between the core and its hosts.
///
/// Cloning the bus clones the sender side; every `subscribe()` call hands out
/// an independent receiver. Sends never block, and subscribers that fall
/// behind the buffer see `RecvError::Lagged` rather than stalling the
/// publisher.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a bus whose subscribers may lag by up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns how many subscribers received it; errs when nobody is
    /// listening (fire-and-forget callers use `emit(...).ok()`).
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Open an independent receiver for all future events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(CoreEvent::Sync(SyncEvent::FlushStarted { pending: 2 }))
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            CoreEvent::Sync(SyncEvent::FlushStarted { pending: 2 })
        );
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(CoreEvent::Connectivity(ConnectivityEvent::Online))
            .unwrap();

        assert!(matches!(
            a.recv().await.unwrap(),
            CoreEvent::Connectivity(ConnectivityEvent::Online)
        ));
        assert!(matches!(
            b.recv().await.unwrap(),
            CoreEvent::Connectivity(ConnectivityEvent::Online)
        ));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(8);
        assert!(bus
            .emit(CoreEvent::Connectivity(ConnectivityEvent::Offline))
            .is_err());
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Sync(SyncEvent::ItemSynced {
            entity: "supplement".to_string(),
            server_id: "42".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("ItemSynced"));
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            CoreEvent::Sync(SyncEvent::FlushCompleted {
                synced: 1,
                failed: 0
            })
            .description(),
            "Flush pass completed"
        );
        assert_eq!(
            CoreEvent::Connectivity(ConnectivityEvent::Offline).description(),
            "Connectivity lost"
        );
    }
}
