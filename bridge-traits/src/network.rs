//! Network Monitoring Abstraction
//!
//! Provides network connectivity state and change notifications.
//!
//! The sync engine treats connectivity as advisory: a `Connected` status is a
//! hint to attempt a flush, not a guarantee that the remote store is reachable.
//! Individual call failures still must be handled by the caller.

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use crate::error::Result;

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to a network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

/// Network monitor trait
///
/// Provides connectivity information so the core can defer sync operations
/// while offline and schedule a flush pass when connectivity returns.
///
/// # Platform Support
///
/// - **Desktop**: System network APIs (NetworkManager, SystemConfiguration,
///   Windows Network List Manager)
/// - **Mobile**: Reachability / ConnectivityManager
/// - **Tests**: [`ManualNetworkMonitor`]
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get the current connectivity status
    async fn status(&self) -> Result<NetworkStatus>;

    /// Check if currently connected to any network
    async fn is_connected(&self) -> bool {
        matches!(self.status().await, Ok(NetworkStatus::Connected))
    }

    /// Subscribe to connectivity changes
    ///
    /// Returns a stream of status updates. Implementations should emit an
    /// event whenever the connectivity status changes (edge-triggered).
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of network status changes
#[async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next status update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkStatus>;
}

/// In-process network monitor driven by explicit status updates.
///
/// Used by test harnesses and headless hosts that learn about connectivity
/// from an external source and push it in via [`ManualNetworkMonitor::set_status`].
#[derive(Clone)]
pub struct ManualNetworkMonitor {
    current: watch::Sender<NetworkStatus>,
    changes: broadcast::Sender<NetworkStatus>,
}

impl ManualNetworkMonitor {
    /// Create a monitor with the given initial status
    pub fn new(initial: NetworkStatus) -> Self {
        let (current, _) = watch::channel(initial);
        let (changes, _) = broadcast::channel(16);
        Self { current, changes }
    }

    /// Update the connectivity status and notify subscribers
    pub fn set_status(&self, status: NetworkStatus) {
        let changed = *self.current.borrow() != status;
        self.current.send_replace(status);
        if changed {
            self.changes.send(status).ok();
        }
    }
}

impl Default for ManualNetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkStatus::Indeterminate)
    }
}

#[async_trait]
impl NetworkMonitor for ManualNetworkMonitor {
    async fn status(&self) -> Result<NetworkStatus> {
        Ok(*self.current.borrow())
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(ManualChangeStream {
            rx: self.changes.subscribe(),
        }))
    }
}

struct ManualChangeStream {
    rx: broadcast::Receiver<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for ManualChangeStream {
    async fn next(&mut self) -> Option<NetworkStatus> {
        loop {
            match self.rx.recv().await {
                Ok(status) => return Some(status),
                // A lagged subscriber only missed intermediate states; the
                // next successful recv carries a current-enough edge.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
