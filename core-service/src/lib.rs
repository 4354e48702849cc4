//! # Core Service
//!
//! Primary façade exposed to host applications.
//!
//! This crate wires the local store, sync queue, and sync manager into one
//! offline-first service: host applications construct a [`TrackerService`]
//! from a [`ServiceConfig`] (injecting their backend client and connectivity
//! monitor), then work exclusively through the typed
//! [`OfflineCollection`](facade::OfflineCollection) handles. All reads are
//! local; all writes are optimistic and synchronize in the background.
//!
//! ## Usage
//!
//! ```ignore
//! use core_service::{ServiceConfig, TrackerService};
//! use core_store::Supplement;
//! use std::sync::Arc;
//!
//! # async fn example() -> core_service::Result<()> {
//! let config = ServiceConfig::builder()
//!     .database_path("tracker.db")
//!     .remote_store(Arc::new(MyBackendClient::new()))
//!     .build()?;
//!
//! let service = TrackerService::new(config).await?;
//!
//! let created = service
//!     .supplements()
//!     .create(Supplement::new("user-1", "Vitamin D3", 125.0))
//!     .await?;
//! assert!(core_store::is_local_id(created.id())); // until first sync
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod facade;

pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{CoreError, Result};
pub use facade::OfflineCollection;

use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_store::{create_pool, Bill, Grocery, LocalStore, Supplement};
use core_sync::{FlushSummary, SyncManager, SyncQueue, SyncStatus};
use std::sync::Arc;
use tracing::info;

/// Offline-first service handle. Cheap to clone; all clones share the same
/// store, queue, and manager.
#[derive(Clone)]
pub struct TrackerService {
    store: LocalStore,
    queue: SyncQueue,
    manager: Arc<SyncManager>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl TrackerService {
    /// Build the service: open the database, apply the schema, and start the
    /// sync manager.
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        let pool = create_pool(config.database).await?;

        let store = LocalStore::new(pool.clone());
        store.initialize().await?;

        let queue = SyncQueue::new(pool, Arc::clone(&config.clock)).await?;
        let event_bus = EventBus::new(config.event_buffer);

        let manager = Arc::new(SyncManager::new(
            config.sync,
            store.clone(),
            queue.clone(),
            config.remote_store,
            config.network_monitor,
            event_bus.clone(),
            Arc::clone(&config.clock),
        ));
        manager.start().await?;

        info!("Tracker service initialized");

        Ok(Self {
            store,
            queue,
            manager,
            event_bus,
            clock: config.clock,
        })
    }

    /// Typed handle for supplement regimens
    pub fn supplements(&self) -> OfflineCollection<Supplement> {
        self.collection()
    }

    /// Typed handle for the grocery purchase log
    pub fn groceries(&self) -> OfflineCollection<Grocery> {
        self.collection()
    }

    /// Typed handle for recurring bills
    pub fn bills(&self) -> OfflineCollection<Bill> {
        self.collection()
    }

    fn collection<T: core_store::DomainRecord>(&self) -> OfflineCollection<T> {
        OfflineCollection::new(
            self.store.clone(),
            self.queue.clone(),
            Arc::clone(&self.manager),
            Arc::clone(&self.clock),
        )
    }

    /// Subscribe to sync and connectivity events
    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    /// Queue depth, connectivity, and flush state for the UI
    pub async fn sync_status(&self) -> Result<SyncStatus> {
        Ok(self.manager.sync_status().await?)
    }

    /// Request a background flush pass
    pub fn flush_now(&self) {
        self.manager.flush_now();
    }

    /// Run one flush pass to completion (explicit manual trigger)
    pub async fn flush_once(&self) -> Result<FlushSummary> {
        Ok(self.manager.flush_once().await?)
    }

    /// Replace local tables with the remote snapshot (post-login)
    pub async fn bootstrap(&self, owner_id: &str) -> Result<u64> {
        Ok(self.manager.bootstrap(owner_id).await?)
    }

    /// The local store (ground truth for all reads)
    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Stop the sync manager's background tasks
    pub async fn shutdown(&self) {
        self.manager.stop().await;
        info!("Tracker service shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::network::{ManualNetworkMonitor, NetworkStatus};
    use core_store::{is_local_id, DomainRecord, EntityKind, Supplement};
    use core_sync::{MemoryRemoteStore, SyncConfig};
    use serde_json::json;

    async fn test_service(remote: Arc<MemoryRemoteStore>) -> TrackerService {
        let config = ServiceConfig::builder()
            .in_memory()
            .remote_store(remote)
            .build()
            .unwrap();
        TrackerService::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_returns_local_id_immediately() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let service = test_service(remote.clone()).await;

        let created = service
            .supplements()
            .create(Supplement::new("user-1", "Vitamin D3", 125.0))
            .await
            .unwrap();

        assert!(is_local_id(created.id()));
        assert!(created.updated_at() > 0);

        // The write is already visible to reads, before any sync
        let listed = service.supplements().list("user-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);

        // Nothing has reached the remote store yet
        assert_eq!(remote.count(EntityKind::Supplement).await, 0);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_create_validation_fails_synchronously() {
        let service = test_service(Arc::new(MemoryRemoteStore::new())).await;

        let err = service
            .supplements()
            .create(Supplement::new("user-1", "", 10.0))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::InvalidInput { .. }));
        assert_eq!(service.sync_status().await.unwrap().pending, 0);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_offline_lifecycle_syncs_on_flush() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let service = test_service(remote.clone()).await;

        let created = service
            .supplements()
            .create(Supplement::new("user-1", "Vitamin D3", 125.0))
            .await
            .unwrap();
        service
            .supplements()
            .update(created.id(), json!({ "dose_mg": 250.0 }))
            .await
            .unwrap();

        let summary = service.flush_once().await.unwrap();
        // Update folded into the pending create: one item total
        assert_eq!(summary.synced, 1);

        // Local record now keyed by the server id, with the folded dose
        let listed = service.supplements().list("user-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!is_local_id(listed[0].id()));
        assert_eq!(listed[0].dose_mg, 250.0);

        let remote_payload = remote
            .record(EntityKind::Supplement, listed[0].id())
            .await
            .unwrap();
        assert_eq!(remote_payload["dose_mg"], 250.0);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let service = test_service(Arc::new(MemoryRemoteStore::new())).await;

        let err = service
            .supplements()
            .update("nope", json!({ "dose_mg": 1.0 }))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::NotFound { .. }));
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_before_sync_never_contacts_remote() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let service = test_service(remote.clone()).await;

        let created = service
            .supplements()
            .create(Supplement::new("user-1", "Vitamin D3", 125.0))
            .await
            .unwrap();
        service.supplements().delete(created.id()).await.unwrap();

        assert!(service
            .supplements()
            .get(created.id())
            .await
            .unwrap()
            .is_none());

        service.flush_once().await.unwrap();
        assert!(remote.journal().await.is_empty());

        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_connectivity_edge_drains_queue() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let monitor = Arc::new(ManualNetworkMonitor::new(NetworkStatus::Disconnected));

        let config = ServiceConfig::builder()
            .in_memory()
            .remote_store(remote.clone())
            .network_monitor(monitor.clone())
            .sync(SyncConfig {
                debounce_ms: 10,
                ..SyncConfig::default()
            })
            .build()
            .unwrap();
        let service = TrackerService::new(config).await.unwrap();

        service
            .supplements()
            .create(Supplement::new("user-1", "Vitamin D3", 125.0))
            .await
            .unwrap();
        assert_eq!(service.sync_status().await.unwrap().pending, 1);

        // Give the connectivity listener time to subscribe before the edge
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        monitor.set_status(NetworkStatus::Connected);

        // The connectivity edge schedules a background pass; poll until it
        // lands rather than assuming scheduling order.
        let mut drained = false;
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if service.sync_status().await.unwrap().pending == 0 {
                drained = true;
                break;
            }
        }
        assert!(drained, "queue should drain after connectivity returns");
        assert_eq!(remote.count(EntityKind::Supplement).await, 1);

        service.shutdown().await;
    }
}
