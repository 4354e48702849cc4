//! # Sync Manager
//!
//! The active component of the sync engine: watches connectivity, debounces
//! and drives flush passes, reconciles device-minted ids with server-assigned
//! ones, and garbage-collects completed queue entries.
//!
//! ## Flush scheduling
//!
//! The manager is either `Idle` or `Flushing`. A transition to `Flushing`
//! happens on:
//! 1. a connectivity-restored edge from the host [`NetworkMonitor`],
//! 2. expiry of the debounce timer armed by [`SyncManager::notify_local_write`]
//!    while online, or
//! 3. an explicit [`SyncManager::flush_now`] call.
//!
//! Flush requests arriving while a pass is running are coalesced: the running
//! pass finishes its snapshot of the queue, and anything enqueued meanwhile
//! waits for the next trigger. "Mostly caught up" is the contract, not
//! "fully caught up".
//!
//! ## Per-item processing
//!
//! Items are processed one at a time in enqueue order, each remote call
//! bounded by a timeout that converts a hang into a transient failure. One
//! item's failure never blocks the rest of the pass: the item keeps its queue
//! slot (or moves to the dead-letter state) and the pass continues.
//!
//! A successful `create` swaps the local record atomically: the server id is
//! first recorded durably on the queue item, then the local-id row is
//! replaced by a server-id row in one store transaction. If the swap fails
//! after the remote insert succeeded, the retry sees the recorded server id
//! and redoes only the swap, so the remote store is never double-inserted.

use bridge_traits::network::{NetworkMonitor, NetworkStatus};
use bridge_traits::time::Clock;
use core_runtime::events::{ConnectivityEvent, CoreEvent, EventBus, SyncEvent};
use core_store::{EntityKind, LocalStore, StoredRecord};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::queue::{Mutation, QueueItem, QueueItemStatus, SyncQueue};
use crate::remote::{RemoteError, RemoteResult, RemoteStore};

/// Metadata key holding the Unix-millisecond timestamp of the last completed
/// flush pass
pub const META_LAST_FLUSH_AT: &str = "last_flush_at";

/// Metadata key holding the Unix-millisecond timestamp of the last completed
/// bootstrap
pub const META_LAST_FULL_SYNC_AT: &str = "last_full_sync_at";

/// Sync manager configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Debounce window after the most recent local write before a flush pass
    /// is triggered (milliseconds)
    pub debounce_ms: u64,

    /// Timeout for one remote call; a hang becomes a transient failure
    /// instead of stalling the pass (milliseconds)
    pub item_timeout_ms: u64,

    /// Transient failures per item before it is dead-lettered
    pub max_retry_attempts: u32,

    /// Bootstrap window for the high-volume grocery log: only entries
    /// updated within this many days are fetched
    pub grocery_bootstrap_days: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            item_timeout_ms: 30_000,
            max_retry_attempts: 5,
            grocery_bootstrap_days: 90,
        }
    }
}

/// Manager flush state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ManagerState {
    /// No flush pass is running
    Idle,
    /// A flush pass is traversing the queue
    Flushing,
}

/// Snapshot of the sync engine for the UI
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SyncStatus {
    /// Items waiting to sync
    pub pending: u64,
    /// Items in the dead-letter state
    pub dead: u64,
    /// Last known connectivity (advisory)
    pub online: bool,
    /// Current flush state
    pub state: ManagerState,
}

/// Result of one flush pass
#[derive(Debug, Clone, Copy, Default)]
pub struct FlushSummary {
    /// Items applied to the remote store during the pass
    pub synced: u64,
    /// Items that failed during the pass
    pub failed: u64,
    /// True when the pass was skipped because another was already running
    pub skipped: bool,
}

#[derive(Debug, Clone, Copy)]
enum FlushTrigger {
    Debounce,
    Connectivity,
    Manual,
}

struct ManagerInner {
    config: SyncConfig,
    store: LocalStore,
    queue: SyncQueue,
    remote: Arc<dyn RemoteStore>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    online: AtomicBool,
    in_flight: AtomicBool,
    debounce_gen: AtomicU64,
    trigger_tx: mpsc::Sender<FlushTrigger>,
}

/// Owns the flush lifecycle. Constructed once at startup and shared (via
/// `Arc`) with everything that needs to trigger a flush; there is no ambient
/// process-wide state.
pub struct SyncManager {
    inner: Arc<ManagerInner>,
    monitor: Option<Arc<dyn NetworkMonitor>>,
    cancel: CancellationToken,
    trigger_rx: Mutex<Option<mpsc::Receiver<FlushTrigger>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncManager {
    /// Create a manager. Call [`SyncManager::start`] to spawn the background
    /// tasks.
    ///
    /// Without a network monitor the manager assumes it is online; remote
    /// call failures still classify and retry normally.
    pub fn new(
        config: SyncConfig,
        store: LocalStore,
        queue: SyncQueue,
        remote: Arc<dyn RemoteStore>,
        monitor: Option<Arc<dyn NetworkMonitor>>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(16);

        let inner = Arc::new(ManagerInner {
            config,
            store,
            queue,
            remote,
            event_bus,
            clock,
            online: AtomicBool::new(monitor.is_none()),
            in_flight: AtomicBool::new(false),
            debounce_gen: AtomicU64::new(0),
            trigger_tx,
        });

        Self {
            inner,
            monitor,
            cancel: CancellationToken::new(),
            trigger_rx: Mutex::new(Some(trigger_rx)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the flush worker and, when a monitor is present, the
    /// connectivity listener.
    pub async fn start(&self) -> Result<()> {
        let mut rx_slot = self.trigger_rx.lock().await;
        let Some(mut rx) = rx_slot.take() else {
            return Err(SyncError::AlreadyStarted);
        };
        drop(rx_slot);

        let mut tasks = self.tasks.lock().await;

        // Flush worker: drains triggers serially. Bursts collapse into one
        // pass; anything enqueued mid-pass waits for the next trigger.
        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    trigger = rx.recv() => {
                        let Some(trigger) = trigger else { break };
                        while rx.try_recv().is_ok() {}
                        debug!(?trigger, "Flush trigger received");
                        if let Err(e) = run_flush_pass(&inner).await {
                            error!(error = %e, "Flush pass failed");
                        }
                    }
                }
            }
        }));

        if let Some(monitor) = &self.monitor {
            let inner = Arc::clone(&self.inner);
            let monitor = Arc::clone(monitor);
            let cancel = self.cancel.clone();
            tasks.push(tokio::spawn(async move {
                // Seed the advisory flag and attempt a catch-up flush if the
                // device starts out reachable with a non-empty queue.
                if monitor.is_connected().await {
                    inner.online.store(true, Ordering::SeqCst);
                    inner.trigger_tx.try_send(FlushTrigger::Connectivity).ok();
                }

                let mut stream = match monitor.subscribe_changes().await {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(error = %e, "Network monitor subscription failed; sync runs on triggers only");
                        return;
                    }
                };

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        status = stream.next() => match status {
                            Some(NetworkStatus::Connected) => {
                                info!("Connectivity restored");
                                inner.online.store(true, Ordering::SeqCst);
                                inner
                                    .event_bus
                                    .emit(CoreEvent::Connectivity(ConnectivityEvent::Online))
                                    .ok();
                                inner.trigger_tx.try_send(FlushTrigger::Connectivity).ok();
                            }
                            Some(_) => {
                                info!("Connectivity lost");
                                inner.online.store(false, Ordering::SeqCst);
                                inner
                                    .event_bus
                                    .emit(CoreEvent::Connectivity(ConnectivityEvent::Offline))
                                    .ok();
                            }
                            None => break,
                        },
                    }
                }
            }));
        }

        info!("Sync manager started");
        Ok(())
    }

    /// Cancel the background tasks and wait for them to finish
    pub async fn stop(&self) {
        self.cancel.cancel();
        let tasks = {
            let mut tasks = self.tasks.lock().await;
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            task.await.ok();
        }
        info!("Sync manager stopped");
    }

    /// Arm (or re-arm) the debounce timer after a local write.
    ///
    /// Each call within the window resets it; exactly one trigger fires at
    /// expiry. While offline this is a no-op: the queue drains on the next
    /// connectivity-restored edge.
    pub fn notify_local_write(&self) {
        if !self.inner.online.load(Ordering::SeqCst) {
            return;
        }

        let generation = self.inner.debounce_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(inner.config.debounce_ms)) => {
                    let still_current =
                        inner.debounce_gen.load(Ordering::SeqCst) == generation;
                    if still_current && inner.online.load(Ordering::SeqCst) {
                        inner.trigger_tx.try_send(FlushTrigger::Debounce).ok();
                    }
                }
            }
        });
    }

    /// Request a flush pass without waiting for it
    pub fn flush_now(&self) {
        self.inner.trigger_tx.try_send(FlushTrigger::Manual).ok();
    }

    /// Run one flush pass to completion.
    ///
    /// Returns a skipped summary when another pass is already running.
    pub async fn flush_once(&self) -> Result<FlushSummary> {
        run_flush_pass(&self.inner).await
    }

    /// Replace every local table with the remote snapshot.
    ///
    /// Pending mutations are flushed first; if anything is still pending
    /// afterwards (failures, offline) the bootstrap is refused rather than
    /// silently discarding unsynced local writes.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self, owner_id: &str) -> Result<u64> {
        run_flush_pass(&self.inner).await?;

        let pending = self.inner.queue.pending_count().await?;
        if pending > 0 {
            return Err(SyncError::DirtyQueue { pending });
        }

        let mut total = 0u64;
        for kind in EntityKind::ALL {
            let since = match kind {
                EntityKind::Grocery => Some(
                    self.inner.clock.unix_timestamp_millis()
                        - self.inner.config.grocery_bootstrap_days * 86_400_000,
                ),
                _ => None,
            };

            let remote_records = with_timeout(
                &self.inner,
                self.inner.remote.fetch_all(kind, owner_id, since),
            )
            .await?;

            let mut records = Vec::with_capacity(remote_records.len());
            for remote_record in remote_records {
                records.push(
                    StoredRecord::from_payload(remote_record.payload)
                        .map_err(SyncError::Store)?
                        .with_id(remote_record.server_id),
                );
            }

            self.inner.store.replace_all(kind, &records).await?;
            total += records.len() as u64;
        }

        let now = self.inner.clock.unix_timestamp_millis();
        self.inner
            .store
            .metadata_set(META_LAST_FULL_SYNC_AT, &now.to_string())
            .await?;

        self.inner
            .event_bus
            .emit(CoreEvent::Sync(SyncEvent::BootstrapCompleted {
                records: total,
            }))
            .ok();

        info!(records = total, "Bootstrap completed");
        Ok(total)
    }

    /// Snapshot of queue depth, connectivity, and flush state
    pub async fn sync_status(&self) -> Result<SyncStatus> {
        let stats = self.inner.queue.stats().await?;
        Ok(SyncStatus {
            pending: stats.pending,
            dead: stats.dead,
            online: self.inner.online.load(Ordering::SeqCst),
            state: if self.inner.in_flight.load(Ordering::SeqCst) {
                ManagerState::Flushing
            } else {
                ManagerState::Idle
            },
        })
    }

    /// Last known connectivity (advisory)
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }
}

/// Run a flush pass unless one is already in flight
async fn run_flush_pass(inner: &ManagerInner) -> Result<FlushSummary> {
    if inner.in_flight.swap(true, Ordering::SeqCst) {
        debug!("Flush already in progress; request coalesced");
        return Ok(FlushSummary {
            skipped: true,
            ..FlushSummary::default()
        });
    }

    let result = flush_pending(inner).await;
    inner.in_flight.store(false, Ordering::SeqCst);
    result
}

#[instrument(skip(inner))]
async fn flush_pending(inner: &ManagerInner) -> Result<FlushSummary> {
    let snapshot = inner.queue.list_pending().await?;
    if snapshot.is_empty() {
        return Ok(FlushSummary::default());
    }

    inner
        .event_bus
        .emit(CoreEvent::Sync(SyncEvent::FlushStarted {
            pending: snapshot.len() as u64,
        }))
        .ok();

    let mut summary = FlushSummary::default();

    for stale in snapshot {
        // Re-read: the item may have absorbed a newer payload, been
        // cancelled, or been dead-lettered since the snapshot was taken.
        let Some(item) = inner.queue.get(stale.id).await? else {
            continue;
        };
        if item.status != QueueItemStatus::Pending {
            continue;
        }

        match process_item(inner, &item).await {
            Ok(synced_id) => {
                summary.synced += 1;
                inner
                    .event_bus
                    .emit(CoreEvent::Sync(SyncEvent::ItemSynced {
                        entity: item.entity.to_string(),
                        server_id: synced_id,
                    }))
                    .ok();
            }
            Err(e) => {
                summary.failed += 1;
                // Rejections and structurally broken items cannot succeed on
                // a verbatim retry
                let permanent = matches!(
                    &e,
                    SyncError::Remote(remote_error) if !remote_error.is_transient()
                ) || matches!(&e, SyncError::MalformedItem(_));

                let status = inner
                    .queue
                    .mark_failed(
                        item.id,
                        &e.to_string(),
                        permanent,
                        inner.config.max_retry_attempts,
                    )
                    .await?;

                let event = match status {
                    QueueItemStatus::Dead => SyncEvent::ItemDeadLettered {
                        entity: item.entity.to_string(),
                        message: e.to_string(),
                    },
                    _ => SyncEvent::ItemFailed {
                        entity: item.entity.to_string(),
                        message: e.to_string(),
                        attempts: item.retry_count + 1,
                    },
                };
                inner.event_bus.emit(CoreEvent::Sync(event)).ok();
            }
        }
    }

    inner.queue.prune_synced().await?;

    let now = inner.clock.unix_timestamp_millis();
    inner
        .store
        .metadata_set(META_LAST_FLUSH_AT, &now.to_string())
        .await?;

    inner
        .event_bus
        .emit(CoreEvent::Sync(SyncEvent::FlushCompleted {
            synced: summary.synced,
            failed: summary.failed,
        }))
        .ok();

    info!(
        synced = summary.synced,
        failed = summary.failed,
        "Flush pass completed"
    );
    Ok(summary)
}

/// Sync one queue item, returning the id the record now has remotely
async fn process_item(inner: &ManagerInner, item: &QueueItem) -> Result<String> {
    match item.mutation()? {
        Mutation::Create { local_id, payload } => {
            let server_id = match &item.server_id {
                // The remote insert already succeeded on an earlier pass and
                // only the local swap is owed; do not insert again.
                Some(recorded) => recorded.clone(),
                None => {
                    let remote_record =
                        with_timeout(inner, inner.remote.insert(item.entity, payload.clone()))
                            .await?;
                    inner
                        .queue
                        .record_server_id(item.id, &remote_record.server_id)
                        .await?;
                    remote_record.server_id
                }
            };

            let record = StoredRecord::from_payload(payload)
                .map_err(SyncError::Store)?
                .with_id(server_id.clone());
            inner.store.swap_id(item.entity, &local_id, &record).await?;

            inner.queue.mark_synced(item.id, Some(&server_id)).await?;
            Ok(server_id)
        }
        Mutation::Update { target_id, payload } => {
            // A device-local id must never reach the remote store. An update
            // can still carry one if its handle went stale across the id
            // swap; surface it instead of leaking the id.
            if core_store::is_local_id(&target_id) {
                return Err(SyncError::MalformedItem(format!(
                    "update {} still targets device-local id {}",
                    item.id, target_id
                )));
            }

            with_timeout(
                inner,
                inner.remote.upsert(item.entity, &target_id, payload.clone()),
            )
            .await?;

            let record = StoredRecord::from_payload(payload).map_err(SyncError::Store)?;
            inner.store.put(item.entity, &record).await?;

            inner.queue.mark_synced(item.id, Some(&target_id)).await?;
            Ok(target_id)
        }
        Mutation::Delete { target_id } => {
            with_timeout(inner, inner.remote.delete(item.entity, &target_id)).await?;

            inner.store.delete(item.entity, &target_id).await?;

            inner.queue.mark_synced(item.id, None).await?;
            Ok(target_id)
        }
    }
}

/// Bound a remote call by the per-item timeout, converting a hang into a
/// transient failure
async fn with_timeout<T>(
    inner: &ManagerInner,
    future: impl Future<Output = RemoteResult<T>>,
) -> Result<T> {
    let timeout = Duration::from_millis(inner.config.item_timeout_ms);
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result.map_err(SyncError::from),
        Err(_) => Err(SyncError::Remote(RemoteError::Transient(format!(
            "request timed out after {}ms",
            inner.config.item_timeout_ms
        )))),
    }
}
