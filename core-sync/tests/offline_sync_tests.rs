//! Integration tests for the offline sync engine
//!
//! These tests exercise the full local stack (SQLite-backed store + queue +
//! manager) against the in-memory remote store, covering:
//! - Durability of pending mutations across a simulated process restart
//! - Eventual consistency for an entity edited repeatedly while offline
//! - Id reconciliation without duplication on create
//! - Per-item failure isolation and idempotent retry
//! - Enqueue-order application against the remote store
//! - Debounced trigger coalescing with a live manager
//! - Bootstrap semantics (wholesale replace, bounded log window)

use bridge_traits::network::{ManualNetworkMonitor, NetworkStatus};
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_store::{
    create_pool, is_local_id, mint_local_id, Bill, DatabaseConfig, DomainRecord, EntityKind,
    Grocery, LocalStore, Supplement,
};
use core_sync::{
    MemoryRemoteStore, Mutation, RemoteCall, RemoteError, SyncConfig, SyncManager, SyncQueue,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Harness
// ============================================================================

struct Stack {
    store: LocalStore,
    queue: SyncQueue,
    manager: SyncManager,
    remote: Arc<MemoryRemoteStore>,
}

async fn build_stack(
    database: DatabaseConfig,
    remote: Arc<MemoryRemoteStore>,
    config: SyncConfig,
    monitor: Option<Arc<ManualNetworkMonitor>>,
    event_bus: EventBus,
) -> Stack {
    let pool = create_pool(database).await.unwrap();
    let store = LocalStore::new(pool.clone());
    store.initialize().await.unwrap();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let queue = SyncQueue::new(pool, Arc::clone(&clock)).await.unwrap();

    let manager = SyncManager::new(
        config,
        store.clone(),
        queue.clone(),
        remote.clone() as Arc<dyn core_sync::RemoteStore>,
        monitor.map(|m| m as Arc<dyn bridge_traits::network::NetworkMonitor>),
        event_bus,
        clock,
    );

    Stack {
        store,
        queue,
        manager,
        remote,
    }
}

async fn memory_stack() -> Stack {
    build_stack(
        DatabaseConfig::in_memory(),
        Arc::new(MemoryRemoteStore::new()),
        SyncConfig::default(),
        None,
        EventBus::new(64),
    )
    .await
}

fn supplement(id: &str, name: &str) -> Supplement {
    let mut record = Supplement::new("user-1", name, 125.0);
    record.set_id(id.to_string());
    record.set_updated_at(1_700_000_000_000);
    record
}

/// Optimistic local write + enqueue, the way the façade issues a create
async fn offline_create(stack: &Stack, record: &Supplement) {
    let stored = record.to_stored().unwrap();
    stack
        .store
        .put(EntityKind::Supplement, &stored)
        .await
        .unwrap();
    stack
        .queue
        .enqueue(
            EntityKind::Supplement,
            Mutation::Create {
                local_id: stored.id.clone(),
                payload: stored.payload,
            },
        )
        .await
        .unwrap();
}

// ============================================================================
// Durability
// ============================================================================

#[tokio::test]
async fn test_pending_items_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tracker.db");
    let remote = Arc::new(MemoryRemoteStore::new());

    let local_id = mint_local_id();
    {
        let stack = build_stack(
            DatabaseConfig::new(&db_path),
            remote.clone(),
            SyncConfig::default(),
            None,
            EventBus::new(64),
        )
        .await;

        offline_create(&stack, &supplement(&local_id, "X")).await;
        assert_eq!(stack.queue.pending_count().await.unwrap(), 1);
        // Process "exits" before any flush: the stack is dropped here
    }

    // Restart: fresh pool over the same file
    let stack = build_stack(
        DatabaseConfig::new(&db_path),
        remote.clone(),
        SyncConfig::default(),
        None,
        EventBus::new(64),
    )
    .await;

    let pending = stack.queue.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].local_id.as_deref(), Some(local_id.as_str()));

    // The queued mutation is still replayable after the restart
    let summary = stack.manager.flush_once().await.unwrap();
    assert_eq!(summary.synced, 1);
    assert_eq!(remote.count(EntityKind::Supplement).await, 1);
}

// ============================================================================
// Eventual consistency & reconciliation
// ============================================================================

#[tokio::test]
async fn test_offline_lifecycle_converges_to_final_state() {
    let stack = memory_stack().await;
    let local_id = mint_local_id();

    // create {name: X} then edit to Y then Z, all offline
    offline_create(&stack, &supplement(&local_id, "X")).await;
    for name in ["Y", "Z"] {
        let mut edited = supplement(&local_id, name);
        edited.set_updated_at(1_700_000_000_000 + 1);
        let stored = edited.to_stored().unwrap();
        stack
            .store
            .put(EntityKind::Supplement, &stored)
            .await
            .unwrap();
        stack
            .queue
            .enqueue(
                EntityKind::Supplement,
                Mutation::Update {
                    target_id: local_id.clone(),
                    payload: stored.payload,
                },
            )
            .await
            .unwrap();
    }

    let summary = stack.manager.flush_once().await.unwrap();
    // Both edits folded into the pending create
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.failed, 0);

    // Local and remote agree on the final state, keyed by the server id
    let local = stack
        .store
        .get_by_owner(EntityKind::Supplement, "user-1")
        .await
        .unwrap();
    assert_eq!(local.len(), 1);
    assert!(!is_local_id(&local[0].id));
    assert_eq!(local[0].payload["name"], "Z");

    let remote_payload = stack
        .remote
        .record(EntityKind::Supplement, &local[0].id)
        .await
        .unwrap();
    assert_eq!(remote_payload["name"], "Z");
}

#[tokio::test]
async fn test_create_sync_leaves_exactly_one_record() {
    let stack = memory_stack().await;
    let local_id = mint_local_id();
    offline_create(&stack, &supplement(&local_id, "X")).await;

    stack.manager.flush_once().await.unwrap();
    // A second pass over the drained queue is a no-op
    let summary = stack.manager.flush_once().await.unwrap();
    assert_eq!(summary.synced, 0);

    assert_eq!(stack.store.count(EntityKind::Supplement).await.unwrap(), 1);
    assert!(stack
        .store
        .get(EntityKind::Supplement, &local_id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(stack.remote.count(EntityKind::Supplement).await, 1);
    assert_eq!(stack.queue.pending_count().await.unwrap(), 0);
}

// ============================================================================
// Failure isolation & idempotent retry
// ============================================================================

#[tokio::test]
async fn test_one_items_failure_does_not_block_others() {
    let stack = memory_stack().await;

    // Item A (supplement create) fails; item B (bill delete) succeeds
    let local_a = mint_local_id();
    offline_create(&stack, &supplement(&local_a, "A")).await;
    let b_id = stack
        .queue
        .enqueue(
            EntityKind::Bill,
            Mutation::Delete {
                target_id: "bill-7".to_string(),
            },
        )
        .await
        .unwrap()
        .queue_id()
        .unwrap();

    stack
        .remote
        .fail_next_with(RemoteError::Transient("gateway timeout".into()))
        .await;

    let summary = stack.manager.flush_once().await.unwrap();
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.failed, 1);

    // B was pruned from the queue; A remains pending, unaffected
    assert!(stack.queue.get(b_id).await.unwrap().is_none());
    let pending = stack.queue.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].entity, EntityKind::Supplement);
}

#[tokio::test]
async fn test_retry_after_transient_failure_is_idempotent() {
    let stack = memory_stack().await;
    let local_id = mint_local_id();
    offline_create(&stack, &supplement(&local_id, "X")).await;

    stack
        .remote
        .fail_next_with(RemoteError::Transient("connection reset".into()))
        .await;

    let summary = stack.manager.flush_once().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(stack.remote.count(EntityKind::Supplement).await, 0);

    // Replaying the failed item converges to the same state a first-try
    // success would have produced: exactly one remote record
    let summary = stack.manager.flush_once().await.unwrap();
    assert_eq!(summary.synced, 1);
    assert_eq!(stack.remote.count(EntityKind::Supplement).await, 1);
    assert_eq!(stack.queue.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_rejected_mutation_dead_letters_and_stops_retrying() {
    let stack = memory_stack().await;
    let local_id = mint_local_id();
    offline_create(&stack, &supplement(&local_id, "X")).await;

    stack
        .remote
        .fail_next_with(RemoteError::Rejected {
            status: 422,
            message: "name too long".into(),
        })
        .await;

    stack.manager.flush_once().await.unwrap();

    let dead = stack.queue.dead_items().await.unwrap();
    assert_eq!(dead.len(), 1);
    assert!(dead[0].last_error.as_deref().unwrap().contains("422"));

    // Later passes leave the dead item alone
    let journal_len = stack.remote.journal().await.len();
    stack.manager.flush_once().await.unwrap();
    assert_eq!(stack.remote.journal().await.len(), journal_len);
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_successive_edits_yield_second_patch_on_remote() {
    let stack = memory_stack().await;

    // Record already synced (server id "42"); two rapid edits follow
    let mut record = supplement("42", "X");
    record.set_updated_at(1);
    stack
        .store
        .put(EntityKind::Supplement, &record.to_stored().unwrap())
        .await
        .unwrap();

    for (name, ts) in [("Y", 2i64), ("Z", 3)] {
        let mut edited = supplement("42", name);
        edited.set_updated_at(ts);
        stack
            .queue
            .enqueue(
                EntityKind::Supplement,
                Mutation::Update {
                    target_id: "42".to_string(),
                    payload: edited.to_stored().unwrap().payload,
                },
            )
            .await
            .unwrap();
    }

    stack.manager.flush_once().await.unwrap();

    // The remote state matches the second edit applied on top of the first
    let remote_payload = stack
        .remote
        .record(EntityKind::Supplement, "42")
        .await
        .unwrap();
    assert_eq!(remote_payload["name"], "Z");
    assert_eq!(
        stack
            .store
            .get(EntityKind::Supplement, "42")
            .await
            .unwrap()
            .unwrap()
            .payload["name"],
        "Z"
    );
}

#[tokio::test]
async fn test_mixed_operations_reach_remote_in_enqueue_order() {
    let stack = memory_stack().await;

    let mut record = supplement("42", "X");
    record.set_updated_at(1);
    stack
        .store
        .put(EntityKind::Supplement, &record.to_stored().unwrap())
        .await
        .unwrap();

    stack
        .queue
        .enqueue(
            EntityKind::Supplement,
            Mutation::Update {
                target_id: "42".to_string(),
                payload: record.to_stored().unwrap().payload,
            },
        )
        .await
        .unwrap();
    stack
        .queue
        .enqueue(
            EntityKind::Supplement,
            Mutation::Delete {
                target_id: "42".to_string(),
            },
        )
        .await
        .unwrap();

    stack.manager.flush_once().await.unwrap();

    assert_eq!(
        stack.remote.journal().await,
        vec![
            RemoteCall::Upsert {
                kind: EntityKind::Supplement,
                id: "42".to_string()
            },
            RemoteCall::Delete {
                kind: EntityKind::Supplement,
                id: "42".to_string()
            },
        ]
    );
    assert_eq!(stack.remote.count(EntityKind::Supplement).await, 0);
    assert!(stack
        .store
        .get(EntityKind::Supplement, "42")
        .await
        .unwrap()
        .is_none());
}

// ============================================================================
// Live manager: debounce and connectivity
// ============================================================================

#[tokio::test]
async fn test_write_burst_coalesces_into_one_flush_pass() {
    let event_bus = EventBus::new(256);
    let mut events = event_bus.subscribe();

    // No monitor: the manager assumes it is online, and the debounce timer
    // is the only flush trigger in play.
    let stack = build_stack(
        DatabaseConfig::in_memory(),
        Arc::new(MemoryRemoteStore::new()),
        SyncConfig {
            debounce_ms: 50,
            ..SyncConfig::default()
        },
        None,
        event_bus,
    )
    .await;
    stack.manager.start().await.unwrap();

    // Three rapid writes, each re-arming the debounce timer
    for i in 0..3 {
        offline_create(&stack, &supplement(&mint_local_id(), &format!("S{i}"))).await;
        stack.manager.notify_local_write();
    }

    // Collect events until the pass completes
    let mut flush_starts = 0u32;
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("flush pass should run")
            .unwrap();
        match event {
            CoreEvent::Sync(SyncEvent::FlushStarted { pending }) => {
                flush_starts += 1;
                assert_eq!(pending, 3);
            }
            CoreEvent::Sync(SyncEvent::FlushCompleted { synced, failed }) => {
                assert_eq!(synced, 3);
                assert_eq!(failed, 0);
                break;
            }
            _ => {}
        }
    }
    assert_eq!(flush_starts, 1, "a burst of writes is one flush pass");
    assert_eq!(stack.remote.count(EntityKind::Supplement).await, 3);

    stack.manager.stop().await;
}

#[tokio::test]
async fn test_queue_drains_when_connectivity_returns() {
    let monitor = Arc::new(ManualNetworkMonitor::new(NetworkStatus::Disconnected));
    let stack = build_stack(
        DatabaseConfig::in_memory(),
        Arc::new(MemoryRemoteStore::new()),
        SyncConfig {
            debounce_ms: 10,
            ..SyncConfig::default()
        },
        Some(monitor.clone()),
        EventBus::new(64),
    )
    .await;
    stack.manager.start().await.unwrap();

    offline_create(&stack, &supplement(&mint_local_id(), "X")).await;
    // Offline: arming the debounce is a no-op
    stack.manager.notify_local_write();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(stack.queue.pending_count().await.unwrap(), 1);
    assert!(!stack.manager.is_online());

    monitor.set_status(NetworkStatus::Connected);

    let mut drained = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if stack.queue.pending_count().await.unwrap() == 0 {
            drained = true;
            break;
        }
    }
    assert!(drained, "connectivity edge should trigger a flush");
    assert_eq!(stack.remote.count(EntityKind::Supplement).await, 1);

    stack.manager.stop().await;
}

// ============================================================================
// Bootstrap
// ============================================================================

#[tokio::test]
async fn test_bootstrap_replaces_tables_and_bounds_grocery_window() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let now = SystemClock.unix_timestamp_millis();

    // Remote snapshot: one supplement, one bill, one recent grocery and one
    // far outside the bootstrap window
    remote
        .seed(
            EntityKind::Supplement,
            "s1",
            supplement("s1", "Vitamin D3").to_stored().unwrap().payload,
        )
        .await;
    let mut bill = Bill::new("user-1", "Rent", 120_000, 1);
    bill.set_id("b1".to_string());
    bill.set_updated_at(now);
    remote
        .seed(EntityKind::Bill, "b1", bill.to_stored().unwrap().payload)
        .await;

    let mut recent = Grocery::new("user-1", "Oat milk", 349, now);
    recent.set_id("g1".to_string());
    recent.set_updated_at(now);
    remote
        .seed(EntityKind::Grocery, "g1", recent.to_stored().unwrap().payload)
        .await;

    let mut ancient = Grocery::new("user-1", "Flour", 199, 0);
    ancient.set_id("g2".to_string());
    ancient.set_updated_at(now - 365 * 86_400_000);
    remote
        .seed(EntityKind::Grocery, "g2", ancient.to_stored().unwrap().payload)
        .await;

    let stack = build_stack(
        DatabaseConfig::in_memory(),
        remote,
        SyncConfig {
            grocery_bootstrap_days: 90,
            ..SyncConfig::default()
        },
        None,
        EventBus::new(64),
    )
    .await;

    // Stale local rows the snapshot must wipe
    stack
        .store
        .put(
            EntityKind::Supplement,
            &supplement("stale", "Old").to_stored().unwrap(),
        )
        .await
        .unwrap();

    let total = stack.manager.bootstrap("user-1").await.unwrap();
    assert_eq!(total, 3);

    assert!(stack
        .store
        .get(EntityKind::Supplement, "stale")
        .await
        .unwrap()
        .is_none());
    assert_eq!(stack.store.count(EntityKind::Supplement).await.unwrap(), 1);
    assert_eq!(stack.store.count(EntityKind::Bill).await.unwrap(), 1);

    // Only the grocery inside the window came down
    assert_eq!(stack.store.count(EntityKind::Grocery).await.unwrap(), 1);
    assert!(stack
        .store
        .get(EntityKind::Grocery, "g1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_bootstrap_flushes_pending_queue_first() {
    let stack = memory_stack().await;
    let local_id = mint_local_id();
    offline_create(&stack, &supplement(&local_id, "X")).await;

    // With a healthy remote the pre-bootstrap flush drains the queue, so the
    // bootstrap proceeds and the created record comes back server-keyed
    let total = stack.manager.bootstrap("user-1").await.unwrap();
    assert_eq!(total, 1);

    let local = stack
        .store
        .get_by_owner(EntityKind::Supplement, "user-1")
        .await
        .unwrap();
    assert_eq!(local.len(), 1);
    assert!(!is_local_id(&local[0].id));
    assert_eq!(local[0].payload["name"], "X");
}

#[tokio::test]
async fn test_malformed_remote_payload_fails_bootstrap_loudly() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote
        .seed(
            EntityKind::Supplement,
            "s1",
            json!({ "owner_id": "user-1", "name": "missing id and updated_at" }),
        )
        .await;

    let stack = build_stack(
        DatabaseConfig::in_memory(),
        remote,
        SyncConfig::default(),
        None,
        EventBus::new(64),
    )
    .await;

    let err = stack.manager.bootstrap("user-1").await.unwrap_err();
    assert!(err.to_string().contains("payload"));
}
