//! # Sync Engine
//!
//! Local-first synchronization for the Tracker Platform Core.
//!
//! ## Overview
//!
//! This crate keeps the device-local store (`core-store`) and a remote
//! authoritative store reconciled while letting the application work fully
//! offline:
//! - Every mutation made by the application is recorded as a durable queue
//!   item (the local store's queue table outlives restarts)
//! - A flush pass replays pending items against the remote store in enqueue
//!   order, one at a time, isolating per-item failures
//! - Records created offline carry a device-minted `local-` id that is
//!   swapped atomically for the server-assigned id on first successful sync
//!
//! ## Components
//!
//! - **Sync Queue** (`queue`): Durable ordered mutation log with coalescing
//!   enqueue, retry accounting, and a dead-letter state
//! - **Remote Store** (`remote`): The CRUD contract the backend must satisfy,
//!   plus an in-memory implementation for tests and local development
//! - **Sync Manager** (`manager`): Tracks connectivity, debounces flush
//!   passes, reconciles ids, and garbage-collects completed queue entries

pub mod error;
pub mod manager;
pub mod queue;
pub mod remote;

pub use error::{Result, SyncError};
pub use manager::{FlushSummary, ManagerState, SyncConfig, SyncManager, SyncStatus};
pub use queue::{
    EnqueueOutcome, Mutation, Operation, QueueItem, QueueItemId, QueueItemStatus, QueueStats,
    SqliteSyncQueueRepository, SyncQueue, SyncQueueRepository,
};
pub use remote::{MemoryRemoteStore, RemoteCall, RemoteError, RemoteRecord, RemoteResult, RemoteStore};
