//! # Remote Store Contract
//!
//! The CRUD surface the authoritative backend must satisfy. The concrete
//! backend is an external collaborator; this crate only fixes the semantics
//! the sync manager relies on:
//!
//! - `insert` assigns and returns the server id for a record the server has
//!   never seen
//! - `upsert` creates-or-replaces under a caller-supplied id
//! - `delete` of an absent id succeeds (retries stay idempotent)
//! - `fetch_all` returns self-contained payloads (each carrying `id`,
//!   `owner_id`, `updated_at`) for bootstrap
//!
//! Failures are classified up front: [`RemoteError::Transient`] (network,
//! 5xx, timeout) items are retried on later flush passes, while
//! [`RemoteError::Rejected`] (validation, 4xx) items go straight to the
//! dead-letter state.
//!
//! [`MemoryRemoteStore`] is the in-process implementation used by tests and
//! local development; it journals every call and supports scripted failure
//! injection.

use async_trait::async_trait;
use core_store::EntityKind;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;
use tokio::sync::Mutex;

/// Remote-call failure classification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Network-level or server-side failure; the mutation may succeed later
    #[error("Remote transient failure: {0}")]
    Transient(String),

    /// The server rejected the mutation; retrying the same payload cannot
    /// succeed
    #[error("Remote rejected the mutation ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RemoteError {
    /// Whether a verbatim retry could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// A record as known to the remote store
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    /// Server-assigned identifier
    pub server_id: String,
    /// Echoed record payload
    pub payload: Value,
}

/// The remote CRUD contract consumed by the sync manager
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a record; the server assigns the id
    async fn insert(&self, kind: EntityKind, payload: Value) -> RemoteResult<RemoteRecord>;

    /// Create-or-replace a record under a caller-supplied id
    async fn upsert(&self, kind: EntityKind, id: &str, payload: Value)
        -> RemoteResult<RemoteRecord>;

    /// Delete a record by id; deleting an absent id succeeds
    async fn delete(&self, kind: EntityKind, id: &str) -> RemoteResult<()>;

    /// Fetch all records of a kind for one owner, optionally bounded to
    /// records updated at or after `since` (Unix milliseconds)
    async fn fetch_all(
        &self,
        kind: EntityKind,
        owner_id: &str,
        since: Option<i64>,
    ) -> RemoteResult<Vec<RemoteRecord>>;
}

/// One journaled call against [`MemoryRemoteStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Insert { kind: EntityKind },
    Upsert { kind: EntityKind, id: String },
    Delete { kind: EntityKind, id: String },
    FetchAll { kind: EntityKind },
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<EntityKind, BTreeMap<String, Value>>,
    next_id: u64,
    scripted_failures: VecDeque<RemoteError>,
    journal: Vec<RemoteCall>,
}

/// In-memory remote store with call journaling and failure injection.
///
/// Mutating calls (`insert`/`upsert`/`delete`) consume scripted failures in
/// FIFO order; `fetch_all` is never failed by a script.
#[derive(Default)]
pub struct MemoryRemoteStore {
    state: Mutex<MemoryState>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a failure for the next mutating call
    pub async fn fail_next_with(&self, error: RemoteError) {
        self.state.lock().await.scripted_failures.push_back(error);
    }

    /// Seed a record directly, bypassing the journal (bootstrap fixtures)
    pub async fn seed(&self, kind: EntityKind, id: impl Into<String>, payload: Value) {
        let mut state = self.state.lock().await;
        state
            .collections
            .entry(kind)
            .or_default()
            .insert(id.into(), payload);
    }

    /// Read a record back
    pub async fn record(&self, kind: EntityKind, id: &str) -> Option<Value> {
        self.state
            .lock()
            .await
            .collections
            .get(&kind)
            .and_then(|c| c.get(id))
            .cloned()
    }

    /// Number of records of a kind
    pub async fn count(&self, kind: EntityKind) -> usize {
        self.state
            .lock()
            .await
            .collections
            .get(&kind)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    /// Every call made so far, in order
    pub async fn journal(&self) -> Vec<RemoteCall> {
        self.state.lock().await.journal.clone()
    }
}

impl MemoryState {
    fn take_scripted_failure(&mut self) -> Option<RemoteError> {
        self.scripted_failures.pop_front()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn insert(&self, kind: EntityKind, payload: Value) -> RemoteResult<RemoteRecord> {
        let mut state = self.state.lock().await;
        state.journal.push(RemoteCall::Insert { kind });
        if let Some(error) = state.take_scripted_failure() {
            return Err(error);
        }

        state.next_id += 1;
        let server_id = state.next_id.to_string();

        let mut payload = payload;
        if let Value::Object(ref mut map) = payload {
            map.insert("id".to_string(), Value::String(server_id.clone()));
        }
        state
            .collections
            .entry(kind)
            .or_default()
            .insert(server_id.clone(), payload.clone());

        Ok(RemoteRecord { server_id, payload })
    }

    async fn upsert(
        &self,
        kind: EntityKind,
        id: &str,
        payload: Value,
    ) -> RemoteResult<RemoteRecord> {
        let mut state = self.state.lock().await;
        state.journal.push(RemoteCall::Upsert {
            kind,
            id: id.to_string(),
        });
        if let Some(error) = state.take_scripted_failure() {
            return Err(error);
        }

        state
            .collections
            .entry(kind)
            .or_default()
            .insert(id.to_string(), payload.clone());

        Ok(RemoteRecord {
            server_id: id.to_string(),
            payload,
        })
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> RemoteResult<()> {
        let mut state = self.state.lock().await;
        state.journal.push(RemoteCall::Delete {
            kind,
            id: id.to_string(),
        });
        if let Some(error) = state.take_scripted_failure() {
            return Err(error);
        }

        // Absent-id delete is a success; retries stay idempotent
        state.collections.entry(kind).or_default().remove(id);
        Ok(())
    }

    async fn fetch_all(
        &self,
        kind: EntityKind,
        owner_id: &str,
        since: Option<i64>,
    ) -> RemoteResult<Vec<RemoteRecord>> {
        let mut state = self.state.lock().await;
        state.journal.push(RemoteCall::FetchAll { kind });

        let records = state
            .collections
            .get(&kind)
            .map(|collection| {
                collection
                    .iter()
                    .filter(|(_, payload)| {
                        payload.get("owner_id").and_then(Value::as_str) == Some(owner_id)
                    })
                    .filter(|(_, payload)| match since {
                        Some(cutoff) => payload
                            .get("updated_at")
                            .and_then(Value::as_i64)
                            .map(|ts| ts >= cutoff)
                            .unwrap_or(false),
                        None => true,
                    })
                    .map(|(id, payload)| RemoteRecord {
                        server_id: id.clone(),
                        payload: payload.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(records)
    }
}
