//! # Sync Queue
//!
//! Durable, ordered log of pending mutations.
//!
//! ## Overview
//!
//! Every write the application makes while (potentially) offline lands here
//! as one queue item. Items are replayed against the remote store in enqueue
//! order by the sync manager and pruned once synced.
//!
//! ## Features
//!
//! - **Persistence**: The queue lives in the local SQLite database and
//!   survives process restarts
//! - **Ordering**: `list_pending` always returns items in enqueue order,
//!   which preserves last-write-wins semantics for rapid successive edits
//! - **Coalescing**: A pending update for the same record absorbs newer
//!   payloads in place; updates to a not-yet-synced record fold into its
//!   pending create; deleting a not-yet-synced record cancels the create
//!   outright
//! - **Retry accounting**: Transient failures increment a retry counter and
//!   stay pending; rejections and exhausted retries move the item to a
//!   dead-letter state that is surfaced instead of silently retried
//!
//! ## Usage
//!
//! ```ignore
//! use core_sync::{Mutation, SyncQueue};
//!
//! # async fn example(queue: SyncQueue) -> core_sync::Result<()> {
//! queue
//!     .enqueue(EntityKind::Bill, Mutation::Update {
//!         target_id: "42".to_string(),
//!         payload: serde_json::json!({"id": "42", "name": "Rent"}),
//!     })
//!     .await?;
//!
//! for item in queue.list_pending().await? {
//!     // replay against the remote store...
//! }
//! queue.prune_synced().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bridge_traits::time::Clock;
use core_store::{is_local_id, EntityKind};
use serde::Serialize;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

/// Queue item identifier: the autoincrementing sequence number assigned by
/// the queue table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct QueueItemId(i64);

impl QueueItemId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutation operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl FromStr for Operation {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            _ => Err(SyncError::InvalidOperation(s.to_string())),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Queue item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    /// Waiting for (or eligible for) a flush pass
    Pending,
    /// Applied to the remote store; removed by the next prune
    Synced,
    /// Rejected or out of retries; kept for inspection, never auto-retried
    Dead,
}

impl QueueItemStatus {
    /// Database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueItemStatus::Pending => "pending",
            QueueItemStatus::Synced => "synced",
            QueueItemStatus::Dead => "dead",
        }
    }
}

impl FromStr for QueueItemStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(QueueItemStatus::Pending),
            "synced" => Ok(QueueItemStatus::Synced),
            "dead" => Ok(QueueItemStatus::Dead),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

/// A pending mutation, as handed to the queue by the façade.
///
/// The sum type replaces dispatch on `(entity_type, operation)` pairs: the
/// manager processes items with an exhaustive match, so an unhandled
/// combination cannot compile.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Create a record the server has never seen. `local_id` is the
    /// device-minted id; the payload snapshot is keyed by it.
    Create { local_id: String, payload: Value },
    /// Replace the record under `target_id` with the payload snapshot
    Update { target_id: String, payload: Value },
    /// Delete the record under `target_id`
    Delete { target_id: String },
}

impl Mutation {
    /// The operation column value for this mutation
    pub fn operation(&self) -> Operation {
        match self {
            Mutation::Create { .. } => Operation::Create,
            Mutation::Update { .. } => Operation::Update,
            Mutation::Delete { .. } => Operation::Delete,
        }
    }
}

/// One row of the queue table
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    /// Sequence number; assigned by the store on insert
    pub id: QueueItemId,
    /// Entity kind the mutation applies to
    pub entity: EntityKind,
    /// Operation kind
    pub operation: Operation,
    /// Entity snapshot at enqueue time (`Value::Null` for deletes)
    pub payload: Value,
    /// Device-minted id; set only for creates
    pub local_id: Option<String>,
    /// Server id: the target for updates/deletes, filled in for creates once
    /// the remote insert succeeds
    pub server_id: Option<String>,
    /// Enqueue timestamp, Unix milliseconds; the ordering key
    pub enqueued_at: i64,
    /// Current status
    pub status: QueueItemStatus,
    /// Number of failed sync attempts so far
    pub retry_count: u32,
    /// Most recent failure message
    pub last_error: Option<String>,
}

impl QueueItem {
    /// Build a fresh pending item from a mutation. The id is assigned by the
    /// repository on insert.
    pub fn new(entity: EntityKind, mutation: Mutation, enqueued_at: i64) -> Self {
        let operation = mutation.operation();
        let (payload, local_id, server_id) = match mutation {
            Mutation::Create { local_id, payload } => (payload, Some(local_id), None),
            Mutation::Update { target_id, payload } => (payload, None, Some(target_id)),
            Mutation::Delete { target_id } => (Value::Null, None, Some(target_id)),
        };

        Self {
            id: QueueItemId::new(0),
            entity,
            operation,
            payload,
            local_id,
            server_id,
            enqueued_at,
            status: QueueItemStatus::Pending,
            retry_count: 0,
            last_error: None,
        }
    }

    /// Reconstruct the typed mutation from the stored columns
    pub fn mutation(&self) -> Result<Mutation> {
        match self.operation {
            Operation::Create => {
                let local_id = self.local_id.clone().ok_or_else(|| {
                    SyncError::MalformedItem(format!("create item {} has no local id", self.id))
                })?;
                Ok(Mutation::Create {
                    local_id,
                    payload: self.payload.clone(),
                })
            }
            Operation::Update => {
                let target_id = self.target_id().ok_or_else(|| {
                    SyncError::MalformedItem(format!("update item {} has no target id", self.id))
                })?;
                Ok(Mutation::Update {
                    target_id,
                    payload: self.payload.clone(),
                })
            }
            Operation::Delete => {
                let target_id = self.server_id.clone().ok_or_else(|| {
                    SyncError::MalformedItem(format!("delete item {} has no target id", self.id))
                })?;
                Ok(Mutation::Delete { target_id })
            }
        }
    }

    /// The id the remote store should be addressed with, falling back to any
    /// id already recorded on the payload
    fn target_id(&self) -> Option<String> {
        self.server_id.clone().or_else(|| {
            self.payload
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    /// Record the outcome of a failed sync attempt.
    ///
    /// Permanent failures and exhausted retries transition to `Dead`;
    /// everything else stays `Pending` for the next pass.
    fn fail(&mut self, error: &str, permanent: bool, max_attempts: u32) {
        self.retry_count += 1;
        self.last_error = Some(error.to_string());
        self.status = if permanent || self.retry_count >= max_attempts {
            QueueItemStatus::Dead
        } else {
            QueueItemStatus::Pending
        };
    }

    /// Mark the item applied to the remote store
    fn synced(&mut self, server_id: Option<&str>) {
        if let Some(server_id) = server_id {
            self.server_id = Some(server_id.to_string());
        }
        self.status = QueueItemStatus::Synced;
        self.last_error = None;
    }
}

/// Outcome of an enqueue call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new queue item was appended
    Appended(QueueItemId),
    /// An existing pending item absorbed the mutation in place
    Coalesced(QueueItemId),
    /// The mutation cancelled a pending create; nothing will reach the
    /// remote store
    Cancelled,
}

impl EnqueueOutcome {
    /// The queue item carrying the mutation, if one exists
    pub fn queue_id(&self) -> Option<QueueItemId> {
        match self {
            EnqueueOutcome::Appended(id) | EnqueueOutcome::Coalesced(id) => Some(*id),
            EnqueueOutcome::Cancelled => None,
        }
    }
}

/// Queue statistics surfaced to the UI
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueStats {
    /// Items waiting to sync
    pub pending: u64,
    /// Items in the dead-letter state
    pub dead: u64,
}

// ============================================================================
// Repository
// ============================================================================

/// Repository trait for persisting the queue
#[async_trait]
pub trait SyncQueueRepository: Send + Sync {
    /// Insert a fresh item, returning the assigned sequence number
    async fn insert(&self, item: &QueueItem) -> Result<QueueItemId>;

    /// Overwrite the mutable columns of an item
    async fn update(&self, item: &QueueItem) -> Result<()>;

    /// Find an item by sequence number
    async fn find_by_id(&self, id: QueueItemId) -> Result<Option<QueueItem>>;

    /// Delete an item outright (create-cancellation)
    async fn delete(&self, id: QueueItemId) -> Result<()>;

    /// All pending items in enqueue order
    async fn list_pending(&self) -> Result<Vec<QueueItem>>;

    /// All items with the given status, in enqueue order
    async fn list_by_status(&self, status: QueueItemStatus) -> Result<Vec<QueueItem>>;

    /// Pending update targeting the given id, if any
    async fn find_pending_update(
        &self,
        entity: EntityKind,
        target_id: &str,
    ) -> Result<Option<QueueItem>>;

    /// Pending create for the given local id, if any
    async fn find_pending_create(
        &self,
        entity: EntityKind,
        local_id: &str,
    ) -> Result<Option<QueueItem>>;

    /// Count items by status
    async fn count_by_status(&self, status: QueueItemStatus) -> Result<u64>;

    /// Remove every synced item, returning how many were pruned
    async fn prune_synced(&self) -> Result<u64>;
}

/// SQLite implementation of the queue repository
pub struct SqliteSyncQueueRepository {
    pool: SqlitePool,
}

impl SqliteSyncQueueRepository {
    /// Create a new repository over the shared local-store pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the queue table and its index if they don't exist
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_queue (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                entity TEXT NOT NULL,
                operation TEXT NOT NULL,
                payload TEXT NOT NULL,
                local_id TEXT,
                server_id TEXT,
                enqueued_at INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_sync_queue_status
            ON sync_queue(status, enqueued_at ASC, seq ASC)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_item(row: sqlx::sqlite::SqliteRow) -> Result<QueueItem> {
        let entity: String = row.get("entity");
        let operation: String = row.get("operation");
        let status: String = row.get("status");
        let payload: String = row.get("payload");

        Ok(QueueItem {
            id: QueueItemId::new(row.get("seq")),
            entity: entity.parse().map_err(SyncError::Store)?,
            operation: operation.parse()?,
            payload: serde_json::from_str(&payload)
                .map_err(|e| SyncError::MalformedItem(e.to_string()))?,
            local_id: row.get("local_id"),
            server_id: row.get("server_id"),
            enqueued_at: row.get("enqueued_at"),
            status: status.parse()?,
            retry_count: row.get::<i64, _>("retry_count") as u32,
            last_error: row.get("last_error"),
        })
    }
}

const SELECT_COLUMNS: &str = "seq, entity, operation, payload, local_id, server_id, \
                              enqueued_at, status, retry_count, last_error";

#[async_trait]
impl SyncQueueRepository for SqliteSyncQueueRepository {
    async fn insert(&self, item: &QueueItem) -> Result<QueueItemId> {
        let payload = serde_json::to_string(&item.payload)
            .map_err(|e| SyncError::MalformedItem(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO sync_queue (
                entity, operation, payload, local_id, server_id,
                enqueued_at, status, retry_count, last_error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.entity.as_str())
        .bind(item.operation.as_str())
        .bind(payload)
        .bind(&item.local_id)
        .bind(&item.server_id)
        .bind(item.enqueued_at)
        .bind(item.status.as_str())
        .bind(item.retry_count as i64)
        .bind(&item.last_error)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(QueueItemId::new(result.last_insert_rowid()))
    }

    async fn update(&self, item: &QueueItem) -> Result<()> {
        let payload = serde_json::to_string(&item.payload)
            .map_err(|e| SyncError::MalformedItem(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE sync_queue SET
                payload = ?,
                server_id = ?,
                status = ?,
                retry_count = ?,
                last_error = ?
            WHERE seq = ?
            "#,
        )
        .bind(payload)
        .bind(&item.server_id)
        .bind(item.status.as_str())
        .bind(item.retry_count as i64)
        .bind(&item.last_error)
        .bind(item.id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: QueueItemId) -> Result<Option<QueueItem>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM sync_queue WHERE seq = ?"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        row.map(Self::row_to_item).transpose()
    }

    async fn delete(&self, id: QueueItemId) -> Result<()> {
        sqlx::query("DELETE FROM sync_queue WHERE seq = ?")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<QueueItem>> {
        self.list_by_status(QueueItemStatus::Pending).await
    }

    async fn list_by_status(&self, status: QueueItemStatus) -> Result<Vec<QueueItem>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM sync_queue
            WHERE status = ?
            ORDER BY enqueued_at ASC, seq ASC
            "#
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn find_pending_update(
        &self,
        entity: EntityKind,
        target_id: &str,
    ) -> Result<Option<QueueItem>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM sync_queue
            WHERE status = 'pending' AND operation = 'update'
              AND entity = ? AND server_id = ?
            ORDER BY seq ASC
            LIMIT 1
            "#
        ))
        .bind(entity.as_str())
        .bind(target_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        row.map(Self::row_to_item).transpose()
    }

    async fn find_pending_create(
        &self,
        entity: EntityKind,
        local_id: &str,
    ) -> Result<Option<QueueItem>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM sync_queue
            WHERE status = 'pending' AND operation = 'create'
              AND entity = ? AND local_id = ?
            ORDER BY seq ASC
            LIMIT 1
            "#
        ))
        .bind(entity.as_str())
        .bind(local_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        row.map(Self::row_to_item).transpose()
    }

    async fn count_by_status(&self, status: QueueItemStatus) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(count as u64)
    }

    async fn prune_synced(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE status = 'synced'")
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

// ============================================================================
// Queue Wrapper
// ============================================================================

/// Typed wrapper over the queue table, shared by the façade (enqueue side)
/// and the sync manager (drain side)
#[derive(Clone)]
pub struct SyncQueue {
    repository: Arc<dyn SyncQueueRepository>,
    clock: Arc<dyn Clock>,
}

impl SyncQueue {
    /// Create a queue over the shared local-store pool, initializing the
    /// queue table
    pub async fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Result<Self> {
        let repository = SqliteSyncQueueRepository::new(pool);
        repository.initialize().await?;

        Ok(Self {
            repository: Arc::new(repository),
            clock,
        })
    }

    /// Create a queue with a custom repository
    pub fn with_repository(repository: Arc<dyn SyncQueueRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Record a mutation, coalescing against pending items where possible.
    ///
    /// - An update targeting a record with a pending update replaces that
    ///   item's payload in place (the original queue slot is kept)
    /// - An update targeting a not-yet-synced record folds into the pending
    ///   create's payload
    /// - A delete targeting a not-yet-synced record cancels the pending
    ///   create outright
    /// - Creates are always appended, never replaced
    pub async fn enqueue(&self, entity: EntityKind, mutation: Mutation) -> Result<EnqueueOutcome> {
        match mutation {
            Mutation::Create { .. } => {
                let item = QueueItem::new(entity, mutation, self.clock.unix_timestamp_millis());
                let id = self.repository.insert(&item).await?;
                info!(queue_id = %id, entity = %entity, "Enqueued create");
                Ok(EnqueueOutcome::Appended(id))
            }
            Mutation::Update { target_id, payload } => {
                if is_local_id(&target_id) {
                    if let Some(mut create) =
                        self.repository.find_pending_create(entity, &target_id).await?
                    {
                        create.payload = payload;
                        self.repository.update(&create).await?;
                        debug!(queue_id = %create.id, entity = %entity, "Folded update into pending create");
                        return Ok(EnqueueOutcome::Coalesced(create.id));
                    }
                }

                if let Some(mut pending) =
                    self.repository.find_pending_update(entity, &target_id).await?
                {
                    pending.payload = payload;
                    self.repository.update(&pending).await?;
                    debug!(queue_id = %pending.id, entity = %entity, "Replaced pending update payload");
                    return Ok(EnqueueOutcome::Coalesced(pending.id));
                }

                let item = QueueItem::new(
                    entity,
                    Mutation::Update { target_id, payload },
                    self.clock.unix_timestamp_millis(),
                );
                let id = self.repository.insert(&item).await?;
                info!(queue_id = %id, entity = %entity, "Enqueued update");
                Ok(EnqueueOutcome::Appended(id))
            }
            Mutation::Delete { target_id } => {
                if is_local_id(&target_id) {
                    if let Some(create) =
                        self.repository.find_pending_create(entity, &target_id).await?
                    {
                        self.repository.delete(create.id).await?;
                        info!(queue_id = %create.id, entity = %entity, "Delete cancelled pending create");
                    }
                    // Either way the server has never seen this record
                    return Ok(EnqueueOutcome::Cancelled);
                }

                let item = QueueItem::new(
                    entity,
                    Mutation::Delete { target_id },
                    self.clock.unix_timestamp_millis(),
                );
                let id = self.repository.insert(&item).await?;
                info!(queue_id = %id, entity = %entity, "Enqueued delete");
                Ok(EnqueueOutcome::Appended(id))
            }
        }
    }

    /// Fetch an item by id
    pub async fn get(&self, id: QueueItemId) -> Result<Option<QueueItem>> {
        self.repository.find_by_id(id).await
    }

    /// All pending items, oldest first
    pub async fn list_pending(&self) -> Result<Vec<QueueItem>> {
        self.repository.list_pending().await
    }

    /// Number of items waiting to sync
    pub async fn pending_count(&self) -> Result<u64> {
        self.repository.count_by_status(QueueItemStatus::Pending).await
    }

    /// Items in the dead-letter state, oldest first
    pub async fn dead_items(&self) -> Result<Vec<QueueItem>> {
        self.repository.list_by_status(QueueItemStatus::Dead).await
    }

    /// Durably record the server id assigned to a create, before the local
    /// id swap is attempted. A retry after a failed swap skips the remote
    /// insert.
    pub async fn record_server_id(&self, id: QueueItemId, server_id: &str) -> Result<()> {
        let mut item = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(SyncError::ItemNotFound {
                queue_id: id.as_i64(),
            })?;

        item.server_id = Some(server_id.to_string());
        self.repository.update(&item).await
    }

    /// Mark an item applied to the remote store
    pub async fn mark_synced(&self, id: QueueItemId, server_id: Option<&str>) -> Result<()> {
        let mut item = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(SyncError::ItemNotFound {
                queue_id: id.as_i64(),
            })?;

        item.synced(server_id);
        self.repository.update(&item).await?;

        debug!(queue_id = %id, "Queue item synced");
        Ok(())
    }

    /// Record a failed sync attempt, returning the resulting status
    pub async fn mark_failed(
        &self,
        id: QueueItemId,
        error: &str,
        permanent: bool,
        max_attempts: u32,
    ) -> Result<QueueItemStatus> {
        let mut item = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(SyncError::ItemNotFound {
                queue_id: id.as_i64(),
            })?;

        item.fail(error, permanent, max_attempts);
        self.repository.update(&item).await?;

        match item.status {
            QueueItemStatus::Dead => warn!(
                queue_id = %id,
                retry_count = item.retry_count,
                error,
                "Queue item dead-lettered"
            ),
            _ => warn!(
                queue_id = %id,
                retry_count = item.retry_count,
                error,
                "Queue item failed, will retry on next pass"
            ),
        }

        Ok(item.status)
    }

    /// Remove every synced item
    pub async fn prune_synced(&self) -> Result<u64> {
        let pruned = self.repository.prune_synced().await?;
        if pruned > 0 {
            debug!(pruned, "Pruned synced queue items");
        }
        Ok(pruned)
    }

    /// Pending and dead counts
    pub async fn stats(&self) -> Result<QueueStats> {
        Ok(QueueStats {
            pending: self.repository.count_by_status(QueueItemStatus::Pending).await?,
            dead: self.repository.count_by_status(QueueItemStatus::Dead).await?,
        })
    }
}
