//! # Local Store
//!
//! Generic per-entity-kind table store over SQLite.
//!
//! ## Overview
//!
//! One table per [`EntityKind`], each keyed by record id with a secondary
//! index on the owning user, plus a string-keyed metadata table for small
//! process-wide values (last flush time, last full sync time).
//!
//! All operations are asynchronous and serialize through the connection
//! pool. Callers must not assume cross-call atomicity: a `get` followed by a
//! `put` is not a compare-and-swap. The two multi-statement operations that
//! need atomicity ([`LocalStore::replace_all`] and [`LocalStore::swap_id`])
//! run inside a single transaction.

use crate::error::Result;
use crate::models::{EntityKind, StoredRecord};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

/// Device-local persistent store, the application's ground truth.
#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Create a store over an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool (shared with the sync queue)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create all entity tables, their owner indexes, and the metadata table
    /// if they don't exist
    pub async fn initialize(&self) -> Result<()> {
        for kind in EntityKind::ALL {
            let table = kind.table_name();
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )
                "#
            ))
            .execute(&self.pool)
            .await?;

            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_owner ON {table}(owner_id)"
            ))
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Local store schema initialized");
        Ok(())
    }

    /// Fetch a single record by id
    pub async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<StoredRecord>> {
        let row = sqlx::query(&format!(
            "SELECT id, owner_id, payload, updated_at FROM {} WHERE id = ?",
            kind.table_name()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    /// Fetch every record of a kind, newest local write first
    pub async fn get_all(&self, kind: EntityKind) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT id, owner_id, payload, updated_at FROM {} ORDER BY updated_at DESC, id ASC",
            kind.table_name()
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// Fetch every record of a kind belonging to one owner, newest local
    /// write first
    pub async fn get_by_owner(&self, kind: EntityKind, owner_id: &str) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT id, owner_id, payload, updated_at FROM {}
            WHERE owner_id = ?
            ORDER BY updated_at DESC, id ASC
            "#,
            kind.table_name()
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// Insert or overwrite a record
    pub async fn put(&self, kind: EntityKind, record: &StoredRecord) -> Result<()> {
        let payload = serde_json::to_string(&record.payload)?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (id, owner_id, payload, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
            kind.table_name()
        ))
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(payload)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a record by id
    ///
    /// Returns `true` if a row was removed, `false` if it was already absent.
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", kind.table_name()))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove every record of a kind
    pub async fn clear(&self, kind: EntityKind) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {}", kind.table_name()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Count records of a kind
    pub async fn count(&self, kind: EntityKind) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {}",
            kind.table_name()
        ))
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    /// Replace a table wholesale: clear it and bulk-insert the given records
    /// in one transaction. The bootstrap primitive.
    pub async fn replace_all(&self, kind: EntityKind, records: &[StoredRecord]) -> Result<()> {
        let table = kind.table_name();
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await?;

        for record in records {
            let payload = serde_json::to_string(&record.payload)?;
            sqlx::query(&format!(
                "INSERT INTO {table} (id, owner_id, payload, updated_at) VALUES (?, ?, ?, ?)"
            ))
            .bind(&record.id)
            .bind(&record.owner_id)
            .bind(payload)
            .bind(record.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(kind = %kind, records = records.len(), "Replaced local table from remote snapshot");
        Ok(())
    }

    /// Atomically re-key a record: delete the row under `old_id` and insert
    /// `record` under its (new) id in one transaction. The reconciliation
    /// primitive for swapping a local id for a server id.
    pub async fn swap_id(
        &self,
        kind: EntityKind,
        old_id: &str,
        record: &StoredRecord,
    ) -> Result<()> {
        let table = kind.table_name();
        let payload = serde_json::to_string(&record.payload)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
            .bind(old_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {table} (id, owner_id, payload, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#
        ))
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(payload)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(kind = %kind, old_id, new_id = %record.id, "Re-keyed local record");
        Ok(())
    }

    /// Read a metadata value
    pub async fn metadata_get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM metadata WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value)
    }

    /// Write (or overwrite) a metadata value
    pub async fn metadata_set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metadata (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<StoredRecord> {
    let payload: String = row.get("payload");
    Ok(StoredRecord {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        payload: serde_json::from_str(&payload)?,
        updated_at: row.get("updated_at"),
    })
}
