//! # Offline-Aware Collections
//!
//! The typed data-access surface consumed by the rest of the application.
//!
//! Every read is served from the local store only, regardless of
//! connectivity. Every write applies optimistically: the local store is
//! updated immediately, the mutation is recorded in the sync queue, and the
//! call returns as soon as the local step completes. Remote synchronization
//! is asynchronous and invisible to the caller except through eventual state
//! changes in later reads (and through the event bus).
//!
//! A record created here carries a device-minted `local-` id until its first
//! successful sync swaps it for the server-assigned id.

use crate::error::{CoreError, Result};
use bridge_traits::time::Clock;
use core_store::{mint_local_id, DomainRecord, LocalStore, StoredRecord};
use core_sync::{Mutation, SyncManager, SyncQueue};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Typed offline-first handle for one entity kind
pub struct OfflineCollection<T> {
    store: LocalStore,
    queue: SyncQueue,
    manager: Arc<SyncManager>,
    clock: Arc<dyn Clock>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DomainRecord> OfflineCollection<T> {
    pub(crate) fn new(
        store: LocalStore,
        queue: SyncQueue,
        manager: Arc<SyncManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            queue,
            manager,
            clock,
            _marker: PhantomData,
        }
    }

    /// All records belonging to one owner, newest local write first
    pub async fn list(&self, owner_id: &str) -> Result<Vec<T>> {
        let records = self.store.get_by_owner(T::KIND, owner_id).await?;
        records
            .iter()
            .map(|record| T::from_stored(record).map_err(CoreError::Store))
            .collect()
    }

    /// One record by id (local or server-assigned)
    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        match self.store.get(T::KIND, id).await? {
            Some(record) => Ok(Some(T::from_stored(&record)?)),
            None => Ok(None),
        }
    }

    /// Create a record.
    ///
    /// Mints a local id, writes the record locally, enqueues a create, and
    /// returns the record (with its local id) immediately.
    pub async fn create(&self, mut draft: T) -> Result<T> {
        draft.validate().map_err(|message| CoreError::InvalidInput {
            field: T::KIND.to_string(),
            message,
        })?;

        draft.set_id(mint_local_id());
        draft.set_updated_at(self.clock.unix_timestamp_millis());

        let stored = draft.to_stored()?;
        self.store.put(T::KIND, &stored).await?;

        self.queue
            .enqueue(
                T::KIND,
                Mutation::Create {
                    local_id: stored.id.clone(),
                    payload: stored.payload,
                },
            )
            .await?;
        self.manager.notify_local_write();

        debug!(kind = %T::KIND, id = %draft.id(), "Created record locally");
        Ok(draft)
    }

    /// Merge a JSON patch into the current record and enqueue the update.
    ///
    /// The patch is a shallow object merge; `id` and `owner_id` are
    /// protected and cannot be patched.
    pub async fn update(&self, id: &str, patch: Value) -> Result<T> {
        let current = self
            .store
            .get(T::KIND, id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                kind: T::KIND.to_string(),
                id: id.to_string(),
            })?;

        let mut payload = current.payload;
        merge_patch(&mut payload, patch)?;
        if let Value::Object(ref mut map) = payload {
            map.insert(
                "updated_at".to_string(),
                Value::from(self.clock.unix_timestamp_millis()),
            );
        }

        let record = StoredRecord::from_payload(payload)?;
        let typed = T::from_stored(&record)?;
        typed.validate().map_err(|message| CoreError::InvalidInput {
            field: T::KIND.to_string(),
            message,
        })?;

        self.store.put(T::KIND, &record).await?;

        self.queue
            .enqueue(
                T::KIND,
                Mutation::Update {
                    target_id: id.to_string(),
                    payload: record.payload,
                },
            )
            .await?;
        self.manager.notify_local_write();

        debug!(kind = %T::KIND, id, "Updated record locally");
        Ok(typed)
    }

    /// Remove a record locally and enqueue the delete.
    ///
    /// Deleting a record that never synced cancels its pending create; the
    /// remote store is not contacted.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(T::KIND, id).await?;

        self.queue
            .enqueue(
                T::KIND,
                Mutation::Delete {
                    target_id: id.to_string(),
                },
            )
            .await?;
        self.manager.notify_local_write();

        debug!(kind = %T::KIND, id, "Deleted record locally");
        Ok(())
    }
}

/// Shallow object merge, protecting identity fields
fn merge_patch(payload: &mut Value, patch: Value) -> Result<()> {
    let Value::Object(target) = payload else {
        return Err(CoreError::InvalidInput {
            field: "payload".to_string(),
            message: "stored payload is not a JSON object".to_string(),
        });
    };
    let Value::Object(patch) = patch else {
        return Err(CoreError::InvalidInput {
            field: "patch".to_string(),
            message: "patch must be a JSON object".to_string(),
        });
    };

    for (key, value) in patch {
        if key == "id" || key == "owner_id" {
            continue;
        }
        target.insert(key, value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_patch_shallow() {
        let mut payload = json!({ "id": "1", "owner_id": "u", "name": "A", "active": true });
        merge_patch(&mut payload, json!({ "name": "B" })).unwrap();

        assert_eq!(payload["name"], "B");
        assert_eq!(payload["active"], Value::Bool(true));
    }

    #[test]
    fn test_merge_patch_protects_identity() {
        let mut payload = json!({ "id": "1", "owner_id": "u", "name": "A" });
        merge_patch(&mut payload, json!({ "id": "evil", "owner_id": "other" })).unwrap();

        assert_eq!(payload["id"], "1");
        assert_eq!(payload["owner_id"], "u");
    }

    #[test]
    fn test_merge_patch_rejects_non_object() {
        let mut payload = json!({ "id": "1" });
        assert!(merge_patch(&mut payload, json!([1, 2])).is_err());
    }
}
