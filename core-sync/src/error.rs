use crate::remote::RemoteError;
use core_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Local storage failure, surfaced from the store layer
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Queue item {queue_id} not found")]
    ItemNotFound { queue_id: i64 },

    #[error("Invalid queue status: {0}")]
    InvalidStatus(String),

    #[error("Invalid queue operation: {0}")]
    InvalidOperation(String),

    #[error("Malformed queue item: {0}")]
    MalformedItem(String),

    #[error("Bootstrap refused: {pending} unsynced mutations still pending")]
    DirtyQueue { pending: u64 },

    #[error("Sync manager already started")]
    AlreadyStarted,
}

pub type Result<T> = std::result::Result<T, SyncError>;
