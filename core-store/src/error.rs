use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Local storage failure (quota, corruption, I/O). Fatal to the
    /// operation but not to the process; callers surface it instead of
    /// silently dropping the mutation.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Invalid record payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid entity kind: {0}")]
    InvalidKind(String),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
