use thiserror::Error;

/// Failures surfaced by host-side bridge implementations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The host does not provide this capability (e.g. no connectivity
    /// monitor on a headless build)
    #[error("Host capability unavailable: {0}")]
    NotAvailable(String),

    /// A platform call failed
    #[error("Host bridge call failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
