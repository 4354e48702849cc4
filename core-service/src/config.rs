//! # Service Configuration
//!
//! Builder for everything the service needs at startup: the database
//! location, sync tuning, and the host-provided collaborators.
//!
//! The builder enforces fail-fast validation: a missing required capability
//! is reported with an actionable message at build time instead of panicking
//! somewhere inside the sync engine later.
//!
//! ## Usage
//!
//! ```ignore
//! use core_service::ServiceConfig;
//! use std::sync::Arc;
//!
//! let config = ServiceConfig::builder()
//!     .database_path("/path/to/tracker.db")
//!     .remote_store(Arc::new(MyBackendClient::new()))
//!     .network_monitor(Arc::new(MyMonitor::new()))
//!     .build()?;
//! ```

use crate::error::{CoreError, Result};
use bridge_traits::network::NetworkMonitor;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::DEFAULT_EVENT_BUFFER_SIZE;
use core_store::DatabaseConfig;
use core_sync::{RemoteStore, SyncConfig};
use std::path::Path;
use std::sync::Arc;

/// Assembled service configuration. Use [`ServiceConfig::builder`].
#[derive(Clone)]
pub struct ServiceConfig {
    /// Local database settings
    pub database: DatabaseConfig,

    /// Sync engine tuning
    pub sync: SyncConfig,

    /// The authoritative backend (required)
    pub remote_store: Arc<dyn RemoteStore>,

    /// Connectivity monitor; without one the engine assumes it is online
    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Event bus buffer size
    pub event_buffer: usize,
}

impl ServiceConfig {
    /// Start building a configuration
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("database", &self.database)
            .field("sync", &self.sync)
            .field("remote_store", &"<dyn RemoteStore>")
            .field("network_monitor", &self.network_monitor.as_ref().map(|_| "<dyn NetworkMonitor>"))
            .field("clock", &"<dyn Clock>")
            .field("event_buffer", &self.event_buffer)
            .finish()
    }
}

/// Builder for [`ServiceConfig`]
#[derive(Default)]
pub struct ServiceConfigBuilder {
    database: Option<DatabaseConfig>,
    sync: Option<SyncConfig>,
    remote_store: Option<Arc<dyn RemoteStore>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer: Option<usize>,
}

impl ServiceConfigBuilder {
    /// Use a file-backed database at the given path
    pub fn database_path(mut self, path: impl AsRef<Path>) -> Self {
        self.database = Some(DatabaseConfig::new(path.as_ref()));
        self
    }

    /// Use an in-memory database (tests, previews)
    pub fn in_memory(mut self) -> Self {
        self.database = Some(DatabaseConfig::in_memory());
        self
    }

    /// Provide explicit database settings
    pub fn database(mut self, config: DatabaseConfig) -> Self {
        self.database = Some(config);
        self
    }

    /// Tune the sync engine
    pub fn sync(mut self, config: SyncConfig) -> Self {
        self.sync = Some(config);
        self
    }

    /// Set the authoritative backend (required)
    pub fn remote_store(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote_store = Some(remote);
        self
    }

    /// Set the connectivity monitor
    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Inject a time source (tests)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Event bus buffer size
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    /// Validate and assemble the configuration
    pub fn build(self) -> Result<ServiceConfig> {
        let remote_store = self.remote_store.ok_or_else(|| {
            CoreError::Config(
                "No remote store provided. Inject the backend client with \
                 ServiceConfigBuilder::remote_store before building."
                    .to_string(),
            )
        })?;

        Ok(ServiceConfig {
            database: self.database.unwrap_or_default(),
            sync: self.sync.unwrap_or_default(),
            remote_store,
            network_monitor: self.network_monitor,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer: self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_sync::MemoryRemoteStore;

    #[test]
    fn test_build_requires_remote_store() {
        let err = ServiceConfig::builder().in_memory().build().unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
        assert!(err.to_string().contains("remote store"));
    }

    #[test]
    fn test_build_fills_defaults() {
        let config = ServiceConfig::builder()
            .remote_store(Arc::new(MemoryRemoteStore::new()))
            .build()
            .unwrap();

        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.sync.debounce_ms, SyncConfig::default().debounce_ms);
        assert!(config.network_monitor.is_none());
    }
}
