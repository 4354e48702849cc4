//! # Core Runtime
//!
//! Shared runtime infrastructure for the Tracker Platform Core: the event bus
//! used for decoupled communication between modules, and the logging bootstrap.
//!
//! ## Components
//!
//! - **Events** (`events`): Typed broadcast bus (`EventBus`) carrying
//!   [`CoreEvent`](events::CoreEvent) between the sync engine and host UIs
//! - **Logging** (`logging`): `tracing-subscriber` initialization with
//!   env-filter support and selectable output formats

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{ConnectivityEvent, CoreEvent, EventBus, SyncEvent};
pub use logging::{init_logging, LogFormat, LoggingConfig};
