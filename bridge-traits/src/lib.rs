//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the core library and platform-specific
//! implementations. Each trait represents a capability that the core requires but
//! that must be implemented differently per host (desktop app shell, headless
//! daemon, test harness).
//!
//! ## Traits
//!
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity state and change
//!   notifications, consumed by the sync engine to decide when to attempt a flush
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Host
//! implementations should convert platform-specific errors to `BridgeError` and
//! provide actionable error messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod error;
pub mod network;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use network::{ManualNetworkMonitor, NetworkChangeStream, NetworkMonitor, NetworkStatus};
pub use time::{Clock, SystemClock};
