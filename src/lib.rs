//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications depend on `tpc-workspace` with the
//! default `service` feature and get the full offline-aware service surface
//! without wiring each member crate individually.

#[cfg(feature = "service")]
pub use core_service as service;
