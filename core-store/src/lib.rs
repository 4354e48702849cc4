//! # Core Store
//!
//! Device-local persistence for the Tracker Platform Core.
//!
//! ## Overview
//!
//! This crate owns everything that touches the local SQLite database:
//! - **Connection pooling** (`db`): WAL-mode SQLite pool with sane defaults
//! - **Data model** (`models`): the three tracked entity kinds
//!   (supplements, groceries, bills), the generic [`StoredRecord`] row shape,
//!   and local-id minting for records created while offline
//! - **Local store** (`store`): a generic per-entity-kind table abstraction
//!   with an owner-id secondary index, plus the metadata key/value table
//!
//! The local store is the application's ground truth: every read in the
//! system is served from here, and every write lands here first. Remote
//! synchronization happens after the fact (see `core-sync`).

pub mod db;
pub mod error;
pub mod models;
pub mod store;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{Result, StoreError};
pub use models::{
    is_local_id, mint_local_id, Bill, DomainRecord, EntityKind, Grocery, StoredRecord, Supplement,
    LOCAL_ID_PREFIX,
};
pub use store::LocalStore;
