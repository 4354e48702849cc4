//! SQLite pool construction for the device-local database.
//!
//! One pool serves the whole core: the entity tables, the sync queue, and
//! the metadata table all live in the same file. WAL journaling keeps reads
//! cheap while a flush pass writes, and foreign keys are enforced at the
//! connection level.
//!
//! Schema creation is owned by the stores themselves (`LocalStore` and the
//! sync queue repository) via idempotent `initialize()` calls; a pool from
//! here carries no tables until those run. Tests usually want
//! [`create_test_pool`], which returns an in-memory pool with the entity
//! schema already applied.

use crate::error::Result;
use crate::store::LocalStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pool settings for the local database
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `sqlite:<path>` for a file-backed database, `sqlite::memory:` for an
    /// in-memory one
    pub database_url: String,
    /// Lower bound on pooled connections
    pub min_connections: u32,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// How long to wait for a free connection before giving up
    pub acquire_timeout: Duration,
    /// Recycle connections older than this
    pub max_lifetime: Option<Duration>,
    /// Close connections idle longer than this
    pub idle_timeout: Option<Duration>,
    /// Prepared statements cached per connection
    pub statement_cache_capacity: usize,
}

impl DatabaseConfig {
    /// Settings for a file-backed database at `database_path`.
    ///
    /// The file is created on first connect if it does not exist.
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_url: format!("sqlite:{}", database_path.into().display()),
            min_connections: 1,
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Some(Duration::from_secs(1800)),
            idle_timeout: Some(Duration::from_secs(600)),
            statement_cache_capacity: 100,
        }
    }

    /// Settings for an in-memory database.
    ///
    /// Capped at a single connection: each pooled connection to
    /// `sqlite::memory:` would otherwise see its own private database.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: None,
            idle_timeout: None,
            statement_cache_capacity: 100,
        }
    }

    /// Override the connection bounds
    pub fn connections(mut self, min: u32, max: u32) -> Self {
        self.min_connections = min;
        self.max_connections = max;
        self
    }

    /// Override the acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open the local database and return a ready pool.
///
/// # Errors
///
/// Fails if the database file cannot be opened or created, or if the
/// post-connect health check fails.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    info!(
        database_url = %config.database_url,
        max_connections = config.max_connections,
        "Opening local database"
    );

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .create_if_missing(true)
        .statement_cache_capacity(config.statement_cache_capacity);

    let pool = SqlitePoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Local database pool creation failed");
            e
        })?;

    health_check(&pool).await?;
    debug!("Local database ready");

    Ok(pool)
}

/// In-memory pool with the entity schema already applied, for tests
pub async fn create_test_pool() -> Result<SqlitePool> {
    let pool = create_pool(DatabaseConfig::in_memory()).await?;
    LocalStore::new(pool.clone()).initialize().await?;
    Ok(pool)
}

async fn health_check(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!(error = %e, "Local database health check failed");
        e
    })?;
    Ok(())
}
