//! SQLite-backed ledger storage.
//!
//! Pool-level methods serve single-statement reads and writes. Multi-row
//! ledger mutations go through [`WalletStorage::begin`] and the
//! connection-level helpers in [`ledger`], so balances and ledger rows commit
//! together.

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::config::StorageConfig;
use crate::core::errors::WalletError;

mod audits;
pub mod ledger;
mod users;

pub use ledger::NewTransaction;
pub use users::{NewUser, UserCredentials};

const SCHEMA: &str = include_str!("../../migrations/001_init.sql");

#[derive(Debug)]
pub struct WalletStorage {
    pool: SqlitePool,
    is_memory: bool,
}

impl WalletStorage {
    pub async fn from_config(config: &StorageConfig) -> Result<Self, WalletError> {
        Self::connect(
            &config.database_url,
            config.max_connections.unwrap_or(10),
            Duration::from_secs(config.connection_timeout_seconds.unwrap_or(30)),
        )
        .await
    }

    /// In-memory database, used by tests.
    pub async fn in_memory() -> Result<Self, WalletError> {
        Self::connect("sqlite::memory:", 1, Duration::from_secs(30)).await
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, WalletError> {
        let db_url = normalize_sqlite_url(database_url);
        let is_memory = db_url.contains(":memory:");

        // Avoid logging full DB URL (may contain secrets). Log scheme and path length for diagnostics.
        let safe_db_url_info = if let Some((scheme, rest)) = db_url.split_once(':') {
            format!("{}:(redacted, len={})", scheme, rest.len())
        } else {
            "(invalid db_url format)".to_string()
        };
        info!(db = %safe_db_url_info, "[storage] connecting to database");

        let mut connect_options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| WalletError::ConfigError(format!("Invalid database URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !is_memory {
            connect_options = connect_options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        // Every pooled connection to `:memory:` is a separate database, so the
        // pool is pinned to one long-lived connection.
        let pool_options = if is_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .idle_timeout(Duration::from_secs(600))
                .max_lifetime(Duration::from_secs(1800))
        };

        let pool = pool_options
            .acquire_timeout(acquire_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| WalletError::StorageError(format!("Failed to connect to database: {}", e)))?;

        let storage = Self { pool, is_memory };
        storage.initialize_schema().await?;
        info!("Wallet storage initialized");
        Ok(storage)
    }

    pub fn is_in_memory(&self) -> bool {
        self.is_memory
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn initialize_schema(&self) -> Result<(), WalletError> {
        debug!("Initializing database schema");
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| WalletError::StorageError(format!("Failed to run migrations: {}", e)))?;
        debug!("Database schema initialized");
        Ok(())
    }

    /// Start a database transaction for multi-row ledger updates.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, WalletError> {
        Ok(self.pool.begin().await?)
    }
}

/// Accept `sqlite:` and `sqlite://` forms and create the parent directory of
/// file-backed databases.
fn normalize_sqlite_url(database_url: &str) -> String {
    if database_url.contains(":memory:") {
        return database_url.to_string();
    }
    let mut db_url = database_url.to_string();
    if db_url.starts_with("sqlite:") && !db_url.starts_with("sqlite://") {
        db_url = db_url.replacen("sqlite:", "sqlite://", 1);
    }

    if let Some(path) = db_url.strip_prefix("sqlite://") {
        let path_only = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
        if !path_only.is_empty() {
            if let Some(parent) = std::path::Path::new(path_only).parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        warn!("Failed to create database dir {:?}: {}", parent, e);
                    }
                }
            }
        }
    }
    db_url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sqlite_url() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}/nested/wallet.db", dir.path().display());
        let normalized = normalize_sqlite_url(&url);
        assert!(normalized.starts_with("sqlite://"));
        assert!(dir.path().join("nested").exists());
    }

    #[tokio::test]
    async fn test_in_memory_schema() {
        let storage = WalletStorage::in_memory().await.unwrap();
        assert!(storage.is_in_memory());
        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(storage.pool())
                .await
                .unwrap();
        for table in ["security_audits", "transactions", "users", "wallets"] {
            assert!(tables.iter().any(|t| t == table), "missing table {}", table);
        }
    }
}
