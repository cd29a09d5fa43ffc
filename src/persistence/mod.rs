//! Persistence Layer
//!
//! This module provides the two ledger backends used by the settlement core.
//! `SqliteLedger` stores everything in SQLite via sqlx; `InMemoryLedger`
//! keeps it in process memory.
//!
//! # Database Schema
//!
//! ## Investors Table
//! - id: UUID
//! - name: unique display name
//! - balance: REAL, never negative
//!
//! ## Portfolio Entries Table
//! - investor_id, stock_id: one row per holding, shares > 0
//!
//! ## Stocks Table
//! - id: UUID
//! - name: unique display name
//! - price_per_share: REAL, positive
//! - shares: unsold inventory
//! - total_shares: issued at creation
//!
//! ## Stock Owners Table
//! - stock_id, investor_id: one row per owner, shares_owned > 0
//!
//! ## Transactions Table
//! - seq: append order
//! - id: UUID
//! - investor_id, stock_id, trade_type ("BUY" or "SELL"), shares,
//!   price_per_share, total, executed_at
//! - UPDATE and DELETE are rejected by triggers

pub mod memory;
pub mod models;
pub mod sqlite;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::domain::repositories::ledger_store::StoreError;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

impl From<DatabaseError> for StoreError {
    fn from(error: DatabaseError) -> Self {
        StoreError::Backend(error.to_string())
    }
}

/// Map an sqlx error raised inside the ledger onto the store taxonomy
pub(crate) fn store_error(context: &str, error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() || db.is_check_violation() => {
            StoreError::Constraint(format!("{}: {}", context, db.message()))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("{}: {}", context, error))
        }
        _ => StoreError::Backend(format!("{}: {}", context, error)),
    }
}

/// True for SQLite URLs whose database lives and dies with one process
pub fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Initialize the database connection pool
///
/// # Arguments
/// - `database_url`: Path to SQLite database file (e.g., "sqlite://data/stockathon.db")
///
/// # Returns
/// Database connection pool ready for use
///
/// # Errors
/// Returns error if database connection fails or migrations fail
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    init_database_with(&DatabaseConfig {
        url: database_url.to_string(),
        ..DatabaseConfig::default()
    })
    .await
}

/// Initialize the database connection pool from a full configuration
pub async fn init_database_with(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !is_memory_url(&config.url) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
                })?;
            }
        }
    }

    let statement_level = if config.log_queries {
        tracing::log::LevelFilter::Debug
    } else {
        tracing::log::LevelFilter::Trace
    };

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .log_statements(statement_level);

    // Every connection to ":memory:" opens its own database, so keep exactly one
    // and never let it be recycled.
    let pool_options = if is_memory_url(&config.url) {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
    };

    let pool = pool_options.connect_with(options).await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    let statements: [(&str, &str); 10] = [
        (
            "investors table",
            r#"
            CREATE TABLE IF NOT EXISTS investors (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                balance REAL NOT NULL CHECK(balance >= 0),
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        ),
        (
            "stocks table",
            r#"
            CREATE TABLE IF NOT EXISTS stocks (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                price_per_share REAL NOT NULL CHECK(price_per_share > 0),
                shares INTEGER NOT NULL CHECK(shares >= 0),
                total_shares INTEGER NOT NULL CHECK(total_shares > 0),
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        ),
        (
            "portfolio_entries table",
            r#"
            CREATE TABLE IF NOT EXISTS portfolio_entries (
                investor_id TEXT NOT NULL REFERENCES investors(id),
                stock_id TEXT NOT NULL REFERENCES stocks(id),
                shares INTEGER NOT NULL CHECK(shares > 0),
                PRIMARY KEY (investor_id, stock_id)
            )
            "#,
        ),
        (
            "stock_owners table",
            r#"
            CREATE TABLE IF NOT EXISTS stock_owners (
                stock_id TEXT NOT NULL REFERENCES stocks(id),
                investor_id TEXT NOT NULL REFERENCES investors(id),
                shares_owned INTEGER NOT NULL CHECK(shares_owned > 0),
                PRIMARY KEY (stock_id, investor_id)
            )
            "#,
        ),
        (
            "transactions table",
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                investor_id TEXT NOT NULL REFERENCES investors(id),
                stock_id TEXT NOT NULL REFERENCES stocks(id),
                trade_type TEXT NOT NULL CHECK(trade_type IN ('BUY', 'SELL')),
                shares INTEGER NOT NULL CHECK(shares > 0),
                price_per_share REAL NOT NULL,
                total REAL NOT NULL,
                executed_at DATETIME NOT NULL
            )
            "#,
        ),
        (
            "transactions update guard",
            r#"
            CREATE TRIGGER IF NOT EXISTS transactions_append_only_update
            BEFORE UPDATE ON transactions
            BEGIN
                SELECT RAISE(ABORT, 'transactions are append-only');
            END
            "#,
        ),
        (
            "transactions delete guard",
            r#"
            CREATE TRIGGER IF NOT EXISTS transactions_append_only_delete
            BEFORE DELETE ON transactions
            BEGIN
                SELECT RAISE(ABORT, 'transactions are append-only');
            END
            "#,
        ),
        (
            "transactions investor index",
            "CREATE INDEX IF NOT EXISTS idx_transactions_investor ON transactions(investor_id, executed_at)",
        ),
        (
            "transactions stock index",
            "CREATE INDEX IF NOT EXISTS idx_transactions_stock ON transactions(stock_id, executed_at)",
        ),
        (
            "stock owners index",
            "CREATE INDEX IF NOT EXISTS idx_stock_owners_investor ON stock_owners(investor_id)",
        ),
    ];

    for (what, sql) in statements {
        sqlx::query(sql)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("Failed to create {}: {}", what, e)))?;
    }

    info!("✓ Database migrations completed successfully");

    Ok(())
}

/// Database configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/stockathon.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Enable query logging
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/stockathon.db".to_string(),
            max_connections: 5,
            log_queries: cfg!(debug_assertions),
        }
    }
}

impl DatabaseConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/stockathon.db".to_string());

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let log_queries = std::env::var("DATABASE_LOG_QUERIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(cfg!(debug_assertions));

        Self {
            url,
            max_connections,
            log_queries,
        }
    }
}
