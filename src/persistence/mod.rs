//! Persistence Layer
//!
//! SQLite storage for the agent's strategies, positions, transactions and
//! narrative memories, with async access via sqlx.
//!
//! # Database Schema
//!
//! ## trading_strategies
//! - id: Strategy identifier
//! - title, strategy_type ("RSI")
//! - config_json: Full strategy configuration as JSON
//!
//! ## agent_strategy_assignments
//! - id, agent_id, strategy_id (FK)
//! - is_active, is_paper_trading
//! - start_date / end_date: Window during which the assignment applies
//!
//! ## positions
//! - base_token_* / quote_token_*: Token descriptors
//! - status: "OPEN" or "CLOSED" (at most one OPEN row per assignment and pair)
//! - entry_price / exit_price: Base token USD price at open / close
//! - total_base_amount: Decimal string
//! - realized_pnl_usd: Set on close
//!
//! ## transactions
//! - side: "BUY" or "SELL"
//! - status: "OPEN", "CLOSED" or "FAILED"
//! - from_* / to_*: Spent and received token legs
//! - transaction_hash: Chain signature, or the paper sentinel
//!
//! ## memories
//! - kind: "TRADE", "IDLE" or "ERROR"
//! - message: Human readable cycle log
//! - additional_content: JSON details

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info};

use crate::domain::errors::StoreError;

/// Database connection pool
pub type DbPool = SqlitePool;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/trading_agent.db";

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
        match error {
            DatabaseError::ConnectionError(sqlx::Error::RowNotFound) => {
                StoreError::NotFound("row not found".to_string())
            }
            other => StoreError::QueryFailed(other.to_string()),
        }
    }
}

/// Maps a query failure to a store error, logging it with context.
pub(crate) fn query_error(context: &str, e: sqlx::Error) -> StoreError {
    error!("{}: {}", context, e);
    StoreError::from(DatabaseError::QueryError(format!("{}: {}", context, e)))
}

/// Initialize the database connection pool
///
/// # Errors
/// Returns error if database connection fails or migrations fail
pub async fn init_database(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
                })?;
            }
        }
    }

    let level = if config.log_queries {
        tracing::log::LevelFilter::Debug
    } else {
        tracing::log::LevelFilter::Trace
    };
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .log_statements(level);

    // Every connection to ":memory:" opens its own empty database.
    let pool = if config.is_in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?
    };

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

async fn migrate(pool: &DbPool, what: &str, sql: &str) -> Result<(), DatabaseError> {
    sqlx::query(sql)
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create {}: {}", what, e)))?;
    Ok(())
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    migrate(
        pool,
        "trading_strategies table",
        r#"
        CREATE TABLE IF NOT EXISTS trading_strategies (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            strategy_type TEXT NOT NULL CHECK(strategy_type IN ('RSI')),
            config_json TEXT NOT NULL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;

    migrate(
        pool,
        "agent_strategy_assignments table",
        r#"
        CREATE TABLE IF NOT EXISTS agent_strategy_assignments (
            id TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL,
            strategy_id TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            is_paper_trading BOOLEAN NOT NULL DEFAULT 1,
            start_date DATETIME NOT NULL,
            end_date DATETIME,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (strategy_id) REFERENCES trading_strategies(id)
        )
        "#,
    )
    .await?;

    migrate(
        pool,
        "positions table",
        r#"
        CREATE TABLE IF NOT EXISTS positions (
            id TEXT PRIMARY KEY,
            strategy_assignment_id TEXT NOT NULL,
            base_token_address TEXT NOT NULL,
            base_token_symbol TEXT NOT NULL,
            base_token_decimals INTEGER NOT NULL,
            base_token_logo_uri TEXT,
            quote_token_address TEXT NOT NULL,
            quote_token_symbol TEXT NOT NULL,
            quote_token_decimals INTEGER NOT NULL,
            quote_token_logo_uri TEXT,
            status TEXT NOT NULL CHECK(status IN ('OPEN', 'CLOSED')),
            entry_price REAL NOT NULL,
            exit_price REAL,
            total_base_amount TEXT NOT NULL,
            average_entry_price REAL NOT NULL,
            realized_pnl_usd REAL,
            opened_at DATETIME NOT NULL,
            closed_at DATETIME,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (strategy_assignment_id) REFERENCES agent_strategy_assignments(id)
        )
        "#,
    )
    .await?;

    migrate(
        pool,
        "transactions table",
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            strategy_assignment_id TEXT NOT NULL,
            position_id TEXT,
            side TEXT NOT NULL CHECK(side IN ('BUY', 'SELL')),
            status TEXT NOT NULL CHECK(status IN ('OPEN', 'CLOSED', 'FAILED')),
            from_token_address TEXT NOT NULL,
            from_token_symbol TEXT NOT NULL,
            from_token_decimals INTEGER NOT NULL,
            to_token_address TEXT NOT NULL,
            to_token_symbol TEXT NOT NULL,
            to_token_decimals INTEGER NOT NULL,
            amount_in TEXT NOT NULL,
            amount_out TEXT NOT NULL,
            from_price_usd REAL NOT NULL,
            to_price_usd REAL NOT NULL,
            fee_lamports INTEGER NOT NULL DEFAULT 0,
            profit_loss_usd REAL,
            profit_loss_percentage REAL,
            transaction_hash TEXT,
            failure_reason TEXT,
            executed_at DATETIME NOT NULL,
            FOREIGN KEY (strategy_assignment_id) REFERENCES agent_strategy_assignments(id),
            FOREIGN KEY (position_id) REFERENCES positions(id)
        )
        "#,
    )
    .await?;

    migrate(
        pool,
        "memories table",
        r#"
        CREATE TABLE IF NOT EXISTS memories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('TRADE', 'IDLE', 'ERROR')),
            message TEXT NOT NULL,
            additional_content TEXT NOT NULL,
            created_at DATETIME NOT NULL
        )
        "#,
    )
    .await?;

    // At most one open position per assignment and pair.
    migrate(
        pool,
        "index",
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_positions_one_open
        ON positions(strategy_assignment_id, base_token_address, quote_token_address)
        WHERE status = 'OPEN'
        "#,
    )
    .await?;

    migrate(
        pool,
        "index",
        "CREATE INDEX IF NOT EXISTS idx_positions_assignment_status ON positions(strategy_assignment_id, status)",
    )
    .await?;

    migrate(
        pool,
        "index",
        "CREATE INDEX IF NOT EXISTS idx_transactions_assignment ON transactions(strategy_assignment_id, executed_at)",
    )
    .await?;

    migrate(
        pool,
        "index",
        "CREATE INDEX IF NOT EXISTS idx_transactions_position_id ON transactions(position_id)",
    )
    .await?;

    migrate(
        pool,
        "index",
        "CREATE INDEX IF NOT EXISTS idx_assignments_agent ON agent_strategy_assignments(agent_id, is_active)",
    )
    .await?;

    migrate(
        pool,
        "index",
        "CREATE INDEX IF NOT EXISTS idx_memories_agent ON memories(agent_id, created_at)",
    )
    .await?;

    info!("✓ Database migrations completed successfully");

    Ok(())
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/trading_agent.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Enable query logging
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            log_queries: cfg!(debug_assertions),
        }
    }
}

impl DatabaseConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

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

    /// Private in-memory database, used by tests.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            log_queries: false,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}
