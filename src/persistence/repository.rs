//! Database Repository
//!
//! Data access layer for strategies, positions, transactions and memories.
//! Each repository implements the matching domain store trait.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use super::models::*;
use super::{query_error, DbPool};
use crate::domain::entities::position::{ClosePosition, NewPosition, Position};
use crate::domain::entities::strategy::{AgentStrategyAssignment, TradingStrategy};
use crate::domain::entities::transaction::{NewTransaction, Transaction};
use crate::domain::errors::StoreError;
use crate::domain::repositories::trading_store::{
    MemorySink, NewMemory, PositionStore, StoreResult, StrategyStore, TransactionStore,
};

fn new_id(prefix: &str) -> String {
    format!(
        "{}_{}_{}",
        prefix,
        Utc::now().timestamp_millis(),
        rand::random::<u32>()
    )
}

/// Position repository
pub struct PositionRepository {
    pool: DbPool,
}

impl PositionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get position by ID
    pub async fn get(&self, id: &str) -> StoreResult<Option<Position>> {
        let record = sqlx::query_as::<_, PositionRecord>("SELECT * FROM positions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error(&format!("Failed to get position {}", id), e))?;

        record.map(Position::try_from).transpose()
    }
}

async fn insert_position(conn: &mut SqliteConnection, position: NewPosition) -> StoreResult<Position> {
    let now = Utc::now();
    let entry_price = position.entry_price;
    let record = sqlx::query_as::<_, PositionRecord>(
        r#"
        INSERT INTO positions (
            id, strategy_assignment_id,
            base_token_address, base_token_symbol, base_token_decimals, base_token_logo_uri,
            quote_token_address, quote_token_symbol, quote_token_decimals, quote_token_logo_uri,
            status, entry_price, total_base_amount, average_entry_price,
            opened_at, created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'OPEN', ?11, ?12, ?11, ?13, ?13, ?13)
        RETURNING *
        "#,
    )
    .bind(new_id("pos"))
    .bind(&position.strategy_assignment_id)
    .bind(&position.base_token.address)
    .bind(&position.base_token.symbol)
    .bind(i64::from(position.base_token.decimals))
    .bind(&position.base_token.logo_uri)
    .bind(&position.quote_token.address)
    .bind(&position.quote_token.symbol)
    .bind(i64::from(position.quote_token.decimals))
    .bind(&position.quote_token.logo_uri)
    .bind(entry_price)
    .bind(position.total_base_amount.to_string())
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| query_error("Failed to create position", e))?;

    debug!(
        "Created position: {} {}/{}",
        record.id, record.base_token_symbol, record.quote_token_symbol
    );
    Position::try_from(record)
}

async fn close_position(
    conn: &mut SqliteConnection,
    position_id: &str,
    close: ClosePosition,
) -> StoreResult<Position> {
    let now = Utc::now();
    let record = sqlx::query_as::<_, PositionRecord>(
        r#"
        UPDATE positions
        SET status = 'CLOSED', exit_price = ?1, realized_pnl_usd = ?2,
            closed_at = ?3, updated_at = ?4
        WHERE id = ?5 AND status = 'OPEN'
        RETURNING *
        "#,
    )
    .bind(close.exit_price)
    .bind(close.realized_pnl_usd)
    .bind(close.closed_at)
    .bind(now)
    .bind(position_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| query_error(&format!("Failed to close position {}", position_id), e))?;

    let record = record.ok_or_else(|| {
        StoreError::NotFound(format!(
            "Position not found or already closed: {}",
            position_id
        ))
    })?;

    debug!("Closed position: {}", position_id);
    Position::try_from(record)
}

async fn insert_transaction(
    conn: &mut SqliteConnection,
    transaction: NewTransaction,
) -> StoreResult<Transaction> {
    let now = Utc::now();
    let record = sqlx::query_as::<_, TransactionRecord>(
        r#"
        INSERT INTO transactions (
            id, strategy_assignment_id, position_id, side, status,
            from_token_address, from_token_symbol, from_token_decimals,
            to_token_address, to_token_symbol, to_token_decimals,
            amount_in, amount_out, from_price_usd, to_price_usd, fee_lamports,
            profit_loss_usd, profit_loss_percentage, transaction_hash, failure_reason,
            executed_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
        RETURNING *
        "#,
    )
    .bind(new_id("tx"))
    .bind(&transaction.strategy_assignment_id)
    .bind(&transaction.position_id)
    .bind(transaction.side.as_str())
    .bind(transaction.status.as_str())
    .bind(&transaction.from_token_address)
    .bind(&transaction.from_token_symbol)
    .bind(i64::from(transaction.from_token_decimals))
    .bind(&transaction.to_token_address)
    .bind(&transaction.to_token_symbol)
    .bind(i64::from(transaction.to_token_decimals))
    .bind(&transaction.amount_in)
    .bind(&transaction.amount_out)
    .bind(transaction.from_price_usd)
    .bind(transaction.to_price_usd)
    .bind(transaction.fee_lamports)
    .bind(transaction.profit_loss_usd)
    .bind(transaction.profit_loss_percentage)
    .bind(&transaction.transaction_hash)
    .bind(&transaction.failure_reason)
    .bind(now)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| query_error("Failed to create transaction", e))?;

    debug!(
        "Created transaction: {} {} {} {} -> {}",
        record.id, record.side, record.status, record.from_token_symbol, record.to_token_symbol
    );
    Transaction::try_from(record)
}

#[async_trait]
impl PositionStore for PositionRepository {
    async fn open(
        &self,
        position: NewPosition,
        mut transaction: NewTransaction,
    ) -> StoreResult<(Position, Transaction)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_error("Failed to begin position open", e))?;

        let position = insert_position(&mut *tx, position).await?;
        transaction.position_id = Some(position.id.clone());
        let transaction = insert_transaction(&mut *tx, transaction).await?;

        tx.commit()
            .await
            .map_err(|e| query_error("Failed to commit position open", e))?;
        Ok((position, transaction))
    }

    async fn close(
        &self,
        position_id: &str,
        close: ClosePosition,
        mut transaction: NewTransaction,
    ) -> StoreResult<(Position, Transaction)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_error("Failed to begin position close", e))?;

        let position = close_position(&mut *tx, position_id, close).await?;
        transaction.position_id = Some(position.id.clone());
        let transaction = insert_transaction(&mut *tx, transaction).await?;

        tx.commit()
            .await
            .map_err(|e| query_error("Failed to commit position close", e))?;
        Ok((position, transaction))
    }

    async fn find_first_open(
        &self,
        strategy_assignment_id: &str,
        base_token_address: &str,
        quote_token_address: &str,
    ) -> StoreResult<Option<Position>> {
        let record = sqlx::query_as::<_, PositionRecord>(
            r#"
            SELECT * FROM positions
            WHERE strategy_assignment_id = ?1
              AND base_token_address = ?2
              AND quote_token_address = ?3
              AND status = 'OPEN'
            ORDER BY opened_at ASC
            LIMIT 1
            "#,
        )
        .bind(strategy_assignment_id)
        .bind(base_token_address)
        .bind(quote_token_address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to find open position", e))?;

        record.map(Position::try_from).transpose()
    }

    async fn find_open(&self, strategy_assignment_id: &str) -> StoreResult<Vec<Position>> {
        let records = sqlx::query_as::<_, PositionRecord>(
            "SELECT * FROM positions WHERE strategy_assignment_id = ?1 AND status = 'OPEN' ORDER BY opened_at ASC",
        )
        .bind(strategy_assignment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get open positions", e))?;

        records.into_iter().map(Position::try_from).collect()
    }
}

/// Transaction repository
pub struct TransactionRepository {
    pool: DbPool,
}

impl TransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// All transactions of an assignment, oldest first
    pub async fn find_by_assignment(&self, strategy_assignment_id: &str) -> StoreResult<Vec<Transaction>> {
        let records = sqlx::query_as::<_, TransactionRecord>(
            "SELECT * FROM transactions WHERE strategy_assignment_id = ?1 ORDER BY executed_at ASC, rowid ASC",
        )
        .bind(strategy_assignment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get transactions", e))?;

        records.into_iter().map(Transaction::try_from).collect()
    }

    /// Transactions that opened or closed a position
    pub async fn find_by_position(&self, position_id: &str) -> StoreResult<Vec<Transaction>> {
        let records = sqlx::query_as::<_, TransactionRecord>(
            "SELECT * FROM transactions WHERE position_id = ?1 ORDER BY executed_at ASC, rowid ASC",
        )
        .bind(position_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get position transactions", e))?;

        records.into_iter().map(Transaction::try_from).collect()
    }
}

#[async_trait]
impl TransactionStore for TransactionRepository {
    async fn create(&self, transaction: NewTransaction) -> StoreResult<Transaction> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| query_error("Failed to acquire connection", e))?;
        insert_transaction(&mut *conn, transaction).await
    }
}

/// Strategy and assignment repository
pub struct StrategyRepository {
    pool: DbPool,
}

impl StrategyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a strategy definition
    pub async fn upsert_strategy(&self, strategy: &TradingStrategy) -> StoreResult<()> {
        let config_json = serde_json::to_string(&strategy.config)
            .map_err(|e| StoreError::Corrupt(format!("strategy {}: {}", strategy.id, e)))?;
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO trading_strategies (id, title, strategy_type, config_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                strategy_type = excluded.strategy_type,
                config_json = excluded.config_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&strategy.id)
        .bind(&strategy.config.title)
        .bind(strategy.config.strategy_type.to_string())
        .bind(config_json)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to upsert strategy", e))?;

        debug!("Upserted strategy: {}", strategy.id);
        Ok(())
    }

    /// Insert or replace an assignment; its strategy is written first
    pub async fn upsert_assignment(&self, assignment: &AgentStrategyAssignment) -> StoreResult<()> {
        self.upsert_strategy(&assignment.strategy).await?;
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO agent_strategy_assignments (
                id, agent_id, strategy_id, is_active, is_paper_trading,
                start_date, end_date, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(id) DO UPDATE SET
                agent_id = excluded.agent_id,
                strategy_id = excluded.strategy_id,
                is_active = excluded.is_active,
                is_paper_trading = excluded.is_paper_trading,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&assignment.id)
        .bind(&assignment.agent_id)
        .bind(&assignment.strategy.id)
        .bind(assignment.is_active)
        .bind(assignment.is_paper_trading)
        .bind(assignment.start_date)
        .bind(assignment.end_date)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to upsert assignment", e))?;

        debug!(
            "Upserted assignment: {} (agent {}, strategy {})",
            assignment.id, assignment.agent_id, assignment.strategy.id
        );
        Ok(())
    }

    /// Validate a strategy file entry and store it as the agent's active assignment
    pub async fn seed(&self, seed: StrategySeed) -> StoreResult<AgentStrategyAssignment> {
        seed.strategy
            .validate()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let assignment = AgentStrategyAssignment {
            id: seed.assignment_id,
            agent_id: seed.agent_id,
            is_active: true,
            is_paper_trading: seed.is_paper_trading,
            start_date: seed.start_date.unwrap_or_else(Utc::now),
            end_date: seed.end_date,
            strategy: TradingStrategy {
                id: seed.strategy_id,
                config: seed.strategy,
            },
        };
        self.upsert_assignment(&assignment).await?;

        info!(
            "Seeded strategy '{}' for agent {} ({})",
            assignment.config().title,
            assignment.agent_id,
            if assignment.is_paper_trading { "paper" } else { "live" }
        );
        Ok(assignment)
    }
}

#[async_trait]
impl StrategyStore for StrategyRepository {
    async fn find_active_assignment(&self, agent_id: &str) -> StoreResult<AgentStrategyAssignment> {
        let records = sqlx::query_as::<_, AssignmentRecord>(
            r#"
            SELECT a.id, a.agent_id, a.strategy_id, a.is_active, a.is_paper_trading,
                   a.start_date, a.end_date, s.config_json
            FROM agent_strategy_assignments a
            JOIN trading_strategies s ON s.id = a.strategy_id
            WHERE a.agent_id = ?1 AND a.is_active = 1
            ORDER BY a.start_date DESC
            "#,
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to find active assignment", e))?;

        let now = Utc::now();
        for record in records {
            let assignment = AgentStrategyAssignment::try_from(record)?;
            if assignment.is_live_at(now) {
                return Ok(assignment);
            }
        }

        Err(StoreError::NotFound(format!(
            "No active strategy assignment for agent {}",
            agent_id
        )))
    }
}

/// Memory repository
pub struct MemoryRepository {
    pool: DbPool,
}

impl MemoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Most recent memories first
    pub async fn recent(&self, agent_id: &str, limit: i64) -> StoreResult<Vec<MemoryRecord>> {
        sqlx::query_as::<_, MemoryRecord>(
            "SELECT * FROM memories WHERE agent_id = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get memories", e))
    }
}

#[async_trait]
impl MemorySink for MemoryRepository {
    async fn create_memory(&self, memory: NewMemory) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO memories (agent_id, kind, message, additional_content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&memory.agent_id)
        .bind(memory.kind.as_str())
        .bind(&memory.message)
        .bind(memory.additional_content.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to create memory", e))?;

        debug!("Stored {} memory for agent {}", memory.kind.as_str(), memory.agent_id);
        Ok(())
    }
}
