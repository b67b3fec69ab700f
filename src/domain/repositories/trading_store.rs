use async_trait::async_trait;
use serde::Serialize;

use crate::domain::entities::position::{ClosePosition, NewPosition, Position};
use crate::domain::entities::strategy::AgentStrategyAssignment;
use crate::domain::entities::transaction::{NewTransaction, Transaction};
use crate::domain::errors::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Inserts the position together with the transaction that opened it.
    /// The transaction's `position_id` is set to the new position. Either
    /// both rows are written or neither is.
    async fn open(
        &self,
        position: NewPosition,
        transaction: NewTransaction,
    ) -> StoreResult<(Position, Transaction)>;

    /// OPEN -> CLOSED together with the closing transaction, all or nothing.
    /// Fails when the position is not open.
    async fn close(
        &self,
        position_id: &str,
        close: ClosePosition,
        transaction: NewTransaction,
    ) -> StoreResult<(Position, Transaction)>;

    async fn find_first_open(
        &self,
        strategy_assignment_id: &str,
        base_token_address: &str,
        quote_token_address: &str,
    ) -> StoreResult<Option<Position>>;

    async fn find_open(&self, strategy_assignment_id: &str) -> StoreResult<Vec<Position>>;
}

/// Transactions are append-only.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn create(&self, transaction: NewTransaction) -> StoreResult<Transaction>;
}

#[async_trait]
pub trait StrategyStore: Send + Sync {
    /// Errors with `StoreError::NotFound` when the agent has no active assignment.
    async fn find_active_assignment(&self, agent_id: &str) -> StoreResult<AgentStrategyAssignment>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemoryKind {
    Trade,
    Idle,
    Error,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Trade => "TRADE",
            MemoryKind::Idle => "IDLE",
            MemoryKind::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    pub agent_id: String,
    pub kind: MemoryKind,
    pub message: String,
    pub additional_content: serde_json::Value,
}

/// Narrative log of what the agent did each cycle.
#[async_trait]
pub trait MemorySink: Send + Sync {
    async fn create_memory(&self, memory: NewMemory) -> StoreResult<()>;
}
