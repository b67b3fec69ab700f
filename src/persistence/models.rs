//! Database Models
//!
//! Row shapes for strategies, assignments, positions, transactions and
//! memories, plus their conversions into domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::entities::position::{Position, TokenDescriptor};
use crate::domain::entities::strategy::{
    AgentStrategyAssignment, TradingStrategy, TradingStrategyConfig,
};
use crate::domain::entities::transaction::Transaction;
use crate::domain::errors::StoreError;

fn decimals(value: i64, column: &str) -> Result<u8, StoreError> {
    u8::try_from(value).map_err(|_| StoreError::Corrupt(format!("{} out of range: {}", column, value)))
}

/// Position record in database
#[derive(Debug, Clone, FromRow)]
pub struct PositionRecord {
    pub id: String,
    pub strategy_assignment_id: String,
    pub base_token_address: String,
    pub base_token_symbol: String,
    pub base_token_decimals: i64,
    pub base_token_logo_uri: Option<String>,
    pub quote_token_address: String,
    pub quote_token_symbol: String,
    pub quote_token_decimals: i64,
    pub quote_token_logo_uri: Option<String>,
    pub status: String, // "OPEN" or "CLOSED"
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub total_base_amount: String,
    pub average_entry_price: f64,
    pub realized_pnl_usd: Option<f64>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PositionRecord> for Position {
    type Error = StoreError;

    fn try_from(record: PositionRecord) -> Result<Self, Self::Error> {
        Ok(Position {
            status: record.status.parse().map_err(StoreError::Corrupt)?,
            base_token: TokenDescriptor {
                address: record.base_token_address,
                symbol: record.base_token_symbol,
                decimals: decimals(record.base_token_decimals, "base_token_decimals")?,
                logo_uri: record.base_token_logo_uri,
            },
            quote_token: TokenDescriptor {
                address: record.quote_token_address,
                symbol: record.quote_token_symbol,
                decimals: decimals(record.quote_token_decimals, "quote_token_decimals")?,
                logo_uri: record.quote_token_logo_uri,
            },
            id: record.id,
            strategy_assignment_id: record.strategy_assignment_id,
            entry_price: record.entry_price,
            exit_price: record.exit_price,
            total_base_amount: record.total_base_amount,
            average_entry_price: record.average_entry_price,
            realized_pnl_usd: record.realized_pnl_usd,
            opened_at: record.opened_at,
            closed_at: record.closed_at,
        })
    }
}

/// Transaction record in database
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRecord {
    pub id: String,
    pub strategy_assignment_id: String,
    pub position_id: Option<String>,
    pub side: String,   // "BUY" or "SELL"
    pub status: String, // "OPEN", "CLOSED" or "FAILED"
    pub from_token_address: String,
    pub from_token_symbol: String,
    pub from_token_decimals: i64,
    pub to_token_address: String,
    pub to_token_symbol: String,
    pub to_token_decimals: i64,
    pub amount_in: String,
    pub amount_out: String,
    pub from_price_usd: f64,
    pub to_price_usd: f64,
    pub fee_lamports: i64,
    pub profit_loss_usd: Option<f64>,
    pub profit_loss_percentage: Option<f64>,
    pub transaction_hash: Option<String>,
    pub failure_reason: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = StoreError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        Ok(Transaction {
            side: record.side.parse().map_err(StoreError::Corrupt)?,
            status: record.status.parse().map_err(StoreError::Corrupt)?,
            from_token_decimals: decimals(record.from_token_decimals, "from_token_decimals")?,
            to_token_decimals: decimals(record.to_token_decimals, "to_token_decimals")?,
            id: record.id,
            strategy_assignment_id: record.strategy_assignment_id,
            position_id: record.position_id,
            from_token_address: record.from_token_address,
            from_token_symbol: record.from_token_symbol,
            to_token_address: record.to_token_address,
            to_token_symbol: record.to_token_symbol,
            amount_in: record.amount_in,
            amount_out: record.amount_out,
            from_price_usd: record.from_price_usd,
            to_price_usd: record.to_price_usd,
            fee_lamports: record.fee_lamports,
            profit_loss_usd: record.profit_loss_usd,
            profit_loss_percentage: record.profit_loss_percentage,
            transaction_hash: record.transaction_hash,
            failure_reason: record.failure_reason,
            executed_at: record.executed_at,
        })
    }
}

/// Assignment joined with its strategy
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRecord {
    pub id: String,
    pub agent_id: String,
    pub strategy_id: String,
    pub is_active: bool,
    pub is_paper_trading: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub config_json: String,
}

impl TryFrom<AssignmentRecord> for AgentStrategyAssignment {
    type Error = StoreError;

    fn try_from(record: AssignmentRecord) -> Result<Self, Self::Error> {
        let config: TradingStrategyConfig = serde_json::from_str(&record.config_json).map_err(|e| {
            StoreError::Corrupt(format!("strategy {} config: {}", record.strategy_id, e))
        })?;
        Ok(AgentStrategyAssignment {
            id: record.id,
            agent_id: record.agent_id,
            is_active: record.is_active,
            is_paper_trading: record.is_paper_trading,
            start_date: record.start_date,
            end_date: record.end_date,
            strategy: TradingStrategy {
                id: record.strategy_id,
                config,
            },
        })
    }
}

/// Memory record in database
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MemoryRecord {
    pub id: i64,
    pub agent_id: String,
    pub kind: String,
    pub message: String,
    pub additional_content: String, // JSON string
    pub created_at: DateTime<Utc>,
}

/// Strategy file used to seed the active assignment at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategySeed {
    pub agent_id: String,
    pub strategy_id: String,
    pub assignment_id: String,
    #[serde(default = "default_paper_trading")]
    pub is_paper_trading: bool,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub strategy: TradingStrategyConfig,
}

fn default_paper_trading() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::position::PositionStatus;

    #[test]
    fn test_position_record_conversion_rejects_bad_status() {
        let now = Utc::now();
        let record = PositionRecord {
            id: "pos_1".to_string(),
            strategy_assignment_id: "asg_1".to_string(),
            base_token_address: "sol".to_string(),
            base_token_symbol: "SOL".to_string(),
            base_token_decimals: 9,
            base_token_logo_uri: None,
            quote_token_address: "usdc".to_string(),
            quote_token_symbol: "USDC".to_string(),
            quote_token_decimals: 6,
            quote_token_logo_uri: None,
            status: "OPEN".to_string(),
            entry_price: 1.0,
            exit_price: None,
            total_base_amount: "1".to_string(),
            average_entry_price: 1.0,
            realized_pnl_usd: None,
            opened_at: now,
            closed_at: None,
            created_at: now,
            updated_at: now,
        };
        let position = Position::try_from(record.clone()).unwrap();
        assert_eq!(position.status, PositionStatus::Open);
        assert_eq!(position.base_token.decimals, 9);

        let bad = PositionRecord {
            status: "open".to_string(),
            ..record
        };
        assert!(matches!(Position::try_from(bad), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_strategy_seed_defaults_to_paper() {
        let json = r#"{
            "agentId": "agent_1",
            "strategyId": "strat_1",
            "assignmentId": "asg_1",
            "strategy": {
                "title": "SOL dip buyer",
                "type": "RSI",
                "tokenPairs": [],
                "timeInterval": "4H",
                "maxPortfolioAllocation": 20
            }
        }"#;
        let seed: StrategySeed = serde_json::from_str(json).unwrap();
        assert!(seed.is_paper_trading);
        assert_eq!(seed.strategy.rsi_config.length, 14);
    }
}
