use serde::Serialize;

use crate::domain::entities::position::Position;
use crate::domain::entities::token::TokenPair;
use crate::domain::entities::transaction::TransactionSide;

/// Output of evaluating one pair. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeDecision {
    pub should_open: bool,
    pub should_close: bool,
    pub token_pair: Option<TokenPair>,
    /// Amount of the token being spent, in UI units.
    pub amount: f64,
    pub strategy_assignment_id: Option<String>,
    pub description: String,
    /// Set only on close decisions.
    pub position: Option<Position>,
    pub has_open_position: bool,
    pub open_proximity: f64,
    pub close_proximity: f64,
    pub current_rsi: Option<f64>,
}

impl TradeDecision {
    pub fn is_actionable(&self) -> bool {
        self.should_open || self.should_close
    }

    pub fn side(&self) -> Option<TransactionSide> {
        if self.should_open {
            Some(TransactionSide::Buy)
        } else if self.should_close {
            Some(TransactionSide::Sell)
        } else {
            None
        }
    }
}

/// States a decision moves through in the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStage {
    Pending,
    Validating,
    Executing,
    Recording,
    Succeeded,
    Failed,
}

impl std::fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExecutionStage::Pending => "PENDING",
            ExecutionStage::Validating => "VALIDATING",
            ExecutionStage::Executing => "EXECUTING",
            ExecutionStage::Recording => "RECORDING",
            ExecutionStage::Succeeded => "SUCCEEDED",
            ExecutionStage::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of executing one actionable decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResult {
    pub pair: Option<String>,
    pub side: Option<TransactionSide>,
    pub stage: ExecutionStage,
    /// Stage that was running when the decision failed.
    pub failed_during: Option<ExecutionStage>,
    pub transaction_id: Option<String>,
    pub position_id: Option<String>,
    pub transaction_hash: Option<String>,
    pub amount_in: Option<String>,
    pub amount_out: Option<String>,
    pub realized_pnl_usd: Option<f64>,
    pub error: Option<String>,
}

impl TradeResult {
    pub fn is_success(&self) -> bool {
        self.stage == ExecutionStage::Succeeded
    }
}
