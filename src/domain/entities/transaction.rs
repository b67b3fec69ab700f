use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hash recorded for simulated swaps: 32 zero bytes, hex encoded.
pub const PAPER_TRADE_TX_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionSide {
    Buy,
    Sell,
}

impl TransactionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionSide::Buy => "BUY",
            TransactionSide::Sell => "SELL",
        }
    }
}

impl std::str::FromStr for TransactionSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(TransactionSide::Buy),
            "SELL" => Ok(TransactionSide::Sell),
            other => Err(format!("Unknown transaction side: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Open,
    Closed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Open => "OPEN",
            TransactionStatus::Closed => "CLOSED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(TransactionStatus::Open),
            "CLOSED" => Ok(TransactionStatus::Closed),
            "FAILED" => Ok(TransactionStatus::Failed),
            other => Err(format!("Unknown transaction status: {}", other)),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one swap attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub strategy_assignment_id: String,
    pub position_id: Option<String>,
    pub side: TransactionSide,
    pub status: TransactionStatus,
    pub from_token_address: String,
    pub from_token_symbol: String,
    pub from_token_decimals: u8,
    pub to_token_address: String,
    pub to_token_symbol: String,
    pub to_token_decimals: u8,
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

impl Transaction {
    pub fn is_paper_trade(&self) -> bool {
        self.transaction_hash.as_deref() == Some(PAPER_TRADE_TX_HASH)
    }
}

/// Input for `TransactionStore::create`. There is no update counterpart.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub strategy_assignment_id: String,
    pub position_id: Option<String>,
    pub side: TransactionSide,
    pub status: TransactionStatus,
    pub from_token_address: String,
    pub from_token_symbol: String,
    pub from_token_decimals: u8,
    pub to_token_address: String,
    pub to_token_symbol: String,
    pub to_token_decimals: u8,
    pub amount_in: String,
    pub amount_out: String,
    pub from_price_usd: f64,
    pub to_price_usd: f64,
    pub fee_lamports: i64,
    pub profit_loss_usd: Option<f64>,
    pub profit_loss_percentage: Option<f64>,
    pub transaction_hash: Option<String>,
    pub failure_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_hash_is_32_zero_bytes() {
        assert_eq!(PAPER_TRADE_TX_HASH.len(), 66);
        assert!(PAPER_TRADE_TX_HASH[2..].chars().all(|c| c == '0'));
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Failed).unwrap(),
            "\"FAILED\""
        );
        assert_eq!(serde_json::to_string(&TransactionSide::Sell).unwrap(), "\"SELL\"");
        assert_eq!("BUY".parse::<TransactionSide>().unwrap(), TransactionSide::Buy);
        assert_eq!(
            "CLOSED".parse::<TransactionStatus>().unwrap(),
            TransactionStatus::Closed
        );
        assert!("PENDING".parse::<TransactionStatus>().is_err());
    }
}
