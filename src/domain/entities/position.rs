use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::token::Token;
use crate::domain::errors::ValidationError;
use crate::domain::value_objects::quantity::Quantity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "OPEN",
            PositionStatus::Closed => "CLOSED",
        }
    }
}

impl std::str::FromStr for PositionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(PositionStatus::Open),
            "CLOSED" => Ok(PositionStatus::Closed),
            other => Err(format!("Unknown position status: {}", other)),
        }
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of a token as stored on a position row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
    pub logo_uri: Option<String>,
}

impl From<&Token> for TokenDescriptor {
    fn from(token: &Token) -> Self {
        TokenDescriptor {
            address: token.address.clone(),
            symbol: token.symbol.clone(),
            decimals: token.decimals,
            logo_uri: token.logo_uri.clone(),
        }
    }
}

/// Holding of a pair's "to" token (base), priced against its "from" token (quote).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    pub strategy_assignment_id: String,
    pub base_token: TokenDescriptor,
    pub quote_token: TokenDescriptor,
    pub status: PositionStatus,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub total_base_amount: String,
    pub average_entry_price: f64,
    pub realized_pnl_usd: Option<f64>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn base_amount(&self) -> Result<Quantity, ValidationError> {
        Quantity::parse(&self.total_base_amount)
    }
}

/// Input for opening a position.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub strategy_assignment_id: String,
    pub base_token: TokenDescriptor,
    pub quote_token: TokenDescriptor,
    pub entry_price: f64,
    pub total_base_amount: Quantity,
}

/// Input for the OPEN -> CLOSED transition.
#[derive(Debug, Clone)]
pub struct ClosePosition {
    pub exit_price: f64,
    pub realized_pnl_usd: f64,
    pub closed_at: DateTime<Utc>,
}
