use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::token::TokenPair;
use crate::domain::errors::ValidationError;
use crate::domain::value_objects::interval::TimeInterval;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyType {
    Rsi,
}

impl std::fmt::Display for StrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyType::Rsi => write!(f, "RSI"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsiConfig {
    pub length: usize,
    pub over_bought: f64,
    pub over_sold: f64,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            length: 14,
            over_bought: 70.0,
            over_sold: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingStrategyConfig {
    pub title: String,
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    pub token_pairs: Vec<TokenPair>,
    pub time_interval: TimeInterval,
    /// Percent (0-100) of the "from" token holding a single trade may commit.
    pub max_portfolio_allocation: f64,
    #[serde(default)]
    pub rsi_config: RsiConfig,
}

impl TradingStrategyConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=100.0).contains(&self.max_portfolio_allocation) {
            return Err(ValidationError::InvalidStrategy(format!(
                "maxPortfolioAllocation must be within 0-100, got {}",
                self.max_portfolio_allocation
            )));
        }
        let rsi = &self.rsi_config;
        if rsi.length == 0 {
            return Err(ValidationError::InvalidStrategy(
                "rsiConfig.length must be positive".to_string(),
            ));
        }
        if !(0.0 < rsi.over_sold && rsi.over_sold < rsi.over_bought && rsi.over_bought < 100.0) {
            return Err(ValidationError::InvalidStrategy(format!(
                "RSI thresholds must satisfy 0 < overSold ({}) < overBought ({}) < 100",
                rsi.over_sold, rsi.over_bought
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingStrategy {
    pub id: String,
    pub config: TradingStrategyConfig,
}

/// Binds one agent wallet to one strategy and a trading mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStrategyAssignment {
    pub id: String,
    pub agent_id: String,
    pub is_active: bool,
    pub is_paper_trading: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub strategy: TradingStrategy,
}

impl AgentStrategyAssignment {
    pub fn config(&self) -> &TradingStrategyConfig {
        &self.strategy.config
    }

    pub fn is_live_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= at && self.end_date.map_or(true, |end| at < end)
    }
}
