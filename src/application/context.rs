//! Per-cycle trading context: who trades, with which wallet and strategy,
//! and everything the cycle learns along the way.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::domain::entities::decision::{TradeDecision, TradeResult};
use crate::domain::entities::portfolio::Portfolio;
use crate::domain::entities::price_history::PriceHistorySnapshot;
use crate::domain::entities::strategy::AgentStrategyAssignment;
use crate::domain::errors::{StoreError, ValidationError};
use crate::domain::repositories::secret_service::{SecretService, WalletKeys};
use crate::domain::repositories::trading_store::StrategyStore;
use crate::secrets::SecretError;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Failed to load wallet: {0}")]
    Wallet(#[from] SecretError),

    #[error("Failed to load strategy assignment: {0}")]
    Assignment(#[from] StoreError),

    #[error("Strategy assignment {assignment_id} is invalid: {source}")]
    InvalidStrategy {
        assignment_id: String,
        source: ValidationError,
    },
}

/// Read-only inputs are fixed when the context is built; portfolio, price
/// history, decisions and results are filled in as the cycle progresses.
#[derive(Debug)]
pub struct TradingContext {
    pub agent_id: String,
    pub cycle: u64,
    pub wallet: WalletKeys,
    pub assignment: AgentStrategyAssignment,
    pub is_paper_trading: bool,
    pub portfolio: Portfolio,
    pub price_history: PriceHistorySnapshot,
    pub decisions: Vec<TradeDecision>,
    pub results: Vec<TradeResult>,
    pub log_message: String,
}

impl TradingContext {
    pub fn new(agent_id: &str, cycle: u64, wallet: WalletKeys, assignment: AgentStrategyAssignment) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            cycle,
            wallet,
            is_paper_trading: assignment.is_paper_trading,
            assignment,
            portfolio: Portfolio::default(),
            price_history: PriceHistorySnapshot::default(),
            decisions: Vec::new(),
            results: Vec::new(),
            log_message: String::new(),
        }
    }

    pub fn strategy_title(&self) -> &str {
        &self.assignment.config().title
    }

    pub fn mode(&self) -> &'static str {
        if self.is_paper_trading {
            "PAPER"
        } else {
            "LIVE"
        }
    }
}

/// Loads the wallet keys and the active strategy assignment for an agent.
pub struct ContextBuilder {
    secrets: Arc<dyn SecretService>,
    strategies: Arc<dyn StrategyStore>,
}

impl ContextBuilder {
    pub fn new(secrets: Arc<dyn SecretService>, strategies: Arc<dyn StrategyStore>) -> Self {
        Self { secrets, strategies }
    }

    pub async fn build(&self, agent_id: &str, cycle: u64) -> Result<TradingContext, ContextError> {
        let wallet = async {
            self.secrets
                .agent_wallet_details(agent_id, cycle)
                .await
                .map_err(ContextError::from)
        };
        let assignment = async {
            self.strategies
                .find_active_assignment(agent_id)
                .await
                .map_err(ContextError::from)
        };
        let (wallet, assignment) = tokio::try_join!(wallet, assignment)?;

        assignment
            .config()
            .validate()
            .map_err(|source| ContextError::InvalidStrategy {
                assignment_id: assignment.id.clone(),
                source,
            })?;

        info!(
            "Context ready: agent {} cycle {} strategy '{}' ({} pairs, {}, {})",
            agent_id,
            cycle,
            assignment.config().title,
            assignment.config().token_pairs.len(),
            assignment.config().time_interval,
            if assignment.is_paper_trading { "paper" } else { "live" }
        );

        Ok(TradingContext::new(agent_id, cycle, wallet, assignment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::strategy::{RsiConfig, StrategyType, TradingStrategy, TradingStrategyConfig};
    use crate::domain::value_objects::interval::TimeInterval;
    use async_trait::async_trait;
    use chrono::Utc;
    use zeroize::Zeroizing;

    struct StaticSecrets;

    #[async_trait]
    impl SecretService for StaticSecrets {
        async fn decrypt(&self, ciphertext: &str) -> Result<Zeroizing<String>, SecretError> {
            Ok(Zeroizing::new(ciphertext.to_string()))
        }

        async fn agent_wallet_details(&self, _agent_id: &str, _cycle: u64) -> Result<WalletKeys, SecretError> {
            Ok(WalletKeys {
                public_key: "wallet".to_string(),
                private_key: Zeroizing::new("key".to_string()),
            })
        }
    }

    struct StaticStrategies(Option<AgentStrategyAssignment>);

    #[async_trait]
    impl StrategyStore for StaticStrategies {
        async fn find_active_assignment(&self, agent_id: &str) -> Result<AgentStrategyAssignment, StoreError> {
            self.0
                .clone()
                .ok_or_else(|| StoreError::NotFound(format!("agent {}", agent_id)))
        }
    }

    fn assignment(over_sold: f64) -> AgentStrategyAssignment {
        AgentStrategyAssignment {
            id: "asg_1".to_string(),
            agent_id: "agent_1".to_string(),
            is_active: true,
            is_paper_trading: true,
            start_date: Utc::now(),
            end_date: None,
            strategy: TradingStrategy {
                id: "strat_1".to_string(),
                config: TradingStrategyConfig {
                    title: "dip".to_string(),
                    strategy_type: StrategyType::Rsi,
                    token_pairs: vec![],
                    time_interval: TimeInterval::H1,
                    max_portfolio_allocation: 10.0,
                    rsi_config: RsiConfig {
                        over_sold,
                        ..RsiConfig::default()
                    },
                },
            },
        }
    }

    #[tokio::test]
    async fn test_build_context() {
        let builder = ContextBuilder::new(
            Arc::new(StaticSecrets),
            Arc::new(StaticStrategies(Some(assignment(30.0)))),
        );
        let ctx = builder.build("agent_1", 4).await.unwrap();
        assert_eq!(ctx.cycle, 4);
        assert!(ctx.is_paper_trading);
        assert_eq!(ctx.mode(), "PAPER");
        assert_eq!(ctx.wallet.public_key, "wallet");
        assert!(ctx.decisions.is_empty());
    }

    #[tokio::test]
    async fn test_missing_assignment_fails() {
        let builder = ContextBuilder::new(Arc::new(StaticSecrets), Arc::new(StaticStrategies(None)));
        let err = builder.build("agent_1", 1).await.unwrap_err();
        assert!(matches!(err, ContextError::Assignment(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_strategy_fails() {
        let builder = ContextBuilder::new(
            Arc::new(StaticSecrets),
            Arc::new(StaticStrategies(Some(assignment(95.0)))),
        );
        let err = builder.build("agent_1", 1).await.unwrap_err();
        assert!(err.to_string().contains("asg_1"));
    }
}
