use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::domain::entities::portfolio::Portfolio;
use crate::domain::errors::{ProviderError, StoreError};
use crate::domain::repositories::market_data::WalletPortfolioService;
use crate::domain::repositories::trading_store::PositionStore;

#[derive(Debug, Error, Clone)]
pub enum PortfolioError {
    #[error("Failed to load open positions: {0}")]
    Positions(#[from] StoreError),

    #[error("Failed to load wallet portfolio: {0}")]
    Wallet(#[from] ProviderError),
}

/// Loads open positions and wallet balances for one strategy assignment.
pub struct PortfolioProvider {
    positions: Arc<dyn PositionStore>,
    wallet_service: Arc<dyn WalletPortfolioService>,
}

impl PortfolioProvider {
    pub fn new(positions: Arc<dyn PositionStore>, wallet_service: Arc<dyn WalletPortfolioService>) -> Self {
        Self {
            positions,
            wallet_service,
        }
    }

    pub async fn get_portfolio(
        &self,
        strategy_assignment_id: &str,
        public_key: &str,
    ) -> Result<Portfolio, PortfolioError> {
        let positions = async {
            self.positions
                .find_open(strategy_assignment_id)
                .await
                .map_err(PortfolioError::from)
        };
        let wallet = async {
            self.wallet_service
                .get_wallet_portfolio(public_key)
                .await
                .map_err(PortfolioError::from)
        };

        let (open_positions, wallet) = tokio::try_join!(positions, wallet)?;
        let portfolio = Portfolio::new(open_positions, wallet);
        info!(
            "Portfolio loaded: {} open positions, {} wallet tokens, ${:.2} total",
            portfolio.open_positions.len(),
            portfolio.wallet_items.len(),
            portfolio.total_value
        );
        Ok(portfolio)
    }
}
