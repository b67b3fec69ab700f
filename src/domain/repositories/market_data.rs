use async_trait::async_trait;

use crate::domain::entities::portfolio::WalletPortfolio;
use crate::domain::entities::price_history::PricePoint;
use crate::domain::entities::token::MarketMetadata;
use crate::domain::errors::ProviderError;
use crate::domain::value_objects::interval::TimeInterval;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// What a price-history address refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    Token,
    Pair,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Token => "token",
            AddressType::Pair => "pair",
        }
    }
}

/// Historical and live market data for tokens.
#[async_trait]
pub trait PriceService: Send + Sync {
    /// Price series between `time_from` and `time_to` (unix seconds).
    /// An empty vector means the provider has no data for the window.
    async fn fetch_price_history(
        &self,
        address: &str,
        address_type: AddressType,
        interval: TimeInterval,
        time_from: i64,
        time_to: i64,
    ) -> ProviderResult<Vec<PricePoint>>;

    /// Liquidity, volume and trust data used to gate trades.
    async fn fetch_market_metadata(&self, address: &str) -> ProviderResult<MarketMetadata>;
}

#[async_trait]
pub trait WalletPortfolioService: Send + Sync {
    async fn get_wallet_portfolio(&self, public_key: &str) -> ProviderResult<WalletPortfolio>;
}
