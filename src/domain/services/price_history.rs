//! Price series for every token a strategy trades.

use chrono::Utc;
use futures_util::future::{join_all, try_join_all};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::entities::price_history::{PriceHistorySnapshot, TokenPriceHistory};
use crate::domain::entities::strategy::TradingStrategyConfig;
use crate::domain::entities::token::{MarketMetadata, Token};
use crate::domain::errors::ProviderError;
use crate::domain::repositories::market_data::{AddressType, PriceService};

/// Number of bars requested per series.
pub const LOOKBACK_BARS: u32 = 100;

pub struct PriceHistoryProvider {
    price_service: Arc<dyn PriceService>,
}

impl PriceHistoryProvider {
    pub fn new(price_service: Arc<dyn PriceService>) -> Self {
        Self { price_service }
    }

    /// Tokens of all pairs, each once, in first-seen order.
    pub fn unique_tokens(config: &TradingStrategyConfig) -> Vec<Token> {
        let mut seen = HashSet::new();
        config
            .token_pairs
            .iter()
            .flat_map(|pair| [&pair.from, &pair.to])
            .filter(|token| seen.insert(token.address.clone()))
            .cloned()
            .collect()
    }

    pub async fn get_price_history(
        &self,
        config: &TradingStrategyConfig,
    ) -> Result<PriceHistorySnapshot, ProviderError> {
        self.get_price_history_at(config, Utc::now().timestamp_millis())
            .await
    }

    /// Same as [`get_price_history`](Self::get_price_history) with an explicit "now".
    pub async fn get_price_history_at(
        &self,
        config: &TradingStrategyConfig,
        now_ms: i64,
    ) -> Result<PriceHistorySnapshot, ProviderError> {
        let tokens = Self::unique_tokens(config);
        let (time_from, time_to) = config.time_interval.lookback_window(now_ms, LOOKBACK_BARS);
        info!(
            "Fetching {} price series ({} bars of {}, {} -> {})",
            tokens.len(),
            LOOKBACK_BARS,
            config.time_interval,
            time_from,
            time_to
        );

        let series = try_join_all(tokens.iter().map(|token| {
            self.price_service.fetch_price_history(
                &token.address,
                AddressType::Token,
                config.time_interval,
                time_from,
                time_to,
            )
        }))
        .await?;

        let metadata = join_all(tokens.iter().map(|token| self.fetch_metadata(token))).await;

        Ok(tokens
            .into_iter()
            .zip(series)
            .zip(metadata)
            .map(|((token, prices), market)| {
                if prices.is_empty() {
                    debug!("No price data for {} in window", token.symbol);
                }
                TokenPriceHistory {
                    token,
                    prices,
                    market,
                }
            })
            .collect())
    }

    async fn fetch_metadata(&self, token: &Token) -> Option<MarketMetadata> {
        match self.price_service.fetch_market_metadata(&token.address).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Market metadata unavailable for {}: {}", token.symbol, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::price_history::PricePoint;
    use crate::domain::entities::strategy::{RsiConfig, StrategyType};
    use crate::domain::entities::token::TokenPair;
    use crate::domain::value_objects::interval::TimeInterval;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPriceService {
        requests: Mutex<Vec<(String, i64, i64)>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl PriceService for RecordingPriceService {
        async fn fetch_price_history(
            &self,
            address: &str,
            _address_type: AddressType,
            _interval: TimeInterval,
            time_from: i64,
            time_to: i64,
        ) -> Result<Vec<PricePoint>, ProviderError> {
            self.requests
                .lock()
                .unwrap()
                .push((address.to_string(), time_from, time_to));
            if self.fail_for.as_deref() == Some(address) {
                return Err(ProviderError::request("birdeye", "connection reset"));
            }
            if address == "empty" {
                return Ok(vec![]);
            }
            Ok(vec![PricePoint {
                unix_time: time_to,
                value: 1.0,
            }])
        }

        async fn fetch_market_metadata(&self, address: &str) -> Result<MarketMetadata, ProviderError> {
            if address == "usdc" {
                return Err(ProviderError::request("birdeye", "rate limited"));
            }
            Ok(MarketMetadata {
                liquidity_usd: Some(1_000_000.0),
                ..MarketMetadata::default()
            })
        }
    }

    fn config(pairs: Vec<(&str, &str)>) -> TradingStrategyConfig {
        TradingStrategyConfig {
            title: "test".to_string(),
            strategy_type: StrategyType::Rsi,
            token_pairs: pairs
                .into_iter()
                .map(|(from, to)| {
                    TokenPair::new(
                        Token::new(from, from.to_uppercase(), 6),
                        Token::new(to, to.to_uppercase(), 6),
                    )
                })
                .collect(),
            time_interval: TimeInterval::H1,
            max_portfolio_allocation: 10.0,
            rsi_config: RsiConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_shared_tokens_fetched_once() {
        let service = Arc::new(RecordingPriceService::default());
        let provider = PriceHistoryProvider::new(service.clone());

        let snapshot = provider
            .get_price_history(&config(vec![("usdc", "sol"), ("usdc", "jup")]))
            .await
            .unwrap();

        assert_eq!(service.requests.lock().unwrap().len(), 3);
        assert_eq!(snapshot.len(), 3);
    }

    #[tokio::test]
    async fn test_window_is_100_bars_ending_now() {
        let service = Arc::new(RecordingPriceService::default());
        let provider = PriceHistoryProvider::new(service.clone());
        let now_ms = 1_700_000_000_000;

        provider
            .get_price_history_at(&config(vec![("usdc", "sol")]), now_ms)
            .await
            .unwrap();

        for (_, from, to) in service.requests.lock().unwrap().iter() {
            assert_eq!(*to, 1_700_000_000);
            assert_eq!(to - from, 100 * 3600);
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let service = Arc::new(RecordingPriceService {
            fail_for: Some("sol".to_string()),
            ..Default::default()
        });
        let provider = PriceHistoryProvider::new(service);

        let result = provider.get_price_history(&config(vec![("usdc", "sol")])).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_series_kept_and_metadata_failure_tolerated() {
        let provider = PriceHistoryProvider::new(Arc::new(RecordingPriceService::default()));

        let snapshot = provider
            .get_price_history(&config(vec![("usdc", "empty")]))
            .await
            .unwrap();

        let empty = snapshot.get("empty").unwrap();
        assert!(empty.prices.is_empty());
        assert!(empty.market.is_some());
        assert!(snapshot.get("usdc").unwrap().market.is_none());
    }
}
