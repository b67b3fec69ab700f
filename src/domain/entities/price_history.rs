use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::entities::token::{MarketMetadata, Token, TokenWithPrice};

/// One bar of a price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub unix_time: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenPriceHistory {
    pub token: Token,
    pub prices: Vec<PricePoint>,
    pub market: Option<MarketMetadata>,
}

impl TokenPriceHistory {
    pub fn closes(&self) -> Vec<f64> {
        self.prices.iter().map(|p| p.value).collect()
    }

    pub fn latest_price(&self) -> Option<f64> {
        self.prices
            .last()
            .map(|p| p.value)
            .filter(|v| v.is_finite())
    }
}

/// Price series for every unique token of a strategy, keyed by token address.
#[derive(Debug, Clone, Default)]
pub struct PriceHistorySnapshot {
    series: HashMap<String, TokenPriceHistory>,
}

impl PriceHistorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, history: TokenPriceHistory) {
        self.series.insert(history.token.address.clone(), history);
    }

    pub fn get(&self, address: &str) -> Option<&TokenPriceHistory> {
        self.series.get(address)
    }

    pub fn latest_price(&self, address: &str) -> Option<f64> {
        self.get(address).and_then(|h| h.latest_price())
    }

    /// Annotates a token with its latest price and market metadata.
    pub fn token_with_price(&self, token: &Token) -> TokenWithPrice {
        let history = self.get(&token.address);
        TokenWithPrice {
            token: token.clone(),
            price_usd: history.and_then(|h| h.latest_price()),
            market: history.and_then(|h| h.market.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenPriceHistory> {
        self.series.values()
    }
}

impl FromIterator<TokenPriceHistory> for PriceHistorySnapshot {
    fn from_iter<I: IntoIterator<Item = TokenPriceHistory>>(iter: I) -> Self {
        let mut snapshot = PriceHistorySnapshot::new();
        for history in iter {
            snapshot.insert(history);
        }
        snapshot
    }
}
