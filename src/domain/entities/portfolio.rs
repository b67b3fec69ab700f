use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::domain::entities::position::Position;
use crate::domain::entities::token::TokenPair;

/// One token balance held by the wallet, as reported by the wallet service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPortfolioItem {
    pub address: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: u8,
    /// Raw on-chain amount. Providers send either a JSON number or a string.
    #[serde(default, deserialize_with = "string_or_number")]
    pub balance: String,
    #[serde(default)]
    pub ui_amount: f64,
    #[serde(default)]
    pub price_usd: Option<f64>,
    #[serde(default)]
    pub value_usd: Option<f64>,
    #[serde(default, rename = "logoURI")]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub chain_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPortfolio {
    #[serde(default)]
    pub items: Vec<WalletPortfolioItem>,
    #[serde(default)]
    pub total_usd: Option<f64>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// `(base token address, quote token address)`; at most one open position per key.
pub type PositionKey = (String, String);

/// Per-cycle snapshot of wallet holdings and open positions.
#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    pub open_positions: Vec<Position>,
    pub wallet_items: Vec<WalletPortfolioItem>,
    pub total_value: f64,
    position_index: HashMap<PositionKey, usize>,
}

impl Portfolio {
    pub fn new(open_positions: Vec<Position>, wallet: WalletPortfolio) -> Self {
        let total_value = wallet.items.iter().filter_map(|item| item.value_usd).sum();

        let mut position_index = HashMap::with_capacity(open_positions.len());
        for (idx, position) in open_positions.iter().enumerate() {
            if !position.is_open() {
                warn!("Ignoring position {} listed as open but {}", position.id, position.status.as_str());
                continue;
            }
            let key = (
                position.base_token.address.clone(),
                position.quote_token.address.clone(),
            );
            if position_index.contains_key(&key) {
                warn!(
                    "Duplicate open position {} for {}/{}; keeping the first one",
                    position.id, position.base_token.symbol, position.quote_token.symbol
                );
                continue;
            }
            position_index.insert(key, idx);
        }

        Portfolio {
            open_positions,
            wallet_items: wallet.items,
            total_value,
            position_index,
        }
    }

    /// The open position holding `pair.to` priced in `pair.from`, if any.
    pub fn open_position_for(&self, pair: &TokenPair) -> Option<&Position> {
        let key = (pair.to.address.clone(), pair.from.address.clone());
        self.position_index
            .get(&key)
            .and_then(|idx| self.open_positions.get(*idx))
    }

    pub fn wallet_item(&self, address: &str) -> Option<&WalletPortfolioItem> {
        self.wallet_items.iter().find(|item| item.address == address)
    }

    /// Held UI amount of a token; 0 when the wallet does not hold it.
    pub fn ui_amount_of(&self, address: &str) -> f64 {
        self.wallet_item(address)
            .map(|item| item.ui_amount)
            .filter(|amount| amount.is_finite())
            .unwrap_or(0.0)
    }
}
