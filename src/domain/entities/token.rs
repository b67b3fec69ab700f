use serde::{Deserialize, Serialize};

/// Mint address of wrapped SOL, the unit trade sizes are checked against.
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default, rename = "logoURI", skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl Token {
    pub fn new(address: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Token {
            address: address.into(),
            symbol: symbol.into(),
            decimals,
            logo_uri: None,
            network: None,
        }
    }

    pub fn is_wrapped_sol(&self) -> bool {
        self.address == WRAPPED_SOL_MINT
    }
}

/// Directional pair: `from` is spent to acquire `to` when opening, and the
/// reverse when closing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPair {
    pub from: Token,
    pub to: Token,
}

impl TokenPair {
    pub fn new(from: Token, to: Token) -> Self {
        TokenPair { from, to }
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.to.symbol, self.from.symbol)
    }
}

/// Live market data used only to gate trades. Every field is optional; a
/// missing value is treated as zero (or "not provided" for the trust score)
/// by the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketMetadata {
    pub liquidity_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
    pub trust_score: Option<f64>,
    pub expected_slippage_percent: Option<f64>,
}

/// A token annotated with a price snapshot at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenWithPrice {
    pub token: Token,
    pub price_usd: Option<f64>,
    pub market: Option<MarketMetadata>,
}

impl TokenWithPrice {
    pub fn liquidity_usd(&self) -> f64 {
        self.market
            .as_ref()
            .and_then(|m| m.liquidity_usd)
            .unwrap_or(0.0)
    }

    pub fn volume_24h_usd(&self) -> f64 {
        self.market
            .as_ref()
            .and_then(|m| m.volume_24h_usd)
            .unwrap_or(0.0)
    }

    pub fn trust_score(&self) -> Option<f64> {
        self.market.as_ref().and_then(|m| m.trust_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_deserializes_wire_shape() {
        let json = r#"{"address":"JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN","symbol":"JUP","decimals":6,"logoURI":"https://img/jup.png"}"#;
        let token: Token = serde_json::from_str(json).unwrap();
        assert_eq!(token.symbol, "JUP");
        assert_eq!(token.decimals, 6);
        assert_eq!(token.logo_uri.as_deref(), Some("https://img/jup.png"));
        assert!(token.network.is_none());
    }

    #[test]
    fn test_missing_market_metadata_reads_as_zero() {
        let token = TokenWithPrice {
            token: Token::new(WRAPPED_SOL_MINT, "SOL", 9),
            price_usd: Some(150.0),
            market: None,
        };
        assert!(token.token.is_wrapped_sol());
        assert_eq!(token.liquidity_usd(), 0.0);
        assert_eq!(token.volume_24h_usd(), 0.0);
        assert!(token.trust_score().is_none());
    }

    #[test]
    fn test_pair_label() {
        let pair = TokenPair::new(Token::new("usdc", "USDC", 6), Token::new("sol", "SOL", 9));
        assert_eq!(pair.label(), "SOL/USDC");
    }
}
