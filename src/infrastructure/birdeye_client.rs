//! Birdeye public API client
//!
//! Price history, token overview (liquidity / volume) and wallet token
//! balances for Solana, behind the domain's `PriceService` and
//! `WalletPortfolioService` traits.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use zeroize::Zeroizing;

use crate::domain::entities::portfolio::WalletPortfolio;
use crate::domain::entities::price_history::PricePoint;
use crate::domain::entities::token::MarketMetadata;
use crate::domain::errors::ProviderError;
use crate::domain::repositories::market_data::{
    AddressType, PriceService, ProviderResult, WalletPortfolioService,
};
use crate::domain::value_objects::interval::TimeInterval;
use crate::rate_limit::SharedRateLimiter;

const SERVICE: &str = "birdeye";

/// Birdeye production endpoint
pub const BIRDEYE_API_BASE: &str = "https://public-api.birdeye.so";

/// Birdeye connection settings
#[derive(Debug, Clone)]
pub struct BirdeyeConfig {
    pub api_base: String,
    pub api_key: Zeroizing<String>,
    pub chain: String,
    pub request_timeout: Duration,
}

impl Default for BirdeyeConfig {
    fn default() -> Self {
        Self {
            api_base: BIRDEYE_API_BASE.to_string(),
            api_key: Zeroizing::new(String::new()),
            chain: "solana".to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Every Birdeye response is wrapped in `{ success, data, message }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryPriceData {
    #[serde(default)]
    items: Vec<PricePoint>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenOverview {
    #[serde(default)]
    liquidity: Option<f64>,
    #[serde(default, rename = "v24hUSD")]
    volume_24h_usd: Option<f64>,
}

impl From<TokenOverview> for MarketMetadata {
    fn from(overview: TokenOverview) -> Self {
        MarketMetadata {
            liquidity_usd: overview.liquidity,
            volume_24h_usd: overview.volume_24h_usd,
            trust_score: None,
            expected_slippage_percent: None,
        }
    }
}

fn parse_envelope<T: DeserializeOwned>(body: &str) -> ProviderResult<T> {
    let envelope: Envelope<T> =
        serde_json::from_str(body).map_err(|e| ProviderError::invalid_response(SERVICE, e))?;

    if !envelope.success {
        return Err(ProviderError::Rejected {
            service: SERVICE.to_string(),
            reason: envelope
                .message
                .unwrap_or_else(|| "request was not successful".to_string()),
        });
    }

    envelope
        .data
        .ok_or_else(|| ProviderError::invalid_response(SERVICE, "missing data field"))
}

/// Birdeye REST client
pub struct BirdeyeClient {
    client: Client,
    config: BirdeyeConfig,
    base: Url,
    limiter: SharedRateLimiter,
}

impl BirdeyeClient {
    pub fn new(config: BirdeyeConfig, limiter: SharedRateLimiter) -> ProviderResult<Self> {
        if config.api_key.is_empty() {
            return Err(ProviderError::InvalidConfiguration(
                "Birdeye API key is empty".to_string(),
            ));
        }
        let base = Url::parse(&config.api_base).map_err(|e| {
            ProviderError::InvalidConfiguration(format!("Invalid Birdeye URL {}: {}", config.api_base, e))
        })?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("trading-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            client,
            config,
            base,
            limiter,
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> ProviderResult<Url> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| ProviderError::InvalidConfiguration(format!("Invalid path {}: {}", path, e)))?;
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> ProviderResult<T> {
        self.limiter.until_ready().await;
        debug!("GET {}", url.path());

        let response = self
            .client
            .get(url.clone())
            .header("X-API-KEY", self.config.api_key.as_str())
            .header("x-chain", &self.config.chain)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::request(SERVICE, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::request(SERVICE, e))?;

        if !status.is_success() {
            warn!("Birdeye {} returned {}", url.path(), status);
            return Err(ProviderError::UnexpectedStatus {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        parse_envelope(&body)
    }
}

#[async_trait]
impl PriceService for BirdeyeClient {
    async fn fetch_price_history(
        &self,
        address: &str,
        address_type: AddressType,
        interval: TimeInterval,
        time_from: i64,
        time_to: i64,
    ) -> ProviderResult<Vec<PricePoint>> {
        let url = self.endpoint(
            "/defi/history_price",
            &[
                ("address", address.to_string()),
                ("address_type", address_type.as_str().to_string()),
                ("type", interval.as_str().to_string()),
                ("time_from", time_from.to_string()),
                ("time_to", time_to.to_string()),
            ],
        )?;

        let data: HistoryPriceData = self.get(url).await?;
        debug!("{} price points for {} ({})", data.items.len(), address, interval.as_str());
        Ok(data.items)
    }

    async fn fetch_market_metadata(&self, address: &str) -> ProviderResult<MarketMetadata> {
        let url = self.endpoint("/defi/token_overview", &[("address", address.to_string())])?;
        let overview: TokenOverview = self.get(url).await?;
        Ok(overview.into())
    }
}

#[async_trait]
impl WalletPortfolioService for BirdeyeClient {
    async fn get_wallet_portfolio(&self, public_key: &str) -> ProviderResult<WalletPortfolio> {
        let url = self.endpoint("/v1/wallet/token_list", &[("wallet", public_key.to_string())])?;
        let portfolio: WalletPortfolio = self.get(url).await?;
        debug!("Wallet {} holds {} tokens", public_key, portfolio.items.len());
        Ok(portfolio)
    }
}
