//! Live swap execution
//!
//! Swaps are routed, signed and submitted by a swap gateway running on a
//! trusted host; this client only posts the request and returns the
//! signature. Confirmations are read straight from a Solana RPC node with
//! `getTransaction` (jsonParsed) and reduced to the balance changes of the
//! trading wallet.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use zeroize::Zeroizing;

use crate::domain::errors::ProviderError;
use crate::domain::repositories::secret_service::WalletKeys;
use crate::domain::repositories::swap_client::{
    SwapClient, SwapClientFactory, TokenBalanceChange, TransactionConfirmation,
};
use crate::rate_limit::SharedRateLimiter;

const GATEWAY: &str = "swap-gateway";
const RPC: &str = "solana-rpc";

/// Swap gateway and RPC settings
#[derive(Debug, Clone)]
pub struct SwapGatewayConfig {
    pub gateway_url: String,
    pub rpc_url: String,
    pub slippage_bps: u16,
    pub request_timeout: Duration,
}

impl Default for SwapGatewayConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:8787".to_string(),
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            slippage_bps: 100,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapRequest<'a> {
    input_mint: &'a str,
    output_mint: &'a str,
    amount: f64,
    slippage_bps: u16,
    user_public_key: &'a str,
    private_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    slot: Option<u64>,
    block_time: Option<i64>,
    meta: Option<RpcMeta>,
    transaction: RpcTransactionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMeta {
    err: Option<serde_json::Value>,
    #[serde(default)]
    fee: u64,
    #[serde(default)]
    pre_balances: Vec<u64>,
    #[serde(default)]
    post_balances: Vec<u64>,
    #[serde(default)]
    pre_token_balances: Vec<RpcTokenBalance>,
    #[serde(default)]
    post_token_balances: Vec<RpcTokenBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTokenBalance {
    account_index: usize,
    mint: String,
    #[serde(default)]
    owner: Option<String>,
    ui_token_amount: RpcTokenAmount,
}

#[derive(Debug, Deserialize)]
struct RpcTokenAmount {
    amount: String,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
struct RpcTransactionBody {
    message: RpcMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMessage {
    account_keys: Vec<RpcAccountKey>,
}

/// jsonParsed returns objects; other encodings return bare strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcAccountKey {
    Parsed { pubkey: String },
    Plain(String),
}

impl RpcAccountKey {
    fn pubkey(&self) -> &str {
        match self {
            RpcAccountKey::Parsed { pubkey } => pubkey,
            RpcAccountKey::Plain(pubkey) => pubkey,
        }
    }
}

fn raw_amount(balance: &RpcTokenBalance) -> Result<u64, ProviderError> {
    balance.ui_token_amount.amount.parse().map_err(|e| {
        ProviderError::invalid_response(
            RPC,
            format!("token amount '{}': {}", balance.ui_token_amount.amount, e),
        )
    })
}

/// Reduces an RPC transaction to what swap accounting needs, from the
/// point of view of `wallet`.
fn to_confirmation(
    signature: &str,
    tx: RpcTransaction,
    wallet: &str,
) -> Result<TransactionConfirmation, ProviderError> {
    let meta = tx
        .meta
        .ok_or_else(|| ProviderError::invalid_response(RPC, format!("transaction {} has no meta", signature)))?;

    let native_balance_change = tx
        .transaction
        .message
        .account_keys
        .iter()
        .position(|key| key.pubkey() == wallet)
        .and_then(|idx| Some((*meta.pre_balances.get(idx)?, *meta.post_balances.get(idx)?)))
        .map(|(pre, post)| post as i64 - pre as i64)
        .unwrap_or(0);

    // Token accounts are matched by index; accounts created by the swap have no pre balance.
    let mut changes: HashMap<usize, TokenBalanceChange> = HashMap::new();
    for balance in &meta.pre_token_balances {
        changes.insert(
            balance.account_index,
            TokenBalanceChange {
                mint: balance.mint.clone(),
                owner: balance.owner.clone(),
                decimals: balance.ui_token_amount.decimals,
                pre_amount: raw_amount(balance)?,
                post_amount: 0,
            },
        );
    }
    for balance in &meta.post_token_balances {
        let post = raw_amount(balance)?;
        changes
            .entry(balance.account_index)
            .and_modify(|change| change.post_amount = post)
            .or_insert_with(|| TokenBalanceChange {
                mint: balance.mint.clone(),
                owner: balance.owner.clone(),
                decimals: balance.ui_token_amount.decimals,
                pre_amount: 0,
                post_amount: post,
            });
    }
    let mut indexed: Vec<(usize, TokenBalanceChange)> = changes.into_iter().collect();
    indexed.sort_by_key(|(idx, _)| *idx);

    Ok(TransactionConfirmation {
        signature: signature.to_string(),
        slot: tx.slot,
        block_time: tx.block_time,
        fee_lamports: meta.fee,
        error: meta.err.map(|err| err.to_string()),
        native_balance_change,
        token_balances: indexed.into_iter().map(|(_, change)| change).collect(),
    })
}

fn parse_json<T: DeserializeOwned>(service: &str, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::invalid_response(service, e))
}

/// Swap client bound to one wallet
pub struct SwapGatewayClient {
    client: Client,
    config: SwapGatewayConfig,
    swap_url: Url,
    rpc_url: Url,
    public_key: String,
    private_key: Zeroizing<String>,
    limiter: SharedRateLimiter,
}

impl SwapGatewayClient {
    pub fn new(
        config: SwapGatewayConfig,
        wallet: &WalletKeys,
        limiter: SharedRateLimiter,
    ) -> Result<Self, ProviderError> {
        let gateway = Url::parse(&config.gateway_url).map_err(|e| {
            ProviderError::InvalidConfiguration(format!("Invalid swap gateway URL {}: {}", config.gateway_url, e))
        })?;
        let swap_url = gateway
            .join("/swap")
            .map_err(|e| ProviderError::InvalidConfiguration(e.to_string()))?;
        let rpc_url = Url::parse(&config.rpc_url).map_err(|e| {
            ProviderError::InvalidConfiguration(format!("Invalid RPC URL {}: {}", config.rpc_url, e))
        })?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            client,
            config,
            swap_url,
            rpc_url,
            public_key: wallet.public_key.clone(),
            private_key: wallet.private_key.clone(),
            limiter,
        })
    }

    async fn post(&self, service: &str, url: Url, body: &impl Serialize) -> Result<String, ProviderError> {
        self.limiter.until_ready().await;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::request(service, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::request(service, e))?;

        if !status.is_success() {
            return Err(ProviderError::UnexpectedStatus {
                service: service.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl SwapClient for SwapGatewayClient {
    async fn trade(&self, from_mint: &str, amount: f64, to_mint: &str) -> Result<String, ProviderError> {
        info!("Submitting swap: {} {} -> {}", amount, from_mint, to_mint);

        let request = SwapRequest {
            input_mint: from_mint,
            output_mint: to_mint,
            amount,
            slippage_bps: self.config.slippage_bps,
            user_public_key: &self.public_key,
            private_key: self.private_key.as_str(),
        };
        let body = self.post(GATEWAY, self.swap_url.clone(), &request).await?;
        let response: SwapResponse = parse_json(GATEWAY, &body)?;

        match (response.signature, response.error) {
            (Some(signature), _) if !signature.is_empty() => {
                debug!("Swap submitted: {}", signature);
                Ok(signature)
            }
            (_, Some(error)) => {
                warn!("Swap gateway refused swap: {}", error);
                Err(ProviderError::Rejected {
                    service: GATEWAY.to_string(),
                    reason: error,
                })
            }
            _ => Err(ProviderError::invalid_response(GATEWAY, "response carries no signature")),
        }
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<TransactionConfirmation>, ProviderError> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getTransaction",
            "params": [
                hash,
                {
                    "encoding": "jsonParsed",
                    "commitment": "confirmed",
                    "maxSupportedTransactionVersion": 0
                }
            ]
        });
        let body = self.post(RPC, self.rpc_url.clone(), &request).await?;
        let response: RpcResponse<RpcTransaction> = parse_json(RPC, &body)?;

        if let Some(error) = response.error {
            return Err(ProviderError::Rejected {
                service: RPC.to_string(),
                reason: format!("{} ({})", error.message, error.code),
            });
        }

        match response.result {
            Some(tx) => to_confirmation(hash, tx, &self.public_key).map(Some),
            None => {
                debug!("Transaction {} not visible yet", hash);
                Ok(None)
            }
        }
    }
}

/// Builds a `SwapGatewayClient` per wallet, sharing one rate limiter
pub struct SwapGatewayFactory {
    config: SwapGatewayConfig,
    limiter: SharedRateLimiter,
}

impl SwapGatewayFactory {
    pub fn new(config: SwapGatewayConfig, limiter: SharedRateLimiter) -> Self {
        Self { config, limiter }
    }
}

impl SwapClientFactory for SwapGatewayFactory {
    fn for_wallet(&self, wallet: &WalletKeys) -> Result<Arc<dyn SwapClient>, ProviderError> {
        let client = SwapGatewayClient::new(self.config.clone(), wallet, self.limiter.clone())?;
        Ok(Arc::new(client))
    }
}
