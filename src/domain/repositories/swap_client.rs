use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::errors::ProviderError;
use crate::domain::repositories::secret_service::WalletKeys;

/// Balance of one token account before and after a transaction, in raw units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalanceChange {
    pub mint: String,
    pub owner: Option<String>,
    pub decimals: u8,
    pub pre_amount: u64,
    pub post_amount: u64,
}

impl TokenBalanceChange {
    pub fn delta(&self) -> i128 {
        i128::from(self.post_amount) - i128::from(self.pre_amount)
    }
}

/// Confirmed on-chain transaction, reduced to what swap accounting needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionConfirmation {
    pub signature: String,
    pub slot: Option<u64>,
    pub block_time: Option<i64>,
    pub fee_lamports: u64,
    /// Set when the transaction landed but failed on chain.
    pub error: Option<String>,
    /// Lamport change of the signing wallet, fee included.
    pub native_balance_change: i64,
    pub token_balances: Vec<TokenBalanceChange>,
}

/// On-chain swap capability. Signing and routing are the implementation's concern.
#[async_trait]
pub trait SwapClient: Send + Sync {
    /// Submits a swap of `amount` (UI units) of `from_mint` into `to_mint`
    /// and returns the transaction hash.
    async fn trade(&self, from_mint: &str, amount: f64, to_mint: &str) -> Result<String, ProviderError>;

    /// `None` while the transaction is not yet visible on chain.
    async fn get_transaction(
        &self,
        hash: &str,
    ) -> Result<Option<TransactionConfirmation>, ProviderError>;
}

/// Builds a swap client that signs with the given wallet.
pub trait SwapClientFactory: Send + Sync {
    fn for_wallet(&self, wallet: &WalletKeys) -> Result<Arc<dyn SwapClient>, ProviderError>;
}
