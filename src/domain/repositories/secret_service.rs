use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::secrets::SecretError;

/// Key pair of the wallet an agent trades with.
#[derive(Clone)]
pub struct WalletKeys {
    pub public_key: String,
    pub private_key: Zeroizing<String>,
}

impl std::fmt::Debug for WalletKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletKeys")
            .field("public_key", &self.public_key)
            .field("private_key", &"***")
            .finish()
    }
}

#[async_trait]
pub trait SecretService: Send + Sync {
    async fn decrypt(&self, ciphertext: &str) -> Result<Zeroizing<String>, SecretError>;

    async fn agent_wallet_details(&self, agent_id: &str, cycle: u64) -> Result<WalletKeys, SecretError>;
}
