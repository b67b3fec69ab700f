//! Secure secret management module
//!
//! Wallet private keys and API keys are loaded from the 1Password CLI, with
//! an environment variable fallback for development. Secrets are held in
//! `Zeroizing<String>` so they are wiped from memory when dropped.

use async_trait::async_trait;
use std::env;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::domain::repositories::secret_service::{SecretService, WalletKeys};

/// Error type for secret loading operations
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("1Password CLI error: {0}")]
    OnePasswordError(String),

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Secret validation failed: {0}")]
    ValidationFailed(String),

    #[error("Secret loading task failed: {0}")]
    TaskFailed(String),
}

/// Configuration for secret loading
#[derive(Debug, Clone)]
pub struct SecretConfig {
    /// Whether to allow loading secrets from environment variables
    /// Should be false in production
    pub allow_env_vars: bool,

    /// Whether to require 1Password CLI
    pub require_op_cli: bool,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            allow_env_vars: cfg!(debug_assertions),
            require_op_cli: false,
        }
    }
}

impl SecretConfig {
    /// `ALLOW_ENV_SECRETS` and `REQUIRE_OP_CLI` override the build defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = env::var("ALLOW_ENV_SECRETS") {
            config.allow_env_vars = value.to_lowercase() == "true" || value == "1";
        }
        if let Ok(value) = env::var("REQUIRE_OP_CLI") {
            config.require_op_cli = value.to_lowercase() == "true" || value == "1";
        }
        config
    }
}

/// Load a secret from 1Password CLI or environment variable (with fallback)
///
/// # Arguments
/// - `op_reference`: 1Password reference (e.g., "op://vault/item/field")
/// - `env_var_name`: Environment variable name as fallback
/// - `config`: Configuration for secret loading behavior
pub fn load_secret(
    op_reference: &str,
    env_var_name: &str,
    config: &SecretConfig,
) -> Result<Zeroizing<String>, SecretError> {
    match load_from_op_cli(op_reference) {
        Ok(secret) => {
            info!("✓ Loaded secret from 1Password CLI: {}", env_var_name);
            return Ok(secret);
        }
        Err(e) => {
            if config.require_op_cli {
                error!("1Password CLI required but failed: {}", e);
                return Err(e);
            }
            warn!("1Password CLI not available: {}", e);
        }
    }

    if config.allow_env_vars {
        warn!(
            "⚠️  Loading secret from environment variable: {} (INSECURE for production)",
            env_var_name
        );
        load_from_env(env_var_name)
    } else {
        error!(
            "Secret loading failed: 1Password CLI unavailable and env vars disabled for {}",
            env_var_name
        );
        Err(SecretError::NotFound(env_var_name.to_string()))
    }
}

/// Load a secret from 1Password CLI
fn load_from_op_cli(reference: &str) -> Result<Zeroizing<String>, SecretError> {
    use std::process::Command;

    let output = Command::new("op")
        .arg("read")
        .arg(reference)
        .output()
        .map_err(|e| {
            SecretError::OnePasswordError(format!(
                "Failed to execute 'op' command: {}. Install 1Password CLI from https://developer.1password.com/docs/cli",
                e
            ))
        })?;

    if !output.status.success() {
        let error_msg = String::from_utf8_lossy(&output.stderr);
        return Err(SecretError::OnePasswordError(format!(
            "1Password CLI failed: {}",
            error_msg
        )));
    }

    let secret = String::from_utf8(output.stdout)
        .map_err(|e| SecretError::OnePasswordError(format!("Invalid UTF-8 from 1Password: {}", e)))?
        .trim()
        .to_string();

    if secret.is_empty() {
        return Err(SecretError::OnePasswordError(
            "1Password returned empty secret".to_string(),
        ));
    }

    Ok(Zeroizing::new(secret))
}

/// Load a secret from environment variable (wrapped in Zeroizing)
fn load_from_env(env_var_name: &str) -> Result<Zeroizing<String>, SecretError> {
    env::var(env_var_name)
        .map(Zeroizing::new)
        .map_err(|_| SecretError::EnvVarNotSet(env_var_name.to_string()))
}

/// Validate that a secret meets minimum security requirements
pub fn validate_secret_strength(secret: &str, min_length: usize) -> Result<(), SecretError> {
    if secret.len() < min_length {
        return Err(SecretError::ValidationFailed(format!(
            "Secret too short: {} characters (minimum: {})",
            secret.len(),
            min_length
        )));
    }

    let weak_patterns = ["test", "demo", "example", "placeholder", "changeme", "12345"];
    let secret_lower = secret.to_lowercase();

    for pattern in &weak_patterns {
        if secret_lower.contains(pattern) {
            return Err(SecretError::ValidationFailed(format!(
                "Secret contains weak pattern: {}",
                pattern
            )));
        }
    }

    Ok(())
}

/// Load an API key with validation
pub fn load_api_key(
    op_reference: &str,
    env_var_name: &str,
    config: &SecretConfig,
) -> Result<Zeroizing<String>, SecretError> {
    let secret = load_secret(op_reference, env_var_name, config)?;
    validate_secret_strength(&secret, 16)?;
    Ok(secret)
}

/// Base58 alphabet used by Solana keys.
fn is_base58(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() && !matches!(c, '0' | 'O' | 'I' | 'l'))
}

/// Load a wallet private key (base58 encoded 64-byte keypair)
pub fn load_wallet_key(
    op_reference: &str,
    env_var_name: &str,
    config: &SecretConfig,
) -> Result<Zeroizing<String>, SecretError> {
    let secret = load_secret(op_reference, env_var_name, config)?;
    if !(64..=90).contains(&secret.len()) || !is_base58(&secret) {
        return Err(SecretError::ValidationFailed(format!(
            "{} is not a base58 keypair ({} characters)",
            env_var_name,
            secret.len()
        )));
    }
    Ok(secret)
}

/// Where the agent's wallet key comes from.
#[derive(Debug, Clone)]
pub struct WalletSecretConfig {
    pub public_key: String,
    pub private_key_op_reference: String,
    pub private_key_env_var: String,
}

/// `SecretService` backed by 1Password / environment variables.
///
/// Keys are stored by the secret manager rather than encrypted in the
/// database, so `decrypt` only checks that the material is present.
pub struct EnvSecretService {
    wallet: WalletSecretConfig,
    config: SecretConfig,
}

impl EnvSecretService {
    pub fn new(wallet: WalletSecretConfig, config: SecretConfig) -> Self {
        Self { wallet, config }
    }
}

#[async_trait]
impl SecretService for EnvSecretService {
    async fn decrypt(&self, ciphertext: &str) -> Result<Zeroizing<String>, SecretError> {
        let plaintext = ciphertext.trim();
        if plaintext.is_empty() {
            return Err(SecretError::ValidationFailed(
                "empty wallet key material".to_string(),
            ));
        }
        Ok(Zeroizing::new(plaintext.to_string()))
    }

    async fn agent_wallet_details(&self, agent_id: &str, cycle: u64) -> Result<WalletKeys, SecretError> {
        if self.wallet.public_key.is_empty() {
            return Err(SecretError::NotFound(format!(
                "wallet public key for agent {}",
                agent_id
            )));
        }
        debug!("Loading wallet key for agent {} (cycle {})", agent_id, cycle);

        let op_reference = self.wallet.private_key_op_reference.clone();
        let env_var = self.wallet.private_key_env_var.clone();
        let config = self.config.clone();
        // `op read` is a blocking subprocess call.
        let stored = tokio::task::spawn_blocking(move || load_wallet_key(&op_reference, &env_var, &config))
            .await
            .map_err(|e| SecretError::TaskFailed(e.to_string()))??;

        Ok(WalletKeys {
            public_key: self.wallet.public_key.clone(),
            private_key: self.decrypt(&stored).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYPAIR: &str =
        "4wBqpZM9xaSheZzJSMawUHDgZ7miWfSsxmfVF5jJpYP8iMDXKvWcvBZv3uw8dFAKhmpZpA4QeV8pMt3qTAkhF2rP";

    #[test]
    fn test_validate_secret_strength() {
        assert!(validate_secret_strength("short", 32).is_err());
        assert!(validate_secret_strength("test_api_key_1234567890123456789", 32).is_err());
        let strong_key = "a".repeat(32);
        assert!(validate_secret_strength(&strong_key, 32).is_ok());
    }

    #[test]
    fn test_load_from_env() {
        env::set_var("AGENT_TEST_SECRET_KEY", "value_abcdefghijklmnopqrstuvwxyz");
        let result = load_from_env("AGENT_TEST_SECRET_KEY");
        assert_eq!(*result.unwrap(), "value_abcdefghijklmnopqrstuvwxyz");
        env::remove_var("AGENT_TEST_SECRET_KEY");
    }

    #[test]
    fn test_load_from_env_missing() {
        assert!(load_from_env("AGENT_NONEXISTENT_VAR").is_err());
    }

    #[test]
    fn test_wallet_key_validation() {
        let config = SecretConfig {
            allow_env_vars: true,
            require_op_cli: false,
        };
        env::set_var("AGENT_TEST_WALLET_KEY", KEYPAIR);
        assert!(load_wallet_key("op://agent/wallet", "AGENT_TEST_WALLET_KEY", &config).is_ok());

        env::set_var("AGENT_TEST_WALLET_KEY", "0OIl-not-base58");
        assert!(load_wallet_key("op://agent/wallet", "AGENT_TEST_WALLET_KEY", &config).is_err());
        env::remove_var("AGENT_TEST_WALLET_KEY");
    }

    #[tokio::test]
    async fn test_env_secret_service_returns_wallet_keys() {
        env::set_var("AGENT_TEST_SERVICE_KEY", KEYPAIR);
        let service = EnvSecretService::new(
            WalletSecretConfig {
                public_key: "AgentWa11etPubkey".to_string(),
                private_key_op_reference: "op://agent/wallet/private_key".to_string(),
                private_key_env_var: "AGENT_TEST_SERVICE_KEY".to_string(),
            },
            SecretConfig {
                allow_env_vars: true,
                require_op_cli: false,
            },
        );

        let keys = service.agent_wallet_details("agent_1", 1).await.unwrap();
        assert_eq!(keys.public_key, "AgentWa11etPubkey");
        assert_eq!(keys.private_key.as_str(), KEYPAIR);
        assert!(!format!("{:?}", keys).contains(KEYPAIR));
        env::remove_var("AGENT_TEST_SERVICE_KEY");
    }

    #[tokio::test]
    async fn test_missing_public_key_is_an_error() {
        let service = EnvSecretService::new(
            WalletSecretConfig {
                public_key: String::new(),
                private_key_op_reference: "op://agent/wallet/private_key".to_string(),
                private_key_env_var: "AGENT_TEST_UNSET_KEY".to_string(),
            },
            SecretConfig::default(),
        );
        assert!(matches!(
            service.agent_wallet_details("agent_1", 1).await,
            Err(SecretError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_decrypt_rejects_empty_material() {
        let service = EnvSecretService::new(
            WalletSecretConfig {
                public_key: "pk".to_string(),
                private_key_op_reference: String::new(),
                private_key_env_var: String::new(),
            },
            SecretConfig::default(),
        );
        assert!(service.decrypt("  ").await.is_err());
        assert_eq!(service.decrypt("abc").await.unwrap().as_str(), "abc");
    }
}
