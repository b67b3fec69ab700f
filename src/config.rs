use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::services::strategies::ForceOverrides;
use crate::domain::services::trade_validator::TradingLimits;
use crate::infrastructure::birdeye_client::BIRDEYE_API_BASE;
use crate::infrastructure::swap_gateway::SwapGatewayConfig;
use crate::persistence::DatabaseConfig;
use crate::rate_limit::RateLimiterConfig;
use crate::retry::RetryPolicy;
use crate::secrets::{SecretConfig, WalletSecretConfig};

/// Runtime configuration of the trading agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub agent_id: String,
    pub cycle_interval: Duration,
    pub trading_limits: TradingLimits,
    pub retry: RetryPolicy,
    pub database: DatabaseConfig,
    pub rate_limit: RateLimiterConfig,
    pub birdeye_api_base: String,
    pub birdeye_api_key_op_reference: String,
    pub birdeye_api_key_env_var: String,
    pub swap_gateway: SwapGatewayConfig,
    pub wallet: WalletSecretConfig,
    pub secrets: SecretConfig,
    pub force: ForceOverrides,
    /// JSON strategy assignment loaded into the database at startup
    pub strategy_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_id: "trading-agent".to_string(),
            cycle_interval: Duration::from_secs(300),
            trading_limits: TradingLimits::default(),
            retry: RetryPolicy::default(),
            database: DatabaseConfig::default(),
            rate_limit: RateLimiterConfig::default(),
            birdeye_api_base: BIRDEYE_API_BASE.to_string(),
            birdeye_api_key_op_reference: "op://trading-agent/birdeye/api_key".to_string(),
            birdeye_api_key_env_var: "BIRDEYE_API_KEY".to_string(),
            swap_gateway: SwapGatewayConfig::default(),
            wallet: WalletSecretConfig {
                public_key: String::new(),
                private_key_op_reference: "op://trading-agent/wallet/private_key".to_string(),
                private_key_env_var: "WALLET_PRIVATE_KEY".to_string(),
            },
            secrets: SecretConfig::default(),
            force: ForceOverrides::default(),
            strategy_file: None,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.to_lowercase() == "true" || value == "1"
}

/// Parses `key` when set; out-of-range or unparsable values are logged and
/// the current value is kept.
fn parse_in_range<T, F>(var: &F, key: &str, current: &mut T, valid: impl Fn(&T) -> bool, rule: &str)
where
    T: FromStr + Display,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => *current = value,
        Ok(value) => {
            tracing::warn!(
                "Invalid {} value: {} ({}), using default: {}",
                key,
                value,
                rule,
                current
            );
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse {} '{}': {}, using default: {}",
                key,
                raw,
                e,
                current
            );
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(agent_id) = var("AGENT_ID").filter(|v| !v.trim().is_empty()) {
            config.agent_id = agent_id.trim().to_string();
        }

        let mut cycle_secs = config.cycle_interval.as_secs();
        parse_in_range(
            &var,
            "CYCLE_INTERVAL_SECONDS",
            &mut cycle_secs,
            |v| (10..=86_400).contains(v),
            "must be between 10 and 86400",
        );
        config.cycle_interval = Duration::from_secs(cycle_secs);

        // Trade validation thresholds
        let limits = &mut config.trading_limits;
        parse_in_range(
            &var,
            "MIN_TRADE_AMOUNT_SOL",
            &mut limits.min_trade_amount_sol,
            |v| *v >= 0.0,
            "must be non-negative",
        );
        parse_in_range(
            &var,
            "MAX_POSITION_SIZE_PERCENT",
            &mut limits.max_position_size_percent,
            |v| *v > 0.0 && *v <= 100.0,
            "must be within (0, 100]",
        );
        parse_in_range(
            &var,
            "MAX_SLIPPAGE_PERCENT",
            &mut limits.max_slippage_percent,
            |v| *v > 0.0 && *v <= 100.0,
            "must be within (0, 100]",
        );
        parse_in_range(
            &var,
            "MIN_LIQUIDITY_USD",
            &mut limits.min_liquidity_usd,
            |v| *v >= 0.0,
            "must be non-negative",
        );
        parse_in_range(
            &var,
            "MIN_DAILY_VOLUME_USD",
            &mut limits.min_daily_volume_usd,
            |v| *v >= 0.0,
            "must be non-negative",
        );
        parse_in_range(
            &var,
            "MIN_TRUST_SCORE",
            &mut limits.min_trust_score,
            |v| (0.0..=1.0).contains(v),
            "must be between 0.0 and 1.0",
        );

        // Swap retry
        parse_in_range(
            &var,
            "SWAP_MAX_ATTEMPTS",
            &mut config.retry.max_attempts,
            |v| (1..=10).contains(v),
            "must be between 1 and 10",
        );
        let mut base_delay_ms = config.retry.base_delay.as_millis() as u64;
        parse_in_range(
            &var,
            "SWAP_RETRY_BASE_DELAY_MS",
            &mut base_delay_ms,
            |v| (100..=60_000).contains(v),
            "must be between 100 and 60000",
        );
        config.retry.base_delay = Duration::from_millis(base_delay_ms);
        let mut attempt_timeout_secs = config.retry.attempt_timeout.as_secs();
        parse_in_range(
            &var,
            "SWAP_ATTEMPT_TIMEOUT_SECONDS",
            &mut attempt_timeout_secs,
            |v| (5..=600).contains(v),
            "must be between 5 and 600",
        );
        config.retry.attempt_timeout = Duration::from_secs(attempt_timeout_secs);

        // Database
        if let Some(url) = var("DATABASE_URL") {
            config.database.url = url;
        }
        parse_in_range(
            &var,
            "DATABASE_MAX_CONNECTIONS",
            &mut config.database.max_connections,
            |v| (1..=64).contains(v),
            "must be between 1 and 64",
        );
        if let Some(log) = var("DATABASE_LOG_QUERIES") {
            config.database.log_queries = parse_flag(&log);
        }

        // Market data
        parse_in_range(
            &var,
            "BIRDEYE_REQUESTS_PER_MINUTE",
            &mut config.rate_limit.requests_per_minute,
            |v| *v > 0,
            "must be positive",
        );
        if let Some(url) = var("BIRDEYE_API_URL") {
            config.birdeye_api_base = url;
        }
        if let Some(reference) = var("BIRDEYE_API_KEY_OP_REF") {
            config.birdeye_api_key_op_reference = reference;
        }

        // Swap execution
        if let Some(url) = var("SWAP_GATEWAY_URL") {
            config.swap_gateway.gateway_url = url;
        }
        if let Some(url) = var("SOLANA_RPC_URL") {
            config.swap_gateway.rpc_url = url;
        }
        parse_in_range(
            &var,
            "SWAP_SLIPPAGE_BPS",
            &mut config.swap_gateway.slippage_bps,
            |v| (1..=5_000).contains(v),
            "must be between 1 and 5000",
        );

        // Wallet and secrets
        if let Some(public_key) = var("WALLET_PUBLIC_KEY") {
            config.wallet.public_key = public_key.trim().to_string();
        }
        if let Some(reference) = var("WALLET_PRIVATE_KEY_OP_REF") {
            config.wallet.private_key_op_reference = reference;
        }
        if let Some(value) = var("ALLOW_ENV_SECRETS") {
            config.secrets.allow_env_vars = parse_flag(&value);
        }
        if let Some(value) = var("REQUIRE_OP_CLI") {
            config.secrets.require_op_cli = parse_flag(&value);
        }

        // Manual overrides
        if let Some(value) = var("FORCE_OPEN_POSITION") {
            config.force.force_open = parse_flag(&value);
        }
        if let Some(value) = var("FORCE_CLOSE_POSITION") {
            config.force.force_close = parse_flag(&value);
        }
        if config.force.force_open || config.force.force_close {
            tracing::warn!(
                "Force overrides enabled: open={} close={}",
                config.force.force_open,
                config.force.force_close
            );
        }

        config.strategy_file = var("STRATEGY_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        config
    }
}
