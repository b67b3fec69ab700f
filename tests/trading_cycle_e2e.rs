//! Trading cycle end-to-end tests
//!
//! Runs full cycles against an in-memory SQLite database with scripted market
//! data, wallet balances and swap gateway.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zeroize::Zeroizing;

use trading_agent::application::cycle::{CycleServices, CycleSettings, TradingCycle};
use trading_agent::domain::entities::decision::ExecutionStage;
use trading_agent::domain::entities::portfolio::{WalletPortfolio, WalletPortfolioItem};
use trading_agent::domain::entities::position::PositionStatus;
use trading_agent::domain::entities::price_history::PricePoint;
use trading_agent::domain::entities::strategy::{RsiConfig, StrategyType, TradingStrategyConfig};
use trading_agent::domain::entities::token::{MarketMetadata, Token, TokenPair, WRAPPED_SOL_MINT};
use trading_agent::domain::entities::transaction::{TransactionSide, TransactionStatus, PAPER_TRADE_TX_HASH};
use trading_agent::domain::errors::ProviderError;
use trading_agent::domain::repositories::market_data::{AddressType, PriceService, WalletPortfolioService};
use trading_agent::domain::repositories::secret_service::{SecretService, WalletKeys};
use trading_agent::domain::repositories::swap_client::{
    SwapClient, SwapClientFactory, TokenBalanceChange, TransactionConfirmation,
};
use trading_agent::domain::repositories::trading_store::{MemoryKind, PositionStore};
use trading_agent::domain::services::strategies::ForceOverrides;
use trading_agent::domain::services::trade_validator::TradingLimits;
use trading_agent::domain::value_objects::interval::TimeInterval;
use trading_agent::persistence::models::StrategySeed;
use trading_agent::persistence::repository::{
    MemoryRepository, PositionRepository, StrategyRepository, TransactionRepository,
};
use trading_agent::persistence::{init_database, DatabaseConfig, DbPool};
use trading_agent::retry::RetryPolicy;
use trading_agent::secrets::SecretError;

const AGENT: &str = "agent_e2e";
const ASSIGNMENT: &str = "asg_e2e";
const WALLET: &str = "wallet_pubkey";
const USDC: &str = "usdc_mint";
const JUP: &str = "jup_mint";

fn usdc() -> Token {
    Token::new(USDC, "USDC", 6)
}

fn sol() -> Token {
    Token::new(WRAPPED_SOL_MINT, "SOL", 9)
}

fn jup() -> Token {
    Token::new(JUP, "JUP", 6)
}

fn series(first: f64, step: f64, bars: usize) -> Vec<f64> {
    (0..bars).map(|i| first + step * i as f64).collect()
}

// ============================================================================
// Mocks
// ============================================================================

struct MarketMock {
    closes: Mutex<HashMap<String, Vec<f64>>>,
    liquidity_usd: Mutex<f64>,
    liquidity_by_mint: Mutex<HashMap<String, f64>>,
    fail_history: AtomicBool,
}

impl MarketMock {
    fn new() -> Self {
        let market = Self {
            closes: Mutex::new(HashMap::new()),
            liquidity_usd: Mutex::new(1_000_000.0),
            liquidity_by_mint: Mutex::new(HashMap::new()),
            fail_history: AtomicBool::new(false),
        };
        market.set(USDC, vec![1.0; 30]);
        market
    }

    fn set(&self, address: &str, closes: Vec<f64>) {
        self.closes.lock().unwrap().insert(address.to_string(), closes);
    }

    fn set_liquidity(&self, liquidity_usd: f64) {
        *self.liquidity_usd.lock().unwrap() = liquidity_usd;
    }

    fn set_liquidity_for(&self, address: &str, liquidity_usd: f64) {
        self.liquidity_by_mint
            .lock()
            .unwrap()
            .insert(address.to_string(), liquidity_usd);
    }
}

#[async_trait]
impl PriceService for MarketMock {
    async fn fetch_price_history(
        &self,
        address: &str,
        _address_type: AddressType,
        _interval: TimeInterval,
        time_from: i64,
        _time_to: i64,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        if self.fail_history.load(Ordering::SeqCst) {
            return Err(ProviderError::request("birdeye", "connection refused"));
        }
        let closes = self.closes.lock().unwrap().get(address).cloned().unwrap_or_default();
        Ok(closes
            .into_iter()
            .enumerate()
            .map(|(i, value)| PricePoint {
                unix_time: time_from + i as i64 * 3600,
                value,
            })
            .collect())
    }

    async fn fetch_market_metadata(&self, address: &str) -> Result<MarketMetadata, ProviderError> {
        let liquidity_usd = self
            .liquidity_by_mint
            .lock()
            .unwrap()
            .get(address)
            .copied()
            .unwrap_or(*self.liquidity_usd.lock().unwrap());
        Ok(MarketMetadata {
            liquidity_usd: Some(liquidity_usd),
            volume_24h_usd: Some(500_000.0),
            trust_score: None,
            expected_slippage_percent: None,
        })
    }
}

struct WalletMock;

#[async_trait]
impl WalletPortfolioService for WalletMock {
    async fn get_wallet_portfolio(&self, _public_key: &str) -> Result<WalletPortfolio, ProviderError> {
        Ok(WalletPortfolio {
            items: vec![WalletPortfolioItem {
                address: USDC.to_string(),
                symbol: Some("USDC".to_string()),
                decimals: 6,
                balance: "1000000000".to_string(),
                ui_amount: 1000.0,
                price_usd: Some(1.0),
                value_usd: Some(1000.0),
                logo_uri: None,
                chain_id: Some("solana".to_string()),
            }],
            total_usd: Some(1000.0),
        })
    }
}

struct StaticSecrets;

#[async_trait]
impl SecretService for StaticSecrets {
    async fn decrypt(&self, ciphertext: &str) -> Result<Zeroizing<String>, SecretError> {
        Ok(Zeroizing::new(ciphertext.to_string()))
    }

    async fn agent_wallet_details(&self, _agent_id: &str, _cycle: u64) -> Result<WalletKeys, SecretError> {
        Ok(WalletKeys {
            public_key: WALLET.to_string(),
            private_key: Zeroizing::new("secret".to_string()),
        })
    }
}

#[derive(Clone, Copy)]
enum SwapScript {
    /// Transient failures before the swap lands
    FlakyThenLands(usize),
    AlwaysFlaky,
    Rejected,
}

struct ScriptedSwapClient {
    script: SwapScript,
    trades: AtomicUsize,
}

#[async_trait]
impl SwapClient for ScriptedSwapClient {
    async fn trade(&self, _from_mint: &str, _amount: f64, _to_mint: &str) -> Result<String, ProviderError> {
        let call = self.trades.fetch_add(1, Ordering::SeqCst);
        match self.script {
            SwapScript::FlakyThenLands(failures) if call >= failures => Ok("sig_live".to_string()),
            SwapScript::Rejected => Err(ProviderError::Rejected {
                service: "swap gateway".to_string(),
                reason: "insufficient funds".to_string(),
            }),
            _ => Err(ProviderError::request("swap gateway", "connection reset")),
        }
    }

    async fn get_transaction(&self, hash: &str) -> Result<Option<TransactionConfirmation>, ProviderError> {
        Ok(Some(TransactionConfirmation {
            signature: hash.to_string(),
            slot: Some(250_000_000),
            block_time: Some(1_700_000_000),
            fee_lamports: 5000,
            error: None,
            native_balance_change: -5000,
            token_balances: vec![
                TokenBalanceChange {
                    mint: USDC.to_string(),
                    owner: Some(WALLET.to_string()),
                    decimals: 6,
                    pre_amount: 1_000_000_000,
                    post_amount: 900_000_000,
                },
                TokenBalanceChange {
                    mint: WRAPPED_SOL_MINT.to_string(),
                    owner: Some(WALLET.to_string()),
                    decimals: 9,
                    pre_amount: 0,
                    post_amount: 584_795_321,
                },
            ],
        }))
    }
}

struct ScriptedSwapFactory {
    client: Arc<ScriptedSwapClient>,
    built: AtomicUsize,
}

impl ScriptedSwapFactory {
    fn new(script: SwapScript) -> Self {
        Self {
            client: Arc::new(ScriptedSwapClient {
                script,
                trades: AtomicUsize::new(0),
            }),
            built: AtomicUsize::new(0),
        }
    }

    fn trades(&self) -> usize {
        self.client.trades.load(Ordering::SeqCst)
    }
}

impl SwapClientFactory for ScriptedSwapFactory {
    fn for_wallet(&self, wallet: &WalletKeys) -> Result<Arc<dyn SwapClient>, ProviderError> {
        assert_eq!(wallet.public_key, WALLET);
        self.built.fetch_add(1, Ordering::SeqCst);
        let client: Arc<dyn SwapClient> = self.client.clone();
        Ok(client)
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    pool: DbPool,
    market: Arc<MarketMock>,
    swaps: Arc<ScriptedSwapFactory>,
    positions: Arc<PositionRepository>,
    transactions: Arc<TransactionRepository>,
    memories: Arc<MemoryRepository>,
    cycle: TradingCycle,
}

fn strategy(pairs: Vec<TokenPair>) -> TradingStrategyConfig {
    TradingStrategyConfig {
        title: "Dip buyer".to_string(),
        strategy_type: StrategyType::Rsi,
        token_pairs: pairs,
        time_interval: TimeInterval::H1,
        max_portfolio_allocation: 10.0,
        rsi_config: RsiConfig::default(),
    }
}

async fn harness(is_paper_trading: bool, pairs: Vec<TokenPair>, script: SwapScript) -> Harness {
    let pool = init_database(&DatabaseConfig::in_memory()).await.unwrap();
    let strategies = Arc::new(StrategyRepository::new(pool.clone()));
    strategies
        .seed(StrategySeed {
            agent_id: AGENT.to_string(),
            strategy_id: "strat_e2e".to_string(),
            assignment_id: ASSIGNMENT.to_string(),
            is_paper_trading,
            start_date: Some(Utc::now() - ChronoDuration::days(1)),
            end_date: None,
            strategy: strategy(pairs),
        })
        .await
        .unwrap();

    let market = Arc::new(MarketMock::new());
    let swaps = Arc::new(ScriptedSwapFactory::new(script));
    let positions = Arc::new(PositionRepository::new(pool.clone()));
    let transactions = Arc::new(TransactionRepository::new(pool.clone()));
    let memories = Arc::new(MemoryRepository::new(pool.clone()));

    let cycle = TradingCycle::new(
        CycleServices {
            secrets: Arc::new(StaticSecrets),
            strategies,
            prices: market.clone(),
            wallets: Arc::new(WalletMock),
            swaps: swaps.clone(),
            positions: positions.clone(),
            transactions: transactions.clone(),
            memory: memories.clone(),
        },
        CycleSettings {
            agent_id: AGENT.to_string(),
            trading_limits: TradingLimits::default(),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                attempt_timeout: Duration::from_secs(5),
            },
            force: ForceOverrides::default(),
        },
    );

    Harness {
        pool,
        market,
        swaps,
        positions,
        transactions,
        memories,
        cycle,
    }
}

fn usdc_sol() -> TokenPair {
    TokenPair::new(usdc(), sol())
}

// ============================================================================
// Paper trading
// ============================================================================

#[tokio::test]
async fn test_paper_cycle_opens_position() {
    let h = harness(true, vec![usdc_sol()], SwapScript::AlwaysFlaky).await;
    // 200 down to 171: RSI 0
    h.market.set(WRAPPED_SOL_MINT, series(200.0, -1.0, 30));

    let outcome = h.cycle.run_cycle().await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.kind, MemoryKind::Trade);
    assert_eq!(outcome.decisions, 1);
    assert_eq!(outcome.results.len(), 1);
    let result = &outcome.results[0];
    assert_eq!(result.stage, ExecutionStage::Succeeded);
    assert_eq!(result.side, Some(TransactionSide::Buy));
    assert_eq!(result.transaction_hash.as_deref(), Some(PAPER_TRADE_TX_HASH));

    let open = h.positions.find_open(ASSIGNMENT).await.unwrap();
    assert_eq!(open.len(), 1);
    let position = &open[0];
    assert_eq!(position.status, PositionStatus::Open);
    assert_eq!(position.base_token.address, WRAPPED_SOL_MINT);
    assert_eq!(position.quote_token.address, USDC);
    assert_eq!(position.entry_price, 171.0);
    // 10% of 1000 USDC at $1, filled at $171
    let bought = position.base_amount().unwrap().to_f64();
    assert!((bought - 100.0 / 171.0).abs() < 1e-6);

    let txs = h.transactions.find_by_assignment(ASSIGNMENT).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].side, TransactionSide::Buy);
    assert_eq!(txs[0].status, TransactionStatus::Open);
    assert!(txs[0].is_paper_trade());
    assert_eq!(txs[0].from_token_address, USDC);
    assert_eq!(txs[0].to_token_address, WRAPPED_SOL_MINT);
    assert_eq!(txs[0].amount_in, "100");
    assert_eq!(txs[0].position_id.as_deref(), Some(position.id.as_str()));

    // Paper cycles never build a live swap client
    assert_eq!(h.swaps.built.load(Ordering::SeqCst), 0);
    assert_eq!(h.swaps.trades(), 0);

    let memories = h.memories.recent(AGENT, 10).await.unwrap();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].kind, "TRADE");
    assert!(memories[0].message.contains("[PAPER]"));
    let content: serde_json::Value = serde_json::from_str(&memories[0].additional_content).unwrap();
    assert_eq!(content["strategyAssignmentId"], ASSIGNMENT);
    assert_eq!(content["isPaperTrading"], true);
}

#[tokio::test]
async fn test_paper_round_trip_realizes_pnl() {
    let h = harness(true, vec![usdc_sol()], SwapScript::AlwaysFlaky).await;
    h.market.set(WRAPPED_SOL_MINT, series(200.0, -1.0, 30));
    let opened = h.cycle.run_cycle().await;
    assert_eq!(opened.succeeded_trades(), 1);
    let position_id = opened.results[0].position_id.clone().unwrap();

    // 150 up to 179: RSI 100
    h.market.set(WRAPPED_SOL_MINT, series(150.0, 1.0, 30));
    let closed = h.cycle.run_cycle().await;

    assert_eq!(closed.cycle, 2);
    assert_eq!(closed.results.len(), 1);
    let result = &closed.results[0];
    assert_eq!(result.stage, ExecutionStage::Succeeded);
    assert_eq!(result.side, Some(TransactionSide::Sell));
    assert_eq!(result.position_id.as_deref(), Some(position_id.as_str()));

    let position = h.positions.get(&position_id).await.unwrap().unwrap();
    assert_eq!(position.status, PositionStatus::Closed);
    assert_eq!(position.exit_price, Some(179.0));
    assert!(position.closed_at.is_some());
    assert!(h.positions.find_open(ASSIGNMENT).await.unwrap().is_empty());

    // Same amount out as in, so P&L is amount * (179 - 171)
    let amount = position.base_amount().unwrap().to_f64();
    let pnl = position.realized_pnl_usd.unwrap();
    assert!((pnl - amount * 8.0).abs() < 1e-6, "pnl {}", pnl);

    let txs = h.transactions.find_by_position(&position_id).await.unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].status, TransactionStatus::Open);
    assert_eq!(txs[1].status, TransactionStatus::Closed);
    assert_eq!(txs[1].side, TransactionSide::Sell);
    assert_eq!(txs[1].from_token_address, WRAPPED_SOL_MINT);
    assert_eq!(txs[1].to_token_address, USDC);
    assert!((txs[1].profit_loss_usd.unwrap() - pnl).abs() < 1e-9);
    let pct = txs[1].profit_loss_percentage.unwrap();
    assert!((pct - 8.0 / 171.0 * 100.0).abs() < 1e-6, "pct {}", pct);
}

#[tokio::test]
async fn test_open_position_is_held_while_rsi_is_neutral() {
    let h = harness(true, vec![usdc_sol()], SwapScript::AlwaysFlaky).await;
    h.market.set(WRAPPED_SOL_MINT, series(200.0, -1.0, 30));
    h.cycle.run_cycle().await;

    // Still falling: holding blocks a second open, no close signal either
    let outcome = h.cycle.run_cycle().await;

    assert_eq!(outcome.kind, MemoryKind::Idle);
    assert!(outcome.results.is_empty());
    assert_eq!(h.positions.find_open(ASSIGNMENT).await.unwrap().len(), 1);
    assert_eq!(h.transactions.find_by_assignment(ASSIGNMENT).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_one_transaction_per_decision() {
    let h = harness(
        true,
        vec![usdc_sol(), TokenPair::new(usdc(), jup())],
        SwapScript::AlwaysFlaky,
    )
    .await;
    h.market.set(WRAPPED_SOL_MINT, series(200.0, -1.0, 30));
    h.market.set(JUP, series(1.0, -0.01, 30));

    let outcome = h.cycle.run_cycle().await;

    assert_eq!(outcome.decisions, 2);
    assert_eq!(outcome.succeeded_trades(), 2);
    let txs = h.transactions.find_by_assignment(ASSIGNMENT).await.unwrap();
    assert_eq!(txs.len(), 2);
    let mut received: Vec<&str> = txs.iter().map(|t| t.to_token_address.as_str()).collect();
    received.sort();
    let mut expected = vec![WRAPPED_SOL_MINT, JUP];
    expected.sort();
    assert_eq!(received, expected);
    assert_eq!(h.positions.find_open(ASSIGNMENT).await.unwrap().len(), 2);
}

// ============================================================================
// Idle and failing cycles
// ============================================================================

#[tokio::test]
async fn test_short_history_is_an_idle_cycle() {
    let h = harness(true, vec![usdc_sol()], SwapScript::AlwaysFlaky).await;
    // RSI(14) needs 15 closes
    h.market.set(WRAPPED_SOL_MINT, series(200.0, -1.0, 10));

    let outcome = h.cycle.run_cycle().await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.kind, MemoryKind::Idle);
    assert_eq!(outcome.decisions, 1);
    assert!(outcome.results.is_empty());
    assert!(h.transactions.find_by_assignment(ASSIGNMENT).await.unwrap().is_empty());

    let memories = h.memories.recent(AGENT, 10).await.unwrap();
    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].kind, "IDLE");
    assert!(memories[0].message.contains("rsi=n/a"));
}

#[tokio::test]
async fn test_price_service_failure_aborts_cycle() {
    let h = harness(true, vec![usdc_sol()], SwapScript::AlwaysFlaky).await;
    h.market.set(WRAPPED_SOL_MINT, series(200.0, -1.0, 30));
    h.market.fail_history.store(true, Ordering::SeqCst);

    let outcome = h.cycle.run_cycle().await;

    assert_eq!(outcome.kind, MemoryKind::Error);
    assert!(outcome.error.as_deref().unwrap().contains("connection refused"));
    assert!(outcome.results.is_empty());
    assert!(h.transactions.find_by_assignment(ASSIGNMENT).await.unwrap().is_empty());

    let memories = h.memories.recent(AGENT, 10).await.unwrap();
    assert_eq!(memories[0].kind, "ERROR");
    assert!(memories[0].message.starts_with("Trading cycle 1 failed"));

    // The next cycle recovers on its own
    h.market.fail_history.store(false, Ordering::SeqCst);
    let outcome = h.cycle.run_cycle().await;
    assert_eq!(outcome.cycle, 2);
    assert_eq!(outcome.kind, MemoryKind::Trade);
}

#[tokio::test]
async fn test_failed_validation_is_recorded() {
    let h = harness(true, vec![usdc_sol()], SwapScript::AlwaysFlaky).await;
    h.market.set(WRAPPED_SOL_MINT, series(200.0, -1.0, 30));
    h.market.set_liquidity(10.0);

    let outcome = h.cycle.run_cycle().await;

    assert_eq!(outcome.kind, MemoryKind::Trade);
    assert_eq!(outcome.succeeded_trades(), 0);
    let result = &outcome.results[0];
    assert_eq!(result.stage, ExecutionStage::Failed);
    assert_eq!(result.failed_during, Some(ExecutionStage::Validating));

    let txs = h.transactions.find_by_assignment(ASSIGNMENT).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].status, TransactionStatus::Failed);
    assert_eq!(txs[0].side, TransactionSide::Buy);
    assert_eq!(txs[0].amount_out, "0");
    assert!(txs[0].position_id.is_none());
    assert!(txs[0].transaction_hash.is_none());
    assert!(txs[0]
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("Insufficient liquidity"));
    assert!(h.positions.find_open(ASSIGNMENT).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_illiquid_pair_does_not_block_liquid_pair() {
    let h = harness(
        true,
        vec![usdc_sol(), TokenPair::new(usdc(), jup())],
        SwapScript::AlwaysFlaky,
    )
    .await;
    h.market.set(WRAPPED_SOL_MINT, series(200.0, -1.0, 30));
    h.market.set(JUP, series(1.0, -0.01, 30));
    h.market.set_liquidity_for(JUP, 10.0);

    let outcome = h.cycle.run_cycle().await;

    assert_eq!(outcome.decisions, 2);
    assert_eq!(outcome.succeeded_trades(), 1);

    let txs = h.transactions.find_by_assignment(ASSIGNMENT).await.unwrap();
    assert_eq!(txs.len(), 2);
    let failed: Vec<_> = txs.iter().filter(|t| t.status == TransactionStatus::Failed).collect();
    let opened: Vec<_> = txs.iter().filter(|t| t.status == TransactionStatus::Open).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].to_token_address, JUP);
    assert!(failed[0]
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("Insufficient liquidity"));
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].to_token_address, WRAPPED_SOL_MINT);

    let open = h.positions.find_open(ASSIGNMENT).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].base_token.address, WRAPPED_SOL_MINT);
}

#[tokio::test]
async fn test_missing_assignment_is_an_error_cycle() {
    let h = harness(true, vec![usdc_sol()], SwapScript::AlwaysFlaky).await;
    sqlx::query("UPDATE agent_strategy_assignments SET is_active = 0")
        .execute(&h.pool)
        .await
        .unwrap();

    let outcome = h.cycle.run_cycle().await;

    assert_eq!(outcome.kind, MemoryKind::Error);
    assert!(outcome.error.unwrap().contains(AGENT));
    assert_eq!(h.memories.recent(AGENT, 10).await.unwrap()[0].kind, "ERROR");
}

// ============================================================================
// Live trading
// ============================================================================

#[tokio::test]
async fn test_live_swap_retries_transient_failures() {
    let h = harness(false, vec![usdc_sol()], SwapScript::FlakyThenLands(2)).await;
    h.market.set(WRAPPED_SOL_MINT, series(200.0, -1.0, 30));

    let outcome = h.cycle.run_cycle().await;

    assert_eq!(h.swaps.built.load(Ordering::SeqCst), 1);
    assert_eq!(h.swaps.trades(), 3);
    assert_eq!(outcome.succeeded_trades(), 1);
    assert_eq!(outcome.results[0].transaction_hash.as_deref(), Some("sig_live"));

    let txs = h.transactions.find_by_assignment(ASSIGNMENT).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].status, TransactionStatus::Open);
    assert!(!txs[0].is_paper_trade());
    assert_eq!(txs[0].fee_lamports, 5000);
    assert_eq!(txs[0].amount_in, "100");
    assert_eq!(txs[0].amount_out, "0.584795321");

    let position = &h.positions.find_open(ASSIGNMENT).await.unwrap()[0];
    assert_eq!(position.total_base_amount, "0.584795321");
    assert!(h.memories.recent(AGENT, 1).await.unwrap()[0].message.contains("[LIVE]"));
}

#[tokio::test]
async fn test_live_swap_gives_up_after_max_attempts() {
    let h = harness(false, vec![usdc_sol()], SwapScript::AlwaysFlaky).await;
    h.market.set(WRAPPED_SOL_MINT, series(200.0, -1.0, 30));

    let outcome = h.cycle.run_cycle().await;

    assert_eq!(h.swaps.trades(), 3);
    assert_eq!(outcome.results[0].stage, ExecutionStage::Failed);
    assert_eq!(outcome.results[0].failed_during, Some(ExecutionStage::Executing));

    let txs = h.transactions.find_by_assignment(ASSIGNMENT).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].status, TransactionStatus::Failed);
    // Prices were resolved before the swap was attempted
    assert_eq!(txs[0].from_price_usd, 1.0);
    assert_eq!(txs[0].to_price_usd, 171.0);
    assert!(h.positions.find_open(ASSIGNMENT).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_live_swap_rejection_is_not_retried() {
    let h = harness(false, vec![usdc_sol()], SwapScript::Rejected).await;
    h.market.set(WRAPPED_SOL_MINT, series(200.0, -1.0, 30));

    let outcome = h.cycle.run_cycle().await;

    assert_eq!(h.swaps.trades(), 1);
    assert_eq!(outcome.results[0].stage, ExecutionStage::Failed);
    assert!(outcome.results[0]
        .error
        .as_deref()
        .unwrap()
        .contains("insufficient funds"));

    let txs = h.transactions.find_by_assignment(ASSIGNMENT).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].status, TransactionStatus::Failed);
}
