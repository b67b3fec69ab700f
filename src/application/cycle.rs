//! Trading cycle orchestration
//!
//! One cycle: build the context, load portfolio and price history
//! concurrently, evaluate the strategy, execute actionable decisions, then
//! write a structured log and a narrative memory. A failing stage aborts the
//! cycle and leaves an ERROR memory behind; nothing is returned as an error.

use async_trait::async_trait;
use futures_util::TryFutureExt;
use serde::Serialize;
use serde_json::json;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::context::{ContextBuilder, ContextError, TradingContext};
use crate::domain::entities::decision::TradeResult;
use crate::domain::errors::ProviderError;
use crate::domain::repositories::market_data::{PriceService, WalletPortfolioService};
use crate::domain::repositories::secret_service::SecretService;
use crate::domain::repositories::swap_client::{SwapClient, SwapClientFactory, TransactionConfirmation};
use crate::domain::repositories::trading_store::{
    MemoryKind, MemorySink, NewMemory, PositionStore, StrategyStore, TransactionStore,
};
use crate::domain::services::portfolio::{PortfolioError, PortfolioProvider};
use crate::domain::services::price_history::PriceHistoryProvider;
use crate::domain::services::strategies::{evaluate_strategy, ForceOverrides};
use crate::domain::services::trade_executor::{ExecutionContext, TradeExecutor};
use crate::domain::services::trade_validator::{TradeValidator, TradingLimits};
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Portfolio(#[from] PortfolioError),

    #[error("Failed to load price history: {0}")]
    PriceHistory(#[source] ProviderError),

    #[error("Failed to prepare swap client: {0}")]
    SwapClient(#[source] ProviderError),
}

/// External collaborators of a cycle.
#[derive(Clone)]
pub struct CycleServices {
    pub secrets: Arc<dyn SecretService>,
    pub strategies: Arc<dyn StrategyStore>,
    pub prices: Arc<dyn PriceService>,
    pub wallets: Arc<dyn WalletPortfolioService>,
    pub swaps: Arc<dyn SwapClientFactory>,
    pub positions: Arc<dyn PositionStore>,
    pub transactions: Arc<dyn TransactionStore>,
    pub memory: Arc<dyn MemorySink>,
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub agent_id: String,
    pub trading_limits: TradingLimits,
    pub retry: RetryPolicy,
    pub force: ForceOverrides,
}

/// What a cycle did, for the caller's logs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleOutcome {
    pub cycle: u64,
    pub kind: MemoryKind,
    pub decisions: usize,
    pub results: Vec<TradeResult>,
    pub error: Option<String>,
    pub log_message: String,
}

impl CycleOutcome {
    pub fn succeeded_trades(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }
}

pub struct TradingCycle {
    services: CycleServices,
    settings: CycleSettings,
    context_builder: ContextBuilder,
    portfolio_provider: PortfolioProvider,
    price_history_provider: PriceHistoryProvider,
    validator: TradeValidator,
    cycle_counter: AtomicU64,
}

impl TradingCycle {
    pub fn new(services: CycleServices, settings: CycleSettings) -> Self {
        Self {
            context_builder: ContextBuilder::new(services.secrets.clone(), services.strategies.clone()),
            portfolio_provider: PortfolioProvider::new(services.positions.clone(), services.wallets.clone()),
            price_history_provider: PriceHistoryProvider::new(services.prices.clone()),
            validator: TradeValidator::new(settings.trading_limits),
            services,
            settings,
            cycle_counter: AtomicU64::new(0),
        }
    }

    /// Number of cycles started so far.
    pub fn cycles_run(&self) -> u64 {
        self.cycle_counter.load(Ordering::SeqCst)
    }

    /// Runs one cycle. Failures end up in the returned outcome and in an
    /// ERROR memory.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let cycle = self.cycle_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let agent_id = self.settings.agent_id.clone();
        let started = Instant::now();
        info!("▶ Trading cycle {} started for agent {}", cycle, agent_id);

        let outcome = match self.execute(cycle).await {
            Ok(ctx) => {
                let kind = if ctx.results.is_empty() {
                    MemoryKind::Idle
                } else {
                    MemoryKind::Trade
                };
                info!("{}", ctx.log_message);
                let memory = NewMemory {
                    agent_id: agent_id.clone(),
                    kind,
                    message: ctx.log_message.clone(),
                    additional_content: json!({
                        "cycle": cycle,
                        "strategyAssignmentId": ctx.assignment.id,
                        "strategy": ctx.strategy_title(),
                        "isPaperTrading": ctx.is_paper_trading,
                        "portfolioValueUsd": ctx.portfolio.total_value,
                        "decisions": ctx.decisions.iter().map(|d| d.description.as_str()).collect::<Vec<_>>(),
                        "results": ctx.results,
                    }),
                };
                self.remember(memory).await;
                CycleOutcome {
                    cycle,
                    kind,
                    decisions: ctx.decisions.len(),
                    results: ctx.results,
                    error: None,
                    log_message: ctx.log_message,
                }
            }
            Err(e) => {
                let message = format!("Trading cycle {} failed: {}", cycle, e);
                error!("{}", message);
                self.remember(NewMemory {
                    agent_id: agent_id.clone(),
                    kind: MemoryKind::Error,
                    message: message.clone(),
                    additional_content: json!({
                        "cycle": cycle,
                        "error": e.to_string(),
                    }),
                })
                .await;
                CycleOutcome {
                    cycle,
                    kind: MemoryKind::Error,
                    decisions: 0,
                    results: Vec::new(),
                    error: Some(e.to_string()),
                    log_message: message,
                }
            }
        };

        info!(
            "■ Trading cycle {} finished in {:.1}s ({}, {} trades)",
            cycle,
            started.elapsed().as_secs_f64(),
            outcome.kind.as_str(),
            outcome.results.len()
        );
        outcome
    }

    async fn execute(&self, cycle: u64) -> Result<TradingContext, CycleError> {
        let mut ctx = self
            .context_builder
            .build(&self.settings.agent_id, cycle)
            .await?;

        let config = ctx.assignment.config();
        let portfolio = self
            .portfolio_provider
            .get_portfolio(&ctx.assignment.id, &ctx.wallet.public_key)
            .map_err(CycleError::from);
        let price_history = self
            .price_history_provider
            .get_price_history(config)
            .map_err(CycleError::PriceHistory);
        let (portfolio, price_history) = tokio::try_join!(portfolio, price_history)?;
        ctx.portfolio = portfolio;
        ctx.price_history = price_history;

        ctx.decisions = evaluate_strategy(
            &ctx.assignment,
            &ctx.portfolio,
            &ctx.price_history,
            self.settings.force,
        );

        if ctx.decisions.iter().any(|d| d.is_actionable()) {
            let swap_client: Arc<dyn SwapClient> = if ctx.is_paper_trading {
                Arc::new(PaperModeSwaps)
            } else {
                self.services
                    .swaps
                    .for_wallet(&ctx.wallet)
                    .map_err(CycleError::SwapClient)?
            };
            let executor = TradeExecutor::new(
                swap_client,
                self.services.positions.clone(),
                self.services.transactions.clone(),
                self.validator.clone(),
                self.settings.retry.clone(),
            );
            let exec_ctx = ExecutionContext {
                is_paper_trading: ctx.is_paper_trading,
                wallet_public_key: &ctx.wallet.public_key,
                price_history: &ctx.price_history,
            };
            ctx.results = executor.execute_decisions(&ctx.decisions, exec_ctx).await;
        }

        ctx.log_message = build_log_message(&ctx);
        Ok(ctx)
    }

    async fn remember(&self, memory: NewMemory) {
        let kind = memory.kind;
        if let Err(e) = self.services.memory.create_memory(memory).await {
            warn!("Failed to store {} memory: {}", kind.as_str(), e);
        }
    }
}

/// Swap client of paper cycles; the executor never submits paper trades.
struct PaperModeSwaps;

#[async_trait]
impl SwapClient for PaperModeSwaps {
    async fn trade(&self, _from_mint: &str, _amount: f64, _to_mint: &str) -> Result<String, ProviderError> {
        Err(ProviderError::InvalidConfiguration(
            "live swaps are disabled in paper mode".to_string(),
        ))
    }

    async fn get_transaction(&self, _hash: &str) -> Result<Option<TransactionConfirmation>, ProviderError> {
        Ok(None)
    }
}

/// Multi-section, human readable summary of a completed cycle.
pub fn build_log_message(ctx: &TradingContext) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== Cycle {} | agent {} | {} [{}] ===",
        ctx.cycle,
        ctx.agent_id,
        ctx.strategy_title(),
        ctx.mode()
    );

    let _ = writeln!(out, "-- Portfolio (${:.2}) --", ctx.portfolio.total_value);
    let mut items: Vec<_> = ctx.portfolio.wallet_items.iter().collect();
    items.sort_by(|a, b| {
        b.value_usd
            .unwrap_or(0.0)
            .partial_cmp(&a.value_usd.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for item in items {
        let _ = writeln!(
            out,
            "{}: {} (${:.2})",
            item.symbol.as_deref().unwrap_or(&item.address),
            item.ui_amount,
            item.value_usd.unwrap_or(0.0)
        );
    }
    if ctx.portfolio.open_positions.is_empty() {
        let _ = writeln!(out, "No open positions");
    }
    for position in &ctx.portfolio.open_positions {
        let _ = writeln!(
            out,
            "OPEN {}/{} amount={} entry=${}",
            position.base_token.symbol,
            position.quote_token.symbol,
            position.total_base_amount,
            position.entry_price
        );
    }

    let _ = writeln!(out, "-- Price history --");
    let mut histories: Vec<_> = ctx.price_history.iter().collect();
    histories.sort_by(|a, b| a.token.symbol.cmp(&b.token.symbol));
    for history in histories {
        match history.latest_price() {
            Some(price) => {
                let _ = writeln!(
                    out,
                    "{}: {} points, last=${}",
                    history.token.symbol,
                    history.prices.len(),
                    price
                );
            }
            None => {
                let _ = writeln!(out, "{}: no data", history.token.symbol);
            }
        }
    }

    let _ = writeln!(out, "-- Decisions --");
    for decision in &ctx.decisions {
        let _ = writeln!(out, "{}", decision.description);
    }

    let _ = writeln!(out, "-- Trades --");
    if ctx.results.is_empty() {
        let _ = writeln!(out, "No trades executed");
    }
    for result in &ctx.results {
        let side = result.side.map(|s| s.as_str()).unwrap_or("?");
        let pair = result.pair.as_deref().unwrap_or("?");
        match &result.error {
            None => {
                let _ = writeln!(
                    out,
                    "{} {} {}: in={} out={} tx={}{}",
                    side,
                    pair,
                    result.stage,
                    result.amount_in.as_deref().unwrap_or("-"),
                    result.amount_out.as_deref().unwrap_or("-"),
                    result.transaction_hash.as_deref().unwrap_or("-"),
                    result
                        .realized_pnl_usd
                        .map(|pnl| format!(" pnl=${:.2}", pnl))
                        .unwrap_or_default()
                );
            }
            Some(error) => {
                let _ = writeln!(
                    out,
                    "{} {} {} during {}: {}",
                    side,
                    pair,
                    result.stage,
                    result
                        .failed_during
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    error
                );
            }
        }
    }

    out.trim_end().to_string()
}
