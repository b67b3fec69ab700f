//! TradeExecutor service - takes trade decisions through validation,
//! execution and recording.
//!
//! Every actionable decision runs through
//! `PENDING -> VALIDATING -> EXECUTING -> RECORDING -> SUCCEEDED | FAILED`.
//! Decisions of one cycle run concurrently and fail independently; a failed
//! decision is still recorded as a FAILED transaction whenever its pair and
//! strategy assignment are known.

use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::domain::entities::decision::{ExecutionStage, TradeDecision, TradeResult};
use crate::domain::entities::position::{ClosePosition, NewPosition, Position, TokenDescriptor};
use crate::domain::entities::price_history::PriceHistorySnapshot;
use crate::domain::entities::token::{Token, TokenPair, WRAPPED_SOL_MINT};
use crate::domain::entities::transaction::{
    NewTransaction, Transaction, TransactionSide, TransactionStatus, PAPER_TRADE_TX_HASH,
};
use crate::domain::errors::ProviderError;
use crate::domain::repositories::swap_client::{SwapClient, TransactionConfirmation};
use crate::domain::repositories::trading_store::{PositionStore, TransactionStore};
use crate::domain::services::swap_details::{extract_swap_details, paper_swap_details, SwapDetails};
use crate::domain::services::trade_execution_error::{ErrorSeverity, TradeExecutionError};
use crate::domain::services::trade_validator::{TradeParameters, TradeValidator};
use crate::domain::value_objects::pnl::PnL;
use crate::domain::value_objects::quantity::Quantity;
use crate::retry::{retry_with_backoff, RetryError, RetryPolicy};

/// Read-only view of the cycle the executor needs.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub is_paper_trading: bool,
    pub wallet_public_key: &'a str,
    pub price_history: &'a PriceHistorySnapshot,
}

/// Which side of the pair is spent and which is received.
struct Legs<'a> {
    pair: &'a TokenPair,
    side: TransactionSide,
    spent: &'a Token,
    received: &'a Token,
}

impl<'a> Legs<'a> {
    fn new(pair: &'a TokenPair, side: TransactionSide) -> Self {
        match side {
            TransactionSide::Buy => Legs {
                pair,
                side,
                spent: &pair.from,
                received: &pair.to,
            },
            TransactionSide::Sell => Legs {
                pair,
                side,
                spent: &pair.to,
                received: &pair.from,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LegPrices {
    spent_usd: f64,
    received_usd: f64,
}

/// What is known about a decision so far; used to fill in FAILED rows.
#[derive(Debug, Default)]
struct Progress {
    stage: Option<ExecutionStage>,
    prices: Option<LegPrices>,
    transaction_hash: Option<String>,
}

impl Progress {
    fn enter(&mut self, stage: ExecutionStage) {
        debug!("Entering {}", stage);
        self.stage = Some(stage);
    }

    fn stage(&self) -> ExecutionStage {
        self.stage.unwrap_or(ExecutionStage::Pending)
    }
}

struct Recorded {
    transaction: Transaction,
    position: Position,
    details: SwapDetails,
}

pub struct TradeExecutor {
    swap_client: Arc<dyn SwapClient>,
    positions: Arc<dyn PositionStore>,
    transactions: Arc<dyn TransactionStore>,
    validator: TradeValidator,
    retry_policy: RetryPolicy,
}

impl TradeExecutor {
    pub fn new(
        swap_client: Arc<dyn SwapClient>,
        positions: Arc<dyn PositionStore>,
        transactions: Arc<dyn TransactionStore>,
        validator: TradeValidator,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            swap_client,
            positions,
            transactions,
            validator,
            retry_policy,
        }
    }

    /// Executes every actionable decision concurrently. Decisions with
    /// neither flag set produce no result.
    pub async fn execute_decisions(
        &self,
        decisions: &[TradeDecision],
        ctx: ExecutionContext<'_>,
    ) -> Vec<TradeResult> {
        let actionable: Vec<&TradeDecision> = decisions.iter().filter(|d| d.is_actionable()).collect();
        if actionable.is_empty() {
            debug!("No actionable decisions this cycle");
            return vec![];
        }
        info!(
            "Executing {} of {} decisions ({} mode)",
            actionable.len(),
            decisions.len(),
            if ctx.is_paper_trading { "paper" } else { "live" }
        );

        join_all(actionable.into_iter().map(|d| self.execute_decision(d, ctx))).await
    }

    pub async fn execute_decision(&self, decision: &TradeDecision, ctx: ExecutionContext<'_>) -> TradeResult {
        let mut progress = Progress::default();
        let label = decision.token_pair.as_ref().map(|p| p.label());

        match self.run(decision, ctx, &mut progress).await {
            Ok(recorded) => {
                info!(
                    "{} {} succeeded: {} -> {} at {} (tx {})",
                    recorded.transaction.side.as_str(),
                    label.as_deref().unwrap_or("?"),
                    recorded.details.amount_in,
                    recorded.details.amount_out,
                    recorded
                        .details
                        .execution_price()
                        .map(|price| format!("{:.6}", price))
                        .unwrap_or_else(|| "-".to_string()),
                    if recorded.transaction.is_paper_trade() {
                        "paper"
                    } else {
                        recorded.transaction.transaction_hash.as_deref().unwrap_or("-")
                    }
                );
                TradeResult {
                    pair: label,
                    side: Some(recorded.transaction.side),
                    stage: ExecutionStage::Succeeded,
                    failed_during: None,
                    transaction_id: Some(recorded.transaction.id),
                    position_id: Some(recorded.position.id),
                    transaction_hash: recorded.transaction.transaction_hash,
                    amount_in: Some(recorded.details.amount_in.to_string()),
                    amount_out: Some(recorded.details.amount_out.to_string()),
                    realized_pnl_usd: recorded.transaction.profit_loss_usd,
                    error: None,
                }
            }
            Err(e) => {
                let failed_during = progress.stage();
                let subject = label.as_deref().unwrap_or("decision");
                match e.severity() {
                    ErrorSeverity::Critical => error!(
                        "[{}] {} failed during {}: {}",
                        e.error_code(),
                        subject,
                        failed_during,
                        e
                    ),
                    ErrorSeverity::Minor | ErrorSeverity::Moderate => warn!(
                        "[{}] {} failed during {}: {}",
                        e.error_code(),
                        subject,
                        failed_during,
                        e
                    ),
                }
                let transaction_id = self.record_failure(decision, &progress, &e).await;
                TradeResult {
                    pair: label,
                    side: decision.side(),
                    stage: ExecutionStage::Failed,
                    failed_during: Some(failed_during),
                    transaction_id,
                    position_id: None,
                    transaction_hash: progress.transaction_hash,
                    amount_in: None,
                    amount_out: None,
                    realized_pnl_usd: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn run(
        &self,
        decision: &TradeDecision,
        ctx: ExecutionContext<'_>,
        progress: &mut Progress,
    ) -> Result<Recorded, TradeExecutionError> {
        progress.enter(ExecutionStage::Pending);
        let pair = decision
            .token_pair
            .as_ref()
            .ok_or(TradeExecutionError::MissingTokenPair)?;
        let assignment_id = decision
            .strategy_assignment_id
            .as_deref()
            .ok_or(TradeExecutionError::MissingStrategyAssignment)?;
        let side = decision.side().ok_or_else(|| TradeExecutionError::InvalidAmount {
            reason: "decision is not actionable".to_string(),
        })?;
        let legs = Legs::new(pair, side);
        let position = match side {
            TransactionSide::Sell => Some(decision.position.as_ref().ok_or_else(|| {
                TradeExecutionError::MissingPosition { pair: pair.label() }
            })?),
            TransactionSide::Buy => None,
        };

        progress.enter(ExecutionStage::Validating);
        let prices = resolve_prices(&legs, ctx.price_history)?;
        progress.prices = Some(prices);
        self.validate(decision.amount, &legs, prices, ctx.price_history)?;

        progress.enter(ExecutionStage::Executing);
        let (hash, details) = if ctx.is_paper_trading {
            progress.transaction_hash = Some(PAPER_TRADE_TX_HASH.to_string());
            let details = paper_swap_details(
                decision.amount,
                legs.spent,
                prices.spent_usd,
                legs.received,
                prices.received_usd,
            )?;
            (PAPER_TRADE_TX_HASH.to_string(), details)
        } else {
            let (hash, confirmation) = self.swap_with_retry(decision.amount, &legs, progress).await?;
            let details =
                extract_swap_details(&confirmation, ctx.wallet_public_key, legs.spent, legs.received)?;
            (hash, details)
        };

        progress.enter(ExecutionStage::Recording);
        match position {
            None => self.record_open(assignment_id, &legs, prices, hash, details).await,
            Some(position) => {
                self.record_close(assignment_id, &legs, prices, position, hash, details)
                    .await
            }
        }
    }

    fn validate(
        &self,
        amount: f64,
        legs: &Legs<'_>,
        prices: LegPrices,
        price_history: &PriceHistorySnapshot,
    ) -> Result<(), TradeExecutionError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(TradeExecutionError::InvalidAmount {
                reason: format!("{} {}", amount, legs.spent.symbol),
            });
        }

        let destination = price_history.token_with_price(legs.received);
        let liquidity_usd = destination.liquidity_usd();
        let amount_usd = amount * prices.spent_usd;
        let expected_slippage_percent = destination
            .market
            .as_ref()
            .and_then(|m| m.expected_slippage_percent)
            .unwrap_or_else(|| {
                if liquidity_usd > 0.0 {
                    amount_usd / liquidity_usd * 100.0
                } else {
                    100.0
                }
            });

        let params = TradeParameters {
            trade_amount_sol: sol_equivalent(amount, legs.spent, prices.spent_usd, price_history),
            liquidity_usd,
            volume_24h_usd: destination.volume_24h_usd(),
            expected_slippage_percent,
            trust_score: destination.trust_score(),
        };

        let result = self.validator.validate_trade_parameters(&params);
        if !result.is_valid {
            return Err(TradeExecutionError::ValidationFailed {
                reason: result.reason.unwrap_or_default(),
            });
        }

        let result = self.validator.validate_position_size(amount_usd, liquidity_usd);
        if !result.is_valid {
            return Err(TradeExecutionError::PositionSizeRejected {
                reason: result.reason.unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// Submits the swap, then polls for the resulting signature. The swap
    /// is re-sent only when the gateway never accepted it; once a signature
    /// exists, later attempts look up that signature and nothing else.
    async fn swap_with_retry(
        &self,
        amount: f64,
        legs: &Legs<'_>,
        progress: &mut Progress,
    ) -> Result<(String, TransactionConfirmation), TradeExecutionError> {
        let operation = format!("swap {} {}", legs.side.as_str(), legs.pair.label());

        let hash = self
            .attempt_with_retry(
                &format!("submit {}", operation),
                TradeExecutionError::is_resubmittable,
                || self.submit(amount, legs),
            )
            .await?;
        progress.transaction_hash = Some(hash.clone());

        let confirmation = self
            .attempt_with_retry(
                &format!("confirm {}", operation),
                TradeExecutionError::is_recoverable,
                || self.confirm(&hash),
            )
            .await?;
        Ok((hash, confirmation))
    }

    /// Runs `attempt` under the retry policy, bounding each try by the
    /// attempt timeout.
    async fn attempt_with_retry<T, F, Fut>(
        &self,
        operation: &str,
        is_retryable: fn(&TradeExecutionError) -> bool,
        mut attempt: F,
    ) -> Result<T, TradeExecutionError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TradeExecutionError>>,
    {
        let timeout = self.retry_policy.attempt_timeout;
        let outcome = retry_with_backoff(operation, &self.retry_policy, is_retryable, |n| {
            debug!("{} attempt {}", operation, n);
            let pending = attempt();
            async move {
                match tokio::time::timeout(timeout, pending).await {
                    Ok(result) => result,
                    Err(_) => Err(TradeExecutionError::AttemptTimedOut {
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                }
            }
        })
        .await;

        outcome.map_err(|e| match e {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => TradeExecutionError::RetriesExhausted {
                attempts,
                last_error: last_error.to_string(),
            },
            permanent => permanent.into_inner(),
        })
    }

    async fn submit(&self, amount: f64, legs: &Legs<'_>) -> Result<String, TradeExecutionError> {
        self.swap_client
            .trade(&legs.spent.address, amount, &legs.received.address)
            .await
            .map_err(swap_error)
    }

    async fn confirm(&self, hash: &str) -> Result<TransactionConfirmation, TradeExecutionError> {
        let pending = || TradeExecutionError::ConfirmationPending {
            hash: hash.to_string(),
        };
        let confirmation = self
            .swap_client
            .get_transaction(hash)
            .await
            .map_err(|e| match swap_error(e) {
                TradeExecutionError::SwapSubmissionFailed { .. } => pending(),
                other => other,
            })?
            .ok_or_else(pending)?;

        if let Some(reason) = &confirmation.error {
            return Err(TradeExecutionError::ConfirmationFailed {
                hash: hash.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(confirmation)
    }

    async fn record_open(
        &self,
        assignment_id: &str,
        legs: &Legs<'_>,
        prices: LegPrices,
        hash: String,
        details: SwapDetails,
    ) -> Result<Recorded, TradeExecutionError> {
        let (position, transaction) = self
            .positions
            .open(
                NewPosition {
                    strategy_assignment_id: assignment_id.to_string(),
                    base_token: TokenDescriptor::from(legs.received),
                    quote_token: TokenDescriptor::from(legs.spent),
                    entry_price: prices.received_usd,
                    total_base_amount: details.amount_out.clone(),
                },
                transaction_row(
                    assignment_id,
                    None,
                    legs,
                    TransactionStatus::Open,
                    &details,
                    prices,
                    None,
                    Some(hash),
                    None,
                ),
            )
            .await
            .map_err(persistence_error)?;

        Ok(Recorded {
            transaction,
            position,
            details,
        })
    }

    async fn record_close(
        &self,
        assignment_id: &str,
        legs: &Legs<'_>,
        prices: LegPrices,
        position: &Position,
        hash: String,
        details: SwapDetails,
    ) -> Result<Recorded, TradeExecutionError> {
        let entry_amount = position
            .base_amount()
            .map_err(|e| TradeExecutionError::InvalidAmount {
                reason: format!("position {} base amount: {}", position.id, e),
            })?
            .to_f64();
        let exit_amount = details.amount_in.to_f64();
        let exit_price = prices.spent_usd;

        let pnl = PnL::realized(entry_amount, position.entry_price, exit_amount, exit_price).map_err(|e| {
            TradeExecutionError::InvalidAmount {
                reason: format!("realized P&L: {}", e),
            }
        })?;
        let percentage = pnl.percentage_of(entry_amount * position.entry_price);

        let (closed, transaction) = self
            .positions
            .close(
                &position.id,
                ClosePosition {
                    exit_price,
                    realized_pnl_usd: pnl.value(),
                    closed_at: Utc::now(),
                },
                transaction_row(
                    assignment_id,
                    Some(position.id.clone()),
                    legs,
                    TransactionStatus::Closed,
                    &details,
                    prices,
                    Some((pnl.value(), percentage)),
                    Some(hash),
                    None,
                ),
            )
            .await
            .map_err(persistence_error)?;

        info!(
            "Closed position {} on {}: realized {} ({:.2}%)",
            closed.id,
            legs.pair.label(),
            pnl,
            percentage
        );

        Ok(Recorded {
            transaction,
            position: closed,
            details,
        })
    }

    /// Writes the FAILED row when the decision identifies a pair and an
    /// assignment. Returns the transaction id if a row was written.
    async fn record_failure(
        &self,
        decision: &TradeDecision,
        progress: &Progress,
        failure: &TradeExecutionError,
    ) -> Option<String> {
        let (Some(pair), Some(assignment_id)) = (
            decision.token_pair.as_ref(),
            decision.strategy_assignment_id.as_deref(),
        ) else {
            error!(
                "Not recording failed trade, decision lacks tokenPair or strategyAssignmentId: {}",
                failure
            );
            return None;
        };

        let legs = Legs::new(pair, decision.side().unwrap_or(TransactionSide::Buy));
        let amount_in = Quantity::from_ui(decision.amount, legs.spent.decimals)
            .map(|q| q.to_string())
            .unwrap_or_else(|_| decision.amount.to_string());
        let prices = progress.prices.unwrap_or(LegPrices {
            spent_usd: 0.0,
            received_usd: 0.0,
        });

        let mut row = transaction_row(
            assignment_id,
            decision.position.as_ref().map(|p| p.id.clone()),
            &legs,
            TransactionStatus::Failed,
            &SwapDetails {
                amount_in: Quantity::zero(),
                amount_out: Quantity::zero(),
                fee_lamports: 0,
            },
            prices,
            None,
            progress.transaction_hash.clone(),
            Some(failure.to_string()),
        );
        row.amount_in = amount_in;

        match self.transactions.create(row).await {
            Ok(transaction) => Some(transaction.id),
            Err(e) => {
                error!("Failed to record FAILED transaction for {}: {}", pair.label(), e);
                None
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn transaction_row(
    assignment_id: &str,
    position_id: Option<String>,
    legs: &Legs<'_>,
    status: TransactionStatus,
    details: &SwapDetails,
    prices: LegPrices,
    pnl: Option<(f64, f64)>,
    transaction_hash: Option<String>,
    failure_reason: Option<String>,
) -> NewTransaction {
    NewTransaction {
        strategy_assignment_id: assignment_id.to_string(),
        position_id,
        side: legs.side,
        status,
        from_token_address: legs.spent.address.clone(),
        from_token_symbol: legs.spent.symbol.clone(),
        from_token_decimals: legs.spent.decimals,
        to_token_address: legs.received.address.clone(),
        to_token_symbol: legs.received.symbol.clone(),
        to_token_decimals: legs.received.decimals,
        amount_in: details.amount_in.to_string(),
        amount_out: details.amount_out.to_string(),
        from_price_usd: prices.spent_usd,
        to_price_usd: prices.received_usd,
        fee_lamports: i64::try_from(details.fee_lamports).unwrap_or(i64::MAX),
        profit_loss_usd: pnl.map(|(usd, _)| usd),
        profit_loss_percentage: pnl.map(|(_, pct)| pct),
        transaction_hash,
        failure_reason,
    }
}

fn resolve_prices(legs: &Legs<'_>, history: &PriceHistorySnapshot) -> Result<LegPrices, TradeExecutionError> {
    let price_of = |token: &Token| {
        history
            .latest_price(&token.address)
            .ok_or_else(|| TradeExecutionError::MissingPriceHistory {
                symbol: token.symbol.clone(),
                address: token.address.clone(),
            })
    };
    Ok(LegPrices {
        spent_usd: price_of(legs.spent)?,
        received_usd: price_of(legs.received)?,
    })
}

/// Trade size in SOL. Falls back to the raw amount when SOL is not priced
/// in this cycle.
fn sol_equivalent(amount: f64, spent: &Token, spent_usd: f64, history: &PriceHistorySnapshot) -> f64 {
    if spent.is_wrapped_sol() {
        return amount;
    }
    match history.latest_price(WRAPPED_SOL_MINT) {
        Some(sol_usd) if sol_usd > 0.0 => amount * spent_usd / sol_usd,
        _ => {
            debug!(
                "SOL price not in price history; checking {} {} against the SOL minimum as-is",
                amount, spent.symbol
            );
            amount
        }
    }
}

fn swap_error(e: ProviderError) -> TradeExecutionError {
    if e.is_transient() {
        TradeExecutionError::SwapSubmissionFailed { reason: e.to_string() }
    } else {
        TradeExecutionError::SwapRejected { reason: e.to_string() }
    }
}

fn persistence_error(e: impl std::fmt::Display) -> TradeExecutionError {
    TradeExecutionError::PersistenceFailed { reason: e.to_string() }
}
