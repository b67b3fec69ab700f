//! Actual amounts moved by a swap, read from the wallet's balance changes
//! or synthesized from prices for paper trades.

use crate::domain::entities::token::Token;
use crate::domain::repositories::swap_client::TransactionConfirmation;
use crate::domain::services::trade_execution_error::TradeExecutionError;
use crate::domain::value_objects::quantity::Quantity;

const SOL_DECIMALS: u8 = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct SwapDetails {
    pub amount_in: Quantity,
    pub amount_out: Quantity,
    pub fee_lamports: u64,
}

impl SwapDetails {
    /// Units of the spent token paid per unit received.
    pub fn execution_price(&self) -> Option<f64> {
        let out = self.amount_out.to_f64();
        if out > 0.0 {
            Some(self.amount_in.to_f64() / out)
        } else {
            None
        }
    }
}

fn token_delta(confirmation: &TransactionConfirmation, owner: &str, mint: &str) -> i128 {
    confirmation
        .token_balances
        .iter()
        .filter(|b| b.mint == mint && b.owner.as_deref().map_or(true, |o| o == owner))
        .map(|b| b.delta())
        .sum()
}

fn incomplete(reason: String) -> TradeExecutionError {
    TradeExecutionError::SwapDetailsIncomplete { reason }
}

fn to_quantity(raw: i128, decimals: u8) -> Result<Quantity, TradeExecutionError> {
    let raw = u64::try_from(raw).map_err(|_| incomplete(format!("amount {} out of range", raw)))?;
    Quantity::from_raw(raw, decimals).map_err(|e| incomplete(e.to_string()))
}

/// Derives amounts from a confirmed transaction signed by `owner`.
///
/// Wrapped SOL that is unwrapped within the swap never shows up as a token
/// balance; in that case the wallet's lamport change is used, with the
/// transaction fee taken back out.
pub fn extract_swap_details(
    confirmation: &TransactionConfirmation,
    owner: &str,
    spent: &Token,
    received: &Token,
) -> Result<SwapDetails, TradeExecutionError> {
    let fee = i128::from(confirmation.fee_lamports);
    let native = i128::from(confirmation.native_balance_change);

    let mut spent_raw = -token_delta(confirmation, owner, &spent.address);
    let mut spent_decimals = spent.decimals;
    if spent_raw <= 0 && spent.is_wrapped_sol() {
        spent_raw = -native - fee;
        spent_decimals = SOL_DECIMALS;
    }

    let mut received_raw = token_delta(confirmation, owner, &received.address);
    let mut received_decimals = received.decimals;
    if received_raw <= 0 && received.is_wrapped_sol() {
        received_raw = native + fee;
        received_decimals = SOL_DECIMALS;
    }

    if spent_raw <= 0 {
        return Err(incomplete(format!(
            "no {} debit found in transaction {}",
            spent.symbol, confirmation.signature
        )));
    }
    if received_raw <= 0 {
        return Err(incomplete(format!(
            "no {} credit found in transaction {}",
            received.symbol, confirmation.signature
        )));
    }

    Ok(SwapDetails {
        amount_in: to_quantity(spent_raw, spent_decimals)?,
        amount_out: to_quantity(received_raw, received_decimals)?,
        fee_lamports: confirmation.fee_lamports,
    })
}

/// Simulated fill at the given USD prices, no fees.
pub fn paper_swap_details(
    amount: f64,
    spent: &Token,
    spent_price_usd: f64,
    received: &Token,
    received_price_usd: f64,
) -> Result<SwapDetails, TradeExecutionError> {
    if !(received_price_usd > 0.0) {
        return Err(incomplete(format!(
            "cannot simulate fill with {} price {}",
            received.symbol, received_price_usd
        )));
    }
    let out = amount * spent_price_usd / received_price_usd;
    let amount_in = Quantity::from_ui(amount, spent.decimals).map_err(|e| incomplete(e.to_string()))?;
    let amount_out = Quantity::from_ui(out, received.decimals).map_err(|e| incomplete(e.to_string()))?;
    Ok(SwapDetails {
        amount_in,
        amount_out,
        fee_lamports: 0,
    })
}
