//! Trade sizing from wallet holdings and the strategy's allocation cap.

use crate::domain::entities::portfolio::Portfolio;
use crate::domain::entities::token::TokenPair;

#[derive(Debug, Clone, Default)]
pub struct PositionSizer;

impl PositionSizer {
    pub fn new() -> Self {
        Self
    }

    /// Amount of `pair.from` to spend on an opening trade.
    ///
    /// `min(held, max_allocation_percent / 100 * held)`, where `held` is the
    /// wallet's UI amount of the token. A token the wallet does not hold, or a
    /// nonsensical allocation, sizes to 0.
    pub fn calculate_trade_amount(
        &self,
        portfolio: &Portfolio,
        pair: &TokenPair,
        max_allocation_percent: f64,
    ) -> f64 {
        let held = portfolio.ui_amount_of(&pair.from.address);
        self.size_from_holding(held, max_allocation_percent)
    }

    pub fn size_from_holding(&self, held: f64, max_allocation_percent: f64) -> f64 {
        if !held.is_finite() || held <= 0.0 || !max_allocation_percent.is_finite() {
            return 0.0;
        }
        let allocation = (max_allocation_percent / 100.0).max(0.0);
        held.min(allocation * held)
    }
}
