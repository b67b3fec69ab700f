//! Pre-trade gates: size, liquidity, volume, slippage, trust and position size.

use tracing::debug;

/// Thresholds applied by [`TradeValidator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradingLimits {
    pub min_trade_amount_sol: f64,
    pub max_position_size_percent: f64,
    pub max_slippage_percent: f64,
    pub min_liquidity_usd: f64,
    pub min_daily_volume_usd: f64,
    pub min_trust_score: f64,
}

impl Default for TradingLimits {
    fn default() -> Self {
        Self {
            min_trade_amount_sol: 0.001,
            max_position_size_percent: 10.0,
            max_slippage_percent: 3.0,
            min_liquidity_usd: 1000.0,
            min_daily_volume_usd: 2000.0,
            min_trust_score: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Observed values for one prospective trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeParameters {
    pub trade_amount_sol: f64,
    pub liquidity_usd: f64,
    pub volume_24h_usd: f64,
    pub expected_slippage_percent: f64,
    pub trust_score: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct TradeValidator {
    limits: TradingLimits,
}

impl TradeValidator {
    pub fn new(limits: TradingLimits) -> Self {
        Self { limits }
    }

    /// Checks run in a fixed order and the first failure is returned.
    pub fn validate_trade_parameters(&self, params: &TradeParameters) -> ValidationResult {
        let limits = &self.limits;

        if !(params.trade_amount_sol >= limits.min_trade_amount_sol) {
            return ValidationResult::invalid(format!(
                "Trade amount too small: {} SOL < minimum {} SOL",
                params.trade_amount_sol, limits.min_trade_amount_sol
            ));
        }

        if !(params.liquidity_usd >= limits.min_liquidity_usd) {
            return ValidationResult::invalid(format!(
                "Insufficient liquidity: ${:.2} < minimum ${:.2}",
                params.liquidity_usd, limits.min_liquidity_usd
            ));
        }

        if !(params.volume_24h_usd >= limits.min_daily_volume_usd) {
            return ValidationResult::invalid(format!(
                "Insufficient 24h volume: ${:.2} < minimum ${:.2}",
                params.volume_24h_usd, limits.min_daily_volume_usd
            ));
        }

        if !(params.expected_slippage_percent <= limits.max_slippage_percent) {
            return ValidationResult::invalid(format!(
                "Expected slippage too high: {:.4}% > maximum {:.4}%",
                params.expected_slippage_percent, limits.max_slippage_percent
            ));
        }

        if let Some(trust_score) = params.trust_score {
            if !(trust_score >= limits.min_trust_score) {
                return ValidationResult::invalid(format!(
                    "Trust score too low: {} < minimum {}",
                    trust_score, limits.min_trust_score
                ));
            }
        }

        debug!("Trade parameters passed validation: {:?}", params);
        ValidationResult::valid()
    }

    /// Rejects trades worth more than `max_position_size_percent` of the
    /// token's liquidity.
    pub fn validate_position_size(&self, amount_usd: f64, liquidity_usd: f64) -> ValidationResult {
        if !(liquidity_usd > 0.0) {
            return ValidationResult::invalid(format!(
                "Position size exceeds liquidity: ${:.2} against ${:.2} liquidity",
                amount_usd, liquidity_usd
            ));
        }

        let percent_of_liquidity = amount_usd / liquidity_usd * 100.0;
        if !(percent_of_liquidity <= self.limits.max_position_size_percent) {
            return ValidationResult::invalid(format!(
                "Position size too large: {:.4}% of liquidity > maximum {:.4}%",
                percent_of_liquidity, self.limits.max_position_size_percent
            ));
        }

        ValidationResult::valid()
    }
}
