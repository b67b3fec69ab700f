use tracing::{debug, info};

use crate::domain::entities::decision::TradeDecision;
use crate::domain::entities::portfolio::Portfolio;
use crate::domain::entities::price_history::PriceHistorySnapshot;
use crate::domain::entities::strategy::{AgentStrategyAssignment, RsiConfig, StrategyType};
use crate::domain::entities::token::TokenPair;
use crate::domain::services::indicators::RSI;
use crate::domain::services::position_sizer::PositionSizer;
use crate::domain::value_objects::interval::TimeInterval;

/// Operator overrides applied after the normal signal rule. Forcing an open
/// only takes effect when no position is open, forcing a close only when one
/// is, so the two never fire together for the same pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForceOverrides {
    pub force_open: bool,
    pub force_close: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiSignal {
    pub current_rsi: Option<f64>,
    pub has_open_position: bool,
    pub should_open: bool,
    pub should_close: bool,
    pub open_proximity: f64,
    pub close_proximity: f64,
}

fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Threshold rule on an already computed RSI value. `None` (too little
/// history) never signals.
pub fn evaluate_rsi(current_rsi: Option<f64>, has_open_position: bool, cfg: &RsiConfig) -> RsiSignal {
    let Some(rsi) = current_rsi.filter(|v| v.is_finite()) else {
        return RsiSignal {
            current_rsi: None,
            has_open_position,
            should_open: false,
            should_close: false,
            open_proximity: 0.0,
            close_proximity: 0.0,
        };
    };

    let open_proximity = if has_open_position || cfg.over_sold <= 0.0 {
        0.0
    } else {
        clamp01((cfg.over_sold - rsi) / cfg.over_sold)
    };
    let close_proximity = if !has_open_position || cfg.over_bought >= 100.0 {
        0.0
    } else {
        clamp01((rsi - cfg.over_bought) / (100.0 - cfg.over_bought))
    };

    RsiSignal {
        current_rsi: Some(rsi),
        has_open_position,
        should_open: !has_open_position && rsi < cfg.over_sold,
        should_close: has_open_position && rsi > cfg.over_bought,
        open_proximity,
        close_proximity,
    }
}

impl RsiSignal {
    pub fn with_overrides(mut self, overrides: ForceOverrides) -> Self {
        if overrides.force_open && !self.has_open_position {
            self.should_open = true;
        }
        if overrides.force_close && self.has_open_position {
            self.should_close = true;
        }
        self
    }
}

/// Everything a strategy needs to decide on one pair.
pub struct PairInput<'a> {
    pub pair: &'a TokenPair,
    pub assignment: &'a AgentStrategyAssignment,
    pub portfolio: &'a Portfolio,
    pub price_history: &'a PriceHistorySnapshot,
}

pub trait Strategy {
    fn evaluate_pair(&self, input: &PairInput<'_>) -> TradeDecision;
}

pub struct RsiStrategy {
    pub config: RsiConfig,
    pub interval: TimeInterval,
    pub overrides: ForceOverrides,
    sizer: PositionSizer,
}

impl RsiStrategy {
    pub fn new(config: RsiConfig, interval: TimeInterval, overrides: ForceOverrides) -> Self {
        RsiStrategy {
            config,
            interval,
            overrides,
            sizer: PositionSizer::new(),
        }
    }

    fn describe(
        &self,
        pair: &TokenPair,
        from_price: Option<f64>,
        to_price: Option<f64>,
        signal: &RsiSignal,
        amount: f64,
    ) -> String {
        let price = |p: Option<f64>| p.map_or_else(|| "n/a".to_string(), |v| format!("${}", v));
        let rsi = signal
            .current_rsi
            .map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v));
        format!(
            "RSI {} {}: {}={} {}={} rsi={} overSold={} overBought={} hasOpenPosition={} shouldOpen={} shouldClose={} openProximity={:.3} closeProximity={:.3} amount={}",
            self.interval,
            pair.label(),
            pair.from.symbol,
            price(from_price),
            pair.to.symbol,
            price(to_price),
            rsi,
            self.config.over_sold,
            self.config.over_bought,
            signal.has_open_position,
            signal.should_open,
            signal.should_close,
            signal.open_proximity,
            signal.close_proximity,
            amount
        )
    }
}

impl Strategy for RsiStrategy {
    fn evaluate_pair(&self, input: &PairInput<'_>) -> TradeDecision {
        let pair = input.pair;
        let to_history = input.price_history.get(&pair.to.address);
        let closes = to_history.map(|h| h.closes()).unwrap_or_default();
        let current_rsi = RSI::new(self.config.length).latest(&closes);
        if current_rsi.is_none() {
            debug!(
                "Not enough price history for {} ({} bars, need {})",
                pair.label(),
                closes.len(),
                self.config.length + 1
            );
        }

        let position = input.portfolio.open_position_for(pair);
        let signal = evaluate_rsi(current_rsi, position.is_some(), &self.config)
            .with_overrides(self.overrides);

        let amount = if signal.should_close {
            position
                .and_then(|p| p.base_amount().ok())
                .map(|q| q.to_f64())
                .unwrap_or(0.0)
        } else {
            self.sizer.calculate_trade_amount(
                input.portfolio,
                pair,
                input.assignment.config().max_portfolio_allocation,
            )
        };

        let description = self.describe(
            pair,
            input.price_history.latest_price(&pair.from.address),
            input.price_history.latest_price(&pair.to.address),
            &signal,
            amount,
        );

        TradeDecision {
            should_open: signal.should_open,
            should_close: signal.should_close,
            token_pair: Some(pair.clone()),
            amount,
            strategy_assignment_id: Some(input.assignment.id.clone()),
            description,
            position: if signal.should_close { position.cloned() } else { None },
            has_open_position: signal.has_open_position,
            open_proximity: signal.open_proximity,
            close_proximity: signal.close_proximity,
            current_rsi: signal.current_rsi,
        }
    }
}

/// Evaluates every configured pair in order. Pairs are independent.
pub fn evaluate_strategy(
    assignment: &AgentStrategyAssignment,
    portfolio: &Portfolio,
    price_history: &PriceHistorySnapshot,
    overrides: ForceOverrides,
) -> Vec<TradeDecision> {
    let config = assignment.config();
    let strategy = match config.strategy_type {
        StrategyType::Rsi => RsiStrategy::new(config.rsi_config, config.time_interval, overrides),
    };

    config
        .token_pairs
        .iter()
        .map(|pair| {
            let decision = strategy.evaluate_pair(&PairInput {
                pair,
                assignment,
                portfolio,
                price_history,
            });
            info!("{}", decision.description);
            decision
        })
        .collect()
}
