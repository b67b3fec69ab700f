/// An indicator computed over a series of closing prices, oldest first.
pub trait Indicator {
    fn calculate(&self, closes: &[f64]) -> Vec<f64>;
}

/// Relative Strength Index with Wilder smoothing.
///
/// The first average gain/loss is the simple mean of the first `period`
/// changes; every later average is `(prev * (period - 1) + current) / period`.
/// One value is produced per bar from index `period` onwards, so a series of
/// fewer than `period + 1` closes yields nothing.
pub struct RSI {
    pub period: usize,
}

impl RSI {
    pub fn new(period: usize) -> Self {
        RSI { period }
    }

    /// Most recent RSI value, or `None` when the series is too short or
    /// contains non-finite prices.
    pub fn latest(&self, closes: &[f64]) -> Option<f64> {
        self.calculate(closes).last().copied().filter(|v| v.is_finite())
    }

    fn value_from(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            // Flat series sits at the midpoint; only gains pins to 100.
            return if avg_gain == 0.0 { 50.0 } else { 100.0 };
        }
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

impl Indicator for RSI {
    fn calculate(&self, closes: &[f64]) -> Vec<f64> {
        if self.period == 0 || closes.len() < self.period + 1 {
            return vec![];
        }
        if closes.iter().any(|c| !c.is_finite()) {
            return vec![];
        }

        let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let period = self.period as f64;

        let (first_gain, first_loss) =
            changes[..self.period]
                .iter()
                .fold((0.0, 0.0), |(gain, loss), &change| {
                    if change > 0.0 {
                        (gain + change, loss)
                    } else {
                        (gain, loss - change)
                    }
                });
        let mut avg_gain = first_gain / period;
        let mut avg_loss = first_loss / period;

        let mut rsi_values = Vec::with_capacity(changes.len() - self.period + 1);
        rsi_values.push(Self::value_from(avg_gain, avg_loss));

        for &change in &changes[self.period..] {
            let gain = change.max(0.0);
            let loss = (-change).max(0.0);
            avg_gain = (avg_gain * (period - 1.0) + gain) / period;
            avg_loss = (avg_loss * (period - 1.0) + loss) / period;
            rsi_values.push(Self::value_from(avg_gain, avg_loss));
        }

        rsi_values
    }
}
