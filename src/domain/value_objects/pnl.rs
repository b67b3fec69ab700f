use crate::domain::errors::ValidationError;

/// Profit and Loss value object
///
/// Unlike prices, PnL can be negative to represent losses.
/// This type ensures PnL values are valid (finite) but allows negative values.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct PnL(f64);

impl PnL {
    /// Create a new PnL value
    ///
    /// # Errors
    /// Returns ValidationError::MustBeFinite if the value is NaN or infinite
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        Ok(PnL(value))
    }

    /// Realized PnL of a round trip: exit value minus entry value, both in USD.
    pub fn realized(
        entry_amount: f64,
        entry_price: f64,
        exit_amount: f64,
        exit_price: f64,
    ) -> Result<Self, ValidationError> {
        PnL::new(exit_amount * exit_price - entry_amount * entry_price)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// PnL as a percentage of the cost basis. A zero or non-finite cost basis
    /// yields 0 rather than an infinite percentage.
    pub fn percentage_of(&self, cost_basis: f64) -> f64 {
        if cost_basis == 0.0 || !cost_basis.is_finite() {
            return 0.0;
        }
        self.0 / cost_basis * 100.0
    }
}

impl std::fmt::Display for PnL {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 >= 0.0 {
            write!(f, "+${:.2}", self.0)
        } else {
            write!(f, "-${:.2}", self.0.abs())
        }
    }
}
