use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use std::str::FromStr;

use crate::domain::errors::ValidationError;

/// Non-negative token quantity in UI units (raw amount scaled by the token's
/// decimals). Persisted as a decimal string so amounts round-trip exactly.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct Quantity(BigDecimal);

impl Quantity {
    pub fn new(value: BigDecimal) -> Result<Self, ValidationError> {
        if value < BigDecimal::zero() {
            return Err(ValidationError::MustBeNonNegative);
        }
        Ok(Quantity(value))
    }

    pub fn zero() -> Self {
        Quantity(BigDecimal::zero())
    }

    /// Builds a quantity from a floating point UI amount, truncated to the
    /// token's decimals. Goes through the shortest decimal representation of
    /// the float so `0.1` stays `0.1`.
    pub fn from_ui(value: f64, decimals: u8) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        let parsed = BigDecimal::from_str(&value.to_string())
            .map_err(|e| ValidationError::InvalidAmount(e.to_string()))?;
        Quantity::new(parsed.with_scale(i64::from(decimals)).normalized())
    }

    /// Builds a quantity from an on-chain integer amount.
    pub fn from_raw(raw: u64, decimals: u8) -> Result<Self, ValidationError> {
        let scale = 10u64
            .checked_pow(u32::from(decimals))
            .ok_or_else(|| ValidationError::InvalidAmount(format!("decimals {} too large", decimals)))?;
        Quantity::new((BigDecimal::from(raw) / BigDecimal::from(scale)).normalized())
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let parsed = BigDecimal::from_str(value.trim())
            .map_err(|e| ValidationError::InvalidAmount(format!("'{}': {}", value, e)))?;
        Quantity::new(parsed)
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let normalized = self.0.normalized();
        // Whole numbers normalize to a negative scale ("1E+2"); print them in full.
        let (_, scale) = normalized.as_bigint_and_exponent();
        if scale < 0 {
            write!(f, "{}", normalized.with_scale(0))
        } else {
            write!(f, "{}", normalized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_rejects_negative() {
        let result = Quantity::parse("-5");
        assert_eq!(result.unwrap_err(), ValidationError::MustBeNonNegative);
    }

    #[test]
    fn test_quantity_from_raw_scales_by_decimals() {
        let qty = Quantity::from_raw(1_500_000_000, 9).unwrap();
        assert_eq!(qty.to_f64(), 1.5);
        assert_eq!(qty.to_string(), "1.5");
    }

    #[test]
    fn test_quantity_from_ui_truncates_to_decimals() {
        let qty = Quantity::from_ui(0.123456789, 6).unwrap();
        assert_eq!(qty.to_string(), "0.123456");
    }

    #[test]
    fn test_quantity_parse_round_trips_decimal_string() {
        let qty = Quantity::parse("42.125").unwrap();
        assert_eq!(Quantity::parse(&qty.to_string()).unwrap(), qty);
        assert_eq!(qty.to_f64(), 42.125);
    }

    #[test]
    fn test_quantity_from_ui_rejects_nan() {
        assert_eq!(
            Quantity::from_ui(f64::NAN, 6).unwrap_err(),
            ValidationError::MustBeFinite
        );
    }
}
