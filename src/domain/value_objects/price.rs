use crate::domain::errors::ValidationError;
use serde::{Deserialize, Serialize};

/// Rounds a currency amount to two decimal places, half away from zero.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Price of one share. Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if value <= 0.0 {
            return Err(ValidationError::InvalidPrice(format!(
                "price must be positive, got {}",
                value
            )));
        }
        Ok(Price(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Total cost of `shares` at this price, rounded to cents.
    pub fn total_for(&self, shares: u64) -> f64 {
        round_to_cents(self.0 * shares as f64)
    }
}

impl TryFrom<f64> for Price {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Price::new(value)
    }
}

impl From<Price> for f64 {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_new_valid() {
        let price = Price::new(100.0);
        assert!(price.is_ok());
        assert_eq!(price.unwrap().value(), 100.0);
    }

    #[test]
    fn test_price_new_negative() {
        let price = Price::new(-10.0);
        assert!(matches!(price, Err(ValidationError::InvalidPrice(_))));
    }

    #[test]
    fn test_price_new_zero() {
        assert!(Price::new(0.0).is_err());
    }

    #[test]
    fn test_price_new_nan() {
        assert_eq!(Price::new(f64::NAN), Err(ValidationError::MustBeFinite));
    }

    #[test]
    fn test_price_total_for() {
        let price = Price::new(101.0).unwrap();
        assert_eq!(price.total_for(10), 1010.0);
        let price = Price::new(0.1).unwrap();
        assert_eq!(price.total_for(3), 0.3);
    }

    #[test]
    fn test_round_to_cents() {
        assert_eq!(round_to_cents(101.00000000000001), 101.0);
        assert_eq!(round_to_cents(99.994), 99.99);
        assert_eq!(round_to_cents(0.125), 0.13);
    }

    #[test]
    fn test_price_serde_rejects_non_positive() {
        let ok: Price = serde_json::from_str("12.5").unwrap();
        assert_eq!(ok.value(), 12.5);
        assert!(serde_json::from_str::<Price>("-1.0").is_err());
    }
}
