//! Volume-driven share pricing
//!
//! Every settled trade moves the price linearly in its signed volume:
//! `new = current * (1 + k * volume)`, rounded to cents. Buys pass a positive
//! volume and push the price up, sells pass a negative one.

use crate::domain::errors::ValidationError;
use crate::domain::value_objects::price::{round_to_cents, Price};

/// Price move per share traded
pub const PRICE_IMPACT_FACTOR: f64 = 0.001;

/// Lowest price a stock can be pushed to by selling
pub const MIN_SHARE_PRICE: f64 = 0.01;

/// Price after a trade of `signed_volume` shares at the default impact factor.
pub fn update_price(current_price: f64, signed_volume: i64) -> f64 {
    adjusted_price(current_price, signed_volume, PRICE_IMPACT_FACTOR)
}

/// Price after a trade of `signed_volume` shares with impact factor `k`.
pub fn adjusted_price(current_price: f64, signed_volume: i64, k: f64) -> f64 {
    round_to_cents(current_price * (1.0 + k * signed_volume as f64))
}

/// Pricing parameters applied by the settlement engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingModel {
    impact_factor: f64,
    min_price: f64,
}

impl Default for PricingModel {
    fn default() -> Self {
        Self {
            impact_factor: PRICE_IMPACT_FACTOR,
            min_price: MIN_SHARE_PRICE,
        }
    }
}

impl PricingModel {
    pub fn new(impact_factor: f64, min_price: f64) -> Result<Self, ValidationError> {
        if !impact_factor.is_finite() || !min_price.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if impact_factor < 0.0 {
            return Err(ValidationError::MustBeNonNegative);
        }
        if min_price <= 0.0 {
            return Err(ValidationError::InvalidPrice(format!(
                "minimum price must be positive, got {}",
                min_price
            )));
        }
        Ok(Self {
            impact_factor,
            min_price,
        })
    }

    /// Post-trade price, never below the configured floor.
    pub fn next_price(&self, current: Price, signed_volume: i64) -> Result<Price, ValidationError> {
        let raw = adjusted_price(current.value(), signed_volume, self.impact_factor);
        if raw < self.min_price {
            tracing::debug!(
                "Price {} clamped to floor {} after volume {}",
                raw,
                self.min_price,
                signed_volume
            );
        }
        Price::new(raw.max(self.min_price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_volume_raises_price() {
        assert_eq!(update_price(100.0, 10), 101.0);
    }

    #[test]
    fn test_sell_volume_lowers_price() {
        assert_eq!(update_price(101.0, -10), 99.99);
    }

    #[test]
    fn test_zero_volume_is_identity() {
        assert_eq!(update_price(123.45, 0), 123.45);
    }

    #[test]
    fn test_result_is_rounded_to_cents() {
        assert_eq!(update_price(10.0, 3), 10.03);
        assert_eq!(update_price(33.33, 7), 33.56);
    }

    #[test]
    fn test_unclamped_formula_can_go_negative() {
        assert!(update_price(10.0, -2000) < 0.0);
    }

    #[test]
    fn test_model_clamps_to_floor() {
        let model = PricingModel::default();
        let price = model.next_price(Price::new(10.0).unwrap(), -2000).unwrap();
        assert_eq!(price.value(), MIN_SHARE_PRICE);
    }

    #[test]
    fn test_model_custom_factor() {
        let model = PricingModel::new(0.01, 1.0).unwrap();
        let price = model.next_price(Price::new(100.0).unwrap(), 5).unwrap();
        assert_eq!(price.value(), 105.0);
    }

    #[test]
    fn test_model_rejects_bad_parameters() {
        assert!(PricingModel::new(-0.1, 0.01).is_err());
        assert!(PricingModel::new(0.001, 0.0).is_err());
        assert!(PricingModel::new(f64::NAN, 0.01).is_err());
    }
}
