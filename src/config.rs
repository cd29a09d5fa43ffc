use crate::domain::errors::ValidationError;
use crate::domain::services::pricing::{PricingModel, MIN_SHARE_PRICE, PRICE_IMPACT_FACTOR};
use crate::domain::services::registry::ListingDefaults;
use crate::persistence::DatabaseConfig;
use std::str::FromStr;

/// Runtime configuration for the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub database: DatabaseConfig,
    pub default_investor_balance: f64, // Opening balance for new investors
    pub default_stock_price: f64,      // Opening price for newly issued stocks
    pub default_stock_shares: u64,     // Shares issued per new stock
    pub price_impact_factor: f64,      // Price move per share traded (0.001 = 0.1%)
    pub min_share_price: f64,          // Floor applied after selling pressure
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let listing = ListingDefaults::default();
        Self {
            database: DatabaseConfig::default(),
            default_investor_balance: listing.investor_balance,
            default_stock_price: listing.stock_price,
            default_stock_shares: listing.stock_shares,
            price_impact_factor: PRICE_IMPACT_FACTOR,
            min_share_price: MIN_SHARE_PRICE,
        }
    }
}

/// Parse `key` from the environment, keeping `current` when the variable is
/// unset, unparsable or rejected by `accept`.
fn env_override<T>(key: &str, current: T, accept: impl Fn(&T) -> bool, rule: &str) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let Ok(raw) = std::env::var(key) else {
        return current;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if accept(&value) => value,
        Ok(value) => {
            tracing::warn!(
                "Invalid {} value: {} ({}), using default: {}",
                key,
                value,
                rule,
                current
            );
            current
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse {} '{}': {}, using default: {}",
                key,
                raw,
                e,
                current
            );
            current
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database: DatabaseConfig::from_env(),
            default_investor_balance: env_override(
                "DEFAULT_INVESTOR_BALANCE",
                defaults.default_investor_balance,
                |v| v.is_finite() && *v >= 0.0,
                "must be a non-negative amount",
            ),
            default_stock_price: env_override(
                "DEFAULT_STOCK_PRICE",
                defaults.default_stock_price,
                |v| v.is_finite() && *v > 0.0,
                "must be positive",
            ),
            default_stock_shares: env_override(
                "DEFAULT_STOCK_SHARES",
                defaults.default_stock_shares,
                |v| *v > 0,
                "must be at least 1",
            ),
            price_impact_factor: env_override(
                "PRICE_IMPACT_FACTOR",
                defaults.price_impact_factor,
                |v| (0.0..=1.0).contains(v),
                "must be between 0.0 and 1.0",
            ),
            min_share_price: env_override(
                "MIN_SHARE_PRICE",
                defaults.min_share_price,
                |v| v.is_finite() && *v > 0.0,
                "must be positive",
            ),
        }
    }

    /// Reject combinations the ledger cannot run with
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.database.url.trim().is_empty() {
            return Err(ValidationError::InvalidName("DATABASE_URL is empty".to_string()));
        }
        if !self.default_investor_balance.is_finite() || self.default_investor_balance < 0.0 {
            return Err(ValidationError::MustBeNonNegative);
        }
        if self.default_stock_shares == 0 {
            return Err(ValidationError::InvalidQuantity(
                "DEFAULT_STOCK_SHARES must be at least 1".to_string(),
            ));
        }
        if self.default_stock_price < self.min_share_price {
            return Err(ValidationError::InvalidPrice(format!(
                "DEFAULT_STOCK_PRICE {} is below MIN_SHARE_PRICE {}",
                self.default_stock_price, self.min_share_price
            )));
        }
        self.pricing_model().map(|_| ())
    }

    pub fn pricing_model(&self) -> Result<PricingModel, ValidationError> {
        PricingModel::new(self.price_impact_factor, self.min_share_price)
    }

    pub fn listing_defaults(&self) -> ListingDefaults {
        ListingDefaults {
            investor_balance: self.default_investor_balance,
            stock_price: self.default_stock_price,
            stock_shares: self.default_stock_shares,
        }
    }
}
