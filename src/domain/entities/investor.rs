//! Investor entity - cash balance plus the portfolio view of share ownership

use crate::domain::errors::{validate_name, ValidationError};
use crate::domain::value_objects::price::round_to_cents;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whole cents, used to compare currency amounts without float drift.
pub(crate) fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// One holding in an investor's portfolio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub stock_id: String,
    pub shares: u64,
}

/// Account that holds a cash balance and stock holdings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investor {
    pub id: String,
    pub name: String,
    pub balance: f64,
    pub portfolio: Vec<PortfolioEntry>,
    pub created_at: DateTime<Utc>,
}

impl Investor {
    /// Create a new investor with an empty portfolio
    ///
    /// # Arguments
    /// * `name` - Display name, trimmed, 1 to 50 characters
    /// * `balance` - Opening cash balance (>= 0)
    pub fn new(name: &str, balance: f64) -> Result<Self, ValidationError> {
        let name = validate_name(name)?;
        if !balance.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if balance < 0.0 {
            return Err(ValidationError::MustBeNonNegative);
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            balance: round_to_cents(balance),
            portfolio: Vec::new(),
            created_at: Utc::now(),
        })
    }

    pub fn holding(&self, stock_id: &str) -> Option<&PortfolioEntry> {
        self.portfolio.iter().find(|entry| entry.stock_id == stock_id)
    }

    /// Shares held of `stock_id`, zero when there is no entry
    pub fn shares_of(&self, stock_id: &str) -> u64 {
        self.holding(stock_id).map(|entry| entry.shares).unwrap_or(0)
    }

    pub fn can_afford(&self, cost: f64) -> bool {
        to_cents(self.balance) >= to_cents(cost)
    }

    pub fn debit(&mut self, amount: f64) -> Result<(), String> {
        if !self.can_afford(amount) {
            return Err(format!(
                "debit of {:.2} exceeds balance {:.2}",
                amount, self.balance
            ));
        }
        self.balance = round_to_cents(self.balance - amount).max(0.0);
        Ok(())
    }

    pub fn credit(&mut self, amount: f64) {
        self.balance = round_to_cents(self.balance + amount);
    }

    /// Add shares to the holding for `stock_id`, creating it if absent
    pub fn add_shares(&mut self, stock_id: &str, shares: u64) {
        match self
            .portfolio
            .iter_mut()
            .find(|entry| entry.stock_id == stock_id)
        {
            Some(entry) => entry.shares += shares,
            None => self.portfolio.push(PortfolioEntry {
                stock_id: stock_id.to_string(),
                shares,
            }),
        }
    }

    /// Remove shares from the holding for `stock_id`.
    ///
    /// The entry is dropped once it reaches zero. Returns the shares left.
    pub fn remove_shares(&mut self, stock_id: &str, shares: u64) -> Result<u64, String> {
        let index = self
            .portfolio
            .iter()
            .position(|entry| entry.stock_id == stock_id)
            .ok_or_else(|| format!("no portfolio entry for stock {}", stock_id))?;

        let entry = &mut self.portfolio[index];
        if entry.shares < shares {
            return Err(format!(
                "cannot remove {} shares of {}, only {} held",
                shares, stock_id, entry.shares
            ));
        }
        entry.shares -= shares;
        let remaining = entry.shares;
        if remaining == 0 {
            self.portfolio.remove(index);
        }
        Ok(remaining)
    }

    /// Check balance and portfolio invariants
    pub fn validate(&self) -> Result<(), String> {
        if !self.balance.is_finite() || self.balance < 0.0 {
            return Err(format!("balance must be non-negative, got {}", self.balance));
        }
        for (i, entry) in self.portfolio.iter().enumerate() {
            if entry.shares == 0 {
                return Err(format!("portfolio entry for {} has zero shares", entry.stock_id));
            }
            if self.portfolio[..i]
                .iter()
                .any(|other| other.stock_id == entry.stock_id)
            {
                return Err(format!("duplicate portfolio entry for {}", entry.stock_id));
            }
        }
        Ok(())
    }
}
