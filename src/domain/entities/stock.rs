//! Stock entity - price, unsold inventory and the owners view of share ownership

use crate::domain::errors::{validate_name, ValidationError};
use crate::domain::value_objects::price::{round_to_cents, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One investor's stake in a stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerEntry {
    pub investor_id: String,
    pub shares_owned: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub id: String,
    pub name: String,
    pub price_per_share: Price,
    /// Unsold inventory
    pub shares: u64,
    /// Issued at creation; `shares + sum(owners)` always equals this
    pub total_shares: u64,
    pub owners: Vec<OwnerEntry>,
    pub created_at: DateTime<Utc>,
}

impl Stock {
    /// Issue a new stock with all shares unsold
    pub fn new(name: &str, price_per_share: Price, total_shares: u64) -> Result<Self, ValidationError> {
        let name = validate_name(name)?;
        if total_shares == 0 {
            return Err(ValidationError::InvalidQuantity(
                "a stock must issue at least one share".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            price_per_share,
            shares: total_shares,
            total_shares,
            owners: Vec::new(),
            created_at: Utc::now(),
        })
    }

    pub fn owner(&self, investor_id: &str) -> Option<&OwnerEntry> {
        self.owners.iter().find(|owner| owner.investor_id == investor_id)
    }

    pub fn owned_by(&self, investor_id: &str) -> u64 {
        self.owner(investor_id).map(|owner| owner.shares_owned).unwrap_or(0)
    }

    pub fn shares_held(&self) -> u64 {
        self.owners.iter().map(|owner| owner.shares_owned).sum()
    }

    pub fn market_cap(&self) -> f64 {
        round_to_cents(self.total_shares as f64 * self.price_per_share.value())
    }

    /// Move `shares` from inventory to `investor_id`
    pub fn allocate(&mut self, investor_id: &str, shares: u64) -> Result<(), String> {
        if shares > self.shares {
            return Err(format!(
                "cannot allocate {} shares of {}, only {} available",
                shares, self.name, self.shares
            ));
        }
        self.shares -= shares;
        match self
            .owners
            .iter_mut()
            .find(|owner| owner.investor_id == investor_id)
        {
            Some(owner) => owner.shares_owned += shares,
            None => self.owners.push(OwnerEntry {
                investor_id: investor_id.to_string(),
                shares_owned: shares,
            }),
        }
        Ok(())
    }

    /// Return `shares` held by `investor_id` to inventory, dropping the owner entry at zero
    pub fn release(&mut self, investor_id: &str, shares: u64) -> Result<(), String> {
        let index = self
            .owners
            .iter()
            .position(|owner| owner.investor_id == investor_id)
            .ok_or_else(|| format!("{} has no owner entry for {}", self.name, investor_id))?;

        let owner = &mut self.owners[index];
        if owner.shares_owned < shares {
            return Err(format!(
                "cannot release {} shares from {}, only {} owned",
                shares, investor_id, owner.shares_owned
            ));
        }
        owner.shares_owned -= shares;
        if owner.shares_owned == 0 {
            self.owners.remove(index);
        }
        self.shares += shares;
        Ok(())
    }

    /// Check share conservation and owner entry invariants
    pub fn validate(&self) -> Result<(), String> {
        let held = self.shares_held();
        if held + self.shares != self.total_shares {
            return Err(format!(
                "Invariant violated: available ({}) + owned ({}) != issued ({})",
                self.shares, held, self.total_shares
            ));
        }
        for (i, owner) in self.owners.iter().enumerate() {
            if owner.shares_owned == 0 {
                return Err(format!("owner entry for {} has zero shares", owner.investor_id));
            }
            if self.owners[..i]
                .iter()
                .any(|other| other.investor_id == owner.investor_id)
            {
                return Err(format!("duplicate owner entry for {}", owner.investor_id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock() -> Stock {
        Stock::new("Acme", Price::new(100.0).unwrap(), 1000).unwrap()
    }

    #[test]
    fn test_stock_new() {
        let stock = stock();
        assert_eq!(stock.shares, 1000);
        assert_eq!(stock.total_shares, 1000);
        assert_eq!(stock.market_cap(), 100_000.0);
        assert!(stock.validate().is_ok());
    }

    #[test]
    fn test_stock_new_zero_shares() {
        assert!(Stock::new("Empty", Price::new(1.0).unwrap(), 0).is_err());
    }

    #[test]
    fn test_allocate_and_release_conserve_shares() {
        let mut stock = stock();
        stock.allocate("inv-1", 10).unwrap();
        stock.allocate("inv-1", 5).unwrap();
        stock.allocate("inv-2", 20).unwrap();
        assert_eq!(stock.owners.len(), 2);
        assert_eq!(stock.owned_by("inv-1"), 15);
        assert_eq!(stock.shares, 965);
        assert!(stock.validate().is_ok());

        stock.release("inv-1", 15).unwrap();
        assert!(stock.owner("inv-1").is_none());
        assert_eq!(stock.shares, 980);
        assert!(stock.validate().is_ok());
    }

    #[test]
    fn test_allocate_more_than_available() {
        let mut stock = stock();
        assert!(stock.allocate("inv-1", 1001).is_err());
        assert_eq!(stock.shares, 1000);
        assert!(stock.owners.is_empty());
    }

    #[test]
    fn test_release_errors() {
        let mut stock = stock();
        assert!(stock.release("inv-1", 1).is_err());
        stock.allocate("inv-1", 2).unwrap();
        assert!(stock.release("inv-1", 3).is_err());
        assert_eq!(stock.owned_by("inv-1"), 2);
    }

    #[test]
    fn test_validate_detects_leak() {
        let mut stock = stock();
        stock.allocate("inv-1", 10).unwrap();
        stock.shares += 1;
        assert!(stock.validate().unwrap_err().contains("Invariant violated"));
    }
}
