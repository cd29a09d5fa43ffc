//! Database Models
//!
//! Row shapes for the ledger tables and their conversion into domain entities.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::domain::entities::investor::{Investor, PortfolioEntry};
use crate::domain::entities::stock::{OwnerEntry, Stock};
use crate::domain::entities::transaction::{TradeType, Transaction};
use crate::domain::repositories::ledger_store::StoreError;
use crate::domain::value_objects::price::Price;

/// Investor record in database
#[derive(Debug, Clone, FromRow)]
pub struct InvestorRecord {
    pub id: String,
    pub name: String,
    pub balance: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Portfolio entry record in database
#[derive(Debug, Clone, FromRow)]
pub struct PortfolioEntryRecord {
    pub investor_id: String,
    pub stock_id: String,
    pub shares: i64,
}

/// Stock record in database
#[derive(Debug, Clone, FromRow)]
pub struct StockRecord {
    pub id: String,
    pub name: String,
    pub price_per_share: f64,
    pub shares: i64,
    pub total_shares: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stock owner record in database
#[derive(Debug, Clone, FromRow)]
pub struct StockOwnerRecord {
    pub stock_id: String,
    pub investor_id: String,
    pub shares_owned: i64,
}

/// Transaction record in database
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRecord {
    pub seq: i64,
    pub id: String,
    pub investor_id: String,
    pub stock_id: String,
    pub trade_type: String, // "BUY" or "SELL"
    pub shares: i64,
    pub price_per_share: f64,
    pub total: f64,
    pub executed_at: DateTime<Utc>,
}

fn share_count(value: i64, what: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {}: {}", what, value)))
}

impl InvestorRecord {
    pub fn into_investor(self, entries: Vec<PortfolioEntryRecord>) -> Result<Investor, StoreError> {
        let portfolio = entries
            .into_iter()
            .map(|entry| {
                Ok(PortfolioEntry {
                    stock_id: entry.stock_id,
                    shares: share_count(entry.shares, "portfolio shares")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Investor {
            id: self.id,
            name: self.name,
            balance: self.balance,
            portfolio,
            created_at: self.created_at,
        })
    }
}

impl StockRecord {
    pub fn into_stock(self, owners: Vec<StockOwnerRecord>) -> Result<Stock, StoreError> {
        let owners = owners
            .into_iter()
            .map(|owner| {
                Ok(OwnerEntry {
                    investor_id: owner.investor_id,
                    shares_owned: share_count(owner.shares_owned, "owned shares")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let price_per_share = Price::new(self.price_per_share)
            .map_err(|e| StoreError::Corrupt(format!("stock {}: {}", self.id, e)))?;

        Ok(Stock {
            shares: share_count(self.shares, "available shares")?,
            total_shares: share_count(self.total_shares, "issued shares")?,
            id: self.id,
            name: self.name,
            price_per_share,
            owners,
            created_at: self.created_at,
        })
    }
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = StoreError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        let trade_type = record
            .trade_type
            .parse::<TradeType>()
            .map_err(StoreError::Corrupt)?;
        let price_per_share = Price::new(record.price_per_share)
            .map_err(|e| StoreError::Corrupt(format!("transaction {}: {}", record.id, e)))?;

        Ok(Transaction {
            shares: share_count(record.shares, "traded shares")?,
            id: record.id,
            investor_id: record.investor_id,
            stock_id: record.stock_id,
            trade_type,
            price_per_share,
            total: record.total,
            timestamp: record.executed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_record_rejects_negative_inventory() {
        let record = StockRecord {
            id: "s1".to_string(),
            name: "Acme".to_string(),
            price_per_share: 10.0,
            shares: -1,
            total_shares: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(matches!(record.into_stock(vec![]), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_transaction_record_round_trip_fields() {
        let record = TransactionRecord {
            seq: 1,
            id: "t1".to_string(),
            investor_id: "i1".to_string(),
            stock_id: "s1".to_string(),
            trade_type: "SELL".to_string(),
            shares: 3,
            price_per_share: 12.0,
            total: 36.0,
            executed_at: Utc::now(),
        };
        let txn = Transaction::try_from(record).unwrap();
        assert_eq!(txn.trade_type, TradeType::Sell);
        assert_eq!(txn.shares, 3);
        assert_eq!(txn.total, 36.0);
    }

    #[test]
    fn test_transaction_record_unknown_type() {
        let record = TransactionRecord {
            seq: 1,
            id: "t1".to_string(),
            investor_id: "i1".to_string(),
            stock_id: "s1".to_string(),
            trade_type: "HOLD".to_string(),
            shares: 3,
            price_per_share: 12.0,
            total: 36.0,
            executed_at: Utc::now(),
        };
        assert!(Transaction::try_from(record).is_err());
    }
}
