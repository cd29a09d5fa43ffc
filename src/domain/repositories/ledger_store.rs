//! Ledger Store Traits
//!
//! This module defines the storage contract the settlement core depends on.
//! A [`LedgerStore`] answers read-only queries directly and hands out a
//! [`UnitOfWork`] for every read-modify-write sequence. Everything done
//! through a unit of work becomes visible together on [`UnitOfWork::commit`],
//! or not at all.
//!
//! ## Contract
//! - Units of work are serialized against each other: a unit of work sees the
//!   state left by the last committed one and nothing partial.
//! - Dropping a unit of work without committing discards its changes.
//! - Transactions are append-only: there is no update or delete.

use crate::domain::entities::investor::Investor;
use crate::domain::entities::stock::Stock;
use crate::domain::entities::transaction::{TradeType, Transaction};
use async_trait::async_trait;
use thiserror::Error;

/// Common result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a ledger backend
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// The backend could not execute a read or write
    #[error("Storage backend failure: {0}")]
    Backend(String),

    /// A write violated a uniqueness or integrity constraint
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// A stored row could not be turned back into an entity
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Failure injected through a test hook
    #[error("Injected failure at {0}")]
    Injected(String),
}

/// Sort direction for transaction listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Filter over the transaction log; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionQuery {
    pub investor_id: Option<String>,
    pub stock_id: Option<String>,
    pub trade_type: Option<TradeType>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl TransactionQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_investor(mut self, investor_id: &str) -> Self {
        self.investor_id = Some(investor_id.to_string());
        self
    }

    pub fn for_stock(mut self, stock_id: &str) -> Self {
        self.stock_id = Some(stock_id.to_string());
        self
    }

    pub fn of_type(mut self, trade_type: TradeType) -> Self {
        self.trade_type = Some(trade_type);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, txn: &Transaction) -> bool {
        self.investor_id
            .as_deref()
            .map_or(true, |id| txn.investor_id == id)
            && self.stock_id.as_deref().map_or(true, |id| txn.stock_id == id)
            && self.trade_type.map_or(true, |t| txn.trade_type == t)
    }
}

/// Read-only access to the ledger plus the entry point for atomic writes
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Open a unit of work. Blocks until no other unit of work is active.
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;

    async fn find_investor(&self, id: &str) -> StoreResult<Option<Investor>>;

    async fn list_investors(&self) -> StoreResult<Vec<Investor>>;

    async fn find_stock(&self, id: &str) -> StoreResult<Option<Stock>>;

    async fn list_stocks(&self) -> StoreResult<Vec<Stock>>;

    async fn list_transactions(&self, query: &TransactionQuery) -> StoreResult<Vec<Transaction>>;
}

/// Atomic scope over the records touched by one operation
#[async_trait]
pub trait UnitOfWork: Send {
    async fn investor(&mut self, id: &str) -> StoreResult<Option<Investor>>;

    async fn investor_by_name(&mut self, name: &str) -> StoreResult<Option<Investor>>;

    async fn stock(&mut self, id: &str) -> StoreResult<Option<Stock>>;

    async fn stock_by_name(&mut self, name: &str) -> StoreResult<Option<Stock>>;

    /// Insert or replace the investor, including its portfolio
    async fn save_investor(&mut self, investor: &Investor) -> StoreResult<()>;

    /// Insert or replace the stock, including its owners
    async fn save_stock(&mut self, stock: &Stock) -> StoreResult<()>;

    async fn append_transaction(&mut self, txn: &Transaction) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Sort and truncate an in-memory listing according to `query`.
///
/// `transactions` must already be in append order; ties on timestamp keep it.
pub fn apply_query(mut transactions: Vec<Transaction>, query: &TransactionQuery) -> Vec<Transaction> {
    transactions.retain(|txn| query.matches(txn));
    transactions.sort_by_key(|txn| txn.timestamp);
    if query.order == SortOrder::Descending {
        transactions.reverse();
    }
    if let Some(limit) = query.limit {
        transactions.truncate(limit);
    }
    transactions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{price::Price, quantity::Quantity};
    use chrono::{Duration, Utc};

    fn txn(investor: &str, stock: &str, trade_type: TradeType, offset_secs: i64) -> Transaction {
        let mut txn = Transaction::record(
            investor,
            stock,
            trade_type,
            Quantity::new(1).unwrap(),
            Price::new(10.0).unwrap(),
        );
        txn.timestamp = Utc::now() + Duration::seconds(offset_secs);
        txn
    }

    #[test]
    fn test_query_matches_combined_filters() {
        let query = TransactionQuery::all()
            .for_investor("a")
            .of_type(TradeType::Sell);
        assert!(query.matches(&txn("a", "s", TradeType::Sell, 0)));
        assert!(!query.matches(&txn("a", "s", TradeType::Buy, 0)));
        assert!(!query.matches(&txn("b", "s", TradeType::Sell, 0)));
    }

    #[test]
    fn test_apply_query_orders_and_limits() {
        let log = vec![
            txn("a", "s1", TradeType::Buy, 0),
            txn("a", "s2", TradeType::Buy, 10),
            txn("b", "s1", TradeType::Sell, 20),
        ];

        let asc = apply_query(log.clone(), &TransactionQuery::all());
        assert_eq!(asc[0].stock_id, "s1");
        assert_eq!(asc[2].investor_id, "b");

        let desc = apply_query(log.clone(), &TransactionQuery::all().newest_first().limit(2));
        assert_eq!(desc.len(), 2);
        assert_eq!(desc[0].investor_id, "b");
        assert_eq!(desc[1].stock_id, "s2");

        let by_stock = apply_query(log, &TransactionQuery::all().for_stock("s1"));
        assert_eq!(by_stock.len(), 2);
    }

    #[test]
    fn test_apply_query_keeps_append_order_on_ties() {
        let first = txn("a", "s1", TradeType::Buy, 0);
        let mut second = txn("a", "s2", TradeType::Buy, 0);
        second.timestamp = first.timestamp;
        let listed = apply_query(vec![first, second], &TransactionQuery::all());
        assert_eq!(listed[0].stock_id, "s1");
        assert_eq!(listed[1].stock_id, "s2");
    }
}
