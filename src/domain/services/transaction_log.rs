//! Transaction log - read side of the append-only trade history
//!
//! Appends only ever happen inside a settlement unit of work; this service
//! exposes the queries.

use crate::domain::entities::transaction::Transaction;
use crate::domain::repositories::ledger_store::{LedgerStore, TransactionQuery};
use crate::domain::services::trade_error::TradeError;
use std::sync::Arc;
use tracing::debug;

pub struct TransactionLog {
    store: Arc<dyn LedgerStore>,
}

impl TransactionLog {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Every settled trade, oldest first
    pub async fn list_all(&self) -> Result<Vec<Transaction>, TradeError> {
        self.list(&TransactionQuery::all()).await
    }

    pub async fn list(&self, query: &TransactionQuery) -> Result<Vec<Transaction>, TradeError> {
        let transactions = self.store.list_transactions(query).await?;
        debug!(
            "Listed {} transactions from {} ({:?})",
            transactions.len(),
            self.store.name(),
            query
        );
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::transaction::TradeType;
    use crate::domain::services::pricing::PricingModel;
    use crate::domain::services::registry::{ListingDefaults, Registry};
    use crate::domain::services::settlement::TradeSettlementEngine;
    use crate::persistence::memory::InMemoryLedger;

    #[tokio::test]
    async fn test_list_filters_combine() {
        let ledger: Arc<dyn LedgerStore> = Arc::new(InMemoryLedger::new());
        let registry = Registry::new(ledger.clone(), ListingDefaults::default());
        let engine = TradeSettlementEngine::new(ledger.clone(), PricingModel::default());
        let log = TransactionLog::new(ledger);

        let alice = registry.register_investor("alice").await.unwrap();
        let bob = registry.register_investor("bob").await.unwrap();
        let acme = registry.issue_stock("Acme").await.unwrap();
        let beta = registry.issue_stock("Beta").await.unwrap();

        engine.buy(&alice.id, &acme.id, 2).await.unwrap();
        engine.buy(&bob.id, &acme.id, 3).await.unwrap();
        engine.buy(&alice.id, &beta.id, 4).await.unwrap();
        engine.sell(&alice.id, &acme.id, 1).await.unwrap();

        assert_eq!(log.list_all().await.unwrap().len(), 4);

        let alice_acme = log
            .list(&TransactionQuery::all().for_investor(&alice.id).for_stock(&acme.id))
            .await
            .unwrap();
        assert_eq!(alice_acme.len(), 2);

        let alice_sells = log
            .list(&TransactionQuery::all().for_investor(&alice.id).of_type(TradeType::Sell))
            .await
            .unwrap();
        assert_eq!(alice_sells.len(), 1);
        assert_eq!(alice_sells[0].shares, 1);

        let newest = log
            .list(&TransactionQuery::all().newest_first().limit(2))
            .await
            .unwrap();
        assert_eq!(newest[0].trade_type, TradeType::Sell);
        assert_eq!(newest[1].stock_id, beta.id);
    }

    #[tokio::test]
    async fn test_listing_does_not_mutate() {
        let ledger: Arc<dyn LedgerStore> = Arc::new(InMemoryLedger::new());
        let registry = Registry::new(ledger.clone(), ListingDefaults::default());
        let engine = TradeSettlementEngine::new(ledger.clone(), PricingModel::default());
        let log = TransactionLog::new(ledger.clone());

        let alice = registry.register_investor("alice").await.unwrap();
        let acme = registry.issue_stock("Acme").await.unwrap();
        engine.buy(&alice.id, &acme.id, 5).await.unwrap();

        let investor = ledger.find_investor(&alice.id).await.unwrap();
        let stock = ledger.find_stock(&acme.id).await.unwrap();
        let first = log.list_all().await.unwrap();
        log.list(&TransactionQuery::all().newest_first().limit(1))
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(log.list_all().await.unwrap(), first);
        assert_eq!(ledger.find_investor(&alice.id).await.unwrap(), investor);
        assert_eq!(ledger.find_stock(&acme.id).await.unwrap(), stock);
    }
}
