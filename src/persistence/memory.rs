//! In-memory ledger backend
//!
//! State lives behind one `tokio::sync::Mutex`. A unit of work holds the lock
//! for its whole lifetime and stages only what it writes: the investors and
//! stocks it saved plus the transactions it appended. Commit merges those into
//! the shared state; anything else discards them.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::domain::entities::investor::Investor;
use crate::domain::entities::stock::Stock;
use crate::domain::entities::transaction::Transaction;
use crate::domain::repositories::ledger_store::{
    apply_query, LedgerStore, StoreError, StoreResult, TransactionQuery, UnitOfWork,
};

/// Points at which a unit of work can be made to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    SaveInvestor,
    SaveStock,
    AppendTransaction,
    Commit,
}

impl FaultPoint {
    fn as_str(&self) -> &'static str {
        match self {
            FaultPoint::SaveInvestor => "save_investor",
            FaultPoint::SaveStock => "save_stock",
            FaultPoint::AppendTransaction => "append_transaction",
            FaultPoint::Commit => "commit",
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    investors: HashMap<String, Investor>,
    stocks: HashMap<String, Stock>,
    /// Append order
    transactions: Vec<Transaction>,
    transaction_ids: HashSet<String>,
}

/// Writes of one unit of work, not yet visible to anyone else
#[derive(Debug, Default)]
struct StagedWrites {
    investors: HashMap<String, Investor>,
    stocks: HashMap<String, Stock>,
    transactions: Vec<Transaction>,
}

/// Looks `id` up in the staged writes first, then in committed state
fn staged_or_committed<'a, T>(
    staged: &'a HashMap<String, T>,
    committed: &'a HashMap<String, T>,
    id: &str,
) -> Option<&'a T> {
    staged.get(id).or_else(|| committed.get(id))
}

/// Finds a record by name across the staged and committed views. A staged
/// record shadows the committed one with the same id.
fn find_named<'a, T>(
    staged: &'a HashMap<String, T>,
    committed: &'a HashMap<String, T>,
    matches: impl Fn(&T) -> bool,
) -> Option<&'a T> {
    staged.values().find(|record| matches(*record)).or_else(|| {
        committed
            .iter()
            .find(|(id, record)| !staged.contains_key(*id) && matches(*record))
            .map(|(_, record)| record)
    })
}

type FaultSlot = Arc<StdMutex<Option<FaultPoint>>>;

/// Ledger kept entirely in process memory
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    fault: FaultSlot,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next unit of work that reaches `point` fail with
    /// [`StoreError::Injected`]. The fault fires once.
    pub fn fail_on(&self, point: FaultPoint) {
        if let Ok(mut slot) = self.fault.lock() {
            *slot = Some(point);
        }
    }

    /// Number of transactions in the log
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }

    async fn open(&self) -> InMemoryUnitOfWork {
        InMemoryUnitOfWork {
            guard: self.state.clone().lock_owned().await,
            staged: StagedWrites::default(),
            fault: self.fault.clone(),
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    fn name(&self) -> &str {
        "memory"
    }

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(self.open().await))
    }

    async fn find_investor(&self, id: &str) -> StoreResult<Option<Investor>> {
        Ok(self.state.lock().await.investors.get(id).cloned())
    }

    async fn list_investors(&self) -> StoreResult<Vec<Investor>> {
        let state = self.state.lock().await;
        let mut investors: Vec<Investor> = state.investors.values().cloned().collect();
        investors.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(investors)
    }

    async fn find_stock(&self, id: &str) -> StoreResult<Option<Stock>> {
        Ok(self.state.lock().await.stocks.get(id).cloned())
    }

    async fn list_stocks(&self) -> StoreResult<Vec<Stock>> {
        let state = self.state.lock().await;
        let mut stocks: Vec<Stock> = state.stocks.values().cloned().collect();
        stocks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        Ok(stocks)
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> StoreResult<Vec<Transaction>> {
        let log = self.state.lock().await.transactions.clone();
        Ok(apply_query(log, query))
    }
}

struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<LedgerState>,
    staged: StagedWrites,
    fault: FaultSlot,
}

impl InMemoryUnitOfWork {
    fn check_fault(&self, point: FaultPoint) -> StoreResult<()> {
        let mut slot = self
            .fault
            .lock()
            .map_err(|e| StoreError::Backend(format!("fault slot poisoned: {}", e)))?;
        if *slot == Some(point) {
            *slot = None;
            warn!("Injecting failure at {}", point.as_str());
            return Err(StoreError::Injected(point.as_str().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn investor(&mut self, id: &str) -> StoreResult<Option<Investor>> {
        Ok(staged_or_committed(&self.staged.investors, &self.guard.investors, id).cloned())
    }

    async fn investor_by_name(&mut self, name: &str) -> StoreResult<Option<Investor>> {
        Ok(find_named(&self.staged.investors, &self.guard.investors, |investor| {
            investor.name == name
        })
        .cloned())
    }

    async fn stock(&mut self, id: &str) -> StoreResult<Option<Stock>> {
        Ok(staged_or_committed(&self.staged.stocks, &self.guard.stocks, id).cloned())
    }

    async fn stock_by_name(&mut self, name: &str) -> StoreResult<Option<Stock>> {
        Ok(find_named(&self.staged.stocks, &self.guard.stocks, |stock| stock.name == name).cloned())
    }

    async fn save_investor(&mut self, investor: &Investor) -> StoreResult<()> {
        self.check_fault(FaultPoint::SaveInvestor)?;
        let name_taken = find_named(&self.staged.investors, &self.guard.investors, |other| {
            other.name == investor.name && other.id != investor.id
        })
        .is_some();
        if name_taken {
            return Err(StoreError::Constraint(format!(
                "investor name '{}' already in use",
                investor.name
            )));
        }
        self.staged
            .investors
            .insert(investor.id.clone(), investor.clone());
        Ok(())
    }

    async fn save_stock(&mut self, stock: &Stock) -> StoreResult<()> {
        self.check_fault(FaultPoint::SaveStock)?;
        let name_taken = find_named(&self.staged.stocks, &self.guard.stocks, |other| {
            other.name == stock.name && other.id != stock.id
        })
        .is_some();
        if name_taken {
            return Err(StoreError::Constraint(format!(
                "stock name '{}' already in use",
                stock.name
            )));
        }
        self.staged.stocks.insert(stock.id.clone(), stock.clone());
        Ok(())
    }

    async fn append_transaction(&mut self, txn: &Transaction) -> StoreResult<()> {
        self.check_fault(FaultPoint::AppendTransaction)?;
        let duplicate = self.guard.transaction_ids.contains(&txn.id)
            || self.staged.transactions.iter().any(|t| t.id == txn.id);
        if duplicate {
            return Err(StoreError::Constraint(format!(
                "transaction {} already recorded",
                txn.id
            )));
        }
        self.staged.transactions.push(txn.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.check_fault(FaultPoint::Commit)?;
        let InMemoryUnitOfWork {
            mut guard, staged, ..
        } = *self;
        let state = &mut *guard;
        let (investors, stocks, appended) =
            (staged.investors.len(), staged.stocks.len(), staged.transactions.len());

        state.investors.extend(staged.investors);
        state.stocks.extend(staged.stocks);
        for txn in staged.transactions {
            state.transaction_ids.insert(txn.id.clone());
            state.transactions.push(txn);
        }
        debug!(
            "Committed in-memory unit of work ({} investors, {} stocks, {} transactions)",
            investors, stocks, appended
        );
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        debug!("Rolled back in-memory unit of work");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::transaction::TradeType;
    use crate::domain::value_objects::{price::Price, quantity::Quantity};

    fn stock(name: &str) -> Stock {
        Stock::new(name, Price::new(10.0).unwrap(), 100).unwrap()
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let ledger = InMemoryLedger::new();
        let investor = Investor::new("alice", 100.0).unwrap();

        let mut uow = ledger.begin().await.unwrap();
        uow.save_investor(&investor).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(ledger.find_investor(&investor.id).await.unwrap(), Some(investor));
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let ledger = InMemoryLedger::new();
        let mut uow = ledger.begin().await.unwrap();
        uow.save_stock(&stock("Acme")).await.unwrap();
        uow.rollback().await.unwrap();

        assert!(ledger.list_stocks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_discards_changes() {
        let ledger = InMemoryLedger::new();
        {
            let mut uow = ledger.begin().await.unwrap();
            uow.save_stock(&stock("Acme")).await.unwrap();
        }
        assert!(ledger.list_stocks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unit_of_work_reads_its_own_writes() {
        let ledger = InMemoryLedger::new();
        let acme = stock("Acme");
        let mut uow = ledger.begin().await.unwrap();
        uow.save_stock(&acme).await.unwrap();

        assert_eq!(uow.stock(&acme.id).await.unwrap(), Some(acme.clone()));
        assert_eq!(uow.stock_by_name("Acme").await.unwrap(), Some(acme));
        uow.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let ledger = InMemoryLedger::new();
        let mut uow = ledger.begin().await.unwrap();
        uow.save_stock(&stock("Acme")).await.unwrap();
        let err = uow.save_stock(&stock("Acme")).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_fault_fires_once() {
        let ledger = InMemoryLedger::new();
        ledger.fail_on(FaultPoint::Commit);

        let uow = ledger.begin().await.unwrap();
        assert_eq!(
            uow.commit().await.unwrap_err(),
            StoreError::Injected("commit".to_string())
        );

        let uow = ledger.begin().await.unwrap();
        assert!(uow.commit().await.is_ok());
    }

    #[tokio::test]
    async fn test_list_transactions_filters() {
        let ledger = InMemoryLedger::new();
        let mut uow = ledger.begin().await.unwrap();
        for (investor, trade_type) in [("a", TradeType::Buy), ("b", TradeType::Buy), ("a", TradeType::Sell)] {
            let txn = Transaction::record(
                investor,
                "s1",
                trade_type,
                Quantity::new(1).unwrap(),
                Price::new(10.0).unwrap(),
            );
            uow.append_transaction(&txn).await.unwrap();
        }
        uow.commit().await.unwrap();

        assert_eq!(ledger.transaction_count().await, 3);
        let for_a = ledger
            .list_transactions(&TransactionQuery::all().for_investor("a"))
            .await
            .unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].trade_type, TradeType::Buy);
        assert_eq!(for_a[1].trade_type, TradeType::Sell);
    }

    fn trade(investor: &str) -> Transaction {
        Transaction::record(
            investor,
            "s1",
            TradeType::Buy,
            Quantity::new(1).unwrap(),
            Price::new(10.0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_unit_of_work_stages_only_its_own_writes() {
        let ledger = InMemoryLedger::new();
        let mut uow = ledger.begin().await.unwrap();
        for _ in 0..2_000 {
            uow.append_transaction(&trade("a")).await.unwrap();
        }
        uow.commit().await.unwrap();

        // A long history must not be copied into every unit of work
        let mut uow = ledger.open().await;
        assert!(uow.staged.transactions.is_empty());
        uow.save_stock(&stock("Acme")).await.unwrap();
        uow.append_transaction(&trade("b")).await.unwrap();
        assert_eq!(uow.staged.transactions.len(), 1);
        assert_eq!(uow.staged.stocks.len(), 1);
        assert!(uow.staged.investors.is_empty());

        Box::new(uow).commit().await.unwrap();
        assert_eq!(ledger.transaction_count().await, 2_001);
        assert_eq!(ledger.list_stocks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_committed_transaction_id_cannot_be_reused() {
        let ledger = InMemoryLedger::new();
        let txn = trade("a");
        let mut uow = ledger.begin().await.unwrap();
        uow.append_transaction(&txn).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = ledger.begin().await.unwrap();
        let err = uow.append_transaction(&txn).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_staged_rename_frees_the_old_name() {
        let ledger = InMemoryLedger::new();
        let acme = stock("Acme");
        let mut uow = ledger.begin().await.unwrap();
        uow.save_stock(&acme).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = ledger.begin().await.unwrap();
        uow.save_stock(&Stock { name: "Apex".to_string(), ..acme.clone() })
            .await
            .unwrap();
        assert!(uow.stock_by_name("Acme").await.unwrap().is_none());
        uow.save_stock(&stock("Acme")).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(ledger.list_stocks().await.unwrap().len(), 2);
    }
}
