//! SQLite ledger backend
//!
//! Reads go straight to the pool. A unit of work owns one pooled connection
//! inside a `BEGIN IMMEDIATE` transaction plus the in-process write gate. The
//! gate orders units of work sharing one handle; the immediate lock orders
//! them across handles and processes on the same file, so a unit of work
//! never has to upgrade a read lock it already holds.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteConnection;
use sqlx::{QueryBuilder, Sqlite};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, warn};

use super::models::*;
use super::{init_database_with, store_error, DatabaseConfig, DatabaseError, DbPool};
use crate::domain::entities::investor::Investor;
use crate::domain::entities::stock::Stock;
use crate::domain::entities::transaction::Transaction;
use crate::domain::repositories::ledger_store::{
    LedgerStore, SortOrder, StoreError, StoreResult, TransactionQuery, UnitOfWork,
};

const INVESTOR_COLUMNS: &str = "id, name, balance, created_at, updated_at";
const STOCK_COLUMNS: &str = "id, name, price_per_share, shares, total_shares, created_at, updated_at";

fn db_count(value: u64, what: &str) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| StoreError::Constraint(format!("{} out of range: {}", what, value)))
}

async fn fetch_investor(
    conn: &mut SqliteConnection,
    column: &str,
    value: &str,
) -> StoreResult<Option<Investor>> {
    let sql = format!("SELECT {} FROM investors WHERE {} = ?1", INVESTOR_COLUMNS, column);
    let record = sqlx::query_as::<_, InvestorRecord>(&sql)
        .bind(value)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| store_error("Failed to load investor", e))?;

    match record {
        Some(record) => {
            let entries = fetch_portfolio(conn, &record.id).await?;
            Ok(Some(record.into_investor(entries)?))
        }
        None => Ok(None),
    }
}

async fn fetch_portfolio(
    conn: &mut SqliteConnection,
    investor_id: &str,
) -> StoreResult<Vec<PortfolioEntryRecord>> {
    sqlx::query_as::<_, PortfolioEntryRecord>(
        "SELECT investor_id, stock_id, shares FROM portfolio_entries WHERE investor_id = ?1 ORDER BY rowid",
    )
    .bind(investor_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| store_error("Failed to load portfolio", e))
}

async fn fetch_stock(
    conn: &mut SqliteConnection,
    column: &str,
    value: &str,
) -> StoreResult<Option<Stock>> {
    let sql = format!("SELECT {} FROM stocks WHERE {} = ?1", STOCK_COLUMNS, column);
    let record = sqlx::query_as::<_, StockRecord>(&sql)
        .bind(value)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| store_error("Failed to load stock", e))?;

    match record {
        Some(record) => {
            let owners = fetch_owners(conn, &record.id).await?;
            Ok(Some(record.into_stock(owners)?))
        }
        None => Ok(None),
    }
}

async fn fetch_owners(conn: &mut SqliteConnection, stock_id: &str) -> StoreResult<Vec<StockOwnerRecord>> {
    sqlx::query_as::<_, StockOwnerRecord>(
        "SELECT stock_id, investor_id, shares_owned FROM stock_owners WHERE stock_id = ?1 ORDER BY rowid",
    )
    .bind(stock_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| store_error("Failed to load stock owners", e))
}

/// Ledger stored in SQLite
#[derive(Clone)]
pub struct SqliteLedger {
    pool: DbPool,
    write_gate: Arc<Mutex<()>>,
}

impl SqliteLedger {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Open (and migrate) the database described by `config`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = init_database_with(config).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let gate = self.write_gate.clone().lock_owned().await;
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| store_error("Failed to acquire connection", e))?;

        // Waits out other writers via busy_timeout instead of failing mid-trade
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                error!("Failed to open ledger transaction: {}", e);
                store_error("Failed to begin transaction", e)
            })?;

        Ok(Box::new(SqliteUnitOfWork {
            conn: Some(conn),
            gate: Some(gate),
        }))
    }

    async fn find_investor(&self, id: &str) -> StoreResult<Option<Investor>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| store_error("Failed to acquire connection", e))?;
        fetch_investor(&mut conn, "id", id).await
    }

    async fn list_investors(&self) -> StoreResult<Vec<Investor>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| store_error("Failed to acquire connection", e))?;

        let sql = format!(
            "SELECT {} FROM investors ORDER BY created_at ASC, name ASC",
            INVESTOR_COLUMNS
        );
        let records = sqlx::query_as::<_, InvestorRecord>(&sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| store_error("Failed to list investors", e))?;

        let mut investors = Vec::with_capacity(records.len());
        for record in records {
            let entries = fetch_portfolio(&mut conn, &record.id).await?;
            investors.push(record.into_investor(entries)?);
        }
        Ok(investors)
    }

    async fn find_stock(&self, id: &str) -> StoreResult<Option<Stock>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| store_error("Failed to acquire connection", e))?;
        fetch_stock(&mut conn, "id", id).await
    }

    async fn list_stocks(&self) -> StoreResult<Vec<Stock>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| store_error("Failed to acquire connection", e))?;

        let sql = format!("SELECT {} FROM stocks ORDER BY created_at ASC, name ASC", STOCK_COLUMNS);
        let records = sqlx::query_as::<_, StockRecord>(&sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| store_error("Failed to list stocks", e))?;

        let mut stocks = Vec::with_capacity(records.len());
        for record in records {
            let owners = fetch_owners(&mut conn, &record.id).await?;
            stocks.push(record.into_stock(owners)?);
        }
        Ok(stocks)
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> StoreResult<Vec<Transaction>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT seq, id, investor_id, stock_id, trade_type, shares, price_per_share, total, executed_at \
             FROM transactions WHERE 1 = 1",
        );
        if let Some(investor_id) = &query.investor_id {
            builder.push(" AND investor_id = ").push_bind(investor_id.clone());
        }
        if let Some(stock_id) = &query.stock_id {
            builder.push(" AND stock_id = ").push_bind(stock_id.clone());
        }
        if let Some(trade_type) = query.trade_type {
            builder.push(" AND trade_type = ").push_bind(trade_type.as_str());
        }
        match query.order {
            SortOrder::Ascending => builder.push(" ORDER BY executed_at ASC, seq ASC"),
            SortOrder::Descending => builder.push(" ORDER BY executed_at DESC, seq DESC"),
        };
        if let Some(limit) = query.limit {
            builder
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let records = builder
            .build_query_as::<TransactionRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error("Failed to list transactions", e))?;

        records.into_iter().map(Transaction::try_from).collect()
    }
}

struct SqliteUnitOfWork {
    /// Inside an open transaction until commit or rollback takes it
    conn: Option<PoolConnection<Sqlite>>,
    gate: Option<OwnedMutexGuard<()>>,
}

impl SqliteUnitOfWork {
    fn conn(&mut self) -> StoreResult<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| StoreError::Backend("unit of work already finished".to_string()))
    }

    /// Run COMMIT or ROLLBACK and hand the connection back to the pool
    async fn finish(mut self, statement: &'static str) -> StoreResult<()> {
        let conn = self.conn()?;
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(|e| store_error(&format!("Failed to {}", statement.to_lowercase()), e))?;
        self.conn = None;
        Ok(())
    }
}

impl Drop for SqliteUnitOfWork {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        let gate = self.gate.take();
        debug!("Rolling back abandoned ledger transaction");

        match tokio::runtime::Handle::try_current() {
            // The gate is held until the rollback lands so the next unit of
            // work starts from clean state.
            Ok(handle) => {
                handle.spawn(async move {
                    match sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        Ok(_) => drop(conn),
                        Err(e) => {
                            warn!("Rollback of abandoned transaction failed: {}", e);
                            drop(conn.detach());
                        }
                    }
                    drop(gate);
                });
            }
            // Closing the connection discards the open transaction
            Err(_) => drop(conn.detach()),
        }
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn investor(&mut self, id: &str) -> StoreResult<Option<Investor>> {
        fetch_investor(self.conn()?, "id", id).await
    }

    async fn investor_by_name(&mut self, name: &str) -> StoreResult<Option<Investor>> {
        fetch_investor(self.conn()?, "name", name).await
    }

    async fn stock(&mut self, id: &str) -> StoreResult<Option<Stock>> {
        fetch_stock(self.conn()?, "id", id).await
    }

    async fn stock_by_name(&mut self, name: &str) -> StoreResult<Option<Stock>> {
        fetch_stock(self.conn()?, "name", name).await
    }

    async fn save_investor(&mut self, investor: &Investor) -> StoreResult<()> {
        let now = Utc::now();
        let conn = self.conn()?;
        sqlx::query(
            r#"
            INSERT INTO investors (id, name, balance, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                balance = excluded.balance,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&investor.id)
        .bind(&investor.name)
        .bind(investor.balance)
        .bind(investor.created_at)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| store_error("Failed to save investor", e))?;

        sqlx::query("DELETE FROM portfolio_entries WHERE investor_id = ?1")
            .bind(&investor.id)
            .execute(&mut *conn)
            .await
            .map_err(|e| store_error("Failed to clear portfolio", e))?;

        for entry in &investor.portfolio {
            sqlx::query(
                "INSERT INTO portfolio_entries (investor_id, stock_id, shares) VALUES (?1, ?2, ?3)",
            )
            .bind(&investor.id)
            .bind(&entry.stock_id)
            .bind(db_count(entry.shares, "portfolio shares")?)
            .execute(&mut *conn)
            .await
            .map_err(|e| store_error("Failed to save portfolio entry", e))?;
        }

        debug!("Saved investor {} ({} holdings)", investor.id, investor.portfolio.len());
        Ok(())
    }

    async fn save_stock(&mut self, stock: &Stock) -> StoreResult<()> {
        let now = Utc::now();
        let conn = self.conn()?;
        sqlx::query(
            r#"
            INSERT INTO stocks (id, name, price_per_share, shares, total_shares, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price_per_share = excluded.price_per_share,
                shares = excluded.shares,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&stock.id)
        .bind(&stock.name)
        .bind(stock.price_per_share.value())
        .bind(db_count(stock.shares, "available shares")?)
        .bind(db_count(stock.total_shares, "issued shares")?)
        .bind(stock.created_at)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| store_error("Failed to save stock", e))?;

        sqlx::query("DELETE FROM stock_owners WHERE stock_id = ?1")
            .bind(&stock.id)
            .execute(&mut *conn)
            .await
            .map_err(|e| store_error("Failed to clear stock owners", e))?;

        for owner in &stock.owners {
            sqlx::query(
                "INSERT INTO stock_owners (stock_id, investor_id, shares_owned) VALUES (?1, ?2, ?3)",
            )
            .bind(&stock.id)
            .bind(&owner.investor_id)
            .bind(db_count(owner.shares_owned, "owned shares")?)
            .execute(&mut *conn)
            .await
            .map_err(|e| store_error("Failed to save stock owner", e))?;
        }

        debug!("Saved stock {} @ {}", stock.id, stock.price_per_share);
        Ok(())
    }

    async fn append_transaction(&mut self, txn: &Transaction) -> StoreResult<()> {
        let conn = self.conn()?;
        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, investor_id, stock_id, trade_type, shares,
                price_per_share, total, executed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&txn.id)
        .bind(&txn.investor_id)
        .bind(&txn.stock_id)
        .bind(txn.trade_type.as_str())
        .bind(db_count(txn.shares, "traded shares")?)
        .bind(txn.price_per_share.value())
        .bind(txn.total)
        .bind(txn.timestamp)
        .execute(&mut *conn)
        .await
        .map_err(|e| store_error("Failed to append transaction", e))?;

        debug!("Appended transaction {}", txn.id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        (*self).finish("COMMIT").await.map_err(|e| {
            error!("Ledger commit failed: {}", e);
            e
        })
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        (*self).finish("ROLLBACK").await
    }
}
