use crate::config::LedgerConfig;
use crate::domain::entities::investor::Investor;
use crate::domain::entities::stock::Stock;
use crate::domain::entities::transaction::Transaction;
use crate::domain::repositories::ledger_store::{LedgerStore, TransactionQuery};
use crate::domain::services::portfolio::{PortfolioService, PortfolioView};
use crate::domain::services::registry::Registry;
use crate::domain::services::settlement::TradeSettlementEngine;
use crate::domain::services::trade_error::TradeError;
use crate::domain::services::transaction_log::TransactionLog;
use crate::persistence::memory::InMemoryLedger;
use crate::persistence::sqlite::SqliteLedger;
use crate::persistence::DatabaseError;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// `DATABASE_URL` value selecting the in-process ledger
pub const MEMORY_BACKEND_URL: &str = "memory";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] crate::domain::errors::ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Everything the ledger offers, wired to one store
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    registry: Registry,
    engine: TradeSettlementEngine,
    portfolios: PortfolioService,
    log: TransactionLog,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, config: &LedgerConfig) -> Result<Self, StartupError> {
        config.validate()?;
        Ok(Self {
            registry: Registry::new(store.clone(), config.listing_defaults()),
            engine: TradeSettlementEngine::new(store.clone(), config.pricing_model()?),
            portfolios: PortfolioService::new(store.clone()),
            log: TransactionLog::new(store.clone()),
            store,
        })
    }

    /// Open the backend named by `config.database.url`
    pub async fn open(config: &LedgerConfig) -> Result<Self, StartupError> {
        let store: Arc<dyn LedgerStore> = if config.database.url == MEMORY_BACKEND_URL {
            Arc::new(InMemoryLedger::new())
        } else {
            Arc::new(SqliteLedger::connect(&config.database).await?)
        };
        info!("Ledger ready on {} backend", store.name());
        Self::new(store, config)
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub async fn register_investor(&self, name: &str) -> Result<Investor, TradeError> {
        self.registry.register_investor(name).await
    }

    pub async fn list_investors(&self) -> Result<Vec<Investor>, TradeError> {
        self.registry.list_investors().await
    }

    pub async fn issue_stock(
        &self,
        name: &str,
        price_per_share: Option<f64>,
        total_shares: Option<u64>,
    ) -> Result<Stock, TradeError> {
        let defaults = self.registry.defaults();
        self.registry
            .issue_stock_with(
                name,
                price_per_share.unwrap_or(defaults.stock_price),
                total_shares.unwrap_or(defaults.stock_shares),
            )
            .await
    }

    pub async fn list_stocks(&self) -> Result<Vec<Stock>, TradeError> {
        self.registry.list_stocks().await
    }

    pub async fn buy(&self, investor_id: &str, stock_id: &str, shares: i64) -> Result<Transaction, TradeError> {
        self.engine.buy(investor_id, stock_id, shares).await
    }

    pub async fn sell(&self, investor_id: &str, stock_id: &str, shares: i64) -> Result<Transaction, TradeError> {
        self.engine.sell(investor_id, stock_id, shares).await
    }

    pub async fn portfolio(&self, investor_id: &str) -> Result<PortfolioView, TradeError> {
        self.portfolios.portfolio(investor_id).await
    }

    pub async fn transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>, TradeError> {
        self.log.list(query).await
    }
}
