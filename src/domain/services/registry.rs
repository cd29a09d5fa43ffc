//! Registry - investor signup and stock issuance

use crate::domain::entities::investor::Investor;
use crate::domain::entities::stock::Stock;
use crate::domain::errors::validate_name;
use crate::domain::repositories::ledger_store::LedgerStore;
use crate::domain::services::trade_error::{EntityKind, TradeError};
use crate::domain::value_objects::price::Price;
use std::sync::Arc;
use tracing::info;

/// Values applied to newly created investors and stocks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListingDefaults {
    pub investor_balance: f64,
    pub stock_price: f64,
    pub stock_shares: u64,
}

impl Default for ListingDefaults {
    fn default() -> Self {
        Self {
            investor_balance: 10_000.0,
            stock_price: 100.0,
            stock_shares: 1_000,
        }
    }
}

pub struct Registry {
    store: Arc<dyn LedgerStore>,
    defaults: ListingDefaults,
}

impl Registry {
    pub fn new(store: Arc<dyn LedgerStore>, defaults: ListingDefaults) -> Self {
        Self { store, defaults }
    }

    pub fn defaults(&self) -> &ListingDefaults {
        &self.defaults
    }

    /// Sign up an investor with the default opening balance
    pub async fn register_investor(&self, name: &str) -> Result<Investor, TradeError> {
        let name = validate_name(name)?;
        let mut uow = self.store.begin().await?;

        if uow.investor_by_name(&name).await?.is_some() {
            uow.rollback().await?;
            return Err(TradeError::AlreadyExists {
                entity: EntityKind::Investor,
                name,
            });
        }

        let investor = Investor::new(&name, self.defaults.investor_balance)?;
        uow.save_investor(&investor).await?;
        uow.commit().await?;

        info!(
            "Registered investor {} ({}) with balance {:.2}",
            investor.name, investor.id, investor.balance
        );
        Ok(investor)
    }

    /// Issue a stock at the default price and share count
    pub async fn issue_stock(&self, name: &str) -> Result<Stock, TradeError> {
        self.issue_stock_with(name, self.defaults.stock_price, self.defaults.stock_shares)
            .await
    }

    /// Issue a stock with an explicit opening price and share count
    pub async fn issue_stock_with(
        &self,
        name: &str,
        price_per_share: f64,
        total_shares: u64,
    ) -> Result<Stock, TradeError> {
        let name = validate_name(name)?;
        let price = Price::new(price_per_share)?;
        let mut uow = self.store.begin().await?;

        if uow.stock_by_name(&name).await?.is_some() {
            uow.rollback().await?;
            return Err(TradeError::AlreadyExists {
                entity: EntityKind::Stock,
                name,
            });
        }

        let stock = Stock::new(&name, price, total_shares)?;
        uow.save_stock(&stock).await?;
        uow.commit().await?;

        info!(
            "Issued stock {} ({}): {} shares @ {}",
            stock.name, stock.id, stock.total_shares, stock.price_per_share
        );
        Ok(stock)
    }

    pub async fn investor(&self, id: &str) -> Result<Investor, TradeError> {
        self.store
            .find_investor(id)
            .await?
            .ok_or_else(|| TradeError::not_found(EntityKind::Investor, id))
    }

    pub async fn stock(&self, id: &str) -> Result<Stock, TradeError> {
        self.store
            .find_stock(id)
            .await?
            .ok_or_else(|| TradeError::not_found(EntityKind::Stock, id))
    }

    pub async fn list_investors(&self) -> Result<Vec<Investor>, TradeError> {
        Ok(self.store.list_investors().await?)
    }

    pub async fn list_stocks(&self) -> Result<Vec<Stock>, TradeError> {
        Ok(self.store.list_stocks().await?)
    }
}
