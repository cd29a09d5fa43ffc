//! Portfolio view - an investor's holdings valued at current prices

use crate::domain::entities::investor::Investor;
use crate::domain::entities::stock::Stock;
use crate::domain::repositories::ledger_store::LedgerStore;
use crate::domain::services::trade_error::{EntityKind, TradeError};
use crate::domain::value_objects::price::round_to_cents;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingView {
    pub stock_id: String,
    pub stock_name: String,
    pub shares: u64,
    pub price_per_share: f64,
    pub market_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioView {
    pub investor_id: String,
    pub name: String,
    pub balance: f64,
    pub holdings: Vec<HoldingView>,
    pub holding_count: usize,
    pub portfolio_value: f64,
    /// Cash plus portfolio value
    pub total_assets: f64,
}

impl PortfolioView {
    /// Value every portfolio entry of `investor` using `stocks`.
    ///
    /// Fails if an entry points at a stock that is not in `stocks`.
    pub fn build(investor: &Investor, stocks: &[Stock]) -> Result<Self, TradeError> {
        let holdings = investor
            .portfolio
            .iter()
            .map(|entry| {
                let stock = stocks
                    .iter()
                    .find(|stock| stock.id == entry.stock_id)
                    .ok_or_else(|| {
                        TradeError::Internal(format!(
                            "portfolio of {} references unknown stock {}",
                            investor.id, entry.stock_id
                        ))
                    })?;
                Ok(HoldingView {
                    stock_id: stock.id.clone(),
                    stock_name: stock.name.clone(),
                    shares: entry.shares,
                    price_per_share: stock.price_per_share.value(),
                    market_value: stock.price_per_share.total_for(entry.shares),
                })
            })
            .collect::<Result<Vec<_>, TradeError>>()?;

        let portfolio_value = round_to_cents(holdings.iter().map(|h| h.market_value).sum());

        Ok(Self {
            investor_id: investor.id.clone(),
            name: investor.name.clone(),
            balance: investor.balance,
            portfolio_value,
            total_assets: round_to_cents(investor.balance + portfolio_value),
            holding_count: holdings.len(),
            holdings,
        })
    }
}

pub struct PortfolioService {
    store: Arc<dyn LedgerStore>,
}

impl PortfolioService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Snapshot of an investor's holdings, taken inside one unit of work so
    /// prices and share counts come from the same ledger state.
    pub async fn portfolio(&self, investor_id: &str) -> Result<PortfolioView, TradeError> {
        let mut uow = self.store.begin().await?;

        let investor = match uow.investor(investor_id).await? {
            Some(investor) => investor,
            None => {
                uow.rollback().await?;
                return Err(TradeError::not_found(EntityKind::Investor, investor_id));
            }
        };

        let mut stocks = Vec::with_capacity(investor.portfolio.len());
        for entry in &investor.portfolio {
            if let Some(stock) = uow.stock(&entry.stock_id).await? {
                stocks.push(stock);
            }
        }
        uow.rollback().await?;

        PortfolioView::build(&investor, &stocks)
    }
}
