//! Trade settlement - atomic buy and sell against the ledger
//!
//! Each trade runs `Validate → Mutate → Persist → Record` inside one
//! [`UnitOfWork`]. Validation happens before anything is touched; any failure
//! after that rolls the unit of work back, so balance, inventory, ownership,
//! price and the transaction log either all change or none do.

use crate::domain::entities::investor::Investor;
use crate::domain::entities::stock::Stock;
use crate::domain::entities::transaction::{TradeType, Transaction};
use crate::domain::repositories::ledger_store::{LedgerStore, UnitOfWork};
use crate::domain::services::pricing::PricingModel;
use crate::domain::services::trade_error::{EntityKind, ErrorSeverity, TradeError};
use crate::domain::value_objects::quantity::Quantity;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Apply a buy to in-memory copies of the investor and stock.
///
/// The transaction records the pre-trade price; the stock leaves with the
/// post-trade price.
pub fn settle_buy(
    investor: &mut Investor,
    stock: &mut Stock,
    quantity: Quantity,
    pricing: &PricingModel,
) -> Result<Transaction, TradeError> {
    let shares = quantity.value();
    let execution_price = stock.price_per_share;
    let cost = execution_price.total_for(shares);

    if shares > stock.shares {
        return Err(TradeError::InsufficientShares {
            requested: shares,
            available: stock.shares,
        });
    }
    if !investor.can_afford(cost) {
        return Err(TradeError::InsufficientFunds {
            required: cost,
            available: investor.balance,
        });
    }

    stock.allocate(&investor.id, shares).map_err(TradeError::Internal)?;
    investor.debit(cost).map_err(TradeError::Internal)?;
    investor.add_shares(&stock.id, shares);
    stock.price_per_share = pricing
        .next_price(execution_price, quantity.signed(false))
        .map_err(|e| TradeError::Internal(format!("price update failed: {}", e)))?;

    check_consistency(investor, stock)?;

    Ok(Transaction::record(
        &investor.id,
        &stock.id,
        TradeType::Buy,
        quantity,
        execution_price,
    ))
}

/// Apply a sell to in-memory copies of the investor and stock.
pub fn settle_sell(
    investor: &mut Investor,
    stock: &mut Stock,
    quantity: Quantity,
    pricing: &PricingModel,
) -> Result<Transaction, TradeError> {
    let shares = quantity.value();
    let execution_price = stock.price_per_share;

    let held = match (stock.owner(&investor.id), investor.holding(&stock.id)) {
        (Some(_), Some(entry)) => entry.shares,
        _ => {
            return Err(TradeError::DoesNotOwn {
                investor_id: investor.id.clone(),
                stock_id: stock.id.clone(),
            })
        }
    };
    if held < shares {
        return Err(TradeError::InsufficientShares {
            requested: shares,
            available: held,
        });
    }

    let payout = execution_price.total_for(shares);
    investor
        .remove_shares(&stock.id, shares)
        .map_err(TradeError::Internal)?;
    stock.release(&investor.id, shares).map_err(TradeError::Internal)?;
    investor.credit(payout);
    stock.price_per_share = pricing
        .next_price(execution_price, quantity.signed(true))
        .map_err(|e| TradeError::Internal(format!("price update failed: {}", e)))?;

    check_consistency(investor, stock)?;

    Ok(Transaction::record(
        &investor.id,
        &stock.id,
        TradeType::Sell,
        quantity,
        execution_price,
    ))
}

/// Both sides of the trade must still satisfy their invariants and agree on
/// how many shares the investor holds.
fn check_consistency(investor: &Investor, stock: &Stock) -> Result<(), TradeError> {
    investor.validate().map_err(TradeError::Internal)?;
    stock.validate().map_err(TradeError::Internal)?;

    let portfolio_view = investor.shares_of(&stock.id);
    let owners_view = stock.owned_by(&investor.id);
    if portfolio_view != owners_view {
        return Err(TradeError::Internal(format!(
            "ownership views disagree for investor {} on stock {}: portfolio {}, owners {}",
            investor.id, stock.id, portfolio_view, owners_view
        )));
    }
    Ok(())
}

/// Settles buy and sell requests against a [`LedgerStore`]
pub struct TradeSettlementEngine {
    store: Arc<dyn LedgerStore>,
    pricing: PricingModel,
}

impl TradeSettlementEngine {
    pub fn new(store: Arc<dyn LedgerStore>, pricing: PricingModel) -> Self {
        Self { store, pricing }
    }

    /// Buy `shares` of `stock_id` for `investor_id` at the current price
    pub async fn buy(
        &self,
        investor_id: &str,
        stock_id: &str,
        shares: i64,
    ) -> Result<Transaction, TradeError> {
        self.execute(TradeType::Buy, investor_id, stock_id, shares).await
    }

    /// Sell `shares` of `stock_id` held by `investor_id` at the current price
    pub async fn sell(
        &self,
        investor_id: &str,
        stock_id: &str,
        shares: i64,
    ) -> Result<Transaction, TradeError> {
        self.execute(TradeType::Sell, investor_id, stock_id, shares).await
    }

    async fn execute(
        &self,
        trade_type: TradeType,
        investor_id: &str,
        stock_id: &str,
        shares: i64,
    ) -> Result<Transaction, TradeError> {
        let quantity = Quantity::new(shares).map_err(|e| {
            warn!("Rejected {} request from {}: {}", trade_type, investor_id, e);
            TradeError::from(e)
        })?;

        debug!(
            "Opening unit of work on {} for {} {} x{}",
            self.store.name(),
            trade_type,
            stock_id,
            quantity
        );
        let mut uow = self.store.begin().await?;

        match self
            .apply(uow.as_mut(), trade_type, investor_id, stock_id, quantity)
            .await
        {
            Ok(txn) => {
                if let Err(e) = uow.commit().await {
                    error!("Commit failed for {} {}: {}", trade_type, stock_id, e);
                    return Err(e.into());
                }
                info!(
                    "Settled {} of {} shares of {} for {} @ {} (total {:.2})",
                    trade_type, txn.shares, txn.stock_id, txn.investor_id, txn.price_per_share, txn.total
                );
                Ok(txn)
            }
            Err(e) => {
                if let Err(rollback_error) = uow.rollback().await {
                    error!("Rollback failed after {}: {}", e, rollback_error);
                }
                match e.severity() {
                    ErrorSeverity::Critical => error!(
                        "{} {} for {} rolled back [{}]: {}",
                        trade_type,
                        stock_id,
                        investor_id,
                        e.error_code(),
                        e
                    ),
                    _ => warn!(
                        "{} {} for {} rejected [{}]: {}",
                        trade_type,
                        stock_id,
                        investor_id,
                        e.error_code(),
                        e
                    ),
                }
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        uow: &mut dyn UnitOfWork,
        trade_type: TradeType,
        investor_id: &str,
        stock_id: &str,
        quantity: Quantity,
    ) -> Result<Transaction, TradeError> {
        let mut investor = uow
            .investor(investor_id)
            .await?
            .ok_or_else(|| TradeError::not_found(EntityKind::Investor, investor_id))?;
        let mut stock = uow
            .stock(stock_id)
            .await?
            .ok_or_else(|| TradeError::not_found(EntityKind::Stock, stock_id))?;

        let txn = match trade_type {
            TradeType::Buy => settle_buy(&mut investor, &mut stock, quantity, &self.pricing)?,
            TradeType::Sell => settle_sell(&mut investor, &mut stock, quantity, &self.pricing)?,
        };

        uow.save_investor(&investor).await?;
        uow.save_stock(&stock).await?;
        uow.append_transaction(&txn).await?;

        Ok(txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::price::Price;

    fn setup(balance: f64, price: f64, shares: u64) -> (Investor, Stock) {
        let investor = Investor::new("alice", balance).unwrap();
        let stock = Stock::new("Acme", Price::new(price).unwrap(), shares).unwrap();
        (investor, stock)
    }

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn test_buy_scenario() {
        let (mut investor, mut stock) = setup(10000.0, 100.0, 1000);
        let txn = settle_buy(&mut investor, &mut stock, qty(10), &PricingModel::default()).unwrap();

        assert_eq!(investor.balance, 9000.0);
        assert_eq!(stock.shares, 990);
        assert_eq!(stock.price_per_share.value(), 101.0);
        assert_eq!(txn.trade_type, TradeType::Buy);
        assert_eq!(txn.shares, 10);
        assert_eq!(txn.price_per_share.value(), 100.0);
        assert_eq!(investor.shares_of(&stock.id), 10);
        assert_eq!(stock.owned_by(&investor.id), 10);
    }

    #[test]
    fn test_second_buy_merges_holdings() {
        let (mut investor, mut stock) = setup(10000.0, 10.0, 1000);
        let pricing = PricingModel::default();
        settle_buy(&mut investor, &mut stock, qty(5), &pricing).unwrap();
        settle_buy(&mut investor, &mut stock, qty(7), &pricing).unwrap();

        assert_eq!(investor.portfolio.len(), 1);
        assert_eq!(stock.owners.len(), 1);
        assert_eq!(investor.shares_of(&stock.id), 12);
    }

    #[test]
    fn test_buy_more_than_available_leaves_state() {
        let (mut investor, mut stock) = setup(9000.0, 101.0, 990);
        let before = (investor.clone(), stock.clone());
        let err = settle_buy(&mut investor, &mut stock, qty(2000), &PricingModel::default()).unwrap_err();

        assert_eq!(
            err,
            TradeError::InsufficientShares {
                requested: 2000,
                available: 990
            }
        );
        assert_eq!((investor, stock), before);
    }

    #[test]
    fn test_buy_without_funds() {
        let (mut investor, mut stock) = setup(50.0, 100.0, 1000);
        let err = settle_buy(&mut investor, &mut stock, qty(1), &PricingModel::default()).unwrap_err();
        assert_eq!(
            err,
            TradeError::InsufficientFunds {
                required: 100.0,
                available: 50.0
            }
        );
    }

    #[test]
    fn test_buy_exact_balance() {
        let (mut investor, mut stock) = setup(100.0, 100.0, 1000);
        settle_buy(&mut investor, &mut stock, qty(1), &PricingModel::default()).unwrap();
        assert_eq!(investor.balance, 0.0);
    }

    #[test]
    fn test_sell_all_removes_both_entries() {
        let (mut investor, mut stock) = setup(10000.0, 100.0, 1000);
        let pricing = PricingModel::default();
        settle_buy(&mut investor, &mut stock, qty(10), &pricing).unwrap();

        let txn = settle_sell(&mut investor, &mut stock, qty(10), &pricing).unwrap();
        assert_eq!(txn.trade_type, TradeType::Sell);
        assert_eq!(txn.price_per_share.value(), 101.0);
        assert_eq!(txn.total, 1010.0);
        assert_eq!(investor.balance, 10010.0);
        assert!(investor.holding(&stock.id).is_none());
        assert!(stock.owner(&investor.id).is_none());
        assert_eq!(stock.shares, 1000);
        assert_eq!(stock.price_per_share.value(), 99.99);
    }

    #[test]
    fn test_partial_sell_keeps_entries() {
        let (mut investor, mut stock) = setup(10000.0, 10.0, 1000);
        let pricing = PricingModel::default();
        settle_buy(&mut investor, &mut stock, qty(10), &pricing).unwrap();
        settle_sell(&mut investor, &mut stock, qty(4), &pricing).unwrap();

        assert_eq!(investor.shares_of(&stock.id), 6);
        assert_eq!(stock.owned_by(&investor.id), 6);
        assert_eq!(stock.shares, 994);
    }

    #[test]
    fn test_sell_without_holding() {
        let (mut investor, mut stock) = setup(10000.0, 100.0, 1000);
        let err = settle_sell(&mut investor, &mut stock, qty(5), &PricingModel::default()).unwrap_err();
        assert!(matches!(err, TradeError::DoesNotOwn { .. }));
    }

    #[test]
    fn test_sell_more_than_held() {
        let (mut investor, mut stock) = setup(10000.0, 100.0, 1000);
        let pricing = PricingModel::default();
        settle_buy(&mut investor, &mut stock, qty(3), &pricing).unwrap();
        let err = settle_sell(&mut investor, &mut stock, qty(4), &pricing).unwrap_err();
        assert_eq!(
            err,
            TradeError::InsufficientShares {
                requested: 4,
                available: 3
            }
        );
    }

    #[test]
    fn test_sell_with_drifted_owner_view_is_internal() {
        let (mut investor, mut stock) = setup(10000.0, 100.0, 1000);
        let pricing = PricingModel::default();
        settle_buy(&mut investor, &mut stock, qty(5), &pricing).unwrap();
        // owners view lost two shares
        stock.owners[0].shares_owned = 3;
        stock.shares += 2;

        let err = settle_sell(&mut investor, &mut stock, qty(5), &pricing).unwrap_err();
        assert!(matches!(err, TradeError::Internal(_)));
    }

    #[test]
    fn test_sell_clamps_price_to_floor() {
        let (mut investor, mut stock) = setup(1_000_000.0, 1.0, 5000);
        let pricing = PricingModel::default();
        settle_buy(&mut investor, &mut stock, qty(2000), &pricing).unwrap();
        stock.price_per_share = Price::new(0.5).unwrap();
        settle_sell(&mut investor, &mut stock, qty(2000), &pricing).unwrap();
        assert_eq!(stock.price_per_share.value(), 0.01);
    }
}
