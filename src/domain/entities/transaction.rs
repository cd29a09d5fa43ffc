use crate::domain::value_objects::{price::Price, quantity::Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TradeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeType::Buy),
            "SELL" => Ok(TradeType::Sell),
            other => Err(format!("unknown trade type: {}", other)),
        }
    }
}

/// Immutable record of a settled trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub investor_id: String,
    pub stock_id: String,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub shares: u64,
    /// Price the trade executed at, before the post-trade price move
    pub price_per_share: Price,
    pub total: f64,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    pub fn record(
        investor_id: &str,
        stock_id: &str,
        trade_type: TradeType,
        quantity: Quantity,
        price_per_share: Price,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            investor_id: investor_id.to_string(),
            stock_id: stock_id.to_string(),
            trade_type,
            shares: quantity.value(),
            price_per_share,
            total: price_per_share.total_for(quantity.value()),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_type_parse() {
        assert_eq!("buy".parse::<TradeType>().unwrap(), TradeType::Buy);
        assert_eq!(" SELL ".parse::<TradeType>().unwrap(), TradeType::Sell);
        assert!("hold".parse::<TradeType>().is_err());
    }

    #[test]
    fn test_record_totals_at_execution_price() {
        let txn = Transaction::record(
            "inv",
            "stk",
            TradeType::Buy,
            Quantity::new(10).unwrap(),
            Price::new(100.0).unwrap(),
        );
        assert_eq!(txn.shares, 10);
        assert_eq!(txn.total, 1000.0);
        assert_eq!(txn.price_per_share.value(), 100.0);
    }

    #[test]
    fn test_transaction_json_shape() {
        let txn = Transaction::record(
            "inv",
            "stk",
            TradeType::Sell,
            Quantity::new(2).unwrap(),
            Price::new(12.5).unwrap(),
        );
        let json = serde_json::to_value(&txn).unwrap();
        assert_eq!(json["type"], "SELL");
        assert_eq!(json["price_per_share"], 12.5);
        assert_eq!(json["total"], 25.0);
    }
}
