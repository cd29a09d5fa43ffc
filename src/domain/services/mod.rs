pub mod portfolio;
pub mod pricing;
pub mod registry;
pub mod settlement;
pub mod trade_error;
pub mod transaction_log;
